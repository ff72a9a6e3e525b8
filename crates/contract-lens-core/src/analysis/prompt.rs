use std::fmt::Write;

use crate::{
    risk::taxonomy::{GlossaryTerm, TermTier},
    templates::DocumentTemplate,
};

use super::{DocumentAnalysis, DocumentType};

const JSON_ONLY: &str = "IMPORTANT: Respond with ONLY valid JSON. Do not include any markdown formatting, code blocks, or additional text. Start your response with { and end with }.";

pub(crate) fn analysis_prompt(
    name: &str,
    document_type: DocumentType,
    template: &DocumentTemplate,
    glossary: &[GlossaryTerm],
    excerpt: &str,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a legal document analysis assistant. Analyze the following legal document and provide a comprehensive analysis.\n\n",
    );
    let _ = writeln!(prompt, "Document: {name}");
    let _ = writeln!(prompt, "Type: {document_type}");
    let _ = writeln!(prompt, "\nAs a {}, pay special attention to:", template.name.to_lowercase());
    push_list(&mut prompt, "Common clauses", template.common_clauses);
    push_list(&mut prompt, "Red flags", template.red_flags);
    push_list(&mut prompt, "Key questions", template.key_questions);

    if !glossary.is_empty() {
        prompt.push_str("\nTerms detected in the text that deserve a plain-language explanation:\n");
        for term in glossary {
            let _ = writeln!(prompt, "- {} ({})", term.term, tier_label(term.tier));
        }
    }

    let _ = writeln!(prompt, "\nContent: {excerpt}\n");
    prompt.push_str(JSON_ONLY);
    let _ = write!(
        prompt,
        r#"

Required JSON structure:
{{
  "summary": "A 2-3 sentence summary of what this document is about",
  "documentType": "{document_type}",
  "keyPoints": ["5-7 most important points from the document"],
  "simplifiedClauses": [
    {{
      "original": "Original complex clause text",
      "simplified": "Clear, simple explanation",
      "importance": "high",
      "category": "payment"
    }}
  ],
  "recommendations": ["3-5 actionable recommendations for the reader"],
  "redFlags": ["Any concerning or unusual clauses"],
  "nextSteps": ["What the reader should do next"]
}}

Keep the language accessible to non-lawyers while staying legally accurate. Respond with valid JSON only.
"#
    );
    prompt
}

pub(crate) fn chat_prompt(
    question: &str,
    analysis: &DocumentAnalysis,
    excerpt: &str,
) -> Result<String, serde_json::Error> {
    let analysis_json = serde_json::to_string_pretty(analysis)?;
    Ok(format!(
        r#"You are an expert legal assistant specializing in document analysis. Answer the user's question based on the provided document analysis and text.

DOCUMENT ANALYSIS:
{analysis_json}

ORIGINAL DOCUMENT TEXT:
{excerpt}

USER QUESTION: {question}

INSTRUCTIONS:
1. Provide a clear, accurate answer based on the document content
2. Reference specific sections or clauses when possible
3. If the question cannot be answered from the document, explain why
4. Suggest relevant follow-up questions
5. Rate your confidence in the answer

{JSON_ONLY}

Required JSON structure:
{{
  "answer": "Detailed, helpful answer with specific references",
  "confidence": "high|medium|low",
  "sources": ["Clauses or sections referenced"],
  "followUpQuestions": ["2-3 related questions"],
  "keyInsights": ["Important insights or warnings related to the question"]
}}

Respond with valid JSON only.
"#
    ))
}

pub(crate) fn plain_chat_prompt(question: &str, excerpt: &str) -> String {
    format!(
        "Answer this question about the legal document: \"{question}\"\n\nDocument context: {excerpt}\n\nProvide a helpful answer in plain text (no JSON formatting needed).\n"
    )
}

pub(crate) fn comparison_prompt(
    doc1: &DocumentAnalysis,
    doc2: &DocumentAnalysis,
) -> Result<String, serde_json::Error> {
    let doc1 = serde_json::to_string_pretty(doc1)?;
    let doc2 = serde_json::to_string_pretty(doc2)?;
    Ok(format!(
        r#"You are a legal document comparison expert. Analyze differences between documents objectively.

Compare these two legal document analyses and highlight key differences:

Document 1: {doc1}
Document 2: {doc2}

{JSON_ONLY}

Required JSON structure:
{{
  "summary": "Brief comparison summary",
  "keyDifferences": [
    {{
      "aspect": "What aspect differs",
      "doc1": "Document 1 details",
      "doc2": "Document 2 details",
      "impact": "What this difference means"
    }}
  ],
  "recommendations": ["Which document is better and why"]
}}
"#
    ))
}

fn push_list(prompt: &mut String, heading: &str, items: &[&str]) {
    let _ = writeln!(prompt, "{heading}:");
    for item in items {
        let _ = writeln!(prompt, "- {item}");
    }
}

fn tier_label(tier: TermTier) -> &'static str {
    match tier {
        TermTier::High => "high risk",
        TermTier::Medium => "medium risk",
        TermTier::Low => "low risk",
        TermTier::Liability => "liability",
    }
}
