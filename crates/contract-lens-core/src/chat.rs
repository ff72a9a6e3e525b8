use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    analysis::{excerpt, orchestrator::strings, prompt, Analyzer, DocumentAnalysis, DocumentType},
    fallback::{run_tiers, Attempt, Tier, TierFailure},
    normalize::parse_payload,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Lenient parse of a model-supplied label; anything unrecognised is medium.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => Confidence::High,
            "low" => Confidence::Low,
            _ => Confidence::Medium,
        }
    }
}

/// Answer to a follow-up question about an analysed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAnswer {
    pub answer: String,
    pub confidence: Confidence,
    pub sources: Vec<String>,
    pub follow_up_questions: Vec<String>,
    pub key_insights: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<DocumentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_context: Option<String>,
    pub tier: Tier,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatPayload {
    answer: String,
    #[serde(default)]
    confidence: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    follow_up_questions: Vec<String>,
    #[serde(default)]
    key_insights: Vec<String>,
}

impl Analyzer {
    #[instrument(skip(self, text, analysis), fields(backend = self.backend_name()))]
    pub async fn answer_question(
        &self,
        question: &str,
        text: &str,
        analysis: &DocumentAnalysis,
    ) -> ChatAnswer {
        let config = self.config();
        let chat_excerpt = excerpt(text, config.chat_excerpt_chars);
        let plain_prompt =
            prompt::plain_chat_prompt(question, excerpt(text, config.salvage_excerpt_chars));

        let attempts = vec![
            Attempt::backend(Tier::Structured, async {
                let prompt = prompt::chat_prompt(question, analysis, chat_excerpt)?;
                let raw = self.call_backend(&prompt).await?;
                let payload: ChatPayload = parse_payload(&raw)?;
                Ok::<_, TierFailure>(enrich(payload, analysis))
            }),
            Attempt::backend(Tier::TextSalvage, async {
                let raw = self.call_backend(&plain_prompt).await?;
                Ok::<_, TierFailure>(plain_answer(raw))
            }),
        ];

        run_tiers("answer_question", attempts, apology).await
    }
}

/// Attach document context to a structured answer.
fn enrich(payload: ChatPayload, analysis: &DocumentAnalysis) -> ChatAnswer {
    let mut follow_up_questions = payload.follow_up_questions;
    match analysis.document_type {
        DocumentType::RentalAgreement => follow_up_questions.extend(strings(&[
            "What are my rights as a tenant?",
            "What happens if I need to break the lease early?",
        ])),
        DocumentType::LoanContract => follow_up_questions.extend(strings(&[
            "What are the total costs of this loan?",
            "What happens if I miss a payment?",
        ])),
        _ => {}
    }

    let mut key_insights = payload.key_insights;
    if !analysis.key_points.is_empty() {
        key_insights.push("Review the key points section for important information".into());
    }
    if !analysis.recommendations.is_empty() {
        key_insights.push("Consider the recommendations provided in the analysis".into());
    }

    ChatAnswer {
        answer: payload.answer,
        confidence: payload
            .confidence
            .as_deref()
            .map(Confidence::from_label)
            .unwrap_or(Confidence::Medium),
        sources: payload.sources,
        follow_up_questions,
        key_insights,
        document_type: Some(analysis.document_type),
        risk_context: Some(format!(
            "This document has a {} risk level.",
            analysis.risk_assessment.overall
        )),
        tier: Tier::Structured,
    }
}

fn plain_answer(raw: String) -> ChatAnswer {
    ChatAnswer {
        answer: raw,
        confidence: Confidence::Medium,
        sources: strings(&["Document analysis"]),
        follow_up_questions: strings(&[
            "Can you explain this in more detail?",
            "What are the implications of this?",
            "Are there any risks I should know about?",
        ]),
        key_insights: strings(&["This response is based on document analysis"]),
        document_type: None,
        risk_context: None,
        tier: Tier::TextSalvage,
    }
}

fn apology() -> ChatAnswer {
    ChatAnswer {
        answer: "I'm sorry, I'm having trouble processing your question right now. \
                 Please try again later."
            .into(),
        confidence: Confidence::Low,
        sources: Vec::new(),
        follow_up_questions: strings(&[
            "Can you rephrase your question?",
            "Would you like me to explain a specific clause?",
            "Do you need help understanding any legal terms?",
        ]),
        key_insights: Vec::new(),
        document_type: None,
        risk_context: None,
        tier: Tier::Offline,
    }
}
