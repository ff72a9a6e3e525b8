use std::fmt::{self, Write};

use serde::Serialize;

use crate::{
    analysis::DocumentAnalysis,
    chat::ChatAnswer,
    compare::{ComparisonReport, ComparisonResult, Winner},
    risk::RiskAssessment,
    templates::DocumentTemplate,
};

/// Format styles supported in default reporter implementations.
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Plain-text rendering for terminals.
pub trait HumanReport {
    fn write_human(&self, out: &mut String) -> fmt::Result;
}

/// Produce a report string from any record using the desired format.
pub fn render_report<T>(value: &T, format: OutputFormat) -> anyhow::Result<String>
where
    T: HumanReport + Serialize + ?Sized,
{
    match format {
        OutputFormat::Human => {
            let mut out = String::new();
            value.write_human(&mut out)?;
            Ok(out)
        }
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
    }
}

impl HumanReport for RiskAssessment {
    fn write_human(&self, out: &mut String) -> fmt::Result {
        writeln!(
            out,
            "Overall Risk: {} (total score {})",
            self.overall,
            self.total_score()
        )?;
        writeln!(out)?;
        writeln!(out, "Categories:")?;
        for (category, assessment) in &self.categories {
            writeln!(
                out,
                "  - {category:>11}: {level} (score {score})",
                level = assessment.level,
                score = assessment.score
            )?;
            for finding in &assessment.findings {
                writeln!(out, "      * {}: {}", finding.term, finding.description)?;
            }
        }

        writeln!(out)?;
        if self.red_flags.is_empty() {
            writeln!(out, "No red flags detected.")?;
        } else {
            writeln!(out, "Red Flags:")?;
            for flag in &self.red_flags {
                writeln!(out, "  - {} ({})", flag.description, flag.recommendation)?;
            }
        }

        writeln!(out)?;
        writeln!(out, "Recommendations:")?;
        for rec in &self.recommendations {
            let priority = match rec.priority {
                crate::risk::Priority::High => "high",
                crate::risk::Priority::Medium => "medium",
            };
            writeln!(out, "  - [{priority}] {}", rec.text)?;
            writeln!(out, "    {}", rec.reason)?;
        }
        Ok(())
    }
}

impl HumanReport for DocumentAnalysis {
    fn write_human(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "Document Type: {}", self.document_type)?;
        writeln!(out, "Analysis Tier: {}", self.tier)?;
        writeln!(out)?;
        writeln!(out, "Summary:")?;
        writeln!(out, "  {}", single_line(&self.summary))?;

        write_list(out, "Key Points", &self.key_points)?;
        if !self.simplified_clauses.is_empty() {
            writeln!(out)?;
            writeln!(out, "Simplified Clauses:")?;
            for clause in &self.simplified_clauses {
                writeln!(
                    out,
                    "  - [{}] \"{}\"",
                    clause.importance,
                    single_line(&clause.original)
                )?;
                writeln!(out, "    {}", single_line(&clause.simplified))?;
            }
        }
        write_list(out, "Recommendations", &self.recommendations)?;
        write_list(out, "Concerns Noted", &self.red_flags)?;
        write_list(out, "Next Steps", &self.next_steps)?;

        writeln!(out)?;
        writeln!(
            out,
            "Clause Coverage: {:.0}% ({})",
            self.completeness.percent, self.completeness.recommendation
        )?;
        write_list(out, "Possibly Missing", &self.completeness.missing)?;

        writeln!(out)?;
        self.risk_assessment.write_human(out)
    }
}

impl HumanReport for ChatAnswer {
    fn write_human(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "{}", self.answer.trim())?;
        writeln!(out)?;
        writeln!(out, "Confidence: {:?}", self.confidence)?;
        if let Some(context) = &self.risk_context {
            writeln!(out, "{context}")?;
        }
        write_list(out, "Sources", &self.sources)?;
        write_list(out, "Key Insights", &self.key_insights)?;
        write_list(out, "Follow-up Questions", &self.follow_up_questions)
    }
}

impl HumanReport for ComparisonResult {
    fn write_human(&self, out: &mut String) -> fmt::Result {
        let report = ComparisonReport::from_result(self);
        let label = |winner: Winner| match winner {
            Winner::Doc1 => self.documents.doc1.name.as_str(),
            Winner::Doc2 => self.documents.doc2.name.as_str(),
            Winner::Similar => "similar",
        };

        writeln!(
            out,
            "Comparing {} (doc1) with {} (doc2)",
            self.documents.doc1.name, self.documents.doc2.name
        )?;
        writeln!(out)?;
        writeln!(out, "Summary:")?;
        writeln!(out, "  {}", single_line(&report.summary))?;

        let risk = &report.risk_analysis;
        writeln!(out)?;
        writeln!(
            out,
            "Overall Risk: doc1 {} • doc2 {} • safer: {}",
            risk.overall.doc1,
            risk.overall.doc2,
            label(risk.overall.safer)
        )?;
        for row in &risk.categories {
            writeln!(
                out,
                "  - {:>11}: {} vs {} -> {}",
                row.category,
                row.doc1,
                row.doc2,
                label(row.winner)
            )?;
        }
        writeln!(out, "Category winner: {}", label(risk.overall_winner))?;
        writeln!(out, "Financial: {}", report.financial_impact.recommendation)?;
        writeln!(out, "Legal: {}", report.legal_implications.recommendation)?;

        if !report.key_findings.is_empty() {
            writeln!(out)?;
            writeln!(out, "Key Differences:")?;
            for finding in &report.key_findings {
                writeln!(out, "  - {}: {}", finding.aspect, single_line(&finding.impact))?;
                writeln!(out, "    {}", finding.recommendation)?;
            }
        }
        write_list(out, "Recommendations", &report.recommendations)
    }
}

impl HumanReport for [DocumentTemplate] {
    fn write_human(&self, out: &mut String) -> fmt::Result {
        for template in self {
            writeln!(
                out,
                "{} ({}): {}",
                template.name, template.id, template.description
            )?;
            for question in template.key_questions {
                writeln!(out, "  ? {question}")?;
            }
        }
        Ok(())
    }
}

fn write_list(out: &mut String, heading: &str, items: &[String]) -> fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "{heading}:")?;
    for item in items {
        writeln!(out, "  - {}", single_line(item))?;
    }
    Ok(())
}

fn single_line(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{risk::RiskAggregator, templates};

    fn sample_assessment() -> RiskAssessment {
        RiskAggregator::new().assess(
            "Disputes go to binding arbitration. The customer shall indemnify the vendor.",
        )
    }

    #[test]
    fn human_risk_report_lists_categories_and_flags() {
        let output = render_report(&sample_assessment(), OutputFormat::Human).unwrap();
        assert!(output.contains("Overall Risk: medium (total score 6)"));
        assert!(output.contains("legal: high (score 6)"));
        assert!(output.contains("Mandatory arbitration clause"));
        assert!(output.contains("[high] Read the entire document carefully before signing"));
    }

    #[test]
    fn json_risk_report_uses_wire_names() {
        let output = render_report(&sample_assessment(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["overall"], "medium");
        assert!(value["redFlags"].is_array());
        assert_eq!(value["categories"]["legal"]["score"], 6);
    }

    #[test]
    fn template_listing_renders_every_template() {
        let output = render_report(templates::all(), OutputFormat::Human).unwrap();
        assert!(output.contains("Rental Agreement (rental-agreement)"));
        assert!(output.contains("General Contract (general-contract)"));
    }

    #[tokio::test]
    async fn human_analysis_shows_clause_coverage() {
        let analysis = crate::Analyzer::offline()
            .analyze("The tenant pays rent under this lease.", "lease.txt")
            .await;
        let output = render_report(&analysis, OutputFormat::Human).unwrap();
        assert!(output.contains("Clause Coverage: 25% (Document may be missing important clauses)"));
        assert!(output.contains("Possibly Missing:\n  - Security deposit terms"));
        assert!(output.contains("  - Review all rental agreement clauses carefully"));
    }

    #[test]
    fn single_line_strips_newlines() {
        assert_eq!(single_line("a\nb\r\nc"), "a b  c");
    }
}
