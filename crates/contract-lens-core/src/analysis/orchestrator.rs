use std::sync::Arc;

use anyhow::anyhow;
use tokio::time::timeout;
use tracing::{debug, instrument};

use super::{
    classify_document_type, excerpt, prompt, AnalysisConfig, AnalysisPayload, DocumentAnalysis,
    DocumentType, SimplifiedClause,
};
use crate::{
    fallback::{run_tiers, Attempt, Tier, TierFailure},
    llm::{GenerativeBackend, OfflineBackend},
    normalize::parse_payload,
    risk::{RiskAggregator, RiskAssessment},
    templates::{completeness, recommendations_for, template_for, Completeness},
};

/// Entry point for analysis, question answering and comparison.
///
/// Every public operation returns a record; backend and parse failures are
/// absorbed by degrading to a weaker tier.
#[derive(Clone)]
pub struct Analyzer {
    backend: Arc<dyn GenerativeBackend>,
    risk: RiskAggregator,
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self {
            backend,
            risk: RiskAggregator::new(),
            config: AnalysisConfig::default(),
        }
    }

    /// Analyzer that never contacts a backend.
    pub fn offline() -> Self {
        Self::new(Arc::new(OfflineBackend))
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_risk_aggregator(mut self, risk: RiskAggregator) -> Self {
        self.risk = risk;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Rule-based risk verdict for `text`. Never fails.
    pub fn assess_risks(&self, text: &str) -> RiskAssessment {
        self.risk.assess(text)
    }

    #[instrument(skip(self, text), fields(backend = self.backend.name(), text_len = text.len()))]
    pub async fn analyze(&self, text: &str, name: &str) -> DocumentAnalysis {
        let document_type = classify_document_type(text);
        let glossary = self
            .risk
            .taxonomy()
            .map(|taxonomy| taxonomy.glossary_hits(text))
            .unwrap_or_default();
        let prompt = prompt::analysis_prompt(
            name,
            document_type,
            template_for(document_type),
            &glossary,
            excerpt(text, self.config.excerpt_chars),
        );
        let risk = self.assess_risks(text);
        let coverage = completeness(document_type, text);
        debug!(
            %document_type,
            overall = %risk.overall,
            coverage = coverage.percent,
            "prepared analysis request"
        );

        let attempts = vec![
            Attempt::backend(Tier::Structured, async {
                let raw = self.call_backend(&prompt).await?;
                let payload: AnalysisPayload = parse_payload(&raw)?;
                Ok::<_, TierFailure>(structured_analysis(
                    payload,
                    document_type,
                    risk.clone(),
                    coverage.clone(),
                ))
            }),
            Attempt::backend(Tier::TextSalvage, async {
                let raw = self.call_backend(&prompt).await?;
                Ok::<_, TierFailure>(self.salvaged_analysis(
                    raw,
                    document_type,
                    risk.clone(),
                    coverage.clone(),
                ))
            }),
        ];

        run_tiers("analyze", attempts, || {
            offline_analysis(text, name, document_type, risk.clone(), coverage.clone())
        })
        .await
    }

    /// One bounded backend call; a timeout counts as a backend failure.
    pub(crate) async fn call_backend(&self, prompt: &str) -> Result<String, TierFailure> {
        let limit = self.config.backend_timeout;
        match timeout(limit, self.backend.generate(prompt)).await {
            Ok(Ok(raw)) => {
                debug!(
                    backend = self.backend.name(),
                    raw_len = raw.len(),
                    "received backend response"
                );
                Ok(raw)
            }
            Ok(Err(err)) => Err(TierFailure::Backend(err)),
            Err(_) => Err(TierFailure::Backend(anyhow!(
                "{} backend timed out after {:?}",
                self.backend.name(),
                limit
            ))),
        }
    }

    fn salvaged_analysis(
        &self,
        raw: String,
        document_type: DocumentType,
        risk_assessment: RiskAssessment,
        completeness: Completeness,
    ) -> DocumentAnalysis {
        let mut recommendations = recommendations_for(document_type, risk_assessment.overall);
        recommendations.extend(strings(&[
            "Review the analysis above",
            "Ask specific questions about the clauses that concern you",
            "Consider getting legal advice before signing",
            "Keep a copy for your records",
        ]));
        DocumentAnalysis {
            summary: format!("{}...", excerpt(&raw, self.config.summary_chars)),
            document_type,
            key_points: strings(&[
                "The model returned a text-only analysis",
                "Review the summary above for key information",
                "Consider consulting with a legal professional",
                "Pay attention to dates, amounts, and obligations",
            ]),
            simplified_clauses: vec![SimplifiedClause {
                original: "Text-only analysis".into(),
                simplified: format!("{}...", excerpt(&raw, 100)),
                importance: "medium".into(),
                category: "analysis".into(),
            }],
            recommendations,
            red_flags: Vec::new(),
            next_steps: strings(&[
                "Review the analysis provided",
                "Ask follow-up questions about specific clauses",
                "Consider professional legal review",
            ]),
            raw_response: Some(raw),
            risk_assessment,
            completeness,
            tier: Tier::TextSalvage,
        }
    }
}

fn structured_analysis(
    payload: AnalysisPayload,
    document_type: DocumentType,
    risk_assessment: RiskAssessment,
    completeness: Completeness,
) -> DocumentAnalysis {
    DocumentAnalysis {
        summary: payload.summary,
        document_type,
        key_points: payload.key_points,
        simplified_clauses: payload.simplified_clauses,
        recommendations: payload.recommendations,
        red_flags: payload.red_flags,
        next_steps: payload.next_steps,
        raw_response: None,
        risk_assessment,
        completeness,
        tier: Tier::Structured,
    }
}

/// Record built from local text statistics only.
fn offline_analysis(
    text: &str,
    name: &str,
    document_type: DocumentType,
    risk_assessment: RiskAssessment,
    completeness: Completeness,
) -> DocumentAnalysis {
    let mut recommendations = recommendations_for(document_type, risk_assessment.overall);
    recommendations.extend(strings(&[
        "Read the entire document carefully",
        "Ask questions about any unclear sections",
        "Consider getting legal advice before signing",
        "Keep a copy for your records",
    ]));
    let words = text.split_whitespace().count();
    let sentences = text
        .split(['.', '!', '?'])
        .filter(|sentence| !sentence.trim().is_empty())
        .count();

    DocumentAnalysis {
        summary: format!(
            "This appears to be a legal document ({name}) with approximately {words} words and {sentences} sentences."
        ),
        document_type,
        key_points: strings(&[
            "Document contains legal language and terms",
            "Review all sections carefully before signing",
            "Consider consulting with a legal professional",
            "Pay attention to dates, amounts, and obligations",
            "Look for termination and cancellation clauses",
        ]),
        simplified_clauses: vec![SimplifiedClause {
            original: "Document contains complex legal language".into(),
            simplified:
                "This document uses formal legal terms that may be difficult to understand".into(),
            importance: "high".into(),
            category: "general".into(),
        }],
        recommendations,
        red_flags: Vec::new(),
        next_steps: strings(&[
            "Review the document thoroughly",
            "Seek clarification on unclear terms",
            "Consider professional legal review",
        ]),
        raw_response: None,
        risk_assessment,
        completeness,
        tier: Tier::Offline,
    }
}

pub(crate) fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::{collections::VecDeque, sync::Mutex, time::Duration};

    use anyhow::{bail, Result};
    use async_trait::async_trait;

    use crate::llm::GenerativeBackend;

    pub(crate) enum Reply {
        Text(String),
        Fail(&'static str),
        Hang,
    }

    /// Backend that replays a fixed script and records every prompt.
    pub(crate) struct ScriptedBackend {
        replies: Mutex<VecDeque<Reply>>,
        pub(crate) prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        pub(crate) fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GenerativeBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Text(text)) => Ok(text),
                Some(Reply::Fail(message)) => bail!("{message}"),
                Some(Reply::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    bail!("unreachable")
                }
                None => bail!("script exhausted"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{Reply, ScriptedBackend};
    use super::*;
    use crate::risk::RiskLevel;
    use std::time::Duration;

    const LEASE: &str = "This Lease Agreement is between the Landlord and the Tenant. \
        The tenant agrees to binding arbitration. A penalty of $500 applies to late rent!";

    fn analyzer(backend: &Arc<ScriptedBackend>) -> Analyzer {
        Analyzer::new(backend.clone())
    }

    #[tokio::test]
    async fn structured_tier_uses_model_payload() {
        let backend = Arc::new(ScriptedBackend::new(vec![Reply::Text(
            "```json\n{\"summary\": \"A residential lease.\", \"keyPoints\": [\"Rent is due monthly\"], \"redFlags\": [\"Penalty clause\"]}\n```"
                .into(),
        )]));
        let analysis = analyzer(&backend).analyze(LEASE, "lease.txt").await;

        assert_eq!(analysis.tier, Tier::Structured);
        assert_eq!(analysis.summary, "A residential lease.");
        assert_eq!(analysis.document_type, DocumentType::RentalAgreement);
        assert_eq!(analysis.key_points, vec!["Rent is due monthly".to_string()]);
        assert_eq!(analysis.red_flags, vec!["Penalty clause".to_string()]);
        assert!(analysis.raw_response.is_none());
        assert_eq!(analysis.risk_assessment, Analyzer::offline().assess_risks(LEASE));
        assert_eq!(backend.calls(), 1);

        let prompt = &backend.prompts.lock().unwrap()[0];
        assert!(prompt.contains("Type: rental-agreement"));
        assert!(prompt.contains("Document: lease.txt"));
    }

    #[tokio::test]
    async fn parse_failure_salvages_raw_text() {
        let prose = "This lease is fairly standard but includes an arbitration clause. ".repeat(5);
        let backend = Arc::new(ScriptedBackend::new(vec![
            Reply::Text("I could not produce JSON, sorry.".into()),
            Reply::Text(prose.clone()),
        ]));
        let analysis = analyzer(&backend).analyze(LEASE, "lease.txt").await;

        assert_eq!(analysis.tier, Tier::TextSalvage);
        assert_eq!(backend.calls(), 2);
        assert_eq!(analysis.summary, format!("{}...", &prose[..200]));
        assert_eq!(analysis.raw_response.as_deref(), Some(prose.as_str()));
        assert_eq!(analysis.key_points.len(), 4);
        assert_eq!(analysis.simplified_clauses[0].simplified, format!("{}...", &prose[..100]));
        // Same prompt both times.
        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts[0], prompts[1]);
    }

    #[tokio::test]
    async fn truncated_payload_is_salvaged_not_accepted() {
        let truncated = r#"{"summary":"A lease","simplifiedClauses":[{"original":"x","simplified":"y"},{"original":"z","simplified":"w"}],"recommendations":["Get advice"],"nextSteps":["Sign"#;
        let backend = Arc::new(ScriptedBackend::new(vec![
            Reply::Text(truncated.into()),
            Reply::Text(truncated.into()),
        ]));
        let analysis = analyzer(&backend).analyze(LEASE, "lease.txt").await;

        assert_eq!(analysis.tier, Tier::TextSalvage);
        assert_eq!(analysis.raw_response.as_deref(), Some(truncated));
        assert_ne!(analysis.summary, "A lease");
    }

    #[tokio::test]
    async fn empty_object_is_a_parse_failure() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Reply::Text("no braces at all".into()),
            Reply::Text("Plain text answer".into()),
        ]));
        let analysis = analyzer(&backend).analyze(LEASE, "lease.txt").await;
        assert_eq!(analysis.tier, Tier::TextSalvage);
        assert_eq!(analysis.summary, "Plain text answer...");
    }

    #[tokio::test]
    async fn backend_failure_goes_straight_offline() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Reply::Fail("quota exceeded"),
            Reply::Text("{\"summary\": \"never used\"}".into()),
        ]));
        let analysis = analyzer(&backend).analyze(LEASE, "lease.txt").await;

        assert_eq!(analysis.tier, Tier::Offline);
        assert_eq!(backend.calls(), 1);
        assert_eq!(
            analysis.summary,
            "This appears to be a legal document (lease.txt) with approximately 24 words and 3 sentences."
        );
        assert_eq!(analysis.key_points.len(), 5);
        assert_eq!(analysis.risk_assessment.overall, RiskLevel::Medium);
        assert_eq!(
            analysis.recommendations[..3],
            [
                "Review all rental agreement clauses carefully",
                "Take photos of the property condition before moving in",
                "Understand your rights regarding security deposit return",
            ]
        );
        assert_eq!(analysis.recommendations.len(), 7);
    }

    #[tokio::test]
    async fn salvage_tier_leads_with_template_advice() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Reply::Text("not json".into()),
            Reply::Text("The lease looks standard.".into()),
        ]));
        let analysis = analyzer(&backend).analyze(LEASE, "lease.txt").await;
        assert_eq!(analysis.tier, Tier::TextSalvage);
        assert_eq!(
            analysis.recommendations[0],
            "Review all rental agreement clauses carefully"
        );
        assert_eq!(analysis.recommendations.last().unwrap(), "Keep a copy for your records");
    }

    #[tokio::test]
    async fn high_risk_offline_analysis_escalates() {
        let text = "Binding arbitration applies. You accept a class action waiver. \
                    Liquidated damages apply.";
        let analysis = Analyzer::offline().analyze(text, "terms.txt").await;
        assert_eq!(analysis.risk_assessment.overall, RiskLevel::High);
        assert!(analysis.recommendations[1].contains("legal professional"));
    }

    #[tokio::test]
    async fn clause_coverage_is_reported_on_every_tier() {
        let structured = Arc::new(ScriptedBackend::new(vec![Reply::Text(
            "{\"summary\": \"A lease.\"}".into(),
        )]));
        let from_model = analyzer(&structured).analyze(LEASE, "lease.txt").await;
        let offline = Analyzer::offline().analyze(LEASE, "lease.txt").await;

        assert_eq!(from_model.tier, Tier::Structured);
        assert_eq!(from_model.completeness, offline.completeness);
        assert_eq!(
            offline.completeness.present,
            ["Rent amount and due date", "Lease term and renewal", "Late fees and penalties"]
        );
        assert!((offline.completeness.percent - 37.5).abs() < f64::EPSILON);
        // Model recommendations are passed through untouched.
        assert!(from_model.recommendations.is_empty());
    }

    #[tokio::test]
    async fn salvage_backend_failure_falls_to_offline() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Reply::Text("{ broken ::".into()),
            Reply::Fail("connection reset"),
        ]));
        let analysis = analyzer(&backend).analyze(LEASE, "lease.txt").await;
        assert_eq!(analysis.tier, Tier::Offline);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn timeout_counts_as_backend_failure() {
        let backend = Arc::new(ScriptedBackend::new(vec![Reply::Hang]));
        let config = AnalysisConfig {
            backend_timeout: Duration::from_millis(50),
            ..AnalysisConfig::default()
        };
        let analysis = analyzer(&backend)
            .with_config(config)
            .analyze("Simple agreement.", "simple.txt")
            .await;
        assert_eq!(analysis.tier, Tier::Offline);
        assert_eq!(analysis.document_type, DocumentType::GeneralContract);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn offline_analyzer_never_calls_out() {
        let analysis = Analyzer::offline()
            .analyze("This is a simple agreement with no special terms.", "simple.txt")
            .await;
        assert_eq!(analysis.tier, Tier::Offline);
        assert_eq!(analysis.risk_assessment.overall, RiskLevel::Low);
        assert_eq!(analysis.risk_assessment.recommendations.len(), 1);
    }

    #[tokio::test]
    async fn excerpt_is_bounded() {
        let backend = Arc::new(ScriptedBackend::new(vec![Reply::Text(
            "{\"summary\": \"ok\"}".into(),
        )]));
        let config = AnalysisConfig {
            excerpt_chars: 10,
            ..AnalysisConfig::default()
        };
        let text = format!("0123456789{}", "x".repeat(50));
        analyzer(&backend).with_config(config).analyze(&text, "doc").await;
        let prompt = &backend.prompts.lock().unwrap()[0];
        assert!(prompt.contains("Content: 0123456789\n"));
        assert!(!prompt.contains("0123456789x"));
    }
}
