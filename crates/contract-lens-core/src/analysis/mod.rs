use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{fallback::Tier, risk::RiskAssessment, templates::Completeness};

pub mod orchestrator;
pub(crate) mod prompt;

pub use orchestrator::Analyzer;

/// Contract family recognised by keyword voting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    RentalAgreement,
    LoanContract,
    TermsOfService,
    EmploymentContract,
    PurchaseAgreement,
    /// No keyword matched.
    GeneralContract,
}

/// Voting table in declaration order; earlier entries win ties.
const TYPE_KEYWORDS: [(DocumentType, &[&str]); 5] = [
    (DocumentType::RentalAgreement, &["lease", "tenant", "landlord"]),
    (DocumentType::LoanContract, &["loan", "borrower", "lender"]),
    (
        DocumentType::TermsOfService,
        &["terms of service", "user agreement"],
    ),
    (
        DocumentType::EmploymentContract,
        &["employment", "employee", "salary"],
    ),
    (DocumentType::PurchaseAgreement, &["purchase", "buyer", "seller"]),
];

impl DocumentType {
    pub const ALL: [DocumentType; 6] = [
        DocumentType::RentalAgreement,
        DocumentType::LoanContract,
        DocumentType::TermsOfService,
        DocumentType::EmploymentContract,
        DocumentType::PurchaseAgreement,
        DocumentType::GeneralContract,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::RentalAgreement => "rental-agreement",
            DocumentType::LoanContract => "loan-contract",
            DocumentType::TermsOfService => "terms-of-service",
            DocumentType::EmploymentContract => "employment-contract",
            DocumentType::PurchaseAgreement => "purchase-agreement",
            DocumentType::GeneralContract => "general-contract",
        }
    }

    /// Parse a kebab-case label. `unknown` maps to the general type.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        if label == "unknown" {
            return Some(DocumentType::GeneralContract);
        }
        Self::ALL.into_iter().find(|ty| ty.as_str() == label)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Count distinct keywords of each type present in `text`; the highest count
/// wins, earlier types win ties, and no votes at all yields
/// [`DocumentType::GeneralContract`].
pub fn classify_document_type(text: &str) -> DocumentType {
    let lowered = text.to_lowercase();
    let mut best = (DocumentType::GeneralContract, 0usize);
    for (ty, keywords) in TYPE_KEYWORDS {
        let votes = keywords
            .iter()
            .filter(|keyword| lowered.contains(*keyword))
            .count();
        if votes > best.1 {
            best = (ty, votes);
        }
    }
    best.0
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplifiedClause {
    pub original: String,
    pub simplified: String,
    pub importance: String,
    pub category: String,
}

/// Plain-language analysis of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysis {
    pub summary: String,
    pub document_type: DocumentType,
    pub key_points: Vec<String>,
    pub simplified_clauses: Vec<SimplifiedClause>,
    pub recommendations: Vec<String>,
    /// Concerns reported by the model, distinct from the rule-based red flags.
    pub red_flags: Vec<String>,
    pub next_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    pub risk_assessment: RiskAssessment,
    /// Local check of the document type's common clauses, independent of the tier.
    pub completeness: Completeness,
    pub tier: Tier,
}

/// Shape the model is asked to return. Only `summary` is mandatory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnalysisPayload {
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub simplified_clauses: Vec<SimplifiedClause>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

/// Limits applied while building prompts and fallback records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Characters of document text embedded in the analysis prompt.
    pub excerpt_chars: usize,
    pub chat_excerpt_chars: usize,
    /// Characters of document text in the plain-text chat prompt.
    pub salvage_excerpt_chars: usize,
    /// Characters of raw model text kept as the salvaged summary.
    pub summary_chars: usize,
    pub backend_timeout: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            excerpt_chars: 8000,
            chat_excerpt_chars: 6000,
            salvage_excerpt_chars: 2000,
            summary_chars: 200,
            backend_timeout: Duration::from_secs(60),
        }
    }
}

/// Leading `max_chars` characters of `text`, cut on a char boundary.
pub(crate) fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
