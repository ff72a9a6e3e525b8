pub mod analysis;
pub mod chat;
pub mod compare;
pub mod extract;
pub mod fallback;
pub mod llm;
pub mod normalize;
pub mod report;
pub mod risk;
pub mod templates;

pub use analysis::{
    classify_document_type, AnalysisConfig, Analyzer, DocumentAnalysis, DocumentType,
    SimplifiedClause,
};
pub use chat::{ChatAnswer, Confidence};
pub use compare::{
    Comparison, ComparisonReport, ComparisonResult, KeyDifference, RiskComparison, Winner,
};
pub use extract::{extract_text, DocumentFormat, ExtractionError, MAX_DOCUMENT_BYTES};
pub use fallback::{Tier, TierFailure};
pub use llm::{backend_from_settings, GenerativeBackend, LlmSettings, OfflineBackend, ProviderKind};
pub use normalize::{normalize, parse_payload, ParseFailure};
pub use report::{render_report, HumanReport, OutputFormat};
pub use risk::{
    CategoryAssessment, Finding, RedFlag, RiskAggregator, RiskAssessment, RiskCategory, RiskLevel,
    RiskRecommendation,
};
pub use templates::{template_for, Completeness, DocumentTemplate};
