//! Side-by-side comparison of two documents.
//!
//! Both analyses run concurrently. The risk comparison is computed locally
//! from the two assessments; only the narrative comparison needs the backend,
//! and it degrades to a fixed record without affecting the analyses.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    analysis::{orchestrator::strings, prompt, Analyzer, DocumentAnalysis},
    fallback::{run_tiers, Attempt, Tier, TierFailure},
    normalize::parse_payload,
    risk::{RiskAssessment, RiskCategory, RiskLevel},
};

/// Which side of a comparison is preferable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Doc1,
    Doc2,
    Similar,
}

impl Winner {
    /// Lower risk wins; equal levels are similar.
    pub fn by_level(doc1: RiskLevel, doc2: RiskLevel) -> Self {
        match doc1.cmp(&doc2) {
            std::cmp::Ordering::Less => Winner::Doc1,
            std::cmp::Ordering::Greater => Winner::Doc2,
            std::cmp::Ordering::Equal => Winner::Similar,
        }
    }

    /// Overall verdict: a low-risk document is the safer one, doc1 first.
    /// Without a low-risk side the documents count as similar.
    pub fn safer_overall(doc1: RiskLevel, doc2: RiskLevel) -> Self {
        if doc1 == RiskLevel::Low {
            Winner::Doc1
        } else if doc2 == RiskLevel::Low {
            Winner::Doc2
        } else {
            Winner::Similar
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallComparison {
    pub doc1: RiskLevel,
    pub doc2: RiskLevel,
    pub safer: Winner,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryComparison {
    pub category: RiskCategory,
    pub doc1: RiskLevel,
    pub doc2: RiskLevel,
    pub winner: Winner,
    /// Distance between the two levels, 0 to 2.
    pub difference: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskComparison {
    pub overall: OverallComparison,
    pub categories: Vec<CategoryComparison>,
    pub overall_winner: Winner,
}

impl RiskComparison {
    pub fn between(doc1: &RiskAssessment, doc2: &RiskAssessment) -> Self {
        let categories: Vec<CategoryComparison> = RiskCategory::ALL
            .into_iter()
            .map(|category| {
                let (a, b) = (doc1.level_of(category), doc2.level_of(category));
                CategoryComparison {
                    category,
                    doc1: a,
                    doc2: b,
                    winner: Winner::by_level(a, b),
                    difference: a.rank().abs_diff(b.rank()),
                }
            })
            .collect();

        Self {
            overall: OverallComparison {
                doc1: doc1.overall,
                doc2: doc2.overall,
                safer: Winner::safer_overall(doc1.overall, doc2.overall),
            },
            overall_winner: majority(&categories),
            categories,
        }
    }
}

/// Most frequent category winner; ties resolve to doc1, then doc2, then similar.
fn majority(categories: &[CategoryComparison]) -> Winner {
    let count = |winner: Winner| categories.iter().filter(|c| c.winner == winner).count();
    let mut best = (Winner::Doc1, count(Winner::Doc1));
    for candidate in [Winner::Doc2, Winner::Similar] {
        let votes = count(candidate);
        if votes > best.1 {
            best = (candidate, votes);
        }
    }
    best.0
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyDifference {
    pub aspect: String,
    pub doc1: String,
    pub doc2: String,
    pub impact: String,
}

/// Narrative comparison produced by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub summary: String,
    #[serde(default)]
    pub key_differences: Vec<KeyDifference>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl Comparison {
    fn degraded() -> Self {
        Self {
            summary: "Unable to compare documents at this time".into(),
            key_differences: Vec::new(),
            recommendations: strings(&["Please review both documents carefully"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparedDocument {
    pub name: String,
    pub analysis: DocumentAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparedDocuments {
    pub doc1: ComparedDocument,
    pub doc2: ComparedDocument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub documents: ComparedDocuments,
    pub comparison: Comparison,
    pub risk_comparison: RiskComparison,
}

impl Analyzer {
    #[instrument(skip(self, text_a, text_b), fields(backend = self.backend_name()))]
    pub async fn compare_documents(
        &self,
        text_a: &str,
        name_a: &str,
        text_b: &str,
        name_b: &str,
    ) -> ComparisonResult {
        let (doc1, doc2) = tokio::join!(
            self.analyze(text_a, name_a),
            self.analyze(text_b, name_b)
        );
        let risk_comparison = RiskComparison::between(&doc1.risk_assessment, &doc2.risk_assessment);

        let attempts = vec![Attempt::backend(Tier::Structured, async {
            let prompt = prompt::comparison_prompt(&doc1, &doc2)?;
            let raw = self.call_backend(&prompt).await?;
            let comparison: Comparison = parse_payload(&raw)?;
            Ok::<_, TierFailure>(comparison)
        })];
        let comparison = run_tiers("compare_documents", attempts, Comparison::degraded).await;

        ComparisonResult {
            documents: ComparedDocuments {
                doc1: ComparedDocument {
                    name: name_a.to_string(),
                    analysis: doc1,
                },
                doc2: ComparedDocument {
                    name: name_b.to_string(),
                    analysis: doc2,
                },
            },
            comparison,
            risk_comparison,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyFinding {
    pub aspect: String,
    pub impact: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactComparison {
    pub doc1_risk: RiskLevel,
    pub doc2_risk: RiskLevel,
    pub recommendation: String,
}

/// Reader-facing digest of a [`ComparisonResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub summary: String,
    pub key_findings: Vec<KeyFinding>,
    pub recommendations: Vec<String>,
    pub risk_analysis: RiskComparison,
    pub financial_impact: ImpactComparison,
    pub legal_implications: ImpactComparison,
}

impl ComparisonReport {
    pub fn from_result(result: &ComparisonResult) -> Self {
        let doc1 = &result.documents.doc1.analysis.risk_assessment;
        let doc2 = &result.documents.doc2.analysis.risk_assessment;

        Self {
            summary: result.comparison.summary.clone(),
            key_findings: result
                .comparison
                .key_differences
                .iter()
                .map(|diff| KeyFinding {
                    aspect: diff.aspect.clone(),
                    impact: diff.impact.clone(),
                    recommendation: recommendation_for_impact(&diff.impact).to_string(),
                })
                .collect(),
            recommendations: result.comparison.recommendations.clone(),
            risk_analysis: result.risk_comparison.clone(),
            financial_impact: impact(
                doc1,
                doc2,
                RiskCategory::Financial,
                [
                    "Document 1 has lower financial risk",
                    "Document 2 has lower financial risk",
                    "Both documents have similar financial risk levels",
                ],
            ),
            legal_implications: impact(
                doc1,
                doc2,
                RiskCategory::Legal,
                [
                    "Document 1 has fewer legal restrictions",
                    "Document 2 has fewer legal restrictions",
                    "Both documents have similar legal implications",
                ],
            ),
        }
    }
}

/// Compare one category by raw score. `messages` is doc1-better, doc2-better, even.
fn impact(
    doc1: &RiskAssessment,
    doc2: &RiskAssessment,
    category: RiskCategory,
    messages: [&str; 3],
) -> ImpactComparison {
    let (a, b) = (doc1.score_of(category), doc2.score_of(category));
    let message = match a.cmp(&b) {
        std::cmp::Ordering::Less => messages[0],
        std::cmp::Ordering::Greater => messages[1],
        std::cmp::Ordering::Equal => messages[2],
    };
    ImpactComparison {
        doc1_risk: doc1.level_of(category),
        doc2_risk: doc2.level_of(category),
        recommendation: message.to_string(),
    }
}

fn recommendation_for_impact(impact: &str) -> &'static str {
    let impact = impact.to_lowercase();
    // "disadvantage" contains "advantage", so negatives are checked first.
    if impact.contains("worse") || impact.contains("disadvantage") {
        "This may be a concern - review carefully"
    } else if impact.contains("better") || impact.contains("advantage") {
        "Consider this as a positive factor in your decision"
    } else {
        "Evaluate based on your specific needs and circumstances"
    }
}
