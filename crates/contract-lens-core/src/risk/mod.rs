use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

pub mod aggregator;
pub mod assessor;
pub mod red_flags;
/// Static signal tables and their compiled matchers.
pub mod taxonomy;

/// Score thresholds that map a category score into a risk level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LevelThresholds {
    pub medium: u32,
    pub high: u32,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self { medium: 2, high: 5 }
    }
}

/// Thresholds for the overall verdict. Either the summed category score or
/// the red-flag count crossing a bound is enough to escalate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OverallThresholds {
    pub medium_score: u32,
    pub high_score: u32,
    pub medium_red_flags: usize,
    pub high_red_flags: usize,
}

impl Default for OverallThresholds {
    fn default() -> Self {
        Self {
            medium_score: 5,
            high_score: 10,
            medium_red_flags: 1,
            high_red_flags: 3,
        }
    }
}

/// The fixed dimensions a document is scored along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Financial,
    Legal,
    Operational,
    Privacy,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 4] = [
        RiskCategory::Financial,
        RiskCategory::Legal,
        RiskCategory::Operational,
        RiskCategory::Privacy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Financial => "financial",
            RiskCategory::Legal => "legal",
            RiskCategory::Operational => "operational",
            RiskCategory::Privacy => "privacy",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Ordered severity buckets. `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Map a category score into a level using the default thresholds.
    pub fn from_score(score: u32) -> Self {
        Self::from_score_with_thresholds(score, &LevelThresholds::default())
    }

    pub fn from_score_with_thresholds(score: u32, thresholds: &LevelThresholds) -> Self {
        if score >= thresholds.high {
            Self::High
        } else if score >= thresholds.medium {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Numeric rank used when comparing two documents (low = 1).
    pub fn rank(&self) -> u8 {
        match self {
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A signal that fired while scanning one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub term: String,
    pub severity: RiskLevel,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
}

/// Score, level and findings for a single category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAssessment {
    pub level: RiskLevel,
    pub score: u32,
    pub findings: Vec<Finding>,
}

impl CategoryAssessment {
    pub fn from_findings(score: u32, findings: Vec<Finding>) -> Self {
        Self {
            level: RiskLevel::from_score(score),
            score,
            findings,
        }
    }

    pub fn empty() -> Self {
        Self::from_findings(0, Vec::new())
    }
}

/// High-severity pattern hit, tracked apart from category scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedFlag {
    pub severity: RiskLevel,
    pub description: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskRecommendation {
    pub priority: Priority,
    pub category: String,
    #[serde(rename = "recommendation")]
    pub text: String,
    pub reason: String,
}

/// Complete risk verdict for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub overall: RiskLevel,
    pub categories: BTreeMap<RiskCategory, CategoryAssessment>,
    pub red_flags: Vec<RedFlag>,
    pub recommendations: Vec<RiskRecommendation>,
}

impl RiskAssessment {
    pub fn category(&self, category: RiskCategory) -> Option<&CategoryAssessment> {
        self.categories.get(&category)
    }

    /// Level of a category, treating a missing entry as low.
    pub fn level_of(&self, category: RiskCategory) -> RiskLevel {
        self.category(category)
            .map(|assessment| assessment.level)
            .unwrap_or(RiskLevel::Low)
    }

    pub fn score_of(&self, category: RiskCategory) -> u32 {
        self.category(category)
            .map(|assessment| assessment.score)
            .unwrap_or(0)
    }

    pub fn total_score(&self) -> u32 {
        self.categories.values().map(|c| c.score).sum()
    }
}

pub use aggregator::RiskAggregator;
pub use taxonomy::{CompiledTaxonomy, Taxonomy, TaxonomyError};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn level_thresholds_match_contract() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(1), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(2), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(4), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(5), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(40), RiskLevel::High);
    }

    #[test]
    fn levels_are_ordered() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert_eq!(RiskLevel::High.rank(), 3);
    }

    #[test]
    fn levels_serialize_lowercase() {
        let value = serde_json::to_value(RiskLevel::Medium).unwrap();
        assert_eq!(value, serde_json::json!("medium"));
        let category = serde_json::to_value(RiskCategory::Operational).unwrap();
        assert_eq!(category, serde_json::json!("operational"));
    }

    #[test]
    fn recommendation_serializes_text_as_recommendation() {
        let rec = RiskRecommendation {
            priority: Priority::High,
            category: "general".into(),
            text: "Read it".into(),
            reason: "Binding".into(),
        };
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["recommendation"], "Read it");
        assert_eq!(value["priority"], "high");
    }

    proptest! {
        #[test]
        fn level_is_monotonic_in_score(a in 0u32..200, b in 0u32..200) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(RiskLevel::from_score(low) <= RiskLevel::from_score(high));
        }
    }
}
