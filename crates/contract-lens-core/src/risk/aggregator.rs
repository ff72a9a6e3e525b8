use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, instrument, warn};

use super::{
    assessor::assess_hits,
    taxonomy::{self, CompiledTaxonomy, TaxonomyError},
    CategoryAssessment, OverallThresholds, Priority, RedFlag, RiskAssessment, RiskCategory,
    RiskLevel, RiskRecommendation,
};

/// Runs every category assessor plus the red-flag detector and folds them into
/// one verdict. Never fails: if the taxonomy is unusable it answers with
/// [`RiskAggregator::fallback_assessment`].
#[derive(Debug, Clone)]
pub struct RiskAggregator {
    taxonomy: Result<Arc<CompiledTaxonomy>, Arc<TaxonomyError>>,
    thresholds: OverallThresholds,
}

impl Default for RiskAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskAggregator {
    /// Aggregator over the built-in taxonomy.
    pub fn new() -> Self {
        Self::from_compiled(taxonomy::builtin())
    }

    pub fn from_compiled(taxonomy: Result<Arc<CompiledTaxonomy>, TaxonomyError>) -> Self {
        if let Err(err) = &taxonomy {
            warn!(error = %err, "risk taxonomy unavailable; assessments will use the fallback");
        }
        Self {
            taxonomy: taxonomy.map_err(Arc::new),
            thresholds: OverallThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: OverallThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn taxonomy(&self) -> Option<&CompiledTaxonomy> {
        self.taxonomy.as_deref().ok()
    }

    #[instrument(name = "assess_risks", skip(self, text), fields(text_len = text.len()))]
    pub fn assess(&self, text: &str) -> RiskAssessment {
        match &self.taxonomy {
            Ok(taxonomy) => self.assess_with(taxonomy, text),
            Err(err) => {
                warn!(error = %err, "returning fallback risk assessment");
                Self::fallback_assessment()
            }
        }
    }

    fn assess_with(&self, taxonomy: &CompiledTaxonomy, text: &str) -> RiskAssessment {
        let hits = taxonomy.signal_hits(text);
        let categories: BTreeMap<RiskCategory, CategoryAssessment> = RiskCategory::ALL
            .into_iter()
            .map(|category| (category, assess_hits(&hits, category)))
            .collect();
        let red_flags = taxonomy.detect_red_flags(text);

        let total_score: u32 = categories.values().map(|c| c.score).sum();
        let overall = self.overall_level(total_score, &red_flags);

        let recommendations = taxonomy
            .triggered_recommendations(text)
            .into_iter()
            .map(|rule| RiskRecommendation {
                priority: rule.priority,
                category: rule.category.clone(),
                text: rule.text.clone(),
                reason: rule.reason.clone(),
            })
            .collect();

        debug!(
            total_score,
            red_flags = red_flags.len(),
            %overall,
            "risk assessment completed"
        );

        RiskAssessment {
            overall,
            categories,
            red_flags,
            recommendations,
        }
    }

    /// Most restrictive of the score rule and the red-flag-count rule.
    pub fn overall_level(&self, total_score: u32, red_flags: &[RedFlag]) -> RiskLevel {
        let flags = red_flags.len();
        let t = &self.thresholds;
        if total_score >= t.high_score || flags >= t.high_red_flags {
            RiskLevel::High
        } else if total_score >= t.medium_score || flags >= t.medium_red_flags {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Fixed verdict used when the taxonomy cannot be evaluated.
    pub fn fallback_assessment() -> RiskAssessment {
        let category = |score: u32| CategoryAssessment::from_findings(score, Vec::new());
        let categories = BTreeMap::from([
            (RiskCategory::Financial, category(2)),
            (RiskCategory::Legal, category(2)),
            (RiskCategory::Operational, category(1)),
            (RiskCategory::Privacy, category(1)),
        ]);
        RiskAssessment {
            overall: RiskLevel::Medium,
            categories,
            red_flags: Vec::new(),
            recommendations: vec![RiskRecommendation {
                priority: Priority::High,
                category: "general".into(),
                text: "Review document carefully and seek professional advice if needed".into(),
                reason:
                    "Legal documents contain important terms that affect your rights and obligations"
                        .into(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::Taxonomy;

    #[test]
    fn simple_agreement_is_low_with_one_recommendation() {
        let assessment =
            RiskAggregator::new().assess("This is a simple agreement with no special terms.");
        assert_eq!(assessment.overall, RiskLevel::Low);
        assert!(assessment.red_flags.is_empty());
        for category in RiskCategory::ALL {
            let c = assessment.category(category).unwrap();
            assert_eq!(c.score, 0);
            assert_eq!(c.level, RiskLevel::Low);
        }
        assert_eq!(assessment.recommendations.len(), 1);
        assert_eq!(assessment.recommendations[0].category, "general");
        assert_eq!(assessment.recommendations[0].priority, Priority::High);
    }

    #[test]
    fn arbitration_waiver_and_damages_escalate_to_high() {
        let text = "Includes a binding arbitration clause and a class action waiver. \
                    Liquidated damages of $500 apply.";
        let assessment = RiskAggregator::new().assess(text);
        let legal = assessment.category(RiskCategory::Legal).unwrap();
        assert!(legal.score >= 6);
        assert_eq!(legal.level, RiskLevel::High);
        let flags: Vec<_> = assessment
            .red_flags
            .iter()
            .map(|f| f.description.as_str())
            .collect();
        assert!(flags.contains(&"Mandatory arbitration clause"));
        assert!(flags.contains(&"Cannot join class actions"));
        assert!(assessment.red_flags.len() >= 2);
        assert_eq!(assessment.overall, RiskLevel::High);
    }

    #[test]
    fn red_flag_count_alone_escalates() {
        let text = "You waive all statutory rights. A personal guarantee is required. \
                    Disputes are binding and final through arbitration.";
        let assessment = RiskAggregator::new().assess(text);
        assert_eq!(assessment.total_score(), 0);
        assert_eq!(assessment.red_flags.len(), 3);
        assert_eq!(assessment.overall, RiskLevel::High);
    }

    #[test]
    fn single_red_flag_is_at_least_medium() {
        let assessment = RiskAggregator::new().assess("A personal guarantee is required.");
        assert_eq!(assessment.total_score(), 0);
        assert_eq!(assessment.overall, RiskLevel::Medium);
    }

    #[test]
    fn score_rule_is_independent_of_flags() {
        let aggregator = RiskAggregator::new();
        assert_eq!(aggregator.overall_level(10, &[]), RiskLevel::High);
        assert_eq!(aggregator.overall_level(5, &[]), RiskLevel::Medium);
        assert_eq!(aggregator.overall_level(4, &[]), RiskLevel::Low);
    }

    #[test]
    fn recommendations_trigger_without_score() {
        // "data" triggers the privacy recommendation although privacy scores 0.
        let assessment = RiskAggregator::new().assess("We store data on our servers.");
        assert_eq!(assessment.score_of(RiskCategory::Privacy), 0);
        let categories: Vec<_> = assessment
            .recommendations
            .iter()
            .map(|r| r.category.as_str())
            .collect();
        assert_eq!(categories, vec!["general", "privacy"]);
        assert_eq!(assessment.recommendations[1].priority, Priority::Medium);
    }

    #[test]
    fn broken_taxonomy_yields_fallback() {
        let mut tables = Taxonomy::builtin();
        tables.red_flags[2].pattern = "[".into();
        let aggregator = RiskAggregator::from_compiled(CompiledTaxonomy::compile(&tables).map(Arc::new));
        assert!(aggregator.taxonomy().is_none());

        let assessment = aggregator.assess("binding arbitration everywhere");
        assert_eq!(assessment, RiskAggregator::fallback_assessment());
        assert_eq!(assessment.overall, RiskLevel::Medium);
        assert_eq!(assessment.level_of(RiskCategory::Financial), RiskLevel::Medium);
        assert_eq!(assessment.level_of(RiskCategory::Privacy), RiskLevel::Low);
        assert!(assessment.red_flags.is_empty());
        assert_eq!(assessment.recommendations.len(), 1);
    }
}
