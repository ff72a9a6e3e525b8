use tracing::trace;

use super::{
    taxonomy::{CompiledTaxonomy, RED_FLAG_RECOMMENDATION},
    RedFlag, RiskLevel,
};

impl CompiledTaxonomy {
    /// Red flags present in `text`.
    ///
    /// One flag per matching pattern no matter how often it occurs; flags are
    /// emitted in table order, not in order of appearance.
    pub fn detect_red_flags(&self, text: &str) -> Vec<RedFlag> {
        self.red_flag_patterns()
            .iter()
            .filter(|(_, regex)| regex.is_match(text))
            .map(|(pattern, _)| {
                trace!(red_flag = %pattern.id, "red flag matched");
                RedFlag {
                    severity: RiskLevel::High,
                    description: pattern.description.clone(),
                    recommendation: RED_FLAG_RECOMMENDATION.to_string(),
                }
            })
            .collect()
    }
}
