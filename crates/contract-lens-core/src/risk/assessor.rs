//! Per-category scoring over the compiled taxonomy.

use tracing::trace;

use super::{
    taxonomy::{CompiledTaxonomy, Matcher, SignalHit},
    CategoryAssessment, Finding, RiskCategory,
};

impl CompiledTaxonomy {
    /// Score `text` for one category.
    ///
    /// Every signal contributes its weight at most once, however many times it
    /// occurs. A text with no hits yields score 0, level low and no findings.
    pub fn assess(&self, text: &str, category: RiskCategory) -> CategoryAssessment {
        let hits = self.signal_hits(text);
        assess_hits(&hits, category)
    }
}

/// Build one category's assessment from a shared set of signal hits.
pub(crate) fn assess_hits(hits: &[SignalHit<'_>], category: RiskCategory) -> CategoryAssessment {
    let mut score = 0;
    let mut findings = Vec::new();
    for hit in hits.iter().filter(|hit| hit.signal.category == category) {
        trace!(signal = %hit.signal.id, %category, "signal fired");
        score += hit.signal.weight;
        findings.push(to_finding(hit));
    }
    CategoryAssessment::from_findings(score, findings)
}

fn to_finding(hit: &SignalHit<'_>) -> Finding {
    let signal = hit.signal;
    match signal.matcher {
        Matcher::Pattern(_) if !hit.matches.is_empty() => {
            let joined = hit.matches.join(", ");
            Finding {
                term: signal.term.clone(),
                severity: signal.severity,
                description: format!("{}: {}", signal.description, joined),
                matched_text: Some(joined),
            }
        }
        _ => Finding {
            term: signal.term.clone(),
            severity: signal.severity,
            description: signal.description.clone(),
            matched_text: None,
        },
    }
}
