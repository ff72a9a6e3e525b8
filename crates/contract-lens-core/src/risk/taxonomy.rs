use std::{collections::HashSet, sync::Arc};

use aho_corasick::AhoCorasick;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::{Priority, RiskCategory, RiskLevel};

/// Bumped whenever a table below changes in a way that alters scores.
pub const TAXONOMY_VERSION: u32 = 1;

/// Generic contract-risk vocabulary, grouped by severity tier.
const HIGH_TIER_TERMS: &[&str] = &[
    "automatic renewal",
    "binding arbitration",
    "class action waiver",
    "liquidated damages",
    "personal guarantee",
    "non-compete",
    "confidentiality",
    "indemnification",
    "force majeure",
    "termination without cause",
    "late fees",
    "penalty",
    "forfeiture",
    "waiver of rights",
];

const MEDIUM_TIER_TERMS: &[&str] = &[
    "dispute resolution",
    "governing law",
    "jurisdiction",
    "severability",
    "entire agreement",
    "modification",
    "assignment",
    "notice requirements",
    "cure period",
    "default",
];

const LOW_TIER_TERMS: &[&str] = &[
    "definitions",
    "recitals",
    "signature blocks",
    "exhibits",
    "schedules",
    "table of contents",
];

const LIABILITY_TERMS: &[&str] = &[
    "indemnify",
    "hold harmless",
    "liability",
    "damages",
    "negligence",
    "gross negligence",
    "willful misconduct",
    "strict liability",
    "product liability",
    "professional liability",
];

/// Financial terms scored one point each, with the explanation shown to the reader.
const FINANCIAL_TERMS: &[(&str, &str)] = &[
    (
        "interest rate",
        "Rate at which interest accrues on outstanding amounts",
    ),
    ("penalty", "Additional charges for non-compliance"),
    ("late fee", "Fee charged for late payments"),
    (
        "default rate",
        "Higher interest rate applied when in default",
    ),
    ("collection costs", "Costs of collecting overdue amounts"),
    ("attorney fees", "Legal fees that may be recoverable"),
    ("court costs", "Costs of legal proceedings"),
    ("liquidated damages", "Pre-determined penalty amounts"),
    ("security deposit", "Upfront payment held as security"),
    ("rent increase", "Potential increase in rental amounts"),
];

const LEGAL_TRIGGERS: &[&str] = &["arbitration", "waiver", "indemnify", "liability", "damages"];
const PRIVACY_TRIGGERS: &[&str] = &["data", "personal information", "privacy", "confidential"];

pub const RED_FLAG_RECOMMENDATION: &str = "Review carefully and consider legal advice";

/// How a signal recognises itself in document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Matcher {
    /// Fires when any phrase occurs (ASCII case-insensitive substring).
    Phrases(Vec<String>),
    /// Fires when the regex matches; every match is reported as matched text.
    Pattern(String),
}

/// One weighted risk signal. A signal contributes its weight at most once per document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub category: RiskCategory,
    pub matcher: Matcher,
    pub weight: u32,
    pub severity: RiskLevel,
    pub term: String,
    pub description: String,
}

impl Signal {
    fn phrases(
        id: &str,
        category: RiskCategory,
        phrases: &[&str],
        weight: u32,
        severity: RiskLevel,
        term: &str,
        description: &str,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            matcher: Matcher::Phrases(phrases.iter().map(|p| p.to_string()).collect()),
            weight,
            severity,
            term: term.into(),
            description: description.into(),
        }
    }

    fn pattern(
        id: &str,
        category: RiskCategory,
        pattern: &str,
        weight: u32,
        severity: RiskLevel,
        term: &str,
        description: &str,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            matcher: Matcher::Pattern(pattern.into()),
            weight,
            severity,
            term: term.into(),
            description: description.into(),
        }
    }

    pub fn validate(&self) -> Result<(), TaxonomyError> {
        if self.id.trim().is_empty() {
            return Err(TaxonomyError::EmptyId);
        }
        let empty = match &self.matcher {
            Matcher::Phrases(phrases) => {
                phrases.is_empty() || phrases.iter().any(|p| p.trim().is_empty())
            }
            Matcher::Pattern(pattern) => pattern.is_empty(),
        };
        if empty {
            return Err(TaxonomyError::EmptyPattern {
                id: self.id.clone(),
            });
        }
        if self.weight == 0 {
            return Err(TaxonomyError::ZeroWeight {
                id: self.id.clone(),
            });
        }
        Ok(())
    }
}

/// Regex that marks a red flag regardless of category scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedFlagPattern {
    pub id: String,
    pub pattern: String,
    pub description: String,
}

/// Recommendation emitted when the text contains any trigger term.
/// An empty trigger list means the recommendation is always emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRule {
    pub category: String,
    pub priority: Priority,
    pub text: String,
    pub reason: String,
    pub triggers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermTier {
    High,
    Medium,
    Low,
    Liability,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryTerm {
    pub term: String,
    pub tier: TermTier,
}

/// The full, uncompiled set of tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Taxonomy {
    pub signals: Vec<Signal>,
    pub red_flags: Vec<RedFlagPattern>,
    pub recommendations: Vec<RecommendationRule>,
    pub glossary: Vec<GlossaryTerm>,
}

impl Taxonomy {
    /// Built-in tables shipped with the crate.
    pub fn builtin() -> Self {
        use RiskCategory::*;
        use RiskLevel::*;

        let mut signals: Vec<Signal> = FINANCIAL_TERMS
            .iter()
            .map(|(term, description)| {
                let id = format!("FIN_TERM_{}", term.to_ascii_uppercase().replace(' ', "_"));
                Signal::phrases(&id, Financial, &[*term], 1, Medium, term, description)
            })
            .collect();

        signals.extend([
            Signal::pattern(
                "FIN_PENALTY_AMOUNT",
                Financial,
                r"(?i)penalty.*?(\$[\d,]+|\d+%)",
                3,
                High,
                "penalty clauses",
                "Document contains penalty clauses",
            ),
            Signal::phrases(
                "FIN_AUTO_RENEWAL",
                Financial,
                &["automatic renewal", "auto-renew"],
                2,
                High,
                "automatic renewal",
                "Contract may renew automatically without explicit consent",
            ),
            Signal::phrases(
                "LEGAL_ARBITRATION",
                Legal,
                &["binding arbitration", "arbitration clause"],
                3,
                High,
                "binding arbitration",
                "Disputes must be resolved through arbitration, limiting court access",
            ),
            Signal::phrases(
                "LEGAL_CLASS_ACTION",
                Legal,
                &["class action waiver", "waive class action"],
                3,
                High,
                "class action waiver",
                "Cannot join class action lawsuits against the other party",
            ),
            Signal::phrases(
                "LEGAL_LIABILITY_CAP",
                Legal,
                &["limitation of liability", "liability cap"],
                2,
                Medium,
                "liability limitation",
                "Other party's liability may be limited",
            ),
            Signal::phrases(
                "LEGAL_INDEMNITY",
                Legal,
                &["indemnify", "hold harmless"],
                3,
                High,
                "indemnification",
                "May be required to pay for other party's legal costs and damages",
            ),
            Signal::phrases(
                "OPS_TERMINATION",
                Operational,
                &["termination without cause", "terminate at will"],
                2,
                Medium,
                "termination without cause",
                "Contract can be terminated without specific reason",
            ),
            Signal::phrases(
                "OPS_NON_COMPETE",
                Operational,
                &["non-compete", "noncompete"],
                3,
                High,
                "non-compete clause",
                "May restrict future business or employment opportunities",
            ),
            Signal::phrases(
                "OPS_CONFIDENTIALITY",
                Operational,
                &["confidential", "proprietary"],
                1,
                Medium,
                "confidentiality",
                "Must keep certain information confidential",
            ),
            Signal::phrases(
                "PRIV_COLLECTION",
                Privacy,
                &["collect data", "personal information"],
                1,
                Medium,
                "data collection",
                "Personal data may be collected and used",
            ),
            Signal::phrases(
                "PRIV_SHARING",
                Privacy,
                &["share data", "third party"],
                2,
                Medium,
                "data sharing",
                "Data may be shared with third parties",
            ),
        ]);

        let red_flags = [
            ("RF_RIGHTS_WAIVER", r"(?i)waive.*rights?", "Waiver of legal rights"),
            (
                "RF_ARBITRATION",
                r"(?i)binding.*arbitration",
                "Mandatory arbitration clause",
            ),
            (
                "RF_CLASS_ACTION",
                r"(?i)class.*action.*waiver",
                "Cannot join class actions",
            ),
            (
                "RF_LIQUIDATED_DAMAGES",
                r"(?i)liquidated.*damages",
                "Pre-determined penalty amounts",
            ),
            (
                "RF_PERSONAL_GUARANTEE",
                r"(?i)personal.*guarantee",
                "Personal liability for business debts",
            ),
            (
                "RF_AUTO_RENEWAL",
                r"(?i)automatic.*renewal",
                "Contract renews automatically",
            ),
            (
                "RF_TERMINATION",
                r"(?i)termination.*without.*cause",
                "Can be terminated without reason",
            ),
        ]
        .into_iter()
        .map(|(id, pattern, description)| RedFlagPattern {
            id: id.into(),
            pattern: pattern.into(),
            description: description.into(),
        })
        .collect();

        let owned = |terms: &[&str]| terms.iter().map(|t| t.to_string()).collect::<Vec<_>>();
        let financial_triggers: Vec<&str> = FINANCIAL_TERMS.iter().map(|(t, _)| *t).collect();
        let recommendations = vec![
            RecommendationRule {
                category: "general".into(),
                priority: Priority::High,
                text: "Read the entire document carefully before signing".into(),
                reason: "Legal documents contain binding terms that affect your rights".into(),
                triggers: Vec::new(),
            },
            RecommendationRule {
                category: "financial".into(),
                priority: Priority::High,
                text: "Understand all payment terms, penalties, and fees".into(),
                reason:
                    "Financial obligations are legally binding and can have significant impact"
                        .into(),
                triggers: owned(&financial_triggers),
            },
            RecommendationRule {
                category: "legal".into(),
                priority: Priority::High,
                text: "Consider consulting with a legal professional".into(),
                reason:
                    "Complex legal terms may limit your rights or create unexpected obligations"
                        .into(),
                triggers: owned(LEGAL_TRIGGERS),
            },
            RecommendationRule {
                category: "privacy".into(),
                priority: Priority::Medium,
                text: "Review data collection and sharing policies".into(),
                reason: "Understand how your personal information will be used".into(),
                triggers: owned(PRIVACY_TRIGGERS),
            },
        ];

        let tiers = [
            (HIGH_TIER_TERMS, TermTier::High),
            (MEDIUM_TIER_TERMS, TermTier::Medium),
            (LOW_TIER_TERMS, TermTier::Low),
            (LIABILITY_TERMS, TermTier::Liability),
        ];
        let glossary = tiers
            .iter()
            .flat_map(|(terms, tier)| {
                terms.iter().map(move |term| GlossaryTerm {
                    term: term.to_string(),
                    tier: *tier,
                })
            })
            .collect();

        Self {
            signals,
            red_flags,
            recommendations,
            glossary,
        }
    }
}

/// Errors raised while validating or compiling a taxonomy.
#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("signal id must not be blank")]
    EmptyId,
    #[error("duplicate taxonomy id `{id}`")]
    DuplicateId { id: String },
    #[error("entry `{id}` has an empty pattern")]
    EmptyPattern { id: String },
    #[error("signal `{id}` weight must be > 0")]
    ZeroWeight { id: String },
    #[error("invalid regex for `{id}`")]
    InvalidRegex {
        id: String,
        #[source]
        source: regex::Error,
    },
    #[error("failed to build phrase automaton for `{scope}`")]
    Automaton {
        scope: String,
        #[source]
        source: aho_corasick::BuildError,
    },
}

/// A signal that fired, with any regex matches it produced.
#[derive(Debug, Clone)]
pub(crate) struct SignalHit<'a> {
    pub signal: &'a Signal,
    pub matches: Vec<String>,
}

/// Taxonomy with every matcher compiled. Read-only after construction.
#[derive(Debug)]
pub struct CompiledTaxonomy {
    signals: Vec<Signal>,
    phrase_automaton: Option<AhoCorasick>,
    phrase_owner: Vec<usize>,
    signal_patterns: Vec<(usize, Regex)>,
    red_flags: Vec<(RedFlagPattern, Regex)>,
    recommendations: Vec<(RecommendationRule, Option<AhoCorasick>)>,
    glossary: Option<(AhoCorasick, Vec<GlossaryTerm>)>,
}

static BUILTIN: OnceCell<Arc<CompiledTaxonomy>> = OnceCell::new();

/// Shared compiled copy of [`Taxonomy::builtin`].
pub fn builtin() -> Result<Arc<CompiledTaxonomy>, TaxonomyError> {
    BUILTIN
        .get_or_try_init(|| CompiledTaxonomy::compile(&Taxonomy::builtin()).map(Arc::new))
        .cloned()
}

fn case_insensitive_automaton(
    scope: &str,
    patterns: &[String],
) -> Result<AhoCorasick, TaxonomyError> {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(patterns)
        .map_err(|source| TaxonomyError::Automaton {
            scope: scope.to_string(),
            source,
        })
}

fn compile_regex(id: &str, pattern: &str) -> Result<Regex, TaxonomyError> {
    Regex::new(pattern).map_err(|source| TaxonomyError::InvalidRegex {
        id: id.to_string(),
        source,
    })
}

impl CompiledTaxonomy {
    pub fn compile(taxonomy: &Taxonomy) -> Result<Self, TaxonomyError> {
        let mut seen = HashSet::new();
        let mut phrases = Vec::new();
        let mut phrase_owner = Vec::new();
        let mut signal_patterns = Vec::new();

        for (idx, signal) in taxonomy.signals.iter().enumerate() {
            signal.validate()?;
            if !seen.insert(signal.id.clone()) {
                return Err(TaxonomyError::DuplicateId {
                    id: signal.id.clone(),
                });
            }
            match &signal.matcher {
                Matcher::Phrases(list) => {
                    for phrase in list {
                        phrases.push(phrase.clone());
                        phrase_owner.push(idx);
                    }
                }
                Matcher::Pattern(pattern) => {
                    signal_patterns.push((idx, compile_regex(&signal.id, pattern)?));
                }
            }
        }

        let phrase_automaton = if phrases.is_empty() {
            None
        } else {
            Some(case_insensitive_automaton("signals", &phrases)?)
        };

        let mut red_flags = Vec::with_capacity(taxonomy.red_flags.len());
        for flag in &taxonomy.red_flags {
            if flag.pattern.is_empty() {
                return Err(TaxonomyError::EmptyPattern {
                    id: flag.id.clone(),
                });
            }
            if !seen.insert(flag.id.clone()) {
                return Err(TaxonomyError::DuplicateId {
                    id: flag.id.clone(),
                });
            }
            red_flags.push((flag.clone(), compile_regex(&flag.id, &flag.pattern)?));
        }

        let mut recommendations = Vec::with_capacity(taxonomy.recommendations.len());
        for rule in &taxonomy.recommendations {
            let automaton = if rule.triggers.is_empty() {
                None
            } else {
                Some(case_insensitive_automaton(&rule.category, &rule.triggers)?)
            };
            recommendations.push((rule.clone(), automaton));
        }

        let glossary = if taxonomy.glossary.is_empty() {
            None
        } else {
            let terms: Vec<String> = taxonomy.glossary.iter().map(|g| g.term.clone()).collect();
            Some((
                case_insensitive_automaton("glossary", &terms)?,
                taxonomy.glossary.clone(),
            ))
        };

        debug!(
            version = TAXONOMY_VERSION,
            signals = taxonomy.signals.len(),
            red_flags = red_flags.len(),
            "compiled risk taxonomy"
        );

        Ok(Self {
            signals: taxonomy.signals.clone(),
            phrase_automaton,
            phrase_owner,
            signal_patterns,
            red_flags,
            recommendations,
            glossary,
        })
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// All signals that fire on `text`, in table order.
    pub(crate) fn signal_hits(&self, text: &str) -> Vec<SignalHit<'_>> {
        let mut fired = vec![false; self.signals.len()];
        if let Some(automaton) = &self.phrase_automaton {
            for mat in automaton.find_overlapping_iter(text) {
                fired[self.phrase_owner[mat.pattern().as_usize()]] = true;
            }
        }

        let mut matches: Vec<Vec<String>> = vec![Vec::new(); self.signals.len()];
        for (idx, regex) in &self.signal_patterns {
            let found: Vec<String> = regex
                .find_iter(text)
                .map(|m| m.as_str().to_string())
                .collect();
            if !found.is_empty() {
                fired[*idx] = true;
                matches[*idx] = found;
            }
        }

        self.signals
            .iter()
            .zip(fired)
            .zip(matches)
            .filter(|((_, fired), _)| *fired)
            .map(|((signal, _), matches)| SignalHit { signal, matches })
            .collect()
    }

    pub(crate) fn red_flag_patterns(&self) -> &[(RedFlagPattern, Regex)] {
        &self.red_flags
    }

    /// Recommendation rules whose trigger vocabulary occurs in `text`.
    pub(crate) fn triggered_recommendations(&self, text: &str) -> Vec<&RecommendationRule> {
        self.recommendations
            .iter()
            .filter(|(_, automaton)| match automaton {
                Some(automaton) => automaton.is_match(text),
                None => true,
            })
            .map(|(rule, _)| rule)
            .collect()
    }

    /// Distinct tiered glossary terms present in `text`, in table order.
    pub fn glossary_hits(&self, text: &str) -> Vec<GlossaryTerm> {
        let Some((automaton, terms)) = &self.glossary else {
            return Vec::new();
        };
        let mut present = vec![false; terms.len()];
        for mat in automaton.find_overlapping_iter(text) {
            present[mat.pattern().as_usize()] = true;
        }
        terms
            .iter()
            .zip(present)
            .filter(|(_, hit)| *hit)
            .map(|(term, _)| term.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_compile() {
        let compiled = builtin().expect("built-in taxonomy should compile");
        assert_eq!(compiled.signals().len(), FINANCIAL_TERMS.len() + 11);
        assert_eq!(compiled.red_flag_patterns().len(), 7);
    }

    #[test]
    fn builtin_is_shared() {
        let first = builtin().unwrap();
        let second = builtin().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn every_category_has_signals() {
        let taxonomy = Taxonomy::builtin();
        for category in RiskCategory::ALL {
            assert!(
                taxonomy.signals.iter().any(|s| s.category == category),
                "no signals for {category}"
            );
        }
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut taxonomy = Taxonomy::builtin();
        let dup = taxonomy.signals[0].clone();
        taxonomy.signals.push(dup);
        let err = CompiledTaxonomy::compile(&taxonomy).expect_err("duplicate ids must fail");
        assert!(err.to_string().contains("duplicate taxonomy id"));
    }

    #[test]
    fn rejects_invalid_regex() {
        let mut taxonomy = Taxonomy::builtin();
        taxonomy.red_flags[0].pattern = "(unclosed".into();
        let err = CompiledTaxonomy::compile(&taxonomy).expect_err("bad regex must fail");
        assert!(matches!(err, TaxonomyError::InvalidRegex { id, .. } if id == "RF_RIGHTS_WAIVER"));
    }

    #[test]
    fn rejects_zero_weight_signal() {
        let mut taxonomy = Taxonomy::builtin();
        taxonomy.signals[3].weight = 0;
        assert!(matches!(
            CompiledTaxonomy::compile(&taxonomy),
            Err(TaxonomyError::ZeroWeight { .. })
        ));
    }

    #[test]
    fn overlapping_phrases_all_fire() {
        let compiled = builtin().unwrap();
        let hits = compiled.glossary_hits("Strict Liability applies despite GROSS NEGLIGENCE.");
        let terms: Vec<_> = hits.iter().map(|h| h.term.as_str()).collect();
        assert!(terms.contains(&"liability"));
        assert!(terms.contains(&"strict liability"));
        assert!(terms.contains(&"negligence"));
        assert!(terms.contains(&"gross negligence"));
    }

    #[test]
    fn general_recommendation_always_triggers() {
        let compiled = builtin().unwrap();
        let rules = compiled.triggered_recommendations("");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].category, "general");
    }
}
