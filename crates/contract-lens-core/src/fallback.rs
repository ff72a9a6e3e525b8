//! Ordered fallback tiers.
//!
//! A request is expressed as a list of [`Attempt`]s, strongest first, plus a
//! terminal builder that cannot fail. [`run_tiers`] tries each attempt in
//! order and returns the first success. Once the backend itself has failed,
//! later attempts that also need it are skipped.

use std::{fmt, future::Future, pin::Pin};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::normalize::ParseFailure;

/// Which tier produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    Structured,
    TextSalvage,
    Offline,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Structured => "structured",
            Tier::TextSalvage => "text-salvage",
            Tier::Offline => "offline",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum TierFailure {
    /// Network, auth, quota or timeout failure reported by the backend.
    #[error("generative backend failed: {0:#}")]
    Backend(anyhow::Error),
    #[error(transparent)]
    Parse(#[from] ParseFailure),
    #[error("failed to render prompt: {0}")]
    Prompt(#[from] serde_json::Error),
}

impl TierFailure {
    pub fn is_backend(&self) -> bool {
        matches!(self, TierFailure::Backend(_))
    }
}

pub type AttemptFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TierFailure>> + Send + 'a>>;

/// One step of a fallback chain.
pub struct Attempt<'a, T> {
    tier: Tier,
    requires_backend: bool,
    future: AttemptFuture<'a, T>,
}

impl<'a, T> Attempt<'a, T> {
    pub fn new<F>(tier: Tier, requires_backend: bool, future: F) -> Self
    where
        F: Future<Output = Result<T, TierFailure>> + Send + 'a,
    {
        Self {
            tier,
            requires_backend,
            future: Box::pin(future),
        }
    }

    /// Attempt that calls the generative backend.
    pub fn backend<F>(tier: Tier, future: F) -> Self
    where
        F: Future<Output = Result<T, TierFailure>> + Send + 'a,
    {
        Self::new(tier, true, future)
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }
}

/// Run `attempts` in order; fall through to `terminal` when all of them fail
/// or are skipped.
pub async fn run_tiers<'a, T, F>(operation: &str, attempts: Vec<Attempt<'a, T>>, terminal: F) -> T
where
    F: FnOnce() -> T,
{
    let mut backend_down = false;
    for attempt in attempts {
        if backend_down && attempt.requires_backend {
            debug!(operation, tier = %attempt.tier, "skipping tier; backend unavailable");
            continue;
        }
        match attempt.future.await {
            Ok(value) => {
                debug!(operation, tier = %attempt.tier, "tier succeeded");
                return value;
            }
            Err(failure) => {
                warn!(operation, tier = %attempt.tier, error = %failure, "tier failed; degrading");
                if failure.is_backend() {
                    backend_down = true;
                }
            }
        }
    }
    debug!(operation, tier = %Tier::Offline, "using terminal tier");
    terminal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn parse_failure() -> TierFailure {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        TierFailure::Parse(ParseFailure::Malformed { source })
    }

    #[tokio::test]
    async fn first_success_wins() {
        let attempts = vec![
            Attempt::backend(Tier::Structured, async { Ok::<_, TierFailure>("first") }),
            Attempt::backend(Tier::TextSalvage, async { Ok::<_, TierFailure>("second") }),
        ];
        assert_eq!(run_tiers("test", attempts, || "terminal").await, "first");
    }

    #[tokio::test]
    async fn parse_failure_moves_to_next_tier() {
        let attempts = vec![
            Attempt::backend(Tier::Structured, async { Err(parse_failure()) }),
            Attempt::backend(Tier::TextSalvage, async { Ok::<_, TierFailure>("salvaged") }),
        ];
        assert_eq!(run_tiers("test", attempts, || "terminal").await, "salvaged");
    }

    #[tokio::test]
    async fn backend_failure_skips_backend_tiers() {
        let calls = AtomicUsize::new(0);
        let attempts = vec![
            Attempt::backend(Tier::Structured, async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<&str, _>(TierFailure::Backend(anyhow!("quota exceeded")))
            }),
            Attempt::backend(Tier::TextSalvage, async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TierFailure>("salvaged")
            }),
        ];
        assert_eq!(run_tiers("test", attempts, || "terminal").await, "terminal");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn local_attempts_still_run_after_backend_failure() {
        let attempts = vec![
            Attempt::backend(Tier::Structured, async {
                Err(TierFailure::Backend(anyhow!("offline")))
            }),
            Attempt::new(Tier::TextSalvage, false, async { Ok::<_, TierFailure>("local") }),
        ];
        assert_eq!(run_tiers("test", attempts, || "terminal").await, "local");
    }

    #[test]
    fn tier_labels_are_kebab_case() {
        assert_eq!(
            serde_json::to_value(Tier::TextSalvage).unwrap(),
            serde_json::json!("text-salvage")
        );
        assert_eq!(Tier::Offline.to_string(), "offline");
    }
}
