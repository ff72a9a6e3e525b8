pub mod gemini;
pub mod rig_adapter;
mod settings;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

pub use gemini::GeminiClient;
pub use rig_adapter::RigBackend;
pub use settings::{LlmSettings, ProviderKind};

/// System instruction sent with every request.
pub(crate) const SYSTEM_PROMPT: &str = "You are a legal document analysis assistant. \
Explain contracts in plain language for non-lawyers while staying accurate. \
When asked for JSON, reply with a single JSON object and nothing else.";

/// Opaque text-generation service. Implementations return the raw model text;
/// interpreting it is the caller's job.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Backend used when no provider is configured. Every call fails, which sends
/// analyses straight to their offline tier.
#[derive(Debug, Default, Clone)]
pub struct OfflineBackend;

#[async_trait]
impl GenerativeBackend for OfflineBackend {
    fn name(&self) -> &str {
        "offline"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("generative backend not configured; set CONTRACT_LENS_PROVIDER to enable it")
    }
}

/// Construct the backend selected by `settings`.
pub fn backend_from_settings(settings: &LlmSettings) -> Result<Arc<dyn GenerativeBackend>> {
    let backend: Arc<dyn GenerativeBackend> = match settings.provider {
        ProviderKind::Gemini => Arc::new(GeminiClient::new(settings)?),
        ProviderKind::OpenAi | ProviderKind::Anthropic | ProviderKind::Azure => {
            Arc::new(RigBackend::for_kind(settings.provider, settings)?)
        }
        ProviderKind::Noop => Arc::new(OfflineBackend),
    };
    Ok(backend)
}

/// Truncate to `max_chars` characters, appending an ellipsis when cut.
pub(crate) fn truncate(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    input.chars().take(max_chars).collect::<String>() + "…"
}
