//! OpenAI, Anthropic and Azure OpenAI completions through `rig`.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use rig::{
    client::CompletionClient,
    completion::{message::AssistantContent, CompletionModelDyn},
    providers::{anthropic, azure, azure::AzureOpenAIAuth, openai},
    OneOrMany,
};
use tracing::warn;

use super::{GenerativeBackend, LlmSettings, ProviderKind, SYSTEM_PROMPT};
use crate::normalize::debug_enabled;

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-latest";

type DynModel = Box<dyn CompletionModelDyn + Send + Sync>;

pub struct RigBackend {
    kind: ProviderKind,
    model: DynModel,
    model_id: String,
    temperature: f64,
    max_tokens: u64,
}

impl RigBackend {
    pub fn for_kind(kind: ProviderKind, settings: &LlmSettings) -> Result<Self> {
        if matches!(kind, ProviderKind::Gemini | ProviderKind::Noop) {
            bail!("rig adapter does not handle provider `{kind}`");
        }
        if settings.api_key.trim().is_empty() {
            bail!(
                "{kind} API key must be provided via {}",
                LlmSettings::API_KEY_ENV
            );
        }

        let (model, model_id) = match kind {
            ProviderKind::Anthropic => anthropic_model(settings)?,
            ProviderKind::Azure => azure_model(settings)?,
            _ => openai_model(settings),
        };

        Ok(Self {
            kind,
            model,
            model_id,
            temperature: f64::from(settings.temperature),
            max_tokens: u64::from(settings.max_output_tokens),
        })
    }

    /// Model (or Azure deployment) the requests are sent to.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

fn model_name(settings: &LlmSettings, default: &str) -> String {
    settings
        .model
        .as_deref()
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn openai_model(settings: &LlmSettings) -> (DynModel, String) {
    let mut builder = openai::Client::builder(&settings.api_key);
    if let Some(endpoint) = settings.endpoint.as_deref() {
        builder = builder.base_url(endpoint);
    }
    let client = builder.build();
    let model_id = model_name(settings, DEFAULT_OPENAI_MODEL);
    (Box::new(client.completion_model(&model_id)), model_id)
}

fn anthropic_model(settings: &LlmSettings) -> Result<(DynModel, String)> {
    let mut builder = anthropic::ClientBuilder::new(&settings.api_key);
    if let Some(endpoint) = settings.endpoint.as_deref() {
        builder = builder.base_url(endpoint);
    }
    if let Some(version) = settings.api_version.as_deref() {
        builder = builder.anthropic_version(version);
    }
    let client = builder
        .build()
        .context("failed to build anthropic client")?;
    let model_id = model_name(settings, DEFAULT_ANTHROPIC_MODEL);
    Ok((Box::new(client.completion_model(&model_id)), model_id))
}

/// Azure addresses a deployment rather than a model; the deployment name wins
/// over the model name when both are set.
fn azure_model(settings: &LlmSettings) -> Result<(DynModel, String)> {
    let Some(endpoint) = settings.endpoint.as_deref() else {
        bail!(
            "azure provider requires {} to be set",
            LlmSettings::ENDPOINT_ENV
        );
    };
    let deployment = [settings.deployment.as_deref(), settings.model.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string);
    let Some(deployment) = deployment else {
        bail!(
            "azure provider requires {} or {} to name the deployment",
            LlmSettings::DEPLOYMENT_ENV,
            LlmSettings::MODEL_ENV
        );
    };

    let auth = AzureOpenAIAuth::ApiKey(settings.api_key.clone());
    let mut builder = azure::Client::builder(auth, endpoint);
    if let Some(version) = settings.api_version.as_deref() {
        builder = builder.api_version(version);
    }
    let client = builder.build();
    Ok((Box::new(client.completion_model(&deployment)), deployment))
}

#[async_trait]
impl GenerativeBackend for RigBackend {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = self
            .model
            .completion_request(prompt.to_string().into())
            .preamble(SYSTEM_PROMPT.to_string())
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build();

        let response = self.model.completion(request).await.with_context(|| {
            format!(
                "{} completion request failed for model {}",
                self.kind, self.model_id
            )
        })?;

        if debug_enabled() {
            log_choice(self.kind, &response.choice);
        }
        let text = completion_text(response.choice);
        if text.trim().is_empty() {
            return Err(anyhow!(
                "{} response from model {} had no text content",
                self.kind,
                self.model_id
            ));
        }
        Ok(text)
    }
}

fn log_choice(kind: ProviderKind, choice: &OneOrMany<AssistantContent>) {
    match serde_json::to_string_pretty(choice) {
        Ok(payload) => warn!(provider = %kind, %payload, "raw completion choice"),
        Err(err) => warn!(provider = %kind, error = %err, "completion choice not serialisable"),
    }
}

/// Text and tool-call arguments of a completion choice, one segment per line.
/// Reasoning traces are dropped.
fn completion_text(choice: OneOrMany<AssistantContent>) -> String {
    choice
        .into_iter()
        .filter_map(|segment| match segment {
            AssistantContent::Text(text) => Some(text.text),
            AssistantContent::ToolCall(tool) => {
                serde_json::to_string(&tool.function.arguments).ok()
            }
            AssistantContent::Reasoning(_) => None,
        })
        .filter(|segment| !segment.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig::completion::message::Text;

    fn settings(provider: ProviderKind) -> LlmSettings {
        LlmSettings {
            provider,
            api_key: "test-key".into(),
            endpoint: Some("https://contracts.example.com".into()),
            model: Some("model-under-test".into()),
            ..LlmSettings::offline()
        }
    }

    fn text(value: &str) -> AssistantContent {
        AssistantContent::Text(Text {
            text: value.into(),
        })
    }

    #[test]
    fn api_key_is_required() {
        let mut settings = settings(ProviderKind::Anthropic);
        settings.api_key = " ".into();
        let err = RigBackend::for_kind(ProviderKind::Anthropic, &settings)
            .err()
            .expect("blank key should error");
        assert!(err.to_string().contains("anthropic API key"));
    }

    #[test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "reqwest default TLS stack unavailable in sandbox"
    )]
    fn openai_uses_configured_model() {
        let backend = RigBackend::for_kind(ProviderKind::OpenAi, &settings(ProviderKind::OpenAi))
            .expect("client should be constructed");
        assert_eq!(backend.name(), "openai");
        assert_eq!(backend.model_id(), "model-under-test");
        assert_eq!(backend.max_tokens, 4000);
    }

    #[test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "reqwest default TLS stack unavailable in sandbox"
    )]
    fn blank_model_falls_back_to_default() {
        let mut settings = settings(ProviderKind::OpenAi);
        settings.model = Some("   ".into());
        let backend = RigBackend::for_kind(ProviderKind::OpenAi, &settings).unwrap();
        assert_eq!(backend.model_id(), DEFAULT_OPENAI_MODEL);
    }

    #[test]
    fn azure_requires_endpoint() {
        let mut settings = settings(ProviderKind::Azure);
        settings.endpoint = None;
        let err = RigBackend::for_kind(ProviderKind::Azure, &settings)
            .err()
            .expect("missing endpoint should error");
        assert!(err.to_string().contains(LlmSettings::ENDPOINT_ENV));
    }

    #[test]
    fn azure_requires_deployment() {
        let mut settings = settings(ProviderKind::Azure);
        settings.model = None;
        let err = RigBackend::for_kind(ProviderKind::Azure, &settings)
            .err()
            .expect("missing deployment should error");
        assert!(err.to_string().contains("deployment"));
    }

    #[test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "reqwest default TLS stack unavailable in sandbox"
    )]
    fn azure_prefers_deployment_over_model() {
        let mut settings = settings(ProviderKind::Azure);
        settings.deployment = Some("contracts-gpt".into());
        let backend = RigBackend::for_kind(ProviderKind::Azure, &settings).unwrap();
        assert_eq!(backend.model_id(), "contracts-gpt");
        assert_eq!(backend.name(), "azure");
    }

    #[test]
    fn gemini_and_noop_are_rejected() {
        for kind in [ProviderKind::Gemini, ProviderKind::Noop] {
            let err = RigBackend::for_kind(kind, &settings(kind))
                .err()
                .expect("provider should be rejected");
            assert!(err.to_string().contains(kind.as_str()));
        }
    }

    #[test]
    fn completion_text_joins_non_blank_segments() {
        let choice = OneOrMany::many(vec![text("{\"answer\":"), text("  "), text("\"yes\"}")])
            .expect("non-empty choice");
        assert_eq!(completion_text(choice), "{\"answer\":\n\"yes\"}");
    }

    #[test]
    fn blank_choice_yields_empty_text() {
        assert!(completion_text(OneOrMany::one(text(" "))).is_empty());
    }
}
