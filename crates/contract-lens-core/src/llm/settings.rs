use anyhow::{anyhow, Context, Result};
use std::{collections::HashMap, fmt, str::FromStr};

/// Supported generative backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Anthropic,
    Azure,
    /// No backend; every call fails so analyses land on the offline tier.
    Noop,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "azure" | "azure-openai" => Ok(Self::Azure),
            "noop" | "offline" => Ok(Self::Noop),
            other => Err(anyhow!(
                "unknown provider `{other}` (expected gemini, openai, anthropic, azure or noop)"
            )),
        }
    }
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Azure => "azure",
            ProviderKind::Noop => "noop",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Environment-driven configuration required for backend clients.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub provider: ProviderKind,
    pub api_key: String,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub deployment: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: u32,
    pub api_version: Option<String>,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl LlmSettings {
    pub const PROVIDER_ENV: &'static str = "CONTRACT_LENS_PROVIDER";
    pub const API_KEY_ENV: &'static str = "CONTRACT_LENS_API_KEY";
    pub const GEMINI_KEY_ENV: &'static str = "GEMINI_API_KEY";
    pub const ENDPOINT_ENV: &'static str = "CONTRACT_LENS_ENDPOINT";
    pub const MODEL_ENV: &'static str = "CONTRACT_LENS_MODEL";
    pub const DEPLOYMENT_ENV: &'static str = "CONTRACT_LENS_DEPLOYMENT";
    pub const TIMEOUT_ENV: &'static str = "CONTRACT_LENS_TIMEOUT_SECS";
    pub const RETRIES_ENV: &'static str = "CONTRACT_LENS_MAX_RETRIES";
    pub const API_VERSION_ENV: &'static str = "CONTRACT_LENS_API_VERSION";
    pub const MAX_TOKENS_ENV: &'static str = "CONTRACT_LENS_MAX_TOKENS";
    pub const TEMPERATURE_ENV: &'static str = "CONTRACT_LENS_TEMPERATURE";

    /// Load settings from environment variables.
    ///
    /// * `CONTRACT_LENS_PROVIDER` — Provider identifier (default: `gemini`).
    /// * `CONTRACT_LENS_API_KEY`  — API key/token; `GEMINI_API_KEY` is accepted too.
    ///   Not required for `noop`.
    /// * `CONTRACT_LENS_ENDPOINT` — Optional custom endpoint/base URL.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Build settings from an explicit variable map (same keys as the environment).
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let non_empty = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let provider = match non_empty(Self::PROVIDER_ENV) {
            Some(raw) => raw.parse::<ProviderKind>()?,
            None => ProviderKind::Gemini,
        };
        let api_key = non_empty(Self::API_KEY_ENV).or_else(|| {
            (provider == ProviderKind::Gemini)
                .then(|| non_empty(Self::GEMINI_KEY_ENV))
                .flatten()
        });
        let api_key = match provider {
            ProviderKind::Noop => api_key.unwrap_or_default(),
            _ => api_key.with_context(|| {
                format!(
                    "environment variable {} must be set for provider `{}`",
                    Self::API_KEY_ENV,
                    provider
                )
            })?,
        };
        let timeout_secs = non_empty(Self::TIMEOUT_ENV).and_then(|v| v.parse::<u64>().ok());
        let max_retries = non_empty(Self::RETRIES_ENV)
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(2);
        let max_output_tokens = non_empty(Self::MAX_TOKENS_ENV)
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(4000);
        let temperature = non_empty(Self::TEMPERATURE_ENV)
            .and_then(|v| v.parse::<f32>().ok())
            .unwrap_or(0.3);

        Ok(Self {
            provider,
            api_key,
            endpoint: non_empty(Self::ENDPOINT_ENV),
            model: non_empty(Self::MODEL_ENV),
            deployment: non_empty(Self::DEPLOYMENT_ENV),
            timeout_secs,
            max_retries,
            api_version: non_empty(Self::API_VERSION_ENV),
            max_output_tokens,
            temperature,
        })
    }

    /// Settings for the offline backend; never touches the network.
    pub fn offline() -> Self {
        Self {
            provider: ProviderKind::Noop,
            api_key: String::new(),
            endpoint: None,
            model: None,
            deployment: None,
            timeout_secs: None,
            max_retries: 0,
            api_version: None,
            max_output_tokens: 4000,
            temperature: 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_to_gemini_provider() {
        let settings = LlmSettings::from_vars(vars(&[(LlmSettings::API_KEY_ENV, "secret")]))
            .expect("should load settings");
        assert_eq!(settings.provider, ProviderKind::Gemini);
        assert_eq!(settings.api_key, "secret");
        assert!(settings.endpoint.is_none());
        assert!(settings.model.is_none());
        assert_eq!(settings.max_retries, 2);
        assert_eq!(settings.max_output_tokens, 4000);
        assert!((settings.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn gemini_accepts_legacy_key_variable() {
        let settings = LlmSettings::from_vars(vars(&[(LlmSettings::GEMINI_KEY_ENV, "g-key")]))
            .expect("legacy key should be accepted");
        assert_eq!(settings.api_key, "g-key");
    }

    #[test]
    fn errors_when_api_key_missing() {
        let err = LlmSettings::from_vars(vars(&[(LlmSettings::PROVIDER_ENV, "openai")]))
            .expect_err("missing API key should error");
        assert!(err.to_string().contains(LlmSettings::API_KEY_ENV));
    }

    #[test]
    fn legacy_key_is_gemini_only() {
        let err = LlmSettings::from_vars(vars(&[
            (LlmSettings::PROVIDER_ENV, "anthropic"),
            (LlmSettings::GEMINI_KEY_ENV, "g-key"),
        ]))
        .expect_err("gemini key must not leak into anthropic");
        assert!(err.to_string().contains("anthropic"));
    }

    #[test]
    fn noop_provider_allows_missing_key() {
        let settings = LlmSettings::from_vars(vars(&[(LlmSettings::PROVIDER_ENV, "noop")]))
            .expect("noop should not require key");
        assert_eq!(settings.provider, ProviderKind::Noop);
        assert!(settings.api_key.is_empty());
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = LlmSettings::from_vars(vars(&[(LlmSettings::PROVIDER_ENV, "mystery")]))
            .expect_err("unknown provider should error");
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn parses_numeric_overrides() {
        let settings = LlmSettings::from_vars(vars(&[
            (LlmSettings::PROVIDER_ENV, "azure"),
            (LlmSettings::API_KEY_ENV, "secret"),
            (LlmSettings::TIMEOUT_ENV, "45"),
            (LlmSettings::RETRIES_ENV, "5"),
            (LlmSettings::API_VERSION_ENV, "2024-07-01"),
            (LlmSettings::MAX_TOKENS_ENV, "1200"),
            (LlmSettings::TEMPERATURE_ENV, "0.1"),
            (LlmSettings::DEPLOYMENT_ENV, "contracts"),
        ]))
        .expect("should parse overrides");
        assert_eq!(settings.provider, ProviderKind::Azure);
        assert_eq!(settings.timeout_secs, Some(45));
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.api_version.as_deref(), Some("2024-07-01"));
        assert_eq!(settings.max_output_tokens, 1200);
        assert_eq!(settings.deployment.as_deref(), Some("contracts"));
    }

    #[test]
    fn ignores_unparsable_numbers() {
        let settings = LlmSettings::from_vars(vars(&[
            (LlmSettings::PROVIDER_ENV, "noop"),
            (LlmSettings::RETRIES_ENV, "many"),
        ]))
        .unwrap();
        assert_eq!(settings.max_retries, 2);
    }
}
