//! Google Gemini `generateContent` client.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{truncate, GenerativeBackend, LlmSettings, SYSTEM_PROMPT};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const API_KEY_HEADER: &str = "x-goog-api-key";
const MAX_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    url: String,
    api_key: String,
    max_retries: u32,
    generation: GenerationConfig,
}

impl GeminiClient {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            bail!(
                "Gemini API key must be provided via {} or {}",
                LlmSettings::API_KEY_ENV,
                LlmSettings::GEMINI_KEY_ENV
            );
        }
        let base = settings.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        let model = settings.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let http = Client::builder()
            .user_agent(concat!("contract-lens/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.timeout_secs.unwrap_or(60)))
            .build()
            .context("failed to build Gemini HTTP client")?;

        Ok(Self {
            http,
            url: format!(
                "{}/v1beta/models/{model}:generateContent",
                base.trim_end_matches('/')
            ),
            api_key: settings.api_key.clone(),
            max_retries: settings.max_retries,
            generation: GenerationConfig {
                max_output_tokens: settings.max_output_tokens,
                temperature: settings.temperature,
            },
        })
    }

    fn request<'a>(&'a self, prompt: &'a str) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: SYSTEM_PROMPT,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: &self.generation,
        }
    }
}

/// Rate limits and server errors are worth another try; other statuses are not.
fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = self.request(prompt);
        let mut backoff = Duration::from_millis(200);

        for attempt in 0..=self.max_retries {
            let last = attempt == self.max_retries;
            if attempt > 0 {
                sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }

            let response = match self
                .http
                .post(&self.url)
                .header(API_KEY_HEADER, &self.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(err) if !last => {
                    debug!(attempt, error = %err, "retrying Gemini request after transport error");
                    continue;
                }
                Err(err) => return Err(err).context("failed to call Gemini generateContent API"),
            };

            let status = response.status();
            if !status.is_success() {
                if is_retryable(status) && !last {
                    debug!(%status, attempt, "retrying Gemini request");
                    continue;
                }
                let detail = response.text().await.unwrap_or_default();
                bail!("Gemini API error ({status}): {}", truncate(detail.trim(), 500));
            }

            let reply: GenerateContentResponse = response
                .json()
                .await
                .context("failed to parse Gemini response")?;
            return reply.into_text();
        }
        bail!("Gemini request was not attempted")
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: &'a GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Text parts of the first candidate, concatenated.
    fn into_text(self) -> Result<String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            bail!("Gemini blocked the prompt: {reason}");
        }
        let Some(candidate) = self.candidates.into_iter().next() else {
            bail!("Gemini response contained no candidates");
        };
        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if text.trim().is_empty() {
            let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
            warn!(finish_reason = reason, "Gemini candidate had no text");
            bail!("Gemini response missing text (finish reason {reason})");
        }
        Ok(text)
    }
}
