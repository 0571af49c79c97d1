//! Google Gemini backend for [`GenerativeBackend`].

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::ai::GenerativeBackend;
use crate::config::{AiConfig, RecoveryConfig};
use crate::error::{BotError, Result};
use crate::models::{ChatRole, ChatTurn};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    recovery: RecoveryConfig,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, config: &AiConfig) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(BotError::Config("GEMINI_API_KEY is empty".to_string()));
        }

        let http = Client::builder()
            .user_agent(concat!("savdo_bot/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key,
            base_url: GEMINI_API_URL.to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            recovery: config.recovery.clone(),
        })
    }

    /// Point the client at another endpoint (proxies, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_request(&self, system_prompt: &str, history: &[ChatTurn], message: &str) -> GeminiRequest {
        let mut contents: Vec<Content> = history
            .iter()
            .map(|turn| Content {
                role: match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "model",
                }
                .to_string(),
                parts: vec![Part {
                    text: turn.content.clone(),
                }],
            })
            .collect();
        contents.push(Content {
            role: "user".to_string(),
            parts: vec![Part {
                text: message.to_string(),
            }],
        });

        GeminiRequest {
            contents,
            system_instruction: (!system_prompt.is_empty()).then(|| SystemInstruction {
                parts: vec![Part {
                    text: system_prompt.to_string(),
                }],
            }),
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }

    async fn send_once(&self, payload: &GeminiRequest) -> std::result::Result<String, Attempt> {
        // The key travels in a header so it never shows up in a logged URL
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| Attempt::Retryable(BotError::from(e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Attempt::Retryable(BotError::from(e)))?;

        if !status.is_success() {
            let error = BotError::Backend(format!("Gemini error {status}: {body}"));
            return Err(if is_retryable(status) {
                Attempt::Retryable(error)
            } else {
                Attempt::Fatal(error)
            });
        }

        let parsed: GeminiResponse =
            serde_json::from_str(&body).map_err(|e| Attempt::Fatal(BotError::from(e)))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| Attempt::Fatal(BotError::Backend("Empty response from Gemini".to_string())))
    }
}

enum Attempt {
    Retryable(BotError),
    Fatal(BotError),
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Exponential backoff capped at the configured maximum, plus random jitter
pub fn retry_delay(recovery: &RecoveryConfig, attempt: u32) -> Duration {
    let exponential = recovery
        .base_retry_delay_ms
        .saturating_mul(2_u64.saturating_pow(attempt));
    let capped = exponential.min(recovery.max_retry_delay_ms);
    let jitter = rand::thread_rng().gen_range(0..=recovery.base_retry_delay_ms / 2);
    Duration::from_millis(capped + jitter)
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate(&self, system_prompt: &str, history: &[ChatTurn], message: &str) -> Result<String> {
        let payload = self.build_request(system_prompt, history, message);
        let mut attempt = 0;

        loop {
            match self.send_once(&payload).await {
                Ok(text) => {
                    debug!(model = %self.model, attempt, chars = text.len(), "Gemini reply received");
                    return Ok(text);
                }
                Err(Attempt::Retryable(e)) if attempt < self.recovery.max_retries => {
                    let delay = retry_delay(&self.recovery, attempt);
                    warn!(error = %e, attempt, delay_ms = delay.as_millis() as u64, "Gemini call failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(Attempt::Retryable(e)) | Err(Attempt::Fatal(e)) => return Err(e),
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}
