//! LLM trend-analysis proxy
//!
//! Hands one trend window to an external OpenAI-compatible chat-completions
//! service and returns the model's markdown verbatim. The prompt is a fixed
//! template; the window's arrays are embedded as JSON, so request input
//! never reaches the prompt unescaped.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;

/// Connect + read timeout for the upstream call.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upper bound on the upstream response body.
const MAX_RESPONSE_BYTES: usize = 32 * 1024;

const SYSTEM_PROMPT: &str = "You are a professional health data analyst.";

const PROMPT_TEMPLATE: &str = r#"Analyze the following vital-sign trend window.

- Parameter: {parameter} ({unit})
- Time scale: {time_scale}
- Bucket timestamps (JSON): {timestamps}
- Bucket mean values (JSON): {values}

Describe the overall direction of the trend, any notable deviations or gaps,
and whether the values stay within a typical range for this parameter.
Respond in concise markdown: a one-paragraph summary, then bullet-point
observations, then practical non-diagnostic advice."#;

/// One trend window as submitted to the analysis endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TrendWindow {
    pub parameter: String,
    pub time_scale: String,
    pub unit: String,
    pub timestamps: Vec<String>,
    /// Bucket means; `null` marks a gap.
    pub values: Vec<Option<f64>>,
}

/// OpenAI-compatible chat request
#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// OpenAI-compatible chat response
#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Client for the external analysis service.
#[derive(Debug, Clone)]
pub struct TrendAnalyst {
    client: Client,
    config: LlmConfig,
}

impl TrendAnalyst {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build LLM HTTP client")?;

        Ok(Self { client, config })
    }

    /// Submit one trend window and return the model's markdown.
    pub async fn analyze(&self, window: &TrendWindow) -> Result<String> {
        let prompt = render_prompt(window);

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        debug!(model = %self.config.model, "calling LLM at {url}");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await
            .context("failed to reach LLM service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("LLM service returned {status}: {body}");
        }

        let body = response
            .bytes()
            .await
            .context("failed to read LLM response")?;
        if body.len() > MAX_RESPONSE_BYTES {
            bail!(
                "LLM response exceeded size cap ({} > {MAX_RESPONSE_BYTES} bytes)",
                body.len()
            );
        }

        let chat: ChatResponse =
            serde_json::from_slice(&body).context("failed to parse LLM response")?;

        chat.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .context("LLM response contained no choices")
    }
}

/// Fill the fixed template. Arrays are embedded as JSON so request strings
/// cannot alter the prompt structure.
fn render_prompt(window: &TrendWindow) -> String {
    let timestamps = serde_json::to_string(&window.timestamps).unwrap_or_else(|_| "[]".to_string());
    let values = serde_json::to_string(&window.values).unwrap_or_else(|_| "[]".to_string());

    PROMPT_TEMPLATE
        .replace("{parameter}", &window.parameter)
        .replace("{unit}", &window.unit)
        .replace("{time_scale}", &window.time_scale)
        .replace("{timestamps}", &timestamps)
        .replace("{values}", &values)
}
