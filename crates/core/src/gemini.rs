//! Thin client for the generative-language backend, plus the direct
//! [`ResponseGateway`] built on it. A missing credential surfaces as
//! `MissingCredentials` before any network call is made.

use crate::gateway::{classify_failure, GatewayError, ResponseGateway};
use crate::message::{without_system, Message};
use crate::prompt;
use async_trait::async_trait;
use serde::Deserialize;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct BackendError {
    error: BackendErrorBody,
}

#[derive(Debug, Deserialize)]
struct BackendErrorBody {
    message: String,
}

/// Sampling knobs for one generation call.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Points the client at a different endpoint. Used by tests and
    /// self-hosted proxies.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// One prompt in, one text completion out.
    pub async fn generate(
        &self,
        prompt: &str,
        config: GenerationConfig,
    ) -> Result<String, GatewayError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(GatewayError::MissingCredentials)?;

        let mut generation_config = serde_json::Map::new();
        if let Some(t) = config.temperature {
            generation_config.insert("temperature".into(), t.into());
        }
        if let Some(n) = config.max_output_tokens {
            generation_config.insert("maxOutputTokens".into(), n.into());
        }
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": generation_config,
        });

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        );
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Unknown(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return match response.json::<BackendError>().await {
                Ok(err) => Err(classify_failure(&err.error.message)),
                Err(_) => Err(GatewayError::Unknown(format!(
                    "backend responded with status {status}"
                ))),
            };
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Unparseable(e.to_string()))?;
        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| {
                GatewayError::Unparseable("no candidate text in the response".to_string())
            })?;
        Ok(text)
    }
}

/// Gateway that talks to the language model directly, without the relay
/// service in between.
pub struct GeminiGateway {
    client: GeminiClient,
}

impl GeminiGateway {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResponseGateway for GeminiGateway {
    async fn request_next_turn(
        &self,
        history: &[Message],
        system_instruction: &str,
    ) -> Result<Message, GatewayError> {
        let history = without_system(history);
        let prompt = if history.is_empty() {
            prompt::opening_prompt(system_instruction)
        } else {
            prompt::followup_prompt(system_instruction, &history)
        };
        let text = self.client.generate(&prompt, GenerationConfig::default()).await?;
        Ok(Message::assistant(text.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_credential_is_surfaced_without_a_network_call() {
        // base_url is unroutable on purpose; the call must fail before it
        // is ever used.
        let client =
            GeminiClient::new(None, DEFAULT_MODEL).with_base_url("http://127.0.0.1:1/v1beta");
        let result = client.generate("hello", GenerationConfig::default()).await;
        assert_eq!(result.unwrap_err(), GatewayError::MissingCredentials);
    }

    // Live test against the real backend. Run with `cargo test -- --ignored`
    // and a GOOGLE_API_KEY in the environment.
    #[tokio::test]
    #[ignore]
    async fn generate_produces_text() {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("GOOGLE_API_KEY").expect("GOOGLE_API_KEY not set");
        let client = GeminiClient::new(Some(api_key), DEFAULT_MODEL);
        let text = client
            .generate("Reply with the single word: ready", GenerationConfig::default())
            .await
            .expect("generation failed");
        assert!(!text.trim().is_empty());
    }
}
