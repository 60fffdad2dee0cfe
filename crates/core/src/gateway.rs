//! The AI response gateway: one request in, one assistant message (or a
//! typed failure) out. The gateway never retries; recovery policy belongs to
//! the session controller.

use crate::message::{without_system, Message, Role};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("API key error: the backend credential is not configured")]
    MissingCredentials,
    #[error("API quota exceeded: try again later")]
    QuotaExceeded,
    #[error("permission denied: the credential cannot access this resource")]
    PermissionDenied,
    #[error("response was not in the expected shape: {0}")]
    Unparseable(String),
    #[error("request failed: {0}")]
    Unknown(String),
}

impl GatewayError {
    /// Short label used as the `error` field of the HTTP failure envelope.
    pub fn label(&self) -> &'static str {
        match self {
            GatewayError::MissingCredentials => "API key error",
            GatewayError::QuotaExceeded => "API quota exceeded",
            GatewayError::PermissionDenied => "Permission denied",
            GatewayError::Unparseable(_) => "Unparseable response",
            GatewayError::Unknown(_) => "Failed to process the request",
        }
    }
}

/// Classifies a backend failure detail string. Quota is checked before the
/// credential substring because quota messages routinely mention the API key
/// too ("quota exceeded for this API key").
pub fn classify_failure(details: &str) -> GatewayError {
    if details.contains("quota") {
        GatewayError::QuotaExceeded
    } else if details.contains("permission") {
        GatewayError::PermissionDenied
    } else if details.contains("API key") {
        GatewayError::MissingCredentials
    } else {
        GatewayError::Unknown(details.to_string())
    }
}

/// Request body of the `/api/chat` relay contract. The system message rides
/// in its own field; the history never includes system-role entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub system_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub role: Role,
    pub content: String,
}

/// The HTTP 500 failure envelope shared by both relay endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub details: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResponseGateway: Send + Sync {
    /// Requests the next assistant turn. An empty history requests the
    /// opening turn. Callers must not issue a second call before the first
    /// resolves.
    async fn request_next_turn(
        &self,
        history: &[Message],
        system_instruction: &str,
    ) -> Result<Message, GatewayError>;
}

/// Gateway implementation that speaks the `/api/chat` relay contract,
/// for deployments where `viva-api` fronts the language model.
pub struct RelayGateway {
    client: reqwest::Client,
    base_url: String,
}

impl RelayGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ResponseGateway for RelayGateway {
    async fn request_next_turn(
        &self,
        history: &[Message],
        system_instruction: &str,
    ) -> Result<Message, GatewayError> {
        let body = ChatRequest {
            messages: without_system(history),
            system_message: system_instruction.to_string(),
        };
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Unknown(e.to_string()))?;

        if response.status().is_success() {
            let reply: ChatResponse = response
                .json()
                .await
                .map_err(|e| GatewayError::Unparseable(e.to_string()))?;
            if reply.role != Role::Assistant {
                return Err(GatewayError::Unparseable(format!(
                    "expected an assistant message, got {:?}",
                    reply.role
                )));
            }
            Ok(Message {
                id: reply.id,
                role: Role::Assistant,
                content: reply.content,
            })
        } else {
            let status = response.status();
            match response.json::<ErrorEnvelope>().await {
                Ok(envelope) => Err(classify_failure(&envelope.details)),
                Err(_) => Err(GatewayError::Unknown(format!(
                    "relay responded with status {status}"
                ))),
            }
        }
    }
}
