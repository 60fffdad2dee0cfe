//! The two relay endpoints. Both are thin: prompt construction, response
//! shaping, and failure classification all live in `viva-core`; the handlers
//! decide only which HTTP shape a result maps to.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use viva_core::feedback::{FeedbackBackend, FeedbackError, FeedbackReport};
use viva_core::gateway::{ChatRequest, ChatResponse, ErrorEnvelope, ResponseGateway};
use viva_core::session::FALLBACK_OPENING;
use viva_core::{Message, Role, SessionConfig};

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn ResponseGateway>,
    pub analyzer: Arc<dyn FeedbackBackend>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub messages: Vec<Message>,
    pub job_details: SessionConfig,
}

/// `POST /api/chat`: next assistant turn for the given history. An empty
/// history requests the opening turn; if that fails the scripted opening is
/// served with a 200 so a session can always begin. Mid-session failures
/// surface as a 500 envelope for the client to classify.
pub async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    let opening = request.messages.is_empty();
    match state
        .gateway
        .request_next_turn(&request.messages, &request.system_message)
        .await
    {
        Ok(message) => Json(ChatResponse {
            id: message.id,
            role: Role::Assistant,
            content: message.content,
        })
        .into_response(),
        Err(error) if opening => {
            tracing::warn!(%error, "opening turn failed, serving the scripted opening");
            Json(ChatResponse {
                id: uuid::Uuid::new_v4().to_string(),
                role: Role::Assistant,
                content: FALLBACK_OPENING.to_string(),
            })
            .into_response()
        }
        Err(error) => {
            tracing::error!(%error, "chat backend call failed");
            envelope(&error)
        }
    }
}

/// `POST /api/analyze-interview`: structured feedback for a finished
/// transcript. An unusable model reply degrades to a fixed report with a
/// 200; a backend failure returns the 500 envelope.
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Response {
    match state
        .analyzer
        .analyze(&request.messages, &request.job_details)
        .await
    {
        Ok(report) => Json(report).into_response(),
        Err(FeedbackError::MalformedResponse(details)) => {
            tracing::warn!(%details, "model report unusable, serving the fixed fallback");
            Json(fallback_report()).into_response()
        }
        Err(FeedbackError::Backend(error)) => {
            tracing::error!(%error, "analysis backend call failed");
            envelope(&error)
        }
    }
}

fn envelope(error: &viva_core::GatewayError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorEnvelope {
            error: error.label().to_string(),
            details: error.to_string(),
        }),
    )
        .into_response()
}

/// Served when the model answers but not in the agreed shape. Generic on
/// purpose; a wrong-but-plausible score would be worse than an honest one.
fn fallback_report() -> FeedbackReport {
    FeedbackReport {
        overall_score: 70,
        strengths: vec![
            "Completed the full session".to_string(),
            "Responded to every question asked".to_string(),
            "Maintained engagement throughout".to_string(),
        ],
        improvements: vec![
            "Support answers with specific examples".to_string(),
            "Structure longer answers around a clear main point".to_string(),
            "Quantify outcomes where possible".to_string(),
        ],
        detailed_feedback: "Detailed analysis was unavailable for this session. The scores and \
                            notes above are generic; review the transcript to judge where your \
                            answers were strongest."
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::routing::post;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use viva_core::config::JobInterviewConfig;
    use viva_core::GatewayError;

    struct StubGateway {
        result: fn(&[Message]) -> Result<Message, GatewayError>,
    }

    #[async_trait]
    impl ResponseGateway for StubGateway {
        async fn request_next_turn(
            &self,
            history: &[Message],
            _system_instruction: &str,
        ) -> Result<Message, GatewayError> {
            (self.result)(history)
        }
    }

    struct StubAnalyzer {
        result: fn() -> Result<FeedbackReport, FeedbackError>,
    }

    #[async_trait]
    impl FeedbackBackend for StubAnalyzer {
        async fn analyze(
            &self,
            _transcript: &[Message],
            _config: &SessionConfig,
        ) -> Result<FeedbackReport, FeedbackError> {
            (self.result)()
        }
    }

    fn app(
        gateway: fn(&[Message]) -> Result<Message, GatewayError>,
        analyzer: fn() -> Result<FeedbackReport, FeedbackError>,
    ) -> Router {
        let state = AppState {
            gateway: Arc::new(StubGateway { result: gateway }),
            analyzer: Arc::new(StubAnalyzer { result: analyzer }),
        };
        Router::new()
            .route("/api/chat", post(chat))
            .route("/api/analyze-interview", post(analyze))
            .with_state(state)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn job_details() -> serde_json::Value {
        serde_json::to_value(SessionConfig::Job(JobInterviewConfig {
            job_title: "QA Engineer".into(),
            company: None,
            job_description: "Test things".into(),
            required_skills: "attention".into(),
            experience_level: "junior".into(),
            interview_type: "technical".into(),
            additional_notes: None,
            user_profile: None,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn chat_returns_the_assistant_turn() {
        let app = app(
            |_| Ok(Message::assistant("First question: why testing?")),
            || unreachable!(),
        );
        let request = post_json(
            "/api/chat",
            serde_json::json!({ "messages": [], "systemMessage": "be an interviewer" }),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "First question: why testing?");
    }

    #[tokio::test]
    async fn chat_opening_failure_serves_the_scripted_opening() {
        let app = app(|_| Err(GatewayError::QuotaExceeded), || unreachable!());
        let request = post_json(
            "/api/chat",
            serde_json::json!({ "messages": [], "systemMessage": "be an interviewer" }),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["content"], FALLBACK_OPENING);
    }

    #[tokio::test]
    async fn chat_mid_session_failure_returns_the_classified_envelope() {
        let app = app(|_| Err(GatewayError::QuotaExceeded), || unreachable!());
        let history = serde_json::json!([
            { "id": "1", "role": "assistant", "content": "First question: why?" },
            { "id": "2", "role": "user", "content": "because" },
        ]);
        let request = post_json(
            "/api/chat",
            serde_json::json!({ "messages": history, "systemMessage": "be an interviewer" }),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "API quota exceeded");
        assert!(json["details"].as_str().unwrap().contains("quota"));
    }

    #[tokio::test]
    async fn analyze_returns_the_report() {
        let app = app(
            |_| unreachable!(),
            || {
                Ok(FeedbackReport {
                    overall_score: 82,
                    strengths: vec!["a".into(), "b".into(), "c".into()],
                    improvements: vec!["x".into(), "y".into(), "z".into()],
                    detailed_feedback: "good".into(),
                })
            },
        );
        let request = post_json(
            "/api/analyze-interview",
            serde_json::json!({ "messages": [], "jobDetails": job_details() }),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["overallScore"], 82);
    }

    #[tokio::test]
    async fn analyze_degrades_to_the_fixed_report_on_malformed_output() {
        let app = app(
            |_| unreachable!(),
            || Err(FeedbackError::MalformedResponse("not json".into())),
        );
        let request = post_json(
            "/api/analyze-interview",
            serde_json::json!({ "messages": [], "jobDetails": job_details() }),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["overallScore"], 70);
        assert_eq!(json["strengths"].as_array().unwrap().len(), 3);
    }
}
