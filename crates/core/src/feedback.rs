//! Post-session feedback. A backend turns the finished transcript into a
//! structured report; when the backend fails, a deterministic local report
//! keeps the end-of-session screen populated.

use crate::config::SessionConfig;
use crate::gateway::{classify_failure, ErrorEnvelope, GatewayError};
use crate::gemini::{GeminiClient, GenerationConfig};
use crate::message::{without_system, Message, Role};
use crate::prompt::render_history;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

/// The structured report shown after a session ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackReport {
    pub overall_score: u8,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub detailed_feedback: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("feedback backend call failed: {0}")]
    Backend(#[from] GatewayError),
    #[error("the model returned an unusable report: {0}")]
    MalformedResponse(String),
}

/// Seam over whatever produces the report, so the session driver never
/// cares whether analysis happens locally or behind the relay.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FeedbackBackend: Send + Sync {
    async fn analyze(
        &self,
        transcript: &[Message],
        config: &SessionConfig,
    ) -> Result<FeedbackReport, FeedbackError>;
}

/// Builds the analysis prompt for a finished transcript.
pub fn analysis_prompt(config: &SessionConfig, transcript: &[Message]) -> String {
    let context = match config {
        SessionConfig::Job(job) => format!(
            "You are an expert interview coach. Analyze the following mock interview for a {} \
             position ({} interview, {} level).",
            job.job_title, job.interview_type, job.experience_level
        ),
        SessionConfig::Viva(viva) => format!(
            "You are an experienced examiner. Analyze the following viva voce examination on {} \
             (topic: {}, level: {}).",
            viva.subject, viva.topic, viva.subject_level
        ),
    };
    let history = render_history(&without_system(transcript));
    format!(
        "{context}\n\nTranscript:\n{history}\n\n\
         Respond with a single JSON object and nothing else, in this exact shape:\n\
         {{\n  \"overallScore\": <integer 0-100>,\n  \"strengths\": [<3 to 5 strings>],\n  \
         \"improvements\": [<3 to 5 strings>],\n  \"detailedFeedback\": <string>\n}}"
    )
}

/// Parses a model reply into a report. Tolerates code fences and prose
/// around the JSON object.
pub(crate) fn parse_report(text: &str) -> Result<FeedbackReport, FeedbackError> {
    let start = text
        .find('{')
        .ok_or_else(|| FeedbackError::MalformedResponse("no JSON object found".to_string()))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| FeedbackError::MalformedResponse("no JSON object found".to_string()))?;
    let mut report: FeedbackReport = serde_json::from_str(&text[start..=end])
        .map_err(|e| FeedbackError::MalformedResponse(e.to_string()))?;
    report.overall_score = report.overall_score.min(100);
    for (name, list) in [
        ("strengths", &report.strengths),
        ("improvements", &report.improvements),
    ] {
        if !(3..=5).contains(&list.len()) {
            return Err(FeedbackError::MalformedResponse(format!(
                "{name} must contain 3 to 5 entries, got {}",
                list.len()
            )));
        }
    }
    Ok(report)
}

/// Analyzer that calls the language model directly.
pub struct GeminiAnalyzer {
    client: GeminiClient,
}

impl GeminiAnalyzer {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedbackBackend for GeminiAnalyzer {
    async fn analyze(
        &self,
        transcript: &[Message],
        config: &SessionConfig,
    ) -> Result<FeedbackReport, FeedbackError> {
        let prompt = analysis_prompt(config, transcript);
        let generation = GenerationConfig {
            temperature: Some(0.2),
            max_output_tokens: Some(1024),
        };
        let text = self.client.generate(&prompt, generation).await?;
        parse_report(&text)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    messages: &'a [Message],
    job_details: &'a SessionConfig,
}

/// Analyzer that posts the transcript to the relay service.
pub struct RelayAnalyzer {
    client: reqwest::Client,
    base_url: String,
}

impl RelayAnalyzer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl FeedbackBackend for RelayAnalyzer {
    async fn analyze(
        &self,
        transcript: &[Message],
        config: &SessionConfig,
    ) -> Result<FeedbackReport, FeedbackError> {
        let visible = without_system(transcript);
        let request = AnalyzeRequest {
            messages: &visible,
            job_details: config,
        };
        let url = format!("{}/api/analyze-interview", self.base_url);
        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Unknown(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error = match response.json::<ErrorEnvelope>().await {
                Ok(envelope) => classify_failure(&envelope.details),
                Err(_) => GatewayError::Unknown(format!("relay responded with status {status}")),
            };
            return Err(error.into());
        }

        response
            .json::<FeedbackReport>()
            .await
            .map_err(|e| FeedbackError::MalformedResponse(e.to_string()))
    }
}

/// Produces a report no matter what. Backend failures are logged and the
/// deterministic local report takes over.
pub async fn generate_feedback<B: FeedbackBackend + ?Sized>(
    backend: &B,
    transcript: &[Message],
    config: &SessionConfig,
) -> FeedbackReport {
    match backend.analyze(transcript, config).await {
        Ok(report) => report,
        Err(error) => {
            tracing::warn!(%error, "feedback backend failed, building a local report");
            local_report(transcript, config)
        }
    }
}

const ANSWER_MARKERS: [&str; 8] = [
    "example",
    "experience",
    "result",
    "because",
    "learned",
    "team",
    "project",
    "measure",
];

/// Heuristic offline report. Scores answer length and the presence of a few
/// substance markers; intentionally modest and deterministic.
pub fn local_report(transcript: &[Message], config: &SessionConfig) -> FeedbackReport {
    let answers: Vec<&Message> = transcript
        .iter()
        .filter(|m| m.role == Role::User)
        .collect();
    let answer_count = answers.len();
    let total_words: usize = answers
        .iter()
        .map(|m| m.content.split_whitespace().count())
        .sum();
    let avg_words = if answer_count == 0 {
        0
    } else {
        total_words / answer_count
    };
    let marker_hits = answers
        .iter()
        .filter(|m| {
            let lower = m.content.to_lowercase();
            ANSWER_MARKERS.iter().any(|k| lower.contains(k))
        })
        .count();

    let score = if answer_count == 0 {
        0
    } else {
        (40 + avg_words.min(30) + 3 * marker_hits.min(5)).min(85) as u8
    };

    let setting = match config {
        SessionConfig::Job(job) => format!("the {} interview", job.job_title),
        SessionConfig::Viva(viva) => format!("the {} viva", viva.subject),
    };

    let mut strengths = vec![
        format!("Engaged with all {answer_count} questions asked"),
        "Maintained a consistent conversational flow".to_string(),
        "Stayed on topic throughout the session".to_string(),
    ];
    if avg_words >= 40 {
        strengths.push("Gave thorough, well-developed answers".to_string());
    }

    let mut improvements = vec![
        "Structure answers around concrete examples".to_string(),
        "Quantify outcomes where possible".to_string(),
        "Summarize the key point at the end of longer answers".to_string(),
    ];
    if avg_words < 15 {
        improvements.push("Expand short answers with supporting detail".to_string());
    }
    improvements.truncate(5);
    strengths.truncate(5);

    let detailed_feedback = format!(
        "Automated summary for {setting}: you answered {answer_count} question(s) at an average \
         of {avg_words} words per answer. A fuller analysis was unavailable, so this report is \
         based on surface measures only. Review the transcript and consider where specific \
         examples or measurable results could strengthen each answer."
    );

    FeedbackReport {
        overall_score: score,
        strengths,
        improvements,
        detailed_feedback,
    }
}
