//! Core engine for voice-driven mock interviews and viva voce practice
//! sessions: session state machine, prompt construction, the AI response
//! gateway, speech adapters, and post-session feedback.

pub mod classifier;
pub mod config;
pub mod feedback;
pub mod gateway;
pub mod gemini;
pub mod message;
pub mod prompt;
pub mod session;
pub mod speech;

/// Main questions per session. The persona is instructed to ask exactly this
/// many and the progress counter caps here.
pub const TOTAL_QUESTIONS: u8 = 5;

pub use classifier::{CompletionClassifier, PhraseClassifier};
pub use config::{JobInterviewConfig, SessionConfig, SubjectiveVivaConfig, UserProfile};
pub use feedback::{generate_feedback, FeedbackBackend, FeedbackReport};
pub use gateway::{GatewayError, ResponseGateway};
pub use message::{Message, Role};
pub use session::{Command, SessionController, TurnOutcome, TurnState};
