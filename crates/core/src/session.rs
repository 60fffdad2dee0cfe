//! The conversational session controller: owns the transcript, drives
//! turn-taking against the response gateway, tracks progress, and decouples
//! speech side effects from the decision logic through a command channel.

use crate::classifier::{counts_as_question, CompletionClassifier, PhraseClassifier};
use crate::config::SessionConfig;
use crate::gateway::{GatewayError, ResponseGateway};
use crate::message::{without_system, Message};
use crate::prompt::build_system_instruction;
use crate::TOTAL_QUESTIONS;
use tokio::sync::mpsc;

/// Scripted opening used when the gateway cannot produce the first turn.
/// The user is never left waiting on a dead backend.
pub const FALLBACK_OPENING: &str = "Hello! I'm Morgan Hale from Caliber Labs, and I'll be \
conducting your session today. Let's start with the first question: tell me about your \
understanding of this subject.";

/// Scripted reply used when a mid-session gateway call fails. The session
/// stays open so the user can retry.
pub const FALLBACK_REPLY: &str = "I apologize, but I'm having trouble processing your response \
right now. Please try again or rephrase your answer.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Initializing,
    AwaitingUserInput,
    AwaitingAiResponse,
    Complete,
}

/// Side effects the controller asks the runtime to perform. Keeping these on
/// a channel keeps speech hardware out of the decision logic.
#[derive(Debug, Clone)]
pub enum Command {
    /// Speak an assistant message. `resume_listening` asks the runtime to
    /// re-arm speech input once playback finishes.
    Speak {
        text: String,
        resume_listening: bool,
    },
    /// The session ended; the final assistant message is attached.
    SessionComplete(String),
}

/// Result of one `submit_user_response` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The submission was a no-op: blank input, a turn already in flight,
    /// or a completed session.
    Rejected,
    /// The assistant answered and the session continues.
    Answered,
    /// The gateway failed; a scripted fallback reply was appended and the
    /// error recorded.
    Recovered,
    /// The assistant signalled completion; no further turns are accepted.
    Completed,
}

pub struct SessionController<C = PhraseClassifier> {
    config: SessionConfig,
    system_instruction: String,
    transcript: Vec<Message>,
    question_count: u8,
    state: TurnState,
    last_error: Option<GatewayError>,
    voice_mode: bool,
    classifier: C,
    commands: Option<mpsc::Sender<Command>>,
}

impl SessionController<PhraseClassifier> {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_classifier(config, PhraseClassifier)
    }
}

impl<C: CompletionClassifier> SessionController<C> {
    pub fn with_classifier(config: SessionConfig, classifier: C) -> Self {
        let system_instruction = build_system_instruction(&config);
        let transcript = vec![Message::system(system_instruction.clone())];
        Self {
            config,
            system_instruction,
            transcript,
            question_count: 0,
            state: TurnState::Initializing,
            last_error: None,
            voice_mode: false,
            classifier,
            commands: None,
        }
    }

    pub fn with_commands(mut self, commands: mpsc::Sender<Command>) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn set_voice_mode(&mut self, on: bool) {
        self.voice_mode = on;
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn question_count(&self) -> u8 {
        self.question_count
    }

    pub fn is_complete(&self) -> bool {
        self.state == TurnState::Complete
    }

    pub fn last_error(&self) -> Option<&GatewayError> {
        self.last_error.as_ref()
    }

    /// The full transcript, leading system message included.
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// The transcript as rendered and as submitted for analysis.
    pub fn visible_transcript(&self) -> Vec<Message> {
        without_system(&self.transcript)
    }

    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.transcript
            .iter()
            .rev()
            .find(|m| m.role == crate::message::Role::Assistant)
    }

    /// Obtains the opening assistant turn. Valid once, directly after
    /// construction; a gateway failure degrades to the scripted opening so
    /// the session always becomes interactive.
    pub async fn open<G: ResponseGateway + ?Sized>(&mut self, gateway: &G) {
        if self.state != TurnState::Initializing {
            return;
        }
        let opening = match gateway.request_next_turn(&[], &self.system_instruction).await {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(%error, "opening turn failed, using scripted fallback");
                self.last_error = Some(error);
                Message::assistant(FALLBACK_OPENING)
            }
        };
        let text = opening.content.clone();
        self.transcript.push(opening);
        self.state = TurnState::AwaitingUserInput;
        self.speak(text, self.voice_mode).await;
    }

    /// Submits one user turn. No-op unless the controller is awaiting user
    /// input and the text is non-blank; exactly one gateway call is issued
    /// per accepted submission.
    pub async fn submit_user_response<G: ResponseGateway + ?Sized>(
        &mut self,
        gateway: &G,
        text: &str,
    ) -> TurnOutcome {
        if self.state != TurnState::AwaitingUserInput || text.trim().is_empty() {
            return TurnOutcome::Rejected;
        }

        self.transcript.push(Message::user(text));
        self.state = TurnState::AwaitingAiResponse;
        self.last_error = None;

        let history = self.visible_transcript();
        match gateway
            .request_next_turn(&history, &self.system_instruction)
            .await
        {
            Ok(message) => {
                let content = message.content.clone();
                let complete = self.classifier.is_complete(&content);
                if counts_as_question(&content) {
                    self.question_count = (self.question_count + 1).min(TOTAL_QUESTIONS);
                }
                self.transcript.push(message);
                if complete {
                    self.state = TurnState::Complete;
                    self.speak(content.clone(), false).await;
                    self.send(Command::SessionComplete(content)).await;
                    TurnOutcome::Completed
                } else {
                    self.state = TurnState::AwaitingUserInput;
                    self.speak(content, self.voice_mode).await;
                    TurnOutcome::Answered
                }
            }
            Err(error) => {
                tracing::warn!(%error, "gateway call failed, appending scripted fallback reply");
                self.last_error = Some(error);
                self.transcript.push(Message::assistant(FALLBACK_REPLY));
                self.state = TurnState::AwaitingUserInput;
                self.speak(FALLBACK_REPLY.to_string(), self.voice_mode).await;
                TurnOutcome::Recovered
            }
        }
    }

    async fn speak(&self, text: String, resume_listening: bool) {
        if !self.voice_mode {
            return;
        }
        self.send(Command::Speak {
            text,
            resume_listening,
        })
        .await;
    }

    async fn send(&self, command: Command) {
        if let Some(tx) = &self.commands {
            if let Err(error) = tx.send(command).await {
                tracing::warn!(%error, "command channel closed, dropping side effect");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobInterviewConfig;
    use crate::gateway::MockResponseGateway;
    use crate::message::Role;
    use mockall::Sequence;

    fn job_config() -> SessionConfig {
        SessionConfig::Job(JobInterviewConfig {
            job_title: "Backend Engineer".into(),
            company: None,
            job_description: "Design API services".into(),
            required_skills: "Go, SQL".into(),
            experience_level: "mid-level".into(),
            interview_type: "technical".into(),
            additional_notes: None,
            user_profile: None,
        })
    }

    fn reply(content: &str) -> Result<Message, GatewayError> {
        Ok(Message::assistant(content.to_string()))
    }

    #[tokio::test]
    async fn opening_turn_seeds_transcript_and_state() {
        let mut gateway = MockResponseGateway::new();
        gateway
            .expect_request_next_turn()
            .withf(|history, instruction| {
                history.is_empty() && instruction.contains("Backend Engineer")
            })
            .once()
            .returning(|_, _| reply("Welcome! I'm Morgan Hale. First up: what is Go good at?"));

        let mut session = SessionController::new(job_config());
        assert_eq!(session.state(), TurnState::Initializing);
        session.open(&gateway).await;

        assert_eq!(session.state(), TurnState::AwaitingUserInput);
        let visible = session.visible_transcript();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].role, Role::Assistant);
        // The opening turn does not count toward progress.
        assert_eq!(session.question_count(), 0);
    }

    #[tokio::test]
    async fn opening_failure_degrades_to_scripted_fallback() {
        let mut gateway = MockResponseGateway::new();
        gateway
            .expect_request_next_turn()
            .once()
            .returning(|_, _| Err(GatewayError::Unknown("boom".into())));

        let mut session = SessionController::new(job_config());
        session.open(&gateway).await;

        assert_eq!(session.state(), TurnState::AwaitingUserInput);
        assert_eq!(session.visible_transcript()[0].content, FALLBACK_OPENING);
        assert!(session.last_error().is_some());
    }

    #[tokio::test]
    async fn blank_and_out_of_state_submissions_are_no_ops() {
        let gateway = MockResponseGateway::new();
        let mut session = SessionController::new(job_config());

        // Still Initializing: rejected without a gateway call.
        assert_eq!(
            session.submit_user_response(&gateway, "hello").await,
            TurnOutcome::Rejected
        );

        let mut gateway = MockResponseGateway::new();
        gateway
            .expect_request_next_turn()
            .once()
            .returning(|_, _| reply("Welcome. First question: what is SQL?"));
        session.open(&gateway).await;

        let before = session.transcript().to_vec();
        let quiet = MockResponseGateway::new();
        assert_eq!(
            session.submit_user_response(&quiet, "   ").await,
            TurnOutcome::Rejected
        );
        assert_eq!(session.transcript(), before.as_slice());
    }

    #[tokio::test]
    async fn transcript_is_append_only_and_question_count_capped() {
        let mut gateway = MockResponseGateway::new();
        let mut seq = Sequence::new();
        gateway
            .expect_request_next_turn()
            .once()
            .in_sequence(&mut seq)
            .returning(|_, _| reply("Welcome, Backend Engineer candidate. What is Go good at?"));
        for i in 0..6 {
            gateway
                .expect_request_next_turn()
                .once()
                .in_sequence(&mut seq)
                .returning(move |_, _| reply(&format!("Good. Question {}: why?", i + 2)));
        }

        let mut session = SessionController::new(job_config());
        session.open(&gateway).await;

        let mut snapshots: Vec<Vec<Message>> = vec![session.transcript().to_vec()];
        for i in 0..6 {
            let outcome = session
                .submit_user_response(&gateway, &format!("answer {i}"))
                .await;
            assert_eq!(outcome, TurnOutcome::Answered);
            let current = session.transcript().to_vec();
            let previous = snapshots.last().unwrap();
            // Every prior snapshot is a strict in-order prefix.
            assert_eq!(&current[..previous.len()], previous.as_slice());
            snapshots.push(current);
        }
        // Six question turns, but the counter caps at the configured total.
        assert_eq!(session.question_count(), TOTAL_QUESTIONS);
    }

    #[tokio::test]
    async fn full_interview_runs_to_completion() {
        let mut gateway = MockResponseGateway::new();
        let mut seq = Sequence::new();
        gateway
            .expect_request_next_turn()
            .withf(|history, _| history.is_empty())
            .once()
            .in_sequence(&mut seq)
            .returning(|_, _| {
                reply("Hello, I'll be interviewing you for the Backend Engineer role. First: what is Go good at?")
            });
        for i in 0..4 {
            gateway
                .expect_request_next_turn()
                .once()
                .in_sequence(&mut seq)
                .returning(move |_, _| reply(&format!("Noted. Question {}: tell me more?", i + 2)));
        }
        gateway
            .expect_request_next_turn()
            .once()
            .in_sequence(&mut seq)
            .returning(|_, _| {
                reply("Thank you, that was the last question. The interview is complete. You did well overall.")
            });

        let mut session = SessionController::new(job_config());
        session.open(&gateway).await;
        assert!(session.visible_transcript()[0]
            .content
            .contains("Backend Engineer"));

        for i in 0..4 {
            assert_eq!(
                session
                    .submit_user_response(&gateway, &format!("answer {i}"))
                    .await,
                TurnOutcome::Answered
            );
        }
        assert_eq!(
            session.submit_user_response(&gateway, "final answer").await,
            TurnOutcome::Completed
        );
        assert!(session.is_complete());

        // Completion is monotonic: further submissions are no-ops.
        let quiet = MockResponseGateway::new();
        let before = session.transcript().to_vec();
        assert_eq!(
            session.submit_user_response(&quiet, "one more").await,
            TurnOutcome::Rejected
        );
        assert_eq!(session.transcript(), before.as_slice());
    }

    #[tokio::test]
    async fn gateway_failure_recovers_with_fallback_and_classified_error() {
        let mut gateway = MockResponseGateway::new();
        let mut seq = Sequence::new();
        gateway
            .expect_request_next_turn()
            .once()
            .in_sequence(&mut seq)
            .returning(|_, _| reply("Welcome. First question: what is SQL?"));
        gateway
            .expect_request_next_turn()
            .once()
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Err(crate::gateway::classify_failure(
                    "quota exceeded for this API key",
                ))
            });

        let mut session = SessionController::new(job_config());
        session.open(&gateway).await;
        let outcome = session.submit_user_response(&gateway, "an answer").await;

        assert_eq!(outcome, TurnOutcome::Recovered);
        assert_eq!(session.last_error(), Some(&GatewayError::QuotaExceeded));
        assert!(!session.is_complete());
        assert_eq!(session.state(), TurnState::AwaitingUserInput);
        let visible = session.visible_transcript();
        assert_eq!(visible.last().unwrap().content, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn voice_mode_emits_speak_and_completion_commands() {
        let mut gateway = MockResponseGateway::new();
        let mut seq = Sequence::new();
        gateway
            .expect_request_next_turn()
            .once()
            .in_sequence(&mut seq)
            .returning(|_, _| reply("Welcome. First question: ready?"));
        gateway
            .expect_request_next_turn()
            .once()
            .in_sequence(&mut seq)
            .returning(|_, _| reply("Great, the interview is complete."));

        let (tx, mut rx) = mpsc::channel(8);
        let mut session = SessionController::new(job_config()).with_commands(tx);
        session.set_voice_mode(true);
        session.open(&gateway).await;

        match rx.try_recv().unwrap() {
            Command::Speak {
                resume_listening, ..
            } => assert!(resume_listening, "mid-session playback re-arms the mic"),
            other => panic!("expected Speak, got {other:?}"),
        }

        session.submit_user_response(&gateway, "ready").await;
        match rx.try_recv().unwrap() {
            Command::Speak {
                resume_listening, ..
            } => assert!(!resume_listening, "no mic re-arm after completion"),
            other => panic!("expected Speak, got {other:?}"),
        }
        assert!(matches!(
            rx.try_recv().unwrap(),
            Command::SessionComplete(_)
        ));
    }
}
