//! Speech input adapter: wraps a platform recognition engine with retry,
//! timeout, and cancellation policy.
//!
//! Network failures are retried with a linear backoff; once the retry budget
//! is exhausted the adapter disables itself until the caller probes the
//! engine again through `reset_network_error_state`.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Network retry budget. A third consecutive network failure disables input.
pub const MAX_NETWORK_RETRIES: u32 = 2;
/// Base backoff; attempt `n` waits `n` times this.
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
/// An attempt that produces no event at all within this window is abandoned.
pub const INIT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    Network,
    NotAllowed,
    NoSpeech,
    Aborted,
    AudioCapture,
    ServiceNotAllowed,
}

/// What a recognition attempt emits. Interim transcripts may arrive any
/// number of times; a `Final` or `Error` ends the attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Interim(String),
    Final(String),
    Error(RecognitionErrorKind),
}

/// Platform seam for speech recognition. Implementations open one attempt
/// per call and feed events into the returned channel until it ends.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    fn is_supported(&self) -> bool;
    async fn open(&self) -> mpsc::Receiver<RecognitionEvent>;
    /// Cheap availability check used to decide whether a disabled adapter
    /// may be re-enabled.
    async fn probe(&self) -> bool;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SpeechInputError {
    #[error("speech recognition is not supported on this platform")]
    Unsupported,
    #[error("microphone permission was denied")]
    PermissionDenied,
    #[error("no speech was detected")]
    NoSpeechDetected,
    #[error("network errors persisted after {MAX_NETWORK_RETRIES} retries; input disabled")]
    NetworkPersistent,
    #[error("recognition produced no events within the startup window")]
    Timeout,
    #[error("recognition was aborted before any speech was captured")]
    Aborted,
    #[error("audio capture failed")]
    AudioCapture,
    #[error("the speech service refused the request")]
    ServiceNotAllowed,
}

/// Cancels an in-flight `listen` call. Cloneable and idempotent; stopping
/// returns whatever transcript was captured so far.
#[derive(Clone, Default)]
pub struct StopHandle {
    inner: Arc<StopInner>,
}

#[derive(Default)]
struct StopInner {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        if !self.inner.stopped.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_stopped() {
            return;
        }
        notified.await;
    }
}

pub struct SpeechInput<E> {
    engine: E,
    transcript: String,
    network_error_detected: bool,
}

impl<E: RecognitionEngine> SpeechInput<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            transcript: String::new(),
            network_error_detected: false,
        }
    }

    /// The transcript captured by the most recent `listen` call, final or not.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Whether input is disabled after persistent network failures.
    pub fn network_error_detected(&self) -> bool {
        self.network_error_detected
    }

    /// Probes the engine and, if it responds, clears the persistent network
    /// flag so that `listen` is accepted again.
    pub async fn reset_network_error_state(&mut self) -> bool {
        if self.engine.probe().await {
            self.network_error_detected = false;
            true
        } else {
            false
        }
    }

    /// Captures one utterance. Resolves with the final transcript, or with
    /// the partial transcript if `stop` fires first. Transient network
    /// failures restart the attempt with linear backoff.
    pub async fn listen(&mut self, stop: &StopHandle) -> Result<String, SpeechInputError> {
        if !self.engine.is_supported() {
            return Err(SpeechInputError::Unsupported);
        }
        if self.network_error_detected {
            return Err(SpeechInputError::NetworkPersistent);
        }

        self.transcript.clear();
        let mut retries: u32 = 0;

        'attempt: loop {
            let mut events = self.engine.open().await;
            let mut saw_event = false;

            loop {
                let event = if saw_event {
                    tokio::select! {
                        _ = stop.wait() => return self.partial_or(SpeechInputError::Aborted),
                        ev = events.recv() => ev,
                    }
                } else {
                    tokio::select! {
                        _ = stop.wait() => return self.partial_or(SpeechInputError::Aborted),
                        out = tokio::time::timeout(INIT_TIMEOUT, events.recv()) => match out {
                            Ok(ev) => ev,
                            Err(_) => {
                                retries += 1;
                                if retries > MAX_NETWORK_RETRIES {
                                    return Err(SpeechInputError::Timeout);
                                }
                                tracing::debug!(retries, "recognition startup timed out, retrying");
                                continue 'attempt;
                            }
                        },
                    }
                };

                match event {
                    Some(RecognitionEvent::Interim(text)) => {
                        saw_event = true;
                        self.transcript = text;
                    }
                    Some(RecognitionEvent::Final(text)) => {
                        self.transcript = text.clone();
                        return Ok(text);
                    }
                    Some(RecognitionEvent::Error(kind)) => match kind {
                        RecognitionErrorKind::Network => {
                            retries += 1;
                            if retries > MAX_NETWORK_RETRIES {
                                tracing::warn!(
                                    "persistent network errors, disabling speech input"
                                );
                                self.network_error_detected = true;
                                return Err(SpeechInputError::NetworkPersistent);
                            }
                            let delay = RETRY_BASE_DELAY * retries;
                            tracing::debug!(retries, ?delay, "network error, backing off");
                            tokio::select! {
                                _ = stop.wait() => {
                                    return self.partial_or(SpeechInputError::Aborted)
                                }
                                _ = tokio::time::sleep(delay) => {}
                            }
                            continue 'attempt;
                        }
                        RecognitionErrorKind::NoSpeech => {
                            // Not a fault; the user simply stayed quiet.
                            return Err(SpeechInputError::NoSpeechDetected);
                        }
                        RecognitionErrorKind::NotAllowed => {
                            return Err(SpeechInputError::PermissionDenied)
                        }
                        RecognitionErrorKind::AudioCapture => {
                            return Err(SpeechInputError::AudioCapture)
                        }
                        RecognitionErrorKind::ServiceNotAllowed => {
                            return Err(SpeechInputError::ServiceNotAllowed)
                        }
                        RecognitionErrorKind::Aborted => {
                            return self.partial_or(SpeechInputError::Aborted)
                        }
                    },
                    // The engine closed the attempt without a final result.
                    None => return self.partial_or(SpeechInputError::Aborted),
                }
            }
        }
    }

    fn partial_or(&self, error: SpeechInputError) -> Result<String, SpeechInputError> {
        if self.transcript.is_empty() {
            Err(error)
        } else {
            Ok(self.transcript.clone())
        }
    }
}
