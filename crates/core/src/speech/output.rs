//! Speech output adapter: splits long assistant turns into bounded chunks
//! and plays them sequentially through a platform synthesis engine.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Upper bound on a single synthesis chunk. Long chunks make some engines
/// cut out mid-utterance, so turns are split at sentence boundaries first.
pub const MAX_CHUNK_LEN: usize = 200;

/// Platform seam for speech synthesis.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    fn is_supported(&self) -> bool;
    /// Plays one chunk to completion.
    async fn speak_chunk(&self, text: &str) -> anyhow::Result<()>;
    /// Discards any queued or in-flight playback.
    fn cancel_all(&self);
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SpeechOutputError {
    #[error("speech synthesis is not supported on this platform")]
    Unsupported,
}

/// Cancels an in-flight `speak` call. Cloneable and idempotent.
#[derive(Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Splits `text` at sentence boundaries and greedily packs sentences into
/// chunks no longer than `max_len`. A single sentence over the bound is kept
/// whole rather than split mid-sentence.
pub fn split_into_chunks(text: &str, max_len: usize) -> Vec<String> {
    let mut sentences: Vec<&str> = Vec::new();
    let mut start = 0;
    let mut prev_terminal = false;
    for (idx, ch) in text.char_indices() {
        if prev_terminal && ch.is_whitespace() {
            let sentence = text[start..idx].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = idx;
        }
        prev_terminal = matches!(ch, '.' | '!' | '?');
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    for sentence in sentences {
        if current.is_empty() {
            current.push_str(sentence);
        } else if current.len() + 1 + sentence.len() <= max_len {
            current.push(' ');
            current.push_str(sentence);
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push_str(sentence);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

pub struct SpeechOutput<E> {
    engine: E,
}

impl<E: SynthesisEngine> SpeechOutput<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Speaks `text` chunk by chunk. A failed chunk is logged and skipped so
    /// one glitch never silences the rest of the turn. Returns once every
    /// chunk has played or `cancel` fires.
    pub async fn speak(&self, text: &str, cancel: &CancelHandle) -> Result<(), SpeechOutputError> {
        if !self.engine.is_supported() {
            return Err(SpeechOutputError::Unsupported);
        }
        let chunks = split_into_chunks(text, MAX_CHUNK_LEN);
        for (index, chunk) in chunks.iter().enumerate() {
            if cancel.is_cancelled() {
                self.engine.cancel_all();
                return Ok(());
            }
            tokio::select! {
                _ = cancel.wait() => {
                    self.engine.cancel_all();
                    return Ok(());
                }
                result = self.engine.speak_chunk(chunk) => {
                    if let Err(error) = result {
                        tracing::warn!(%error, index, "synthesis chunk failed, skipping");
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;

    fn long_sentence(label: &str) -> String {
        format!("{} {}.", label, "word".repeat(40))
    }

    #[test]
    fn short_text_stays_in_one_chunk() {
        let chunks = split_into_chunks("One. Two! Three?", MAX_CHUNK_LEN);
        assert_eq!(chunks, vec!["One. Two! Three?".to_string()]);
    }

    #[test]
    fn sentences_are_packed_up_to_the_bound() {
        let text = format!(
            "{} {} {}",
            long_sentence("alpha"),
            long_sentence("beta"),
            long_sentence("gamma")
        );
        let chunks = split_into_chunks(&text, MAX_CHUNK_LEN);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= MAX_CHUNK_LEN));
        assert!(chunks[0].starts_with("alpha"));
        assert!(chunks[2].starts_with("gamma"));
    }

    #[test]
    fn an_oversized_sentence_is_kept_whole() {
        let text = format!("Short one. {}", "x".repeat(300));
        let chunks = split_into_chunks(&text, MAX_CHUNK_LEN);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].len(), 300);
    }

    #[tokio::test]
    async fn chunks_play_sequentially_then_return() {
        let text = format!(
            "{} {} {}",
            long_sentence("first"),
            long_sentence("second"),
            long_sentence("third")
        );
        let mut engine = MockSynthesisEngine::new();
        engine.expect_is_supported().return_const(true);
        let mut seq = Sequence::new();
        for label in ["first", "second", "third"] {
            engine
                .expect_speak_chunk()
                .withf(move |chunk| chunk.starts_with(label))
                .once()
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        }

        let output = SpeechOutput::new(engine);
        let result = output.speak(&text, &CancelHandle::new()).await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn a_failed_chunk_does_not_silence_the_rest() {
        let text = format!("{} {}", long_sentence("first"), long_sentence("second"));
        let mut engine = MockSynthesisEngine::new();
        engine.expect_is_supported().return_const(true);
        let mut seq = Sequence::new();
        engine
            .expect_speak_chunk()
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Err(anyhow::anyhow!("device busy")));
        engine
            .expect_speak_chunk()
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let output = SpeechOutput::new(engine);
        let result = output.speak(&text, &CancelHandle::new()).await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn cancel_stops_playback_and_clears_the_engine() {
        let text = format!("{} {}", long_sentence("first"), long_sentence("second"));
        let mut engine = MockSynthesisEngine::new();
        engine.expect_is_supported().return_const(true);
        engine.expect_speak_chunk().never();
        engine.expect_cancel_all().once().return_const(());

        let output = SpeechOutput::new(engine);
        let cancel = CancelHandle::new();
        cancel.cancel();

        let result = output.speak(&text, &cancel).await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn unsupported_engine_is_reported() {
        let mut engine = MockSynthesisEngine::new();
        engine.expect_is_supported().return_const(false);
        engine.expect_speak_chunk().never();

        let output = SpeechOutput::new(engine);
        let result = output.speak("Hello there.", &CancelHandle::new()).await;
        assert_eq!(result, Err(SpeechOutputError::Unsupported));
    }
}
