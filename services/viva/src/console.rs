//! Terminal stand-ins for the platform speech engines. Synthesis prints the
//! chunk and paces itself on its length so cancellation has something to
//! interrupt.

use async_trait::async_trait;
use std::time::Duration;
use viva_core::speech::SynthesisEngine;

/// Rough speaking pace used to simulate playback time.
const MS_PER_CHAR: u64 = 12;

pub struct ConsoleSynthesisEngine;

#[async_trait]
impl SynthesisEngine for ConsoleSynthesisEngine {
    fn is_supported(&self) -> bool {
        true
    }

    async fn speak_chunk(&self, text: &str) -> anyhow::Result<()> {
        println!("[voice] {text}");
        tokio::time::sleep(Duration::from_millis(MS_PER_CHAR * text.len() as u64)).await;
        Ok(())
    }

    fn cancel_all(&self) {
        tracing::debug!("playback cancelled");
    }
}
