//! Speech adapters. The recognition and synthesis engines are platform
//! seams; the adapters own the retry, chunking, and cancellation logic so
//! that every platform binding stays thin.

pub mod input;
pub mod output;

pub use input::{
    RecognitionEngine, RecognitionErrorKind, RecognitionEvent, SpeechInput, SpeechInputError,
    StopHandle,
};
pub use output::{split_into_chunks, CancelHandle, SpeechOutput, SpeechOutputError, SynthesisEngine};
