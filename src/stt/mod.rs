//! Speech-to-text: transcription backends, streaming recognition and the
//! utterance filter.

pub mod filter;
pub mod recognizer;
pub mod transcriber;
pub mod whisper;

pub use filter::{Transcript, UtteranceFilter, Verdict};
pub use recognizer::{Recognition, Recognizer, ScriptedRecognizer, SegmentRecognizer};
pub use transcriber::{MockTranscriber, Transcriber};
pub use whisper::{WhisperConfig, WhisperTranscriber};
