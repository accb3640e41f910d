//! vaani - hands-free Hindi voice assistant
//!
//! Listens on the microphone, transcribes each utterance, streams a reply
//! from a local language model and speaks it back in short chunks while the
//! model is still generating. The microphone is gated while the assistant
//! speaks, so it never answers itself.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod stt;
pub mod tts;

// Composition root - needs a real device and a real model server
#[cfg(all(feature = "cpal-audio", feature = "ollama"))]
pub mod app;

// Capabilities
pub use audio::{AudioGate, AudioInput, CaptureQueue, Frame};
pub use llm::Generator;
pub use stt::{Recognizer, Transcriber};
pub use tts::Speaker;

// Pipeline
pub use pipeline::{
    LoopParts, OrchestratorConfig, OrchestratorHandle, SpeechChunker, TurnOrchestrator,
};

// Error handling
pub use error::{Result, VaaniError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_has_hash_only_when_built_in_git() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            let hash_part = ver.split('+').nth(1).unwrap_or("");
            assert_eq!(hash_part.len(), 7, "Git hash should be 7 chars, got: {}", ver);
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
