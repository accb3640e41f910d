//! Error types for vaani.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaaniError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Speech recognition errors
    #[error("Speech model not found at {path}")]
    RecognizerModelNotFound { path: String },

    #[error("Failed to load speech model: {message}")]
    RecognizerLoad { message: String },

    #[error("Recognition failed: {message}")]
    Recognition { message: String },

    // Generation errors
    #[error("Generation failed: {message}")]
    Generation { message: String },

    #[error("Generator request failed: {message}")]
    GeneratorRequest { message: String },

    // Synthesis errors
    #[error("Speech synthesis tool not found: {tool}")]
    SynthesisToolNotFound { tool: String },

    #[error("Speech synthesis failed: {message}")]
    SynthesisFailed { message: String },

    #[error("Speech synthesis timed out after {seconds}s")]
    SynthesisTimeout { seconds: u64 },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VaaniError {
    /// Whether this error belongs to the start-up class that ends the process.
    ///
    /// Everything else is recovered at the stage that raised it.
    pub fn is_fatal_startup(&self) -> bool {
        matches!(
            self,
            VaaniError::AudioDeviceNotFound { .. }
                | VaaniError::AudioCapture { .. }
                | VaaniError::RecognizerModelNotFound { .. }
                | VaaniError::RecognizerLoad { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, VaaniError>;
