//! Voice assistant entry point.
//!
//! Loads the recognizer, opens the microphone and starts the voice loop:
//! listen → transcribe → generate → speak

use crate::audio::capture::{CpalCapture, suppress_audio_warnings};
use crate::audio::vad::VadConfig;
use crate::config::Config;
use crate::defaults;
use crate::error::Result;
use crate::llm::{OllamaConfig, OllamaGenerator};
use crate::output::ConsoleEcho;
use crate::pipeline::{LoopParts, OrchestratorConfig, OrchestratorHandle, TurnOrchestrator};
use crate::stt::{SegmentRecognizer, WhisperConfig, WhisperTranscriber};
use crate::tts::{CommandSpeaker, VoiceSettings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub device: Option<String>,
    pub llm_model: Option<String>,
    pub stt_model: Option<PathBuf>,
}

impl Overrides {
    pub fn apply(self, mut config: Config) -> Config {
        if let Some(device) = self.device {
            config.audio.device = Some(device);
        }
        if let Some(model) = self.llm_model {
            config.llm.model = model;
        }
        if let Some(path) = self.stt_model {
            config.stt.model_path = path.to_string_lossy().into_owned();
        }
        config
    }
}

/// Loop tunables derived from the config.
pub fn orchestrator_config(config: &Config) -> OrchestratorConfig {
    OrchestratorConfig {
        block_size: config.audio.block_size,
        queue_capacity: config.audio.queue_capacity,
        min_words: config.stt.min_words,
        speak_after_words: config.speech.speak_after_words,
        settle: Duration::from_millis(config.speech.settle_ms),
        render_timeout: Duration::from_secs(config.speech.render_timeout_secs),
        startup_text: config.speech.startup_text.clone(),
        prompt_text: config.speech.prompt_text.clone(),
        ..Default::default()
    }
}

fn vad_config(config: &Config) -> VadConfig {
    VadConfig {
        speech_threshold: config.audio.vad_threshold,
        silence_duration_ms: config.audio.silence_duration_ms,
        min_speech_ms: defaults::MIN_SPEECH_MS,
    }
}

/// Load the speech model. Failure here is fatal.
pub fn load_recognizer(config: &Config) -> Result<SegmentRecognizer<WhisperTranscriber>> {
    let transcriber = WhisperTranscriber::new(WhisperConfig {
        model_path: PathBuf::from(&config.stt.model_path),
        language: config.stt.language.clone(),
        threads: None,
    })?;
    tracing::info!(
        model = crate::stt::Transcriber::model_name(&transcriber),
        backend = defaults::gpu_backend(),
        "speech model loaded"
    );
    Ok(SegmentRecognizer::new(
        transcriber,
        vad_config(config),
        config.audio.sample_rate,
    ))
}

/// Start the assistant and return once it is live.
///
/// # Errors
/// Model load and audio device failures are returned before anything is
/// spoken; they are the only fatal errors.
pub fn run(config: Config, echo: Arc<ConsoleEcho>) -> Result<OrchestratorHandle> {
    config.validate()?;

    // Before any ALSA/JACK probing
    suppress_audio_warnings();

    let recognizer = load_recognizer(&config)?;
    echo.banner("STT ready");

    let input = CpalCapture::open(
        config.audio.device.as_deref(),
        config.audio.sample_rate,
        config.audio.block_size,
    )?;

    let speaker = CommandSpeaker::new(VoiceSettings {
        program: config.speech.program.clone(),
        voice: config.speech.voice.clone(),
        rate: config.speech.rate,
    });
    if let Err(e) = speaker.check_available() {
        // Not fatal: every turn degrades to text-only output
        tracing::warn!(error = %e, "speech synthesizer unavailable");
    }

    let generator = OllamaGenerator::new(OllamaConfig {
        endpoint: config.llm.endpoint.clone(),
        model: config.llm.model.clone(),
        timeout: Duration::from_secs(config.llm.request_timeout_secs),
    })?;

    TurnOrchestrator::new(orchestrator_config(&config), echo).start(LoopParts {
        input: Box::new(input),
        recognizer: Box::new(recognizer),
        generator: Arc::new(generator),
        speaker: Box::new(speaker),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaaniError;

    #[test]
    fn overrides_replace_config_values() {
        let config = Overrides {
            device: Some("hw:1".to_string()),
            llm_model: Some("llama3".to_string()),
            stt_model: Some(PathBuf::from("/models/ggml-small.bin")),
        }
        .apply(Config::default());

        assert_eq!(config.audio.device.as_deref(), Some("hw:1"));
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.stt.model_path, "/models/ggml-small.bin");
    }

    #[test]
    fn empty_overrides_keep_config() {
        assert_eq!(Overrides::default().apply(Config::default()), Config::default());
    }

    #[test]
    fn orchestrator_config_follows_config() {
        let mut config = Config::default();
        config.speech.settle_ms = 450;
        config.speech.speak_after_words = 5;
        config.stt.min_words = 3;

        let oc = orchestrator_config(&config);
        assert_eq!(oc.settle, Duration::from_millis(450));
        assert_eq!(oc.speak_after_words, 5);
        assert_eq!(oc.min_words, 3);
        assert_eq!(oc.block_size, 4000);
        assert_eq!(oc.prompt_text, "बोलिए");
    }

    #[test]
    fn missing_model_is_fatal_before_audio() {
        let mut config = Config::default();
        config.stt.model_path = "/nonexistent/vaani/model".to_string();
        let echo = Arc::new(ConsoleEcho::buffered(true).0);

        match run(config, echo) {
            Err(e) => {
                assert!(matches!(e, VaaniError::RecognizerModelNotFound { .. }));
                assert!(e.is_fatal_startup());
            }
            Ok(_) => panic!("expected fatal startup error"),
        }
    }

    #[test]
    fn invalid_config_is_rejected_first() {
        let mut config = Config::default();
        config.speech.settle_ms = 10;
        let echo = Arc::new(ConsoleEcho::buffered(true).0);
        assert!(matches!(
            run(config, echo),
            Err(VaaniError::ConfigInvalidValue { .. })
        ));
    }
}
