use crate::defaults;
use crate::error::{Result, VaaniError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub stt: SttConfig,
    pub llm: LlmConfig,
    pub speech: SpeechConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    /// Samples per frame handed to the recognizer.
    pub block_size: usize,
    /// Frames buffered between the capture callback and the recognizer.
    pub queue_capacity: usize,
    pub vad_threshold: f32,
    pub silence_duration_ms: u32,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    /// Model file, or a directory holding one.
    pub model_path: String,
    pub language: String,
    /// Utterances with fewer words are ignored.
    pub min_words: usize,
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub endpoint: String,
    pub request_timeout_secs: u64,
}

/// Speech output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    pub program: String,
    pub voice: String,
    pub rate: u32,
    pub speak_after_words: usize,
    /// Pause after playback before the microphone reopens.
    pub settle_ms: u64,
    pub render_timeout_secs: u64,
    pub startup_text: String,
    pub prompt_text: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            block_size: defaults::BLOCK_SIZE,
            queue_capacity: defaults::QUEUE_CAPACITY,
            vad_threshold: defaults::VAD_THRESHOLD,
            silence_duration_ms: defaults::SILENCE_DURATION_MS,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model_path: defaults::STT_MODEL_PATH.to_string(),
            language: defaults::STT_LANGUAGE.to_string(),
            min_words: defaults::MIN_WORDS,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: defaults::LLM_MODEL.to_string(),
            endpoint: defaults::OLLAMA_URL.to_string(),
            request_timeout_secs: defaults::LLM_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            program: defaults::TTS_PROGRAM.to_string(),
            voice: defaults::TTS_VOICE.to_string(),
            rate: defaults::TTS_RATE,
            speak_after_words: defaults::SPEAK_AFTER_WORDS,
            settle_ms: defaults::SETTLE_MS,
            render_timeout_secs: defaults::RENDER_TIMEOUT_SECS,
            startup_text: defaults::STARTUP_TEXT.to_string(),
            prompt_text: defaults::PROMPT_TEXT.to_string(),
        }
    }
}

/// Shortest settle delay that reliably outlasts speaker echo.
pub const MIN_SETTLE_MS: u64 = 300;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VaaniError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                VaaniError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults only if the file is missing.
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(VaaniError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VAANI_LLM_MODEL → llm.model
    /// - VAANI_STT_MODEL → stt.model_path
    /// - VAANI_AUDIO_DEVICE → audio.device
    /// - VAANI_OLLAMA_URL → llm.endpoint
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("VAANI_LLM_MODEL")
            && !model.is_empty()
        {
            self.llm.model = model;
        }

        if let Ok(path) = std::env::var("VAANI_STT_MODEL")
            && !path.is_empty()
        {
            self.stt.model_path = path;
        }

        if let Ok(device) = std::env::var("VAANI_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        if let Ok(url) = std::env::var("VAANI_OLLAMA_URL")
            && !url.is_empty()
        {
            self.llm.endpoint = url;
        }

        self
    }

    /// Reject values the voice loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> Result<()> {
            Err(VaaniError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            })
        }

        if self.audio.sample_rate == 0 {
            return invalid("audio.sample_rate", "must be greater than 0");
        }
        if self.audio.block_size == 0 {
            return invalid("audio.block_size", "must be greater than 0");
        }
        if self.audio.queue_capacity == 0 {
            return invalid("audio.queue_capacity", "must be greater than 0");
        }
        if !(0.0..=1.0).contains(&self.audio.vad_threshold) {
            return invalid("audio.vad_threshold", "must be between 0.0 and 1.0");
        }
        if self.speech.speak_after_words == 0 {
            return invalid("speech.speak_after_words", "must be at least 1");
        }
        if self.speech.settle_ms < MIN_SETTLE_MS {
            return invalid(
                "speech.settle_ms",
                &format!("must be at least {} ms", MIN_SETTLE_MS),
            );
        }
        if self.speech.render_timeout_secs == 0 {
            return invalid("speech.render_timeout_secs", "must be greater than 0");
        }
        if self.llm.request_timeout_secs == 0 {
            return invalid("llm.request_timeout_secs", "must be greater than 0");
        }
        Ok(())
    }

    /// Serialize back to TOML (for `config show`).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| VaaniError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/vaani/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vaani")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: only called with ENV_LOCK held
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_vaani_env() {
        remove_env("VAANI_LLM_MODEL");
        remove_env("VAANI_STT_MODEL");
        remove_env("VAANI_AUDIO_DEVICE");
        remove_env("VAANI_OLLAMA_URL");
    }

    fn write_temp(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.audio.device, None);
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.block_size, 4000);

        assert_eq!(config.stt.model_path, "model");
        assert_eq!(config.stt.language, "hi");
        assert_eq!(config.stt.min_words, 2);

        assert_eq!(config.llm.model, "hindi-smart:latest");
        assert_eq!(config.llm.endpoint, "http://localhost:11434");

        assert_eq!(config.speech.program, "espeak-ng");
        assert_eq!(config.speech.voice, "hi");
        assert_eq!(config.speech.rate, 150);
        assert_eq!(config.speech.speak_after_words, 3);
        assert_eq!(config.speech.settle_ms, 300);
        assert_eq!(config.speech.render_timeout_secs, 10);
        assert_eq!(config.speech.prompt_text, "बोलिए");

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_file = write_temp(
            r#"
            [audio]
            device = "hw:0,0"
            sample_rate = 48000
            block_size = 8000

            [stt]
            model_path = "/opt/models/ggml-small.bin"
            min_words = 3

            [llm]
            model = "llama3"
            endpoint = "http://gpu-box:11434"

            [speech]
            voice = "hi+f3"
            speak_after_words = 5
            settle_ms = 500
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.audio.device, Some("hw:0,0".to_string()));
        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.audio.block_size, 8000);
        assert_eq!(config.stt.model_path, "/opt/models/ggml-small.bin");
        assert_eq!(config.stt.min_words, 3);
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.llm.endpoint, "http://gpu-box:11434");
        assert_eq!(config.speech.voice, "hi+f3");
        assert_eq!(config.speech.speak_after_words, 5);
        assert_eq!(config.speech.settle_ms, 500);
        // Untouched fields keep defaults
        assert_eq!(config.speech.program, "espeak-ng");
        assert_eq!(config.stt.language, "hi");
    }

    #[test]
    fn test_env_override_each_variable() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_vaani_env();

        set_env("VAANI_LLM_MODEL", "qwen2");
        set_env("VAANI_STT_MODEL", "/tmp/model");
        set_env("VAANI_AUDIO_DEVICE", "pulse");
        set_env("VAANI_OLLAMA_URL", "http://10.0.0.2:11434");

        let config = Config::default().with_env_overrides();

        assert_eq!(config.llm.model, "qwen2");
        assert_eq!(config.stt.model_path, "/tmp/model");
        assert_eq!(config.audio.device, Some("pulse".to_string()));
        assert_eq!(config.llm.endpoint, "http://10.0.0.2:11434");

        clear_vaani_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_vaani_env();

        set_env("VAANI_LLM_MODEL", "");
        let config = Config::default().with_env_overrides();
        assert_eq!(config.llm.model, "hindi-smart:latest");

        clear_vaani_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let temp_file = write_temp(
            r#"
            [audio
            device = "broken
        "#,
        );

        assert!(matches!(
            Config::load(temp_file.path()),
            Err(VaaniError::Config(_))
        ));
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_vaani_config_12345.toml");
        assert!(matches!(
            Config::load(missing_path),
            Err(VaaniError::ConfigFileNotFound { .. })
        ));
        assert_eq!(Config::load_or_default(missing_path).unwrap(), Config::default());
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        let cases: Vec<(&str, Box<dyn Fn(&mut Config)>)> = vec![
            ("audio.sample_rate", Box::new(|c| c.audio.sample_rate = 0)),
            ("audio.block_size", Box::new(|c| c.audio.block_size = 0)),
            ("speech.speak_after_words", Box::new(|c| c.speech.speak_after_words = 0)),
            ("speech.settle_ms", Box::new(|c| c.speech.settle_ms = 299)),
            ("speech.render_timeout_secs", Box::new(|c| c.speech.render_timeout_secs = 0)),
        ];

        for (key, mutate) in cases {
            let mut config = Config::default();
            mutate(&mut config);
            match config.validate() {
                Err(VaaniError::ConfigInvalidValue { key: k, .. }) => assert_eq!(k, key),
                other => panic!("{} should be rejected, got {:?}", key, other),
            }
        }
    }

    #[test]
    fn test_to_toml_round_trips_through_load() {
        let mut config = Config::default();
        config.llm.model = "custom".to_string();
        let temp_file = write_temp(&config.to_toml().unwrap());
        assert_eq!(Config::load(temp_file.path()).unwrap(), config);
    }

    #[test]
    fn test_default_path_is_xdg_compliant() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("vaani"));
        assert!(path_str.ends_with("config.toml"));
    }
}
