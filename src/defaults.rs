//! Default configuration constants for vaani.
//!
//! Shared by the config file types and the pipeline builders so the two never
//! drift apart.

/// Default audio sample rate in Hz.
///
/// 16kHz is what the speech models expect.
pub const SAMPLE_RATE: u32 = 16000;

/// Samples per captured frame (250ms at 16kHz).
pub const BLOCK_SIZE: usize = 4000;

/// Frames the capture queue holds before new frames are dropped.
///
/// 256 blocks of 250ms is a bit over a minute of audio.
pub const QUEUE_CAPACITY: usize = 256;

/// RMS threshold (0.0 to 1.0) above which a frame counts as speech.
pub const VAD_THRESHOLD: f32 = 0.02;

/// Silence after speech that closes an utterance, in milliseconds.
pub const SILENCE_DURATION_MS: u32 = 800;

/// Shortest speech run worth transcribing, in milliseconds.
pub const MIN_SPEECH_MS: u32 = 250;

/// Default speech recognition model path.
pub const STT_MODEL_PATH: &str = "model";

/// Default recognition language.
pub const STT_LANGUAGE: &str = "hi";

/// Transcripts with fewer words than this are treated as noise.
pub const MIN_WORDS: usize = 2;

/// Default language model served by Ollama.
pub const LLM_MODEL: &str = "hindi-smart:latest";

/// Default Ollama endpoint.
pub const OLLAMA_URL: &str = "http://localhost:11434";

/// Seconds to wait for the generation request to connect and start streaming.
pub const LLM_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Text-to-speech program invoked once per utterance.
pub const TTS_PROGRAM: &str = "espeak-ng";

/// Voice passed to the TTS program.
pub const TTS_VOICE: &str = "hi";

/// Speaking rate (words per minute) passed to the TTS program.
pub const TTS_RATE: u32 = 150;

/// Buffered words that release a chunk for speech without waiting for punctuation.
pub const SPEAK_AFTER_WORDS: usize = 3;

/// Pause after audio output before the microphone is re-enabled.
///
/// Absorbs the device and room echo tail. Never configured below this value.
pub const SETTLE_MS: u64 = 300;

/// Upper bound on one synthesis call.
pub const RENDER_TIMEOUT_SECS: u64 = 10;

/// Spoken once when the system is ready.
pub const STARTUP_TEXT: &str = "सिस्टम तैयार है";

/// Spoken at the end of every turn to tell the user to talk ("speak").
pub const PROMPT_TEXT: &str = "बोलिए";

/// Characters that end a phrase and release the buffered text early.
pub const BOUNDARY_MARKS: &[char] = &['।', '.', '?', '!', ',', '\n'];

/// Report the GPU backend compiled into this build.
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else {
        "CPU"
    }
}
