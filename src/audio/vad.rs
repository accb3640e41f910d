//! Voice Activity Detection (VAD) module.
//!
//! Detects utterance boundaries using RMS thresholding and a small state
//! machine. Silence is measured in audio time (samples / rate), not wall time,
//! so frames that sat in the capture queue are judged by what they contain.

use crate::defaults;

/// Configuration for Voice Activity Detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadConfig {
    /// RMS threshold for detecting speech (0.0 to 1.0).
    pub speech_threshold: f32,
    /// Duration of silence before speech is considered ended (milliseconds).
    pub silence_duration_ms: u32,
    /// Minimum duration of speech for an utterance to count (milliseconds).
    pub min_speech_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            speech_threshold: defaults::VAD_THRESHOLD,
            silence_duration_ms: defaults::SILENCE_DURATION_MS,
            min_speech_ms: defaults::MIN_SPEECH_MS,
        }
    }
}

/// Current state of voice activity detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    /// No speech detected.
    Idle,
    /// Speech is being detected.
    Speaking,
    /// Silence detected, waiting to confirm speech end.
    MaybeSilence,
}

/// Events emitted by the VAD processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEvent {
    /// Speech has started.
    SpeechStart,
    /// Ongoing speech detected.
    Speech,
    /// Silence (outside speech, or a pause shorter than the end threshold).
    Silence,
    /// Speech has ended; `speech_ms` is the voiced audio in the utterance.
    SpeechEnd { speech_ms: u32 },
}

/// Voice Activity Detector state machine.
#[derive(Debug, Clone)]
pub struct Vad {
    config: VadConfig,
    state: VadState,
    silence_ms: u32,
    speech_ms: u32,
}

impl Vad {
    /// Creates a new VAD instance with the given configuration.
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            state: VadState::Idle,
            silence_ms: 0,
            speech_ms: 0,
        }
    }

    /// Processes one block of samples and returns the resulting event.
    pub fn process(&mut self, samples: &[i16], sample_rate: u32) -> VadEvent {
        let is_speech = calculate_rms(samples) > self.config.speech_threshold;
        let block_ms = block_duration_ms(samples.len(), sample_rate);

        match self.state {
            VadState::Idle => {
                if is_speech {
                    self.state = VadState::Speaking;
                    self.speech_ms = block_ms;
                    self.silence_ms = 0;
                    VadEvent::SpeechStart
                } else {
                    VadEvent::Silence
                }
            }
            VadState::Speaking => {
                if is_speech {
                    self.speech_ms += block_ms;
                    VadEvent::Speech
                } else {
                    self.state = VadState::MaybeSilence;
                    self.silence_ms = block_ms;
                    self.check_end()
                }
            }
            VadState::MaybeSilence => {
                if is_speech {
                    self.state = VadState::Speaking;
                    self.speech_ms += block_ms;
                    self.silence_ms = 0;
                    VadEvent::Speech
                } else {
                    self.silence_ms += block_ms;
                    self.check_end()
                }
            }
        }
    }

    fn check_end(&mut self) -> VadEvent {
        if self.silence_ms >= self.config.silence_duration_ms {
            let speech_ms = self.speech_ms;
            self.reset();
            VadEvent::SpeechEnd { speech_ms }
        } else {
            VadEvent::Silence
        }
    }

    /// Returns the current VAD state.
    pub fn state(&self) -> VadState {
        self.state
    }

    /// Resets the VAD to idle state.
    pub fn reset(&mut self) {
        self.state = VadState::Idle;
        self.silence_ms = 0;
        self.speech_ms = 0;
    }

    /// The active configuration.
    pub fn config(&self) -> &VadConfig {
        &self.config
    }
}

fn block_duration_ms(samples: usize, sample_rate: u32) -> u32 {
    if sample_rate == 0 {
        return 0;
    }
    (samples as u64 * 1000 / sample_rate as u64) as u32
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// Returns a normalized value (0.0 to 1.0): 0.0 is silence, ~0.707 a
/// full-scale sine wave.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}
