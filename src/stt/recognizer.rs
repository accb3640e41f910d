//! Streaming recognizer: frames in, finalized utterances out.

use crate::audio::queue::Frame;
use crate::audio::vad::{Vad, VadConfig, VadEvent, VadState};
use crate::error::{Result, VaaniError};
use crate::stt::transcriber::Transcriber;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Result of feeding one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    /// Still listening; no utterance boundary yet.
    Pending,
    /// An utterance ended; this is its text.
    Finalized(String),
}

/// Trait for stateful streaming decoders.
///
/// Frames are consumed exactly once, in capture order.
pub trait Recognizer: Send {
    /// Feed one frame. Reports whether it closed an utterance.
    fn feed(&mut self, frame: &Frame) -> Result<Recognition>;

    /// Drop any partially heard utterance.
    fn reset(&mut self) {}

    /// Name for logging.
    fn name(&self) -> &str {
        "recognizer"
    }
}

/// Recognizer built from energy endpointing plus a one-shot [`Transcriber`].
///
/// Frames are buffered from speech start (with one frame of pre-roll so soft
/// onsets survive) until the VAD reports enough trailing silence, then the
/// whole utterance is transcribed at once.
pub struct SegmentRecognizer<T: Transcriber> {
    transcriber: T,
    vad: Vad,
    sample_rate: u32,
    max_utterance_samples: usize,
    buffer: Vec<i16>,
    preroll: Vec<i16>,
}

impl<T: Transcriber> SegmentRecognizer<T> {
    /// Creates a recognizer around a loaded transcriber.
    pub fn new(transcriber: T, vad: VadConfig, sample_rate: u32) -> Self {
        Self {
            transcriber,
            vad: Vad::new(vad),
            sample_rate,
            max_utterance_samples: sample_rate as usize * 30,
            buffer: Vec::new(),
            preroll: Vec::new(),
        }
    }

    /// Force-finalize utterances longer than this many seconds.
    pub fn with_max_utterance_secs(mut self, secs: u32) -> Self {
        self.max_utterance_samples = self.sample_rate as usize * secs.max(1) as usize;
        self
    }

    fn finalize(&mut self, speech_ms: u32) -> Result<Recognition> {
        let audio = std::mem::take(&mut self.buffer);
        self.preroll.clear();

        if speech_ms < self.vad.config().min_speech_ms {
            tracing::debug!(speech_ms, "utterance too short, not transcribing");
            return Ok(Recognition::Pending);
        }

        let text = self.transcriber.transcribe(&audio)?;
        let text = text.trim();
        if text.is_empty() {
            Ok(Recognition::Pending)
        } else {
            Ok(Recognition::Finalized(text.to_string()))
        }
    }

    fn buffered_ms(&self) -> u32 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.buffer.len() as u64 * 1000 / self.sample_rate as u64) as u32
    }
}

impl<T: Transcriber> Recognizer for SegmentRecognizer<T> {
    fn feed(&mut self, frame: &Frame) -> Result<Recognition> {
        match self.vad.process(&frame.samples, self.sample_rate) {
            VadEvent::SpeechStart => {
                self.buffer.clear();
                self.buffer.append(&mut self.preroll);
                self.buffer.extend_from_slice(&frame.samples);
            }
            VadEvent::SpeechEnd { speech_ms } => {
                self.buffer.extend_from_slice(&frame.samples);
                return self.finalize(speech_ms);
            }
            VadEvent::Speech | VadEvent::Silence => {
                if self.vad.state() == VadState::Idle {
                    self.preroll.clear();
                    self.preroll.extend_from_slice(&frame.samples);
                } else {
                    self.buffer.extend_from_slice(&frame.samples);
                }
            }
        }

        if self.buffer.len() >= self.max_utterance_samples {
            tracing::debug!("utterance hit length cap, finalizing early");
            let speech_ms = self.buffered_ms();
            self.vad.reset();
            return self.finalize(speech_ms);
        }

        Ok(Recognition::Pending)
    }

    fn reset(&mut self) {
        self.vad.reset();
        self.buffer.clear();
        self.preroll.clear();
    }

    fn name(&self) -> &str {
        self.transcriber.model_name()
    }
}

/// Shared log of frames a [`ScriptedRecognizer`] consumed.
pub type FrameLog = Arc<Mutex<Vec<Frame>>>;

/// Test recognizer that finalizes a scripted transcript every N frames.
pub struct ScriptedRecognizer {
    transcripts: VecDeque<String>,
    frames_per_utterance: usize,
    frames_since_final: usize,
    log: FrameLog,
    fail_next: bool,
}

impl ScriptedRecognizer {
    /// Finalize each of `transcripts` in order, one per frame by default.
    pub fn new<I, S>(transcripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            transcripts: transcripts.into_iter().map(Into::into).collect(),
            frames_per_utterance: 1,
            frames_since_final: 0,
            log: Arc::new(Mutex::new(Vec::new())),
            fail_next: false,
        }
    }

    /// Frames that make up one utterance.
    pub fn with_frames_per_utterance(mut self, frames: usize) -> Self {
        self.frames_per_utterance = frames.max(1);
        self
    }

    /// Fail the first finalization instead of returning text.
    pub fn with_failure(mut self) -> Self {
        self.fail_next = true;
        self
    }

    /// Handle to every frame fed so far.
    pub fn frame_log(&self) -> FrameLog {
        self.log.clone()
    }
}

impl Recognizer for ScriptedRecognizer {
    fn feed(&mut self, frame: &Frame) -> Result<Recognition> {
        if let Ok(mut log) = self.log.lock() {
            log.push(frame.clone());
        }

        self.frames_since_final += 1;
        if self.frames_since_final < self.frames_per_utterance {
            return Ok(Recognition::Pending);
        }
        self.frames_since_final = 0;

        if self.fail_next {
            self.fail_next = false;
            return Err(VaaniError::Recognition {
                message: "scripted recognition failure".to_string(),
            });
        }

        Ok(match self.transcripts.pop_front() {
            Some(text) => Recognition::Finalized(text),
            None => Recognition::Pending,
        })
    }

    fn reset(&mut self) {
        self.frames_since_final = 0;
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
