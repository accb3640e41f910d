//! Half-duplex voice loop: listen, answer, listen again.
//!
//! ```text
//! AudioInput ─► CaptureQueue ─► Recognizer ─► UtteranceFilter ─► TurnStage
//!      ▲                                                            │ SpeechRequest
//!      └──────────── AudioGate ◄──── SpeechStation (thread) ◄───────┘
//! ```
//!
//! The orchestrator thread is the only consumer of the capture queue and runs
//! exactly one turn at a time. While the speech worker talks, the gate is
//! raised and the capture callback drops everything it hears.

use crate::audio::{AudioGate, AudioInput, CaptureQueue, CaptureStats};
use crate::defaults;
use crate::error::{Result, VaaniError};
use crate::llm::Generator;
use crate::output::ConsoleEcho;
use crate::pipeline::error::{ErrorReporter, LogReporter};
use crate::pipeline::speech_station::{SpeechRequest, SpeechStation, TurnComplete};
use crate::pipeline::station::StationRunner;
use crate::pipeline::turn::TurnStage;
use crate::stt::{Recognition, Recognizer, Transcript, UtteranceFilter, Verdict};
use crate::tts::{GatedSpeaker, Speaker};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Tunables for the voice loop.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub block_size: usize,
    pub queue_capacity: usize,
    pub min_words: usize,
    pub speak_after_words: usize,
    pub settle: Duration,
    pub render_timeout: Duration,
    /// Spoken once before the loop goes live. Empty skips it.
    pub startup_text: String,
    /// Spoken at the end of every turn and after the announcement.
    pub prompt_text: String,
    /// How often idle waits re-check the running flag.
    pub poll_interval: Duration,
}

/// Slack on top of one render and its settle delay before `stop` detaches.
const SHUTDOWN_MARGIN: Duration = Duration::from_millis(500);

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            block_size: defaults::BLOCK_SIZE,
            queue_capacity: defaults::QUEUE_CAPACITY,
            min_words: defaults::MIN_WORDS,
            speak_after_words: defaults::SPEAK_AFTER_WORDS,
            settle: Duration::from_millis(defaults::SETTLE_MS),
            render_timeout: Duration::from_secs(defaults::RENDER_TIMEOUT_SECS),
            startup_text: defaults::STARTUP_TEXT.to_string(),
            prompt_text: defaults::PROMPT_TEXT.to_string(),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// The collaborators the loop drives.
pub struct LoopParts {
    pub input: Box<dyn AudioInput>,
    pub recognizer: Box<dyn Recognizer>,
    pub generator: Arc<dyn Generator>,
    pub speaker: Box<dyn Speaker>,
}

/// Builds and starts the voice loop.
pub struct TurnOrchestrator {
    config: OrchestratorConfig,
    echo: Arc<ConsoleEcho>,
    error_reporter: Arc<dyn ErrorReporter>,
    gate: Option<Arc<AudioGate>>,
}

impl TurnOrchestrator {
    pub fn new(config: OrchestratorConfig, echo: Arc<ConsoleEcho>) -> Self {
        Self {
            config,
            echo,
            error_reporter: Arc::new(LogReporter),
            gate: None,
        }
    }

    /// Use an existing gate instead of creating one. Its settle delay
    /// replaces `config.settle`.
    pub fn with_gate(mut self, gate: Arc<AudioGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Start the speech worker, announce readiness, open the microphone and
    /// spawn the recognizer loop.
    ///
    /// # Errors
    /// Fails if a worker thread cannot be spawned or the audio input refuses
    /// to start. Nothing is left running on error.
    pub fn start(self, parts: LoopParts) -> Result<OrchestratorHandle> {
        let LoopParts {
            mut input,
            recognizer,
            generator,
            speaker,
        } = parts;
        let config = self.config;

        let running = Arc::new(AtomicBool::new(true));
        let gate = self
            .gate
            .unwrap_or_else(|| Arc::new(AudioGate::new(config.settle)));
        let queue = CaptureQueue::new(config.queue_capacity, gate.clone());
        let stats = queue.stats();

        let (speech_tx, speech_rx) = unbounded::<SpeechRequest>();
        let (done_tx, done_rx) = bounded::<TurnComplete>(4);

        let station = SpeechStation::new(
            GatedSpeaker::new(speaker, gate.clone(), config.render_timeout),
            queue.purger(),
            config.prompt_text.clone(),
            running.clone(),
        );
        let speech_runner =
            StationRunner::spawn(station, speech_rx, done_tx, self.error_reporter.clone())?;
        self.echo.banner("TTS ready");

        announce(&speech_tx, &done_rx, &config.startup_text);

        if let Err(e) = input.start(queue.feed(config.block_size)) {
            drop(speech_tx);
            abandon_start(&running, input.as_mut(), speech_runner);
            return Err(e);
        }
        tracing::info!(input = input.name(), "audio capture started");
        self.echo.banner("--- System Live ---");

        let turn = TurnStage::new(
            generator,
            config.speak_after_words,
            speech_tx,
            done_rx,
            self.echo.clone(),
            running.clone(),
        );
        let listener = Listener {
            queue,
            recognizer,
            filter: UtteranceFilter::new(config.min_words),
            turn,
            echo: self.echo.clone(),
            running: running.clone(),
            poll_interval: config.poll_interval,
        };

        // A failed spawn drops the closure, and the speech sender with it
        let loop_handle = match thread::Builder::new()
            .name("orchestrator".to_string())
            .spawn(move || listener.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                abandon_start(&running, input.as_mut(), speech_runner);
                return Err(VaaniError::Io(e));
            }
        };

        // The runner's own join reports panics; wrap it so stop() can poll it
        let speech_handle = match thread::Builder::new()
            .name("speech-join".to_string())
            .spawn(move || {
                if let Err(msg) = speech_runner.join() {
                    tracing::error!("{}", msg);
                }
            }) {
            Ok(handle) => handle,
            Err(e) => {
                // The listener sees the flag and takes the speech worker down with it
                running.store(false, Ordering::SeqCst);
                stop_input(input.as_mut());
                return Err(VaaniError::Io(e));
            }
        };

        let shutdown_grace = config.render_timeout + gate.settle_delay() + SHUTDOWN_MARGIN;

        Ok(OrchestratorHandle {
            running,
            threads: vec![loop_handle, speech_handle],
            input,
            gate,
            stats,
            echo: self.echo,
            shutdown_grace,
        })
    }
}

/// Undo a partial start. The speech sender must already be gone.
fn abandon_start(
    running: &AtomicBool,
    input: &mut dyn AudioInput,
    speech_runner: StationRunner<SpeechStation>,
) {
    running.store(false, Ordering::SeqCst);
    stop_input(input);
    if let Err(msg) = speech_runner.join() {
        tracing::error!("{}", msg);
    }
}

fn stop_input(input: &mut dyn AudioInput) {
    if let Err(e) = input.stop() {
        tracing::warn!(error = %e, "failed to stop audio capture");
    }
}

/// Startup announcement, spoken through the worker like any other turn.
fn announce(speech_tx: &Sender<SpeechRequest>, done_rx: &Receiver<TurnComplete>, text: &str) {
    if !text.trim().is_empty() {
        let _ = speech_tx.send(SpeechRequest::Say(text.to_string()));
    }
    if speech_tx.send(SpeechRequest::EndOfTurn).is_ok() && done_rx.recv().is_err() {
        tracing::warn!("speech worker exited during startup announcement");
    }
}

/// State owned by the orchestrator thread.
struct Listener {
    queue: CaptureQueue,
    recognizer: Box<dyn Recognizer>,
    filter: UtteranceFilter,
    turn: TurnStage,
    echo: Arc<ConsoleEcho>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl Listener {
    fn run(mut self) {
        tracing::debug!(recognizer = self.recognizer.name(), "listening");
        while self.running.load(Ordering::SeqCst) {
            let Some(frame) = self.queue.recv_timeout(self.poll_interval) else {
                continue;
            };

            match self.recognizer.feed(&frame) {
                Ok(Recognition::Pending) => {}
                Ok(Recognition::Finalized(text)) => self.on_utterance(text),
                Err(e) => tracing::warn!(error = %e, "recognition failed, continuing"),
            }
        }
        tracing::debug!("orchestrator loop exited");
    }

    fn on_utterance(&mut self, text: String) {
        match self.filter.check(Transcript::new(text)) {
            Verdict::Ignore(transcript) => {
                tracing::debug!(
                    words = transcript.word_count,
                    min = self.filter.min_words(),
                    "ignoring short utterance"
                );
                self.echo.ignored(&transcript.text);
            }
            Verdict::Accept(transcript) => {
                self.echo.user(&transcript.text);
                let report = self.turn.run(&transcript.text);
                tracing::info!(
                    tokens = report.tokens,
                    chunks = report.chunks,
                    generation_ms = report.generation.as_millis() as u64,
                    failed = report.error.is_some(),
                    "turn finished"
                );
                // Whatever was half-heard before the purge is stale now
                self.recognizer.reset();
            }
        }
    }
}

/// Handle to a running voice loop.
pub struct OrchestratorHandle {
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    input: Box<dyn AudioInput>,
    gate: Arc<AudioGate>,
    stats: Arc<CaptureStats>,
    echo: Arc<ConsoleEcho>,
    shutdown_grace: Duration,
}

impl OrchestratorHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn gate(&self) -> &Arc<AudioGate> {
        &self.gate
    }

    pub fn capture_stats(&self) -> &Arc<CaptureStats> {
        &self.stats
    }

    /// Stops the loop and the audio input.
    ///
    /// The speech worker finishes its current synthesis call and skips the
    /// rest. The grace period covers one full render plus its settle delay;
    /// threads still running after it are detached.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.echo.banner("--- Shutting down ---");

        stop_input(self.input.as_mut());

        let deadline = Instant::now() + self.shutdown_grace;
        let poll_interval = Duration::from_millis(50);

        loop {
            let mut remaining = Vec::new();
            for handle in self.threads.drain(..) {
                if handle.is_finished() {
                    if let Err(panic_info) = handle.join() {
                        let msg = panic_info
                            .downcast_ref::<&str>()
                            .copied()
                            .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                            .unwrap_or("unknown panic");
                        tracing::error!("pipeline thread panicked: {msg}");
                    }
                } else {
                    remaining.push(handle);
                }
            }
            self.threads = remaining;

            if self.threads.is_empty() {
                break;
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    threads = self.threads.len(),
                    "shutdown timeout, detaching remaining threads"
                );
                break;
            }
            thread::sleep(poll_interval);
        }

        tracing::info!(
            enqueued = self.stats.enqueued(),
            gated = self.stats.gated(),
            overflowed = self.stats.overflowed(),
            purged = self.stats.purged(),
            "capture totals"
        );
    }
}
