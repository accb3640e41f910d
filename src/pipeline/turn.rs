//! One conversational turn: prompt in, spoken reply out.

use crate::llm::{Generator, TokenEvent, spawn_token_producer};
use crate::output::ConsoleEcho;
use crate::pipeline::chunker::SpeechChunker;
use crate::pipeline::speech_station::{SpeechRequest, TurnComplete};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What happened during a turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnReport {
    pub first_token: Option<Duration>,
    pub generation: Duration,
    pub tokens: usize,
    /// Chunks handed to the speech worker.
    pub chunks: usize,
    /// Generator failure message, if the stream ended abnormally.
    pub error: Option<String>,
    /// `None` if shutdown cut the turn short.
    pub completed: Option<TurnComplete>,
}

/// Drives the generator, chunks its tokens and feeds the speech worker.
pub struct TurnStage {
    generator: Arc<dyn Generator>,
    speak_after_words: usize,
    speech_tx: Sender<SpeechRequest>,
    done_rx: Receiver<TurnComplete>,
    echo: Arc<ConsoleEcho>,
    running: Arc<AtomicBool>,
}

impl TurnStage {
    pub fn new(
        generator: Arc<dyn Generator>,
        speak_after_words: usize,
        speech_tx: Sender<SpeechRequest>,
        done_rx: Receiver<TurnComplete>,
        echo: Arc<ConsoleEcho>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            generator,
            speak_after_words,
            speech_tx,
            done_rx,
            echo,
            running,
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run one turn to completion.
    ///
    /// Returns once the speech worker has spoken every chunk and the prompt
    /// beep, or early on shutdown. Never fails: generator errors end the
    /// stream, and whatever was buffered is still spoken.
    pub fn run(&self, prompt: &str) -> TurnReport {
        let mut report = TurnReport::default();
        let mut chunker = SpeechChunker::new(self.speak_after_words);
        let start = Instant::now();

        tracing::info!(model = self.generator.model_name(), "generating reply");
        self.echo.reply_start();

        let (token_tx, token_rx) = unbounded();
        match spawn_token_producer(self.generator.clone(), prompt.to_string(), token_tx) {
            // Detached: it exits on its own once the stream ends or we stop listening
            Ok(_) => self.consume(&token_rx, &mut chunker, start, &mut report),
            Err(e) => report.error = Some(format!("failed to start generator thread: {}", e)),
        }
        drop(token_rx);

        if let Some(chunk) = chunker.flush() {
            self.say(chunk, &mut report);
        }
        report.generation = start.elapsed();

        self.echo.reply_end();
        if let Some(message) = &report.error {
            tracing::warn!(error = %message, "generation failed");
            self.echo.generation_error(message);
        }
        self.echo.total(report.generation);

        if self.speech_tx.send(SpeechRequest::EndOfTurn).is_ok() {
            report.completed = self.wait_for_speech();
        }
        report
    }

    fn consume(
        &self,
        token_rx: &Receiver<TokenEvent>,
        chunker: &mut SpeechChunker,
        start: Instant,
        report: &mut TurnReport,
    ) {
        loop {
            if !self.is_running() {
                tracing::debug!("shutdown during generation");
                return;
            }
            match token_rx.recv_timeout(POLL_INTERVAL) {
                Ok(TokenEvent::Token(token)) => {
                    if report.first_token.is_none() {
                        let latency = start.elapsed();
                        report.first_token = Some(latency);
                        tracing::debug!(latency_ms = latency.as_millis() as u64, "first token");
                        self.echo.first_token(latency);
                    }
                    report.tokens += 1;
                    self.echo.reply_token(&token);
                    if let Some(chunk) = chunker.receive(&token) {
                        self.say(chunk, report);
                    }
                }
                Ok(TokenEvent::End) => return,
                Ok(TokenEvent::Failed(message)) => {
                    report.error = Some(message);
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    report.error = Some("generator stopped without finishing".to_string());
                    return;
                }
            }
        }
    }

    fn say(&self, chunk: String, report: &mut TurnReport) {
        tracing::debug!(chunk = %chunk, "chunk ready");
        if self.speech_tx.send(SpeechRequest::Say(chunk)).is_ok() {
            report.chunks += 1;
        } else {
            tracing::warn!("speech worker gone, chunk dropped");
        }
    }

    fn wait_for_speech(&self) -> Option<TurnComplete> {
        loop {
            match self.done_rx.recv_timeout(POLL_INTERVAL) {
                Ok(done) => return Some(done),
                Err(RecvTimeoutError::Timeout) if self.is_running() => continue,
                Err(_) => return None,
            }
        }
    }
}
