//! Streaming text generation.

use crate::error::{Result, VaaniError};
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Lazy, finite, non-restartable token sequence. An `Err` item ends it early.
pub type TokenStream = Box<dyn Iterator<Item = Result<String>> + Send>;

/// Trait for generator backends that stream tokens for a prompt.
pub trait Generator: Send + Sync {
    /// Open a token stream for `prompt`.
    ///
    /// Errors here mean the request never started (connection refused,
    /// unknown model). Errors mid-stream arrive as `Err` items.
    fn stream(&self, prompt: &str) -> Result<TokenStream>;

    /// Get the name of the model being queried
    fn model_name(&self) -> &str;
}

impl<T: Generator + ?Sized> Generator for Arc<T> {
    fn stream(&self, prompt: &str) -> Result<TokenStream> {
        (**self).stream(prompt)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Messages from a token producer thread to the turn stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    Token(String),
    /// Stream finished normally.
    End,
    /// Stream failed; no further tokens follow.
    Failed(String),
}

/// Run `generator` on its own thread, forwarding tokens over `tx`.
///
/// Exactly one terminal event (`End` or `Failed`) is sent last. The thread
/// stops early if the receiver is dropped.
pub fn spawn_token_producer(
    generator: Arc<dyn Generator>,
    prompt: String,
    tx: Sender<TokenEvent>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("token-producer".to_string())
        .spawn(move || {
            let stream = match generator.stream(&prompt) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(TokenEvent::Failed(e.to_string()));
                    return;
                }
            };

            for item in stream {
                let event = match item {
                    Ok(token) => TokenEvent::Token(token),
                    Err(e) => {
                        let _ = tx.send(TokenEvent::Failed(e.to_string()));
                        return;
                    }
                };
                if tx.send(event).is_err() {
                    tracing::debug!("token consumer gone, abandoning stream");
                    return;
                }
            }

            let _ = tx.send(TokenEvent::End);
        })
}

/// Generator that replays a fixed token list, for tests and dry runs.
#[derive(Debug, Clone)]
pub struct ScriptedGenerator {
    tokens: Vec<String>,
    fail_after: Option<usize>,
    refuse: bool,
    delay: Duration,
}

impl ScriptedGenerator {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            fail_after: None,
            refuse: false,
            delay: Duration::ZERO,
        }
    }

    /// Yield `n` tokens, then a generation error.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Fail before producing any stream at all.
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    /// Sleep before each token, to mimic a slow model.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Generator for ScriptedGenerator {
    fn stream(&self, _prompt: &str) -> Result<TokenStream> {
        if self.refuse {
            return Err(VaaniError::GeneratorRequest {
                message: "scripted generator refused the request".to_string(),
            });
        }

        let limit = self.fail_after.unwrap_or(self.tokens.len());
        let delay = self.delay;
        let tokens: Vec<Result<String>> = self
            .tokens
            .iter()
            .take(limit)
            .cloned()
            .map(Ok)
            .chain(self.fail_after.map(|_| {
                Err(VaaniError::Generation {
                    message: "scripted stream failure".to_string(),
                })
            }))
            .collect();

        Ok(Box::new(tokens.into_iter().inspect(move |_| {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        })))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
