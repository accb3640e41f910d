//! Conversational console output.
//!
//! This is what the person at the microphone reads: their own words, the
//! reply as it streams in, and a few timing lines. Diagnostics go through
//! `tracing` instead.

use owo_colors::{OwoColorize, Style};
use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Console sink for the conversation.
///
/// Writes are serialized through a mutex so the orchestrator and start-up
/// code can share one instance.
pub struct ConsoleEcho {
    out: Mutex<Box<dyn Write + Send>>,
    quiet: bool,
    color: bool,
}

impl ConsoleEcho {
    /// Echo to stdout, coloured when stdout is a terminal.
    pub fn stdout(quiet: bool) -> Self {
        let color = io::stdout().is_terminal();
        Self::new(Box::new(io::stdout()), quiet, color)
    }

    pub fn new(out: Box<dyn Write + Send>, quiet: bool, color: bool) -> Self {
        Self {
            out: Mutex::new(out),
            quiet,
            color,
        }
    }

    /// Echo into an in-memory buffer, uncoloured.
    pub fn buffered(quiet: bool) -> (Self, EchoBuffer) {
        let buffer = EchoBuffer::default();
        (Self::new(Box::new(buffer.clone()), quiet, false), buffer)
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Start-up and shutdown banners. Suppressed by `--quiet`.
    pub fn banner(&self, message: &str) {
        if self.quiet {
            return;
        }
        let line = self.paint(message, Style::new().green());
        self.write_line(&line);
    }

    /// What the user said.
    pub fn user(&self, text: &str) {
        let label = self.paint("You:", Style::new().cyan().bold());
        self.write_line(&format!("{} {}", label, text));
    }

    /// A transcript dropped by the word-count filter.
    pub fn ignored(&self, text: &str) {
        let line = self.paint(&format!("(ignored: '{}')", text), Style::new().dimmed());
        self.write_line(&line);
    }

    /// Opens the reply line; tokens follow on the same line.
    pub fn reply_start(&self) {
        let label = self.paint("AI:", Style::new().magenta().bold());
        self.write(&format!("{} ", label));
    }

    pub fn reply_token(&self, token: &str) {
        self.write(token);
    }

    pub fn reply_end(&self) {
        self.write_line("");
    }

    /// Time from sending the prompt to the first token.
    pub fn first_token(&self, latency: Duration) {
        if self.quiet {
            return;
        }
        let line = self.paint(
            &format!("[first token {:.2}s]", latency.as_secs_f64()),
            Style::new().dimmed(),
        );
        self.write(&format!(" {} ", line));
    }

    /// Time for the whole generation.
    pub fn total(&self, elapsed: Duration) {
        if self.quiet {
            return;
        }
        let line = self.paint(
            &format!("[total {:.2}s]", elapsed.as_secs_f64()),
            Style::new().dimmed(),
        );
        self.write_line(&line);
    }

    /// Generation failure, shown in the conversation so the user knows the
    /// reply was cut short.
    pub fn generation_error(&self, message: &str) {
        let line = self.paint(&format!("LLM error: {}", message), Style::new().red());
        self.write_line(&line);
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.color {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }

    fn write(&self, text: &str) {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Console output is best effort; a closed stdout must not stop a turn
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn write_line(&self, text: &str) {
        self.write(&format!("{}\n", text));
    }
}

impl std::fmt::Debug for ConsoleEcho {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleEcho")
            .field("quiet", &self.quiet)
            .field("color", &self.color)
            .finish()
    }
}

/// Shared in-memory writer behind [`ConsoleEcho::buffered`].
#[derive(Debug, Clone, Default)]
pub struct EchoBuffer(Arc<Mutex<Vec<u8>>>);

impl EchoBuffer {
    /// Everything written so far.
    pub fn contents(&self) -> String {
        let bytes = match self.0.lock() {
            Ok(bytes) => bytes.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for EchoBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.0.lock() {
            Ok(mut bytes) => bytes.extend_from_slice(buf),
            Err(poisoned) => poisoned.into_inner().extend_from_slice(buf),
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
