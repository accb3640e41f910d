//! Text-to-speech rendering.
//!
//! [`CommandSpeaker`] plays text through an external synthesizer (espeak-ng by
//! default) and kills it if it runs past the deadline. [`MockSpeaker`] records
//! what would have been spoken.

use crate::audio::AudioGate;
use crate::defaults;
use crate::error::{Result, VaaniError};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Trait for blocking speech synthesis.
///
/// `render` returns once playback finished, failed, or `timeout` elapsed.
/// Object-safe, Send + Sync so it can live on the speech worker thread.
pub trait Speaker: Send + Sync {
    fn render(&self, text: &str, timeout: Duration) -> Result<()>;

    fn name(&self) -> &str {
        "speaker"
    }
}

impl<T: Speaker + ?Sized> Speaker for Arc<T> {
    fn render(&self, text: &str, timeout: Duration) -> Result<()> {
        (**self).render(text, timeout)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Fixed voice settings for the synthesizer subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSettings {
    pub program: String,
    pub voice: String,
    /// Words per minute.
    pub rate: u32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            program: defaults::TTS_PROGRAM.to_string(),
            voice: defaults::TTS_VOICE.to_string(),
            rate: defaults::TTS_RATE,
        }
    }
}

/// Speaker that runs `<program> -v <voice> -s <rate> -- <text>`.
#[derive(Debug, Clone, Default)]
pub struct CommandSpeaker {
    settings: VoiceSettings,
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

impl CommandSpeaker {
    pub fn new(settings: VoiceSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &VoiceSettings {
        &self.settings
    }

    /// Arguments passed to the synthesizer, text last.
    ///
    /// `--` ends option parsing, so text starting with `-` is still spoken.
    pub fn args<'a>(&'a self, rate: &'a str, text: &'a str) -> [&'a str; 6] {
        ["-v", self.settings.voice.as_str(), "-s", rate, "--", text]
    }

    /// Check the synthesizer can be launched at all.
    pub fn check_available(&self) -> Result<()> {
        Command::new(&self.settings.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|_| ())
            .map_err(|e| self.spawn_error(e))
    }

    fn spawn_error(&self, e: std::io::Error) -> VaaniError {
        if e.kind() == std::io::ErrorKind::NotFound {
            VaaniError::SynthesisToolNotFound {
                tool: self.settings.program.clone(),
            }
        } else {
            VaaniError::SynthesisFailed {
                message: format!("Failed to execute {}: {}", self.settings.program, e),
            }
        }
    }

    fn wait_with_deadline(&self, mut child: Child, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => return Ok(()),
                Ok(Some(status)) => {
                    return Err(VaaniError::SynthesisFailed {
                        message: format!("{} exited with {}", self.settings.program, status),
                    });
                }
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(VaaniError::SynthesisTimeout {
                        seconds: timeout.as_secs_f32().ceil() as u64,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return Err(VaaniError::SynthesisFailed {
                        message: format!("Failed waiting for {}: {}", self.settings.program, e),
                    });
                }
            }
        }
    }
}

impl Speaker for CommandSpeaker {
    fn render(&self, text: &str, timeout: Duration) -> Result<()> {
        let rate = self.settings.rate.to_string();
        let child = Command::new(&self.settings.program)
            .args(self.args(&rate, text))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        self.wait_with_deadline(child, timeout)
    }

    fn name(&self) -> &str {
        &self.settings.program
    }
}

/// One recorded render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpokenCall {
    pub text: String,
    /// Gate state observed when playback began, if a gate was attached.
    pub gate_raised: Option<bool>,
}

/// Mock speaker for testing.
///
/// Records every call into a shared log that outlives the speaker, so tests
/// can inspect it after handing the speaker to a worker thread.
#[derive(Debug, Clone, Default)]
pub struct MockSpeaker {
    calls: Arc<Mutex<Vec<SpokenCall>>>,
    gate: Option<Arc<AudioGate>>,
    fail_on: Option<String>,
    delay: Duration,
}

impl MockSpeaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the gate state at the start of each call.
    pub fn observing(mut self, gate: Arc<AudioGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Fail any render whose text contains `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    /// Simulate playback time. Longer than the timeout means a timeout error.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<SpokenCall> {
        self.calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    /// Spoken texts in order.
    pub fn texts(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.text).collect()
    }
}

impl Speaker for MockSpeaker {
    fn render(&self, text: &str, timeout: Duration) -> Result<()> {
        let call = SpokenCall {
            text: text.to_string(),
            gate_raised: self.gate.as_ref().map(|g| g.is_raised()),
        };
        match self.calls.lock() {
            Ok(mut calls) => calls.push(call),
            Err(e) => e.into_inner().push(call),
        }

        if !self.delay.is_zero() {
            thread::sleep(self.delay.min(timeout));
            if self.delay > timeout {
                return Err(VaaniError::SynthesisTimeout {
                    seconds: timeout.as_secs(),
                });
            }
        }

        if self.fail_on.as_deref().is_some_and(|n| text.contains(n)) {
            return Err(VaaniError::SynthesisFailed {
                message: format!("mock synthesis failure for '{}'", text),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_voice_matches_hindi_espeak() {
        let speaker = CommandSpeaker::default();
        assert_eq!(speaker.settings().program, "espeak-ng");
        assert_eq!(
            speaker.args("150", "नमस्ते"),
            ["-v", "hi", "-s", "150", "--", "नमस्ते"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn leading_dash_text_reaches_synthesizer_as_text() {
        let dir = tempfile::TempDir::new().unwrap();
        let spoken = dir.path().join("spoken.txt");
        let script = dir.path().join("getopt-synth");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\nwhile getopts v:s: opt; do\n  [ \"$opt\" = \"?\" ] && exit 1\ndone\nshift $((OPTIND - 1))\nprintf '%s' \"$1\" > '{}'\n",
                spoken.display()
            ),
        )
        .unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let speaker = CommandSpeaker::new(VoiceSettings {
            program: script.to_string_lossy().to_string(),
            ..Default::default()
        });
        speaker.render("-5 डिग्री है", Duration::from_secs(5)).unwrap();
        assert_eq!(std::fs::read_to_string(&spoken).unwrap(), "-5 डिग्री है");

        speaker.render("- पहला", Duration::from_secs(5)).unwrap();
        assert_eq!(std::fs::read_to_string(&spoken).unwrap(), "- पहला");
    }

    #[test]
    fn missing_program_is_tool_not_found() {
        let speaker = CommandSpeaker::new(VoiceSettings {
            program: "vaani-no-such-synth".to_string(),
            ..Default::default()
        });
        assert!(matches!(
            speaker.render("x", Duration::from_secs(1)),
            Err(VaaniError::SynthesisToolNotFound { .. })
        ));
        assert!(speaker.check_available().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn slow_program_is_killed_at_deadline() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("slow-synth");
        std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let speaker = CommandSpeaker::new(VoiceSettings {
            program: script.to_string_lossy().to_string(),
            ..Default::default()
        });
        let start = Instant::now();
        let result = speaker.render("धीमा", Duration::from_millis(200));
        assert!(matches!(result, Err(VaaniError::SynthesisTimeout { .. })));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn failing_program_is_synthesis_failed() {
        let speaker = CommandSpeaker::new(VoiceSettings {
            program: "false".to_string(),
            ..Default::default()
        });
        assert!(matches!(
            speaker.render("x", Duration::from_secs(2)),
            Err(VaaniError::SynthesisFailed { .. })
        ));
    }

    #[test]
    fn mock_records_calls_and_gate_state() {
        let gate = Arc::new(AudioGate::new(Duration::ZERO));
        let speaker = MockSpeaker::new().observing(gate.clone());
        gate.raise();
        speaker.render("एक", Duration::from_secs(1)).unwrap();
        gate.lower();
        speaker.render("दो", Duration::from_secs(1)).unwrap();

        let calls = speaker.calls();
        assert_eq!(calls[0].gate_raised, Some(true));
        assert_eq!(calls[1].gate_raised, Some(false));
        assert_eq!(speaker.texts(), vec!["एक", "दो"]);
    }

    #[test]
    fn mock_times_out_when_slower_than_deadline() {
        let speaker = MockSpeaker::new().with_delay(Duration::from_millis(200));
        assert!(matches!(
            speaker.render("x", Duration::from_millis(10)),
            Err(VaaniError::SynthesisTimeout { .. })
        ));
    }

    #[test]
    fn mock_clones_share_call_log() {
        let speaker = MockSpeaker::new().failing_on("खराब");
        let clone = speaker.clone();
        assert!(clone.render("खराब वाक्य", Duration::from_secs(1)).is_err());
        assert_eq!(speaker.texts(), vec!["खराब वाक्य"]);
    }
}
