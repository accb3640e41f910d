//! Speaking with the microphone gated.

use crate::audio::AudioGate;
use crate::error::Result;
use crate::tts::speaker::Speaker;
use std::sync::Arc;
use std::time::Duration;

/// Lowers the gate when dropped, so an error or panic mid-render can never
/// leave the microphone muted.
struct RaisedGate<'a>(&'a AudioGate);

impl<'a> RaisedGate<'a> {
    fn raise(gate: &'a AudioGate) -> Self {
        gate.raise();
        Self(gate)
    }
}

impl Drop for RaisedGate<'_> {
    fn drop(&mut self) {
        self.0.lower();
    }
}

/// A [`Speaker`] bound to the shared [`AudioGate`].
///
/// Every call raises the gate before synthesis and lowers it only after the
/// settle delay, whatever the synthesis outcome.
pub struct GatedSpeaker {
    speaker: Box<dyn Speaker>,
    gate: Arc<AudioGate>,
    timeout: Duration,
}

impl GatedSpeaker {
    pub fn new(speaker: Box<dyn Speaker>, gate: Arc<AudioGate>, timeout: Duration) -> Self {
        Self {
            speaker,
            gate,
            timeout,
        }
    }

    /// Speak `text`, blocking until playback, the settle delay and the
    /// lowering of the gate are all done.
    ///
    /// Blank text is skipped without touching the gate. Synthesis errors are
    /// returned after the gate is down.
    pub fn speak(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let _raised = RaisedGate::raise(&self.gate);
        tracing::debug!(text, speaker = self.speaker.name(), "speaking");
        self.speaker.render(text, self.timeout)
    }

    /// Raise the gate, run `while_raised`, then speak `text` and lower.
    ///
    /// Unlike [`speak`](Self::speak) the gate always cycles, even for blank
    /// text, since `while_raised` has already run under it.
    pub fn speak_after<R>(&self, while_raised: impl FnOnce() -> R, text: &str) -> (R, Result<()>) {
        let _raised = RaisedGate::raise(&self.gate);
        let value = while_raised();
        let text = text.trim();
        if text.is_empty() {
            return (value, Ok(()));
        }
        (value, self.speaker.render(text, self.timeout))
    }

    pub fn gate(&self) -> &Arc<AudioGate> {
        &self.gate
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaaniError;
    use crate::tts::speaker::MockSpeaker;
    use std::time::Instant;

    fn gated(speaker: MockSpeaker, gate: &Arc<AudioGate>) -> GatedSpeaker {
        GatedSpeaker::new(Box::new(speaker), gate.clone(), Duration::from_millis(100))
    }

    #[test]
    fn gate_is_raised_during_render_and_lowered_after() {
        let gate = Arc::new(AudioGate::new(Duration::ZERO));
        let mock = MockSpeaker::new().observing(gate.clone());
        let speaker = gated(mock.clone(), &gate);

        speaker.speak("नमस्ते").unwrap();

        assert_eq!(mock.calls()[0].gate_raised, Some(true));
        assert!(!gate.is_raised());
        assert_eq!(gate.cycles(), 1);
    }

    #[test]
    fn failure_still_lowers_gate() {
        let gate = Arc::new(AudioGate::new(Duration::ZERO));
        let speaker = gated(MockSpeaker::new().failing_on("त्रुटि"), &gate);

        assert!(matches!(
            speaker.speak("त्रुटि"),
            Err(VaaniError::SynthesisFailed { .. })
        ));
        assert!(!gate.is_raised());
        assert_eq!(gate.cycles(), 1);
    }

    #[test]
    fn timeout_still_lowers_gate() {
        let gate = Arc::new(AudioGate::new(Duration::ZERO));
        let speaker = gated(MockSpeaker::new().with_delay(Duration::from_secs(5)), &gate);

        let start = Instant::now();
        assert!(matches!(
            speaker.speak("लंबा"),
            Err(VaaniError::SynthesisTimeout { .. })
        ));
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(!gate.is_raised());
    }

    #[test]
    fn settle_delay_elapses_before_lowering() {
        let gate = Arc::new(AudioGate::new(Duration::from_millis(150)));
        let speaker = gated(MockSpeaker::new(), &gate);

        let start = Instant::now();
        speaker.speak("रुको").unwrap();
        assert!(start.elapsed() >= Duration::from_millis(150));
        assert!(!gate.is_raised());
    }

    #[test]
    fn speak_after_runs_closure_under_raised_gate() {
        let gate = Arc::new(AudioGate::new(Duration::ZERO));
        let mock = MockSpeaker::new().observing(gate.clone());
        let speaker = gated(mock.clone(), &gate);

        let (seen, result) = speaker.speak_after(|| gate.is_raised(), "बोलिए");
        assert!(seen);
        result.unwrap();
        assert_eq!(mock.calls()[0].gate_raised, Some(true));
        assert!(!gate.is_raised());

        let (_, result) = speaker.speak_after(|| (), "");
        result.unwrap();
        assert_eq!(gate.cycles(), 2);
    }

    #[test]
    fn blank_text_does_not_cycle_gate() {
        let gate = Arc::new(AudioGate::new(Duration::ZERO));
        let mock = MockSpeaker::new();
        let speaker = gated(mock.clone(), &gate);

        speaker.speak("   ").unwrap();
        assert!(mock.calls().is_empty());
        assert_eq!(gate.cycles(), 0);
    }
}
