//! Speech worker: speaks chunks in order and closes each turn.

use crate::audio::QueuePurger;
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::tts::GatedSpeaker;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Work item for the speech worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechRequest {
    /// Speak one chunk.
    Say(String),
    /// All chunks for this turn are queued: purge captured audio, play the
    /// prompt beep, report completion.
    EndOfTurn,
}

/// Acknowledgement sent once a turn's speech has fully finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnComplete {
    /// Chunks rendered successfully.
    pub spoken: usize,
    /// Chunks whose synthesis failed or timed out.
    pub failed: usize,
    /// Captured frames discarded at end of turn.
    pub purged: usize,
}

/// Station that owns the speaker. One instance serializes all speech.
pub struct SpeechStation {
    speaker: GatedSpeaker,
    purger: QueuePurger,
    prompt_text: String,
    running: Arc<AtomicBool>,
    turn: TurnComplete,
}

impl SpeechStation {
    pub fn new(
        speaker: GatedSpeaker,
        purger: QueuePurger,
        prompt_text: impl Into<String>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            speaker,
            purger,
            prompt_text: prompt_text.into(),
            running,
            turn: TurnComplete::default(),
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn end_turn(&mut self) -> TurnComplete {
        let prompt = if self.is_running() {
            self.prompt_text.as_str()
        } else {
            ""
        };

        // Purge under the raised gate so nothing slips in between
        let (purged, result) = self.speaker.speak_after(|| self.purger.purge(), prompt);
        if let Err(e) = result {
            tracing::warn!(error = %e, "prompt beep failed");
        }
        if purged > 0 {
            tracing::debug!(purged, "discarded audio captured while speaking");
        }

        let mut done = std::mem::take(&mut self.turn);
        done.purged = purged;
        done
    }
}

impl Station for SpeechStation {
    type Input = SpeechRequest;
    type Output = TurnComplete;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StationError> {
        match input {
            SpeechRequest::Say(text) => {
                if !self.is_running() {
                    tracing::trace!("shutting down, skipping queued chunk");
                    return Ok(None);
                }
                match self.speaker.speak(&text) {
                    Ok(()) => {
                        self.turn.spoken += 1;
                        Ok(None)
                    }
                    Err(e) => {
                        self.turn.failed += 1;
                        Err(e.into())
                    }
                }
            }
            SpeechRequest::EndOfTurn => Ok(Some(self.end_turn())),
        }
    }

    fn name(&self) -> &'static str {
        "speech"
    }

    fn shutdown(&mut self) {
        if self.speaker.gate().is_raised() {
            self.speaker.gate().lower();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioGate, CaptureQueue};
    use crate::tts::MockSpeaker;
    use std::time::Duration;

    fn station(mock: &MockSpeaker, queue: &CaptureQueue) -> SpeechStation {
        let speaker = GatedSpeaker::new(
            Box::new(mock.clone()),
            queue.gate().clone(),
            Duration::from_millis(200),
        );
        SpeechStation::new(
            speaker,
            queue.purger(),
            "बोलिए",
            Arc::new(AtomicBool::new(true)),
        )
    }

    fn queue() -> CaptureQueue {
        CaptureQueue::new(16, Arc::new(AudioGate::new(Duration::ZERO)))
    }

    #[test]
    fn speaks_chunks_then_beeps_on_end_of_turn() {
        let queue = queue();
        let mock = MockSpeaker::new().observing(queue.gate().clone());
        let mut station = station(&mock, &queue);

        assert!(station.process(SpeechRequest::Say("पहला".into())).unwrap().is_none());
        assert!(station.process(SpeechRequest::Say("दूसरा".into())).unwrap().is_none());
        let done = station.process(SpeechRequest::EndOfTurn).unwrap().unwrap();

        assert_eq!(mock.texts(), vec!["पहला", "दूसरा", "बोलिए"]);
        assert!(mock.calls().iter().all(|c| c.gate_raised == Some(true)));
        assert_eq!(done.spoken, 2);
        assert_eq!(done.failed, 0);
        assert!(!queue.gate().is_raised());
    }

    #[test]
    fn end_of_turn_purges_captured_frames() {
        let queue = queue();
        let mut feed = queue.feed(4);
        feed.deliver(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(queue.len(), 2);

        let mock = MockSpeaker::new();
        let mut station = station(&mock, &queue);
        let done = station.process(SpeechRequest::EndOfTurn).unwrap().unwrap();

        assert_eq!(done.purged, 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn synthesis_failure_is_recoverable_and_counted() {
        let queue = queue();
        let mock = MockSpeaker::new().failing_on("खराब");
        let mut station = station(&mock, &queue);

        assert!(matches!(
            station.process(SpeechRequest::Say("खराब".into())),
            Err(StationError::Recoverable(_))
        ));
        assert!(!queue.gate().is_raised());

        station.process(SpeechRequest::Say("ठीक".into())).unwrap();
        let done = station.process(SpeechRequest::EndOfTurn).unwrap().unwrap();
        assert_eq!((done.spoken, done.failed), (1, 1));

        // Counters reset for the next turn
        let next = station.process(SpeechRequest::EndOfTurn).unwrap().unwrap();
        assert_eq!((next.spoken, next.failed), (0, 0));
    }

    #[test]
    fn stopped_station_skips_chunks_and_beep_but_still_completes() {
        let queue = queue();
        let mock = MockSpeaker::new();
        let mut station = station(&mock, &queue);
        station.running.store(false, Ordering::SeqCst);

        assert!(station.process(SpeechRequest::Say("छोड़ो".into())).unwrap().is_none());
        let done = station.process(SpeechRequest::EndOfTurn).unwrap().unwrap();

        assert!(mock.calls().is_empty());
        assert_eq!(done.spoken, 0);
        assert!(!queue.gate().is_raised());
    }
}
