//! Utterance filter: drops transcripts too short to be a real query.

use crate::defaults;

/// A finalized utterance and its word count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub word_count: usize,
}

impl Transcript {
    /// Builds a transcript, counting whitespace-separated words.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count();
        Self { text, word_count }
    }
}

/// Outcome of filtering a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Long enough to start a turn.
    Accept(Transcript),
    /// Noise or a false trigger. Logged, never forwarded.
    Ignore(Transcript),
}

/// Minimum-word-count policy.
#[derive(Debug, Clone, Copy)]
pub struct UtteranceFilter {
    min_words: usize,
}

impl UtteranceFilter {
    pub fn new(min_words: usize) -> Self {
        Self { min_words }
    }

    pub fn min_words(&self) -> usize {
        self.min_words
    }

    pub fn check(&self, transcript: Transcript) -> Verdict {
        if transcript.word_count < self.min_words {
            Verdict::Ignore(transcript)
        } else {
            Verdict::Accept(transcript)
        }
    }
}

impl Default for UtteranceFilter {
    fn default() -> Self {
        Self::new(defaults::MIN_WORDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_words_on_any_whitespace() {
        let t = Transcript::new("  आज   मौसम\tकैसा\nहै ");
        assert_eq!(t.word_count, 4);
    }

    #[test]
    fn empty_text_has_zero_words() {
        assert_eq!(Transcript::new("").word_count, 0);
        assert_eq!(Transcript::new("   ").word_count, 0);
    }

    #[test]
    fn one_word_below_minimum_is_ignored() {
        let filter = UtteranceFilter::new(2);
        assert!(matches!(
            filter.check(Transcript::new("हाँ")),
            Verdict::Ignore(_)
        ));
    }

    #[test]
    fn exactly_minimum_is_accepted() {
        let filter = UtteranceFilter::new(2);
        match filter.check(Transcript::new("नमस्ते दोस्त")) {
            Verdict::Accept(t) => assert_eq!(t.text, "नमस्ते दोस्त"),
            other => panic!("expected accept, got {:?}", other),
        }
    }

    #[test]
    fn default_uses_configured_minimum() {
        assert_eq!(UtteranceFilter::default().min_words(), defaults::MIN_WORDS);
    }
}
