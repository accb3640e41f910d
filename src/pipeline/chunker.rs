//! Groups streamed tokens into speakable chunks.
//!
//! A chunk is released as soon as either the buffer holds enough words or it
//! ends on a phrase boundary mark, whichever comes first. Speaking short
//! chunks early keeps the time to first audio low while the model is still
//! generating.

use crate::defaults;

/// Token accumulator with word-count and boundary-mark release.
#[derive(Debug, Clone)]
pub struct SpeechChunker {
    buffer: String,
    speak_after_words: usize,
    boundary_marks: &'static [char],
}

impl SpeechChunker {
    pub fn new(speak_after_words: usize) -> Self {
        Self {
            buffer: String::new(),
            speak_after_words: speak_after_words.max(1),
            boundary_marks: defaults::BOUNDARY_MARKS,
        }
    }

    /// Append a token; returns a chunk if the buffer became ready.
    ///
    /// Ready means `word_count >= speak_after_words` or the raw buffer ends
    /// with a boundary mark. A ready buffer is always cleared; a chunk is
    /// only returned if it has visible text.
    pub fn receive(&mut self, token: &str) -> Option<String> {
        self.buffer.push_str(token);
        if !self.is_ready() {
            return None;
        }
        self.take()
    }

    /// Release whatever is buffered (end of stream or generator error).
    pub fn flush(&mut self) -> Option<String> {
        self.take()
    }

    /// Text accumulated but not yet released.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.trim().is_empty()
    }

    fn is_ready(&self) -> bool {
        self.buffer.split_whitespace().count() >= self.speak_after_words
            || self.buffer.ends_with(self.boundary_marks)
    }

    fn take(&mut self) -> Option<String> {
        let chunk = self.buffer.trim().to_string();
        self.buffer.clear();
        if chunk.is_empty() { None } else { Some(chunk) }
    }
}

impl Default for SpeechChunker {
    fn default() -> Self {
        Self::new(defaults::SPEAK_AFTER_WORDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(chunker: &mut SpeechChunker, tokens: &[&str]) -> Vec<String> {
        tokens.iter().filter_map(|t| chunker.receive(t)).collect()
    }

    #[test]
    fn releases_on_word_count_then_flushes_remainder() {
        let mut chunker = SpeechChunker::new(3);
        let released = feed(&mut chunker, &["नमस्ते ", "दुनिया, ", "कैसे ", "हो"]);
        assert_eq!(released, vec!["नमस्ते दुनिया, कैसे"]);
        assert_eq!(chunker.flush().as_deref(), Some("हो"));
        assert!(chunker.flush().is_none());
    }

    #[test]
    fn partial_word_is_joined_on_flush() {
        let mut chunker = SpeechChunker::new(3);
        assert!(feed(&mut chunker, &["आं", "शिक"]).is_empty());
        assert_eq!(chunker.flush().as_deref(), Some("आंशिक"));
    }

    #[test]
    fn releases_on_each_boundary_mark() {
        for mark in ["।", ".", "?", "!", ",", "\n"] {
            let mut chunker = SpeechChunker::new(10);
            let token = format!("हाँ{}", mark);
            assert_eq!(
                chunker.receive(&token).as_deref(),
                Some(format!("हाँ{}", mark).trim()),
                "mark {:?} should release",
                mark
            );
            assert!(chunker.pending().is_empty());
        }
    }

    #[test]
    fn mark_followed_by_space_does_not_release() {
        let mut chunker = SpeechChunker::new(10);
        assert!(chunker.receive("अच्छा, ").is_none());
        assert_eq!(chunker.pending(), "अच्छा, ");
    }

    #[test]
    fn whitespace_only_boundary_is_never_released() {
        let mut chunker = SpeechChunker::new(3);
        assert!(chunker.receive("\n").is_none());
        assert!(chunker.pending().is_empty());
        assert!(chunker.receive("  ").is_none());
        assert!(chunker.is_empty());
        assert!(chunker.flush().is_none());
    }

    #[test]
    fn released_chunks_are_trimmed_and_in_order() {
        let mut chunker = SpeechChunker::new(2);
        let released = feed(
            &mut chunker,
            &[" पहला ", "वाक्य ", "दूसरा", " वाक्य।", " तीसरा"],
        );
        assert_eq!(released, vec!["पहला वाक्य", "दूसरा वाक्य।"]);
        assert_eq!(chunker.flush().as_deref(), Some("तीसरा"));
    }

    #[test]
    fn zero_threshold_is_clamped_to_one_word() {
        let mut chunker = SpeechChunker::new(0);
        assert!(chunker.receive(" ").is_none());
        assert_eq!(chunker.receive("शब्द").as_deref(), Some("शब्द"));
    }

    #[test]
    fn default_uses_configured_threshold() {
        let mut chunker = SpeechChunker::default();
        assert!(chunker.receive("एक ").is_none());
        assert!(chunker.receive("दो ").is_none());
        assert_eq!(chunker.receive("तीन").as_deref(), Some("एक दो तीन"));
    }
}
