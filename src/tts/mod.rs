//! Speech output.

pub mod gated;
pub mod speaker;

pub use gated::GatedSpeaker;
pub use speaker::{CommandSpeaker, MockSpeaker, Speaker, SpokenCall, VoiceSettings};
