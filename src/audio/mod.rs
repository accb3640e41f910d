//! Audio capture side of the loop: gate, queue, devices and endpointing.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod gate;
pub mod input;
pub mod queue;
pub mod vad;

pub use gate::AudioGate;
pub use input::{AudioInput, FeedHandle, SyntheticInput};
pub use queue::{CaptureFeed, CaptureQueue, CaptureStats, Frame, QueuePurger};
