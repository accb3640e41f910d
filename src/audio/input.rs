use crate::audio::queue::CaptureFeed;
use crate::error::{Result, VaaniError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Trait for audio input devices.
///
/// An input pushes samples into the [`CaptureFeed`] it is started with,
/// from whatever thread its driver uses. The feed does the gating.
pub trait AudioInput: Send {
    /// Open the stream and start delivering samples to `feed`.
    fn start(&mut self, feed: CaptureFeed) -> Result<()>;

    /// Stop delivering samples and release the device.
    fn stop(&mut self) -> Result<()>;

    /// Name for logging.
    fn name(&self) -> &str {
        "audio-input"
    }
}

/// Shared slot holding the feed of a started [`SyntheticInput`].
///
/// Lets a test inject samples at arbitrary moments, e.g. from inside a mock
/// speaker while the gate is raised.
#[derive(Clone, Default)]
pub struct FeedHandle {
    feed: Arc<Mutex<Option<CaptureFeed>>>,
}

impl FeedHandle {
    /// Delivers samples as if the driver callback fired.
    ///
    /// Returns false if the input has not been started (or was stopped).
    pub fn deliver(&self, samples: &[i16]) -> bool {
        match self.feed.lock() {
            Ok(mut guard) => match guard.as_mut() {
                Some(feed) => {
                    feed.deliver(samples);
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    fn install(&self, feed: CaptureFeed) -> Result<()> {
        let mut guard = self.feed.lock().map_err(|e| VaaniError::AudioCapture {
            message: format!("Failed to lock feed: {}", e),
        })?;
        *guard = Some(feed);
        Ok(())
    }

    fn clear(&self) {
        if let Ok(mut guard) = self.feed.lock() {
            guard.take();
        }
    }
}

/// Scripted audio input for tests and dry runs.
///
/// Plays a fixed list of sample blocks, one per `interval`, on its own thread.
/// Further samples can be pushed through [`FeedHandle`].
pub struct SyntheticInput {
    blocks: Vec<Vec<i16>>,
    interval: Duration,
    handle: FeedHandle,
    running: Arc<AtomicBool>,
    player: Option<JoinHandle<()>>,
    should_fail_start: bool,
}

impl SyntheticInput {
    /// Create an input with nothing scripted.
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            interval: Duration::from_millis(5),
            handle: FeedHandle::default(),
            running: Arc::new(AtomicBool::new(false)),
            player: None,
            should_fail_start: false,
        }
    }

    /// Script blocks to play after start.
    pub fn with_blocks(mut self, blocks: Vec<Vec<i16>>) -> Self {
        self.blocks = blocks;
        self
    }

    /// Pause between scripted blocks.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Configure the input to fail on start, like a device that cannot be opened.
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Handle for injecting samples after start.
    pub fn handle(&self) -> FeedHandle {
        self.handle.clone()
    }
}

impl Default for SyntheticInput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioInput for SyntheticInput {
    fn start(&mut self, feed: CaptureFeed) -> Result<()> {
        if self.should_fail_start {
            return Err(VaaniError::AudioCapture {
                message: "synthetic input configured to fail".to_string(),
            });
        }
        self.handle.install(feed)?;
        self.running.store(true, Ordering::SeqCst);

        let blocks = std::mem::take(&mut self.blocks);
        if blocks.is_empty() {
            return Ok(());
        }

        let handle = self.handle.clone();
        let running = self.running.clone();
        let interval = self.interval;
        self.player = Some(thread::spawn(move || {
            for block in blocks {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                handle.deliver(&block);
                thread::sleep(interval);
            }
        }));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(player) = self.player.take()
            && player.join().is_err()
        {
            tracing::warn!("synthetic input player thread panicked");
        }
        self.handle.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
