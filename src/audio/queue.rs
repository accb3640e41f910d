//! Capture queue between the audio callback and the recognizer loop.
//!
//! The callback side ([`CaptureFeed`]) never blocks: it checks the gate,
//! assembles fixed-size frames and does a `try_send`. The consumer side
//! ([`CaptureQueue`]) blocks with a timeout so shutdown is observed.

use crate::audio::gate::AudioGate;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// One fixed-size block of mono 16-bit PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// PCM samples (16-bit signed integers).
    pub samples: Vec<i16>,
    /// Capture order, for gap detection in logs.
    pub sequence: u64,
}

impl Frame {
    /// Creates a new frame.
    pub fn new(samples: Vec<i16>, sequence: u64) -> Self {
        Self { samples, sequence }
    }

    /// Raw little-endian bytes, as streaming decoders usually take them.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Duration of the frame at the given sample rate, in milliseconds.
    pub fn duration_ms(&self, sample_rate: u32) -> u32 {
        if sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000 / sample_rate as u64) as u32
    }
}

/// Counters shared between the feed and the queue.
#[derive(Debug, Default)]
pub struct CaptureStats {
    enqueued: AtomicU64,
    gated: AtomicU64,
    overflowed: AtomicU64,
    purged: AtomicU64,
}

impl CaptureStats {
    /// Frames that made it into the queue.
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Frames dropped because the gate was raised.
    pub fn gated(&self) -> u64 {
        self.gated.load(Ordering::Relaxed)
    }

    /// Frames dropped because the queue was full.
    pub fn overflowed(&self) -> u64 {
        self.overflowed.load(Ordering::Relaxed)
    }

    /// Frames discarded by end-of-turn purges.
    pub fn purged(&self) -> u64 {
        self.purged.load(Ordering::Relaxed)
    }
}

/// Consumer side of the capture queue.
pub struct CaptureQueue {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
    gate: Arc<AudioGate>,
    stats: Arc<CaptureStats>,
}

impl CaptureQueue {
    /// Creates a queue holding at most `capacity` frames.
    pub fn new(capacity: usize, gate: Arc<AudioGate>) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self {
            tx,
            rx,
            gate,
            stats: Arc::new(CaptureStats::default()),
        }
    }

    /// Creates the producer half handed to the capture callback.
    pub fn feed(&self, block_size: usize) -> CaptureFeed {
        CaptureFeed {
            tx: self.tx.clone(),
            gate: self.gate.clone(),
            stats: self.stats.clone(),
            block_size: block_size.max(1),
            pending: Vec::with_capacity(block_size),
            sequence: 0,
        }
    }

    /// Creates a handle that can discard queued frames from another thread.
    pub fn purger(&self) -> QueuePurger {
        QueuePurger {
            rx: self.rx.clone(),
            stats: self.stats.clone(),
        }
    }

    /// Waits up to `timeout` for the next frame.
    ///
    /// Returns `None` on timeout or when every feed has been dropped.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Frame> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of frames waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns true if no frames are waiting.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<CaptureStats> {
        self.stats.clone()
    }

    /// The gate this queue's feeds consult.
    pub fn gate(&self) -> &Arc<AudioGate> {
        &self.gate
    }
}

/// Drains the capture queue without consuming frames for recognition.
#[derive(Clone)]
pub struct QueuePurger {
    rx: Receiver<Frame>,
    stats: Arc<CaptureStats>,
}

impl QueuePurger {
    /// Discards every queued frame. Returns how many were dropped.
    pub fn purge(&self) -> usize {
        let dropped = self.rx.try_iter().count();
        self.stats
            .purged
            .fetch_add(dropped as u64, Ordering::Relaxed);
        dropped
    }
}

/// Producer side, owned by the audio callback.
///
/// Audio drivers hand over buffers of arbitrary length; the feed re-blocks them
/// into frames of exactly `block_size` samples.
pub struct CaptureFeed {
    tx: Sender<Frame>,
    gate: Arc<AudioGate>,
    stats: Arc<CaptureStats>,
    block_size: usize,
    pending: Vec<i16>,
    sequence: u64,
}

impl CaptureFeed {
    /// Accepts samples from the driver callback.
    ///
    /// While the gate is raised the samples are discarded along with any
    /// partially assembled block, so no audio from the speaking window can
    /// leak into a later frame.
    pub fn deliver(&mut self, samples: &[i16]) {
        if self.gate.is_raised() {
            self.pending.clear();
            self.stats.gated.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut rest = samples;
        while !rest.is_empty() {
            let take = (self.block_size - self.pending.len()).min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.pending.len() == self.block_size {
                let block = std::mem::replace(&mut self.pending, Vec::with_capacity(self.block_size));
                self.push(block);
            }
        }
    }

    fn push(&mut self, samples: Vec<i16>) {
        let frame = Frame::new(samples, self.sequence);
        self.sequence += 1;
        match self.tx.try_send(frame) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) => {
                self.stats.overflowed.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Samples per emitted frame.
    pub fn block_size(&self) -> usize {
        self.block_size
    }
}
