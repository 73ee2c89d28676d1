//! Gapless, strictly ordered playback scheduling with barge-in support.
//!
//! The scheduler never starts a buffer before the scheduled end of the
//! previous one. On the server it mirrors the client's schedule so the
//! session knows when an agent turn has finished playing.

use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::wav::decode_wav;

/// Monotonic playback clock, in seconds
pub trait PlaybackClock: Send + Sync {
    fn now(&self) -> f64;
}

/// Clock backed by tokio's timer, so paused test runtimes drive it too
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock for TokioClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Manually advanced clock for deterministic scheduling
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, secs: f64) {
        self.micros
            .store((secs.max(0.0) * 1_000_000.0) as u64, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: f64) {
        self.micros
            .fetch_add((secs.max(0.0) * 1_000_000.0) as u64, Ordering::SeqCst);
    }
}

impl PlaybackClock for ManualClock {
    fn now(&self) -> f64 {
        self.micros.load(Ordering::SeqCst) as f64 / 1_000_000.0
    }
}

/// One synthesized chunk handed to the scheduler
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// WAV-encoded audio
    pub bytes: Vec<u8>,
    pub sequence_hint: usize,
}

/// A buffer placed on the playback timeline
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledBuffer {
    pub sequence: usize,
    pub start: f64,
    pub duration: f64,
}

impl ScheduledBuffer {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

pub struct PlaybackScheduler<C: PlaybackClock> {
    clock: C,
    next_start_time: f64,
    /// Buffers scheduled and not yet known to have finished
    active: Vec<ScheduledBuffer>,
    next_sequence: usize,
}

impl<C: PlaybackClock> PlaybackScheduler<C> {
    pub fn new(clock: C) -> Self {
        let next_start_time = clock.now();
        Self {
            clock,
            next_start_time,
            active: Vec::new(),
            next_sequence: 0,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    /// Decode a chunk and place it after everything already scheduled
    pub fn schedule(&mut self, chunk: &AudioChunk) -> Result<ScheduledBuffer> {
        let decoded = decode_wav(&chunk.bytes)?;
        Ok(self.schedule_duration(decoded.duration_secs()))
    }

    /// Place a buffer of known duration on the timeline
    pub fn schedule_duration(&mut self, duration: f64) -> ScheduledBuffer {
        let now = self.clock.now();
        self.reap(now);

        let start = self.next_start_time.max(now);
        let buffer = ScheduledBuffer {
            sequence: self.next_sequence,
            start,
            duration: duration.max(0.0),
        };

        self.next_sequence += 1;
        self.next_start_time = buffer.end();
        self.active.push(buffer.clone());

        debug!(
            "Scheduled buffer {} at {:.3}s for {:.3}s",
            buffer.sequence, buffer.start, buffer.duration
        );

        buffer
    }

    /// Scheduled end of the last queued buffer, if any is still pending
    pub fn turn_end(&self) -> Option<f64> {
        self.active.last().map(ScheduledBuffer::end)
    }

    /// Seconds until the current turn finishes playing
    pub fn remaining(&self) -> f64 {
        self.turn_end()
            .map(|end| (end - self.clock.now()).max(0.0))
            .unwrap_or(0.0)
    }

    /// True once every scheduled buffer has played out
    pub fn is_idle(&mut self) -> bool {
        let now = self.clock.now();
        self.reap(now);
        self.active.is_empty()
    }

    pub fn pending(&self) -> &[ScheduledBuffer] {
        &self.active
    }

    /// Barge-in: stop everything, discard the queue, restart the timeline now
    pub fn interrupt(&mut self) -> usize {
        let now = self.clock.now();
        self.reap(now);
        let discarded = self.active.len();
        self.active.clear();
        self.next_start_time = now;

        info!("Playback interrupted, {} buffer(s) discarded", discarded);
        discarded
    }

    fn reap(&mut self, now: f64) {
        self.active.retain(|buffer| buffer.end() > now);
    }
}
