//! Frame dispatch with backpressure and mode autodetection.
//!
//! Decode is asymmetric: skipping a frame is cheap, decoding one is
//! expensive, and the feed keeps producing either way. The dispatcher
//! therefore never queues frames: work beyond the in-flight threshold
//! is dropped on the floor and the next frame carries the data instead.

use std::time::{Duration, Instant};

use super::mode::ModeState;
use super::worker::{DecodeResult, WorkerEvent, WorkerPool};
use crate::capture::FrameTask;

/// Bounded count of frames dispatched but not yet resolved.
///
/// Invariant: `0 <= count <= limit`; the count never goes negative.
#[derive(Debug)]
pub struct InFlightCounter {
    count: usize,
    limit: usize,
}

impl InFlightCounter {
    /// Creates a counter with the given upper bound.
    pub fn new(limit: usize) -> Self {
        Self { count: 0, limit }
    }

    /// Current in-flight count.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Configured upper bound.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Whether the threshold has been reached.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.count >= self.limit
    }

    fn increment(&mut self) {
        self.count += 1;
    }

    fn decrement(&mut self) {
        if self.count == 0 {
            tracing::warn!("in-flight counter underflow suppressed");
            return;
        }
        self.count -= 1;
    }
}

/// Event surfaced to the session loop.
#[derive(Debug)]
pub enum DispatchEvent {
    /// A worker finished initialization.
    WorkerReady(usize),
    /// A fragment was recovered and should be fed to reassembly.
    Fragment(Vec<u8>),
    /// A decoder fault, surfaced for diagnostics. Not retried here; the
    /// next frame is the retry.
    DecodeError {
        /// Reporting worker.
        worker: usize,
        /// Decoder error code.
        code: i64,
        /// Human-readable detail.
        detail: String,
    },
}

/// Round-robins frame tasks across the worker pool under backpressure,
/// and latches the decode mode on the first successful fragment.
pub struct Dispatcher {
    pool: WorkerPool,
    in_flight: InFlightCounter,
    mode: ModeState,
    next_worker: usize,
    ready_workers: usize,
    frames_submitted: u64,
    frames_dropped: u64,
    fragments_decoded: u64,
    failed_extractions: u64,
    last_no_signal: Option<u64>,
}

impl Dispatcher {
    /// Creates a dispatcher over `pool` with the given in-flight limit.
    pub fn new(pool: WorkerPool, inflight_limit: usize, mode: ModeState) -> Self {
        if let Some(latched) = mode.latched() {
            pool.broadcast_configure(latched);
        }
        Self {
            pool,
            in_flight: InFlightCounter::new(inflight_limit),
            mode,
            next_worker: 0,
            ready_workers: 0,
            frames_submitted: 0,
            frames_dropped: 0,
            fragments_decoded: 0,
            failed_extractions: 0,
            last_no_signal: None,
        }
    }

    /// Submits a frame for decode. Fire-and-forget.
    ///
    /// Returns `false` when the frame was dropped, either because the
    /// backpressure threshold was reached or the target worker is gone.
    pub fn submit(&mut self, mut frame: FrameTask) -> bool {
        if self.in_flight.is_full() {
            self.frames_dropped += 1;
            tracing::debug!(
                sequence = frame.sequence(),
                in_flight = self.in_flight.count(),
                "dropping frame, decode pool saturated"
            );
            return false;
        }

        frame.set_mode(self.mode.next_assignment());

        let worker = self.next_worker;
        self.next_worker = (self.next_worker + 1) % self.pool.len().max(1);

        self.in_flight.increment();
        if !self.pool.dispatch_to(worker, frame) {
            self.in_flight.decrement();
            self.frames_dropped += 1;
            tracing::warn!(worker, "decode worker unavailable, frame dropped");
            return false;
        }
        self.frames_submitted += 1;
        true
    }

    /// Drains all currently available worker results.
    pub fn poll(&mut self) -> Vec<DispatchEvent> {
        let mut surfaced = Vec::new();
        while let Some(event) = self.pool.try_recv_event() {
            if let Some(out) = self.absorb(event) {
                surfaced.push(out);
            }
        }
        surfaced
    }

    /// Blocks until all in-flight frames resolve or `timeout` elapses.
    pub fn drain_in_flight(&mut self, timeout: Duration) -> Vec<DispatchEvent> {
        let deadline = Instant::now() + timeout;
        let mut surfaced = self.poll();
        while self.in_flight.count() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(
                    in_flight = self.in_flight.count(),
                    "timed out draining in-flight frames"
                );
                break;
            }
            match self.pool.recv_event_timeout(remaining) {
                Some(event) => {
                    if let Some(out) = self.absorb(event) {
                        surfaced.push(out);
                    }
                }
                None => continue,
            }
        }
        surfaced
    }

    // Updates counters and mode state for one worker event. The
    // in-flight count is decremented before anything else so that
    // backpressure always reflects true concurrency.
    fn absorb(&mut self, event: WorkerEvent) -> Option<DispatchEvent> {
        if let DecodeResult::Ready = event.result {
            self.ready_workers += 1;
            return Some(DispatchEvent::WorkerReady(event.worker));
        }

        self.in_flight.decrement();

        match event.result {
            DecodeResult::Ready => None, // handled above
            DecodeResult::NoSignal => {
                self.last_no_signal = Some(event.sequence);
                None
            }
            DecodeResult::FailedExtraction => {
                // most frames fail extraction mid-transition; not an error
                self.failed_extractions += 1;
                None
            }
            DecodeResult::Error { code, detail } => Some(DispatchEvent::DecodeError {
                worker: event.worker,
                code,
                detail,
            }),
            DecodeResult::Fragment { mode, bytes } => {
                if self.mode.latch(mode) {
                    tracing::info!(%mode, worker = event.worker, "decode mode latched");
                    self.pool.broadcast_configure(mode);
                }
                self.fragments_decoded += 1;
                Some(DispatchEvent::Fragment(bytes))
            }
        }
    }

    /// Current in-flight frame count.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count()
    }

    /// Current mode state.
    pub fn mode(&self) -> &ModeState {
        &self.mode
    }

    /// Resets mode autodetection (e.g. for a new session).
    pub fn reset_mode(&mut self) {
        self.mode.reset();
        tracing::info!("mode autodetection reset");
    }

    /// Workers that have announced readiness.
    pub fn ready_workers(&self) -> usize {
        self.ready_workers
    }

    /// Frames accepted for decode.
    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// Frames shed by backpressure or worker loss.
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// Fragments successfully decoded.
    pub fn fragments_decoded(&self) -> u64 {
        self.fragments_decoded
    }

    /// Failed extractions observed (diagnostics only).
    pub fn failed_extractions(&self) -> u64 {
        self.failed_extractions
    }

    /// Sequence number of the most recent no-signal frame.
    pub fn last_no_signal(&self) -> Option<u64> {
        self.last_no_signal
    }
}
