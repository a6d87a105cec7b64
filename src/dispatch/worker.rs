//! Decode worker pool.
//!
//! Each worker owns one [`SymbolDecoder`] on a dedicated thread and
//! processes one frame at a time, so per-worker task order is
//! preserved. Workers communicate exclusively through channels: frame
//! tasks in (pixel buffer ownership moves with the task), typed results
//! out. No fault escapes a worker: decoder panics are caught and
//! mapped to an error result.

use std::panic::{self, AssertUnwindSafe};
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use thiserror::Error;

use super::DecodeMode;
use crate::capture::FrameTask;
use crate::codec::{SymbolDecoder, DECODE_FAILED_EXTRACTION, DECODE_NO_SIGNAL};

/// Error code reported when a decoder panics.
pub const DECODE_PANIC: i64 = -99;

/// Typed outcome of one decode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// Worker finished initialization and is accepting tasks.
    Ready,
    /// The frame held no detectable signal.
    NoSignal,
    /// A signal was present but could not be extracted. Extremely
    /// common for frames caught mid-transition; not an error.
    FailedExtraction,
    /// A fragment was recovered under `mode`.
    Fragment {
        /// Mode the decode succeeded under.
        mode: DecodeMode,
        /// Recovered fragment bytes.
        bytes: Vec<u8>,
    },
    /// The decoder reported a fault.
    Error {
        /// Decoder-specific error code.
        code: i64,
        /// Human-readable detail.
        detail: String,
    },
}

/// One message from a worker back to the dispatcher.
#[derive(Debug)]
pub struct WorkerEvent {
    /// Index of the reporting worker.
    pub worker: usize,
    /// Sequence number of the frame this result belongs to (0 for `Ready`).
    pub sequence: u64,
    /// The decode outcome.
    pub result: DecodeResult,
}

enum WorkerCommand {
    Task(Box<FrameTask>),
    Configure(DecodeMode),
    Shutdown,
}

/// Failure to stand up the worker pool.
#[derive(Debug, Error)]
pub enum WorkerSpawnError {
    #[error("failed to spawn decode worker thread: {0}")]
    Spawn(String),
}

struct WorkerHandle {
    commands: Sender<WorkerCommand>,
    join: Option<JoinHandle<()>>,
}

/// Fixed-size pool of decode workers sharing one result channel.
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    events: Receiver<WorkerEvent>,
}

impl WorkerPool {
    /// Spawns `size` workers, each owning a decoder built by `factory`.
    pub fn spawn<D, F>(size: usize, factory: F) -> Result<Self, WorkerSpawnError>
    where
        D: SymbolDecoder + Send + 'static,
        F: Fn(usize) -> D,
    {
        let (event_tx, event_rx) = unbounded();
        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let (cmd_tx, cmd_rx) = unbounded();
            let decoder = factory(id);
            let events = event_tx.clone();
            let join = std::thread::Builder::new()
                .name(format!("decode-worker-{id}"))
                .spawn(move || run_worker(id, decoder, cmd_rx, events))
                .map_err(|e| WorkerSpawnError::Spawn(e.to_string()))?;
            workers.push(WorkerHandle {
                commands: cmd_tx,
                join: Some(join),
            });
        }
        Ok(Self {
            workers,
            events: event_rx,
        })
    }

    /// Number of workers in the pool.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the pool has no workers.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Hands a frame task to a specific worker.
    ///
    /// Returns `false` if the worker's channel is closed (thread died).
    pub fn dispatch_to(&self, worker: usize, task: FrameTask) -> bool {
        match self.workers.get(worker) {
            Some(handle) => handle
                .commands
                .send(WorkerCommand::Task(Box::new(task)))
                .is_ok(),
            None => false,
        }
    }

    /// Broadcasts a mode configuration to every worker.
    pub fn broadcast_configure(&self, mode: DecodeMode) {
        for handle in &self.workers {
            let _ = handle.commands.send(WorkerCommand::Configure(mode));
        }
    }

    /// Non-blocking poll of the shared result channel.
    pub fn try_recv_event(&self) -> Option<WorkerEvent> {
        self.events.try_recv().ok()
    }

    /// Blocking poll with a timeout.
    pub fn recv_event_timeout(&self, timeout: std::time::Duration) -> Option<WorkerEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for handle in &self.workers {
            let _ = handle.commands.send(WorkerCommand::Shutdown);
        }
        for handle in &mut self.workers {
            if let Some(join) = handle.join.take() {
                let _ = join.join();
            }
        }
    }
}

fn run_worker<D: SymbolDecoder>(
    id: usize,
    mut decoder: D,
    commands: Receiver<WorkerCommand>,
    events: Sender<WorkerEvent>,
) {
    let mut scratch: Vec<u8> = Vec::new();
    let mut configured: Option<DecodeMode> = None;

    let _ = events.send(WorkerEvent {
        worker: id,
        sequence: 0,
        result: DecodeResult::Ready,
    });

    while let Ok(command) = commands.recv() {
        match command {
            WorkerCommand::Shutdown => break,
            WorkerCommand::Configure(mode) => {
                if configured != Some(mode) {
                    decoder.configure(mode);
                    configured = Some(mode);
                    tracing::debug!(worker = id, %mode, "worker reconfigured");
                }
            }
            WorkerCommand::Task(task) => {
                let sequence = task.sequence();
                let result = decode_one(id, &mut decoder, &mut configured, &mut scratch, &task);
                if events
                    .send(WorkerEvent {
                        worker: id,
                        sequence,
                        result,
                    })
                    .is_err()
                {
                    break;
                }
            }
        }
    }
    tracing::debug!(worker = id, "decode worker stopped");
}

fn decode_one<D: SymbolDecoder>(
    id: usize,
    decoder: &mut D,
    configured: &mut Option<DecodeMode>,
    scratch: &mut Vec<u8>,
    task: &FrameTask,
) -> DecodeResult {
    if let Some(mode) = task.mode() {
        if *configured != Some(mode) {
            decoder.configure(mode);
            *configured = Some(mode);
            tracing::debug!(worker = id, %mode, "worker reconfigured for task");
        }
    }
    let effective_mode = task.mode().or(*configured).unwrap_or(DecodeMode::B);

    // grow-only scratch buffer; a resize is worth noting but not an error
    let capacity = decoder.fragment_capacity();
    if scratch.len() < capacity {
        tracing::debug!(
            worker = id,
            from = scratch.len(),
            to = capacity,
            "resizing fragment scratch buffer"
        );
        scratch.resize(capacity, 0);
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        decoder.scan_extract_decode(
            task.pixels(),
            task.width(),
            task.height(),
            task.format(),
            &mut scratch[..capacity],
        )
    }));

    match outcome {
        Err(_) => DecodeResult::Error {
            code: DECODE_PANIC,
            detail: "decoder panicked".to_string(),
        },
        Ok(len) if len > 0 => DecodeResult::Fragment {
            mode: effective_mode,
            bytes: scratch[..len as usize].to_vec(),
        },
        Ok(DECODE_NO_SIGNAL) => DecodeResult::NoSignal,
        Ok(DECODE_FAILED_EXTRACTION) => DecodeResult::FailedExtraction,
        Ok(code) => DecodeResult::Error {
            code,
            detail: decoder.last_error(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::PixelFormat;
    use crate::codec::{mock_garbled_frame, mock_signal_frame, MockSymbolDecoder};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn make_task(content: Vec<u8>, sequence: u64, mode: DecodeMode) -> FrameTask {
        let mut pixels = content;
        pixels.resize(PixelFormat::Rgba.buffer_size(8, 8), 0);
        let mut task = FrameTask::new(pixels, 8, 8, PixelFormat::Rgba, sequence);
        task.set_mode(mode);
        task
    }

    fn recv_non_ready(pool: &WorkerPool) -> WorkerEvent {
        loop {
            let event = pool.recv_event_timeout(TIMEOUT).expect("event");
            if event.result != DecodeResult::Ready {
                return event;
            }
        }
    }

    #[test]
    fn test_workers_announce_ready() {
        let pool = WorkerPool::spawn(2, |_| MockSymbolDecoder::default()).unwrap();
        let mut ready = 0;
        while ready < 2 {
            let event = pool.recv_event_timeout(TIMEOUT).expect("event");
            if event.result == DecodeResult::Ready {
                ready += 1;
            }
        }
    }

    #[test]
    fn test_fragment_result_carries_mode_and_bytes() {
        let pool = WorkerPool::spawn(1, |_| MockSymbolDecoder::default()).unwrap();
        let frame = mock_signal_frame(DecodeMode::FourC, b"worker fragment");
        assert!(pool.dispatch_to(0, make_task(frame, 42, DecodeMode::FourC)));

        let event = recv_non_ready(&pool);
        assert_eq!(event.sequence, 42);
        match event.result {
            DecodeResult::Fragment { mode, bytes } => {
                assert_eq!(mode, DecodeMode::FourC);
                assert_eq!(bytes, b"worker fragment");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_blank_frame_reports_no_signal() {
        let pool = WorkerPool::spawn(1, |_| MockSymbolDecoder::default()).unwrap();
        assert!(pool.dispatch_to(0, make_task(Vec::new(), 1, DecodeMode::B)));
        assert_eq!(recv_non_ready(&pool).result, DecodeResult::NoSignal);
    }

    #[test]
    fn test_garbled_frame_reports_failed_extraction() {
        let pool = WorkerPool::spawn(1, |_| MockSymbolDecoder::default()).unwrap();
        assert!(pool.dispatch_to(0, make_task(mock_garbled_frame(), 1, DecodeMode::B)));
        assert_eq!(recv_non_ready(&pool).result, DecodeResult::FailedExtraction);
    }

    #[test]
    fn test_wrong_mode_is_failed_extraction_not_error() {
        let pool = WorkerPool::spawn(1, |_| MockSymbolDecoder::default()).unwrap();
        let frame = mock_signal_frame(DecodeMode::FourC, b"hidden");
        assert!(pool.dispatch_to(0, make_task(frame, 1, DecodeMode::B)));
        assert_eq!(recv_non_ready(&pool).result, DecodeResult::FailedExtraction);
    }

    #[test]
    fn test_panicking_decoder_maps_to_error() {
        struct PanickingDecoder;
        impl SymbolDecoder for PanickingDecoder {
            fn configure(&mut self, _mode: DecodeMode) {}
            fn fragment_capacity(&self) -> usize {
                16
            }
            fn scan_extract_decode(
                &mut self,
                _pixels: &[u8],
                _width: u32,
                _height: u32,
                _format: PixelFormat,
                _out: &mut [u8],
            ) -> i64 {
                panic!("decoder blew up");
            }
        }

        let pool = WorkerPool::spawn(1, |_| PanickingDecoder).unwrap();
        assert!(pool.dispatch_to(0, make_task(Vec::new(), 1, DecodeMode::B)));
        match recv_non_ready(&pool).result {
            DecodeResult::Error { code, .. } => assert_eq!(code, DECODE_PANIC),
            other => panic!("unexpected result: {other:?}"),
        }

        // the worker survives the panic and keeps serving tasks
        assert!(pool.dispatch_to(0, make_task(Vec::new(), 2, DecodeMode::B)));
        match recv_non_ready(&pool).result {
            DecodeResult::Error { code, .. } => assert_eq!(code, DECODE_PANIC),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_per_worker_order_preserved() {
        let pool = WorkerPool::spawn(1, |_| MockSymbolDecoder::default()).unwrap();
        for seq in 1..=5u64 {
            let frame = mock_signal_frame(DecodeMode::B, format!("frag {seq}").as_bytes());
            assert!(pool.dispatch_to(0, make_task(frame, seq, DecodeMode::B)));
        }
        let mut sequences = Vec::new();
        while sequences.len() < 5 {
            let event = recv_non_ready(&pool);
            sequences.push(event.sequence);
        }
        assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
    }
}
