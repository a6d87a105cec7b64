//! Frame dispatch across the decode worker pool.
//!
//! The dispatcher hands frames to a fixed pool of parallel decode
//! workers under backpressure, autodetects the decode mode, and funnels
//! typed results back to the single control loop. Excess frames are
//! dropped, never queued; the camera will produce another one.

mod dispatcher;
mod mode;
mod worker;

pub use dispatcher::{DispatchEvent, Dispatcher, InFlightCounter};
pub use mode::{DecodeMode, ModeState};
pub use worker::{
    DecodeResult, WorkerEvent, WorkerPool, WorkerSpawnError, DECODE_PANIC,
};
