//! Framecast Receiving Library
//!
//! The receiving half of a visual file-transmission protocol: a sender
//! renders a file as a sequence of colored barcode frames, and this
//! library recovers the file from noisy, out-of-order, lossy camera
//! captures under a live framerate budget.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! capture → dispatch → reassembly → export
//!    ↑          ↓
//! watchdog   decode workers (parallel pool)
//! ```
//!
//! # Design Principles
//!
//! - **Drop, don't queue**: frames beyond the in-flight threshold are
//!   shed; the camera will produce another one
//! - **Typed boundaries**: the barcode decoder, fountain code, and
//!   decompressor are opaque traits with mock implementations
//! - **Order independence**: reassembly tolerates unordered, duplicate,
//!   and missing fragments by construction
//! - **Single-threaded control**: all shared pipeline state is owned by
//!   one session loop; workers communicate only through channels
//!
//! # Example
//!
//! ```no_run
//! use framecast::{
//!     capture::{CaptureConfig, FrameSource, MockFrameSource, PixelFormat},
//!     codec::{MockFountain, MockSymbolDecoder, ZstdCodec},
//!     dispatch::{Dispatcher, ModeState, WorkerPool},
//!     export::{MemoryStore, StreamingExporter},
//!     reassembly::ReassemblySink,
//!     session::Session,
//! };
//! use std::time::Duration;
//!
//! // Stand up the pipeline
//! let pool = WorkerPool::spawn(4, |_| MockSymbolDecoder::default()).unwrap();
//! let dispatcher = Dispatcher::new(pool, 8, ModeState::auto());
//! let sink = ReassemblySink::new(MockFountain::default());
//! let exporter = StreamingExporter::new(ZstdCodec::default(), MemoryStore::new());
//! let mut session = Session::new(dispatcher, sink, exporter, Duration::from_secs(2));
//!
//! // Drive it from a frame source
//! let mut source = MockFrameSource::new(PixelFormat::Nv12);
//! source.open(&CaptureConfig::default()).unwrap();
//! for _ in 0..100 {
//!     session.step(&mut source).unwrap();
//! }
//! session.finish(Duration::from_secs(2));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod codec;
pub mod dispatch;
pub mod export;
pub mod reassembly;
pub mod session;

// Re-export commonly used types at crate root
pub use capture::{CaptureConfig, FileConfig, FrameSource, FrameTask, PixelFormat};
pub use dispatch::{DecodeMode, DecodeResult, Dispatcher, ModeState, WorkerPool};
pub use export::{DirStore, StreamingExporter};
pub use reassembly::{ProgressReport, ReassemblySink, RecoveredFile};
pub use session::{Session, SessionStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
