//! Fragment reassembly and transfer completion.
//!
//! Decoded fragments arrive unordered, duplicated, and with gaps; the
//! fountain code underneath is built for exactly that. This module owns
//! the single-transfer lifecycle on top of it: accumulate, track
//! progress, extract the finished file, and fence new fragments until
//! the caller resets after export.

mod progress;
mod sink;

pub use progress::ProgressReport;
pub use sink::{Ingest, ReassemblyError, ReassemblySink, RecoveredFile};
