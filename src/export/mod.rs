//! Decompression and persistence of recovered files.

mod exporter;
mod store;

pub use exporter::{ExportError, StreamingExporter};
pub use store::{DirStore, MemoryStore, OutputStore, StoreError};
