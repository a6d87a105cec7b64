//! Streaming export of recovered files.
//!
//! A recovered payload is still compressed. The exporter opens a fresh
//! decompression stream (streams are finite and not restartable), pulls
//! chunks until end of stream, and persists the accumulated output. A
//! decompression fault aborts the export; partial output is discarded.

use thiserror::Error;

use super::store::{OutputStore, StoreError};
use crate::codec::{DecompressError, DecompressStream, Decompressor};

/// Errors raised during export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Decompress(#[from] DecompressError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Pulls decompressed chunks and persists the result.
pub struct StreamingExporter<D: Decompressor, S: OutputStore> {
    codec: D,
    store: S,
    files_exported: u64,
    bytes_exported: u64,
}

impl<D: Decompressor, S: OutputStore> StreamingExporter<D, S> {
    /// Creates an exporter over the given codec and store.
    pub fn new(codec: D, store: S) -> Self {
        Self {
            codec,
            store,
            files_exported: 0,
            bytes_exported: 0,
        }
    }

    /// Decompresses `payload` and persists the output under `name`.
    ///
    /// Returns the decompressed byte count. On any fault the partial
    /// output is discarded and nothing is persisted.
    pub fn export(&mut self, name: &str, payload: &[u8]) -> Result<u64, ExportError> {
        let mut stream = self.codec.open(payload)?;
        let mut chunk = vec![0u8; self.codec.chunk_size()];
        let mut output = Vec::new();

        loop {
            let n = stream.read_chunk(&mut chunk)?;
            if n == 0 {
                break;
            }
            output.extend_from_slice(&chunk[..n]);
        }

        self.store.persist(name, &output)?;
        self.files_exported += 1;
        self.bytes_exported += output.len() as u64;
        tracing::info!(
            name,
            compressed = payload.len(),
            decompressed = output.len(),
            "export complete"
        );
        Ok(output.len() as u64)
    }

    /// Files exported so far.
    pub fn files_exported(&self) -> u64 {
        self.files_exported
    }

    /// Total decompressed bytes persisted.
    pub fn bytes_exported(&self) -> u64 {
        self.bytes_exported
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ZstdCodec;
    use crate::export::MemoryStore;
    use std::io::Cursor;

    fn compress(data: &[u8]) -> Vec<u8> {
        zstd::stream::encode_all(Cursor::new(data), 3).unwrap()
    }

    #[test]
    fn test_export_round_trip() {
        let payload = b"the quick brown fox".repeat(500);
        let compressed = compress(&payload);

        let mut exporter = StreamingExporter::new(ZstdCodec::new(512), MemoryStore::new());
        let n = exporter.export("fox.txt", &compressed).unwrap();

        assert_eq!(n, payload.len() as u64);
        assert_eq!(exporter.store().get("fox.txt"), Some(payload.as_slice()));
        assert_eq!(exporter.files_exported(), 1);
        assert_eq!(exporter.bytes_exported(), payload.len() as u64);
    }

    #[test]
    fn test_fault_discards_partial_output() {
        let payload = b"truncated stream victim".repeat(200);
        let mut compressed = compress(&payload);
        compressed.truncate(compressed.len() / 2);

        let mut exporter = StreamingExporter::new(ZstdCodec::default(), MemoryStore::new());
        let result = exporter.export("broken.bin", &compressed);

        assert!(result.is_err());
        assert!(exporter.store().is_empty());
        assert_eq!(exporter.files_exported(), 0);
        assert_eq!(exporter.bytes_exported(), 0);
    }

    #[test]
    fn test_exports_are_independent() {
        let first = b"first file".repeat(50);
        let second = b"second file".repeat(50);

        let mut exporter = StreamingExporter::new(ZstdCodec::default(), MemoryStore::new());
        exporter.export("one", &compress(&first)).unwrap();
        exporter.export("two", &compress(&second)).unwrap();

        assert_eq!(exporter.store().get("one"), Some(first.as_slice()));
        assert_eq!(exporter.store().get("two"), Some(second.as_slice()));
        assert_eq!(exporter.files_exported(), 2);
    }
}
