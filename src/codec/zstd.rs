//! Streaming decompression boundary.
//!
//! Recovered payloads arrive as a zstd stream. The exporter pulls
//! decompressed chunks lazily through [`DecompressStream`]; a stream is
//! finite and not restartable, so every export opens a fresh one via
//! [`Decompressor::open`].

use std::io::{Cursor, Read};

use thiserror::Error;

/// Errors from the decompression boundary.
#[derive(Debug, Error)]
pub enum DecompressError {
    #[error("failed to initialize decompression: {0}")]
    Init(String),
    #[error("decompression stream fault: {0}")]
    Stream(String),
}

/// A finite pull-based sequence of decompressed chunks.
pub trait DecompressStream {
    /// Reads the next chunk into `out`, returning the byte count.
    ///
    /// Returns `Ok(0)` at end of stream. Any error poisons the stream;
    /// the caller must discard it.
    fn read_chunk(&mut self, out: &mut [u8]) -> Result<usize, DecompressError>;
}

/// Factory for decompression streams.
pub trait Decompressor {
    /// The stream type produced by [`Decompressor::open`].
    type Stream: DecompressStream;

    /// Starts decompressing `input` from the beginning.
    fn open(&self, input: &[u8]) -> Result<Self::Stream, DecompressError>;

    /// Recommended chunk buffer size for [`DecompressStream::read_chunk`].
    fn chunk_size(&self) -> usize;
}

/// Zstd-backed [`Decompressor`].
#[derive(Debug, Clone)]
pub struct ZstdCodec {
    chunk_size: usize,
}

impl ZstdCodec {
    /// Creates a codec with the given pull-chunk size.
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        // matches zstd's recommended output-stream buffer size
        Self::new(128 * 1024)
    }
}

impl Decompressor for ZstdCodec {
    type Stream = ZstdStream;

    fn open(&self, input: &[u8]) -> Result<ZstdStream, DecompressError> {
        let reader = Cursor::new(input.to_vec());
        let inner =
            zstd::stream::read::Decoder::new(reader).map_err(|e| DecompressError::Init(e.to_string()))?;
        Ok(ZstdStream { inner })
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

/// One in-progress zstd decompression.
pub struct ZstdStream {
    inner: zstd::stream::read::Decoder<'static, std::io::BufReader<Cursor<Vec<u8>>>>,
}

impl DecompressStream for ZstdStream {
    fn read_chunk(&mut self, out: &mut [u8]) -> Result<usize, DecompressError> {
        self.inner
            .read(out)
            .map_err(|e| DecompressError::Stream(e.to_string()))
    }
}
