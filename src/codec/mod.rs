//! Opaque codec boundaries.
//!
//! The bit-level algorithms this receiver depends on (barcode symbol
//! decoding, fountain-code reassembly, payload decompression) are
//! deliberately behind traits. The pipeline is specified against their
//! integer/report contracts, and mock implementations stand in for the
//! real codecs in tests and demos.

mod fountain;
mod symbol;
mod zstd;

pub use fountain::{
    mock_fragment, mock_transfer, mock_transfer_id, FountainError, FountainPool, MockFountain,
    FOUNTAIN_BAD_FRAGMENT,
};
pub use symbol::{
    mock_garbled_frame, mock_signal_frame, MockSymbolDecoder, SymbolDecoder,
    DECODE_FAILED_EXTRACTION, DECODE_NO_SIGNAL,
};
pub use zstd::{DecompressError, DecompressStream, Decompressor, ZstdCodec, ZstdStream};
