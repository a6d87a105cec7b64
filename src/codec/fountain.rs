//! Opaque fountain-decode boundary.
//!
//! The erasure-code internals live behind [`FountainPool`]. The pool
//! accepts fragment buffers in any order, tracks per-transfer decode
//! state keyed by a transfer id, and follows the decode ABI's integer
//! convention: `decode_fragment` returns a positive completion id once
//! a transfer becomes fully recoverable, zero while in progress, and a
//! negative code on error. Progress and diagnostics travel over a
//! side-channel report that is either a JSON array of per-block
//! fractions or plain text.

use std::collections::{BTreeMap, HashMap, HashSet};

use thiserror::Error;

/// Fragments that are not usable by the fountain layer (runt buffers,
/// buffers that are not a whole number of protocol chunks).
pub const FOUNTAIN_BAD_FRAGMENT: i64 = -5;

/// Errors raised when extracting a completed transfer.
#[derive(Debug, Error)]
pub enum FountainError {
    #[error("unknown transfer id {0}")]
    UnknownTransfer(u64),
    #[error("transfer {0} already extracted")]
    AlreadyDone(u64),
    #[error("failed to recover transfer {id}: {detail}")]
    RecoverFailed { id: u64, detail: String },
}

/// The opaque multi-transfer fountain decoder.
///
/// Implementations must tolerate out-of-order, duplicate, and missing
/// fragments; that property is what makes the dispatcher free to
/// forward fragments in completion order rather than frame order.
pub trait FountainPool {
    /// Largest fragment buffer a single frame can produce.
    fn max_fragment_len(&self) -> usize;

    /// Feeds one fragment into the decode state.
    ///
    /// Returns a completion id (positive) once a transfer is fully
    /// recoverable, `0` while decoding is still in progress, or a
    /// negative error code such as [`FOUNTAIN_BAD_FRAGMENT`].
    fn decode_fragment(&mut self, data: &[u8]) -> i64;

    /// Most recent progress or diagnostic report, if any.
    ///
    /// A JSON array of fractions is a progress report; anything else is
    /// diagnostic text.
    fn report(&self) -> Option<String>;

    /// Recovered file size for a completion id.
    fn file_size(&self, id: u64) -> u64;

    /// Original filename for a completion id, when the sender provided one.
    fn file_name(&self, id: u64) -> Option<String>;

    /// Copies the recovered bytes for `id` into `out`.
    fn recover(&mut self, id: u64, out: &mut Vec<u8>) -> Result<(), FountainError>;

    /// Marks a transfer as consumed; its decode state is dropped and
    /// late fragments for it are ignored.
    fn mark_done(&mut self, id: u64);

    /// Whether a transfer has already been consumed.
    fn is_done(&self, id: u64) -> bool;

    /// Drops all decode state, including the done set.
    fn reset(&mut self);
}

// Mock fragment header: file size, a sender-chosen stream id, then the
// block's position within the transfer. Mirrors the metadata prefix a
// real fountain chunk carries.
const MD_SIZE: usize = 9;

/// Builds a mock fountain fragment for one block of a transfer.
pub fn mock_fragment(
    file_size: u32,
    stream_id: u8,
    block_index: u16,
    block_count: u16,
    payload: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MD_SIZE + payload.len());
    buf.extend_from_slice(&file_size.to_be_bytes());
    buf.push(stream_id);
    buf.extend_from_slice(&block_index.to_be_bytes());
    buf.extend_from_slice(&block_count.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Splits a payload into `block_count` mock fragments for one transfer.
pub fn mock_transfer(payload: &[u8], stream_id: u8, block_count: u16) -> Vec<Vec<u8>> {
    let count = usize::from(block_count).max(1);
    let block_len = payload.len().div_ceil(count).max(1);
    (0..count)
        .map(|i| {
            let start = (i * block_len).min(payload.len());
            let end = ((i + 1) * block_len).min(payload.len());
            mock_fragment(
                payload.len() as u32,
                stream_id,
                i as u16,
                count as u16,
                &payload[start..end],
            )
        })
        .collect()
}

/// Transfer id implied by a mock fragment header.
pub fn mock_transfer_id(file_size: u32, stream_id: u8) -> u64 {
    (u64::from(stream_id) << 32) | u64::from(file_size)
}

#[derive(Debug)]
struct MockStream {
    file_size: u32,
    block_count: u16,
    blocks: BTreeMap<u16, Vec<u8>>,
}

/// In-memory fountain pool reassembling the explicit block headers
/// produced by [`mock_fragment`].
///
/// Unlike a real fountain code it needs every block exactly once, but
/// it preserves the properties the pipeline relies on: order
/// insensitivity, duplicate tolerance, and id-keyed multi-transfer
/// state.
#[derive(Debug)]
pub struct MockFountain {
    max_fragment_len: usize,
    streams: BTreeMap<u64, MockStream>,
    completed: HashMap<u64, Vec<u8>>,
    names: HashMap<u64, String>,
    done: HashSet<u64>,
    active: Option<u64>,
    note: Option<String>,
}

impl MockFountain {
    /// Creates a pool accepting fragments up to `max_fragment_len` bytes.
    pub fn new(max_fragment_len: usize) -> Self {
        Self {
            max_fragment_len,
            streams: BTreeMap::new(),
            completed: HashMap::new(),
            names: HashMap::new(),
            done: HashSet::new(),
            active: None,
            note: None,
        }
    }

    /// Registers a sender-provided filename for a transfer id.
    pub fn set_file_name(&mut self, id: u64, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    /// Number of transfers currently mid-decode.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    fn progress_fractions(&self, id: u64) -> Vec<f32> {
        if self.completed.contains_key(&id) {
            if let Some(stream) = self.streams.get(&id) {
                return vec![1.0; usize::from(stream.block_count)];
            }
        }
        match self.streams.get(&id) {
            Some(stream) => (0..stream.block_count)
                .map(|i| if stream.blocks.contains_key(&i) { 1.0 } else { 0.0 })
                .collect(),
            None => Vec::new(),
        }
    }
}

impl Default for MockFountain {
    fn default() -> Self {
        Self::new(8192)
    }
}

impl FountainPool for MockFountain {
    fn max_fragment_len(&self) -> usize {
        self.max_fragment_len
    }

    fn decode_fragment(&mut self, data: &[u8]) -> i64 {
        if data.len() < MD_SIZE {
            self.note = Some(format!(
                "fragment of {} bytes is smaller than the metadata header",
                data.len()
            ));
            return FOUNTAIN_BAD_FRAGMENT;
        }
        let file_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        if file_size == 0 {
            self.note = Some("fragment metadata declares an empty file".to_string());
            return FOUNTAIN_BAD_FRAGMENT;
        }
        let stream_id = data[4];
        let block_index = u16::from_be_bytes([data[5], data[6]]);
        let block_count = u16::from_be_bytes([data[7], data[8]]);
        if block_count == 0 || block_index >= block_count {
            self.note = Some(format!(
                "fragment block {block_index}/{block_count} out of range"
            ));
            return FOUNTAIN_BAD_FRAGMENT;
        }

        let id = mock_transfer_id(file_size, stream_id);
        self.note = None;
        self.active = Some(id);

        // late fragments for a consumed transfer are a silent no-op
        if self.done.contains(&id) {
            return 0;
        }

        let stream = self.streams.entry(id).or_insert_with(|| MockStream {
            file_size,
            block_count,
            blocks: BTreeMap::new(),
        });
        // duplicates overwrite; the payload is identical by construction
        stream.blocks.insert(block_index, data[MD_SIZE..].to_vec());

        if stream.blocks.len() == usize::from(stream.block_count) {
            let mut assembled = Vec::with_capacity(stream.file_size as usize);
            for block in stream.blocks.values() {
                assembled.extend_from_slice(block);
            }
            assembled.truncate(stream.file_size as usize);
            self.completed.insert(id, assembled);
            return id as i64;
        }
        0
    }

    fn report(&self) -> Option<String> {
        if let Some(note) = &self.note {
            return Some(note.clone());
        }
        let id = self.active?;
        let fractions = self.progress_fractions(id);
        if fractions.is_empty() {
            return None;
        }
        serde_json::to_string(&fractions).ok()
    }

    fn file_size(&self, id: u64) -> u64 {
        id & u64::from(u32::MAX)
    }

    fn file_name(&self, id: u64) -> Option<String> {
        self.names.get(&id).cloned()
    }

    fn recover(&mut self, id: u64, out: &mut Vec<u8>) -> Result<(), FountainError> {
        if self.done.contains(&id) {
            return Err(FountainError::AlreadyDone(id));
        }
        let bytes = self
            .completed
            .get(&id)
            .ok_or(FountainError::UnknownTransfer(id))?;
        out.clear();
        out.extend_from_slice(bytes);
        Ok(())
    }

    fn mark_done(&mut self, id: u64) {
        self.done.insert(id);
        self.streams.remove(&id);
        self.completed.remove(&id);
        if self.active == Some(id) {
            self.active = None;
        }
    }

    fn is_done(&self, id: u64) -> bool {
        self.done.contains(&id)
    }

    fn reset(&mut self) {
        self.streams.clear();
        self.completed.clear();
        self.done.clear();
        self.active = None;
        self.note = None;
        tracing::info!("fountain pool reset");
    }
}
