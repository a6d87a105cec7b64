//! Fragment reassembly sink.
//!
//! Feeds decoded fragments into the fountain layer, tracks progress,
//! and extracts the finished file once the transfer becomes fully
//! recoverable. At most one transfer is in flight here at a time: once
//! the completion flag is set, further fragments are rejected until the
//! caller resets the sink after export.

use thiserror::Error;

use super::progress::ProgressReport;
use crate::codec::{FountainError, FountainPool};

/// Errors raised during reassembly.
#[derive(Debug, Error)]
pub enum ReassemblyError {
    #[error("fountain decode failed with code {code}: {detail}")]
    Fountain {
        /// Fountain-layer error code.
        code: i64,
        /// Diagnostic text from the report channel, if any.
        detail: String,
    },
    #[error("failed to extract completed transfer {id}")]
    Extract {
        /// Completion id of the transfer.
        id: u64,
        /// Underlying fountain error.
        #[source]
        source: FountainError,
    },
}

/// A fully recovered (still compressed) file ready for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredFile {
    /// Completion id assigned by the fountain layer.
    pub id: u64,
    /// Output name: the sender's filename, or `"{id}.{size}"`.
    pub name: String,
    /// Recovered size in bytes.
    pub size: u64,
    /// The recovered payload.
    pub bytes: Vec<u8>,
}

/// Outcome of ingesting one fragment.
#[derive(Debug)]
pub enum Ingest {
    /// The fragment was not usable right now (empty, or a transfer is
    /// already complete and awaiting reset). Not an error.
    Ignored,
    /// Decode advanced; current per-block progress attached.
    Progress(ProgressReport),
    /// A transfer completed and its file was extracted.
    Complete(RecoveredFile),
}

/// Drives the fountain layer and owns the single-transfer lifecycle.
pub struct ReassemblySink<F: FountainPool> {
    fountain: F,
    /// Reusable staging buffer, grown only when a fragment requires it.
    staging: Vec<u8>,
    /// Set on completion; cleared by [`ReassemblySink::reset`].
    complete: bool,
    progress: ProgressReport,
    fragments_ingested: u64,
    fragments_rejected: u64,
}

impl<F: FountainPool> ReassemblySink<F> {
    /// Creates a sink over the given fountain pool.
    pub fn new(fountain: F) -> Self {
        let staging = Vec::with_capacity(fountain.max_fragment_len());
        Self {
            fountain,
            staging,
            complete: false,
            progress: ProgressReport::default(),
            fragments_ingested: 0,
            fragments_rejected: 0,
        }
    }

    /// Feeds one fragment into the reassembly state.
    pub fn ingest(&mut self, fragment: &[u8]) -> Result<Ingest, ReassemblyError> {
        if fragment.is_empty() {
            // degenerate input; deliberately not an error
            return Ok(Ingest::Ignored);
        }
        if self.complete {
            self.fragments_rejected += 1;
            tracing::debug!(
                len = fragment.len(),
                "fragment rejected, completed transfer awaiting reset"
            );
            return Ok(Ingest::Ignored);
        }

        // stage through the reusable buffer; grown only when required
        if self.staging.len() < fragment.len() {
            self.staging.resize(fragment.len(), 0);
        }
        self.staging[..fragment.len()].copy_from_slice(fragment);

        let res = self.fountain.decode_fragment(&self.staging[..fragment.len()]);
        self.fragments_ingested += 1;

        let report_text = self.refresh_progress();

        if res > 0 {
            let file = self.extract(res as u64)?;
            self.complete = true;
            tracing::info!(
                id = file.id,
                name = %file.name,
                size = file.size,
                "transfer complete"
            );
            return Ok(Ingest::Complete(file));
        }
        if res < 0 {
            return Err(ReassemblyError::Fountain {
                code: res,
                detail: report_text.unwrap_or_default(),
            });
        }
        Ok(Ingest::Progress(self.progress.clone()))
    }

    // Pulls the report channel; JSON arrays update progress, anything
    // else is diagnostic text returned to the caller.
    fn refresh_progress(&mut self) -> Option<String> {
        let text = self.fountain.report()?;
        match ProgressReport::parse(&text) {
            Some(report) => {
                self.progress = report;
                None
            }
            None => {
                tracing::debug!(report = %text, "fountain diagnostic");
                Some(text)
            }
        }
    }

    fn extract(&mut self, id: u64) -> Result<RecoveredFile, ReassemblyError> {
        let size = self.fountain.file_size(id);
        let name = self
            .fountain
            .file_name(id)
            .unwrap_or_else(|| format!("{id}.{size}"));
        let mut bytes = Vec::new();
        self.fountain
            .recover(id, &mut bytes)
            .map_err(|source| ReassemblyError::Extract { id, source })?;
        self.fountain.mark_done(id);
        Ok(RecoveredFile {
            id,
            name,
            size,
            bytes,
        })
    }

    /// Clears the completion fence after export, arming the sink for
    /// the next transfer.
    pub fn reset(&mut self) {
        self.complete = false;
        self.progress = ProgressReport::default();
        tracing::debug!("reassembly sink reset for next transfer");
    }

    /// Drops all fountain state as well as the local fence.
    pub fn reset_all(&mut self) {
        self.fountain.reset();
        self.reset();
    }

    /// Whether a completed transfer is awaiting reset.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Most recent per-block progress.
    pub fn progress(&self) -> &ProgressReport {
        &self.progress
    }

    /// Fragments accepted into the fountain layer.
    pub fn fragments_ingested(&self) -> u64 {
        self.fragments_ingested
    }

    /// Fragments rejected while a completed transfer awaited reset.
    pub fn fragments_rejected(&self) -> u64 {
        self.fragments_rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{mock_transfer, MockFountain};
    use proptest::prelude::*;

    fn sink() -> ReassemblySink<MockFountain> {
        ReassemblySink::new(MockFountain::default())
    }

    #[test]
    fn test_empty_fragment_is_noop() {
        let mut sink = sink();
        let before = sink.progress().clone();
        match sink.ingest(&[]).unwrap() {
            Ingest::Ignored => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(sink.fragments_ingested(), 0);
        assert_eq!(*sink.progress(), before);
    }

    #[test]
    fn test_four_fragment_transfer_completes() {
        let payload = b"a payload split across four frames for the scenario test";
        let frags = mock_transfer(payload, 1, 4);
        let mut sink = sink();

        let mut fractions = Vec::new();
        let mut recovered = None;
        for frag in &frags {
            match sink.ingest(frag).unwrap() {
                Ingest::Progress(p) => fractions.push(p.overall()),
                Ingest::Complete(file) => {
                    fractions.push(1.0);
                    recovered = Some(file);
                }
                Ingest::Ignored => panic!("fragment unexpectedly ignored"),
            }
        }

        // progress is monotonically non-decreasing and ends at 100%
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*fractions.last().unwrap(), 1.0);

        let file = recovered.expect("transfer should complete");
        assert_eq!(file.bytes, payload);
        assert_eq!(file.size, payload.len() as u64);
        assert_eq!(file.name, format!("{}.{}", file.id, file.size));
    }

    #[test]
    fn test_sender_filename_preferred() {
        let frags = mock_transfer(b"named payload", 7, 1);
        let mut fountain = MockFountain::default();
        fountain.set_file_name(
            crate::codec::mock_transfer_id(13, 7),
            "notes.txt",
        );
        let mut sink = ReassemblySink::new(fountain);

        match sink.ingest(&frags[0]).unwrap() {
            Ingest::Complete(file) => assert_eq!(file.name, "notes.txt"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_fragments_rejected_until_reset() {
        let first = mock_transfer(b"first transfer", 1, 1);
        let second = mock_transfer(b"second transfer arrives early", 2, 2);
        let mut sink = sink();

        assert!(matches!(
            sink.ingest(&first[0]).unwrap(),
            Ingest::Complete(_)
        ));
        assert!(sink.is_complete());

        // a new transfer's fragment while the export drains: rejected
        assert!(matches!(sink.ingest(&second[0]).unwrap(), Ingest::Ignored));
        assert_eq!(sink.fragments_rejected(), 1);

        sink.reset();
        assert!(matches!(
            sink.ingest(&second[0]).unwrap(),
            Ingest::Progress(_)
        ));
    }

    #[test]
    fn test_fountain_error_surfaced_without_reset() {
        let mut sink = sink();
        let err = sink.ingest(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, ReassemblyError::Fountain { code, .. } if code < 0));

        // state is intact; a valid transfer still works
        let frags = mock_transfer(b"still alive", 1, 1);
        assert!(matches!(
            sink.ingest(&frags[0]).unwrap(),
            Ingest::Complete(_)
        ));
    }

    #[test]
    fn test_duplicate_fragments_do_not_regress_progress() {
        let frags = mock_transfer(b"duplicate fragment handling", 1, 3);
        let mut sink = sink();

        let p1 = match sink.ingest(&frags[0]).unwrap() {
            Ingest::Progress(p) => p.overall(),
            other => panic!("unexpected outcome: {other:?}"),
        };
        let p2 = match sink.ingest(&frags[0]).unwrap() {
            Ingest::Progress(p) => p.overall(),
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert!(p2 >= p1);
    }

    proptest! {
        // reassembly is order-insensitive: any permutation of the same
        // fragment set yields the same completion id and bytes
        #[test]
        fn prop_ingest_order_insensitive(order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle()) {
            let payload = b"order insensitivity holds for every permutation of fragments";
            let frags = mock_transfer(payload, 3, 6);

            let mut sink = ReassemblySink::new(MockFountain::default());
            let mut completed = None;
            for &i in &order {
                if let Ingest::Complete(file) = sink.ingest(&frags[i]).unwrap() {
                    completed = Some(file);
                }
            }
            let file = completed.expect("all fragments fed, transfer must complete");
            prop_assert_eq!(file.bytes.as_slice(), payload.as_slice());
            prop_assert_eq!(file.size, payload.len() as u64);
            prop_assert_eq!(file.id, crate::codec::mock_transfer_id(payload.len() as u32, 3));
        }
    }
}
