//! Per-block reassembly progress.

/// Fractional completion of each expected reassembly block.
///
/// Produced from the fountain layer's report channel and consumed by
/// observers (UI, logs) for display only; it never feeds back into
/// protocol state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressReport {
    blocks: Vec<f32>,
}

impl ProgressReport {
    /// Creates a report from raw fractions, clamped into [0, 1].
    pub fn from_fractions(fractions: Vec<f32>) -> Self {
        Self {
            blocks: fractions
                .into_iter()
                .map(|f| f.clamp(0.0, 1.0))
                .collect(),
        }
    }

    /// Parses the fountain layer's report text.
    ///
    /// Returns `None` when the text is not a JSON array of fractions
    /// (the report channel also carries plain-text diagnostics).
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str::<Vec<f32>>(text)
            .ok()
            .map(Self::from_fractions)
    }

    /// Per-block completion fractions.
    #[inline]
    pub fn blocks(&self) -> &[f32] {
        &self.blocks
    }

    /// Number of expected blocks.
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// True when no progress information is available yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Mean completion across all blocks, 0.0 when unknown.
    pub fn overall(&self) -> f32 {
        if self.blocks.is_empty() {
            return 0.0;
        }
        self.blocks.iter().sum::<f32>() / self.blocks.len() as f32
    }

    /// Whether every block reports full completion.
    pub fn is_complete(&self) -> bool {
        !self.blocks.is_empty() && self.blocks.iter().all(|&f| f >= 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_array() {
        let report = ProgressReport::parse("[0.25, 0.5, 1.0]").unwrap();
        assert_eq!(report.blocks(), &[0.25, 0.5, 1.0]);
        assert!((report.overall() - 0.5833).abs() < 0.001);
    }

    #[test]
    fn test_parse_rejects_text() {
        assert!(ProgressReport::parse("sce: 12ms, imgdec: 30ms").is_none());
    }

    #[test]
    fn test_fractions_clamped() {
        let report = ProgressReport::from_fractions(vec![-0.5, 1.5]);
        assert_eq!(report.blocks(), &[0.0, 1.0]);
    }

    #[test]
    fn test_completeness() {
        assert!(ProgressReport::from_fractions(vec![1.0, 1.0]).is_complete());
        assert!(!ProgressReport::from_fractions(vec![1.0, 0.9]).is_complete());
        assert!(!ProgressReport::default().is_complete());
    }

    #[test]
    fn test_empty_overall_is_zero() {
        assert_eq!(ProgressReport::default().overall(), 0.0);
    }
}
