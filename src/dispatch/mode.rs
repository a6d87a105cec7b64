//! Decode mode selection and autodetection state.
//!
//! A mode selects the symbol density and color depth the sender encoded
//! with; decode only succeeds when the receiver's mode matches. Until a
//! fragment confirms the right mode, the dispatcher cycles candidate
//! modes across frames. The first successful decode latches its mode
//! for the rest of the session.

/// Symbol density / color depth configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeMode {
    /// The default high-density mode.
    B,
    /// The legacy 4-color mode.
    FourC,
}

impl DecodeMode {
    /// Candidate rotation used while autodetecting.
    pub const CANDIDATES: [DecodeMode; 2] = [DecodeMode::B, DecodeMode::FourC];

    /// Numeric value used by the decode ABI.
    pub fn wire_value(self) -> i32 {
        match self {
            DecodeMode::B => 68,
            DecodeMode::FourC => 4,
        }
    }

    /// Inverse of [`DecodeMode::wire_value`].
    pub fn from_wire(value: i32) -> Option<Self> {
        match value {
            68 => Some(DecodeMode::B),
            4 => Some(DecodeMode::FourC),
            _ => None,
        }
    }

    /// Parses a user-facing mode name ("b" or "4c", case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("b") {
            Some(DecodeMode::B)
        } else if s.eq_ignore_ascii_case("4c") {
            Some(DecodeMode::FourC)
        } else {
            None
        }
    }
}

impl std::fmt::Display for DecodeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeMode::B => f.write_str("B"),
            DecodeMode::FourC => f.write_str("4C"),
        }
    }
}

/// Autodetection state: cycling candidates until a decode succeeds,
/// then latched one-way until an explicit reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeState {
    /// Still probing; `cursor` indexes the next candidate to try.
    Auto {
        /// Index into [`DecodeMode::CANDIDATES`] for the next frame.
        cursor: usize,
    },
    /// A decode succeeded (or the user fixed the mode); all frames use
    /// this mode until reset.
    Latched(DecodeMode),
}

impl ModeState {
    /// Starts in autodetection.
    pub fn auto() -> Self {
        ModeState::Auto { cursor: 0 }
    }

    /// Starts latched to a user-chosen mode.
    pub fn fixed(mode: DecodeMode) -> Self {
        ModeState::Latched(mode)
    }

    /// Returns the latched mode, if any.
    pub fn latched(&self) -> Option<DecodeMode> {
        match self {
            ModeState::Latched(mode) => Some(*mode),
            ModeState::Auto { .. } => None,
        }
    }

    /// Whether the mode has been latched.
    pub fn is_latched(&self) -> bool {
        matches!(self, ModeState::Latched(_))
    }

    /// Mode to attach to the next frame.
    ///
    /// While autodetecting this rotates through the candidates so
    /// consecutive frames probe different modes.
    pub fn next_assignment(&mut self) -> DecodeMode {
        match self {
            ModeState::Latched(mode) => *mode,
            ModeState::Auto { cursor } => {
                let mode = DecodeMode::CANDIDATES[*cursor % DecodeMode::CANDIDATES.len()];
                *cursor = (*cursor + 1) % DecodeMode::CANDIDATES.len();
                mode
            }
        }
    }

    /// Latches `mode` after a successful decode.
    ///
    /// Returns `true` if this call changed the state. Latching the mode
    /// that is already latched is an idempotent no-op; a different mode
    /// does not displace an existing latch.
    pub fn latch(&mut self, mode: DecodeMode) -> bool {
        match self {
            ModeState::Auto { .. } => {
                *self = ModeState::Latched(mode);
                true
            }
            ModeState::Latched(_) => false,
        }
    }

    /// Returns to autodetection.
    pub fn reset(&mut self) {
        *self = ModeState::auto();
    }
}

impl Default for ModeState {
    fn default() -> Self {
        Self::auto()
    }
}
