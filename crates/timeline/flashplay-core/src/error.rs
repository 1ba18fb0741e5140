//! Error types raised while building a document.
//!
//! Playback itself never fails: player operations degrade to no-ops and log a
//! diagnostic instead. Only document construction reports errors.

/// Everything that can go wrong while turning serialized data into a [`crate::Document`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum DocumentError {
    /// The JSON payload could not be parsed.
    #[error("document parse error: {reason}")]
    Parse { reason: String },

    /// Two symbols share the same token.
    #[error("duplicate symbol token: {token}")]
    DuplicateSymbol { token: String },

    /// Two bitmaps share the same name.
    #[error("duplicate bitmap name: {name}")]
    DuplicateBitmap { name: String },

    /// An instance references a symbol that does not exist.
    #[error("symbol {owner} references unknown symbol {target}")]
    UnknownSymbol { owner: String, target: String },

    /// An instance references a bitmap that does not exist.
    #[error("symbol {owner} references unknown bitmap {target}")]
    UnknownBitmap { owner: String, target: String },

    /// The main timeline token does not name a symbol.
    #[error("main timeline {token} is not a known symbol")]
    UnknownMainTimeline { token: String },

    /// A variant option lists a symbol that does not exist.
    #[error("variant {variant}/{option} references unknown symbol {token}")]
    UnknownVariantSymbol {
        variant: String,
        option: String,
        token: String,
    },

    /// Frames in a layer must be non-empty and non-overlapping.
    #[error("layer {layer} of symbol {symbol}: frame at {start} overlaps or is empty")]
    InvalidFrameRange {
        symbol: String,
        layer: String,
        start: u32,
    },

    /// A clip range ends before it starts.
    #[error("clip {clip} of symbol {symbol} has an inverted range [{start}, {end})")]
    InvalidClipRange {
        symbol: String,
        clip: String,
        start: f32,
        end: f32,
    },

    /// A symbol instance graph contains a cycle.
    #[error("cyclic symbol reference through {token}")]
    CyclicSymbol { token: String },
}

impl DocumentError {
    /// Get error category for logging.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "parse",
            Self::DuplicateSymbol { .. } | Self::DuplicateBitmap { .. } => "duplicate",
            Self::UnknownSymbol { .. }
            | Self::UnknownBitmap { .. }
            | Self::UnknownMainTimeline { .. }
            | Self::UnknownVariantSymbol { .. } => "reference",
            Self::InvalidFrameRange { .. } | Self::InvalidClipRange { .. } => "validation",
            Self::CyclicSymbol { .. } => "cycle",
        }
    }
}

impl From<serde_json::Error> for DocumentError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            reason: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DocumentError>;
