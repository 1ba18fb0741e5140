//! flashplay core (engine-agnostic)
//!
//! Plays Flash-style vector timeline documents: nested symbols with layers,
//! keyframes, tweens and masks are walked once per processed frame into flat
//! triangle buffers plus a small clip side-channel texture that a fixed
//! shading program uses to evaluate nested masks per fragment.
//!
//! A [`Document`] is immutable and shared by any number of [`Player`]s; each
//! player owns its own cursor, clip tracks, variants, frame overrides and
//! output buffers.

pub mod clip_texture;
pub mod config;
pub mod document;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod interp;
pub mod masking;
pub mod outputs;
pub mod player;
pub mod runtime;
pub mod stored_document;
pub mod topo;
pub mod tracks;
pub mod transform;
pub mod walker;

// Re-exports for hosts
pub use clip_texture::ClipTexture;
pub use config::Config;
pub use document::{
    Atlas, Bitmap, BitmapInstance, ClipRange, Document, Element, Frame, FrameEvent, Group,
    InstanceLoop, Layer, LayerRole, Shape, Symbol, SymbolInstance, Tween, VariantTable,
    DEFAULT_OPTION,
};
pub use error::{DocumentError, Result};
pub use geometry::{ClipSlot, GeometryBuffers};
pub use ids::{BitmapId, MaskId, SymbolId};
pub use masking::{MaskItem, MaskStack};
pub use outputs::{MaterialParams, PerfCounters, PlayerEvent, RenderFrame};
pub use player::{Player, DOCUMENT_SYMBOL, FULL_CLIP};
pub use runtime::Runtime;
pub use stored_document::{parse_stored_document_json, DocumentBuilder};
pub use tracks::{ClipState, TrackState};
pub use transform::{ColorTransform, Matrix, Rect, TextureRect};
pub use walker::{Placement, Walker};
pub use glam;
