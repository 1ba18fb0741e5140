//! Canonical document model.
//!
//! A [`Document`] is immutable after load and shared read-only (`Arc`) by any
//! number of players. Symbols live in an arena indexed by [`SymbolId`]; nested
//! instances refer to their target by id, so the symbol graph carries no
//! reference counting and cycles are rejected when the document is built.

use glam::{Affine2, Vec2};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ids::{BitmapId, MaskId, SymbolId};
use crate::transform::{ColorTransform, TextureRect};

/// Option name that clears a variant or clip-track selection.
pub const DEFAULT_OPTION: &str = "[default]";

/// `[start, end)` frame range of a named clip.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipRange {
    pub start: f32,
    pub end: f32,
}

impl ClipRange {
    pub fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn duration(&self) -> f32 {
        self.end - self.start
    }
}

/// How a nested symbol instance derives its own frame from the parent's.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceLoop {
    #[default]
    Loop,
    PlayOnce,
    SingleFrame,
}

/// A placed reference to a symbol.
#[derive(Clone, Debug, PartialEq)]
pub struct SymbolInstance {
    pub symbol: SymbolId,
    pub transform: Affine2,
    pub color: ColorTransform,
    pub first_frame: u32,
    pub loop_mode: InstanceLoop,
}

/// A placed reference to a bitmap.
#[derive(Clone, Debug, PartialEq)]
pub struct BitmapInstance {
    pub bitmap: BitmapId,
    pub transform: Affine2,
}

/// Filled vector shape baked into an atlas rect.
///
/// Each polygon is simple (any winding) and expressed in the owning symbol's
/// local space; the atlas rect covers the shape starting at `origin`.
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub origin: Vec2,
    pub texture: TextureRect,
    pub polygons: Vec<Vec<Vec2>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub transform: Affine2,
    pub elements: Vec<Element>,
}

/// Drawable frame content.
#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    Shape(Shape),
    Bitmap(BitmapInstance),
    Symbol(SymbolInstance),
    Group(Group),
}

impl Element {
    /// Local transform of instance-like elements; shapes are placed in local space.
    pub fn transform(&self) -> Affine2 {
        match self {
            Element::Shape(_) => Affine2::IDENTITY,
            Element::Bitmap(b) => b.transform,
            Element::Symbol(s) => s.transform,
            Element::Group(g) => g.transform,
        }
    }

    /// Whether `other` is the tween target counterpart of `self`.
    pub fn matches(&self, other: &Element) -> bool {
        match (self, other) {
            (Element::Symbol(a), Element::Symbol(b)) => a.symbol == b.symbol,
            (Element::Bitmap(a), Element::Bitmap(b)) => a.bitmap == b.bitmap,
            (Element::Group(_), Element::Group(_)) => true,
            _ => false,
        }
    }
}

/// Motion tween from a keyframe to the next keyframe of the same layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tween {
    /// Flash-style ease in `[-1, 1]`: negative eases in, positive eases out.
    #[serde(default)]
    pub ease: f32,
}

/// Named event marker attached to a keyframe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameEvent {
    pub name: String,
    /// Queue ahead of events already collected in the same step.
    #[serde(default)]
    pub front: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub start: u32,
    pub duration: u32,
    pub elements: Vec<Element>,
    pub tween: Option<Tween>,
    pub event: Option<FrameEvent>,
}

impl Frame {
    #[inline]
    pub fn end(&self) -> u32 {
        self.start.saturating_add(self.duration)
    }

    #[inline]
    pub fn contains(&self, frame: u32) -> bool {
        frame >= self.start && frame < self.end()
    }
}

/// Role of a layer with respect to masking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LayerRole {
    #[default]
    Normal,
    /// Content defines mask group `mask_id` instead of drawing.
    Mask { mask_id: MaskId },
    /// Content is clipped by mask group `mask_id`.
    Masked { mask_id: MaskId },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub name: String,
    pub role: LayerRole,
    /// Sorted by `start`, disjoint.
    pub frames: Vec<Frame>,
}

impl Layer {
    /// Index of the keyframe covering `frame`.
    pub fn frame_index_at(&self, frame: u32) -> Option<usize> {
        let idx = self.frames.partition_point(|f| f.start <= frame);
        if idx == 0 {
            return None;
        }
        let i = idx - 1;
        if self.frames[i].contains(frame) {
            Some(i)
        } else {
            None
        }
    }
}

/// A named animation unit.
#[derive(Clone, Debug, PartialEq)]
pub struct Symbol {
    pub id: SymbolId,
    pub token: String,
    /// Library path; symbols whose path contains `/` are internal.
    pub local_path: String,
    /// Frame count.
    pub duration: u32,
    pub layers: Vec<Layer>,
    /// Track name this symbol's clips belong to.
    pub clips_header: Option<String>,
    pub clips: IndexMap<String, ClipRange>,
    /// Slot in the player's frame-override table.
    pub variation_index: Option<usize>,
}

impl Symbol {
    pub fn is_internal(&self) -> bool {
        self.local_path.contains('/')
    }

    pub fn clip(&self, name: &str) -> Option<ClipRange> {
        self.clips.get(name).copied()
    }

    /// Direct child symbols referenced from any frame.
    pub fn children(&self) -> Vec<SymbolId> {
        fn collect(elements: &[Element], out: &mut Vec<SymbolId>) {
            for e in elements {
                match e {
                    Element::Symbol(s) => {
                        if !out.contains(&s.symbol) {
                            out.push(s.symbol);
                        }
                    }
                    Element::Group(g) => collect(&g.elements, out),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        for layer in &self.layers {
            for frame in &layer.frames {
                collect(&frame.elements, &mut out);
            }
        }
        out
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Bitmap {
    pub id: BitmapId,
    pub name: String,
    /// None when the bitmap was not found in any sprite sheet during import.
    pub texture: Option<TextureRect>,
}

/// Texture atlas descriptor handed to the host renderer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Atlas {
    /// Host resource path of the texture array.
    pub path: String,
    /// Number of texture array layers.
    pub layers: u32,
}

/// variant name -> option name -> symbol token -> frame.
pub type VariantTable = IndexMap<String, IndexMap<String, IndexMap<String, f32>>>;

/// Immutable-after-load animation document.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub(crate) symbols: Vec<Symbol>,
    pub(crate) by_token: IndexMap<String, SymbolId>,
    pub(crate) bitmaps: Vec<Bitmap>,
    pub(crate) main_timeline: Option<SymbolId>,
    pub(crate) variants: VariantTable,
    pub(crate) atlas: Option<Atlas>,
    pub(crate) atlas_size: Vec2,
    pub(crate) variated_symbols_count: usize,
    pub(crate) document_path: String,
}

impl Document {
    /// Symbols keyed by token, in document order.
    pub fn symbols(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.by_token
            .iter()
            .map(move |(token, id)| (token.as_str(), &self.symbols[id.index()]))
    }

    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    pub fn symbol_id(&self, token: &str) -> Option<SymbolId> {
        self.by_token.get(token).copied()
    }

    pub fn symbol_by_token(&self, token: &str) -> Option<&Symbol> {
        self.symbol_id(token).and_then(|id| self.symbol(id))
    }

    pub fn bitmap(&self, id: BitmapId) -> Option<&Bitmap> {
        self.bitmaps.get(id.index())
    }

    pub fn variants(&self) -> &VariantTable {
        &self.variants
    }

    pub fn atlas(&self) -> Option<&Atlas> {
        self.atlas.as_ref()
    }

    pub fn atlas_size(&self) -> Vec2 {
        self.atlas_size
    }

    pub fn main_timeline(&self) -> Option<SymbolId> {
        self.main_timeline
    }

    pub fn variated_symbols_count(&self) -> usize {
        self.variated_symbols_count
    }

    pub fn document_path(&self) -> &str {
        &self.document_path
    }

    /// Frame span of `symbol`, or of its `clip` when one is given and exists.
    /// Empty `symbol` selects the main timeline.
    pub fn duration(&self, symbol: &str, clip: &str) -> f32 {
        let sym = if symbol.is_empty() {
            self.main_timeline.and_then(|id| self.symbol(id))
        } else {
            self.symbol_by_token(symbol)
        };
        let Some(sym) = sym else {
            return 0.0;
        };
        match sym.clip(clip) {
            Some(range) => range.duration(),
            None => sym.duration as f32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(start: u32, duration: u32) -> Frame {
        Frame {
            start,
            duration,
            elements: vec![],
            tween: None,
            event: None,
        }
    }

    #[test]
    fn frame_lookup_respects_gaps() {
        let layer = Layer {
            name: "L".into(),
            role: LayerRole::Normal,
            frames: vec![frame(0, 3), frame(5, 2)],
        };
        assert_eq!(layer.frame_index_at(0), Some(0));
        assert_eq!(layer.frame_index_at(2), Some(0));
        assert_eq!(layer.frame_index_at(3), None);
        assert_eq!(layer.frame_index_at(6), Some(1));
        assert_eq!(layer.frame_index_at(7), None);
    }

    #[test]
    fn frame_end_saturates() {
        let f = frame(u32::MAX - 2, 10);
        assert_eq!(f.end(), u32::MAX);
        assert!(f.contains(u32::MAX - 1));
    }

    #[test]
    fn clip_range_duration() {
        assert_eq!(ClipRange::new(4.0, 10.0).duration(), 6.0);
    }
}
