//! Serialized document format.
//!
//! Public API: parse a JSON rendition of an already-imported document into the
//! canonical arena-based [`Document`] (document.rs).
//!
//! Notes:
//! - Symbol and bitmap references are by token/name in JSON and become ids.
//! - Frames are sorted by start; empty or overlapping frames are rejected.
//! - Every symbol named by a variant option, or flagged `overridable`, gets a
//!   dense variation index in document order.
//! - Cyclic symbol references are rejected.

use glam::{Affine2, Vec2, Vec4};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::document::{
    Atlas, Bitmap, BitmapInstance, ClipRange, Document, Element, Frame, FrameEvent, Group,
    InstanceLoop, Layer, LayerRole, Shape, Symbol, SymbolInstance, Tween, VariantTable,
};
use crate::error::{DocumentError, Result};
use crate::ids::{BitmapId, IdAllocator, MaskId, SymbolId};
use crate::topo::topo_order;
use crate::transform::{ColorTransform, Matrix, Rect, TextureRect};

/// Parse a stored document from JSON and build the canonical [`Document`].
pub fn parse_stored_document_json(s: &str) -> Result<Document> {
    let stored: StoredDocument = serde_json::from_str(s)?;
    stored.build()
}

// ----- JSON schema (serde) -----

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub atlas: Option<StoredAtlas>,
    /// Token of the main timeline; defaults to the first symbol.
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub bitmaps: Vec<StoredBitmap>,
    #[serde(default)]
    pub symbols: Vec<StoredSymbol>,
    #[serde(default)]
    pub variants: VariantTable,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredAtlas {
    pub path: String,
    #[serde(default = "one")]
    pub layers: u32,
    pub size: [f32; 2],
}

fn one() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTexture {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    #[serde(default)]
    pub index: u32,
    /// Authored size; defaults to `[w, h]` when the import did not downscale.
    #[serde(default)]
    pub original_size: Option<[f32; 2]>,
}

impl StoredTexture {
    fn to_rect(&self) -> TextureRect {
        let original = self.original_size.unwrap_or([self.w, self.h]);
        TextureRect {
            region: Rect::new(self.x, self.y, self.w, self.h),
            index: self.index,
            original_size: Vec2::from(original),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredBitmap {
    pub name: String,
    #[serde(default)]
    pub texture: Option<StoredTexture>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSymbol {
    pub token: String,
    /// Library path; defaults to the token.
    #[serde(default)]
    pub path: Option<String>,
    /// Frame count; defaults to the end of the last keyframe.
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub clips_header: Option<String>,
    #[serde(default)]
    pub clips: IndexMap<String, [f32; 2]>,
    #[serde(default)]
    pub overridable: bool,
    #[serde(default)]
    pub layers: Vec<StoredLayer>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredLayer {
    #[serde(default)]
    pub name: String,
    /// This layer defines mask group `mask`.
    #[serde(default)]
    pub mask: Option<u32>,
    /// This layer is clipped by mask group `masked_by`.
    #[serde(default)]
    pub masked_by: Option<u32>,
    #[serde(default)]
    pub frames: Vec<StoredFrame>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoredFrame {
    pub start: u32,
    #[serde(default = "one")]
    pub duration: u32,
    #[serde(default)]
    pub tween: Option<Tween>,
    #[serde(default)]
    pub event: Option<FrameEvent>,
    #[serde(default)]
    pub elements: Vec<StoredElement>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StoredColor {
    #[serde(default = "ones")]
    pub mult: [f32; 4],
    #[serde(default)]
    pub add: [f32; 4],
}

fn ones() -> [f32; 4] {
    [1.0; 4]
}

impl StoredColor {
    fn to_transform(self) -> ColorTransform {
        ColorTransform::new(Vec4::from(self.mult), Vec4::from(self.add))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoredElement {
    #[serde(rename_all = "camelCase")]
    Symbol {
        symbol: String,
        #[serde(default)]
        matrix: Matrix,
        #[serde(default)]
        color: Option<StoredColor>,
        #[serde(default)]
        first_frame: u32,
        #[serde(default, rename = "loop")]
        loop_mode: InstanceLoop,
    },
    Bitmap {
        bitmap: String,
        #[serde(default)]
        matrix: Matrix,
    },
    Shape {
        #[serde(default)]
        origin: [f32; 2],
        texture: StoredTexture,
        polygons: Vec<Vec<[f32; 2]>>,
    },
    Group {
        #[serde(default)]
        matrix: Matrix,
        elements: Vec<StoredElement>,
    },
}

// ----- build -----

impl StoredDocument {
    pub fn build(self) -> Result<Document> {
        let mut ids = IdAllocator::new();

        let mut bitmap_ids: IndexMap<String, BitmapId> = IndexMap::new();
        let mut bitmaps = Vec::with_capacity(self.bitmaps.len());
        for b in &self.bitmaps {
            if bitmap_ids.contains_key(&b.name) {
                return Err(DocumentError::DuplicateBitmap {
                    name: b.name.clone(),
                });
            }
            let id = ids.alloc_bitmap();
            bitmap_ids.insert(b.name.clone(), id);
            bitmaps.push(Bitmap {
                id,
                name: b.name.clone(),
                texture: b.texture.as_ref().map(StoredTexture::to_rect),
            });
        }

        let mut by_token: IndexMap<String, SymbolId> = IndexMap::new();
        for s in &self.symbols {
            if by_token.contains_key(&s.token) {
                return Err(DocumentError::DuplicateSymbol {
                    token: s.token.clone(),
                });
            }
            by_token.insert(s.token.clone(), ids.alloc_symbol());
        }

        // Variation slots: symbols touched by variants, or explicitly overridable.
        let mut variated: Vec<bool> = self.symbols.iter().map(|s| s.overridable).collect();
        for (variant, options) in &self.variants {
            for (option, frames) in options {
                for token in frames.keys() {
                    let id = by_token.get(token).ok_or_else(|| {
                        DocumentError::UnknownVariantSymbol {
                            variant: variant.clone(),
                            option: option.clone(),
                            token: token.clone(),
                        }
                    })?;
                    variated[id.index()] = true;
                }
            }
        }

        let ctx = Resolver {
            by_token: &by_token,
            bitmaps: &bitmap_ids,
        };
        let mut next_variation = 0usize;
        let mut symbols = Vec::with_capacity(self.symbols.len());
        for (i, s) in self.symbols.into_iter().enumerate() {
            let variation_index = if variated[i] {
                next_variation += 1;
                Some(next_variation - 1)
            } else {
                None
            };
            symbols.push(ctx.symbol(SymbolId(i as u32), s, variation_index)?);
        }

        if let Err(stuck) = topo_order(&symbols) {
            return Err(DocumentError::CyclicSymbol {
                token: symbols[stuck.index()].token.clone(),
            });
        }

        let main_timeline = match self.main {
            Some(token) => Some(
                by_token
                    .get(&token)
                    .copied()
                    .ok_or(DocumentError::UnknownMainTimeline { token })?,
            ),
            None => symbols.first().map(|s| s.id),
        };

        let (atlas, atlas_size) = match self.atlas {
            Some(a) => (
                Some(Atlas {
                    path: a.path,
                    layers: a.layers,
                }),
                Vec2::from(a.size),
            ),
            None => (None, Vec2::ZERO),
        };

        Ok(Document {
            symbols,
            by_token,
            bitmaps,
            main_timeline,
            variants: self.variants,
            atlas,
            atlas_size,
            variated_symbols_count: next_variation,
            document_path: self.path,
        })
    }
}

struct Resolver<'a> {
    by_token: &'a IndexMap<String, SymbolId>,
    bitmaps: &'a IndexMap<String, BitmapId>,
}

impl Resolver<'_> {
    fn symbol(
        &self,
        id: SymbolId,
        s: StoredSymbol,
        variation_index: Option<usize>,
    ) -> Result<Symbol> {
        let mut clips = IndexMap::with_capacity(s.clips.len());
        for (name, [start, end]) in s.clips {
            if end < start {
                return Err(DocumentError::InvalidClipRange {
                    symbol: s.token.clone(),
                    clip: name,
                    start,
                    end,
                });
            }
            clips.insert(name, ClipRange::new(start, end));
        }

        let mut layers = Vec::with_capacity(s.layers.len());
        let mut last_frame = 0u32;
        for l in s.layers {
            let role = match (l.mask, l.masked_by) {
                (Some(m), _) => LayerRole::Mask { mask_id: MaskId(m) },
                (None, Some(m)) => LayerRole::Masked { mask_id: MaskId(m) },
                (None, None) => LayerRole::Normal,
            };
            let mut stored_frames = l.frames;
            stored_frames.sort_by_key(|f| f.start);
            let mut frames: Vec<Frame> = Vec::with_capacity(stored_frames.len());
            for f in stored_frames {
                let overlaps = frames.last().is_some_and(|prev| prev.end() > f.start);
                let overflows = f.start.checked_add(f.duration).is_none();
                if f.duration == 0 || overlaps || overflows {
                    return Err(DocumentError::InvalidFrameRange {
                        symbol: s.token.clone(),
                        layer: l.name.clone(),
                        start: f.start,
                    });
                }
                let elements = self.elements(&s.token, f.elements)?;
                let frame = Frame {
                    start: f.start,
                    duration: f.duration,
                    elements,
                    tween: f.tween,
                    event: f.event,
                };
                last_frame = last_frame.max(frame.end());
                frames.push(frame);
            }
            layers.push(Layer {
                name: l.name,
                role,
                frames,
            });
        }

        Ok(Symbol {
            id,
            local_path: s.path.unwrap_or_else(|| s.token.clone()),
            token: s.token,
            duration: s.duration.unwrap_or(last_frame),
            layers,
            clips_header: s.clips_header.filter(|h| !h.is_empty()),
            clips,
            variation_index,
        })
    }

    fn elements(&self, owner: &str, stored: Vec<StoredElement>) -> Result<Vec<Element>> {
        stored
            .into_iter()
            .map(|e| self.element(owner, e))
            .collect()
    }

    fn element(&self, owner: &str, e: StoredElement) -> Result<Element> {
        Ok(match e {
            StoredElement::Symbol {
                symbol,
                matrix,
                color,
                first_frame,
                loop_mode,
            } => {
                let target = self.by_token.get(&symbol).copied().ok_or_else(|| {
                    DocumentError::UnknownSymbol {
                        owner: owner.to_string(),
                        target: symbol.clone(),
                    }
                })?;
                Element::Symbol(SymbolInstance {
                    symbol: target,
                    transform: matrix.to_affine(),
                    color: color
                        .map(StoredColor::to_transform)
                        .unwrap_or(ColorTransform::IDENTITY),
                    first_frame,
                    loop_mode,
                })
            }
            StoredElement::Bitmap { bitmap, matrix } => {
                let target = self.bitmaps.get(&bitmap).copied().ok_or_else(|| {
                    DocumentError::UnknownBitmap {
                        owner: owner.to_string(),
                        target: bitmap.clone(),
                    }
                })?;
                Element::Bitmap(BitmapInstance {
                    bitmap: target,
                    transform: matrix.to_affine(),
                })
            }
            StoredElement::Shape {
                origin,
                texture,
                polygons,
            } => Element::Shape(Shape {
                origin: Vec2::from(origin),
                texture: texture.to_rect(),
                polygons: polygons
                    .into_iter()
                    .map(|poly| poly.into_iter().map(Vec2::from).collect())
                    .collect(),
            }),
            StoredElement::Group { matrix, elements } => Element::Group(Group {
                transform: Affine2::from(matrix),
                elements: self.elements(owner, elements)?,
            }),
        })
    }
}

/// Programmatic construction on top of the stored schema.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    stored: StoredDocument,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.stored.path = path.into();
        self
    }

    pub fn atlas(mut self, path: impl Into<String>, layers: u32, size: [f32; 2]) -> Self {
        self.stored.atlas = Some(StoredAtlas {
            path: path.into(),
            layers,
            size,
        });
        self
    }

    pub fn main(mut self, token: impl Into<String>) -> Self {
        self.stored.main = Some(token.into());
        self
    }

    pub fn bitmap(mut self, bitmap: StoredBitmap) -> Self {
        self.stored.bitmaps.push(bitmap);
        self
    }

    pub fn symbol(mut self, symbol: StoredSymbol) -> Self {
        self.stored.symbols.push(symbol);
        self
    }

    pub fn variant_frame(
        mut self,
        variant: impl Into<String>,
        option: impl Into<String>,
        token: impl Into<String>,
        frame: f32,
    ) -> Self {
        self.stored
            .variants
            .entry(variant.into())
            .or_default()
            .entry(option.into())
            .or_default()
            .insert(token.into(), frame);
        self
    }

    pub fn build(self) -> Result<Document> {
        self.stored.build()
    }
}
