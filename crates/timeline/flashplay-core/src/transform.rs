//! Geometric and colour primitives shared by the document model and the walker.

use glam::{Affine2, Vec2, Vec4};
use serde::{Deserialize, Serialize};

/// Flash-style 2x3 matrix as it appears in serialized documents.
///
/// `x' = a*x + c*y + tx`, `y' = b*x + d*y + ty`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            tx: 0.0,
            ty: 0.0,
        }
    }
}

impl Matrix {
    pub fn to_affine(self) -> Affine2 {
        Affine2::from_cols_array(&[self.a, self.b, self.c, self.d, self.tx, self.ty])
    }
}

impl From<Matrix> for Affine2 {
    fn from(m: Matrix) -> Self {
        m.to_affine()
    }
}

/// Colour transform: `out = in * mult + add`, all channels RGBA in 0..1 units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorTransform {
    pub mult: Vec4,
    pub add: Vec4,
}

impl Default for ColorTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ColorTransform {
    pub const IDENTITY: Self = Self {
        mult: Vec4::ONE,
        add: Vec4::ZERO,
    };

    pub fn new(mult: Vec4, add: Vec4) -> Self {
        Self { mult, add }
    }

    /// Apply `self` after `inner` (parent after child).
    pub fn concat(&self, inner: &ColorTransform) -> ColorTransform {
        ColorTransform {
            mult: self.mult * inner.mult,
            add: self.mult * inner.add + self.add,
        }
    }

    pub fn lerp(&self, other: &ColorTransform, t: f32) -> ColorTransform {
        ColorTransform {
            mult: self.mult.lerp(other.mult, t),
            add: self.add.lerp(other.add, t),
        }
    }

    /// Pack into one per-vertex colour.
    ///
    /// Integer part carries `floor(add * 255)`, fractional part carries
    /// `mult * 0.5`; the shading stage recovers `mult = 2 * fract(c)` and
    /// `add = floor(c) / 255`. Negative offsets clamp to zero.
    pub fn pack(&self) -> Vec4 {
        let add = (self.add.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).floor();
        let mult = self.mult.clamp(Vec4::ZERO, Vec4::splat(1.99)) * 0.5;
        add + mult
    }
}

/// Axis-aligned rectangle in atlas pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub position: Vec2,
    pub size: Vec2,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    pub fn as_vec4(&self) -> Vec4 {
        Vec4::new(self.position.x, self.position.y, self.size.x, self.size.y)
    }
}

/// A packed region of the texture atlas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureRect {
    /// Region inside atlas layer `index`, in atlas pixels (possibly downscaled).
    pub region: Rect,
    /// Atlas layer (texture array slice).
    pub index: u32,
    /// Authored size before any import downscale.
    pub original_size: Vec2,
}

impl TextureRect {
    fn downscale(&self) -> Vec2 {
        let orig = self.original_size.max(Vec2::splat(f32::EPSILON));
        self.region.size / orig
    }

    /// Map a point in authored local space (relative to `origin`) to a normalized atlas UV.
    pub fn uv_for(&self, local: Vec2, origin: Vec2, atlas_size: Vec2) -> Vec2 {
        let px = (local - origin) * self.downscale() + self.region.position;
        px / atlas_size.max(Vec2::ONE)
    }

    /// Transform mapping region pixel space (`0..region.size`) to authored local space.
    pub fn region_to_local(&self, origin: Vec2) -> Affine2 {
        let inv = Vec2::ONE / self.downscale().max(Vec2::splat(f32::EPSILON));
        Affine2::from_scale_angle_translation(inv, 0.0, origin)
    }
}
