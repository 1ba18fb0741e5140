//! Clip side-channel encoder.
//!
//! Serializes the clip cache into a small square RGBA float texel buffer. Each
//! entry occupies a stride of texels on one row:
//! - texel 0: 2x2 linear block of `inverse(camera * item * player)` (x_axis.xy, y_axis.xy)
//! - texel 1: translation of that inverse, texture layer, 0
//! - texel 2: atlas region (x, y, w, h)
//!
//! `camera` is the player-local to view transform, the same matrix the shading
//! stage binds as `u_view`, so the inverse maps a drawn vertex back into the
//! item's region space. `player` multiplies on the right and so acts in region
//! space.
//!
//! Entries past the buffer capacity are dropped.

use glam::{Affine2, Vec4};

use crate::config::Config;
use crate::masking::MaskItem;

#[derive(Clone, Debug, PartialEq)]
pub struct ClipTexture {
    size: usize,
    stride: usize,
    texels: Vec<Vec4>,
    encoded: usize,
    dirty: bool,
}

impl ClipTexture {
    pub fn new(cfg: &Config) -> Self {
        let size = cfg.clip_texture_size.max(1);
        Self {
            size,
            stride: cfg.clip_texels_per_entry.clamp(3, size.max(3)),
            texels: vec![Vec4::ZERO; size * size],
            encoded: 0,
            dirty: true,
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Maximum number of entries this buffer can carry.
    #[inline]
    pub fn capacity(&self) -> usize {
        (self.size / self.stride) * self.size
    }

    /// Entries written by the last [`encode`](Self::encode).
    #[inline]
    pub fn encoded(&self) -> usize {
        self.encoded
    }

    #[inline]
    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    #[inline]
    pub fn texel(&self, x: usize, y: usize) -> Vec4 {
        self.texels[y * self.size + x]
    }

    /// Whether the buffer changed since the last [`take_dirty`](Self::take_dirty).
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear and return the dirty flag; hosts re-upload when this is true.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    /// Texel coordinate of entry `i`'s first texel.
    pub fn entry_origin(&self, i: usize) -> (usize, usize) {
        let per_row = self.size / self.stride;
        ((i % per_row) * self.stride, i / per_row)
    }

    /// Encode `cache` in order, returning the number of entries written.
    pub fn encode(&mut self, cache: &[MaskItem], camera: Affine2, player: Affine2) -> usize {
        let (mut x, mut y) = (0usize, 0usize);
        let mut written = 0;
        for item in cache.iter().take(self.capacity()) {
            let tr = (camera * item.transform * player).inverse();
            let row = y * self.size;
            self.texels[row + x] = Vec4::new(
                tr.matrix2.x_axis.x,
                tr.matrix2.x_axis.y,
                tr.matrix2.y_axis.x,
                tr.matrix2.y_axis.y,
            );
            self.texels[row + x + 1] = Vec4::new(
                tr.translation.x,
                tr.translation.y,
                item.texture_index as f32,
                0.0,
            );
            self.texels[row + x + 2] = item.texture_region.as_vec4();
            written += 1;

            x += self.stride;
            if x + self.stride > self.size {
                x = 0;
                y += 1;
            }
        }
        if written < cache.len() {
            log::debug!(
                "clip texture full: encoded {written} of {} entries",
                cache.len()
            );
        }
        self.encoded = written;
        self.dirty = true;
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Rect;
    use approx::assert_relative_eq;
    use glam::Vec2;

    fn item(i: usize) -> MaskItem {
        MaskItem {
            transform: Affine2::from_translation(Vec2::new(i as f32, 0.0)),
            texture_region: Rect::new(i as f32, 1.0, 2.0, 3.0),
            texture_index: (i % 4) as u32,
        }
    }

    #[test]
    fn layout_of_one_entry() {
        let mut tex = ClipTexture::new(&Config::default());
        let scale = Affine2::from_scale(Vec2::splat(2.0));
        let it = MaskItem {
            transform: Affine2::from_translation(Vec2::new(10.0, 20.0)),
            texture_region: Rect::new(4.0, 8.0, 16.0, 32.0),
            texture_index: 5,
        };
        assert_eq!(tex.encode(&[it], Affine2::IDENTITY, scale), 1);

        let xy = tex.texel(0, 0);
        assert_relative_eq!(xy.x, 0.5);
        assert_relative_eq!(xy.w, 0.5);
        let origin = tex.texel(1, 0);
        assert_relative_eq!(origin.x, -5.0);
        assert_relative_eq!(origin.y, -10.0);
        assert_relative_eq!(origin.z, 5.0);
        assert_eq!(tex.texel(2, 0), Vec4::new(4.0, 8.0, 16.0, 32.0));
        assert_eq!(tex.texel(3, 0), Vec4::ZERO);
    }

    #[test]
    fn overflow_keeps_first_entries_in_order() {
        let mut tex = ClipTexture::new(&Config::default());
        let cap = tex.capacity();
        assert_eq!(cap, 256);
        let cache: Vec<MaskItem> = (0..cap + 10).map(item).collect();
        assert_eq!(tex.encode(&cache, Affine2::IDENTITY, Affine2::IDENTITY), cap);
        assert_eq!(tex.encoded(), cap);

        let (x, y) = tex.entry_origin(cap - 1);
        assert_eq!((x, y), (28, 31));
        assert_eq!(tex.texel(x + 2, y).x, (cap - 1) as f32);
    }

    #[test]
    fn entries_wrap_rows() {
        let mut tex = ClipTexture::new(&Config::default());
        let cache: Vec<MaskItem> = (0..9).map(item).collect();
        tex.encode(&cache, Affine2::IDENTITY, Affine2::IDENTITY);
        assert_eq!(tex.entry_origin(8), (0, 1));
        assert_eq!(tex.texel(2, 1).x, 8.0);
    }

    #[test]
    fn undersized_texture_holds_nothing() {
        let cfg = Config {
            clip_texture_size: 2,
            ..Config::default()
        };
        let mut tex = ClipTexture::new(&cfg);
        assert_eq!(tex.capacity(), 0);
        assert_eq!(tex.encode(&[item(0)], Affine2::IDENTITY, Affine2::IDENTITY), 0);
        assert_eq!(tex.encoded(), 0);
        assert!(tex.texels().iter().all(|t| *t == Vec4::ZERO));
    }

    #[test]
    fn dirty_flag_round_trip() {
        let mut tex = ClipTexture::new(&Config::default());
        assert!(tex.take_dirty());
        assert!(!tex.is_dirty());
        tex.encode(&[], Affine2::IDENTITY, Affine2::IDENTITY);
        assert!(tex.take_dirty());
    }
}
