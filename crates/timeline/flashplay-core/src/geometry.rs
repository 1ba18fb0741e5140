//! Geometry emitter: triangulates filled polygons into growing output buffers.
//!
//! UV packing (consumed by the shading stage):
//! - fractional part: the authored UV scaled by 0.5
//! - integer part of `u`: clip-group id (offset into the clip cache)
//! - integer part of `v`: `(active_clip_count << 8) | (texture_layer & 0xFF)`

use glam::{Vec2, Vec4};

const AREA_EPS: f32 = 1e-6;

/// Where a geometry group's clip entries live in the clip cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClipSlot {
    /// Index of the first entry in the clip cache.
    pub group_id: usize,
    /// Number of clip items active for this group.
    pub count: usize,
}

/// Vertex/index/colour/UV buffers rebuilt on every processed frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometryBuffers {
    pub points: Vec<Vec2>,
    pub indices: Vec<u32>,
    pub colors: Vec<Vec4>,
    pub uvs: Vec<Vec2>,
}

impl GeometryBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.points.clear();
        self.indices.clear();
        self.colors.clear();
        self.uvs.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Triangulate `points` and append it with packed UVs.
    ///
    /// `points`, `colors` and `uvs` must have equal length. Degenerate polygons
    /// append nothing.
    pub fn add_polygon(
        &mut self,
        points: &[Vec2],
        colors: &[Vec4],
        uvs: &[Vec2],
        texture_index: u32,
        clip: ClipSlot,
    ) {
        if points.len() != colors.len() || points.len() != uvs.len() {
            log::warn!(
                "add_polygon: mismatched attribute lengths ({} points, {} colors, {} uvs)",
                points.len(),
                colors.len(),
                uvs.len()
            );
            return;
        }
        let local = triangulate_polygon(points);
        if local.is_empty() {
            return;
        }

        let base = self.points.len() as u32;
        self.indices.extend(local.iter().map(|i| i + base));

        let packed = pack_uv_offset(clip, texture_index);
        self.points.extend_from_slice(points);
        self.colors.extend_from_slice(colors);
        self.uvs.extend(uvs.iter().map(|uv| *uv * 0.5 + packed));
    }
}

/// Integer offset added to every UV of a geometry group.
#[inline]
pub fn pack_uv_offset(clip: ClipSlot, texture_index: u32) -> Vec2 {
    let size_with_tex = ((clip.count as u32) << 8) | (texture_index & 0xFF);
    Vec2::new(clip.group_id as f32, size_with_tex as f32)
}

/// Inverse of [`pack_uv_offset`] plus the authored UV: `(uv, group_id, count, texture_index)`.
pub fn unpack_uv(packed: Vec2) -> (Vec2, usize, usize, u32) {
    let int = packed.floor();
    let uv = (packed - int) * 2.0;
    let size_with_tex = int.y as u32;
    (
        uv,
        int.x as usize,
        (size_with_tex >> 8) as usize,
        size_with_tex & 0xFF,
    )
}

fn signed_area(points: &[Vec2]) -> f32 {
    let n = points.len();
    let mut area = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        area += a.perp_dot(b);
    }
    area * 0.5
}

fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let d1 = (b - a).perp_dot(p - a);
    let d2 = (c - b).perp_dot(p - b);
    let d3 = (a - c).perp_dot(p - c);
    d1 >= 0.0 && d2 >= 0.0 && d3 >= 0.0
}

/// Ear-clipping triangulation of a simple polygon of either winding.
///
/// Returns indices into `points`, three per triangle. Polygons with fewer than
/// three points or (near) zero area produce no indices.
pub fn triangulate_polygon(points: &[Vec2]) -> Vec<u32> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }
    let area = signed_area(points);
    if area.abs() <= AREA_EPS {
        return Vec::new();
    }

    // Work on a counter-clockwise index ring.
    let mut ring: Vec<u32> = if area > 0.0 {
        (0..n as u32).collect()
    } else {
        (0..n as u32).rev().collect()
    };
    let mut out = Vec::with_capacity((n - 2) * 3);

    let mut guard = 0usize;
    while ring.len() > 3 {
        let m = ring.len();
        let mut clipped = false;
        for i in 0..m {
            let ia = ring[(i + m - 1) % m];
            let ib = ring[i];
            let ic = ring[(i + 1) % m];
            let (a, b, c) = (
                points[ia as usize],
                points[ib as usize],
                points[ic as usize],
            );
            let cross = (b - a).perp_dot(c - b);
            if cross <= AREA_EPS {
                continue;
            }
            let blocked = ring.iter().any(|&j| {
                j != ia && j != ib && j != ic && point_in_triangle(points[j as usize], a, b, c)
            });
            if blocked {
                continue;
            }
            out.extend_from_slice(&[ia, ib, ic]);
            ring.remove(i);
            clipped = true;
            break;
        }
        if !clipped {
            // Collinear leftovers or self-intersection: drop one reflex/flat vertex.
            let m = ring.len();
            let flat = (0..m).find(|&i| {
                let a = points[ring[(i + m - 1) % m] as usize];
                let b = points[ring[i] as usize];
                let c = points[ring[(i + 1) % m] as usize];
                (b - a).perp_dot(c - b).abs() <= AREA_EPS
            });
            match flat {
                Some(i) => {
                    ring.remove(i);
                }
                None => break,
            }
        }
        guard += 1;
        if guard > n * n {
            break;
        }
    }
    if ring.len() == 3 {
        let (a, b, c) = (
            points[ring[0] as usize],
            points[ring[1] as usize],
            points[ring[2] as usize],
        );
        if (b - a).perp_dot(c - b).abs() > AREA_EPS {
            out.extend_from_slice(&ring);
        }
    }
    out
}
