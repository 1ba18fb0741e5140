//! Timeline walker: turns one symbol at one frame into geometry.
//!
//! Layers are visited in document order. Mask layers come before the layers
//! they clip, so a mask group is always defined by the time a masked layer
//! activates it. Nested symbol instances get their own frame from the track
//! state and recurse with the parent's accumulated transform and colour.

use glam::{Affine2, Vec2, Vec4};

use crate::document::{
    BitmapInstance, Document, Element, Frame, InstanceLoop, Layer, LayerRole, Shape, Symbol,
    SymbolInstance,
};
use crate::geometry::GeometryBuffers;
use crate::ids::SymbolId;
use crate::interp::{ease, lerp_affine, tween_fraction};
use crate::masking::MaskStack;
use crate::outputs::EventQueue;
use crate::tracks::TrackState;
use crate::transform::ColorTransform;

/// Accumulated placement of a subtree in player-local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub transform: Affine2,
    pub color: ColorTransform,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            transform: Affine2::IDENTITY,
            color: ColorTransform::IDENTITY,
        }
    }
}

impl Placement {
    #[inline]
    fn then(&self, transform: Affine2, color: &ColorTransform) -> Self {
        Self {
            transform: self.transform * transform,
            color: self.color.concat(color),
        }
    }
}

/// Whether a marker on frame `marker` was crossed moving to `frame` by `delta`
/// frames, on a timeline of `duration` frames that wraps.
///
/// The crossed window is `(frame - delta, frame]`. A zero delta crosses nothing.
pub fn crosses_marker(marker: u32, frame: f32, delta: f32, duration: u32) -> bool {
    if delta <= 0.0 || duration == 0 {
        return false;
    }
    let dur = duration as f32;
    if delta >= dur {
        return true;
    }
    let m = marker as f32;
    let prev = frame - delta;
    if prev >= 0.0 {
        prev < m && m <= frame
    } else {
        m > prev + dur || m <= frame
    }
}

/// Frame a nested instance would show if nothing overrides it.
pub fn instance_frame(instance: &SymbolInstance, child: &Symbol, elapsed: f32) -> f32 {
    let first = instance.first_frame as f32;
    let dur = child.duration as f32;
    if dur <= 0.0 {
        return 0.0;
    }
    match instance.loop_mode {
        InstanceLoop::Loop => (first + elapsed.max(0.0)).rem_euclid(dur),
        InstanceLoop::PlayOnce => (first + elapsed.max(0.0)).min(dur - 1.0),
        InstanceLoop::SingleFrame => first,
    }
}

pub struct Walker<'a> {
    doc: &'a Document,
    tracks: &'a TrackState,
    geometry: &'a mut GeometryBuffers,
    masks: &'a mut MaskStack,
    events: &'a mut EventQueue,
    /// Frames advanced since the previous step; drives event markers.
    delta: f32,
}

impl<'a> Walker<'a> {
    pub fn new(
        doc: &'a Document,
        tracks: &'a TrackState,
        geometry: &'a mut GeometryBuffers,
        masks: &'a mut MaskStack,
        events: &'a mut EventQueue,
        delta: f32,
    ) -> Self {
        Self {
            doc,
            tracks,
            geometry,
            masks,
            events,
            delta,
        }
    }

    /// Emit `symbol` at `frame`. Returns false if the step had to be abandoned;
    /// partially written output is the caller's to discard.
    pub fn process(&mut self, symbol: SymbolId, frame: f32, placement: Placement) -> bool {
        match self.visit_symbol(symbol, frame, placement) {
            Some(()) => {
                self.masks.flush();
                true
            }
            None => false,
        }
    }

    fn visit_symbol(&mut self, id: SymbolId, frame: f32, placement: Placement) -> Option<()> {
        let doc = self.doc;
        let Some(symbol) = doc.symbol(id) else {
            log::warn!("walker: symbol {id:?} is not part of the document");
            return None;
        };
        let frame = frame.max(0.0);
        for layer in &symbol.layers {
            self.visit_layer(symbol, layer, frame, placement)?;
        }
        Some(())
    }

    fn visit_layer(
        &mut self,
        symbol: &Symbol,
        layer: &Layer,
        frame: f32,
        placement: Placement,
    ) -> Option<()> {
        for marker in &layer.frames {
            let Some(event) = &marker.event else {
                continue;
            };
            if crosses_marker(marker.start, frame, self.delta, symbol.duration) {
                self.events.push(&event.name, event.front);
            }
        }

        let Some(idx) = layer.frame_index_at(frame as u32) else {
            return Some(());
        };
        let key = &layer.frames[idx];
        let tween = key.tween.and_then(|tw| {
            layer
                .frames
                .get(idx + 1)
                .filter(|next| next.start == key.end())
                .map(|next| (next, ease(tween_fraction(frame, key.start, key.duration), tw.ease)))
        });

        match layer.role {
            LayerRole::Normal => self.visit_frame(key, tween, frame, placement),
            LayerRole::Mask { mask_id } => {
                self.masks.mask_begin(mask_id);
                let res = self.visit_frame(key, tween, frame, placement);
                self.masks.mask_end(mask_id);
                res
            }
            LayerRole::Masked { mask_id } => {
                self.masks.clip_begin(mask_id);
                let res = self.visit_frame(key, tween, frame, placement);
                self.masks.clip_end(mask_id);
                res
            }
        }
    }

    fn visit_frame(
        &mut self,
        key: &Frame,
        tween: Option<(&Frame, f32)>,
        frame: f32,
        placement: Placement,
    ) -> Option<()> {
        // Time spent inside this keyframe, passed down to nested instances.
        let elapsed = frame - key.start as f32;
        for (i, element) in key.elements.iter().enumerate() {
            let target = tween.and_then(|(next, t)| {
                next.elements
                    .get(i)
                    .filter(|n| element.matches(n))
                    .map(|n| (n, t))
            });
            self.visit_element(element, target, elapsed, placement)?;
        }
        Some(())
    }

    fn visit_element(
        &mut self,
        element: &Element,
        target: Option<(&Element, f32)>,
        elapsed: f32,
        placement: Placement,
    ) -> Option<()> {
        let transform = match target {
            Some((to, t)) => lerp_affine(&element.transform(), &to.transform(), t),
            None => element.transform(),
        };
        match element {
            Element::Shape(shape) => {
                self.emit_shape(shape, placement);
                Some(())
            }
            Element::Bitmap(bitmap) => {
                self.emit_bitmap(bitmap, placement.transform * transform, &placement.color);
                Some(())
            }
            Element::Symbol(instance) => {
                let color = match target {
                    Some((Element::Symbol(to), t)) => instance.color.lerp(&to.color, t),
                    _ => instance.color,
                };
                let doc = self.doc;
                let Some(child) = doc.symbol(instance.symbol) else {
                    log::warn!("walker: instance of unknown symbol {:?}", instance.symbol);
                    return None;
                };
                let inherited = instance_frame(instance, child, elapsed);
                let frame = self.tracks.resolve_frame(child, inherited);
                self.visit_symbol(instance.symbol, frame, placement.then(transform, &color))
            }
            Element::Group(group) => {
                let inner = placement.then(transform, &ColorTransform::IDENTITY);
                for child in &group.elements {
                    self.visit_element(child, None, elapsed, inner)?;
                }
                Some(())
            }
        }
    }

    fn emit_shape(&mut self, shape: &Shape, placement: Placement) {
        let tex = &shape.texture;
        if self.masks.is_masking() {
            self.masks.mask_add(
                placement.transform * tex.region_to_local(shape.origin),
                tex.region,
                tex.index,
            );
            return;
        }
        let atlas_size = self.doc.atlas_size();
        let packed = placement.color.pack();
        for polygon in &shape.polygons {
            let points: Vec<Vec2> = polygon
                .iter()
                .map(|p| placement.transform.transform_point2(*p))
                .collect();
            let uvs: Vec<Vec2> = polygon
                .iter()
                .map(|p| tex.uv_for(*p, shape.origin, atlas_size))
                .collect();
            let colors = vec![packed; points.len()];
            self.geometry
                .add_polygon(&points, &colors, &uvs, tex.index, self.masks.slot());
        }
    }

    fn emit_bitmap(&mut self, instance: &BitmapInstance, transform: Affine2, color: &ColorTransform) {
        let Some(bitmap) = self.doc.bitmap(instance.bitmap) else {
            log::warn!("walker: unknown bitmap {:?}", instance.bitmap);
            return;
        };
        let Some(tex) = bitmap.texture else {
            log::debug!("walker: bitmap '{}' has no atlas texture", bitmap.name);
            return;
        };
        if self.masks.is_masking() {
            self.masks
                .mask_add(transform * tex.region_to_local(Vec2::ZERO), tex.region, tex.index);
            return;
        }
        let size = tex.original_size;
        let corners = [
            Vec2::ZERO,
            Vec2::new(size.x, 0.0),
            size,
            Vec2::new(0.0, size.y),
        ];
        let atlas_size = self.doc.atlas_size();
        let points = corners.map(|c| transform.transform_point2(c));
        let uvs = corners.map(|c| tex.uv_for(c, Vec2::ZERO, atlas_size));
        let colors: [Vec4; 4] = [color.pack(); 4];
        self.geometry
            .add_polygon(&points, &colors, &uvs, tex.index, self.masks.slot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::MaskId;
    use crate::stored_document::parse_stored_document_json;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn square(size: f32) -> serde_json::Value {
        json!([[0, 0], [size, 0], [size, size], [0, size]])
    }

    fn shape(x: f32, size: f32) -> serde_json::Value {
        json!({
            "type": "shape",
            "origin": [0, 0],
            "texture": { "x": x, "y": 0, "w": size, "h": size, "index": 1 },
            "polygons": [square(size)]
        })
    }

    struct Out {
        geometry: GeometryBuffers,
        masks: MaskStack,
        events: EventQueue,
        ok: bool,
    }

    fn run(doc: &Document, tracks: &TrackState, token: &str, frame: f32, delta: f32) -> Out {
        let mut out = Out {
            geometry: GeometryBuffers::new(),
            masks: MaskStack::new(),
            events: EventQueue::new(16),
            ok: false,
        };
        let id = doc.symbol_id(token).unwrap();
        out.ok = Walker::new(
            doc,
            tracks,
            &mut out.geometry,
            &mut out.masks,
            &mut out.events,
            delta,
        )
        .process(id, frame, Placement::default());
        out
    }

    fn doc(value: serde_json::Value) -> Document {
        parse_stored_document_json(&value.to_string()).unwrap()
    }

    #[test]
    fn marker_window_wraps() {
        assert!(crosses_marker(3, 3.0, 1.0, 10));
        assert!(!crosses_marker(3, 2.5, 1.0, 10));
        assert!(!crosses_marker(3, 3.0, 0.0, 10));
        // 9.5 -> 0.5 wraps over 0
        assert!(crosses_marker(0, 0.5, 1.0, 10));
        assert!(!crosses_marker(5, 0.5, 1.0, 10));
        assert!(crosses_marker(5, 0.0, 20.0, 10));
    }

    #[test]
    fn instance_loop_modes() {
        let d = doc(json!({ "symbols": [{ "token": "C", "duration": 4 }] }));
        let child = d.symbol_by_token("C").unwrap();
        let mut inst = SymbolInstance {
            symbol: child.id,
            transform: Affine2::IDENTITY,
            color: ColorTransform::IDENTITY,
            first_frame: 1,
            loop_mode: InstanceLoop::Loop,
        };
        assert_eq!(instance_frame(&inst, child, 5.0), 2.0);
        inst.loop_mode = InstanceLoop::PlayOnce;
        assert_eq!(instance_frame(&inst, child, 5.0), 3.0);
        inst.loop_mode = InstanceLoop::SingleFrame;
        assert_eq!(instance_frame(&inst, child, 5.0), 1.0);
    }

    #[test]
    fn nested_symbols_compose_transforms() {
        let d = doc(json!({
            "atlas": { "path": "atlas.png", "size": [64, 64] },
            "symbols": [
                { "token": "Root", "duration": 1, "layers": [{ "name": "L", "frames": [
                    { "start": 0, "elements": [
                        { "type": "symbol", "symbol": "Leaf", "matrix": { "tx": 100, "ty": 0 } }
                    ]}
                ]}]},
                { "token": "Leaf", "duration": 1, "layers": [{ "name": "L", "frames": [
                    { "start": 0, "elements": [shape(0.0, 8.0)] }
                ]}]}
            ]
        }));
        let out = run(&d, &TrackState::new(), "Root", 0.0, 0.0);
        assert!(out.ok);
        assert_eq!(out.geometry.triangle_count(), 2);
        assert_eq!(out.geometry.points[0], Vec2::new(100.0, 0.0));
        assert_relative_eq!(out.geometry.uvs[2].x, 0.0625, epsilon = 1e-5);
    }

    #[test]
    fn tween_blends_toward_next_keyframe() {
        let d = doc(json!({
            "atlas": { "path": "atlas.png", "size": [64, 64] },
            "symbols": [
                { "token": "Root", "duration": 4, "layers": [{ "name": "L", "frames": [
                    { "start": 0, "duration": 2, "tween": {}, "elements": [
                        { "type": "symbol", "symbol": "Leaf" }
                    ]},
                    { "start": 2, "duration": 2, "elements": [
                        { "type": "symbol", "symbol": "Leaf", "matrix": { "tx": 10 } }
                    ]}
                ]}]},
                { "token": "Leaf", "duration": 1, "layers": [{ "name": "L", "frames": [
                    { "start": 0, "elements": [shape(0.0, 8.0)] }
                ]}]}
            ]
        }));
        let out = run(&d, &TrackState::new(), "Root", 1.0, 0.0);
        assert_relative_eq!(out.geometry.points[0].x, 5.0);
    }

    #[test]
    fn masked_layers_reference_the_clip_cache() {
        let d = doc(json!({
            "atlas": { "path": "atlas.png", "size": [64, 64] },
            "symbols": [
                { "token": "Root", "duration": 1, "layers": [
                    { "name": "mask", "mask": 7, "frames": [{ "start": 0, "elements": [shape(0.0, 8.0)] }] },
                    { "name": "art", "maskedBy": 7, "frames": [{ "start": 0, "elements": [shape(8.0, 8.0)] }] },
                    { "name": "free", "frames": [{ "start": 0, "elements": [shape(16.0, 8.0)] }] }
                ]}
            ]
        }));
        let out = run(&d, &TrackState::new(), "Root", 0.0, 0.0);
        // Mask content draws nothing.
        assert_eq!(out.geometry.triangle_count(), 4);
        assert_eq!(out.masks.mask_items(MaskId(7)).map(<[_]>::len), Some(1));
        // Masked geometry: group 0, one active item, layer 1 -> 257.
        assert_eq!(out.geometry.uvs[0].floor(), Vec2::new(0.0, 257.0));
        // Unmasked geometry after clip_end: one cache entry snapshotted, none active.
        assert_eq!(out.geometry.uvs[4].floor(), Vec2::new(1.0, 1.0));
        assert!(out.masks.active_items().is_empty());
    }

    #[test]
    fn events_fire_once_when_crossed() {
        let d = doc(json!({
            "symbols": [
                { "token": "Root", "duration": 10, "layers": [
                    { "name": "a", "frames": [
                        { "start": 0, "duration": 4 },
                        { "start": 4, "duration": 6, "event": { "name": "step" } }
                    ]},
                    { "name": "b", "frames": [
                        { "start": 4, "duration": 6, "event": { "name": "step" } }
                    ]}
                ]}
            ]
        }));
        let tracks = TrackState::new();
        let out = run(&d, &tracks, "Root", 4.5, 1.0);
        assert_eq!(out.events.names(), ["step"]);
        let out = run(&d, &tracks, "Root", 6.0, 1.0);
        assert!(out.events.is_empty());
    }

    #[test]
    fn overrides_pick_child_frame() {
        let d = doc(json!({
            "atlas": { "path": "atlas.png", "size": [64, 64] },
            "symbols": [
                { "token": "Root", "duration": 1, "layers": [{ "name": "L", "frames": [
                    { "start": 0, "elements": [{ "type": "symbol", "symbol": "Face" }] }
                ]}]},
                { "token": "Face", "duration": 2, "overridable": true, "layers": [{ "name": "L", "frames": [
                    { "start": 0, "duration": 1 },
                    { "start": 1, "duration": 1, "elements": [shape(0.0, 4.0)] }
                ]}]}
            ]
        }));
        let mut tracks = TrackState::new();
        tracks.reset(Some(&d));
        assert!(run(&d, &tracks, "Root", 0.0, 0.0).geometry.is_empty());
        tracks.override_frame(&d, "Face", Some(1.0));
        assert_eq!(run(&d, &tracks, "Root", 0.0, 0.0).geometry.triangle_count(), 2);
    }
}
