//! Mask/clip stack.
//!
//! Mask layers record [`MaskItem`]s into named groups (`mask_begin` /
//! `mask_add` / `mask_end`). Masked layers then activate a group around their
//! geometry (`clip_begin` / `clip_end`). Every begin/end first snapshots the
//! currently active items into the clip cache, so a polygon emitted while `n`
//! items are active finds them at `cache[group_id .. group_id + n]`, where
//! `group_id` is the cache length at emission time.
//!
//! `clip_end` pops as many items from the back of the active list as the group
//! holds; this restores the previous set only under strict LIFO nesting.

use glam::Affine2;
use hashbrown::HashMap;

use crate::geometry::ClipSlot;
use crate::ids::MaskId;
use crate::transform::Rect;

/// One stencil entry: an atlas region placed by `transform`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaskItem {
    /// Maps region pixel space (`0..region.size`) to player-local space.
    pub transform: Affine2,
    pub texture_region: Rect,
    pub texture_index: u32,
}

#[derive(Debug, Default, Clone)]
pub struct MaskStack {
    masks: HashMap<MaskId, Vec<MaskItem>>,
    stack: Vec<MaskId>,
    current: Option<MaskId>,
    clip_items: Vec<MaskItem>,
    clip_cache: Vec<MaskItem>,
}

impl MaskStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all groups, nesting state and clip lists.
    pub fn clear(&mut self) {
        self.masks.clear();
        self.stack.clear();
        self.current = None;
        self.clip_items.clear();
        self.clip_cache.clear();
    }

    /// Open mask group `id`. The first open group becomes the current target
    /// of `mask_add`; nested opens keep recording into it.
    pub fn mask_begin(&mut self, id: MaskId) {
        if self.current.is_none() {
            self.current = Some(id);
            self.masks.insert(id, Vec::new());
        } else {
            self.masks.entry(id).or_default();
        }
        self.stack.push(id);
    }

    /// Close mask group `id` if it is the innermost open group.
    pub fn mask_end(&mut self, id: MaskId) {
        if self.stack.last() != Some(&id) {
            return;
        }
        self.stack.pop();
        self.current = self.stack.last().copied();
    }

    #[inline]
    pub fn is_masking(&self) -> bool {
        self.current.is_some()
    }

    #[inline]
    pub fn current_mask(&self) -> Option<MaskId> {
        self.current
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Append an item to the current mask group. Ignored when no group is open.
    pub fn mask_add(&mut self, transform: Affine2, texture_region: Rect, texture_index: u32) {
        let Some(current) = self.current else {
            log::debug!("mask_add outside of a mask group");
            return;
        };
        self.masks.entry(current).or_default().push(MaskItem {
            transform,
            texture_region,
            texture_index,
        });
    }

    pub fn mask_items(&self, id: MaskId) -> Option<&[MaskItem]> {
        self.masks.get(&id).map(Vec::as_slice)
    }

    /// Activate mask group `id` on top of the currently active items.
    pub fn clip_begin(&mut self, id: MaskId) {
        let Some(items) = self.masks.get(&id) else {
            return;
        };
        self.clip_cache.extend_from_slice(&self.clip_items);
        self.clip_items.extend_from_slice(items);
    }

    /// Deactivate mask group `id`.
    pub fn clip_end(&mut self, id: MaskId) {
        let Some(items) = self.masks.get(&id) else {
            return;
        };
        self.clip_cache.extend_from_slice(&self.clip_items);
        let keep = self.clip_items.len().saturating_sub(items.len());
        self.clip_items.truncate(keep);
    }

    /// Clip slot for geometry emitted right now.
    #[inline]
    pub fn slot(&self) -> ClipSlot {
        ClipSlot {
            group_id: self.clip_cache.len(),
            count: self.clip_items.len(),
        }
    }

    /// Snapshot any still-active items so trailing geometry finds its entries.
    pub fn flush(&mut self) {
        if !self.clip_items.is_empty() {
            self.clip_cache.extend_from_slice(&self.clip_items);
        }
    }

    #[inline]
    pub fn active_items(&self) -> &[MaskItem] {
        &self.clip_items
    }

    #[inline]
    pub fn clip_cache(&self) -> &[MaskItem] {
        &self.clip_cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn item(x: f32) -> (Affine2, Rect, u32) {
        (
            Affine2::from_translation(Vec2::new(x, 0.0)),
            Rect::new(x, 0.0, 8.0, 8.0),
            0,
        )
    }

    fn define(stack: &mut MaskStack, id: u32, xs: &[f32]) {
        stack.mask_begin(MaskId(id));
        for x in xs {
            let (t, r, i) = item(*x);
            stack.mask_add(t, r, i);
        }
        stack.mask_end(MaskId(id));
    }

    #[test]
    fn begin_end_restores_nesting_state() {
        let mut s = MaskStack::new();
        s.mask_begin(MaskId(1));
        assert_eq!(s.current_mask(), Some(MaskId(1)));
        s.mask_begin(MaskId(2));
        assert_eq!(s.current_mask(), Some(MaskId(1)), "nested open keeps the target");
        assert_eq!(s.depth(), 2);
        s.mask_end(MaskId(2));
        assert_eq!(s.depth(), 1);
        assert_eq!(s.current_mask(), Some(MaskId(1)));
        s.mask_end(MaskId(1));
        assert_eq!(s.depth(), 0);
        assert!(!s.is_masking());
    }

    #[test]
    fn mask_end_ignores_non_top_ids() {
        let mut s = MaskStack::new();
        s.mask_begin(MaskId(1));
        s.mask_begin(MaskId(2));
        s.mask_end(MaskId(1));
        assert_eq!(s.depth(), 2);
    }

    #[test]
    fn mask_add_without_group_is_ignored() {
        let mut s = MaskStack::new();
        let (t, r, i) = item(0.0);
        s.mask_add(t, r, i);
        assert!(s.mask_items(MaskId(0)).is_none());
    }

    #[test]
    fn clip_begin_end_restores_active_items() {
        let mut s = MaskStack::new();
        define(&mut s, 1, &[1.0]);
        define(&mut s, 2, &[2.0, 3.0]);

        s.clip_begin(MaskId(1));
        let before: Vec<MaskItem> = s.active_items().to_vec();
        s.clip_begin(MaskId(2));
        assert_eq!(s.active_items().len(), 3);
        s.clip_end(MaskId(2));
        assert_eq!(s.active_items(), before.as_slice());
        s.clip_end(MaskId(1));
        assert!(s.active_items().is_empty());
    }

    #[test]
    fn unknown_groups_do_not_touch_lists() {
        let mut s = MaskStack::new();
        s.clip_begin(MaskId(9));
        s.clip_end(MaskId(9));
        assert!(s.clip_cache().is_empty());
        assert!(s.active_items().is_empty());
    }

    #[test]
    fn slot_points_at_future_snapshot() {
        let mut s = MaskStack::new();
        define(&mut s, 1, &[1.0]);
        s.clip_begin(MaskId(1));
        let slot = s.slot();
        assert_eq!(slot, ClipSlot { group_id: 0, count: 1 });
        s.clip_end(MaskId(1));
        assert_eq!(s.clip_cache()[slot.group_id].texture_region.position.x, 1.0);
    }
}
