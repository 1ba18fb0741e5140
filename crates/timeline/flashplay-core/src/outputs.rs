//! Output contracts of a player.
//!
//! Geometry and the clip side channel are rebuilt in place every processed
//! step; semantic notifications travel separately through an outbox the host
//! drains after the deferred flush.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::clip_texture::ClipTexture;
use crate::document::Atlas;
use crate::geometry::GeometryBuffers;

/// Notifications delivered through [`Player::drain_events`](crate::Player::drain_events).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum PlayerEvent {
    /// A named keyframe event marker was crossed.
    AnimationEvent { name: String },
    /// Playback reached the end of its window (or wrapped, when looping).
    AnimationCompleted,
    /// The player's document was replaced or cleared.
    DocumentChanged,
}

/// User event names collected during one process step.
///
/// Names are unique within a step; `front` entries go ahead of everything
/// already collected. Entries past `cap` are dropped.
#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    names: Vec<String>,
    cap: usize,
}

impl EventQueue {
    pub fn new(cap: usize) -> Self {
        Self {
            names: Vec::new(),
            cap,
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.names.clear();
    }

    /// Returns whether the name was queued.
    pub fn push(&mut self, name: &str, front: bool) -> bool {
        if self.names.iter().any(|n| n == name) {
            return false;
        }
        if self.names.len() >= self.cap {
            log::debug!("event queue full, dropping '{name}'");
            return false;
        }
        if front {
            self.names.insert(0, name.to_string());
        } else {
            self.names.push(name.to_string());
        }
        true
    }

    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = String> + '_ {
        self.names.drain(..)
    }
}

/// Triangle counters for the last step and the last render extraction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfCounters {
    pub triangles_generated: usize,
    pub triangles_drawn: usize,
}

/// Buffers handed to the host renderer for one draw.
#[derive(Debug)]
pub struct RenderFrame<'a> {
    pub geometry: &'a GeometryBuffers,
    pub clip_texture: &'a ClipTexture,
    /// True when the clip texture must be re-uploaded.
    pub clip_texture_changed: bool,
}

/// What the host binds on its material for this player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialParams {
    pub atlas: Atlas,
    pub atlas_size: Vec2,
    /// Side length of the clip side-channel texture.
    pub clip_texture_size: usize,
    pub max_clips_per_group: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_dedup_and_front() {
        let mut q = EventQueue::new(8);
        assert!(q.push("a", false));
        assert!(q.push("b", false));
        assert!(!q.push("a", true));
        assert!(q.push("c", true));
        assert_eq!(q.names(), ["c", "a", "b"]);
        let drained: Vec<String> = q.drain().collect();
        assert_eq!(drained.len(), 3);
        assert!(q.is_empty());
    }

    #[test]
    fn events_respect_cap() {
        let mut q = EventQueue::new(1);
        assert!(q.push("a", false));
        assert!(!q.push("b", true));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn player_event_serializes_with_tag() {
        let json = serde_json::to_value(PlayerEvent::AnimationEvent { name: "hit".into() }).unwrap();
        assert_eq!(json["AnimationEvent"]["name"], "hit");
    }
}
