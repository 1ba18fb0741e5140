//! Core configuration for flashplay-core.

use serde::{Deserialize, Serialize};

/// Configuration for player defaults and side-channel sizing.
/// Keep this minimal; expand as needed without breaking API.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Frames per second used to convert host seconds into timeline frames.
    pub frame_rate: f32,
    /// Initial loop flag for new players.
    pub looping: bool,
    /// Initial playing flag for new players.
    pub playing: bool,

    /// Side length (in texels) of the square clip side-channel texture.
    pub clip_texture_size: usize,
    /// Texel stride reserved for every encoded clip entry (3 used, 1 padding).
    pub clip_texels_per_entry: usize,
    /// Maximum clip entries the shading stage evaluates for one geometry group.
    pub max_clips_per_group: usize,

    /// Maximum user events retained per process step; extras are dropped.
    pub max_events_per_step: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_rate: 30.0,
            looping: false,
            playing: false,
            clip_texture_size: 32,
            clip_texels_per_entry: 4,
            max_clips_per_group: 4,
            max_events_per_step: 256,
        }
    }
}

impl Config {
    /// Number of clip entries the side-channel texture can carry.
    pub fn clip_capacity(&self) -> usize {
        let stride = self.clip_texels_per_entry.max(1);
        (self.clip_texture_size / stride) * self.clip_texture_size
    }
}
