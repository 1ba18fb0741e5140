//! Track/cursor state owned by one player.
//!
//! - frame overrides: dense table indexed by a symbol's variation slot
//! - variants: named selections that write overrides in bulk
//! - clip tracks: per clips-header cursor `(start, end, elapsed)` advanced
//!   independently from the main frame counter
//!
//! Frame resolution for a symbol: active clip cursor, else override, else the
//! frame inherited from the parent.

use hashbrown::HashMap;

use crate::document::{ClipRange, Document, Symbol, DEFAULT_OPTION};

/// Cursor of one clip track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipState {
    pub start: f32,
    pub end: f32,
    pub elapsed: f32,
}

impl ClipState {
    pub fn new(range: ClipRange) -> Self {
        Self {
            start: range.start,
            end: range.end,
            elapsed: 0.0,
        }
    }

    #[inline]
    pub fn duration(&self) -> f32 {
        self.end - self.start
    }

    #[inline]
    pub fn frame(&self) -> f32 {
        self.start + self.elapsed
    }
}

/// Whether `option` means "no selection".
#[inline]
pub fn is_default_option(option: Option<&str>) -> bool {
    matches!(option, None | Some("") | Some(DEFAULT_OPTION))
}

/// Wrap `elapsed` into a clip of `duration`.
///
/// Non-positive durations pin the cursor to 0. When looping, the cursor is
/// folded into `[0, duration)`; non-finite times pin to 0.
#[inline]
pub fn wrap_elapsed(elapsed: f32, duration: f32, looping: bool) -> f32 {
    if duration <= 0.0 {
        return 0.0;
    }
    if !looping {
        return elapsed;
    }
    if !elapsed.is_finite() {
        return 0.0;
    }
    let e = elapsed.rem_euclid(duration);
    // rem_euclid can round up to `duration` for tiny negative inputs.
    if e >= duration {
        0.0
    } else {
        e
    }
}

#[derive(Clone, Debug, Default)]
pub struct TrackState {
    frame_overrides: Vec<Option<f32>>,
    active_variants: HashMap<String, String>,
    clips_state: HashMap<String, ClipState>,
    active_clips: HashMap<String, String>,
}

impl TrackState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for `doc`, sizing the override table to its variation slots.
    pub fn reset(&mut self, doc: Option<&Document>) {
        self.frame_overrides = vec![None; doc.map_or(0, Document::variated_symbols_count)];
        self.active_variants.clear();
        self.clips_state.clear();
        self.active_clips.clear();
    }

    #[inline]
    pub fn frame_overrides(&self) -> &[Option<f32>] {
        &self.frame_overrides
    }

    /// Force `token`'s frame, or clear the override with `None`.
    ///
    /// Returns whether anything was written.
    pub fn override_frame(&mut self, doc: &Document, token: &str, frame: Option<f32>) -> bool {
        let Some(slot) = doc.symbol_by_token(token).and_then(|s| s.variation_index) else {
            return false;
        };
        match self.frame_overrides.get_mut(slot) {
            Some(entry) => {
                *entry = frame;
                true
            }
            None => false,
        }
    }

    /// Select `option` for `variant`, writing its frames into the override table.
    ///
    /// `None`, empty or `"[default]"` clears every override the variant controls.
    /// Unknown variants or options are ignored. Returns whether state changed.
    pub fn set_variant(&mut self, doc: &Document, variant: &str, option: Option<&str>) -> bool {
        let Some(options) = doc.variants().get(variant) else {
            log::warn!("set_variant: unknown variant '{variant}'");
            return false;
        };

        if is_default_option(option) {
            self.active_variants.remove(variant);
            for frames in options.values() {
                for token in frames.keys() {
                    self.override_frame(doc, token, None);
                }
            }
            return true;
        }

        let option = option.unwrap_or_default();
        let Some(frames) = options.get(option) else {
            log::warn!("set_variant: variant '{variant}' has no option '{option}'");
            return false;
        };
        self.active_variants
            .insert(variant.to_string(), option.to_string());
        for (token, frame) in frames {
            self.override_frame(doc, token, Some(*frame));
        }
        true
    }

    pub fn variant(&self, variant: &str) -> &str {
        self.active_variants
            .get(variant)
            .map_or(DEFAULT_OPTION, String::as_str)
    }

    /// Select `clip` on `track`, restarting its cursor.
    ///
    /// `None`, empty or `"[default]"` clears the track. Reselecting the active
    /// clip and unknown clips are no-ops. Returns whether state changed.
    pub fn set_clip(&mut self, doc: &Document, track: &str, clip: Option<&str>) -> bool {
        if is_default_option(clip) {
            let had_state = self.clips_state.remove(track).is_some();
            let had_clip = self.active_clips.remove(track).is_some();
            return had_state || had_clip;
        }
        let clip = clip.unwrap_or_default();
        if self.active_clips.get(track).map(String::as_str) == Some(clip) {
            return false;
        }
        let Some(range) = find_clip(doc, track, clip) else {
            log::warn!("set_clip: track '{track}' has no clip '{clip}'");
            return false;
        };
        self.active_clips
            .insert(track.to_string(), clip.to_string());
        self.clips_state
            .insert(track.to_string(), ClipState::new(range));
        true
    }

    pub fn clip(&self, track: &str) -> &str {
        self.active_clips
            .get(track)
            .map_or(DEFAULT_OPTION, String::as_str)
    }

    pub fn clip_state(&self, track: &str) -> Option<&ClipState> {
        self.clips_state.get(track)
    }

    /// Frame a symbol should display, given the frame inherited from its parent.
    pub fn resolve_frame(&self, symbol: &Symbol, fallback: f32) -> f32 {
        if let Some(state) = symbol
            .clips_header
            .as_deref()
            .and_then(|h| self.clips_state.get(h))
        {
            return state.frame();
        }
        symbol
            .variation_index
            .and_then(|slot| self.frame_overrides.get(slot).copied().flatten())
            .filter(|f| *f >= 0.0)
            .unwrap_or(fallback)
    }

    /// Move every active track cursor by `delta` frames (or to `delta` when seeking).
    ///
    /// Returns whether any cursor moved.
    pub fn advance_tracks(&mut self, delta: f32, seek: bool, looping: bool) -> bool {
        let mut moved = false;
        for state in self.clips_state.values_mut() {
            let elapsed = if seek { delta } else { state.elapsed + delta };
            let next = wrap_elapsed(elapsed, state.duration(), looping);
            moved |= next != state.elapsed;
            state.elapsed = next;
        }
        moved
    }

    /// Drive a single track: select `clip` if it differs, then advance it.
    ///
    /// Returns `(elapsed, remaining, changed)` in frames; a non-seek advance
    /// never runs past the clip end.
    pub fn advance_clip_for_track(
        &mut self,
        doc: &Document,
        track: &str,
        clip: Option<&str>,
        delta: f32,
        seek: bool,
        looping: bool,
    ) -> (f32, f32, bool) {
        if is_default_option(clip) {
            let changed = self.set_clip(doc, track, None);
            return (0.0, 0.0, changed);
        }
        let mut changed = self.set_clip(doc, track, clip);
        let Some(state) = self.clips_state.get_mut(track) else {
            return (0.0, 0.0, changed);
        };
        let duration = state.duration();
        let next = if seek {
            delta
        } else {
            wrap_elapsed((state.elapsed + delta).min(duration), duration, looping)
        };
        if next != state.elapsed {
            state.elapsed = next;
            changed = true;
        }
        (
            state.elapsed.min(duration),
            duration - state.elapsed,
            changed,
        )
    }

    /// Active clip tracks and their selected clip.
    pub fn active_clips(&self) -> impl Iterator<Item = (&str, &str)> {
        self.active_clips
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Range of `clip` in the first symbol declaring `track` as its clips header.
pub fn find_clip(doc: &Document, track: &str, clip: &str) -> Option<ClipRange> {
    doc.symbols()
        .map(|(_, s)| s)
        .filter(|s| s.clips_header.as_deref() == Some(track))
        .find_map(|s| s.clip(clip))
}
