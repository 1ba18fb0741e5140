//! Player: per-instance playback state over a shared [`Document`].
//!
//! Host frame loop:
//! 1. `tick(dt)` and any setters (`set_clip`, `set_variant`, ...) mutate state
//!    and request a process step.
//! 2. `flush_pending_process()` runs at most one step for everything requested
//!    since the last flush, then fills the event outbox.
//! 3. `extract_render(camera)` encodes the clip side channel and lends the
//!    buffers to the renderer; `drain_events()` hands notifications to scripts.
//!
//! Setters never emit events directly, so a listener reacting to an event can
//! safely call back into the player.

use std::sync::Arc;

use glam::Affine2;

use crate::clip_texture::ClipTexture;
use crate::config::Config;
use crate::document::{Document, Symbol, DEFAULT_OPTION};
use crate::geometry::GeometryBuffers;
use crate::ids::SymbolId;
use crate::masking::MaskStack;
use crate::outputs::{EventQueue, MaterialParams, PerfCounters, PlayerEvent, RenderFrame};
use crate::runtime::Runtime;
use crate::tracks::TrackState;
use crate::walker::{Placement, Walker};

/// Active-symbol name selecting the document's main timeline.
pub const DOCUMENT_SYMBOL: &str = "[document]";
/// Active-clip name selecting the whole symbol.
pub const FULL_CLIP: &str = "[full]";

/// Distance kept from the window end when non-looping playback completes.
const END_EPSILON: f32 = 0.0001;

#[derive(Debug)]
pub struct Player {
    cfg: Config,
    runtime: Arc<Runtime>,
    document: Option<Arc<Document>>,

    // Playback
    active_symbol: Option<SymbolId>,
    /// Empty selects the main timeline.
    active_symbol_name: String,
    /// Empty selects the whole symbol.
    active_clip: String,
    frame: f32,
    playback_start: f32,
    playback_end: f32,
    frame_rate: f32,
    looping: bool,
    playing: bool,
    editor_preview: bool,
    finished: bool,
    player_transform: Affine2,

    // Per-player mutable state
    tracks: TrackState,
    masks: MaskStack,
    geometry: GeometryBuffers,
    clip_texture: ClipTexture,
    step_events: EventQueue,

    // Deferred processing
    queued_delta: Option<f32>,
    processed_frame: Option<f32>,
    tracks_dirty: bool,
    completed: bool,
    document_changed: bool,
    outbox: Vec<PlayerEvent>,

    perf: PerfCounters,
    /// Bumped every time geometry is rebuilt.
    generation: u64,
    /// Generation and transforms the clip texture was last encoded for.
    encoded_for: Option<(u64, Affine2, Affine2)>,
}

impl Player {
    pub fn new(cfg: Config, runtime: Arc<Runtime>) -> Self {
        Self {
            frame_rate: cfg.frame_rate,
            looping: cfg.looping,
            playing: cfg.playing,
            clip_texture: ClipTexture::new(&cfg),
            step_events: EventQueue::new(cfg.max_events_per_step),
            cfg,
            runtime,
            document: None,
            active_symbol: None,
            active_symbol_name: String::new(),
            active_clip: String::new(),
            frame: 0.0,
            playback_start: 0.0,
            playback_end: 0.0,
            editor_preview: false,
            finished: false,
            player_transform: Affine2::IDENTITY,
            tracks: TrackState::new(),
            masks: MaskStack::new(),
            geometry: GeometryBuffers::new(),
            queued_delta: None,
            processed_frame: None,
            tracks_dirty: true,
            completed: false,
            document_changed: false,
            outbox: Vec::new(),
            perf: PerfCounters::default(),
            generation: 0,
            encoded_for: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    // ----- document -----

    /// Replace (or clear) the document. Resets all playback and track state
    /// and selects the main timeline.
    pub fn set_document(&mut self, document: Option<Arc<Document>>) {
        let same = match (&self.document, &document) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if !same {
            self.active_symbol_name.clear();
        }
        self.document = document;
        match self.document.as_deref() {
            None => log::warn!("player: document cleared, nothing will be drawn"),
            Some(doc) if doc.atlas().is_none() => log::warn!(
                "player: document '{}' has no texture atlas, nothing will be drawn",
                doc.document_path()
            ),
            Some(_) => {}
        }
        self.tracks.reset(self.document.as_deref());
        self.active_clip.clear();
        self.active_symbol = match self.lookup_symbol(&self.active_symbol_name) {
            Some(id) => Some(id),
            None => {
                self.active_symbol_name.clear();
                self.lookup_symbol("")
            }
        };
        self.playback_start = 0.0;
        self.playback_end = self.active_duration();
        self.frame = 0.0;
        self.finished = false;
        self.processed_frame = None;
        self.tracks_dirty = true;
        self.document_changed = true;
        self.request_process(0.0);
    }

    pub fn document(&self) -> Option<&Arc<Document>> {
        self.document.as_ref()
    }

    fn lookup_symbol(&self, token: &str) -> Option<SymbolId> {
        let doc = self.document.as_deref()?;
        if token.is_empty() {
            doc.main_timeline()
        } else {
            doc.symbol_id(token)
        }
    }

    fn active_symbol_ref(&self) -> Option<&Symbol> {
        let doc = self.document.as_deref()?;
        doc.symbol(self.active_symbol?)
    }

    fn active_duration(&self) -> f32 {
        self.active_symbol_ref().map_or(0.0, |s| s.duration as f32)
    }

    // ----- active symbol / clip -----

    /// Select the symbol to play; `"[document]"` or empty selects the main timeline.
    pub fn set_active_symbol(&mut self, token: &str) {
        let token = if token == DOCUMENT_SYMBOL { "" } else { token };
        if token == self.active_symbol_name {
            return;
        }
        if self.document.is_none() {
            log::warn!("set_active_symbol('{token}'): no document");
            return;
        }
        let Some(id) = self.lookup_symbol(token) else {
            log::warn!("set_active_symbol: unknown symbol '{token}'");
            return;
        };
        self.active_symbol_name = token.to_string();
        self.active_symbol = Some(id);
        self.active_clip.clear();
        self.frame = 0.0;
        self.playback_start = 0.0;
        self.playback_end = self.active_duration();
        self.finished = false;
        self.processed_frame = None;
        self.request_process(0.0);
    }

    pub fn active_symbol(&self) -> &str {
        if self.active_symbol_name.is_empty() {
            DOCUMENT_SYMBOL
        } else {
            &self.active_symbol_name
        }
    }

    /// Restrict playback to a clip of the active symbol and seek to its start.
    /// `"[full]"` or empty plays the whole symbol.
    pub fn set_active_clip(&mut self, clip: &str) {
        let clip = if clip == FULL_CLIP { "" } else { clip };
        if clip == self.active_clip {
            return;
        }
        let Some(symbol) = self.active_symbol_ref() else {
            log::warn!("set_active_clip('{clip}'): no active symbol");
            return;
        };
        let (start, end) = if clip.is_empty() {
            (0.0, symbol.duration as f32)
        } else {
            match symbol.clip(clip) {
                Some(range) => (range.start, range.end),
                None => {
                    log::warn!("set_active_clip: symbol '{}' has no clip '{clip}'", symbol.token);
                    return;
                }
            }
        };
        self.active_clip = clip.to_string();
        self.playback_start = start;
        self.playback_end = end;
        self.frame = start;
        self.finished = false;
        self.request_process(0.0);
    }

    pub fn active_clip(&self) -> &str {
        if self.active_clip.is_empty() {
            FULL_CLIP
        } else {
            &self.active_clip
        }
    }

    /// `[start, end)` frame window playback runs in.
    pub fn playback_window(&self) -> (f32, f32) {
        (self.playback_start, self.playback_end)
    }

    // ----- playback flags -----

    pub fn frame(&self) -> f32 {
        self.frame
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
        if playing {
            self.finished = false;
        }
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    pub fn set_frame_rate(&mut self, frame_rate: f32) {
        if frame_rate.is_nan() || frame_rate <= 0.0 {
            log::warn!("set_frame_rate: ignoring non-positive rate {frame_rate}");
            return;
        }
        self.frame_rate = frame_rate;
    }

    /// Editor preview mode: geometry still updates but user-facing events
    /// (named markers, completion) are not delivered.
    pub fn set_editor_preview(&mut self, preview: bool) {
        self.editor_preview = preview;
    }

    pub fn is_editor_preview(&self) -> bool {
        self.editor_preview
    }

    /// Extra transform applied in mask-region space (right of each item
    /// transform) when encoding the clip side channel. Identity by default.
    pub fn set_player_transform(&mut self, transform: Affine2) {
        self.player_transform = transform;
    }

    // ----- time -----

    /// Host per-frame entry point: advances by `dt` seconds while playing.
    pub fn tick(&mut self, dt: f32) {
        if self.playing && self.active_symbol.is_some() {
            self.advance(dt, false, true);
        }
    }

    /// Advance (or with `seek`, set) playback time in seconds.
    ///
    /// With `advance_all_tracks` every active clip track moves by the same
    /// amount. Seeking requests a step with zero delta, so no event markers fire.
    pub fn advance(&mut self, time: f32, seek: bool, advance_all_tracks: bool) {
        if self.active_symbol.is_none() {
            return;
        }
        let mut delta = time * self.frame_rate;
        if seek {
            self.frame = self.playback_start + delta;
            self.finished = false;
        } else {
            self.frame += delta;
        }

        if advance_all_tracks && self.tracks.advance_tracks(delta, seek, self.looping) {
            self.tracks_dirty = true;
        }
        if seek {
            delta = 0.0;
        }

        if self.settle_frame() {
            self.completed = true;
        }
        self.request_process(delta);
    }

    /// Seek to an absolute frame of the active symbol.
    pub fn seek_frame(&mut self, frame: f32) {
        if self.active_symbol.is_none() {
            return;
        }
        self.frame = frame;
        self.finished = false;
        if self.settle_frame() {
            self.completed = true;
        }
        self.request_process(0.0);
    }

    /// Fold the frame back into the playback window. Returns whether playback
    /// completed (reached the end, or wrapped when looping).
    fn settle_frame(&mut self) -> bool {
        let (start, end) = (self.playback_start, self.playback_end);
        if !self.frame.is_finite() {
            log::warn!("player: non-finite frame, resetting to {start}");
            self.frame = start;
        }
        let window = end - start;
        if self.looping {
            if window <= 0.0 {
                self.frame = start;
                return false;
            }
            let wrapped = self.frame >= end;
            if wrapped || self.frame < start {
                self.frame = start + (self.frame - start).rem_euclid(window);
            }
            return wrapped;
        }
        if self.frame < start {
            self.frame = start;
        }
        if self.frame >= end {
            self.frame = end - END_EPSILON;
            let first = !self.finished;
            self.finished = true;
            return first;
        }
        false
    }

    // ----- tracks -----

    /// Select `option` for `variant`; `None` or `"[default]"` clears it.
    pub fn set_variant(&mut self, variant: &str, option: Option<&str>) {
        let Some(doc) = self.document.clone() else {
            log::warn!("set_variant('{variant}'): no document");
            return;
        };
        if self.tracks.set_variant(&doc, variant, option) {
            self.tracks_dirty = true;
            self.request_process(0.0);
        }
    }

    pub fn variant(&self, variant: &str) -> &str {
        self.tracks.variant(variant)
    }

    /// Select `clip` on `track`; `None` or `"[default]"` clears the track.
    pub fn set_clip(&mut self, track: &str, clip: Option<&str>) {
        let Some(doc) = self.document.clone() else {
            log::warn!("set_clip('{track}'): no document");
            return;
        };
        if self.tracks.set_clip(&doc, track, clip) {
            self.tracks_dirty = true;
            self.request_process(0.0);
        }
    }

    pub fn clip(&self, track: &str) -> &str {
        self.tracks.clip(track)
    }

    /// Force the frame shown by every instance of `token`; `None` clears it.
    pub fn override_frame(&mut self, token: &str, frame: Option<f32>) {
        let Some(doc) = self.document.clone() else {
            return;
        };
        if self.tracks.override_frame(&doc, token, frame) {
            self.tracks_dirty = true;
            self.request_process(0.0);
        } else {
            log::debug!("override_frame: '{token}' has no variation slot");
        }
    }

    /// Frame `token` would show given the frame inherited from its parent.
    pub fn symbol_frame(&self, token: &str, fallback: f32) -> f32 {
        self.document
            .as_deref()
            .and_then(|doc| doc.symbol_by_token(token))
            .map_or(fallback, |s| self.tracks.resolve_frame(s, fallback))
    }

    /// Drive one clip track directly, returning `(elapsed, remaining)` in seconds.
    pub fn advance_clip_for_track(
        &mut self,
        track: &str,
        clip: Option<&str>,
        time: f32,
        seek: bool,
    ) -> (f32, f32) {
        let Some(doc) = self.document.clone() else {
            return (0.0, 0.0);
        };
        let delta = time * self.frame_rate;
        let (elapsed, remaining, changed) =
            self.tracks
                .advance_clip_for_track(&doc, track, clip, delta, seek, self.looping);
        if changed {
            self.tracks_dirty = true;
            self.request_process(0.0);
        }
        (elapsed / self.frame_rate, remaining / self.frame_rate)
    }

    pub fn tracks(&self) -> &TrackState {
        &self.tracks
    }

    // ----- processing -----

    /// Request a process step. Requests coalesce until the next flush, keeping
    /// the largest delta.
    pub fn request_process(&mut self, delta: f32) {
        self.queued_delta = Some(self.queued_delta.unwrap_or(0.0).max(delta));
    }

    pub fn has_pending_process(&self) -> bool {
        self.queued_delta.is_some()
    }

    /// Run the requested process step, if any, and queue notifications.
    ///
    /// Returns whether geometry was rebuilt.
    pub fn flush_pending_process(&mut self) -> bool {
        let Some(delta) = self.queued_delta.take() else {
            return false;
        };
        if std::mem::take(&mut self.document_changed) {
            self.outbox.push(PlayerEvent::DocumentChanged);
        }
        let completed = std::mem::take(&mut self.completed);
        if completed && !self.editor_preview {
            self.outbox.push(PlayerEvent::AnimationCompleted);
        }

        let rebuilt = self.process_step(delta);
        if rebuilt && !self.editor_preview {
            self.outbox.extend(
                self.step_events
                    .drain()
                    .map(|name| PlayerEvent::AnimationEvent { name }),
            );
        }
        rebuilt
    }

    fn process_step(&mut self, delta: f32) -> bool {
        if self.processed_frame == Some(self.frame) && !self.tracks_dirty {
            return false;
        }
        self.step_events.clear();
        self.masks.clear();
        self.geometry.clear();
        self.processed_frame = Some(self.frame);
        self.tracks_dirty = false;
        self.perf.triangles_generated = 0;
        self.generation += 1;

        let Some(doc) = self.document.as_deref() else {
            return true;
        };
        let Some(symbol) = self.active_symbol else {
            return true;
        };
        if doc.atlas().is_none() {
            log::warn!("process: document '{}' has no atlas, skipping", doc.document_path());
            return true;
        }

        let ok = Walker::new(
            doc,
            &self.tracks,
            &mut self.geometry,
            &mut self.masks,
            &mut self.step_events,
            delta,
        )
        .process(symbol, self.frame, Placement::default());
        if !ok {
            log::warn!("process: step aborted at frame {}", self.frame);
            self.geometry.clear();
            self.masks.clear();
            self.step_events.clear();
        }
        self.perf.triangles_generated = self.geometry.triangle_count();
        log::debug!(
            "process: frame {:.3} delta {:.3} -> {} triangles, {} clip entries",
            self.frame,
            delta,
            self.perf.triangles_generated,
            self.masks.clip_cache().len()
        );
        true
    }

    /// Notifications queued by flushes since the last drain, in order.
    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.outbox)
    }

    // ----- rendering -----

    /// Encode the clip side channel for `camera` and lend the buffers to the
    /// renderer. `None` when there is nothing to draw.
    ///
    /// `camera` maps player-local positions to view space and must be the
    /// matrix bound as the shader's `u_view` when drawing this frame.
    pub fn extract_render(&mut self, camera: Affine2) -> Option<RenderFrame<'_>> {
        if self.document.is_none() || self.active_symbol.is_none() || self.geometry.points.is_empty()
        {
            return None;
        }
        let key = (self.generation, camera, self.player_transform);
        if self.encoded_for != Some(key) {
            self.clip_texture
                .encode(self.masks.clip_cache(), camera, self.player_transform);
            self.encoded_for = Some(key);
        }
        self.perf.triangles_drawn = self.geometry.triangle_count();
        let clip_texture_changed = self.clip_texture.take_dirty();
        Some(RenderFrame {
            geometry: &self.geometry,
            clip_texture: &self.clip_texture,
            clip_texture_changed,
        })
    }

    pub fn geometry(&self) -> &GeometryBuffers {
        &self.geometry
    }

    pub fn masks(&self) -> &MaskStack {
        &self.masks
    }

    pub fn clip_texture(&self) -> &ClipTexture {
        &self.clip_texture
    }

    pub fn perf(&self) -> PerfCounters {
        self.perf
    }

    /// Host hid the player: nothing was generated or drawn.
    pub fn reset_perf(&mut self) {
        self.perf = PerfCounters::default();
    }

    /// Material bindings; `None` without a document or atlas.
    pub fn material_params(&self) -> Option<MaterialParams> {
        let doc = self.document.as_deref()?;
        Some(MaterialParams {
            atlas: doc.atlas()?.clone(),
            atlas_size: doc.atlas_size(),
            clip_texture_size: self.runtime.clip_texture_size(),
            max_clips_per_group: self.runtime.max_clips_per_group(),
        })
    }

    // ----- queries -----

    /// Public symbol tokens, in document order.
    pub fn list_symbols(&self) -> Vec<String> {
        let Some(doc) = self.document.as_deref() else {
            return Vec::new();
        };
        doc.symbols()
            .filter(|(_, s)| !s.is_internal())
            .map(|(token, _)| token.to_string())
            .collect()
    }

    /// Clip names of `symbol` (empty: the active symbol), ordered by start frame.
    pub fn list_clips(&self, symbol: &str) -> Vec<String> {
        let sym = if symbol.is_empty() {
            self.active_symbol_ref()
        } else {
            self.document
                .as_deref()
                .and_then(|doc| doc.symbol_by_token(symbol))
                .filter(|s| !s.is_internal())
        };
        let Some(sym) = sym else {
            return Vec::new();
        };
        let mut clips: Vec<(&String, f32)> = sym.clips.iter().map(|(k, r)| (k, r.start)).collect();
        clips.sort_by(|a, b| a.1.total_cmp(&b.1));
        clips.into_iter().map(|(k, _)| k.clone()).collect()
    }

    /// Distinct clip-track names, in document order.
    pub fn list_clip_tracks(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let Some(doc) = self.document.as_deref() else {
            return out;
        };
        for (_, s) in doc.symbols() {
            if let Some(header) = &s.clips_header {
                if !out.contains(header) {
                    out.push(header.clone());
                }
            }
        }
        out
    }

    /// Distinct clip names across every symbol on `track`.
    pub fn list_clips_for_track(&self, track: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let Some(doc) = self.document.as_deref() else {
            return out;
        };
        for (_, s) in doc.symbols() {
            if s.clips_header.as_deref() != Some(track) {
                continue;
            }
            for name in s.clips.keys() {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
        }
        out
    }

    pub fn list_variants(&self) -> Vec<String> {
        self.document
            .as_deref()
            .map(|doc| doc.variants().keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Options of `variant`, starting with `"[default]"`.
    pub fn variant_options(&self, variant: &str) -> Vec<String> {
        let Some(options) = self
            .document
            .as_deref()
            .and_then(|doc| doc.variants().get(variant))
        else {
            return Vec::new();
        };
        std::iter::once(DEFAULT_OPTION.to_string())
            .chain(options.keys().cloned())
            .collect()
    }

    /// Frame span of `symbol` (empty: main timeline) or of its `clip`.
    pub fn duration(&self, symbol: &str, clip: &str) -> f32 {
        self.document
            .as_deref()
            .map_or(0.0, |doc| doc.duration(symbol, clip))
    }
}
