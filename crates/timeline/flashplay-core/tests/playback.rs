use std::sync::Arc;

use approx::assert_relative_eq;
use flashplay_core::glam::{Affine2, Vec2};
use flashplay_core::{parse_stored_document_json, Config, Player, PlayerEvent, Runtime};
use flashplay_test_fixtures::documents;

fn hero_doc() -> Arc<flashplay_core::Document> {
    let json = documents::json("hero").unwrap();
    Arc::new(parse_stored_document_json(&json).unwrap())
}

fn player_with(doc: Arc<flashplay_core::Document>) -> Player {
    let cfg = Config {
        frame_rate: 10.0,
        ..Config::default()
    };
    let mut p = Player::new(cfg.clone(), Runtime::startup(&cfg));
    p.set_document(Some(doc));
    p.flush_pending_process();
    p.drain_events();
    p
}

fn user_events(events: &[PlayerEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            PlayerEvent::AnimationEvent { name } => Some(name.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn looping_advance_by_duration_is_periodic() {
    let mut p = player_with(hero_doc());
    p.set_active_symbol("Hero");
    p.set_looping(true);
    let duration = p.duration("Hero", "");
    for start in [0.0, 2.5, 7.0, 9.5] {
        p.seek_frame(start);
        p.advance(duration / p.frame_rate(), false, true);
        assert_relative_eq!(p.frame(), start, epsilon = 1e-4);
    }
}

#[test]
fn looping_seek_past_end_wraps() {
    let mut p = player_with(hero_doc());
    p.set_active_symbol("Hero");
    p.set_looping(true);
    p.advance(12.0 / p.frame_rate(), true, true);
    assert_relative_eq!(p.frame(), 2.0, epsilon = 1e-4);
    p.flush_pending_process();
    assert_eq!(p.drain_events(), vec![PlayerEvent::AnimationCompleted]);
}

#[test]
fn main_timeline_geometry_is_masked_and_nested() {
    let mut p = player_with(hero_doc());
    let geo = p.geometry();
    // Arm square and eye quad; the mask layer draws nothing.
    assert_eq!(geo.triangle_count(), 4);
    assert_eq!(geo.points[0], Vec2::new(10.0, 20.0));
    assert_eq!(geo.points[4], Vec2::new(40.0, 20.0));
    // One active clip item: group 0, count 1, atlas layers 0 and 1.
    assert_eq!(geo.uvs[0].floor(), Vec2::new(0.0, 256.0));
    assert_eq!(geo.uvs[4].floor(), Vec2::new(0.0, 257.0));
    // Eye bitmap is downscaled 2x in the atlas: far corner maps to (72, 8) px.
    assert_relative_eq!(geo.uvs[6].x.fract() * 2.0, 72.0 / 128.0, epsilon = 1e-5);
    assert_relative_eq!(geo.uvs[6].y.fract() * 2.0, 8.0 / 128.0, epsilon = 1e-5);
    assert_eq!(p.perf().triangles_generated, 4);

    let render = p.extract_render(Affine2::IDENTITY).expect("geometry to draw");
    assert_eq!(render.clip_texture.encoded(), 1);
}

#[test]
fn tween_moves_nested_arm() {
    let mut p = player_with(hero_doc());
    p.seek_frame(2.5);
    assert!(p.flush_pending_process());
    assert_relative_eq!(p.geometry().points[0].x, 15.0, epsilon = 1e-4);
    assert_relative_eq!(p.geometry().points[0].y, 20.0, epsilon = 1e-4);
}

#[test]
fn markers_fire_in_order_and_never_on_seek() {
    let mut p = player_with(hero_doc());
    p.advance(0.5, false, true);
    p.flush_pending_process();
    let events = p.drain_events();
    assert_eq!(user_events(&events), vec!["step_r", "flash"]);

    // Hero wraps from 5 to 0 while the stage moves 5 -> 10.
    p.advance(0.5, false, true);
    p.flush_pending_process();
    assert_eq!(user_events(&p.drain_events()), vec!["step_l"]);

    p.advance(0.5, true, true);
    p.flush_pending_process();
    assert!(user_events(&p.drain_events()).is_empty());
}

#[test]
fn completion_is_deferred_to_flush() {
    let mut p = player_with(hero_doc());
    p.set_playing(true);
    p.tick(3.0);
    assert!(p.drain_events().is_empty(), "setters and ticks never emit");
    assert!(p.has_pending_process());
    p.flush_pending_process();
    let events = p.drain_events();
    assert_eq!(events.first(), Some(&PlayerEvent::AnimationCompleted));
    assert!(p.frame() < 20.0);
}

#[test]
fn paused_player_does_not_move() {
    let mut p = player_with(hero_doc());
    p.tick(1.0);
    assert_eq!(p.frame(), 0.0);
    assert!(!p.has_pending_process());
}

#[test]
fn players_share_one_document() {
    let doc = hero_doc();
    let mut a = player_with(Arc::clone(&doc));
    let mut b = player_with(Arc::clone(&doc));
    a.set_variant("mood", Some("angry"));
    a.flush_pending_process();
    b.flush_pending_process();
    assert_eq!(a.variant("mood"), "angry");
    assert_eq!(b.variant("mood"), "[default]");
    assert_ne!(a.geometry().points[4], b.geometry().points[4]);
    assert_eq!(Arc::strong_count(&doc), 3);
}

#[test]
fn missing_atlas_draws_nothing() {
    let doc = parse_stored_document_json(
        r#"{ "symbols": [{ "token": "S", "duration": 1, "layers": [{ "frames": [{ "start": 0, "elements": [
            { "type": "shape", "texture": { "x": 0, "y": 0, "w": 4, "h": 4 },
              "polygons": [[[0, 0], [4, 0], [4, 4]]] }
        ]}]}]}] }"#,
    )
    .unwrap();
    let mut p = player_with(Arc::new(doc));
    assert!(p.geometry().is_empty());
    assert!(p.material_params().is_none());
    assert!(p.extract_render(Affine2::IDENTITY).is_none());
}

#[test]
fn clearing_the_document_notifies() {
    let mut p = player_with(hero_doc());
    p.set_document(None);
    p.flush_pending_process();
    assert_eq!(p.drain_events(), vec![PlayerEvent::DocumentChanged]);
    assert!(p.geometry().is_empty());
    assert!(p.list_symbols().is_empty());
}

#[test]
fn symbol_and_clip_queries() {
    let p = player_with(hero_doc());
    assert_eq!(p.list_symbols(), vec!["Stage", "Hero"]);
    assert_eq!(p.list_clips("Hero"), vec!["idle", "walk"]);
    assert_eq!(p.list_clip_tracks(), vec!["body"]);
    assert_eq!(p.list_clips_for_track("body"), vec!["walk", "idle"]);
    assert_eq!(p.list_variants(), vec!["mood"]);
    assert_eq!(p.variant_options("mood"), vec!["[default]", "happy", "angry"]);
    assert!(p.variant_options("nope").is_empty());
}
