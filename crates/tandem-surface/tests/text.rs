mod common;

use common::{fixture, Fixture};
use tandem_surface::coords::Rect;
use tandem_surface::device::{FontStretch, FontStyle, FontWeight, LockSide, LockTimeout};
use tandem_surface::paint::Color;
use tandem_surface::soft::{SoftEvent, SoftFault};

fn sequence(events: &[SoftEvent]) -> Vec<&'static str> {
    events
        .iter()
        .filter_map(|e| match e {
            SoftEvent::KeyedAcquire { .. } => Some("acquire"),
            SoftEvent::BeginDraw { .. } => Some("begin"),
            SoftEvent::DrawText { .. } => Some("text"),
            SoftEvent::EndDraw { .. } => Some("end"),
            SoftEvent::KeyedRelease { .. } => Some("release"),
            _ => None,
        })
        .collect()
}

#[test]
fn draw_text_brackets_with_lock_and_draw() {
    let mut fx = Fixture::initialised(200, 80);
    let format = fx
        .surface
        .create_text_format("Segoe UI", 18.0, FontWeight::NORMAL, FontStyle::Normal, FontStretch::Normal, None)
        .unwrap();
    let brush = fx.surface.create_solid_brush(Color::WHITE).unwrap();
    fx.adapter.clear_journal();

    fx.surface.draw_text("hello", &format, &brush, None, true).unwrap();

    let events = fx.events();
    assert_eq!(sequence(&events), ["acquire", "begin", "text", "end", "release"]);
    assert!(events.iter().any(|e| matches!(e, SoftEvent::DrawText { text, .. } if text == "hello")));
    assert!(!fx.surface.guest_lock().unwrap().raw().is_held());
}

#[test]
fn failed_end_draw_still_releases() {
    let mut fx = Fixture::initialised(64, 32);
    let format = fx
        .surface
        .create_text_format("Segoe UI", 12.0, FontWeight::BOLD, FontStyle::Italic, FontStretch::Normal, Some("fr-FR"))
        .unwrap();
    let brush = fx.surface.create_solid_brush(Color::WHITE).unwrap();
    fx.adapter.clear_journal();
    fx.adapter.inject_fault(SoftFault::EndDraw);

    let err = fx
        .surface
        .draw_text("x", &format, &brush, Some(Rect::new(0.0, 0.0, 32.0, 16.0)), true)
        .unwrap_err();
    assert!(err.code().is_some());

    let events = fx.events();
    assert_eq!(sequence(&events), ["acquire", "begin", "text", "end", "release"]);
    assert!(events.iter().any(|e| matches!(e, SoftEvent::EndDraw { ok: false, .. })));
    assert!(!fx.surface.guest_lock().unwrap().raw().is_held());

    // The surface is usable again on the next frame.
    fx.surface.draw_text("x", &format, &brush, None, true).unwrap();
    fx.surface.draw().unwrap();
}

#[test]
fn text_without_auto_lock_leaves_bracketing_to_the_caller() {
    let mut fx = Fixture::initialised(64, 32);
    let format = fx
        .surface
        .create_text_format("Segoe UI", 12.0, FontWeight::NORMAL, FontStyle::Normal, FontStretch::Normal, None)
        .unwrap();
    let brush = fx.surface.create_solid_brush(Color::WHITE).unwrap();
    let key = fx.surface.config().guest_key;

    fx.surface.acquire(LockSide::Guest, key, LockTimeout::Infinite).unwrap();
    fx.surface.begin_draw().unwrap();
    fx.adapter.clear_journal();
    fx.surface.draw_text("manual", &format, &brush, None, false).unwrap();
    assert_eq!(sequence(&fx.events()), ["text"]);
    fx.surface.end_draw().unwrap();
    fx.surface.release(LockSide::Guest, key).unwrap();
}

#[test]
fn text_format_before_initialise_is_rejected() {
    let mut fx = fixture(32, 32);
    let err = fx
        .surface
        .create_text_format("Segoe UI", 12.0, FontWeight::NORMAL, FontStyle::Normal, FontStretch::Normal, None)
        .unwrap_err();
    assert!(err.is_invalid_operation());
}

#[test]
fn format_falls_back_to_the_default_locale() {
    let mut fx = Fixture::initialised(32, 32);
    assert_eq!(fx.surface.default_locale().unwrap(), "en-US");

    let format = fx
        .surface
        .create_text_format("Segoe UI", 12.0, FontWeight::NORMAL, FontStyle::Normal, FontStretch::Normal, None)
        .unwrap();
    assert_eq!(format.desc().locale, "en-US");

    let format = fx
        .surface
        .create_text_format("Segoe UI", 12.0, FontWeight::NORMAL, FontStyle::Normal, FontStretch::Normal, Some("de-DE"))
        .unwrap();
    assert_eq!(format.desc().locale, "de-DE");
}
