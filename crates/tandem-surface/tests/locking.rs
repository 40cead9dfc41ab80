mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use common::{fixture_with, Fixture};
use tandem_surface::device::{AcquireStatus, GuestDevice, LockSide, LockTimeout};
use tandem_surface::interop::{CrossContextLock, SurfaceConfig};
use tandem_surface::paint::Color;
use tandem_surface::soft::{SoftEvent, SoftKeyedMutex};
use tandem_surface::ResultCode;

#[test]
fn owner_times_out_while_guest_holds() {
    let fx = Fixture::initialised(64, 64);
    let status = fx.surface.acquire(LockSide::Guest, 0, LockTimeout::Infinite).unwrap();
    assert_eq!(status, AcquireStatus::Acquired);
    fx.adapter.clear_journal();

    let status = fx.surface.acquire(LockSide::Owner, 0, LockTimeout::IMMEDIATE).unwrap();
    assert_eq!(status, AcquireStatus::TimedOut);

    let events = fx.events();
    assert!(matches!(events.as_slice(), [SoftEvent::KeyedAcquireTimedOut { key: 0, .. }]));
    assert!(!events.iter().any(SoftEvent::is_gpu_command));

    fx.surface.release(LockSide::Guest, 0).unwrap();
    let status = fx.surface.acquire(LockSide::Owner, 0, LockTimeout::IMMEDIATE).unwrap();
    assert_eq!(status, AcquireStatus::Acquired);
    fx.surface.release(LockSide::Owner, 0).unwrap();
}

fn release_keys(fx: &Fixture) -> Vec<u64> {
    fx.events()
        .into_iter()
        .filter_map(|e| match e {
            SoftEvent::KeyedRelease { key, .. } => Some(key),
            _ => None,
        })
        .collect()
}

#[test]
fn distinct_keys_hand_the_surface_back_and_forth() {
    let config = SurfaceConfig {
        owner_key: 0,
        guest_key: 1,
        lock_timeout: LockTimeout::from_millis(50),
        ..SurfaceConfig::default()
    };
    let mut fx = fixture_with(16, 16, config);
    fx.surface.initialise(&fx.swap_chain).unwrap();
    fx.adapter.clear_journal();

    for _ in 0..2 {
        fx.surface
            .draw_guest(true, |guest, target| guest.clear(target, Color::WHITE))
            .unwrap();
        fx.surface.draw().unwrap();
    }
    assert_eq!(release_keys(&fx), [0, 1, 0, 1]);

    // The guest has not drawn since, so the owner cannot go again.
    let err = fx.surface.draw().unwrap_err();
    assert!(err.is_lock_timeout(), "{err}");

    // A resized surface starts with the guest again.
    fx.resize(24, 24).unwrap();
    fx.surface
        .draw_guest(true, |guest, target| guest.clear(target, Color::WHITE))
        .unwrap();
    fx.surface.draw().unwrap();
}

#[test]
fn draw_reports_lock_timeout_without_drawing() {
    let config = SurfaceConfig {
        lock_timeout: LockTimeout::from_millis(10),
        ..SurfaceConfig::default()
    };
    let mut fx = fixture_with(32, 32, config);
    fx.surface.initialise(&fx.swap_chain).unwrap();
    fx.surface.acquire(LockSide::Guest, 0, LockTimeout::Infinite).unwrap();
    fx.adapter.clear_journal();

    let err = fx.surface.draw().unwrap_err();
    assert!(err.is_lock_timeout(), "{err}");
    assert!(!fx.events().iter().any(SoftEvent::is_gpu_command));

    fx.surface.release(LockSide::Guest, 0).unwrap();
    fx.surface.draw().unwrap();
}

#[test]
fn release_by_non_holder_is_invalid_call() {
    let fx = Fixture::initialised(16, 16);
    fx.surface.acquire(LockSide::Guest, 0, LockTimeout::Infinite).unwrap();

    let err = fx.surface.release(LockSide::Owner, 0).unwrap_err();
    assert_eq!(err.code(), Some(ResultCode::DXGI_ERROR_INVALID_CALL));
    assert!(fx.surface.guest_lock().unwrap().raw().is_held());
}

#[test]
fn acquire_needs_the_key_of_the_last_release() {
    let fx = Fixture::initialised(16, 16);
    fx.surface.acquire(LockSide::Guest, 0, LockTimeout::Infinite).unwrap();
    fx.surface.release(LockSide::Guest, 1).unwrap();

    let status = fx.surface.acquire(LockSide::Owner, 0, LockTimeout::IMMEDIATE).unwrap();
    assert_eq!(status, AcquireStatus::TimedOut);
    let status = fx.surface.acquire(LockSide::Owner, 1, LockTimeout::IMMEDIATE).unwrap();
    assert_eq!(status, AcquireStatus::Acquired);
    fx.surface.release(LockSide::Owner, 0).unwrap();
}

#[test]
fn sides_never_hold_at_once_across_threads() {
    const ROUNDS: usize = 200;

    let fx = Fixture::initialised(16, 16);
    let inside = Arc::new(AtomicBool::new(false));
    let entries = Arc::new(AtomicUsize::new(0));

    let owner = fx.surface.owner_lock().unwrap().clone();
    let guest = fx.surface.guest_lock().unwrap().clone();

    let spawn = |lock: CrossContextLock<SoftKeyedMutex>| {
        let inside = Arc::clone(&inside);
        let entries = Arc::clone(&entries);
        thread::spawn(move || {
            for _ in 0..ROUNDS {
                let guard = lock.lock(0, LockTimeout::Infinite).unwrap();
                assert!(!inside.swap(true, Ordering::SeqCst), "both sides inside");
                entries.fetch_add(1, Ordering::SeqCst);
                thread::yield_now();
                inside.store(false, Ordering::SeqCst);
                guard.release().unwrap();
            }
        })
    };

    let a = spawn(owner);
    let b = spawn(guest);
    a.join().unwrap();
    b.join().unwrap();

    assert_eq!(entries.load(Ordering::SeqCst), 2 * ROUNDS);
    assert!(!fx.surface.owner_lock().unwrap().raw().is_held());
    assert!(!fx.surface.guest_lock().unwrap().raw().is_held());
}

#[test]
fn locks_go_away_with_prepare_resize() {
    let mut fx = Fixture::initialised(16, 16);
    fx.surface.prepare_resize();

    let err = fx.surface.acquire(LockSide::Owner, 0, LockTimeout::IMMEDIATE).unwrap_err();
    assert_eq!(err.code(), Some(ResultCode::NOT_FOUND));
    assert!(fx.surface.guest_lock().is_err());
}
