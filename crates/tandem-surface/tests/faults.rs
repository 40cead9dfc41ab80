mod common;

use common::{fixture, Fixture};
use tandem_surface::device::{OwnerDevice, SwapChain};
use tandem_surface::interop::SurfaceState;
use tandem_surface::soft::SoftFault;

const BUILD_FAULTS: [SoftFault; 5] = [
    SoftFault::CreateTexture,
    SoftFault::SharedHandle,
    SoftFault::OpenSharedResource,
    SoftFault::CreateShaderResourceView,
    SoftFault::CreateRenderTarget,
];

#[test]
fn failed_initialise_leaves_nothing_behind() {
    for fault in BUILD_FAULTS {
        let mut fx = fixture(32, 32);
        fx.adapter.inject_fault(fault);

        assert!(fx.surface.initialise(&fx.swap_chain).is_err(), "{fault:?}");
        assert_eq!(fx.surface.state(), SurfaceState::Uninitialised, "{fault:?}");
        assert_eq!(fx.surface.generation(), 0);
        assert!(fx.surface.shared_surface().is_none());
        assert!(fx.surface.guest_render_target().is_none());

        fx.surface.initialise(&fx.swap_chain).unwrap();
        fx.surface.draw().unwrap();
    }
}

#[test]
fn failed_resize_stays_resizing_and_can_retry() {
    for fault in BUILD_FAULTS {
        let mut fx = Fixture::initialised(32, 32);
        fx.surface.draw().unwrap();
        fx.adapter.inject_fault(fault);

        assert!(fx.resize(40, 24).is_err(), "{fault:?}");
        assert_eq!(fx.surface.state(), SurfaceState::Resizing, "{fault:?}");
        assert_eq!(fx.surface.generation(), 1);
        assert!(fx.surface.draw().unwrap_err().is_invalid_operation());

        fx.surface.resize(&fx.swap_chain).unwrap();
        fx.surface.owner_device().bind_back_buffer(&fx.swap_chain).unwrap();
        fx.surface.draw().unwrap();
        assert_eq!(fx.surface.surface_desc().unwrap().width, 40);
    }
}

#[test]
fn failed_resize_buffers_keeps_the_old_buffers() {
    let mut fx = Fixture::initialised(32, 32);
    fx.adapter.inject_fault(SoftFault::ResizeBuffers);

    assert!(fx.resize(64, 64).is_err());
    assert_eq!(fx.swap_chain.back_buffer_desc().unwrap().width, 32);
    assert_eq!(fx.surface.state(), SurfaceState::Resizing);

    fx.resize(64, 64).unwrap();
    assert_eq!(fx.surface.state(), SurfaceState::Initialised);
    fx.surface.draw().unwrap();
}

#[test]
fn failed_record_is_retried_on_next_draw() {
    let mut fx = Fixture::initialised(32, 32);
    fx.adapter.inject_fault(SoftFault::FinishCommandList);

    assert!(fx.surface.draw().is_err());
    assert!(fx.surface.command_list().is_none());
    assert_eq!(fx.surface.cache_builds(), 0);

    fx.surface.draw().unwrap();
    assert_eq!(fx.surface.cache_builds(), 1);
}

#[test]
fn failed_execute_releases_the_owner_lock() {
    let mut fx = Fixture::initialised(32, 32);
    fx.adapter.inject_fault(SoftFault::ExecuteCommandList);

    assert!(fx.surface.draw().is_err());
    assert!(!fx.surface.owner_lock().unwrap().raw().is_held());
    assert_eq!(fx.surface.cache_builds(), 1);

    fx.surface.draw().unwrap();
    assert_eq!(fx.surface.cache_builds(), 1);
}
