//! Direct3D 11 owner + Direct2D/DirectWrite guest backend.
//!
//! The owner is a D3D11 device and its immediate context. The guest is a
//! second D3D11 device created with BGRA support; it opens the shared
//! texture by handle and drives Direct2D through a DXGI-surface render
//! target, so the guest-side keyed mutex belongs to that second device.

mod guest;
mod keyed;
mod owner;
mod shader;

use windows::Win32::Graphics::Direct3D::{D3D_DRIVER_TYPE, D3D_DRIVER_TYPE_HARDWARE, D3D_DRIVER_TYPE_UNKNOWN};
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, D3D11_CREATE_DEVICE_BGRA_SUPPORT,
    D3D11_SDK_VERSION,
};
use windows::Win32::Graphics::Dxgi::Common::{
    DXGI_FORMAT, DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_FORMAT_B8G8R8A8_UNORM_SRGB,
    DXGI_FORMAT_R10G10B10A2_UNORM, DXGI_FORMAT_R16G16B16A16_FLOAT, DXGI_FORMAT_R8G8B8A8_UNORM,
    DXGI_FORMAT_R8G8B8A8_UNORM_SRGB,
};
use windows::Win32::Graphics::Dxgi::{IDXGIAdapter, IDXGIDevice};
use windows::core::Interface;

use crate::device::{AdapterId, PixelFormat, Platform};
use crate::error::{InteropError, Result, ResultCode};

pub use guest::{D3D11GuestDevice, D3D11GuestSurface, D3D11RenderTarget2D, D3D11TextFormat};
pub use keyed::D3D11KeyedMutex;
pub use owner::{
    D3D11CommandList, D3D11DeferredContext, D3D11Device, D3D11Output, D3D11Pipeline,
    D3D11SwapChain,
};

/// Maps a `windows` error into the crate error, keeping the `HRESULT`.
pub(crate) fn hr(context: &str) -> impl FnOnce(windows::core::Error) -> InteropError + '_ {
    move |e| InteropError::graphics(ResultCode(e.code().0), format!("{context}: {e}"))
}

/// `None` from an out-parameter that the call promised to fill.
pub(crate) fn missing(context: &str) -> InteropError {
    InteropError::graphics(ResultCode::E_FAIL, format!("{context} returned no object"))
}

pub(crate) fn to_dxgi(format: PixelFormat) -> DXGI_FORMAT {
    match format {
        PixelFormat::Bgra8Unorm => DXGI_FORMAT_B8G8R8A8_UNORM,
        PixelFormat::Bgra8UnormSrgb => DXGI_FORMAT_B8G8R8A8_UNORM_SRGB,
        PixelFormat::Rgba8Unorm => DXGI_FORMAT_R8G8B8A8_UNORM,
        PixelFormat::Rgba8UnormSrgb => DXGI_FORMAT_R8G8B8A8_UNORM_SRGB,
        PixelFormat::Rgb10A2Unorm => DXGI_FORMAT_R10G10B10A2_UNORM,
        PixelFormat::Rgba16Float => DXGI_FORMAT_R16G16B16A16_FLOAT,
    }
}

pub(crate) fn from_dxgi(format: DXGI_FORMAT) -> Result<PixelFormat> {
    Ok(match format {
        DXGI_FORMAT_B8G8R8A8_UNORM => PixelFormat::Bgra8Unorm,
        DXGI_FORMAT_B8G8R8A8_UNORM_SRGB => PixelFormat::Bgra8UnormSrgb,
        DXGI_FORMAT_R8G8B8A8_UNORM => PixelFormat::Rgba8Unorm,
        DXGI_FORMAT_R8G8B8A8_UNORM_SRGB => PixelFormat::Rgba8UnormSrgb,
        DXGI_FORMAT_R10G10B10A2_UNORM => PixelFormat::Rgb10A2Unorm,
        DXGI_FORMAT_R16G16B16A16_FLOAT => PixelFormat::Rgba16Float,
        other => {
            return Err(InteropError::argument(format!("unsupported DXGI format {}", other.0)));
        }
    })
}

/// A DXGI adapter, or the default hardware adapter when `None`.
#[derive(Clone, Default)]
pub struct D3D11Adapter {
    adapter: Option<IDXGIAdapter>,
}

impl D3D11Adapter {
    pub fn new(adapter: IDXGIAdapter) -> Self {
        Self { adapter: Some(adapter) }
    }

    /// Identity from the adapter's LUID; the default adapter is `0`.
    pub fn id(&self) -> AdapterId {
        match &self.adapter {
            Some(adapter) => match unsafe { adapter.GetDesc() } {
                Ok(desc) => {
                    let luid = desc.AdapterLuid;
                    AdapterId(((luid.HighPart as u32 as u64) << 32) | luid.LowPart as u64)
                }
                Err(e) => {
                    log::warn!("D3D11Adapter: GetDesc failed: {e}");
                    AdapterId(0)
                }
            },
            None => AdapterId(0),
        }
    }
}

/// Creates a device with BGRA support (required by Direct2D) on `adapter`.
pub(crate) fn create_device(adapter: &D3D11Adapter) -> Result<(ID3D11Device, ID3D11DeviceContext)> {
    let driver_type: D3D_DRIVER_TYPE = if adapter.adapter.is_some() {
        D3D_DRIVER_TYPE_UNKNOWN
    } else {
        D3D_DRIVER_TYPE_HARDWARE
    };

    let mut device: Option<ID3D11Device> = None;
    let mut context: Option<ID3D11DeviceContext> = None;
    unsafe {
        D3D11CreateDevice(
            adapter.adapter.as_ref(),
            driver_type,
            None,
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            None,
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )
        .map_err(hr("D3D11CreateDevice"))?;
    }

    let device = device.ok_or_else(|| missing("D3D11CreateDevice"))?;
    let context = context.ok_or_else(|| missing("D3D11CreateDevice"))?;
    Ok((device, context))
}

/// Adapter identity of an existing device.
pub(crate) fn device_adapter_id(device: &ID3D11Device) -> AdapterId {
    let adapter = device
        .cast::<IDXGIDevice>()
        .and_then(|dxgi| unsafe { dxgi.GetAdapter() });
    match adapter {
        Ok(adapter) => D3D11Adapter::new(adapter).id(),
        Err(_) => AdapterId(0),
    }
}

/// Direct3D 11 entry point.
#[derive(Debug, Clone, Copy, Default)]
pub struct D3D11Platform;

impl Platform for D3D11Platform {
    type Adapter = D3D11Adapter;
    type Owner = D3D11Device;
    type Guest = D3D11GuestDevice;

    fn adapter_id(&self, adapter: &D3D11Adapter) -> AdapterId {
        adapter.id()
    }

    fn create_owner_device(&self, adapter: &D3D11Adapter) -> Result<D3D11Device> {
        let (device, context) = create_device(adapter)?;
        log::info!("D3D11Platform: owner device created on {}", adapter.id());
        Ok(D3D11Device::new(device, context))
    }

    fn create_guest_device(&self, adapter: &D3D11Adapter) -> Result<D3D11GuestDevice> {
        let (device, _) = create_device(adapter)?;
        log::info!("D3D11Platform: guest device created on {}", adapter.id());
        D3D11GuestDevice::new(device)
    }
}
