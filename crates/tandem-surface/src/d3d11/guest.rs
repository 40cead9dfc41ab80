use std::fmt;

use windows::Win32::Foundation::HANDLE;
use windows::Win32::Globalization::GetUserDefaultLocaleName;
use windows::Win32::Graphics::Direct2D::Common::{
    D2D1_ALPHA_MODE_PREMULTIPLIED, D2D1_COLOR_F, D2D1_PIXEL_FORMAT, D2D_RECT_F,
};
use windows::Win32::Graphics::Direct2D::{
    D2D1CreateFactory, ID2D1Factory, ID2D1RenderTarget, ID2D1SolidColorBrush,
    D2D1_DRAW_TEXT_OPTIONS_NONE, D2D1_FACTORY_TYPE_SINGLE_THREADED, D2D1_FEATURE_LEVEL_DEFAULT,
    D2D1_RENDER_TARGET_PROPERTIES, D2D1_RENDER_TARGET_TYPE_DEFAULT,
    D2D1_RENDER_TARGET_USAGE_NONE,
};
use windows::Win32::Graphics::Direct3D11::{ID3D11Device, ID3D11Texture2D, D3D11_TEXTURE2D_DESC};
use windows::Win32::Graphics::DirectWrite::{
    DWriteCreateFactory, IDWriteFactory, IDWriteTextFormat, DWRITE_FACTORY_TYPE_SHARED,
    DWRITE_FONT_STRETCH, DWRITE_FONT_STYLE_ITALIC, DWRITE_FONT_STYLE_NORMAL,
    DWRITE_FONT_STYLE_OBLIQUE, DWRITE_FONT_WEIGHT, DWRITE_MEASURING_MODE_NATURAL,
};
use windows::Win32::Graphics::Dxgi::Common::DXGI_FORMAT_UNKNOWN;
use windows::Win32::Graphics::Dxgi::{IDXGIKeyedMutex, IDXGISurface};
use windows::core::{Interface, HSTRING};

use crate::coords::Rect;
use crate::device::{
    AdapterId, BindFlags, FontStyle, GuestDevice, SharedHandle, TextDevice, TextFormatDesc,
};
use crate::error::{InteropError, Result, ResultCode};
use crate::paint::Color;

use super::keyed::D3D11KeyedMutex;
use super::{device_adapter_id, hr, missing};

/// `LOCALE_NAME_MAX_LENGTH`.
const LOCALE_NAME_MAX: usize = 85;

/// Guest device: a second D3D11 device plus Direct2D and DirectWrite factories.
#[derive(Clone)]
pub struct D3D11GuestDevice {
    device: ID3D11Device,
    d2d: ID2D1Factory,
    dwrite: IDWriteFactory,
}

impl D3D11GuestDevice {
    pub(crate) fn new(device: ID3D11Device) -> Result<Self> {
        let d2d: ID2D1Factory = unsafe { D2D1CreateFactory(D2D1_FACTORY_TYPE_SINGLE_THREADED, None) }
            .map_err(hr("D2D1CreateFactory"))?;
        let dwrite: IDWriteFactory =
            unsafe { DWriteCreateFactory(DWRITE_FACTORY_TYPE_SHARED) }.map_err(hr("DWriteCreateFactory"))?;
        Ok(Self { device, d2d, dwrite })
    }

    pub fn raw(&self) -> &ID3D11Device {
        &self.device
    }

    /// The Direct2D factory render targets are created from.
    pub fn d2d_factory(&self) -> &ID2D1Factory {
        &self.d2d
    }

    /// The DirectWrite factory text formats are created from.
    pub fn dwrite_factory(&self) -> &IDWriteFactory {
        &self.dwrite
    }
}

impl fmt::Debug for D3D11GuestDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D3D11GuestDevice({:p})", Interface::as_raw(&self.device))
    }
}

/// The guest device's view of the shared texture.
#[derive(Clone)]
pub struct D3D11GuestSurface {
    texture: ID3D11Texture2D,
}

impl D3D11GuestSurface {
    pub fn raw(&self) -> &ID3D11Texture2D {
        &self.texture
    }
}

/// Direct2D render target over the shared DXGI surface.
pub struct D3D11RenderTarget2D {
    target: ID2D1RenderTarget,
    drawing: bool,
}

impl D3D11RenderTarget2D {
    pub fn raw(&self) -> &ID2D1RenderTarget {
        &self.target
    }

    #[inline]
    pub fn is_drawing(&self) -> bool {
        self.drawing
    }
}

#[derive(Clone)]
pub struct D3D11TextFormat {
    format: IDWriteTextFormat,
    desc: TextFormatDesc,
}

impl D3D11TextFormat {
    pub fn raw(&self) -> &IDWriteTextFormat {
        &self.format
    }

    pub fn desc(&self) -> &TextFormatDesc {
        &self.desc
    }
}

/// Direct2D takes straight-alpha colors.
fn d2d_color(color: Color) -> D2D1_COLOR_F {
    let (r, g, b, a) = color.to_straight();
    D2D1_COLOR_F { r, g, b, a }
}

fn d2d_rect(rect: Rect) -> D2D_RECT_F {
    let max = rect.max();
    D2D_RECT_F {
        left: rect.origin.x,
        top: rect.origin.y,
        right: max.x,
        bottom: max.y,
    }
}

impl GuestDevice for D3D11GuestDevice {
    type Surface = D3D11GuestSurface;
    type Lock = D3D11KeyedMutex;
    type RenderTarget = D3D11RenderTarget2D;
    type Brush = ID2D1SolidColorBrush;

    fn adapter_id(&self) -> AdapterId {
        device_adapter_id(&self.device)
    }

    fn open_shared_surface(&self, handle: SharedHandle) -> Result<D3D11GuestSurface> {
        let mut texture: Option<ID3D11Texture2D> = None;
        unsafe {
            self.device
                .OpenSharedResource(HANDLE(handle.0 as usize as *mut _), &mut texture)
        }
        .map_err(hr("OpenSharedResource"))?;
        Ok(D3D11GuestSurface {
            texture: texture.ok_or_else(|| missing("OpenSharedResource"))?,
        })
    }

    fn open_keyed_mutex(&self, surface: &D3D11GuestSurface) -> Result<D3D11KeyedMutex> {
        let mutex: IDXGIKeyedMutex = surface.texture.cast().map_err(hr("IDXGIKeyedMutex"))?;
        Ok(D3D11KeyedMutex::new(mutex))
    }

    fn create_render_target(&self, surface: &D3D11GuestSurface) -> Result<D3D11RenderTarget2D> {
        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { surface.texture.GetDesc(&mut desc) };
        if !BindFlags::from_bits(desc.BindFlags).contains(BindFlags::RENDER_TARGET) {
            return Err(InteropError::argument("shared surface is not bindable as a render target"));
        }

        let dxgi: IDXGISurface = surface.texture.cast().map_err(hr("IDXGISurface"))?;
        let props = D2D1_RENDER_TARGET_PROPERTIES {
            r#type: D2D1_RENDER_TARGET_TYPE_DEFAULT,
            pixelFormat: D2D1_PIXEL_FORMAT {
                format: DXGI_FORMAT_UNKNOWN,
                alphaMode: D2D1_ALPHA_MODE_PREMULTIPLIED,
            },
            dpiX: 96.0,
            dpiY: 96.0,
            usage: D2D1_RENDER_TARGET_USAGE_NONE,
            minLevel: D2D1_FEATURE_LEVEL_DEFAULT,
        };
        let target = unsafe { self.d2d.CreateDxgiSurfaceRenderTarget(&dxgi, &props) }
            .map_err(hr("CreateDxgiSurfaceRenderTarget"))?;
        Ok(D3D11RenderTarget2D {
            target,
            drawing: false,
        })
    }

    fn create_solid_brush(&self, target: &D3D11RenderTarget2D, color: Color) -> Result<ID2D1SolidColorBrush> {
        unsafe { target.target.CreateSolidColorBrush(&d2d_color(color), None) }
            .map_err(hr("CreateSolidColorBrush"))
    }

    fn begin_draw(&self, target: &mut D3D11RenderTarget2D) {
        unsafe { target.target.BeginDraw() };
        target.drawing = true;
    }

    fn clear(&self, target: &mut D3D11RenderTarget2D, color: Color) {
        unsafe { target.target.Clear(Some(&d2d_color(color))) };
    }

    fn fill_rect(&self, target: &mut D3D11RenderTarget2D, rect: Rect, brush: &ID2D1SolidColorBrush) {
        unsafe { target.target.FillRectangle(&d2d_rect(rect), brush) };
    }

    fn end_draw(&self, target: &mut D3D11RenderTarget2D) -> Result<()> {
        let was_drawing = std::mem::replace(&mut target.drawing, false);
        unsafe { target.target.EndDraw(None, None) }.map_err(hr("EndDraw"))?;
        if !was_drawing {
            return Err(InteropError::graphics(
                ResultCode::D2DERR_WRONG_STATE,
                "EndDraw without BeginDraw",
            ));
        }
        Ok(())
    }
}

impl TextDevice for D3D11GuestDevice {
    type TextFormat = D3D11TextFormat;

    fn default_locale(&self) -> Result<String> {
        let mut buf = [0u16; LOCALE_NAME_MAX];
        let len = unsafe { GetUserDefaultLocaleName(&mut buf) };
        if len <= 0 {
            return Err(InteropError::graphics(
                ResultCode::E_FAIL,
                "GetUserDefaultLocaleName returned no locale",
            ));
        }
        // `len` counts the terminating NUL.
        Ok(String::from_utf16_lossy(&buf[..len as usize - 1]))
    }

    fn create_text_format(&self, desc: &TextFormatDesc) -> Result<D3D11TextFormat> {
        let style = match desc.style {
            FontStyle::Normal => DWRITE_FONT_STYLE_NORMAL,
            FontStyle::Oblique => DWRITE_FONT_STYLE_OBLIQUE,
            FontStyle::Italic => DWRITE_FONT_STYLE_ITALIC,
        };
        let format = unsafe {
            self.dwrite.CreateTextFormat(
                &HSTRING::from(desc.family.as_str()),
                None,
                DWRITE_FONT_WEIGHT(desc.weight.0 as i32),
                style,
                DWRITE_FONT_STRETCH(desc.stretch as i32),
                desc.size,
                &HSTRING::from(desc.locale.as_str()),
            )
        }
        .map_err(hr("CreateTextFormat"))?;
        Ok(D3D11TextFormat {
            format,
            desc: desc.clone(),
        })
    }

    fn draw_text(
        &self,
        target: &mut D3D11RenderTarget2D,
        text: &str,
        format: &D3D11TextFormat,
        layout: Rect,
        brush: &ID2D1SolidColorBrush,
    ) {
        let wide: Vec<u16> = text.encode_utf16().collect();
        unsafe {
            target.target.DrawText(
                &wide,
                &format.format,
                &d2d_rect(layout),
                brush,
                D2D1_DRAW_TEXT_OPTIONS_NONE,
                DWRITE_MEASURING_MODE_NATURAL,
            )
        };
    }
}
