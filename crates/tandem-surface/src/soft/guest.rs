use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::coords::Rect;
use crate::device::{
    AdapterId, BindFlags, GuestDevice, PixelFormat, SharedHandle, TextDevice, TextFormatDesc,
    TextureDesc,
};
use crate::error::{InteropError, Result, ResultCode};
use crate::paint::Color;

use super::adapter::{DeviceId, DeviceRole, SoftAdapter, SoftEvent, SoftFault};
use super::keyed::SoftKeyedMutex;
use super::memory::TextureMemory;
use super::raster;
use super::text::{self, Face, FontCollection};

/// Guest-side view of a shared texture.
#[derive(Clone)]
pub struct SoftGuestSurface {
    memory: Arc<TextureMemory>,
}

impl SoftGuestSurface {
    #[inline]
    pub fn id(&self) -> u64 {
        self.memory.id()
    }

    #[inline]
    pub fn desc(&self) -> TextureDesc {
        *self.memory.desc()
    }
}

impl fmt::Debug for SoftGuestSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SoftGuestSurface#{}", self.id())
    }
}

/// 2D render target over a shared surface.
///
/// Draw calls outside `begin_draw`/`end_draw`, or against a surface this
/// device does not hold, are skipped and reported by the next `end_draw`.
pub struct SoftRenderTarget2D {
    id: u64,
    memory: Arc<TextureMemory>,
    drawing: bool,
    pending: Option<InteropError>,
}

impl SoftRenderTarget2D {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn size(&self) -> (u32, u32) {
        let desc = self.memory.desc();
        (desc.width, desc.height)
    }

    fn defer(&mut self, code: ResultCode, context: &str) {
        if self.pending.is_none() {
            self.pending = Some(InteropError::graphics(code, context));
        }
    }
}

impl fmt::Debug for SoftRenderTarget2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftRenderTarget2D")
            .field("id", &self.id)
            .field("surface", &self.memory.id())
            .field("drawing", &self.drawing)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SoftBrush {
    id: u64,
    color: Color,
}

impl SoftBrush {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn color(&self) -> Color {
        self.color
    }
}

#[derive(Debug, Clone)]
pub struct SoftTextFormat {
    id: u64,
    desc: TextFormatDesc,
    face: Face,
}

impl SoftTextFormat {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn desc(&self) -> &TextFormatDesc {
        &self.desc
    }

    /// True if the family resolved to a registered font.
    pub fn has_font(&self) -> bool {
        matches!(self.face, Face::Font(_))
    }
}

/// Soft 2D/text device.
#[derive(Clone)]
pub struct SoftGuestDevice {
    inner: Arc<GuestInner>,
}

struct GuestInner {
    id: DeviceId,
    adapter: SoftAdapter,
    fonts: Arc<RwLock<FontCollection>>,
    locale: Option<String>,
}

impl SoftGuestDevice {
    pub(crate) fn new(
        adapter: SoftAdapter,
        fonts: Arc<RwLock<FontCollection>>,
        locale: Option<String>,
    ) -> Result<Self> {
        adapter.check_fault(SoftFault::CreateDevice, "D3D11CreateDevice (BGRA)")?;
        let id = DeviceId(adapter.next_object_id());
        adapter.record(SoftEvent::CreateDevice {
            device: id,
            role: DeviceRole::Guest,
        });
        Ok(Self {
            inner: Arc::new(GuestInner {
                id,
                adapter,
                fonts,
                locale,
            }),
        })
    }

    #[inline]
    pub fn id(&self) -> DeviceId {
        self.inner.id
    }

    pub fn adapter(&self) -> &SoftAdapter {
        &self.inner.adapter
    }

    fn record(&self, event: SoftEvent) {
        self.inner.adapter.record(event);
    }

    /// Runs `paint` on the target's texels if drawing is currently allowed.
    fn paint(&self, target: &mut SoftRenderTarget2D, paint: impl FnOnce(&mut [[u8; 4]], u32, u32)) {
        if !target.drawing {
            target.defer(ResultCode::D2DERR_WRONG_STATE, "draw call outside BeginDraw/EndDraw");
            return;
        }
        if !target.memory.is_accessible_by(self.id()) {
            target.defer(
                ResultCode::DXGI_ERROR_INVALID_CALL,
                "surface drawn without holding its keyed mutex",
            );
            return;
        }
        let desc = *target.memory.desc();
        let mut texels = target.memory.write();
        paint(texels.as_mut_slice(), desc.width, desc.height);
    }
}

impl fmt::Debug for SoftGuestDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftGuestDevice").field("id", &self.inner.id).finish()
    }
}

impl GuestDevice for SoftGuestDevice {
    type Surface = SoftGuestSurface;
    type Lock = SoftKeyedMutex;
    type RenderTarget = SoftRenderTarget2D;
    type Brush = SoftBrush;

    fn adapter_id(&self) -> AdapterId {
        self.inner.adapter.id()
    }

    fn open_shared_surface(&self, handle: SharedHandle) -> Result<SoftGuestSurface> {
        let adapter = &self.inner.adapter;
        adapter.check_fault(SoftFault::OpenSharedResource, "OpenSharedResource")?;
        let memory = adapter.resolve(handle)?;
        self.record(SoftEvent::OpenSharedResource {
            device: self.id(),
            texture: memory.id(),
        });
        Ok(SoftGuestSurface { memory })
    }

    fn open_keyed_mutex(&self, surface: &SoftGuestSurface) -> Result<SoftKeyedMutex> {
        if !surface.memory.has_keyed_mutex() {
            return Err(InteropError::graphics(
                ResultCode::E_NOINTERFACE,
                "QueryInterface(IDXGIKeyedMutex) on a surface without a keyed mutex",
            ));
        }
        Ok(SoftKeyedMutex::new(
            self.inner.adapter.clone(),
            self.id(),
            Arc::clone(&surface.memory),
        ))
    }

    fn create_render_target(&self, surface: &SoftGuestSurface) -> Result<SoftRenderTarget2D> {
        let adapter = &self.inner.adapter;
        adapter.check_fault(SoftFault::CreateRenderTarget, "CreateDxgiSurfaceRenderTarget")?;

        let desc = surface.desc();
        if !desc.bind.contains(BindFlags::RENDER_TARGET) {
            return Err(InteropError::graphics(
                ResultCode::E_INVALIDARG,
                "CreateDxgiSurfaceRenderTarget: surface is not a render target",
            ));
        }
        if !matches!(
            desc.format,
            PixelFormat::Bgra8Unorm | PixelFormat::Bgra8UnormSrgb | PixelFormat::Rgba8Unorm
        ) {
            return Err(InteropError::graphics(
                ResultCode::E_INVALIDARG,
                format!("CreateDxgiSurfaceRenderTarget: unsupported format {:?}", desc.format),
            ));
        }

        Ok(SoftRenderTarget2D {
            id: adapter.next_object_id(),
            memory: Arc::clone(&surface.memory),
            drawing: false,
            pending: None,
        })
    }

    fn create_solid_brush(&self, _target: &SoftRenderTarget2D, color: Color) -> Result<SoftBrush> {
        if !color.is_finite() {
            return Err(InteropError::graphics(
                ResultCode::E_INVALIDARG,
                "CreateSolidColorBrush: non-finite color",
            ));
        }
        Ok(SoftBrush {
            id: self.inner.adapter.next_object_id(),
            color: color.clamped(),
        })
    }

    fn begin_draw(&self, target: &mut SoftRenderTarget2D) {
        if target.drawing {
            target.defer(ResultCode::D2DERR_WRONG_STATE, "BeginDraw called twice");
        }
        target.drawing = true;
        self.record(SoftEvent::BeginDraw { device: self.id() });
    }

    fn clear(&self, target: &mut SoftRenderTarget2D, color: Color) {
        self.paint(target, |texels, _, _| raster::clear(texels, color));
        self.record(SoftEvent::Clear { device: self.id() });
    }

    fn fill_rect(&self, target: &mut SoftRenderTarget2D, rect: Rect, brush: &SoftBrush) {
        self.paint(target, |texels, w, h| raster::fill_rect(texels, w, h, rect, brush.color));
        self.record(SoftEvent::FillRect { device: self.id() });
    }

    fn end_draw(&self, target: &mut SoftRenderTarget2D) -> Result<()> {
        let was_drawing = std::mem::replace(&mut target.drawing, false);
        let pending = target.pending.take();

        let outcome = self
            .inner
            .adapter
            .check_fault(SoftFault::EndDraw, "EndDraw")
            .and_then(|()| match pending {
                Some(err) => Err(err),
                None if !was_drawing => Err(InteropError::graphics(
                    ResultCode::D2DERR_WRONG_STATE,
                    "EndDraw without BeginDraw",
                )),
                None => Ok(()),
            });

        self.record(SoftEvent::EndDraw {
            device: self.id(),
            ok: outcome.is_ok(),
        });
        outcome
    }
}

impl TextDevice for SoftGuestDevice {
    type TextFormat = SoftTextFormat;

    fn default_locale(&self) -> Result<String> {
        Ok(self.inner.locale.clone().unwrap_or_else(text::locale_from_env))
    }

    fn create_text_format(&self, desc: &TextFormatDesc) -> Result<SoftTextFormat> {
        let adapter = &self.inner.adapter;
        adapter.check_fault(SoftFault::CreateTextFormat, "CreateTextFormat")?;

        let invalid = |why: &str| {
            InteropError::graphics(ResultCode::E_INVALIDARG, format!("CreateTextFormat: {why}"))
        };
        if desc.family.is_empty() {
            return Err(invalid("empty family name"));
        }
        if !(desc.size.is_finite() && desc.size > 0.0) {
            return Err(invalid("font size must be positive"));
        }
        if desc.locale.is_empty() {
            return Err(invalid("empty locale name"));
        }

        let face = self.inner.fonts.read().resolve(&desc.family);
        if face == Face::Placeholder {
            log::debug!("SoftGuestDevice: no font for '{}', using placeholder face", desc.family);
        }
        Ok(SoftTextFormat {
            id: adapter.next_object_id(),
            desc: desc.clone(),
            face,
        })
    }

    fn draw_text(
        &self,
        target: &mut SoftRenderTarget2D,
        text: &str,
        format: &SoftTextFormat,
        layout: Rect,
        brush: &SoftBrush,
    ) {
        let fonts = self.inner.fonts.read();
        self.paint(target, |texels, w, h| {
            text::draw_text(
                &fonts,
                format.face,
                format.desc.size,
                texels,
                w,
                h,
                text,
                layout,
                brush.color,
            )
        });
        self.record(SoftEvent::DrawText {
            device: self.id(),
            text: text.to_owned(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{KeyedMutex, LockTimeout, OwnerDevice};
    use crate::soft::SoftDevice;

    fn pair() -> (SoftDevice, SoftGuestDevice) {
        let adapter = SoftAdapter::default();
        let owner = SoftDevice::new(adapter.clone()).unwrap();
        let guest =
            SoftGuestDevice::new(adapter, Arc::new(RwLock::new(FontCollection::new())), Some("en-GB".into()))
                .unwrap();
        (owner, guest)
    }

    fn shared_target(owner: &SoftDevice, guest: &SoftGuestDevice) -> (SoftKeyedMutex, SoftRenderTarget2D) {
        let desc = TextureDesc::new(8, 8, PixelFormat::Bgra8Unorm).shared_surface(PixelFormat::Bgra8Unorm);
        let tex = owner.create_texture(&desc).unwrap();
        let surface = guest.open_shared_surface(owner.shared_handle(&tex).unwrap()).unwrap();
        (
            guest.open_keyed_mutex(&surface).unwrap(),
            guest.create_render_target(&surface).unwrap(),
        )
    }

    #[test]
    fn guest_sees_owner_memory() {
        let (owner, guest) = pair();
        let desc = TextureDesc::new(2, 2, PixelFormat::Bgra8Unorm).shared_surface(PixelFormat::Bgra8Unorm);
        let tex = owner.create_texture(&desc).unwrap();
        let surface = guest.open_shared_surface(owner.shared_handle(&tex).unwrap()).unwrap();
        assert_eq!(surface.id(), tex.id());
    }

    #[test]
    fn handle_of_dropped_texture_cannot_be_opened() {
        let (owner, guest) = pair();
        let desc = TextureDesc::new(2, 2, PixelFormat::Bgra8Unorm).shared_surface(PixelFormat::Bgra8Unorm);
        let tex = owner.create_texture(&desc).unwrap();
        let handle = owner.shared_handle(&tex).unwrap();
        drop(tex);
        assert!(guest.open_shared_surface(handle).is_err());
    }

    #[test]
    fn draws_reach_the_surface_under_lock() {
        let (owner, guest) = pair();
        let (lock, mut target) = shared_target(&owner, &guest);
        let brush = guest.create_solid_brush(&target, Color::WHITE).unwrap();

        assert!(lock.acquire(0, LockTimeout::IMMEDIATE).unwrap().is_acquired());
        guest.begin_draw(&mut target);
        guest.fill_rect(&mut target, Rect::new(0.0, 0.0, 2.0, 2.0), &brush);
        guest.end_draw(&mut target).unwrap();
        lock.release(0).unwrap();

        let texels = target.memory.read();
        assert_eq!(texels[0], [255; 4]);
        assert_eq!(texels[63], [0; 4]);
    }

    #[test]
    fn drawing_without_lock_fails_at_end_draw() {
        let (owner, guest) = pair();
        let (_lock, mut target) = shared_target(&owner, &guest);
        let brush = guest.create_solid_brush(&target, Color::WHITE).unwrap();

        guest.begin_draw(&mut target);
        guest.fill_rect(&mut target, Rect::new(0.0, 0.0, 8.0, 8.0), &brush);
        let err = guest.end_draw(&mut target).unwrap_err();
        assert_eq!(err.code(), Some(ResultCode::DXGI_ERROR_INVALID_CALL));
        assert!(target.memory.read().iter().all(|px| *px == [0; 4]));
    }

    #[test]
    fn end_draw_without_begin_is_wrong_state() {
        let (owner, guest) = pair();
        let (_lock, mut target) = shared_target(&owner, &guest);
        let err = guest.end_draw(&mut target).unwrap_err();
        assert_eq!(err.code(), Some(ResultCode::D2DERR_WRONG_STATE));
    }

    #[test]
    fn text_format_validates_arguments() {
        let (_owner, guest) = pair();
        let mut desc = TextFormatDesc {
            family: "Segoe UI".into(),
            size: 14.0,
            weight: Default::default(),
            style: Default::default(),
            stretch: Default::default(),
            locale: guest.default_locale().unwrap(),
        };
        assert_eq!(desc.locale, "en-GB");
        let format = guest.create_text_format(&desc).unwrap();
        assert!(!format.has_font());

        desc.size = 0.0;
        assert!(guest.create_text_format(&desc).is_err());
    }
}
