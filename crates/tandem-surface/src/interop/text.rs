use std::ops::{Deref, DerefMut};

use crate::coords::Rect;
use crate::device::{
    DeviceRegistry, FontStretch, FontStyle, FontWeight, Platform, TextDevice, TextFormatDesc,
};
use crate::error::{InteropError, Result};
use crate::paint::Color;

use super::{Brush, Guest, InteropSurface, Owner, SurfaceConfig, SurfaceState, TextFormat};

/// [`InteropSurface`] whose guest device can also lay out and draw text.
///
/// Derefs to the underlying surface for lifecycle, locking and compositing.
pub struct TextSurface<P: Platform>
where
    Guest<P>: TextDevice,
{
    surface: InteropSurface<P>,
    locale: Option<String>,
}

impl<P: Platform> TextSurface<P>
where
    Guest<P>: TextDevice,
{
    pub fn new(registry: &DeviceRegistry<P>, adapter: &P::Adapter, config: SurfaceConfig) -> Result<Self> {
        Ok(Self::from_surface(InteropSurface::new(registry, adapter, config)?))
    }

    pub fn with_devices(owner: Owner<P>, guest: Guest<P>, config: SurfaceConfig) -> Result<Self> {
        Ok(Self::from_surface(InteropSurface::with_devices(owner, guest, config)?))
    }

    pub fn from_surface(surface: InteropSurface<P>) -> Self {
        Self {
            surface,
            locale: None,
        }
    }

    pub fn into_surface(self) -> InteropSurface<P> {
        self.surface
    }

    /// Locale used when a text format is created without one.
    ///
    /// Asked of the guest device once, then remembered.
    pub fn default_locale(&mut self) -> Result<&str> {
        let locale = match self.locale.take() {
            Some(locale) => locale,
            None => {
                let locale = self.surface.guest_device().default_locale()?;
                log::debug!("TextSurface: default locale is {locale}");
                locale
            }
        };
        Ok(self.locale.insert(locale))
    }

    pub fn create_text_format(
        &mut self,
        family: &str,
        size: f32,
        weight: FontWeight,
        style: FontStyle,
        stretch: FontStretch,
        locale: Option<&str>,
    ) -> Result<TextFormat<P>> {
        if self.surface.state() == SurfaceState::Uninitialised {
            return Err(InteropError::invalid_operation("text format requested before initialise"));
        }
        let locale = match locale {
            Some(locale) => locale.to_owned(),
            None => self.default_locale()?.to_owned(),
        };
        let desc = TextFormatDesc {
            family: family.to_owned(),
            size,
            weight,
            style,
            stretch,
            locale,
        };
        let format = self.surface.guest_device().create_text_format(&desc)?;
        log::debug!("TextSurface: created text format {desc}");
        Ok(format)
    }

    pub fn create_solid_brush(&self, color: Color) -> Result<Brush<P>> {
        self.surface.create_solid_brush(color)
    }

    /// Draws `text` into `layout_rect`, or the whole surface when `None`.
    ///
    /// With `auto_lock` the guest lock and draw bracket are managed here (see
    /// [`InteropSurface::draw_guest`]).
    pub fn draw_text(
        &mut self,
        text: &str,
        format: &TextFormat<P>,
        brush: &Brush<P>,
        layout_rect: Option<Rect>,
        auto_lock: bool,
    ) -> Result<()> {
        let layout = match layout_rect {
            Some(rect) => rect,
            None => {
                let desc = self
                    .surface
                    .surface_desc()
                    .ok_or_else(|| InteropError::invalid_operation("text drawn before initialise"))?;
                Rect::from_size(desc.width, desc.height)
            }
        };
        self.surface
            .draw_guest(auto_lock, |guest, target| guest.draw_text(target, text, format, layout, brush))
    }

    /// The guest device, doubling as the text service.
    pub fn text_device(&self) -> &Guest<P> {
        self.surface.guest_device()
    }
}

impl<P: Platform> Deref for TextSurface<P>
where
    Guest<P>: TextDevice,
{
    type Target = InteropSurface<P>;

    fn deref(&self) -> &InteropSurface<P> {
        &self.surface
    }
}

impl<P: Platform> DerefMut for TextSurface<P>
where
    Guest<P>: TextDevice,
{
    fn deref_mut(&mut self) -> &mut InteropSurface<P> {
        &mut self.surface
    }
}
