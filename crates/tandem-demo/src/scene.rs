use tandem_surface::coords::Rect;
use tandem_surface::device::{FontStretch, FontStyle, FontWeight, GuestDevice};
use tandem_surface::host::GuestPass;
use tandem_surface::interop::TextSurface;
use tandem_surface::paint::Color;
use tandem_surface::soft::{SoftPlatform, SoftTextFormat};
use tandem_surface::Result;

/// Family the demo registers its font under.
pub const FONT_FAMILY: &str = "body";

const BAR_COUNT: usize = 12;
const MARGIN: f32 = 16.0;

/// The guest side of the demo: animated bars under a caption.
pub struct DemoScene {
    caption: String,
    palette: Vec<Color>,
    // Text formats are recreated whenever the surface is.
    format: Option<(u64, SoftTextFormat)>,
}

impl DemoScene {
    pub fn new(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
            palette: vec![
                Color::from_straight_u8(0x4e, 0x9a, 0xf1, 0xff),
                Color::from_straight_u8(0x5c, 0xc9, 0x8c, 0xff),
                Color::from_straight_u8(0xf2, 0xb1, 0x34, 0xff),
                Color::from_straight_u8(0xe8, 0x5d, 0x75, 0xc0),
            ],
            format: None,
        }
    }

    pub fn into_pass(mut self) -> GuestPass<SoftPlatform> {
        Box::new(move |surface, frame| self.draw(surface, frame))
    }

    fn text_format(&mut self, surface: &mut TextSurface<SoftPlatform>) -> Result<SoftTextFormat> {
        let generation = surface.generation();
        match &self.format {
            Some((built, format)) if *built == generation => Ok(format.clone()),
            _ => {
                let format = surface.create_text_format(
                    FONT_FAMILY,
                    22.0,
                    FontWeight::SEMI_BOLD,
                    FontStyle::Normal,
                    FontStretch::Normal,
                    None,
                )?;
                self.format = Some((generation, format.clone()));
                Ok(format)
            }
        }
    }

    fn draw(&mut self, surface: &mut TextSurface<SoftPlatform>, frame: u64) -> Result<()> {
        let Some(desc) = surface.surface_desc() else {
            return Ok(());
        };
        let (width, height) = (desc.width as f32, desc.height as f32);

        let brushes = self
            .palette
            .iter()
            .map(|&color| surface.create_solid_brush(color))
            .collect::<Result<Vec<_>>>()?;
        let text_brush = surface.create_solid_brush(Color::WHITE)?;
        let format = self.text_format(surface)?;

        let t = frame as f32 / 60.0;
        let slot = (width - 2.0 * MARGIN) / BAR_COUNT as f32;
        let floor = height - MARGIN;
        let max_height = (height - 4.0 * MARGIN - 22.0).max(0.0);

        surface.draw_guest(true, |guest, target| {
            guest.clear(target, Color::TRANSPARENT);
            for i in 0..BAR_COUNT {
                let phase = t * 2.0 + i as f32 * 0.45;
                let bar = max_height * (0.55 + 0.45 * phase.sin());
                let rect = Rect::new(MARGIN + i as f32 * slot + 2.0, floor - bar, slot - 4.0, bar);
                guest.fill_rect(target, rect, &brushes[i % brushes.len()]);
            }
        })?;

        let caption = format!("{}  ·  frame {frame}", self.caption);
        let layout = Rect::new(MARGIN, MARGIN, width - 2.0 * MARGIN, 32.0);
        surface.draw_text(&caption, &format, &text_brush, Some(layout), true)
    }
}
