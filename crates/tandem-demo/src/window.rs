use std::sync::Arc;

use tandem_surface::host::WindowBackend;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::window::Window;

/// [`WindowBackend`] over a winit window.
///
/// winit only creates windows inside the event loop, so the window exists
/// (hidden) before `create`; `create` titles, sizes and shows it.
pub struct WinitWindow {
    window: Arc<Window>,
    open: bool,
}

impl WinitWindow {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window, open: false }
    }
}

impl WindowBackend for WinitWindow {
    fn create(&mut self, title: &str, width: u32, height: u32) -> tandem_surface::Result<()> {
        self.window.set_title(title);
        if width > 0 && height > 0 {
            let _ = self.window.request_inner_size(PhysicalSize::new(width, height));
        }
        self.window.set_visible(true);
        self.open = true;
        Ok(())
    }

    fn destroy(&mut self) {
        self.window.set_visible(false);
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn move_to(&mut self, x: i32, y: i32) {
        self.window.set_outer_position(PhysicalPosition::new(x, y));
    }

    fn resize(&mut self, width: u32, height: u32) {
        let _ = self.window.request_inner_size(PhysicalSize::new(width, height));
    }

    fn inner_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn request_redraw(&self) {
        self.window.request_redraw();
    }
}
