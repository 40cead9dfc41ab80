use crate::error::Result;

/// Window events a [`HostWindow`](super::HostWindow) reacts to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WindowEvent {
    /// New client size in physical pixels.
    Resized { width: u32, height: u32 },
    Moved { x: i32, y: i32 },
    RedrawRequested,
    CloseRequested,
}

/// Control directive returned by event handling.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HostControl {
    Continue,
    Exit,
}

/// Something that renders into a window's swap chain.
pub trait RenderBackend {
    fn initialise(&mut self, width: u32, height: u32) -> Result<()>;

    /// Called for every client-area size change, including to `0x0`.
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    fn draw(&mut self) -> Result<()>;

    fn present(&mut self) -> Result<()>;
}

/// The platform window itself.
pub trait WindowBackend {
    fn create(&mut self, title: &str, width: u32, height: u32) -> Result<()>;

    fn destroy(&mut self);

    fn is_open(&self) -> bool;

    fn move_to(&mut self, x: i32, y: i32);

    /// Requests a new client size. The platform reports the outcome as a
    /// [`WindowEvent::Resized`].
    fn resize(&mut self, width: u32, height: u32);

    /// Current client size in physical pixels.
    fn inner_size(&self) -> (u32, u32);

    fn request_redraw(&self);
}
