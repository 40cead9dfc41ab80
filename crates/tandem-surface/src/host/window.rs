use std::fmt;

use crate::error::Result;

use super::{HostControl, RenderBackend, WindowBackend, WindowEvent};

/// One window backend and one render backend, wired together.
pub struct HostWindow {
    window: Box<dyn WindowBackend>,
    renderer: Box<dyn RenderBackend>,
    initialised: bool,
    frames: u64,
}

impl HostWindow {
    pub fn new(window: Box<dyn WindowBackend>, renderer: Box<dyn RenderBackend>) -> Self {
        Self {
            window,
            renderer,
            initialised: false,
            frames: 0,
        }
    }

    /// Creates the platform window and initialises the renderer at its size.
    pub fn open(&mut self, title: &str, width: u32, height: u32) -> Result<()> {
        self.window.create(title, width, height)?;
        let (width, height) = self.window.inner_size();
        self.renderer.initialise(width, height)?;
        self.initialised = true;
        log::info!("HostWindow: opened \"{title}\" at {width}x{height}");
        self.window.request_redraw();
        Ok(())
    }

    pub fn handle_event(&mut self, event: WindowEvent) -> Result<HostControl> {
        match event {
            WindowEvent::Resized { width, height } => {
                if self.initialised {
                    self.renderer.resize(width, height)?;
                    self.window.request_redraw();
                }
            }
            WindowEvent::Moved { x, y } => {
                log::trace!("HostWindow: moved to ({x}, {y})");
            }
            WindowEvent::RedrawRequested => {
                if self.initialised {
                    self.renderer.draw()?;
                    self.renderer.present()?;
                    self.frames += 1;
                }
            }
            WindowEvent::CloseRequested => {
                self.close();
                return Ok(HostControl::Exit);
            }
        }
        Ok(HostControl::Continue)
    }

    pub fn close(&mut self) {
        if self.window.is_open() {
            self.window.destroy();
            log::info!("HostWindow: closed after {} frame(s)", self.frames);
        }
        self.initialised = false;
    }

    pub fn move_to(&mut self, x: i32, y: i32) {
        self.window.move_to(x, y);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.window.resize(width, height);
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    #[inline]
    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Frames drawn and presented so far.
    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn window(&self) -> &dyn WindowBackend {
        self.window.as_ref()
    }

    pub fn renderer(&self) -> &dyn RenderBackend {
        self.renderer.as_ref()
    }
}

impl fmt::Debug for HostWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostWindow")
            .field("initialised", &self.initialised)
            .field("frames", &self.frames)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::error::{InteropError, ResultCode};

    type Calls = Rc<RefCell<Vec<String>>>;

    struct FakeWindow {
        calls: Calls,
        open: bool,
        size: (u32, u32),
    }

    impl WindowBackend for FakeWindow {
        fn create(&mut self, title: &str, width: u32, height: u32) -> Result<()> {
            self.calls.borrow_mut().push(format!("create {title} {width}x{height}"));
            self.open = true;
            self.size = (width, height);
            Ok(())
        }

        fn destroy(&mut self) {
            self.calls.borrow_mut().push("destroy".into());
            self.open = false;
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn move_to(&mut self, x: i32, y: i32) {
            self.calls.borrow_mut().push(format!("move {x},{y}"));
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.size = (width, height);
        }

        fn inner_size(&self) -> (u32, u32) {
            self.size
        }

        fn request_redraw(&self) {
            self.calls.borrow_mut().push("redraw".into());
        }
    }

    struct FakeRenderer {
        calls: Calls,
        fail_draw: bool,
    }

    impl RenderBackend for FakeRenderer {
        fn initialise(&mut self, width: u32, height: u32) -> Result<()> {
            self.calls.borrow_mut().push(format!("init {width}x{height}"));
            Ok(())
        }

        fn resize(&mut self, width: u32, height: u32) -> Result<()> {
            self.calls.borrow_mut().push(format!("resize {width}x{height}"));
            Ok(())
        }

        fn draw(&mut self) -> Result<()> {
            if self.fail_draw {
                return Err(InteropError::graphics(ResultCode::E_FAIL, "draw"));
            }
            self.calls.borrow_mut().push("draw".into());
            Ok(())
        }

        fn present(&mut self) -> Result<()> {
            self.calls.borrow_mut().push("present".into());
            Ok(())
        }
    }

    fn host(fail_draw: bool) -> (HostWindow, Calls) {
        let calls = Calls::default();
        let window = FakeWindow {
            calls: Rc::clone(&calls),
            open: false,
            size: (0, 0),
        };
        let renderer = FakeRenderer {
            calls: Rc::clone(&calls),
            fail_draw,
        };
        (HostWindow::new(Box::new(window), Box::new(renderer)), calls)
    }

    #[test]
    fn routes_events_in_order() {
        let (mut host, calls) = host(false);

        // Events before open are ignored.
        host.handle_event(WindowEvent::RedrawRequested).unwrap();
        assert!(calls.borrow().is_empty());

        host.open("demo", 320, 200).unwrap();
        host.handle_event(WindowEvent::Resized { width: 640, height: 400 }).unwrap();
        host.handle_event(WindowEvent::RedrawRequested).unwrap();
        host.move_to(5, 6);
        let control = host.handle_event(WindowEvent::CloseRequested).unwrap();

        assert_eq!(control, HostControl::Exit);
        assert_eq!(host.frames(), 1);
        assert_eq!(
            *calls.borrow(),
            [
                "create demo 320x200",
                "init 320x200",
                "redraw",
                "resize 640x400",
                "redraw",
                "draw",
                "present",
                "move 5,6",
                "destroy",
            ]
        );
    }

    #[test]
    fn draw_failure_skips_present() {
        let (mut host, calls) = host(true);
        host.open("demo", 8, 8).unwrap();

        assert!(host.handle_event(WindowEvent::RedrawRequested).is_err());
        assert_eq!(host.frames(), 0);
        assert!(!calls.borrow().iter().any(|c| c == "present"));
    }
}
