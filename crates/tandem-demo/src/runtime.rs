use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tandem_surface::device::{DeviceRegistry, PixelFormat};
use tandem_surface::host::{GuestPass, HostControl, HostWindow, InteropRenderer, WindowEvent as HostEvent};
use tandem_surface::interop::{SurfaceConfig, TextSurface};
use tandem_surface::paint::Color;
use tandem_surface::soft::{SoftAdapter, SoftPlatform};

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::present::{PresentConfig, Presenter};
use crate::window::WinitWindow;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub clear_color: Color,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "tandem".to_string(),
            initial_size: LogicalSize::new(960.0, 540.0),
            clear_color: Color::from_straight_u8(0x18, 0x1a, 0x20, 0xff),
        }
    }
}

/// What the host window renders: the soft platform and the guest's per-frame pass.
pub struct HostSetup {
    pub platform: SoftPlatform,
    pub surface: SurfaceConfig,
    pub guest_pass: GuestPass<SoftPlatform>,
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    pub fn run(config: RuntimeConfig, present: PresentConfig, setup: HostSetup) -> Result<()> {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, present, setup);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct AppState {
    config: RuntimeConfig,
    present: PresentConfig,
    setup: Option<HostSetup>,

    window: Option<(WindowId, Arc<Window>)>,
    host: Option<HostWindow>,

    present_failed: Arc<AtomicBool>,
    error: Option<anyhow::Error>,
    exit_requested: bool,
}

impl AppState {
    fn new(config: RuntimeConfig, present: PresentConfig, setup: HostSetup) -> Self {
        Self {
            config,
            present,
            setup: Some(setup),
            window: None,
            host: None,
            present_failed: Arc::new(AtomicBool::new(false)),
            error: None,
            exit_requested: false,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        if self.error.is_none() {
            self.error = Some(error);
        }
        self.exit_requested = true;
        event_loop.exit();
    }

    fn create_host(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let setup = self.setup.take().context("host window already created")?;

        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size)
            .with_visible(false);
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );
        let size = window.inner_size();

        let presenter = pollster::block_on(Presenter::new(Arc::clone(&window), self.present.clone()))
            .context("failed to initialise the presenter")?;
        log::debug!("runtime: presenting as {:?}", presenter.surface_format());

        let registry = DeviceRegistry::new(setup.platform);
        let adapter = SoftAdapter::new("soft");
        let surface = TextSurface::new(&registry, &adapter, setup.surface)?;
        let mut swap_chain = surface.owner_device().create_swap_chain(
            size.width.max(1),
            size.height.max(1),
            PixelFormat::Bgra8Unorm,
        )?;
        swap_chain.set_present_sink(presenter.into_sink(Arc::clone(&self.present_failed)));

        let mut renderer = InteropRenderer::new(surface, swap_chain).with_guest_pass(setup.guest_pass);
        renderer.set_clear_color(self.config.clear_color);

        let mut host = HostWindow::new(Box::new(WinitWindow::new(Arc::clone(&window))), Box::new(renderer));
        host.open(&self.config.title, size.width, size.height)?;

        self.window = Some((window.id(), window));
        self.host = Some(host);
        Ok(())
    }

    fn dispatch(&mut self, event_loop: &ActiveEventLoop, event: HostEvent) {
        let Some(host) = self.host.as_mut() else {
            return;
        };
        match host.handle_event(event) {
            Ok(HostControl::Continue) => {}
            Ok(HostControl::Exit) => {
                self.exit_requested = true;
                event_loop.exit();
            }
            Err(e) => self.fail(event_loop, anyhow::Error::new(e).context(format!("{event:?}"))),
        }
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.host.is_some() {
            return;
        }
        if let Err(e) = self.create_host(event_loop) {
            self.fail(event_loop, e.context("failed to create host window"));
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.present_failed.load(Ordering::Relaxed) {
            self.fail(event_loop, anyhow::anyhow!("presenting failed"));
        }
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw: the scene is animated.
        if let Some(host) = &self.host {
            host.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }
        let Some((id, window)) = &self.window else {
            return;
        };
        if *id != window_id {
            return;
        }

        let event = match event {
            WindowEvent::Resized(size) => HostEvent::Resized {
                width: size.width,
                height: size.height,
            },
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = window.inner_size();
                HostEvent::Resized {
                    width: size.width,
                    height: size.height,
                }
            }
            WindowEvent::Moved(position) => HostEvent::Moved {
                x: position.x,
                y: position.y,
            },
            WindowEvent::RedrawRequested => HostEvent::RedrawRequested,
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => HostEvent::CloseRequested,
            _ => return,
        };

        self.dispatch(event_loop, event);
    }
}
