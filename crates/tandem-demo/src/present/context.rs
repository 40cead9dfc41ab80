use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use tandem_surface::soft::{PresentSink, SoftFrame};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use super::surface;
use super::{PresentConfig, SurfaceErrorAction};

/// Owns the wgpu device and the window surface soft frames are copied into.
pub struct Presenter {
    /// Surface bound to the window; the `Arc<Window>` keeps it alive.
    surface: wgpu::Surface<'static>,

    device: wgpu::Device,

    queue: wgpu::Queue,

    /// Active surface configuration.
    config: wgpu::SurfaceConfiguration,

    /// Current drawable size in physical pixels.
    size: PhysicalSize<u32>,
}

impl Presenter {
    /// Creates a presenter bound to `window`.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(window: Arc<Window>, init: PresentConfig) -> Result<Self> {
        let size = window.inner_size();

        let PresentConfig {
            present_mode,
            alpha_mode,
            power_preference,
            desired_maximum_frame_latency,
        } = init;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;
        log::info!("Presenter: using {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("tandem presenter device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let caps = surface.get_capabilities(&adapter);
        if !caps.usages.contains(wgpu::TextureUsages::COPY_DST) {
            bail!("window surface cannot be written by copies");
        }
        let format = surface::choose_surface_format(&caps)
            .context("no 8-bit RGBA or BGRA surface format available")?;
        let alpha_mode = surface::choose_alpha_mode(&caps, alpha_mode);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::COPY_DST,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
        })
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Reconfigures the surface for a new drawable size.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        surface::apply_resize(&self.surface, &self.device, &mut self.config, &mut self.size, new_size);
    }

    /// Copies `frame` into the next surface texture and presents it.
    ///
    /// The surface follows the frame's size.
    pub fn present(&mut self, frame: &SoftFrame<'_>) -> Result<()> {
        if (frame.width, frame.height) != (self.config.width, self.config.height) {
            self.resize(PhysicalSize::new(frame.width, frame.height));
        }

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(err) => {
                return match self.handle_surface_error(err) {
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => Ok(()),
                    SurfaceErrorAction::Fatal => bail!("surface out of memory"),
                };
            }
        };

        let target = output.texture.size();
        let width = frame.width.min(target.width);
        let height = frame.height.min(target.height);
        let bytes = surface::pack_texels(frame.texels, self.config.format);

        self.queue.write_texture(
            output.texture.as_image_copy(),
            &bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * frame.width),
                rows_per_image: Some(frame.height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::empty());
        output.present();
        Ok(())
    }

    /// Converts a `SurfaceError` into a higher-level action.
    pub fn handle_surface_error(&mut self, err: wgpu::SurfaceError) -> SurfaceErrorAction {
        surface::map_surface_error(&self.surface, &self.device, &self.config, self.size, err)
    }

    /// Turns the presenter into a swap-chain present sink.
    ///
    /// A failed present is logged and raises `failed`.
    pub fn into_sink(mut self, failed: Arc<AtomicBool>) -> PresentSink {
        Box::new(move |frame| {
            if let Err(e) = self.present(frame) {
                log::error!("Presenter: {e:#}");
                failed.store(true, Ordering::Relaxed);
            }
        })
    }
}
