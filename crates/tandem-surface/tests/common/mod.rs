#![allow(dead_code)]

use tandem_surface::device::{DeviceRegistry, OwnerDevice, PixelFormat, SwapChain};
use tandem_surface::interop::{SurfaceConfig, TextSurface};
use tandem_surface::logging::{init_logging, LoggingConfig};
use tandem_surface::soft::{SoftAdapter, SoftEvent, SoftPlatform, SoftSwapChain};
use tandem_surface::Result;

/// A text surface on a fresh soft adapter, plus the swap chain it composites onto.
pub struct Fixture {
    pub adapter: SoftAdapter,
    pub surface: TextSurface<SoftPlatform>,
    pub swap_chain: SoftSwapChain,
}

pub fn fixture(width: u32, height: u32) -> Fixture {
    fixture_with(width, height, SurfaceConfig::default())
}

pub fn fixture_with(width: u32, height: u32, config: SurfaceConfig) -> Fixture {
    init_logging(LoggingConfig::for_tests());

    let registry = DeviceRegistry::new(SoftPlatform::new().with_locale("en-US"));
    let adapter = SoftAdapter::new("test adapter");
    let surface = TextSurface::new(&registry, &adapter, config).unwrap();
    let swap_chain = surface
        .owner_device()
        .create_swap_chain(width, height, PixelFormat::Bgra8Unorm)
        .unwrap();
    surface.owner_device().bind_back_buffer(&swap_chain).unwrap();

    Fixture {
        adapter,
        surface,
        swap_chain,
    }
}

impl Fixture {
    pub fn initialised(width: u32, height: u32) -> Self {
        let mut fx = fixture(width, height);
        fx.surface.initialise(&fx.swap_chain).unwrap();
        fx
    }

    /// The host side of a resize: nothing may reference the back buffer
    /// while the swap chain reallocates it.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.surface.owner_device().unbind_targets();
        self.surface.prepare_resize();
        self.swap_chain.resize_buffers(width, height)?;
        self.surface.resize(&self.swap_chain)?;
        self.surface.owner_device().bind_back_buffer(&self.swap_chain)
    }

    pub fn events(&self) -> Vec<SoftEvent> {
        self.adapter.journal()
    }

    pub fn back_buffer_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let width = self.swap_chain.back_buffer_desc().unwrap().width;
        self.swap_chain.read_back_buffer()[(y * width + x) as usize]
    }
}
