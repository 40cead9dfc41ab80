mod present;
mod runtime;
mod scene;
mod window;

use anyhow::Result;
use tandem_surface::interop::SurfaceConfig;
use tandem_surface::logging::{init_logging, LoggingConfig};
use tandem_surface::soft::SoftPlatform;

use present::PresentConfig;
use runtime::{HostSetup, Runtime, RuntimeConfig};
use scene::{DemoScene, FONT_FAMILY};

fn main() -> Result<()> {
    init_logging(LoggingConfig {
        env_filter: Some("info,wgpu_core=warn,wgpu_hal=warn".to_string()),
        ..LoggingConfig::default()
    });

    let platform = SoftPlatform::new();
    match load_font() {
        Some(bytes) => platform.register_font(FONT_FAMILY, &bytes)?,
        None => log::warn!("no system font found; text renders as placeholder boxes"),
    }

    let config = RuntimeConfig {
        title: "tandem · shared surface demo".to_string(),
        ..RuntimeConfig::default()
    };
    let setup = HostSetup {
        platform,
        surface: SurfaceConfig::default(),
        guest_pass: DemoScene::new("guest 2D over owner 3D").into_pass(),
    };

    Runtime::run(config, PresentConfig::default(), setup)
}

fn load_font() -> Option<Vec<u8>> {
    [
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/noto/NotoSans-Regular.ttf",
        "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
        "C:\\Windows\\Fonts\\segoeui.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
    ]
    .iter()
    .find_map(|p| std::fs::read(p).ok())
}
