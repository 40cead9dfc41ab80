use std::fmt;
use std::sync::Arc;

use crate::device::{BindFlags, PixelFormat, SwapChain, TextureDesc};
use crate::error::{InteropError, Result, ResultCode};

use super::adapter::{SoftEvent, SoftFault};
use super::memory::TextureMemory;
use super::owner::{SoftDevice, SoftTexture};

/// A presented frame, handed to the present sink.
pub struct SoftFrame<'a> {
    pub width: u32,
    pub height: u32,
    /// Premultiplied RGBA8, row-major.
    pub texels: &'a [[u8; 4]],
}

pub type PresentSink = Box<dyn FnMut(&SoftFrame<'_>) + Send>;

/// Single-buffered swap chain of the soft backend.
///
/// `resize_buffers` fails with `DXGI_ERROR_INVALID_CALL` while any view,
/// binding or command list still references the back buffer.
pub struct SoftSwapChain {
    device: SoftDevice,
    format: PixelFormat,
    back_buffer: Arc<TextureMemory>,
    presents: u64,
    sink: Option<PresentSink>,
}

impl SoftSwapChain {
    pub(crate) fn new(device: SoftDevice, width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let back_buffer = allocate(&device, width, height, format)?;
        Ok(Self {
            device,
            format,
            back_buffer,
            presents: 0,
            sink: None,
        })
    }

    /// Installs a callback that receives every presented frame.
    pub fn set_present_sink(&mut self, sink: PresentSink) {
        self.sink = Some(sink);
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn present_count(&self) -> u64 {
        self.presents
    }

    /// Copy of the back buffer's texels.
    pub fn read_back_buffer(&self) -> Vec<[u8; 4]> {
        self.back_buffer.read().clone()
    }

    /// A new reference to the back buffer (keeps it alive).
    pub(crate) fn back_buffer_texture(&self) -> SoftTexture {
        SoftTexture::from_memory(Arc::clone(&self.back_buffer))
    }

    /// References to the back buffer held outside the swap chain.
    pub fn outstanding_references(&self) -> usize {
        Arc::strong_count(&self.back_buffer) - 1
    }
}

fn allocate(device: &SoftDevice, width: u32, height: u32, format: PixelFormat) -> Result<Arc<TextureMemory>> {
    if width == 0 || height == 0 {
        return Err(InteropError::graphics(
            ResultCode::E_INVALIDARG,
            format!("swap chain buffers cannot be {width}x{height}"),
        ));
    }
    let mut desc = TextureDesc::new(width, height, format);
    desc.bind = BindFlags::RENDER_TARGET;
    Ok(device.alloc_memory(desc))
}

impl SwapChain for SoftSwapChain {
    fn back_buffer_desc(&self) -> Result<TextureDesc> {
        Ok(*self.back_buffer.desc())
    }

    fn resize_buffers(&mut self, width: u32, height: u32) -> Result<()> {
        let adapter = self.device.adapter().clone();
        let outcome = adapter
            .check_fault(SoftFault::ResizeBuffers, "ResizeBuffers")
            .and_then(|()| {
                let refs = self.outstanding_references();
                if refs > 0 {
                    return Err(InteropError::graphics(
                        ResultCode::DXGI_ERROR_INVALID_CALL,
                        format!("ResizeBuffers: {refs} reference(s) to the back buffer outstanding"),
                    ));
                }
                allocate(&self.device, width, height, self.format)
            });

        adapter.record(SoftEvent::ResizeBuffers {
            width,
            height,
            ok: outcome.is_ok(),
        });
        self.back_buffer = outcome?;
        log::debug!("SoftSwapChain: buffers resized to {width}x{height}");
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        let desc = *self.back_buffer.desc();
        self.device.adapter().record(SoftEvent::Present {
            width: desc.width,
            height: desc.height,
        });
        if let Some(sink) = self.sink.as_mut() {
            let texels = self.back_buffer.read();
            sink(&SoftFrame {
                width: desc.width,
                height: desc.height,
                texels: &texels,
            });
        }
        self.presents += 1;
        Ok(())
    }
}

impl fmt::Debug for SoftSwapChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let desc = self.back_buffer.desc();
        f.debug_struct("SoftSwapChain")
            .field("size", &(desc.width, desc.height))
            .field("format", &self.format)
            .field("presents", &self.presents)
            .finish()
    }
}
