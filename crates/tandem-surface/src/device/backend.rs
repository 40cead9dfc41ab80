use std::fmt;

use crate::coords::Rect;
use crate::error::Result;
use crate::paint::Color;

use super::{
    BlendDesc, KeyedMutex, SamplerFilter, ShaderResourceViewDesc, TextFormatDesc, TextureDesc,
};

/// Identity of a physical adapter. Devices are cached per id.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct AdapterId(pub u64);

impl fmt::Display for AdapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "adapter#{:x}", self.0)
    }
}

/// OS-level handle that lets a second device open a texture's memory.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SharedHandle(pub u64);

impl fmt::Display for SharedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Entry point of a backend: creates owner and guest devices on an adapter.
pub trait Platform {
    type Adapter;
    type Owner: OwnerDevice;
    type Guest: GuestDevice;

    fn adapter_id(&self, adapter: &Self::Adapter) -> AdapterId;

    fn create_owner_device(&self, adapter: &Self::Adapter) -> Result<Self::Owner>;

    fn create_guest_device(&self, adapter: &Self::Adapter) -> Result<Self::Guest>;
}

/// Presentable chain of back buffers owned by the host.
pub trait SwapChain {
    /// Description of the current back buffer.
    fn back_buffer_desc(&self) -> Result<TextureDesc>;

    /// Reallocates the back buffers.
    ///
    /// Fails while anything still references the old buffers (views, bound
    /// targets, recorded command lists).
    fn resize_buffers(&mut self, width: u32, height: u32) -> Result<()>;

    fn present(&mut self) -> Result<()>;
}

/// The device that owns the shared surface and composites it.
///
/// Resource handles are cheap to clone and keep the underlying object alive,
/// like COM pointers.
pub trait OwnerDevice: Clone {
    type SwapChain: SwapChain;
    type Texture: Clone;
    type Lock: KeyedMutex;
    type ShaderResourceView: Clone;
    type Sampler: Clone;
    type BlendState: Clone;
    type Buffer: Clone;
    type Pipeline: Clone;
    /// Render target, depth-stencil and viewport bound on the immediate context.
    type OutputBindings;
    type Deferred: DeferredContext<Self>;
    type CommandList;

    fn adapter_id(&self) -> AdapterId;

    fn create_texture(&self, desc: &TextureDesc) -> Result<Self::Texture>;

    fn texture_desc(&self, texture: &Self::Texture) -> TextureDesc;

    /// Exports `texture` so another device on the same adapter can open it.
    fn shared_handle(&self, texture: &Self::Texture) -> Result<SharedHandle>;

    /// Keyed mutex of this device's view of `texture`.
    fn open_keyed_mutex(&self, texture: &Self::Texture) -> Result<Self::Lock>;

    fn create_shader_resource_view(
        &self,
        texture: &Self::Texture,
        desc: &ShaderResourceViewDesc,
    ) -> Result<Self::ShaderResourceView>;

    fn create_sampler(&self, filter: SamplerFilter) -> Result<Self::Sampler>;

    fn create_blend_state(&self, desc: &BlendDesc) -> Result<Self::BlendState>;

    fn create_constant_buffer(&self, contents: &[u8]) -> Result<Self::Buffer>;

    /// Overwrites a constant buffer on the immediate context.
    fn update_constant_buffer(&self, buffer: &Self::Buffer, contents: &[u8]) -> Result<()>;

    /// Vertex buffer, input layout, topology and shaders of the composite pass.
    fn create_composite_pipeline(&self) -> Result<Self::Pipeline>;

    /// Snapshot of the immediate context's current output bindings.
    fn output_bindings(&self) -> Self::OutputBindings;

    fn create_deferred_context(&self) -> Result<Self::Deferred>;

    fn execute_command_list(&self, list: &Self::CommandList) -> Result<()>;

    // ── host side ──

    /// Binds the swap chain's back buffer as render target, with a viewport
    /// covering it.
    fn bind_back_buffer(&self, swap_chain: &Self::SwapChain) -> Result<()>;

    /// Clears output bindings so the swap chain can be resized.
    fn unbind_targets(&self);

    fn clear_target(&self, color: Color) -> Result<()>;
}

/// Records owner commands for later replay.
pub trait DeferredContext<D: OwnerDevice> {
    fn set_pipeline(&mut self, pipeline: &D::Pipeline);
    fn set_shader_resource(&mut self, slot: u32, view: &D::ShaderResourceView);
    fn set_sampler(&mut self, slot: u32, sampler: &D::Sampler);
    fn set_constant_buffer(&mut self, slot: u32, buffer: &D::Buffer);
    fn set_output(&mut self, output: &D::OutputBindings);
    fn set_blend_state(&mut self, blend: &D::BlendState);
    fn draw(&mut self, vertex_count: u32, start_vertex: u32);

    /// Closes the recording. The context is consumed.
    fn finish(self) -> Result<D::CommandList>;
}

/// The device that draws 2D content into the shared surface.
///
/// Drawing follows the begin/end bracket of 2D APIs: individual draw calls
/// cannot fail, errors surface from [`end_draw`](Self::end_draw).
pub trait GuestDevice: Clone {
    type Surface;
    type Lock: KeyedMutex;
    type RenderTarget;
    type Brush: Clone;

    fn adapter_id(&self) -> AdapterId;

    fn open_shared_surface(&self, handle: SharedHandle) -> Result<Self::Surface>;

    fn open_keyed_mutex(&self, surface: &Self::Surface) -> Result<Self::Lock>;

    fn create_render_target(&self, surface: &Self::Surface) -> Result<Self::RenderTarget>;

    fn create_solid_brush(&self, target: &Self::RenderTarget, color: Color) -> Result<Self::Brush>;

    fn begin_draw(&self, target: &mut Self::RenderTarget);

    fn clear(&self, target: &mut Self::RenderTarget, color: Color);

    fn fill_rect(&self, target: &mut Self::RenderTarget, rect: Rect, brush: &Self::Brush);

    fn end_draw(&self, target: &mut Self::RenderTarget) -> Result<()>;
}

/// Guest device that can also lay out and draw text.
pub trait TextDevice: GuestDevice {
    type TextFormat: Clone;

    /// Locale name of the current user, e.g. `en-US`.
    fn default_locale(&self) -> Result<String>;

    fn create_text_format(&self, desc: &TextFormatDesc) -> Result<Self::TextFormat>;

    fn draw_text(
        &self,
        target: &mut Self::RenderTarget,
        text: &str,
        format: &Self::TextFormat,
        layout: Rect,
        brush: &Self::Brush,
    );
}
