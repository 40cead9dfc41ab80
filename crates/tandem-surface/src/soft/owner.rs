use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::coords::Viewport;
use crate::device::{
    AdapterId, BindFlags, BlendDesc, CompositeConstants, DeferredContext, MiscFlags, OwnerDevice,
    PixelFormat, QuadVertex, SamplerFilter, ShaderResourceViewDesc, SharedHandle, TextureDesc,
    FULLSCREEN_QUAD,
};
use crate::error::{InteropError, Result, ResultCode};
use crate::paint::Color;

use super::adapter::{DeviceId, DeviceRole, SoftAdapter, SoftEvent, SoftFault};
use super::keyed::SoftKeyedMutex;
use super::memory::TextureMemory;
use super::raster::{self, QuadDraw, Texels};
use super::swap_chain::SoftSwapChain;

/// Owner-side texture handle.
#[derive(Clone)]
pub struct SoftTexture {
    memory: Arc<TextureMemory>,
}

impl SoftTexture {
    pub(crate) fn from_memory(memory: Arc<TextureMemory>) -> Self {
        Self { memory }
    }

    pub(crate) fn memory(&self) -> &Arc<TextureMemory> {
        &self.memory
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.memory.id()
    }

    #[inline]
    pub fn desc(&self) -> TextureDesc {
        *self.memory.desc()
    }

    /// Copy of every texel, premultiplied RGBA8, row-major.
    pub fn read_pixels(&self) -> Vec<[u8; 4]> {
        self.memory.read().clone()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let desc = self.memory.desc();
        if x >= desc.width || y >= desc.height {
            return None;
        }
        self.memory.read().get((y * desc.width + x) as usize).copied()
    }
}

impl fmt::Debug for SoftTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let desc = self.memory.desc();
        write!(f, "SoftTexture#{}({}x{})", self.id(), desc.width, desc.height)
    }
}

#[derive(Debug, Clone)]
pub struct SoftShaderResourceView {
    id: u64,
    texture: SoftTexture,
    desc: ShaderResourceViewDesc,
}

impl SoftShaderResourceView {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn desc(&self) -> ShaderResourceViewDesc {
        self.desc
    }

    pub fn texture(&self) -> &SoftTexture {
        &self.texture
    }
}

#[derive(Debug, Clone)]
pub struct SoftSampler {
    id: u64,
    filter: SamplerFilter,
}

impl SoftSampler {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn filter(&self) -> SamplerFilter {
        self.filter
    }
}

#[derive(Debug, Clone)]
pub struct SoftBlendState {
    id: u64,
    desc: BlendDesc,
}

impl SoftBlendState {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn desc(&self) -> BlendDesc {
        self.desc
    }
}

/// Constant buffer. Updates are visible to already recorded command lists.
#[derive(Debug, Clone)]
pub struct SoftBuffer {
    id: u64,
    data: Arc<RwLock<Vec<u8>>>,
}

impl SoftBuffer {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn contents(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

/// Vertex buffer, layout, topology and shader stages of the composite pass.
#[derive(Debug, Clone)]
pub struct SoftPipeline {
    id: u64,
    vertices: Arc<[QuadVertex]>,
}

impl SoftPipeline {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Output-merger and rasterizer bindings of a context.
#[derive(Debug, Clone, Default)]
pub struct SoftOutput {
    pub render_target: Option<SoftTexture>,
    pub depth_stencil: Option<SoftTexture>,
    pub viewport: Option<Viewport>,
}

/// A recorded command.
#[derive(Debug, Clone)]
pub enum SoftCommand {
    SetPipeline(SoftPipeline),
    SetShaderResource(u32, SoftShaderResourceView),
    SetSampler(u32, SoftSampler),
    SetConstantBuffer(u32, SoftBuffer),
    SetOutput(SoftOutput),
    SetBlendState(SoftBlendState),
    Draw { vertex_count: u32, start_vertex: u32 },
}

pub struct SoftDeferredContext {
    device: SoftDevice,
    commands: Vec<SoftCommand>,
}

/// Immutable, replayable command sequence.
#[derive(Debug)]
pub struct SoftCommandList {
    id: u64,
    commands: Vec<SoftCommand>,
}

impl SoftCommandList {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn commands(&self) -> &[SoftCommand] {
        &self.commands
    }

    /// Viewport in effect at the last recorded draw.
    pub fn viewport(&self) -> Option<Viewport> {
        self.commands.iter().rev().find_map(|c| match c {
            SoftCommand::SetOutput(out) => out.viewport,
            _ => None,
        })
    }

    /// Render target the list draws into.
    pub fn render_target(&self) -> Option<&SoftTexture> {
        self.commands.iter().rev().find_map(|c| match c {
            SoftCommand::SetOutput(out) => out.render_target.as_ref(),
            _ => None,
        })
    }
}

impl DeferredContext<SoftDevice> for SoftDeferredContext {
    fn set_pipeline(&mut self, pipeline: &SoftPipeline) {
        self.commands.push(SoftCommand::SetPipeline(pipeline.clone()));
    }

    fn set_shader_resource(&mut self, slot: u32, view: &SoftShaderResourceView) {
        self.commands.push(SoftCommand::SetShaderResource(slot, view.clone()));
    }

    fn set_sampler(&mut self, slot: u32, sampler: &SoftSampler) {
        self.commands.push(SoftCommand::SetSampler(slot, sampler.clone()));
    }

    fn set_constant_buffer(&mut self, slot: u32, buffer: &SoftBuffer) {
        self.commands.push(SoftCommand::SetConstantBuffer(slot, buffer.clone()));
    }

    fn set_output(&mut self, output: &SoftOutput) {
        self.commands.push(SoftCommand::SetOutput(output.clone()));
    }

    fn set_blend_state(&mut self, blend: &SoftBlendState) {
        self.commands.push(SoftCommand::SetBlendState(blend.clone()));
    }

    fn draw(&mut self, vertex_count: u32, start_vertex: u32) {
        self.commands.push(SoftCommand::Draw {
            vertex_count,
            start_vertex,
        });
    }

    fn finish(self) -> Result<SoftCommandList> {
        let adapter = &self.device.inner.adapter;
        adapter.check_fault(SoftFault::FinishCommandList, "FinishCommandList")?;

        let list = SoftCommandList {
            id: adapter.next_object_id(),
            commands: self.commands,
        };
        adapter.record(SoftEvent::FinishCommandList {
            device: self.device.id(),
            list: list.id,
        });
        Ok(list)
    }
}

/// State accumulated while replaying a command list.
#[derive(Default)]
struct ReplayState {
    pipeline: Option<SoftPipeline>,
    views: BTreeMap<u32, SoftShaderResourceView>,
    samplers: BTreeMap<u32, SoftSampler>,
    constants: BTreeMap<u32, SoftBuffer>,
    output: SoftOutput,
    blend: Option<SoftBlendState>,
}

/// Soft owner device with its immediate context.
#[derive(Clone)]
pub struct SoftDevice {
    inner: Arc<OwnerInner>,
}

struct OwnerInner {
    id: DeviceId,
    adapter: SoftAdapter,
    immediate: Mutex<SoftOutput>,
}

impl SoftDevice {
    pub(crate) fn new(adapter: SoftAdapter) -> Result<Self> {
        adapter.check_fault(SoftFault::CreateDevice, "D3D11CreateDevice")?;
        let id = DeviceId(adapter.next_object_id());
        adapter.record(SoftEvent::CreateDevice {
            device: id,
            role: DeviceRole::Owner,
        });
        Ok(Self {
            inner: Arc::new(OwnerInner {
                id,
                adapter,
                immediate: Mutex::new(SoftOutput::default()),
            }),
        })
    }

    #[inline]
    pub fn id(&self) -> DeviceId {
        self.inner.id
    }

    pub fn adapter(&self) -> &SoftAdapter {
        &self.inner.adapter
    }

    /// True if both handles name the same device.
    pub fn same_device(&self, other: &SoftDevice) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Creates a swap chain with `width × height` back buffers.
    pub fn create_swap_chain(&self, width: u32, height: u32, format: PixelFormat) -> Result<SoftSwapChain> {
        SoftSwapChain::new(self.clone(), width, height, format)
    }

    /// Allocates texture memory without journaling or fault checks.
    pub(crate) fn alloc_memory(&self, desc: TextureDesc) -> Arc<TextureMemory> {
        Arc::new(TextureMemory::new(self.inner.adapter.next_object_id(), desc))
    }

    fn replay(&self, list: &SoftCommandList) -> Result<()> {
        let mut state = ReplayState::default();
        for command in &list.commands {
            match command {
                SoftCommand::SetPipeline(p) => state.pipeline = Some(p.clone()),
                SoftCommand::SetShaderResource(slot, v) => {
                    state.views.insert(*slot, v.clone());
                }
                SoftCommand::SetSampler(slot, s) => {
                    state.samplers.insert(*slot, s.clone());
                }
                SoftCommand::SetConstantBuffer(slot, b) => {
                    state.constants.insert(*slot, b.clone());
                }
                SoftCommand::SetOutput(out) => state.output = out.clone(),
                SoftCommand::SetBlendState(b) => state.blend = Some(b.clone()),
                SoftCommand::Draw {
                    vertex_count,
                    start_vertex,
                } => self.draw_quad(&state, *vertex_count, *start_vertex)?,
            }
        }
        Ok(())
    }

    fn draw_quad(&self, state: &ReplayState, vertex_count: u32, start_vertex: u32) -> Result<()> {
        let missing = |what: &str| {
            InteropError::graphics(ResultCode::E_INVALIDARG, format!("Draw: no {what} bound"))
        };
        let pipeline = state.pipeline.as_ref().ok_or_else(|| missing("pipeline"))?;
        let view = state.views.get(&0).ok_or_else(|| missing("shader resource"))?;
        let sampler = state.samplers.get(&0).ok_or_else(|| missing("sampler"))?;
        let target = state
            .output
            .render_target
            .as_ref()
            .ok_or_else(|| missing("render target"))?;
        let viewport = state.output.viewport.ok_or_else(|| missing("viewport"))?;

        let source = view.texture.memory();
        let dest = target.memory();
        if Arc::ptr_eq(source, dest) {
            return Err(InteropError::graphics(
                ResultCode::E_INVALIDARG,
                "Draw: texture bound as both input and output",
            ));
        }
        for memory in [source, dest] {
            if !memory.is_accessible_by(self.id()) {
                return Err(InteropError::graphics(
                    ResultCode::DXGI_ERROR_INVALID_CALL,
                    format!(
                        "Draw: texture {} used without holding its keyed mutex",
                        memory.id()
                    ),
                ));
            }
        }

        let start = start_vertex as usize;
        let vertices = pipeline
            .vertices
            .get(start..start + vertex_count as usize)
            .ok_or_else(|| {
                InteropError::graphics(ResultCode::E_INVALIDARG, "Draw: vertex range out of bounds")
            })?;

        let opacity = state
            .constants
            .get(&0)
            .and_then(|b| CompositeConstants::from_bytes(&b.data.read()))
            .map_or(1.0, |c| c.opacity);
        let blend = state.blend.as_ref().map_or(BlendDesc::REPLACE, |b| b.desc);

        let src_desc = *source.desc();
        let src_texels = source.read().clone();
        let dst_desc = *dest.desc();
        let mut dst_texels = dest.write();

        raster::draw_strip(
            &mut dst_texels,
            dst_desc.width,
            dst_desc.height,
            &QuadDraw {
                vertices,
                source: Texels {
                    data: &src_texels,
                    width: src_desc.width,
                    height: src_desc.height,
                },
                filter: sampler.filter,
                opacity,
                blend: &blend,
                viewport,
            },
        );

        self.inner.adapter.record(SoftEvent::Draw {
            device: self.id(),
            vertex_count,
        });
        Ok(())
    }
}

impl fmt::Debug for SoftDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftDevice").field("id", &self.inner.id).finish()
    }
}

impl OwnerDevice for SoftDevice {
    type SwapChain = SoftSwapChain;
    type Texture = SoftTexture;
    type Lock = SoftKeyedMutex;
    type ShaderResourceView = SoftShaderResourceView;
    type Sampler = SoftSampler;
    type BlendState = SoftBlendState;
    type Buffer = SoftBuffer;
    type Pipeline = SoftPipeline;
    type OutputBindings = SoftOutput;
    type Deferred = SoftDeferredContext;
    type CommandList = SoftCommandList;

    fn adapter_id(&self) -> AdapterId {
        self.inner.adapter.id()
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<SoftTexture> {
        let adapter = &self.inner.adapter;
        adapter.check_fault(SoftFault::CreateTexture, "CreateTexture2D")?;
        if desc.is_empty() {
            return Err(InteropError::graphics(
                ResultCode::E_INVALIDARG,
                format!("CreateTexture2D: empty size {}x{}", desc.width, desc.height),
            ));
        }

        let memory = self.alloc_memory(*desc);
        adapter.record(SoftEvent::CreateTexture {
            texture: memory.id(),
            width: desc.width,
            height: desc.height,
        });
        Ok(SoftTexture::from_memory(memory))
    }

    fn texture_desc(&self, texture: &SoftTexture) -> TextureDesc {
        texture.desc()
    }

    fn shared_handle(&self, texture: &SoftTexture) -> Result<SharedHandle> {
        let adapter = &self.inner.adapter;
        adapter.check_fault(SoftFault::SharedHandle, "GetSharedHandle")?;

        let misc = texture.desc().misc;
        if !(misc.contains(MiscFlags::SHARED) || misc.contains(MiscFlags::SHARED_KEYED_MUTEX)) {
            return Err(InteropError::graphics(
                ResultCode::E_INVALIDARG,
                "GetSharedHandle: texture was not created shareable",
            ));
        }
        Ok(adapter.export(texture.memory()))
    }

    fn open_keyed_mutex(&self, texture: &SoftTexture) -> Result<SoftKeyedMutex> {
        if !texture.memory().has_keyed_mutex() {
            return Err(InteropError::graphics(
                ResultCode::E_NOINTERFACE,
                "QueryInterface(IDXGIKeyedMutex) on a texture without a keyed mutex",
            ));
        }
        Ok(SoftKeyedMutex::new(
            self.inner.adapter.clone(),
            self.id(),
            Arc::clone(texture.memory()),
        ))
    }

    fn create_shader_resource_view(
        &self,
        texture: &SoftTexture,
        desc: &ShaderResourceViewDesc,
    ) -> Result<SoftShaderResourceView> {
        let adapter = &self.inner.adapter;
        adapter.check_fault(SoftFault::CreateShaderResourceView, "CreateShaderResourceView")?;

        let tex = texture.desc();
        let invalid = |why: &str| {
            InteropError::graphics(
                ResultCode::E_INVALIDARG,
                format!("CreateShaderResourceView: {why}"),
            )
        };
        if !tex.bind.contains(BindFlags::SHADER_RESOURCE) {
            return Err(invalid("texture lacks the shader-resource bind flag"));
        }
        if desc.format != tex.format {
            return Err(invalid("view format differs from texture format"));
        }
        if desc.mip_levels == 0 || desc.most_detailed_mip + desc.mip_levels > tex.mip_levels.max(1) {
            return Err(invalid("mip range outside the texture"));
        }

        Ok(SoftShaderResourceView {
            id: adapter.next_object_id(),
            texture: texture.clone(),
            desc: *desc,
        })
    }

    fn create_sampler(&self, filter: SamplerFilter) -> Result<SoftSampler> {
        Ok(SoftSampler {
            id: self.inner.adapter.next_object_id(),
            filter,
        })
    }

    fn create_blend_state(&self, desc: &BlendDesc) -> Result<SoftBlendState> {
        Ok(SoftBlendState {
            id: self.inner.adapter.next_object_id(),
            desc: *desc,
        })
    }

    fn create_constant_buffer(&self, contents: &[u8]) -> Result<SoftBuffer> {
        if contents.is_empty() || contents.len() % 16 != 0 {
            return Err(InteropError::graphics(
                ResultCode::E_INVALIDARG,
                format!("CreateBuffer: constant buffer size {} is not a multiple of 16", contents.len()),
            ));
        }
        Ok(SoftBuffer {
            id: self.inner.adapter.next_object_id(),
            data: Arc::new(RwLock::new(contents.to_vec())),
        })
    }

    fn update_constant_buffer(&self, buffer: &SoftBuffer, contents: &[u8]) -> Result<()> {
        let mut data = buffer.data.write();
        if data.len() != contents.len() {
            return Err(InteropError::graphics(
                ResultCode::E_INVALIDARG,
                "UpdateSubresource: size differs from the buffer",
            ));
        }
        data.copy_from_slice(contents);
        Ok(())
    }

    fn create_composite_pipeline(&self) -> Result<SoftPipeline> {
        Ok(SoftPipeline {
            id: self.inner.adapter.next_object_id(),
            vertices: Arc::from(FULLSCREEN_QUAD.as_slice()),
        })
    }

    fn output_bindings(&self) -> SoftOutput {
        self.inner.immediate.lock().clone()
    }

    fn create_deferred_context(&self) -> Result<SoftDeferredContext> {
        Ok(SoftDeferredContext {
            device: self.clone(),
            commands: Vec::new(),
        })
    }

    fn execute_command_list(&self, list: &SoftCommandList) -> Result<()> {
        let adapter = &self.inner.adapter;
        adapter.check_fault(SoftFault::ExecuteCommandList, "ExecuteCommandList")?;
        adapter.record(SoftEvent::ExecuteCommandList {
            device: self.id(),
            list: list.id,
        });
        self.replay(list)
    }

    fn bind_back_buffer(&self, swap_chain: &SoftSwapChain) -> Result<()> {
        let back_buffer = swap_chain.back_buffer_texture();
        let desc = back_buffer.desc();
        *self.inner.immediate.lock() = SoftOutput {
            render_target: Some(back_buffer),
            depth_stencil: None,
            viewport: Some(Viewport::from_size(desc.width, desc.height)),
        };
        Ok(())
    }

    fn unbind_targets(&self) {
        *self.inner.immediate.lock() = SoftOutput::default();
    }

    fn clear_target(&self, color: Color) -> Result<()> {
        let output = self.output_bindings();
        let target = output.render_target.ok_or_else(|| {
            InteropError::graphics(ResultCode::DXGI_ERROR_INVALID_CALL, "ClearRenderTargetView: no render target bound")
        })?;
        if !target.memory().is_accessible_by(self.id()) {
            return Err(InteropError::graphics(
                ResultCode::DXGI_ERROR_INVALID_CALL,
                "ClearRenderTargetView: target used without holding its keyed mutex",
            ));
        }
        raster::clear(&mut target.memory().write(), color);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{AcquireStatus, KeyedMutex, LockTimeout, SwapChain};

    fn device() -> SoftDevice {
        SoftDevice::new(SoftAdapter::default()).unwrap()
    }

    fn shared_desc(w: u32, h: u32) -> TextureDesc {
        TextureDesc::new(w, h, PixelFormat::Bgra8Unorm).shared_surface(PixelFormat::Bgra8Unorm)
    }

    #[test]
    fn non_shareable_texture_has_no_handle() {
        let dev = device();
        let tex = dev.create_texture(&TextureDesc::new(4, 4, PixelFormat::Bgra8Unorm)).unwrap();
        let err = dev.shared_handle(&tex).unwrap_err();
        assert_eq!(err.code(), Some(ResultCode::E_INVALIDARG));
        assert!(dev.open_keyed_mutex(&tex).is_err());
    }

    #[test]
    fn srv_requires_matching_format() {
        let dev = device();
        let tex = dev.create_texture(&shared_desc(4, 4)).unwrap();
        let mut desc = ShaderResourceViewDesc::for_texture(&tex.desc());
        assert!(dev.create_shader_resource_view(&tex, &desc).is_ok());

        desc.format = PixelFormat::Rgba16Float;
        assert!(dev.create_shader_resource_view(&tex, &desc).is_err());
    }

    #[test]
    fn constant_buffers_are_register_sized() {
        let dev = device();
        assert!(dev.create_constant_buffer(&[0; 12]).is_err());

        let buf = dev.create_constant_buffer(CompositeConstants::new(1.0).as_bytes()).unwrap();
        dev.update_constant_buffer(&buf, CompositeConstants::new(0.5).as_bytes()).unwrap();
        assert_eq!(CompositeConstants::from_bytes(&buf.contents()).unwrap().opacity, 0.5);
        assert!(dev.update_constant_buffer(&buf, &[0; 32]).is_err());
    }

    fn record_composite(dev: &SoftDevice, tex: &SoftTexture) -> SoftCommandList {
        let view = dev
            .create_shader_resource_view(tex, &ShaderResourceViewDesc::for_texture(&tex.desc()))
            .unwrap();
        let mut ctx = dev.create_deferred_context().unwrap();
        ctx.set_pipeline(&dev.create_composite_pipeline().unwrap());
        ctx.set_shader_resource(0, &view);
        ctx.set_sampler(0, &dev.create_sampler(SamplerFilter::Point).unwrap());
        ctx.set_output(&dev.output_bindings());
        ctx.set_blend_state(&dev.create_blend_state(&BlendDesc::PREMULTIPLIED_OVER).unwrap());
        ctx.draw(4, 0);
        ctx.finish().unwrap()
    }

    #[test]
    fn executing_requires_holding_the_surface() {
        let dev = device();
        let mut chain = dev.create_swap_chain(4, 4, PixelFormat::Bgra8Unorm).unwrap();
        dev.bind_back_buffer(&chain).unwrap();

        let tex = dev.create_texture(&shared_desc(4, 4)).unwrap();
        tex.memory().write().fill([255, 0, 0, 255]);
        let list = record_composite(&dev, &tex);

        let err = dev.execute_command_list(&list).unwrap_err();
        assert_eq!(err.code(), Some(ResultCode::DXGI_ERROR_INVALID_CALL));

        let lock = dev.open_keyed_mutex(&tex).unwrap();
        assert_eq!(lock.acquire(0, LockTimeout::IMMEDIATE).unwrap(), AcquireStatus::Acquired);
        dev.execute_command_list(&list).unwrap();
        lock.release(0).unwrap();

        assert_eq!(chain.read_back_buffer()[5], [255, 0, 0, 255]);
        chain.present().unwrap();
    }

    #[test]
    fn recorded_list_pins_the_back_buffer() {
        let dev = device();
        let mut chain = dev.create_swap_chain(4, 4, PixelFormat::Bgra8Unorm).unwrap();
        dev.bind_back_buffer(&chain).unwrap();
        let tex = dev.create_texture(&shared_desc(4, 4)).unwrap();
        let list = record_composite(&dev, &tex);

        dev.unbind_targets();
        let err = chain.resize_buffers(8, 8).unwrap_err();
        assert_eq!(err.code(), Some(ResultCode::DXGI_ERROR_INVALID_CALL));

        drop(list);
        chain.resize_buffers(8, 8).unwrap();
        assert_eq!(chain.back_buffer_desc().unwrap().width, 8);
    }

    #[test]
    fn clear_needs_a_bound_target() {
        let dev = device();
        assert!(dev.clear_target(Color::BLACK).is_err());

        let chain = dev.create_swap_chain(2, 2, PixelFormat::Bgra8Unorm).unwrap();
        dev.bind_back_buffer(&chain).unwrap();
        dev.clear_target(Color::WHITE).unwrap();
        assert!(chain.read_back_buffer().iter().all(|px| *px == [255; 4]));
    }
}
