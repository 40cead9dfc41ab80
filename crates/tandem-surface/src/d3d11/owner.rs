use std::fmt;

use windows::Win32::Foundation::{HANDLE, HWND};
use windows::Win32::Graphics::Direct3D::{D3D_PRIMITIVE_TOPOLOGY_TRIANGLESTRIP, D3D_SRV_DIMENSION_TEXTURE2D};
use windows::Win32::Graphics::Direct3D11::{
    ID3D11BlendState, ID3D11Buffer, ID3D11CommandList, ID3D11DepthStencilView, ID3D11Device,
    ID3D11DeviceContext, ID3D11InputLayout, ID3D11PixelShader, ID3D11RenderTargetView,
    ID3D11SamplerState, ID3D11ShaderResourceView, ID3D11Texture2D, ID3D11VertexShader,
    D3D11_BIND_CONSTANT_BUFFER, D3D11_BIND_VERTEX_BUFFER, D3D11_BLEND, D3D11_BLEND_DESC,
    D3D11_BLEND_INV_SRC_ALPHA, D3D11_BLEND_ONE, D3D11_BLEND_OP_ADD, D3D11_BLEND_SRC_ALPHA,
    D3D11_BLEND_ZERO, D3D11_BUFFER_DESC, D3D11_COLOR_WRITE_ENABLE_ALL, D3D11_COMPARISON_NEVER,
    D3D11_FILTER_MIN_MAG_MIP_LINEAR, D3D11_FILTER_MIN_MAG_MIP_POINT, D3D11_FLOAT32_MAX,
    D3D11_INPUT_ELEMENT_DESC, D3D11_INPUT_PER_VERTEX_DATA, D3D11_RENDER_TARGET_BLEND_DESC,
    D3D11_SAMPLER_DESC, D3D11_SHADER_RESOURCE_VIEW_DESC, D3D11_SHADER_RESOURCE_VIEW_DESC_0,
    D3D11_SUBRESOURCE_DATA, D3D11_TEX2D_SRV, D3D11_TEXTURE2D_DESC, D3D11_TEXTURE_ADDRESS_CLAMP,
    D3D11_USAGE_DEFAULT, D3D11_USAGE_IMMUTABLE, D3D11_VIEWPORT,
};
use windows::Win32::Graphics::Dxgi::Common::{
    DXGI_ALPHA_MODE_IGNORE, DXGI_FORMAT_R32G32_FLOAT, DXGI_FORMAT_UNKNOWN, DXGI_SAMPLE_DESC,
};
use windows::Win32::Graphics::Dxgi::{
    IDXGIDevice, IDXGIFactory2, IDXGIKeyedMutex, IDXGIResource, IDXGISwapChain1, DXGI_PRESENT,
    DXGI_SCALING_STRETCH, DXGI_SWAP_CHAIN_DESC1, DXGI_SWAP_CHAIN_FLAG,
    DXGI_SWAP_EFFECT_FLIP_DISCARD, DXGI_USAGE_RENDER_TARGET_OUTPUT,
};
use windows::core::{s, Interface};

use crate::device::{
    AdapterId, BindFlags, BlendDesc, BlendFactor, DeferredContext, MiscFlags, OwnerDevice,
    PixelFormat, QuadVertex, SamplerFilter, ShaderResourceViewDesc, SharedHandle, SwapChain,
    TextureDesc, FULLSCREEN_QUAD,
};
use crate::error::{InteropError, Result};
use crate::paint::Color;

use super::keyed::D3D11KeyedMutex;
use super::{device_adapter_id, from_dxgi, hr, missing, shader, to_dxgi};

pub type D3D11CommandList = ID3D11CommandList;

/// Owner device: a D3D11 device and its immediate context.
#[derive(Clone)]
pub struct D3D11Device {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
}

impl D3D11Device {
    pub fn new(device: ID3D11Device, context: ID3D11DeviceContext) -> Self {
        Self { device, context }
    }

    pub fn raw(&self) -> &ID3D11Device {
        &self.device
    }

    pub fn immediate_context(&self) -> &ID3D11DeviceContext {
        &self.context
    }

    /// Flip-model swap chain for `hwnd`, in BGRA8.
    pub fn create_swap_chain(&self, hwnd: HWND, width: u32, height: u32) -> Result<D3D11SwapChain> {
        let factory: IDXGIFactory2 = unsafe {
            let dxgi: IDXGIDevice = self.device.cast().map_err(hr("IDXGIDevice"))?;
            let adapter = dxgi.GetAdapter().map_err(hr("GetAdapter"))?;
            adapter.GetParent().map_err(hr("GetParent(IDXGIFactory2)"))?
        };

        let desc = DXGI_SWAP_CHAIN_DESC1 {
            Width: width,
            Height: height,
            Format: to_dxgi(PixelFormat::Bgra8Unorm),
            Stereo: false.into(),
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: 2,
            Scaling: DXGI_SCALING_STRETCH,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            AlphaMode: DXGI_ALPHA_MODE_IGNORE,
            Flags: 0,
        };

        let swap_chain = unsafe { factory.CreateSwapChainForHwnd(&self.device, hwnd, &desc, None, None) }
            .map_err(hr("CreateSwapChainForHwnd"))?;
        log::info!("D3D11Device: swap chain created at {width}x{height}");
        Ok(D3D11SwapChain {
            swap_chain,
            sync_interval: 1,
        })
    }
}

impl fmt::Debug for D3D11Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D3D11Device({:p})", Interface::as_raw(&self.device))
    }
}

/// Composite shaders, input layout and the full-screen quad.
#[derive(Clone)]
pub struct D3D11Pipeline {
    vertex_shader: ID3D11VertexShader,
    pixel_shader: ID3D11PixelShader,
    layout: ID3D11InputLayout,
    vertices: ID3D11Buffer,
}

/// Render target, depth-stencil and viewport captured from a context.
#[derive(Clone, Default)]
pub struct D3D11Output {
    pub render_target: Option<ID3D11RenderTargetView>,
    pub depth_stencil: Option<ID3D11DepthStencilView>,
    pub viewport: Option<D3D11_VIEWPORT>,
}

fn blend_factor(factor: BlendFactor) -> D3D11_BLEND {
    match factor {
        BlendFactor::Zero => D3D11_BLEND_ZERO,
        BlendFactor::One => D3D11_BLEND_ONE,
        BlendFactor::SrcAlpha => D3D11_BLEND_SRC_ALPHA,
        BlendFactor::InvSrcAlpha => D3D11_BLEND_INV_SRC_ALPHA,
    }
}

fn viewport_for(width: u32, height: u32) -> D3D11_VIEWPORT {
    D3D11_VIEWPORT {
        TopLeftX: 0.0,
        TopLeftY: 0.0,
        Width: width as f32,
        Height: height as f32,
        MinDepth: 0.0,
        MaxDepth: 1.0,
    }
}

impl OwnerDevice for D3D11Device {
    type SwapChain = D3D11SwapChain;
    type Texture = ID3D11Texture2D;
    type Lock = D3D11KeyedMutex;
    type ShaderResourceView = ID3D11ShaderResourceView;
    type Sampler = ID3D11SamplerState;
    type BlendState = ID3D11BlendState;
    type Buffer = ID3D11Buffer;
    type Pipeline = D3D11Pipeline;
    type OutputBindings = D3D11Output;
    type Deferred = D3D11DeferredContext;
    type CommandList = ID3D11CommandList;

    fn adapter_id(&self) -> AdapterId {
        device_adapter_id(&self.device)
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<ID3D11Texture2D> {
        let native = D3D11_TEXTURE2D_DESC {
            Width: desc.width,
            Height: desc.height,
            MipLevels: desc.mip_levels,
            ArraySize: 1,
            Format: to_dxgi(desc.format),
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: desc.bind.bits(),
            CPUAccessFlags: 0,
            MiscFlags: desc.misc.bits(),
        };

        let mut texture = None;
        unsafe { self.device.CreateTexture2D(&native, None, Some(&mut texture)) }
            .map_err(hr("CreateTexture2D"))?;
        texture.ok_or_else(|| missing("CreateTexture2D"))
    }

    fn texture_desc(&self, texture: &ID3D11Texture2D) -> TextureDesc {
        let mut native = D3D11_TEXTURE2D_DESC::default();
        unsafe { texture.GetDesc(&mut native) };
        let format = from_dxgi(native.Format).unwrap_or_else(|e| {
            log::warn!("D3D11Device: {e}; treating texture as BGRA8");
            PixelFormat::Bgra8Unorm
        });
        TextureDesc {
            width: native.Width,
            height: native.Height,
            mip_levels: native.MipLevels,
            format,
            bind: BindFlags::from_bits(native.BindFlags),
            misc: MiscFlags::from_bits(native.MiscFlags),
        }
    }

    fn shared_handle(&self, texture: &ID3D11Texture2D) -> Result<SharedHandle> {
        let resource: IDXGIResource = texture.cast().map_err(hr("IDXGIResource"))?;
        let handle: HANDLE = unsafe { resource.GetSharedHandle() }.map_err(hr("GetSharedHandle"))?;
        Ok(SharedHandle(handle.0 as usize as u64))
    }

    fn open_keyed_mutex(&self, texture: &ID3D11Texture2D) -> Result<D3D11KeyedMutex> {
        let mutex: IDXGIKeyedMutex = texture.cast().map_err(hr("IDXGIKeyedMutex"))?;
        Ok(D3D11KeyedMutex::new(mutex))
    }

    fn create_shader_resource_view(
        &self,
        texture: &ID3D11Texture2D,
        desc: &ShaderResourceViewDesc,
    ) -> Result<ID3D11ShaderResourceView> {
        let native = D3D11_SHADER_RESOURCE_VIEW_DESC {
            Format: to_dxgi(desc.format),
            ViewDimension: D3D_SRV_DIMENSION_TEXTURE2D,
            Anonymous: D3D11_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture2D: D3D11_TEX2D_SRV {
                    MostDetailedMip: desc.most_detailed_mip,
                    MipLevels: desc.mip_levels,
                },
            },
        };

        let mut view = None;
        unsafe { self.device.CreateShaderResourceView(texture, Some(&native), Some(&mut view)) }
            .map_err(hr("CreateShaderResourceView"))?;
        view.ok_or_else(|| missing("CreateShaderResourceView"))
    }

    fn create_sampler(&self, filter: SamplerFilter) -> Result<ID3D11SamplerState> {
        let desc = D3D11_SAMPLER_DESC {
            Filter: match filter {
                SamplerFilter::Point => D3D11_FILTER_MIN_MAG_MIP_POINT,
                SamplerFilter::Linear => D3D11_FILTER_MIN_MAG_MIP_LINEAR,
            },
            AddressU: D3D11_TEXTURE_ADDRESS_CLAMP,
            AddressV: D3D11_TEXTURE_ADDRESS_CLAMP,
            AddressW: D3D11_TEXTURE_ADDRESS_CLAMP,
            MipLODBias: 0.0,
            MaxAnisotropy: 1,
            ComparisonFunc: D3D11_COMPARISON_NEVER,
            BorderColor: [0.0; 4],
            MinLOD: 0.0,
            MaxLOD: D3D11_FLOAT32_MAX,
        };

        let mut sampler = None;
        unsafe { self.device.CreateSamplerState(&desc, Some(&mut sampler)) }
            .map_err(hr("CreateSamplerState"))?;
        sampler.ok_or_else(|| missing("CreateSamplerState"))
    }

    fn create_blend_state(&self, desc: &BlendDesc) -> Result<ID3D11BlendState> {
        let mut native = D3D11_BLEND_DESC::default();
        native.RenderTarget[0] = D3D11_RENDER_TARGET_BLEND_DESC {
            BlendEnable: desc.enabled.into(),
            SrcBlend: blend_factor(desc.color_src),
            DestBlend: blend_factor(desc.color_dst),
            BlendOp: D3D11_BLEND_OP_ADD,
            SrcBlendAlpha: blend_factor(desc.alpha_src),
            DestBlendAlpha: blend_factor(desc.alpha_dst),
            BlendOpAlpha: D3D11_BLEND_OP_ADD,
            RenderTargetWriteMask: D3D11_COLOR_WRITE_ENABLE_ALL.0 as u8,
        };

        let mut state = None;
        unsafe { self.device.CreateBlendState(&native, Some(&mut state)) }
            .map_err(hr("CreateBlendState"))?;
        state.ok_or_else(|| missing("CreateBlendState"))
    }

    fn create_constant_buffer(&self, contents: &[u8]) -> Result<ID3D11Buffer> {
        if contents.is_empty() || contents.len() % 16 != 0 {
            return Err(InteropError::argument(format!(
                "constant buffers must be a non-empty multiple of 16 bytes, got {}",
                contents.len()
            )));
        }
        let desc = D3D11_BUFFER_DESC {
            ByteWidth: contents.len() as u32,
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: D3D11_BIND_CONSTANT_BUFFER.0 as u32,
            CPUAccessFlags: 0,
            MiscFlags: 0,
            StructureByteStride: 0,
        };
        let data = D3D11_SUBRESOURCE_DATA {
            pSysMem: contents.as_ptr() as *const _,
            SysMemPitch: 0,
            SysMemSlicePitch: 0,
        };

        let mut buffer = None;
        unsafe { self.device.CreateBuffer(&desc, Some(&data), Some(&mut buffer)) }
            .map_err(hr("CreateBuffer(constants)"))?;
        buffer.ok_or_else(|| missing("CreateBuffer"))
    }

    fn update_constant_buffer(&self, buffer: &ID3D11Buffer, contents: &[u8]) -> Result<()> {
        let mut desc = D3D11_BUFFER_DESC::default();
        unsafe { buffer.GetDesc(&mut desc) };
        if desc.ByteWidth as usize != contents.len() {
            return Err(InteropError::argument(format!(
                "constant buffer is {} bytes, update is {}",
                desc.ByteWidth,
                contents.len()
            )));
        }
        unsafe {
            self.context
                .UpdateSubresource(buffer, 0, None, contents.as_ptr() as *const _, 0, 0)
        };
        Ok(())
    }

    fn create_composite_pipeline(&self) -> Result<D3D11Pipeline> {
        let vs_bytes = shader::compile("vs_main", "vs_4_0")?;
        let ps_bytes = shader::compile("ps_main", "ps_4_0")?;

        let mut vertex_shader = None;
        let mut pixel_shader = None;
        let mut layout = None;
        unsafe {
            self.device
                .CreateVertexShader(&vs_bytes, None, Some(&mut vertex_shader))
                .map_err(hr("CreateVertexShader"))?;
            self.device
                .CreatePixelShader(&ps_bytes, None, Some(&mut pixel_shader))
                .map_err(hr("CreatePixelShader"))?;

            let elements = [
                D3D11_INPUT_ELEMENT_DESC {
                    SemanticName: s!("POSITION"),
                    SemanticIndex: 0,
                    Format: DXGI_FORMAT_R32G32_FLOAT,
                    InputSlot: 0,
                    AlignedByteOffset: 0,
                    InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                    InstanceDataStepRate: 0,
                },
                D3D11_INPUT_ELEMENT_DESC {
                    SemanticName: s!("TEXCOORD"),
                    SemanticIndex: 0,
                    Format: DXGI_FORMAT_R32G32_FLOAT,
                    InputSlot: 0,
                    AlignedByteOffset: 8,
                    InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                    InstanceDataStepRate: 0,
                },
            ];
            self.device
                .CreateInputLayout(&elements, &vs_bytes, Some(&mut layout))
                .map_err(hr("CreateInputLayout"))?;
        }

        let quad: &[u8] = bytemuck::cast_slice(&FULLSCREEN_QUAD);
        let desc = D3D11_BUFFER_DESC {
            ByteWidth: quad.len() as u32,
            Usage: D3D11_USAGE_IMMUTABLE,
            BindFlags: D3D11_BIND_VERTEX_BUFFER.0 as u32,
            CPUAccessFlags: 0,
            MiscFlags: 0,
            StructureByteStride: 0,
        };
        let data = D3D11_SUBRESOURCE_DATA {
            pSysMem: quad.as_ptr() as *const _,
            SysMemPitch: 0,
            SysMemSlicePitch: 0,
        };
        let mut vertices = None;
        unsafe { self.device.CreateBuffer(&desc, Some(&data), Some(&mut vertices)) }
            .map_err(hr("CreateBuffer(vertices)"))?;

        log::debug!("D3D11Device: composite pipeline compiled");
        Ok(D3D11Pipeline {
            vertex_shader: vertex_shader.ok_or_else(|| missing("CreateVertexShader"))?,
            pixel_shader: pixel_shader.ok_or_else(|| missing("CreatePixelShader"))?,
            layout: layout.ok_or_else(|| missing("CreateInputLayout"))?,
            vertices: vertices.ok_or_else(|| missing("CreateBuffer"))?,
        })
    }

    fn output_bindings(&self) -> D3D11Output {
        let mut targets: [Option<ID3D11RenderTargetView>; 1] = [None];
        let mut depth_stencil = None;
        let mut count = 1u32;
        let mut viewports = [D3D11_VIEWPORT::default()];
        unsafe {
            self.context
                .OMGetRenderTargets(Some(&mut targets), Some(&mut depth_stencil));
            self.context
                .RSGetViewports(&mut count, Some(viewports.as_mut_ptr()));
        }
        let [render_target] = targets;
        D3D11Output {
            render_target,
            depth_stencil,
            viewport: (count > 0).then_some(viewports[0]),
        }
    }

    fn create_deferred_context(&self) -> Result<D3D11DeferredContext> {
        let mut context = None;
        unsafe { self.device.CreateDeferredContext(0, Some(&mut context)) }
            .map_err(hr("CreateDeferredContext"))?;
        Ok(D3D11DeferredContext {
            context: context.ok_or_else(|| missing("CreateDeferredContext"))?,
        })
    }

    fn execute_command_list(&self, list: &ID3D11CommandList) -> Result<()> {
        unsafe { self.context.ExecuteCommandList(list, true) };
        Ok(())
    }

    fn bind_back_buffer(&self, swap_chain: &D3D11SwapChain) -> Result<()> {
        let back_buffer: ID3D11Texture2D =
            unsafe { swap_chain.swap_chain.GetBuffer(0) }.map_err(hr("GetBuffer"))?;
        let mut target = None;
        unsafe { self.device.CreateRenderTargetView(&back_buffer, None, Some(&mut target)) }
            .map_err(hr("CreateRenderTargetView"))?;
        let desc = swap_chain.back_buffer_desc()?;
        unsafe {
            self.context.OMSetRenderTargets(Some(&[target]), None);
            self.context
                .RSSetViewports(Some(&[viewport_for(desc.width, desc.height)]));
        }
        Ok(())
    }

    fn unbind_targets(&self) {
        unsafe {
            self.context.OMSetRenderTargets(None, None);
            self.context.Flush();
        }
    }

    fn clear_target(&self, color: Color) -> Result<()> {
        let D3D11Output { render_target, .. } = self.output_bindings();
        let target = render_target.ok_or_else(|| InteropError::invalid_operation("no render target bound"))?;
        unsafe {
            self.context
                .ClearRenderTargetView(&target, &[color.r, color.g, color.b, color.a])
        };
        Ok(())
    }
}

/// Records state and draws into an `ID3D11CommandList`.
pub struct D3D11DeferredContext {
    context: ID3D11DeviceContext,
}

impl DeferredContext<D3D11Device> for D3D11DeferredContext {
    fn set_pipeline(&mut self, pipeline: &D3D11Pipeline) {
        let stride = std::mem::size_of::<QuadVertex>() as u32;
        let offset = 0u32;
        unsafe {
            self.context.IASetInputLayout(&pipeline.layout);
            self.context
                .IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLESTRIP);
            self.context.IASetVertexBuffers(
                0,
                1,
                Some(&Some(pipeline.vertices.clone())),
                Some(&stride),
                Some(&offset),
            );
            self.context.VSSetShader(&pipeline.vertex_shader, None);
            self.context.PSSetShader(&pipeline.pixel_shader, None);
        }
    }

    fn set_shader_resource(&mut self, slot: u32, view: &ID3D11ShaderResourceView) {
        unsafe { self.context.PSSetShaderResources(slot, Some(&[Some(view.clone())])) };
    }

    fn set_sampler(&mut self, slot: u32, sampler: &ID3D11SamplerState) {
        unsafe { self.context.PSSetSamplers(slot, Some(&[Some(sampler.clone())])) };
    }

    fn set_constant_buffer(&mut self, slot: u32, buffer: &ID3D11Buffer) {
        unsafe {
            self.context
                .PSSetConstantBuffers(slot, Some(&[Some(buffer.clone())]))
        };
    }

    fn set_output(&mut self, output: &D3D11Output) {
        unsafe {
            self.context.OMSetRenderTargets(
                Some(&[output.render_target.clone()]),
                output.depth_stencil.as_ref(),
            );
            if let Some(viewport) = output.viewport {
                self.context.RSSetViewports(Some(&[viewport]));
            }
        }
    }

    fn set_blend_state(&mut self, blend: &ID3D11BlendState) {
        unsafe { self.context.OMSetBlendState(blend, None, 0xffff_ffff) };
    }

    fn draw(&mut self, vertex_count: u32, start_vertex: u32) {
        unsafe { self.context.Draw(vertex_count, start_vertex) };
    }

    fn finish(self) -> Result<ID3D11CommandList> {
        let mut list = None;
        unsafe { self.context.FinishCommandList(false, Some(&mut list)) }
            .map_err(hr("FinishCommandList"))?;
        list.ok_or_else(|| missing("FinishCommandList"))
    }
}

/// DXGI flip-model swap chain.
pub struct D3D11SwapChain {
    swap_chain: IDXGISwapChain1,
    sync_interval: u32,
}

impl D3D11SwapChain {
    pub fn raw(&self) -> &IDXGISwapChain1 {
        &self.swap_chain
    }

    /// `0` presents immediately, `1` waits for vertical blank.
    pub fn set_sync_interval(&mut self, interval: u32) {
        self.sync_interval = interval;
    }
}

impl SwapChain for D3D11SwapChain {
    fn back_buffer_desc(&self) -> Result<TextureDesc> {
        let desc = unsafe { self.swap_chain.GetDesc1() }.map_err(hr("GetDesc1"))?;
        let mut out = TextureDesc::new(desc.Width, desc.Height, from_dxgi(desc.Format)?);
        out.bind = BindFlags::RENDER_TARGET;
        Ok(out)
    }

    fn resize_buffers(&mut self, width: u32, height: u32) -> Result<()> {
        unsafe {
            self.swap_chain
                .ResizeBuffers(0, width, height, DXGI_FORMAT_UNKNOWN, DXGI_SWAP_CHAIN_FLAG(0))
        }
        .map_err(hr("ResizeBuffers"))?;
        log::debug!("D3D11SwapChain: buffers resized to {width}x{height}");
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        unsafe { self.swap_chain.Present(self.sync_interval, DXGI_PRESENT(0)) }
            .ok()
            .map_err(hr("Present"))
    }
}
