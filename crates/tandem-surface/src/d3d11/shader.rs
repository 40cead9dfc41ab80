use std::ffi::CString;

use windows::Win32::Graphics::Direct3D::Fxc::{D3DCompile, D3DCOMPILE_ENABLE_STRICTNESS};
use windows::Win32::Graphics::Direct3D::ID3DBlob;
use windows::core::PCSTR;

use crate::error::{InteropError, Result, ResultCode};

/// Textured full-screen quad. Opacity scales the premultiplied sample.
pub(crate) const COMPOSITE_HLSL: &str = r#"
cbuffer Composite : register(b0)
{
    float opacity;
    float3 _pad;
};

Texture2D surface_tex : register(t0);
SamplerState surface_sampler : register(s0);

struct VsIn
{
    float2 pos : POSITION;
    float2 uv : TEXCOORD0;
};

struct VsOut
{
    float4 pos : SV_POSITION;
    float2 uv : TEXCOORD0;
};

VsOut vs_main(VsIn input)
{
    VsOut output;
    output.pos = float4(input.pos, 0.0, 1.0);
    output.uv = input.uv;
    return output;
}

float4 ps_main(VsOut input) : SV_TARGET
{
    return surface_tex.Sample(surface_sampler, input.uv) * opacity;
}
"#;

/// Compiles one entry point of [`COMPOSITE_HLSL`] and returns its bytecode.
pub(crate) fn compile(entry_point: &str, target: &str) -> Result<Vec<u8>> {
    let entry = CString::new(entry_point).map_err(|e| InteropError::argument(e.to_string()))?;
    let target = CString::new(target).map_err(|e| InteropError::argument(e.to_string()))?;

    let mut blob: Option<ID3DBlob> = None;
    let mut errors: Option<ID3DBlob> = None;
    let compiled = unsafe {
        D3DCompile(
            COMPOSITE_HLSL.as_ptr() as *const _,
            COMPOSITE_HLSL.len(),
            None,
            None,
            None,
            PCSTR(entry.as_ptr() as *const u8),
            PCSTR(target.as_ptr() as *const u8),
            D3DCOMPILE_ENABLE_STRICTNESS,
            0,
            &mut blob,
            Some(&mut errors),
        )
    };

    if let Err(e) = compiled {
        let log = errors.map(|b| String::from_utf8_lossy(blob_bytes(&b)).into_owned());
        return Err(InteropError::graphics(
            ResultCode(e.code().0),
            format!("D3DCompile {entry_point}: {}", log.unwrap_or_else(|| e.to_string())),
        ));
    }
    let blob = blob.ok_or_else(|| super::missing("D3DCompile"))?;
    Ok(blob_bytes(&blob).to_vec())
}

fn blob_bytes(blob: &ID3DBlob) -> &[u8] {
    unsafe { std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()) }
}
