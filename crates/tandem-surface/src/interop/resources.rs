use crate::device::{
    BlendDesc, CompositeConstants, GuestDevice, OwnerDevice, Platform, ShaderResourceViewDesc,
};
use crate::error::Result;

use super::{
    BlendState, Buffer, Guest, Owner, Pipeline, RenderTarget, Sampler, ShaderView, SharedSurface,
    SurfaceConfig,
};

/// Objects that survive surface reallocation: the composite pipeline and
/// its constant buffer.
pub struct IndependentResources<P: Platform> {
    pub(crate) pipeline: Pipeline<P>,
    pub(crate) constants: Buffer<P>,
}

impl<P: Platform> IndependentResources<P> {
    pub fn create(owner: &Owner<P>, config: &SurfaceConfig) -> Result<Self> {
        let pipeline = owner.create_composite_pipeline()?;
        let constants = owner.create_constant_buffer(CompositeConstants::new(config.opacity).as_bytes())?;
        Ok(Self {
            pipeline,
            constants,
        })
    }

    pub fn pipeline(&self) -> &Pipeline<P> {
        &self.pipeline
    }

    pub fn constants(&self) -> &Buffer<P> {
        &self.constants
    }

    /// Rewrites the constant buffer in place.
    pub fn set_opacity(&self, owner: &Owner<P>, opacity: f32) -> Result<()> {
        owner.update_constant_buffer(&self.constants, CompositeConstants::new(opacity).as_bytes())
    }
}

/// Per-device objects derived from the current shared surface.
///
/// Invalid as soon as the surface is reallocated.
pub struct DeviceResources<P: Platform> {
    pub(crate) view: Option<ShaderView<P>>,
    pub(crate) sampler: Sampler<P>,
    pub(crate) blend: BlendState<P>,
    pub(crate) guest_target: RenderTarget<P>,
}

impl<P: Platform> DeviceResources<P> {
    /// Creates the set for `shared`, including its shader-resource view.
    pub fn create(
        owner: &Owner<P>,
        guest: &Guest<P>,
        shared: &SharedSurface<P>,
        config: &SurfaceConfig,
    ) -> Result<Self> {
        let guest_target = guest.create_render_target(shared.guest_surface())?;
        let sampler = owner.create_sampler(config.sampler)?;
        let blend = owner.create_blend_state(&BlendDesc::PREMULTIPLIED_OVER)?;
        let view = create_view::<P>(owner, shared)?;
        Ok(Self {
            view: Some(view),
            sampler,
            blend,
            guest_target,
        })
    }

    pub fn view(&self) -> Option<&ShaderView<P>> {
        self.view.as_ref()
    }

    pub fn sampler(&self) -> &Sampler<P> {
        &self.sampler
    }

    pub fn blend(&self) -> &BlendState<P> {
        &self.blend
    }

    pub fn guest_target(&self) -> &RenderTarget<P> {
        &self.guest_target
    }
}

/// Shader-resource view over the whole surface in its own format.
pub(crate) fn create_view<P: Platform>(owner: &Owner<P>, shared: &SharedSurface<P>) -> Result<ShaderView<P>> {
    let desc = owner.texture_desc(shared.texture());
    owner.create_shader_resource_view(shared.texture(), &ShaderResourceViewDesc::for_texture(&desc))
}
