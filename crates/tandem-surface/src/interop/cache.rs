use crate::device::{DeferredContext, OwnerDevice, QUAD_VERTEX_COUNT};
use crate::error::Result;

/// Lazily built, replayable command list.
///
/// Absent until the first [`ensure_built`](Self::ensure_built), and again
/// after [`invalidate`](Self::invalidate). A failed build leaves it absent.
#[derive(Debug)]
pub struct CommandCache<L> {
    list: Option<L>,
    builds: u64,
}

impl<L> Default for CommandCache<L> {
    fn default() -> Self {
        Self {
            list: None,
            builds: 0,
        }
    }
}

impl<L> CommandCache<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached list, building it with `build` if absent.
    pub fn ensure_built(&mut self, build: impl FnOnce() -> Result<L>) -> Result<&L> {
        let list = match self.list.take() {
            Some(list) => list,
            None => {
                let list = build()?;
                self.builds += 1;
                log::debug!("CommandCache: recorded composite list (build #{})", self.builds);
                list
            }
        };
        Ok(self.list.insert(list))
    }

    /// Drops the cached list. Returns whether one was present.
    pub fn invalidate(&mut self) -> bool {
        self.list.take().is_some()
    }

    #[inline]
    pub fn get(&self) -> Option<&L> {
        self.list.as_ref()
    }

    #[inline]
    pub fn is_built(&self) -> bool {
        self.list.is_some()
    }

    /// Number of successful builds over the cache's lifetime.
    #[inline]
    pub fn builds(&self) -> u64 {
        self.builds
    }
}

/// Records the composite pass on a deferred context of `owner`.
///
/// The output bindings (render target, depth-stencil, viewport) are copied
/// from the owner's immediate context as they are right now.
pub fn record_composite<D: OwnerDevice>(
    owner: &D,
    pipeline: &D::Pipeline,
    view: &D::ShaderResourceView,
    sampler: &D::Sampler,
    constants: &D::Buffer,
    blend: &D::BlendState,
) -> Result<D::CommandList> {
    let mut ctx = owner.create_deferred_context()?;
    ctx.set_pipeline(pipeline);
    ctx.set_shader_resource(0, view);
    ctx.set_sampler(0, sampler);
    ctx.set_constant_buffer(0, constants);
    ctx.set_output(&owner.output_bindings());
    ctx.set_blend_state(blend);
    ctx.draw(QUAD_VERTEX_COUNT, 0);
    ctx.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InteropError, ResultCode};

    #[test]
    fn builds_once_until_invalidated() {
        let mut cache = CommandCache::new();
        let mut calls = 0;

        for _ in 0..3 {
            let list = cache
                .ensure_built(|| {
                    calls += 1;
                    Ok(calls)
                })
                .unwrap();
            assert_eq!(*list, 1);
        }
        assert_eq!((calls, cache.builds()), (1, 1));

        assert!(cache.invalidate());
        assert!(!cache.invalidate());
        assert_eq!(*cache.ensure_built(|| Ok(7)).unwrap(), 7);
        assert_eq!(cache.builds(), 2);
    }

    #[test]
    fn failed_build_caches_nothing() {
        let mut cache: CommandCache<u32> = CommandCache::new();
        let err = cache
            .ensure_built(|| Err(InteropError::graphics(ResultCode::E_FAIL, "FinishCommandList")))
            .unwrap_err();
        assert_eq!(err.code(), Some(ResultCode::E_FAIL));
        assert!(!cache.is_built());
        assert_eq!(cache.builds(), 0);
    }
}
