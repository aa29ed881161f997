//! Multi-light forward pipeline with omnidirectional shadows
//!
//! Same light loop and blend bracket as [`ForwardPipeline`](super::ForwardPipeline),
//! but each light refreshes a shadow cubemap and is lit in world space.

use super::{
    render_lit_passes, require_elements, shaders, shadow_rendered, CubemapShadowPipeline, Pipeline,
    PipelineCore, SHADOW_CUBE_UNIT,
};
use crate::core::Identity;
use crate::render::api::RenderContext;
use crate::render::primitives::CameraView;
use crate::render::RenderResult;
use crate::scene::RenderList;

/// Forward shading with per-light shadow cubemaps
#[derive(Debug)]
pub struct PointShadowPipeline {
    core: PipelineCore,
    shadow: CubemapShadowPipeline,
}

impl Default for PointShadowPipeline {
    fn default() -> Self {
        Self::new("point shadows")
    }
}

impl PointShadowPipeline {
    /// Create an unbuilt pipeline
    pub fn new(name: &str) -> Self {
        Self {
            core: PipelineCore::new(name),
            shadow: CubemapShadowPipeline::new(&format!("{} cubemap", name)),
        }
    }

    /// Embedded shadow stage
    pub fn shadow_pipeline(&self) -> &CubemapShadowPipeline {
        &self.shadow
    }

    /// Render `list` as seen from `camera`
    pub fn render(&mut self, ctx: &mut RenderContext<'_>, camera: &CameraView, list: &RenderList<'_>) -> RenderResult<()> {
        require_elements(list, self.core.name())?;

        self.begin(ctx);
        self.prepare(ctx)?;

        self.core.bind_program(ctx)?;
        camera.bind(ctx);
        let view = camera.view_matrix();
        let far_plane = ctx.settings.far_plane;

        let Self { core, shadow } = self;
        render_lit_passes(core, ctx, &view, list, |ctx, light_elem, light| {
            let shadowed = shadow_rendered(shadow.render(ctx, light_elem, list), light_elem);

            core.bind_program(ctx)?;
            light.apply(ctx, light_elem.world_matrix());
            ctx.set_mat4("invViewMat", camera.world);
            ctx.set_float("farPlane", far_plane);
            if shadowed {
                shadow.shadow_map().bind(ctx, SHADOW_CUBE_UNIT)?;
            }
            Ok(())
        })
    }
}

impl Pipeline for PointShadowPipeline {
    fn core(&self) -> &PipelineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PipelineCore {
        &mut self.core
    }

    fn build(&mut self, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        self.core.build_program(ctx, &shaders::POINT_SHADOW)
    }

    fn release_targets(&mut self, ctx: &mut RenderContext<'_>) {
        self.shadow.free(ctx);
    }
}
