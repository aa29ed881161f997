//! Multi-light forward pipeline
//!
//! One pass over the meshes per light. The first light overwrites the
//! framebuffer; every further light is added on top, bracketed by a single
//! enable/disable of additive blending around the loop. Each light first
//! refreshes its shadow map through the embedded shadow pipeline.

use super::{
    render_lit_passes, require_elements, shaders, shadow_rendered, Pipeline, PipelineCore,
    ShadowMappingPipeline, SHADOW_MAP_UNIT,
};
use crate::core::Identity;
use crate::foundation::math::utils;
use crate::render::api::RenderContext;
use crate::render::primitives::CameraView;
use crate::render::RenderResult;
use crate::scene::RenderList;

/// Forward shading with per-light shadow maps
#[derive(Debug)]
pub struct ForwardPipeline {
    core: PipelineCore,
    shadow: ShadowMappingPipeline,
}

impl Default for ForwardPipeline {
    fn default() -> Self {
        Self::new("forward")
    }
}

impl ForwardPipeline {
    /// Create an unbuilt pipeline
    pub fn new(name: &str) -> Self {
        Self {
            core: PipelineCore::new(name),
            shadow: ShadowMappingPipeline::new(&format!("{} shadows", name)),
        }
    }

    /// Embedded shadow stage
    pub fn shadow_pipeline(&self) -> &ShadowMappingPipeline {
        &self.shadow
    }

    /// Render `list` as seen from `camera`
    ///
    /// An empty list is rejected before any GPU state is touched. A light
    /// whose shadow pass fails is still rendered, without shadows.
    pub fn render(&mut self, ctx: &mut RenderContext<'_>, camera: &CameraView, list: &RenderList<'_>) -> RenderResult<()> {
        require_elements(list, self.core.name())?;

        self.begin(ctx);
        self.prepare(ctx)?;

        self.core.bind_program(ctx)?;
        camera.bind(ctx);
        let view = camera.view_matrix();

        let Self { core, shadow } = self;
        render_lit_passes(core, ctx, &view, list, |ctx, light_elem, light| {
            let shadowed = shadow_rendered(shadow.render(ctx, light_elem, list), light_elem);

            core.bind_program(ctx)?;
            light.apply(ctx, &(view * light_elem.world_matrix()));

            // View space back to world, then into the light's clip space
            let light_view = utils::inverse_or_identity(light_elem.world_matrix());
            ctx.set_mat4("lightMatrix", light.projection() * light_view * camera.world);
            if shadowed {
                shadow.shadow_map().bind(ctx, SHADOW_MAP_UNIT)?;
            }
            Ok(())
        })
    }
}

impl Pipeline for ForwardPipeline {
    fn core(&self) -> &PipelineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PipelineCore {
        &mut self.core
    }

    fn build(&mut self, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        self.core.build_program(ctx, &shaders::FORWARD)
    }

    fn release_targets(&mut self, ctx: &mut RenderContext<'_>) {
        self.shadow.free(ctx);
    }
}
