//! Deferred lighting pass
//!
//! Samples the G-buffer and a shadow map and shades one light over a
//! fullscreen triangle into the default framebuffer. Everything is computed
//! in the view space the G-buffer was written in, using the frame's last
//! bound camera.

use super::{shaders, GBufferTargets, Pipeline, PipelineCore, SHADOW_MAP_UNIT};
use crate::core::Identity;
use crate::foundation::math::utils;
use crate::render::api::RenderContext;
use crate::render::resources::Texture;
use crate::render::{RenderError, RenderResult};
use crate::scene::RenderableElem;

/// Fullscreen lighting stage
#[derive(Debug)]
pub struct LightingPipeline {
    core: PipelineCore,
}

impl Default for LightingPipeline {
    fn default() -> Self {
        Self::new("fullscreen lighting")
    }
}

impl LightingPipeline {
    /// Create an unbuilt pipeline
    pub fn new(name: &str) -> Self {
        Self { core: PipelineCore::new(name) }
    }

    /// Shade `light_elem` over the G-buffer
    ///
    /// Without a shadow map the light is applied unshadowed.
    pub fn render(
        &mut self,
        ctx: &mut RenderContext<'_>,
        gbuffer: &GBufferTargets<'_>,
        shadow_map: Option<&Texture>,
        light_elem: &RenderableElem<'_>,
    ) -> RenderResult<()> {
        let Some(light) = light_elem.light() else {
            log::error!("Invalid params: '{}' is not a light", light_elem.node().name());
            return Err(RenderError::InvalidParams(format!(
                "'{}' is not a light",
                light_elem.node().name()
            )));
        };
        let Some(camera) = ctx.frame.last_camera().cloned() else {
            log::error!("Lighting pass needs a bound camera");
            return Err(RenderError::MissingCamera);
        };

        self.begin(ctx);
        self.prepare(ctx)?;

        self.core.bind_program(ctx)?;
        gbuffer.position.bind(ctx, 0)?;
        gbuffer.normal.bind(ctx, 1)?;
        gbuffer.material.bind(ctx, 2)?;
        if let Some(shadow_map) = shadow_map {
            shadow_map.bind(ctx, SHADOW_MAP_UNIT)?;
        }

        let view = camera.view_matrix();
        let light_world = light_elem.world_matrix();
        ctx.set_vec3("camPos", utils::translation_of(&(view * camera.world)));
        ctx.set_vec3("lightPos", utils::translation_of(&(view * light_world)));
        ctx.set_vec3("lightCol", light.color());

        let light_view = utils::inverse_or_identity(light_world);
        ctx.set_mat4("lightMatrix", light.projection() * light_view * camera.world);

        ctx.reset_framebuffer();
        ctx.backend.draw_fullscreen_triangle();
        Ok(())
    }
}

impl Pipeline for LightingPipeline {
    fn core(&self) -> &PipelineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PipelineCore {
        &mut self.core
    }

    fn build(&mut self, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        self.core.build_program(ctx, &shaders::LIGHTING)
    }
}
