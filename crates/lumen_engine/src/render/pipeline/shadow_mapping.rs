//! Directional/spot shadow map pass
//!
//! Renders the mesh segment of a render list from a light's point of view
//! into a square depth texture. Front faces are culled while filling the map
//! to keep self-shadowing acne down.

use super::{shaders, Pipeline, PipelineCore};
use crate::core::Identity;
use crate::foundation::math::utils;
use crate::render::api::{ClearFlags, CullMode, RenderContext, TextureDesc, TextureFormat};
use crate::render::resources::{Framebuffer, Texture};
use crate::render::{RenderError, RenderResult};
use crate::scene::{RenderList, RenderPass, RenderableElem};

/// Depth-only pass from one light
#[derive(Debug)]
pub struct ShadowMappingPipeline {
    core: PipelineCore,
    depth_map: Texture,
    fbo: Framebuffer,
}

impl Default for ShadowMappingPipeline {
    fn default() -> Self {
        Self::new("shadow mapping")
    }
}

impl ShadowMappingPipeline {
    /// Create an unbuilt pipeline
    pub fn new(name: &str) -> Self {
        Self {
            core: PipelineCore::new(name),
            depth_map: Texture::new(&format!("{} depth map", name)),
            fbo: Framebuffer::new(&format!("{} fbo", name)),
        }
    }

    /// Depth texture written by the last pass
    pub fn shadow_map(&self) -> &Texture {
        &self.depth_map
    }

    /// Render the meshes of `list` from the light in `light_elem`
    pub fn render(
        &mut self,
        ctx: &mut RenderContext<'_>,
        light_elem: &RenderableElem<'_>,
        list: &RenderList<'_>,
    ) -> RenderResult<()> {
        let Some(light) = light_elem.light() else {
            log::error!("Invalid params: '{}' is not a light", light_elem.node().name());
            return Err(RenderError::InvalidParams(format!(
                "'{}' is not a light",
                light_elem.node().name()
            )));
        };

        self.begin(ctx);
        self.prepare(ctx)?;

        self.core.bind_program(ctx)?;
        ctx.set_mat4("projectionMat", *light.projection());

        self.fbo.bind(ctx)?;
        ctx.backend.clear(ClearFlags::DEPTH, [1.0; 4]);
        ctx.backend.set_color_mask(false);
        ctx.backend.set_cull_mode(CullMode::Front);

        let view = utils::inverse_or_identity(light_elem.world_matrix());
        let result = list.render(ctx, &view, RenderPass::Meshes);

        ctx.backend.set_cull_mode(CullMode::Back);
        ctx.backend.set_color_mask(true);
        ctx.reset_framebuffer();
        result
    }
}

impl Pipeline for ShadowMappingPipeline {
    fn core(&self) -> &PipelineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PipelineCore {
        &mut self.core
    }

    fn build(&mut self, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        self.core.build_program(ctx, &shaders::SHADOW_MAPPING)?;

        let size = ctx.settings.shadow_map_size;
        self.depth_map
            .create(ctx, TextureDesc::texture_2d(size, size, TextureFormat::Depth))?;
        self.fbo.create(ctx, &[], Some(&self.depth_map))?;
        self.fbo.validate(ctx)?;

        log::debug!("Shadow map '{}' is {}x{}", self.core.name(), size, size);
        Ok(())
    }

    fn release_targets(&mut self, ctx: &mut RenderContext<'_>) {
        self.fbo.free(ctx);
        self.depth_map.free(ctx);
    }
}
