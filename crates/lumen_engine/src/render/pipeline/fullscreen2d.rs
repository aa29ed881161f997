//! Fullscreen texture blit
//!
//! Draws a texture over the whole default framebuffer with a single
//! oversized triangle. Used to present the ray tracer's output.

use super::{shaders, Pipeline, PipelineCore};
use crate::render::api::RenderContext;
use crate::render::resources::Texture;
use crate::render::{RenderError, RenderResult};

/// Texture-to-screen pass
#[derive(Debug)]
pub struct Fullscreen2dPipeline {
    core: PipelineCore,
}

impl Default for Fullscreen2dPipeline {
    fn default() -> Self {
        Self::new("fullscreen 2d")
    }
}

impl Fullscreen2dPipeline {
    /// Create an unbuilt pipeline
    pub fn new(name: &str) -> Self {
        Self { core: PipelineCore::new(name) }
    }

    /// Draw `texture` over the default framebuffer
    pub fn render(&mut self, ctx: &mut RenderContext<'_>, texture: &Texture) -> RenderResult<()> {
        if texture.handle(ctx.registry).is_none() {
            log::error!("Invalid params: texture not allocated");
            return Err(RenderError::InvalidParams("fullscreen source texture is not allocated".to_string()));
        }

        self.begin(ctx);
        self.prepare(ctx)?;

        self.core.bind_program(ctx)?;
        texture.bind(ctx, 0)?;

        ctx.reset_framebuffer();
        ctx.backend.draw_fullscreen_triangle();
        Ok(())
    }
}

impl Pipeline for Fullscreen2dPipeline {
    fn core(&self) -> &PipelineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PipelineCore {
        &mut self.core
    }

    fn build(&mut self, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        self.core.build_program(ctx, &shaders::FULLSCREEN_2D)
    }
}
