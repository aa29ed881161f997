//! Deferred pipeline
//!
//! Composes three owned stages in a fixed order:
//!
//! ```text
//! GeometryPipeline ──G-buffer──┐
//!                              ├──▶ LightingPipeline ──▶ default framebuffer
//! ShadowMappingPipeline ─map───┘    (light 0 only)
//! ```

use super::{
    require_elements, shaders, shadow_rendered, GeometryPipeline, LightingPipeline, Pipeline,
    PipelineCore, ShadowMappingPipeline,
};
use crate::core::Identity;
use crate::render::api::RenderContext;
use crate::render::primitives::CameraView;
use crate::render::{RenderError, RenderResult};
use crate::scene::RenderList;

/// Geometry, shadow and fullscreen lighting stages
#[derive(Debug)]
pub struct DeferredPipeline {
    core: PipelineCore,
    geometry: GeometryPipeline,
    shadow: ShadowMappingPipeline,
    lighting: LightingPipeline,
}

impl Default for DeferredPipeline {
    fn default() -> Self {
        Self::new("deferred")
    }
}

impl DeferredPipeline {
    /// Create an unbuilt pipeline
    pub fn new(name: &str) -> Self {
        Self {
            core: PipelineCore::new(name),
            geometry: GeometryPipeline::new(&format!("{} geometry", name)),
            shadow: ShadowMappingPipeline::new(&format!("{} shadows", name)),
            lighting: LightingPipeline::new(&format!("{} lighting", name)),
        }
    }

    /// G-buffer stage
    pub fn geometry(&self) -> &GeometryPipeline {
        &self.geometry
    }

    /// Shadow stage
    pub fn shadow_pipeline(&self) -> &ShadowMappingPipeline {
        &self.shadow
    }

    /// Lighting stage
    pub fn lighting(&self) -> &LightingPipeline {
        &self.lighting
    }

    /// Render `list` as seen from `camera`, lit by its first light
    pub fn render(&mut self, ctx: &mut RenderContext<'_>, camera: &CameraView, list: &RenderList<'_>) -> RenderResult<()> {
        require_elements(list, self.core.name())?;
        let Some(light_elem) = list.lights().first() else {
            log::error!("Pipeline '{}': invalid params (no light)", self.core.name());
            return Err(RenderError::InvalidParams(format!("'{}' needs at least one light", self.core.name())));
        };

        self.begin(ctx);
        self.prepare(ctx)?;

        self.core.bind_program(ctx)?;
        camera.bind(ctx);
        let view = camera.view_matrix();

        self.core.begin_wireframe(ctx);
        let result = self.geometry.render(ctx, &view, list);
        self.core.end_wireframe(ctx);
        result?;

        let shadowed = shadow_rendered(self.shadow.render(ctx, light_elem, list), light_elem);

        let shadow_map = shadowed.then(|| self.shadow.shadow_map());
        self.lighting
            .render(ctx, &self.geometry.targets(), shadow_map, light_elem)
    }

    /// Re-arm the lazy build of every stage, e.g. after a resize
    pub fn mark_all_dirty(&mut self) {
        self.mark_dirty();
        self.geometry.mark_dirty();
        self.shadow.mark_dirty();
        self.lighting.mark_dirty();
    }
}

impl Pipeline for DeferredPipeline {
    fn core(&self) -> &PipelineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PipelineCore {
        &mut self.core
    }

    fn build(&mut self, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        self.core.build_program(ctx, &shaders::DEFERRED)
    }

    fn release_targets(&mut self, ctx: &mut RenderContext<'_>) {
        self.lighting.free(ctx);
        self.shadow.free(ctx);
        self.geometry.free(ctx);
    }
}
