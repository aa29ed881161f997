//! Rendering pipelines
//!
//! A pipeline is a self-contained render pass: a program, the targets it
//! renders into, the sub-pipelines it drives, and a lazy build that turns
//! all of that into GPU objects the first time the pass is used.
//!
//! ## Lifecycle
//!
//! ```text
//! Unbuilt (dirty, unregistered)
//!     │ prepare(): init + build step
//!     ▼
//! Built (clean, registered) ──mark_dirty()──▶ rebuilt on next prepare()
//!     │ free()
//!     ▼
//! Released (dirty flag untouched)
//! ```
//!
//! A failed build step leaves the pipeline registered and dirty, so the next
//! frame retries the build step alone.
//!
//! ## Composition
//!
//! Composite pipelines own their stages by value and read their outputs
//! through narrow accessors ([`ShadowMappingPipeline::shadow_map`],
//! [`GeometryPipeline::targets`], [`RayTracingPipeline::color_buffer`]).

pub mod shaders;

mod cubemap;
mod deferred;
mod forward;
mod fullscreen2d;
mod fullscreen_lighting;
mod geometry;
mod point_shadows;
mod raytracing;
mod shadow_mapping;

#[cfg(test)]
mod pipeline_tests;

pub use cubemap::CubemapShadowPipeline;
pub use deferred::DeferredPipeline;
pub use forward::ForwardPipeline;
pub use fullscreen2d::Fullscreen2dPipeline;
pub use fullscreen_lighting::LightingPipeline;
pub use geometry::{GBufferTargets, GeometryPipeline};
pub use point_shadows::PointShadowPipeline;
pub use raytracing::{GpuBSphere, GpuLight, GpuTriangle, MigratedScene, RayTracingPipeline};
pub use shadow_mapping::ShadowMappingPipeline;

use crate::core::{Entity, EntityId, Identity};
use crate::foundation::math::Mat4;
use crate::render::api::{BlendMode, PolygonMode, RenderContext, ShaderSource};
use crate::render::primitives::Light;
use crate::render::resources::{ManagedState, Program, ResourceKind, ResourceRegistry};
use crate::render::{RenderError, RenderResult};
use crate::scene::{RenderList, RenderPass, RenderableElem};

/// Sampler unit of a 2D shadow map
pub const SHADOW_MAP_UNIT: u32 = 3;

/// Sampler unit of a shadow cubemap
pub const SHADOW_CUBE_UNIT: u32 = 4;

/// State shared by every pipeline
#[derive(Debug)]
pub struct PipelineCore {
    entity: Entity,
    managed: ManagedState,
    program: Program,
    wireframe: bool,
    build_count: usize,
}

impl PipelineCore {
    /// Fresh, dirty, unregistered pipeline state
    pub fn new(name: &str) -> Self {
        Self {
            entity: Entity::named(name),
            managed: ManagedState::new(),
            program: Program::new(name),
            wireframe: false,
            build_count: 0,
        }
    }

    /// Pipeline program
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Compile and link the pipeline program
    pub fn build_program(&mut self, ctx: &mut RenderContext<'_>, stages: &[ShaderSource]) -> RenderResult<()> {
        self.program.build(ctx, stages)
    }

    /// Make the pipeline program current
    pub fn bind_program(&self, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        self.program.bind(ctx)
    }

    /// Whether the pipeline is registered
    pub fn is_initialized(&self, registry: &ResourceRegistry) -> bool {
        self.managed.is_initialized(registry)
    }

    /// Number of successful build steps so far
    pub fn build_count(&self) -> usize {
        self.build_count
    }

    /// Whether passes draw in wireframe
    pub fn is_wireframe(&self) -> bool {
        self.wireframe
    }

    /// Switch the rasterizer to lines for this pipeline's passes
    pub fn set_wireframe(&mut self, wireframe: bool) {
        self.wireframe = wireframe;
    }

    /// Enter wireframe mode if enabled
    pub(crate) fn begin_wireframe(&self, ctx: &mut RenderContext<'_>) {
        if self.wireframe {
            ctx.backend.set_polygon_mode(PolygonMode::Line);
        }
    }

    /// Leave wireframe mode if it was entered
    pub(crate) fn end_wireframe(&self, ctx: &mut RenderContext<'_>) {
        if self.wireframe {
            ctx.backend.set_polygon_mode(PolygonMode::Fill);
        }
    }
}

impl Identity for PipelineCore {
    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }
}

/// Lazily built render pass
///
/// Implementors provide the build step and release their own targets;
/// registration, the dirty flag and the program are handled here.
pub trait Pipeline {
    /// Shared pipeline state
    fn core(&self) -> &PipelineCore;

    /// Mutable shared pipeline state
    fn core_mut(&mut self) -> &mut PipelineCore;

    /// Build the program and allocate targets
    ///
    /// Called by [`Pipeline::prepare`] while the pipeline is dirty.
    fn build(&mut self, ctx: &mut RenderContext<'_>) -> RenderResult<()>;

    /// Release targets and sub-pipelines owned by the implementor
    fn release_targets(&mut self, _ctx: &mut RenderContext<'_>) {}

    /// Register the pipeline
    ///
    /// Fails if it is already registered.
    fn init(&mut self, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        let core = self.core_mut();
        let label = core.entity.name().to_string();
        core.managed.init(ctx.registry, &label, ResourceKind::Pipeline)?;
        Ok(())
    }

    /// Run the build step if the pipeline is dirty
    ///
    /// On failure the pipeline stays dirty and the error is returned, so the
    /// caller skips its pass and the next call tries again.
    fn prepare(&mut self, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        if !self.core().is_dirty() {
            return Ok(());
        }
        if !self.core().is_initialized(ctx.registry) {
            self.init(ctx)?;
        }

        match self.build(ctx) {
            Ok(()) => {
                let core = self.core_mut();
                core.set_dirty(false);
                core.build_count += 1;
                log::debug!("Pipeline '{}' built", core.name());
                Ok(())
            }
            Err(e) => {
                log::error!("Unable to build pipeline '{}': {}", self.core().name(), e);
                Err(e)
            }
        }
    }

    /// Record this pipeline as the frame's last pipeline
    fn begin(&self, ctx: &mut RenderContext<'_>) {
        ctx.frame.record_pipeline(self.core().id());
    }

    /// Release the program, the targets and the registration
    ///
    /// Does not touch the dirty flag; see [`Pipeline::mark_dirty`].
    fn free(&mut self, ctx: &mut RenderContext<'_>) -> bool {
        self.release_targets(ctx);
        let core = self.core_mut();
        core.program.free(ctx);
        core.managed.free(ctx.registry, &mut *ctx.backend)
    }

    /// Request a rebuild on next use
    fn mark_dirty(&mut self) {
        self.core_mut().set_dirty(true);
    }

    /// Whether a build step is pending
    fn is_dirty(&self) -> bool {
        self.core().is_dirty()
    }

    /// Entity id of the pipeline
    fn id(&self) -> EntityId {
        self.core().id()
    }

    /// Number of successful build steps so far
    fn build_count(&self) -> usize {
        self.core().build_count()
    }

    /// Draw passes as lines instead of filled polygons
    fn set_wireframe(&mut self, wireframe: bool) {
        self.core_mut().set_wireframe(wireframe);
    }

    /// Whether passes draw as lines
    fn is_wireframe(&self) -> bool {
        self.core().is_wireframe()
    }
}

/// Reject an empty render list before any GPU state is touched
pub(crate) fn require_elements(list: &RenderList<'_>, pipeline: &str) -> RenderResult<()> {
    if list.is_empty() {
        log::error!("Pipeline '{}': invalid params (empty render list)", pipeline);
        return Err(RenderError::InvalidParams(format!("'{}' got an empty render list", pipeline)));
    }
    Ok(())
}

/// Light loop of the multi-light forward techniques
///
/// `light_pass` sets up one light, then the meshes are drawn with it. The
/// first light overwrites the target and later lights are blended on top.
/// Blending and wireframe are switched back off on every exit, including a
/// light that fails part-way through the loop.
pub(crate) fn render_lit_passes<'s>(
    core: &PipelineCore,
    ctx: &mut RenderContext<'_>,
    view: &Mat4,
    list: &RenderList<'s>,
    mut light_pass: impl FnMut(&mut RenderContext<'_>, &RenderableElem<'s>, &Light) -> RenderResult<()>,
) -> RenderResult<()> {
    core.begin_wireframe(ctx);
    let mut blending = false;
    let mut result = Ok(());
    for (index, light_elem) in list.lights().iter().enumerate() {
        let Some(light) = light_elem.light() else {
            continue;
        };
        if index == 1 {
            ctx.backend.set_blend_mode(BlendMode::Additive);
            blending = true;
        }

        result = light_pass(ctx, light_elem, light).and_then(|()| list.render(ctx, view, RenderPass::Meshes));
        if result.is_err() {
            break;
        }
    }
    if blending {
        ctx.backend.set_blend_mode(BlendMode::Disabled);
    }
    core.end_wireframe(ctx);
    result
}

/// Whether a light's shadow pass succeeded; a failure is logged and the
/// light is lit without shadows
pub(crate) fn shadow_rendered(result: RenderResult<()>, light_elem: &RenderableElem<'_>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Light '{}' rendered without shadow: {}", light_elem.node().name(), e);
            false
        }
    }
}
