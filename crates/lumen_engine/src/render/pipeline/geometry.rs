//! G-buffer pass
//!
//! First stage of deferred shading: rasterizes the mesh segment of a render
//! list into view-space position, normal and material targets plus a depth
//! buffer, all at surface size.
//!
//! | Target   | Format      | Contents                    |
//! |----------|-------------|-----------------------------|
//! | position | RGB float   | view-space position         |
//! | normal   | RGBA float  | view-space normal, roughness|
//! | material | RGBA float  | albedo, metalness           |
//! | depth    | depth       | depth test only             |

use super::{require_elements, shaders, Pipeline, PipelineCore};
use crate::core::Identity;
use crate::foundation::math::Mat4;
use crate::render::api::{ClearFlags, RenderContext, TextureDesc, TextureFormat};
use crate::render::resources::{Framebuffer, Texture};
use crate::render::{RenderError, RenderResult};
use crate::scene::{RenderList, RenderPass};

/// Read-only view of the G-buffer for the next stage
#[derive(Debug, Clone, Copy)]
pub struct GBufferTargets<'a> {
    /// View-space positions
    pub position: &'a Texture,
    /// View-space normals with roughness in alpha
    pub normal: &'a Texture,
    /// Albedo with metalness in alpha
    pub material: &'a Texture,
    /// Depth buffer
    pub depth: &'a Texture,
}

/// G-buffer fill pass
#[derive(Debug)]
pub struct GeometryPipeline {
    core: PipelineCore,
    position: Texture,
    normal: Texture,
    material: Texture,
    depth: Texture,
    fbo: Framebuffer,
}

impl Default for GeometryPipeline {
    fn default() -> Self {
        Self::new("geometry")
    }
}

impl GeometryPipeline {
    /// Create an unbuilt pipeline
    pub fn new(name: &str) -> Self {
        Self {
            core: PipelineCore::new(name),
            position: Texture::new(&format!("{} position", name)),
            normal: Texture::new(&format!("{} normal", name)),
            material: Texture::new(&format!("{} material", name)),
            depth: Texture::new(&format!("{} depth", name)),
            fbo: Framebuffer::new(&format!("{} fbo", name)),
        }
    }

    /// Targets written by the last pass
    pub fn targets(&self) -> GBufferTargets<'_> {
        GBufferTargets {
            position: &self.position,
            normal: &self.normal,
            material: &self.material,
            depth: &self.depth,
        }
    }

    /// Fill the G-buffer with the meshes of `list`
    ///
    /// Uses the projection of the frame's last bound camera.
    pub fn render(&mut self, ctx: &mut RenderContext<'_>, view: &Mat4, list: &RenderList<'_>) -> RenderResult<()> {
        require_elements(list, self.core.name())?;
        let Some(projection) = ctx.frame.last_camera().map(|camera| camera.projection) else {
            log::error!("Geometry pass needs a bound camera");
            return Err(RenderError::MissingCamera);
        };

        self.begin(ctx);
        self.prepare(ctx)?;

        self.core.bind_program(ctx)?;
        ctx.set_mat4("projectionMat", projection);

        self.fbo.bind(ctx)?;
        ctx.backend.clear(ClearFlags::COLOR | ClearFlags::DEPTH, [0.0; 4]);

        let result = list.render(ctx, view, RenderPass::Meshes);

        ctx.reset_framebuffer();
        result
    }
}

impl Pipeline for GeometryPipeline {
    fn core(&self) -> &PipelineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PipelineCore {
        &mut self.core
    }

    fn build(&mut self, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        self.core.build_program(ctx, &shaders::GEOMETRY)?;

        let (width, height) = ctx.surface_size();
        self.position
            .create(ctx, TextureDesc::texture_2d(width, height, TextureFormat::RgbFloat))?;
        self.normal
            .create(ctx, TextureDesc::texture_2d(width, height, TextureFormat::RgbaFloat))?;
        self.material
            .create(ctx, TextureDesc::texture_2d(width, height, TextureFormat::RgbaFloat))?;
        self.depth
            .create(ctx, TextureDesc::texture_2d(width, height, TextureFormat::Depth))?;

        self.fbo.create(
            ctx,
            &[&self.position, &self.normal, &self.material],
            Some(&self.depth),
        )?;
        self.fbo.validate(ctx)
    }

    fn release_targets(&mut self, ctx: &mut RenderContext<'_>) {
        self.fbo.free(ctx);
        self.position.free(ctx);
        self.normal.free(ctx);
        self.material.free(ctx);
        self.depth.free(ctx);
    }
}
