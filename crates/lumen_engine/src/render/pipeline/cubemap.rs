//! Omnidirectional shadow pass
//!
//! Renders linear light distance into a depth cubemap in a single pass: the
//! geometry stage replicates each triangle into the six faces using one
//! 90° look-at projection per face.

use super::{shaders, Pipeline, PipelineCore};
use crate::core::Identity;
use crate::foundation::math::{constants::HALF_PI, utils, Mat4, Mat4Ext, Vec3};
use crate::render::api::{
    ClearFlags, CullMode, RenderContext, TextureDesc, TextureFormat, UniformValue,
};
use crate::render::resources::{Framebuffer, Texture};
use crate::render::{RenderError, RenderResult};
use crate::scene::{RenderList, RenderPass, RenderableElem};

/// Cube face directions and up vectors, in +X, -X, +Y, -Y, +Z, -Z order
const CUBE_FACES: [([f32; 3], [f32; 3]); 6] = [
    ([1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
    ([-1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
    ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
    ([0.0, -1.0, 0.0], [0.0, 0.0, -1.0]),
    ([0.0, 0.0, 1.0], [0.0, -1.0, 0.0]),
    ([0.0, 0.0, -1.0], [0.0, -1.0, 0.0]),
];

/// Depth cubemap pass from one point light
#[derive(Debug)]
pub struct CubemapShadowPipeline {
    core: PipelineCore,
    depth_cube: Texture,
    fbo: Framebuffer,
}

impl Default for CubemapShadowPipeline {
    fn default() -> Self {
        Self::new("cubemap shadows")
    }
}

impl CubemapShadowPipeline {
    /// Create an unbuilt pipeline
    pub fn new(name: &str) -> Self {
        Self {
            core: PipelineCore::new(name),
            depth_cube: Texture::new(&format!("{} depth cube", name)),
            fbo: Framebuffer::new(&format!("{} fbo", name)),
        }
    }

    /// Depth cubemap written by the last pass
    pub fn shadow_map(&self) -> &Texture {
        &self.depth_cube
    }

    /// View-projection of each cube face for a light at `position`
    pub fn face_matrices(position: Vec3, aspect: f32, far_plane: f32) -> Vec<Mat4> {
        let projection = Mat4::perspective(HALF_PI, aspect, 1.0, far_plane);
        CUBE_FACES
            .iter()
            .map(|(direction, up)| {
                projection * Mat4::look_at(position, position + Vec3::from(*direction), Vec3::from(*up))
            })
            .collect()
    }

    /// Render the meshes of `list` into the cubemap around `light_elem`
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
        let far_plane = ctx.settings.far_plane;
        let (width, height) = self.fbo.size();
        let aspect = width as f32 / height.max(1) as f32;
        let world = light_elem.world_matrix();
        let faces = Self::face_matrices(utils::translation_of(world), aspect, far_plane);
        ctx.set_uniform("projections", UniformValue::Mat4Array(faces));
        ctx.set_float("farPlane", far_plane);
        light.apply(ctx, world);

        self.fbo.bind(ctx)?;
        ctx.backend.clear(ClearFlags::DEPTH, [1.0; 4]);
        ctx.backend.set_color_mask(false);
        ctx.backend.set_cull_mode(CullMode::Front);

        // Meshes go out in world space; the face matrices carry the view
        let result = list.render(ctx, &Mat4::identity(), RenderPass::Meshes);

        ctx.backend.set_cull_mode(CullMode::Back);
        ctx.backend.set_color_mask(true);
        ctx.reset_framebuffer();
        result
    }
}

impl Pipeline for CubemapShadowPipeline {
    fn core(&self) -> &PipelineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PipelineCore {
        &mut self.core
    }

    fn build(&mut self, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        self.core.build_program(ctx, &shaders::CUBEMAP)?;

        let size = ctx.settings.shadow_map_size;
        self.depth_cube
            .create(ctx, TextureDesc::cubemap(size, TextureFormat::Depth))?;
        self.fbo.create(ctx, &[], Some(&self.depth_cube))?;
        self.fbo.validate(ctx)?;

        log::debug!("Shadow cubemap '{}' is {}x{} per face", self.core.name(), size, size);
        Ok(())
    }

    fn release_targets(&mut self, ctx: &mut RenderContext<'_>) {
        self.fbo.free(ctx);
        self.depth_cube.free(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    #[test]
    fn test_face_matrices_look_along_each_axis() {
        let position = Vec3::new(1.0, 2.0, 3.0);
        let faces = CubemapShadowPipeline::face_matrices(position, 1.0, 100.0);
        assert_eq!(faces.len(), 6);

        for (matrix, (direction, _)) in faces.iter().zip(CUBE_FACES.iter()) {
            // A point straight ahead of the face lands in the middle of it
            let ahead = position + Vec3::from(*direction) * 10.0;
            let clip = matrix * Vec4::new(ahead.x, ahead.y, ahead.z, 1.0);
            assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
            assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-5);
            assert!(clip.w > 0.0);
        }
    }
}
