//! Light sources
//!
//! A light is a scene node capability. Its position is the translation of
//! whatever matrix the pass hands it, so the same light renders in view space
//! for forward shading and in world space for omnidirectional shadows.

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};
use crate::render::api::{DrawInfo, Drawable, RenderContext};
use crate::render::RenderResult;

/// Point light with a projection used for shadow mapping
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    color: Vec3,
    ambient: Vec3,
    projection: Mat4,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            color: Vec3::new(1.0, 1.0, 1.0),
            ambient: Vec3::new(0.25, 0.25, 0.25),
            projection: Mat4::identity(),
        }
    }
}

impl Light {
    /// White light with a 0.25 ambient term
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the color
    #[must_use]
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    /// Use a perspective shadow projection
    #[must_use]
    pub fn with_shadow_frustum(mut self, fov_degrees: f32, near: f32, far: f32) -> Self {
        self.projection = Mat4::perspective(utils::deg_to_rad(fov_degrees), 1.0, near, far);
        self
    }

    /// Light color
    pub fn color(&self) -> Vec3 {
        self.color
    }

    /// Set the light color
    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
    }

    /// Ambient color
    pub fn ambient(&self) -> Vec3 {
        self.ambient
    }

    /// Set the ambient color
    pub fn set_ambient(&mut self, ambient: Vec3) {
        self.ambient = ambient;
    }

    /// Projection used when rendering the scene from this light
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// Set the shadow projection
    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    /// Upload color, ambient and the position taken from `matrix`
    pub fn apply(&self, ctx: &mut RenderContext<'_>, matrix: &Mat4) {
        ctx.set_vec3("lightColor", self.color);
        ctx.set_vec3("lightAmbient", self.ambient);
        ctx.set_vec3("lightPosition", utils::translation_of(matrix));
    }
}

impl Drawable for Light {
    fn draw(&self, ctx: &mut RenderContext<'_>, info: &DrawInfo) -> RenderResult<()> {
        self.apply(ctx, &info.model_view());
        Ok(())
    }
}
