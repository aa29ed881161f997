//! # Cameras
//!
//! A [`Camera`] is the projection half of a viewpoint; its placement is the
//! world matrix of the scene node it is attached to. [`CameraView`] pairs the
//! two for one frame and is what pipelines consume.
//!
//! ## Conventions
//! Right-handed, Y-up view space looking down -Z, clip depth in `[-1, 1]`.

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3, Vec4};
use crate::render::api::RenderContext;

/// Projection parameters of a camera node
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    projection: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Mat4::identity())
    }
}

impl Camera {
    /// Camera with an explicit projection matrix
    pub fn new(projection: Mat4) -> Self {
        Self { projection }
    }

    /// Perspective camera
    ///
    /// # Arguments
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `aspect` - Viewport width / height
    /// * `near` - Distance to near clipping plane (must be > 0)
    /// * `far` - Distance to far clipping plane (must be > near)
    pub fn perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::new(Mat4::perspective(utils::deg_to_rad(fov_degrees), aspect, near, far))
    }

    /// Projection matrix
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// Replace the projection matrix
    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
    }
}

/// A camera placed in the world for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct CameraView {
    /// World matrix of the camera node
    pub world: Mat4,
    /// Projection matrix
    pub projection: Mat4,
}

impl CameraView {
    /// Pair a world matrix with a projection
    pub fn new(world: Mat4, projection: Mat4) -> Self {
        Self { world, projection }
    }

    /// View matrix: inverse of the camera's world matrix
    pub fn view_matrix(&self) -> Mat4 {
        utils::inverse_or_identity(&self.world)
    }

    /// Camera position in world space
    pub fn position(&self) -> Vec3 {
        utils::translation_of(&self.world)
    }

    /// Normalized world-space directions through the four viewport corners
    ///
    /// Ordered `(-1,-1)`, `(-1,1)`, `(1,-1)`, `(1,1)` in normalized device
    /// coordinates, with `w = 0`.
    pub fn corner_rays(&self) -> [Vec4; 4] {
        let inv_view_proj = utils::inverse_or_identity(&(self.projection * self.view_matrix()));
        let eye = self.position();
        [(-1.0, -1.0), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0)].map(|(x, y)| {
            let corner = inv_view_proj * Vec4::new(x, y, 0.0, 1.0);
            let direction = (corner.xyz() / corner.w - eye).normalize();
            direction.push(0.0)
        })
    }

    /// Upload the projection to the active program and make this the frame's camera
    pub fn bind(&self, ctx: &mut RenderContext<'_>) {
        ctx.set_mat4("projectionMat", self.projection);
        ctx.frame.record_camera(self.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_view_matrix_inverts_world() {
        let world = Mat4::new_translation(&Vec3::new(0.0, 2.0, 5.0));
        let view = CameraView::new(world, Mat4::identity());
        assert_relative_eq!(view.view_matrix() * world, Mat4::identity(), epsilon = 1e-6);
        assert_relative_eq!(view.position(), Vec3::new(0.0, 2.0, 5.0));
    }

    #[test]
    fn test_corner_rays_are_symmetric() {
        let camera = Camera::perspective(90.0, 1.0, 0.1, 100.0);
        let view = CameraView::new(Mat4::identity(), *camera.projection());
        let [r00, r01, r10, r11] = view.corner_rays();

        for ray in [r00, r01, r10, r11] {
            assert_relative_eq!(ray.xyz().norm(), 1.0, epsilon = 1e-5);
            assert_relative_eq!(ray.w, 0.0);
            assert!(ray.z < 0.0, "corner rays look down -Z");
        }
        assert_relative_eq!(r00.x, -r11.x, epsilon = 1e-5);
        assert_relative_eq!(r01.y, -r10.y, epsilon = 1e-5);
        assert!(r00.x < 0.0 && r00.y < 0.0);
        assert!(r11.x > 0.0 && r11.y > 0.0);
    }
}
