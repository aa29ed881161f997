//! Compute ray tracer
//!
//! Does not draw through the render list. Instead [`RayTracingPipeline::migrate`]
//! flattens the list once per scene change into three storage buffers, and
//! every frame a compute dispatch traces one ray per pixel into a color
//! buffer, which is then presented with a fullscreen blit.
//!
//! Buffer layouts follow std430: every struct is `#[repr(C)]`, 16-byte
//! aligned and free of implicit padding.

use super::{require_elements, shaders, Pipeline, PipelineCore};
use crate::core::Identity;
use crate::foundation::math::{utils, Vec3, Vec4};
use crate::render::api::{RenderContext, TextureDesc, TextureFormat};
use crate::render::primitives::CameraView;
use crate::render::resources::{StorageBuffer, Texture};
use crate::render::{RenderError, RenderResult};
use crate::scene::RenderList;
use bytemuck::{Pod, Zeroable};

/// Light as seen by the compute kernel
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    /// World position, `w = 1`
    pub position: [f32; 4],
    /// Color, `a = 1`
    pub color: [f32; 4],
}

/// Bounding sphere around the triangles of one mesh
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuBSphere {
    /// World position of the mesh origin, `w = 1`
    pub position: [f32; 4],
    /// Object-space bounding radius
    pub radius: f32,
    /// Index of the mesh's first triangle
    pub first_triangle: u32,
    /// Number of triangles of the mesh
    pub nr_of_triangles: u32,
    /// Padding to 16 bytes
    pub _pad: u32,
}

/// World-space triangle with per-vertex normals
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuTriangle {
    /// Vertex positions, `w = 1`
    pub v: [[f32; 4]; 3],
    /// Vertex normals, `w = 1`
    pub n: [[f32; 4]; 3],
    /// Material index
    pub mat_id: u32,
    /// Padding to 16 bytes
    pub _pad: [u32; 3],
}

/// Flat GPU-ready copy of a render list
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MigratedScene {
    /// Every mesh triangle in world space
    pub triangles: Vec<GpuTriangle>,
    /// Every light
    pub lights: Vec<GpuLight>,
    /// One sphere per mesh, in mesh order
    pub bspheres: Vec<GpuBSphere>,
}

impl MigratedScene {
    /// Flatten the lights and meshes of `list`
    pub fn from_list(list: &RenderList<'_>) -> RenderResult<Self> {
        let mut scene = Self::default();

        for elem in list.lights() {
            let Some(light) = elem.light() else {
                continue;
            };
            scene.lights.push(GpuLight {
                position: utils::translation_of(elem.world_matrix()).push(1.0).into(),
                color: light.color().push(1.0).into(),
            });
        }

        for elem in list.meshes() {
            let Some(mesh) = elem.mesh() else {
                continue;
            };
            let model = elem.world_matrix();
            let normal_matrix = utils::normal_matrix(model);
            let data = mesh.data();

            let first_triangle = count_u32(scene.triangles.len())?;
            for face in &data.faces {
                let mut triangle = GpuTriangle::zeroed();
                for (corner, &index) in face.iter().enumerate() {
                    let vertex = data.vertices.get(index as usize).ok_or_else(|| {
                        RenderError::InvalidParams(format!("mesh '{}' has a dangling face", elem.node().name()))
                    })?;
                    let position = model * Vec4::new(vertex.position[0], vertex.position[1], vertex.position[2], 1.0);
                    let normal = normal_matrix * Vec3::from(vertex.normal);
                    triangle.v[corner] = position.into();
                    triangle.n[corner] = normal.push(1.0).into();
                }
                scene.triangles.push(triangle);
            }

            scene.bspheres.push(GpuBSphere {
                position: utils::translation_of(model).push(1.0).into(),
                radius: mesh.radius(),
                first_triangle,
                nr_of_triangles: count_u32(data.faces.len())?,
                _pad: 0,
            });
        }

        log::debug!(
            "Migrated {} triangle(s), {} light(s), {} sphere(s)",
            scene.triangles.len(),
            scene.lights.len(),
            scene.bspheres.len()
        );
        Ok(scene)
    }
}

fn count_u32(count: usize) -> RenderResult<u32> {
    u32::try_from(count).map_err(|_| RenderError::InvalidParams(format!("{} elements do not fit a GPU counter", count)))
}

/// Compute ray tracing pass
#[derive(Debug)]
pub struct RayTracingPipeline {
    core: PipelineCore,
    color_buffer: Texture,
    triangles: StorageBuffer,
    lights: StorageBuffer,
    bspheres: StorageBuffer,
    counts: Option<[u32; 3]>,
}

impl Default for RayTracingPipeline {
    fn default() -> Self {
        Self::new("ray tracing")
    }
}

impl RayTracingPipeline {
    /// Create an unbuilt pipeline
    pub fn new(name: &str) -> Self {
        Self {
            core: PipelineCore::new(name),
            color_buffer: Texture::new(&format!("{} color", name)),
            triangles: StorageBuffer::new(&format!("{} triangles", name)),
            lights: StorageBuffer::new(&format!("{} lights", name)),
            bspheres: StorageBuffer::new(&format!("{} bspheres", name)),
            counts: None,
        }
    }

    /// Image written by the last dispatch
    pub fn color_buffer(&self) -> &Texture {
        &self.color_buffer
    }

    /// Triangles, lights and spheres uploaded by the last migration
    pub fn migrated_counts(&self) -> Option<[u32; 3]> {
        self.counts
    }

    /// Upload the lights and meshes of `list` to the storage buffers
    ///
    /// Call again whenever the scene changes.
    pub fn migrate(&mut self, ctx: &mut RenderContext<'_>, list: &RenderList<'_>) -> RenderResult<()> {
        require_elements(list, self.core.name())?;
        let scene = MigratedScene::from_list(list)?;

        self.triangles.upload(ctx, bytemuck::cast_slice(&scene.triangles))?;
        self.lights.upload(ctx, bytemuck::cast_slice(&scene.lights))?;
        self.bspheres.upload(ctx, bytemuck::cast_slice(&scene.bspheres))?;

        self.counts = Some([
            count_u32(scene.triangles.len())?,
            count_u32(scene.lights.len())?,
            count_u32(scene.bspheres.len())?,
        ]);
        Ok(())
    }

    /// Trace the migrated scene from `camera` into the color buffer
    pub fn render(&mut self, ctx: &mut RenderContext<'_>, camera: &CameraView) -> RenderResult<()> {
        let Some([nr_of_triangles, nr_of_lights, nr_of_bspheres]) = self.counts else {
            log::error!("Ray tracing: nothing migrated");
            return Err(RenderError::InvalidParams("no scene migrated to the ray tracer".to_string()));
        };

        self.begin(ctx);
        self.prepare(ctx)?;
        ctx.frame.record_camera(camera.clone());

        self.core.bind_program(ctx)?;
        self.color_buffer.bind_image(ctx, 0)?;
        self.triangles.bind(ctx, 0)?;
        self.lights.bind(ctx, 1)?;
        self.bspheres.bind(ctx, 2)?;

        ctx.set_uint("nrOfTriangles", nr_of_triangles);
        ctx.set_uint("nrOfLights", nr_of_lights);
        ctx.set_uint("nrOfBSpheres", nr_of_bspheres);
        ctx.set_vec4("eyePosition", camera.position().push(1.0));
        let [ray00, ray01, ray10, ray11] = camera.corner_rays();
        ctx.set_vec4("ray00", ray00);
        ctx.set_vec4("ray01", ray01);
        ctx.set_vec4("ray10", ray10);
        ctx.set_vec4("ray11", ray11);

        let (width, height) = self.color_buffer.size().unwrap_or_else(|| ctx.surface_size());
        let group = ctx.settings.compute_group_size.max(1);
        ctx.backend
            .dispatch_compute([width.div_ceil(group), height.div_ceil(group), 1]);
        ctx.backend.memory_barrier();
        Ok(())
    }
}

impl Pipeline for RayTracingPipeline {
    fn core(&self) -> &PipelineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PipelineCore {
        &mut self.core
    }

    fn build(&mut self, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        self.core.build_program(ctx, &shaders::RAYTRACING)?;

        let (width, height) = ctx.surface_size();
        self.color_buffer
            .create(ctx, TextureDesc::texture_2d(width, height, TextureFormat::Rgba8))
    }

    fn release_targets(&mut self, ctx: &mut RenderContext<'_>) {
        self.color_buffer.free(ctx);
        self.triangles.free(ctx);
        self.lights.free(ctx);
        self.bspheres.free(ctx);
        self.counts = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use crate::render::primitives::{Light, Mesh, MeshData};
    use crate::scene::{Node, Scene};
    use approx::assert_relative_eq;

    #[test]
    fn test_struct_layouts_are_std430_sized() {
        assert_eq!(std::mem::size_of::<GpuLight>(), 32);
        assert_eq!(std::mem::size_of::<GpuBSphere>(), 32);
        assert_eq!(std::mem::size_of::<GpuTriangle>(), 112);
    }

    #[test]
    fn test_migration_flattens_to_world_space() {
        let mut scene = Scene::new("root");
        let root = scene.root();
        let offset = Mat4::new_translation(&Vec3::new(10.0, 0.0, 0.0));
        scene
            .insert_child(root, Node::light("sun", Light::new().with_color(Vec3::new(1.0, 0.5, 0.25))).with_matrix(offset))
            .unwrap();
        scene
            .insert_child(root, Node::mesh("floor", Mesh::new("floor", MeshData::plane(1.0))).with_matrix(offset))
            .unwrap();
        scene
            .insert_child(root, Node::mesh("box", Mesh::new("box", MeshData::cube(1.0))))
            .unwrap();

        let mut list = RenderList::new();
        list.process(&scene, root).unwrap();
        let migrated = MigratedScene::from_list(&list).unwrap();

        assert_eq!(migrated.lights.len(), 1);
        assert_eq!(migrated.lights[0].position, [10.0, 0.0, 0.0, 1.0]);
        assert_eq!(migrated.lights[0].color, [1.0, 0.5, 0.25, 1.0]);

        assert_eq!(migrated.triangles.len(), 2 + 12);
        assert_eq!(migrated.bspheres.len(), 2);
        assert_eq!(migrated.bspheres[0].first_triangle, 0);
        assert_eq!(migrated.bspheres[0].nr_of_triangles, 2);
        assert_eq!(migrated.bspheres[1].first_triangle, 2);
        assert_eq!(migrated.bspheres[1].nr_of_triangles, 12);

        // Plane vertices are translated, normals stay +Y
        let first = migrated.triangles[0];
        assert_relative_eq!(first.v[0][0], 9.0);
        assert_relative_eq!(first.n[0][1], 1.0);
        assert_relative_eq!(first.n[0][3], 1.0);
    }
}
