//! Mesh geometry for rendering
//!
//! [`MeshData`] is the CPU-side copy of a triangle mesh. [`Mesh`] is the scene
//! node capability that owns it together with the GPU vertex array it is
//! uploaded to and a reference to its material.
//!
//! The CPU copy is kept after upload: the ray tracer flattens it into
//! world-space triangles without reading GPU buffers back.

use crate::foundation::collections::MaterialId;
use crate::foundation::math::{utils, Vec3};
use crate::render::api::{DrawInfo, RenderContext};
use crate::render::primitives::Material;
use crate::render::resources::{GeometryBuffer, ResourceRegistry};
use crate::render::RenderResult;
use bytemuck::{Pod, Zeroable};

/// Vertex layout shared by every mesh program
///
/// `#[repr(C)]` with no implicit padding, so vertex slices can be uploaded
/// as raw bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in object space
    pub position: [f32; 3],

    /// Normal vector
    pub normal: [f32; 3],

    /// Texture coordinates
    pub tex_coord: [f32; 2],

    /// Tangent vector for normal mapping
    pub tangent: [f32; 3],

    /// Padding to a 16-byte multiple
    pub _padding: f32,
}

impl Vertex {
    /// Create a new vertex without tangent
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coord,
            tangent: [0.0, 0.0, 0.0],
            _padding: 0.0,
        }
    }
}

/// CPU-side triangle mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Vertex data
    pub vertices: Vec<Vertex>,

    /// Triangles as vertex index triples
    pub faces: Vec<[u32; 3]>,
}

impl MeshData {
    /// Create a mesh from vertices and faces
    pub fn new(vertices: Vec<Vertex>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Axis-aligned cube centered at the origin, with per-face normals
    ///
    /// 24 vertices (4 per face) and 12 triangles, counter-clockwise when seen
    /// from outside.
    pub fn cube(half_extent: f32) -> Self {
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            // (normal, u axis, v axis)
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];
        const CORNERS: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

        let mut vertices = Vec::with_capacity(24);
        let mut faces = Vec::with_capacity(12);
        for (normal, u, v) in FACES {
            let (n, u, v) = (Vec3::from(normal), Vec3::from(u), Vec3::from(v));
            let base = u32::try_from(vertices.len()).unwrap_or(u32::MAX);
            for (s, t) in CORNERS {
                let position = (n + u * s + v * t) * half_extent;
                vertices.push(Vertex::new(position.into(), normal, [(s + 1.0) * 0.5, (t + 1.0) * 0.5]));
            }
            faces.push([base, base + 1, base + 2]);
            faces.push([base, base + 2, base + 3]);
        }
        Self { vertices, faces }
    }

    /// Square in the XZ plane facing +Y
    pub fn plane(half_extent: f32) -> Self {
        let normal = [0.0, 1.0, 0.0];
        let e = half_extent;
        Self {
            vertices: vec![
                Vertex::new([-e, 0.0, e], normal, [0.0, 0.0]),
                Vertex::new([e, 0.0, e], normal, [1.0, 0.0]),
                Vertex::new([e, 0.0, -e], normal, [1.0, 1.0]),
                Vertex::new([-e, 0.0, -e], normal, [0.0, 1.0]),
            ],
            faces: vec![[0, 1, 2], [0, 2, 3]],
        }
    }

    /// Number of triangles
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Radius of the smallest origin-centered sphere enclosing every vertex
    pub fn bounding_radius(&self) -> f32 {
        self.vertices
            .iter()
            .map(|vertex| Vec3::from(vertex.position).norm())
            .fold(0.0, f32::max)
    }

    /// Whether every face index refers to an existing vertex
    pub fn is_valid(&self) -> bool {
        let count = self.vertices.len();
        self.faces
            .iter()
            .flatten()
            .all(|&index| (index as usize) < count)
    }
}

/// Mesh capability of a scene node
#[derive(Debug)]
pub struct Mesh {
    data: MeshData,
    material: Option<MaterialId>,
    radius: f32,
    geometry: GeometryBuffer,
    stale: bool,
}

impl Mesh {
    /// Create a mesh; `label` names its GPU geometry in the resource registry
    pub fn new(label: &str, data: MeshData) -> Self {
        let radius = data.bounding_radius();
        Self {
            data,
            material: None,
            radius,
            geometry: GeometryBuffer::new(label),
            stale: true,
        }
    }

    /// Assign a material from the scene's library
    #[must_use]
    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = Some(material);
        self
    }

    /// CPU-side geometry
    pub fn data(&self) -> &MeshData {
        &self.data
    }

    /// Replace the geometry; it is uploaded again on the next sync
    pub fn set_data(&mut self, data: MeshData) {
        self.radius = data.bounding_radius();
        self.data = data;
        self.stale = true;
    }

    /// Material of this mesh
    pub fn material(&self) -> Option<MaterialId> {
        self.material
    }

    /// Set or clear the material
    pub fn set_material(&mut self, material: Option<MaterialId>) {
        self.material = material;
    }

    /// Bounding sphere radius in object space
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Whether the GPU copy is missing or out of date
    pub fn needs_upload(&self, registry: &ResourceRegistry) -> bool {
        self.stale || !self.geometry.is_initialized(registry)
    }

    /// Upload the geometry if it is missing or out of date
    ///
    /// # Returns
    /// `true` if an upload happened
    pub fn upload(&mut self, ctx: &mut RenderContext<'_>) -> RenderResult<bool> {
        if !self.needs_upload(ctx.registry) {
            return Ok(false);
        }
        if !self.data.is_valid() {
            return Err(crate::render::RenderError::InvalidParams(
                "mesh face refers to a missing vertex".to_string(),
            ));
        }
        self.geometry.upload(ctx, &self.data.vertices, &self.data.faces)?;
        self.stale = false;
        Ok(true)
    }

    /// Release the GPU copy
    pub fn free(&mut self, ctx: &mut RenderContext<'_>) -> bool {
        self.stale = true;
        self.geometry.free(ctx)
    }

    /// Draw with the active program
    ///
    /// Sets `modelviewMat` and `normalMat`, uploads the material and issues
    /// one indexed draw.
    pub fn draw(&self, ctx: &mut RenderContext<'_>, info: &DrawInfo, material: Option<&Material>) -> RenderResult<()> {
        let model_view = info.model_view();
        ctx.set_mat4("modelviewMat", model_view);
        ctx.set_mat3("normalMat", utils::normal_matrix(&model_view));
        if let Some(material) = material {
            material.apply(ctx);
        }
        self.geometry.draw(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 48);
    }

    #[test]
    fn test_cube_shape() {
        let cube = MeshData::cube(1.0);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.face_count(), 12);
        assert!(cube.is_valid());
        assert_relative_eq!(cube.bounding_radius(), 3.0_f32.sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn test_cube_faces_wind_outwards() {
        let cube = MeshData::cube(0.5);
        for [a, b, c] in &cube.faces {
            let p = |i: &u32| Vec3::from(cube.vertices[*i as usize].position);
            let geometric = (p(b) - p(a)).cross(&(p(c) - p(a)));
            let stored = Vec3::from(cube.vertices[*a as usize].normal);
            assert!(geometric.dot(&stored) > 0.0);
        }
    }

    #[test]
    fn test_invalid_faces_are_detected() {
        let mut plane = MeshData::plane(1.0);
        assert!(plane.is_valid());
        plane.faces.push([0, 1, 9]);
        assert!(!plane.is_valid());
    }

    #[test]
    fn test_set_data_updates_radius() {
        let mut mesh = Mesh::new("box", MeshData::cube(1.0));
        mesh.set_data(MeshData::plane(2.0));
        assert_relative_eq!(mesh.radius(), 8.0_f32.sqrt(), epsilon = 1e-6);
    }
}
