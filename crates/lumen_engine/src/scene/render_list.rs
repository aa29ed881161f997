//! Render list
//!
//! A flat, per-frame view of a scene subtree with world matrices resolved.
//! Lights are gathered at the front and meshes at the back, so passes can
//! iterate either group as a contiguous slice:
//!
//! ```text
//! [ L_k ... L_2 L_1 | M_1 M_2 ... M_m ]
//!   ^ lights, reverse traversal order   ^ meshes, traversal order
//! ```
//!
//! Elements borrow their nodes and materials from the [`Scene`], so the list
//! cannot outlive the scene it was built from nor see it change.

use super::scene_graph::{Node, NodeKind, Scene, SceneError};
use crate::core::Identity;
use crate::foundation::collections::NodeId;
use crate::foundation::math::Mat4;
use crate::render::api::{DrawInfo, Drawable, RenderContext};
use crate::render::primitives::{Light, Material, Mesh};
use crate::render::RenderResult;

/// Which part of a render list to draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPass {
    /// Every element
    All,
    /// Light elements only
    Lights,
    /// Mesh elements only
    Meshes,
}

/// A node paired with its resolved world matrix
#[derive(Debug, Clone, Copy)]
pub struct RenderableElem<'s> {
    node: &'s Node,
    material: Option<&'s Material>,
    world: Mat4,
}

impl<'s> RenderableElem<'s> {
    /// Scene node
    pub fn node(&self) -> &'s Node {
        self.node
    }

    /// World matrix at the time the list was built
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world
    }

    /// Light capability of the node
    pub fn light(&self) -> Option<&'s Light> {
        self.node.as_light()
    }

    /// Mesh capability of the node
    pub fn mesh(&self) -> Option<&'s Mesh> {
        self.node.as_mesh()
    }

    /// Material resolved from the scene library
    pub fn material(&self) -> Option<&'s Material> {
        self.material
    }
}

impl Drawable for RenderableElem<'_> {
    fn draw(&self, ctx: &mut RenderContext<'_>, info: &DrawInfo) -> RenderResult<()> {
        match self.node.kind() {
            NodeKind::Light(light) => light.draw(ctx, info),
            NodeKind::Mesh(mesh) => mesh.draw(ctx, info, self.material),
            NodeKind::Group | NodeKind::Camera(_) => Ok(()),
        }
    }
}

/// Flattened lights and meshes of a scene subtree
#[derive(Debug, Default)]
pub struct RenderList<'s> {
    elements: Vec<RenderableElem<'s>>,
    light_count: usize,
}

impl<'s> RenderList<'s> {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every element
    pub fn reset(&mut self) {
        self.elements.clear();
        self.light_count = 0;
    }

    /// Append the subtree rooted at `root`, starting from an identity matrix
    ///
    /// Fails without touching the list if `root` is not part of the scene.
    pub fn process(&mut self, scene: &'s Scene, root: NodeId) -> Result<(), SceneError> {
        self.process_with(scene, root, &Mat4::identity())
    }

    /// Append the subtree rooted at `id`, under an already composed parent matrix
    pub fn process_with(&mut self, scene: &'s Scene, id: NodeId, parent_matrix: &Mat4) -> Result<(), SceneError> {
        let Some(node) = scene.get(id) else {
            log::error!("Render list: node not found");
            return Err(SceneError::NodeNotFound);
        };

        let world = parent_matrix * node.local_matrix();
        match node.kind() {
            NodeKind::Light(_) => {
                self.elements.insert(0, RenderableElem { node, material: None, world });
                self.light_count += 1;
            }
            NodeKind::Mesh(mesh) => {
                let material = mesh.material().and_then(|key| scene.material(key));
                if mesh.material().is_some() && material.is_none() {
                    log::warn!("Mesh '{}' refers to a missing material", node.name());
                }
                self.elements.push(RenderableElem { node, material, world });
            }
            NodeKind::Group | NodeKind::Camera(_) => {}
        }

        for &child in node.children() {
            self.process_with(scene, child, &world)?;
        }
        Ok(())
    }

    /// Element at `index`
    ///
    /// An out-of-range index is reported and yields `None`.
    pub fn element(&self, index: usize) -> Option<&RenderableElem<'s>> {
        let elem = self.elements.get(index);
        if elem.is_none() {
            log::error!("Invalid render list index {} ({} elements)", index, self.elements.len());
        }
        elem
    }

    /// All elements, lights first
    pub fn elements(&self) -> &[RenderableElem<'s>] {
        &self.elements
    }

    /// Light elements
    pub fn lights(&self) -> &[RenderableElem<'s>] {
        &self.elements[..self.light_count]
    }

    /// Mesh elements
    pub fn meshes(&self) -> &[RenderableElem<'s>] {
        &self.elements[self.light_count..]
    }

    /// Elements covered by a pass
    pub fn pass(&self, pass: RenderPass) -> &[RenderableElem<'s>] {
        match pass {
            RenderPass::All => self.elements(),
            RenderPass::Lights => self.lights(),
            RenderPass::Meshes => self.meshes(),
        }
    }

    /// Total number of elements
    pub fn nr_of_elements(&self) -> usize {
        self.elements.len()
    }

    /// Number of light elements
    pub fn nr_of_lights(&self) -> usize {
        self.light_count
    }

    /// Number of mesh elements
    pub fn nr_of_meshes(&self) -> usize {
        self.elements.len() - self.light_count
    }

    /// Whether the list has no elements at all
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Draw the elements of a pass in order, each with `view` and its world matrix
    pub fn render(&self, ctx: &mut RenderContext<'_>, view: &Mat4, pass: RenderPass) -> RenderResult<()> {
        for elem in self.pass(pass) {
            elem.draw(ctx, &DrawInfo { view: *view, world: elem.world })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::primitives::{Camera, MeshData};
    use approx::assert_relative_eq;

    fn names(list: &RenderList<'_>) -> Vec<String> {
        list.elements().iter().map(|e| e.node().name().to_string()).collect()
    }

    fn mesh(name: &str) -> Node {
        Node::mesh(name, Mesh::new(name, MeshData::plane(1.0)))
    }

    /// root -> { L1, M1, G -> { L2, M2 }, L3 }
    fn mixed_scene() -> Scene {
        let mut scene = Scene::new("root");
        let root = scene.root();
        scene.insert_child(root, Node::light("L1", Light::new())).unwrap();
        scene.insert_child(root, mesh("M1")).unwrap();
        let group = scene.insert_child(root, Node::group("G")).unwrap();
        scene.insert_child(group, Node::light("L2", Light::new())).unwrap();
        scene.insert_child(group, mesh("M2")).unwrap();
        scene.insert_child(root, Node::light("L3", Light::new())).unwrap();
        scene
            .insert_child(root, Node::camera("eye", Camera::default()))
            .unwrap();
        scene
    }

    #[test]
    fn test_lights_before_meshes_in_reverse_order() {
        let scene = mixed_scene();
        let mut list = RenderList::new();
        list.process(&scene, scene.root()).unwrap();

        assert_eq!(names(&list), ["L3", "L2", "L1", "M1", "M2"]);
        assert_eq!(list.nr_of_lights(), 3);
        assert_eq!(list.nr_of_meshes(), 2);
        assert!(list.lights().iter().all(|e| e.light().is_some()));
        assert!(list.meshes().iter().all(|e| e.mesh().is_some()));
    }

    #[test]
    fn test_world_matrices_are_composed() {
        let mut scene = Scene::new("root");
        let root = scene.root();
        let offset = Mat4::new_translation(&Vec3::new(0.0, 5.0, 0.0));
        let local = Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0));
        let group = scene.insert_child(root, Node::group("G").with_matrix(offset)).unwrap();
        scene.insert_child(group, mesh("M").with_matrix(local)).unwrap();

        let mut list = RenderList::new();
        list.process(&scene, scene.root()).unwrap();
        assert_relative_eq!(*list.meshes()[0].world_matrix(), offset * local);
    }

    #[test]
    fn test_reset_then_process_is_repeatable() {
        let scene = mixed_scene();
        let mut list = RenderList::new();
        list.process(&scene, scene.root()).unwrap();
        let first = names(&list);

        list.reset();
        assert!(list.is_empty());
        assert_eq!(list.nr_of_lights(), 0);

        list.process(&scene, scene.root()).unwrap();
        assert_eq!(names(&list), first);
    }

    #[test]
    fn test_empty_subtree_yields_empty_list() {
        let scene = Scene::new("root");
        let mut list = RenderList::new();
        list.process(&scene, scene.root()).unwrap();
        assert!(list.is_empty());
        assert!(list.lights().is_empty());
        assert!(list.meshes().is_empty());
    }

    #[test]
    fn test_missing_root_leaves_list_untouched() {
        let scene = mixed_scene();
        let dangling = NodeId::default();

        let mut list = RenderList::new();
        list.process(&scene, scene.root()).unwrap();
        let before = names(&list);

        assert_eq!(list.process(&scene, dangling), Err(SceneError::NodeNotFound));
        assert_eq!(names(&list), before);
    }

    #[test]
    fn test_element_index_is_bounds_checked() {
        let scene = mixed_scene();
        let mut list = RenderList::new();
        list.process(&scene, scene.root()).unwrap();
        assert!(list.element(0).is_some());
        assert!(list.element(list.nr_of_elements()).is_none());
    }

    #[test]
    fn test_pass_selects_ranges() {
        let scene = mixed_scene();
        let mut list = RenderList::new();
        list.process(&scene, scene.root()).unwrap();
        assert_eq!(list.pass(RenderPass::All).len(), 5);
        assert_eq!(list.pass(RenderPass::Lights).len(), 3);
        assert_eq!(list.pass(RenderPass::Meshes).len(), 2);
    }
}
