//! Scene graph
//!
//! An arena-backed tree of transform nodes. Each node owns a local matrix,
//! an ordered list of children and a capability tag fixed at construction
//! ([`NodeKind`]). Parents are stored as keys, so "no parent" is simply
//! `None` and a removed node's key stops resolving.
//!
//! The scene also keeps the material library meshes refer to, and answers
//! lookups by name or entity id.

use crate::core::entity::EntityError;
use crate::core::{Entity, EntityId, Identity};
use crate::foundation::collections::{HandleMap, MaterialId, NodeId};
use crate::foundation::math::Mat4;
use crate::render::api::RenderContext;
use crate::render::primitives::{Camera, CameraView, Light, Material, Mesh};
use crate::render::RenderResult;
use thiserror::Error;

/// Scene graph errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The key does not refer to a node of this scene
    #[error("Node not found")]
    NodeNotFound,

    /// The child is already attached somewhere
    #[error("Node '{0}' already has a parent")]
    AlreadyHasParent(String),

    /// The child is the parent or one of its ancestors
    #[error("Attaching '{child}' under '{parent}' would create a cycle")]
    WouldCreateCycle {
        /// Intended parent
        parent: String,
        /// Intended child
        child: String,
    },

    /// Child index past the end of the child list
    #[error("Child index {index} out of range ({count} children)")]
    ChildIndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of children
        count: usize,
    },

    /// The node does not carry the requested capability
    #[error("Node '{name}' is not a {expected}")]
    WrongKind {
        /// Node name
        name: String,
        /// Expected capability
        expected: &'static str,
    },

    /// The node must be detached first
    #[error("Node '{0}' is still attached to a parent")]
    StillAttached(String),

    /// The material key does not resolve
    #[error("Material not found")]
    MaterialNotFound,

    /// Invalid name
    #[error(transparent)]
    Entity(#[from] EntityError),
}

/// Result type for scene operations
pub type SceneResult<T> = Result<T, SceneError>;

/// Capability carried by a node
#[derive(Debug)]
pub enum NodeKind {
    /// Plain transform node
    Group,
    /// Viewpoint
    Camera(Camera),
    /// Light source
    Light(Light),
    /// Drawable geometry
    Mesh(Mesh),
}

impl NodeKind {
    /// Short capability name
    pub fn label(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Camera(_) => "camera",
            Self::Light(_) => "light",
            Self::Mesh(_) => "mesh",
        }
    }
}

/// Transform node
#[derive(Debug)]
pub struct Node {
    entity: Entity,
    local: Mat4,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

impl Node {
    /// Standalone node with an identity local matrix
    pub fn new(name: &str, kind: NodeKind) -> Self {
        Self {
            entity: Entity::named(name),
            local: Mat4::identity(),
            parent: None,
            children: Vec::new(),
            kind,
        }
    }

    /// Plain transform node
    pub fn group(name: &str) -> Self {
        Self::new(name, NodeKind::Group)
    }

    /// Camera node
    pub fn camera(name: &str, camera: Camera) -> Self {
        Self::new(name, NodeKind::Camera(camera))
    }

    /// Light node
    pub fn light(name: &str, light: Light) -> Self {
        Self::new(name, NodeKind::Light(light))
    }

    /// Mesh node
    pub fn mesh(name: &str, mesh: Mesh) -> Self {
        Self::new(name, NodeKind::Mesh(mesh))
    }

    /// Set the local matrix
    #[must_use]
    pub fn with_matrix(mut self, local: Mat4) -> Self {
        self.local = local;
        self
    }

    /// Local matrix relative to the parent
    pub fn local_matrix(&self) -> &Mat4 {
        &self.local
    }

    /// Replace the local matrix
    pub fn set_local_matrix(&mut self, local: Mat4) {
        self.local = local;
    }

    /// Parent key, `None` when detached
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Capability of this node
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Mutable capability of this node
    pub fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    /// Light capability, if this is a light
    pub fn as_light(&self) -> Option<&Light> {
        match &self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    /// Mutable light capability
    pub fn as_light_mut(&mut self) -> Option<&mut Light> {
        match &mut self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    /// Mesh capability, if this is a mesh
    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// Mutable mesh capability
    pub fn as_mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// Camera capability, if this is a camera
    pub fn as_camera(&self) -> Option<&Camera> {
        match &self.kind {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    /// Mutable camera capability
    pub fn as_camera_mut(&mut self) -> Option<&mut Camera> {
        match &mut self.kind {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    /// Whether this node is a light source
    pub fn is_light(&self) -> bool {
        matches!(self.kind, NodeKind::Light(_))
    }

    /// Whether this node is drawable geometry
    pub fn is_mesh(&self) -> bool {
        matches!(self.kind, NodeKind::Mesh(_))
    }
}

impl Identity for Node {
    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }
}

/// Arena of nodes and materials with a designated root
#[derive(Debug)]
pub struct Scene {
    nodes: HandleMap<NodeId, Node>,
    materials: HandleMap<MaterialId, Material>,
    root: NodeId,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new("root")
    }
}

impl Scene {
    /// Scene containing only a root group node
    pub fn new(root_name: &str) -> Self {
        let mut nodes = HandleMap::with_key();
        let root = nodes.insert(Node::group(root_name));
        Self {
            nodes,
            materials: HandleMap::with_key(),
            root,
        }
    }

    /// Root node
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the scene holds only its root
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Add a standalone node; attach it with [`Scene::add_child`]
    pub fn insert(&mut self, node: Node) -> NodeId {
        self.nodes.insert(node)
    }

    /// Add a node and attach it under `parent`
    pub fn insert_child(&mut self, parent: NodeId, node: Node) -> SceneResult<NodeId> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::NodeNotFound);
        }
        let child = self.nodes.insert(node);
        self.add_child(parent, child)?;
        Ok(child)
    }

    /// Node by key
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Mutable node by key
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    fn node(&self, id: NodeId) -> SceneResult<&Node> {
        self.nodes.get(id).ok_or(SceneError::NodeNotFound)
    }

    /// Attach `child` as the last child of `parent`
    ///
    /// Fails, leaving the graph unchanged, if either node is unknown, the
    /// child already has a parent, or the child is `parent` or one of its
    /// ancestors.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> SceneResult<()> {
        let parent_node = self.node(parent)?;
        let child_node = self.node(child)?;

        if child_node.parent.is_some() {
            log::error!("Node '{}' already has a parent", child_node.name());
            return Err(SceneError::AlreadyHasParent(child_node.name().to_string()));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(SceneError::WouldCreateCycle {
                parent: parent_node.name().to_string(),
                child: child_node.name().to_string(),
            });
        }

        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
        }
        Ok(())
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == candidate {
                return true;
            }
            match self.nodes.get(node).and_then(Node::parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    /// Detach the child at `index` of `parent`
    ///
    /// The detached node keeps its own subtree and becomes standalone.
    pub fn remove_child(&mut self, parent: NodeId, index: usize) -> SceneResult<NodeId> {
        let parent_node = self.nodes.get_mut(parent).ok_or(SceneError::NodeNotFound)?;
        let count = parent_node.children.len();
        if index >= count {
            log::error!("Invalid child index {} ({} children)", index, count);
            return Err(SceneError::ChildIndexOutOfRange { index, count });
        }
        let child = parent_node.children.remove(index);
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = None;
        }
        Ok(child)
    }

    /// Child at `index` of `parent`
    ///
    /// An out-of-range index is reported and yields `None`.
    pub fn child(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        let node = self.nodes.get(parent)?;
        let child = node.children.get(index).copied();
        if child.is_none() {
            log::error!("Invalid child index {} for '{}'", index, node.name());
        }
        child
    }

    /// Number of children of a node (zero for unknown nodes)
    pub fn nr_of_children(&self, id: NodeId) -> usize {
        self.nodes.get(id).map_or(0, |node| node.children.len())
    }

    /// Parent of a node
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(Node::parent)
    }

    /// World matrix of a node
    ///
    /// Composes local matrices from the node up its ancestor chain, stopping
    /// below `stop_at` when it is reached (or at the top of the tree).
    /// For a chain `root -> A -> B -> C`, `world_matrix(C, Some(A))` is
    /// `Rb * Rc`.
    pub fn world_matrix(&self, id: NodeId, stop_at: Option<NodeId>) -> SceneResult<Mat4> {
        let node = self.node(id)?;
        let mut result = node.local;
        let mut current = node.parent;
        while let Some(parent) = current {
            if Some(parent) == stop_at {
                break;
            }
            let parent_node = self.node(parent)?;
            result = parent_node.local * result;
            current = parent_node.parent;
        }
        Ok(result)
    }

    /// Camera placed at its node's world matrix
    pub fn camera_view(&self, id: NodeId) -> SceneResult<CameraView> {
        let node = self.node(id)?;
        let camera = node.as_camera().ok_or_else(|| SceneError::WrongKind {
            name: node.name().to_string(),
            expected: "camera",
        })?;
        Ok(CameraView::new(self.world_matrix(id, None)?, *camera.projection()))
    }

    /// First node with the given name, in arena order
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.name() == name)
            .map(|(id, _)| id)
    }

    /// Node with the given entity id
    pub fn find_by_id(&self, id: EntityId) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.id() == id)
            .map(|(key, _)| key)
    }

    /// Indented outline of the subtree below `id`, one `+ name` line per node
    pub fn tree_as_string(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_tree(id, 0, &mut out);
        out
    }

    fn write_tree(&self, id: NodeId, depth: usize, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        out.push_str(&"   ".repeat(depth));
        out.push_str("+ ");
        out.push_str(node.name());
        out.push('\n');
        for &child in &node.children {
            self.write_tree(child, depth + 1, out);
        }
    }

    /// Remove a detached node and its whole subtree, releasing mesh geometry
    ///
    /// # Returns
    /// The number of nodes removed
    pub fn destroy(&mut self, id: NodeId, ctx: &mut RenderContext<'_>) -> SceneResult<usize> {
        let node = self.node(id)?;
        if node.parent.is_some() || id == self.root {
            return Err(SceneError::StillAttached(node.name().to_string()));
        }

        let mut pending = vec![id];
        let mut removed = 0;
        while let Some(next) = pending.pop() {
            if let Some(mut node) = self.nodes.remove(next) {
                pending.extend(node.children.iter().copied());
                if let Some(mesh) = node.as_mesh_mut() {
                    mesh.free(ctx);
                }
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Add a material to the library
    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.insert(material)
    }

    /// Material by key
    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    /// Mutable material by key
    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id)
    }

    /// First material with the given name
    pub fn find_material(&self, name: &str) -> Option<MaterialId> {
        self.materials
            .iter()
            .find(|(_, material)| material.name() == name)
            .map(|(id, _)| id)
    }

    /// Number of materials in the library
    pub fn nr_of_materials(&self) -> usize {
        self.materials.len()
    }

    /// Iterate over all nodes
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Upload every mesh whose GPU geometry is missing or stale
    ///
    /// # Returns
    /// The number of meshes uploaded
    pub fn sync_gpu(&mut self, ctx: &mut RenderContext<'_>) -> RenderResult<usize> {
        let mut uploaded = 0;
        for node in self.nodes.values_mut() {
            if let Some(mesh) = node.as_mesh_mut() {
                if mesh.upload(ctx)? {
                    uploaded += 1;
                }
            }
        }
        if uploaded > 0 {
            log::debug!("Uploaded {} mesh(es)", uploaded);
        }
        Ok(uploaded)
    }

    /// Release the GPU geometry of every mesh
    pub fn free_gpu(&mut self, ctx: &mut RenderContext<'_>) {
        for node in self.nodes.values_mut() {
            if let Some(mesh) = node.as_mesh_mut() {
                mesh.free(ctx);
            }
        }
    }
}
