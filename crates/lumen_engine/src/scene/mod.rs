//! Scene management
//!
//! The scene graph owns every node of a scene in an arena; the render list
//! flattens a subtree of it into the per-frame order pipelines consume.
//!
//! ## Architecture
//!
//! ```text
//! Scene (arena of nodes + material library)
//!      ↓  RenderList::process
//! RenderList (lights first, meshes last, world matrices resolved)
//!      ↓
//! Pipelines
//! ```

mod render_list;
mod scene_graph;

pub use render_list::{RenderList, RenderPass, RenderableElem};
pub use scene_graph::{Node, NodeKind, Scene, SceneError, SceneResult};
