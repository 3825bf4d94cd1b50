//! Scene graph synchronization.
//!
//! The [`Reconciler`] owns the id → entity map and talks to the live scene
//! graph only through a [`SceneBackend`]. The Bevy layer implements the
//! backend over `Commands` and asset collections; tests use a recording fake.

mod entity;
mod loads;
mod reconciler;

use glam::{Quat, Vec3};

use crate::error::SceneError;
use crate::geometry::callout::CalloutLayout;
use crate::shape::ShapeId;

pub use crate::factory::Primitive;
pub use entity::{EntityIdentity, EntityMetrics, SceneEntity};
pub use loads::{LoadOutcome, LoadedModel, ModelTicket};
pub use reconciler::{ReconcileReport, Reconciler};

/// Placement of a node in scene units. Scale is uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl NodeTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: 1.0,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// The live scene graph, as seen by the reconciler.
///
/// Every node a backend creates is owned by exactly one entity and is handed
/// back through [`SceneBackend::despawn`] when that entity goes away; the
/// backend must release every resource it created for the node there.
pub trait SceneBackend {
    /// Handle to a created node.
    type Node;
    /// A loaded model asset, produced by the backend's loader.
    type Model;

    /// Create a node for a synchronous primitive.
    fn spawn(&mut self, id: &ShapeId, primitive: &Primitive) -> Result<Self::Node, SceneError>;

    /// Create a node for a model whose load completed.
    fn spawn_model(&mut self, id: &ShapeId, model: Self::Model) -> Result<Self::Node, SceneError>;

    /// Replace a node's geometry or material in place.
    fn rebuild(&mut self, node: &mut Self::Node, primitive: &Primitive) -> Result<(), SceneError>;

    fn set_transform(&mut self, node: &Self::Node, transform: &NodeTransform);

    /// Position one callout of an annotation node.
    fn set_callout_layout(&mut self, node: &Self::Node, index: usize, layout: &CalloutLayout);

    /// Destroy a node and release its resources.
    fn despawn(&mut self, node: Self::Node);

    /// Start loading a model. The result comes back through
    /// [`Reconciler::complete_model_load`] with the same ticket.
    fn load_model(&mut self, ticket: ModelTicket);
}
