//! Live entity records owned by the reconciler.

use crate::bounds::Bounds3;
use crate::factory::Primitive;
use crate::scaling::ViewAngleConfig;

use super::NodeTransform;

/// Sizing data stored alongside a node and read by the scaling pass.
///
/// `original_size` and `bounds` are in the node's local units. The view-angle
/// multiplier is computed against the local size and the scaling pass then
/// multiplies it by `original_scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityMetrics {
    /// Diameter for spheres, largest bounding-box edge for models and cubes.
    pub original_size: Option<f32>,
    /// Author scale factor times unit conversion.
    pub original_scale: f32,
    /// Width over height of the local bounds.
    pub aspect_ratio: Option<f32>,
    pub bounds: Option<Bounds3>,
    pub view_angle: ViewAngleConfig,
}

impl Default for EntityMetrics {
    fn default() -> Self {
        Self {
            original_size: None,
            original_scale: 1.0,
            aspect_ratio: None,
            bounds: None,
            view_angle: ViewAngleConfig::default(),
        }
    }
}

impl EntityMetrics {
    /// Local size the view-angle rule compares against.
    ///
    /// Falls back to the bounds when no size was recorded, and to `0.0` when
    /// neither is known. `original_scale` is not applied here.
    pub fn reference_size(&self) -> f32 {
        self.original_size
            .filter(|size| *size > 0.0)
            .or_else(|| self.bounds.map(|b| b.max_dimension()))
            .unwrap_or(0.0)
    }

    /// Whether the view-angle rule has any size to work with.
    pub fn has_reference_size(&self) -> bool {
        self.reference_size() > 0.0
    }

    /// Derive and cache `original_size` from the bounds if it is missing.
    pub fn ensure_original_size(&mut self) {
        let missing = self.original_size.is_none_or(|size| size <= 0.0);
        if missing && let Some(bounds) = self.bounds {
            let size = bounds.max_dimension();
            if size > 0.0 {
                self.original_size = Some(size);
                self.aspect_ratio.get_or_insert(bounds.aspect_ratio());
            }
        }
    }
}

/// Structural identity of a node. A change here means destroy and recreate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityIdentity {
    Sphere,
    Polyline,
    Annotation,
    /// Stand-in cube for a model without a URL.
    Cube,
    Model { url: String },
}

/// One live entity: the backend node plus everything needed to diff it.
#[derive(Debug)]
pub struct SceneEntity<N> {
    pub(crate) node: N,
    pub(crate) identity: EntityIdentity,
    /// Geometry the node was built from. `None` for loaded models.
    pub(crate) primitive: Option<Primitive>,
    pub(crate) transform: NodeTransform,
    pub(crate) metrics: EntityMetrics,
    /// Generation of the load that produced this node (0 when synchronous).
    pub(crate) load_version: u64,
}

impl<N> SceneEntity<N> {
    pub fn node(&self) -> &N {
        &self.node
    }

    pub fn identity(&self) -> &EntityIdentity {
        &self.identity
    }

    pub fn primitive(&self) -> Option<&Primitive> {
        self.primitive.as_ref()
    }

    pub fn transform(&self) -> &NodeTransform {
        &self.transform
    }

    pub fn metrics(&self) -> &EntityMetrics {
        &self.metrics
    }

    pub fn load_version(&self) -> u64 {
        self.load_version
    }
}
