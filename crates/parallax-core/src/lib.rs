//! Parallax Core — domain layer for telemetry-driven 3D scenes.
//!
//! This crate contains field resolution, the declarative shape model, the
//! view-angle scaling math, geometry builders, and the scene reconciler.
//! No Bevy or GPU dependencies: the live scene graph is reached through the
//! [`scene::SceneBackend`] trait.

pub mod bounds;
pub mod camera;
pub mod error;
pub mod factory;
pub mod field;
pub mod geometry;
pub mod label;
pub mod scaling;
pub mod scene;
pub mod shape;
pub mod telemetry;

// Re-exports for convenience.
pub use bounds::{Bounds3, DefaultView};
pub use camera::{CameraCommand, CameraResponse, CameraState, PositionQueries, RequestId};
pub use error::{LabelError, ModelLoadError, OptionsError, SceneError};
pub use field::{DataField, FieldResolver, SourceType};
pub use label::{LabelFont, LabelStyle};
pub use scaling::{ViewAngleConfig, view_angle_scale};
pub use scene::{
    EntityMetrics, LoadOutcome, LoadedModel, ModelTicket, NodeTransform, Primitive,
    ReconcileReport, Reconciler, SceneBackend,
};
pub use shape::{SceneOptions, Shape, ShapeId, ShapeKind, ViewAngleSettings};
pub use telemetry::{Field, FieldValue, Series, TelemetrySnapshot};
