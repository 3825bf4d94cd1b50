//! Bevy resources for the scene pipeline.

use std::path::PathBuf;
use std::time::Duration;

use bevy::gltf::Gltf;
use bevy::prelude::*;
use parallax_core::camera::{CameraState, DEFAULT_QUERY_TIMEOUT, PositionQueries};
use parallax_core::geometry::callout::REFERENCE_DISTANCE;
use parallax_core::label::LabelFont;
use parallax_core::scene::{ModelTicket, Reconciler};
use parallax_core::shape::SceneOptions;
use parallax_core::telemetry::TelemetrySnapshot;

use crate::backend::SceneNode;

/// Library configuration. Insert before adding the plugin to override.
#[derive(Resource, Clone, Debug)]
pub struct ParallaxConfig {
    /// TrueType/OpenType font for annotation labels.
    pub label_font: Option<PathBuf>,
    /// Camera distance at which callouts are drawn at scale 1.
    pub callout_reference_distance: f32,
    /// How long a camera position query may stay unanswered.
    pub query_timeout: Duration,
}

impl Default for ParallaxConfig {
    fn default() -> Self {
        Self {
            label_font: None,
            callout_reference_distance: REFERENCE_DISTANCE,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

/// Bevy resource holding the scene inputs and the reconciler.
///
/// This is the single owner of the id → entity map. Only the systems in
/// this crate mutate it.
#[derive(Resource, Default)]
pub struct SceneState {
    pub options: SceneOptions,
    pub telemetry: TelemetrySnapshot,
    pub reconciler: Reconciler<SceneNode>,
    /// Whether options or telemetry changed since the last reconcile.
    pub dirty: bool,
}

/// The label font shared by the reconciler (for measuring) and the
/// backend (for rasterizing).
#[derive(Resource, Default)]
pub struct LabelFontState {
    pub font: Option<LabelFont>,
}

/// glTF loads in flight, keyed by their ticket.
#[derive(Resource, Default)]
pub struct PendingModelLoads {
    pub loads: Vec<(ModelTicket, Handle<Gltf>)>,
}

/// Camera pose extracted this frame.
#[derive(Resource, Default)]
pub struct CurrentCamera {
    pub state: CameraState,
}

/// Outstanding camera position queries.
#[derive(Resource, Default)]
pub struct CameraQueries {
    pub queries: PositionQueries,
}

/// Human-readable camera numbers for an overlay.
#[derive(Resource, Default, Debug, Clone, Copy)]
pub struct CameraReadout {
    pub position: Vec3,
    pub target: Vec3,
    pub distance: f32,
    pub entity_count: usize,
}
