//! IPC message contracts between a host and the viewer.
//!
//! These enums define the complete set of messages exchanged over the
//! WebSocket bridge. They use `#[serde(tag = "type", content = "data")]`
//! so every message is `{ "type": ..., "data": ... }` on the wire.

use serde::{Deserialize, Serialize};

use parallax_core::shape::SceneOptions;
use parallax_core::telemetry::TelemetrySnapshot;

/// Messages from the viewer to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ViewerToHost {
    /// Current options, sent when a host connects or asks for state.
    Initialize { options: SceneOptions },

    /// The viewer changed the options itself (captured camera position).
    OptionsEchoed { options: SceneOptions },

    /// Camera numbers for an overlay.
    CameraReadout {
        position: [f32; 3],
        target: [f32; 3],
        distance: f32,
        entity_count: usize,
    },

    /// Something the host sent could not be applied.
    Error { message: String },
}

/// Messages from the host to the viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum HostToViewer {
    /// Ask for an `Initialize` with the current options.
    RequestState,

    /// Replace the options snapshot.
    SetOptions { options: SceneOptions },

    /// Replace the telemetry snapshot.
    SetTelemetry { telemetry: TelemetrySnapshot },

    /// Destroy every entity.
    ClearScene,

    /// Move the camera to an explicit pose.
    MoveTo {
        position: [f32; 3],
        #[serde(default)]
        target: [f32; 3],
        #[serde(default)]
        tag: Option<String>,
    },

    /// Move the camera to a preset named in the options.
    MoveToPreset { tag: String },

    /// Store the current camera pose into the options.
    CapturePosition,
}
