//! Bevy messages for driving the scene from the host.

use bevy::prelude::*;
use parallax_core::camera::{CameraCommand, CameraResponse};
use parallax_core::shape::SceneOptions;
use parallax_core::telemetry::TelemetrySnapshot;

/// Replace the declarative options snapshot.
#[derive(Message)]
pub struct SetOptions {
    pub options: SceneOptions,
}

/// Replace the telemetry snapshot.
#[derive(Message)]
pub struct SetTelemetry {
    pub telemetry: TelemetrySnapshot,
}

/// Destroy every entity. The next options or telemetry update rebuilds.
#[derive(Message)]
pub struct ClearScene;

/// Ask for the current camera pose to be stored as the configured camera.
#[derive(Message)]
pub struct CaptureCameraPosition;

/// Request to whoever owns the camera.
#[derive(Message)]
pub struct CameraCommandMessage {
    pub command: CameraCommand,
}

/// Answer from the camera owner to a [`CameraCommand::QueryPosition`].
#[derive(Message)]
pub struct CameraResponseMessage {
    pub response: CameraResponse,
}

/// Fired when the plugin changed the options itself (e.g. a captured
/// camera position), so the host can persist them.
#[derive(Message)]
pub struct OptionsEchoed {
    pub options: SceneOptions,
}
