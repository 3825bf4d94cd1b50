//! Parallax Bevy Plugin — runs the telemetry-driven scene inside Bevy's ECS.
//!
//! Provides `ParallaxPlugin`, which registers the messages, resources, and
//! systems that keep the live scene graph in line with the options and
//! telemetry snapshots, and that rescale entities as the camera moves.
//!
//! The host owns the camera. Tag it with [`ParallaxCamera`] so the scaling
//! pass can read its pose.

pub mod backend;
pub mod events;
pub mod meshes;
pub mod resources;
pub mod systems;

use bevy::prelude::*;

use events::{
    CameraCommandMessage, CameraResponseMessage, CaptureCameraPosition, ClearScene,
    OptionsEchoed, SetOptions, SetTelemetry,
};
use resources::{
    CameraQueries, CameraReadout, CurrentCamera, LabelFontState, ParallaxConfig,
    PendingModelLoads, SceneState,
};
use systems::{
    apply_config, apply_frame_scaling, apply_scene_messages, expire_camera_queries,
    extract_camera_state, handle_camera_messages, poll_model_loads, reconcile_scene,
    update_camera_readout,
};

/// Marks the camera whose pose drives view-angle scaling.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct ParallaxCamera {
    /// Point the camera orbits around.
    pub target: Vec3,
}

/// Main Bevy plugin for the scene pipeline.
///
/// Registers resources, messages, and systems for:
/// - Storing options/telemetry snapshots and reconciling on change
/// - Polling asynchronous glTF loads through the generation gate
/// - Per-frame view-angle scaling and callout layout
/// - Camera position queries and the readout resource
///
/// Insert a [`ParallaxConfig`] before adding the plugin to override the
/// defaults.
pub struct ParallaxPlugin;

impl Plugin for ParallaxPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<SetOptions>()
            .add_message::<SetTelemetry>()
            .add_message::<ClearScene>()
            .add_message::<CaptureCameraPosition>()
            .add_message::<CameraCommandMessage>()
            .add_message::<CameraResponseMessage>()
            .add_message::<OptionsEchoed>()
            .init_resource::<ParallaxConfig>()
            .init_resource::<SceneState>()
            .init_resource::<LabelFontState>()
            .init_resource::<PendingModelLoads>()
            .init_resource::<CurrentCamera>()
            .init_resource::<CameraQueries>()
            .init_resource::<CameraReadout>()
            .add_systems(Startup, apply_config)
            .add_systems(
                Update,
                (
                    apply_scene_messages,
                    reconcile_scene.after(apply_scene_messages),
                    poll_model_loads.after(reconcile_scene),
                    extract_camera_state,
                    apply_frame_scaling
                        .after(poll_model_loads)
                        .after(extract_camera_state),
                    handle_camera_messages,
                    expire_camera_queries.after(handle_camera_messages),
                    update_camera_readout.after(apply_frame_scaling),
                ),
            );
    }
}
