//! Bevy systems for the scene pipeline.
//!
//! These systems are the ONLY place the id → entity map changes. The host
//! sends options and telemetry via messages, Bevy reconciles once per frame,
//! and the per-frame scaling pass runs after the camera pose is extracted.

use bevy::prelude::*;
use std::time::Instant;

use parallax_core::camera::{CameraCommand, CameraState, PositionQueries};
use parallax_core::label::LabelFont;
use parallax_core::scene::LoadOutcome;

use crate::ParallaxCamera;
use crate::backend::BevySceneBackend;
use crate::events::{
    CameraCommandMessage, CameraResponseMessage, CaptureCameraPosition, ClearScene,
    OptionsEchoed, SetOptions, SetTelemetry,
};
use crate::resources::{
    CameraQueries, CameraReadout, CurrentCamera, LabelFontState, ParallaxConfig, SceneState,
};

/// Startup system: load the label font and apply library configuration.
pub fn apply_config(
    config: Res<ParallaxConfig>,
    mut font_state: ResMut<LabelFontState>,
    mut state: ResMut<SceneState>,
    mut queries: ResMut<CameraQueries>,
) {
    if let Some(path) = &config.label_font {
        match LabelFont::load(path) {
            Ok(font) => {
                tracing::info!("Loaded label font from {}", path.display());
                font_state.font = Some(font);
            }
            Err(e) => tracing::warn!("Label font {} unusable: {e}", path.display()),
        }
    }
    state.reconciler.set_label_font(font_state.font.clone());
    state
        .reconciler
        .set_callout_reference_distance(config.callout_reference_distance);
    queries.queries = PositionQueries::new(config.query_timeout);
}

/// Store inbound options and telemetry snapshots.
///
/// The latest snapshot of each kind wins. A `ClearScene` destroys everything
/// immediately; anything received after it in the same frame rebuilds.
pub fn apply_scene_messages(
    mut options: MessageReader<SetOptions>,
    mut telemetry: MessageReader<SetTelemetry>,
    mut clears: MessageReader<ClearScene>,
    mut state: ResMut<SceneState>,
    mut backend: BevySceneBackend,
) {
    if clears.read().count() > 0 {
        state.reconciler.clear(&mut backend);
        state.dirty = false;
        tracing::info!("Scene cleared");
    }
    if let Some(msg) = options.read().last() {
        state.options = msg.options.clone();
        state.dirty = true;
    }
    if let Some(msg) = telemetry.read().last() {
        state.telemetry = msg.telemetry.clone();
        state.dirty = true;
    }
}

/// Reconcile the scene graph against the stored snapshots when they changed.
pub fn reconcile_scene(mut state: ResMut<SceneState>, mut backend: BevySceneBackend) {
    if !state.dirty {
        return;
    }
    let state = &mut *state;
    state.dirty = false;
    let report = state
        .reconciler
        .reconcile(&state.options, &state.telemetry, &mut backend);
    tracing::debug!("Reconciled scene: {report:?}");
}

/// Feed finished glTF loads back into the reconciler.
pub fn poll_model_loads(mut state: ResMut<SceneState>, mut backend: BevySceneBackend) {
    for (ticket, result) in backend.take_finished_loads() {
        let outcome = state
            .reconciler
            .complete_model_load(&ticket, result, &mut backend);
        if outcome == LoadOutcome::Applied {
            tracing::info!("Model `{}` ready for `{}`", ticket.url, ticket.id);
        }
    }
}

/// Read the pose of the camera tagged with [`ParallaxCamera`].
///
/// Reads `Transform` rather than `GlobalTransform` so the pose is current
/// within the frame it was moved in.
pub fn extract_camera_state(
    cameras: Query<(&Transform, &Projection, &ParallaxCamera)>,
    mut current: ResMut<CurrentCamera>,
) {
    let Some((transform, projection, marker)) = cameras.iter().next() else {
        return;
    };
    let fov_y = match projection {
        Projection::Perspective(p) => p.fov,
        _ => current.state.fov_y,
    };
    current.state = CameraState {
        position: glam::Vec3::from_array(transform.translation.to_array()),
        target: glam::Vec3::from_array(marker.target.to_array()),
        rotation: glam::Quat::from_array(transform.rotation.to_array()),
        fov_y,
    };
}

/// Per-frame view-angle scaling and callout layout.
pub fn apply_frame_scaling(
    mut state: ResMut<SceneState>,
    camera: Res<CurrentCamera>,
    mut backend: BevySceneBackend,
) {
    if state.reconciler.is_empty() {
        return;
    }
    state.reconciler.apply_frame_scaling(&camera.state, &mut backend);
}

/// Turn capture requests into position queries and apply their answers.
pub fn handle_camera_messages(
    mut captures: MessageReader<CaptureCameraPosition>,
    mut responses: MessageReader<CameraResponseMessage>,
    mut queries: ResMut<CameraQueries>,
    mut state: ResMut<SceneState>,
    mut commands_out: MessageWriter<CameraCommandMessage>,
    mut echoed: MessageWriter<OptionsEchoed>,
) {
    let now = Instant::now();
    for _ in captures.read() {
        let request = queries.queries.issue(now);
        commands_out.write(CameraCommandMessage {
            command: CameraCommand::QueryPosition { request },
        });
    }

    for msg in responses.read() {
        let Some(response) = queries.queries.accept(msg.response, now) else {
            continue;
        };
        response.capture_into(&mut state.options.camera);
        tracing::info!(
            "Captured camera position {:?} -> {:?}",
            response.position,
            response.target
        );
        echoed.write(OptionsEchoed {
            options: state.options.clone(),
        });
    }
}

/// Drop position queries nobody answered in time.
pub fn expire_camera_queries(mut queries: ResMut<CameraQueries>) {
    if queries.queries.pending() == 0 {
        return;
    }
    queries.queries.expire(Instant::now());
}

pub fn update_camera_readout(
    camera: Res<CurrentCamera>,
    state: Res<SceneState>,
    mut readout: ResMut<CameraReadout>,
) {
    let cam = &camera.state;
    *readout = CameraReadout {
        position: Vec3::from_array(cam.position.to_array()),
        target: Vec3::from_array(cam.target.to_array()),
        distance: cam.target_distance(),
        entity_count: state.reconciler.len(),
    };
}
