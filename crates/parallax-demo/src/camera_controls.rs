//! Orbit navigation for the viewer camera.
//!
//! Left-drag orbits, right- or middle-drag pans, the scroll wheel zooms
//! toward the target. `F` frames the visible shapes, `Home` returns to the
//! configured camera, and `1`..`9` jump to the configured presets. The camera also answers [`CameraCommand`]s from the
//! plugin: preset moves and position queries.

use bevy::input::mouse::{AccumulatedMouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;

use parallax_bevy::ParallaxCamera;
use parallax_bevy::events::{CameraCommandMessage, CameraResponseMessage};
use parallax_bevy::resources::SceneState;
use parallax_core::bounds::default_view;
use parallax_core::camera::{CameraCommand, CameraResponse, CameraState};

// ── Constants ───────────────────────────────────────────────────────────────

const MIN_DISTANCE: f32 = 0.01;
const MAX_DISTANCE: f32 = 1.0e7;
/// Multiplicative zoom per scroll-wheel line tick.
const ZOOM_FACTOR: f32 = 1.1;
/// Radians of rotation per pixel of drag.
const ORBIT_SPEED: f32 = 0.005;
/// Target travel per pixel of drag, as a fraction of the orbit distance.
const PAN_SPEED: f32 = 0.0015;
/// Keeps the camera off the poles where `looking_at` degenerates.
const PITCH_LIMIT: f32 = 1.55;
/// Keys bound to camera presets, in preset order.
const PRESET_KEYS: [KeyCode; 9] = [
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
    KeyCode::Digit5,
    KeyCode::Digit6,
    KeyCode::Digit7,
    KeyCode::Digit8,
    KeyCode::Digit9,
];

// ── Resource ────────────────────────────────────────────────────────────────

/// Spherical camera placement around a target point.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct Orbit {
    pub target: Vec3,
    /// Rotation about +Y, radians.
    pub yaw: f32,
    /// Elevation above the XZ plane, radians.
    pub pitch: f32,
    pub distance: f32,
}

impl Default for Orbit {
    fn default() -> Self {
        Self::from_pose(Vec3::splat(20.0), Vec3::ZERO)
    }
}

impl Orbit {
    /// The orbit that places the camera at `position` looking at `target`.
    pub fn from_pose(position: Vec3, target: Vec3) -> Self {
        let offset = position - target;
        let distance = offset.length();
        if !distance.is_finite() || distance < MIN_DISTANCE {
            return Self {
                target,
                yaw: 0.0,
                pitch: 0.0,
                distance: MIN_DISTANCE,
            };
        }
        Self {
            target,
            yaw: offset.x.atan2(offset.z),
            pitch: (offset.y / distance).clamp(-1.0, 1.0).asin().clamp(-PITCH_LIMIT, PITCH_LIMIT),
            distance: distance.min(MAX_DISTANCE),
        }
    }

    pub fn position(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target + Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw) * self.distance
    }

    pub fn rotate(&mut self, delta: Vec2) {
        self.yaw -= delta.x * ORBIT_SPEED;
        self.pitch = (self.pitch + delta.y * ORBIT_SPEED).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Move the target in the camera's view plane.
    pub fn pan(&mut self, delta: Vec2, rotation: Quat) {
        let right = rotation * Vec3::X;
        let up = rotation * Vec3::Y;
        self.target += (-right * delta.x + up * delta.y) * self.distance * PAN_SPEED;
    }

    /// Scale the distance by `ZOOM_FACTOR` per tick; positive ticks zoom in.
    pub fn zoom(&mut self, ticks: f32) {
        self.distance = (self.distance / ZOOM_FACTOR.powf(ticks)).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.position()).looking_at(self.target, Vec3::Y)
    }
}

// ── Systems ─────────────────────────────────────────────────────────────────

/// Mouse orbit, pan, and zoom.
pub fn handle_orbit_input(
    buttons: Res<ButtonInput<MouseButton>>,
    motion: Res<AccumulatedMouseMotion>,
    mut scroll: MessageReader<MouseWheel>,
    cameras: Query<&Transform, With<ParallaxCamera>>,
    mut orbit: ResMut<Orbit>,
) {
    let delta = motion.delta;
    if delta != Vec2::ZERO {
        if buttons.pressed(MouseButton::Left) {
            orbit.rotate(delta);
        } else if buttons.pressed(MouseButton::Right) || buttons.pressed(MouseButton::Middle) {
            let rotation = cameras.iter().next().map_or(Quat::IDENTITY, |t| t.rotation);
            orbit.pan(delta, rotation);
        }
    }

    // Accumulate scroll across all events this frame.
    let mut total = 0.0_f32;
    for ev in scroll.read() {
        total += match ev.unit {
            MouseScrollUnit::Line => ev.y,
            MouseScrollUnit::Pixel => ev.y / 50.0,
        };
    }
    if total.abs() >= f32::EPSILON {
        orbit.zoom(total);
    }
}

/// `F` frames everything visible, `Home` returns to the configured camera.
pub fn handle_view_keys(
    keys: Res<ButtonInput<KeyCode>>,
    state: Res<SceneState>,
    mut orbit: ResMut<Orbit>,
) {
    if keys.just_pressed(KeyCode::KeyF) {
        let view = default_view(&state.options, &state.telemetry);
        *orbit = Orbit::from_pose(
            Vec3::from_array(view.camera_position.to_array()),
            Vec3::from_array(view.center.to_array()),
        );
        tracing::debug!("Framed scene: center {:?}, radius {}", view.center, view.radius);
    }
    if keys.just_pressed(KeyCode::Home) {
        let camera = &state.options.camera;
        *orbit = Orbit::from_pose(
            Vec3::from_array(camera.position),
            Vec3::from_array(camera.target),
        );
    }
    let presets = &state.options.camera.presets;
    for (key, preset) in PRESET_KEYS.iter().zip(presets) {
        if keys.just_pressed(*key) {
            *orbit = Orbit::from_pose(
                Vec3::from_array(preset.position),
                Vec3::from_array(preset.target),
            );
            tracing::debug!("Camera moved to preset {}", preset.tag);
        }
    }
}

/// Answer camera commands raised by the plugin.
pub fn handle_camera_commands(
    mut commands: MessageReader<CameraCommandMessage>,
    mut responses: MessageWriter<CameraResponseMessage>,
    cameras: Query<&Projection, With<ParallaxCamera>>,
    mut orbit: ResMut<Orbit>,
) {
    for msg in commands.read() {
        match &msg.command {
            CameraCommand::MoveTo {
                position,
                target,
                tag,
            } => {
                *orbit = Orbit::from_pose(Vec3::from_array(*position), Vec3::from_array(*target));
                tracing::info!("Camera moved to preset {}", tag.as_deref().unwrap_or("<untagged>"));
            }
            CameraCommand::QueryPosition { request } => {
                let fov_y = match cameras.iter().next() {
                    Some(Projection::Perspective(p)) => p.fov,
                    _ => std::f32::consts::FRAC_PI_4,
                };
                let state = CameraState::looking_at(
                    orbit.position().to_array().into(),
                    orbit.target.to_array().into(),
                    fov_y,
                );
                responses.write(CameraResponseMessage {
                    response: CameraResponse::from_state(*request, &state),
                });
            }
        }
    }
}

/// Write the orbit into the camera's transform and target.
pub fn apply_orbit(
    orbit: Res<Orbit>,
    mut cameras: Query<(&mut Transform, &mut ParallaxCamera)>,
) {
    if !orbit.is_changed() {
        return;
    }
    for (mut transform, mut marker) in &mut cameras {
        *transform = orbit.transform();
        marker.target = orbit.target;
    }
}
