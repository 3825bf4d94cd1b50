//! Camera, lights, and startup data for the viewer.
//!
//! Lighting is minimal: one directional light and ambient fill driven by
//! `LightingSettings`, re-applied whenever the options change it.

use bevy::prelude::*;

use parallax_bevy::ParallaxCamera;
use parallax_bevy::events::{SetOptions, SetTelemetry};
use parallax_bevy::resources::SceneState;
use parallax_core::shape::{CameraSettings, LightingSettings, SceneOptions};
use parallax_core::telemetry::TelemetrySnapshot;

use crate::camera_controls::Orbit;
use crate::config::AppConfig;

/// Far enough to keep planetary-scale telemetry on screen.
const FAR_PLANE: f32 = 1.0e9;
const NEAR_PLANE: f32 = 0.01;

/// Marker for the viewer's key light.
#[derive(Component)]
pub struct KeyLight;

/// Startup system: spawn the camera and the key light.
pub fn spawn_viewer(mut commands: Commands, orbit: Res<Orbit>) {
    let settings = CameraSettings::default();
    let lighting = LightingSettings::default();

    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: settings.fov_degrees.to_radians(),
            near: NEAR_PLANE,
            far: FAR_PLANE,
            ..default()
        }),
        orbit.transform(),
        ParallaxCamera {
            target: orbit.target,
        },
        AmbientLight {
            brightness: lighting.ambient_brightness,
            ..default()
        },
        Name::new("viewer camera"),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: lighting.directional_illuminance,
            shadows_enabled: false,
            ..default()
        },
        light_transform(&lighting),
        KeyLight,
        Name::new("key light"),
    ));
}

/// Startup system: load the options and telemetry files named in the config.
pub fn load_initial_data(
    config: Res<AppConfig>,
    mut options_out: MessageWriter<SetOptions>,
    mut telemetry_out: MessageWriter<SetTelemetry>,
) {
    if let Some(path) = &config.options_path {
        match SceneOptions::load(path) {
            Ok(options) => {
                tracing::info!(
                    "Loaded {} shapes from {}",
                    options.shapes.len(),
                    path.display()
                );
                options_out.write(SetOptions { options });
            }
            Err(e) => tracing::error!("Failed to load options {}: {e}", path.display()),
        }
    }
    if let Some(path) = &config.telemetry_path {
        match TelemetrySnapshot::load(path) {
            Ok(telemetry) => {
                tracing::info!(
                    "Loaded {} telemetry series from {}",
                    telemetry.series.len(),
                    path.display()
                );
                telemetry_out.write(SetTelemetry { telemetry });
            }
            Err(e) => tracing::error!("Failed to load telemetry {}: {e}", path.display()),
        }
    }
}

/// Re-apply camera and lighting settings when the options change them.
pub fn sync_scene_settings(
    state: Res<SceneState>,
    mut last_camera: Local<Option<CameraSettings>>,
    mut last_lighting: Local<Option<LightingSettings>>,
    mut orbit: ResMut<Orbit>,
    mut cameras: Query<(&mut Projection, &mut AmbientLight), With<ParallaxCamera>>,
    mut lights: Query<(&mut DirectionalLight, &mut Transform), With<KeyLight>>,
) {
    let camera = &state.options.camera;
    if last_camera.as_ref() != Some(camera) {
        *orbit = Orbit::from_pose(
            Vec3::from_array(camera.position),
            Vec3::from_array(camera.target),
        );
        for (mut projection, _) in &mut cameras {
            if let Projection::Perspective(p) = &mut *projection {
                p.fov = camera.fov_degrees.clamp(1.0, 170.0).to_radians();
            }
        }
        *last_camera = Some(camera.clone());
    }

    let lighting = &state.options.lighting;
    if last_lighting.as_ref() != Some(lighting) {
        for (_, mut ambient) in &mut cameras {
            ambient.brightness = lighting.ambient_brightness;
        }
        for (mut light, mut transform) in &mut lights {
            light.illuminance = lighting.directional_illuminance;
            *transform = light_transform(lighting);
        }
        *last_lighting = Some(lighting.clone());
    }
}

/// A directional light pointing along `lighting.direction`.
fn light_transform(lighting: &LightingSettings) -> Transform {
    let direction = Vec3::from_array(lighting.direction)
        .try_normalize()
        .unwrap_or(Vec3::NEG_Y);
    let up = if direction.abs_diff_eq(Vec3::NEG_Y, 1e-3) || direction.abs_diff_eq(Vec3::Y, 1e-3) {
        Vec3::Z
    } else {
        Vec3::Y
    };
    Transform::default().looking_to(direction, up)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_points_along_direction() {
        let lighting = LightingSettings {
            direction: [0.0, -2.0, 0.0],
            ..Default::default()
        };
        let transform = light_transform(&lighting);
        assert!(transform.forward().as_vec3().abs_diff_eq(Vec3::NEG_Y, 1e-5));
    }

    #[test]
    fn test_degenerate_direction_points_down() {
        let lighting = LightingSettings {
            direction: [0.0, 0.0, 0.0],
            ..Default::default()
        };
        let transform = light_transform(&lighting);
        assert!(transform.forward().as_vec3().abs_diff_eq(Vec3::NEG_Y, 1e-5));
    }
}
