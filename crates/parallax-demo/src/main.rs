//! Parallax Demo — standalone telemetry scene viewer.
//!
//! Runs the Parallax plugin with an orbit camera and lights, loads options
//! and telemetry from JSON files at startup, and accepts live updates from a
//! host over a WebSocket bridge.

mod camera_controls;
mod config;
mod ipc;
mod scene_setup;
mod ws_bridge;

use bevy::prelude::*;

use parallax_bevy::ParallaxPlugin;
use parallax_bevy::resources::ParallaxConfig;
use parallax_bevy::systems::{extract_camera_state, update_camera_readout};

use camera_controls::{
    Orbit, apply_orbit, handle_camera_commands, handle_orbit_input, handle_view_keys,
};
use config::AppConfig;
use scene_setup::{load_initial_data, spawn_viewer, sync_scene_settings};
use ws_bridge::{
    OutboundHostMessages, WsBridge, flush_outbound_messages, forward_echoed_options,
    poll_inbound_messages, publish_camera_readout,
};

fn main() {
    let config = AppConfig::default();
    let (outbound_tx, inbound_rx) = ws_bridge::spawn_ws_server(config.ws_port);

    let mut window = Window {
        title: "Parallax".into(),
        ..default()
    };
    window.resolution.set(config.width, config.height);

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(window),
            ..default()
        }))
        .insert_resource(ParallaxConfig {
            label_font: config.font_path.clone(),
            ..default()
        })
        .add_plugins(ParallaxPlugin)
        .insert_resource(config)
        .insert_resource(WsBridge {
            outbound_tx,
            inbound_rx,
        })
        .init_resource::<OutboundHostMessages>()
        .init_resource::<Orbit>()
        .add_systems(Startup, (spawn_viewer, load_initial_data))
        .add_systems(
            Update,
            (
                poll_inbound_messages,
                sync_scene_settings.after(poll_inbound_messages),
                handle_orbit_input.after(sync_scene_settings),
                handle_view_keys.after(handle_orbit_input),
                handle_camera_commands.after(handle_view_keys),
                apply_orbit
                    .after(handle_camera_commands)
                    .before(extract_camera_state),
                forward_echoed_options,
                publish_camera_readout.after(update_camera_readout),
                flush_outbound_messages
                    .after(forward_echoed_options)
                    .after(publish_camera_readout)
                    .after(poll_inbound_messages),
            ),
        )
        .run();
}
