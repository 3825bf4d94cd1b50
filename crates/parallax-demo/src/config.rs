//! Application configuration for the demo viewer.

use std::path::PathBuf;

use bevy::prelude::*;

/// Default WebSocket port for the host bridge.
const DEFAULT_WS_PORT: u16 = 9410;
/// Default window width.
const DEFAULT_WIDTH: f32 = 1600.0;
/// Default window height.
const DEFAULT_HEIGHT: f32 = 900.0;

/// Runtime configuration for the viewer, read from the environment.
#[derive(Resource, Clone, Debug)]
pub struct AppConfig {
    /// WebSocket port for host <-> viewer messages.
    pub ws_port: u16,
    /// Options JSON loaded at startup.
    pub options_path: Option<PathBuf>,
    /// Telemetry JSON loaded at startup.
    pub telemetry_path: Option<PathBuf>,
    /// Font used for annotation labels.
    pub font_path: Option<PathBuf>,
    /// Window width in logical pixels.
    pub width: f32,
    /// Window height in logical pixels.
    pub height: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl AppConfig {
    /// Build the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let path = |key: &str| lookup(key).filter(|s| !s.is_empty()).map(PathBuf::from);
        let dimension = |key: &str, default: f32| {
            lookup(key)
                .and_then(|s| s.parse::<f32>().ok())
                .filter(|v| v.is_finite() && *v >= 100.0)
                .unwrap_or(default)
        };
        Self {
            ws_port: lookup("PARALLAX_WS_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_WS_PORT),
            options_path: path("PARALLAX_OPTIONS"),
            telemetry_path: path("PARALLAX_TELEMETRY"),
            font_path: path("PARALLAX_FONT"),
            width: dimension("PARALLAX_WIDTH", DEFAULT_WIDTH),
            height: dimension("PARALLAX_HEIGHT", DEFAULT_HEIGHT),
        }
    }
}
