//! Camera state and the typed camera command channel.
//!
//! The camera itself belongs to the host. The core only reads a
//! [`CameraState`] each frame and exchanges [`CameraCommand`]s and
//! [`CameraResponse`]s with whoever drives the camera. Position queries are
//! correlated by [`RequestId`] and answered at most once.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::shape::{CameraPreset, CameraSettings};

/// Camera pose supplied by the host every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub position: Vec3,
    pub target: Vec3,
    pub rotation: Quat,
    /// Vertical field of view, radians.
    pub fov_y: f32,
}

impl CameraState {
    /// A camera at `position` looking at `target` with +Y up.
    pub fn looking_at(position: Vec3, target: Vec3, fov_y: f32) -> Self {
        let view = Mat4::look_at_rh(position, target, Vec3::Y);
        let rotation = Quat::from_mat4(&view).inverse().normalize();
        let rotation = if rotation.is_finite() {
            rotation
        } else {
            Quat::IDENTITY
        };
        Self {
            position,
            target,
            rotation,
            fov_y,
        }
    }

    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.position.distance(point)
    }

    /// Distance from the camera to its orbit target.
    pub fn target_distance(&self) -> f32 {
        self.position.distance(self.target)
    }
}

impl Default for CameraState {
    fn default() -> Self {
        let settings = CameraSettings::default();
        Self::looking_at(
            Vec3::from_array(settings.position),
            Vec3::from_array(settings.target),
            settings.fov_degrees.to_radians(),
        )
    }
}

/// Correlates a position query with its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

/// Requests sent to the camera owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CameraCommand {
    /// Move to a preset position.
    MoveTo {
        position: [f32; 3],
        target: [f32; 3],
        #[serde(default)]
        tag: Option<String>,
    },
    /// Report the current position.
    QueryPosition { request: RequestId },
}

impl CameraCommand {
    /// Move to a named preset, carrying its tag.
    pub fn move_to_preset(preset: &CameraPreset) -> Self {
        Self::MoveTo {
            position: preset.position,
            target: preset.target,
            tag: Some(preset.tag.clone()),
        }
    }
}

/// Answer to [`CameraCommand::QueryPosition`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraResponse {
    pub request: RequestId,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl CameraResponse {
    pub fn from_state(request: RequestId, state: &CameraState) -> Self {
        Self {
            request,
            position: state.position.to_array(),
            target: state.target.to_array(),
        }
    }

    /// Store the reported pose as the configured camera position.
    pub fn capture_into(&self, settings: &mut CameraSettings) {
        settings.position = self.position;
        settings.target = self.target;
    }
}

/// How long a position query may stay unanswered.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Outstanding position queries.
#[derive(Debug)]
pub struct PositionQueries {
    next_id: u64,
    timeout: Duration,
    outstanding: HashMap<RequestId, Instant>,
}

impl Default for PositionQueries {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_TIMEOUT)
    }
}

impl PositionQueries {
    pub fn new(timeout: Duration) -> Self {
        Self {
            next_id: 0,
            timeout,
            outstanding: HashMap::new(),
        }
    }

    /// Register a new query and return its id.
    pub fn issue(&mut self, now: Instant) -> RequestId {
        self.next_id += 1;
        let id = RequestId(self.next_id);
        self.outstanding.insert(id, now);
        id
    }

    /// Accept a response if its query is still outstanding.
    ///
    /// Unknown, duplicate, and late responses are dropped.
    pub fn accept(&mut self, response: CameraResponse, now: Instant) -> Option<CameraResponse> {
        let Some(issued) = self.outstanding.remove(&response.request) else {
            tracing::debug!("Dropping camera response for unknown request {:?}", response.request);
            return None;
        };
        if now.duration_since(issued) > self.timeout {
            tracing::warn!("Camera response for {:?} arrived after the deadline", response.request);
            return None;
        }
        Some(response)
    }

    /// Abandon queries older than the timeout and return their ids.
    pub fn expire(&mut self, now: Instant) -> Vec<RequestId> {
        let timeout = self.timeout;
        let mut expired = Vec::new();
        self.outstanding.retain(|id, issued| {
            let alive = now.duration_since(*issued) <= timeout;
            if !alive {
                expired.push(*id);
            }
            alive
        });
        for id in &expired {
            tracing::warn!("Camera position query {id:?} timed out");
        }
        expired
    }

    pub fn pending(&self) -> usize {
        self.outstanding.len()
    }
}
