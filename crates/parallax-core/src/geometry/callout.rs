//! Annotation callout layout.
//!
//! A callout is a two-segment connector from an anchor point to a label:
//!
//! ```text
//!                 elbow ──────── end [ label ]
//!                /
//!         anchor
//! ```
//!
//! The first segment leaves the anchor at 45° (right and up, or left and
//! down when inverted); the second runs horizontally. Both are expressed in
//! the camera's screen axes so the connector reads the same from any angle,
//! and the whole callout grows with camera distance.

use glam::{Quat, Vec2, Vec3};

/// Length of the diagonal connector segment at scale 1.
pub const SEGMENT_LENGTH: f32 = 0.5;
/// Length of the horizontal connector segment at scale 1.
pub const TOOLTIP_OFFSET: f32 = 0.3;
/// Camera distance at which callouts are drawn at scale 1.
pub const REFERENCE_DISTANCE: f32 = 10.0;
/// Label height in scene units at scale 1.
pub const LABEL_WORLD_HEIGHT: f32 = 0.25;

/// World-space placement of one callout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalloutLayout {
    /// Anchor, elbow, and end of the connector.
    pub connector: [Vec3; 3],
    pub label_center: Vec3,
    /// Label quad size in scene units.
    pub label_size: Vec2,
    /// Billboard rotation (the camera's own rotation).
    pub label_rotation: Quat,
}

/// Lay out a callout for a label of `label_px` texture pixels.
///
/// `sign` is `1.0` for normal callouts and `-1.0` for inverted ones.
pub fn layout_callout(
    anchor: Vec3,
    label_px: Vec2,
    sign: f32,
    scale: f32,
    camera_rotation: Quat,
) -> CalloutLayout {
    let right = camera_rotation * Vec3::X;
    let up = camera_rotation * Vec3::Y;

    let diagonal = (right + up) * std::f32::consts::FRAC_1_SQRT_2;
    let elbow = anchor + diagonal * (sign * SEGMENT_LENGTH * scale);
    let end = elbow + right * (sign * TOOLTIP_OFFSET * scale);

    let label_size = label_world_size(label_px, scale);
    let label_center = end + right * (sign * label_size.x * 0.5);

    CalloutLayout {
        connector: [anchor, elbow, end],
        label_center,
        label_size,
        label_rotation: camera_rotation,
    }
}

/// Label quad size in scene units, keeping the texture's aspect ratio.
pub fn label_world_size(label_px: Vec2, scale: f32) -> Vec2 {
    let height = LABEL_WORLD_HEIGHT * scale;
    let aspect = if label_px.y > 0.0 {
        label_px.x / label_px.y
    } else {
        1.0
    };
    Vec2::new(height * aspect, height)
}
