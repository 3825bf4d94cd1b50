//! Axis-aligned bounds and the default view volume.
//!
//! The default view frames every visible entity: sphere and model positions,
//! every polyline vertex, and every annotation anchor, resolved against the
//! current telemetry. Camera framing itself belongs to the host; this module
//! only proposes a center, a radius, and a camera position.

use glam::Vec3;

use crate::factory;
use crate::field::FieldResolver;
use crate::shape::SceneOptions;
use crate::telemetry::TelemetrySnapshot;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds3 {
    /// A zero-size box at `point`.
    pub fn from_point(point: Vec3) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// Tightest box around the finite points, or `None` if there are none.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut bounds: Option<Self> = None;
        for point in points.into_iter().filter(|p| p.is_finite()) {
            match bounds.as_mut() {
                Some(b) => b.include(point),
                None => bounds = Some(Self::from_point(point)),
            }
        }
        bounds
    }

    pub fn include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Largest edge length.
    pub fn max_dimension(&self) -> f32 {
        self.size().max_element()
    }

    /// Width over height. `1.0` when the box is flat in Y.
    pub fn aspect_ratio(&self) -> f32 {
        let size = self.size();
        if size.y > f32::EPSILON && size.x.is_finite() {
            size.x / size.y
        } else {
            1.0
        }
    }

    /// Radius of the bounding sphere centered on [`Self::center`].
    pub fn radius(&self) -> f32 {
        self.size().length() * 0.5
    }
}

/// A proposed framing of the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultView {
    pub center: Vec3,
    pub radius: f32,
    pub camera_position: Vec3,
}

/// Smallest radius used for framing, so a single point still gets a view.
const MIN_VIEW_RADIUS: f32 = 1.0;
/// Extra distance beyond the exact fit.
const FRAMING_MARGIN: f32 = 1.25;

impl DefaultView {
    /// Frame `bounds` for a perspective camera with vertical FOV `fov_y` (radians).
    pub fn framing(bounds: Option<Bounds3>, fov_y: f32) -> Self {
        let (center, radius) = match bounds {
            Some(b) => (b.center(), b.radius().max(MIN_VIEW_RADIUS)),
            None => (Vec3::ZERO, MIN_VIEW_RADIUS),
        };
        let half_fov = (fov_y * 0.5).clamp(0.01, 1.5);
        let distance = radius / half_fov.tan() * FRAMING_MARGIN;
        Self {
            center,
            radius,
            camera_position: center + Vec3::ONE.normalize() * distance,
        }
    }
}

/// Bounds of the resolved positions of every visible shape.
pub fn estimate_bounds(options: &SceneOptions, telemetry: &TelemetrySnapshot) -> Option<Bounds3> {
    let resolver = FieldResolver::new(telemetry);
    Bounds3::from_points(
        options
            .visible_shapes()
            .flat_map(|shape| factory::anchor_points(shape, &resolver)),
    )
}

/// The default view volume for the current options and telemetry.
pub fn default_view(options: &SceneOptions, telemetry: &TelemetrySnapshot) -> DefaultView {
    let fov_y = options.camera.fov_degrees.to_radians();
    DefaultView::framing(estimate_bounds(options, telemetry), fov_y)
}
