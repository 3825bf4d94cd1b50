//! View-angle auto-scaling.
//!
//! Keeps an entity's apparent (angular) size near a target regardless of how
//! far away the camera is, so a docking port at 20 m and a planet at 2 AU are
//! both legible without per-object tuning.
//!
//! # Algorithm
//! ```text
//! requiredSize = 2 × distance × tan(targetAngularSize / 2)
//! rawScale     = clamp(requiredSize / originalSize, minSize, maxSize)
//! scale        = rawScale × clamp(aspectRatio, 0.5, 2.0)
//! ```
//! The caller multiplies `scale` by the entity's `originalScale` (the
//! author's scale factor and unit conversion) before assigning it.
//!
//! Annotations use a cheaper rule: [`callout_distance_scale`] grows linearly
//! with camera distance.

use crate::scene::EntityMetrics;
use crate::shape::ViewAngleSettings;

/// Per-entity copy of the view-angle parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewAngleConfig {
    pub enabled: bool,
    /// Radians.
    pub target_angular_size: f32,
    pub min_size: f32,
    pub max_size: f32,
}

impl ViewAngleConfig {
    /// Mirror the global settings, with the entity's own enabled flag.
    ///
    /// Non-finite or non-positive values fall back to the defaults, and an
    /// inverted `min_size`/`max_size` pair is swapped, so the result is always
    /// a usable clamp range.
    pub fn from_settings(settings: &ViewAngleSettings, enabled: bool) -> Self {
        let defaults = ViewAngleSettings::default();
        let target_angular_size = positive_or(
            settings.target_angular_size,
            defaults.target_angular_size,
            "targetAngularSize",
        );
        let mut min_size = positive_or(settings.min_size, defaults.min_size, "minSize");
        let mut max_size = positive_or(settings.max_size, defaults.max_size, "maxSize");
        if min_size > max_size {
            tracing::warn!("View-angle minSize {min_size} exceeds maxSize {max_size}, swapping");
            std::mem::swap(&mut min_size, &mut max_size);
        }
        Self {
            enabled,
            target_angular_size,
            min_size,
            max_size,
        }
    }

    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            target_angular_size: 0.0,
            min_size: 1.0,
            max_size: 1.0,
        }
    }
}

impl Default for ViewAngleConfig {
    fn default() -> Self {
        Self::from_settings(&ViewAngleSettings::default(), false)
    }
}

fn positive_or(value: f32, fallback: f32, name: &str) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        tracing::warn!("Invalid view-angle {name} {value}, using {fallback}");
        fallback
    }
}

/// Aspect-ratio adjustment bounds.
const MIN_ASPECT: f32 = 0.5;
const MAX_ASPECT: f32 = 2.0;

/// Scale multiplier that keeps `metrics`' entity at the configured angular
/// size when seen from `distance`.
///
/// The result is relative to the entity's local size; callers multiply it
/// by `metrics.original_scale`.
///
/// Returns exactly `1.0` when scaling is disabled or the camera sits on the
/// entity. When no reference size is known yet the metrics' bounds are used;
/// with neither available the result is `1.0`. The function is pure: callers
/// re-run it every frame the camera or the entity moves.
pub fn view_angle_scale(metrics: &EntityMetrics, distance: f32, config: &ViewAngleConfig) -> f32 {
    if !config.enabled || distance == 0.0 {
        return 1.0;
    }

    let required_size = 2.0 * distance * (config.target_angular_size / 2.0).tan();

    let reference = metrics.reference_size();
    if !(reference > 0.0) || !required_size.is_finite() {
        tracing::warn!(
            "view-angle scale: invalid reference size {reference} or distance {distance}, using 1.0"
        );
        return 1.0;
    }

    // `f32::clamp` asserts min <= max; configs built by hand may not be sanitized.
    let raw_scale = (required_size / reference)
        .max(config.min_size)
        .min(config.max_size);
    let aspect = metrics.aspect_ratio.unwrap_or(1.0).clamp(MIN_ASPECT, MAX_ASPECT);
    let scale = raw_scale * aspect;

    if scale.is_finite() { scale } else { 1.0 }
}

/// Smallest multiplier applied to callouts, so they never vanish up close.
pub const MIN_CALLOUT_SCALE: f32 = 0.1;

/// Distance-proportional callout scale: `max(0.1, distance / reference)`.
pub fn callout_distance_scale(distance: f32, reference_distance: f32) -> f32 {
    let scale = distance / reference_distance;
    if scale.is_finite() {
        scale.max(MIN_CALLOUT_SCALE)
    } else {
        MIN_CALLOUT_SCALE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::Bounds3;
    use glam::Vec3;

    fn config(target: f32, min: f32, max: f32) -> ViewAngleConfig {
        ViewAngleConfig {
            enabled: true,
            target_angular_size: target,
            min_size: min,
            max_size: max,
        }
    }

    fn sized(original_size: f32) -> EntityMetrics {
        EntityMetrics {
            original_size: Some(original_size),
            ..Default::default()
        }
    }

    #[test]
    fn test_reference_example() {
        let scale = view_angle_scale(&sized(2.0), 100.0, &config(0.02, 1e-3, 1e6));
        let expected = 200.0 * 0.01_f32.tan() / 2.0;
        assert!((scale - expected).abs() < 1e-6, "scale={scale}");
        assert!((scale - 1.00003).abs() < 1e-4);
    }

    #[test]
    fn test_disabled_is_exactly_one() {
        let mut cfg = config(0.02, 1e-3, 1e6);
        cfg.enabled = false;
        for distance in [0.0, 1.0, 1e3, 1e9] {
            assert_eq!(view_angle_scale(&sized(2.0), distance, &cfg), 1.0);
        }
    }

    #[test]
    fn test_zero_distance_is_exactly_one() {
        assert_eq!(view_angle_scale(&sized(2.0), 0.0, &config(0.02, 1e-3, 1e6)), 1.0);
    }

    #[test]
    fn test_monotonic_in_distance_within_clamps() {
        let cfg = config(0.02, 0.5, 50.0);
        let metrics = sized(2.0);
        let mut previous = 0.0;
        for step in 1..2000 {
            let distance = step as f32 * 5.0;
            let scale = view_angle_scale(&metrics, distance, &cfg);
            assert!(scale >= previous, "scale dropped at distance {distance}");
            assert!((0.5..=50.0).contains(&scale));
            previous = scale;
        }
        // Both clamps were reached.
        assert_eq!(view_angle_scale(&metrics, 1.0, &cfg), 0.5);
        assert_eq!(view_angle_scale(&metrics, 1e7, &cfg), 50.0);
    }

    #[test]
    fn test_aspect_ratio_is_clamped() {
        let cfg = config(0.02, 1e-3, 1e6);
        let base = view_angle_scale(&sized(2.0), 100.0, &cfg);

        let wide = EntityMetrics {
            aspect_ratio: Some(10.0),
            ..sized(2.0)
        };
        assert!((view_angle_scale(&wide, 100.0, &cfg) - base * 2.0).abs() < 1e-5);

        let tall = EntityMetrics {
            aspect_ratio: Some(0.1),
            ..sized(2.0)
        };
        assert!((view_angle_scale(&tall, 100.0, &cfg) - base * 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_missing_size_falls_back_to_bounds() {
        let metrics = EntityMetrics {
            original_size: None,
            bounds: Some(Bounds3 {
                min: Vec3::splat(-1.0),
                max: Vec3::splat(1.0),
            }),
            ..Default::default()
        };
        let cfg = config(0.02, 1e-3, 1e6);
        let expected = view_angle_scale(&sized(2.0), 100.0, &cfg);
        assert!((view_angle_scale(&metrics, 100.0, &cfg) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_size_returns_one() {
        let metrics = EntityMetrics::default();
        assert_eq!(view_angle_scale(&metrics, 100.0, &config(0.02, 1e-3, 1e6)), 1.0);
    }

    #[test]
    fn test_scale_ignores_original_scale() {
        let cfg = config(0.02, 1e-3, 1e6);
        let scaled = EntityMetrics {
            original_scale: 1000.0,
            ..sized(2.0)
        };
        assert_eq!(
            view_angle_scale(&scaled, 100.0, &cfg),
            view_angle_scale(&sized(2.0), 100.0, &cfg)
        );
    }

    #[test]
    fn test_inverted_settings_are_swapped() {
        let settings = ViewAngleSettings {
            enabled: true,
            min_size: 10.0,
            max_size: 1.0,
            ..Default::default()
        };
        let cfg = ViewAngleConfig::from_settings(&settings, true);
        assert_eq!((cfg.min_size, cfg.max_size), (1.0, 10.0));
        let scale = view_angle_scale(&sized(2.0), 1e7, &cfg);
        assert_eq!(scale, 10.0);
    }

    #[test]
    fn test_invalid_settings_fall_back_to_defaults() {
        let defaults = ViewAngleSettings::default();
        let settings = ViewAngleSettings {
            enabled: true,
            target_angular_size: f32::NAN,
            min_size: -1.0,
            max_size: f32::INFINITY,
        };
        let cfg = ViewAngleConfig::from_settings(&settings, true);
        assert_eq!(cfg.target_angular_size, defaults.target_angular_size);
        assert_eq!(cfg.min_size, defaults.min_size);
        assert_eq!(cfg.max_size, defaults.max_size);
    }

    #[test]
    fn test_unsanitized_inverted_range_does_not_panic() {
        let scale = view_angle_scale(&sized(2.0), 100.0, &config(0.02, 10.0, 1.0));
        assert!(scale.is_finite());
    }

    #[test]
    fn test_callout_distance_scale_floor() {
        assert_eq!(callout_distance_scale(0.0, 10.0), MIN_CALLOUT_SCALE);
        assert_eq!(callout_distance_scale(0.5, 10.0), MIN_CALLOUT_SCALE);
        assert!((callout_distance_scale(25.0, 10.0) - 2.5).abs() < 1e-6);
    }
}
