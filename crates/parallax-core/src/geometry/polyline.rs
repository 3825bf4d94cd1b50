//! Polyline vertex construction with optional Catmull-Rom smoothing.
//!
//! Uses the same uniform Catmull-Rom form as 1D curve evaluation, applied
//! per axis:
//! ```text
//! q(t) = 0.5 × ((2×P1) + (-P0 + P2)×t + (2×P0 - 5×P1 + 4×P2 - P3)×t² + (-P0 + 3×P1 - 3×P2 + P3)×t³)
//! ```
//! Open paths get mirrored phantom endpoints; closed paths wrap around.

use glam::Vec3;

/// Samples generated per span when smoothing.
pub const SMOOTH_SAMPLES_PER_SPAN: usize = 12;

/// Zip resolved coordinate columns into points, truncating to the shortest.
pub fn zip_points(xs: &[f64], ys: &[f64], zs: &[f64]) -> Vec<Vec3> {
    xs.iter()
        .zip(ys)
        .zip(zs)
        .map(|((&x, &y), &z)| Vec3::new(x as f32, y as f32, z as f32))
        .collect()
}

/// Final vertex list for a polyline.
///
/// `close` appends the first point so the path returns to its start. With
/// `smooth` and more than two points the path is resampled through a
/// Catmull-Rom spline; otherwise the points are joined by straight segments.
pub fn build_path(points: Vec<Vec3>, close: bool, smooth: bool) -> Vec<Vec3> {
    let mut points = points;
    if close && points.len() > 1 {
        points.push(points[0]);
    }

    if smooth && points.len() > 2 {
        catmull_rom_path(&points, close, SMOOTH_SAMPLES_PER_SPAN)
    } else {
        points
    }
}

/// Resample `points` through a uniform Catmull-Rom spline.
///
/// For a closed path the last point must repeat the first; neighbours wrap
/// across the seam. The output passes through every input point and ends on
/// the last one.
pub fn catmull_rom_path(points: &[Vec3], closed: bool, samples_per_span: usize) -> Vec<Vec3> {
    let n = points.len();
    if n < 2 || samples_per_span == 0 {
        return points.to_vec();
    }

    // Unique ring for closed paths (the repeated start is dropped).
    let ring = if closed && n > 2 { &points[..n - 1] } else { points };
    let ring_len = ring.len();
    let spans = if closed && n > 2 { ring_len } else { n - 1 };

    let at = |i: isize| -> Vec3 {
        if closed && n > 2 {
            ring[i.rem_euclid(ring_len as isize) as usize]
        } else if i < 0 {
            2.0 * points[0] - points[1]
        } else if i as usize >= n {
            2.0 * points[n - 1] - points[n - 2]
        } else {
            points[i as usize]
        }
    };

    let mut out = Vec::with_capacity(spans * samples_per_span + 1);
    for span in 0..spans as isize {
        let p0 = at(span - 1);
        let p1 = at(span);
        let p2 = at(span + 1);
        let p3 = at(span + 2);
        for step in 0..samples_per_span {
            let t = step as f32 / samples_per_span as f32;
            out.push(catmull_rom(p0, p1, p2, p3, t));
        }
    }
    out.push(*points.last().unwrap_or(&Vec3::ZERO));
    out
}

/// Catmull-Rom cubic interpolation between `p1` and `p2`.
fn catmull_rom(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}
