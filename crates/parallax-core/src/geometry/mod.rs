//! Backend-neutral geometry: polyline paths and annotation callouts.

pub mod callout;
pub mod polyline;

/// Edge of the stand-in cube drawn for a model without a URL.
///
/// `2√3/3`, so the cube's half-diagonal is exactly one unit.
pub const DEFAULT_CUBE_EDGE: f32 = 1.154_700_5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cube_half_diagonal_is_unit() {
        let half_diagonal = (3.0_f32).sqrt() * DEFAULT_CUBE_EDGE / 2.0;
        assert!((half_diagonal - 1.0).abs() < 1e-6);
    }
}
