//! Geometry helpers for range checks and path interpolation.
//!
//! Contains helper functions for:
//! - Pairwise proximity tests between two circular footprints
//! - Point-in-circle tests used by motion detection
//! - Linear interpolation along a path segment
//! - Distance calculations (squared distance to avoid sqrt in hot paths)

use super::types::Point;

/// Radius assumed for a sensor that has none configured.
pub const DEFAULT_SENSOR_RADIUS: f64 = 150.0;

/// Radius assumed for a device that has none configured.
pub const DEFAULT_DEVICE_RADIUS: f64 = 30.0;

/// Squared Euclidean distance in plan units.
///
/// Comparisons against a squared threshold give the same answer as comparing
/// true distances, so callers only take the root when they need the length.
pub fn distance2(a: &Point, b: &Point) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

/// Euclidean distance between two points.
pub fn distance(a: &Point, b: &Point) -> f64 {
    distance2(a, b).sqrt()
}

/// Proximity predicate for a pair of circular footprints.
///
/// Two nodes are in range when the distance between their centres does not
/// exceed the sum of their radii. Pure; callers substitute default radii
/// before calling.
///
/// # Parameters
///
/// * `a_pos`, `a_radius` - Centre and radius of the first node
/// * `b_pos`, `b_radius` - Centre and radius of the second node
///
/// # Returns
///
/// `true` if the two footprints touch or overlap.
pub fn in_range(a_pos: &Point, a_radius: f64, b_pos: &Point, b_radius: f64) -> bool {
    let reach = a_radius + b_radius;
    if !(reach >= 0.0) {
        // NaN or negative combined reach never matches
        return false;
    }
    distance2(a_pos, b_pos) <= reach * reach
}

/// Inclusive point-in-circle test.
pub fn point_in_circle(p: &Point, center: &Point, radius: f64) -> bool {
    if !(radius >= 0.0) {
        return false;
    }
    distance2(p, center) <= radius * radius
}

/// Point at fraction `t` of the segment `start`→`end`.
pub fn lerp_point(start: &Point, end: &Point, t: f64) -> Point {
    Point {
        x: start.x + (end.x - start.x) * t,
        y: start.y + (end.y - start.y) * t,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    #[test]
    fn in_range_is_inclusive_at_combined_radius() {
        assert!(in_range(&p(0.0, 0.0), 30.0, &p(60.0, 0.0), 30.0));
        assert!(in_range(&p(0.0, 0.0), 30.0, &p(50.0, 0.0), 30.0));
        assert!(!in_range(&p(0.0, 0.0), 30.0, &p(60.1, 0.0), 30.0));
        assert!(!in_range(&p(0.0, 0.0), f64::NAN, &p(0.0, 0.0), 30.0));
    }

    #[test]
    fn point_in_circle_boundaries() {
        assert!(point_in_circle(&p(150.0, 0.0), &p(0.0, 0.0), 150.0));
        assert!(!point_in_circle(&p(150.5, 0.0), &p(0.0, 0.0), 150.0));
        assert!(point_in_circle(&p(3.0, 4.0), &p(0.0, 0.0), 5.0));
    }

    #[test]
    fn lerp_hits_both_ends() {
        let a = p(10.0, 20.0);
        let b = p(110.0, -80.0);
        assert_eq!(lerp_point(&a, &b, 0.0), a);
        assert_eq!(lerp_point(&a, &b, 1.0), b);
        assert_eq!(lerp_point(&a, &b, 0.5), p(60.0, -30.0));
        assert_eq!(distance(&p(0.0, 0.0), &p(3.0, 4.0)), 5.0);
    }
}
