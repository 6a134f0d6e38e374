// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route simplification.
//!
//! Two pure point-reduction algorithms over timestamp-ordered traces:
//!
//! - [`simplify_by_distance`]: single greedy pass using great-circle distance
//!   in meters. Used by sync before anything is persisted.
//! - [`simplify_rdp`]: Ramer–Douglas–Peucker over planar lon/lat, with the
//!   tolerance expressed in degrees.
//!
//! Both are total: empty input gives empty output and a single point is
//! returned unchanged.

use crate::models::TracePoint;
use geo::{Distance, Haversine, Point};

/// Mean Earth radius used to convert between meters and degrees.
const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Great-circle distance between two fixes, in meters.
pub fn haversine_distance(a: &TracePoint, b: &TracePoint) -> f64 {
    Haversine.distance(
        Point::new(a.longitude, a.latitude),
        Point::new(b.longitude, b.latitude),
    )
}

/// Total great-circle length of a trace, in meters.
pub fn path_length_meters(points: &[TracePoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Approximate angular size of `meters` along a meridian.
///
/// Handy for picking an RDP epsilon from a distance in meters. Along
/// parallels away from the equator one degree of longitude is shorter, so the
/// result is only a rough guide.
pub fn meters_to_degrees(meters: f64) -> f64 {
    (meters / EARTH_RADIUS_METERS).to_degrees()
}

/// Greedy distance-threshold simplification.
///
/// Keeps the first point, then every point that is more than
/// `tolerance_meters` (haversine) away from the last kept point. The final
/// input point is always kept, even when it is within tolerance of the point
/// before it, so a simplified route ends where the workout ended.
///
/// Guarantees, for non-empty input:
/// - `output.len() <= input.len()`
/// - `output[0] == input[0]` and `output[last] == input[last]`
/// - every consecutive output pair, except possibly the last one, is more
///   than `tolerance_meters` apart
///
/// Runs in O(n).
pub fn simplify_by_distance(points: &[TracePoint], tolerance_meters: f64) -> Vec<TracePoint> {
    if points.len() <= 1 {
        return points.to_vec();
    }

    let last_index = points.len() - 1;
    let mut kept = Vec::with_capacity(points.len());
    let mut anchor = points[0];
    kept.push(anchor);

    for (i, point) in points.iter().enumerate().skip(1) {
        if i == last_index {
            kept.push(*point);
            break;
        }
        if haversine_distance(&anchor, point) > tolerance_meters {
            kept.push(*point);
            anchor = *point;
        }
    }

    kept
}

/// Ramer–Douglas–Peucker simplification.
///
/// For each span, finds the point farthest from the chord joining the span's
/// endpoints. If that deviation exceeds `epsilon` the span is split there and
/// both halves are processed; otherwise the span collapses to its endpoints.
///
/// **Units.** Deviation is measured treating longitude/latitude as planar
/// x/y, so `epsilon` is in degrees, not meters. This is a local-flatness
/// approximation that only holds over short spans; use [`meters_to_degrees`]
/// for a rough conversion.
///
/// Guarantees:
/// - endpoints are always kept and `output.len() <= input.len()`
/// - inputs of two points or fewer come back unchanged
/// - deterministic, and idempotent: running it again with the same `epsilon`
///   on its own output returns that output unchanged
///
/// Worst case O(n²), typically O(n log n). Spans are processed from an
/// explicit stack, so long traces cannot exhaust the call stack.
pub fn simplify_rdp(points: &[TracePoint], epsilon: f64) -> Vec<TracePoint> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut spans = vec![(0usize, points.len() - 1)];
    while let Some((first, last)) = spans.pop() {
        if last <= first + 1 {
            continue;
        }

        let mut max_deviation = 0.0;
        let mut split = first;
        for i in (first + 1)..last {
            let deviation = perpendicular_deviation(&points[i], &points[first], &points[last]);
            if deviation > max_deviation {
                max_deviation = deviation;
                split = i;
            }
        }

        if split != first && max_deviation > epsilon {
            keep[split] = true;
            spans.push((first, split));
            spans.push((split, last));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

/// Planar distance from `p` to the line through `a` and `b`, in degrees.
///
/// Falls back to the distance from `a` when the chord is degenerate (a loop
/// that starts and ends at the same fix).
fn perpendicular_deviation(p: &TracePoint, a: &TracePoint, b: &TracePoint) -> f64 {
    let (px, py) = (p.longitude, p.latitude);
    let (ax, ay) = (a.longitude, a.latitude);
    let (bx, by) = (b.longitude, b.latitude);

    let dx = bx - ax;
    let dy = by - ay;
    let chord = dx.hypot(dy);
    if chord == 0.0 {
        return (px - ax).hypot(py - ay);
    }

    (dx * (ay - py) - dy * (ax - px)).abs() / chord
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 6, 0, 0).unwrap()
    }

    fn trace(coords: &[(f64, f64)]) -> Vec<TracePoint> {
        coords
            .iter()
            .enumerate()
            .map(|(i, &(lat, lng))| TracePoint::new(lat, lng, t0() + Duration::seconds(i as i64)))
            .collect()
    }

    #[test]
    fn test_haversine_one_hundredth_degree() {
        let pts = trace(&[(0.0, 0.0), (0.01, 0.0)]);
        let d = haversine_distance(&pts[0], &pts[1]);
        assert!((d - 1_111.95).abs() < 1.0, "got {}", d);
    }

    #[test]
    fn test_distance_empty_and_single() {
        assert!(simplify_by_distance(&[], 10.0).is_empty());
        let one = trace(&[(1.0, 1.0)]);
        assert_eq!(simplify_by_distance(&one, 10.0), one);
    }

    #[test]
    fn test_distance_forces_last_point() {
        // Last point is ~1m from the one before it.
        let pts = trace(&[(0.0, 0.0), (0.001, 0.0), (0.00101, 0.0)]);
        let out = simplify_by_distance(&pts, 10.0);
        assert_eq!(out.len(), 3);
        assert_eq!(out.last(), pts.last());
    }

    #[test]
    fn test_distance_collapses_stationary_trace() {
        let pts = trace(&[(5.0, 5.0); 20]);
        let out = simplify_by_distance(&pts, 1.0);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], pts[0]);
        assert_eq!(out[1], pts[19]);
    }

    #[test]
    fn test_rdp_short_inputs_unchanged() {
        assert!(simplify_rdp(&[], 0.1).is_empty());
        let two = trace(&[(0.0, 0.0), (1.0, 1.0)]);
        assert_eq!(simplify_rdp(&two, 10.0), two);
    }

    #[test]
    fn test_rdp_drops_collinear_points() {
        let pts = trace(&[(0.0, 0.0), (0.0, 1.0), (0.0, 2.0), (0.0, 3.0)]);
        let out = simplify_rdp(&pts, 0.0001);
        assert_eq!(out, vec![pts[0], pts[3]]);
    }

    #[test]
    fn test_rdp_keeps_corner() {
        let pts = trace(&[(0.0, 0.0), (0.0, 1.0), (0.0, 2.0), (1.0, 2.0), (2.0, 2.0)]);
        let out = simplify_rdp(&pts, 0.1);
        assert_eq!(out, vec![pts[0], pts[2], pts[4]]);
    }

    #[test]
    fn test_rdp_degenerate_loop() {
        // Out-and-back: first and last fix coincide.
        let pts = trace(&[(0.0, 0.0), (0.0, 0.5), (0.0, 1.0), (0.0, 0.5), (0.0, 0.0)]);
        let out = simplify_rdp(&pts, 0.1);
        assert_eq!(out.first(), pts.first());
        assert_eq!(out.last(), pts.last());
        assert!(out.contains(&pts[2]));
    }

    #[test]
    fn test_meters_to_degrees() {
        let deg = meters_to_degrees(11.119_5);
        assert!((deg - 0.0001).abs() < 1e-7, "got {}", deg);
    }
}
