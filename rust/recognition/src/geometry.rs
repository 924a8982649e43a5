// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Computational geometry helpers used across the recognition stages

use crate::primitives::{LineSegment, Point2D, LENGTH_EPSILON};
use nalgebra::Vector2;
use std::f64::consts::PI;

/// Distance from a point to a line segment (projection clamped to the segment)
pub fn point_to_segment_distance(point: &Point2D, seg_start: &Point2D, seg_end: &Point2D) -> f64 {
    let dx = seg_end.x - seg_start.x;
    let dy = seg_end.y - seg_start.y;
    let length_sq = dx * dx + dy * dy;

    if length_sq < LENGTH_EPSILON {
        return point.distance_to(seg_start);
    }

    let t = ((point.x - seg_start.x) * dx + (point.y - seg_start.y) * dy) / length_sq;
    let t = t.clamp(0.0, 1.0);

    let proj_x = seg_start.x + t * dx;
    let proj_y = seg_start.y + t * dy;

    let px = point.x - proj_x;
    let py = point.y - proj_y;
    (px * px + py * py).sqrt()
}

/// Perpendicular distance from a point to the infinite line through two points
pub fn point_to_line_distance(point: &Point2D, line_start: &Point2D, line_end: &Point2D) -> f64 {
    let dx = line_end.x - line_start.x;
    let dy = line_end.y - line_start.y;
    let length_sq = dx * dx + dy * dy;

    if length_sq < LENGTH_EPSILON {
        return point.distance_to(line_start);
    }

    let length = length_sq.sqrt();
    ((point.x - line_start.x) * dy - (point.y - line_start.y) * dx).abs() / length
}

/// Parameter `t` of the orthogonal projection of `point` onto the line
/// `a + t * (b - a)`; 0 at `a`, 1 at `b`, unclamped.
pub fn line_parameter(point: &Point2D, a: &Point2D, b: &Point2D) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx * dx + dy * dy;
    if length_sq < LENGTH_EPSILON {
        return 0.0;
    }
    ((point.x - a.x) * dx + (point.y - a.y) * dy) / length_sq
}

/// Orthogonal projection of `point` onto the infinite line through `a` and `b`
pub fn project_onto_line(point: &Point2D, a: &Point2D, b: &Point2D) -> Point2D {
    let t = line_parameter(point, a, b);
    Point2D::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y))
}

/// 2D cross product (z component of the 3D cross product)
pub fn cross(u: &Vector2<f64>, v: &Vector2<f64>) -> f64 {
    u.x * v.y - u.y * v.x
}

/// Acute angle between the directions of two segments, in radians [0, PI/2].
/// Opposite directions count as parallel.
pub fn angle_between(a: &LineSegment, b: &LineSegment) -> f64 {
    let diff = (a.angle() - b.angle()).rem_euclid(PI);
    diff.min(PI - diff)
}

/// Parallel within `tolerance` radians, in either direction
pub fn are_parallel(a: &LineSegment, b: &LineSegment, tolerance: f64) -> bool {
    angle_between(a, b) <= tolerance
}

/// Smallest distance from any endpoint of one segment to the other segment.
/// Symmetric in its arguments.
pub fn segment_separation(a: &LineSegment, b: &LineSegment) -> f64 {
    let candidates = [
        point_to_segment_distance(&a.start, &b.start, &b.end),
        point_to_segment_distance(&a.end, &b.start, &b.end),
        point_to_segment_distance(&b.start, &a.start, &a.end),
        point_to_segment_distance(&b.end, &a.start, &a.end),
    ];
    candidates.iter().copied().fold(f64::MAX, f64::min)
}

/// Shoelace sum divided by two; positive for counter-clockwise (y-up) rings
pub fn signed_area(points: &[Point2D]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x * points[j].y;
        area -= points[j].x * points[i].y;
    }
    area / 2.0
}

/// Polygon area using the shoelace formula
pub fn polygon_area(points: &[Point2D]) -> f64 {
    signed_area(points).abs()
}

/// Sum of consecutive edge lengths, including the closing edge
pub fn polygon_perimeter(points: &[Point2D]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    (0..n)
        .map(|i| points[i].distance_to(&points[(i + 1) % n]))
        .sum()
}

/// Arithmetic mean of the vertices.
///
/// This is not the area-weighted centroid; for irregular vertex
/// distributions the two differ.
pub fn vertex_centroid(points: &[Point2D]) -> Point2D {
    if points.is_empty() {
        return Point2D::new(0.0, 0.0);
    }
    let n = points.len() as f64;
    let sx: f64 = points.iter().map(|p| p.x).sum();
    let sy: f64 = points.iter().map(|p| p.y).sum();
    Point2D::new(sx / n, sy / n)
}

/// Even-odd (ray casting) point-in-polygon test.
///
/// Points exactly on an edge may land on either side depending on the edge
/// direction; callers accept that.
pub fn point_in_polygon(point: &Point2D, polygon: &[Point2D]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let pi = &polygon[i];
        let pj = &polygon[j];
        if (pi.y > point.y) != (pj.y > point.y) {
            let x_cross = (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Coefficient of variation (population standard deviation over mean)
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean.abs() < LENGTH_EPSILON {
        return f64::INFINITY;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean.abs()
}

/// Lower median; `None` for an empty slice
pub fn lower_median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(sorted[(sorted.len() - 1) / 2])
}
