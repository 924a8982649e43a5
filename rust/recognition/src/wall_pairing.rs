// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall pairing: parallel face lines become walls with a thickness

use crate::config::RecognitionConfig;
use crate::context::{RecognitionContext, Stage};
use crate::error::Result;
use crate::geometry::{are_parallel, cross, line_parameter, point_to_line_distance, segment_separation};
use crate::primitives::{Indexed, LineSegment, Point2D};
use crate::types::{DetectedWall, WallClass, WallId};
use rustc_hash::FxHashSet;

/// Centerline and thickness of two matched wall faces
#[derive(Debug, Clone, PartialEq)]
pub struct PairedFaces {
    pub centerline: LineSegment,
    pub thickness: f64,
}

/// Pair two face lines if they can be the two sides of one wall.
///
/// They must be parallel within the angle tolerance, at most
/// `max_wall_thickness` apart (endpoint-to-segment distance) and at least
/// `min_wall_thickness` apart as infinite lines, which rules out collinear
/// pieces of the same face. The result does not depend on argument order
/// beyond the direction of the centerline.
pub fn pair_segments(a: &LineSegment, b: &LineSegment, config: &RecognitionConfig) -> Option<PairedFaces> {
    if !are_parallel(a, b, config.parallel_angle_tolerance()) {
        return None;
    }

    let separation = segment_separation(a, b);
    if separation > config.max_wall_thickness {
        return None;
    }

    let offset = (point_to_line_distance(&b.midpoint(), &a.start, &a.end)
        + point_to_line_distance(&a.midpoint(), &b.start, &b.end))
        / 2.0;
    if offset < config.min_wall_thickness {
        return None;
    }

    if config.require_face_overlap && axial_overlap(a, b) <= 0.0 {
        return None;
    }

    let (da, db) = (a.direction()?, b.direction()?);
    let (b_start, b_end) = if da.dot(&db) >= 0.0 {
        (b.start, b.end)
    } else {
        (b.end, b.start)
    };

    let centerline = LineSegment::new(a.start.midpoint(&b_start), a.end.midpoint(&b_end))
        .with_thickness(separation);
    if centerline.is_degenerate() {
        return None;
    }

    Some(PairedFaces {
        centerline,
        thickness: separation,
    })
}

/// Length shared by the projections of `a` and `b` onto the line of `a`;
/// negative when they are apart
fn axial_overlap(a: &LineSegment, b: &LineSegment) -> f64 {
    let length = a.length();
    let along = |p: &Point2D| line_parameter(p, &a.start, &a.end) * length;
    let (b0, b1) = (along(&b.start), along(&b.end));
    length.min(b0.max(b1)) - 0.0f64.max(b0.min(b1))
}

pub fn classify_wall(thickness: f64, config: &RecognitionConfig) -> WallClass {
    if thickness >= config.exterior_wall_threshold {
        WallClass::Exterior
    } else if thickness >= config.structural_wall_threshold {
        WallClass::StructuralInterior
    } else {
        WallClass::Interior
    }
}

/// Pair wall candidates in id order.
///
/// Each candidate takes the closest unused partner (lower id on ties).
/// Candidates without a partner are read as centerlines with the default
/// thickness and a lower confidence. Ids are assigned later.
pub fn pair_walls(
    candidates: &[Indexed<LineSegment>],
    config: &RecognitionConfig,
    ctx: &RecognitionContext,
) -> Result<Vec<DetectedWall>> {
    let mut used: FxHashSet<usize> = FxHashSet::default();
    let mut walls = Vec::new();

    for (i, candidate) in candidates.iter().enumerate() {
        ctx.check(Stage::WallPairing)?;
        if used.contains(&i) {
            continue;
        }

        let mut best: Option<(usize, PairedFaces)> = None;
        for (j, other) in candidates.iter().enumerate() {
            if j == i || used.contains(&j) {
                continue;
            }
            let Some(paired) = pair_segments(&candidate.value, &other.value, config) else {
                continue;
            };
            let closer = match &best {
                Some((k, current)) => {
                    paired.thickness < current.thickness
                        || (paired.thickness == current.thickness && candidates[j].id < candidates[*k].id)
                }
                None => true,
            };
            if closer {
                best = Some((j, paired));
            }
        }

        used.insert(i);
        let wall = match best {
            Some((j, paired)) => {
                used.insert(j);
                let partner = &candidates[j];
                let strength =
                    (candidate.value.strength_weight() + partner.value.strength_weight()) / 2.0;
                let mut ids = vec![candidate.id, partner.id];
                ids.sort_unstable();
                new_wall(
                    paired.centerline,
                    paired.thickness,
                    config.paired_wall_confidence * strength,
                    ids,
                    true,
                    config,
                )
            }
            None => new_wall(
                candidate.value.clone().with_thickness(config.default_wall_thickness),
                config.default_wall_thickness,
                config.unpaired_wall_confidence * candidate.value.strength_weight(),
                vec![candidate.id],
                false,
                config,
            ),
        };
        walls.push(wall);
    }

    tracing::debug!(
        candidates = candidates.len(),
        walls = walls.len(),
        paired = walls.iter().filter(|w| w.paired).count(),
        "Paired wall faces"
    );

    Ok(walls)
}

fn new_wall(
    centerline: LineSegment,
    thickness: f64,
    confidence: f64,
    source_primitive_ids: Vec<usize>,
    paired: bool,
    config: &RecognitionConfig,
) -> DetectedWall {
    DetectedWall {
        id: WallId(0),
        centerline: LineSegment {
            source_tag: None,
            strength: None,
            ..centerline
        },
        thickness,
        height: config.default_wall_height,
        wall_class: classify_wall(thickness, config),
        confidence: confidence.clamp(0.0, 1.0),
        source_primitive_ids,
        paired,
        explicit_length: None,
        requires_review: false,
        review_reason: None,
    }
}

/// Merge two walls that continue each other: same class, parallel
/// (cross product of directions ~0), on the same line and touching at an
/// endpoint.
pub fn merge_pair(a: &DetectedWall, b: &DetectedWall, config: &RecognitionConfig) -> Option<DetectedWall> {
    if a.wall_class != b.wall_class {
        return None;
    }

    let (da, db) = (a.centerline.direction()?, b.centerline.direction()?);
    if cross(&da, &db).abs() > config.parallel_angle_tolerance().sin() {
        return None;
    }

    let line = &a.centerline;
    let off_line = [b.centerline.start, b.centerline.end]
        .iter()
        .any(|p| point_to_line_distance(p, &line.start, &line.end) > config.collinear_tolerance);
    if off_line {
        return None;
    }

    let ends_a = [a.centerline.start, a.centerline.end];
    let ends_b = [b.centerline.start, b.centerline.end];
    let touching = ends_a
        .iter()
        .any(|p| ends_b.iter().any(|q| p.distance_to(q) <= config.connection_tolerance));
    if !touching {
        return None;
    }

    let (start, end) = farthest_pair(&[ends_a[0], ends_a[1], ends_b[0], ends_b[1]]);
    let (la, lb) = (a.length(), b.length());
    let thickness = (a.thickness * la + b.thickness * lb) / (la + lb);

    let mut ids: Vec<usize> = a
        .source_primitive_ids
        .iter()
        .chain(&b.source_primitive_ids)
        .copied()
        .collect();
    ids.sort_unstable();
    ids.dedup();

    Some(DetectedWall {
        id: a.id.min(b.id),
        centerline: LineSegment::new(start, end).with_thickness(thickness),
        thickness,
        height: a.height.max(b.height),
        wall_class: a.wall_class,
        confidence: (a.confidence + b.confidence) / 2.0,
        source_primitive_ids: ids,
        paired: a.paired || b.paired,
        explicit_length: None,
        requires_review: a.requires_review || b.requires_review,
        review_reason: a.review_reason.clone().or_else(|| b.review_reason.clone()),
    })
}

/// The two points furthest apart, earliest pair first on ties
fn farthest_pair(points: &[Point2D; 4]) -> (Point2D, Point2D) {
    let mut best = (points[0], points[1]);
    let mut best_distance = points[0].distance_to(&points[1]);
    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            let d = points[i].distance_to(&points[j]);
            if d > best_distance {
                best_distance = d;
                best = (points[i], points[j]);
            }
        }
    }
    best
}

/// Merge collinear end-touching walls until nothing changes
pub fn merge_collinear_walls(mut walls: Vec<DetectedWall>, config: &RecognitionConfig) -> Vec<DetectedWall> {
    let before = walls.len();

    loop {
        let mut changed = false;
        let mut i = 0;
        while i < walls.len() {
            let mut j = i + 1;
            while j < walls.len() {
                match merge_pair(&walls[i], &walls[j], config) {
                    Some(merged) => {
                        walls[i] = merged;
                        walls.remove(j);
                        changed = true;
                        j = i + 1;
                    }
                    None => j += 1,
                }
            }
            i += 1;
        }
        if !changed {
            break;
        }
    }

    tracing::debug!(before, after = walls.len(), "Merged collinear walls");
    walls
}

/// Pair, merge and number the walls of a page
pub fn detect_walls(
    candidates: &[Indexed<LineSegment>],
    config: &RecognitionConfig,
    ctx: &RecognitionContext,
) -> Result<Vec<DetectedWall>> {
    let paired = pair_walls(candidates, config, ctx)?;
    ctx.check(Stage::WallPairing)?;
    let mut walls = merge_collinear_walls(paired, config);
    for (index, wall) in walls.iter_mut().enumerate() {
        wall.id = WallId(index);
    }
    Ok(walls)
}
