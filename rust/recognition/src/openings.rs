// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Opening detection
//!
//! Three independent sources feed one list:
//!
//! - symbol instances (door/window blocks), trusted most
//! - arcs spanning roughly 90 degrees, read as door swings
//! - gaps between collinear walls, classified by width
//!
//! Duplicates within `opening_merge_radius` are resolved in favour of the
//! more confident source, then every opening looks for a host wall.

use crate::config::{ArcWidthConvention, RecognitionConfig};
use crate::context::{RecognitionContext, Stage};
use crate::error::Result;
use crate::geometry::{are_parallel, line_parameter, point_to_line_distance, point_to_segment_distance};
use crate::line_classifier::hint_class;
use crate::primitives::{ArcPrimitive, Indexed, Point2D, SymbolInstance};
use crate::types::{
    DetectedOpening, DetectedWall, LineClass, OpeningId, OpeningSource, OpeningType, Reviewable,
    WallId,
};

pub const SYMBOL_CONFIDENCE: f64 = 0.85;
pub const ARC_DOOR_CONFIDENCE: f64 = 0.6;
pub const GAP_DOOR_CONFIDENCE: f64 = 0.65;
pub const GAP_WINDOW_CONFIDENCE: f64 = 0.5;

/// Opening type of a symbol name, `None` for unrelated blocks
pub fn symbol_type(name: &str) -> Option<OpeningType> {
    let name = name.to_ascii_lowercase();
    if name.contains("window") || name.split(|c: char| !c.is_ascii_alphanumeric()).any(|t| t == "win") {
        Some(OpeningType::Window)
    } else if name.contains("door") {
        if name.contains("double") || name.contains("dbl") {
            Some(OpeningType::DoubleDoor)
        } else {
            Some(OpeningType::Door)
        }
    } else {
        None
    }
}

/// Width classification of a wall gap
pub fn classify_gap(width: f64, config: &RecognitionConfig) -> OpeningType {
    if width >= config.single_door_min_width && width < config.double_door_min_width {
        OpeningType::Door
    } else if width >= config.double_door_min_width && width <= config.double_door_max_width {
        OpeningType::DoubleDoor
    } else {
        OpeningType::Window
    }
}

fn new_opening(
    opening_type: OpeningType,
    source: OpeningSource,
    position: Point2D,
    width: f64,
    confidence: f64,
    source_primitive_ids: Vec<usize>,
    config: &RecognitionConfig,
) -> DetectedOpening {
    let (height, sill_height) = if opening_type.is_door() {
        (config.default_door_height, 0.0)
    } else {
        (config.default_window_height, config.default_window_sill_height)
    };

    DetectedOpening {
        id: OpeningId(0),
        opening_type,
        source,
        position,
        width,
        height,
        sill_height,
        host_wall_id: None,
        confidence,
        source_primitive_ids,
        explicit_width: None,
        requires_review: false,
        review_reason: None,
    }
}

/// Openings from door/window blocks, sized from attributes when present
pub fn symbol_openings(symbols: &[SymbolInstance], config: &RecognitionConfig) -> Vec<DetectedOpening> {
    symbols
        .iter()
        .enumerate()
        .filter_map(|(index, symbol)| {
            let opening_type = symbol_type(&symbol.name)?;
            let default_width = match opening_type {
                OpeningType::Door => config.default_door_width,
                OpeningType::DoubleDoor => config.default_door_width * 2.0,
                OpeningType::Window => config.default_window_width,
            };

            let mut opening = new_opening(
                opening_type,
                OpeningSource::Symbol,
                symbol.position,
                symbol.attribute("width").filter(|w| *w > 0.0).unwrap_or(default_width),
                SYMBOL_CONFIDENCE,
                vec![index],
                config,
            );
            if let Some(height) = symbol.attribute("height").filter(|h| *h > 0.0) {
                opening.height = height;
            }
            if let Some(sill) = symbol.attribute("sill_height").filter(|s| *s >= 0.0) {
                opening.sill_height = sill;
            }
            Some(opening)
        })
        .collect()
}

/// Nearest wall to a point, lower id first on ties
fn nearest_wall<'a>(point: &Point2D, walls: &'a [DetectedWall]) -> Option<(&'a DetectedWall, f64)> {
    let mut best: Option<(&DetectedWall, f64)> = None;
    for wall in walls {
        let d = point_to_segment_distance(point, &wall.centerline.start, &wall.centerline.end);
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((wall, d));
        }
    }
    best
}

/// Door swings: arcs whose span falls in the configured band around 90°.
///
/// The hinge is the arc center. The opening sits halfway along the arc end
/// that runs with the nearest wall (the closed leaf position).
pub fn arc_openings(
    arcs: &[Indexed<ArcPrimitive>],
    walls: &[DetectedWall],
    config: &RecognitionConfig,
    ctx: &RecognitionContext,
) -> Result<Vec<DetectedOpening>> {
    let mut openings = Vec::new();

    for arc in arcs {
        ctx.check(Stage::OpeningDetection)?;
        let value = &arc.value;
        if matches!(
            hint_class(value.source_tag.as_deref()),
            Some(LineClass::Annotation | LineClass::Dimension | LineClass::Grid)
        ) {
            continue;
        }

        let span = value.span();
        if span < config.door_arc_min_span_deg || span > config.door_arc_max_span_deg {
            continue;
        }

        let width = match config.arc_width_convention {
            ArcWidthConvention::Radius => value.radius,
            ArcWidthConvention::Chord => value.chord_length(),
        };

        let ends = [value.start_point(), value.end_point()];
        let leaf_end = match nearest_wall(&value.center, walls).and_then(|(w, _)| w.centerline.direction()) {
            Some(wall_dir) => {
                let alignment = |p: &Point2D| {
                    value
                        .center
                        .vector_to(p)
                        .normalize()
                        .dot(&wall_dir)
                        .abs()
                };
                if alignment(&ends[1]) > alignment(&ends[0]) {
                    ends[1]
                } else {
                    ends[0]
                }
            }
            None => ends[0],
        };

        let mut opening = new_opening(
            OpeningType::Door,
            OpeningSource::ArcSwing,
            value.center.midpoint(&leaf_end),
            width,
            ARC_DOOR_CONFIDENCE,
            vec![arc.id],
            config,
        );
        opening.flag_for_review("door inferred from an isolated swing arc");
        openings.push(opening);
    }

    Ok(openings)
}

/// Along-axis interval of a wall on the line of `reference`
fn interval_on(reference: &DetectedWall, wall: &DetectedWall) -> (f64, f64) {
    let line = &reference.centerline;
    let length = line.length();
    let a = line_parameter(&wall.centerline.start, &line.start, &line.end) * length;
    let b = line_parameter(&wall.centerline.end, &line.start, &line.end) * length;
    (a.min(b), a.max(b))
}

fn collinear(a: &DetectedWall, b: &DetectedWall, config: &RecognitionConfig) -> bool {
    are_parallel(&a.centerline, &b.centerline, config.parallel_angle_tolerance())
        && [b.centerline.start, b.centerline.end].iter().all(|p| {
            point_to_line_distance(p, &a.centerline.start, &a.centerline.end) <= config.collinear_tolerance
        })
}

/// Gap between the facing ends of two collinear walls
#[derive(Debug, Clone, PartialEq)]
pub struct WallGap {
    /// Lower id of the two walls
    pub first: WallId,
    pub second: WallId,
    pub start: Point2D,
    pub end: Point2D,
}

impl WallGap {
    pub fn width(&self) -> f64 {
        self.start.distance_to(&self.end)
    }

    pub fn midpoint(&self) -> Point2D {
        self.start.midpoint(&self.end)
    }
}

/// Gaps between collinear walls within the opening width range.
///
/// A gap counts only when no third collinear wall covers part of it.
/// Cancellation is reported against `stage`.
pub fn wall_gaps(
    walls: &[DetectedWall],
    config: &RecognitionConfig,
    ctx: &RecognitionContext,
    stage: Stage,
) -> Result<Vec<WallGap>> {
    let mut gaps = Vec::new();

    for (i, a) in walls.iter().enumerate() {
        ctx.check(stage)?;
        let Some(u) = a.centerline.direction() else {
            continue;
        };

        for b in &walls[i + 1..] {
            if !collinear(a, b, config) {
                continue;
            }

            let (a0, a1) = interval_on(a, a);
            let (b0, b1) = interval_on(a, b);
            let (gap_start, gap_end) = if b0 >= a1 {
                (a1, b0)
            } else if a0 >= b1 {
                (b1, a0)
            } else {
                continue;
            };
            let width = gap_end - gap_start;
            if width < config.min_opening_width || width > config.max_opening_width {
                continue;
            }

            let blocked = walls.iter().any(|k| {
                if k.id == a.id || k.id == b.id || !collinear(a, k, config) {
                    return false;
                }
                let (k0, k1) = interval_on(a, k);
                k1 > gap_start && k0 < gap_end
            });
            if blocked {
                continue;
            }

            gaps.push(WallGap {
                first: a.id.min(b.id),
                second: a.id.max(b.id),
                start: a.centerline.start.offset(&u, gap_start),
                end: a.centerline.start.offset(&u, gap_end),
            });
        }
    }

    Ok(gaps)
}

/// Openings inferred from gaps between collinear walls
pub fn gap_openings(
    walls: &[DetectedWall],
    config: &RecognitionConfig,
    ctx: &RecognitionContext,
) -> Result<Vec<DetectedOpening>> {
    let openings = wall_gaps(walls, config, ctx, Stage::OpeningDetection)?
        .into_iter()
        .map(|gap| {
            let width = gap.width();
            let opening_type = classify_gap(width, config);
            let confidence = if opening_type.is_door() {
                GAP_DOOR_CONFIDENCE
            } else {
                GAP_WINDOW_CONFIDENCE
            };

            let mut opening = new_opening(
                opening_type,
                OpeningSource::WallGap,
                gap.midpoint(),
                width,
                confidence,
                vec![gap.first.0, gap.second.0],
                config,
            );
            opening.host_wall_id = Some(gap.first);
            opening.flag_for_review("opening inferred from a gap between walls");
            opening
        })
        .collect();

    Ok(openings)
}

/// Keep the most confident opening of every cluster within `radius`.
///
/// Survivors keep their original relative order.
pub fn deduplicate(openings: Vec<DetectedOpening>, radius: f64) -> Vec<DetectedOpening> {
    let mut order: Vec<usize> = (0..openings.len()).collect();
    order.sort_by(|&a, &b| openings[b].confidence.total_cmp(&openings[a].confidence));

    let mut keep = vec![false; openings.len()];
    let mut kept_positions: Vec<Point2D> = Vec::new();
    for index in order {
        let position = openings[index].position;
        if kept_positions.iter().all(|p| p.distance_to(&position) > radius) {
            keep[index] = true;
            kept_positions.push(position);
        }
    }

    openings
        .into_iter()
        .zip(keep)
        .filter_map(|(opening, kept)| kept.then_some(opening))
        .collect()
}

/// Host wall of an opening: the nearest wall whose line passes within
/// `tolerance` and whose extent reaches the opening's half width plus
/// `tolerance`. An opening centred in a gap is half its width away from
/// the wall ends on either side. Lower id wins ties.
pub fn resolve_host(
    position: &Point2D,
    width: f64,
    walls: &[DetectedWall],
    tolerance: f64,
) -> Option<WallId> {
    let reach = tolerance + width / 2.0;
    let mut best: Option<(WallId, f64)> = None;
    for wall in walls {
        let line = &wall.centerline;
        if point_to_line_distance(position, &line.start, &line.end) > tolerance {
            continue;
        }
        let d = point_to_segment_distance(position, &line.start, &line.end);
        if d <= reach && best.map_or(true, |(_, bd)| d < bd) {
            best = Some((wall.id, d));
        }
    }
    best.map(|(id, _)| id)
}

/// All openings of a page, numbered in output order
pub fn detect_openings(
    arcs: &[Indexed<ArcPrimitive>],
    symbols: &[SymbolInstance],
    walls: &[DetectedWall],
    config: &RecognitionConfig,
    ctx: &RecognitionContext,
) -> Result<Vec<DetectedOpening>> {
    let mut all = symbol_openings(symbols, config);
    all.extend(arc_openings(arcs, walls, config, ctx)?);
    all.extend(gap_openings(walls, config, ctx)?);

    all.retain(|o| {
        if o.opening_type.is_door() {
            config.detect_doors
        } else {
            config.detect_windows
        }
    });

    let found = all.len();
    let mut openings = deduplicate(all, config.opening_merge_radius);

    for (index, opening) in openings.iter_mut().enumerate() {
        opening.id = OpeningId(index);
        if opening.host_wall_id.is_none() {
            opening.host_wall_id = resolve_host(
                &opening.position,
                opening.width,
                walls,
                config.opening_host_tolerance,
            );
        }
    }

    tracing::debug!(
        found,
        kept = openings.len(),
        unhosted = openings.iter().filter(|o| o.host_wall_id.is_none()).count(),
        "Detected openings"
    );

    Ok(openings)
}
