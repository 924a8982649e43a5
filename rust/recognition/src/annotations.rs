// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Annotation association
//!
//! Labels are classified from their text, then matched to exactly one
//! element each: room names to the room that contains them, dimension
//! strings to the wall or opening they measure, grid labels to grid lines.

use crate::config::RecognitionConfig;
use crate::dimensions::{parse_dimension, DimensionSpan};
use crate::geometry::{are_parallel, line_parameter, point_to_line_distance};
use crate::primitives::{Indexed, LineSegment, Point2D, TextLabel};
use crate::room_tracer::room_type_from_name;
use crate::scale::parse_scale_notation;
use crate::types::{
    DetectedDimension, DetectedGrid, DetectedOpening, DetectedRoom, DetectedWall, ElementRef,
    GridId, LabelKind, LengthUnit, OpeningId, ScaleInfo, WallId,
};
use regex::Regex;
use rustc_hash::FxHashSet;
use std::sync::LazyLock;

pub const LABELLED_GRID_CONFIDENCE: f64 = 0.85;
pub const UNLABELLED_GRID_CONFIDENCE: f64 = 0.6;

static GRID_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Z]{1,2}\d{0,2}|\d{1,2})$").expect("valid grid label regex")
});

/// What a label's text says it is
pub fn classify_label(text: &str) -> LabelKind {
    let text = text.trim();
    if text.is_empty() {
        return LabelKind::Unclassified;
    }
    if parse_scale_notation(text).is_some() {
        return LabelKind::ScaleNotation;
    }
    if room_type_from_name(text).is_some() {
        return LabelKind::RoomName;
    }
    if GRID_LABEL.is_match(text) {
        return LabelKind::GridLabel;
    }
    if parse_dimension(text, LengthUnit::Millimetre).is_some() {
        return LabelKind::Dimension;
    }
    if text.chars().filter(|c| c.is_alphabetic()).count() >= 3 {
        return LabelKind::RoomName;
    }
    LabelKind::Unclassified
}

/// Labels that may carry a dimension value.
///
/// Short numbers such as "12" read as grid labels on their own; they become
/// dimensions only when a pair of extension lines brackets them.
pub fn may_be_dimension(text: &str) -> bool {
    match classify_label(text) {
        LabelKind::Dimension => true,
        LabelKind::GridLabel => parse_dimension(text, LengthUnit::Millimetre).is_some(),
        _ => false,
    }
}

/// Elements after annotation, plus what the annotations produced
#[derive(Debug, Clone, Default)]
pub struct Annotated {
    pub walls: Vec<DetectedWall>,
    pub openings: Vec<DetectedOpening>,
    pub rooms: Vec<DetectedRoom>,
    pub grids: Vec<DetectedGrid>,
    pub dimensions: Vec<DetectedDimension>,
    /// Labels that ended up attached to an element
    pub matched_labels: usize,
}

/// Name rooms from the labels they contain; the first label wins.
///
/// A label inside several rooms goes to the one with the nearest centroid.
pub fn name_rooms(labels: &[TextLabel], rooms: &mut [DetectedRoom]) -> usize {
    let mut matched = 0;

    for label in labels {
        if classify_label(&label.text) != LabelKind::RoomName {
            continue;
        }

        let target = rooms
            .iter()
            .enumerate()
            .filter(|(_, room)| room.contains(&label.position))
            .map(|(index, room)| (index, room.centroid().distance_to(&label.position)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        let Some((index, _)) = target else {
            continue;
        };
        let room = &mut rooms[index];
        if room.name.is_some() {
            continue;
        }

        let name = label.text.trim().to_string();
        if let Some(room_type) = room_type_from_name(&name) {
            room.room_type = room_type;
        }
        room.name = Some(name);
        matched += 1;
    }

    matched
}

/// Element a dimension span measures
#[derive(Debug, Clone, Copy, PartialEq)]
enum Measured {
    Wall(usize),
    Opening(usize),
}

/// Along-span interval `[from, to]` compared against the span `[0, length]`
fn matches_span(from: f64, to: f64, length: f64, tolerance: f64) -> bool {
    (from - 0.0).abs() <= tolerance && (to - length).abs() <= tolerance
}

fn find_measured(
    span: &DimensionSpan,
    walls: &[DetectedWall],
    openings: &[DetectedOpening],
    claimed_walls: &FxHashSet<WallId>,
    claimed_openings: &FxHashSet<OpeningId>,
    config: &RecognitionConfig,
) -> Option<Measured> {
    let dimension_line = LineSegment::new(span.start, span.end);
    let length = dimension_line.length();
    let direction = dimension_line.direction()?;
    let tolerance = config.parallel_angle_tolerance();
    let along = |p: &Point2D| line_parameter(p, &span.start, &span.end) * length;

    let mut best: Option<(f64, Measured)> = None;
    let mut consider = |offset: f64, candidate: Measured| {
        if offset <= config.dimension_max_offset && best.map_or(true, |(o, _)| offset < o) {
            best = Some((offset, candidate));
        }
    };

    for (index, wall) in walls.iter().enumerate() {
        if claimed_walls.contains(&wall.id) || !are_parallel(&wall.centerline, &dimension_line, tolerance) {
            continue;
        }
        let (a, b) = (along(&wall.centerline.start), along(&wall.centerline.end));
        if !matches_span(a.min(b), a.max(b), length, config.dimension_match_tolerance) {
            continue;
        }
        let offset = point_to_line_distance(&wall.centerline.midpoint(), &span.start, &span.end);
        consider(offset, Measured::Wall(index));
    }

    for (index, opening) in openings.iter().enumerate() {
        if claimed_openings.contains(&opening.id) {
            continue;
        }
        // Openings without a host are assumed to run along the dimension
        let host_dir = opening
            .host_wall_id
            .and_then(|id| walls.iter().find(|w| w.id == id))
            .and_then(|host| host.centerline.direction());
        if host_dir.is_some_and(|d| d.dot(&direction).abs() < tolerance.cos()) {
            continue;
        }
        let center = along(&opening.position);
        let half = opening.width / 2.0;
        if !matches_span(center - half, center + half, length, config.dimension_match_tolerance) {
            continue;
        }
        let offset = point_to_line_distance(&opening.position, &span.start, &span.end);
        consider(offset, Measured::Opening(index));
    }

    best.map(|(_, m)| m)
}

/// Stretch or shrink a segment about its midpoint to `length`
fn resized(segment: &LineSegment, length: f64) -> LineSegment {
    let Some(u) = segment.direction() else {
        return segment.clone();
    };
    let mid = segment.midpoint();
    LineSegment {
        start: mid.offset(&u, -length / 2.0),
        end: mid.offset(&u, length / 2.0),
        ..segment.clone()
    }
}

/// Attach dimension values to the element they measure; the explicit value
/// overwrites the inferred length or width.
pub fn apply_dimensions(
    labels: &[TextLabel],
    spans: &[DimensionSpan],
    walls: &mut [DetectedWall],
    openings: &mut [DetectedOpening],
    scale: &ScaleInfo,
    config: &RecognitionConfig,
) -> Vec<DetectedDimension> {
    let mut claimed_walls: FxHashSet<WallId> = FxHashSet::default();
    let mut claimed_openings: FxHashSet<OpeningId> = FxHashSet::default();
    let mut dimensions = Vec::with_capacity(spans.len());

    for span in spans {
        let value_mm = span.value.value_mm();
        let drawing_length = scale.to_drawing_length(value_mm);

        let applied_to = match find_measured(span, walls, openings, &claimed_walls, &claimed_openings, config) {
            Some(Measured::Wall(index)) => {
                let wall = &mut walls[index];
                wall.centerline = resized(&wall.centerline, drawing_length);
                wall.explicit_length = Some(value_mm);
                claimed_walls.insert(wall.id);
                Some(ElementRef::Wall(wall.id))
            }
            Some(Measured::Opening(index)) => {
                let opening = &mut openings[index];
                opening.width = drawing_length;
                opening.explicit_width = Some(value_mm);
                claimed_openings.insert(opening.id);
                Some(ElementRef::Opening(opening.id))
            }
            None => None,
        };

        dimensions.push(DetectedDimension {
            label_index: span.label_index,
            text: labels
                .get(span.label_index)
                .map(|l| l.text.trim().to_string())
                .unwrap_or_default(),
            value: span.value.value,
            unit: span.value.unit,
            start: span.start,
            end: span.end,
            extension_line_ids: span.extension_line_ids,
            applied_to,
        });
    }

    dimensions
}

/// Grid lines, each named by the closest unused grid label near one of its
/// ends. Labels already read as dimensions are not grid labels.
pub fn detect_grids(
    labels: &[TextLabel],
    spans: &[DimensionSpan],
    grid_segments: &[Indexed<LineSegment>],
    config: &RecognitionConfig,
) -> Vec<DetectedGrid> {
    let dimension_labels: FxHashSet<usize> = spans.iter().map(|s| s.label_index).collect();
    let grid_labels: Vec<&TextLabel> = labels
        .iter()
        .enumerate()
        .filter(|(i, l)| !dimension_labels.contains(i) && classify_label(&l.text) == LabelKind::GridLabel)
        .map(|(_, l)| l)
        .collect();
    let mut used = vec![false; grid_labels.len()];

    grid_segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            let ends = [segment.value.start, segment.value.end];
            let nearest = grid_labels
                .iter()
                .enumerate()
                .filter(|(i, _)| !used[*i])
                .map(|(i, label)| {
                    let d = ends
                        .iter()
                        .map(|e| e.distance_to(&label.position))
                        .fold(f64::MAX, f64::min);
                    (i, d)
                })
                .filter(|(_, d)| *d <= config.grid_label_distance)
                .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

            let label = nearest.map(|(i, _)| {
                used[i] = true;
                grid_labels[i].text.trim().to_string()
            });
            let confidence = if label.is_some() {
                LABELLED_GRID_CONFIDENCE
            } else {
                UNLABELLED_GRID_CONFIDENCE
            };

            DetectedGrid {
                id: GridId(index),
                label,
                line: segment.value.clone(),
                confidence,
                source_primitive_ids: vec![segment.id],
                requires_review: false,
                review_reason: None,
            }
        })
        .collect()
}

/// Run every association step over the page's elements
#[allow(clippy::too_many_arguments)]
pub fn associate_annotations(
    labels: &[TextLabel],
    spans: &[DimensionSpan],
    grid_segments: &[Indexed<LineSegment>],
    mut walls: Vec<DetectedWall>,
    mut openings: Vec<DetectedOpening>,
    mut rooms: Vec<DetectedRoom>,
    scale: &ScaleInfo,
    config: &RecognitionConfig,
) -> Annotated {
    let named = name_rooms(labels, &mut rooms);
    let dimensions = apply_dimensions(labels, spans, &mut walls, &mut openings, scale, config);
    let grids = detect_grids(labels, spans, grid_segments, config);

    let applied = dimensions.iter().filter(|d| d.applied_to.is_some()).count();
    let labelled_grids = grids.iter().filter(|g| g.label.is_some()).count();

    tracing::debug!(
        named_rooms = named,
        dimensions = dimensions.len(),
        applied_dimensions = applied,
        grids = grids.len(),
        "Associated annotations"
    );

    Annotated {
        walls,
        openings,
        rooms,
        grids,
        dimensions,
        matched_labels: named + applied + labelled_grids,
    }
}
