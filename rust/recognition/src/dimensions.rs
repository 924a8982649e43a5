// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dimension strings: numeric parsing and extension-line matching
//!
//! A dimension is drawn as two parallel extension lines with a numeric label
//! between them. The drawing-unit distance between the extension lines is
//! the measured length; the label carries the real value.

use crate::annotations::may_be_dimension;
use crate::config::RecognitionConfig;
use crate::geometry::{are_parallel, project_onto_line};
use crate::line_classifier::hint_class;
use crate::primitives::{Indexed, LineSegment, Point2D, TextLabel, LENGTH_EPSILON};
use crate::types::LengthUnit;
use regex::Regex;
use std::sync::LazyLock;

static METRIC_DIMENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d+(?:[.,]\d+)*)\s*(mm|cm|m)?\s*$").expect("valid metric dimension regex")
});

static IMPERIAL_DIMENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(\d+)\s*['′]\s*-?\s*(?:(\d+(?:\.\d+)?)\s*["″]?)?\s*$"#)
        .expect("valid imperial dimension regex")
});

static THOUSANDS_GROUPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(?:,\d{3})+$").expect("valid grouping regex"));

/// A numeric dimension value with its unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedDimension {
    pub value: f64,
    pub unit: LengthUnit,
}

impl ParsedDimension {
    pub fn value_mm(&self) -> f64 {
        self.value * self.unit.to_mm()
    }
}

/// Parse "3600", "3,600", "3.6 m", "360cm" or "12'-6\"".
///
/// Bare numbers take `default_unit`. Zero and negative values are rejected.
pub fn parse_dimension(text: &str, default_unit: LengthUnit) -> Option<ParsedDimension> {
    if let Some(caps) = IMPERIAL_DIMENSION.captures(text) {
        let feet: f64 = caps.get(1)?.as_str().parse().ok()?;
        let inches: f64 = match caps.get(2) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0.0,
        };
        let value = feet * 12.0 + inches;
        return (value > 0.0).then_some(ParsedDimension {
            value,
            unit: LengthUnit::Inch,
        });
    }

    let caps = METRIC_DIMENSION.captures(text)?;
    let raw = caps.get(1)?.as_str();
    let number = if THOUSANDS_GROUPED.is_match(raw) {
        raw.replace(',', "")
    } else {
        raw.replace(',', ".")
    };
    let value: f64 = number.parse().ok()?;
    let unit = caps
        .get(2)
        .and_then(|m| LengthUnit::from_suffix(m.as_str()))
        .unwrap_or(default_unit);

    (value > 0.0 && value.is_finite()).then_some(ParsedDimension { value, unit })
}

/// A dimension label bracketed by a pair of extension lines
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionSpan {
    pub label_index: usize,
    pub value: ParsedDimension,
    /// Foot of the label on the first extension line
    pub start: Point2D,
    /// Foot of the label on the second extension line
    pub end: Point2D,
    pub extension_line_ids: [usize; 2],
}

impl DimensionSpan {
    /// Distance between the extension lines in drawing units
    pub fn drawing_length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }

    /// Drawing units per real millimetre implied by this dimension
    pub fn drawing_units_per_mm(&self) -> f64 {
        self.drawing_length() / self.value.value_mm()
    }
}

/// Segments that may serve as extension lines: tagged as dimensions, or
/// untagged and short.
pub fn extension_line_candidates<'a>(
    segments: &'a [Indexed<LineSegment>],
    config: &RecognitionConfig,
) -> Vec<&'a Indexed<LineSegment>> {
    segments
        .iter()
        .filter(|s| match hint_class(s.value.source_tag.as_deref()) {
            Some(class) => class == crate::types::LineClass::Dimension,
            None => s.value.length() <= config.max_extension_line_length,
        })
        .collect()
}

/// Match every dimension label to the innermost pair of parallel extension
/// lines that brackets it.
pub fn find_dimension_spans(
    labels: &[TextLabel],
    segments: &[Indexed<LineSegment>],
    config: &RecognitionConfig,
) -> Vec<DimensionSpan> {
    let candidates = extension_line_candidates(segments, config);
    let tolerance = config.parallel_angle_tolerance();
    let mut spans = Vec::new();

    for (label_index, label) in labels.iter().enumerate() {
        if !may_be_dimension(&label.text) {
            continue;
        }
        let Some(value) = parse_dimension(&label.text, config.dimension_unit) else {
            continue;
        };

        // Extension lines whose extent (plus proximity) covers the label
        let near: Vec<&Indexed<LineSegment>> = candidates
            .iter()
            .copied()
            .filter(|s| alongside(&label.position, &s.value, config.dimension_label_proximity))
            .collect();

        let mut best: Option<(f64, usize, usize)> = None;
        for i in 0..near.len() {
            for j in (i + 1)..near.len() {
                let (a, b) = (&near[i].value, &near[j].value);
                if !are_parallel(a, b, tolerance) {
                    continue;
                }
                let Some(separation) = bracket_separation(&label.position, a, b) else {
                    continue;
                };
                if best.map_or(true, |(s, _, _)| separation < s) {
                    best = Some((separation, i, j));
                }
            }
        }

        if let Some((_, i, j)) = best {
            let (a, b) = (near[i], near[j]);
            spans.push(DimensionSpan {
                label_index,
                value,
                start: project_onto_line(&label.position, &a.value.start, &a.value.end),
                end: project_onto_line(&label.position, &b.value.start, &b.value.end),
                extension_line_ids: [a.id, b.id],
            });
        }
    }

    tracing::debug!(spans = spans.len(), "Matched dimension strings");
    spans
}

/// The label projects onto the segment's extent, widened by `proximity`
fn alongside(point: &Point2D, segment: &LineSegment, proximity: f64) -> bool {
    let Some(u) = segment.direction() else {
        return false;
    };
    let along = segment.midpoint().vector_to(point).dot(&u);
    along.abs() <= segment.length() / 2.0 + proximity
}

/// Separation of two parallel lines if the point lies strictly between them
fn bracket_separation(point: &Point2D, a: &LineSegment, b: &LineSegment) -> Option<f64> {
    let u = a.direction()?;
    let normal = nalgebra::Vector2::new(-u.y, u.x);
    let mid_a = a.midpoint();
    let mid_b = b.midpoint();

    let separation = mid_a.vector_to(&mid_b).dot(&normal).abs();
    if separation < LENGTH_EPSILON {
        return None;
    }

    let side_a = mid_a.vector_to(point).dot(&normal);
    let side_b = mid_b.vector_to(point).dot(&normal);
    (side_a * side_b < 0.0).then_some(separation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexed(segments: Vec<LineSegment>) -> Vec<Indexed<LineSegment>> {
        segments
            .into_iter()
            .enumerate()
            .map(|(id, value)| Indexed { id, value })
            .collect()
    }

    /// Horizontal dimension from x0 to x1, extension lines hanging down from y=0
    fn dimension(x0: f64, x1: f64, text: &str) -> (Vec<LineSegment>, TextLabel) {
        let lines = vec![
            LineSegment::new(Point2D::new(x0, 0.0), Point2D::new(x0, -300.0)),
            LineSegment::new(Point2D::new(x1, 0.0), Point2D::new(x1, -300.0)),
        ];
        let label = TextLabel::new(text, Point2D::new((x0 + x1) / 2.0, -100.0));
        (lines, label)
    }

    #[test]
    fn test_parse_metric_dimensions() {
        let mm = LengthUnit::Millimetre;
        assert_eq!(parse_dimension("3600", mm).unwrap().value, 3600.0);
        assert_eq!(parse_dimension("3,600", mm).unwrap().value, 3600.0);

        let metres = parse_dimension("3.6 m", mm).unwrap();
        assert_eq!(metres.unit, LengthUnit::Metre);
        assert!((metres.value_mm() - 3600.0).abs() < 1e-9);

        let comma_decimal = parse_dimension("3,6m", mm).unwrap();
        assert!((comma_decimal.value - 3.6).abs() < 1e-9);

        assert!(parse_dimension("0", mm).is_none());
        assert!(parse_dimension("Kitchen", mm).is_none());
    }

    #[test]
    fn test_parse_imperial_dimension() {
        let parsed = parse_dimension("12'-6\"", LengthUnit::Millimetre).unwrap();
        assert_eq!(parsed.unit, LengthUnit::Inch);
        assert!((parsed.value - 150.0).abs() < 1e-9);

        let feet_only = parse_dimension("10'", LengthUnit::Millimetre).unwrap();
        assert!((feet_only.value - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_span_between_extension_lines() {
        let (lines, label) = dimension(0.0, 3600.0, "3600");
        let segments = indexed(lines);
        let config = RecognitionConfig::default();

        let spans = find_dimension_spans(&[label], &segments, &config);

        assert_eq!(spans.len(), 1);
        assert!((spans[0].drawing_length() - 3600.0).abs() < 1e-9);
        assert!((spans[0].drawing_units_per_mm() - 1.0).abs() < 1e-9);
        assert_eq!(spans[0].extension_line_ids, [0, 1]);
    }

    #[test]
    fn test_innermost_pair_is_chosen() {
        let (mut lines, label) = dimension(1000.0, 2000.0, "1000");
        lines.push(LineSegment::new(Point2D::new(0.0, 0.0), Point2D::new(0.0, -300.0)));
        lines.push(LineSegment::new(Point2D::new(3000.0, 0.0), Point2D::new(3000.0, -300.0)));
        let segments = indexed(lines);

        let spans = find_dimension_spans(&[label], &segments, &RecognitionConfig::default());

        assert_eq!(spans.len(), 1);
        assert!((spans[0].drawing_length() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_bracketed_number_is_a_dimension() {
        let (lines, label) = dimension(0.0, 90.0, "90");
        let spans = find_dimension_spans(&[label], &indexed(lines), &RecognitionConfig::default());

        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].value.value, 90.0);
    }

    #[test]
    fn test_label_outside_lines_is_not_matched() {
        let (lines, _) = dimension(0.0, 1000.0, "1000");
        let label = TextLabel::new("1000", Point2D::new(1500.0, -100.0));
        let spans = find_dimension_spans(&[label], &indexed(lines), &RecognitionConfig::default());
        assert!(spans.is_empty());
    }
}
