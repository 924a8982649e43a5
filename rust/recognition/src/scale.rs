// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scale calibration
//!
//! Each page gets exactly one [`ScaleInfo`]. Candidates are tried in a fixed
//! order (explicit notation, scale bar, dimension strings) and a later one
//! only replaces the current scale when its confidence is strictly higher.
//! The configured default is the starting point, so calibration never fails.

use crate::config::RecognitionConfig;
use crate::dimensions::DimensionSpan;
use crate::geometry::{coefficient_of_variation, line_parameter, lower_median, point_to_line_distance};
use crate::primitives::{Indexed, LineSegment, TextLabel};
use crate::types::{LengthUnit, ScaleInfo, ScaleSource};
use regex::Regex;
use std::f64::consts::FRAC_PI_2;
use std::sync::LazyLock;

pub const EXPLICIT_TEXT_CONFIDENCE: f64 = 0.9;
pub const SCALE_BAR_CONFIDENCE: f64 = 0.8;
pub const CONSISTENT_DIMENSIONS_CONFIDENCE: f64 = 0.85;
pub const INCONSISTENT_DIMENSIONS_CONFIDENCE: f64 = 0.6;
/// Largest coefficient of variation for consistent dimension samples
pub const MAX_DIMENSION_VARIATION: f64 = 0.1;

static RATIO_NOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d.])1\s*:\s*(\d+(?:\.\d+)?)\b").expect("valid ratio regex")
});

static IMPERIAL_NOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(\d+\s+\d+/\d+|\d+/\d+|\d+(?:\.\d+)?)\s*["″]\s*=\s*(\d+)\s*['′]\s*-?\s*(?:(\d+(?:\.\d+)?)\s*["″]?)?"#,
    )
    .expect("valid imperial scale regex")
});

static SCALE_BAR_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(mm|cm|m|ft|in)?\s*$").expect("valid scale bar label regex")
});

/// Ratio `N` (real length over paper length) of a notation such as
/// "SCALE 1:50" or `1/4" = 1'-0"`
pub fn parse_scale_notation(text: &str) -> Option<f64> {
    if let Some(caps) = IMPERIAL_NOTATION.captures(text) {
        let paper_in = parse_fraction(caps.get(1)?.as_str())?;
        let feet: f64 = caps.get(2)?.as_str().parse().ok()?;
        let inches: f64 = match caps.get(3) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0.0,
        };
        let real_in = feet * 12.0 + inches;
        if paper_in > 0.0 && real_in > 0.0 {
            return Some(real_in / paper_in);
        }
        return None;
    }

    let caps = RATIO_NOTATION.captures(text)?;
    let ratio: f64 = caps.get(1)?.as_str().parse().ok()?;
    (ratio > 0.0 && ratio.is_finite()).then_some(ratio)
}

/// "3/16", "1 1/2" or "2"
fn parse_fraction(text: &str) -> Option<f64> {
    let mut total = 0.0;
    for part in text.split_whitespace() {
        total += match part.split_once('/') {
            Some((num, den)) => {
                let num: f64 = num.parse().ok()?;
                let den: f64 = den.parse().ok()?;
                if den == 0.0 {
                    return None;
                }
                num / den
            }
            None => part.parse::<f64>().ok()?,
        };
    }
    Some(total)
}

/// First label carrying a scale notation
pub fn scale_from_text(labels: &[TextLabel], config: &RecognitionConfig) -> Option<ScaleInfo> {
    labels.iter().find_map(|label| {
        let ratio = parse_scale_notation(&label.text)?;
        Some(
            ScaleInfo::new(
                ratio * config.paper_mm_per_drawing_unit,
                ScaleSource::ExplicitText,
                EXPLICIT_TEXT_CONFIDENCE,
            )
            .with_detail(label.text.trim()),
        )
    })
}

/// Value of a scale bar label in millimetres ("0" is legal here)
fn parse_scale_bar_label(text: &str, default_unit: LengthUnit) -> Option<f64> {
    let caps = SCALE_BAR_LABEL.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps
        .get(2)
        .and_then(|m| LengthUnit::from_suffix(m.as_str()))
        .unwrap_or(default_unit);
    Some(value * unit.to_mm())
}

/// A scale bar found on the page
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleBar {
    pub scale: ScaleInfo,
    /// The bar and its ticks
    pub segment_ids: Vec<usize>,
}

/// Find a horizontal bar with evenly spaced ticks and numeric labels.
///
/// Bars are tried in input order; the first one that yields a positive
/// scale wins.
pub fn find_scale_bar(
    segments: &[Indexed<LineSegment>],
    labels: &[TextLabel],
    config: &RecognitionConfig,
) -> Option<ScaleBar> {
    let tolerance = config.parallel_angle_tolerance();

    for candidate in segments {
        let bar = &candidate.value;
        if bar.length() < config.scale_bar_min_length || !is_horizontal(bar, tolerance) {
            continue;
        }

        let (ticks, tick_ids) = tick_positions(bar, segments, config);
        if ticks.len() < 3 {
            continue;
        }

        let spacings: Vec<f64> = ticks.windows(2).map(|w| w[1] - w[0]).collect();
        if coefficient_of_variation(&spacings) > MAX_DIMENSION_VARIATION {
            continue;
        }
        let spacing = spacings.iter().sum::<f64>() / spacings.len() as f64;

        // One label per tick: the nearest numeric label along the bar
        let mut marks: Vec<(f64, f64)> = Vec::new();
        for &tick in &ticks {
            let nearest = labels
                .iter()
                .filter_map(|label| {
                    let value = parse_scale_bar_label(&label.text, config.scale_bar_unit)?;
                    let along = line_parameter(&label.position, &bar.start, &bar.end) * bar.length();
                    let offset = point_to_line_distance(&label.position, &bar.start, &bar.end);
                    let delta = (along - tick).abs();
                    (delta <= spacing / 2.0 && offset <= config.scale_bar_max_tick_length * 3.0)
                        .then_some((delta, value))
                })
                .min_by(|a, b| a.0.total_cmp(&b.0));
            if let Some((_, value)) = nearest {
                marks.push((tick, value));
            }
        }

        let (Some(first), Some(last)) = (marks.first(), marks.last()) else {
            continue;
        };
        if marks.len() < 2 {
            continue;
        }

        let drawing = last.0 - first.0;
        let real_mm = last.1 - first.1;
        if drawing <= 0.0 || real_mm <= 0.0 {
            continue;
        }

        tracing::debug!(ticks = ticks.len(), labels = marks.len(), "Found scale bar");
        let mut segment_ids = tick_ids;
        segment_ids.push(candidate.id);
        segment_ids.sort_unstable();
        return Some(ScaleBar {
            scale: ScaleInfo::new(real_mm / drawing, ScaleSource::ScaleBar, SCALE_BAR_CONFIDENCE)
                .with_detail(format!("{} ticks, {} labels", ticks.len(), marks.len())),
            segment_ids,
        });
    }

    None
}

pub fn scale_from_bar(
    segments: &[Indexed<LineSegment>],
    labels: &[TextLabel],
    config: &RecognitionConfig,
) -> Option<ScaleInfo> {
    find_scale_bar(segments, labels, config).map(|bar| bar.scale)
}

fn is_horizontal(segment: &LineSegment, tolerance: f64) -> bool {
    let angle = segment.angle().rem_euclid(std::f64::consts::PI);
    angle.min(std::f64::consts::PI - angle) <= tolerance
}

/// Along-bar positions of perpendicular ticks touching the bar, sorted,
/// plus the ids of the tick segments
fn tick_positions(
    bar: &LineSegment,
    segments: &[Indexed<LineSegment>],
    config: &RecognitionConfig,
) -> (Vec<f64>, Vec<usize>) {
    let tolerance = config.parallel_angle_tolerance();
    let bar_length = bar.length();

    let ticks: Vec<(f64, usize)> = segments
        .iter()
        .filter(|tick| tick.value.length() <= config.scale_bar_max_tick_length)
        .filter(|tick| {
            let diff = crate::geometry::angle_between(bar, &tick.value);
            (FRAC_PI_2 - diff).abs() <= tolerance
        })
        .filter_map(|tick| {
            let mid = tick.value.midpoint();
            let offset = point_to_line_distance(&mid, &bar.start, &bar.end);
            if offset > tick.value.length() {
                return None;
            }
            let t = line_parameter(&mid, &bar.start, &bar.end);
            (-0.01..=1.01).contains(&t).then_some((t * bar_length, tick.id))
        })
        .collect();

    let ids = ticks.iter().map(|(_, id)| *id).collect();
    let mut positions: Vec<f64> = ticks.into_iter().map(|(p, _)| p).collect();
    positions.sort_by(|a, b| a.total_cmp(b));
    positions.dedup_by(|a, b| (*a - *b).abs() < 1e-6);
    (positions, ids)
}

/// Median of drawing-units-per-millimetre samples with a consistency check.
///
/// Two or more samples whose coefficient of variation is below 10% give
/// 0.85; anything else 0.6.
pub fn scale_from_samples(samples: &[f64]) -> Option<ScaleInfo> {
    let samples: Vec<f64> = samples
        .iter()
        .copied()
        .filter(|s| s.is_finite() && *s > 0.0)
        .collect();
    let median = lower_median(&samples)?;
    let variation = coefficient_of_variation(&samples);

    let confidence = if samples.len() >= 2 && variation < MAX_DIMENSION_VARIATION {
        CONSISTENT_DIMENSIONS_CONFIDENCE
    } else {
        INCONSISTENT_DIMENSIONS_CONFIDENCE
    };

    Some(
        ScaleInfo::new(1.0 / median, ScaleSource::DimensionCalibration, confidence)
            .with_detail(format!("{} samples, cv {:.3}", samples.len(), variation)),
    )
}

pub fn scale_from_dimensions(spans: &[DimensionSpan]) -> Option<ScaleInfo> {
    let samples: Vec<f64> = spans.iter().map(DimensionSpan::drawing_units_per_mm).collect();
    scale_from_samples(&samples)
}

pub fn default_scale(config: &RecognitionConfig) -> ScaleInfo {
    ScaleInfo::new(
        config.default_scale,
        ScaleSource::Default,
        config.default_scale_confidence,
    )
}

/// Scale of a page and the segments the calibration read as measuring
/// geometry rather than building lines
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub scale: ScaleInfo,
    /// Extension lines of matched dimension strings and the scale bar, sorted
    pub measuring_segment_ids: Vec<usize>,
}

/// Run the cascade for one page
pub fn calibrate_scale(
    segments: &[Indexed<LineSegment>],
    labels: &[TextLabel],
    dimension_spans: &[DimensionSpan],
    config: &RecognitionConfig,
) -> ScaleInfo {
    calibrate(segments, labels, dimension_spans, config).scale
}

/// Run the cascade and collect the segments it consumed
pub fn calibrate(
    segments: &[Indexed<LineSegment>],
    labels: &[TextLabel],
    dimension_spans: &[DimensionSpan],
    config: &RecognitionConfig,
) -> Calibration {
    let mut scale = default_scale(config);
    let bar = find_scale_bar(segments, labels, config);

    let mut measuring_segment_ids: Vec<usize> = dimension_spans
        .iter()
        .flat_map(|span| span.extension_line_ids)
        .chain(bar.iter().flat_map(|b| b.segment_ids.iter().copied()))
        .collect();
    measuring_segment_ids.sort_unstable();
    measuring_segment_ids.dedup();

    let candidates = [
        scale_from_text(labels, config),
        bar.map(|b| b.scale),
        scale_from_dimensions(dimension_spans),
    ];

    for candidate in candidates.into_iter().flatten() {
        tracing::debug!(
            source = %candidate.source_method,
            confidence = candidate.confidence,
            mm_per_unit = candidate.units_per_drawing_unit,
            "Scale candidate"
        );
        if candidate.confidence > scale.confidence {
            scale = candidate;
        }
    }

    Calibration {
        scale,
        measuring_segment_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Point2D;

    fn indexed(segments: Vec<LineSegment>) -> Vec<Indexed<LineSegment>> {
        segments
            .into_iter()
            .enumerate()
            .map(|(id, value)| Indexed { id, value })
            .collect()
    }

    fn label(text: &str, x: f64, y: f64) -> TextLabel {
        TextLabel::new(text, Point2D::new(x, y))
    }

    fn line(x0: f64, y0: f64, x1: f64, y1: f64) -> LineSegment {
        LineSegment::new(Point2D::new(x0, y0), Point2D::new(x1, y1))
    }

    #[test]
    fn test_parse_ratio_notation() {
        assert_eq!(parse_scale_notation("SCALE 1:50"), Some(50.0));
        assert_eq!(parse_scale_notation("1 : 100 @ A1"), Some(100.0));
        assert_eq!(parse_scale_notation("11:30"), None);
        assert_eq!(parse_scale_notation("Kitchen"), None);
    }

    #[test]
    fn test_parse_imperial_notation() {
        let ratio = parse_scale_notation("1/4\" = 1'-0\"").unwrap();
        assert!((ratio - 48.0).abs() < 1e-9);

        let ratio = parse_scale_notation("3/16″ = 1′-0″").unwrap();
        assert!((ratio - 64.0).abs() < 1e-9);

        let ratio = parse_scale_notation("1 1/2\" = 1'").unwrap();
        assert!((ratio - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_only() {
        let config = RecognitionConfig::default();
        let scale = calibrate_scale(&[], &[], &[], &config);

        assert_eq!(scale.source_method, ScaleSource::Default);
        assert_eq!(scale.source_method.to_string(), "default");
        assert_eq!(scale.confidence, 0.5);
        assert_eq!(scale.units_per_drawing_unit, 1.0);
    }

    #[test]
    fn test_explicit_text_wins() {
        let config = RecognitionConfig::default();
        let labels = vec![label("Living", 0.0, 0.0), label("SCALE 1:100", 10.0, 10.0)];
        let scale = calibrate_scale(&[], &labels, &[], &config);

        assert_eq!(scale.source_method, ScaleSource::ExplicitText);
        assert_eq!(scale.confidence, 0.9);
        assert_eq!(scale.units_per_drawing_unit, 100.0);
        assert_eq!(scale.detail.as_deref(), Some("SCALE 1:100"));
    }

    #[test]
    fn test_median_of_two_samples() {
        let scale = scale_from_samples(&[10.4, 10.0]).unwrap();

        assert_eq!(scale.source_method, ScaleSource::DimensionCalibration);
        assert_eq!(scale.confidence, 0.85);
        assert!((scale.drawing_units_per_mm() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_scattered_samples_get_low_confidence() {
        let scale = scale_from_samples(&[10.0, 20.0, 5.0]).unwrap();
        assert_eq!(scale.confidence, 0.6);
        assert!((scale.drawing_units_per_mm() - 10.0).abs() < 1e-9);

        let single = scale_from_samples(&[4.0]).unwrap();
        assert_eq!(single.confidence, 0.6);

        assert!(scale_from_samples(&[]).is_none());
    }

    #[test]
    fn test_scale_bar() {
        // 0-1-2-3 m bar drawn 300 units long: 10 mm per unit
        let mut segments = vec![line(0.0, 0.0, 300.0, 0.0)];
        for x in [0.0, 100.0, 200.0, 300.0] {
            segments.push(line(x, -10.0, x, 10.0));
        }
        let labels = vec![
            label("0", 0.0, 25.0),
            label("1", 100.0, 25.0),
            label("2", 200.0, 25.0),
            label("3 m", 300.0, 25.0),
        ];
        let config = RecognitionConfig::default();

        let scale = scale_from_bar(&indexed(segments), &labels, &config).unwrap();

        assert_eq!(scale.source_method, ScaleSource::ScaleBar);
        assert_eq!(scale.confidence, 0.8);
        assert!((scale.units_per_drawing_unit - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_uneven_ticks_are_not_a_scale_bar() {
        let mut segments = vec![line(0.0, 0.0, 300.0, 0.0)];
        for x in [0.0, 20.0, 200.0, 300.0] {
            segments.push(line(x, -10.0, x, 10.0));
        }
        let labels = vec![label("0", 0.0, 25.0), label("3", 300.0, 25.0)];

        assert!(scale_from_bar(&indexed(segments), &labels, &RecognitionConfig::default()).is_none());
    }

    #[test]
    fn test_scale_bar_replaces_default() {
        let config = RecognitionConfig::default();
        let mut segments = vec![line(0.0, 0.0, 300.0, 0.0)];
        for x in [0.0, 100.0, 200.0, 300.0] {
            segments.push(line(x, -10.0, x, 10.0));
        }
        let labels = vec![label("0", 0.0, 25.0), label("3", 300.0, 25.0)];

        let scale = calibrate_scale(&indexed(segments), &labels, &[], &config);
        assert_eq!(scale.source_method, ScaleSource::ScaleBar);
    }

    #[test]
    fn test_calibration_collects_measuring_lines() {
        let config = RecognitionConfig::default();
        let mut segments = vec![line(0.0, 0.0, 300.0, 0.0)];
        for x in [0.0, 100.0, 200.0, 300.0] {
            segments.push(line(x, -10.0, x, 10.0));
        }
        // Building line that must stay out of the set
        segments.push(line(0.0, 1000.0, 5000.0, 1000.0));
        let labels = vec![label("0", 0.0, 25.0), label("3", 300.0, 25.0)];

        let calibration = calibrate(&indexed(segments), &labels, &[], &config);

        assert_eq!(calibration.scale.source_method, ScaleSource::ScaleBar);
        assert_eq!(calibration.measuring_segment_ids, vec![0, 1, 2, 3, 4]);
    }
}
