// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine configuration.
//!
//! All lengths are in drawing units of the page being processed (millimetres
//! for typical metric CAD input), all angles in degrees. The configuration is
//! read-only once an engine is built from it.

use crate::error::{ConfigError, Result};
use crate::types::LengthUnit;
use serde::{Deserialize, Serialize};

/// How the width of an arc-swing door is measured
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArcWidthConvention {
    /// Door leaf length equals the swing radius
    #[default]
    Radius,
    /// Width taken from the chord between the arc endpoints
    Chord,
}

/// Configuration for the recognition pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Angle tolerance for parallel and collinear tests (degrees)
    pub parallel_angle_tolerance_deg: f64,

    /// Smallest separation accepted between the two faces of a wall
    pub min_wall_thickness: f64,
    /// Largest separation accepted between the two faces of a wall
    pub max_wall_thickness: f64,
    /// Thickness assigned to walls drawn as a single centerline
    pub default_wall_thickness: f64,
    /// Pair faces only when they overlap along the wall direction
    pub require_face_overlap: bool,
    /// Walls at least this thick are structural interior walls
    pub structural_wall_threshold: f64,
    /// Walls at least this thick are exterior walls
    pub exterior_wall_threshold: f64,
    /// Untagged segments shorter than this are not wall candidates
    pub min_wall_segment_length: f64,
    /// Stroke width at which an untagged segment is taken as a wall edge
    pub wall_line_min_stroke: f64,
    /// Raster segments with a lower normalised vote strength are noise
    pub min_line_strength: f64,
    pub paired_wall_confidence: f64,
    pub unpaired_wall_confidence: f64,

    /// Endpoints closer than this are considered connected
    pub connection_tolerance: f64,
    /// Maximum perpendicular offset between collinear walls
    pub collinear_tolerance: f64,
    /// Wall graph nodes closer than this are unified
    pub node_merge_tolerance: f64,
    /// Explicit closing vertices within this distance of the first are dropped
    pub closure_tolerance: f64,

    pub min_opening_width: f64,
    pub max_opening_width: f64,
    pub single_door_min_width: f64,
    pub double_door_min_width: f64,
    pub double_door_max_width: f64,
    pub door_arc_min_span_deg: f64,
    pub door_arc_max_span_deg: f64,
    pub arc_width_convention: ArcWidthConvention,
    /// Openings closer than this are duplicates of each other
    pub opening_merge_radius: f64,
    /// Maximum distance between an opening and its host wall centerline
    pub opening_host_tolerance: f64,
    pub default_door_width: f64,
    pub default_window_width: f64,

    pub default_wall_height: f64,
    pub default_door_height: f64,
    pub default_window_height: f64,
    pub default_window_sill_height: f64,

    /// Traced faces smaller than this (drawing units squared) are not rooms
    pub min_room_area: f64,
    /// Hard cap on steps of a single boundary walk
    pub max_trace_iterations: usize,

    /// Label-to-extension-line proximity for dimension strings
    pub dimension_label_proximity: f64,
    /// Along-axis tolerance between a dimension endpoint and an element end
    pub dimension_match_tolerance: f64,
    /// Largest offset between a dimension line and the element it measures
    pub dimension_max_offset: f64,
    /// Longer segments are never treated as extension lines
    pub max_extension_line_length: f64,
    pub grid_label_distance: f64,
    /// Unit of bare numeric dimension strings
    pub dimension_unit: LengthUnit,

    /// Millimetres per drawing unit when nothing better is found
    pub default_scale: f64,
    pub default_scale_confidence: f64,
    /// Paper millimetres represented by one drawing unit (for 1:N notation)
    pub paper_mm_per_drawing_unit: f64,
    pub scale_bar_min_length: f64,
    pub scale_bar_max_tick_length: f64,
    /// Unit of scale bar labels without a suffix
    pub scale_bar_unit: LengthUnit,

    /// Elements below this confidence are flagged for review
    pub review_confidence_threshold: f64,

    pub detect_walls: bool,
    pub detect_doors: bool,
    pub detect_windows: bool,
    pub detect_rooms: bool,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            parallel_angle_tolerance_deg: 3.0,
            min_wall_thickness: 20.0,
            max_wall_thickness: 600.0,
            default_wall_thickness: 120.0,
            require_face_overlap: false,
            structural_wall_threshold: 180.0,
            exterior_wall_threshold: 250.0,
            min_wall_segment_length: 300.0,
            wall_line_min_stroke: 0.5,
            min_line_strength: 0.2,
            paired_wall_confidence: 0.9,
            unpaired_wall_confidence: 0.7,
            connection_tolerance: 50.0,
            collinear_tolerance: 30.0,
            node_merge_tolerance: 25.0,
            closure_tolerance: 1.0,
            min_opening_width: 400.0,
            max_opening_width: 3000.0,
            single_door_min_width: 700.0,
            double_door_min_width: 1200.0,
            double_door_max_width: 2400.0,
            door_arc_min_span_deg: 85.0,
            door_arc_max_span_deg: 95.0,
            arc_width_convention: ArcWidthConvention::Radius,
            opening_merge_radius: 400.0,
            opening_host_tolerance: 300.0,
            default_door_width: 900.0,
            default_window_width: 1200.0,
            default_wall_height: 2700.0,
            default_door_height: 2100.0,
            default_window_height: 1200.0,
            default_window_sill_height: 900.0,
            min_room_area: 1.0e6, // 1 m² at 1 unit = 1 mm
            max_trace_iterations: 10_000,
            dimension_label_proximity: 500.0,
            dimension_match_tolerance: 100.0,
            dimension_max_offset: 1500.0,
            max_extension_line_length: 2000.0,
            grid_label_distance: 600.0,
            dimension_unit: LengthUnit::Millimetre,
            default_scale: 1.0,
            default_scale_confidence: 0.5,
            paper_mm_per_drawing_unit: 1.0,
            scale_bar_min_length: 100.0,
            scale_bar_max_tick_length: 60.0,
            scale_bar_unit: LengthUnit::Metre,
            review_confidence_threshold: 0.6,
            detect_walls: true,
            detect_doors: true,
            detect_windows: true,
            detect_rooms: true,
        }
    }
}

impl RecognitionConfig {
    /// Parse a (possibly partial) JSON document and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RecognitionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn parallel_angle_tolerance(&self) -> f64 {
        self.parallel_angle_tolerance_deg.to_radians()
    }

    /// Check every knob; the first violation is returned
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        check_range(
            "parallel_angle_tolerance_deg",
            self.parallel_angle_tolerance_deg,
            f64::EPSILON,
            45.0,
        )?;

        for (field, value) in [
            ("min_wall_thickness", self.min_wall_thickness),
            ("max_wall_thickness", self.max_wall_thickness),
            ("default_wall_thickness", self.default_wall_thickness),
            ("structural_wall_threshold", self.structural_wall_threshold),
            ("exterior_wall_threshold", self.exterior_wall_threshold),
            ("connection_tolerance", self.connection_tolerance),
            ("collinear_tolerance", self.collinear_tolerance),
            ("node_merge_tolerance", self.node_merge_tolerance),
            ("closure_tolerance", self.closure_tolerance),
            ("max_opening_width", self.max_opening_width),
            ("opening_merge_radius", self.opening_merge_radius),
            ("opening_host_tolerance", self.opening_host_tolerance),
            ("default_door_width", self.default_door_width),
            ("default_window_width", self.default_window_width),
            ("default_wall_height", self.default_wall_height),
            ("default_door_height", self.default_door_height),
            ("default_window_height", self.default_window_height),
            ("dimension_label_proximity", self.dimension_label_proximity),
            ("dimension_match_tolerance", self.dimension_match_tolerance),
            ("dimension_max_offset", self.dimension_max_offset),
            ("max_extension_line_length", self.max_extension_line_length),
            ("grid_label_distance", self.grid_label_distance),
            ("default_scale", self.default_scale),
            ("paper_mm_per_drawing_unit", self.paper_mm_per_drawing_unit),
            ("scale_bar_min_length", self.scale_bar_min_length),
            ("scale_bar_max_tick_length", self.scale_bar_max_tick_length),
        ] {
            check_positive(field, value)?;
        }

        for (field, value) in [
            ("min_wall_segment_length", self.min_wall_segment_length),
            ("wall_line_min_stroke", self.wall_line_min_stroke),
            ("min_opening_width", self.min_opening_width),
            ("default_window_sill_height", self.default_window_sill_height),
            ("min_room_area", self.min_room_area),
        ] {
            check_non_negative(field, value)?;
        }

        for (field, value) in [
            ("min_line_strength", self.min_line_strength),
            ("paired_wall_confidence", self.paired_wall_confidence),
            ("unpaired_wall_confidence", self.unpaired_wall_confidence),
            ("default_scale_confidence", self.default_scale_confidence),
            ("review_confidence_threshold", self.review_confidence_threshold),
        ] {
            check_range(field, value, 0.0, 1.0)?;
        }

        check_range("door_arc_min_span_deg", self.door_arc_min_span_deg, 0.0, 360.0)?;
        check_range("door_arc_max_span_deg", self.door_arc_max_span_deg, 0.0, 360.0)?;

        check_order("min_wall_thickness", self.min_wall_thickness, "max_wall_thickness", self.max_wall_thickness)?;
        check_order("structural_wall_threshold", self.structural_wall_threshold, "exterior_wall_threshold", self.exterior_wall_threshold)?;
        check_order("min_opening_width", self.min_opening_width, "max_opening_width", self.max_opening_width)?;
        check_order("single_door_min_width", self.single_door_min_width, "double_door_min_width", self.double_door_min_width)?;
        check_order("double_door_min_width", self.double_door_min_width, "double_door_max_width", self.double_door_max_width)?;
        check_order("door_arc_min_span_deg", self.door_arc_min_span_deg, "door_arc_max_span_deg", self.door_arc_max_span_deg)?;

        if self.max_trace_iterations == 0 {
            return Err(ConfigError::NonPositive {
                field: "max_trace_iterations",
                value: 0.0,
            });
        }

        Ok(())
    }
}

fn check_positive(field: &'static str, value: f64) -> std::result::Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn check_non_negative(field: &'static str, value: f64) -> std::result::Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> std::result::Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

fn check_order(
    lower: &'static str,
    lower_value: f64,
    upper: &'static str,
    upper_value: f64,
) -> std::result::Result<(), ConfigError> {
    if lower_value < upper_value {
        Ok(())
    } else {
        Err(ConfigError::InvertedRange { lower, upper })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RecognitionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_negative_thickness_rejected() {
        let config = RecognitionConfig {
            min_wall_thickness: -5.0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive {
                field: "min_wall_thickness",
                value: -5.0
            })
        );
    }

    #[test]
    fn test_inverted_thickness_bounds_rejected() {
        let config = RecognitionConfig {
            min_wall_thickness: 700.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedRange {
                lower: "min_wall_thickness",
                ..
            })
        ));
    }

    #[test]
    fn test_review_threshold_out_of_range() {
        let config = RecognitionConfig {
            review_confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            RecognitionConfig::from_json(r#"{"max_wall_thickness": 450.0, "detect_rooms": false}"#)
                .unwrap();
        assert_eq!(config.max_wall_thickness, 450.0);
        assert!(!config.detect_rooms);
        assert_eq!(config.parallel_angle_tolerance_deg, 3.0);
    }

    #[test]
    fn test_invalid_json_config_is_rejected() {
        let err = RecognitionConfig::from_json(r#"{"connection_tolerance": 0.0}"#).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::NonPositive { .. })));
    }
}
