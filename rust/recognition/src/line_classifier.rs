// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Segment classification by layer hints, raster strength, stroke and length

use crate::config::RecognitionConfig;
use crate::primitives::{Indexed, LineSegment};
use crate::types::LineClass;
use rustc_hash::FxHashSet;

const WALL_KEYWORDS: &[&str] = &["wall", "mur", "wand"];
const DIMENSION_KEYWORDS: &[&str] = &["dim"];
const GRID_KEYWORDS: &[&str] = &["grid", "axis"];
const ANNOTATION_KEYWORDS: &[&str] = &["text", "anno", "note", "furn", "symbol", "hatch"];

/// Class implied by a layer or category tag alone, if any
pub fn hint_class(tag: Option<&str>) -> Option<LineClass> {
    let tag = tag?.to_ascii_lowercase();
    let has = |keywords: &[&str]| keywords.iter().any(|k| tag.contains(k));

    // Dimension layers are often named "A-WALL-DIMS"; check them first
    if has(DIMENSION_KEYWORDS) {
        Some(LineClass::Dimension)
    } else if has(GRID_KEYWORDS) {
        Some(LineClass::Grid)
    } else if has(WALL_KEYWORDS) {
        Some(LineClass::Wall)
    } else if has(ANNOTATION_KEYWORDS) {
        Some(LineClass::Annotation)
    } else {
        None
    }
}

/// Classify one segment.
///
/// Tags win over geometry. Untagged raster lines below the strength floor
/// stay `Unclassified`; otherwise a heavy stroke or a long run makes a wall
/// edge candidate.
pub fn classify_segment(segment: &LineSegment, config: &RecognitionConfig) -> LineClass {
    if let Some(class) = hint_class(segment.source_tag.as_deref()) {
        return class;
    }

    if let Some(strength) = segment.strength {
        if strength < config.min_line_strength {
            return LineClass::Unclassified;
        }
    }

    if segment.thickness >= config.wall_line_min_stroke {
        return LineClass::Wall;
    }

    if segment.length() >= config.min_wall_segment_length {
        return LineClass::Wall;
    }

    LineClass::Unclassified
}

/// Segments grouped by class, each group in input order
#[derive(Debug, Clone, Default)]
pub struct ClassifiedSegments {
    pub walls: Vec<Indexed<LineSegment>>,
    pub dimensions: Vec<Indexed<LineSegment>>,
    pub grids: Vec<Indexed<LineSegment>>,
    pub annotations: Vec<Indexed<LineSegment>>,
    pub unclassified: Vec<Indexed<LineSegment>>,
}

impl ClassifiedSegments {
    /// Segments that received any class other than `Unclassified`
    pub fn classified_count(&self) -> usize {
        self.walls.len() + self.dimensions.len() + self.grids.len() + self.annotations.len()
    }
}

/// Classify every segment of a page.
///
/// Segments in `dimension_ids` were already read as extension lines or a
/// scale bar and are dimensions whatever their length or stroke.
pub fn classify_segments(
    segments: &[Indexed<LineSegment>],
    dimension_ids: &FxHashSet<usize>,
    config: &RecognitionConfig,
) -> ClassifiedSegments {
    let mut out = ClassifiedSegments::default();

    for segment in segments {
        let class = if dimension_ids.contains(&segment.id) {
            LineClass::Dimension
        } else {
            classify_segment(&segment.value, config)
        };
        let bucket = match class {
            LineClass::Wall => &mut out.walls,
            LineClass::Dimension => &mut out.dimensions,
            LineClass::Grid => &mut out.grids,
            LineClass::Annotation => &mut out.annotations,
            LineClass::Unclassified => &mut out.unclassified,
        };
        bucket.push(segment.clone());
    }

    tracing::debug!(
        walls = out.walls.len(),
        dimensions = out.dimensions.len(),
        grids = out.grids.len(),
        annotations = out.annotations.len(),
        unclassified = out.unclassified.len(),
        "Classified segments"
    );

    out
}
