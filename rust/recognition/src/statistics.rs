// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Confidence and statistics aggregation
//!
//! Low-confidence elements are flagged, never removed.

use crate::types::{
    DetectedDimension, DetectedGrid, DetectedOpening, DetectedRoom, DetectedWall,
    RecognitionResult, RecognitionStatistics, Reviewable,
};
use rustc_hash::FxHashSet;

/// Primitive ids that ended up inside a typed element, per primitive kind
#[derive(Debug, Clone, Default)]
pub struct RecognizedPrimitives {
    pub segments: FxHashSet<usize>,
    pub arcs: FxHashSet<usize>,
    pub polygons: FxHashSet<usize>,
}

impl RecognizedPrimitives {
    pub fn count(&self) -> usize {
        self.segments.len() + self.arcs.len() + self.polygons.len()
    }
}

fn low_confidence_reason(confidence: f64, threshold: f64) -> String {
    format!("confidence {confidence:.2} below review threshold {threshold:.2}")
}

/// Flag every element whose confidence is under `threshold`; returns how
/// many were newly flagged
pub fn flag_low_confidence<T: Reviewable>(elements: &mut [T], threshold: f64) -> usize {
    let mut flagged = 0;
    for element in elements.iter_mut() {
        let confidence = element.confidence();
        if confidence < threshold {
            if !element.requires_review() {
                flagged += 1;
            }
            element.flag_for_review(&low_confidence_reason(confidence, threshold));
        }
    }
    flagged
}

/// Typed elements of one page, borrowed for counting
pub struct PageElements<'a> {
    pub walls: &'a [DetectedWall],
    pub openings: &'a [DetectedOpening],
    pub rooms: &'a [DetectedRoom],
    pub grids: &'a [DetectedGrid],
    pub dimensions: &'a [DetectedDimension],
}

impl PageElements<'_> {
    fn confidences(&self) -> impl Iterator<Item = f64> + '_ {
        self.walls
            .iter()
            .map(|w| w.confidence)
            .chain(self.openings.iter().map(|o| o.confidence))
            .chain(self.rooms.iter().map(|r| r.confidence))
            .chain(self.grids.iter().map(|g| g.confidence))
    }

    fn review_count(&self) -> usize {
        self.walls.iter().filter(|w| w.requires_review).count()
            + self.openings.iter().filter(|o| o.requires_review).count()
            + self.rooms.iter().filter(|r| r.requires_review).count()
            + self.grids.iter().filter(|g| g.requires_review).count()
    }
}

pub fn recognition_rate(recognized: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        recognized as f64 / total as f64 * 100.0
    }
}

pub fn page_statistics(
    elements: &PageElements<'_>,
    recognized_primitive_count: usize,
    total_primitive_count: usize,
    skipped_primitive_count: usize,
) -> RecognitionStatistics {
    let (sum, count) = elements
        .confidences()
        .fold((0.0, 0usize), |(s, n), c| (s + c, n + 1));
    let door_count = elements
        .openings
        .iter()
        .filter(|o| o.opening_type.is_door())
        .count();

    RecognitionStatistics {
        wall_count: elements.walls.len(),
        door_count,
        window_count: elements.openings.len() - door_count,
        room_count: elements.rooms.len(),
        grid_count: elements.grids.len(),
        dimension_count: elements.dimensions.len(),
        recognized_primitive_count,
        total_primitive_count,
        recognition_rate: recognition_rate(recognized_primitive_count, total_primitive_count),
        average_confidence: if count == 0 { 0.0 } else { sum / count as f64 },
        review_count: elements.review_count(),
        skipped_primitive_count,
    }
}

fn element_count(s: &RecognitionStatistics) -> usize {
    s.wall_count + s.door_count + s.window_count + s.room_count + s.grid_count
}

/// Sum page statistics; the average confidence is weighted by element count
pub fn document_statistics(pages: &[RecognitionResult]) -> RecognitionStatistics {
    let mut total = RecognitionStatistics::default();
    let mut weighted_confidence = 0.0;

    for page in pages {
        let s = &page.statistics;
        total.wall_count += s.wall_count;
        total.door_count += s.door_count;
        total.window_count += s.window_count;
        total.room_count += s.room_count;
        total.grid_count += s.grid_count;
        total.dimension_count += s.dimension_count;
        total.recognized_primitive_count += s.recognized_primitive_count;
        total.total_primitive_count += s.total_primitive_count;
        total.review_count += s.review_count;
        total.skipped_primitive_count += s.skipped_primitive_count;
        weighted_confidence += s.average_confidence * element_count(s) as f64;
    }

    total.recognition_rate =
        recognition_rate(total.recognized_primitive_count, total.total_primitive_count);
    let elements = element_count(&total);
    if elements > 0 {
        total.average_confidence = weighted_confidence / elements as f64;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{InputIssues, LineSegment, Point2D};
    use crate::types::{
        OpeningId, OpeningSource, OpeningType, ScaleInfo, ScaleSource, WallClass, WallId,
    };

    fn wall(id: usize, confidence: f64) -> DetectedWall {
        DetectedWall {
            id: WallId(id),
            centerline: LineSegment::new(Point2D::new(0.0, 0.0), Point2D::new(1000.0, 0.0)),
            thickness: 120.0,
            height: 2700.0,
            wall_class: WallClass::Interior,
            confidence,
            source_primitive_ids: vec![id],
            paired: false,
            explicit_length: None,
            requires_review: false,
            review_reason: None,
        }
    }

    fn opening(id: usize, opening_type: OpeningType, confidence: f64) -> DetectedOpening {
        DetectedOpening {
            id: OpeningId(id),
            opening_type,
            source: OpeningSource::Symbol,
            position: Point2D::new(500.0, 0.0),
            width: 900.0,
            height: 2100.0,
            sill_height: 0.0,
            host_wall_id: None,
            confidence,
            source_primitive_ids: Vec::new(),
            explicit_width: None,
            requires_review: false,
            review_reason: None,
        }
    }

    #[test]
    fn test_low_confidence_is_flagged_not_removed() {
        let mut walls = vec![wall(0, 0.9), wall(1, 0.5)];
        let flagged = flag_low_confidence(&mut walls, 0.6);

        assert_eq!(flagged, 1);
        assert_eq!(walls.len(), 2);
        assert!(!walls[0].requires_review);
        assert!(walls[1].requires_review);
        assert!(walls[1]
            .review_reason
            .as_deref()
            .is_some_and(|r| r.contains("below review threshold")));
    }

    #[test]
    fn test_existing_reason_is_kept() {
        let mut openings = vec![opening(0, OpeningType::Window, 0.5)];
        openings[0].flag_for_review("opening inferred from a gap between walls");

        let flagged = flag_low_confidence(&mut openings, 0.6);

        assert_eq!(flagged, 0);
        let reason = openings[0].review_reason.as_deref().unwrap();
        assert!(reason.starts_with("opening inferred from a gap between walls; "));
    }

    #[test]
    fn test_page_statistics() {
        let walls = vec![wall(0, 0.9), wall(1, 0.7)];
        let openings = vec![
            opening(0, OpeningType::Door, 0.85),
            opening(1, OpeningType::DoubleDoor, 0.85),
            opening(2, OpeningType::Window, 0.5),
        ];
        let elements = PageElements {
            walls: &walls,
            openings: &openings,
            rooms: &[],
            grids: &[],
            dimensions: &[],
        };

        let stats = page_statistics(&elements, 6, 8, 1);

        assert_eq!(stats.wall_count, 2);
        assert_eq!(stats.door_count, 2);
        assert_eq!(stats.window_count, 1);
        assert!((stats.recognition_rate - 75.0).abs() < 1e-9);
        assert!((stats.average_confidence - 0.76).abs() < 1e-9);
        assert_eq!(stats.skipped_primitive_count, 1);
    }

    #[test]
    fn test_empty_page_has_zero_rate() {
        let elements = PageElements {
            walls: &[],
            openings: &[],
            rooms: &[],
            grids: &[],
            dimensions: &[],
        };
        let stats = page_statistics(&elements, 0, 0, 0);
        assert_eq!(stats.recognition_rate, 0.0);
        assert_eq!(stats.average_confidence, 0.0);
    }

    #[test]
    fn test_document_statistics_weighted() {
        let page = |index: usize, walls: usize, confidence: f64, recognized: usize| RecognitionResult {
            page_index: index,
            width: 1000.0,
            height: 1000.0,
            scale: ScaleInfo::new(1.0, ScaleSource::Default, 0.5),
            walls: Vec::new(),
            openings: Vec::new(),
            rooms: Vec::new(),
            grids: Vec::new(),
            dimensions: Vec::new(),
            review_notes: Vec::new(),
            input_issues: InputIssues::default(),
            statistics: RecognitionStatistics {
                wall_count: walls,
                recognized_primitive_count: recognized,
                total_primitive_count: 10,
                average_confidence: confidence,
                ..Default::default()
            },
        };

        let stats = document_statistics(&[page(0, 1, 0.9, 5), page(1, 3, 0.5, 10)]);

        assert_eq!(stats.wall_count, 4);
        assert!((stats.average_confidence - 0.6).abs() < 1e-9);
        assert!((stats.recognition_rate - 75.0).abs() < 1e-9);
    }
}
