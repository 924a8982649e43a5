// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recognition pipeline
//!
//! Each page runs through the stages in order:
//! 1. Sanitise primitives and calibrate the scale
//! 2. Classify segments and pair wall faces
//! 3. Detect openings, then trace rooms
//! 4. Associate annotations and aggregate statistics
//!
//! Pages of a document are independent and run in parallel.

use crate::annotations::associate_annotations;
use crate::config::RecognitionConfig;
use crate::context::{RecognitionContext, Stage};
use crate::dimensions::find_dimension_spans;
use crate::error::Result;
use crate::line_classifier::classify_segments;
use crate::openings::detect_openings;
use crate::primitives::{sanitize, PageInput};
use crate::room_tracer::{detect_rooms, outline_polygons, RoomTrace};
use crate::scale::{calibrate, Calibration};
use crate::statistics::{
    document_statistics, flag_low_confidence, page_statistics, PageElements, RecognizedPrimitives,
};
use crate::types::{DocumentResult, OpeningSource, RecognitionResult, RoomSource};
use crate::wall_pairing::detect_walls;
use rayon::prelude::*;
use rustc_hash::FxHashSet;

/// Hint tag meaning every polygon on the page is a room outline
pub const ROOM_OUTLINES_HINT: &str = "room_outlines";

/// Stateless recognition engine holding a validated configuration
#[derive(Debug, Clone)]
pub struct RecognitionEngine {
    config: RecognitionConfig,
}

impl RecognitionEngine {
    /// Validate the configuration; nothing is processed with invalid knobs
    pub fn new(config: RecognitionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    /// Recognise one page. Cancellation discards the whole page.
    pub fn recognize_page(
        &self,
        page: &PageInput,
        ctx: &RecognitionContext,
    ) -> Result<RecognitionResult> {
        let config = &self.config;
        let index = page.page_index;

        ctx.check(Stage::ScaleCalibration)?;
        let sanitized = sanitize(page, config.closure_tolerance);
        let spans = find_dimension_spans(&page.labels, &sanitized.segments, config);
        let Calibration {
            scale,
            measuring_segment_ids,
        } = calibrate(&sanitized.segments, &page.labels, &spans, config);
        ctx.report(index, Stage::ScaleCalibration, 10.0);

        // Extension lines and scale bars never become walls
        ctx.check(Stage::LineClassification)?;
        let measuring: FxHashSet<usize> = measuring_segment_ids.iter().copied().collect();
        let classified = classify_segments(&sanitized.segments, &measuring, config);
        ctx.report(index, Stage::LineClassification, 20.0);

        ctx.check(Stage::WallPairing)?;
        let walls = if config.detect_walls {
            detect_walls(&classified.walls, config, ctx)?
        } else {
            Vec::new()
        };
        ctx.report(index, Stage::WallPairing, 40.0);

        ctx.check(Stage::OpeningDetection)?;
        let openings = detect_openings(&sanitized.arcs, &page.symbols, &walls, config, ctx)?;
        ctx.report(index, Stage::OpeningDetection, 55.0);

        ctx.check(Stage::RoomTracing)?;
        let all_outlines = page.has_hint(ROOM_OUTLINES_HINT);
        let RoomTrace { rooms, notes } = if config.detect_rooms {
            detect_rooms(&walls, &sanitized.polygons, all_outlines, &scale, config, ctx)?
        } else {
            RoomTrace::default()
        };
        ctx.report(index, Stage::RoomTracing, 75.0);

        ctx.check(Stage::AnnotationAssociation)?;
        let mut annotated = associate_annotations(
            &page.labels,
            &spans,
            &classified.grids,
            walls,
            openings,
            rooms,
            &scale,
            config,
        );
        ctx.report(index, Stage::AnnotationAssociation, 90.0);

        ctx.check(Stage::Aggregation)?;
        let threshold = config.review_confidence_threshold;
        let flagged = flag_low_confidence(&mut annotated.walls, threshold)
            + flag_low_confidence(&mut annotated.openings, threshold)
            + flag_low_confidence(&mut annotated.rooms, threshold)
            + flag_low_confidence(&mut annotated.grids, threshold);

        let mut recognized = RecognizedPrimitives::default();
        for wall in &annotated.walls {
            recognized.segments.extend(wall.source_primitive_ids.iter().copied());
        }
        for grid in &annotated.grids {
            recognized.segments.extend(grid.source_primitive_ids.iter().copied());
        }
        recognized.segments.extend(measuring);
        for opening in annotated.openings.iter().filter(|o| o.source == OpeningSource::ArcSwing) {
            recognized.arcs.extend(opening.source_primitive_ids.iter().copied());
        }
        if annotated.rooms.iter().any(|r| r.source == RoomSource::ExplicitOutline) {
            recognized.polygons.extend(
                outline_polygons(&sanitized.polygons, all_outlines)
                    .iter()
                    .map(|p| p.id),
            );
        }

        let statistics = page_statistics(
            &PageElements {
                walls: &annotated.walls,
                openings: &annotated.openings,
                rooms: &annotated.rooms,
                grids: &annotated.grids,
                dimensions: &annotated.dimensions,
            },
            recognized.count(),
            page.total_primitive_count(),
            sanitized.issues.total(),
        );
        ctx.report(index, Stage::Aggregation, 100.0);

        tracing::info!(
            page = index,
            scale = %scale.source_method,
            walls = statistics.wall_count,
            doors = statistics.door_count,
            windows = statistics.window_count,
            rooms = statistics.room_count,
            recognition_rate = statistics.recognition_rate,
            flagged,
            "Recognised page"
        );

        Ok(RecognitionResult {
            page_index: index,
            width: page.width,
            height: page.height,
            scale,
            walls: annotated.walls,
            openings: annotated.openings,
            rooms: annotated.rooms,
            grids: annotated.grids,
            dimensions: annotated.dimensions,
            review_notes: notes,
            input_issues: sanitized.issues,
            statistics,
        })
    }

    /// Recognise every page in parallel; results keep input order
    pub fn recognize_document(
        &self,
        pages: &[PageInput],
        ctx: &RecognitionContext,
    ) -> Result<DocumentResult> {
        let pages = pages
            .par_iter()
            .map(|page| self.recognize_page(page, ctx))
            .collect::<Result<Vec<_>>>()?;
        let statistics = document_statistics(&pages);

        tracing::info!(
            pages = pages.len(),
            walls = statistics.wall_count,
            rooms = statistics.room_count,
            review = statistics.review_count,
            recognition_rate = statistics.recognition_rate,
            "Recognised document"
        );

        Ok(DocumentResult { pages, statistics })
    }
}
