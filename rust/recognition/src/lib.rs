// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Drawing recognition for 2D architectural plans
//!
//! Takes normalised primitives (segments, arcs, polygons, text labels and
//! symbols) from a vector drawing, a parsed PDF page or a raster scan and
//! produces typed, confidence-scored building elements:
//! 1. Scale calibration from notation, scale bars or dimension strings
//! 2. Wall detection by pairing parallel face lines
//! 3. Door and window detection from symbols, swing arcs and wall gaps
//! 4. Room tracing over the wall graph
//! 5. Annotation association (room names, dimensions, grid labels)
//!
//! Ambiguous results are kept and flagged for review, never dropped.
//!
//! # Usage
//!
//! ```rust,ignore
//! use planscan_recognition::{PageInput, RecognitionConfig, RecognitionContext, RecognitionEngine};
//!
//! let engine = RecognitionEngine::new(RecognitionConfig::default())?;
//! let result = engine.recognize_page(&page, &RecognitionContext::new())?;
//!
//! for wall in &result.walls {
//!     println!("{} mm thick", result.scale.to_real_length(wall.thickness));
//! }
//! ```

pub mod annotations;
pub mod config;
pub mod context;
pub mod dimensions;
pub mod error;
pub mod geometry;
pub mod line_classifier;
pub mod openings;
pub mod pipeline;
pub mod primitives;
pub mod raster;
pub mod room_tracer;
pub mod scale;
pub mod statistics;
pub mod store;
pub mod types;
pub mod wall_pairing;

// Re-export commonly used types and functions
pub use config::{ArcWidthConvention, RecognitionConfig};
pub use context::{
    CancellationToken, ChannelSink, ProgressEvent, ProgressSink, RecognitionContext, Stage,
};
pub use error::{ConfigError, Error, Result};
pub use pipeline::RecognitionEngine;
pub use primitives::{
    ArcPrimitive, InputIssues, LineSegment, PageInput, Point2D, Polygon, SourceKind,
    SymbolInstance, TextLabel,
};
pub use raster::RasterConfig;
pub use store::{ResultId, ResultStore};
pub use types::{
    DetectedDimension, DetectedGrid, DetectedOpening, DetectedRoom, DetectedWall,
    DocumentResult, ElementRef, GridId, LabelKind, LengthUnit, LineClass, OpeningId,
    OpeningSource, OpeningType, RecognitionResult, RecognitionStatistics, ReviewNote,
    Reviewable, RoomId, RoomSource, RoomType, ScaleInfo, ScaleSource, WallClass, WallId,
};
