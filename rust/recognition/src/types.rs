// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recognised elements and per-page results

use crate::context::Stage;
use crate::geometry::{polygon_area, polygon_perimeter, vertex_centroid};
use crate::primitives::{InputIssues, LineSegment, Point2D, Polygon};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Real-world length units understood in labels and configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LengthUnit {
    #[serde(rename = "mm")]
    Millimetre,
    #[serde(rename = "cm")]
    Centimetre,
    #[serde(rename = "m")]
    Metre,
    #[serde(rename = "in")]
    Inch,
    #[serde(rename = "ft")]
    Foot,
}

impl LengthUnit {
    pub fn to_mm(self) -> f64 {
        match self {
            LengthUnit::Millimetre => 1.0,
            LengthUnit::Centimetre => 10.0,
            LengthUnit::Metre => 1000.0,
            LengthUnit::Inch => 25.4,
            LengthUnit::Foot => 304.8,
        }
    }

    /// Parse a unit suffix as written on drawings
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.trim().to_ascii_lowercase().as_str() {
            "mm" => Some(LengthUnit::Millimetre),
            "cm" => Some(LengthUnit::Centimetre),
            "m" => Some(LengthUnit::Metre),
            "in" | "\"" | "″" => Some(LengthUnit::Inch),
            "ft" | "'" | "′" => Some(LengthUnit::Foot),
            _ => None,
        }
    }
}

/// Which cascade stage produced a scale
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScaleSource {
    ExplicitText,
    ScaleBar,
    DimensionCalibration,
    Default,
}

impl fmt::Display for ScaleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScaleSource::ExplicitText => "explicit_text",
            ScaleSource::ScaleBar => "scale_bar",
            ScaleSource::DimensionCalibration => "dimension_calibration",
            ScaleSource::Default => "default",
        };
        f.write_str(name)
    }
}

/// Drawing-unit to real-world conversion for one page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScaleInfo {
    /// Real-world millimetres represented by one drawing unit
    pub units_per_drawing_unit: f64,
    pub source_method: ScaleSource,
    pub confidence: f64,
    /// Evidence the scale was derived from (notation text, sample count, ...)
    pub detail: Option<String>,
}

impl ScaleInfo {
    pub fn new(units_per_drawing_unit: f64, source_method: ScaleSource, confidence: f64) -> Self {
        Self {
            units_per_drawing_unit,
            source_method,
            confidence,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Drawing units per real-world millimetre
    pub fn drawing_units_per_mm(&self) -> f64 {
        1.0 / self.units_per_drawing_unit
    }

    pub fn to_real_length(&self, drawing_length: f64) -> f64 {
        drawing_length * self.units_per_drawing_unit
    }

    pub fn to_drawing_length(&self, real_mm: f64) -> f64 {
        real_mm / self.units_per_drawing_unit
    }

    pub fn area_in_square_metres(&self, drawing_area: f64) -> f64 {
        drawing_area * self.units_per_drawing_unit * self.units_per_drawing_unit / 1.0e6
    }
}

/// Classification of a raw line segment.
///
/// `Unclassified` is a first-class state: no evidence pointed anywhere.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LineClass {
    Unclassified,
    Wall,
    Dimension,
    Annotation,
    Grid,
}

/// Classification of a text label
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Unclassified,
    RoomName,
    Dimension,
    GridLabel,
    ScaleNotation,
}

macro_rules! element_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[serde(transparent)]
        pub struct $name(pub usize);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

element_id!(
    /// Index of a wall within its page result
    WallId
);
element_id!(
    /// Index of an opening within its page result
    OpeningId
);
element_id!(
    /// Index of a room within its page result
    RoomId
);
element_id!(
    /// Index of a grid line within its page result
    GridId
);

/// Reference to any typed element of a page
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ElementRef {
    Wall(WallId),
    Opening(OpeningId),
    Room(RoomId),
    Grid(GridId),
}

/// Accepted-but-not-fully-trusted state shared by all typed elements
pub trait Reviewable {
    fn confidence(&self) -> f64;
    fn requires_review(&self) -> bool;
    fn review_reason(&self) -> Option<&str>;
    /// Mark for review; an existing reason is kept and the new one appended
    fn flag_for_review(&mut self, reason: &str);
}

fn append_reason(existing: &mut Option<String>, reason: &str) {
    match existing {
        Some(r) if r.contains(reason) => {}
        Some(r) => {
            r.push_str("; ");
            r.push_str(reason);
        }
        None => *existing = Some(reason.to_string()),
    }
}

macro_rules! impl_reviewable {
    ($ty:ty) => {
        impl Reviewable for $ty {
            fn confidence(&self) -> f64 {
                self.confidence
            }

            fn requires_review(&self) -> bool {
                self.requires_review
            }

            fn review_reason(&self) -> Option<&str> {
                self.review_reason.as_deref()
            }

            fn flag_for_review(&mut self, reason: &str) {
                self.requires_review = true;
                append_reason(&mut self.review_reason, reason);
            }
        }
    };
}

/// Wall classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WallClass {
    Exterior,
    StructuralInterior,
    Interior,
}

/// Detected wall (paired faces or a single centerline)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedWall {
    pub id: WallId,
    pub centerline: LineSegment,
    /// Always positive
    pub thickness: f64,
    pub height: f64,
    pub wall_class: WallClass,
    pub confidence: f64,
    /// Indices of the page segments this wall was built from
    pub source_primitive_ids: Vec<usize>,
    /// Built from two parallel faces rather than a single line
    pub paired: bool,
    /// Real-world length from an associated dimension string (mm)
    pub explicit_length: Option<f64>,
    pub requires_review: bool,
    pub review_reason: Option<String>,
}

impl DetectedWall {
    pub fn length(&self) -> f64 {
        self.centerline.length()
    }
}

impl_reviewable!(DetectedWall);

/// Opening type classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OpeningType {
    Door,
    DoubleDoor,
    Window,
}

impl OpeningType {
    pub fn is_door(self) -> bool {
        matches!(self, OpeningType::Door | OpeningType::DoubleDoor)
    }
}

/// Evidence an opening was derived from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OpeningSource {
    Symbol,
    ArcSwing,
    WallGap,
}

/// Detected opening (door/window)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedOpening {
    pub id: OpeningId,
    pub opening_type: OpeningType,
    pub source: OpeningSource,
    pub position: Point2D,
    pub width: f64,
    pub height: f64,
    /// Sill height for windows, 0 for doors
    pub sill_height: f64,
    /// Unresolved hosts are legal
    pub host_wall_id: Option<WallId>,
    pub confidence: f64,
    /// Arc or symbol indices, or the ids of the two walls around a gap
    pub source_primitive_ids: Vec<usize>,
    /// Real-world width from an associated dimension string (mm)
    pub explicit_width: Option<f64>,
    pub requires_review: bool,
    pub review_reason: Option<String>,
}

impl_reviewable!(DetectedOpening);

/// Heuristic room use
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Storage,
    Bathroom,
    Bedroom,
    Living,
    OpenPlan,
    Hall,
    Kitchen,
    Unknown,
}

/// How a room boundary was obtained
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomSource {
    Traced,
    ExplicitOutline,
}

/// Detected room.
///
/// Area, perimeter and centroid are derived from `boundary` on demand and
/// only materialised when serialising.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(into = "RoomRecord", from = "RoomRecord")]
pub struct DetectedRoom {
    pub id: RoomId,
    pub boundary: Polygon,
    pub name: Option<String>,
    pub room_type: RoomType,
    pub source: RoomSource,
    pub confidence: f64,
    pub bounding_wall_ids: Vec<WallId>,
    pub requires_review: bool,
    pub review_reason: Option<String>,
}

impl DetectedRoom {
    /// Shoelace area of the boundary
    pub fn area(&self) -> f64 {
        polygon_area(&self.boundary.vertices)
    }

    pub fn perimeter(&self) -> f64 {
        polygon_perimeter(&self.boundary.vertices)
    }

    /// Unweighted vertex average, not the area centroid
    pub fn centroid(&self) -> Point2D {
        vertex_centroid(&self.boundary.vertices)
    }

    pub fn contains(&self, point: &Point2D) -> bool {
        self.boundary.contains(point)
    }
}

impl_reviewable!(DetectedRoom);

/// Serialised form of a room carrying the derived measures
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoomRecord {
    id: RoomId,
    boundary: Polygon,
    area: f64,
    perimeter: f64,
    centroid: Point2D,
    name: Option<String>,
    room_type: RoomType,
    source: RoomSource,
    confidence: f64,
    bounding_wall_ids: Vec<WallId>,
    requires_review: bool,
    review_reason: Option<String>,
}

impl From<DetectedRoom> for RoomRecord {
    fn from(room: DetectedRoom) -> Self {
        Self {
            area: room.area(),
            perimeter: room.perimeter(),
            centroid: room.centroid(),
            id: room.id,
            boundary: room.boundary,
            name: room.name,
            room_type: room.room_type,
            source: room.source,
            confidence: room.confidence,
            bounding_wall_ids: room.bounding_wall_ids,
            requires_review: room.requires_review,
            review_reason: room.review_reason,
        }
    }
}

impl From<RoomRecord> for DetectedRoom {
    // Stored measures are ignored; the boundary is authoritative
    fn from(record: RoomRecord) -> Self {
        Self {
            id: record.id,
            boundary: record.boundary,
            name: record.name,
            room_type: record.room_type,
            source: record.source,
            confidence: record.confidence,
            bounding_wall_ids: record.bounding_wall_ids,
            requires_review: record.requires_review,
            review_reason: record.review_reason,
        }
    }
}

/// Structural grid line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedGrid {
    pub id: GridId,
    pub label: Option<String>,
    pub line: LineSegment,
    pub confidence: f64,
    pub source_primitive_ids: Vec<usize>,
    pub requires_review: bool,
    pub review_reason: Option<String>,
}

impl_reviewable!(DetectedGrid);

/// Dimension string matched to its extension lines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedDimension {
    /// Index of the label in the page input
    pub label_index: usize,
    pub text: String,
    pub value: f64,
    pub unit: LengthUnit,
    /// Feet of the extension lines on the dimension line
    pub start: Point2D,
    pub end: Point2D,
    /// Segment indices of the two extension lines
    pub extension_line_ids: [usize; 2],
    /// Element whose length or width was overwritten by this dimension
    pub applied_to: Option<ElementRef>,
}

impl DetectedDimension {
    pub fn value_mm(&self) -> f64 {
        self.value * self.unit.to_mm()
    }

    pub fn measured_length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }
}

/// Page-level note for ambiguities that have no element to hang on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewNote {
    pub stage: Stage,
    pub message: String,
}

/// Aggregate counts and confidence for a page or document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecognitionStatistics {
    pub wall_count: usize,
    pub door_count: usize,
    pub window_count: usize,
    pub room_count: usize,
    pub grid_count: usize,
    pub dimension_count: usize,
    pub recognized_primitive_count: usize,
    pub total_primitive_count: usize,
    /// recognized / total x 100, 0 when the page had no primitives
    pub recognition_rate: f64,
    /// Mean confidence over walls, openings, rooms and grids
    pub average_confidence: f64,
    pub review_count: usize,
    pub skipped_primitive_count: usize,
}

/// Everything recognised on one page or view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecognitionResult {
    pub page_index: usize,
    pub width: f64,
    pub height: f64,
    pub scale: ScaleInfo,
    pub walls: Vec<DetectedWall>,
    pub openings: Vec<DetectedOpening>,
    pub rooms: Vec<DetectedRoom>,
    pub grids: Vec<DetectedGrid>,
    pub dimensions: Vec<DetectedDimension>,
    pub review_notes: Vec<ReviewNote>,
    pub input_issues: InputIssues,
    pub statistics: RecognitionStatistics,
}

impl RecognitionResult {
    pub fn wall(&self, id: WallId) -> Option<&DetectedWall> {
        self.walls.get(id.0)
    }

    pub fn opening(&self, id: OpeningId) -> Option<&DetectedOpening> {
        self.openings.get(id.0)
    }

    pub fn room(&self, id: RoomId) -> Option<&DetectedRoom> {
        self.rooms.get(id.0)
    }

    /// Every element flagged for review, in output order
    pub fn review_items(&self) -> Vec<(ElementRef, &str)> {
        let mut items = Vec::new();
        for w in &self.walls {
            if let Some(r) = w.review_reason() {
                items.push((ElementRef::Wall(w.id), r));
            }
        }
        for o in &self.openings {
            if let Some(r) = o.review_reason() {
                items.push((ElementRef::Opening(o.id), r));
            }
        }
        for r in &self.rooms {
            if let Some(reason) = r.review_reason() {
                items.push((ElementRef::Room(r.id), reason));
            }
        }
        for g in &self.grids {
            if let Some(r) = g.review_reason() {
                items.push((ElementRef::Grid(g.id), r));
            }
        }
        items
    }
}

/// Results for a multi-page document, in page order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentResult {
    pub pages: Vec<RecognitionResult>,
    pub statistics: RecognitionStatistics,
}
