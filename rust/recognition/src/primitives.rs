// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Primitive model shared by every recognition stage
//!
//! Primitives are immutable values produced by the (external) document
//! parser: line segments, arcs, closed polygons, positioned text and
//! pre-classified symbol instances. Stages never mutate them; they refer to
//! primitives by their index in the owning [`PageInput`] vectors.

use std::collections::BTreeMap;

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Lengths below this are treated as zero.
pub const LENGTH_EPSILON: f64 = 1e-9;

/// A 2D point in drawing units (or pixels for raster input)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_nalgebra(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    pub fn from_nalgebra(p: &Point2<f64>) -> Self {
        Self { x: p.x, y: p.y }
    }

    /// Position vector from the origin
    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self, other: &Point2D) -> Point2D {
        Point2D::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Vector pointing from `self` to `other`
    pub fn vector_to(&self, other: &Point2D) -> Vector2<f64> {
        Vector2::new(other.x - self.x, other.y - self.y)
    }

    /// Point displaced by `direction * distance`
    pub fn offset(&self, direction: &Vector2<f64>, distance: f64) -> Point2D {
        Point2D::new(self.x + direction.x * distance, self.y + direction.y * distance)
    }
}

/// Thin default lineweight; heavier strokes hint at wall edges
fn default_stroke() -> f64 {
    0.25
}

/// A straight line segment as delivered by the parser
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineSegment {
    pub start: Point2D,
    pub end: Point2D,
    /// Stroke width (lineweight for vector input, pixel width for raster)
    #[serde(default = "default_stroke")]
    pub thickness: f64,
    /// Layer name, category or tag attached by the source
    #[serde(default)]
    pub source_tag: Option<String>,
    /// Detector weight for raster-derived lines (normalised Hough votes).
    /// Absent for vector input, which is treated as full strength.
    #[serde(default)]
    pub strength: Option<f64>,
}

impl LineSegment {
    pub fn new(start: Point2D, end: Point2D) -> Self {
        Self {
            start,
            end,
            thickness: default_stroke(),
            source_tag: None,
            strength: None,
        }
    }

    pub fn with_thickness(mut self, thickness: f64) -> Self {
        self.thickness = thickness;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.source_tag = Some(tag.into());
        self
    }

    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = Some(strength);
        self
    }

    pub fn length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }

    pub fn angle(&self) -> f64 {
        (self.end.y - self.start.y).atan2(self.end.x - self.start.x)
    }

    pub fn midpoint(&self) -> Point2D {
        self.start.midpoint(&self.end)
    }

    /// Unit direction from start to end, `None` for degenerate segments
    pub fn direction(&self) -> Option<Vector2<f64>> {
        let v = self.start.vector_to(&self.end);
        let len = v.norm();
        if len < LENGTH_EPSILON {
            None
        } else {
            Some(v / len)
        }
    }

    /// Confidence weight in [0, 1]; 1.0 when no strength was recorded
    pub fn strength_weight(&self) -> f64 {
        self.strength.unwrap_or(1.0).clamp(0.0, 1.0)
    }

    pub fn reversed(&self) -> Self {
        Self {
            start: self.end,
            end: self.start,
            ..self.clone()
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.length() < LENGTH_EPSILON
    }
}

/// Circular arc, angles in degrees measured counter-clockwise from +x
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArcPrimitive {
    pub center: Point2D,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
    #[serde(default)]
    pub source_tag: Option<String>,
}

impl ArcPrimitive {
    pub fn new(center: Point2D, radius: f64, start_angle: f64, end_angle: f64) -> Self {
        Self {
            center,
            radius,
            start_angle,
            end_angle,
            source_tag: None,
        }
    }

    /// Returns the arc with `start_angle < end_angle`, sweeping
    /// counter-clockwise. `None` when the arc is malformed (non-positive
    /// radius, non-finite values or equal angles).
    pub fn normalized(&self) -> Option<Self> {
        if !(self.radius > LENGTH_EPSILON)
            || !self.start_angle.is_finite()
            || !self.end_angle.is_finite()
        {
            return None;
        }
        if (self.end_angle - self.start_angle).abs() < 1e-9 {
            return None;
        }

        let start = self.start_angle.rem_euclid(360.0);
        let mut end = self.end_angle.rem_euclid(360.0);
        while end <= start {
            end += 360.0;
        }
        // Full circles collapse to 0 after rem_euclid; keep them as 360
        if (self.end_angle - self.start_angle).abs() >= 360.0 {
            end = start + 360.0;
        }

        Some(Self {
            center: self.center,
            radius: self.radius,
            start_angle: start,
            end_angle: end,
            source_tag: self.source_tag.clone(),
        })
    }

    /// Swept angle in degrees (meaningful after [`normalized`](Self::normalized))
    pub fn span(&self) -> f64 {
        self.end_angle - self.start_angle
    }

    pub fn point_at(&self, angle_deg: f64) -> Point2D {
        let a = angle_deg.to_radians();
        Point2D::new(
            self.center.x + self.radius * a.cos(),
            self.center.y + self.radius * a.sin(),
        )
    }

    pub fn start_point(&self) -> Point2D {
        self.point_at(self.start_angle)
    }

    pub fn end_point(&self) -> Point2D {
        self.point_at(self.end_angle)
    }

    pub fn chord_length(&self) -> f64 {
        self.start_point().distance_to(&self.end_point())
    }
}

/// Closed polygon with implicit closure (last vertex joins the first).
/// Orientation is not guaranteed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Polygon {
    pub vertices: Vec<Point2D>,
    #[serde(default)]
    pub source_tag: Option<String>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point2D>) -> Self {
        Self {
            vertices,
            source_tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.source_tag = Some(tag.into());
        self
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Number of vertices after collapsing consecutive duplicates
    pub fn distinct_vertex_count(&self, tolerance: f64) -> usize {
        self.deduplicated(tolerance).len()
    }

    /// Drops consecutive vertices closer than `tolerance`, including an
    /// explicit closing vertex that repeats the first one.
    pub fn deduplicated(&self, tolerance: f64) -> Vec<Point2D> {
        let mut out: Vec<Point2D> = Vec::with_capacity(self.vertices.len());
        for v in &self.vertices {
            if out.last().map_or(true, |last| last.distance_to(v) > tolerance) {
                out.push(*v);
            }
        }
        while out.len() > 1 {
            let first = out[0];
            match out.last() {
                Some(last) if last.distance_to(&first) <= tolerance => {
                    out.pop();
                }
                _ => break,
            }
        }
        out
    }

    /// The closed polygon if it keeps at least three distinct vertices
    pub fn closed(&self, tolerance: f64) -> Option<Polygon> {
        let vertices = self.deduplicated(tolerance);
        if vertices.len() < 3 {
            return None;
        }
        Some(Polygon {
            vertices,
            source_tag: self.source_tag.clone(),
        })
    }

    pub fn area(&self) -> f64 {
        crate::geometry::polygon_area(&self.vertices)
    }

    pub fn perimeter(&self) -> f64 {
        crate::geometry::polygon_perimeter(&self.vertices)
    }

    pub fn centroid(&self) -> Point2D {
        crate::geometry::vertex_centroid(&self.vertices)
    }

    pub fn contains(&self, point: &Point2D) -> bool {
        crate::geometry::point_in_polygon(point, &self.vertices)
    }
}

/// Positioned free text. What the text means is inferred downstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextLabel {
    pub text: String,
    pub position: Point2D,
    #[serde(default)]
    pub font_size: f64,
    /// Rotation in degrees
    #[serde(default)]
    pub rotation: f64,
}

impl TextLabel {
    pub fn new(text: impl Into<String>, position: Point2D) -> Self {
        Self {
            text: text.into(),
            position,
            font_size: 0.0,
            rotation: 0.0,
        }
    }
}

/// Pre-classified symbol instance (door/window block, family instance)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbolInstance {
    /// Block or family name, e.g. "DOOR_SINGLE_900"
    pub name: String,
    pub position: Point2D,
    #[serde(default)]
    pub rotation: f64,
    /// Numeric block attributes (width, height, sill_height, ...)
    #[serde(default)]
    pub attributes: BTreeMap<String, f64>,
}

impl SymbolInstance {
    pub fn new(name: impl Into<String>, position: Point2D) -> Self {
        Self {
            name: name.into(),
            position,
            rotation: 0.0,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: f64) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Case-insensitive attribute lookup
    pub fn attribute(&self, key: &str) -> Option<f64> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| *v)
            .filter(|v| v.is_finite())
    }
}

/// Where the primitives of a page came from
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Vector,
    Raster,
}

/// Per-page bundle handed over by the parsing collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageInput {
    #[serde(default)]
    pub page_index: usize,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub source_kind: SourceKind,
    #[serde(default)]
    pub segments: Vec<LineSegment>,
    #[serde(default)]
    pub arcs: Vec<ArcPrimitive>,
    #[serde(default)]
    pub polygons: Vec<Polygon>,
    #[serde(default)]
    pub labels: Vec<TextLabel>,
    #[serde(default)]
    pub symbols: Vec<SymbolInstance>,
    /// Free-form hints from the parser (e.g. "room_outlines")
    #[serde(default)]
    pub source_hint_tags: Vec<String>,
}

impl PageInput {
    pub fn new(page_index: usize, width: f64, height: f64) -> Self {
        Self {
            page_index,
            width,
            height,
            ..Default::default()
        }
    }

    /// Segments, arcs and polygons; labels and symbols are not geometry
    pub fn total_primitive_count(&self) -> usize {
        self.segments.len() + self.arcs.len() + self.polygons.len()
    }

    pub fn has_hint(&self, tag: &str) -> bool {
        self.source_hint_tags
            .iter()
            .any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// A primitive together with its index in the page input
#[derive(Debug, Clone, PartialEq)]
pub struct Indexed<T> {
    pub id: usize,
    pub value: T,
}

/// Counts of malformed primitives skipped during sanitisation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputIssues {
    pub degenerate_segments: usize,
    pub degenerate_arcs: usize,
    pub degenerate_polygons: usize,
}

impl InputIssues {
    pub fn total(&self) -> usize {
        self.degenerate_segments + self.degenerate_arcs + self.degenerate_polygons
    }
}

/// Well-formed primitives of a page, keyed by their original index
#[derive(Debug, Clone, Default)]
pub struct SanitizedPrimitives {
    pub segments: Vec<Indexed<LineSegment>>,
    /// Arcs normalised so that `start_angle < end_angle`
    pub arcs: Vec<Indexed<ArcPrimitive>>,
    /// Polygons with duplicate closing vertices removed
    pub polygons: Vec<Indexed<Polygon>>,
    pub issues: InputIssues,
}

/// Drop malformed primitives, logging each one. Never fails.
pub fn sanitize(page: &PageInput, closure_tolerance: f64) -> SanitizedPrimitives {
    let mut out = SanitizedPrimitives::default();

    for (id, segment) in page.segments.iter().enumerate() {
        let finite = [segment.start.x, segment.start.y, segment.end.x, segment.end.y]
            .iter()
            .all(|v| v.is_finite());
        if !finite || segment.is_degenerate() {
            tracing::warn!(page = page.page_index, segment = id, "Skipping zero-length segment");
            out.issues.degenerate_segments += 1;
            continue;
        }
        out.segments.push(Indexed {
            id,
            value: segment.clone(),
        });
    }

    for (id, arc) in page.arcs.iter().enumerate() {
        match arc.normalized() {
            Some(value) => out.arcs.push(Indexed { id, value }),
            None => {
                tracing::warn!(
                    page = page.page_index,
                    arc = id,
                    start = arc.start_angle,
                    end = arc.end_angle,
                    "Skipping malformed arc"
                );
                out.issues.degenerate_arcs += 1;
            }
        }
    }

    for (id, polygon) in page.polygons.iter().enumerate() {
        match polygon.closed(closure_tolerance) {
            Some(value) => out.polygons.push(Indexed { id, value }),
            None => {
                tracing::warn!(
                    page = page.page_index,
                    polygon = id,
                    vertices = polygon.len(),
                    "Skipping polygon with fewer than 3 distinct vertices"
                );
                out.issues.degenerate_polygons += 1;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arc_normalization_wraps_end_angle() {
        let arc = ArcPrimitive::new(Point2D::new(0.0, 0.0), 900.0, 270.0, 0.0);
        let normalized = arc.normalized().unwrap();

        assert!((normalized.start_angle - 270.0).abs() < 1e-9);
        assert!((normalized.end_angle - 360.0).abs() < 1e-9);
        assert!((normalized.span() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_arc_with_equal_angles_is_malformed() {
        let arc = ArcPrimitive::new(Point2D::new(0.0, 0.0), 900.0, 45.0, 45.0);
        assert!(arc.normalized().is_none());

        let arc = ArcPrimitive::new(Point2D::new(0.0, 0.0), 0.0, 0.0, 90.0);
        assert!(arc.normalized().is_none());
    }

    #[test]
    fn test_polygon_drops_closing_vertex() {
        let polygon = Polygon::new(vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(10.0, 0.0),
            Point2D::new(10.0, 10.0),
            Point2D::new(0.0, 0.0),
        ]);

        let closed = polygon.closed(0.5).unwrap();
        assert_eq!(closed.len(), 3);

        let degenerate = Polygon::new(vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(10.0, 0.0),
            Point2D::new(0.0, 0.0),
        ]);
        assert!(degenerate.closed(0.5).is_none());
    }

    #[test]
    fn test_sanitize_keeps_original_indices() {
        let mut page = PageInput::new(0, 1000.0, 1000.0);
        page.segments.push(LineSegment::new(Point2D::new(0.0, 0.0), Point2D::new(0.0, 0.0)));
        page.segments.push(LineSegment::new(Point2D::new(0.0, 0.0), Point2D::new(100.0, 0.0)));
        page.polygons.push(Polygon::new(vec![Point2D::new(0.0, 0.0), Point2D::new(1.0, 1.0)]));
        page.arcs.push(ArcPrimitive::new(Point2D::new(0.0, 0.0), 10.0, 30.0, 30.0));

        let sanitized = sanitize(&page, 1.0);

        assert_eq!(sanitized.segments.len(), 1);
        assert_eq!(sanitized.segments[0].id, 1);
        assert_eq!(sanitized.issues.degenerate_segments, 1);
        assert_eq!(sanitized.issues.degenerate_polygons, 1);
        assert_eq!(sanitized.issues.degenerate_arcs, 1);
        assert_eq!(sanitized.issues.total(), 3);
    }

    #[test]
    fn test_symbol_attribute_lookup_ignores_case() {
        let symbol = SymbolInstance::new("DOOR", Point2D::new(0.0, 0.0)).with_attribute("WIDTH", 850.0);
        assert_eq!(symbol.attribute("width"), Some(850.0));
        assert_eq!(symbol.attribute("height"), None);
    }
}
