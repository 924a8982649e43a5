// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Room boundaries from the wall graph
//!
//! Wall centerlines form a planar graph: door and window gaps are closed,
//! wall ends stopping at another wall's face are carried onto its
//! centerline, endpoints closer than `node_merge_tolerance` share a node,
//! walls ending on another wall's interior split it, and dangling edges are
//! pruned. Faces are traced by
//! always taking the rightmost turn, which walks every interior face
//! clockwise and the outer face counter-clockwise; the outer face is
//! dropped by its orientation.
//!
//! When the page carries explicit room outlines the tracer is skipped.

use crate::config::RecognitionConfig;
use crate::context::{RecognitionContext, Stage};
use crate::error::Result;
use crate::geometry::{are_parallel, line_parameter, point_to_segment_distance, project_onto_line, signed_area};
use crate::line_classifier::hint_class;
use crate::openings::{wall_gaps, WallGap};
use crate::primitives::{Indexed, LineSegment, Point2D, Polygon};
use crate::types::{DetectedRoom, DetectedWall, ReviewNote, RoomId, RoomSource, RoomType, ScaleInfo, WallId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::f64::consts::TAU;

pub const TRACED_ROOM_CONFIDENCE_FACTOR: f64 = 0.8;
pub const EXPLICIT_OUTLINE_CONFIDENCE: f64 = 0.9;

const OUTLINE_KEYWORDS: &[&str] = &["room", "space", "area", "zone"];

/// Edge of the wall graph; `a < b`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphEdge {
    pub a: usize,
    pub b: usize,
    pub wall: WallId,
}

impl GraphEdge {
    fn other(&self, node: usize) -> usize {
        if self.a == node {
            self.b
        } else {
            self.a
        }
    }
}

/// Planar graph of wall centerlines
#[derive(Debug, Clone, Default)]
pub struct WallGraph {
    pub nodes: Vec<Point2D>,
    pub edges: Vec<GraphEdge>,
    /// Incident edge indices per node, in edge order
    adjacency: Vec<Vec<usize>>,
}

/// Centerline piece entering the graph: a wall, or the span of a gap that
/// closes the wall line across a door or window
#[derive(Debug, Clone)]
struct GraphSegment {
    line: LineSegment,
    thickness: f64,
    wall: WallId,
}

impl WallGraph {
    /// Build the graph: close gaps, join wall ends to the walls they abut,
    /// split T-junctions, unify nodes, drop self-loops and duplicate edges,
    /// then prune dangling edges.
    pub fn build(walls: &[DetectedWall], gaps: &[WallGap], config: &RecognitionConfig) -> Self {
        let tolerance = config.node_merge_tolerance;
        let segments = graph_segments(walls, gaps, config);
        let mut graph = WallGraph::default();
        let mut buckets: FxHashMap<(i64, i64), Vec<usize>> = FxHashMap::default();
        let mut seen: FxHashSet<(usize, usize)> = FxHashSet::default();

        for (index, segment) in segments.iter().enumerate() {
            let points = split_points(index, &segments, tolerance);
            for pair in points.windows(2) {
                let a = graph.node_for(pair[0], tolerance, &mut buckets);
                let b = graph.node_for(pair[1], tolerance, &mut buckets);
                if a == b {
                    continue;
                }
                let key = (a.min(b), a.max(b));
                if !seen.insert(key) {
                    continue;
                }
                graph.edges.push(GraphEdge {
                    a: key.0,
                    b: key.1,
                    wall: segment.wall,
                });
            }
        }

        graph.prune_dangling();
        graph
    }

    /// Existing node within `tolerance` (nearest, lowest id on ties) or a new one
    fn node_for(
        &mut self,
        point: Point2D,
        tolerance: f64,
        buckets: &mut FxHashMap<(i64, i64), Vec<usize>>,
    ) -> usize {
        let cell = |v: f64| (v / tolerance).floor() as i64;
        let (cx, cy) = (cell(point.x), cell(point.y));

        let mut best: Option<(usize, f64)> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                let Some(ids) = buckets.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for &id in ids {
                    let d = self.nodes[id].distance_to(&point);
                    if d <= tolerance
                        && best.map_or(true, |(bid, bd)| d < bd || (d == bd && id < bid))
                    {
                        best = Some((id, d));
                    }
                }
            }
        }

        if let Some((id, _)) = best {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(point);
        buckets.entry((cx, cy)).or_default().push(id);
        id
    }

    /// Repeatedly remove edges with an endpoint of degree one
    fn prune_dangling(&mut self) {
        let mut alive = vec![true; self.edges.len()];
        let mut degree = vec![0usize; self.nodes.len()];
        for edge in &self.edges {
            degree[edge.a] += 1;
            degree[edge.b] += 1;
        }

        loop {
            let mut changed = false;
            for (index, edge) in self.edges.iter().enumerate() {
                if alive[index] && (degree[edge.a] <= 1 || degree[edge.b] <= 1) {
                    alive[index] = false;
                    degree[edge.a] -= 1;
                    degree[edge.b] -= 1;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let pruned = alive.iter().filter(|a| !**a).count();
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned dangling wall graph edges");
        }

        self.edges = self
            .edges
            .iter()
            .zip(&alive)
            .filter_map(|(edge, keep)| keep.then_some(*edge))
            .collect();
        self.adjacency = vec![Vec::new(); self.nodes.len()];
        for (index, edge) in self.edges.iter().enumerate() {
            self.adjacency[edge.a].push(index);
            self.adjacency[edge.b].push(index);
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn degree(&self, node: usize) -> usize {
        self.adjacency.get(node).map_or(0, Vec::len)
    }
}

/// Wall centerlines plus one segment per gap, with wall ends joined to the
/// walls they abut
fn graph_segments(walls: &[DetectedWall], gaps: &[WallGap], config: &RecognitionConfig) -> Vec<GraphSegment> {
    let mut segments: Vec<GraphSegment> = walls
        .iter()
        .map(|w| GraphSegment {
            line: w.centerline.clone(),
            thickness: w.thickness,
            wall: w.id,
        })
        .collect();

    for gap in gaps {
        let thickness = walls
            .iter()
            .find(|w| w.id == gap.first)
            .map_or(config.default_wall_thickness, |w| w.thickness);
        segments.push(GraphSegment {
            line: LineSegment::new(gap.start, gap.end),
            thickness,
            wall: gap.first,
        });
    }

    let joined: Vec<LineSegment> = (0..segments.len())
        .map(|index| joined_line(index, &segments, config))
        .collect();
    for (segment, line) in segments.iter_mut().zip(joined) {
        segment.line = line;
    }
    segments
}

/// Line of `segments[index]` with each end moved onto the centerline of the
/// crossing wall it stops at.
///
/// Face lines of a partition meet the host's face, half the host's
/// thickness short of its centerline, and may stop short by up to the
/// partition's own thickness.
fn joined_line(index: usize, segments: &[GraphSegment], config: &RecognitionConfig) -> LineSegment {
    let own = &segments[index];
    let mut line = own.line.clone();
    let angle_tolerance = config.parallel_angle_tolerance();

    for at_start in [true, false] {
        let end = if at_start { line.start } else { line.end };
        let mut best: Option<(f64, Point2D)> = None;

        for (other, host) in segments.iter().enumerate() {
            let (a, b) = (&host.line.start, &host.line.end);
            if other == index || host.line.is_degenerate() || !(0.0..=1.0).contains(&line_parameter(&end, a, b)) {
                continue;
            }
            if are_parallel(&host.line, &own.line, angle_tolerance) {
                continue;
            }
            let reach = host.thickness / 2.0 + own.thickness + config.node_merge_tolerance;
            let foot = project_onto_line(&end, a, b);
            let d = end.distance_to(&foot);
            if d <= reach && best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, foot));
            }
        }

        if let Some((_, foot)) = best {
            if at_start {
                line.start = foot;
            } else {
                line.end = foot;
            }
        }
    }

    line
}

/// Endpoints of `segments[index]` plus the endpoints of other segments that
/// land on its interior, ordered along it
fn split_points(index: usize, segments: &[GraphSegment], tolerance: f64) -> Vec<Point2D> {
    let line = &segments[index].line;
    let mut splits: Vec<(f64, Point2D)> = vec![(0.0, line.start), (1.0, line.end)];

    for (other_index, other) in segments.iter().enumerate() {
        if other_index == index {
            continue;
        }
        for p in [other.line.start, other.line.end] {
            if point_to_segment_distance(&p, &line.start, &line.end) > tolerance
                || p.distance_to(&line.start) <= tolerance
                || p.distance_to(&line.end) <= tolerance
            {
                continue;
            }
            let t = line_parameter(&p, &line.start, &line.end);
            splits.push((t, project_onto_line(&p, &line.start, &line.end)));
        }
    }

    splits.sort_by(|a, b| a.0.total_cmp(&b.0));
    splits.into_iter().map(|(_, p)| p).collect()
}

/// Counter-clockwise angle from `from` to `to`, in (0, TAU]
fn ccw_angle(from: &nalgebra::Vector2<f64>, to: &nalgebra::Vector2<f64>) -> f64 {
    let angle = (to.y.atan2(to.x) - from.y.atan2(from.x)).rem_euclid(TAU);
    if angle <= 1e-12 {
        TAU
    } else {
        angle
    }
}

enum Walk {
    Closed { nodes: Vec<usize>, edges: Vec<usize> },
    DeadEnd,
    CapExceeded { nodes: Vec<usize>, edges: Vec<usize> },
}

/// Face tracing state: directed half-edges already walked and per-edge face counts
struct FaceTracer<'a> {
    graph: &'a WallGraph,
    visited: FxHashSet<(usize, usize)>,
    edge_use: Vec<u8>,
    max_steps: usize,
}

impl<'a> FaceTracer<'a> {
    fn new(graph: &'a WallGraph, max_steps: usize) -> Self {
        Self {
            graph,
            visited: FxHashSet::default(),
            edge_use: vec![0; graph.edges.len()],
            max_steps,
        }
    }

    fn walk(&mut self, start: usize, first_edge: usize) -> Walk {
        let graph = self.graph;
        let mut nodes = vec![start];
        let mut edges = vec![first_edge];
        // Directed, so a spur into a self-touching loop can be walked out again
        let mut in_walk: FxHashSet<(usize, usize)> = FxHashSet::default();

        let mut prev = start;
        let mut current = graph.edges[first_edge].other(start);
        in_walk.insert((start, current));
        let mut steps = 1;

        while current != start {
            if steps >= self.max_steps {
                return Walk::CapExceeded { nodes, edges };
            }

            let here = graph.nodes[current];
            let back = here.vector_to(&graph.nodes[prev]);

            let next = graph.adjacency[current]
                .iter()
                .copied()
                .filter(|e| self.edge_use[*e] < 2)
                .filter(|e| {
                    let half_edge = (current, graph.edges[*e].other(current));
                    !in_walk.contains(&half_edge) && !self.visited.contains(&half_edge)
                })
                .map(|e| {
                    let to = graph.nodes[graph.edges[e].other(current)];
                    (e, ccw_angle(&back, &here.vector_to(&to)))
                })
                .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

            let Some((edge, _)) = next else {
                return Walk::DeadEnd;
            };

            let to = graph.edges[edge].other(current);
            nodes.push(current);
            edges.push(edge);
            in_walk.insert((current, to));
            prev = current;
            current = to;
            steps += 1;
        }

        Walk::Closed { nodes, edges }
    }

    fn commit(&mut self, nodes: &[usize], edges: &[usize]) {
        self.mark_walked(nodes, edges);
        for &edge in edges {
            self.edge_use[edge] = self.edge_use[edge].saturating_add(1);
        }
    }

    /// A discarded walk's half-edges all lead back into the same walk
    fn mark_walked(&mut self, nodes: &[usize], edges: &[usize]) {
        for (i, &edge) in edges.iter().enumerate() {
            let from = nodes[i];
            let to = self.graph.edges[edge].other(from);
            self.visited.insert((from, to));
        }
    }
}

/// Output of room detection for one page
#[derive(Debug, Clone, Default)]
pub struct RoomTrace {
    pub rooms: Vec<DetectedRoom>,
    pub notes: Vec<ReviewNote>,
}

/// Trace closed faces of the wall graph into rooms.
///
/// Door and window gaps between collinear walls are closed first, so a room
/// with a door in it is still one room.
pub fn trace_rooms(
    walls: &[DetectedWall],
    scale: &ScaleInfo,
    config: &RecognitionConfig,
    ctx: &RecognitionContext,
) -> Result<RoomTrace> {
    let gaps = wall_gaps(walls, config, ctx, Stage::RoomTracing)?;
    let graph = WallGraph::build(walls, &gaps, config);
    let mut tracer = FaceTracer::new(&graph, config.max_trace_iterations);
    let mut trace = RoomTrace::default();

    for start in 0..graph.node_count() {
        ctx.check(Stage::RoomTracing)?;

        for &first_edge in &graph.adjacency[start] {
            let next = graph.edges[first_edge].other(start);
            if tracer.visited.contains(&(start, next)) || tracer.edge_use[first_edge] >= 2 {
                continue;
            }

            match tracer.walk(start, first_edge) {
                Walk::Closed { nodes, edges } => {
                    tracer.commit(&nodes, &edges);
                    if let Some(room) = face_to_room(&graph, &nodes, &edges, walls, scale, config) {
                        trace.rooms.push(DetectedRoom {
                            id: RoomId(trace.rooms.len()),
                            ..room
                        });
                    }
                }
                Walk::DeadEnd => {
                    tracer.visited.insert((start, next));
                }
                Walk::CapExceeded { nodes, edges } => {
                    tracer.mark_walked(&nodes, &edges);
                    tracing::warn!(
                        node = start,
                        cap = config.max_trace_iterations,
                        "Room trace exceeded the iteration cap"
                    );
                    trace.notes.push(ReviewNote {
                        stage: Stage::RoomTracing,
                        message: format!(
                            "boundary trace from node {start} exceeded {} steps and was discarded",
                            config.max_trace_iterations
                        ),
                    });
                }
            }
        }
    }

    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        rooms = trace.rooms.len(),
        "Traced wall graph faces"
    );

    Ok(trace)
}

fn face_to_room(
    graph: &WallGraph,
    nodes: &[usize],
    edges: &[usize],
    walls: &[DetectedWall],
    scale: &ScaleInfo,
    config: &RecognitionConfig,
) -> Option<DetectedRoom> {
    let points: Vec<Point2D> = nodes.iter().map(|&n| graph.nodes[n]).collect();

    // Counter-clockwise faces are the outside of a component
    if signed_area(&points) >= 0.0 {
        return None;
    }

    let boundary = Polygon::new(points).closed(config.closure_tolerance)?;
    let area = boundary.area();
    if area < config.min_room_area {
        return None;
    }

    let mut bounding_wall_ids: Vec<WallId> = Vec::new();
    for &edge in edges {
        let wall = graph.edges[edge].wall;
        if !bounding_wall_ids.contains(&wall) {
            bounding_wall_ids.push(wall);
        }
    }

    let confidences: Vec<f64> = bounding_wall_ids
        .iter()
        .filter_map(|id| walls.iter().find(|w| w.id == *id))
        .map(|w| w.confidence)
        .collect();
    let mean = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f64>() / confidences.len() as f64
    };

    Some(DetectedRoom {
        id: RoomId(0),
        room_type: room_type_from_area(&boundary, scale),
        boundary,
        name: None,
        source: RoomSource::Traced,
        confidence: (TRACED_ROOM_CONFIDENCE_FACTOR * mean).clamp(0.0, 1.0),
        bounding_wall_ids,
        requires_review: false,
        review_reason: None,
    })
}

/// Polygons drawn as room outlines: tagged as rooms or spaces, or every
/// polygon when the page says it carries room outlines.
pub fn outline_polygons<'a>(
    polygons: &'a [Indexed<Polygon>],
    all_are_outlines: bool,
) -> Vec<&'a Indexed<Polygon>> {
    polygons
        .iter()
        .filter(|p| {
            all_are_outlines
                || p.value.source_tag.as_deref().is_some_and(|tag| {
                    let tag = tag.to_ascii_lowercase();
                    hint_class(Some(&tag)).is_none() && OUTLINE_KEYWORDS.iter().any(|k| tag.contains(k))
                })
        })
        .collect()
}

/// Rooms taken directly from outline polygons
pub fn outline_rooms(
    outlines: &[&Indexed<Polygon>],
    walls: &[DetectedWall],
    scale: &ScaleInfo,
    config: &RecognitionConfig,
) -> Vec<DetectedRoom> {
    outlines
        .iter()
        .enumerate()
        .map(|(index, outline)| {
            let boundary = outline.value.clone();
            let bounding_wall_ids = walls
                .iter()
                .filter(|w| {
                    let reach = w.thickness / 2.0 + config.node_merge_tolerance;
                    on_boundary(&w.centerline.midpoint(), &boundary, reach)
                })
                .map(|w| w.id)
                .collect();

            DetectedRoom {
                id: RoomId(index),
                room_type: room_type_from_area(&boundary, scale),
                boundary,
                name: None,
                source: RoomSource::ExplicitOutline,
                confidence: EXPLICIT_OUTLINE_CONFIDENCE,
                bounding_wall_ids,
                requires_review: false,
                review_reason: None,
            }
        })
        .collect()
}

fn on_boundary(point: &Point2D, polygon: &Polygon, reach: f64) -> bool {
    let v = &polygon.vertices;
    (0..v.len()).any(|i| point_to_segment_distance(point, &v[i], &v[(i + 1) % v.len()]) <= reach)
}

/// Rooms of a page: explicit outlines when present, traced faces otherwise
pub fn detect_rooms(
    walls: &[DetectedWall],
    polygons: &[Indexed<Polygon>],
    all_polygons_are_outlines: bool,
    scale: &ScaleInfo,
    config: &RecognitionConfig,
    ctx: &RecognitionContext,
) -> Result<RoomTrace> {
    let outlines = outline_polygons(polygons, all_polygons_are_outlines);
    if !outlines.is_empty() {
        tracing::debug!(outlines = outlines.len(), "Using explicit room outlines");
        return Ok(RoomTrace {
            rooms: outline_rooms(&outlines, walls, scale, config),
            notes: Vec::new(),
        });
    }

    trace_rooms(walls, scale, config, ctx)
}

/// Heuristic use from the floor area in square metres; narrow small rooms
/// read as halls
pub fn room_type_from_area(boundary: &Polygon, scale: &ScaleInfo) -> RoomType {
    let area_m2 = scale.area_in_square_metres(boundary.area());

    let (min_x, max_x, min_y, max_y) = boundary.vertices.iter().fold(
        (f64::MAX, f64::MIN, f64::MAX, f64::MIN),
        |(x0, x1, y0, y1), p| (x0.min(p.x), x1.max(p.x), y0.min(p.y), y1.max(p.y)),
    );
    let (w, h) = (max_x - min_x, max_y - min_y);
    let aspect = if w.min(h) > 0.0 { w.max(h) / w.min(h) } else { 1.0 };

    if area_m2 <= 0.0 {
        RoomType::Unknown
    } else if aspect >= 3.0 && area_m2 < 15.0 {
        RoomType::Hall
    } else if area_m2 < 4.0 {
        RoomType::Storage
    } else if area_m2 < 8.0 {
        RoomType::Bathroom
    } else if area_m2 < 16.0 {
        RoomType::Bedroom
    } else if area_m2 < 35.0 {
        RoomType::Living
    } else {
        RoomType::OpenPlan
    }
}

/// Room use named by a label, if the name says so
pub fn room_type_from_name(name: &str) -> Option<RoomType> {
    let name = name.to_ascii_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| name.contains(w));

    if has(&["bath", "wc", "toilet", "shower", "lavatory", "ensuite"]) {
        Some(RoomType::Bathroom)
    } else if has(&["kitchen", "kitchenette"]) {
        Some(RoomType::Kitchen)
    } else if has(&["bed", "guest"]) {
        Some(RoomType::Bedroom)
    } else if has(&["open plan", "dining"]) {
        Some(RoomType::OpenPlan)
    } else if has(&["living", "lounge", "family", "sitting"]) {
        Some(RoomType::Living)
    } else if has(&["hall", "corridor", "entry", "foyer", "lobby", "landing"]) {
        Some(RoomType::Hall)
    } else if has(&["store", "storage", "closet", "cupboard", "pantry", "utility"]) {
        Some(RoomType::Storage)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::LineSegment;
    use crate::types::{ScaleSource, WallClass};

    fn wall(id: usize, x0: f64, y0: f64, x1: f64, y1: f64) -> DetectedWall {
        DetectedWall {
            id: WallId(id),
            centerline: LineSegment::new(Point2D::new(x0, y0), Point2D::new(x1, y1)),
            thickness: 200.0,
            height: 2700.0,
            wall_class: WallClass::StructuralInterior,
            confidence: 0.9,
            source_primitive_ids: vec![id],
            paired: true,
            explicit_length: None,
            requires_review: false,
            review_reason: None,
        }
    }

    fn mm_scale() -> ScaleInfo {
        ScaleInfo::new(1.0, ScaleSource::Default, 0.5)
    }

    /// 4 m x 3 m rectangle of walls
    fn rectangle() -> Vec<DetectedWall> {
        vec![
            wall(0, 0.0, 0.0, 4000.0, 0.0),
            wall(1, 4000.0, 0.0, 4000.0, 3000.0),
            wall(2, 4000.0, 3000.0, 0.0, 3000.0),
            wall(3, 0.0, 3000.0, 0.0, 0.0),
        ]
    }

    fn trace(walls: &[DetectedWall], config: &RecognitionConfig) -> RoomTrace {
        trace_rooms(walls, &mm_scale(), config, &RecognitionContext::new()).unwrap()
    }

    #[test]
    fn test_single_rectangle() {
        let result = trace(&rectangle(), &RecognitionConfig::default());

        assert_eq!(result.rooms.len(), 1);
        let room = &result.rooms[0];
        assert!((room.area() - 12.0e6).abs() < 1e-3);
        assert!((room.perimeter() - 14_000.0).abs() < 1e-6);
        assert_eq!(room.centroid(), Point2D::new(2000.0, 1500.0));
        assert_eq!(room.bounding_wall_ids.len(), 4);
        assert!((room.confidence - 0.72).abs() < 1e-9);
        assert_eq!(room.room_type, RoomType::Bedroom);
        assert!(result.notes.is_empty());
    }

    #[test]
    fn test_node_tolerance_closes_small_gaps() {
        let walls = vec![
            wall(0, 0.0, 0.0, 4000.0, 0.0),
            wall(1, 4010.0, 5.0, 4000.0, 3000.0),
            wall(2, 4000.0, 3000.0, 0.0, 3000.0),
            wall(3, 0.0, 3000.0, 0.0, 10.0),
        ];
        assert_eq!(trace(&walls, &RecognitionConfig::default()).rooms.len(), 1);
    }

    #[test]
    fn test_partition_wall_with_t_junctions() {
        let mut walls = rectangle();
        // Partition from the middle of the bottom wall to the middle of the top wall
        walls.push(wall(4, 2000.0, 0.0, 2000.0, 3000.0));

        let result = trace(&walls, &RecognitionConfig::default());

        assert_eq!(result.rooms.len(), 2);
        for room in &result.rooms {
            assert!((room.area() - 6.0e6).abs() < 1e-3);
            assert!(room.bounding_wall_ids.contains(&WallId(4)));
        }
        assert_eq!(result.rooms[0].id, RoomId(0));
        assert_eq!(result.rooms[1].id, RoomId(1));
    }

    #[test]
    fn test_dangling_stub_is_pruned() {
        let mut walls = rectangle();
        walls.push(wall(4, 2000.0, 0.0, 2000.0, 1000.0));

        let result = trace(&walls, &RecognitionConfig::default());
        assert_eq!(result.rooms.len(), 1);
        assert!((result.rooms[0].area() - 12.0e6).abs() < 1e-3);
    }

    #[test]
    fn test_open_chain_yields_nothing() {
        let walls = vec![
            wall(0, 0.0, 0.0, 4000.0, 0.0),
            wall(1, 4000.0, 0.0, 4000.0, 3000.0),
            wall(2, 4000.0, 3000.0, 0.0, 3000.0),
        ];
        let result = trace(&walls, &RecognitionConfig::default());
        assert!(result.rooms.is_empty());
    }

    #[test]
    fn test_iteration_cap_discards_trace() {
        let config = RecognitionConfig {
            max_trace_iterations: 3,
            ..Default::default()
        };
        let result = trace(&rectangle(), &config);

        assert!(result.rooms.is_empty());
        // One note per face: the walked half-edges are not retried
        assert_eq!(result.notes.len(), 2);
        assert_eq!(result.notes[0].stage, Stage::RoomTracing);
    }

    #[test]
    fn test_malformed_graph_terminates_under_default_cap() {
        let mut walls = rectangle();
        // Coincident duplicate, zero-length wall, and a spur into a closed loop
        walls.push(wall(4, 0.0, 0.0, 4000.0, 0.0));
        walls.push(wall(5, 1000.0, 1000.0, 1000.0, 1000.0));
        walls.push(wall(6, 2000.0, 0.0, 2000.0, 800.0));
        walls.push(wall(7, 2000.0, 800.0, 2600.0, 1400.0));
        walls.push(wall(8, 2600.0, 1400.0, 1400.0, 1400.0));
        walls.push(wall(9, 1400.0, 1400.0, 2000.0, 800.0));

        let result = trace(&walls, &RecognitionConfig::default());

        // The loop is too small for a room and is cut out of the one around it
        assert_eq!(result.rooms.len(), 1);
        assert!((result.rooms[0].area() - (12.0e6 - 360_000.0)).abs() < 1e-3);
        assert!(result.rooms[0].bounding_wall_ids.contains(&WallId(6)));
        assert!(result.notes.is_empty());
    }

    #[test]
    fn test_partition_stopping_at_inner_face_joins() {
        // Paired faces leave the partition centerline at the host's face
        for (y0, y1) in [(100.0, 2900.0), (200.0, 2800.0)] {
            let mut walls = rectangle();
            let mut partition = wall(4, 2000.0, y0, 2000.0, y1);
            partition.thickness = 100.0;
            walls.push(partition);

            let result = trace(&walls, &RecognitionConfig::default());

            assert_eq!(result.rooms.len(), 2);
            for room in &result.rooms {
                assert!((room.area() - 6.0e6).abs() < 1e-3);
                assert!(room.bounding_wall_ids.contains(&WallId(4)));
            }
        }
    }

    #[test]
    fn test_door_gap_does_not_open_the_room() {
        let walls = vec![
            wall(0, 0.0, 0.0, 1000.0, 0.0),
            wall(1, 1900.0, 0.0, 4000.0, 0.0),
            wall(2, 4000.0, 0.0, 4000.0, 3000.0),
            wall(3, 4000.0, 3000.0, 0.0, 3000.0),
            wall(4, 0.0, 3000.0, 0.0, 0.0),
        ];

        let result = trace(&walls, &RecognitionConfig::default());

        assert_eq!(result.rooms.len(), 1);
        assert!((result.rooms[0].area() - 12.0e6).abs() < 1e-3);
    }

    #[test]
    fn test_graph_joins_and_splits() {
        let mut walls = rectangle();
        let mut partition = wall(4, 2000.0, 100.0, 2000.0, 2900.0);
        partition.thickness = 100.0;
        walls.push(partition);

        let graph = WallGraph::build(&walls, &[], &RecognitionConfig::default());

        // Four corners plus the two T-junctions
        assert_eq!(graph.node_count(), 6);
        assert_eq!(graph.edge_count(), 7);
        assert!(graph.nodes.iter().any(|n| *n == Point2D::new(2000.0, 0.0)));
        assert!(graph.nodes.iter().any(|n| *n == Point2D::new(2000.0, 3000.0)));
    }

    #[test]
    fn test_small_faces_are_not_rooms() {
        let walls = vec![
            wall(0, 0.0, 0.0, 500.0, 0.0),
            wall(1, 500.0, 0.0, 500.0, 500.0),
            wall(2, 500.0, 500.0, 0.0, 500.0),
            wall(3, 0.0, 500.0, 0.0, 0.0),
        ];
        assert!(trace(&walls, &RecognitionConfig::default()).rooms.is_empty());
    }

    #[test]
    fn test_explicit_outline_skips_tracing() {
        let polygons = vec![Indexed {
            id: 0,
            value: Polygon::new(vec![
                Point2D::new(0.0, 0.0),
                Point2D::new(4000.0, 0.0),
                Point2D::new(4000.0, 3000.0),
                Point2D::new(0.0, 3000.0),
            ])
            .with_tag("A-AREA"),
        }];

        let result = detect_rooms(
            &rectangle(),
            &polygons,
            false,
            &mm_scale(),
            &RecognitionConfig::default(),
            &RecognitionContext::new(),
        )
        .unwrap();

        assert_eq!(result.rooms.len(), 1);
        assert_eq!(result.rooms[0].source, RoomSource::ExplicitOutline);
        assert_eq!(result.rooms[0].confidence, EXPLICIT_OUTLINE_CONFIDENCE);
        assert_eq!(result.rooms[0].bounding_wall_ids.len(), 4);
    }

    #[test]
    fn test_untagged_polygons_need_page_hint() {
        let polygons = vec![Indexed {
            id: 0,
            value: Polygon::new(vec![
                Point2D::new(0.0, 0.0),
                Point2D::new(10.0, 0.0),
                Point2D::new(10.0, 10.0),
            ]),
        }];
        assert!(outline_polygons(&polygons, false).is_empty());
        assert_eq!(outline_polygons(&polygons, true).len(), 1);
    }

    #[test]
    fn test_room_types() {
        assert_eq!(room_type_from_name("Master Bedroom"), Some(RoomType::Bedroom));
        assert_eq!(room_type_from_name("WC"), Some(RoomType::Bathroom));
        assert_eq!(room_type_from_name("Kitchen"), Some(RoomType::Kitchen));
        assert_eq!(room_type_from_name("Entrance Hall"), Some(RoomType::Hall));
        assert_eq!(room_type_from_name("Office"), None);

        let corridor = Polygon::new(vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(6000.0, 0.0),
            Point2D::new(6000.0, 1200.0),
            Point2D::new(0.0, 1200.0),
        ]);
        assert_eq!(room_type_from_area(&corridor, &mm_scale()), RoomType::Hall);
    }

    #[test]
    fn test_cancelled_trace() {
        let token = crate::context::CancellationToken::new();
        token.cancel();
        let ctx = RecognitionContext::new().with_cancellation(token);
        let err = trace_rooms(&rectangle(), &mm_scale(), &RecognitionConfig::default(), &ctx).unwrap_err();
        assert!(err.is_cancelled());
    }
}
