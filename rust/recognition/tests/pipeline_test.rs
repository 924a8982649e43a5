// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end recognition over synthetic pages

use approx::assert_relative_eq;
use planscan_recognition::{
    ArcPrimitive, CancellationToken, ElementRef, LineSegment, OpeningSource, OpeningType,
    PageInput, Point2D, Polygon, RecognitionConfig, RecognitionContext, RecognitionEngine,
    ResultStore, RoomType, ScaleSource, Stage, TextLabel, WallId,
};

fn line(x0: f64, y0: f64, x1: f64, y1: f64) -> LineSegment {
    LineSegment::new(Point2D::new(x0, y0), Point2D::new(x1, y1))
}

fn engine() -> RecognitionEngine {
    RecognitionEngine::new(RecognitionConfig::default()).unwrap()
}

/// 4000 x 3000 room drawn as single centerlines on a wall layer
fn centerline_room() -> PageInput {
    let mut page = PageInput::new(0, 5000.0, 4000.0);
    page.segments = vec![
        line(0.0, 0.0, 4000.0, 0.0).with_tag("A-WALL"),
        line(4000.0, 0.0, 4000.0, 3000.0).with_tag("A-WALL"),
        line(4000.0, 3000.0, 0.0, 3000.0).with_tag("A-WALL"),
        line(0.0, 3000.0, 0.0, 0.0).with_tag("A-WALL"),
    ];
    page
}

/// Two collinear walls on a wall layer with a gap of `width` between them
fn gap_page(width: f64) -> PageInput {
    let mut page = PageInput::new(0, 10_000.0, 1000.0);
    page.segments = vec![
        line(0.0, 0.0, 3000.0, 0.0).with_tag("WALL"),
        line(3000.0 + width, 0.0, 9000.0, 0.0).with_tag("WALL"),
    ];
    page
}

/// 4000 x 3000 room drawn as untagged 200 thick double lines
fn double_line_room() -> PageInput {
    let mut page = PageInput::new(0, 5000.0, 4000.0);
    page.segments = vec![
        line(-100.0, -100.0, 4100.0, -100.0),
        line(100.0, 100.0, 3900.0, 100.0),
        line(4100.0, -100.0, 4100.0, 3100.0),
        line(3900.0, 100.0, 3900.0, 2900.0),
        line(4100.0, 3100.0, -100.0, 3100.0),
        line(3900.0, 2900.0, 100.0, 2900.0),
        line(-100.0, 3100.0, -100.0, -100.0),
        line(100.0, 2900.0, 100.0, 100.0),
    ];
    page
}

#[test]
fn test_bare_page_uses_default_scale() {
    let result = engine()
        .recognize_page(&PageInput::new(0, 100.0, 100.0), &RecognitionContext::new())
        .unwrap();

    assert_eq!(result.scale.source_method, ScaleSource::Default);
    assert_eq!(result.scale.confidence, 0.5);
    assert!(result.walls.is_empty());
    assert_eq!(result.statistics.recognition_rate, 0.0);
}

#[test]
fn test_dimension_strings_calibrate_scale() {
    // Drawn at 10 mm per drawing unit
    let mut page = PageInput::new(0, 1000.0, 1200.0);
    page.segments = vec![
        line(0.0, 0.0, 0.0, -300.0).with_tag("DIM"),
        line(360.0, 0.0, 360.0, -300.0).with_tag("DIM"),
        line(0.0, 1000.0, 0.0, 700.0).with_tag("DIM"),
        line(250.0, 1000.0, 250.0, 700.0).with_tag("DIM"),
    ];
    page.labels = vec![
        TextLabel::new("3600", Point2D::new(180.0, -100.0)),
        TextLabel::new("2500", Point2D::new(125.0, 900.0)),
    ];

    let result = engine().recognize_page(&page, &RecognitionContext::new()).unwrap();

    assert_eq!(result.scale.source_method, ScaleSource::DimensionCalibration);
    assert_eq!(result.scale.confidence, 0.85);
    assert_relative_eq!(result.scale.units_per_drawing_unit, 10.0, epsilon = 1e-9);
    assert_eq!(result.dimensions.len(), 2);
    assert!(result.dimensions.iter().all(|d| d.applied_to.is_none()));
    assert_eq!(result.statistics.recognized_primitive_count, 4);

    // Explicit notation outranks the dimension strings
    page.labels.push(TextLabel::new("SCALE 1:50", Point2D::new(800.0, 1100.0)));
    let result = engine().recognize_page(&page, &RecognitionContext::new()).unwrap();
    assert_eq!(result.scale.source_method, ScaleSource::ExplicitText);
    assert_relative_eq!(result.scale.units_per_drawing_unit, 50.0, epsilon = 1e-9);
}

#[test]
fn test_gap_widths_classify_openings() {
    let cases = [
        (900.0, OpeningType::Door),
        (1800.0, OpeningType::DoubleDoor),
        (2600.0, OpeningType::Window),
    ];

    for (width, expected) in cases {
        let result = engine()
            .recognize_page(&gap_page(width), &RecognitionContext::new())
            .unwrap();

        assert_eq!(result.walls.len(), 2, "gap {width}");
        assert_eq!(result.openings.len(), 1, "gap {width}");
        let opening = &result.openings[0];
        assert_eq!(opening.opening_type, expected, "gap {width}");
        assert_eq!(opening.source, OpeningSource::WallGap);
        assert_relative_eq!(opening.width, width, epsilon = 1e-9);
        assert_eq!(opening.host_wall_id, Some(WallId(0)));
        assert!(opening.requires_review);
    }
}

#[test]
fn test_quarter_arc_is_reviewed_door() {
    let mut page = PageInput::new(0, 2000.0, 2000.0);
    page.arcs = vec![ArcPrimitive::new(Point2D::new(500.0, 500.0), 900.0, 0.0, 90.0)];

    let result = engine().recognize_page(&page, &RecognitionContext::new()).unwrap();

    assert_eq!(result.openings.len(), 1);
    assert_eq!(result.openings[0].opening_type, OpeningType::Door);
    assert!(result.openings[0].requires_review);
    assert!(result
        .review_items()
        .iter()
        .any(|(element, _)| *element == ElementRef::Opening(result.openings[0].id)));
}

#[test]
fn test_named_room_from_centerlines() {
    let mut page = centerline_room();
    page.labels.push(TextLabel::new("Bathroom", Point2D::new(2000.0, 1500.0)));

    let result = engine().recognize_page(&page, &RecognitionContext::new()).unwrap();

    assert_eq!(result.walls.len(), 4);
    assert!(result.walls.iter().all(|w| !w.paired));
    assert_eq!(result.rooms.len(), 1);

    let room = &result.rooms[0];
    assert_eq!(room.name.as_deref(), Some("Bathroom"));
    assert_eq!(room.room_type, RoomType::Bathroom);
    assert_relative_eq!(room.area(), 12.0e6, epsilon = 1e-6);
    assert_relative_eq!(room.perimeter(), 14_000.0, epsilon = 1e-6);
    assert_eq!(room.bounding_wall_ids.len(), 4);
}

#[test]
fn test_rerun_is_identical() {
    let mut page = centerline_room();
    page.segments.push(line(2000.0, 0.0, 2000.0, 3000.0).with_tag("A-WALL"));
    page.arcs.push(ArcPrimitive::new(Point2D::new(1000.0, 0.0), 800.0, 0.0, 90.0));
    page.labels.push(TextLabel::new("Hall", Point2D::new(1000.0, 1500.0)));

    let first = engine().recognize_page(&page, &RecognitionContext::new()).unwrap();
    let second = engine().recognize_page(&page, &RecognitionContext::new()).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_iteration_cap_terminates_without_room() {
    let config = RecognitionConfig {
        max_trace_iterations: 3,
        ..Default::default()
    };
    let engine = RecognitionEngine::new(config).unwrap();

    let result = engine
        .recognize_page(&centerline_room(), &RecognitionContext::new())
        .unwrap();

    assert!(result.rooms.is_empty());
    assert!(!result.review_notes.is_empty());
    assert!(result.review_notes.iter().all(|n| n.stage == Stage::RoomTracing));
}

#[test]
fn test_square_measures_ignore_start_and_direction() {
    let square = [
        Point2D::new(0.0, 0.0),
        Point2D::new(10.0, 0.0),
        Point2D::new(10.0, 10.0),
        Point2D::new(0.0, 10.0),
    ];
    let rotated: Vec<Point2D> = square.iter().cycle().skip(2).take(4).copied().collect();
    let reversed: Vec<Point2D> = square.iter().rev().copied().collect();

    for vertices in [square.to_vec(), rotated, reversed] {
        let polygon = Polygon::new(vertices);
        assert_relative_eq!(polygon.area(), 100.0);
        assert_relative_eq!(polygon.perimeter(), 40.0);
        assert_eq!(polygon.centroid(), Point2D::new(5.0, 5.0));
    }
}

#[test]
fn test_cancelled_document_returns_error() {
    let token = CancellationToken::new();
    token.cancel();
    let ctx = RecognitionContext::new().with_cancellation(token);

    let pages = vec![centerline_room(), gap_page(900.0)];
    let err = engine().recognize_document(&pages, &ctx).unwrap_err();
    assert!(err.is_cancelled());
}

#[test]
fn test_document_result_in_store() {
    let mut second = gap_page(900.0);
    second.page_index = 1;
    let document = engine()
        .recognize_document(&[centerline_room(), second], &RecognitionContext::new())
        .unwrap();

    assert_eq!(document.statistics.wall_count, 6);
    assert_eq!(document.statistics.door_count, 1);
    assert_eq!(document.statistics.room_count, 1);

    let store = ResultStore::new();
    let id = store.insert(document.clone());
    assert_eq!(store.get(&id).as_deref(), Some(&document));
}

#[test]
fn test_untagged_dimension_beside_double_line_room() {
    let mut page = double_line_room();
    page.segments.push(line(0.0, -500.0, 0.0, -800.0));
    page.segments.push(line(4000.0, -500.0, 4000.0, -800.0));
    page.labels.push(TextLabel::new("4000", Point2D::new(2000.0, -650.0)));

    let result = engine().recognize_page(&page, &RecognitionContext::new()).unwrap();

    assert_eq!(result.walls.len(), 4);
    assert!(result.walls.iter().all(|w| w.paired));
    assert!(result
        .walls
        .iter()
        .all(|w| !w.source_primitive_ids.contains(&8) && !w.source_primitive_ids.contains(&9)));
    assert_eq!(result.scale.source_method, ScaleSource::DimensionCalibration);
    assert_relative_eq!(result.scale.units_per_drawing_unit, 1.0, epsilon = 1e-9);
    assert_eq!(result.dimensions.len(), 1);
    assert_eq!(result.dimensions[0].extension_line_ids, [8, 9]);
    assert_eq!(result.rooms.len(), 1);
    assert_relative_eq!(result.rooms[0].area(), 12.0e6, epsilon = 1e-6);
}

#[test]
fn test_untagged_plan_with_partition_door_and_dimension() {
    let mut page = PageInput::new(0, 5000.0, 4000.0);
    page.segments = vec![
        // Bottom exterior, broken by a 900 wide door gap
        line(-100.0, -100.0, 1000.0, -100.0),
        line(100.0, 100.0, 1000.0, 100.0),
        line(1900.0, -100.0, 4100.0, -100.0),
        line(1900.0, 100.0, 3900.0, 100.0),
        line(4100.0, -100.0, 4100.0, 3100.0),
        line(3900.0, 100.0, 3900.0, 2900.0),
        line(4100.0, 3100.0, -100.0, 3100.0),
        line(3900.0, 2900.0, 100.0, 2900.0),
        line(-100.0, 3100.0, -100.0, -100.0),
        line(100.0, 2900.0, 100.0, 100.0),
        // Partition stopping at the inner faces
        line(1950.0, 100.0, 1950.0, 2900.0),
        line(2050.0, 100.0, 2050.0, 2900.0),
        // Extension lines measuring the right half of the bottom wall
        line(1900.0, -500.0, 1900.0, -800.0),
        line(4000.0, -500.0, 4000.0, -800.0),
    ];
    page.labels = vec![
        TextLabel::new("2100", Point2D::new(2950.0, -650.0)),
        TextLabel::new("Kitchen", Point2D::new(1000.0, 1500.0)),
        TextLabel::new("Bedroom", Point2D::new(3000.0, 1500.0)),
    ];

    let result = engine().recognize_page(&page, &RecognitionContext::new()).unwrap();

    assert_eq!(result.scale.source_method, ScaleSource::DimensionCalibration);
    assert_relative_eq!(result.scale.units_per_drawing_unit, 1.0, epsilon = 1e-9);

    assert_eq!(result.walls.len(), 6);
    assert!(result.walls.iter().all(|w| w.paired));
    assert!(result
        .walls
        .iter()
        .all(|w| !w.source_primitive_ids.contains(&12) && !w.source_primitive_ids.contains(&13)));
    let partition = result
        .walls
        .iter()
        .find(|w| w.thickness < 150.0)
        .unwrap();
    assert_relative_eq!(partition.thickness, 100.0, epsilon = 1e-9);
    assert_relative_eq!(partition.centerline.start.x, 2000.0, epsilon = 1e-9);

    assert_eq!(result.openings.len(), 1);
    let door = &result.openings[0];
    assert_eq!(door.opening_type, OpeningType::Door);
    assert_eq!(door.source, OpeningSource::WallGap);
    assert_relative_eq!(door.width, 900.0, epsilon = 1e-9);
    assert_eq!(door.position, Point2D::new(1450.0, 0.0));

    assert_eq!(result.dimensions.len(), 1);
    let dimension = &result.dimensions[0];
    assert_eq!(dimension.extension_line_ids, [12, 13]);
    let Some(ElementRef::Wall(measured)) = dimension.applied_to else {
        panic!("dimension not applied to a wall: {:?}", dimension.applied_to);
    };
    let measured = result.walls.iter().find(|w| w.id == measured).unwrap();
    assert_eq!(measured.explicit_length, Some(2100.0));
    assert_eq!(measured.centerline.start, Point2D::new(1900.0, 0.0));

    assert_eq!(result.rooms.len(), 2);
    for room in &result.rooms {
        assert_relative_eq!(room.area(), 6.0e6, epsilon = 1e-6);
        assert!(room.bounding_wall_ids.contains(&partition.id));
    }
    let mut names: Vec<_> = result.rooms.iter().filter_map(|r| r.name.as_deref()).collect();
    names.sort_unstable();
    assert_eq!(names, ["Bedroom", "Kitchen"]);
}
