// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recognise a small synthetic plan drawn in millimetres
//!
//! Run with: cargo run -p planscan-recognition --example synthetic_plan

use planscan_recognition::{
    ArcPrimitive, LineSegment, PageInput, Point2D, RecognitionConfig, RecognitionContext,
    RecognitionEngine, Reviewable, SymbolInstance, TextLabel,
};

fn line(x0: f64, y0: f64, x1: f64, y1: f64) -> LineSegment {
    LineSegment::new(Point2D::new(x0, y0), Point2D::new(x1, y1)).with_tag("A-WALL")
}

/// Two rooms side by side, 4000 x 3000 each, with a doorway in the
/// party wall and a window block in the facade
fn synthetic_page() -> PageInput {
    let mut page = PageInput::new(0, 9000.0, 4000.0);
    page.segments = vec![
        line(0.0, 0.0, 8000.0, 0.0),
        line(8000.0, 0.0, 8000.0, 3000.0),
        line(8000.0, 3000.0, 0.0, 3000.0),
        line(0.0, 3000.0, 0.0, 0.0),
        line(4000.0, 0.0, 4000.0, 3000.0),
    ];
    page.arcs = vec![ArcPrimitive::new(Point2D::new(4000.0, 1000.0), 900.0, 0.0, 90.0)];
    page.symbols = vec![SymbolInstance::new("WINDOW-1200", Point2D::new(6000.0, 0.0))
        .with_attribute("Width", 1200.0)];
    page.labels = vec![
        TextLabel::new("Kitchen", Point2D::new(2000.0, 1500.0)),
        TextLabel::new("Bedroom", Point2D::new(6000.0, 1500.0)),
    ];
    page
}

fn main() -> planscan_recognition::Result<()> {
    println!("=== Synthetic plan recognition ===\n");

    let engine = RecognitionEngine::new(RecognitionConfig::default())?;
    let ctx = RecognitionContext::new().with_progress(|event: planscan_recognition::ProgressEvent| {
        println!("  [{:>3.0}%] {}", event.percent, event.stage);
    });

    let result = engine.recognize_page(&synthetic_page(), &ctx)?;

    println!("\nScale: {:.2} mm per unit ({})", result.scale.units_per_drawing_unit, result.scale.source_method);
    println!("Walls: {}", result.walls.len());
    for wall in &result.walls {
        println!(
            "  Wall {}: length={:.0}, thickness={:.0}, class={:?}, confidence={:.2}",
            wall.id,
            wall.length(),
            wall.thickness,
            wall.wall_class,
            wall.confidence
        );
    }

    println!("Openings: {}", result.openings.len());
    for opening in &result.openings {
        println!(
            "  Opening {}: {:?} from {:?}, width={:.0}, host={:?}",
            opening.id, opening.opening_type, opening.source, opening.width, opening.host_wall_id
        );
    }

    println!("Rooms: {}", result.rooms.len());
    for room in &result.rooms {
        println!(
            "  Room {}: {} ({:?}), area={:.2} m2",
            room.id,
            room.name.as_deref().unwrap_or("unnamed"),
            room.room_type,
            result.scale.area_in_square_metres(room.area())
        );
    }

    let review = result.review_items();
    println!("\nFlagged for review: {}", review.len());
    for (element, reason) in review {
        println!("  {element:?}: {reason}");
    }

    let stats = &result.statistics;
    println!(
        "\nRecognition rate {:.1}%, average confidence {:.2}",
        stats.recognition_rate, stats.average_confidence
    );

    // Elements stay in the output even when flagged
    assert!(result.openings.iter().all(|o| o.confidence() > 0.0));
    Ok(())
}
