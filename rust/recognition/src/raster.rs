// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raster front end
//!
//! Turns a scanned or rendered plan into line segments:
//! 1. Grayscale, blur and Otsu binarisation (ink becomes white)
//! 2. Morphological close then open to heal strokes and drop specks
//! 3. Canny edges and Hough voting
//!
//! Each segment carries `strength = votes / max_votes` so weak lines can be
//! discounted by the line classifier. Coordinates are pixels.

use crate::context::{RecognitionContext, Stage};
use crate::error::Result;
use crate::primitives::{LineSegment, PageInput, Point2D, SourceKind};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::distance_transform::Norm;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;

/// Tag carried by every segment extracted from pixels
pub const RASTER_TAG: &str = "raster";

/// Raster preprocessing and line voting parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RasterConfig {
    /// Gaussian sigma before binarisation
    pub blur_sigma: f32,
    pub close_radius: u8,
    pub open_radius: u8,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Minimum accumulator votes for a Hough peak
    pub hough_threshold: u32,
    /// Edge points further than this (pixels) from a peak's line are ignored
    pub rho_tolerance: f64,
    pub min_line_length: f64,
    pub max_line_gap: f64,
    pub max_peaks: usize,
    /// Lines within this angle (degrees) of an axis are snapped onto it
    pub snap_angle_deg: f64,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.0,
            close_radius: 2,
            open_radius: 1,
            canny_low: 50.0,
            canny_high: 100.0,
            hough_threshold: 30,
            rho_tolerance: 2.0,
            min_line_length: 20.0,
            max_line_gap: 5.0,
            max_peaks: 500,
            snap_angle_deg: 3.0,
        }
    }
}

/// Ink mask: dark pixels become 255
pub fn binarize(image: &GrayImage) -> GrayImage {
    let level = imageproc::contrast::otsu_level(image);
    let mut mask = GrayImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        let ink = if pixel.0[0] <= level { 255 } else { 0 };
        mask.put_pixel(x, y, Luma([ink]));
    }
    mask
}

/// Blur, binarise, clean up and find edges
pub fn preprocess(image: &GrayImage, config: &RasterConfig) -> GrayImage {
    let blurred = imageproc::filter::gaussian_blur_f32(image, config.blur_sigma);
    let mut mask = binarize(&blurred);

    if config.close_radius > 0 {
        let dilated = imageproc::morphology::dilate(&mask, Norm::L1, config.close_radius);
        mask = imageproc::morphology::erode(&dilated, Norm::L1, config.close_radius);
    }
    if config.open_radius > 0 {
        let eroded = imageproc::morphology::erode(&mask, Norm::L1, config.open_radius);
        mask = imageproc::morphology::dilate(&eroded, Norm::L1, config.open_radius);
    }

    imageproc::edges::canny(&mask, config.canny_low, config.canny_high)
}

/// A voted line segment before normalisation of its strength
#[derive(Debug, Clone, PartialEq)]
pub struct HoughSegment {
    pub start: Point2D,
    pub end: Point2D,
    pub votes: u32,
}

impl HoughSegment {
    fn length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }
}

struct Accumulator {
    cos: Vec<f64>,
    sin: Vec<f64>,
    rho_offset: f64,
    num_rhos: usize,
    votes: Vec<u32>,
}

impl Accumulator {
    // One bin per degree and per pixel of rho
    fn new(width: u32, height: u32) -> Self {
        let num_thetas = 180;
        let (cos, sin) = (0..num_thetas)
            .map(|i| {
                let theta = i as f64 * PI / num_thetas as f64;
                (theta.cos(), theta.sin())
            })
            .unzip();
        let max_rho = ((width as f64).powi(2) + (height as f64).powi(2)).sqrt();
        let num_rhos = (2.0 * max_rho) as usize + 1;

        Self {
            cos,
            sin,
            rho_offset: max_rho,
            num_rhos,
            votes: vec![0; num_thetas * num_rhos],
        }
    }

    fn rho(&self, theta: usize, x: i32, y: i32) -> f64 {
        x as f64 * self.cos[theta] + y as f64 * self.sin[theta]
    }

    fn vote(&mut self, x: i32, y: i32) {
        for theta in 0..self.cos.len() {
            let bin = (self.rho(theta, x, y) + self.rho_offset) as usize;
            if bin < self.num_rhos {
                self.votes[theta * self.num_rhos + bin] += 1;
            }
        }
    }

    /// Bins at or above `threshold`, strongest first
    fn peaks(&self, threshold: u32) -> Vec<(usize, f64, u32)> {
        let mut peaks: Vec<(usize, f64, u32)> = self
            .votes
            .iter()
            .enumerate()
            .filter(|(_, v)| **v >= threshold)
            .map(|(i, &v)| (i / self.num_rhos, (i % self.num_rhos) as f64 - self.rho_offset, v))
            .collect();
        peaks.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)).then(a.1.total_cmp(&b.1)));
        peaks
    }
}

/// Hough line voting over an edge image.
///
/// Peaks are visited strongest first; each claims the unused edge points on
/// its line and splits them into runs at gaps wider than `max_line_gap`.
pub fn hough_segments(
    edges: &GrayImage,
    config: &RasterConfig,
    ctx: &RecognitionContext,
) -> Result<Vec<HoughSegment>> {
    let mut points: Vec<(i32, i32)> = Vec::new();
    for (x, y, pixel) in edges.enumerate_pixels() {
        if pixel.0[0] > 128 {
            points.push((x as i32, y as i32));
        }
    }

    let mut accumulator = Accumulator::new(edges.width(), edges.height());
    for &(x, y) in &points {
        accumulator.vote(x, y);
    }

    let mut used = vec![false; points.len()];
    let mut segments = Vec::new();

    for (theta, rho, votes) in accumulator.peaks(config.hough_threshold).into_iter().take(config.max_peaks) {
        ctx.check(Stage::RasterExtraction)?;

        let (sin_t, cos_t) = (accumulator.sin[theta], accumulator.cos[theta]);
        let along = |p: &(i32, i32, usize)| p.0 as f64 * -sin_t + p.1 as f64 * cos_t;

        let mut on_line: Vec<(i32, i32, usize)> = points
            .iter()
            .enumerate()
            .filter(|(i, p)| {
                !used[*i] && (accumulator.rho(theta, p.0, p.1) - rho).abs() < config.rho_tolerance
            })
            .map(|(i, &(x, y))| (x, y, i))
            .collect();
        if on_line.len() < 2 {
            continue;
        }
        on_line.sort_by(|a, b| along(a).total_cmp(&along(b)));

        let mut run_start = 0;
        for i in 1..=on_line.len() {
            let split = i == on_line.len() || {
                let (a, b) = (on_line[i - 1], on_line[i]);
                let gap = (((b.0 - a.0).pow(2) + (b.1 - a.1).pow(2)) as f64).sqrt();
                gap > config.max_line_gap
            };
            if !split {
                continue;
            }

            let run = &on_line[run_start..i];
            run_start = i;
            if run.len() < 2 {
                continue;
            }
            let (first, last) = (run[0], run[run.len() - 1]);
            let segment = HoughSegment {
                start: Point2D::new(first.0 as f64, first.1 as f64),
                end: Point2D::new(last.0 as f64, last.1 as f64),
                votes,
            };
            if segment.length() >= config.min_line_length {
                for p in run {
                    used[p.2] = true;
                }
                segments.push(segment);
            }
        }
    }

    tracing::debug!(
        edge_points = points.len(),
        segments = segments.len(),
        "Hough line voting"
    );

    Ok(segments)
}

/// Snap near-horizontal and near-vertical segments onto the axis
fn snap_to_axes(segment: HoughSegment, max_angle: f64) -> HoughSegment {
    let angle = (segment.end.y - segment.start.y)
        .atan2(segment.end.x - segment.start.x)
        .abs();

    if angle < max_angle || angle > PI - max_angle {
        let y = (segment.start.y + segment.end.y) / 2.0;
        HoughSegment {
            start: Point2D::new(segment.start.x, y),
            end: Point2D::new(segment.end.x, y),
            ..segment
        }
    } else if (angle - PI / 2.0).abs() < max_angle {
        let x = (segment.start.x + segment.end.x) / 2.0;
        HoughSegment {
            start: Point2D::new(x, segment.start.y),
            end: Point2D::new(x, segment.end.y),
            ..segment
        }
    } else {
        segment
    }
}

/// Extract a page from a grayscale image
pub fn extract_page(
    image: &GrayImage,
    page_index: usize,
    config: &RasterConfig,
    ctx: &RecognitionContext,
) -> Result<PageInput> {
    ctx.check(Stage::RasterExtraction)?;
    let edges = preprocess(image, config);
    ctx.report(page_index, Stage::RasterExtraction, 5.0);

    let raw = hough_segments(&edges, config, ctx)?;
    let max_votes = raw.iter().map(|s| s.votes).max().unwrap_or(0).max(1) as f64;
    let snap = config.snap_angle_deg.to_radians();

    let mut page = PageInput::new(page_index, image.width() as f64, image.height() as f64);
    page.source_kind = SourceKind::Raster;
    page.segments = raw
        .into_iter()
        .map(|s| snap_to_axes(s, snap))
        .map(|s| {
            LineSegment::new(s.start, s.end)
                .with_tag(RASTER_TAG)
                .with_strength(s.votes as f64 / max_votes)
        })
        .collect();

    tracing::info!(
        page = page_index,
        width = image.width(),
        height = image.height(),
        segments = page.segments.len(),
        "Extracted raster page"
    );

    Ok(page)
}

/// Convert RGBA bytes (ITU-R BT.601 luminance) to a grayscale image
pub fn rgba_to_grayscale(rgba: &[u8], width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let i = ((y * width + x) * 4) as usize;
        match rgba.get(i..i + 3) {
            Some([r, g, b]) => {
                let luma = (299 * *r as u32 + 587 * *g as u32 + 114 * *b as u32 + 500) / 1000;
                Luma([luma as u8])
            }
            _ => Luma([255]),
        }
    })
}

/// Decode an image file and extract its page
pub fn load_page(
    path: &Path,
    page_index: usize,
    config: &RasterConfig,
    ctx: &RecognitionContext,
) -> Result<PageInput> {
    let image: DynamicImage = image::open(path)?;
    extract_page(&image.to_luma8(), page_index, config, ctx)
}
