// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-call context: cancellation and progress reporting
//!
//! Both are passed into recognition calls explicitly. Cancellation is a
//! shared flag polled at iteration boundaries; progress is a fire-and-forget
//! callback that must not block.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    RasterExtraction,
    ScaleCalibration,
    LineClassification,
    WallPairing,
    OpeningDetection,
    RoomTracing,
    AnnotationAssociation,
    Aggregation,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::RasterExtraction => "raster_extraction",
            Stage::ScaleCalibration => "scale_calibration",
            Stage::LineClassification => "line_classification",
            Stage::WallPairing => "wall_pairing",
            Stage::OpeningDetection => "opening_detection",
            Stage::RoomTracing => "room_tracing",
            Stage::AnnotationAssociation => "annotation_association",
            Stage::Aggregation => "aggregation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cooperative cancellation flag, cheap to clone and share across threads
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// `Err(Error::Cancelled)` once cancellation was requested
    pub fn check(&self, stage: Stage) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled { stage })
        } else {
            Ok(())
        }
    }
}

/// One progress report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub page_index: usize,
    pub stage: Stage,
    /// Percent complete for the page, 0-100
    pub percent: f32,
}

/// Receiver of progress reports.
///
/// Implementations must return quickly; there is no backpressure.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Forwards events into an unbounded channel; a dropped receiver is ignored
#[derive(Debug, Clone)]
pub struct ChannelSink(pub Sender<ProgressEvent>);

impl ProgressSink for ChannelSink {
    fn report(&self, event: ProgressEvent) {
        let _ = self.0.send(event);
    }
}

/// Cancellation and progress for a single recognition call
#[derive(Clone, Default)]
pub struct RecognitionContext {
    pub cancellation: CancellationToken,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl fmt::Debug for RecognitionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognitionContext")
            .field("cancellation", &self.cancellation)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl RecognitionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Some(Arc::new(sink));
        self
    }

    pub fn check(&self, stage: Stage) -> Result<()> {
        self.cancellation.check(stage)
    }

    pub fn report(&self, page_index: usize, stage: Stage, percent: f32) {
        if let Some(sink) = &self.progress {
            sink.report(ProgressEvent {
                page_index,
                stage,
                percent: percent.clamp(0.0, 100.0),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(token.check(Stage::WallPairing).is_ok());

        clone.cancel();
        let err = token.check(Stage::WallPairing).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.to_string(), "recognition cancelled during wall_pairing");
    }

    #[test]
    fn test_progress_over_channel() {
        let (tx, rx) = mpsc::channel();
        let ctx = RecognitionContext::new().with_progress(ChannelSink(tx));

        ctx.report(2, Stage::RoomTracing, 150.0);

        let event = rx.recv().unwrap();
        assert_eq!(event.page_index, 2);
        assert_eq!(event.stage, Stage::RoomTracing);
        assert_eq!(event.percent, 100.0);
    }

    #[test]
    fn test_progress_with_dropped_receiver_does_not_panic() {
        let (tx, rx) = mpsc::channel::<ProgressEvent>();
        drop(rx);
        let ctx = RecognitionContext::new().with_progress(ChannelSink(tx));
        ctx.report(0, Stage::Aggregation, 100.0);
    }
}
