//! Common functionality for single-shot object detectors.

pub mod nms;
pub mod ssd;

use crate::image::Rect;

/// A detected object.
///
/// Per convention, the confidence value lies between 0.0 and 1.0, which can be achieved by passing
/// the raw network output through [`sigmoid`]. Non-maximum averaging weighs detections by their
/// confidence, so it has to have the expected range.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    confidence: f32,
    rect: Rect,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self { confidence, rect }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the axis-aligned bounding rectangle containing the detected object.
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn set_bounding_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }
}

pub fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}
