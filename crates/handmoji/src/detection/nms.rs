//! Non-Maximum Suppression and Averaging.
//!
//! SSD networks produce many overlapping detections for a single object. Non-Maximum Suppression
//! filters them down to one detection per object, either by dropping the overlapping detections
//! with lower confidence ([`SuppressionMode::Remove`]) or by replacing them with their
//! confidence-weighted average ([`SuppressionMode::Average`]). Averaging reduces jitter between
//! frames and is the default.

use crate::image::Rect;

use super::Detection;

/// A non-maximum suppression algorithm.
pub struct NonMaxSuppression {
    iou_thresh: f32,
    avg_buf: Vec<Detection>,
    out_buf: Vec<Detection>,
    mode: SuppressionMode,
}

impl NonMaxSuppression {
    /// The default intersection-over-union threshold used to determine if two detections overlap.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            avg_buf: Vec::new(),
            out_buf: Vec::new(),
            mode: SuppressionMode::Average,
        }
    }

    pub fn set_iou_thresh(&mut self, iou_thresh: f32) {
        self.iou_thresh = iou_thresh;
    }

    pub fn set_mode(&mut self, mode: SuppressionMode) {
        self.mode = mode;
    }

    /// Performs non-maximum suppression on `detections`.
    ///
    /// `detections` is emptied in the process. The filtered detections are returned as an
    /// iterator, highest confidence first.
    pub fn process(
        &mut self,
        detections: &mut Vec<Detection>,
    ) -> impl Iterator<Item = Detection> + '_ {
        self.out_buf.clear();

        // Ascending confidence, so popping yields the most confident detection first.
        detections.sort_unstable_by(|a, b| a.confidence().total_cmp(&b.confidence()));

        while let Some(seed) = detections.pop() {
            let iou_thresh = self.iou_thresh;
            let overlaps = |other: &Detection| {
                seed.bounding_rect().iou(&other.bounding_rect()) >= iou_thresh
            };

            match self.mode {
                SuppressionMode::Remove => {
                    detections.retain(|other| !overlaps(other));
                    self.out_buf.push(seed);
                }
                SuppressionMode::Average => {
                    self.avg_buf.clear();
                    self.avg_buf.push(seed.clone());
                    let avg_buf = &mut self.avg_buf;
                    detections.retain(|other| {
                        if overlaps(other) {
                            avg_buf.push(other.clone());
                            false
                        } else {
                            true
                        }
                    });

                    let mut acc = [0.0; 4];
                    let mut divisor = 0.0;
                    for det in &self.avg_buf {
                        let factor = det.confidence();
                        let rect = det.bounding_rect();
                        let [xc, yc] = rect.center();
                        divisor += factor;
                        for (acc, v) in acc.iter_mut().zip([xc, yc, rect.width(), rect.height()]) {
                            *acc += v * factor;
                        }
                    }
                    let [xc, yc, w, h] = acc.map(|v| v / divisor);

                    self.out_buf.push(Detection::new(
                        seed.confidence(),
                        Rect::from_center(xc, yc, w, h),
                    ));
                }
            }
        }

        self.avg_buf.clear();
        self.out_buf.drain(..)
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Describes how [`NonMaxSuppression`] should deal with overlapping detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionMode {
    /// Remove overlapping detections, only retain the detection with highest confidence score.
    Remove,

    /// Compute a confidence-weighted average of overlapping detections.
    Average,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nms_suppresses_non_maximum() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Remove);

        let rect = Rect::from_center(0.0, 0.0, 1.0, 1.0);
        let a = Detection::new(0.55, rect.grow_rel(0.25));
        let b = Detection::new(0.6, rect);
        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        assert_eq!(d.confidence(), 0.6);
        assert_eq!(d.bounding_rect(), rect);
    }

    #[test]
    fn nms_ignores_nonoverlapping() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Remove);

        let a = Detection::new(1.0, Rect::from_center(0.0, 0.0, 1.0, 1.0));
        let b = Detection::new(1.0, Rect::from_center(5.0, 0.0, 1.0, 1.0));

        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 2);
    }

    #[test]
    fn nma_averages_detections() {
        let mut nms = NonMaxSuppression::new();
        nms.set_iou_thresh(0.0);

        let rect = Rect::from_center(-1.0, 3.0, 1.0, 1.0);
        let a = Detection::new(1.0, rect);
        let b = Detection::new(0.5, rect.grow_rel(1.5));
        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        let rect = d.bounding_rect();
        assert_eq!(d.confidence(), 1.0);
        assert_eq!(rect.center(), [-1.0, 3.0]);
        assert_eq!(rect.width(), 2.0);
        assert_eq!(rect.height(), 2.0);
    }
}
