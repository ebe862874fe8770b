//! Palm detection.
//!
//! Palms are much easier to find than whole hands with their many possible poses, so a palm
//! detector locates the hand before the landmark network takes over.

use std::path::Path;

use anyhow::{bail, Context};

use crate::{
    detection::{
        nms::NonMaxSuppression,
        sigmoid,
        ssd::{Anchors, LayerInfo},
        Detection,
    },
    image::{Image, Rect, Resolution},
    nn::{Cnn, Outputs},
    timer::Timer,
};

/// Relative amount added to each side of a palm rectangle to enclose the whole hand.
const PALM_TO_HAND: f32 = 1.5;

/// Number of box parameters per anchor: center, size and 7 palm keypoints.
const BOX_PARAMS: usize = 18;

/// Detects palms using an ONNX palm detection network.
///
/// The network is expected to output the regressed boxes (`[1, N, 18]`) followed by the raw
/// confidence scores (`[1, N, 1]`) of its `N` SSD anchors.
pub struct PalmDetector {
    cnn: Cnn,
    anchors: Anchors,
    thresh: f32,
    nms: NonMaxSuppression,
    detections: Vec<Detection>,
    t_infer: Timer,
    t_extract: Timer,
    t_nms: Timer,
}

impl PalmDetector {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    /// Loads the palm detection network from an ONNX file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let cnn = Cnn::load(path)?;
        Self::new(cnn).with_context(|| format!("unsupported palm model '{}'", path.display()))
    }

    /// Wraps an already loaded [`Cnn`].
    pub fn new(cnn: Cnn) -> anyhow::Result<Self> {
        if cnn.num_outputs() < 2 {
            bail!(
                "palm detection network must have at least 2 outputs, this one has {}",
                cnn.num_outputs()
            );
        }
        let anchors = anchors_for(cnn.input_resolution());
        log::debug!(
            "palm detector uses {} anchors for {} input",
            anchors.anchor_count(),
            cnn.input_resolution(),
        );
        Ok(Self {
            cnn,
            anchors,
            thresh: Self::DEFAULT_THRESHOLD,
            nms: NonMaxSuppression::new(),
            detections: Vec::new(),
            t_infer: Timer::new("palm infer"),
            t_extract: Timer::new("palm extract"),
            t_nms: Timer::new("palm nms"),
        })
    }

    /// Finds all palms in `image`.
    ///
    /// Detection rectangles are in `image`'s pixel coordinates.
    pub fn detect(&mut self, image: &Image) -> anyhow::Result<&[Detection]> {
        self.detections.clear();

        // Parts of the view outside of the image read as black bars.
        let input_res = self.cnn.input_resolution();
        let view = fit_aspect(image.rect(), input_res);
        let outputs = self.t_infer.time(|| self.cnn.estimate(image, view))?;
        log::trace!("palm detection outputs: {} tensors", outputs.len());

        let mut raw = Vec::new();
        self.t_extract.time(|| {
            extract(&self.anchors, input_res, view, &outputs, self.thresh, &mut raw)
        })?;

        let nms = &mut self.nms;
        let detections = &mut self.detections;
        self.t_nms.time(|| detections.extend(nms.process(&mut raw)));

        Ok(&self.detections)
    }

    /// Returns profiling timers.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract, &self.t_nms].into_iter()
    }
}

/// Computes the hand region of interest from the most confident palm in `palms`.
pub fn hand_roi(palms: &[Detection]) -> Option<Rect> {
    let palm = palms
        .iter()
        .filter(|det| !det.confidence().is_nan())
        .max_by(|a, b| a.confidence().total_cmp(&b.confidence()))?;
    Some(palm.bounding_rect().grow_rel(PALM_TO_HAND))
}

/// Feature maps at strides 8 and 16, with 2 and 6 anchors per cell.
fn anchors_for(input_res: Resolution) -> Anchors {
    let (w, h) = (input_res.width(), input_res.height());
    Anchors::calculate(&[
        LayerInfo::new(2, w / 8, h / 8),
        LayerInfo::new(6, w / 16, h / 16),
    ])
}

/// Symmetrically grows one dimension of `rect` to match the aspect ratio of `res`.
fn fit_aspect(rect: Rect, res: Resolution) -> Rect {
    let aspect = res.width() as f32 / res.height() as f32;
    let [xc, yc] = rect.center();
    if rect.width() < rect.height() * aspect {
        Rect::from_center(xc, yc, rect.height() * aspect, rect.height())
    } else {
        Rect::from_center(xc, yc, rect.width(), rect.width() / aspect)
    }
}

/// Decodes all detections above `thresh`, mapping them from network input coordinates into the
/// `view` rectangle of the image.
fn extract(
    anchors: &Anchors,
    input_res: Resolution,
    view: Rect,
    outputs: &Outputs,
    thresh: f32,
    out: &mut Vec<Detection>,
) -> anyhow::Result<()> {
    let num_anchors = anchors.anchor_count();
    let (boxes, scores) = (&outputs[0], &outputs[1]);
    if boxes.shape() != [1, num_anchors, BOX_PARAMS] {
        bail!(
            "unexpected palm box output shape {:?} (expected [1, {num_anchors}, {BOX_PARAMS}])",
            boxes.shape()
        );
    }
    if scores.shape() != [1, num_anchors, 1] {
        bail!(
            "unexpected palm score output shape {:?} (expected [1, {num_anchors}, 1])",
            scores.shape()
        );
    }

    let input_w = input_res.width() as f32;
    let input_h = input_res.height() as f32;
    let scale_x = view.width() / input_w;
    let scale_y = view.height() / input_h;
    for index in 0..num_anchors {
        let confidence = sigmoid(scores[[0, index, 0]]);
        if confidence.is_nan() || confidence < thresh {
            continue;
        }

        let anchor = &anchors[index];
        let param = |i: usize| boxes[[0, index, i]];
        let xc = param(0) + anchor.x_center() * input_w;
        let yc = param(1) + anchor.y_center() * input_h;
        let rect = Rect::from_center(
            view.x() + xc * scale_x,
            view.y() + yc * scale_y,
            param(2) * scale_x,
            param(3) * scale_y,
        );
        out.push(Detection::new(confidence, rect));
    }

    Ok(())
}
