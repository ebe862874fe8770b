//! Hand landmark detection.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    path::Path,
};

use anyhow::{anyhow, bail, Context};
use handmoji_gesture::NUM_LANDMARKS;
use pawawwewism::{promise, PromiseHandle, Worker};

use crate::{
    hand::{
        detection::{hand_roi, PalmDetector},
        Hand,
    },
    image::{Image, Rect, Resolution},
    nn::{Cnn, Outputs},
    timer::Timer,
};

/// Trait for hand landmark detectors used by the [`FrameLoop`](crate::controller::FrameLoop).
pub trait LandmarkDetector: Send {
    /// Estimates the landmarks of all hands visible in `frame`.
    ///
    /// Landmark positions are in `frame`'s pixel coordinates. An empty list means that no hand was
    /// found.
    fn estimate_hands(&mut self, frame: &Image) -> anyhow::Result<Vec<Hand>>;

    /// Returns profiling timers to log alongside the frame rate.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for Box<D> {
    fn estimate_hands(&mut self, frame: &Image) -> anyhow::Result<Vec<Hand>> {
        (**self).estimate_hands(frame)
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}

/// Tracks the region of interest (RoI) of a single hand across subsequent frames.
///
/// The RoI is seeded from a palm detection with [`RoiTracker::set_roi`]. Once the landmarks of a
/// hand are known, the RoI follows their bounding rectangle, padded on every side.
#[derive(Debug, Clone)]
pub struct RoiTracker {
    roi: Option<Rect>,
    loss_thresh: f32,
    roi_padding: f32,
}

impl Default for RoiTracker {
    fn default() -> Self {
        Self {
            roi: None,
            loss_thresh: Self::DEFAULT_LOSS_THRESHOLD,
            roi_padding: Self::DEFAULT_ROI_PADDING,
        }
    }
}

impl RoiTracker {
    /// If the presence of the estimated hand falls below this value, tracking is considered lost.
    pub const DEFAULT_LOSS_THRESHOLD: f32 = 0.5;

    /// Relative amount of padding added to each side of the landmarks' bounding rectangle.
    pub const DEFAULT_ROI_PADDING: f32 = 0.3;

    /// Returns the current region of interest, if a hand is being tracked.
    pub fn roi(&self) -> Option<Rect> {
        self.roi
    }

    /// Starts tracking the hand inside `roi`.
    pub fn set_roi(&mut self, roi: Rect) {
        self.roi = Some(roi);
    }

    /// Returns the square region of `frame` that the landmark network should look at.
    pub fn view_rect(&self, frame: Rect) -> Rect {
        self.roi.unwrap_or(frame).grow_to_square()
    }

    /// Updates the RoI from an estimated hand.
    ///
    /// Returns `false` and forgets the RoI if tracking was lost.
    pub fn update(&mut self, hand: &Hand) -> bool {
        if hand.presence().is_nan() || hand.presence() < self.loss_thresh {
            log::trace!(
                "RoiTracker: presence {}, loss threshold {} -> LOST",
                hand.presence(),
                self.loss_thresh,
            );
            self.roi = None;
            return false;
        }

        self.roi = Some(hand.bounding_rect().grow_rel(self.roi_padding));
        true
    }
}

/// Detects and tracks a single hand.
///
/// While no hand is tracked, a [`PalmDetector`] searches the whole frame and the most confident
/// palm seeds the [`RoiTracker`]. From then on, only the landmark network runs, on the tracked
/// region, until the hand is lost.
///
/// The landmark network is expected to output 21 landmarks (`[1, 63]`), the hand presence
/// (`[1, 1]`) and the handedness (`[1, 1]`), in this order. Additional outputs are ignored.
pub struct HandLandmarker {
    cnn: Cnn,
    palm: PalmDetector,
    tracker: RoiTracker,
    t_infer: Timer,
    t_extract: Timer,
}

impl HandLandmarker {
    /// Loads the landmark and palm detection networks from ONNX files.
    pub fn load<P, Q>(landmark_path: P, palm_path: Q) -> anyhow::Result<Self>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let path = landmark_path.as_ref();
        let cnn = Cnn::load(path)?;
        let palm = PalmDetector::load(palm_path)?;
        Self::new(cnn, palm).with_context(|| format!("unsupported hand model '{}'", path.display()))
    }

    /// Wraps an already loaded landmark [`Cnn`] and palm detector.
    pub fn new(cnn: Cnn, palm: PalmDetector) -> anyhow::Result<Self> {
        if cnn.num_outputs() < 3 {
            bail!(
                "hand landmark network must have at least 3 outputs, this one has {}",
                cnn.num_outputs()
            );
        }
        Ok(Self {
            cnn,
            palm,
            tracker: RoiTracker::default(),
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
        })
    }
}

impl LandmarkDetector for HandLandmarker {
    fn estimate_hands(&mut self, frame: &Image) -> anyhow::Result<Vec<Hand>> {
        if self.tracker.roi().is_none() {
            let palms = self.palm.detect(frame)?;
            let Some(roi) = hand_roi(palms) else {
                return Ok(Vec::new());
            };
            log::trace!("start tracking hand at {:?}", roi);
            self.tracker.set_roi(roi);
        }

        let view = self.tracker.view_rect(frame.rect());
        let outputs = self.t_infer.time(|| self.cnn.estimate(frame, view))?;
        let hand = self
            .t_extract
            .time(|| extract(&outputs, self.cnn.input_resolution(), view))?;

        if self.tracker.update(&hand) {
            Ok(vec![hand])
        } else {
            Ok(Vec::new())
        }
    }

    fn timers(&self) -> Vec<&Timer> {
        [&self.t_infer, &self.t_extract]
            .into_iter()
            .chain(self.palm.timers())
            .collect()
    }
}

/// Extracts a [`Hand`] from the network outputs, mapping landmarks from the network's input
/// coordinates into the `view` rectangle of the frame.
fn extract(outputs: &Outputs, input_res: Resolution, view: Rect) -> anyhow::Result<Hand> {
    if outputs.len() < 3 {
        bail!("expected at least 3 network outputs, got {}", outputs.len());
    }
    let (screen_landmarks, presence, handedness) = (&outputs[0], &outputs[1], &outputs[2]);
    if screen_landmarks.shape() != [1, NUM_LANDMARKS * 3] {
        bail!("unexpected landmark output shape {:?}", screen_landmarks.shape());
    }
    if presence.shape() != [1, 1] || handedness.shape() != [1, 1] {
        bail!(
            "unexpected presence/handedness output shapes {:?}/{:?}",
            presence.shape(),
            handedness.shape()
        );
    }

    let scale_x = view.width() / input_res.width() as f32;
    let scale_y = view.height() / input_res.height() as f32;
    let mut landmarks = [[0.0; 3]; NUM_LANDMARKS];
    for (i, out) in landmarks.iter_mut().enumerate() {
        let [x, y, z] = [0, 1, 2].map(|c| screen_landmarks[[0, i * 3 + c]]);
        *out = [view.x() + x * scale_x, view.y() + y * scale_y, z * scale_x];
    }

    Ok(Hand::new(landmarks, presence[[0, 0]], handedness[[0, 0]]))
}

type Job = Box<dyn FnOnce() + Send>;

/// Loads a [`LandmarkDetector`] on a background [`Worker`].
///
/// Model loading can take a while, so the [`FrameLoop`](crate::controller::FrameLoop) polls the
/// loader once per tick instead of blocking on it. Dropping a loader waits for a running load to
/// finish.
pub struct DetectorLoader<D> {
    handle: Option<PromiseHandle<anyhow::Result<D>>>,
    _worker: Option<Worker<Job>>,
}

impl<D: Send + 'static> DetectorLoader<D> {
    /// Runs `load` on a worker thread and delivers its result to the loader.
    ///
    /// A panic in `load` is reported as a loading error.
    pub fn spawn<F>(load: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<D> + Send + 'static,
    {
        let (promise, handle) = promise();
        let worker = match Worker::builder()
            .name("model loader")
            .spawn(|job: Job| job())
        {
            Ok(mut worker) => {
                worker.send(Box::new(move || promise.fulfill(run_loader(load))));
                Some(worker)
            }
            Err(e) => {
                promise.fulfill(Err(anyhow!(e).context("failed to spawn model loader thread")));
                None
            }
        };

        Self {
            handle: Some(handle),
            _worker: worker,
        }
    }

    /// Creates a loader that has already finished loading `detector`.
    pub fn ready(detector: D) -> Self {
        Self::finished(Ok(detector))
    }

    /// Creates a loader that has already failed with `error`.
    pub fn failed(error: anyhow::Error) -> Self {
        Self::finished(Err(error))
    }

    fn finished(result: anyhow::Result<D>) -> Self {
        let (promise, handle) = promise();
        promise.fulfill(result);
        Self {
            handle: Some(handle),
            _worker: None,
        }
    }
}

impl<D> DetectorLoader<D> {
    /// Returns the loading result if it is available, without blocking.
    ///
    /// Returns [`None`] while loading is still in progress. Once a result was returned, later calls
    /// report an error.
    pub fn try_take(&mut self) -> Option<anyhow::Result<D>> {
        match &self.handle {
            Some(handle) if !handle.is_fulfilled() => None,
            Some(_) => {
                let handle = self.handle.take()?;
                Some(match handle.block() {
                    Ok(result) => result,
                    Err(_) => Err(anyhow!("model loader exited without producing a result")),
                })
            }
            None => Some(Err(anyhow!("the loaded detector was already taken"))),
        }
    }
}

fn run_loader<D>(load: impl FnOnce() -> anyhow::Result<D>) -> anyhow::Result<D> {
    let result = catch_unwind(AssertUnwindSafe(load))
        .unwrap_or_else(|_| Err(anyhow!("model loader panicked")));
    if let Err(e) = &result {
        log::error!("failed to load hand landmark model: {e:#}");
    }
    result
}
