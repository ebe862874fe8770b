//! The frame loop driving detection, classification and presentation.

use std::{
    fmt, thread,
    time::{Duration, Instant},
};

use handmoji_gesture::select_best;

use crate::{
    camera::Camera,
    config::DEFAULT_MIN_SCORE,
    detector::{DetectorLoader, LandmarkDetector},
    gesture::Classifier,
    image::{Color, Image},
    overlay::{Emoji, OverlayState},
    surface::{Notice, Surface},
    timer::{TickCounter, Timer},
};

const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Lifecycle of the landmark detector owned by a [`FrameLoop`].
///
/// The loop starts out [`Idle`](DetectorState::Idle) and moves to either
/// [`Active`](DetectorState::Active) or [`Failed`](DetectorState::Failed) exactly once.
pub enum DetectorState<D> {
    /// The detector is still being loaded.
    Idle(DetectorLoader<D>),
    /// The detector is loaded and runs on every frame.
    Active(D),
    /// Loading failed; carries the error message.
    Failed(String),
}

/// A summary of the detector state, without the detector itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Active,
    Failed,
    Disposed,
}

/// What happened during a [`FrameLoop::tick`].
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The loop has been disposed; nothing was done.
    Disposed,
    /// The camera had no frame yet; a placeholder with a notice was presented.
    CameraNotReady,
    /// The detector is still loading; the frame was presented with a notice.
    ModelLoading,
    /// The detector failed to load; the frame was presented with a notice.
    ModelFailed,
    /// Landmark detection failed; the frame was presented with a notice and without updating the
    /// skeleton or the overlay.
    DetectionFailed,
    /// Gesture classification failed; the frame was presented with a notice and without updating
    /// the skeleton or the overlay.
    ClassificationFailed,
    /// Presenting the frame failed.
    PresentFailed,
    /// No hand was found; the skeleton layer was cleared.
    NoHand,
    /// A hand was found. `gesture` is the emoji selected during this tick, if any.
    Hand { gesture: Option<Emoji> },
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopState::Idle => "idle",
            LoopState::Active => "active",
            LoopState::Failed => "failed",
            LoopState::Disposed => "disposed",
        };
        f.write_str(s)
    }
}

/// Stops a [`FrameLoop`] from any thread.
#[derive(Debug, Clone)]
pub struct DisposeHandle {
    overlay: OverlayState,
}

impl DisposeHandle {
    /// Stops the loop.
    ///
    /// Ticks that are in flight will not update the overlay state anymore. Returns `true` if this
    /// call performed the disposal, `false` if the loop was already disposed.
    pub fn dispose(&self) -> bool {
        let disposed = self.overlay.dispose();
        if disposed {
            log::debug!("frame loop disposed");
        }
        disposed
    }

    pub fn is_disposed(&self) -> bool {
        self.overlay.is_disposed()
    }
}

/// Reads frames from a [`Camera`], detects hands, classifies their gesture and presents the
/// result on a [`Surface`].
pub struct FrameLoop<C, D, G, S> {
    camera: C,
    detector: DetectorState<D>,
    classifier: G,
    surface: S,
    overlay: OverlayState,
    min_score: f32,
    tick_interval: Duration,
    placeholder: Image,
    t_detect: Timer,
    t_classify: Timer,
    t_draw: Timer,
}

impl<C, D, G, S> FrameLoop<C, D, G, S>
where
    C: Camera,
    D: LandmarkDetector,
    G: Classifier,
    S: Surface,
{
    /// Creates a frame loop in the [`Idle`](LoopState::Idle) state.
    ///
    /// The detector becomes available once `loader` delivers it.
    pub fn new(camera: C, loader: DetectorLoader<D>, classifier: G, surface: S) -> Self {
        Self {
            camera,
            detector: DetectorState::Idle(loader),
            classifier,
            surface,
            overlay: OverlayState::new(),
            min_score: DEFAULT_MIN_SCORE,
            tick_interval: DEFAULT_TICK_INTERVAL,
            placeholder: Image::filled(640, 480, Color::BLACK),
            t_detect: Timer::new("detect"),
            t_classify: Timer::new("classify"),
            t_draw: Timer::new("draw"),
        }
    }

    /// Sets the minimum score (0 to 10) a gesture needs to be considered.
    pub fn set_min_score(&mut self, min_score: f32) {
        self.min_score = min_score;
    }

    /// Sets the time between the starts of consecutive ticks in [`FrameLoop::run`].
    pub fn set_tick_interval(&mut self, interval: Duration) {
        self.tick_interval = interval;
    }

    /// Returns a handle that stops this loop.
    pub fn dispose_handle(&self) -> DisposeHandle {
        DisposeHandle {
            overlay: self.overlay.clone(),
        }
    }

    /// Returns the overlay state written by this loop.
    pub fn overlay(&self) -> &OverlayState {
        &self.overlay
    }

    pub fn state(&self) -> LoopState {
        if self.overlay.is_disposed() {
            return LoopState::Disposed;
        }
        match self.detector {
            DetectorState::Idle(_) => LoopState::Idle,
            DetectorState::Active(_) => LoopState::Active,
            DetectorState::Failed(_) => LoopState::Failed,
        }
    }

    /// Returns profiling timers for the stages of a tick, followed by the timers of the detector
    /// and the surface.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        let detector_timers = match &self.detector {
            DetectorState::Active(detector) => detector.timers(),
            DetectorState::Idle(_) | DetectorState::Failed(_) => Vec::new(),
        };
        [&self.t_detect, &self.t_classify, &self.t_draw]
            .into_iter()
            .chain(detector_timers)
            .chain(self.surface.timers())
    }

    /// Runs ticks until the loop is disposed.
    ///
    /// Ticks never overlap: after each tick, the loop sleeps for the remainder of the tick
    /// interval, or not at all if the tick took longer.
    pub fn run(&mut self) {
        log::debug!("starting frame loop, tick interval {:?}", self.tick_interval);
        let mut counter = TickCounter::new("frame loop");
        loop {
            let start = Instant::now();
            if self.tick() == TickOutcome::Disposed {
                break;
            }
            counter.tick_with(self.timers());

            if let Some(remaining) = self.tick_interval.checked_sub(start.elapsed()) {
                thread::sleep(remaining);
            }
        }
        log::debug!("frame loop stopped");
    }

    /// Runs a single iteration of the loop.
    pub fn tick(&mut self) -> TickOutcome {
        let Some(ticket) = self.overlay.begin_tick() else {
            return TickOutcome::Disposed;
        };

        if !self.camera.is_ready() {
            return self.present_placeholder();
        }
        let frame = match self.camera.frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("camera not ready: {e:#}");
                return self.present_placeholder();
            }
        };
        self.surface.resize(frame.resolution());

        self.poll_loader();
        let detector = match &mut self.detector {
            DetectorState::Active(detector) => detector,
            DetectorState::Idle(_) => {
                self.surface.show_notice(Notice::ModelLoading);
                return self.present(&frame, TickOutcome::ModelLoading);
            }
            DetectorState::Failed(reason) => {
                self.surface.show_notice(Notice::ModelFailed(reason.clone()));
                return self.present(&frame, TickOutcome::ModelFailed);
            }
        };

        let detection = self.t_detect.time(|| detector.estimate_hands(&frame));
        if !self.overlay.is_current(ticket) {
            return TickOutcome::Disposed;
        }
        let hands = match detection {
            Ok(hands) => hands,
            Err(e) => {
                log::warn!("hand detection failed: {e:#}");
                self.surface.show_notice(Notice::DetectionFailed);
                return self.present(&frame, TickOutcome::DetectionFailed);
            }
        };

        let Some(hand) = hands.first() else {
            self.surface.draw_skeleton(&[]);
            return self.present(&frame, TickOutcome::NoHand);
        };

        let min_score = self.min_score;
        let classifier = &mut self.classifier;
        let candidates = match self
            .t_classify
            .time(|| classifier.classify(hand.landmarks(), min_score))
        {
            Ok(candidates) => candidates,
            Err(e) => {
                log::warn!("gesture classification failed: {e:#}");
                self.surface.show_notice(Notice::DetectionFailed);
                return self.present(&frame, TickOutcome::ClassificationFailed);
            }
        };

        let gesture = select_best(&candidates).and_then(|best| {
            log::trace!("best gesture: {} ({:.2})", best.name(), best.score());
            let emoji = Emoji::from_gesture_name(best.name());
            if emoji.is_none() {
                log::debug!("ignoring gesture without emoji: {}", best.name());
            }
            emoji
        });
        if let Some(emoji) = gesture {
            if !self.overlay.commit(ticket, emoji) {
                return TickOutcome::Disposed;
            }
        }

        self.surface.draw_skeleton(&hands);
        self.present(&frame, TickOutcome::Hand { gesture })
    }

    fn poll_loader(&mut self) {
        let DetectorState::Idle(loader) = &mut self.detector else {
            return;
        };
        match loader.try_take() {
            None => {}
            Some(Ok(detector)) => {
                log::info!("hand landmark model loaded");
                self.detector = DetectorState::Active(detector);
            }
            Some(Err(e)) => {
                log::error!("hand landmark model unavailable: {e:#}");
                self.detector = DetectorState::Failed(format!("{e:#}"));
            }
        }
    }

    fn present(&mut self, frame: &Image, outcome: TickOutcome) -> TickOutcome {
        let emoji = self.overlay.current();
        match self.t_draw.time(|| self.surface.present(frame, emoji)) {
            Ok(()) => outcome,
            Err(e) => {
                log::warn!("failed to present frame: {e:#}");
                TickOutcome::PresentFailed
            }
        }
    }

    fn present_placeholder(&mut self) -> TickOutcome {
        self.surface.show_notice(Notice::CameraNotReady);
        let emoji = self.overlay.current();
        match self.surface.present(&self.placeholder, emoji) {
            Ok(()) => TickOutcome::CameraNotReady,
            Err(e) => {
                log::warn!("failed to present frame: {e:#}");
                TickOutcome::PresentFailed
            }
        }
    }
}
