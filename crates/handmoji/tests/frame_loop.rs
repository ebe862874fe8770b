use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::anyhow;
use handmoji::{
    camera::Camera,
    controller::{DisposeHandle, FrameLoop, LoopState, TickOutcome},
    detector::{DetectorLoader, LandmarkDetector},
    gesture::Classifier,
    hand::Hand,
    image::{Color, Image, Resolution},
    overlay::Emoji,
    surface::{Notice, Surface},
    timer::Timer,
};
use handmoji_gesture::{gestures, GestureEstimator, GestureMatch, Landmarks};

/// A right hand showing the victory sign.
const VICTORY_HAND: Landmarks = [
    [100.0, 200.0, 0.0],
    [125.0, 185.0, 0.0],
    [130.0, 165.0, 0.0],
    [131.0, 150.0, 0.0],
    [131.0, 135.0, 0.0],
    [90.0, 150.0, 0.0],
    [90.0, 120.0, 0.0],
    [90.0, 100.0, 0.0],
    [90.0, 80.0, 0.0],
    [100.0, 150.0, 0.0],
    [101.0, 115.0, 0.0],
    [101.0, 95.0, 0.0],
    [100.0, 75.0, 0.0],
    [80.0, 170.0, 0.0],
    [60.0, 150.0, 0.0],
    [70.0, 165.0, 0.0],
    [78.0, 175.0, 0.0],
    [85.0, 185.0, 0.0],
    [65.0, 165.0, 0.0],
    [75.0, 178.0, 0.0],
    [82.0, 183.0, 0.0],
];

#[derive(Clone, Default)]
struct Counter(Arc<AtomicUsize>);

impl Counter {
    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

struct FakeCamera {
    frame: Option<Arc<Image>>,
}

impl FakeCamera {
    fn ready() -> Self {
        Self {
            frame: Some(Arc::new(Image::filled(320, 240, Color::BLACK))),
        }
    }

    fn not_ready() -> Self {
        Self { frame: None }
    }
}

impl Camera for FakeCamera {
    fn is_ready(&mut self) -> bool {
        self.frame.is_some()
    }

    fn frame(&mut self) -> anyhow::Result<Arc<Image>> {
        self.frame.clone().ok_or_else(|| anyhow!("no frame"))
    }
}

struct FnDetector<F> {
    detect: F,
    calls: Counter,
}

impl<F> FnDetector<F>
where
    F: FnMut(&Image) -> anyhow::Result<Vec<Hand>> + Send,
{
    fn new(detect: F) -> Self {
        Self {
            detect,
            calls: Counter::default(),
        }
    }
}

impl<F> LandmarkDetector for FnDetector<F>
where
    F: FnMut(&Image) -> anyhow::Result<Vec<Hand>> + Send,
{
    fn estimate_hands(&mut self, image: &Image) -> anyhow::Result<Vec<Hand>> {
        self.calls.bump();
        (self.detect)(image)
    }
}

type BoxedDetector = Box<dyn LandmarkDetector>;

fn detector_with(hands: Vec<Hand>) -> (BoxedDetector, Counter) {
    let detector = FnDetector::new(move |_: &Image| Ok(hands.clone()));
    let calls = detector.calls.clone();
    (Box::new(detector), calls)
}

/// Returns a fixed list of candidates, ignoring the landmarks.
struct FixedClassifier {
    candidates: Vec<GestureMatch>,
    calls: Counter,
}

impl FixedClassifier {
    fn new(candidates: &[(&str, f32)]) -> Self {
        Self {
            candidates: candidates
                .iter()
                .map(|&(name, score)| GestureMatch::new(name, score))
                .collect(),
            calls: Counter::default(),
        }
    }
}

impl Classifier for FixedClassifier {
    fn classify(&mut self, _: &Landmarks, _: f32) -> anyhow::Result<Vec<GestureMatch>> {
        self.calls.bump();
        Ok(self.candidates.clone())
    }
}

struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn classify(&mut self, _: &Landmarks, _: f32) -> anyhow::Result<Vec<GestureMatch>> {
        anyhow::bail!("classifier exploded")
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Resize(Resolution),
    Skeleton(usize),
    Notice(Notice),
    Present(Resolution, Option<Emoji>),
}

#[derive(Clone, Default)]
struct RecordingSurface {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl RecordingSurface {
    fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Surface for RecordingSurface {
    fn resize(&mut self, resolution: Resolution) {
        self.push(Call::Resize(resolution));
    }

    fn draw_skeleton(&mut self, hands: &[Hand]) {
        self.push(Call::Skeleton(hands.len()));
    }

    fn show_notice(&mut self, notice: Notice) {
        self.push(Call::Notice(notice));
    }

    fn present(&mut self, frame: &Image, emoji: Option<Emoji>) -> anyhow::Result<()> {
        self.push(Call::Present(frame.resolution(), emoji));
        Ok(())
    }
}

const FRAME_RES: Resolution = Resolution::new(320, 240);

fn victory_hand() -> Hand {
    Hand::from_landmarks(VICTORY_HAND)
}

#[test]
fn camera_not_ready() {
    let (detector, detect_calls) = detector_with(vec![victory_hand()]);
    let classifier = FixedClassifier::new(&[(gestures::VICTORY, 9.0)]);
    let classify_calls = classifier.calls.clone();
    let surface = RecordingSurface::default();

    let mut fl = FrameLoop::new(
        FakeCamera::not_ready(),
        DetectorLoader::ready(detector),
        classifier,
        surface.clone(),
    );

    assert_eq!(fl.tick(), TickOutcome::CameraNotReady);
    assert_eq!(fl.tick(), TickOutcome::CameraNotReady);
    assert_eq!(detect_calls.get(), 0);
    assert_eq!(classify_calls.get(), 0);
    assert_eq!(fl.overlay().current(), None);

    let calls = surface.take();
    assert_eq!(calls[0], Call::Notice(Notice::CameraNotReady));
    assert_eq!(calls[1], Call::Present(Resolution::new(640, 480), None));
    assert!(!calls.iter().any(|c| matches!(c, Call::Skeleton(_))));
}

#[test]
fn victory_with_real_classifier() {
    let (detector, detect_calls) = detector_with(vec![victory_hand()]);
    let surface = RecordingSurface::default();
    let mut fl = FrameLoop::new(
        FakeCamera::ready(),
        DetectorLoader::ready(detector),
        GestureEstimator::builtin(),
        surface.clone(),
    );

    assert_eq!(
        fl.tick(),
        TickOutcome::Hand {
            gesture: Some(Emoji::Victory)
        }
    );
    assert_eq!(fl.state(), LoopState::Active);
    assert_eq!(detect_calls.get(), 1);
    assert_eq!(fl.overlay().current(), Some(Emoji::Victory));
    assert_eq!(
        surface.take(),
        [
            Call::Resize(FRAME_RES),
            Call::Skeleton(1),
            Call::Present(FRAME_RES, Some(Emoji::Victory)),
        ]
    );
}

#[test]
fn highest_score_wins() {
    let (detector, _) = detector_with(vec![victory_hand()]);
    let classifier = FixedClassifier::new(&[(gestures::VICTORY, 0.6), (gestures::THUMBS_UP, 0.9)]);
    let mut fl = FrameLoop::new(
        FakeCamera::ready(),
        DetectorLoader::ready(detector),
        classifier,
        RecordingSurface::default(),
    );

    fl.tick();
    assert_eq!(fl.overlay().current(), Some(Emoji::ThumbsUp));
}

#[test]
fn tie_goes_to_first_candidate() {
    let (detector, _) = detector_with(vec![victory_hand()]);
    let classifier = FixedClassifier::new(&[(gestures::VICTORY, 0.8), (gestures::THUMBS_UP, 0.8)]);
    let mut fl = FrameLoop::new(
        FakeCamera::ready(),
        DetectorLoader::ready(detector),
        classifier,
        RecordingSurface::default(),
    );

    fl.tick();
    assert_eq!(fl.overlay().current(), Some(Emoji::Victory));
}

#[test]
fn overlay_is_sticky() {
    let hands = Arc::new(Mutex::new(vec![victory_hand()]));
    let detector: BoxedDetector = {
        let hands = hands.clone();
        Box::new(FnDetector::new(move |_: &Image| {
            Ok(hands.lock().unwrap().clone())
        }))
    };
    let surface = RecordingSurface::default();
    let mut fl = FrameLoop::new(
        FakeCamera::ready(),
        DetectorLoader::ready(detector),
        GestureEstimator::builtin(),
        surface.clone(),
    );

    fl.tick();
    assert_eq!(fl.overlay().current(), Some(Emoji::Victory));
    surface.take();

    // Hand leaves the frame: skeleton is cleared, the emoji stays.
    hands.lock().unwrap().clear();
    assert_eq!(fl.tick(), TickOutcome::NoHand);
    assert_eq!(fl.overlay().current(), Some(Emoji::Victory));
    assert_eq!(
        surface.take(),
        [
            Call::Resize(FRAME_RES),
            Call::Skeleton(0),
            Call::Present(FRAME_RES, Some(Emoji::Victory)),
        ]
    );
}

#[test]
fn unrecognized_gesture_keeps_overlay() {
    let (detector, _) = detector_with(vec![victory_hand()]);
    let classifier = FixedClassifier::new(&[("ok_hand", 9.5)]);
    let mut fl = FrameLoop::new(
        FakeCamera::ready(),
        DetectorLoader::ready(detector),
        classifier,
        RecordingSurface::default(),
    );

    assert_eq!(fl.tick(), TickOutcome::Hand { gesture: None });
    assert_eq!(fl.overlay().current(), None);
}

#[test]
fn model_loading_shows_notice() {
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let loader = DetectorLoader::spawn(move || {
        release_rx.recv()?;
        let detector: BoxedDetector = Box::new(FnDetector::new(|_: &Image| Ok(Vec::new())));
        Ok(detector)
    });
    let surface = RecordingSurface::default();
    let mut fl = FrameLoop::new(
        FakeCamera::ready(),
        loader,
        FixedClassifier::new(&[]),
        surface.clone(),
    );

    assert_eq!(fl.tick(), TickOutcome::ModelLoading);
    assert_eq!(fl.state(), LoopState::Idle);
    assert_eq!(
        surface.take(),
        [
            Call::Resize(FRAME_RES),
            Call::Notice(Notice::ModelLoading),
            Call::Present(FRAME_RES, None),
        ]
    );

    release_tx.send(()).unwrap();
    let deadline = Instant::now() + Duration::from_secs(10);
    while fl.tick() == TickOutcome::ModelLoading {
        assert!(Instant::now() < deadline, "model loader never finished");
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(fl.state(), LoopState::Active);
    assert_eq!(fl.tick(), TickOutcome::NoHand);
}

#[test]
fn model_failure() {
    let classifier = FixedClassifier::new(&[(gestures::VICTORY, 9.0)]);
    let classify_calls = classifier.calls.clone();
    let surface = RecordingSurface::default();
    let mut fl: FrameLoop<_, BoxedDetector, _, _> = FrameLoop::new(
        FakeCamera::ready(),
        DetectorLoader::failed(anyhow!("model file not found")),
        classifier,
        surface.clone(),
    );

    assert_eq!(fl.tick(), TickOutcome::ModelFailed);
    assert_eq!(fl.state(), LoopState::Failed);
    assert_eq!(fl.tick(), TickOutcome::ModelFailed);
    assert_eq!(classify_calls.get(), 0);

    let calls = surface.take();
    assert!(calls.contains(&Call::Notice(Notice::ModelFailed(
        "model file not found".into()
    ))));
    assert!(calls.contains(&Call::Present(FRAME_RES, None)));
}

#[test]
fn detection_error_presents_frame() {
    let detector: BoxedDetector = Box::new(FnDetector::new(|_: &Image| {
        anyhow::bail!("inference failed")
    }));
    let classifier = FixedClassifier::new(&[(gestures::VICTORY, 9.0)]);
    let classify_calls = classifier.calls.clone();
    let surface = RecordingSurface::default();
    let mut fl = FrameLoop::new(
        FakeCamera::ready(),
        DetectorLoader::ready(detector),
        classifier,
        surface.clone(),
    );

    assert_eq!(fl.tick(), TickOutcome::DetectionFailed);
    assert_eq!(classify_calls.get(), 0);
    assert_eq!(fl.overlay().current(), None);
    assert_eq!(
        surface.take(),
        [
            Call::Resize(FRAME_RES),
            Call::Notice(Notice::DetectionFailed),
            Call::Present(FRAME_RES, None),
        ]
    );
    assert_eq!(fl.state(), LoopState::Active);
}

#[test]
fn classification_error_presents_frame() {
    let (detector, _) = detector_with(vec![victory_hand()]);
    let surface = RecordingSurface::default();
    let mut fl = FrameLoop::new(
        FakeCamera::ready(),
        DetectorLoader::ready(detector),
        FailingClassifier,
        surface.clone(),
    );

    assert_eq!(fl.tick(), TickOutcome::ClassificationFailed);
    assert_eq!(fl.overlay().current(), None);
    assert_eq!(
        surface.take(),
        [
            Call::Resize(FRAME_RES),
            Call::Notice(Notice::DetectionFailed),
            Call::Present(FRAME_RES, None),
        ]
    );
}

/// A detector without hands that reports its own timer.
struct TimedDetector {
    timer: Timer,
}

impl LandmarkDetector for TimedDetector {
    fn estimate_hands(&mut self, _: &Image) -> anyhow::Result<Vec<Hand>> {
        self.timer.time(|| Ok(Vec::new()))
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.timer]
    }
}

#[test]
fn detector_timers_are_reported_once_active() {
    let (tx, rx) = mpsc::channel::<()>();
    let loader = DetectorLoader::spawn(move || {
        rx.recv().ok();
        Ok(TimedDetector {
            timer: Timer::new("fake inference"),
        })
    });
    let mut fl = FrameLoop::new(
        FakeCamera::ready(),
        loader,
        GestureEstimator::builtin(),
        RecordingSurface::default(),
    );

    assert_eq!(fl.tick(), TickOutcome::ModelLoading);
    assert!(fl.timers().all(|t| t.name() != "fake inference"));

    tx.send(()).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while fl.tick() == TickOutcome::ModelLoading {
        assert!(Instant::now() < deadline, "model never finished loading");
        thread::sleep(Duration::from_millis(1));
    }

    let timer = fl.timers().find(|t| t.name() == "fake inference");
    assert_eq!(timer.map(Timer::count), Some(1));
}

#[test]
fn dispose_during_detection() {
    let (started_tx, started_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let detector: BoxedDetector = Box::new(FnDetector::new(move |_: &Image| {
        started_tx.send(()).ok();
        release_rx.recv().ok();
        Ok(vec![victory_hand()])
    }));
    let classifier = FixedClassifier::new(&[(gestures::VICTORY, 9.0)]);
    let classify_calls = classifier.calls.clone();
    let mut fl = FrameLoop::new(
        FakeCamera::ready(),
        DetectorLoader::ready(detector),
        classifier,
        RecordingSurface::default(),
    );
    let handle = fl.dispose_handle();
    let overlay = fl.overlay().clone();

    let tick = thread::spawn(move || fl.tick());
    started_rx.recv().unwrap();
    assert!(handle.dispose());
    release_tx.send(()).unwrap();

    assert_eq!(tick.join().unwrap(), TickOutcome::Disposed);
    assert_eq!(classify_calls.get(), 0);
    assert_eq!(overlay.current(), None);
    assert!(!handle.dispose());
}

#[test]
fn disposed_loop_does_nothing() {
    let (detector, detect_calls) = detector_with(vec![victory_hand()]);
    let surface = RecordingSurface::default();
    let mut fl = FrameLoop::new(
        FakeCamera::ready(),
        DetectorLoader::ready(detector),
        GestureEstimator::builtin(),
        surface.clone(),
    );
    fl.dispose_handle().dispose();

    assert_eq!(fl.state(), LoopState::Disposed);
    assert_eq!(fl.tick(), TickOutcome::Disposed);
    assert_eq!(detect_calls.get(), 0);
    assert!(surface.take().is_empty());

    // Returns immediately.
    fl.run();
}

/// A camera that disposes the loop after a number of frames.
struct CountdownCamera {
    remaining: usize,
    handle: Arc<Mutex<Option<DisposeHandle>>>,
}

impl Camera for CountdownCamera {
    fn is_ready(&mut self) -> bool {
        true
    }

    fn frame(&mut self) -> anyhow::Result<Arc<Image>> {
        if self.remaining == 0 {
            if let Some(handle) = &*self.handle.lock().unwrap() {
                handle.dispose();
            }
        } else {
            self.remaining -= 1;
        }
        Ok(Arc::new(Image::filled(320, 240, Color::BLACK)))
    }
}

#[test]
fn run_until_disposed() {
    let handle = Arc::new(Mutex::new(None));
    let camera = CountdownCamera {
        remaining: 3,
        handle: handle.clone(),
    };
    let (detector, detect_calls) = detector_with(vec![victory_hand()]);
    let mut fl = FrameLoop::new(
        camera,
        DetectorLoader::ready(detector),
        GestureEstimator::builtin(),
        RecordingSurface::default(),
    );
    fl.set_tick_interval(Duration::from_millis(1));
    *handle.lock().unwrap() = Some(fl.dispose_handle());

    fl.run();

    assert_eq!(fl.state(), LoopState::Disposed);
    assert_eq!(detect_calls.get(), 4);
    assert_eq!(fl.overlay().current(), Some(Emoji::Victory));
}
