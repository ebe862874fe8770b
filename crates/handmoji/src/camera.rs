//! Webcam access.
//!
//! Currently, only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are
//! supported.

use std::{str::FromStr, sync::Arc, thread, time::Duration};

use anyhow::{anyhow, bail};
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};
use pawawwewism::{promise, Promise, PromiseHandle, Worker};

use crate::{
    image::{Image, Resolution},
    timer::{TickCounter, Timer},
};

/// Delay between attempts to open the webcam.
const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// A source of video frames polled by the [`FrameLoop`](crate::controller::FrameLoop).
pub trait Camera: Send {
    /// Returns whether the camera is producing frames.
    fn is_ready(&mut self) -> bool;

    /// Returns the most recent frame.
    ///
    /// Returns an error if the camera is not ready.
    fn frame(&mut self) -> anyhow::Result<Arc<Image>>;
}

impl<C: Camera + ?Sized> Camera for Box<C> {
    fn is_ready(&mut self) -> bool {
        (**self).is_ready()
    }

    fn frame(&mut self) -> anyhow::Result<Arc<Image>> {
        (**self).frame()
    }
}

/// Indicates whether to prefer a higher resolution or frame rate.
///
/// By default, [`ParamPreference::Resolution`] is used, selecting the maximum resolution at the
/// desired frame rate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ParamPreference {
    /// Prefer increased resolution over higher frame rates.
    #[default]
    Resolution,
    /// Prefer higher frame rate over higher image resolution.
    Framerate,
}

impl FromStr for ParamPreference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "resolution" => Ok(Self::Resolution),
            "framerate" | "fps" => Ok(Self::Framerate),
            _ => bail!("unknown preference '{s}' (expected 'resolution' or 'framerate')"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct FramePrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    pref: ParamPreference,
}

/// Format negotiation options.
#[derive(Debug, Default, Clone)]
pub struct WebcamOptions {
    name: Option<String>,
    frame: FramePrefs,
}

impl WebcamOptions {
    /// Sets the name of the webcam device to open.
    ///
    /// If no webcam with the given name can be found, opening the webcam will result in an error.
    #[inline]
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the desired image resolution.
    ///
    /// A lower resolution might be selected if the webcam cannot deliver the desired resolution.
    #[inline]
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.frame.resolution = Some(resolution);
        self
    }

    /// Sets the desired frame rate.
    ///
    /// A lower frame rate might be selected if the webcam cannot deliver the desired frame rate.
    #[inline]
    pub fn fps(mut self, fps: u32) -> Self {
        self.frame.fps = Some(fps);
        self
    }

    /// Selects whether to prefer a higher resolution or frame rate.
    #[inline]
    pub fn prefer(mut self, pref: ParamPreference) -> Self {
        self.frame.pref = pref;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

impl FrameFormat {
    fn fps(&self) -> f32 {
        1.0 / self.frame_interval.as_f32()
    }
}

fn negotiate_format(device: &Device, prefs: FramePrefs) -> anyhow::Result<(PixFormat, Fract)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixelformat() == Pixelformat::JPEG || format.pixelformat() == Pixelformat::MJPG {
            pixel_format = Some(format.pixelformat());
            break;
        }
    }

    let Some(pixel_format) = pixel_format else {
        bail!("no supported pixel format found");
    };

    let mut formats = Vec::new();
    match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => {
            for size in sizes {
                let intervals =
                    match device.frame_intervals(pixel_format, size.width(), size.height())? {
                        FrameIntervals::Discrete(intervals) => intervals,
                        FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                            bail!("stepwise or continuous frame rates are not supported")
                        }
                    };
                for rate in intervals {
                    formats.push(FrameFormat {
                        resolution: Resolution::new(size.width(), size.height()),
                        frame_interval: *rate.fract(),
                    });
                }
            }
        }
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported");
        }
    }

    let fmt = select_format(&formats, prefs)?;
    Ok((
        PixFormat::new(
            fmt.resolution.width(),
            fmt.resolution.height(),
            pixel_format,
        ),
        fmt.frame_interval,
    ))
}

/// Picks the best format, relaxing `prefs` until one is eligible.
fn select_format(formats: &[FrameFormat], mut prefs: FramePrefs) -> anyhow::Result<FrameFormat> {
    loop {
        if let Some(fmt) = negotiate_format_step(formats, prefs) {
            return Ok(fmt);
        }

        log::debug!("failed to negotiate format with prefs {:?}", prefs);
        let relaxed = match prefs.pref {
            ParamPreference::Resolution => {
                prefs.resolution.take().is_some() || prefs.fps.take().is_some()
            }
            ParamPreference::Framerate => {
                prefs.fps.take().is_some() || prefs.resolution.take().is_some()
            }
        };
        if !relaxed {
            bail!("failed to negotiate a webcam format");
        }
        log::debug!("retrying with new prefs {:?}", prefs);
    }
}

fn negotiate_format_step(formats: &[FrameFormat], prefs: FramePrefs) -> Option<FrameFormat> {
    let mut formats = formats
        .iter()
        .filter(|fmt| {
            prefs.resolution.map_or(true, |res| {
                fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
            }) && prefs.fps.map_or(true, |fps| fmt.fps().round() >= fps as f32)
        })
        .copied()
        .collect::<Vec<_>>();
    match prefs.pref {
        ParamPreference::Resolution => formats.sort_by(|a, b| {
            (a.resolution.num_pixels().cmp(&b.resolution.num_pixels()))
                .then(a.fps().total_cmp(&b.fps()))
        }),
        ParamPreference::Framerate => formats.sort_by(|a, b| {
            (a.fps().total_cmp(&b.fps()))
                .then(a.resolution.num_pixels().cmp(&b.resolution.num_pixels()))
        }),
    }
    formats.last().copied()
}

/// A webcam yielding a stream of [`Image`]s.
pub struct Webcam {
    stream: ReadStream,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the first supported webcam found.
    ///
    /// This function can block for a significant amount of time while the webcam initializes (on
    /// the order of hundreds of milliseconds).
    pub fn open(options: &WebcamOptions) -> anyhow::Result<Self> {
        for res in linuxvideo::list()? {
            match res {
                Ok(dev) => match Self::open_impl(dev, options) {
                    Ok(Some(webcam)) => return Ok(webcam),
                    Ok(None) => {}
                    Err(e) => {
                        log::debug!("{}", e);
                    }
                },
                Err(e) => {
                    log::warn!("{}", e);
                }
            }
        }

        match &options.name {
            Some(name) => bail!("no supported webcam named '{name}' found"),
            None => bail!("no supported webcam device found"),
        }
    }

    fn open_impl(dev: Device, options: &WebcamOptions) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        if let Some(name) = &options.name {
            if caps.card() != name {
                return Ok(None);
            }
        }

        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );

        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixfmt, fract) = negotiate_format(&dev, options.frame)?;

        let capture = dev.video_capture(pixfmt)?;
        let format = capture.format();
        let actual = capture.set_frame_interval(fract)?;

        log::info!(
            "opened {} ({}), {}x{} @ {:.1}Hz",
            caps.card(),
            path.display(),
            format.width(),
            format.height(),
            1.0 / actual.as_f32(),
        );

        let stream = capture.into_stream(2)?;

        Ok(Some(Self {
            stream,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    /// Reads the next frame from the camera.
    ///
    /// If no frame is available, this method will block until one is. Returns `Ok(None)` if the
    /// frame could not be decoded.
    pub fn read(&mut self) -> anyhow::Result<Option<Image>> {
        let dequeue_guard = self.t_dequeue.start();
        let t_decode = &self.t_decode;
        let image = self.stream.dequeue(|buf| {
            drop(dequeue_guard);
            match t_decode.time(|| Image::decode_jpeg(&buf)) {
                Ok(image) => Ok(Some(image)),
                Err(e) => {
                    // Even good webcams produce the occasional corrupted MJPG frame.
                    log::warn!("webcam decode error: {}", e);
                    Ok(None)
                }
            }
        })?;
        Ok(image)
    }

    /// Returns profiling timers for webcam access and decoding.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_dequeue, &self.t_decode].into_iter()
    }
}

type Capture = Promise<Option<Image>>;

/// A webcam captured on a background [`Worker`].
///
/// Every request to the worker reads one frame. The worker keeps trying to open the webcam until
/// it succeeds, and reopens it when reading fails. The camera is ready once the first frame was
/// decoded; afterwards the most recent frame is returned until a newer one arrives.
pub struct LiveCamera {
    latest: Option<Arc<Image>>,
    pending: Option<PromiseHandle<Option<Image>>>,
    worker: Worker<Capture>,
}

impl LiveCamera {
    /// Starts the capture worker and requests the first frame.
    pub fn start(options: WebcamOptions) -> anyhow::Result<Self> {
        let mut counter = TickCounter::new("webcam");
        let mut webcam = None;
        let worker = Worker::builder()
            .name("webcam")
            .capacity(1)
            .spawn(move |capture: Capture| {
                capture.fulfill(capture_frame(&options, &mut webcam, &mut counter));
            })?;

        let mut this = Self {
            latest: None,
            pending: None,
            worker,
        };
        this.poll();
        Ok(this)
    }

    /// Takes a finished frame from the worker and requests the next one.
    fn poll(&mut self) {
        match &self.pending {
            Some(handle) if !handle.is_fulfilled() => return,
            Some(_) => {
                if let Some(Ok(Some(image))) = self.pending.take().map(PromiseHandle::block) {
                    self.latest = Some(Arc::new(image));
                }
            }
            None => {}
        }

        let (capture, handle) = promise();
        self.worker.send(capture);
        self.pending = Some(handle);
    }
}

impl Camera for LiveCamera {
    fn is_ready(&mut self) -> bool {
        self.poll();
        self.latest.is_some()
    }

    fn frame(&mut self) -> anyhow::Result<Arc<Image>> {
        self.poll();
        self.latest
            .clone()
            .ok_or_else(|| anyhow!("webcam has not produced a frame yet"))
    }
}

/// Reads one frame, opening `webcam` first if needed.
///
/// Returns [`None`] if no frame could be read; the next call retries.
fn capture_frame(
    options: &WebcamOptions,
    webcam: &mut Option<Webcam>,
    counter: &mut TickCounter,
) -> Option<Image> {
    let cam = match webcam {
        Some(cam) => cam,
        None => match Webcam::open(options) {
            Ok(cam) => webcam.insert(cam),
            Err(e) => {
                log::warn!("failed to open webcam: {e:#}; retrying in {RETRY_INTERVAL:?}");
                thread::sleep(RETRY_INTERVAL);
                return None;
            }
        },
    };

    match cam.read() {
        Ok(image) => {
            counter.tick_with(cam.timers());
            image
        }
        Err(e) => {
            log::error!("webcam read failed: {e:#}; reopening");
            *webcam = None;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(width: u32, height: u32, fps: u32) -> FrameFormat {
        FrameFormat {
            resolution: Resolution::new(width, height),
            frame_interval: Fract::new(1, fps),
        }
    }

    fn formats() -> Vec<FrameFormat> {
        vec![
            fmt(640, 480, 30),
            fmt(640, 480, 60),
            fmt(1280, 720, 30),
            fmt(1920, 1080, 15),
        ]
    }

    #[test]
    fn prefers_resolution_by_default() {
        let prefs = FramePrefs::default();
        assert_eq!(select_format(&formats(), prefs).unwrap(), fmt(1920, 1080, 15));

        let prefs = FramePrefs {
            fps: Some(30),
            ..FramePrefs::default()
        };
        assert_eq!(select_format(&formats(), prefs).unwrap(), fmt(1280, 720, 30));
    }

    #[test]
    fn prefers_framerate() {
        let prefs = FramePrefs {
            pref: ParamPreference::Framerate,
            ..FramePrefs::default()
        };
        assert_eq!(select_format(&formats(), prefs).unwrap(), fmt(640, 480, 60));
    }

    #[test]
    fn relaxes_unsatisfiable_prefs() {
        let prefs = FramePrefs {
            resolution: Some(Resolution::new(3840, 2160)),
            fps: Some(30),
            pref: ParamPreference::Resolution,
        };
        // Resolution is dropped first, keeping 30 FPS.
        assert_eq!(select_format(&formats(), prefs).unwrap(), fmt(1280, 720, 30));

        assert!(select_format(&[], prefs).is_err());
    }

    #[test]
    fn parse_preference() {
        assert_eq!("resolution".parse::<ParamPreference>().unwrap(), ParamPreference::Resolution);
        assert_eq!("framerate".parse::<ParamPreference>().unwrap(), ParamPreference::Framerate);
        assert_eq!("fps".parse::<ParamPreference>().unwrap(), ParamPreference::Framerate);
        assert!("speed".parse::<ParamPreference>().is_err());
    }

    #[test]
    fn options_carry_prefs() {
        let options = WebcamOptions::default()
            .name("Integrated Camera")
            .resolution(Resolution::RES_720P)
            .fps(60)
            .prefer(ParamPreference::Framerate);
        assert_eq!(options.name.as_deref(), Some("Integrated Camera"));
        // No 720p format reaches 60 FPS; the preferred frame rate is relaxed first.
        assert_eq!(
            select_format(&formats(), options.frame).unwrap(),
            fmt(1280, 720, 30)
        );
    }
}
