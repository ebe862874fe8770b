//! Composition of the displayed frame.

use std::{fmt, sync::Arc, time::Instant};

use crate::{
    hand::Hand,
    image::{draw, Color, Image, Rect, Resolution},
    overlay::{Emoji, OverlayAssets},
    timer::Timer,
};

/// Size of the square viewport the overlay position is specified in.
const VIEWPORT_SIZE: f32 = 800.0;
/// Distance of the overlay's left edge from the left edge of the viewport.
const OVERLAY_LEFT: f32 = 400.0;
/// Distance of the overlay's bottom edge from the bottom edge of the viewport.
const OVERLAY_BOTTOM: f32 = 500.0;
const OVERLAY_HEIGHT: f32 = 100.0;

/// A status message shown on top of the video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The camera has not produced a frame yet.
    CameraNotReady,
    /// The hand landmark model is still being loaded.
    ModelLoading,
    /// The hand landmark model failed to load; carries the error message.
    ModelFailed(String),
    /// Detecting or classifying the hand in the current frame failed.
    DetectionFailed,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::CameraNotReady => f.write_str("camera not ready"),
            Notice::ModelLoading => f.write_str("loading hand model..."),
            Notice::ModelFailed(_) => f.write_str("hand model unavailable"),
            Notice::DetectionFailed => f.write_str("hand tracking failed"),
        }
    }
}

/// Drawing target of the [`FrameLoop`](crate::controller::FrameLoop).
pub trait Surface: Send {
    /// Matches the surface to the video resolution.
    fn resize(&mut self, resolution: Resolution);

    /// Replaces the hand skeleton layer with the skeletons of `hands`.
    ///
    /// An empty slice clears the layer.
    fn draw_skeleton(&mut self, hands: &[Hand]);

    /// Shows `notice` with the next presented frame.
    fn show_notice(&mut self, notice: Notice);

    /// Presents `frame` with the skeleton layer, the overlay of `emoji` and any pending notice.
    fn present(&mut self, frame: &Image, emoji: Option<Emoji>) -> anyhow::Result<()>;

    /// Returns profiling timers to log alongside the frame rate.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<S: Surface + ?Sized> Surface for Box<S> {
    fn resize(&mut self, resolution: Resolution) {
        (**self).resize(resolution)
    }

    fn draw_skeleton(&mut self, hands: &[Hand]) {
        (**self).draw_skeleton(hands)
    }

    fn show_notice(&mut self, notice: Notice) {
        (**self).show_notice(notice)
    }

    fn present(&mut self, frame: &Image, emoji: Option<Emoji>) -> anyhow::Result<()> {
        (**self).present(frame, emoji)
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}

/// Computes where the overlay image goes in a frame of resolution `frame`.
///
/// The video is shown stretched to a square viewport, and the overlay is placed at a fixed position
/// of that viewport; this maps the position back to frame pixels. The overlay keeps the aspect
/// ratio of `overlay`.
pub fn overlay_rect(frame: Resolution, overlay: Resolution) -> Rect {
    let scale_x = frame.width() as f32 / VIEWPORT_SIZE;
    let scale_y = frame.height() as f32 / VIEWPORT_SIZE;

    let top = VIEWPORT_SIZE - OVERLAY_BOTTOM - OVERLAY_HEIGHT;
    let height = OVERLAY_HEIGHT * scale_y;
    let aspect = if overlay.height() == 0 {
        1.0
    } else {
        overlay.width() as f32 / overlay.height() as f32
    };
    Rect::from_top_left(OVERLAY_LEFT * scale_x, top * scale_y, height * aspect, height)
}

/// A [`Surface`] that composes frames in memory and passes them to a sink.
pub struct Canvas {
    skeleton: Image,
    assets: OverlayAssets,
    notice: Option<Notice>,
    sink: Box<dyn FnMut(Image) -> anyhow::Result<()> + Send>,
    t_compose: Timer,
}

impl Canvas {
    /// Creates a canvas that hands every composed frame to `sink`.
    pub fn new<F>(assets: OverlayAssets, sink: F) -> Self
    where
        F: FnMut(Image) -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            skeleton: Image::new(0, 0),
            assets,
            notice: None,
            sink: Box::new(sink),
            t_compose: Timer::new("compose"),
        }
    }

    /// Returns the current size of the canvas.
    pub fn resolution(&self) -> Resolution {
        self.skeleton.resolution()
    }

    /// Returns the transparent layer holding the hand skeletons.
    pub fn skeleton(&self) -> &Image {
        &self.skeleton
    }

    fn compose(&mut self, frame: &Image, emoji: Option<Emoji>) -> Image {
        let mut target = frame.clone();
        target.blend(&self.skeleton, 0, 0);

        if let Some(emoji) = emoji {
            match self.assets.get(emoji) {
                Some(image) => draw_overlay(&mut target, image),
                None => {
                    let rect = overlay_rect(target.resolution(), Resolution::new(1, 1));
                    draw::text(&mut target, rect.center(), emoji.name()).color(Color::YELLOW);
                }
            }
        }

        if let Some(notice) = self.notice.take() {
            let msg = notice.to_string();
            let x = target.width() as f32 / 2.0;
            draw::text(&mut target, [x, 10.0], &msg)
                .align_top()
                .color(Color::WHITE);
        }

        target
    }
}

fn draw_overlay(target: &mut Image, image: &Arc<Image>) {
    let rect = overlay_rect(target.resolution(), image.resolution());
    let (w, h) = (rect.width().round() as u32, rect.height().round() as u32);
    if w == 0 || h == 0 {
        return;
    }
    let scaled = image.resized(w, h);
    target.blend(&scaled, rect.x().round() as i32, rect.y().round() as i32);
}

impl Surface for Canvas {
    fn resize(&mut self, resolution: Resolution) {
        if self.skeleton.resolution() != resolution {
            log::debug!("resizing canvas to {resolution}");
            self.skeleton = Image::new(resolution.width(), resolution.height());
        }
    }

    fn draw_skeleton(&mut self, hands: &[Hand]) {
        self.skeleton.clear(Color::NULL);
        for hand in hands {
            hand.draw(&mut self.skeleton);
        }
    }

    fn show_notice(&mut self, notice: Notice) {
        if let Notice::ModelFailed(reason) = &notice {
            log::trace!("model failure notice: {reason}");
        }
        self.notice = Some(notice);
    }

    fn present(&mut self, frame: &Image, emoji: Option<Emoji>) -> anyhow::Result<()> {
        let start = Instant::now();
        let composed = self.compose(frame, emoji);
        self.t_compose.record(start.elapsed());
        (self.sink)(composed)
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_compose]
    }
}
