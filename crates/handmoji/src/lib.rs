//! Webcam hand gesture recognition with emoji overlays.
//!
//! A [`FrameLoop`] reads frames from a [`Camera`], runs a hand [`LandmarkDetector`] on them,
//! classifies the first detected hand with a [`Classifier`], and presents the frame together with
//! the hand skeleton and the emoji of the recognized gesture on a [`Surface`].
//!
//! # Environment Variables
//!
//! The `handmoji` binary is configured through environment variables, see [`Config`]. In
//! addition:
//!
//! * `HANDMOJI_JPEG_BACKEND`: Configures the JPEG image decoder to use. Allowed values are:
//!   * `mozjpeg`: uses the [mozjpeg] library to decode JPEG images (default).
//!   * `jpeg-decoder`: uses the [jpeg-decoder] crate.
//!
//! [mozjpeg]: https://github.com/mozilla/mozjpeg
//! [jpeg-decoder]: https://github.com/image-rs/jpeg-decoder/
//! [`FrameLoop`]: controller::FrameLoop
//! [`Camera`]: camera::Camera
//! [`LandmarkDetector`]: detector::LandmarkDetector
//! [`Classifier`]: gesture::Classifier
//! [`Surface`]: surface::Surface
//! [`Config`]: config::Config

use log::LevelFilter;

pub mod camera;
pub mod config;
pub mod controller;
pub mod detection;
pub mod detector;
pub mod gesture;
pub mod gui;
pub mod hand;
pub mod image;
pub mod nn;
pub mod overlay;
pub mod surface;
pub mod timer;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("handmoji_gesture"), LevelFilter::Info)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and handmoji log at *debug* level, gesture estimation at *info* and `wgpu`
/// at *warn*. `RUST_LOG` overrides all of these.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
