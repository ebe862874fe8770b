//! Rule-based hand gesture estimation.
//!
//! This crate recognizes static hand gestures from the 21 landmarks produced by MediaPipe-style
//! hand landmark networks. Recognition happens in two steps:
//!
//! 1. The [`PoseEstimator`] classifies every [`Finger`] into a [`FingerCurl`] and a
//!    [`FingerDirection`], yielding a [`FingerPose`].
//! 2. Each registered [`GestureDescription`] scores the [`FingerPose`] on a scale from 0 to 10.
//!    The [`GestureEstimator`] reports every gesture whose score reaches the requested minimum.
//!
//! # Coordinates
//!
//! Landmarks are expected in image coordinates: X points to the right, Y points *down*. The Z
//! coordinate is only used for curl estimation.
//!
//! # Landmark Order
//!
//! Index 0 is the wrist, followed by 4 landmarks per finger, starting at the thumb and ending at
//! the pinky. Each finger lists its joints from the palm outwards, ending at the fingertip.

mod description;
mod estimator;
mod finger;
pub mod gestures;
mod pose;

pub use description::GestureDescription;
pub use estimator::{select_best, Estimation, GestureEstimator, GestureMatch};
pub use finger::{Finger, FingerCurl, FingerDirection};
pub use pose::{FingerPose, PoseEstimator, PoseOptions};

/// Number of landmarks making up a hand.
pub const NUM_LANDMARKS: usize = 21;

/// The landmarks of a single hand.
pub type Landmarks = [[f32; 3]; NUM_LANDMARKS];
