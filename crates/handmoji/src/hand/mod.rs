//! Detected hands and their skeleton.

pub mod detection;
mod landmark;

use handmoji_gesture::{Finger, Landmarks};
use itertools::Itertools;

use crate::image::{draw, Color, Image, Rect};

pub use landmark::{LandmarkIdx, FINGER_JOINTS};

/// A hand found by a [`LandmarkDetector`](crate::detector::LandmarkDetector).
#[derive(Debug, Clone, PartialEq)]
pub struct Hand {
    landmarks: Landmarks,
    presence: f32,
    raw_handedness: f32,
}

impl Hand {
    /// Creates a hand from landmarks in image coordinates.
    ///
    /// `presence` and `raw_handedness` are the raw network outputs in range 0 to 1.
    pub fn new(landmarks: Landmarks, presence: f32, raw_handedness: f32) -> Self {
        Self {
            landmarks,
            presence,
            raw_handedness,
        }
    }

    /// Creates a hand from landmarks only, reporting full presence.
    pub fn from_landmarks(landmarks: Landmarks) -> Self {
        Self::new(landmarks, 1.0, 1.0)
    }

    /// Returns all 21 landmarks, in the input image's coordinate system.
    #[inline]
    pub fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    /// Returns a landmark's position in the input image's coordinate system.
    #[inline]
    pub fn landmark(&self, idx: LandmarkIdx) -> [f32; 3] {
        self.landmarks[idx as usize]
    }

    /// Returns the probability that the landmarks actually belong to a hand.
    #[inline]
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Returns the estimated handedness of the hand in the image.
    ///
    /// This assumes that the camera image is passed in as-is, and the returned value should only be
    /// relied on when the `presence` is over some threshold.
    pub fn handedness(&self) -> Handedness {
        if self.raw_handedness > 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }

    /// Computes the bounding rectangle of all landmarks.
    pub fn bounding_rect(&self) -> Rect {
        let rect = Rect::bounding(self.landmarks.iter().map(|&[x, y, _]| [x, y]));
        rect.unwrap_or_else(|| Rect::from_top_left(0.0, 0.0, 0.0, 0.0))
    }

    /// Draws the finger polylines and joint markers of this hand onto `target`.
    pub fn draw(&self, target: &mut Image) {
        for (finger, joints) in FINGER_JOINTS {
            for (a, b) in joints.iter().tuple_windows() {
                let [ax, ay, _] = self.landmark(*a);
                let [bx, by, _] = self.landmark(*b);
                draw::line(target, [ax, ay], [bx, by])
                    .color(finger_color(finger))
                    .stroke_width(4);
            }
        }
        for &[x, y, _] in &self.landmarks {
            draw::marker(target, [x, y]).color(Color::INDIGO);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

fn finger_color(finger: Finger) -> Color {
    match finger {
        Finger::Thumb => Color::PLUM,
        Finger::Index => Color::from_rgb8(255, 140, 0),
        Finger::Middle => Color::from_rgb8(64, 224, 208),
        Finger::Ring => Color::YELLOW,
        Finger::Pinky => Color::from_rgb8(50, 205, 50),
    }
}

#[cfg(test)]
mod tests {
    use handmoji_gesture::NUM_LANDMARKS;

    use super::*;

    fn straight_hand() -> Hand {
        let mut landmarks = [[0.0; 3]; NUM_LANDMARKS];
        landmarks[0] = [50.0, 90.0, 0.0];
        for (i, (_, joints)) in FINGER_JOINTS.iter().enumerate() {
            for (j, lm) in joints.iter().enumerate().skip(1) {
                landmarks[*lm as usize] = [10.0 + 20.0 * i as f32, 90.0 - 15.0 * j as f32, 0.0];
            }
        }
        Hand::new(landmarks, 0.9, 0.2)
    }

    #[test]
    fn accessors() {
        let hand = straight_hand();
        assert_eq!(hand.landmark(LandmarkIdx::Wrist), [50.0, 90.0, 0.0]);
        assert_eq!(hand.landmark(LandmarkIdx::PinkyTip), [90.0, 30.0, 0.0]);
        assert_eq!(hand.handedness(), Handedness::Left);
        assert_eq!(hand.presence(), 0.9);
    }

    #[test]
    fn bounding_rect() {
        let rect = straight_hand().bounding_rect();
        assert_eq!(rect.x(), 10.0);
        assert_eq!(rect.y(), 30.0);
        assert_eq!(rect.width(), 80.0);
        assert_eq!(rect.height(), 60.0);
    }

    #[test]
    fn draws_joints_and_bones() {
        let hand = straight_hand();
        let mut image = Image::new(100, 100);
        hand.draw(&mut image);
        assert_eq!(image.get(10, 75), Color::INDIGO);
        // Between the first two thumb joints, away from any marker.
        assert_eq!(image.get(10, 67), Color::PLUM);
        assert_eq!(image.get(99, 0), Color::NULL);
    }
}
