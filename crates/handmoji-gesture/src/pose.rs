//! Per-finger curl and direction estimation.

use nalgebra::{Vector2, Vector3};

use crate::{Finger, FingerCurl, FingerDirection, Landmarks};

/// Tuning parameters of the [`PoseEstimator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseOptions {
    /// Fingers bent to an angle below this (in degrees) are [`FingerCurl::HalfCurl`] or
    /// [`FingerCurl::FullCurl`].
    pub no_curl_start: f32,
    /// Fingers bent to an angle below this (in degrees) are [`FingerCurl::FullCurl`].
    pub half_curl_start: f32,
    /// Vote weight of the ratio between a finger's vertical and horizontal extent.
    pub distance_vote_power: f32,
    /// Vote weight of each individual joint segment's slope.
    pub single_angle_vote_power: f32,
    /// Vote weight of the slope of the whole finger.
    pub total_angle_vote_power: f32,
}

impl Default for PoseOptions {
    fn default() -> Self {
        Self {
            no_curl_start: 130.0,
            half_curl_start: 60.0,
            distance_vote_power: 1.1,
            single_angle_vote_power: 0.9,
            total_angle_vote_power: 1.6,
        }
    }
}

/// Curl and direction of every finger of a hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerPose {
    curls: [FingerCurl; 5],
    directions: [FingerDirection; 5],
}

impl FingerPose {
    /// Creates a pose from per-finger curls and directions, indexed by [`Finger::index`].
    pub fn new(curls: [FingerCurl; 5], directions: [FingerDirection; 5]) -> Self {
        Self { curls, directions }
    }

    #[inline]
    pub fn curl(&self, finger: Finger) -> FingerCurl {
        self.curls[finger.index()]
    }

    #[inline]
    pub fn direction(&self, finger: Finger) -> FingerDirection {
        self.directions[finger.index()]
    }

    /// Returns an iterator yielding every finger together with its curl and direction.
    pub fn iter(&self) -> impl Iterator<Item = (Finger, FingerCurl, FingerDirection)> + '_ {
        Finger::ALL
            .into_iter()
            .map(|finger| (finger, self.curl(finger), self.direction(finger)))
    }
}

/// Estimates the [`FingerPose`] of a hand from its landmarks.
#[derive(Debug, Clone, Default)]
pub struct PoseEstimator {
    options: PoseOptions,
}

impl PoseEstimator {
    pub fn new(options: PoseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PoseOptions {
        &self.options
    }

    pub fn estimate(&self, landmarks: &Landmarks) -> FingerPose {
        let mut curls = [FingerCurl::NoCurl; 5];
        let mut directions = [FingerDirection::VerticalUp; 5];

        for finger in Finger::ALL {
            let segments = finger.segments();
            // The thumb's first segment runs across the palm and says nothing about where the
            // thumb is pointing.
            let first = if finger == Finger::Thumb { 1 } else { 0 };

            let start = Vector3::from(landmarks[segments[first].0]);
            let mid = Vector3::from(landmarks[segments[first + 1].1]);
            let end = Vector3::from(landmarks[segments[3].1]);

            let slopes = segments[first..]
                .iter()
                .map(|&(a, b)| slope_degrees(xy(&landmarks[a]), xy(&landmarks[b])));

            curls[finger.index()] = self.curl(start, mid, end);
            directions[finger.index()] = self.direction(start.xy(), mid.xy(), end.xy(), slopes);
        }

        FingerPose { curls, directions }
    }

    fn curl(&self, start: Vector3<f32>, mid: Vector3<f32>, end: Vector3<f32>) -> FingerCurl {
        let start_mid = (start - mid).norm();
        let start_end = (start - end).norm();
        let mid_end = (mid - end).norm();

        // Law of cosines, for the angle at the middle of the finger.
        let cos = (mid_end.powi(2) + start_mid.powi(2) - start_end.powi(2))
            / (2.0 * mid_end * start_mid);
        let angle = cos.clamp(-1.0, 1.0).acos().to_degrees();

        if angle > self.options.no_curl_start {
            FingerCurl::NoCurl
        } else if angle > self.options.half_curl_start {
            FingerCurl::HalfCurl
        } else {
            FingerCurl::FullCurl
        }
    }

    fn direction(
        &self,
        start: Vector2<f32>,
        mid: Vector2<f32>,
        end: Vector2<f32>,
        segment_slopes: impl Iterator<Item = f32>,
    ) -> FingerDirection {
        let opts = &self.options;
        let dx = Offsets {
            start_mid: start.x - mid.x,
            start_end: start.x - end.x,
            mid_end: mid.x - end.x,
        };
        let dy = Offsets {
            start_mid: start.y - mid.y,
            start_end: start.y - end.y,
            mid_end: mid.y - end.y,
        };
        let max_x = dx.max_abs();
        let max_y = dy.max_abs();

        let mut votes = Votes::default();

        let ratio = max_y / (max_x + 0.00001);
        let extent = if ratio > 1.5 {
            Orientation::Vertical
        } else if ratio > 0.66 {
            Orientation::Diagonal
        } else {
            Orientation::Horizontal
        };
        votes.add(extent, opts.distance_vote_power);

        let start_mid = (start - mid).norm();
        let start_end = (start - end).norm();
        let mid_end = (mid - end).norm();
        let longest = start_mid.max(start_end).max(mid_end);
        let from = if longest != start_mid && longest == mid_end {
            mid
        } else {
            start
        };
        votes.add(
            Orientation::of(slope_degrees(from, end)),
            opts.total_angle_vote_power,
        );

        for slope in segment_slopes {
            votes.add(Orientation::of(slope), opts.single_angle_vote_power);
        }

        match votes.winner() {
            Orientation::Vertical => vertical(dy.dominant(max_y)),
            Orientation::Horizontal => horizontal(dx.dominant(max_x)),
            Orientation::Diagonal => {
                match (vertical(dy.dominant(max_y)), horizontal(dx.dominant(max_x))) {
                    (FingerDirection::VerticalUp, FingerDirection::HorizontalLeft) => {
                        FingerDirection::DiagonalUpLeft
                    }
                    (FingerDirection::VerticalUp, _) => FingerDirection::DiagonalUpRight,
                    (_, FingerDirection::HorizontalLeft) => FingerDirection::DiagonalDownLeft,
                    (_, _) => FingerDirection::DiagonalDownRight,
                }
            }
        }
    }
}

fn xy(landmark: &[f32; 3]) -> Vector2<f32> {
    Vector2::new(landmark[0], landmark[1])
}

/// Returns the angle of the line through `a` and `b`, in degrees, in range 0 to 180.
///
/// 90° is vertical, 0° and 180° are horizontal. Returns NaN if `a` and `b` are the same point.
fn slope_degrees(a: Vector2<f32>, b: Vector2<f32>) -> f32 {
    let slope = ((a.y - b.y) / (a.x - b.x)).atan().to_degrees();
    if slope <= 0.0 {
        -slope
    } else {
        180.0 - slope
    }
}

fn vertical(offset: f32) -> FingerDirection {
    // Y points down, so a positive offset from start to end means the finger points up.
    if offset < 0.0 {
        FingerDirection::VerticalDown
    } else {
        FingerDirection::VerticalUp
    }
}

fn horizontal(offset: f32) -> FingerDirection {
    if offset > 0.0 {
        FingerDirection::HorizontalLeft
    } else {
        FingerDirection::HorizontalRight
    }
}

/// Offsets along one axis between the start, middle and end point of a finger.
struct Offsets {
    start_mid: f32,
    start_end: f32,
    mid_end: f32,
}

impl Offsets {
    fn max_abs(&self) -> f32 {
        self.start_mid
            .abs()
            .max(self.start_end.abs())
            .max(self.mid_end.abs())
    }

    /// Returns the offset whose magnitude is `max`, preferring the whole finger's extent.
    fn dominant(&self, max: f32) -> f32 {
        if max == self.start_end.abs() {
            self.start_end
        } else if max == self.start_mid.abs() {
            self.start_mid
        } else {
            self.mid_end
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Vertical,
    Diagonal,
    Horizontal,
}

impl Orientation {
    fn of(angle: f32) -> Self {
        if (75.0..=105.0).contains(&angle) {
            Orientation::Vertical
        } else if (25.0..=155.0).contains(&angle) {
            Orientation::Diagonal
        } else {
            Orientation::Horizontal
        }
    }
}

#[derive(Default)]
struct Votes {
    vertical: f32,
    diagonal: f32,
    horizontal: f32,
}

impl Votes {
    fn add(&mut self, orientation: Orientation, power: f32) {
        match orientation {
            Orientation::Vertical => self.vertical += power,
            Orientation::Diagonal => self.diagonal += power,
            Orientation::Horizontal => self.horizontal += power,
        }
    }

    /// Vertical wins ties, then horizontal.
    fn winner(&self) -> Orientation {
        let max = self.vertical.max(self.diagonal).max(self.horizontal);
        if self.vertical == max {
            Orientation::Vertical
        } else if self.horizontal == max {
            Orientation::Horizontal
        } else {
            Orientation::Diagonal
        }
    }
}
