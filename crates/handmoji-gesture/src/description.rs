use crate::{Finger, FingerCurl, FingerDirection, FingerPose};

/// Describes a gesture in terms of the finger curls and directions it is made of.
///
/// Every finger may list any number of accepted curls and directions, each with a contribution
/// between 0.0 and 1.0. When scoring a [`FingerPose`], each finger adds the contribution of its
/// best matching curl and direction, scaled by the finger's relative weight. Fingers without any
/// expected curl (or direction) always count as a full match.
///
/// The relative finger weights always add up to 5, so a perfect match scores 10.
///
/// # Example
///
/// ```
/// use handmoji_gesture::{Finger, FingerCurl, FingerDirection, GestureDescription};
///
/// let point_up = GestureDescription::new("point_up")
///     .curl(Finger::Index, FingerCurl::NoCurl, 1.0)
///     .direction(Finger::Index, FingerDirection::VerticalUp, 1.0)
///     .weight(Finger::Index, 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct GestureDescription {
    name: String,
    curls: [Vec<(FingerCurl, f32)>; 5],
    directions: [Vec<(FingerDirection, f32)>; 5],
    weights: [f32; 5],
}

impl GestureDescription {
    /// Creates an empty gesture description that matches any hand.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            curls: Default::default(),
            directions: Default::default(),
            weights: [1.0; 5],
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Accepts `curl` for `finger`, adding `contribution` to the score when it is detected.
    ///
    /// # Panics
    ///
    /// Panics if `contribution` is not in range 0.0 to 1.0.
    pub fn curl(mut self, finger: Finger, curl: FingerCurl, contribution: f32) -> Self {
        assert_contribution(contribution);
        self.curls[finger.index()].push((curl, contribution));
        self
    }

    /// Accepts `direction` for `finger`, adding `contribution` to the score when it is detected.
    ///
    /// # Panics
    ///
    /// Panics if `contribution` is not in range 0.0 to 1.0.
    pub fn direction(
        mut self,
        finger: Finger,
        direction: FingerDirection,
        contribution: f32,
    ) -> Self {
        assert_contribution(contribution);
        self.directions[finger.index()].push((direction, contribution));
        self
    }

    /// Sets how much `finger` counts towards the score, compared to the other fingers.
    ///
    /// All fingers start out with a weight of 1.0.
    ///
    /// # Panics
    ///
    /// Panics if `weight` is not a positive number.
    pub fn weight(mut self, finger: Finger, weight: f32) -> Self {
        assert!(weight > 0.0, "finger weight must be positive, got {weight}");
        self.weights[finger.index()] = weight;
        self
    }

    fn relative_weights(&self) -> [f32; 5] {
        let total: f32 = self.weights.iter().sum();
        self.weights.map(|w| w * 5.0 / total)
    }

    /// Scores how well `pose` matches this gesture, from 0.0 (no match) to 10.0 (perfect match).
    pub fn score(&self, pose: &FingerPose) -> f32 {
        let weights = self.relative_weights();

        Finger::ALL
            .into_iter()
            .map(|finger| {
                let i = finger.index();
                let curl = best_contribution(&self.curls[i], pose.curl(finger));
                let direction = best_contribution(&self.directions[i], pose.direction(finger));
                (curl + direction) * weights[i]
            })
            .sum()
    }
}

fn assert_contribution(contribution: f32) {
    assert!(
        (0.0..=1.0).contains(&contribution),
        "contribution must be between 0.0 and 1.0, got {contribution}",
    );
}

fn best_contribution<T: PartialEq>(expected: &[(T, f32)], detected: T) -> f32 {
    if expected.is_empty() {
        return 1.0;
    }

    expected
        .iter()
        .filter(|(t, _)| *t == detected)
        .map(|&(_, contribution)| contribution)
        .fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn pose(curl: FingerCurl, direction: FingerDirection) -> FingerPose {
        FingerPose::new([curl; 5], [direction; 5])
    }

    #[test]
    fn empty_description_matches_anything() {
        let desc = GestureDescription::new("anything");
        assert_relative_eq!(
            desc.score(&pose(FingerCurl::HalfCurl, FingerDirection::VerticalDown)),
            10.0
        );
    }

    #[test]
    fn best_contribution_wins() {
        let desc = GestureDescription::new("index")
            .curl(Finger::Index, FingerCurl::NoCurl, 0.3)
            .curl(Finger::Index, FingerCurl::NoCurl, 0.8)
            .curl(Finger::Index, FingerCurl::FullCurl, 1.0);

        // 4 unconstrained fingers contribute 1 + 1 each, the index finger 0.8 + 1.
        assert_relative_eq!(
            desc.score(&pose(FingerCurl::NoCurl, FingerDirection::VerticalUp)),
            9.8
        );
        assert_relative_eq!(
            desc.score(&pose(FingerCurl::HalfCurl, FingerDirection::VerticalUp)),
            9.0
        );
    }

    #[test]
    fn weights_are_relative() {
        let desc = GestureDescription::new("thumb")
            .curl(Finger::Thumb, FingerCurl::NoCurl, 1.0)
            .weight(Finger::Thumb, 4.0);

        // Thumb has 4/8 of the weight, so a wrong curl loses a quarter of the total score.
        assert_relative_eq!(
            desc.score(&pose(FingerCurl::FullCurl, FingerDirection::VerticalUp)),
            7.5
        );
    }

    #[test]
    #[should_panic]
    fn rejects_out_of_range_contribution() {
        GestureDescription::new("bad").curl(Finger::Thumb, FingerCurl::NoCurl, 1.5);
    }
}
