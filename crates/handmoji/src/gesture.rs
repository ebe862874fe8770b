//! Gesture classification of detected hands.

use handmoji_gesture::{GestureEstimator, GestureMatch, Landmarks};

/// Classifies the landmarks of a single hand into named gestures.
pub trait Classifier: Send {
    /// Returns every gesture scoring at least `min_score` (on a scale from 0 to 10).
    ///
    /// The returned candidates are not ordered by score.
    fn classify(
        &mut self,
        landmarks: &Landmarks,
        min_score: f32,
    ) -> anyhow::Result<Vec<GestureMatch>>;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn classify(
        &mut self,
        landmarks: &Landmarks,
        min_score: f32,
    ) -> anyhow::Result<Vec<GestureMatch>> {
        (**self).classify(landmarks, min_score)
    }
}

impl Classifier for GestureEstimator {
    fn classify(
        &mut self,
        landmarks: &Landmarks,
        min_score: f32,
    ) -> anyhow::Result<Vec<GestureMatch>> {
        if landmarks.iter().flatten().any(|c| !c.is_finite()) {
            anyhow::bail!("hand landmarks contain non-finite coordinates");
        }
        Ok(self.estimate(landmarks, min_score).into_gestures())
    }
}
