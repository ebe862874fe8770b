use crate::{gestures, FingerPose, GestureDescription, Landmarks, PoseEstimator};

/// A gesture recognized by the [`GestureEstimator`].
#[derive(Debug, Clone, PartialEq)]
pub struct GestureMatch {
    name: String,
    score: f32,
}

impl GestureMatch {
    pub fn new(name: impl Into<String>, score: f32) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }

    /// The name of the matching [`GestureDescription`].
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The match score, from 0.0 to 10.0.
    #[inline]
    pub fn score(&self) -> f32 {
        self.score
    }
}

/// The result of [`GestureEstimator::estimate`].
#[derive(Debug, Clone)]
pub struct Estimation {
    pose: FingerPose,
    gestures: Vec<GestureMatch>,
}

impl Estimation {
    /// The estimated finger curls and directions.
    pub fn pose(&self) -> &FingerPose {
        &self.pose
    }

    /// All gestures that reached the minimum score, in registration order.
    pub fn gestures(&self) -> &[GestureMatch] {
        &self.gestures
    }

    pub fn into_gestures(self) -> Vec<GestureMatch> {
        self.gestures
    }
}

/// Matches hand landmarks against a fixed set of [`GestureDescription`]s.
pub struct GestureEstimator {
    pose: PoseEstimator,
    gestures: Vec<GestureDescription>,
}

impl GestureEstimator {
    pub fn new<I: IntoIterator<Item = GestureDescription>>(gestures: I) -> Self {
        Self {
            pose: PoseEstimator::default(),
            gestures: gestures.into_iter().collect(),
        }
    }

    /// Creates an estimator that recognizes [`gestures::victory`] and [`gestures::thumbs_up`].
    pub fn builtin() -> Self {
        Self::new(gestures::all())
    }

    pub fn gestures(&self) -> &[GestureDescription] {
        &self.gestures
    }

    /// Estimates the finger pose of `landmarks` and scores every registered gesture against it.
    ///
    /// Only gestures scoring at least `min_score` (on the 0 to 10 scale) are returned.
    pub fn estimate(&self, landmarks: &Landmarks, min_score: f32) -> Estimation {
        let pose = self.pose.estimate(landmarks);
        for (finger, curl, direction) in pose.iter() {
            log::trace!("{finger}: {curl}, {direction}");
        }

        let gestures = self
            .gestures
            .iter()
            .map(|desc| GestureMatch::new(desc.name(), desc.score(&pose)))
            .filter(|m| m.score >= min_score)
            .collect();

        Estimation { pose, gestures }
    }
}

/// Returns the candidate with the highest score.
///
/// If several candidates share the highest score, the first one wins. Candidates with a NaN score
/// are never selected. Returns [`None`] if there is no candidate to pick.
pub fn select_best(candidates: &[GestureMatch]) -> Option<&GestureMatch> {
    candidates
        .iter()
        .filter(|c| !c.score.is_nan())
        .fold(None, |best, c| match best {
            Some(best) if best.score >= c.score => Some(best),
            _ => Some(c),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{THUMBS_UP_HAND, VICTORY_HAND};

    fn candidates(list: &[(&str, f32)]) -> Vec<GestureMatch> {
        list.iter()
            .map(|&(name, score)| GestureMatch::new(name, score))
            .collect()
    }

    #[test]
    fn highest_score_wins() {
        let c = candidates(&[("victory", 0.6), ("thumbs_up", 0.9)]);
        assert_eq!(select_best(&c).unwrap().name(), "thumbs_up");
    }

    #[test]
    fn first_wins_ties() {
        let c = candidates(&[("victory", 0.8), ("thumbs_up", 0.8)]);
        assert_eq!(select_best(&c).unwrap().name(), "victory");
    }

    #[test]
    fn nothing_to_select() {
        assert_eq!(select_best(&[]), None);
        let c = candidates(&[("victory", f32::NAN)]);
        assert_eq!(select_best(&c), None);
    }

    #[test]
    fn nan_is_skipped() {
        let c = candidates(&[("a", f32::NAN), ("b", 1.0), ("c", f32::NAN)]);
        assert_eq!(select_best(&c).unwrap().name(), "b");
    }

    #[test]
    fn selects_first_maximum() {
        for _ in 0..500 {
            let len = fastrand::usize(1..8);
            // Few distinct values, so that ties are common.
            let c = (0..len)
                .map(|i| GestureMatch::new(i.to_string(), fastrand::u8(0..4) as f32))
                .collect::<Vec<_>>();

            let best = select_best(&c).unwrap();
            let max = c.iter().map(|m| m.score()).fold(f32::MIN, f32::max);
            let first = c.iter().position(|m| m.score() == max).unwrap();
            assert_eq!(best.name(), first.to_string());
        }
    }

    #[test]
    fn recognizes_victory() {
        let estimator = GestureEstimator::builtin();
        let est = estimator.estimate(&VICTORY_HAND, 8.0);
        assert_eq!(est.gestures().len(), 1, "{:?}", est.gestures());
        assert_eq!(est.gestures()[0].name(), gestures::VICTORY);
        assert!(est.gestures()[0].score() >= 9.0);
    }

    #[test]
    fn recognizes_thumbs_up() {
        let estimator = GestureEstimator::builtin();
        let est = estimator.estimate(&THUMBS_UP_HAND, 8.0);
        let names = est.gestures().iter().map(|m| m.name()).collect::<Vec<_>>();
        assert_eq!(names, [gestures::THUMBS_UP]);
        assert!(!names.contains(&gestures::VICTORY));
    }

    #[test]
    fn min_score_filters() {
        let estimator = GestureEstimator::builtin();
        let all = estimator.estimate(&VICTORY_HAND, 0.0);
        assert_eq!(all.gestures().len(), 2);
        assert_eq!(all.gestures()[0].name(), gestures::VICTORY);
        assert_eq!(all.gestures()[1].name(), gestures::THUMBS_UP);

        let none = estimator.estimate(&VICTORY_HAND, 10.1);
        assert!(none.gestures().is_empty());
    }
}
