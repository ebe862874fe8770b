//! Built-in gesture descriptions.

use crate::{Finger, FingerCurl, FingerDirection::*, GestureDescription};

/// Name of the [`victory`] gesture.
pub const VICTORY: &str = "victory";

/// Name of the [`thumbs_up`] gesture.
pub const THUMBS_UP: &str = "thumbs_up";

/// Index and middle finger extended upwards, the other fingers curled.
pub fn victory() -> GestureDescription {
    GestureDescription::new(VICTORY)
        .curl(Finger::Thumb, FingerCurl::HalfCurl, 0.5)
        .curl(Finger::Thumb, FingerCurl::NoCurl, 0.5)
        .direction(Finger::Thumb, VerticalUp, 1.0)
        .direction(Finger::Thumb, DiagonalUpLeft, 1.0)
        .curl(Finger::Index, FingerCurl::NoCurl, 1.0)
        .direction(Finger::Index, VerticalUp, 0.75)
        .direction(Finger::Index, DiagonalUpLeft, 1.0)
        .curl(Finger::Middle, FingerCurl::NoCurl, 1.0)
        .direction(Finger::Middle, VerticalUp, 1.0)
        .direction(Finger::Middle, DiagonalUpLeft, 0.75)
        .curl(Finger::Ring, FingerCurl::FullCurl, 1.0)
        .direction(Finger::Ring, VerticalUp, 0.2)
        .direction(Finger::Ring, DiagonalUpLeft, 1.0)
        .direction(Finger::Ring, HorizontalLeft, 0.2)
        .curl(Finger::Pinky, FingerCurl::FullCurl, 1.0)
        .direction(Finger::Pinky, VerticalUp, 0.2)
        .direction(Finger::Pinky, DiagonalUpLeft, 1.0)
        .direction(Finger::Pinky, HorizontalLeft, 0.2)
        .weight(Finger::Index, 2.0)
        .weight(Finger::Middle, 2.0)
}

/// Thumb extended upwards, the other fingers curled into a sideways fist.
pub fn thumbs_up() -> GestureDescription {
    let mut desc = GestureDescription::new(THUMBS_UP)
        .curl(Finger::Thumb, FingerCurl::NoCurl, 1.0)
        .direction(Finger::Thumb, VerticalUp, 1.0)
        .direction(Finger::Thumb, DiagonalUpLeft, 0.9)
        .direction(Finger::Thumb, DiagonalUpRight, 0.9)
        .weight(Finger::Thumb, 2.0);

    for finger in [Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky] {
        desc = desc
            .curl(finger, FingerCurl::FullCurl, 1.0)
            .direction(finger, HorizontalLeft, 1.0)
            .direction(finger, HorizontalRight, 1.0);
    }

    desc
}

/// Returns all built-in gestures.
pub fn all() -> [GestureDescription; 2] {
    [victory(), thumbs_up()]
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{FingerDirection, FingerPose};

    fn fist_with_thumb(thumb: FingerDirection) -> FingerPose {
        FingerPose::new(
            [
                FingerCurl::NoCurl,
                FingerCurl::FullCurl,
                FingerCurl::FullCurl,
                FingerCurl::FullCurl,
                FingerCurl::FullCurl,
            ],
            [
                thumb,
                HorizontalLeft,
                HorizontalLeft,
                HorizontalLeft,
                HorizontalLeft,
            ],
        )
    }

    #[test]
    fn thumbs_up_scores() {
        let desc = thumbs_up();
        assert_relative_eq!(desc.score(&fist_with_thumb(VerticalUp)), 10.0);
        // The thumb has a third of the total weight, its direction a sixth.
        assert_relative_eq!(
            desc.score(&fist_with_thumb(VerticalDown)),
            10.0 - 10.0 / 6.0,
            epsilon = 1e-5
        );
    }

    #[test]
    fn victory_does_not_match_thumbs_up() {
        assert!(victory().score(&fist_with_thumb(VerticalUp)) < 5.0);
    }
}
