use std::fmt;

/// The fingers of a hand, ordered like their landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    /// All fingers, in landmark order.
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    /// Returns the position of this finger in [`Finger::ALL`].
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Finger::Thumb => "thumb",
            Finger::Index => "index",
            Finger::Middle => "middle",
            Finger::Ring => "ring",
            Finger::Pinky => "pinky",
        }
    }

    /// Returns the landmark indices of the wrist and the 4 joints of this finger, ordered from the
    /// wrist to the fingertip.
    pub fn joints(self) -> [usize; 5] {
        let base = 1 + 4 * self.index();
        [0, base, base + 1, base + 2, base + 3]
    }

    /// Returns the 4 segments connecting consecutive [`Finger::joints`], as pairs of landmark
    /// indices.
    pub fn segments(self) -> [(usize, usize); 4] {
        let j = self.joints();
        [(j[0], j[1]), (j[1], j[2]), (j[2], j[3]), (j[3], j[4])]
    }
}

impl fmt::Display for Finger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How far a finger is bent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FingerCurl {
    NoCurl,
    HalfCurl,
    FullCurl,
}

impl FingerCurl {
    pub fn name(self) -> &'static str {
        match self {
            FingerCurl::NoCurl => "no curl",
            FingerCurl::HalfCurl => "half curl",
            FingerCurl::FullCurl => "full curl",
        }
    }
}

impl fmt::Display for FingerCurl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The direction a finger points in, as seen in the image.
///
/// "Left" and "right" refer to image coordinates, not to the hand's own frame of reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FingerDirection {
    VerticalUp,
    VerticalDown,
    HorizontalLeft,
    HorizontalRight,
    DiagonalUpRight,
    DiagonalUpLeft,
    DiagonalDownRight,
    DiagonalDownLeft,
}

impl FingerDirection {
    pub fn name(self) -> &'static str {
        match self {
            FingerDirection::VerticalUp => "vertical up",
            FingerDirection::VerticalDown => "vertical down",
            FingerDirection::HorizontalLeft => "horizontal left",
            FingerDirection::HorizontalRight => "horizontal right",
            FingerDirection::DiagonalUpRight => "diagonal up right",
            FingerDirection::DiagonalUpLeft => "diagonal up left",
            FingerDirection::DiagonalDownRight => "diagonal down right",
            FingerDirection::DiagonalDownLeft => "diagonal down left",
        }
    }
}

impl fmt::Display for FingerDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joints_follow_landmark_order() {
        assert_eq!(Finger::Thumb.joints(), [0, 1, 2, 3, 4]);
        assert_eq!(Finger::Index.joints(), [0, 5, 6, 7, 8]);
        assert_eq!(Finger::Middle.joints(), [0, 9, 10, 11, 12]);
        assert_eq!(Finger::Ring.joints(), [0, 13, 14, 15, 16]);
        assert_eq!(Finger::Pinky.joints(), [0, 17, 18, 19, 20]);
    }

    #[test]
    fn segments() {
        assert_eq!(
            Finger::Ring.segments(),
            [(0, 13), (13, 14), (14, 15), (15, 16)]
        );
    }
}
