//! Hand landmark indices.

use handmoji_gesture::Finger;

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Landmarks of every finger, from the wrist to the fingertip.
///
/// The skeleton is drawn as one polyline per entry.
pub const FINGER_JOINTS: [(Finger, [LandmarkIdx; 5]); 5] = {
    use LandmarkIdx::*;
    [
        (Finger::Thumb, [Wrist, ThumbCmc, ThumbMcp, ThumbIp, ThumbTip]),
        (
            Finger::Index,
            [
                Wrist,
                IndexFingerMcp,
                IndexFingerPip,
                IndexFingerDip,
                IndexFingerTip,
            ],
        ),
        (
            Finger::Middle,
            [
                Wrist,
                MiddleFingerMcp,
                MiddleFingerPip,
                MiddleFingerDip,
                MiddleFingerTip,
            ],
        ),
        (
            Finger::Ring,
            [
                Wrist,
                RingFingerMcp,
                RingFingerPip,
                RingFingerDip,
                RingFingerTip,
            ],
        ),
        (Finger::Pinky, [Wrist, PinkyMcp, PinkyPip, PinkyDip, PinkyTip]),
    ]
};
