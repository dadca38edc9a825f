use crate::{
    config::ClassifierConfig,
    geometry::{distance, finger_direction, is_finger_straight},
    types::{Finger, GestureLabel, HandLandmarks, joint},
};

/// Maps one hand pose to at most one gesture. Holds no per-frame state, so
/// the same landmarks always classify the same way.
#[derive(Clone, Debug)]
pub struct GestureClassifier {
    config: ClassifierConfig,
}

impl GestureClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, hand: &HandLandmarks) -> Option<GestureLabel> {
        let fingers = FingerStates::measure(hand, self.config.straightness_threshold);

        self.config
            .priority
            .iter()
            .copied()
            .find(|label| self.matches(*label, hand, &fingers))
    }

    fn matches(&self, label: GestureLabel, hand: &HandLandmarks, fingers: &FingerStates) -> bool {
        match label {
            GestureLabel::Two => self.is_two(hand, fingers),
            GestureLabel::Ok => self.is_ok(hand, fingers),
            GestureLabel::Three => is_three(fingers),
            GestureLabel::Four => is_four(fingers),
        }
    }

    // Peace sign: index and middle point together, pinky folds back against
    // them. Independent of how the hand is rotated.
    fn is_two(&self, hand: &HandLandmarks, fingers: &FingerStates) -> bool {
        let (Some(index), Some(middle), Some(pinky)) = (
            finger_direction(hand, Finger::Index),
            finger_direction(hand, Finger::Middle),
            finger_direction(hand, Finger::Pinky),
        ) else {
            return false;
        };

        if self.config.two_requires_bent_ring && fingers.ring {
            return false;
        }

        index.dot(middle) > self.config.two_parallel_min
            && middle.dot(pinky) < self.config.two_antiparallel_max
    }

    fn is_ok(&self, hand: &HandLandmarks, fingers: &FingerStates) -> bool {
        let gap = distance(hand.point(joint::INDEX_TIP), hand.point(joint::THUMB_TIP));
        gap < self.config.ok_tip_distance
            && !fingers.index
            && fingers.middle
            && fingers.ring
            && fingers.pinky
    }
}

fn is_three(fingers: &FingerStates) -> bool {
    fingers.index && fingers.middle && fingers.ring && !fingers.thumb && !fingers.pinky
}

fn is_four(fingers: &FingerStates) -> bool {
    fingers.index && fingers.middle && fingers.ring && fingers.pinky && !fingers.thumb
}

/// Straightness of every finger, computed once per frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FingerStates {
    thumb: bool,
    index: bool,
    middle: bool,
    ring: bool,
    pinky: bool,
}

impl FingerStates {
    fn measure(hand: &HandLandmarks, threshold: f32) -> Self {
        let [thumb, index, middle, ring, pinky] =
            Finger::ALL.map(|finger| is_finger_straight(hand, finger, threshold));
        Self {
            thumb,
            index,
            middle,
            ring,
            pinky,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Pose, hand, scaled_about_wrist, shifted};
    use crate::types::{NUM_LANDMARKS, Point2D};

    fn classifier() -> GestureClassifier {
        GestureClassifier::new(ClassifierConfig::default())
    }

    #[test]
    fn classifies_each_pose() {
        let c = classifier();
        assert_eq!(c.classify(&hand(Pose::Two)), Some(GestureLabel::Two));
        assert_eq!(c.classify(&hand(Pose::Ok)), Some(GestureLabel::Ok));
        assert_eq!(c.classify(&hand(Pose::Three)), Some(GestureLabel::Three));
        assert_eq!(c.classify(&hand(Pose::Four)), Some(GestureLabel::Four));
    }

    #[test]
    fn fist_and_open_palm_are_not_gestures() {
        let c = classifier();
        assert_eq!(c.classify(&hand(Pose::Fist)), None);
        assert_eq!(c.classify(&hand(Pose::OpenPalm)), None);
    }

    #[test]
    fn classification_is_deterministic() {
        let c = classifier();
        let pose = hand(Pose::Ok);
        let first = c.classify(&pose);
        for _ in 0..10 {
            assert_eq!(c.classify(&pose), first);
        }
    }

    #[test]
    fn classification_ignores_position_and_scale() {
        let c = classifier();
        let moved = shifted(&hand(Pose::Two), 0.2, -0.1);
        assert_eq!(c.classify(&moved), Some(GestureLabel::Two));
        let far = scaled_about_wrist(&hand(Pose::Four), 0.6);
        assert_eq!(c.classify(&far), Some(GestureLabel::Four));
    }

    #[test]
    fn two_survives_rotation() {
        let c = classifier();
        let upright = hand(Pose::Two);
        let wrist = upright.point(joint::WRIST);
        let (sin, cos) = 0.5f32.sin_cos();
        let mut points = *upright.points();
        for p in points.iter_mut() {
            let (dx, dy) = (p.x - wrist.x, p.y - wrist.y);
            *p = Point2D::new(wrist.x + dx * cos - dy * sin, wrist.y + dx * sin + dy * cos);
        }
        assert_eq!(c.classify(&HandLandmarks::new(points)), Some(GestureLabel::Two));
    }

    #[test]
    fn disabled_labels_are_never_reported() {
        let c = GestureClassifier::new(ClassifierConfig {
            priority: vec![GestureLabel::Two, GestureLabel::Four],
            ..ClassifierConfig::default()
        });
        assert_eq!(c.classify(&hand(Pose::Three)), None);
        assert_eq!(c.classify(&hand(Pose::Ok)), None);
        assert_eq!(c.classify(&hand(Pose::Four)), Some(GestureLabel::Four));
    }

    #[test]
    fn priority_decides_overlapping_matches() {
        // Without the bent-ring requirement a three-finger pose also reads as two.
        let loose = ClassifierConfig {
            two_requires_bent_ring: false,
            ..ClassifierConfig::default()
        };
        let two_first = GestureClassifier::new(loose.clone());
        assert_eq!(two_first.classify(&hand(Pose::Three)), Some(GestureLabel::Two));

        let three_first = GestureClassifier::new(ClassifierConfig {
            priority: vec![GestureLabel::Three, GestureLabel::Two],
            ..loose
        });
        assert_eq!(three_first.classify(&hand(Pose::Three)), Some(GestureLabel::Three));
    }

    #[test]
    fn collapsed_hand_is_not_a_gesture() {
        let points = [Point2D::new(0.5, 0.5); NUM_LANDMARKS];
        assert_eq!(classifier().classify(&HandLandmarks::new(points)), None);
    }
}
