use crate::types::{Finger, HandLandmarks, Point2D, joint};

pub const DEFAULT_STRAIGHTNESS: f32 = 0.8;

const MIN_SEGMENT_LEN: f32 = 1e-6;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingMetrics {
    pub width: f32,
    pub height: f32,
    pub area: f32,
}

/// True when the mcp->pip and pip->tip segments point the same way, i.e.
/// their cosine similarity reaches `threshold`. Zero-length segments are
/// never straight.
pub fn finger_straightness(mcp: Point2D, pip: Point2D, tip: Point2D, threshold: f32) -> bool {
    let v1 = pip.sub(mcp);
    let v2 = tip.sub(pip);
    let norm1 = v1.length();
    let norm2 = v2.length();

    if !(norm1 > MIN_SEGMENT_LEN && norm2 > MIN_SEGMENT_LEN) {
        return false;
    }

    let cos_sim = v1.dot(v2) / (norm1 * norm2);
    cos_sim >= threshold
}

pub fn is_finger_straight(hand: &HandLandmarks, finger: Finger, threshold: f32) -> bool {
    let (mcp, pip, tip) = finger.chain();
    finger_straightness(hand.point(mcp), hand.point(pip), hand.point(tip), threshold)
}

pub fn distance(a: Point2D, b: Point2D) -> f32 {
    b.sub(a).length()
}

pub fn unit_direction(from: Point2D, to: Point2D) -> Option<Point2D> {
    let v = to.sub(from);
    let len = v.length();
    if len > MIN_SEGMENT_LEN {
        Some(Point2D::new(v.x / len, v.y / len))
    } else {
        None
    }
}

/// Direction the finger points in, from its knuckle to its tip.
pub fn finger_direction(hand: &HandLandmarks, finger: Finger) -> Option<Point2D> {
    let (mcp, _, tip) = finger.chain();
    unit_direction(hand.point(mcp), hand.point(tip))
}

pub fn bounding_metrics(points: &[Point2D]) -> BoundingMetrics {
    if points.is_empty() {
        return BoundingMetrics::default();
    }

    let (min_x, max_x, min_y, max_y) = points
        .iter()
        .fold((f32::MAX, f32::MIN, f32::MAX, f32::MIN), |acc, p| {
            (acc.0.min(p.x), acc.1.max(p.x), acc.2.min(p.y), acc.3.max(p.y))
        });

    let width = max_x - min_x;
    let height = max_y - min_y;
    BoundingMetrics {
        width,
        height,
        area: width * height,
    }
}

pub fn hand_metrics(hand: &HandLandmarks) -> BoundingMetrics {
    bounding_metrics(hand.points())
}

pub fn palm_metrics(hand: &HandLandmarks) -> BoundingMetrics {
    bounding_metrics(hand.palm_points())
}

/// Knuckle-to-knuckle palm width, falling back to the wrist to middle
/// knuckle length when the knuckles coincide.
pub fn palm_width(hand: &HandLandmarks) -> f32 {
    let width = distance(hand.point(joint::INDEX_MCP), hand.point(joint::PINKY_MCP));
    if width > MIN_SEGMENT_LEN {
        width
    } else {
        distance(hand.point(joint::WRIST), hand.point(joint::MIDDLE_MCP))
    }
}

/// The hand closest to the camera, judged by bounding-box area.
pub fn pick_primary_hand(hands: &[HandLandmarks]) -> Option<&HandLandmarks> {
    hands.iter().max_by(|a, b| {
        hand_metrics(a)
            .area
            .partial_cmp(&hand_metrics(b).area)
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Pose, hand, scaled_about_wrist};

    #[test]
    fn collinear_segments_are_straight() {
        let mcp = Point2D::new(0.5, 0.6);
        let pip = Point2D::new(0.5, 0.5);
        let tip = Point2D::new(0.5, 0.3);
        assert!(finger_straightness(mcp, pip, tip, DEFAULT_STRAIGHTNESS));
    }

    #[test]
    fn folded_segments_are_not_straight() {
        let mcp = Point2D::new(0.5, 0.6);
        let pip = Point2D::new(0.5, 0.5);
        let tip = Point2D::new(0.5, 0.62);
        assert!(!finger_straightness(mcp, pip, tip, DEFAULT_STRAIGHTNESS));
    }

    #[test]
    fn zero_length_segments_are_not_straight() {
        let p = Point2D::new(0.4, 0.4);
        let q = Point2D::new(0.4, 0.2);
        assert!(!finger_straightness(p, p, q, 0.0));
        assert!(!finger_straightness(q, p, p, 0.0));
        assert!(!finger_straightness(p, p, p, -1.0));
    }

    #[test]
    fn non_finite_points_are_not_straight() {
        let nan = Point2D::new(f32::NAN, 0.1);
        let p = Point2D::new(0.4, 0.4);
        assert!(!finger_straightness(nan, p, Point2D::new(0.4, 0.1), 0.0));
    }

    #[test]
    fn bounding_metrics_of_subset() {
        let points = [
            Point2D::new(0.1, 0.2),
            Point2D::new(0.4, 0.3),
            Point2D::new(0.2, 0.6),
        ];
        let metrics = bounding_metrics(&points);
        assert!((metrics.width - 0.3).abs() < 1e-6);
        assert!((metrics.height - 0.4).abs() < 1e-6);
        assert!((metrics.area - 0.12).abs() < 1e-6);
        assert_eq!(bounding_metrics(&[]), BoundingMetrics::default());
    }

    #[test]
    fn palm_metrics_cover_first_five_points_only() {
        let open = hand(Pose::Four);
        let palm = palm_metrics(&open);
        let whole = hand_metrics(&open);
        assert!(palm.area < whole.area);
    }

    #[test]
    fn primary_hand_is_the_largest() {
        let far = scaled_about_wrist(&hand(Pose::Four), 0.5);
        let near = hand(Pose::Two);
        let hands = [far, near];
        assert_eq!(pick_primary_hand(&hands), Some(&near));
        assert!(pick_primary_hand(&[]).is_none());
    }

    #[test]
    fn palm_width_falls_back_when_knuckles_coincide() {
        let mut points = *hand(Pose::Four).points();
        points[joint::PINKY_MCP] = points[joint::INDEX_MCP];
        let squashed = HandLandmarks::new(points);
        let expected = distance(points[joint::WRIST], points[joint::MIDDLE_MCP]);
        assert!((palm_width(&squashed) - expected).abs() < 1e-6);
    }
}
