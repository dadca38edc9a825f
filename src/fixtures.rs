//! Synthetic upright right hands for unit tests.

use crate::types::{Finger, HandLandmarks, NUM_LANDMARKS, Point2D, joint};

#[derive(Clone, Copy, Debug)]
pub enum Pose {
    Two,
    Ok,
    Three,
    Four,
    Fist,
    OpenPalm,
}

const WRIST: Point2D = Point2D::new(0.5, 0.85);
const KNUCKLE_Y: f32 = 0.6;

pub fn hand(pose: Pose) -> HandLandmarks {
    let mut points = [Point2D::default(); NUM_LANDMARKS];
    points[joint::WRIST] = WRIST;

    let (index, middle, ring, pinky, thumb) = match pose {
        Pose::Two => (true, true, false, false, false),
        Pose::Ok => (false, true, true, true, false),
        Pose::Three => (true, true, true, false, false),
        Pose::Four => (true, true, true, true, false),
        Pose::Fist => (false, false, false, false, false),
        Pose::OpenPalm => (true, true, true, true, true),
    };

    set_finger(&mut points, Finger::Index, 0.42, index);
    set_finger(&mut points, Finger::Middle, 0.50, middle);
    set_finger(&mut points, Finger::Ring, 0.58, ring);
    set_finger(&mut points, Finger::Pinky, 0.66, pinky);
    set_thumb(&mut points, thumb);

    if matches!(pose, Pose::Ok) {
        // Index curls over to meet the thumb tip.
        points[joint::INDEX_PIP] = Point2D::new(0.40, 0.50);
        points[joint::INDEX_DIP] = Point2D::new(0.37, 0.54);
        points[joint::INDEX_TIP] = Point2D::new(0.36, 0.58);
        points[joint::THUMB_IP] = Point2D::new(0.35, 0.64);
        points[joint::THUMB_TIP] = Point2D::new(0.37, 0.60);
    }

    HandLandmarks::new(points)
}

/// Lays the finger's joints out along the column `x`.
fn set_finger(points: &mut [Point2D; NUM_LANDMARKS], finger: Finger, x: f32, straight: bool) {
    let heights = if straight {
        [KNUCKLE_Y, 0.50, 0.43, 0.36]
    } else {
        [KNUCKLE_Y, 0.52, 0.56, 0.62]
    };
    for (joint, y) in finger.joints().into_iter().zip(heights) {
        points[joint] = Point2D::new(x, y);
    }
}

fn set_thumb(points: &mut [Point2D; NUM_LANDMARKS], straight: bool) {
    points[joint::THUMB_CMC] = Point2D::new(0.40, 0.78);
    points[joint::THUMB_MCP] = Point2D::new(0.34, 0.70);
    if straight {
        points[joint::THUMB_IP] = Point2D::new(0.31, 0.66);
        points[joint::THUMB_TIP] = Point2D::new(0.28, 0.62);
    } else {
        points[joint::THUMB_IP] = Point2D::new(0.38, 0.64);
        points[joint::THUMB_TIP] = Point2D::new(0.43, 0.62);
    }
}

pub fn shifted(hand: &HandLandmarks, dx: f32, dy: f32) -> HandLandmarks {
    let mut points = *hand.points();
    for p in points.iter_mut() {
        p.x += dx;
        p.y += dy;
    }
    HandLandmarks::new(points)
}

pub fn scaled_about_wrist(hand: &HandLandmarks, factor: f32) -> HandLandmarks {
    let wrist = hand.point(joint::WRIST);
    let mut points = *hand.points();
    for p in points.iter_mut() {
        p.x = wrist.x + (p.x - wrist.x) * factor;
        p.y = wrist.y + (p.y - wrist.y) * factor;
    }
    HandLandmarks::new(points)
}
