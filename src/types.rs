use std::time::Instant;

use serde::{Deserialize, Serialize};

pub const NUM_LANDMARKS: usize = 21;

/// Landmark indices in the MediaPipe hand topology.
pub mod joint {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_DIP: usize = 7;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_DIP: usize = 11;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP: usize = 13;
    pub const RING_PIP: usize = 14;
    pub const RING_DIP: usize = 15;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn sub(self, other: Point2D) -> Point2D {
        Point2D::new(self.x - other.x, self.y - other.y)
    }

    pub fn dot(self, other: Point2D) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Maps a normalized point onto a `width` x `height` pixel grid.
    pub fn scaled(self, width: f32, height: f32) -> Point2D {
        Point2D::new(self.x * width, self.y * height)
    }
}

/// One hand as 21 normalized image-space points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandLandmarks {
    points: [Point2D; NUM_LANDMARKS],
}

impl HandLandmarks {
    pub fn new(points: [Point2D; NUM_LANDMARKS]) -> Self {
        Self { points }
    }

    /// Takes the first 21 points; shorter inputs are rejected.
    pub fn from_points(points: &[Point2D]) -> Option<Self> {
        let points: [Point2D; NUM_LANDMARKS] = points.get(..NUM_LANDMARKS)?.try_into().ok()?;
        Some(Self { points })
    }

    pub fn point(&self, index: usize) -> Point2D {
        self.points[index]
    }

    pub fn points(&self) -> &[Point2D; NUM_LANDMARKS] {
        &self.points
    }

    /// Wrist plus the thumb chain, the subset used for palm-only metrics.
    pub fn palm_points(&self) -> &[Point2D] {
        &self.points[..5]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    /// All four landmark indices, knuckle to tip.
    pub fn joints(&self) -> [usize; 4] {
        use joint::*;
        match self {
            Finger::Thumb => [THUMB_CMC, THUMB_MCP, THUMB_IP, THUMB_TIP],
            Finger::Index => [INDEX_MCP, INDEX_PIP, INDEX_DIP, INDEX_TIP],
            Finger::Middle => [MIDDLE_MCP, MIDDLE_PIP, MIDDLE_DIP, MIDDLE_TIP],
            Finger::Ring => [RING_MCP, RING_PIP, RING_DIP, RING_TIP],
            Finger::Pinky => [PINKY_MCP, PINKY_PIP, PINKY_DIP, PINKY_TIP],
        }
    }

    /// `(mcp, pip, tip)` landmark indices fed to the straightness check.
    pub fn chain(&self) -> (usize, usize, usize) {
        let [mcp, pip, _, tip] = self.joints();
        (mcp, pip, tip)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GestureLabel {
    Two,
    Ok,
    Three,
    Four,
}

impl GestureLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GestureLabel::Two => "two",
            GestureLabel::Ok => "ok",
            GestureLabel::Three => "three",
            GestureLabel::Four => "four",
        }
    }
}

impl std::fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwipeDirection {
    Left,
    Right,
}

impl SwipeDirection {
    pub fn label(&self) -> &'static str {
        match self {
            SwipeDirection::Left => "left",
            SwipeDirection::Right => "right",
        }
    }
}

/// What the detector saw in one frame, handed to the control loop.
#[derive(Clone, Debug)]
pub struct HandObservation {
    pub hand: Option<HandLandmarks>,
    pub frame_width: u32,
    pub frame_height: u32,
    pub timestamp: Instant,
}
