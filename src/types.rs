use std::time::Instant;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// Number of landmarks in the BlazePose body layout.
pub const NUM_KEYPOINTS: usize = 33;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

/// A single body landmark in frame pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, score: f32) -> Self {
        Self { x, y, score }
    }
}

/// One detected subject. Index meaning is fixed by the BlazePose layout:
/// face 0-10, arms 11-22, hips 23/24, legs 25-32.
#[derive(Clone, Debug, PartialEq)]
pub struct Pose {
    pub keypoints: [Keypoint; NUM_KEYPOINTS],
}

impl Pose {
    pub fn from_keypoints(keypoints: Vec<Keypoint>) -> Result<Self> {
        let len = keypoints.len();
        let keypoints: [Keypoint; NUM_KEYPOINTS] = keypoints.try_into().map_err(|_| {
            anyhow!("pose needs exactly {NUM_KEYPOINTS} keypoints, got {len}")
        })?;
        Ok(Self { keypoints })
    }

    pub fn confident_keypoints(&self, threshold: f32) -> usize {
        self.keypoints
            .iter()
            .filter(|kp| kp.score > threshold)
            .count()
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            keypoints: [Keypoint::default(); NUM_KEYPOINTS],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    Environment,
}

impl FacingMode {
    pub fn label(&self) -> &'static str {
        match self {
            FacingMode::User => "front camera",
            FacingMode::Environment => "rear camera",
        }
    }
}

/// Snapshot of the overlay raster handed to the UI.
#[derive(Clone, Debug)]
pub struct OverlayImage {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}
