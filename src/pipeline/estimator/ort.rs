use std::path::Path;

use anyhow::{Context, Result};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{PoseEstimator, common};
use crate::types::{Frame, Pose};

pub struct OrtPoseEstimator {
    session: Session,
    pose_threshold: f32,
}

impl OrtPoseEstimator {
    pub fn new(model_path: &Path, pose_threshold: f32) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;

        Ok(Self {
            session,
            pose_threshold,
        })
    }
}

impl PoseEstimator for OrtPoseEstimator {
    fn estimate(&mut self, frame: &Frame) -> Result<Vec<Pose>> {
        let (input, letterbox) = common::prepare_frame(frame, common::INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;

        let mut tensors = Vec::with_capacity(outputs.len());
        for idx in 0..outputs.len() {
            if let Ok(array) = outputs[idx].try_extract_array::<f32>() {
                tensors.push(array.iter().copied().collect::<Vec<f32>>());
            }
        }

        common::select_pose(&tensors, self.pose_threshold, &letterbox)
    }
}
