mod common;
mod ort;

use crate::{
    config::ModelConfig,
    error::SessionError,
    model_download::ensure_pose_model_ready,
    types::{Frame, Pose},
};

pub use self::ort::OrtPoseEstimator;

/// Produces the poses visible in one frame. Every call runs full inference;
/// nothing is cached between frames.
pub trait PoseEstimator: Send + 'static {
    fn estimate(&mut self, frame: &Frame) -> anyhow::Result<Vec<Pose>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelVariant {
    PoseLandmarkFull,
}

impl ModelVariant {
    pub fn label(&self) -> &'static str {
        match self {
            ModelVariant::PoseLandmarkFull => "blazepose-landmark-full",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    OrtCpu,
}

impl Backend {
    pub fn label(&self) -> &'static str {
        match self {
            Backend::OrtCpu => "ort-cpu",
        }
    }
}

/// Loads the pose model with its fixed variant and backend.
#[derive(Clone, Debug)]
pub struct PoseSource {
    model: ModelConfig,
    variant: ModelVariant,
    backend: Backend,
}

impl PoseSource {
    pub fn new(model: ModelConfig) -> Self {
        Self {
            model,
            variant: ModelVariant::PoseLandmarkFull,
            backend: Backend::OrtCpu,
        }
    }

    pub fn load(&self) -> Result<OrtPoseEstimator, SessionError> {
        log::info!(
            "loading pose model {} on {} from {}",
            self.variant.label(),
            self.backend.label(),
            self.model.path.display()
        );

        ensure_pose_model_ready(&self.model.path, &self.model.url, |_evt| {})
            .map_err(SessionError::model_unavailable)?;

        let estimator = OrtPoseEstimator::new(&self.model.path, self.model.pose_threshold)
            .map_err(SessionError::model_load)?;
        log::info!("pose model ready");
        Ok(estimator)
    }
}
