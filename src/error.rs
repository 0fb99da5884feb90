use std::time::Duration;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures that abort a capture session before it starts capturing.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no camera device available")]
    NoCamera,
    #[error("failed to open camera")]
    CameraOpen(#[source] BoxError),
    #[error("camera delivered no frame within {0:?}")]
    CameraNotReady(Duration),
    #[error("pose model is not available")]
    ModelUnavailable(#[source] BoxError),
    #[error("failed to load pose model")]
    ModelLoad(#[source] BoxError),
}

impl SessionError {
    pub fn camera_open(err: impl Into<BoxError>) -> Self {
        SessionError::CameraOpen(err.into())
    }

    pub fn model_unavailable(err: impl Into<BoxError>) -> Self {
        SessionError::ModelUnavailable(err.into())
    }

    pub fn model_load(err: impl Into<BoxError>) -> Self {
        SessionError::ModelLoad(err.into())
    }

    /// Message with the full source chain, for display in the UI.
    pub fn chain_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            message.push_str(": ");
            message.push_str(&err.to_string());
            source = err.source();
        }
        message
    }
}
