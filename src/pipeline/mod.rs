pub mod camera;
pub mod capture;
pub mod estimator;
pub mod rgba_converter;
pub mod session;
pub mod skeleton;

// Re-exports for convenience
pub use capture::{OverlayUpdate, Phase, SessionSummary};
pub use session::{CaptureCommand, CaptureWorker, DeviceSessionFactory};
