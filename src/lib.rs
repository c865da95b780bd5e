pub mod capture;
pub mod detection_loop;
pub mod emotion;
pub mod error;
pub mod face_api;
pub mod overlay;
pub mod preview;
pub mod settings;

pub use capture::{jpeg_to_mat, CameraSource, Frame, FrameSource, LatestFrame, SnapshotSource};
pub use detection_loop::{Command, DetectionLoop, LoopSettings, LoopState, UiUpdate};
pub use emotion::EmotionScores;
pub use error::{CaptureError, DetectionError, ErrorWrapper};
pub use face_api::{DetectedFace, FaceApiClient, FaceDetector, FaceRectangle};
pub use overlay::{CanvasScale, Overlay, OverlayElement};
pub use preview::PreviewWindow;
