use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no preview frame available")]
    NoFrame,
    #[error("camera {0} could not be opened")]
    CameraUnavailable(i32),
    #[error("preview frame slot poisoned")]
    Poisoned,
    #[error("failed to encode frame as jpeg")]
    Encode,
    #[error("OpenCV error {0:?}")]
    OpenCv(#[from] opencv::Error),
}

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("service returned {status}: {code} {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },
    #[error("malformed response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ErrorWrapper {
    #[error("capture error {0}")]
    Capture(#[from] CaptureError),
    #[error("OpenCV error {0:?}")]
    OpenCv(#[from] opencv::Error),
}
