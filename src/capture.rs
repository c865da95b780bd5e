use crate::error::CaptureError;
use log::info;
use opencv::core::{Mat, Size, Vector};
use opencv::prelude::*;
use opencv::{imgcodecs, imgproc, videoio};
use std::sync::{Arc, Mutex};

/// One still image from the live feed, encoded as JPEG.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub jpeg: Vec<u8>,
    pub width: i32,
    pub height: i32,
}

impl Frame {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

pub trait FrameSource: Send {
    fn capture(&mut self) -> Result<Frame, CaptureError>;
}

/// Most recent preview image, written by the preview window and read by the
/// capture side.
#[derive(Clone, Default)]
pub struct LatestFrame {
    slot: Arc<Mutex<Option<Mat>>>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: &Mat) -> Result<(), CaptureError> {
        let mut slot = self.slot.lock().map_err(|_| CaptureError::Poisoned)?;
        match slot.as_mut() {
            // reuse the buffer when the camera keeps its resolution
            Some(latest) => frame.copy_to(latest)?,
            None => *slot = Some(frame.clone()),
        }
        Ok(())
    }

    /// Forget the published image, so captures fail until the next publish.
    pub fn invalidate(&self) -> Result<(), CaptureError> {
        let mut slot = self.slot.lock().map_err(|_| CaptureError::Poisoned)?;
        *slot = None;
        Ok(())
    }

    fn resized(&self, size: Size) -> Result<Mat, CaptureError> {
        let slot = self.slot.lock().map_err(|_| CaptureError::Poisoned)?;
        let latest = slot.as_ref().ok_or(CaptureError::NoFrame)?;
        if latest.empty() {
            return Err(CaptureError::NoFrame);
        }
        let mut resized = Mat::default();
        imgproc::resize(latest, &mut resized, size, 0., 0., imgproc::INTER_AREA)?;
        Ok(resized)
    }
}

/// Snapshots the latest preview image into a JPEG of a fixed size.
pub struct SnapshotSource {
    latest: LatestFrame,
    size: Size,
    jpeg_quality: i32,
}

impl SnapshotSource {
    pub fn new(latest: LatestFrame, width: i32, height: i32, jpeg_quality: i32) -> Self {
        Self {
            latest,
            size: Size::new(width, height),
            jpeg_quality,
        }
    }
}

impl FrameSource for SnapshotSource {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        let image = self.latest.resized(self.size)?;
        let jpeg = encode_jpeg(&image, self.jpeg_quality)?;
        Ok(Frame {
            jpeg,
            width: self.size.width,
            height: self.size.height,
        })
    }
}

pub fn encode_jpeg(image: &Mat, quality: i32) -> Result<Vec<u8>, CaptureError> {
    let mut buffer: Vector<u8> = Default::default();
    let params: Vector<i32> = Vector::from_slice(&[imgcodecs::IMWRITE_JPEG_QUALITY, quality]);
    if !imgcodecs::imencode(".jpg", image, &mut buffer, &params)? {
        return Err(CaptureError::Encode);
    }
    Ok(buffer.to_vec())
}

pub fn jpeg_to_mat(data: &[u8]) -> Result<Mat, CaptureError> {
    let buffer = Vector::from_slice(data);
    let image = imgcodecs::imdecode(&buffer, imgcodecs::IMREAD_COLOR)?;
    if image.empty() {
        return Err(CaptureError::NoFrame);
    }
    Ok(image)
}

/// Wraps JPEG bytes from elsewhere (a file on disk) as a frame.
pub fn frame_from_jpeg(data: Vec<u8>) -> Result<(Frame, Mat), CaptureError> {
    let image = jpeg_to_mat(&data)?;
    let frame = Frame {
        jpeg: data,
        width: image.cols(),
        height: image.rows(),
    };
    Ok((frame, image))
}

pub struct CameraSource {
    camera: videoio::VideoCapture,
}

impl CameraSource {
    pub fn new(index: i32) -> Result<Self, CaptureError> {
        let camera = videoio::VideoCapture::new(index, videoio::CAP_ANY)?;
        if !videoio::VideoCapture::is_opened(&camera)? {
            return Err(CaptureError::CameraUnavailable(index));
        }
        info!("Opened camera {}", index);
        Ok(Self { camera })
    }

    /// Next camera frame, or `None` if the camera had nothing to give yet.
    pub fn next_frame(&mut self) -> Result<Option<Mat>, CaptureError> {
        let mut frame = Mat::default();
        self.camera.read(&mut frame)?;
        if frame.size()?.width == 0 {
            return Ok(None);
        }
        Ok(Some(frame))
    }
}
