use crate::face_api::DetectedFace;
use opencv::core::{Mat, Point, Rect, Scalar, Size};
use opencv::imgproc;

pub const STROKE_WIDTH: i32 = 2;
pub const LABEL_FONT_SIZE: i32 = 30;
/// Gap between the bottom of a face rectangle and its label.
pub const LABEL_OFFSET: i32 = 2;

// hershey simplex cap height is about 22px at scale 1.0
const HERSHEY_PX_PER_SCALE: f64 = 22.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const YELLOW: Color = Color {
        r: 255,
        g: 255,
        b: 0,
    };

    fn to_scalar(self) -> Scalar {
        // OpenCV images are BGR
        Scalar::new(self.b as f64, self.g as f64, self.r as f64, 0.)
    }
}

/// Maps frame pixel coordinates onto the canvas the overlay is drawn on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasScale {
    pub x: f64,
    pub y: f64,
}

impl CanvasScale {
    pub const IDENTITY: CanvasScale = CanvasScale { x: 1., y: 1. };

    pub fn between(frame: Size, canvas: Size) -> Self {
        if frame.width <= 0 || frame.height <= 0 || canvas.width <= 0 || canvas.height <= 0 {
            return Self::IDENTITY;
        }
        Self {
            x: canvas.width as f64 / frame.width as f64,
            y: canvas.height as f64 / frame.height as f64,
        }
    }

    fn x(&self, value: i32) -> i32 {
        (value as f64 * self.x).round() as i32
    }

    fn y(&self, value: i32) -> i32 {
        (value as f64 * self.y).round() as i32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayElement {
    Rectangle {
        bounds: Rect,
        stroke: Color,
        stroke_width: i32,
    },
    Label {
        text: String,
        /// Top-left corner of the text.
        origin: Point,
        font_size: i32,
        color: Color,
    },
}

/// Annotations drawn over the preview. Only touched from the window thread.
#[derive(Debug, Default)]
pub struct Overlay {
    elements: Vec<OverlayElement>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elements(&self) -> &[OverlayElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Replace everything with one rectangle and one label per face.
    pub fn render(&mut self, faces: &[DetectedFace], scale: CanvasScale) {
        self.clear();
        for face in faces {
            let rect = face.rectangle;
            let bounds = Rect::new(
                scale.x(rect.left),
                scale.y(rect.top),
                scale.x(rect.width),
                scale.y(rect.height),
            );
            self.elements.push(OverlayElement::Rectangle {
                bounds,
                stroke: Color::YELLOW,
                stroke_width: STROKE_WIDTH,
            });
            self.elements.push(OverlayElement::Label {
                text: face.emotions.label(),
                origin: Point::new(bounds.x, bounds.y + bounds.height + LABEL_OFFSET),
                font_size: LABEL_FONT_SIZE,
                color: Color::YELLOW,
            });
        }
    }
}

/// Draw the overlay onto an image.
pub fn paint(overlay: &Overlay, image: &mut Mat) -> opencv::Result<()> {
    for element in overlay.elements() {
        match element {
            OverlayElement::Rectangle {
                bounds,
                stroke,
                stroke_width,
            } => {
                imgproc::rectangle(
                    image,
                    *bounds,
                    stroke.to_scalar(),
                    *stroke_width,
                    imgproc::LINE_8,
                    0,
                )?;
            }
            OverlayElement::Label {
                text,
                origin,
                font_size,
                color,
            } => {
                put_label(image, text, *origin, *font_size, *color)?;
            }
        }
    }
    Ok(())
}

/// Text with its top-left corner at `origin`.
pub fn put_label(
    image: &mut Mat,
    text: &str,
    origin: Point,
    font_size: i32,
    color: Color,
) -> opencv::Result<()> {
    let font_scale = font_size as f64 / HERSHEY_PX_PER_SCALE;
    // put_text anchors at the baseline
    let baseline_origin = Point::new(origin.x, origin.y + font_size);
    imgproc::put_text(
        image,
        text,
        baseline_origin,
        imgproc::FONT_HERSHEY_SIMPLEX,
        font_scale,
        color.to_scalar(),
        STROKE_WIDTH,
        imgproc::LINE_8,
        false,
    )
}
