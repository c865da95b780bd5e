use crate::capture::{CameraSource, LatestFrame};
use crate::detection_loop::{Command, LoopState, UiUpdate};
use crate::error::ErrorWrapper;
use crate::overlay::{self, CanvasScale, Color, Overlay};
use log::{info, warn};
use opencv::core::{Mat, Point, Rect, Scalar, Size};
use opencv::prelude::*;
use opencv::{highgui, imgproc};
use tokio::sync::mpsc::{error::TryRecvError, UnboundedReceiver, UnboundedSender};

const KEY_SPACE: i32 = 32;
const KEY_ESCAPE: i32 = 27;
const KEY_Q: i32 = 'q' as i32;

const BUTTON: Rect = Rect {
    x: 10,
    y: 10,
    width: 120,
    height: 44,
};
const STATUS_FONT_SIZE: i32 = 18;
const STALL_WAIT_MS: i32 = 50;

/// START/STOP button drawn in the corner of the preview.
#[derive(Debug, Clone, Copy)]
pub struct ToggleButton {
    bounds: Rect,
}

impl ToggleButton {
    pub fn new(bounds: Rect) -> Self {
        Self { bounds }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.bounds.contains(Point::new(x, y))
    }

    fn draw(&self, image: &mut Mat, state: LoopState) -> opencv::Result<()> {
        let fill = match state {
            LoopState::Idle => Scalar::new(60., 140., 60., 0.),
            LoopState::Detecting => Scalar::new(50., 50., 180., 0.),
        };
        imgproc::rectangle(image, self.bounds, fill, imgproc::FILLED, imgproc::LINE_8, 0)?;
        overlay::put_label(
            image,
            state.button_label(),
            Point::new(self.bounds.x + 18, self.bounds.y + 10),
            24,
            Color {
                r: 255,
                g: 255,
                b: 255,
            },
        )
    }
}

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Toggle,
    Quit,
    Nothing,
}

impl KeyAction {
    pub fn command(self) -> Option<Command> {
        match self {
            KeyAction::Toggle => Some(Command::Toggle),
            KeyAction::Quit => Some(Command::Shutdown),
            KeyAction::Nothing => None,
        }
    }
}

pub fn key_action(key: i32) -> KeyAction {
    match key & 0xFF {
        _ if key < 0 => KeyAction::Nothing,
        KEY_SPACE => KeyAction::Toggle,
        KEY_ESCAPE | KEY_Q => KeyAction::Quit,
        _ => KeyAction::Nothing,
    }
}

/// Window-side state. Everything drawn on screen lives here and is only
/// changed by `apply`.
pub struct PreviewState {
    pub loop_state: LoopState,
    pub overlay: Overlay,
    pub last_failure: Option<String>,
}

impl PreviewState {
    pub fn new() -> Self {
        Self {
            loop_state: LoopState::Idle,
            overlay: Overlay::new(),
            last_failure: None,
        }
    }

    pub fn apply(&mut self, update: UiUpdate, canvas: Size) {
        match update {
            UiUpdate::State(state) => {
                self.loop_state = state;
                self.last_failure = None;
            }
            UiUpdate::Faces { faces, frame_size } => {
                self.overlay
                    .render(&faces, CanvasScale::between(frame_size, canvas));
                self.last_failure = None;
            }
            UiUpdate::Clear => self.overlay.clear(),
            UiUpdate::Failure(message) => self.last_failure = Some(message),
        }
    }

    /// Applies every pending update. Returns `false` once the detection loop
    /// has hung up.
    pub fn drain(&mut self, updates: &mut UnboundedReceiver<UiUpdate>, canvas: Size) -> bool {
        loop {
            match updates.try_recv() {
                Ok(update) => self.apply(update, canvas),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }
}

impl Default for PreviewState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PreviewWindow {
    name: String,
    camera: CameraSource,
    latest: LatestFrame,
    button: ToggleButton,
    canvas: Size,
    state: PreviewState,
}

impl PreviewWindow {
    pub fn new(name: &str, camera: CameraSource, latest: LatestFrame) -> Result<Self, ErrorWrapper> {
        highgui::named_window_def(name)?;
        Ok(Self {
            name: name.to_owned(),
            camera,
            latest,
            button: ToggleButton::new(BUTTON),
            canvas: Size::default(),
            state: PreviewState::new(),
        })
    }

    /// Runs the window on the calling thread until the user quits.
    pub fn run(
        mut self,
        commands: UnboundedSender<Command>,
        mut updates: UnboundedReceiver<UiUpdate>,
    ) -> Result<(), ErrorWrapper> {
        let click_commands = commands.clone();
        let button = self.button;
        highgui::set_mouse_callback(
            &self.name,
            Some(Box::new(move |event, x, y, _flags| {
                if event == highgui::EVENT_LBUTTONDOWN && button.contains(x, y) {
                    let _ = click_commands.send(Command::Toggle);
                }
            })),
        )?;

        loop {
            let frame = self.camera.next_frame()?;
            match &frame {
                Some(frame) => {
                    self.latest.publish(frame)?;
                    self.canvas = frame.size()?;
                }
                // a stalled camera must not keep feeding the last image upstream
                None => self.latest.invalidate()?,
            }

            if !self.state.drain(&mut updates, self.canvas) {
                warn!("Detection loop is gone");
                return Ok(());
            }

            let key = match frame {
                Some(frame) => {
                    self.show(frame)?;
                    highgui::poll_key()?
                }
                // keep input and window events flowing while the camera is stalled
                None => highgui::wait_key(STALL_WAIT_MS)?,
            };

            match key_action(key).command() {
                Some(Command::Shutdown) => break,
                Some(command) => {
                    let _ = commands.send(command);
                }
                None => {}
            }
            if highgui::get_window_property(&self.name, highgui::WND_PROP_VISIBLE)? < 1. {
                break;
            }
        }

        info!("Preview window closed");
        let _ = commands.send(Command::Shutdown);
        highgui::destroy_window(&self.name)?;
        Ok(())
    }

    fn show(&self, mut display: Mat) -> Result<(), ErrorWrapper> {
        overlay::paint(&self.state.overlay, &mut display)?;
        self.button.draw(&mut display, self.state.loop_state)?;
        if let Some(failure) = &self.state.last_failure {
            overlay::put_label(
                &mut display,
                failure,
                Point::new(BUTTON.x, BUTTON.y + BUTTON.height + 8),
                STATUS_FONT_SIZE,
                Color { r: 255, g: 64, b: 64 },
            )?;
        }
        highgui::imshow(&self.name, &display)?;
        Ok(())
    }
}
