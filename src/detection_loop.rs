use crate::capture::{Frame, FrameSource};
use crate::error::{CaptureError, DetectionError};
use crate::face_api::{DetectedFace, FaceDetector};
use log::{debug, info, warn};
use opencv::core::Size;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep_until, timeout, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Idle,
    Detecting,
}

impl LoopState {
    pub fn toggled(self) -> Self {
        match self {
            LoopState::Idle => LoopState::Detecting,
            LoopState::Detecting => LoopState::Idle,
        }
    }

    /// Text on the toggle button while in this state.
    pub fn button_label(self) -> &'static str {
        match self {
            LoopState::Idle => "START",
            LoopState::Detecting => "STOP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Toggle,
    Shutdown,
}

/// Messages for the window thread, which owns the overlay.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    State(LoopState),
    Faces {
        faces: Vec<DetectedFace>,
        frame_size: Size,
    },
    Clear,
    Failure(String),
}

#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    /// Minimum time between the start of two iterations.
    pub interval: Duration,
    pub request_timeout: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            request_timeout: Duration::from_secs(10),
        }
    }
}

enum IterationError {
    Capture(CaptureError),
    Detection(DetectionError),
}

/// Capture, detect, hand the faces to the window. Repeats while detecting.
pub struct DetectionLoop<S, D> {
    source: S,
    detector: D,
    settings: LoopSettings,
}

impl<S: FrameSource, D: FaceDetector> DetectionLoop<S, D> {
    pub fn new(source: S, detector: D, settings: LoopSettings) -> Self {
        Self {
            source,
            detector,
            settings,
        }
    }

    /// Runs until `Command::Shutdown` or until every command sender is gone.
    pub async fn run(
        self,
        mut commands: UnboundedReceiver<Command>,
        updates: UnboundedSender<UiUpdate>,
    ) {
        let Self {
            mut source,
            detector,
            settings,
        } = self;
        let mut state = LoopState::Idle;
        let mut next_iteration = Instant::now();

        loop {
            match state {
                LoopState::Idle => match commands.recv().await {
                    Some(Command::Toggle) => {
                        state = transition(state, &updates);
                        next_iteration = Instant::now();
                    }
                    Some(Command::Shutdown) | None => break,
                },
                LoopState::Detecting => {
                    tokio::select! {
                        biased;
                        command = commands.recv() => match command {
                            Some(Command::Toggle) => state = transition(state, &updates),
                            Some(Command::Shutdown) | None => {
                                transition(state, &updates);
                                break;
                            }
                        },
                        outcome = iterate(&mut source, &detector, &settings, next_iteration) => {
                            next_iteration = (next_iteration + settings.interval).max(Instant::now());
                            report(outcome, &updates);
                        }
                    }
                }
            }
        }
        info!("Detection loop stopped");
    }
}

fn transition(state: LoopState, updates: &UnboundedSender<UiUpdate>) -> LoopState {
    let next = state.toggled();
    info!("Detection {:?} -> {:?}", state, next);
    if next == LoopState::Idle {
        send(updates, UiUpdate::Clear);
    }
    send(updates, UiUpdate::State(next));
    next
}

async fn iterate<S: FrameSource, D: FaceDetector>(
    source: &mut S,
    detector: &D,
    settings: &LoopSettings,
    start_at: Instant,
) -> Result<(Vec<DetectedFace>, Size), IterationError> {
    sleep_until(start_at).await;
    let frame: Frame = source.capture().map_err(IterationError::Capture)?;
    let faces = match timeout(settings.request_timeout, detector.detect(&frame)).await {
        Ok(result) => result.map_err(IterationError::Detection)?,
        Err(_) => {
            return Err(IterationError::Detection(DetectionError::Timeout(
                settings.request_timeout,
            )))
        }
    };
    Ok((faces, frame.size()))
}

fn report(
    outcome: Result<(Vec<DetectedFace>, Size), IterationError>,
    updates: &UnboundedSender<UiUpdate>,
) {
    match outcome {
        Ok((faces, frame_size)) => {
            debug!("Detected {} faces", faces.len());
            send(updates, UiUpdate::Faces { faces, frame_size });
        }
        Err(IterationError::Capture(err)) => {
            debug!("Skipping iteration: {}", err);
        }
        Err(IterationError::Detection(err)) => {
            warn!("Detection failed: {}", err);
            send(updates, UiUpdate::Failure(err.to_string()));
        }
    }
}

fn send(updates: &UnboundedSender<UiUpdate>, update: UiUpdate) {
    // window already gone during shutdown
    if updates.send(update).is_err() {
        debug!("UI update channel closed");
    }
}
