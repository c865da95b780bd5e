use clap::Parser;
use face_emotions::settings::{CaptureArgs, FaceApiArgs, LoopArgs};
use face_emotions::{CameraSource, DetectionLoop, LatestFrame, PreviewWindow, SnapshotSource};
use log::info;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(about = "Live camera preview annotated with detected emotions")]
struct Args {
    #[command(flatten)]
    api: FaceApiArgs,

    #[command(flatten)]
    capture: CaptureArgs,

    #[command(flatten)]
    detection: LoopArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: Args = Args::parse();

    let client = args.api.client()?;
    info!("Using detect endpoint {}", client.detect_url());

    let camera = CameraSource::new(args.capture.camera)?;
    let latest = LatestFrame::new();
    let source = SnapshotSource::new(
        latest.clone(),
        args.capture.width,
        args.capture.height,
        args.capture.jpeg_quality,
    );

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (update_tx, update_rx) = mpsc::unbounded_channel();

    let detection = DetectionLoop::new(source, client, args.detection.settings(&args.api));
    let detection_task = tokio::spawn(detection.run(command_rx, update_tx));

    // window and camera stay on this thread
    let window = PreviewWindow::new("emotions", camera, latest)?;
    tokio::task::block_in_place(|| window.run(command_tx, update_rx))?;

    detection_task.await?;
    Ok(())
}
