use clap::Parser;
use face_emotions::capture::frame_from_jpeg;
use face_emotions::overlay::{self, CanvasScale, Overlay};
use face_emotions::settings::FaceApiArgs;
use face_emotions::FaceDetector;
use log::info;
use opencv::{core::Vector, highgui, imgcodecs};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Detect emotions in a single JPEG image")]
struct Args {
    /// JPEG image to send.
    image: PathBuf,

    /// Write the annotated image here instead of showing it.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only print the labels.
    #[arg(long)]
    no_window: bool,

    #[command(flatten)]
    api: FaceApiArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: Args = Args::parse();

    let client = args.api.client()?;
    let data = std::fs::read(&args.image)?;
    let (frame, mut image) = frame_from_jpeg(data)?;
    info!(
        "Loaded {} ({}x{})",
        args.image.display(),
        frame.width,
        frame.height
    );

    let faces = client.detect(&frame).await?;
    println!("faces: {}", faces.len());
    for face in &faces {
        let rect = face.rectangle;
        println!(
            "{} at ({}, {}) {}x{}",
            face.emotions.label(),
            rect.left,
            rect.top,
            rect.width,
            rect.height
        );
    }

    let mut overlay = Overlay::new();
    overlay.render(&faces, CanvasScale::IDENTITY);
    overlay::paint(&overlay, &mut image)?;

    if let Some(output) = &args.output {
        let path = output.to_string_lossy();
        imgcodecs::imwrite(&path, &image, &Vector::new())?;
        info!("Wrote {}", path);
    } else if !args.no_window {
        let window = "detected emotions";
        highgui::named_window_def(window)?;
        highgui::imshow(window, &image)?;
        highgui::wait_key(0)?;
    }

    Ok(())
}
