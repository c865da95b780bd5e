use crate::detection_loop::LoopSettings;
use crate::face_api::FaceApiClient;
use clap::Args;
use std::time::Duration;

#[derive(Args, Debug, Clone)]
pub struct FaceApiArgs {
    /// Face API subscription key.
    #[arg(long, env = "FACE_API_KEY", hide_env_values = true)]
    pub key: String,

    /// Face API endpoint, e.g. https://westeurope.api.cognitive.microsoft.com
    #[arg(long, env = "FACE_API_ENDPOINT")]
    pub endpoint: String,

    /// Give up on a detection request after this many milliseconds.
    #[arg(long, default_value_t = 10_000)]
    pub timeout_ms: u64,
}

impl FaceApiArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn client(&self) -> anyhow::Result<FaceApiClient> {
        FaceApiClient::new(&self.endpoint, &self.key, self.timeout())
    }
}

#[derive(Args, Debug, Clone)]
pub struct CaptureArgs {
    /// Camera index.
    #[arg(short, long, default_value_t = 0)]
    pub camera: i32,

    /// Width frames are scaled to before upload.
    #[arg(long, default_value_t = 900)]
    pub width: i32,

    /// Height frames are scaled to before upload.
    #[arg(long, default_value_t = 900)]
    pub height: i32,

    /// JPEG quality for uploaded frames (0-100).
    #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(i32).range(0..=100))]
    pub jpeg_quality: i32,
}

#[derive(Args, Debug, Clone)]
pub struct LoopArgs {
    /// Minimum milliseconds between two detection requests.
    #[arg(long, default_value_t = 500)]
    pub interval_ms: u64,
}

impl LoopArgs {
    pub fn settings(&self, api: &FaceApiArgs) -> LoopSettings {
        LoopSettings {
            interval: Duration::from_millis(self.interval_ms),
            request_timeout: api.timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestArgs {
        #[command(flatten)]
        api: FaceApiArgs,
        #[command(flatten)]
        capture: CaptureArgs,
        #[command(flatten)]
        detection: LoopArgs,
    }

    #[test]
    fn defaults() {
        let args = TestArgs::try_parse_from([
            "emotions",
            "--key",
            "secret",
            "--endpoint",
            "https://example.com",
        ])
        .unwrap();
        assert_eq!(args.capture.camera, 0);
        assert_eq!((args.capture.width, args.capture.height), (900, 900));
        assert_eq!(args.capture.jpeg_quality, 90);

        let settings = args.detection.settings(&args.api);
        assert_eq!(settings.interval, Duration::from_millis(500));
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn jpeg_quality_is_bounded() {
        let result = TestArgs::try_parse_from([
            "emotions",
            "--key",
            "secret",
            "--endpoint",
            "https://example.com",
            "--jpeg-quality",
            "150",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn client_rejects_bad_endpoint() {
        let args = TestArgs::try_parse_from(["emotions", "--key", "k", "--endpoint", "nope"]).unwrap();
        assert!(args.api.client().is_err());
    }
}
