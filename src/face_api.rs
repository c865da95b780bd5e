use crate::capture::Frame;
use crate::emotion::EmotionScores;
use crate::error::DetectionError;
use log::debug;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use url::Url;

const DETECT_PATH: &str = "face/v1.0/detect";
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Face bounding box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FaceRectangle {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub rectangle: FaceRectangle,
    pub emotions: EmotionScores,
}

/// Something that finds faces and their emotions in an encoded frame.
pub trait FaceDetector: Send + Sync {
    fn detect(
        &self,
        frame: &Frame,
    ) -> impl Future<Output = Result<Vec<DetectedFace>, DetectionError>> + Send;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaceDto {
    face_rectangle: FaceRectangle,
    face_attributes: FaceAttributesDto,
}

#[derive(Deserialize)]
struct FaceAttributesDto {
    emotion: EmotionScores,
}

#[derive(Deserialize)]
struct ErrorResponseDto {
    error: ErrorDto,
}

#[derive(Deserialize)]
struct ErrorDto {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl From<FaceDto> for DetectedFace {
    fn from(dto: FaceDto) -> Self {
        Self {
            rectangle: dto.face_rectangle,
            emotions: dto.face_attributes.emotion,
        }
    }
}

/// Turn a detect response into faces, in the order the service listed them.
pub fn parse_detect_response(status: u16, body: &[u8]) -> Result<Vec<DetectedFace>, DetectionError> {
    if !(200..300).contains(&status) {
        return Err(match serde_json::from_slice::<ErrorResponseDto>(body) {
            Ok(response) => DetectionError::Service {
                status,
                code: response.error.code,
                message: response.error.message,
            },
            Err(_) => DetectionError::Service {
                status,
                code: String::new(),
                message: String::from_utf8_lossy(body).into_owned(),
            },
        });
    }
    let faces: Vec<FaceDto> = serde_json::from_slice(body)?;
    Ok(faces.into_iter().map(DetectedFace::from).collect())
}

/// Azure Face API `detect` client asking for emotion attributes only.
pub struct FaceApiClient {
    client: reqwest::Client,
    detect_url: Url,
    key: String,
}

impl FaceApiClient {
    pub fn new(endpoint: &str, key: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            detect_url: detect_url(endpoint)?,
            key: key.to_owned(),
        })
    }

    pub fn detect_url(&self) -> &Url {
        &self.detect_url
    }
}

pub fn detect_url(endpoint: &str) -> Result<Url, url::ParseError> {
    // keep any path the endpoint already has
    let base = if endpoint.ends_with('/') {
        Url::parse(endpoint)?
    } else {
        Url::parse(&format!("{endpoint}/"))?
    };
    let mut url = base.join(DETECT_PATH)?;
    url.query_pairs_mut()
        .append_pair("returnFaceId", "false")
        .append_pair("returnFaceLandmarks", "false")
        .append_pair("returnFaceAttributes", "emotion");
    Ok(url)
}

impl FaceDetector for FaceApiClient {
    async fn detect(&self, frame: &Frame) -> Result<Vec<DetectedFace>, DetectionError> {
        debug!("Submitting {} byte frame", frame.jpeg.len());
        let response = self
            .client
            .post(self.detect_url.clone())
            .header(SUBSCRIPTION_KEY_HEADER, &self.key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(frame.jpeg.clone())
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        parse_detect_response(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FACES: &str = r#"[
        {
            "faceRectangle": {"top": 131, "left": 177, "width": 162, "height": 162},
            "faceAttributes": {"emotion": {
                "anger": 0.0, "contempt": 0.0, "disgust": 0.0, "fear": 0.0,
                "happiness": 0.87, "neutral": 0.1, "sadness": 0.0, "surprise": 0.03
            }}
        },
        {
            "faceRectangle": {"top": 20, "left": 600, "width": 90, "height": 100},
            "faceAttributes": {"emotion": {
                "anger": 0.6, "contempt": 0.0, "disgust": 0.0, "fear": 0.0,
                "happiness": 0.0, "neutral": 0.4, "sadness": 0.0, "surprise": 0.0
            }}
        }
    ]"#;

    #[test]
    fn parses_faces_in_returned_order() {
        let faces = parse_detect_response(200, TWO_FACES.as_bytes()).unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(
            faces[0].rectangle,
            FaceRectangle {
                left: 177,
                top: 131,
                width: 162,
                height: 162
            }
        );
        assert_eq!(faces[0].emotions.label(), "happiness (87%)");
        assert_eq!(faces[1].rectangle.left, 600);
        assert_eq!(faces[1].emotions.label(), "anger (60%)");
    }

    #[test]
    fn empty_array_is_no_faces() {
        let faces = parse_detect_response(200, b"[]").unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn missing_emotion_is_malformed() {
        let body = r#"[{"faceRectangle": {"top": 1, "left": 2, "width": 3, "height": 4},
                       "faceAttributes": {"age": 31.0}}]"#;
        let err = parse_detect_response(200, body.as_bytes()).unwrap_err();
        assert!(matches!(err, DetectionError::MalformedResponse(_)));
    }

    #[test]
    fn garbage_body_is_malformed() {
        let err = parse_detect_response(200, b"<html>").unwrap_err();
        assert!(matches!(err, DetectionError::MalformedResponse(_)));
    }

    #[test]
    fn service_error_keeps_code_and_message() {
        let body = r#"{"error": {"code": "429", "message": "Rate limit is exceeded."}}"#;
        match parse_detect_response(429, body.as_bytes()).unwrap_err() {
            DetectionError::Service {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 429);
                assert_eq!(code, "429");
                assert_eq!(message, "Rate limit is exceeded.");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn service_error_without_json_body() {
        match parse_detect_response(502, b"Bad Gateway").unwrap_err() {
            DetectionError::Service { status, message, .. } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    struct CapturedRequest {
        head: String,
        body: Vec<u8>,
    }

    impl CapturedRequest {
        fn header(&self, name: &str) -> Option<String> {
            self.head.lines().skip(1).find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.trim()
                    .eq_ignore_ascii_case(name)
                    .then(|| value.trim().to_string())
            })
        }
    }

    /// Accepts one connection, records the request and answers with `status` and `body`.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<CapturedRequest>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut chunk = [0u8; 4096];
            let head_end = loop {
                let read = stream.read(&mut chunk).await.unwrap();
                assert!(read > 0, "connection closed before headers");
                received.extend_from_slice(&chunk[..read]);
                if let Some(pos) = received.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos;
                }
            };
            let head = String::from_utf8(received[..head_end].to_vec()).unwrap();
            let mut request = CapturedRequest {
                head,
                body: received[head_end + 4..].to_vec(),
            };
            let length: usize = request
                .header("content-length")
                .map(|value| value.parse().unwrap())
                .unwrap_or(0);
            while request.body.len() < length {
                let read = stream.read(&mut chunk).await.unwrap();
                assert!(read > 0, "connection closed before body");
                request.body.extend_from_slice(&chunk[..read]);
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
            request
        });
        (endpoint, handle)
    }

    fn test_frame() -> Frame {
        Frame {
            jpeg: vec![0xFF, 0xD8, 0x01, 0x02, 0x03, 0xFF, 0xD9],
            width: 900,
            height: 900,
        }
    }

    #[tokio::test]
    async fn detect_posts_frame_with_key() {
        let (endpoint, server) = serve_once("200 OK", TWO_FACES).await;
        let client = FaceApiClient::new(&endpoint, "secret-key", Duration::from_secs(5)).unwrap();

        let faces = client.detect(&test_frame()).await.unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].emotions.label(), "happiness (87%)");

        let request = server.await.unwrap();
        let request_line = request.head.lines().next().unwrap();
        assert_eq!(
            request_line,
            "POST /face/v1.0/detect?returnFaceId=false&returnFaceLandmarks=false\
             &returnFaceAttributes=emotion HTTP/1.1"
        );
        assert_eq!(
            request.header("ocp-apim-subscription-key").as_deref(),
            Some("secret-key")
        );
        assert_eq!(
            request.header("content-type").as_deref(),
            Some("application/octet-stream")
        );
        assert_eq!(request.body, test_frame().jpeg);
    }

    #[tokio::test]
    async fn detect_maps_rate_limit_to_service_error() {
        let body = r#"{"error": {"code": "429", "message": "Rate limit is exceeded."}}"#;
        let (endpoint, server) = serve_once("429 Too Many Requests", body).await;
        let client = FaceApiClient::new(&endpoint, "secret-key", Duration::from_secs(5)).unwrap();

        match client.detect(&test_frame()).await.unwrap_err() {
            DetectionError::Service {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 429);
                assert_eq!(code, "429");
                assert_eq!(message, "Rate limit is exceeded.");
            }
            other => panic!("unexpected error {other:?}"),
        }
        server.await.unwrap();
    }

    #[test]
    fn detect_url_requests_emotion_only() {
        let url = detect_url("https://westeurope.api.cognitive.microsoft.com").unwrap();
        assert_eq!(
            url.as_str(),
            "https://westeurope.api.cognitive.microsoft.com/face/v1.0/detect\
             ?returnFaceId=false&returnFaceLandmarks=false&returnFaceAttributes=emotion"
        );
    }

    #[test]
    fn detect_url_keeps_endpoint_path() {
        let url = detect_url("https://example.com/proxy/").unwrap();
        assert_eq!(url.path(), "/proxy/face/v1.0/detect");
    }

    #[test]
    fn detect_url_rejects_garbage() {
        assert!(detect_url("not a url").is_err());
    }
}
