//! # Service Client
//!
//! Request/response side of the annotation service: everything except the
//! live WebSocket stream.
//!
//! | Call | Endpoint | Result |
//! |------|----------|--------|
//! | `health` | `GET /health` | online / offline |
//! | `set_confidence` | `POST /set_confidence` | response ignored |
//! | `detect_image` | `POST /detect_image` | annotated JPEG |
//! | `upload_video` | `POST /upload_video` | `VideoId` |
//! | `stream_video` | `GET /stream_video/{id}` | `PlaybackStream` |
//! | `video_feed` | `GET /video_feed` | `PlaybackStream` |

use std::path::Path;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::confidence::ConfidenceSink;
use crate::config::ClientConfig;
use crate::error::{StreamError, StreamResult};
use crate::processing::mjpeg::{DEFAULT_BOUNDARY, MjpegParser, boundary_from_content_type};

/// Server-assigned key of an uploaded video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoId(pub String);

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: Client,
    config: ClientConfig,
}

impl ServiceClient {
    pub fn new(config: ClientConfig) -> StreamResult<Self> {
        config
            .validate()
            .map_err(|reason| StreamError::config("server", &config.server, reason))?;
        Ok(Self {
            http: Client::new(),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Liveness probe. Any failure, including a non-2xx status, means offline.
    pub async fn health(&self) -> bool {
        let Ok(url) = self.config.endpoint(&self.config.health_path) else {
            return false;
        };
        match self.http.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Health probe failed: {}", e);
                false
            }
        }
    }

    /// Push a confidence threshold. The response body is ignored.
    pub async fn set_confidence(&self, conf: f32) -> StreamResult<()> {
        let url = self.config.endpoint(&self.config.confidence_path)?;
        let response = self
            .http
            .post(url.clone())
            .json(&json!({ "conf": conf }))
            .send()
            .await?;
        check_status(&url, response).map(|_| ())
    }

    /// Annotate a single image. Returns the service's JPEG.
    pub async fn detect_image(&self, bytes: Vec<u8>, file_name: &str) -> StreamResult<Vec<u8>> {
        let url = self.config.endpoint(&self.config.detect_image_path)?;
        let mime = image::guess_format(&bytes)
            .map(|format| format.to_mime_type())
            .unwrap_or("application/octet-stream");
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)?;

        let response = self
            .http
            .post(url.clone())
            .multipart(Form::new().part("file", part))
            .send()
            .await?;
        let response = check_status(&url, response)?;
        let body = response.bytes().await?;
        debug!("Annotated image received ({} bytes)", body.len());
        Ok(body.to_vec())
    }

    /// Upload a video file for keyed playback.
    pub async fn upload_video(&self, path: &Path) -> StreamResult<VideoId> {
        let url = self.config.endpoint(&self.config.upload_video_path)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| StreamError::io("read video", e).with_path(path.display().to_string()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());
        let part = Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str(video_mime(path))?;

        let response = self
            .http
            .post(url.clone())
            .multipart(Form::new().part("file", part))
            .send()
            .await?;
        let body: Value = check_status(&url, response)?.json().await?;
        let id = parse_video_id(&body)?;
        info!("Uploaded {} as {}", file_name, id);
        Ok(id)
    }

    /// Open the annotated playback stream of an uploaded video.
    pub async fn stream_video(&self, id: &VideoId) -> StreamResult<PlaybackStream> {
        let url = self.config.stream_video_url(&id.0)?;
        self.open_multipart(url).await
    }

    /// Open the service's own camera feed.
    pub async fn video_feed(&self) -> StreamResult<PlaybackStream> {
        let url = self.config.endpoint(&self.config.feed_path)?;
        self.open_multipart(url).await
    }

    async fn open_multipart(&self, url: Url) -> StreamResult<PlaybackStream> {
        let response = self.http.get(url.clone()).send().await?;
        let response = check_status(&url, response)?;
        let boundary = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(boundary_from_content_type)
            .unwrap_or_else(|| DEFAULT_BOUNDARY.to_string());
        debug!("Playback stream {} (boundary '{}')", url, boundary);

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(PlaybackStream::new(body, &boundary))
    }
}

#[async_trait]
impl ConfidenceSink for ServiceClient {
    async fn push_confidence(&self, conf: f32) -> anyhow::Result<()> {
        self.set_confidence(conf).await?;
        Ok(())
    }
}

/// Annotated JPEG frames decoded from a multipart HTTP body.
pub struct PlaybackStream {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    parser: MjpegParser,
    ended: bool,
    frames: u64,
}

impl PlaybackStream {
    fn new(body: BoxStream<'static, reqwest::Result<Vec<u8>>>, boundary: &str) -> Self {
        Self {
            body,
            parser: MjpegParser::new(boundary),
            ended: false,
            frames: 0,
        }
    }

    /// Next JPEG frame, or `None` once the stream is exhausted.
    pub async fn next_frame(&mut self) -> StreamResult<Option<Vec<u8>>> {
        loop {
            if let Some(frame) = self.parser.next_frame()? {
                self.frames += 1;
                return Ok(Some(frame));
            }
            if self.ended || self.parser.is_finished() {
                let tail = self.parser.finish()?;
                if tail.is_some() {
                    self.frames += 1;
                }
                return Ok(tail);
            }
            match self.body.next().await {
                Some(chunk) => self.parser.push(&chunk?),
                None => self.ended = true,
            }
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

fn check_status(url: &Url, response: Response) -> StreamResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(StreamError::http(url.path(), status.as_u16()))
    }
}

fn parse_video_id(body: &Value) -> StreamResult<VideoId> {
    body.get("video_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(|id| VideoId(id.to_string()))
        .ok_or_else(|| {
            StreamError::decode(format!("upload response has no video_id: {body}"))
        })
}

fn video_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn playback(chunks: Vec<&'static [u8]>) -> PlaybackStream {
        let body = stream::iter(chunks.into_iter().map(|c| Ok::<_, reqwest::Error>(c.to_vec()))).boxed();
        PlaybackStream::new(body, DEFAULT_BOUNDARY)
    }

    #[test]
    fn test_parse_video_id() {
        let id = parse_video_id(&json!({ "video_id": "abc.mp4" })).unwrap();
        assert_eq!(id, VideoId("abc.mp4".to_string()));
        assert!(parse_video_id(&json!({ "status": "ok" })).is_err());
        assert!(parse_video_id(&json!({ "video_id": "" })).is_err());
    }

    #[test]
    fn test_video_mime() {
        assert_eq!(video_mime(Path::new("clip.MP4")), "video/mp4");
        assert_eq!(video_mime(Path::new("clip.webm")), "video/webm");
        assert_eq!(video_mime(Path::new("clip")), "application/octet-stream");
    }

    #[test]
    fn test_rejects_invalid_server() {
        let err = ServiceClient::new(ClientConfig::with_server("ftp://nowhere")).unwrap_err();
        assert_eq!(err.category(), "config");
    }

    #[tokio::test]
    async fn test_playback_stream_yields_parts() {
        let mut stream = playback(vec![
            b"--frame\r\nContent-Type: image/jpeg\r\n\r\nAA",
            b"AA\r\n--frame\r\nContent-Type: image/jpeg\r\n\r\nBB\r\n",
            b"--frame--\r\n",
        ]);
        assert_eq!(stream.next_frame().await.unwrap().as_deref(), Some(&b"AAAA"[..]));
        assert_eq!(stream.next_frame().await.unwrap().as_deref(), Some(&b"BB"[..]));
        assert_eq!(stream.next_frame().await.unwrap(), None);
        assert_eq!(stream.frames(), 2);
    }

    #[tokio::test]
    async fn test_playback_stream_flushes_unterminated_tail() {
        let mut stream = playback(vec![b"--frame\r\n\r\nlast\r\n"]);
        assert_eq!(stream.next_frame().await.unwrap().as_deref(), Some(&b"last"[..]));
        assert_eq!(stream.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_playback_stream_ends_on_absurd_part() {
        let mut stream = playback(vec![
            &b"--frame\r\nContent-Length: 18446744073709551615\r\n\r\nAAAA\r\n"[..],
        ]);
        assert_eq!(stream.next_frame().await.unwrap_err().category(), "decode");
        assert_eq!(stream.next_frame().await.unwrap(), None);
        assert_eq!(stream.frames(), 0);
    }

    #[tokio::test]
    async fn test_health_offline_when_unreachable() {
        let client = ServiceClient::new(ClientConfig::with_server("http://127.0.0.1:9")).unwrap();
        assert!(!client.health().await);
    }
}
