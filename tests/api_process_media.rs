use anyhow::Result;
use image::{GrayImage, ImageFormat, Luma};
use serde_json::Value;
use std::io::{Cursor, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use parkwatch::api::{ApiConfig, ApiHandle, ApiServer};
use parkwatch::{
    Collaborators, FileVideoOpener, LogRenderer, MaskImageExtractor, PipelineConfig, Renderer,
    SchedulerConfig, SessionConfig, SessionController, TextureClassifier,
};

const BOUNDARY: &str = "----parkwatch-test-boundary";
const STUB_VIDEO: &[u8] = b"stub://lot?frames=61&width=64&height=48&layout=gray";

struct TestApi {
    api_handle: Option<ApiHandle>,
}

impl TestApi {
    fn new(max_upload_bytes: usize) -> Result<Self> {
        let renderer = || -> Result<Box<dyn Renderer>> { Ok(Box::new(LogRenderer::new())) };
        let controller = SessionController::new(
            SessionConfig {
                scheduler: SchedulerConfig::default(),
                pipeline: PipelineConfig {
                    queue_capacity: 4,
                    poll_interval: Duration::from_millis(10),
                    enqueue_timeout: Duration::from_millis(500),
                },
            },
            Collaborators {
                video: Arc::new(FileVideoOpener::new().with_synthetic_uploads(true)),
                regions: Arc::new(MaskImageExtractor::new()),
                classifier: Arc::new(TextureClassifier::new()),
                renderer: Arc::new(renderer),
            },
        );
        let api_config = ApiConfig {
            addr: "127.0.0.1:0".to_string(),
            max_upload_bytes,
        };
        let api_handle = ApiServer::new(api_config, Arc::new(controller)).spawn()?;
        Ok(Self {
            api_handle: Some(api_handle),
        })
    }

    fn send(&self, raw: &[u8]) -> Result<(String, String)> {
        let addr = self.api_handle.as_ref().expect("api running").addr;
        let mut stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(Duration::from_secs(30)))?;
        stream.write_all(raw)?;
        let mut response = String::new();
        stream.read_to_string(&mut response)?;
        let mut parts = response.splitn(2, "\r\n\r\n");
        let headers = parts.next().unwrap_or("").to_string();
        let body = parts.next().unwrap_or("").to_string();
        Ok((headers, body))
    }

    fn upload(&self, fields: &[(&str, &str, &[u8])]) -> Result<(String, Value)> {
        let body = multipart_body(fields);
        let mut raw = format!(
            "POST /process_media HTTP/1.1\r\nHost: localhost\r\nContent-Type: multipart/form-data; boundary={BOUNDARY}\r\nContent-Length: {}\r\n\r\n",
            body.len()
        )
        .into_bytes();
        raw.extend_from_slice(&body);
        let (headers, body) = self.send(&raw)?;
        Ok((headers, serde_json::from_str(&body)?))
    }
}

impl Drop for TestApi {
    fn drop(&mut self) {
        if let Some(handle) = self.api_handle.take() {
            let _ = handle.stop();
        }
    }
}

fn multipart_body(fields: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, filename, data) in fields {
        out.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        out.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        out.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        out.extend_from_slice(data);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    out
}

fn mask_png() -> Vec<u8> {
    let mut img = GrayImage::new(64, 48);
    for (x0, y0, w, h) in [(4u32, 4u32, 16u32, 12u32), (32, 20, 20, 20), (4, 30, 10, 10)] {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, Luma([255]));
            }
        }
    }
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn status_code(headers: &str) -> u16 {
    headers
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or(0)
}

#[test]
fn process_media_runs_a_session_and_reports_spots() -> Result<()> {
    let api = TestApi::new(1024 * 1024)?;
    let mask = mask_png();
    let (headers, body) = api.upload(&[
        ("video", "lot.mp4", STUB_VIDEO),
        ("mask", "mask.png", mask.as_slice()),
    ])?;

    assert_eq!(status_code(&headers), 200, "body: {body}");
    assert!(headers.contains("Access-Control-Allow-Origin: *"));
    assert_eq!(body["message"], "Video processing completed");
    assert_eq!(body["total_spots"], 3);
    assert_eq!(body["frames_processed"], 61);
    assert_eq!(body["occupancy"]["total"], 3);
    Ok(())
}

#[test]
fn missing_mask_is_a_bad_request() -> Result<()> {
    let api = TestApi::new(1024 * 1024)?;
    let (headers, body) = api.upload(&[("video", "lot.mp4", STUB_VIDEO)])?;
    assert_eq!(status_code(&headers), 400);
    assert_eq!(body["error"], "Both video and mask files are required");
    Ok(())
}

#[test]
fn undecodable_mask_is_reported() -> Result<()> {
    let api = TestApi::new(1024 * 1024)?;
    let (headers, body) = api.upload(&[
        ("video", "lot.mp4", STUB_VIDEO),
        ("mask", "mask.png", &b"not an image"[..]),
    ])?;
    assert_eq!(status_code(&headers), 500);
    assert_eq!(body["error"], "Invalid mask file");
    Ok(())
}

#[test]
fn unopenable_video_is_reported() -> Result<()> {
    let api = TestApi::new(1024 * 1024)?;
    let mask = mask_png();
    let (headers, body) = api.upload(&[
        ("video", "lot.mp4", &b"garbage bytes, not a container"[..]),
        ("mask", "mask.png", mask.as_slice()),
    ])?;
    assert_eq!(status_code(&headers), 500);
    assert_eq!(body["error"], "Video cannot be opened");
    Ok(())
}

#[test]
fn oversized_synthetic_video_is_reported_as_unopenable() -> Result<()> {
    let api = TestApi::new(1024 * 1024)?;
    let mask = mask_png();
    let (headers, body) = api.upload(&[
        (
            "video",
            "lot.mp4",
            &b"stub://x?frames=1&width=4294967295&height=4294967295"[..],
        ),
        ("mask", "mask.png", mask.as_slice()),
    ])?;
    assert_eq!(status_code(&headers), 500);
    assert_eq!(body["error"], "Video cannot be opened");

    // The server thread survives and keeps serving.
    let (headers, _) = api.send(b"GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
    assert_eq!(status_code(&headers), 200);
    Ok(())
}

#[test]
fn non_multipart_body_counts_as_missing_files() -> Result<()> {
    let api = TestApi::new(1024 * 1024)?;
    let raw = b"POST /process_media HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{}";
    let (headers, body) = api.send(raw)?;
    assert_eq!(status_code(&headers), 400);
    assert!(body.contains("Both video and mask files are required"));
    Ok(())
}

#[test]
fn oversized_upload_is_rejected_before_reading_body() -> Result<()> {
    let api = TestApi::new(1024)?;
    let raw = b"POST /process_media HTTP/1.1\r\nHost: localhost\r\nContent-Type: multipart/form-data; boundary=x\r\nContent-Length: 4096\r\n\r\n";
    let (headers, _body) = api.send(raw)?;
    assert_eq!(status_code(&headers), 413);
    Ok(())
}

#[test]
fn health_preflight_and_unknown_routes() -> Result<()> {
    let api = TestApi::new(1024)?;

    let (headers, body) = api.send(b"GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
    assert_eq!(status_code(&headers), 200);
    assert_eq!(body, r#"{"status":"ok"}"#);

    let (headers, _) = api.send(
        b"OPTIONS /process_media HTTP/1.1\r\nHost: localhost\r\nOrigin: http://localhost:3000\r\n\r\n",
    )?;
    assert_eq!(status_code(&headers), 204);
    assert!(headers.contains("Access-Control-Allow-Methods: GET, POST, OPTIONS"));

    let (headers, _) = api.send(b"GET /process_media HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
    assert_eq!(status_code(&headers), 405);

    let (headers, _) = api.send(b"GET /spots HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
    assert_eq!(status_code(&headers), 404);
    Ok(())
}
