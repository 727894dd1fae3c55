//! Upload API.
//!
//! Routes:
//! - `GET /health`
//! - `POST /process_media`: multipart form with `video` and `mask` files; runs
//!   one session to completion and answers with its summary
//! - `OPTIONS *`: CORS preflight
//!
//! Connections are served one at a time on a background thread, so sessions
//! never overlap.

mod http;
mod multipart;

use crate::ingest::MediaPayload;
use crate::session::{SessionController, SessionRequest};
use anyhow::{anyhow, Result};
use serde_json::json;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use http::{read_request, write_json_response, write_response, HttpRequest, ReadOutcome};

pub const DEFAULT_API_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_API_ADDR.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    /// Stop accepting connections and join the server thread. A session in
    /// progress runs to completion first.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    controller: Arc<SessionController>,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, controller: Arc<SessionController>) -> Self {
        Self { cfg, controller }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        if configured_addr.ip().is_loopback() && !addr.ip().is_loopback() {
            return Err(anyhow!(
                "api configured for loopback address '{}', but bound to non-loopback address '{}'",
                configured_addr,
                addr
            ));
        }
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let cfg = self.cfg;
        let controller = self.controller;
        let join = std::thread::Builder::new()
            .name("parkwatch-api".to_string())
            .spawn(move || {
                if let Err(err) = run_api(listener, &cfg, &controller, shutdown_thread) {
                    log::error!("upload api stopped: {}", err);
                }
            })?;
        log::info!("upload api listening on http://{}", addr);

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    cfg: &ApiConfig,
    controller: &SessionController,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, cfg, controller) {
                    log::warn!("upload api request rejected: {:#}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(
    mut stream: TcpStream,
    cfg: &ApiConfig,
    controller: &SessionController,
) -> Result<()> {
    // Accepted sockets may inherit the listener's non-blocking mode.
    stream.set_nonblocking(false)?;
    let peer = stream.peer_addr()?;
    let local = stream.local_addr()?;
    if local.ip().is_loopback() && !peer.ip().is_loopback() {
        write_json_response(&mut stream, 403, r#"{"error":"forbidden"}"#)?;
        return Ok(());
    }

    let request = match read_request(&mut stream, cfg.max_upload_bytes)? {
        ReadOutcome::Request(request) => request,
        ReadOutcome::TooLarge { declared } => {
            log::warn!(
                "upload of {} bytes rejected (limit {})",
                declared,
                cfg.max_upload_bytes
            );
            write_json_response(&mut stream, 413, r#"{"error":"Upload too large"}"#)?;
            return Ok(());
        }
    };

    if request.method == "OPTIONS" {
        write_response(&mut stream, 204, "text/plain", b"")?;
        return Ok(());
    }
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => write_json_response(&mut stream, 200, r#"{"status":"ok"}"#),
        ("POST", "/process_media") => process_media(&mut stream, &request, controller),
        (_, "/health") | (_, "/process_media") => {
            write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#)
        }
        _ => write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#),
    }
}

fn process_media(
    stream: &mut TcpStream,
    request: &HttpRequest,
    controller: &SessionController,
) -> Result<()> {
    let session_request = match upload_request(request) {
        Ok(session_request) => session_request,
        Err(err) => {
            log::warn!("malformed upload: {:#}", err);
            SessionRequest::default()
        }
    };

    match controller.run(session_request) {
        Ok(result) => {
            let payload = serde_json::to_vec(&result)?;
            write_response(stream, 200, "application/json", &payload)
        }
        Err(err) => {
            log::warn!("session failed: {}", err);
            let payload = serde_json::to_vec(&json!({ "error": err.public_message() }))?;
            write_response(stream, err.http_status(), "application/json", &payload)
        }
    }
}

/// Pull the `video` and `mask` files out of the multipart body. Missing
/// fields stay `None` so the controller reports them.
fn upload_request(request: &HttpRequest) -> Result<SessionRequest> {
    let content_type = request
        .header("content-type")
        .ok_or_else(|| anyhow!("missing content-type"))?;
    let boundary = multipart::boundary(content_type)
        .ok_or_else(|| anyhow!("expected multipart/form-data, got '{}'", content_type))?;
    let mut session_request = SessionRequest::default();
    for part in multipart::parse(&request.body, &boundary)? {
        log::debug!(
            "upload part '{}' ({} bytes, filename {:?})",
            part.name,
            part.data.len(),
            part.filename
        );
        match part.name.as_str() {
            "video" => session_request.video = Some(MediaPayload::Bytes(part.data)),
            "mask" => session_request.mask = Some(MediaPayload::Bytes(part.data)),
            _ => {}
        }
    }
    Ok(session_request)
}
