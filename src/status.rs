//! Minimal HTTP/1.1 responder for liveness and metric scraping.
//!
//! Only `GET /health` and `GET /metrics` are understood; every connection gets
//! exactly one response and is then closed.

use crate::metrics::TelemetryMetrics;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time;
use tracing::{debug, error, info, warn};

const MAX_HEADER_LINES: usize = 64;

/// Upper bound on request line plus headers read from one client.
pub const MAX_REQUEST_BYTES: u64 = 8 * 1024;

/// A client must finish sending its request within this window.
pub const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub reason: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    fn text(status: u16, reason: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            reason,
            content_type: "text/plain; charset=utf-8",
            body: body.into(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            self.reason,
            self.content_type,
            self.body.len()
        )
        .into_bytes();
        out.extend_from_slice(self.body.as_bytes());
        out
    }
}

/// Maps a request line such as `GET /health HTTP/1.1` to a response.
pub fn route(request_line: &str, metrics: &TelemetryMetrics) -> Response {
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    // ignore any query string
    let path = target.split('?').next().unwrap_or_default();

    if method != "GET" {
        return Response::text(405, "Method Not Allowed", "method not allowed");
    }

    match path {
        "/health" => Response::text(200, "OK", "healthy"),
        "/metrics" => match metrics.render() {
            Ok(body) => Response {
                status: 200,
                reason: "OK",
                content_type: metrics.content_type(),
                body,
            },
            Err(e) => {
                error!("Failed to render metrics: {}", e);
                Response::text(500, "Internal Server Error", "metrics unavailable")
            }
        },
        _ => Response::text(404, "Not Found", "not found"),
    }
}

pub async fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!("🌐 Status server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accept loop; each connection is served on its own task.
pub async fn serve(listener: TcpListener, metrics: Arc<TelemetryMetrics>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let metrics = Arc::clone(&metrics);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, &metrics, REQUEST_READ_TIMEOUT).await {
                        warn!("Status client {} error: {}", peer, e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept status connection: {}", e);
            }
        }
    }
}

enum RequestLine {
    Line(String),
    Closed,
    TooLarge,
}

async fn read_request<R>(reader: &mut R) -> std::io::Result<RequestLine>
where
    R: AsyncBufRead + Unpin,
{
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await? == 0 {
        return Ok(RequestLine::Closed);
    }
    // read_line only stops short of a newline at EOF or at the byte limit
    if !request_line.ends_with('\n') {
        return Ok(RequestLine::TooLarge);
    }

    // Drain headers so the client is not reset while still sending them.
    let mut header = String::new();
    for _ in 0..MAX_HEADER_LINES {
        header.clear();
        let read = reader.read_line(&mut header).await?;
        if read == 0 || header.trim().is_empty() {
            break;
        }
    }

    Ok(RequestLine::Line(request_line))
}

async fn handle_connection(
    stream: TcpStream,
    metrics: &TelemetryMetrics,
    read_timeout: Duration,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader.take(MAX_REQUEST_BYTES));

    let response = match time::timeout(read_timeout, read_request(&mut reader)).await {
        Ok(Ok(RequestLine::Line(line))) => {
            let response = route(line.trim(), metrics);
            debug!("{} -> {}", line.trim(), response.status);
            response
        }
        Ok(Ok(RequestLine::Closed)) => return Ok(()),
        Ok(Ok(RequestLine::TooLarge)) => {
            warn!("Status request exceeded {} bytes", MAX_REQUEST_BYTES);
            Response::text(431, "Request Header Fields Too Large", "request too large")
        }
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            debug!("Status client sent no request within {:?}", read_timeout);
            Response::text(408, "Request Timeout", "request timeout")
        }
    };

    writer.write_all(&response.to_bytes()).await?;
    writer.shutdown().await?;
    Ok(())
}
