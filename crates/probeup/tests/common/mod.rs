//! Shared helpers for integration tests: a loopback HTTP responder and
//! scripted probers.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use probeup::{ProbeResult, Prober};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Minimal HTTP/1.1 server answering by path:
///
/// - `/forbidden` 403, `/auth` 401, `/missing` 404, `/teapot` 418,
///   `/error` 500
/// - `/hangup` closes the connection without answering
/// - `/truncated` answers 403 announcing 100 body bytes, sends 5, closes
/// - `/stall` reads the request and never answers
/// - anything else 200 with body `hello from <path>`
pub struct TestServer {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(answer(stream));
        }
    });

    TestServer { base_url: format!("http://{addr}"), handle }
}

async fn answer(mut stream: TcpStream) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&chunk[..n]),
        }
    }

    let head = String::from_utf8_lossy(&request);
    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();

    let (status, reason) = match path.as_str() {
        "/hangup" => return,
        "/stall" => {
            std::future::pending::<()>().await;
            return;
        }
        "/truncated" => {
            let head = "HTTP/1.1 403 Forbidden\r\nContent-Length: 100\r\nConnection: close\r\n\r\n";
            let _ = stream.write_all(head.as_bytes()).await;
            let _ = stream.write_all(b"short").await;
            let _ = stream.shutdown().await;
            return;
        }
        "/forbidden" => (403, "Forbidden"),
        "/auth" => (401, "Unauthorized"),
        "/missing" => (404, "Not Found"),
        "/teapot" => (418, "I'm a teapot"),
        "/error" => (500, "Internal Server Error"),
        _ => (200, "OK"),
    };
    let body = if status == 200 { format!("hello from {path}") } else { String::new() };

    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Prober that answers 200 after `delay` and records peak concurrency
#[derive(Default)]
pub struct CountingProber {
    pub delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl CountingProber {
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay, ..Self::default() })
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Prober for CountingProber {
    async fn probe(&self, url: &str, path: &str, method: &str) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        ProbeResult::new(url, path, method).completed(200, b"ok")
    }
}

/// Prober for which every probe fails without a response
pub struct FailingProber;

#[async_trait::async_trait]
impl Prober for FailingProber {
    async fn probe(&self, url: &str, path: &str, method: &str) -> ProbeResult {
        ProbeResult::new(url, path, method).failure("connection refused")
    }
}
