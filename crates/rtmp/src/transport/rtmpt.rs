//! RTMPT: RTMP tunneled through HTTP long polling.
//!
//! The tunnel emulates a byte stream with four POST endpoints:
//!
//! - `POST /fcs/ident2` with a single zero byte probes the server; a 404
//!   (any 4xx) is the expected answer.
//! - `POST /open/1` opens a session; the response body is the ASCII
//!   session id.
//! - `POST /send/<sid>/<seq>` ships outbound bytes; the response body
//!   carries inbound bytes, its first byte being a polling interval hint.
//! - `POST /idle/<sid>/<seq>` drains inbound bytes while nothing is queued
//!   for sending.
//! - `POST /close/<sid>` terminates the session.
//!
//! Sequence numbers increase monotonically from 1. The HTTP client itself
//! is an external collaborator injected through [`HttpCall`].

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};

use super::Transport;

/// The Content-Type every tunnel request carries.
pub const CONTENT_TYPE: &str = "application/x-fcs";

/// The User-Agent every tunnel request carries.
pub const USER_AGENT: &str = "Shockwave Flash";

/// One HTTP POST of the tunnel.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The request path, e.g. `/open/1`.
    pub path: String,
    /// The request body.
    pub body: Bytes,
}

/// The response to an [`HttpRequest`].
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub status: u16,
    /// The response body.
    pub body: Bytes,
}

/// The narrow HTTP client interface the tunnel drives.
///
/// Implementations POST `request.body` to `request.path` on the tunnel
/// host with [`CONTENT_TYPE`] and [`USER_AGENT`] and return the status and
/// body.
pub trait HttpCall: Send + Sync + 'static {
    /// Performs one POST.
    fn call(&self, request: HttpRequest) -> impl Future<Output = io::Result<HttpResponse>> + Send;
}

/// How long the pump waits for outbound bytes before sending an idle poll.
const WRITE_COLLECT_INTERVAL: Duration = Duration::from_millis(50);

/// A byte stream tunneled over HTTP.
///
/// Internally a pump task translates between the stream and the polling
/// endpoints; the session side behaves like any other transport.
#[derive(Debug)]
pub struct RtmptStream {
    session_side: DuplexStream,
    session_id: String,
    bytes_read: Arc<AtomicU64>,
    bytes_written: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl RtmptStream {
    /// Probes the server, opens a tunnel session and spawns the polling
    /// pump.
    ///
    /// Must be called within a tokio runtime.
    pub async fn connect<C: HttpCall>(client: C) -> io::Result<Self> {
        // The ident2 probe: a 4xx is the expected answer, anything the
        // server actually implements (2xx) or breaks on (5xx) is not a
        // working tunnel.
        let ident = client
            .call(HttpRequest {
                path: "/fcs/ident2".to_string(),
                body: Bytes::from_static(&[0x00]),
            })
            .await?;

        if !(400..500).contains(&ident.status) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected ident2 status: {}", ident.status),
            ));
        }

        let open = client
            .call(HttpRequest {
                path: "/open/1".to_string(),
                body: Bytes::new(),
            })
            .await?;

        if open.status != 200 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected open status: {}", open.status),
            ));
        }

        let session_id = String::from_utf8_lossy(&open.body).trim().to_string();
        if session_id.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "empty rtmpt session id"));
        }

        let (session_side, pump_side) = tokio::io::duplex(64 * 1024);

        let bytes_read = Arc::new(AtomicU64::new(0));
        let bytes_written = Arc::new(AtomicU64::new(0));
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(pump(
            client,
            session_id.clone(),
            pump_side,
            bytes_read.clone(),
            bytes_written.clone(),
            closed.clone(),
        ));

        Ok(Self {
            session_side,
            session_id,
            bytes_read,
            bytes_written,
            closed,
        })
    }

    /// The tunnel session id assigned by the server.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// The polling pump: collects outbound bytes into `/send` posts, drains
/// inbound bytes from the response bodies, and falls back to `/idle` while
/// the writer is quiet.
async fn pump<C: HttpCall>(
    client: C,
    session_id: String,
    mut pump_side: DuplexStream,
    bytes_read: Arc<AtomicU64>,
    bytes_written: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
) {
    let mut sequence: u64 = 1;
    let mut poll_delay = Duration::from_millis(10);
    let mut outbound = Vec::with_capacity(4096);

    loop {
        outbound.clear();

        // Collect whatever the session wrote within one poll interval.
        let mut session_open = true;
        match tokio::time::timeout(WRITE_COLLECT_INTERVAL, pump_side.read_buf(&mut outbound)).await {
            Ok(Ok(0)) => session_open = false,
            Ok(Ok(_)) => {}
            Ok(Err(_)) => session_open = false,
            // idle
            Err(_) => {}
        }

        if !session_open {
            let _ = client
                .call(HttpRequest {
                    path: format!("/close/{session_id}"),
                    body: Bytes::new(),
                })
                .await;
            closed.store(true, Ordering::Relaxed);
            return;
        }

        let path = if outbound.is_empty() {
            format!("/idle/{session_id}/{sequence}")
        } else {
            format!("/send/{session_id}/{sequence}")
        };
        sequence += 1;

        let response = match client
            .call(HttpRequest {
                path,
                body: Bytes::from(outbound.clone()),
            })
            .await
        {
            Ok(response) if response.status == 200 => response,
            _ => {
                closed.store(true, Ordering::Relaxed);
                return;
            }
        };

        bytes_written.fetch_add(outbound.len() as u64, Ordering::Relaxed);

        // The first response byte is a server-side polling interval hint,
        // the rest is inbound stream data.
        if let Some((hint, data)) = response.body.split_first() {
            poll_delay = Duration::from_millis((*hint as u64).clamp(1, 32) * 16);

            if !data.is_empty() {
                bytes_read.fetch_add(data.len() as u64, Ordering::Relaxed);

                if pump_side.write_all(data).await.is_err() {
                    closed.store(true, Ordering::Relaxed);
                    return;
                }
            }
        }

        // Only delay when nothing is moving; back-to-back sends keep the
        // tunnel responsive while media flows.
        if outbound.is_empty() && response.body.len() <= 1 {
            tokio::time::sleep(poll_delay).await;
        }
    }
}

impl AsyncRead for RtmptStream {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.session_side).poll_read(cx, buf)
    }
}

impl AsyncWrite for RtmptStream {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.session_side).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.session_side).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.session_side).poll_shutdown(cx)
    }
}

impl Transport for RtmptStream {
    fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        None
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// A scripted in-memory RTMPT server.
    struct FakeServer {
        /// Bytes queued for delivery to the client.
        inbound: Mutex<VecDeque<u8>>,
        /// Bytes the client sent.
        received: Mutex<Vec<u8>>,
        log: Mutex<Vec<String>>,
    }

    impl FakeServer {
        fn new(inbound: &[u8]) -> Arc<Self> {
            Arc::new(Self {
                inbound: Mutex::new(inbound.iter().copied().collect()),
                received: Mutex::new(Vec::new()),
                log: Mutex::new(Vec::new()),
            })
        }
    }

    impl HttpCall for Arc<FakeServer> {
        async fn call(&self, request: HttpRequest) -> io::Result<HttpResponse> {
            self.log.lock().unwrap().push(request.path.clone());

            if request.path == "/fcs/ident2" {
                return Ok(HttpResponse {
                    status: 404,
                    body: Bytes::new(),
                });
            }

            if request.path == "/open/1" {
                return Ok(HttpResponse {
                    status: 200,
                    body: Bytes::from_static(b"Session1\n"),
                });
            }

            if request.path.starts_with("/send/") || request.path.starts_with("/idle/") {
                self.received.lock().unwrap().extend_from_slice(&request.body);

                let mut body = vec![0x01];
                let mut inbound = self.inbound.lock().unwrap();
                while let Some(byte) = inbound.pop_front() {
                    body.push(byte);
                }

                return Ok(HttpResponse {
                    status: 200,
                    body: Bytes::from(body),
                });
            }

            if request.path.starts_with("/close/") {
                return Ok(HttpResponse {
                    status: 200,
                    body: Bytes::new(),
                });
            }

            Ok(HttpResponse {
                status: 500,
                body: Bytes::new(),
            })
        }
    }

    #[tokio::test]
    async fn tunnel_round_trip() {
        let server = FakeServer::new(b"pong");
        let mut stream = RtmptStream::connect(server.clone()).await.unwrap();

        assert_eq!(stream.session_id(), "Session1");

        stream.write_all(b"ping").await.unwrap();

        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        // Wait for the pump to pick the write up.
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if server.received.lock().unwrap().as_slice() == b"ping" {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("server receives the write");

        // Dropping the stream closes the tunnel.
        drop(stream);
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if server.log.lock().unwrap().iter().any(|p| p.starts_with("/close/")) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("close is posted");
    }

    #[tokio::test]
    async fn ident2_must_be_rejected() {
        struct AcceptingServer;

        impl HttpCall for AcceptingServer {
            async fn call(&self, request: HttpRequest) -> io::Result<HttpResponse> {
                let status = if request.path == "/fcs/ident2" { 200 } else { 404 };
                Ok(HttpResponse {
                    status,
                    body: Bytes::new(),
                })
            }
        }

        let err = RtmptStream::connect(AcceptingServer).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn sequence_numbers_increase_from_one() {
        let server = FakeServer::new(b"");
        let stream = RtmptStream::connect(server.clone()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        let log = server.log.lock().unwrap().clone();
        let polls: Vec<_> = log.iter().filter(|p| p.starts_with("/idle/") || p.starts_with("/send/")).collect();
        assert!(polls.len() >= 2);
        assert!(polls[0].ends_with("/1"));
        assert!(polls[1].ends_with("/2"));

        drop(stream);
    }
}
