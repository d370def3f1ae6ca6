//! Transport adapters.
//!
//! Sessions are generic over any `AsyncRead + AsyncWrite` byte stream; the
//! [`Transport`] trait adds the bookkeeping surface (byte counters, peer
//! address, closed flag) on top. [`CountingStream`] adapts plain TCP and
//! TLS streams; [`RtmptStream`](rtmpt::RtmptStream) emulates a byte stream
//! over HTTP long polling.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

pub mod rtmpt;

/// A bi-directional byte stream with transfer bookkeeping.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {
    /// Total bytes read from the peer.
    fn bytes_read(&self) -> u64;

    /// Total bytes written to the peer.
    fn bytes_written(&self) -> u64;

    /// True once the stream was shut down.
    fn is_closed(&self) -> bool;

    /// The peer address, when the transport has one.
    fn remote_addr(&self) -> Option<SocketAddr>;
}

/// Wraps any byte stream (TCP, TLS-over-TCP, ...) with transfer counters.
#[derive(Debug)]
pub struct CountingStream<S> {
    inner: S,
    remote_addr: Option<SocketAddr>,
    bytes_read: Arc<AtomicU64>,
    bytes_written: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl<S> CountingStream<S> {
    /// Wraps the given stream.
    pub fn new(inner: S, remote_addr: Option<SocketAddr>) -> Self {
        Self {
            inner,
            remote_addr,
            bytes_read: Arc::new(AtomicU64::new(0)),
            bytes_written: Arc::new(AtomicU64::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for CountingStream<S> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let result = Pin::new(&mut self.inner).poll_read(cx, buf);

        if let Poll::Ready(Ok(())) = &result {
            let n = buf.filled().len() - before;
            self.bytes_read.fetch_add(n as u64, Ordering::Relaxed);

            if n == 0 {
                self.closed.store(true, Ordering::Relaxed);
            }
        }

        result
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for CountingStream<S> {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        let result = Pin::new(&mut self.inner).poll_write(cx, buf);

        if let Poll::Ready(Ok(n)) = &result {
            self.bytes_written.fetch_add(*n as u64, Ordering::Relaxed);
        }

        result
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.closed.store(true, Ordering::Relaxed);
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> Transport for CountingStream<S> {
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
        self.remote_addr
    }
}
