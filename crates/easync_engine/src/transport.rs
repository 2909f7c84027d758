//! Transport layer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use bytes::Bytes;
use easync_protocol::Command;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One command posted to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Command name; selects the endpoint.
    pub command: Command,
    /// Encoded request document.
    pub body: Bytes,
    /// How long to wait for the whole response.
    pub timeout: Duration,
}

/// A server response with a streaming body.
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response body, read as the parser advances.
    pub body: Box<dyn Read + Send>,
}

impl Response {
    /// Creates a response with an in-memory body.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: Box::new(Cursor::new(body.into())),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// A sync transport handles network communication with the server.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, mock for testing, etc.).
pub trait Transport: Send + Sync {
    /// Posts a command and returns the status with a streaming body.
    ///
    /// Non-2xx statuses are returned, not turned into errors; only a failure
    /// to talk to the server at all is an error.
    fn post(&self, request: &Request) -> SyncResult<Response>;

    /// Checks if the transport is connected.
    fn is_connected(&self) -> bool;

    /// Closes the transport. Reads blocked on an open response fail promptly.
    fn close(&self) -> SyncResult<()>;
}

/// A body reader that fails once the session is cancelled.
pub struct CancellableReader<R> {
    inner: R,
    cancelled: Arc<AtomicBool>,
}

impl<R: Read> CancellableReader<R> {
    /// Wraps `inner`, checking `cancelled` before every read.
    pub fn new(inner: R, cancelled: Arc<AtomicBool>) -> Self {
        Self { inner, cancelled }
    }
}

impl<R: Read> Read for CancellableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::ConnectionAborted, "sync cancelled"));
        }
        self.inner.read(buf)
    }
}

enum Scripted {
    Reply { status: u16, body: Bytes },
    Blocking,
    Failure { message: String, retryable: bool },
}

#[derive(Default)]
struct Gate {
    closed: Mutex<bool>,
    wake: Condvar,
}

impl Gate {
    fn wait_closed(&self) {
        let mut closed = self.closed.lock();
        while !*closed {
            self.wake.wait(&mut closed);
        }
    }

    fn close(&self) {
        *self.closed.lock() = true;
        self.wake.notify_all();
    }
}

/// Body that blocks until the transport is closed, like a long-poll held
/// open by the server.
struct BlockingBody {
    gate: Arc<Gate>,
}

impl Read for BlockingBody {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        self.gate.wait_closed();
        Err(io::Error::new(
            io::ErrorKind::ConnectionAborted,
            "connection closed",
        ))
    }
}

/// A mock transport for testing.
///
/// Responses are scripted in order; every posted request is recorded.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<Request>>,
    connected: AtomicBool,
    gate: Arc<Gate>,
}

impl MockTransport {
    /// Creates a connected mock transport with an empty script.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Queues a response.
    pub fn push_response(&self, status: u16, body: impl Into<Bytes>) {
        self.script.lock().push_back(Scripted::Reply {
            status,
            body: body.into(),
        });
    }

    /// Queues a 200 response.
    pub fn push_ok(&self, body: impl Into<Bytes>) {
        self.push_response(200, body);
    }

    /// Queues a 200 response whose body blocks until [`Transport::close`].
    pub fn push_blocking(&self) {
        self.script.lock().push_back(Scripted::Blocking);
    }

    /// Queues a transport failure.
    pub fn push_failure(&self, message: impl Into<String>, retryable: bool) {
        self.script.lock().push_back(Scripted::Failure {
            message: message.into(),
            retryable,
        });
    }

    /// Sets the connection state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns every request posted so far.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// Number of requests posted so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Number of scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

impl Transport for MockTransport {
    fn post(&self, request: &Request) -> SyncResult<Response> {
        if !self.is_connected() {
            return Err(SyncError::transport_retryable("not connected"));
        }
        self.requests.lock().push(request.clone());
        match self.script.lock().pop_front() {
            Some(Scripted::Reply { status, body }) => Ok(Response::new(status, body)),
            Some(Scripted::Blocking) => Ok(Response {
                status: 200,
                body: Box::new(BlockingBody {
                    gate: Arc::clone(&self.gate),
                }),
            }),
            Some(Scripted::Failure { message, retryable }) => Err(SyncError::Transport {
                message,
                retryable,
            }),
            None => Err(SyncError::transport_fatal(format!(
                "no scripted response for {}",
                request.command
            ))),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> SyncResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.gate.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn request(command: Command) -> Request {
        Request {
            command,
            body: Bytes::from_static(b"\x03\x01\x6a\x00"),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn mock_transport_replays_script() {
        let transport = MockTransport::new();
        transport.push_ok(Bytes::from_static(b"abc"));
        transport.push_response(503, Bytes::new());

        let mut first = transport.post(&request(Command::Sync)).unwrap();
        assert!(first.is_success());
        let mut body = Vec::new();
        first.body.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"abc");

        let second = transport.post(&request(Command::Ping)).unwrap();
        assert_eq!(second.status, 503);
        assert!(!second.is_success());

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].command, Command::Ping);
        assert!(transport.post(&request(Command::Sync)).is_err());
    }

    #[test]
    fn failures_and_disconnects() {
        let transport = MockTransport::new();
        transport.push_failure("connection reset", true);
        let err = transport.post(&request(Command::Sync)).unwrap_err();
        assert!(err.is_retryable());

        transport.set_connected(false);
        assert!(!transport.is_connected());
        assert!(transport.post(&request(Command::Sync)).is_err());
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn close_unblocks_a_pending_read() {
        let transport = Arc::new(MockTransport::new());
        transport.push_blocking();
        let mut response = transport.post(&request(Command::Ping)).unwrap();

        let closer = Arc::clone(&transport);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            closer.close().unwrap();
        });
        let mut buf = [0u8; 8];
        let err = response.body.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
        handle.join().unwrap();
    }

    #[test]
    fn cancellable_reader_stops_reading() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut reader = CancellableReader::new(Cursor::new(vec![1u8, 2, 3, 4]), Arc::clone(&flag));
        let mut buf = [0u8; 2];
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        flag.store(true, Ordering::SeqCst);
        assert_eq!(
            reader.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::ConnectionAborted
        );
    }
}
