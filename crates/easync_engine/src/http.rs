//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via a trait so the engine does not
//! depend on a particular HTTP library; the CLI plugs in a blocking
//! `reqwest` client.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::{Request, Response, Transport};
use bytes::{Buf, Bytes};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;
use url::Url;

/// Path servers publish the protocol endpoint under.
pub const DEFAULT_PATH: &str = "/Microsoft-Server-ActiveSync";

/// Content type of request and response documents.
pub const CONTENT_TYPE: &str = "application/vnd.ms-sync.wbxml";

/// Bytes moved per read of a response body.
const PIPE_CHUNK: usize = 8 * 1024;

/// HTTP client abstraction.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request and returns the status with a streaming body.
    ///
    /// Returns `Err` only when no response was received at all.
    fn post(
        &self,
        url: &Url,
        headers: &[(String, String)],
        body: Bytes,
        timeout: Duration,
    ) -> Result<Response, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;

    /// Interrupts requests in flight. Called when the transport is closed.
    ///
    /// Bodies already handed out are cut off by the transport either way;
    /// clients that can shut their connections down should do it here.
    fn abort(&self) {}
}

#[derive(Default)]
struct PipeState {
    chunks: VecDeque<Bytes>,
    end: Option<Result<(), String>>,
    aborted: bool,
}

/// A response body read on a helper thread, so that closing the transport
/// can cut off a read still waiting on the network.
#[derive(Default)]
struct Pipe {
    state: Mutex<PipeState>,
    ready: Condvar,
}

impl Pipe {
    fn abort(&self) {
        self.state.lock().aborted = true;
        self.ready.notify_all();
    }

    fn pump(&self, mut body: Box<dyn Read + Send>) {
        let mut buf = vec![0u8; PIPE_CHUNK];
        loop {
            let result = body.read(&mut buf);
            let mut state = self.state.lock();
            if state.aborted {
                return;
            }
            match result {
                Ok(0) => state.end = Some(Ok(())),
                Ok(n) => state.chunks.push_back(Bytes::copy_from_slice(&buf[..n])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => state.end = Some(Err(e.to_string())),
            }
            let done = state.end.is_some();
            drop(state);
            self.ready.notify_all();
            if done {
                return;
            }
        }
    }
}

/// Reading end of a [`Pipe`].
struct PipeReader {
    pipe: Arc<Pipe>,
    current: Bytes,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.current.is_empty() {
            let mut state = self.pipe.state.lock();
            loop {
                if state.aborted {
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionAborted,
                        "connection closed",
                    ));
                }
                if let Some(chunk) = state.chunks.pop_front() {
                    self.current = chunk;
                    break;
                }
                match &state.end {
                    Some(Ok(())) => return Ok(0),
                    Some(Err(message)) => return Err(io::Error::other(message.clone())),
                    None => self.pipe.ready.wait(&mut state),
                }
            }
        }
        let n = buf.len().min(self.current.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current.advance(n);
        Ok(n)
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.pipe.abort();
    }
}

/// HTTP-based transport.
pub struct HttpTransport<C: HttpClient> {
    endpoint: Url,
    user: String,
    device_id: String,
    device_type: String,
    headers: Vec<(String, String)>,
    client: C,
    connected: AtomicBool,
    pipes: Mutex<Vec<Weak<Pipe>>>,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport for the account described by `config`.
    ///
    /// A server URL without a path gets the default endpoint path.
    pub fn new(config: &SyncConfig, client: C) -> SyncResult<Self> {
        let mut endpoint = Url::parse(&config.server_url)
            .map_err(|e| SyncError::Config(format!("invalid server URL: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(SyncError::Config(format!(
                "server URL {} cannot carry a path",
                config.server_url
            )));
        }
        if endpoint.path().is_empty() || endpoint.path() == "/" {
            endpoint.set_path(DEFAULT_PATH);
        }
        endpoint.set_query(None);
        Ok(Self {
            endpoint,
            user: config.user.clone(),
            device_id: config.device_id.clone(),
            device_type: config.device_type.clone(),
            headers: vec![
                ("Content-Type".to_string(), CONTENT_TYPE.to_string()),
                (
                    "MS-ASProtocolVersion".to_string(),
                    config.protocol_version.clone(),
                ),
            ],
            client,
            connected: AtomicBool::new(true),
            pipes: Mutex::new(Vec::new()),
            last_error: RwLock::new(None),
        })
    }

    /// Returns the endpoint URL without a command.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Builds the URL for one command.
    pub fn command_url(&self, request: &Request) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("Cmd", request.command.as_str())
            .append_pair("User", &self.user)
            .append_pair("DeviceId", &self.device_id)
            .append_pair("DeviceType", &self.device_type);
        url
    }

    fn set_error(&self, err: &str) {
        *self.last_error.write() = Some(err.to_string());
    }

    fn clear_error(&self) {
        *self.last_error.write() = None;
    }

    /// Moves `body` onto a helper thread and returns the reading end.
    fn pipe(&self, body: Box<dyn Read + Send>) -> SyncResult<PipeReader> {
        let pipe = Arc::new(Pipe::default());
        let pump = Arc::clone(&pipe);
        thread::Builder::new()
            .name("easync-body".into())
            .spawn(move || pump.pump(body))
            .map_err(|e| SyncError::transport_retryable(format!("cannot read body: {e}")))?;
        let mut pipes = self.pipes.lock();
        pipes.retain(|p| p.strong_count() > 0);
        pipes.push(Arc::downgrade(&pipe));
        Ok(PipeReader {
            pipe,
            current: Bytes::new(),
        })
    }
}

impl<C: HttpClient> Transport for HttpTransport<C> {
    fn post(&self, request: &Request) -> SyncResult<Response> {
        if !self.is_connected() {
            return Err(SyncError::transport_retryable("not connected"));
        }
        let url = self.command_url(request);
        tracing::debug!(command = %request.command, bytes = request.body.len(), "posting command");
        let response = self
            .client
            .post(&url, &self.headers, request.body.clone(), request.timeout)
            .map_err(|e| {
                self.set_error(&e);
                SyncError::transport_retryable(e)
            })?;
        if !response.is_success() {
            self.set_error(&format!("HTTP status {}", response.status));
            return Ok(response);
        }
        self.clear_error();
        let body = self.pipe(response.body)?;
        if !self.is_connected() {
            // closed while the request was in flight
            body.pipe.abort();
        }
        Ok(Response {
            status: response.status,
            body: Box::new(body),
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    fn close(&self) -> SyncResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.client.abort();
        for pipe in self.pipes.lock().drain(..) {
            if let Some(pipe) = pipe.upgrade() {
                pipe.abort();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easync_protocol::Command;
    use std::time::Instant;

    #[derive(Default)]
    struct TestClient {
        calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
        fail: bool,
        status: u16,
        aborted: AtomicBool,
    }

    impl HttpClient for TestClient {
        fn post(
            &self,
            url: &Url,
            headers: &[(String, String)],
            _body: Bytes,
            _timeout: Duration,
        ) -> Result<Response, String> {
            self.calls.lock().push((url.to_string(), headers.to_vec()));
            if self.fail {
                return Err("connection refused".into());
            }
            Ok(Response::new(self.status, Bytes::from_static(b"\x03\x01\x6a\x00")))
        }

        fn is_healthy(&self) -> bool {
            true
        }

        fn abort(&self) {
            self.aborted.store(true, Ordering::SeqCst);
        }
    }

    /// A body that stalls like a long-poll nobody answers.
    struct StalledBody;

    impl Read for StalledBody {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            thread::sleep(Duration::from_secs(2));
            Ok(0)
        }
    }

    struct StalledClient;

    impl HttpClient for StalledClient {
        fn post(
            &self,
            _url: &Url,
            _headers: &[(String, String)],
            _body: Bytes,
            _timeout: Duration,
        ) -> Result<Response, String> {
            Ok(Response {
                status: 200,
                body: Box::new(StalledBody),
            })
        }

        fn is_healthy(&self) -> bool {
            true
        }
    }

    fn config(url: &str) -> SyncConfig {
        SyncConfig::new(1, url, "ada@example.com").with_device_id("abc123")
    }

    fn request() -> Request {
        Request {
            command: Command::FolderSync,
            body: Bytes::from_static(b"x"),
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn builds_command_urls() {
        let transport = HttpTransport::new(
            &config("https://mail.example.com"),
            TestClient {
                status: 200,
                ..TestClient::default()
            },
        )
        .unwrap();
        assert_eq!(transport.endpoint().path(), DEFAULT_PATH);
        let response = transport.post(&request()).unwrap();
        assert_eq!(response.status, 200);

        let calls = transport.client.calls.lock();
        let (url, headers) = &calls[0];
        assert_eq!(
            url,
            "https://mail.example.com/Microsoft-Server-ActiveSync?Cmd=FolderSync&User=ada%40example.com&DeviceId=abc123&DeviceType=easync"
        );
        assert!(headers.contains(&("MS-ASProtocolVersion".to_string(), "14.1".to_string())));
        assert!(headers.contains(&("Content-Type".to_string(), CONTENT_TYPE.to_string())));
    }

    #[test]
    fn keeps_an_explicit_path() {
        let transport =
            HttpTransport::new(&config("https://eas.example.com/custom"), TestClient::default())
                .unwrap();
        assert_eq!(transport.endpoint().path(), "/custom");
    }

    #[test]
    fn client_errors_are_retryable() {
        let transport = HttpTransport::new(
            &config("https://mail.example.com"),
            TestClient {
                fail: true,
                ..TestClient::default()
            },
        )
        .unwrap();
        let err = transport.post(&request()).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(transport.last_error().as_deref(), Some("connection refused"));
    }

    #[test]
    fn non_success_statuses_are_returned() {
        let transport = HttpTransport::new(
            &config("https://mail.example.com"),
            TestClient {
                status: 503,
                ..TestClient::default()
            },
        )
        .unwrap();
        assert_eq!(transport.post(&request()).unwrap().status, 503);
        assert_eq!(transport.last_error().as_deref(), Some("HTTP status 503"));
    }

    #[test]
    fn closed_transport_refuses_requests() {
        let transport =
            HttpTransport::new(&config("https://mail.example.com"), TestClient::default()).unwrap();
        transport.close().unwrap();
        assert!(!transport.is_connected());
        assert!(transport.client.aborted.load(Ordering::SeqCst));
        assert!(transport.post(&request()).is_err());
    }

    #[test]
    fn bodies_are_passed_through() {
        let transport = HttpTransport::new(
            &config("https://mail.example.com"),
            TestClient {
                status: 200,
                ..TestClient::default()
            },
        )
        .unwrap();
        let mut response = transport.post(&request()).unwrap();
        let mut body = Vec::new();
        response.body.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"\x03\x01\x6a\x00");
    }

    #[test]
    fn close_cuts_off_a_stalled_body() {
        let transport =
            Arc::new(HttpTransport::new(&config("https://mail.example.com"), StalledClient).unwrap());
        let mut response = transport.post(&request()).unwrap();

        let closer = Arc::clone(&transport);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            closer.close().unwrap();
        });
        let started = Instant::now();
        let mut buf = [0u8; 8];
        let err = response.body.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
        assert!(started.elapsed() < Duration::from_secs(1));
        handle.join().unwrap();
    }

    #[test]
    fn rejects_bad_urls() {
        assert!(matches!(
            HttpTransport::new(&config("mailto:ada@example.com"), TestClient::default()),
            Err(SyncError::Config(_))
        ));
        assert!(HttpTransport::new(&config("::"), TestClient::default()).is_err());
    }
}
