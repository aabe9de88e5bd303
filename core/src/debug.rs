//! Best-effort traffic capture to an append-only file.
//!
//! Requests and responses are written in HTTP/1.1 wire form between start
//! and end markers. Nothing here can fail a call: open errors disable the
//! log, write errors are dropped.

use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::http::{Body, HttpRequest, HttpResponse};

const MARKER: &str = "[hsdp-core]";

/// File-backed capture sink, shared by concurrent calls on one client.
#[derive(Debug, Default)]
pub struct DebugLog {
    file: Mutex<Option<File>>,
}

impl DebugLog {
    /// A log that records nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Open `path` for appending, creating it if needed. Falls back to a
    /// disabled log when the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut options = OpenOptions::new();
        options.append(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        match options.open(path) {
            Ok(file) => Self {
                file: Mutex::new(Some(file)),
            },
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "debug log disabled");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().is_some()
    }

    /// Release the file. Later captures are skipped; closing twice is fine.
    pub fn close(&self) {
        self.lock().take();
    }

    pub fn record_request(&self, request: &HttpRequest) {
        if !self.is_enabled() {
            return;
        }
        let mut out = Vec::new();
        out.extend_from_slice(format!("{MARKER} --- Request start ---\n").as_bytes());
        out.extend_from_slice(
            format!("{} {} HTTP/1.1\r\nHost: {}\r\n", request.method, request.request_target(), request.host()).as_bytes(),
        );
        for (name, value) in &request.headers {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        if let Some(len) = request.content_length {
            out.extend_from_slice(format!("Content-Length: {len}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        if let Some(body) = &request.body {
            out.extend_from_slice(body);
        }
        out.extend_from_slice(format!("\n{MARKER} --- Request end ---\n").as_bytes());
        self.write(&out);
    }

    /// Record `response`, buffering its body so it can still be read. A body
    /// that failed mid-read replays the buffered bytes and then the same
    /// error, so the caller sees what it would have seen uncaptured.
    pub fn record_response(&self, response: &mut HttpResponse) {
        if !self.is_enabled() {
            return;
        }
        let mut body = Vec::new();
        let read = response.body.read_to_end(&mut body);

        let mut out = Vec::new();
        out.extend_from_slice(format!("{MARKER} --- Response start ---\n").as_bytes());
        out.extend_from_slice(format!("HTTP/1.1 {}\r\n", response.status).as_bytes());
        for (name, value) in &response.headers {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&body);
        out.extend_from_slice(format!("\n{MARKER} --- Response end ---\n").as_bytes());
        self.write(&out);

        response.body = match read {
            Ok(_) => Body::new(Cursor::new(body)),
            Err(err) => {
                tracing::trace!(error = %err, "response body failed while capturing");
                Body::new(Cursor::new(body).chain(FailOnce(Some(err))))
            }
        };
    }

    fn write(&self, bytes: &[u8]) {
        if let Some(file) = self.lock().as_mut() {
            if let Err(err) = file.write_all(bytes) {
                tracing::trace!(error = %err, "debug log write failed");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<File>> {
        match self.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Yields its error on the first read and end-of-stream after that.
struct FailOnce(Option<io::Error>);

impl Read for FailOnce {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        match self.0.take() {
            Some(err) => Err(err),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;

    #[test]
    fn unwritable_path_disables_capture() {
        let dir = tempfile::tempdir().unwrap();
        let log = DebugLog::open(dir.path().join("missing").join("debug.log"));
        assert!(!log.is_enabled());
        log.record_request(&HttpRequest::new(HttpMethod::Get, "https://example.org/x"));
    }

    #[test]
    fn request_and_response_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.log");
        let log = DebugLog::open(&path);

        let mut req = HttpRequest::new(HttpMethod::Post, "https://example.org/store/fhir/org1/Patient");
        req.set_header("Authorization", "Bearer abc");
        req.body = Some(br#"{"resourceType":"Patient"}"#.to_vec());
        req.content_length = Some(26);
        log.record_request(&req);

        let mut resp = HttpResponse::new(201, vec![("Location".to_string(), "Patient/1".to_string())], Cursor::new(b"created".to_vec()));
        log.record_response(&mut resp);

        let mut body = String::new();
        resp.body.read_to_string(&mut body).unwrap();
        assert_eq!(body, "created");

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("POST /store/fhir/org1/Patient HTTP/1.1\r\n"));
        assert!(text.contains("Host: example.org\r\n"));
        assert!(text.contains("Content-Length: 26\r\n"));
        assert!(text.contains(r#"{"resourceType":"Patient"}"#));
        assert!(text.contains("HTTP/1.1 201\r\nLocation: Patient/1\r\n\r\ncreated"));
        assert!(text.contains("--- Response end ---"));
    }

    /// Reads `prefix`, then fails with a connection reset.
    struct ResetAfter(Cursor<Vec<u8>>);

    impl Read for ResetAfter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.read(buf)? {
                0 => Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn body_read_failure_is_replayed_after_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.log");
        let log = DebugLog::open(&path);

        let mut resp = HttpResponse::new(200, Vec::new(), ResetAfter(Cursor::new(b"part".to_vec())));
        log.record_response(&mut resp);

        let mut body = Vec::new();
        let err = resp.body.read_to_end(&mut body).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(body, b"part");
        assert!(std::fs::read_to_string(&path).unwrap().contains("part"));
    }

    #[test]
    fn close_is_idempotent_and_stops_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.log");
        let log = DebugLog::open(&path);
        assert!(log.is_enabled());
        log.close();
        log.close();
        assert!(!log.is_enabled());

        log.record_request(&HttpRequest::new(HttpMethod::Get, "https://example.org/x"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
