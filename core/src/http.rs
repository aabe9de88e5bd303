//! HTTP transport types shared by the request builder and the transports.
//!
//! # Design
//! `HttpRequest` is plain data: the builder fills it in, options mutate it,
//! and a `Transport` turns it into a wire call. The URL is kept as a string
//! whose path was assembled verbatim so caller-supplied escaping survives;
//! query parameters are kept apart and appended only at send time.
//!
//! `HttpResponse` is what a transport hands back. Its body is a read-once
//! stream so nothing is buffered unless someone asks for it.

use std::fmt;
use std::io::{self, Read};
use std::sync::{Mutex, PoisonError};

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Only POST, PUT and PATCH carry a body.
    pub fn is_mutating(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound request. Built fresh for every call.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Scheme, authority and opaque path. Query pairs belong in `query`;
    /// POST, PUT and PATCH lose anything after a `?` here too.
    pub url: String,
    /// Percent-encoded query pairs, appended by `full_url`.
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub content_length: Option<usize>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            content_length: None,
        }
    }

    /// Replace every header named `name` (case-insensitive) with one value.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// The URL as sent on the wire, query string included.
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.url)
    }

    /// Origin-form target (`/path?query`) used in request dumps.
    pub fn request_target(&self) -> String {
        let full = self.full_url();
        match full.find("://") {
            Some(scheme_end) => {
                let rest = &full[scheme_end + 3..];
                match rest.find('/') {
                    Some(path_start) => rest[path_start..].to_string(),
                    None => "/".to_string(),
                }
            }
            None => full,
        }
    }

    /// Host and port portion of the URL.
    pub fn host(&self) -> &str {
        let rest = match self.url.find("://") {
            Some(i) => &self.url[i + 3..],
            None => self.url.as_str(),
        };
        rest.split('/').next().unwrap_or_default()
    }
}

/// Read-once response body stream.
///
/// Reads take `&mut self` and go through `Mutex::get_mut`, so the lock is
/// never contended. It is there so a body, and any error carrying one, is
/// `Sync` even when the underlying reader is only `Send`.
pub struct Body(Mutex<Box<dyn Read + Send>>);

impl Body {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self(Mutex::new(Box::new(reader)))
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .read(buf)
    }
}

/// A response as returned by a `Transport`.
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl HttpResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            headers,
            body: Body::new(body),
        }
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
