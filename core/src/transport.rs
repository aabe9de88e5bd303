//! Transport and token provider seams.
//!
//! # Design
//! The client never owns an HTTP stack. It borrows the one behind the
//! `TokenProvider`, which in production is the identity service client, so
//! connection reuse and any retry policy that layer applies come along for
//! free. `UreqTransport` is the blocking implementation; tests substitute
//! their own.

use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Something that can put an `HttpRequest` on the wire.
pub trait Transport: Send + Sync {
    /// Send the request. Non-2xx statuses are data, not errors; only
    /// connection-level failures return `Err`.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        (**self).send(request)
    }
}

/// Supplies the bearer token and the transport it was issued on.
pub trait TokenProvider: Send + Sync {
    /// The current token. Empty or stale when not authenticated; the server
    /// answers with a 401 in that case.
    fn token(&self) -> String;

    fn transport(&self) -> &dyn Transport;
}

/// Blocking transport backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let url = request.full_url();
        let headers = request
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()));

        let result = match request.method {
            HttpMethod::Get => headers.fold(self.agent.get(&url), |b, (k, v)| b.header(k, v)).call(),
            HttpMethod::Delete => headers.fold(self.agent.delete(&url), |b, (k, v)| b.header(k, v)).call(),
            HttpMethod::Post => {
                let builder = headers.fold(self.agent.post(&url), |b, (k, v)| b.header(k, v));
                builder.send(request.body.as_deref().unwrap_or_default())
            }
            HttpMethod::Put => {
                let builder = headers.fold(self.agent.put(&url), |b, (k, v)| b.header(k, v));
                builder.send(request.body.as_deref().unwrap_or_default())
            }
            HttpMethod::Patch => {
                let builder = headers.fold(self.agent.patch(&url), |b, (k, v)| b.header(k, v));
                builder.send(request.body.as_deref().unwrap_or_default())
            }
        };
        let response = result.map_err(|e| Error::Transport(Box::new(e)))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.into_body().into_reader();

        Ok(HttpResponse::new(status, headers, body))
    }
}

/// A token held in memory, replaceable at any time.
///
/// Each request reads the token when it is built, so `set_token` takes
/// effect on the next call.
pub struct StaticTokenProvider<T: Transport = UreqTransport> {
    token: RwLock<String>,
    transport: T,
}

impl StaticTokenProvider<UreqTransport> {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_transport(token, UreqTransport::new())
    }
}

impl<T: Transport> StaticTokenProvider<T> {
    pub fn with_transport(token: impl Into<String>, transport: T) -> Self {
        Self {
            token: RwLock::new(token.into()),
            transport,
        }
    }

    pub fn set_token(&self, token: impl Into<String>) {
        let mut guard = match self.token.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = token.into();
    }
}

impl<T: Transport> TokenProvider for StaticTokenProvider<T> {
    fn token(&self) -> String {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn transport(&self) -> &dyn Transport {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_token_rotates() {
        let provider = StaticTokenProvider::new("first");
        assert_eq!(provider.token(), "first");
        provider.set_token("second");
        assert_eq!(provider.token(), "second");
    }

    #[test]
    fn connection_refused_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = UreqTransport::new();
        let req = HttpRequest::new(HttpMethod::Get, format!("http://{addr}/store/fhir/org1/Patient"));
        let err = transport.send(&req).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
