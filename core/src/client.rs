//! Request builder and executor shared by every service module.
//!
//! # Design
//! `Client` holds the parsed store URL, the token provider and an optional
//! debug log. Calls are split into `new_request`, which resolves the URL,
//! runs the option chain and stamps the standard headers, and `execute`,
//! which sends through the token provider's transport and classifies the
//! response. Nothing is retried and nothing is cached between calls; the
//! token is read fresh on every build.

use std::sync::Arc;

use url::{Position, Url};

use crate::config::Config;
use crate::debug::DebugLog;
use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest};
use crate::options::{apply_options, RequestOption};
use crate::response::{check_response, Destination, Response};
use crate::transport::TokenProvider;

pub const API_VERSION: &str = "1";
pub const USER_AGENT: &str = concat!("hsdp-core/", env!("CARGO_PKG_VERSION"));

/// Client for a platform service rooted at one FHIR store.
pub struct Client {
    token_provider: Arc<dyn TokenProvider>,
    config: Config,
    fhir_store_url: Option<Url>,
    user_agent: String,
    debug_log: DebugLog,
}

impl Client {
    /// Create a client. Fails only when the store URL is empty or cannot be
    /// parsed; a debug log that cannot be opened just disables capture.
    pub fn new(token_provider: Arc<dyn TokenProvider>, config: Config) -> Result<Self> {
        let mut client = Self {
            token_provider,
            config,
            fhir_store_url: None,
            user_agent: USER_AGENT.to_string(),
            debug_log: DebugLog::disabled(),
        };
        let store = client.config.fhir_store_url();
        client.set_fhir_store_url(&store)?;

        if let Some(path) = client.config.debug_log.as_deref().filter(|p| !p.is_empty()) {
            client.debug_log = DebugLog::open(path);
        }
        Ok(client)
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// The store URL, always with a trailing `/`. Empty when unset.
    pub fn fhir_store_url(&self) -> String {
        self.fhir_store_url
            .as_ref()
            .map(Url::to_string)
            .unwrap_or_default()
    }

    /// Point the client at another store. A trailing `/` is added when
    /// missing. On failure the client has no store URL until the next
    /// successful call.
    pub fn set_fhir_store_url(&mut self, url: &str) -> Result<()> {
        self.fhir_store_url = None;
        if url.is_empty() {
            return Err(Error::Configuration("FHIR store URL cannot be empty".to_string()));
        }
        let normalized = if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{url}/")
        };
        let parsed = Url::parse(&normalized)
            .map_err(|e| Error::Configuration(format!("invalid FHIR store URL {url:?}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(Error::Configuration(format!("FHIR store URL {url:?} cannot be a base")));
        }
        self.fhir_store_url = Some(parsed);
        Ok(())
    }

    /// Release the debug log. Safe to call more than once.
    pub fn close(&self) {
        self.debug_log.close();
    }

    /// Build a request for `path` relative to the store and root
    /// organization. `path` is used verbatim and must not start with `/`.
    ///
    /// `body` is attached only for POST, PUT and PATCH, which also lose any
    /// query string an option added.
    pub fn new_request(
        &self,
        method: HttpMethod,
        path: &str,
        body: &[u8],
        options: &[RequestOption],
    ) -> Result<HttpRequest> {
        let base = self
            .fhir_store_url
            .as_ref()
            .ok_or_else(|| Error::Configuration("FHIR store URL is not set".to_string()))?;

        let url = format!(
            "{}{}{}/{}",
            &base[..Position::BeforePath],
            base.path(),
            self.config.root_org_id,
            path
        );
        let mut req = HttpRequest::new(method, url);

        apply_options(&mut req, options)?;

        if method.is_mutating() {
            req.query.clear();
            if let Some(start) = req.url.find('?') {
                req.url.truncate(start);
            }
            req.body = Some(body.to_vec());
            req.content_length = Some(body.len());
        } else {
            req.body = None;
            req.content_length = None;
        }

        req.set_header("Accept", "*/*");
        req.set_header("Authorization", format!("Bearer {}", self.token_provider.token()));
        req.set_header("API-Version", API_VERSION);
        if !self.user_agent.is_empty() {
            req.set_header("User-Agent", self.user_agent.clone());
        }
        Ok(req)
    }

    /// Send `request` and classify the response.
    ///
    /// A non-success status yields `Error::NonSuccessStatus` with the
    /// response attached and its body unread. On success the body goes to
    /// `destination`; with `Destination::None` it stays in the returned
    /// response and is released when that response is dropped.
    pub fn execute(&self, request: HttpRequest, destination: Destination<'_>) -> Result<Response> {
        self.debug_log.record_request(&request);

        tracing::debug!(method = %request.method, url = %request.full_url(), "sending request");
        let sent = self.token_provider.transport().send(&request);

        let mut raw = match sent {
            Ok(raw) => raw,
            Err(err) => {
                tracing::debug!(method = %request.method, error = %err, "transport failure");
                return Err(err);
            }
        };
        self.debug_log.record_response(&mut raw);
        tracing::debug!(method = %request.method, status = raw.status, "received response");

        let mut response = check_response(Response::new(raw))?;
        response.read_into(destination)?;
        Ok(response)
    }

    /// `new_request` followed by `execute`.
    pub fn call(
        &self,
        method: HttpMethod,
        path: &str,
        body: &[u8],
        options: &[RequestOption],
        destination: Destination<'_>,
    ) -> Result<Response> {
        let request = self.new_request(method, path, body, options)?;
        self.execute(request, destination)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("fhir_store_url", &self.fhir_store_url())
            .field("root_org_id", &self.config.root_org_id)
            .field("user_agent", &self.user_agent)
            .field("debug_log", &self.debug_log.is_enabled())
            .finish_non_exhaustive()
    }
}
