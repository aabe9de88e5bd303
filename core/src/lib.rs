//! Shared request/response foundation for platform service clients.
//!
//! # Overview
//! Every service client (FHIR store, identity, scheduling, ...) builds its
//! requests through [`Client::new_request`] and sends them through
//! [`Client::execute`]. The foundation resolves paths under the configured
//! store and root organization, stamps the standard headers with a fresh
//! bearer token, sends through the token provider's transport and sorts
//! responses into success or [`Error::NonSuccessStatus`].
//!
//! # Design
//! - The HTTP stack is borrowed from the [`TokenProvider`], never owned.
//! - Per-call customization is an ordered list of [`RequestOption`]s that
//!   stop at the first failure.
//! - Where a successful body goes is an explicit [`Destination`].
//! - Raw traffic can be captured to a file with [`DebugLog`]; capture never
//!   changes the outcome of a call.

pub mod client;
pub mod config;
pub mod debug;
pub mod error;
pub mod fhir;
pub mod http;
pub mod options;
pub mod response;
pub mod transport;

pub use client::{Client, API_VERSION, USER_AGENT};
pub use config::Config;
pub use debug::DebugLog;
pub use error::{Error, OptionError, Result};
pub use fhir::ResourceService;
pub use http::{Body, HttpMethod, HttpRequest, HttpResponse};
pub use options::{with_content_type, with_header, with_if_match, with_query, RequestOption};
pub use response::{Destination, DecodeTarget, Response};
pub use transport::{StaticTokenProvider, TokenProvider, Transport, UreqTransport};
