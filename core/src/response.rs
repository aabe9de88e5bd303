//! Response wrapper, status classification and decode destinations.
//!
//! # Design
//! `Response` owns the read-once body stream. On a success status the
//! executor either streams it into a raw sink or decodes it into a
//! structured target; on any other status it is handed back untouched,
//! attached to `Error::NonSuccessStatus`.

use std::fmt;
use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::http::{find_header, Body, HttpResponse};

/// Statuses treated as success. Everything else is `NonSuccessStatus`.
pub const SUCCESS_STATUSES: [u16; 5] = [200, 201, 202, 204, 304];

pub fn is_success(status: u16) -> bool {
    SUCCESS_STATUSES.contains(&status)
}

/// Pass a success response through; attach anything else to an error.
pub fn check_response(response: Response) -> Result<Response> {
    if is_success(response.status()) {
        Ok(response)
    } else {
        Err(Error::NonSuccessStatus(Box::new(response)))
    }
}

/// A platform API response.
pub struct Response {
    inner: HttpResponse,
}

impl Response {
    pub fn new(inner: HttpResponse) -> Self {
        Self { inner }
    }

    pub fn status(&self) -> u16 {
        self.inner.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.inner.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.inner.headers, name)
    }

    /// Borrow the body stream.
    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.inner.body
    }

    pub fn into_inner(self) -> HttpResponse {
        self.inner
    }

    pub fn into_string(mut self) -> io::Result<String> {
        let mut body = String::new();
        self.inner.body.read_to_string(&mut body)?;
        Ok(body)
    }

    pub fn into_json<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_reader(self.inner.body)?)
    }

    /// Copy or decode the body into `destination`. Exactly one path runs.
    pub(crate) fn read_into(&mut self, destination: Destination<'_>) -> Result<()> {
        match destination {
            Destination::Raw(sink) => {
                io::copy(&mut self.inner.body, sink)?;
            }
            Destination::Structured(target) => {
                target.decode_from(&mut self.inner.body)?;
            }
            Destination::None => {}
        }
        Ok(())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.inner.status)
            .field("headers", &self.inner.headers)
            .finish_non_exhaustive()
    }
}

/// Where a successful response body goes.
pub enum Destination<'a> {
    /// Stream the body verbatim, no decoding.
    Raw(&'a mut dyn Write),
    /// Decode the body as JSON into the target.
    Structured(&'a mut dyn DecodeTarget),
    /// Leave the body in the returned `Response`.
    None,
}

impl<'a> Destination<'a> {
    pub fn json<T: DeserializeOwned>(target: &'a mut T) -> Self {
        Destination::Structured(target)
    }
}

/// A value that can be overwritten from a JSON body.
pub trait DecodeTarget {
    fn decode_from(&mut self, reader: &mut dyn Read) -> serde_json::Result<()>;
}

impl<T: DeserializeOwned> DecodeTarget for T {
    fn decode_from(&mut self, reader: &mut dyn Read) -> serde_json::Result<()> {
        *self = serde_json::from_reader(reader)?;
        Ok(())
    }
}
