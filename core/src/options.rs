//! Per-call request options.
//!
//! An option is a mutate-or-fail function over the request being built.
//! Options run in order and the first failure stops the chain; later
//! options never see the request.

use crate::error::OptionError;
use crate::http::HttpRequest;

pub type RequestOption = Box<dyn Fn(&mut HttpRequest) -> Result<(), OptionError> + Send + Sync>;

/// Apply `options` in order, stopping at the first failure.
pub fn apply_options(request: &mut HttpRequest, options: &[RequestOption]) -> Result<(), OptionError> {
    for option in options {
        option(request)?;
    }
    Ok(())
}

/// Set a header. Rejects empty names and values containing line breaks.
pub fn with_header(name: impl Into<String>, value: impl Into<String>) -> RequestOption {
    let name = name.into();
    let value = value.into();
    Box::new(move |req| {
        if name.is_empty() {
            return Err(OptionError::new("header name must not be empty"));
        }
        if value.contains(['\r', '\n']) {
            return Err(OptionError::new(format!("header {name} contains a line break")));
        }
        req.set_header(&name, value.clone());
        Ok(())
    })
}

/// Append a query parameter, percent-encoding key and value.
///
/// The builder drops the query string of POST, PUT and PATCH requests.
pub fn with_query(key: impl Into<String>, value: impl Into<String>) -> RequestOption {
    let key = key.into();
    let value = value.into();
    Box::new(move |req| {
        req.query.push((
            urlencoding::encode(&key).into_owned(),
            urlencoding::encode(&value).into_owned(),
        ));
        Ok(())
    })
}

pub fn with_content_type(content_type: impl Into<String>) -> RequestOption {
    with_header("Content-Type", content_type)
}

/// Conditional update against a resource version (`W/"<version>"`).
pub fn with_if_match(version_id: impl Into<String>) -> RequestOption {
    let version_id = version_id.into();
    Box::new(move |req| {
        if version_id.is_empty() {
            return Err(OptionError::new("version id must not be empty"));
        }
        req.set_header("If-Match", format!("W/\"{version_id}\""));
        Ok(())
    })
}
