//! Generic FHIR STU3 resource service on top of `Client`.
//!
//! Resources are handled as `serde_json::Value`; typed resource models live
//! with the callers that need them.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::http::HttpMethod;
use crate::options::{with_content_type, with_if_match, with_query, RequestOption};
use crate::response::Destination;

pub const FHIR_JSON_STU3: &str = "application/fhir+json;fhirVersion=3.0";

/// CRUD and search for FHIR resources in the client's store.
#[derive(Debug, Clone)]
pub struct ResourceService {
    client: Arc<Client>,
}

impl ResourceService {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn read(&self, resource_type: &str, id: &str) -> Result<Value> {
        let mut resource = Value::Null;
        self.client.call(
            HttpMethod::Get,
            &format!("{resource_type}/{id}"),
            &[],
            &[],
            Destination::json(&mut resource),
        )?;
        Ok(resource)
    }

    /// POST a new resource. The server assigns the id.
    pub fn create(&self, resource: &Value) -> Result<Value> {
        let resource_type = resource_type_of(resource)?;
        let body = encode(resource)?;
        let mut created = Value::Null;
        self.client.call(
            HttpMethod::Post,
            resource_type,
            &body,
            &[with_content_type(FHIR_JSON_STU3)],
            Destination::json(&mut created),
        )?;
        Ok(created)
    }

    /// PUT `resource` at `<type>/<id>`. With `version_id` set the update is
    /// conditional on the current version.
    pub fn update(&self, resource: &Value, version_id: Option<&str>) -> Result<Value> {
        let resource_type = resource_type_of(resource)?;
        let id = resource
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidResource("resource has no id".to_string()))?;
        let body = encode(resource)?;

        let mut options: Vec<RequestOption> = vec![with_content_type(FHIR_JSON_STU3)];
        if let Some(version_id) = version_id {
            options.push(with_if_match(version_id));
        }

        let mut updated = Value::Null;
        self.client.call(
            HttpMethod::Put,
            &format!("{resource_type}/{id}"),
            &body,
            &options,
            Destination::json(&mut updated),
        )?;
        Ok(updated)
    }

    pub fn delete(&self, resource_type: &str, id: &str) -> Result<()> {
        self.client.call(
            HttpMethod::Delete,
            &format!("{resource_type}/{id}"),
            &[],
            &[],
            Destination::None,
        )?;
        Ok(())
    }

    /// Search by query parameters and return the resulting Bundle.
    pub fn search(&self, resource_type: &str, params: &[(&str, &str)]) -> Result<Value> {
        let options: Vec<RequestOption> = params.iter().map(|(k, v)| with_query(*k, *v)).collect();
        let mut bundle = Value::Null;
        self.client.call(
            HttpMethod::Get,
            resource_type,
            &[],
            &options,
            Destination::json(&mut bundle),
        )?;
        Ok(bundle)
    }
}

fn resource_type_of(resource: &Value) -> Result<&str> {
    resource
        .get("resourceType")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidResource("resource has no resourceType".to_string()))
}

fn encode<T: Serialize + ?Sized>(resource: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(resource).map_err(Error::Encode)
}
