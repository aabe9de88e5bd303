//! Client configuration.

use serde::{Deserialize, Serialize};

/// Settings for one client, fixed at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub region: String,
    pub environment: String,
    /// Tenant segment inserted ahead of every relative path.
    pub root_org_id: String,
    pub cdr_url: String,
    /// Explicit store URL. Defaults to `cdr_url + "/store/fhir/"`.
    pub fhir_store: Option<String>,
    /// Passed through to resource encoders; unused by the transport.
    pub time_zone: String,
    /// Capture file for raw traffic. `None` disables capture.
    pub debug_log: Option<String>,
}

impl Config {
    pub fn new(cdr_url: impl Into<String>, root_org_id: impl Into<String>) -> Self {
        Self {
            cdr_url: cdr_url.into(),
            root_org_id: root_org_id.into(),
            ..Self::default()
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_fhir_store(mut self, fhir_store: impl Into<String>) -> Self {
        self.fhir_store = Some(fhir_store.into());
        self
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    pub fn with_debug_log(mut self, path: impl Into<String>) -> Self {
        self.debug_log = Some(path.into());
        self
    }

    /// The store URL the client resolves requests against.
    pub fn fhir_store_url(&self) -> String {
        match self.fhir_store.as_deref() {
            Some(store) if !store.is_empty() => store.to_string(),
            _ if self.cdr_url.is_empty() => String::new(),
            _ => format!("{}/store/fhir/", self.cdr_url),
        }
    }
}
