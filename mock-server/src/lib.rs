use std::{collections::HashMap, sync::Arc};

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// One request as it arrived on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Resources keyed by (root org, resource type, id).
#[derive(Default)]
pub struct Store {
    resources: HashMap<(String, String, String), Value>,
    journal: Vec<RecordedRequest>,
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/__requests", get(list_requests))
        .route("/store/fhir/{org}/_status/{code}", get(status).post(status))
        .route(
            "/store/fhir/{org}/{resource_type}",
            get(search_resources).post(create_resource),
        )
        .route(
            "/store/fhir/{org}/{resource_type}/{id}",
            get(read_resource).put(update_resource).delete(delete_resource),
        )
        .layer(middleware::from_fn_with_state(db.clone(), record))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn record(State(db): State<Db>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    if parts.uri.path() != "/__requests" {
        let recorded = RecordedRequest {
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts
                .headers
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
                .collect(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        };
        tracing::debug!(method = %recorded.method, path = %recorded.path, "recorded request");
        db.write().await.journal.push(recorded);
    }
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

async fn list_requests(State(db): State<Db>) -> Json<Vec<RecordedRequest>> {
    Json(db.read().await.journal.clone())
}

/// Answer with any status and an OperationOutcome describing it.
async fn status(Path((_org, code)): Path<(String, u16)>) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
        return status.into_response();
    }
    outcome(status, "processing", &format!("requested status {code}"))
}

async fn search_resources(
    State(db): State<Db>,
    Path((org, resource_type)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let store = db.read().await;
    let mut matches: Vec<&Value> = store
        .resources
        .iter()
        .filter(|((o, t, _), _)| *o == org && *t == resource_type)
        .map(|(_, resource)| resource)
        .filter(|resource| {
            params.iter().all(|(key, expected)| {
                let field = match key.as_str() {
                    "_id" => "id",
                    other if other.starts_with('_') => return true,
                    other => other,
                };
                resource.get(field).and_then(Value::as_str) == Some(expected.as_str())
            })
        })
        .collect();
    matches.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));

    let entries: Vec<Value> = matches
        .into_iter()
        .map(|resource| json!({ "resource": resource }))
        .collect();
    Json(json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "total": entries.len(),
        "entry": entries,
    }))
}

async fn create_resource(
    State(db): State<Db>,
    Path((org, resource_type)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let mut resource = match parse_resource(&body, &resource_type) {
        Ok(resource) => resource,
        Err(response) => return response,
    };
    let id = Uuid::new_v4().to_string();
    resource["id"] = json!(id);
    resource["meta"] = json!({ "versionId": "1" });

    db.write()
        .await
        .resources
        .insert((org, resource_type.clone(), id.clone()), resource.clone());

    let location = format!("{resource_type}/{id}/_history/1");
    (StatusCode::CREATED, [(header::LOCATION, location)], Json(resource)).into_response()
}

async fn read_resource(
    State(db): State<Db>,
    Path((org, resource_type, id)): Path<(String, String, String)>,
) -> Response {
    let store = db.read().await;
    match store.resources.get(&(org, resource_type.clone(), id.clone())) {
        Some(resource) => Json(resource.clone()).into_response(),
        None => outcome(
            StatusCode::NOT_FOUND,
            "not-found",
            &format!("{resource_type}/{id} is not known"),
        ),
    }
}

async fn update_resource(
    State(db): State<Db>,
    Path((org, resource_type, id)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut resource = match parse_resource(&body, &resource_type) {
        Ok(resource) => resource,
        Err(response) => return response,
    };
    if resource.get("id").and_then(Value::as_str) != Some(id.as_str()) {
        return outcome(StatusCode::BAD_REQUEST, "invalid", "resource id does not match URL");
    }

    let mut store = db.write().await;
    let key = (org, resource_type, id);
    let current_version = store
        .resources
        .get(&key)
        .and_then(|r| r["meta"]["versionId"].as_str())
        .and_then(|v| v.parse::<u64>().ok());

    if let Some(if_match) = headers.get(header::IF_MATCH).and_then(|v| v.to_str().ok()) {
        let expected = current_version.map(|v| format!("W/\"{v}\""));
        if expected.as_deref() != Some(if_match) {
            return outcome(StatusCode::PRECONDITION_FAILED, "conflict", "version mismatch");
        }
    }

    let next_version = current_version.map_or(1, |v| v + 1);
    resource["meta"] = json!({ "versionId": next_version.to_string() });
    store.resources.insert(key, resource.clone());

    let status = if current_version.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    (status, Json(resource)).into_response()
}

async fn delete_resource(
    State(db): State<Db>,
    Path((org, resource_type, id)): Path<(String, String, String)>,
) -> Response {
    let mut store = db.write().await;
    match store.resources.remove(&(org, resource_type, id)) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => outcome(StatusCode::NOT_FOUND, "not-found", "nothing to delete"),
    }
}

fn parse_resource(body: &[u8], resource_type: &str) -> Result<Value, Response> {
    let resource: Value = serde_json::from_slice(body)
        .map_err(|e| outcome(StatusCode::BAD_REQUEST, "structure", &e.to_string()))?;
    if resource.get("resourceType").and_then(Value::as_str) != Some(resource_type) {
        return Err(outcome(
            StatusCode::BAD_REQUEST,
            "invalid",
            &format!("expected resourceType {resource_type}"),
        ));
    }
    Ok(resource)
}

fn outcome(status: StatusCode, code: &str, diagnostics: &str) -> Response {
    let body = json!({
        "resourceType": "OperationOutcome",
        "issue": [{ "severity": "error", "code": code, "diagnostics": diagnostics }],
    });
    (status, Json(body)).into_response()
}
