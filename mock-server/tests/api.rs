use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, RecordedRequest};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/fhir+json")
        .body(body.to_string())
        .unwrap()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

// --- read ---

#[tokio::test]
async fn read_unknown_resource_returns_operation_outcome() {
    let resp = app().oneshot(get("/store/fhir/org1/Patient/123")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let outcome: Value = body_json(resp).await;
    assert_eq!(outcome["resourceType"], "OperationOutcome");
    assert_eq!(outcome["issue"][0]["code"], "not-found");
}

// --- create ---

#[tokio::test]
async fn create_assigns_id_and_version() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/store/fhir/org1/Patient",
            r#"{"resourceType":"Patient","gender":"female"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let location = resp.headers()[http::header::LOCATION].to_str().unwrap().to_string();
    let created: Value = body_json(resp).await;
    let id = created["id"].as_str().unwrap();
    assert_eq!(location, format!("Patient/{id}/_history/1"));
    assert_eq!(created["meta"]["versionId"], "1");
    assert_eq!(created["gender"], "female");
}

#[tokio::test]
async fn create_rejects_mismatched_resource_type() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/store/fhir/org1/Patient",
            r#"{"resourceType":"Observation"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_rejects_malformed_json() {
    let resp = app()
        .oneshot(json_request("POST", "/store/fhir/org1/Patient", "{not json"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- status ---

#[tokio::test]
async fn status_endpoint_answers_requested_code() {
    for code in [201u16, 403, 404, 500, 503] {
        let resp = app()
            .oneshot(get(&format!("/store/fhir/org1/_status/{code}")))
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), code);
    }

    let resp = app().oneshot(get("/store/fhir/org1/_status/204")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());
}

// --- full lifecycle with journal ---

#[tokio::test]
async fn resource_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // create
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/store/fhir/org1/Patient",
            r#"{"resourceType":"Patient","gender":"male"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = body_json(resp).await;
    let id = created["id"].as_str().unwrap().to_string();

    // search in another org sees nothing
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get("/store/fhir/org2/Patient"))
        .await
        .unwrap();
    let bundle: Value = body_json(resp).await;
    assert_eq!(bundle["total"], 0);

    // search by field
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get("/store/fhir/org1/Patient?gender=male&_count=10"))
        .await
        .unwrap();
    let bundle: Value = body_json(resp).await;
    assert_eq!(bundle["total"], 1);
    assert_eq!(bundle["entry"][0]["resource"]["id"], id.as_str());

    // conditional update with a stale version
    let update = format!(r#"{{"resourceType":"Patient","id":"{id}","gender":"other"}}"#);
    let mut stale = json_request("PUT", &format!("/store/fhir/org1/Patient/{id}"), &update);
    stale
        .headers_mut()
        .insert(http::header::IF_MATCH, "W/\"7\"".parse().unwrap());
    let resp = ServiceExt::ready(&mut app).await.unwrap().call(stale).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);

    // conditional update with the current version
    let mut current = json_request("PUT", &format!("/store/fhir/org1/Patient/{id}"), &update);
    current
        .headers_mut()
        .insert(http::header::IF_MATCH, "W/\"1\"".parse().unwrap());
    let resp = ServiceExt::ready(&mut app).await.unwrap().call(current).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = body_json(resp).await;
    assert_eq!(updated["meta"]["versionId"], "2");
    assert_eq!(updated["gender"], "other");

    // delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(
            Request::builder()
                .method("DELETE")
                .uri(format!("/store/fhir/org1/Patient/{id}"))
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // read after delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get(&format!("/store/fhir/org1/Patient/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // journal saw every call except its own
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get("/__requests"))
        .await
        .unwrap();
    let journal: Vec<RecordedRequest> = body_json(resp).await;
    let methods: Vec<&str> = journal.iter().map(|r| r.method.as_str()).collect();
    assert_eq!(methods, ["POST", "GET", "GET", "PUT", "PUT", "DELETE", "GET"]);
    assert_eq!(journal[2].query.as_deref(), Some("gender=male&_count=10"));
    assert_eq!(journal[0].header("content-type"), Some("application/fhir+json"));
    assert!(journal[0].body.contains("\"gender\":\"male\""));
}
