//! Common test utilities for deckmend-engine workflow tests.

use std::time::Duration;

use deckmend_engine::{AnkiStore, ClientBuilder};
use serde::Serialize;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate, Times};

/// Start a new mock server for testing.
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Create an AnkiStore connected to the mock server.
pub fn store_for_mock(server: &MockServer) -> AnkiStore {
    AnkiStore::new(ClientBuilder::new().url(server.uri()).build())
}

/// Create an AnkiStore whose client gives up after `timeout`.
#[allow(dead_code)]
pub fn store_with_timeout(server: &MockServer, timeout: Duration) -> AnkiStore {
    AnkiStore::new(
        ClientBuilder::new()
            .url(server.uri())
            .timeout(timeout)
            .build(),
    )
}

/// Create a successful AnkiConnect response.
pub fn mock_anki_response<T: Serialize>(result: T) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "result": result,
        "error": null
    }))
}

/// Create an error AnkiConnect response.
#[allow(dead_code)]
pub fn mock_anki_error(error: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "result": null,
        "error": error
    }))
}

/// A `notesInfo` entry for a two-field note type.
#[allow(dead_code)]
pub fn note_info(id: i64, model: &str, fields: [(&str, &str); 2]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (order, (name, value)) in fields.iter().enumerate() {
        map.insert(
            name.to_string(),
            serde_json::json!({"value": value, "order": order}),
        );
    }
    serde_json::json!({
        "noteId": id,
        "modelName": model,
        "tags": ["PSYC2240"],
        "fields": map,
        "cards": [id * 10]
    })
}

/// Mount a mock for a specific action (expect exactly 1 call).
pub async fn mock_action(server: &MockServer, action: &str, response: ResponseTemplate) {
    mock_action_times(server, action, response, 1).await;
}

/// Mount a mock for a specific action with expected call count.
pub async fn mock_action_times(
    server: &MockServer,
    action: &str,
    response: ResponseTemplate,
    times: u64,
) {
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "action": action,
            "version": 6
        })))
        .respond_with(response)
        .expect(Times::from(times))
        .mount(server)
        .await;
}

/// Mount a mock matching an action and a subset of its params (expect exactly 1 call).
#[allow(dead_code)]
pub async fn mock_action_with_params(
    server: &MockServer,
    action: &str,
    params: serde_json::Value,
    response: ResponseTemplate,
) {
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "action": action,
            "version": 6,
            "params": params
        })))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}
