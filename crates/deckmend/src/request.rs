//! Wire envelope for the AnkiConnect protocol (version 6).

use serde::{Deserialize, Serialize};

/// Every request is `{"action", "version": 6, "key"?, "params"?}`.
#[derive(Debug, Serialize)]
pub(crate) struct AnkiRequest<'a, T> {
    pub action: &'a str,
    pub version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<T>,
}

const PROTOCOL_VERSION: u8 = 6;

impl<'a, T> AnkiRequest<'a, T> {
    pub fn new(action: &'a str, params: T, key: Option<&'a str>) -> Self {
        Self {
            action,
            version: PROTOCOL_VERSION,
            key,
            params: Some(params),
        }
    }

    pub fn without_params(action: &'a str, key: Option<&'a str>) -> AnkiRequest<'a, ()> {
        AnkiRequest {
            action,
            version: PROTOCOL_VERSION,
            key,
            params: None,
        }
    }
}

/// Exactly one of `result` and `error` is expected to be non-null.
#[derive(Debug, Deserialize)]
pub(crate) struct AnkiResponse<T> {
    pub result: Option<T>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_omits_absent_key_and_params() {
        let request = AnkiRequest::<()>::without_params("deckNames", None);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({"action": "deckNames", "version": 6}));
    }

    #[test]
    fn request_carries_key_and_params() {
        let request = AnkiRequest::new("findNotes", json!({"query": "deck:X"}), Some("secret"));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["key"], "secret");
        assert_eq!(value["params"]["query"], "deck:X");
    }

    #[test]
    fn response_with_null_result_deserializes() {
        let response: AnkiResponse<Vec<i64>> =
            serde_json::from_str(r#"{"result": null, "error": "boom"}"#).unwrap();
        assert!(response.result.is_none());
        assert_eq!(response.error.as_deref(), Some("boom"));
    }
}
