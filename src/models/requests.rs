//! Request DTOs for the hoard server API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;
use serde_json::Value;

use crate::hoard::MAX_KEY_LENGTH;

fn default_key_field() -> String {
    "id".to_string()
}

/// Request body for a batch put (PUT /hoards/:namespace/records)
///
/// # Fields
/// - `key_field`: Field of each value holding its key (default: `id`)
/// - `values`: The values to store
#[derive(Debug, Clone, Deserialize)]
pub struct PutRecordsRequest {
    #[serde(default = "default_key_field")]
    pub key_field: String,
    pub values: Vec<Value>,
}

impl PutRecordsRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    /// Values without a usable key are left to the hoard, which rejects
    /// the batch before writing.
    pub fn validate(&self) -> Option<String> {
        if self.key_field.is_empty() {
            return Some("Key field cannot be empty".to_string());
        }
        if self.values.is_empty() {
            return Some("Values cannot be empty".to_string());
        }
        self.values.iter().find_map(|value| match value.get(&self.key_field) {
            Some(Value::String(key)) => validate_key(key),
            Some(Value::Number(key)) => validate_key(&key.to_string()),
            _ => None,
        })
    }
}

/// Request body for POST /hoards/:namespace/excludes and /lookup
#[derive(Debug, Clone, Deserialize)]
pub struct KeysRequest {
    pub keys: Vec<String>,
}

/// Query string for GET /hoards/:namespace/records
///
/// `keys` is a comma-separated list; order is preserved. Keys containing a
/// comma cannot be named here; use POST /hoards/:namespace/lookup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeysQuery {
    #[serde(default)]
    pub keys: Option<String>,
}

impl KeysQuery {
    pub fn keys(&self) -> Vec<&str> {
        self.keys
            .as_deref()
            .map(|keys| keys.split(',').filter(|k| !k.is_empty()).collect())
            .unwrap_or_default()
    }
}

/// Query string for GET /hoards/:namespace/latest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LatestQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Checks a key taken from a URL path.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_request_default_key_field() {
        let json = r#"{"values": [{"id": "a"}]}"#;
        let req: PutRecordsRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.key_field, "id");
        assert_eq!(req.values.len(), 1);
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_put_request_custom_key_field() {
        let json = r#"{"key_field": "sku", "values": [{"sku": 1}]}"#;
        let req: PutRecordsRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.key_field, "sku");
    }

    #[test]
    fn test_validate_empty_values() {
        let req = PutRecordsRequest {
            key_field: "id".to_string(),
            values: Vec::new(),
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_rejects_long_batch_key() {
        let long = "k".repeat(MAX_KEY_LENGTH + 1);
        let req = PutRecordsRequest {
            key_field: "id".to_string(),
            values: vec![serde_json::json!({"id": "ok"}), serde_json::json!({"id": long})],
        };
        assert!(req.validate().unwrap().contains("maximum length"));

        let req = PutRecordsRequest {
            key_field: "id".to_string(),
            values: vec![serde_json::json!({"id": ""})],
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_keys_request_allows_commas() {
        let req: KeysRequest = serde_json::from_str(r#"{"keys": ["a,b", "c"]}"#).unwrap();
        assert_eq!(req.keys, vec!["a,b", "c"]);
    }

    #[test]
    fn test_keys_query_split() {
        let query = KeysQuery {
            keys: Some("b,a,,c".to_string()),
        };
        assert_eq!(query.keys(), vec!["b", "a", "c"]);
        assert!(KeysQuery::default().keys().is_empty());
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("ok").is_none());
        assert!(validate_key("").is_some());
        assert!(validate_key(&"x".repeat(MAX_KEY_LENGTH + 1)).is_some());
    }
}
