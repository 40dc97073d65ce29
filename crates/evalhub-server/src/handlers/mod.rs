//! HTTP handlers.
//!
//! Every handler authenticates first (when the route requires it), then
//! resolves the resource chain, then applies the access policy.

pub mod answers;
pub mod evaluation_questions;
pub mod evaluations;
pub mod institutions;
pub mod questions;
pub mod sessions;
pub mod system;
pub mod users;

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use evalhub_api::{ApiError, ApiResponse};
use evalhub_core::{NewRecord, Record, ResourceType};
use serde_json::{Map, Value};

pub type ApiResult<T = Value> = Result<ApiResponse<T>, ApiError>;

/// JSON object request body. An empty body reads as `{}`.
#[derive(Debug, Clone, Default)]
pub struct JsonBody(pub Map<String, Value>);

impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(_) => Err(ApiError::bad_request("Request body must be a JSON object")),
            Err(e) => Err(ApiError::bad_request(format!("Invalid JSON body: {e}"))),
        }
    }
}

impl JsonBody {
    /// Attributes nested under `key`, or the top-level object when the
    /// client sent them unwrapped.
    pub fn resource(&self, key: &str) -> Map<String, Value> {
        match self.0.get(key) {
            Some(Value::Object(nested)) => nested.clone(),
            _ => self.0.clone(),
        }
    }
}

/// Keeps only `allowed` keys.
pub(crate) fn permit(attributes: &Map<String, Value>, allowed: &[&str]) -> Map<String, Value> {
    attributes
        .iter()
        .filter(|(key, _)| allowed.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Builds an insert draft, defaulting absent required text columns to `""`
/// so they fail validation with a field message.
pub(crate) fn draft(
    resource_type: ResourceType,
    mut columns: Map<String, Value>,
    required_text: &[&str],
) -> Result<NewRecord, ApiError> {
    for column in required_text {
        columns
            .entry(column.to_string())
            .or_insert_with(|| Value::String(String::new()));
    }
    NewRecord::from_json(resource_type, Value::Object(columns))
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

pub(crate) fn merge(record: &Record, attributes: &Map<String, Value>) -> Result<Record, ApiError> {
    record
        .merged(attributes)
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

/// `{key: value}`
pub(crate) fn wrap(key: &str, value: impl Into<Value>) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value.into());
    Value::Object(map)
}

pub(crate) fn to_json_list(records: &[Record]) -> Value {
    Value::Array(records.iter().map(Record::to_json).collect())
}
