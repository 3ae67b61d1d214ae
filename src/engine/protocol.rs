#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ItemOutcome;
use crate::document::QueryDocument;
use crate::error::{EngineError, ExecutorError};

/// Request envelope carrying one batch.
#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    batch: &'a [QueryDocument],
    transaction: Option<Value>,
}

/// Response envelope. Exactly one of the fields is expected.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchResponse {
    #[serde(default)]
    batch_result: Option<Vec<Value>>,
    #[serde(default)]
    errors: Option<Vec<RawEngineError>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEngineError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    user_facing_error: Option<UserFacingError>,
}

#[derive(Debug, Deserialize)]
struct UserFacingError {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    meta: Option<Value>,
}

impl From<RawEngineError> for EngineError {
    fn from(raw: RawEngineError) -> Self {
        let (code, user_message, meta) = match raw.user_facing_error {
            Some(ufe) => (ufe.error_code, ufe.message, ufe.meta),
            None => (None, None, None),
        };
        let message = user_message
            .or(raw.message)
            .or(raw.error)
            .unwrap_or_else(|| "unknown engine error".to_string());
        EngineError {
            code,
            message,
            meta,
        }
    }
}

/// Encodes `batch` as the engine's request envelope.
pub fn encode_batch(batch: &[QueryDocument]) -> Result<String, ExecutorError> {
    serde_json::to_string(&BatchRequest {
        batch,
        transaction: None,
    })
    .map_err(ExecutorError::transport)
}

/// Decodes a batch response, checking it answers `expected` items.
///
/// Top-level `errors` reject the whole batch; per-item `errors` only reject
/// their own position.
pub fn decode_batch(response: &str, expected: usize) -> Result<Vec<ItemOutcome>, ExecutorError> {
    let envelope: BatchResponse =
        serde_json::from_str(response).map_err(ExecutorError::protocol)?;
    if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
        let first = errors.into_iter().next().unwrap_or_default();
        return Err(ExecutorError::Rejected(EngineError::from(first).to_string()));
    }
    let items = envelope
        .batch_result
        .ok_or_else(|| ExecutorError::Protocol("response carries no batchResult".into()))?;
    if items.len() != expected {
        return Err(ExecutorError::Protocol(format!(
            "batch of {expected} queries answered with {} results",
            items.len()
        )));
    }
    Ok(items.into_iter().map(decode_item).collect())
}

/// Decodes one `batchResult` entry.
pub fn decode_item(item: Value) -> ItemOutcome {
    let Value::Object(mut fields) = item else {
        return Err(EngineError::new("malformed batch item: expected an object"));
    };
    if let Some(errors) = fields.remove("errors") {
        let mut errors: Vec<RawEngineError> = serde_json::from_value(errors).map_err(|err| {
            EngineError::new(format!("malformed batch item errors: {err}"))
        })?;
        if !errors.is_empty() {
            return Err(errors.swap_remove(0).into());
        }
    }
    match fields.remove("data") {
        Some(data) => Ok(unpack_data(data)),
        None => Err(EngineError::new("malformed batch item: missing data")),
    }
}

/// Strips the single action key the engine wraps each result in.
fn unpack_data(data: Value) -> Value {
    match data {
        Value::Object(map) if map.len() == 1 => {
            map.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null)
        }
        other => other,
    }
}
