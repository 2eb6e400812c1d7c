//! Wire messages for the ledger API and their response parsers.
//!
//! Every call is a `POST` with a body of the form `{"input": {...}}`. The
//! ledger gateway is not consistent about response shapes, so each response
//! goes through one explicit parse function that either yields a typed value
//! or a [`ShapeError`] describing what was wrong.

use serde::Serialize;
use serde_json::Value;
use shutter_core::ReplayCounter;

/// Request envelope.
#[derive(Debug, Serialize)]
pub struct ApiInput<T: Serialize> {
    pub input: T,
}

impl<T: Serialize> ApiInput<T> {
    pub fn new(input: T) -> Self {
        Self { input }
    }
}

#[derive(Debug, Serialize)]
pub struct CameraInfoInput {
    #[serde(rename = "_cameraId")]
    pub camera_id: String,
}

#[derive(Debug, Serialize)]
pub struct PhotoHashInput {
    #[serde(rename = "_photoHash")]
    pub photo_hash: String,
}

#[derive(Debug, Serialize)]
pub struct NonceInput {
    #[serde(rename = "_cameraAddress")]
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct RecordPhotoInput {
    #[serde(rename = "_photoHash")]
    pub photo_hash: String,
    #[serde(rename = "_location")]
    pub location: String,
    #[serde(rename = "_metadata")]
    pub metadata: String,
    #[serde(rename = "_signature")]
    pub signature: String,
}

/// Ledger view of a camera. Fetched fresh for every event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthorizationState {
    pub authorized: bool,
    /// Wallet the ledger associates with the camera, if any.
    pub wallet: Option<String>,
}

/// A response body did not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeError(pub String);

impl std::fmt::Display for ShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a `getCameraInfo` response.
///
/// `output.isAuthorized` may be a boolean or the string `"true"` (any case).
/// A missing `output` means the camera is not registered.
pub fn parse_authorization(body: &Value) -> Result<AuthorizationState, ShapeError> {
    let obj = body
        .as_object()
        .ok_or_else(|| ShapeError(format!("expected object, got {body}")))?;
    let output = match obj.get("output") {
        None | Some(Value::Null) => return Ok(AuthorizationState::default()),
        Some(Value::Object(o)) => o,
        Some(other) => return Err(ShapeError(format!("output is not an object: {other}"))),
    };

    let authorized = match output.get("isAuthorized") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    };
    let wallet = output
        .get("walletAddress")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(AuthorizationState { authorized, wallet })
}

/// Parse a `verifyPhoto` response.
///
/// Accepts `{"exists": bool}` and `{"output": {"exists": bool}}`. A missing
/// flag means not registered.
pub fn parse_exists(body: &Value) -> Result<bool, ShapeError> {
    let obj = body
        .as_object()
        .ok_or_else(|| ShapeError(format!("expected object, got {body}")))?;
    if let Some(v) = obj.get("exists").and_then(Value::as_bool) {
        return Ok(v);
    }
    Ok(obj
        .get("output")
        .and_then(|o| o.get("exists"))
        .and_then(Value::as_bool)
        .unwrap_or(false))
}

/// Parse a `getNonce` response.
///
/// `output` may be the counter itself (number or decimal string) or an
/// object holding it under `"0"`, `"_0"` or `"nonce"`.
pub fn parse_counter(body: &Value) -> Result<ReplayCounter, ShapeError> {
    let output = body
        .get("output")
        .ok_or_else(|| ShapeError(format!("counter not found in {body}")))?;
    match output {
        Value::Object(o) => ["0", "_0", "nonce"]
            .iter()
            .find_map(|k| o.get(*k))
            .ok_or_else(|| ShapeError(format!("counter not found in output {output}")))
            .and_then(counter_scalar),
        scalar => counter_scalar(scalar),
    }
}

fn counter_scalar(v: &Value) -> Result<ReplayCounter, ShapeError> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().and_then(integral_u64))
            .map(ReplayCounter)
            .ok_or_else(|| ShapeError(format!("counter is not a u64: {n}"))),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map(ReplayCounter)
            .map_err(|e| ShapeError(format!("counter string {s:?}: {e}"))),
        other => Err(ShapeError(format!("unsupported counter value {other}"))),
    }
}

/// Gateways that decode into float64 send whole counters as `3.0`.
fn integral_u64(f: f64) -> Option<u64> {
    // 2^64 is exactly representable; anything at or above it overflows.
    (f.fract() == 0.0 && f >= 0.0 && f < 18_446_744_073_709_551_616.0).then_some(f as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_authorization_shapes() {
        let state = parse_authorization(&json!({
            "output": {"isAuthorized": true, "walletAddress": "0xabc"}
        }))
        .unwrap();
        assert!(state.authorized);
        assert_eq!(state.wallet.as_deref(), Some("0xabc"));

        let state = parse_authorization(&json!({"output": {"isAuthorized": "TRUE"}})).unwrap();
        assert!(state.authorized);
        assert_eq!(state.wallet, None);

        let state = parse_authorization(&json!({"output": {"isAuthorized": "no", "walletAddress": ""}})).unwrap();
        assert!(!state.authorized);
        assert_eq!(state.wallet, None);

        assert_eq!(parse_authorization(&json!({})).unwrap(), AuthorizationState::default());
        assert!(parse_authorization(&json!([1, 2])).is_err());
        assert!(parse_authorization(&json!({"output": 5})).is_err());
    }

    #[test]
    fn test_exists_shapes() {
        assert!(parse_exists(&json!({"exists": true})).unwrap());
        assert!(parse_exists(&json!({"output": {"exists": true}})).unwrap());
        assert!(!parse_exists(&json!({"output": {"exists": false}})).unwrap());
        assert!(!parse_exists(&json!({"output": {}})).unwrap());
        assert!(!parse_exists(&json!({})).unwrap());
        assert!(parse_exists(&json!("yes")).is_err());
    }

    #[test]
    fn test_counter_shapes() {
        assert_eq!(parse_counter(&json!({"output": 3})).unwrap(), ReplayCounter(3));
        assert_eq!(parse_counter(&json!({"output": "42"})).unwrap(), ReplayCounter(42));
        assert_eq!(parse_counter(&json!({"output": {"0": "7"}})).unwrap(), ReplayCounter(7));
        assert_eq!(parse_counter(&json!({"output": {"_0": 8}})).unwrap(), ReplayCounter(8));
        assert_eq!(parse_counter(&json!({"output": {"nonce": 9}})).unwrap(), ReplayCounter(9));
        assert_eq!(parse_counter(&json!({"output": 3.0})).unwrap(), ReplayCounter(3));
        assert_eq!(parse_counter(&json!({"output": {"0": 12.0}})).unwrap(), ReplayCounter(12));
    }

    #[test]
    fn test_counter_rejects_bad_values() {
        assert!(parse_counter(&json!({})).is_err());
        assert!(parse_counter(&json!({"output": -1})).is_err());
        assert!(parse_counter(&json!({"output": "abc"})).is_err());
        assert!(parse_counter(&json!({"output": {"other": 1}})).is_err());
        assert!(parse_counter(&json!({"output": true})).is_err());
        assert!(parse_counter(&json!({"output": 3.5})).is_err());
        assert!(parse_counter(&json!({"output": -2.0})).is_err());
        assert!(parse_counter(&json!({"output": 1e20})).is_err());
    }

    #[test]
    fn test_record_input_field_names() {
        let body = serde_json::to_value(ApiInput::new(RecordPhotoInput {
            photo_hash: "0x11".into(),
            location: "loc".into(),
            metadata: "meta".into(),
            signature: "ab".into(),
        }))
        .unwrap();
        assert_eq!(
            body,
            json!({"input": {"_photoHash": "0x11", "_location": "loc", "_metadata": "meta", "_signature": "ab"}})
        );
    }
}
