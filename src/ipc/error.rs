use serde_json::json;

use crate::session::SessionError;
use crate::store::StoreError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn store_err(id: &str, code: &str, e: &StoreError) -> serde_json::Value {
    match e {
        StoreError::LockPoisoned => err(id, "db_unavailable", e.to_string(), None),
        _ => err(id, code, e.to_string(), None),
    }
}

pub fn session_err(id: &str, e: &SessionError) -> serde_json::Value {
    match e {
        SessionError::Busy(phase) => err(
            id,
            "session_busy",
            e.to_string(),
            Some(json!({ "phase": phase })),
        ),
        SessionError::InvalidTransition { phase, action } => err(
            id,
            "invalid_transition",
            e.to_string(),
            Some(json!({ "phase": phase, "action": action })),
        ),
    }
}
