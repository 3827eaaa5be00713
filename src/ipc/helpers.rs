use serde::de::DeserializeOwned;

use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};

pub use crate::ipc::error::{HandlerErr, HandlerResult};

pub fn respond(req: &Request, result: HandlerResult) -> serde_json::Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn require_workspace(state: &AppState) -> Result<(), HandlerErr> {
    if state.db.is_none() {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    }
    Ok(())
}

/// Required parameter, decoded with serde.
pub fn param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, HandlerErr> {
    let Some(v) = req.params.get(key) else {
        return Err(HandlerErr::bad_params(format!("missing {key}")));
    };
    serde_json::from_value(v.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid {key}: {e}")))
}

/// Optional parameter; `null` counts as absent.
pub fn opt_param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<Option<T>, HandlerErr> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(_) => param(req, key).map(Some),
    }
}

pub fn str_param(req: &Request, key: &str) -> Result<String, HandlerErr> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        Some(_) => Err(HandlerErr::bad_params(format!("{key} must not be empty"))),
        None => Err(HandlerErr::bad_params(format!("missing {key}"))),
    }
}

pub fn require_text(field: &str, value: &str) -> Result<(), HandlerErr> {
    if value.trim().is_empty() {
        return Err(HandlerErr::bad_params(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Blank optional form fields are stored as absent.
pub fn non_blank(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// ISO-8601 UTC timestamp with millisecond precision.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
