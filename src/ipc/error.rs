use serde_json::json;

use crate::report::ReportError;
use crate::state::StateError;

/// Success envelope for request `id`.
pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

/// Failure envelope. `details` is only emitted when present.
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

/// A failed request as seen by the client: stable code, readable message.
#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<StateError> for HandlerErr {
    fn from(e: StateError) -> Self {
        HandlerErr::new(e.code(), e.to_string())
    }
}

impl From<ReportError> for HandlerErr {
    fn from(e: ReportError) -> Self {
        let out = HandlerErr::new(e.code(), e.to_string());
        match e {
            ReportError::GenerationFailed { detail } => out.with_details(json!({ "cause": detail })),
            _ => out,
        }
    }
}

pub type HandlerResult = Result<serde_json::Value, HandlerErr>;

