use crate::backup;
use crate::ipc::helpers::{require_workspace, respond, str_param, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_backup_export(state: &mut AppState, req: &Request) -> HandlerResult {
    require_workspace(state)?;
    let out_path = PathBuf::from(str_param(req, "outPath")?);
    let summary = backup::export_bundle(&state.data, &out_path)
        .map_err(|e| HandlerErr::new("io_failed", format!("{e:#}")))?;
    info!(path = %out_path.display(), "backup exported");
    Ok(json!({
        "ok": true,
        "path": out_path.to_string_lossy(),
        "bundleFormat": summary.bundle_format,
        "entryCount": summary.entry_count,
        "sha256": summary.sha256,
    }))
}

/// Replaces the current user's state with the bundle contents.
fn handle_backup_import(state: &mut AppState, req: &Request) -> HandlerResult {
    require_workspace(state)?;
    let in_path = PathBuf::from(str_param(req, "inPath")?);
    let summary = backup::import_bundle(&in_path)
        .map_err(|e| HandlerErr::new("import_failed", format!("{e:#}")))?;
    let counts = json!({
        "students": summary.data.students.len(),
        "activities": summary.data.activities.len(),
        "evaluations": summary.data.evaluations.len(),
        "weeklyComments": summary.data.weekly_comments.len(),
        "aiReports": summary.data.ai_reports.len(),
        "notes": summary.data.notes.len(),
    });
    let persisted = state.commit(summary.data);
    info!(path = %in_path.display(), format = %summary.bundle_format_detected, "backup imported");
    Ok(json!({
        "ok": true,
        "bundleFormatDetected": summary.bundle_format_detected,
        "counts": counts,
        "persisted": persisted,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "backup.export" => handle_backup_export(state, req),
        "backup.import" => handle_backup_import(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
