use crate::db;
use crate::ipc::helpers::{respond, str_param, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::{Cycle, Subject, Week};
use crate::store;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

fn handle_health(state: &mut AppState, _req: &Request) -> HandlerResult {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
        "userId": state.user_id,
        "generatorConfigured": state.generator.is_some(),
    }))
}

/// Opens the workspace database and replaces the in-memory state with what it holds.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let conn = db::open_db(path)?;
    let data = store::load(&conn, &state.user_id);
    info!(
        workspace = %path.display(),
        students = data.students.len(),
        activities = data.activities.len(),
        "workspace opened"
    );
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    state.data = data;
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> HandlerResult {
    let path = PathBuf::from(str_param(req, "path")?);
    open_workspace(state, &path)
        .map_err(|e| HandlerErr::new("db_open_failed", format!("{e:?}")))?;
    Ok(json!({
        "workspacePath": path.to_string_lossy(),
        "counts": {
            "students": state.data.students.len(),
            "activities": state.data.activities.len(),
            "evaluations": state.data.evaluations.len(),
            "weeklyComments": state.data.weekly_comments.len(),
            "aiReports": state.data.ai_reports.len(),
            "notes": state.data.notes.len(),
        }
    }))
}

fn handle_catalog_get(_state: &mut AppState, _req: &Request) -> HandlerResult {
    let subjects: Vec<serde_json::Value> = Subject::ALL
        .into_iter()
        .map(|s| {
            json!({
                "value": s.code(),
                "label": s.label(),
                "domains": s.domain_suggestions(),
            })
        })
        .collect();
    Ok(json!({
        "subjects": subjects,
        "cycles": Cycle::all().map(Cycle::get).collect::<Vec<_>>(),
        "weeks": Week::all().map(Week::get).collect::<Vec<_>>(),
        "tones": ["bienveillant", "neutre", "structuré"],
        "tiers": [
            { "label": "Insuffisant", "below": 5 },
            { "label": "Fragile", "from": 5, "to": 7 },
            { "label": "Acquis", "above": 7 },
        ],
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "health" => handle_health(state, req),
        "workspace.select" => handle_workspace_select(state, req),
        "catalog.get" => handle_catalog_get(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
