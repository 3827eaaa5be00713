use crate::calc::{self, SortOption};
use crate::csv_export;
use crate::ipc::helpers::{opt_param, param, respond, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::Cycle;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_synthesis_rows(state: &mut AppState, req: &Request) -> HandlerResult {
    let cycle: Cycle = param(req, "cycle")?;
    let search: String = opt_param(req, "search")?.unwrap_or_default();
    let sort: SortOption = opt_param(req, "sort")?.unwrap_or_default();
    let rows = calc::synthesis_rows(&state.data, cycle, &search, sort);
    Ok(json!({ "cycle": cycle, "rows": rows }))
}

/// Builds the synthesis CSV. With `outDir` the file is also written there;
/// nothing is produced when there are no students.
fn handle_synthesis_export_csv(state: &mut AppState, req: &Request) -> HandlerResult {
    let cycle: Cycle = param(req, "cycle")?;
    let out_dir: Option<PathBuf> = opt_param::<String>(req, "outDir")?.map(PathBuf::from);
    let stem = csv_export::synthesis_file_stem(cycle);
    let filename = format!("{stem}.csv");
    let records = csv_export::synthesis_records(&state.data, cycle);

    let export_err = |e: anyhow::Error| HandlerErr::new("export_failed", format!("{e:#}"));
    let (content, path) = match out_dir {
        Some(dir) => match csv_export::write_csv_file(&dir, &stem, &records).map_err(export_err)? {
            Some((path, content)) => (Some(content), Some(path)),
            None => (None, None),
        },
        None => (csv_export::to_csv(&records).map_err(export_err)?, None),
    };

    if let Some(p) = &path {
        info!(path = %p.display(), rows = records.len(), "synthesis exported");
    }
    Ok(json!({
        "filename": filename,
        "written": path.is_some(),
        "path": path.map(|p| p.to_string_lossy().to_string()),
        "content": content,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "synthesis.rows" => handle_synthesis_rows(state, req),
        "synthesis.exportCsv" => handle_synthesis_export_csv(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
