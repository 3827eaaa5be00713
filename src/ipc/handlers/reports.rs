use crate::ipc::helpers::{
    now_iso, opt_param, param, require_workspace, respond, str_param, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{AiReport, Cycle, ReportKey};
use crate::report::{self, Tone};
use serde_json::json;

fn handle_reports_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let key = ReportKey {
        student_id: str_param(req, "studentId")?,
        cycle: param(req, "cycle")?,
    };
    Ok(json!({ "report": state.data.report(&key) }))
}

fn handle_reports_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let cycle: Option<Cycle> = opt_param(req, "cycle")?;
    let reports: Vec<&AiReport> = state
        .data
        .ai_reports
        .iter()
        .filter(|r| cycle.map_or(true, |c| r.cycle == c))
        .collect();
    Ok(json!({ "reports": reports }))
}

/// Stores teacher-edited text in place of the current report.
fn handle_reports_save(state: &mut AppState, req: &Request) -> HandlerResult {
    require_workspace(state)?;
    let report = AiReport {
        student_id: str_param(req, "studentId")?,
        cycle: param(req, "cycle")?,
        content: param(req, "content")?,
        generated_at: now_iso(),
    };
    let next = state.data.clone().save_report(report.clone())?;
    let persisted = state.commit(next);
    Ok(json!({ "report": report, "persisted": persisted }))
}

fn handle_reports_generate(state: &mut AppState, req: &Request) -> HandlerResult {
    require_workspace(state)?;
    let student_id = str_param(req, "studentId")?;
    let cycle: Cycle = param(req, "cycle")?;
    let tone: Tone = opt_param(req, "tone")?.unwrap_or_default();

    let report = report::draft_report(
        &state.data,
        state.generator.as_deref(),
        &student_id,
        cycle,
        tone,
        now_iso(),
    )
    .map_err(HandlerErr::from)?;

    let next = state.data.clone().save_report(report.clone())?;
    let persisted = state.commit(next);
    Ok(json!({ "report": report, "persisted": persisted }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "reports.get" => handle_reports_get(state, req),
        "reports.list" => handle_reports_list(state, req),
        "reports.save" => handle_reports_save(state, req),
        "reports.generate" => handle_reports_generate(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
