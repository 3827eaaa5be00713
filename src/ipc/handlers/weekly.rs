use crate::calc;
use crate::ipc::helpers::{opt_param, param, require_workspace, respond, str_param, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::{Cycle, Week, WeeklyComment};
use serde_json::json;

fn handle_weekly_grid(state: &mut AppState, req: &Request) -> HandlerResult {
    let cycle: Cycle = param(req, "cycle")?;
    let ascending: bool = opt_param(req, "ascending")?.unwrap_or(true);
    let rows = calc::weekly_grid(&state.data, cycle, ascending);
    Ok(json!({
        "cycle": cycle,
        "weeks": Week::all().map(Week::get).collect::<Vec<_>>(),
        "rows": rows
    }))
}

fn handle_weekly_save(state: &mut AppState, req: &Request) -> HandlerResult {
    require_workspace(state)?;
    let comment = WeeklyComment {
        student_id: str_param(req, "studentId")?,
        cycle: param(req, "cycle")?,
        week: param(req, "week")?,
        content: opt_param(req, "content")?.unwrap_or_default(),
    };
    let next = state.data.clone().save_weekly_comment(comment.clone())?;
    let persisted = state.commit(next);
    Ok(json!({ "comment": comment, "persisted": persisted }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "weekly.grid" => handle_weekly_grid(state, req),
        "weekly.save" => handle_weekly_save(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
