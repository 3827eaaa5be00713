use crate::ipc::helpers::{param, require_workspace, respond, str_param, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::{Evaluation, GradeTier};
use serde::Deserialize;
use serde_json::json;

/// One line of the evaluation sheet; the activity comes from the request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvaluationInput {
    student_id: String,
    #[serde(default = "default_present")]
    is_present: bool,
    #[serde(default)]
    grade: f64,
    #[serde(default)]
    comment: String,
}

fn default_present() -> bool {
    true
}

fn handle_evaluations_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let activity_id = str_param(req, "activityId")?;
    let Some(activity) = state.data.activity(&activity_id) else {
        return Err(HandlerErr::new("not_found", "activity not found"));
    };

    // One row per student, with the stored evaluation when there is one.
    let rows: Vec<serde_json::Value> = state
        .data
        .students
        .iter()
        .map(|s| {
            let evaluation = state
                .data
                .evaluations
                .iter()
                .find(|e| e.activity_id == activity_id && e.student_id == s.id);
            json!({
                "studentId": s.id,
                "displayName": s.display_name(),
                "evaluation": evaluation,
                "tier": evaluation
                    .filter(|e| e.is_present)
                    .map(|e| GradeTier::for_grade(e.grade)),
            })
        })
        .collect();

    Ok(json!({ "activity": activity, "rows": rows }))
}

fn handle_evaluations_save(state: &mut AppState, req: &Request) -> HandlerResult {
    require_workspace(state)?;
    let activity_id = str_param(req, "activityId")?;
    let inputs: Vec<EvaluationInput> = param(req, "evaluations")?;
    let evals: Vec<Evaluation> = inputs
        .into_iter()
        .map(|i| Evaluation {
            student_id: i.student_id,
            activity_id: activity_id.clone(),
            is_present: i.is_present,
            grade: i.grade,
            comment: i.comment,
        })
        .collect();

    let next = state.data.clone().save_evaluations(&activity_id, evals)?;
    let saved = next
        .evaluations
        .iter()
        .filter(|e| e.activity_id == activity_id)
        .count();
    let persisted = state.commit(next);
    Ok(json!({ "saved": saved, "persisted": persisted }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "evaluations.list" => handle_evaluations_list(state, req),
        "evaluations.save" => handle_evaluations_save(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
