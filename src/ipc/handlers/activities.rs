use crate::ipc::helpers::{
    non_blank, opt_param, param, require_text, require_workspace, respond, str_param, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Activity, Difficulty, Subject};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityInput {
    title: String,
    date: String,
    subject: Subject,
    #[serde(default)]
    domain: String,
    difficulty: Difficulty,
    #[serde(default)]
    description: String,
    #[serde(default)]
    objective: Option<String>,
    #[serde(default)]
    competencies: String,
    #[serde(default)]
    material: Option<String>,
}

impl ActivityInput {
    fn into_activity(self, id: String) -> Result<Activity, HandlerErr> {
        require_text("title", &self.title)?;
        let date = self.date.trim().to_string();
        if NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_err() {
            return Err(HandlerErr::bad_params("date must be YYYY-MM-DD")
                .with_details(json!({ "date": self.date })));
        }
        Ok(Activity {
            id,
            title: self.title.trim().to_string(),
            date,
            subject: self.subject,
            domain: self.domain.trim().to_string(),
            difficulty: self.difficulty,
            description: self.description,
            objective: non_blank(self.objective),
            competencies: self.competencies,
            material: non_blank(self.material),
        })
    }
}

fn handle_activities_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let subject: Option<Subject> = opt_param(req, "subject")?;
    let activities: Vec<&Activity> = state
        .data
        .activities
        .iter()
        .filter(|a| subject.map_or(true, |s| a.subject == s))
        .collect();
    Ok(json!({ "activities": activities }))
}

fn handle_activities_create(state: &mut AppState, req: &Request) -> HandlerResult {
    require_workspace(state)?;
    let input: ActivityInput = param(req, "activity")?;
    let activity = input.into_activity(Uuid::new_v4().to_string())?;
    let next = state.data.clone().add_activity(activity.clone())?;
    let persisted = state.commit(next);
    Ok(json!({ "activity": activity, "persisted": persisted }))
}

fn handle_activities_update(state: &mut AppState, req: &Request) -> HandlerResult {
    require_workspace(state)?;
    let activity_id = str_param(req, "activityId")?;
    let input: ActivityInput = param(req, "activity")?;
    let activity = input.into_activity(activity_id)?;
    let next = state.data.clone().update_activity(activity.clone())?;
    let persisted = state.commit(next);
    Ok(json!({ "activity": activity, "persisted": persisted }))
}

fn handle_activities_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    require_workspace(state)?;
    let activity_id = str_param(req, "activityId")?;
    let removed_evaluations = state
        .data
        .evaluations
        .iter()
        .filter(|e| e.activity_id == activity_id)
        .count();
    let next = state.data.clone().delete_activity(&activity_id)?;
    let persisted = state.commit(next);
    Ok(json!({
        "ok": true,
        "removed": { "evaluations": removed_evaluations },
        "persisted": persisted
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "activities.list" => handle_activities_list(state, req),
        "activities.create" => handle_activities_create(state, req),
        "activities.update" => handle_activities_update(state, req),
        "activities.delete" => handle_activities_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
