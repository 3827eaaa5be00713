use crate::calc;
use crate::ipc::helpers::{
    non_blank, opt_param, param, require_text, require_workspace, respond, str_param, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Cycle, Student};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudentInput {
    first_name: String,
    last_name: String,
    #[serde(default)]
    observations: String,
    #[serde(default)]
    birth_date: Option<String>,
    #[serde(default)]
    parent_phones: Option<String>,
}

impl StudentInput {
    fn into_student(self, id: String) -> Result<Student, HandlerErr> {
        require_text("firstName", &self.first_name)?;
        require_text("lastName", &self.last_name)?;
        Ok(Student {
            id,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            observations: self.observations,
            birth_date: non_blank(self.birth_date),
            parent_phones: non_blank(self.parent_phones),
        })
    }
}

fn handle_students_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let search: String = opt_param(req, "search")?.unwrap_or_default();
    let students = calc::search_students(&state.data, &search);
    Ok(json!({ "students": students }))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> HandlerResult {
    require_workspace(state)?;
    let input: StudentInput = param(req, "student")?;
    let student = input.into_student(Uuid::new_v4().to_string())?;
    let next = state.data.clone().add_student(student.clone())?;
    let persisted = state.commit(next);
    Ok(json!({ "student": student, "persisted": persisted }))
}

fn handle_students_update(state: &mut AppState, req: &Request) -> HandlerResult {
    require_workspace(state)?;
    let student_id = str_param(req, "studentId")?;
    let input: StudentInput = param(req, "student")?;
    let student = input.into_student(student_id)?;
    let next = state.data.clone().update_student(student.clone())?;
    let persisted = state.commit(next);
    Ok(json!({ "student": student, "persisted": persisted }))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    require_workspace(state)?;
    let student_id = str_param(req, "studentId")?;
    let before = &state.data;
    let removed = json!({
        "evaluations": before.evaluations.iter().filter(|e| e.student_id == student_id).count(),
        "weeklyComments": before.weekly_comments.iter().filter(|c| c.student_id == student_id).count(),
        "aiReports": before.ai_reports.iter().filter(|r| r.student_id == student_id).count(),
    });
    let next = state.data.clone().delete_student(&student_id)?;
    let persisted = state.commit(next);
    Ok(json!({ "ok": true, "removed": removed, "persisted": persisted }))
}

fn handle_students_profile(state: &mut AppState, req: &Request) -> HandlerResult {
    let student_id = str_param(req, "studentId")?;
    let cycle: Cycle = opt_param(req, "cycle")?.unwrap_or_default();
    let Some(student) = state.data.student(&student_id) else {
        return Err(HandlerErr::new("not_found", "student not found"));
    };
    let profile = calc::student_profile(&state.data, student, cycle);
    Ok(json!({ "profile": profile }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => handle_students_list(state, req),
        "students.create" => handle_students_create(state, req),
        "students.update" => handle_students_update(state, req),
        "students.delete" => handle_students_delete(state, req),
        "students.profile" => handle_students_profile(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
