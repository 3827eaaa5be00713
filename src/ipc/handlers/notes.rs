use crate::ipc::helpers::{
    now_iso, opt_param, require_workspace, respond, str_param, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Note, TodoItem};
use serde_json::json;
use uuid::Uuid;

const DEFAULT_NOTE_TITLE: &str = "Nouvelle note";

fn handle_notes_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let search = opt_param::<String>(req, "search")?
        .unwrap_or_default()
        .to_lowercase();
    let mut notes: Vec<&Note> = state
        .data
        .notes
        .iter()
        .filter(|n| {
            n.title.to_lowercase().contains(&search) || n.content.to_lowercase().contains(&search)
        })
        .collect();
    // RFC 3339 timestamps in UTC sort lexicographically.
    notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(json!({ "notes": notes }))
}

fn handle_notes_create(state: &mut AppState, req: &Request) -> HandlerResult {
    require_workspace(state)?;
    let note = Note {
        id: Uuid::new_v4().to_string(),
        title: opt_param(req, "title")?.unwrap_or_else(|| DEFAULT_NOTE_TITLE.to_string()),
        content: opt_param(req, "content")?.unwrap_or_default(),
        todos: Vec::new(),
        updated_at: now_iso(),
    };
    let next = state.data.clone().add_note(note.clone())?;
    let persisted = state.commit(next);
    Ok(json!({ "note": note, "persisted": persisted }))
}

fn handle_notes_update(state: &mut AppState, req: &Request) -> HandlerResult {
    require_workspace(state)?;
    let note_id = str_param(req, "noteId")?;
    let next = state.data.clone().update_note(
        &note_id,
        opt_param(req, "title")?,
        opt_param(req, "content")?,
        now_iso(),
    )?;
    let note = next.note(&note_id).cloned();
    let persisted = state.commit(next);
    Ok(json!({ "note": note, "persisted": persisted }))
}

fn handle_notes_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    require_workspace(state)?;
    let note_id = str_param(req, "noteId")?;
    let next = state.data.clone().delete_note(&note_id)?;
    let persisted = state.commit(next);
    Ok(json!({ "ok": true, "persisted": persisted }))
}

fn handle_notes_todo_add(state: &mut AppState, req: &Request) -> HandlerResult {
    require_workspace(state)?;
    let note_id = str_param(req, "noteId")?;
    let todo = TodoItem {
        id: Uuid::new_v4().to_string(),
        text: opt_param(req, "text")?.unwrap_or_default(),
        completed: false,
    };
    let next = state.data.clone().add_todo(&note_id, todo.clone(), now_iso())?;
    let persisted = state.commit(next);
    Ok(json!({ "todo": todo, "persisted": persisted }))
}

fn handle_notes_todo_update(state: &mut AppState, req: &Request) -> HandlerResult {
    require_workspace(state)?;
    let note_id = str_param(req, "noteId")?;
    let todo_id = str_param(req, "todoId")?;
    let next = state.data.clone().update_todo(
        &note_id,
        &todo_id,
        opt_param(req, "text")?,
        opt_param(req, "completed")?,
        now_iso(),
    )?;
    let todo = next
        .note(&note_id)
        .and_then(|n| n.todos.iter().find(|t| t.id == todo_id))
        .cloned();
    let persisted = state.commit(next);
    Ok(json!({ "todo": todo, "persisted": persisted }))
}

fn handle_notes_todo_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    require_workspace(state)?;
    let note_id = str_param(req, "noteId")?;
    let todo_id = str_param(req, "todoId")?;
    let next = state.data.clone().delete_todo(&note_id, &todo_id, now_iso())?;
    let persisted = state.commit(next);
    Ok(json!({ "ok": true, "persisted": persisted }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "notes.list" => handle_notes_list(state, req),
        "notes.create" => handle_notes_create(state, req),
        "notes.update" => handle_notes_update(state, req),
        "notes.delete" => handle_notes_delete(state, req),
        "notes.todoAdd" => handle_notes_todo_add(state, req),
        "notes.todoUpdate" => handle_notes_todo_update(state, req),
        "notes.todoDelete" => handle_notes_todo_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
