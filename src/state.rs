//! Named state transitions over [`AppData`].
//!
//! Every operation consumes the current value and returns the next one, so a
//! caller can persist the result before swapping it in. Failed operations leave
//! the caller's copy untouched.

use crate::model::{
    Activity, AiReport, AppData, Evaluation, Note, RowKey, Student, TodoItem, WeeklyComment,
    GRADE_MAX,
};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StateError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} already exists: {id}")]
    Duplicate { kind: &'static str, id: String },
    #[error("{0}")]
    Invalid(String),
}

impl StateError {
    pub fn code(&self) -> &'static str {
        match self {
            StateError::NotFound { .. } => "not_found",
            StateError::Duplicate { .. } => "conflict",
            StateError::Invalid(_) => "bad_params",
        }
    }

    fn not_found(kind: &'static str, id: &str) -> Self {
        StateError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

pub type StateResult = Result<AppData, StateError>;

impl AppData {
    pub fn add_student(mut self, student: Student) -> StateResult {
        if self.student(&student.id).is_some() {
            return Err(StateError::Duplicate {
                kind: "student",
                id: student.id,
            });
        }
        self.students.push(student);
        Ok(self)
    }

    pub fn update_student(mut self, updated: Student) -> StateResult {
        let Some(slot) = self.students.iter_mut().find(|s| s.id == updated.id) else {
            return Err(StateError::not_found("student", &updated.id));
        };
        *slot = updated;
        Ok(self)
    }

    /// Removes the student and every evaluation, weekly comment and report
    /// that references it.
    pub fn delete_student(mut self, id: &str) -> StateResult {
        if self.student(id).is_none() {
            return Err(StateError::not_found("student", id));
        }
        self.students.retain(|s| s.id != id);
        self.evaluations.retain(|e| e.student_id != id);
        self.weekly_comments.retain(|c| c.student_id != id);
        self.ai_reports.retain(|r| r.student_id != id);
        Ok(self)
    }

    pub fn add_activity(mut self, activity: Activity) -> StateResult {
        if self.activity(&activity.id).is_some() {
            return Err(StateError::Duplicate {
                kind: "activity",
                id: activity.id,
            });
        }
        self.activities.push(activity);
        Ok(self)
    }

    pub fn update_activity(mut self, updated: Activity) -> StateResult {
        let Some(slot) = self.activities.iter_mut().find(|a| a.id == updated.id) else {
            return Err(StateError::not_found("activity", &updated.id));
        };
        *slot = updated;
        Ok(self)
    }

    /// Removes the activity and every evaluation recorded against it.
    pub fn delete_activity(mut self, id: &str) -> StateResult {
        if self.activity(id).is_none() {
            return Err(StateError::not_found("activity", id));
        }
        self.activities.retain(|a| a.id != id);
        self.evaluations.retain(|e| e.activity_id != id);
        Ok(self)
    }

    /// Replaces the whole evaluation set of one activity.
    ///
    /// Several entries for the same student collapse to the last one.
    pub fn save_evaluations(mut self, activity_id: &str, evals: Vec<Evaluation>) -> StateResult {
        if self.activity(activity_id).is_none() {
            return Err(StateError::not_found("activity", activity_id));
        }
        for e in &evals {
            if e.activity_id != activity_id {
                return Err(StateError::Invalid(format!(
                    "evaluation for activity {} submitted under activity {}",
                    e.activity_id, activity_id
                )));
            }
            if self.student(&e.student_id).is_none() {
                return Err(StateError::not_found("student", &e.student_id));
            }
            validate_grade(e.grade)?;
        }

        let mut order: Vec<String> = Vec::new();
        let mut by_student: HashMap<String, Evaluation> = HashMap::new();
        for e in evals {
            if !by_student.contains_key(&e.student_id) {
                order.push(e.student_id.clone());
            }
            by_student.insert(e.student_id.clone(), e);
        }

        self.evaluations.retain(|e| e.activity_id != activity_id);
        self.evaluations
            .extend(order.iter().filter_map(|sid| by_student.remove(sid)));
        Ok(self)
    }

    pub fn save_weekly_comment(mut self, comment: WeeklyComment) -> StateResult {
        if self.student(&comment.student_id).is_none() {
            return Err(StateError::not_found("student", &comment.student_id));
        }
        let key = comment.key();
        self.weekly_comments.retain(|c| c.key() != key);
        self.weekly_comments.push(comment);
        Ok(self)
    }

    /// At most one report per student and cycle; the newer one wins.
    pub fn save_report(mut self, report: AiReport) -> StateResult {
        if self.student(&report.student_id).is_none() {
            return Err(StateError::not_found("student", &report.student_id));
        }
        let key = report.key();
        self.ai_reports.retain(|r| r.key() != key);
        self.ai_reports.push(report);
        Ok(self)
    }

    pub fn add_note(mut self, note: Note) -> StateResult {
        if self.note(&note.id).is_some() {
            return Err(StateError::Duplicate {
                kind: "note",
                id: note.id,
            });
        }
        self.notes.push(note);
        Ok(self)
    }

    pub fn update_note(
        self,
        id: &str,
        title: Option<String>,
        content: Option<String>,
        updated_at: String,
    ) -> StateResult {
        self.edit_note(id, updated_at, |note| {
            if let Some(t) = title {
                note.title = t;
            }
            if let Some(c) = content {
                note.content = c;
            }
            Ok(())
        })
    }

    pub fn delete_note(mut self, id: &str) -> StateResult {
        if self.note(id).is_none() {
            return Err(StateError::not_found("note", id));
        }
        self.notes.retain(|n| n.id != id);
        Ok(self)
    }

    pub fn add_todo(self, note_id: &str, todo: TodoItem, updated_at: String) -> StateResult {
        self.edit_note(note_id, updated_at, |note| {
            note.todos.push(todo);
            Ok(())
        })
    }

    pub fn update_todo(
        self,
        note_id: &str,
        todo_id: &str,
        text: Option<String>,
        completed: Option<bool>,
        updated_at: String,
    ) -> StateResult {
        self.edit_note(note_id, updated_at, |note| {
            let Some(todo) = note.todos.iter_mut().find(|t| t.id == todo_id) else {
                return Err(StateError::not_found("todo", todo_id));
            };
            if let Some(t) = text {
                todo.text = t;
            }
            if let Some(c) = completed {
                todo.completed = c;
            }
            Ok(())
        })
    }

    pub fn delete_todo(self, note_id: &str, todo_id: &str, updated_at: String) -> StateResult {
        self.edit_note(note_id, updated_at, |note| {
            if !note.todos.iter().any(|t| t.id == todo_id) {
                return Err(StateError::not_found("todo", todo_id));
            }
            note.todos.retain(|t| t.id != todo_id);
            Ok(())
        })
    }

    fn edit_note<F>(mut self, id: &str, updated_at: String, f: F) -> StateResult
    where
        F: FnOnce(&mut Note) -> Result<(), StateError>,
    {
        let Some(note) = self.notes.iter_mut().find(|n| n.id == id) else {
            return Err(StateError::not_found("note", id));
        };
        f(note)?;
        note.updated_at = updated_at;
        Ok(self)
    }
}

impl AppData {
    /// Checks a whole snapshot before it replaces the current state.
    ///
    /// Ids and storage row ids must be unique per collection, every
    /// evaluation, weekly comment and report must point at a live student
    /// (and evaluations at a live activity), and grades must be in range.
    pub fn check_integrity(&self) -> Result<(), StateError> {
        unique("student", self.students.iter().map(|s| s.id.clone()))?;
        unique("activity", self.activities.iter().map(|a| a.id.clone()))?;
        unique("note", self.notes.iter().map(|n| n.id.clone()))?;
        unique("evaluation", self.evaluations.iter().map(|e| e.key().row_id()))?;
        unique(
            "weekly comment",
            self.weekly_comments.iter().map(|c| c.key().row_id()),
        )?;
        unique("report", self.ai_reports.iter().map(|r| r.key().row_id()))?;

        for e in &self.evaluations {
            if self.student(&e.student_id).is_none() {
                return Err(StateError::not_found("student", &e.student_id));
            }
            if self.activity(&e.activity_id).is_none() {
                return Err(StateError::not_found("activity", &e.activity_id));
            }
            validate_grade(e.grade)?;
        }
        let dependents = self
            .weekly_comments
            .iter()
            .map(|c| c.student_id.as_str())
            .chain(self.ai_reports.iter().map(|r| r.student_id.as_str()));
        for student_id in dependents {
            if self.student(student_id).is_none() {
                return Err(StateError::not_found("student", student_id));
            }
        }
        Ok(())
    }
}

fn unique(kind: &'static str, ids: impl Iterator<Item = String>) -> Result<(), StateError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id.clone()) {
            return Err(StateError::Duplicate { kind, id });
        }
    }
    Ok(())
}

pub fn validate_grade(grade: f64) -> Result<(), StateError> {
    if !grade.is_finite() || !(0.0..=GRADE_MAX).contains(&grade) {
        return Err(StateError::Invalid(format!(
            "grade must be within 0..={GRADE_MAX}, got {grade}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cycle, Difficulty, Subject, Week};

    fn student(id: &str) -> Student {
        Student {
            id: id.into(),
            first_name: format!("First{id}"),
            last_name: format!("Last{id}"),
            observations: String::new(),
            birth_date: None,
            parent_phones: None,
        }
    }

    fn activity(id: &str) -> Activity {
        Activity {
            id: id.into(),
            title: format!("Activity {id}"),
            date: "2025-09-15".into(),
            subject: Subject::Mathematiques,
            domain: "Numération".into(),
            difficulty: Difficulty::try_from(3).expect("difficulty"),
            description: String::new(),
            objective: None,
            competencies: String::new(),
            material: None,
        }
    }

    fn eval(sid: &str, aid: &str, grade: f64) -> Evaluation {
        Evaluation {
            student_id: sid.into(),
            activity_id: aid.into(),
            is_present: true,
            grade,
            comment: String::new(),
        }
    }

    fn comment(sid: &str, cycle: u8, week: u8, content: &str) -> WeeklyComment {
        WeeklyComment {
            student_id: sid.into(),
            cycle: Cycle::try_from(cycle).expect("cycle"),
            week: Week::try_from(week).expect("week"),
            content: content.into(),
        }
    }

    fn report(sid: &str, cycle: u8, content: &str) -> AiReport {
        AiReport {
            student_id: sid.into(),
            cycle: Cycle::try_from(cycle).expect("cycle"),
            content: content.into(),
            generated_at: "2025-10-01T00:00:00.000Z".into(),
        }
    }

    fn seeded() -> AppData {
        AppData::default()
            .add_student(student("s1"))
            .and_then(|d| d.add_student(student("s2")))
            .and_then(|d| d.add_activity(activity("a1")))
            .and_then(|d| d.add_activity(activity("a2")))
            .and_then(|d| {
                d.save_evaluations("a1", vec![eval("s1", "a1", 8.0), eval("s2", "a1", 6.0)])
            })
            .and_then(|d| d.save_evaluations("a2", vec![eval("s1", "a2", 4.0)]))
            .and_then(|d| d.save_weekly_comment(comment("s1", 1, 1, "bon début")))
            .and_then(|d| d.save_weekly_comment(comment("s2", 1, 1, "attentif")))
            .and_then(|d| d.save_report(report("s1", 1, "rapport s1")))
            .and_then(|d| d.save_report(report("s2", 1, "rapport s2")))
            .expect("seed")
    }

    #[test]
    fn delete_student_cascades_to_dependents_only() {
        let before = seeded();
        let after = before.clone().delete_student("s1").expect("delete");

        assert!(after.student("s1").is_none());
        assert!(after.evaluations.iter().all(|e| e.student_id != "s1"));
        assert!(after.weekly_comments.iter().all(|c| c.student_id != "s1"));
        assert!(after.ai_reports.iter().all(|r| r.student_id != "s1"));

        assert_eq!(after.students.len(), 1);
        assert_eq!(after.activities, before.activities);
        assert_eq!(after.evaluations.len(), 1);
        assert_eq!(after.weekly_comments.len(), 1);
        assert_eq!(after.ai_reports.len(), 1);
        assert_eq!(after.notes, before.notes);
    }

    #[test]
    fn delete_activity_cascades_to_its_evaluations() {
        let after = seeded().delete_activity("a1").expect("delete");
        assert!(after.activity("a1").is_none());
        assert_eq!(after.evaluations.len(), 1);
        assert_eq!(after.evaluations[0].activity_id, "a2");
        assert_eq!(after.students.len(), 2);
        assert_eq!(after.weekly_comments.len(), 2);
    }

    #[test]
    fn delete_unknown_ids_is_not_found() {
        let err = seeded().delete_student("ghost").unwrap_err();
        assert_eq!(err.code(), "not_found");
        let err = seeded().delete_activity("ghost").unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn save_evaluations_replaces_the_activity_scope() {
        let after = seeded()
            .save_evaluations("a1", vec![eval("s2", "a1", 9.0), eval("s2", "a1", 10.0)])
            .expect("save");
        let a1: Vec<_> = after
            .evaluations
            .iter()
            .filter(|e| e.activity_id == "a1")
            .collect();
        assert_eq!(a1.len(), 1);
        assert_eq!(a1[0].student_id, "s2");
        assert_eq!(a1[0].grade, 10.0);
        assert!(after.evaluations.iter().any(|e| e.activity_id == "a2"));
    }

    #[test]
    fn save_evaluations_rejects_bad_input() {
        let err = seeded()
            .save_evaluations("a1", vec![eval("s1", "a2", 5.0)])
            .unwrap_err();
        assert_eq!(err.code(), "bad_params");
        let err = seeded()
            .save_evaluations("a1", vec![eval("s1", "a1", 11.0)])
            .unwrap_err();
        assert_eq!(err.code(), "bad_params");
        let err = seeded()
            .save_evaluations("a1", vec![eval("nobody", "a1", 5.0)])
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn weekly_comment_for_same_key_is_replaced() {
        let after = seeded()
            .save_weekly_comment(comment("s1", 1, 1, "progrès nets"))
            .expect("save");
        let scoped: Vec<_> = after
            .weekly_comments
            .iter()
            .filter(|c| c.student_id == "s1" && c.cycle.get() == 1 && c.week.get() == 1)
            .collect();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].content, "progrès nets");
    }

    #[test]
    fn report_for_same_cycle_is_replaced_other_cycles_kept() {
        let after = seeded()
            .save_report(report("s1", 2, "t2"))
            .and_then(|d| d.save_report(report("s1", 1, "t1 v2")))
            .expect("save");
        let s1: Vec<_> = after
            .ai_reports
            .iter()
            .filter(|r| r.student_id == "s1")
            .collect();
        assert_eq!(s1.len(), 2);
        assert!(s1.iter().any(|r| r.content == "t1 v2"));
        assert!(s1.iter().any(|r| r.content == "t2"));
    }

    #[test]
    fn note_edits_refresh_timestamp() {
        let note = Note {
            id: "n1".into(),
            title: "Nouvelle note".into(),
            content: String::new(),
            todos: Vec::new(),
            updated_at: "t0".into(),
        };
        let todo = TodoItem {
            id: "t1".into(),
            text: String::new(),
            completed: false,
        };
        let data = AppData::default()
            .add_note(note)
            .and_then(|d| d.add_todo("n1", todo, "t1".into()))
            .and_then(|d| d.update_todo("n1", "t1", Some("photocopies".into()), Some(true), "t2".into()))
            .expect("edit");
        let n = data.note("n1").expect("note");
        assert_eq!(n.updated_at, "t2");
        assert_eq!(n.todos[0].text, "photocopies");
        assert!(n.todos[0].completed);

        let data = data.delete_todo("n1", "t1", "t3".into()).expect("delete todo");
        assert!(data.note("n1").expect("note").todos.is_empty());
        assert_eq!(
            data.clone().delete_todo("n1", "t1", "t4".into()).unwrap_err().code(),
            "not_found"
        );
        assert!(data.delete_note("n1").expect("delete").notes.is_empty());
    }

    #[test]
    fn integrity_check_accepts_consistent_state() {
        let data = seeded()
            .save_weekly_comment(comment("s2", 2, 4, "ok"))
            .expect("save");
        assert_eq!(data.check_integrity(), Ok(()));
    }

    #[test]
    fn integrity_check_rejects_duplicates_and_orphans() {
        let mut dup = seeded();
        dup.students.push(student("s1"));
        assert_eq!(
            dup.check_integrity(),
            Err(StateError::Duplicate {
                kind: "student",
                id: "s1".into()
            })
        );

        let mut dup_key = seeded();
        dup_key.evaluations.push(eval("s1", "a1", 2.0));
        dup_key.evaluations.push(eval("s1", "a1", 3.0));
        assert_eq!(dup_key.check_integrity().map_err(|e| e.code()), Err("conflict"));

        let mut orphan = seeded();
        orphan.evaluations.push(eval("ghost", "a1", 5.0));
        assert_eq!(
            orphan.check_integrity(),
            Err(StateError::NotFound {
                kind: "student",
                id: "ghost".into()
            })
        );

        let mut dangling = seeded();
        dangling.evaluations.push(eval("s2", "gone", 5.0));
        assert_eq!(dangling.check_integrity().map_err(|e| e.code()), Err("not_found"));

        let mut orphan_report = seeded();
        orphan_report.ai_reports.push(report("ghost", 1, "x"));
        assert_eq!(orphan_report.check_integrity().map_err(|e| e.code()), Err("not_found"));
    }
}
