//! Persists [`AppData`] as one row per record.
//!
//! Entities are keyed by their own id; evaluations, weekly comments and
//! reports by their composite key joined with `_`. Every save re-syncs the
//! full collections.

use crate::model::{AppData, RowKey};
use anyhow::Context;
use rusqlite::{Connection, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Reads every collection owned by `user_id`.
///
/// A table that cannot be read or decoded comes back empty; the failure is
/// only logged.
pub fn load(conn: &Connection, user_id: &str) -> AppData {
    AppData {
        students: load_table(conn, "students", user_id),
        activities: load_table(conn, "activities", user_id),
        evaluations: load_table(conn, "evaluations", user_id),
        weekly_comments: load_table(conn, "weekly_comments", user_id),
        ai_reports: load_table(conn, "ai_reports", user_id),
        notes: load_table(conn, "notes", user_id),
    }
}

fn load_table<T: DeserializeOwned>(conn: &Connection, table: &str, user_id: &str) -> Vec<T> {
    match read_table(conn, table, user_id) {
        Ok(rows) => {
            debug!(table, count = rows.len(), "loaded collection");
            rows
        }
        Err(e) => {
            warn!(table, error = %format!("{e:#}"), "collection unreadable, starting empty");
            Vec::new()
        }
    }
}

fn read_table<T: DeserializeOwned>(
    conn: &Connection,
    table: &str,
    user_id: &str,
) -> anyhow::Result<Vec<T>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, data FROM {table} WHERE user_id = ? ORDER BY position, rowid"
    ))?;
    let rows = stmt
        .query_map([user_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, data)| {
            serde_json::from_str(&data).with_context(|| format!("bad record {id} in {table}"))
        })
        .collect()
}

/// Upserts every record of every collection and prunes rows of `user_id`
/// that are no longer present, in one transaction.
pub fn save(conn: &Connection, user_id: &str, data: &AppData) -> anyhow::Result<()> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to start save transaction")?;

    write_table(
        &tx,
        "students",
        user_id,
        data.students.iter().map(|s| (s.id.clone(), s)),
    )?;
    write_table(
        &tx,
        "activities",
        user_id,
        data.activities.iter().map(|a| (a.id.clone(), a)),
    )?;
    write_table(
        &tx,
        "evaluations",
        user_id,
        data.evaluations.iter().map(|e| (e.key().row_id(), e)),
    )?;
    write_table(
        &tx,
        "weekly_comments",
        user_id,
        data.weekly_comments.iter().map(|c| (c.key().row_id(), c)),
    )?;
    write_table(
        &tx,
        "ai_reports",
        user_id,
        data.ai_reports.iter().map(|r| (r.key().row_id(), r)),
    )?;
    write_table(
        &tx,
        "notes",
        user_id,
        data.notes.iter().map(|n| (n.id.clone(), n)),
    )?;

    tx.commit().context("failed to commit save transaction")?;
    Ok(())
}

fn write_table<'a, T, I>(tx: &Transaction<'_>, table: &str, user_id: &str, rows: I) -> anyhow::Result<()>
where
    T: Serialize + 'a,
    I: Iterator<Item = (String, &'a T)>,
{
    let mut upsert = tx.prepare(&format!(
        "INSERT INTO {table}(id, user_id, position, data) VALUES(?, ?, ?, ?)
         ON CONFLICT(user_id, id) DO UPDATE SET
           position = excluded.position,
           data = excluded.data"
    ))?;

    let mut kept: HashSet<String> = HashSet::new();
    for (position, (id, record)) in rows.enumerate() {
        let json = serde_json::to_string(record)
            .with_context(|| format!("failed to encode {id} for {table}"))?;
        upsert
            .execute((&id, user_id, position as i64, &json))
            .with_context(|| format!("failed to upsert {id} into {table}"))?;
        kept.insert(id);
    }

    let mut existing = tx.prepare(&format!("SELECT id FROM {table} WHERE user_id = ?"))?;
    let stale: Vec<String> = existing
        .query_map([user_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|id| !kept.contains(id))
        .collect();

    let mut delete = tx.prepare(&format!("DELETE FROM {table} WHERE user_id = ? AND id = ?"))?;
    for id in &stale {
        delete
            .execute([user_id, id.as_str()])
            .with_context(|| format!("failed to prune {id} from {table}"))?;
    }
    if !stale.is_empty() {
        debug!(table, pruned = stale.len(), "pruned stale rows");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::model::{
        Activity, AiReport, Cycle, Difficulty, Evaluation, Note, Student, Subject, WeeklyComment,
        Week,
    };
    use pretty_assertions::assert_eq;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open memory db");
        db::ensure_schema(&conn).expect("schema");
        conn
    }

    fn sample() -> AppData {
        let cycle = Cycle::try_from(1).expect("cycle");
        AppData {
            students: vec![
                Student {
                    id: "s2".into(),
                    first_name: "Hugo".into(),
                    last_name: "Dubois".into(),
                    observations: "timide".into(),
                    birth_date: Some("2019-03-02".into()),
                    parent_phones: None,
                },
                Student {
                    id: "s1".into(),
                    first_name: "Léa".into(),
                    last_name: "Martin".into(),
                    observations: String::new(),
                    birth_date: None,
                    parent_phones: Some("0470 00 00 00".into()),
                },
            ],
            activities: vec![Activity {
                id: "a1".into(),
                title: "Dictée".into(),
                date: "2025-10-06".into(),
                subject: Subject::Francais,
                domain: "Orthographe".into(),
                difficulty: Difficulty::try_from(4).expect("difficulty"),
                description: "mots invariables".into(),
                objective: Some("orthographier".into()),
                competencies: "écrire".into(),
                material: None,
            }],
            evaluations: vec![Evaluation {
                student_id: "s1".into(),
                activity_id: "a1".into(),
                is_present: true,
                grade: 7.0,
                comment: "bien".into(),
            }],
            weekly_comments: vec![WeeklyComment {
                student_id: "s2".into(),
                cycle,
                week: Week::try_from(2).expect("week"),
                content: "participe davantage".into(),
            }],
            ai_reports: vec![AiReport {
                student_id: "s1".into(),
                cycle,
                content: "Léa avance bien.".into(),
                generated_at: "2025-12-01T10:00:00.000Z".into(),
            }],
            notes: vec![Note {
                id: "n1".into(),
                title: "Réunion".into(),
                content: "parents".into(),
                todos: Vec::new(),
                updated_at: "2025-09-01T08:00:00.000Z".into(),
            }],
        }
    }

    fn row_ids(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("SELECT id FROM {table} ORDER BY position"))
            .expect("prepare");
        stmt.query_map([], |r| r.get(0))
            .expect("query")
            .collect::<Result<Vec<String>, _>>()
            .expect("rows")
    }

    #[test]
    fn empty_store_loads_default_state() {
        assert_eq!(load(&conn(), "mme-durand"), AppData::default());
    }

    #[test]
    fn save_then_load_preserves_records_and_order() {
        let conn = conn();
        let data = sample();
        save(&conn, "mme-durand", &data).expect("save");
        assert_eq!(load(&conn, "mme-durand"), data);
    }

    #[test]
    fn composite_records_use_joined_row_ids() {
        let conn = conn();
        save(&conn, "mme-durand", &sample()).expect("save");
        assert_eq!(row_ids(&conn, "evaluations"), vec!["s1_a1"]);
        assert_eq!(row_ids(&conn, "weekly_comments"), vec!["s2_1_2"]);
        assert_eq!(row_ids(&conn, "ai_reports"), vec!["s1_1"]);
        assert_eq!(row_ids(&conn, "students"), vec!["s2", "s1"]);
    }

    #[test]
    fn deleted_records_do_not_come_back() {
        let conn = conn();
        let data = sample();
        save(&conn, "mme-durand", &data).expect("save");
        let next = data.delete_student("s1").expect("delete");
        save(&conn, "mme-durand", &next).expect("save again");

        let reloaded = load(&conn, "mme-durand");
        assert_eq!(reloaded, next);
        assert!(reloaded.evaluations.is_empty());
        assert!(reloaded.ai_reports.is_empty());
    }

    #[test]
    fn reads_are_scoped_by_user() {
        let conn = conn();
        save(&conn, "mme-durand", &sample()).expect("save");
        assert_eq!(load(&conn, "someone-else"), AppData::default());
    }

    #[test]
    fn unreadable_table_falls_back_to_empty() {
        let conn = conn();
        let data = sample();
        save(&conn, "mme-durand", &data).expect("save");
        conn.execute(
            "UPDATE activities SET data = '{not json' WHERE id = 'a1'",
            [],
        )
        .expect("corrupt");
        conn.execute("DROP TABLE notes", []).expect("drop");

        let loaded = load(&conn, "mme-durand");
        assert!(loaded.activities.is_empty());
        assert!(loaded.notes.is_empty());
        assert_eq!(loaded.students, data.students);
        assert_eq!(loaded.evaluations, data.evaluations);
    }

    #[test]
    fn users_sharing_row_ids_keep_their_own_rows() {
        let conn = conn();
        let data = sample();
        save(&conn, "alice", &data).expect("save alice");
        save(&conn, "bob", &data).expect("save bob");
        assert_eq!(load(&conn, "alice"), data);
        assert_eq!(load(&conn, "bob"), data);

        // Pruning bob's rows leaves alice's identical ids alone.
        save(&conn, "bob", &AppData::default()).expect("clear bob");
        assert_eq!(load(&conn, "bob"), AppData::default());
        assert_eq!(load(&conn, "alice"), data);
    }
}
