use rusqlite::Connection;
use std::path::Path;
use tracing::info;

pub const DB_FILE: &str = "classbook.sqlite3";

/// One table per record collection. Rows are `{id, user_id, position, data}`
/// keyed by `(user_id, id)`, where `data` is the record as JSON.
pub const COLLECTION_TABLES: [&str; 6] = [
    "students",
    "activities",
    "evaluations",
    "weekly_comments",
    "ai_reports",
    "notes",
];

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

pub fn ensure_schema(conn: &Connection) -> anyhow::Result<()> {
    for table in COLLECTION_TABLES {
        conn.execute(&create_table_sql(table), [])?;
        ensure_user_scoped_key(conn, table)?;
        conn.execute(
            &format!("CREATE INDEX IF NOT EXISTS idx_{table}_user ON {table}(user_id, position)"),
            [],
        )?;
    }
    Ok(())
}

/// Row ids are only unique per user: composite keys are built from record
/// fields, so two users of one workspace can produce the same id.
fn create_table_sql(name: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {name}(
            id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            position INTEGER NOT NULL DEFAULT 0,
            data TEXT NOT NULL,
            PRIMARY KEY(user_id, id)
        )"
    )
}

/// Rebuilds tables created with `id` alone as primary key.
fn ensure_user_scoped_key(conn: &Connection, table: &str) -> anyhow::Result<()> {
    if primary_key_columns(conn, table)? == ["user_id", "id"] {
        return Ok(());
    }

    let rebuilt = format!("{table}_rebuilt");
    let tx = conn.unchecked_transaction()?;
    tx.execute(&format!("DROP TABLE IF EXISTS {rebuilt}"), [])?;
    tx.execute(&create_table_sql(&rebuilt), [])?;
    tx.execute(
        &format!(
            "INSERT OR REPLACE INTO {rebuilt}(id, user_id, position, data)
             SELECT id, user_id, position, data FROM {table} ORDER BY rowid"
        ),
        [],
    )?;
    tx.execute(&format!("DROP TABLE {table}"), [])?;
    tx.execute(&format!("ALTER TABLE {rebuilt} RENAME TO {table}"), [])?;
    tx.commit()?;
    info!(table, "rebuilt table with per-user row keys");
    Ok(())
}

/// Primary key columns in key order.
fn primary_key_columns(conn: &Connection, table: &str) -> anyhow::Result<Vec<String>> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    let mut keyed: Vec<(i64, String)> = Vec::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        let pk: i64 = row.get(5)?;
        if pk > 0 {
            keyed.push((pk, name));
        }
    }
    keyed.sort();
    Ok(keyed.into_iter().map(|(_, name)| name).collect())
}
