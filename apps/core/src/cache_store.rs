use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

/// Last-known state for one session identifier, written only at
/// generation end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheRecord {
    pub last_query: String,
    pub last_selection: String,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS session_cache (
    id TEXT PRIMARY KEY,
    last_query TEXT NOT NULL,
    last_selection TEXT NOT NULL
)";

pub fn open_memory() -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open_in_memory()?;
    conn.execute(SCHEMA, [])?;
    Ok(conn)
}

pub fn open_at_path(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;
    conn.execute(SCHEMA, [])?;
    Ok(conn)
}

pub fn save_cache(db: &Connection, id: &str, record: &CacheRecord) -> Result<(), rusqlite::Error> {
    db.execute(
        "INSERT INTO session_cache (id, last_query, last_selection) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
            last_query = excluded.last_query,
            last_selection = excluded.last_selection",
        params![id, record.last_query, record.last_selection],
    )?;
    Ok(())
}

/// Absence of a record is not an error; callers get `None` and treat it
/// as a zero-value record.
pub fn load_cache(db: &Connection, id: &str) -> Result<Option<CacheRecord>, rusqlite::Error> {
    db.query_row(
        "SELECT last_query, last_selection FROM session_cache WHERE id = ?1",
        params![id],
        |row| {
            Ok(CacheRecord {
                last_query: row.get(0)?,
                last_selection: row.get(1)?,
            })
        },
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::{load_cache, open_memory, save_cache, CacheRecord};

    #[test]
    fn save_then_load_round_trips() {
        let db = open_memory().expect("store should open");
        let record = CacheRecord {
            last_query: "fire".to_string(),
            last_selection: "firefox".to_string(),
        };

        save_cache(&db, "shell", &record).expect("save should succeed");
        let loaded = load_cache(&db, "shell").expect("load should succeed");
        assert_eq!(loaded, Some(record));
    }

    #[test]
    fn missing_record_is_none_not_error() {
        let db = open_memory().expect("store should open");
        assert_eq!(load_cache(&db, "unknown").expect("load should succeed"), None);
    }

    #[test]
    fn save_overwrites_previous_record() {
        let db = open_memory().expect("store should open");
        save_cache(
            &db,
            "shell",
            &CacheRecord {
                last_query: "a".to_string(),
                last_selection: "alpha".to_string(),
            },
        )
        .expect("first save should succeed");
        save_cache(&db, "shell", &CacheRecord::default()).expect("second save should succeed");

        let loaded = load_cache(&db, "shell").expect("load should succeed");
        assert_eq!(loaded, Some(CacheRecord::default()));
    }
}
