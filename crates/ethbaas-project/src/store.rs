//! Persisted project records
//!
//! The store is keyed by project name. [`SqliteProjectStore`] keeps records in
//! a single `projects` table, created on open.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row};

use ethbaas_common::project::{join_ports, parse_ports};
use ethbaas_common::{Error, ProjectRecord, Result};

/// Project record persistence
pub trait ProjectStore: Send + Sync {
    /// Whether a project with this name exists
    fn exists(&self, name: &str) -> Result<bool>;

    /// Insert a new record; fails with `AlreadyExists` if the name is taken
    fn insert(&self, record: &ProjectRecord) -> Result<()>;

    /// Fetch a record; fails with `NotFound` if absent
    fn get(&self, name: &str) -> Result<ProjectRecord>;

    /// Overwrite an existing record; fails with `NotFound` if absent
    fn update(&self, record: &ProjectRecord) -> Result<()>;

    /// Remove a record; fails with `NotFound` if absent
    fn delete(&self, name: &str) -> Result<()>;

    /// All records ordered by name
    fn list(&self) -> Result<Vec<ProjectRecord>>;
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS projects (
    name       VARCHAR(25) PRIMARY KEY,
    node_count INTEGER NOT NULL,
    running    INTEGER NOT NULL DEFAULT 0,
    created    INTEGER NOT NULL,
    node_ports TEXT NOT NULL
)";

/// Sqlite-backed project store
#[derive(Clone)]
pub struct SqliteProjectStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProjectStore {
    /// Open (or create) a store at `path`, creating parent directories
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let conn = Connection::open(path).map_err(store_error)?;
        Self::with_connection(conn)
    }

    /// Open a store that lives only as long as this value
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_error)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, []).map_err(store_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::store("database lock poisoned"))
    }
}

impl ProjectStore for SqliteProjectStore {
    fn exists(&self, name: &str) -> Result<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM projects WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()
            .map_err(store_error)?;
        Ok(found.is_some())
    }

    fn insert(&self, record: &ProjectRecord) -> Result<()> {
        let conn = self.lock()?;
        let result = conn.execute(
            "INSERT INTO projects (name, node_count, running, created, node_ports)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.name,
                record.node_count,
                record.running,
                record.created,
                join_ports(&record.node_ports),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::AlreadyExists {
                    project: record.name.clone(),
                })
            }
            Err(e) => Err(store_error(e)),
        }
    }

    fn get(&self, name: &str) -> Result<ProjectRecord> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT name, node_count, running, created, node_ports
                 FROM projects WHERE name = ?1",
                [name],
                read_row,
            )
            .optional()
            .map_err(store_error)?;
        match row {
            Some(row) => row.into_record(),
            None => Err(Error::project_not_found(name)),
        }
    }

    fn update(&self, record: &ProjectRecord) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE projects SET node_count = ?2, running = ?3, created = ?4, node_ports = ?5
                 WHERE name = ?1",
                params![
                    record.name,
                    record.node_count,
                    record.running,
                    record.created,
                    join_ports(&record.node_ports),
                ],
            )
            .map_err(store_error)?;
        if changed == 0 {
            return Err(Error::project_not_found(&record.name));
        }
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM projects WHERE name = ?1", [name])
            .map_err(store_error)?;
        if changed == 0 {
            return Err(Error::project_not_found(name));
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<ProjectRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT name, node_count, running, created, node_ports
                 FROM projects ORDER BY name",
            )
            .map_err(store_error)?;
        let rows = stmt
            .query_map([], read_row)
            .map_err(store_error)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(store_error)?;
        rows.into_iter().map(StoredRow::into_record).collect()
    }
}

/// A row as stored, before the port list is parsed
struct StoredRow {
    name: String,
    node_count: u32,
    running: bool,
    created: i64,
    node_ports: String,
}

impl StoredRow {
    fn into_record(self) -> Result<ProjectRecord> {
        Ok(ProjectRecord {
            node_ports: parse_ports(&self.node_ports)?,
            name: self.name,
            node_count: self.node_count,
            running: self.running,
            created: self.created,
        })
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        name: row.get(0)?,
        node_count: row.get(1)?,
        running: row.get(2)?,
        created: row.get(3)?,
        node_ports: row.get(4)?,
    })
}

fn store_error(err: rusqlite::Error) -> Error {
    Error::store(err.to_string())
}
