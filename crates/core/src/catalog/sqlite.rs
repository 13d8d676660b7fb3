//! SQLite-backed artifact catalog implementation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{ArtifactCatalog, CatalogError};
use crate::artifact::{Artifact, ArtifactFilter, ArtifactStatus};
use crate::processor::{CollectorKind, Processor};

const ARTIFACT_COLUMNS: &str = "id, processor, root, filter, config, status, versions, last_error, last_tracked_at, last_collected_at";

/// SQLite-backed artifact catalog.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Create a new SQLite catalog, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite catalog (useful for testing).
    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS artifacts (
                processor TEXT NOT NULL,
                id TEXT NOT NULL,
                root INTEGER NOT NULL DEFAULT 0,
                filter TEXT,
                config TEXT NOT NULL DEFAULT 'null',
                status TEXT NOT NULL,
                versions TEXT NOT NULL DEFAULT '[]',
                last_error TEXT,
                last_tracked_at TEXT,
                last_collected_at TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (processor, id)
            );

            CREATE INDEX IF NOT EXISTS idx_artifacts_root ON artifacts(root);
            CREATE INDEX IF NOT EXISTS idx_artifacts_status ON artifacts(status);

            CREATE TABLE IF NOT EXISTS processors (
                name TEXT PRIMARY KEY,
                direct_collect INTEGER NOT NULL DEFAULT 0,
                kind TEXT NOT NULL,
                settings TEXT NOT NULL DEFAULT '{}'
            );
            "#,
        )?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Internal("catalog connection poisoned".to_string()))
    }

    fn parse_time(value: Option<String>) -> Option<DateTime<Utc>> {
        value.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        })
    }

    fn row_to_artifact(row: &rusqlite::Row) -> rusqlite::Result<Artifact> {
        let config_json: String = row.get(4)?;
        let status_str: String = row.get(5)?;
        let versions_json: String = row.get(6)?;

        Ok(Artifact {
            id: row.get(0)?,
            processor: row.get(1)?,
            root: row.get(2)?,
            filter: row.get(3)?,
            config: serde_json::from_str(&config_json).unwrap_or(serde_json::Value::Null),
            status: ArtifactStatus::parse(&status_str).unwrap_or_default(),
            versions: serde_json::from_str(&versions_json).unwrap_or_default(),
            last_error: row.get(7)?,
            last_tracked_at: Self::parse_time(row.get(8)?),
            last_collected_at: Self::parse_time(row.get(9)?),
        })
    }

    fn row_to_processor(row: &rusqlite::Row) -> rusqlite::Result<Processor> {
        let kind_str: String = row.get(2)?;
        let settings_json: String = row.get(3)?;

        Ok(Processor {
            name: row.get(0)?,
            direct_collect: row.get(1)?,
            kind: CollectorKind::parse(&kind_str).unwrap_or_default(),
            settings: serde_json::from_str(&settings_json).unwrap_or_default(),
        })
    }

    fn encode(artifact: &Artifact) -> Result<(String, String), CatalogError> {
        let config = serde_json::to_string(&artifact.config)
            .map_err(|e| CatalogError::Internal(e.to_string()))?;
        let versions = serde_json::to_string(&artifact.versions)
            .map_err(|e| CatalogError::Internal(e.to_string()))?;
        Ok((config, versions))
    }
}

impl ArtifactCatalog for SqliteCatalog {
    fn get_artifact(&self, processor: &str, id: &str) -> Result<Option<Artifact>, CatalogError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM artifacts WHERE processor = ? AND id = ?",
            ARTIFACT_COLUMNS
        );
        let artifact = conn
            .query_row(&sql, params![processor, id], Self::row_to_artifact)
            .optional()?;
        Ok(artifact)
    }

    fn list_artifacts(&self, filter: &ArtifactFilter) -> Result<Vec<Artifact>, CatalogError> {
        let conn = self.conn()?;

        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref processor) = filter.processor {
            conditions.push("processor = ?");
            params.push(Box::new(processor.clone()));
        }
        if filter.only_roots {
            conditions.push("root = 1");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT {} FROM artifacts {} ORDER BY processor, id",
            ARTIFACT_COLUMNS, where_clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), Self::row_to_artifact)?;

        let mut artifacts = Vec::new();
        for row in rows {
            artifacts.push(row?);
        }
        Ok(artifacts)
    }

    fn create_artifact(&self, artifact: &Artifact) -> Result<bool, CatalogError> {
        let conn = self.conn()?;
        let (config, versions) = Self::encode(artifact)?;

        let inserted = conn.execute(
            "INSERT INTO artifacts (processor, id, root, filter, config, status, versions, last_error, last_tracked_at, last_collected_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(processor, id) DO NOTHING",
            params![
                artifact.processor,
                artifact.id,
                artifact.root,
                artifact.filter,
                config,
                artifact.status.as_str(),
                versions,
                artifact.last_error,
                artifact.last_tracked_at.map(|t| t.to_rfc3339()),
                artifact.last_collected_at.map(|t| t.to_rfc3339()),
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(inserted == 1)
    }

    fn promote_root(&self, processor: &str, id: &str) -> Result<bool, CatalogError> {
        let conn = self.conn()?;

        let changed = conn.execute(
            "UPDATE artifacts SET root = 1, updated_at = ? WHERE processor = ? AND id = ? AND root = 0",
            params![Utc::now().to_rfc3339(), processor, id],
        )?;
        if changed == 1 {
            return Ok(true);
        }

        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM artifacts WHERE processor = ? AND id = ?",
                params![processor, id],
                |row| row.get(0),
            )
            .optional()?;
        match exists {
            Some(_) => Ok(false),
            None => Err(CatalogError::NotFound(format!("{}/{}", processor, id))),
        }
    }

    fn upsert_artifact(&self, artifact: &Artifact) -> Result<(), CatalogError> {
        let conn = self.conn()?;
        let (config, versions) = Self::encode(artifact)?;

        conn.execute(
            "INSERT INTO artifacts (processor, id, root, filter, config, status, versions, last_error, last_tracked_at, last_collected_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(processor, id) DO UPDATE SET
                root = MAX(artifacts.root, excluded.root),
                filter = excluded.filter,
                config = excluded.config,
                status = excluded.status,
                versions = excluded.versions,
                last_error = excluded.last_error,
                last_tracked_at = excluded.last_tracked_at,
                last_collected_at = excluded.last_collected_at,
                updated_at = excluded.updated_at",
            params![
                artifact.processor,
                artifact.id,
                artifact.root,
                artifact.filter,
                config,
                artifact.status.as_str(),
                versions,
                artifact.last_error,
                artifact.last_tracked_at.map(|t| t.to_rfc3339()),
                artifact.last_collected_at.map(|t| t.to_rfc3339()),
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    fn update_artifact(&self, artifact: &Artifact) -> Result<bool, CatalogError> {
        let conn = self.conn()?;
        let (config, versions) = Self::encode(artifact)?;

        let changed = conn.execute(
            "UPDATE artifacts SET
                root = MAX(root, ?),
                filter = ?,
                config = ?,
                status = ?,
                versions = ?,
                last_error = ?,
                last_tracked_at = ?,
                last_collected_at = ?,
                updated_at = ?
             WHERE processor = ? AND id = ?",
            params![
                artifact.root,
                artifact.filter,
                config,
                artifact.status.as_str(),
                versions,
                artifact.last_error,
                artifact.last_tracked_at.map(|t| t.to_rfc3339()),
                artifact.last_collected_at.map(|t| t.to_rfc3339()),
                Utc::now().to_rfc3339(),
                artifact.processor,
                artifact.id,
            ],
        )?;

        Ok(changed == 1)
    }

    fn count_by_status(&self) -> Result<HashMap<ArtifactStatus, usize>, CatalogError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM artifacts GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((status, count))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (status, count) = row?;
            let status = ArtifactStatus::parse(&status).unwrap_or_default();
            *counts.entry(status).or_insert(0) += count as usize;
        }
        Ok(counts)
    }

    fn delete_artifact(&self, artifact: &Artifact) -> Result<bool, CatalogError> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM artifacts WHERE processor = ? AND id = ?",
            params![artifact.processor, artifact.id],
        )?;
        Ok(deleted > 0)
    }

    fn get_processor(&self, name: &str) -> Result<Option<Processor>, CatalogError> {
        let conn = self.conn()?;
        let processor = conn
            .query_row(
                "SELECT name, direct_collect, kind, settings FROM processors WHERE name = ?",
                params![name],
                Self::row_to_processor,
            )
            .optional()?;
        Ok(processor)
    }

    fn list_processors(&self) -> Result<Vec<Processor>, CatalogError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT name, direct_collect, kind, settings FROM processors ORDER BY name")?;
        let rows = stmt.query_map([], Self::row_to_processor)?;

        let mut processors = Vec::new();
        for row in rows {
            processors.push(row?);
        }
        Ok(processors)
    }

    fn register_processor(&self, processor: &Processor) -> Result<(), CatalogError> {
        let conn = self.conn()?;
        let settings = serde_json::to_string(&processor.settings)
            .map_err(|e| CatalogError::Internal(e.to_string()))?;

        conn.execute(
            "INSERT INTO processors (name, direct_collect, kind, settings) VALUES (?, ?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET
                direct_collect = excluded.direct_collect,
                kind = excluded.kind,
                settings = excluded.settings",
            params![
                processor.name,
                processor.direct_collect,
                processor.kind.as_str(),
                settings,
            ],
        )?;

        Ok(())
    }
}
