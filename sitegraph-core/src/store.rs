use crate::diff::DiffSummary;
use crate::model::Issue;
use crate::snapshot::{Snapshot, SnapshotMetadata};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Stored record could not be decoded: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid snapshot id: {0}")]
    InvalidId(#[from] uuid::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One row of `list_snapshots`, without the captured graph
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotListing {
    pub id: Uuid,
    pub project: String,
    pub created_at: DateTime<Utc>,
    pub metadata: SnapshotMetadata,
    pub diff_summary: Option<DiffSummary>,
}

pub struct SnapshotStore {
    conn: Connection,
}

fn current_timestamp() -> i64 {
    Utc::now().timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

impl SnapshotStore {
    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -16000;  -- 16MB cache
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let store = SnapshotStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = SnapshotStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            -- Captured graphs, one row per analysis run
            CREATE TABLE IF NOT EXISTS snapshots (
    id TEXT PRIMARY KEY,
    project TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    node_count INTEGER NOT NULL,
    link_count INTEGER NOT NULL,
    metadata TEXT NOT NULL,      -- JSON SnapshotMetadata
    diff_summary TEXT,           -- JSON DiffSummary against the previous snapshot
    payload TEXT NOT NULL        -- JSON Snapshot
);

CREATE INDEX IF NOT EXISTS idx_snapshots_project ON snapshots(project, created_at);

CREATE TRIGGER IF NOT EXISTS snapshots_write_once
BEFORE UPDATE ON snapshots
BEGIN
    SELECT RAISE(ABORT, 'snapshots are immutable');
END;

-- Issues detected for a snapshot
CREATE TABLE IF NOT EXISTS issues (
    id TEXT NOT NULL,
    snapshot_id TEXT NOT NULL,
    node_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    severity TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    payload TEXT NOT NULL,       -- JSON Issue

    FOREIGN KEY(snapshot_id) REFERENCES snapshots(id) ON DELETE CASCADE,
    PRIMARY KEY(snapshot_id, id)
);

CREATE INDEX IF NOT EXISTS idx_issues_snapshot ON issues(snapshot_id);

-- Manual resolutions, carried into later analyses by fingerprint
CREATE TABLE IF NOT EXISTS resolutions (
    project TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    resolved_at INTEGER NOT NULL,
    PRIMARY KEY(project, fingerprint)
);

-- Rendered exports, invalidated after each analysis
CREATE TABLE IF NOT EXISTS export_cache (
    project TEXT NOT NULL,
    cache_key TEXT NOT NULL,     -- format plus options JSON
    snapshot_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY(project, cache_key)
);
            ",
        )?;

        Ok(())
    }

    // Snapshot operations
    pub fn insert_snapshot(&self, snapshot: &Snapshot, issues: &[Issue]) -> Result<()> {
        let metadata = serde_json::to_string(snapshot.metadata())?;
        let diff_summary = snapshot
            .diff_summary()
            .map(serde_json::to_string)
            .transpose()?;
        let payload = serde_json::to_string(snapshot)?;
        let snapshot_id = snapshot.id().to_string();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO snapshots (
                id, project, created_at, node_count, link_count, metadata, diff_summary, payload
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &snapshot_id,
                snapshot.project(),
                snapshot.created_at().timestamp_millis(),
                snapshot.nodes().len() as i64,
                snapshot.links().len() as i64,
                metadata,
                diff_summary,
                payload,
            ],
        )?;

        for issue in issues {
            tx.execute(
                "INSERT INTO issues (id, snapshot_id, node_id, kind, severity, fingerprint, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    issue.id.to_string(),
                    &snapshot_id,
                    issue.node_id.to_string(),
                    issue.kind.as_str(),
                    issue.severity.as_str(),
                    &issue.fingerprint,
                    serde_json::to_string(issue)?,
                ],
            )?;
        }
        tx.commit()?;

        debug!(
            "Stored snapshot {} for {} with {} issues",
            snapshot_id,
            snapshot.project(),
            issues.len()
        );
        Ok(())
    }

    pub fn get_snapshot(&self, id: Uuid) -> Result<Option<Snapshot>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM snapshots WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        payload
            .map(|p| serde_json::from_str(&p).map_err(StoreError::from))
            .transpose()
    }

    pub fn latest_snapshot(&self, project: &str) -> Result<Option<Snapshot>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM snapshots WHERE project = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                params![project],
                |row| row.get(0),
            )
            .optional()?;

        payload
            .map(|p| serde_json::from_str(&p).map_err(StoreError::from))
            .transpose()
    }

    /// Snapshots of a project, oldest first
    pub fn list_snapshots(&self, project: &str) -> Result<Vec<SnapshotListing>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project, created_at, metadata, diff_summary FROM snapshots
             WHERE project = ?1 ORDER BY created_at, rowid",
        )?;

        let rows = stmt
            .query_map(params![project], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, project, created_at, metadata, diff_summary)| -> Result<SnapshotListing> {
                Ok(SnapshotListing {
                    id: Uuid::parse_str(&id)?,
                    project,
                    created_at: from_millis(created_at),
                    metadata: serde_json::from_str(&metadata)?,
                    diff_summary: diff_summary
                        .map(|d| serde_json::from_str(&d))
                        .transpose()?,
                })
            })
            .collect()
    }

    // Issue operations
    /// Issues of a snapshot with stored resolutions applied, most severe first
    pub fn get_issues(&self, snapshot_id: Uuid) -> Result<Vec<Issue>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.payload, r.fingerprint IS NOT NULL
             FROM issues i
             JOIN snapshots s ON s.id = i.snapshot_id
             LEFT JOIN resolutions r ON r.project = s.project AND r.fingerprint = i.fingerprint
             WHERE i.snapshot_id = ?1
             ORDER BY CASE i.severity
                WHEN 'critical' THEN 1
                WHEN 'serious' THEN 2
                WHEN 'moderate' THEN 3
                WHEN 'minor' THEN 4
            END, i.fingerprint",
        )?;

        let rows = stmt
            .query_map(params![snapshot_id.to_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(payload, resolved)| -> Result<Issue> {
                let mut issue: Issue = serde_json::from_str(&payload)?;
                if resolved {
                    issue.resolve();
                }
                Ok(issue)
            })
            .collect()
    }

    /// Mark an issue fingerprint resolved for a project. Returns false when
    /// it was already resolved.
    pub fn resolve_issue(&self, project: &str, fingerprint: &str) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO resolutions (project, fingerprint, resolved_at)
             VALUES (?1, ?2, ?3)",
            params![project, fingerprint, current_timestamp()],
        )?;
        Ok(inserted > 0)
    }

    pub fn resolved_fingerprints(&self, project: &str) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT fingerprint FROM resolutions WHERE project = ?1")?;

        let fingerprints = stmt
            .query_map(params![project], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<String>>>()?;

        Ok(fingerprints)
    }

    // Export cache
    pub fn cache_export(
        &self,
        project: &str,
        cache_key: &str,
        snapshot_id: Uuid,
        content: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO export_cache
                (project, cache_key, snapshot_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                project,
                cache_key,
                snapshot_id.to_string(),
                content,
                current_timestamp()
            ],
        )?;
        Ok(())
    }

    /// Cached export content, only if it was rendered from `snapshot_id`
    pub fn cached_export(
        &self,
        project: &str,
        cache_key: &str,
        snapshot_id: Uuid,
    ) -> Result<Option<String>> {
        let content = self
            .conn
            .query_row(
                "SELECT content FROM export_cache
                 WHERE project = ?1 AND cache_key = ?2 AND snapshot_id = ?3",
                params![project, cache_key, snapshot_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(content)
    }

    /// Drop every cached export of a project. Returns the number removed.
    pub fn invalidate_exports(&self, project: &str) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM export_cache WHERE project = ?1", params![project])?;
        debug!("Invalidated {} cached exports for {}", removed, project);
        Ok(removed)
    }
}
