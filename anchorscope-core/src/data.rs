use crate::analysis::AnalysisResult;
use crate::error::{AnalysisError, Result};
use crate::quota::{QuotaStore, UsageQuota};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

pub struct Database {
    conn: Connection,
}

/// One row of the analysis history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub id: String,
    pub base_url: String,
    pub created_at: DateTime<Utc>,
    pub pages: usize,
    pub anchors: usize,
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AnalysisError::Storage(format!("bad timestamp '{}': {}", value, e)))
}

impl Database {
    pub fn drop(path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn in_memory() -> rusqlite::Result<Self> {
        let db = Database {
            conn: Connection::open_in_memory()?,
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "
            -- Per-caller request budget
            CREATE TABLE IF NOT EXISTS quotas (
    caller TEXT PRIMARY KEY,
    remaining INTEGER NOT NULL,
    reset_at TEXT NOT NULL
);

-- Completed analyses
CREATE TABLE IF NOT EXISTS analyses (
    id TEXT PRIMARY KEY,
    base_url TEXT NOT NULL,
    created_at TEXT NOT NULL,
    pages INTEGER NOT NULL,
    anchors INTEGER NOT NULL,
    result_json TEXT NOT NULL  -- serialized AnalysisResult
);

CREATE INDEX IF NOT EXISTS idx_analyses_created ON analyses(created_at);
CREATE INDEX IF NOT EXISTS idx_analyses_base_url ON analyses(base_url);
            ",
        )
    }

    /// Store a finished analysis and return its id.
    pub fn save_analysis(&self, result: &AnalysisResult) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let json = serde_json::to_string(result)
            .map_err(|e| AnalysisError::Storage(format!("serialize analysis: {}", e)))?;

        self.conn.execute(
            "INSERT INTO analyses (id, base_url, created_at, pages, anchors, result_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &id,
                &result.base_url,
                result.completed_at.to_rfc3339(),
                result.total_pages() as i64,
                result.anchors.len() as i64,
                json
            ],
        )?;
        Ok(id)
    }

    pub fn load_analysis(&self, id: &str) -> Result<Option<AnalysisResult>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT result_json FROM analyses WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| AnalysisError::Storage(format!("corrupt analysis {}: {}", id, e)))
        })
        .transpose()
    }

    /// Most recent first.
    pub fn list_analyses(&self) -> Result<Vec<AnalysisSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, base_url, created_at, pages, anchors
             FROM analyses ORDER BY created_at DESC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, base_url, created_at, pages, anchors)| {
                Ok(AnalysisSummary {
                    id,
                    base_url,
                    created_at: parse_timestamp(&created_at)?,
                    pages: pages as usize,
                    anchors: anchors as usize,
                })
            })
            .collect()
    }

    /// Resolve a full id or unique id prefix.
    pub fn find_analysis_id(&self, prefix: &str) -> Result<Option<String>> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(None);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT id FROM analyses WHERE substr(id, 1, length(?1)) = ?1 LIMIT 2")?;
        let ids = stmt
            .query_map(params![prefix], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        match ids.as_slice() {
            [] => Ok(None),
            [id] => Ok(Some(id.clone())),
            _ => Err(AnalysisError::InvalidInput(format!(
                "Analysis id '{}' is ambiguous",
                prefix
            ))),
        }
    }

    pub fn delete_analysis(&self, id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM analyses WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

fn read_quota(conn: &Connection, caller: &str) -> Result<Option<UsageQuota>> {
    let row: Option<(i64, String)> = conn
        .query_row(
            "SELECT remaining, reset_at FROM quotas WHERE caller = ?1",
            params![caller],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    row.map(|(remaining, reset_at)| {
        Ok(UsageQuota {
            remaining_requests: remaining.max(0) as u32,
            reset_at: parse_timestamp(&reset_at)?,
        })
    })
    .transpose()
}

fn write_quota(conn: &Connection, caller: &str, quota: &UsageQuota) -> Result<()> {
    conn.execute(
        "INSERT INTO quotas (caller, remaining, reset_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(caller) DO UPDATE SET remaining = excluded.remaining, reset_at = excluded.reset_at",
        params![caller, quota.remaining_requests as i64, quota.reset_time()],
    )?;
    Ok(())
}

impl QuotaStore for Database {
    fn load(&self, caller: &str) -> Result<Option<UsageQuota>> {
        read_quota(&self.conn, caller)
    }

    fn save(&self, caller: &str, quota: &UsageQuota) -> Result<()> {
        write_quota(&self.conn, caller, quota)
    }

    fn try_consume(
        &self,
        caller: &str,
        fresh: &UsageQuota,
        now: DateTime<Utc>,
    ) -> Result<Option<UsageQuota>> {
        // IMMEDIATE takes the write lock up front, so other processes sharing
        // the file queue behind this read-and-decrement.
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;

        match read_quota(&tx, caller)? {
            Some(quota) if now < quota.reset_at => {}
            _ => write_quota(&tx, caller, fresh)?,
        }

        let consumed = tx.execute(
            "UPDATE quotas SET remaining = remaining - 1 WHERE caller = ?1 AND remaining > 0",
            params![caller],
        )?;
        let quota = if consumed == 1 {
            read_quota(&tx, caller)?
        } else {
            None
        };

        tx.commit()?;
        Ok(quota)
    }

    fn refund(&self, caller: &str, limit: u32, now: DateTime<Utc>) -> Result<()> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;

        if let Some(quota) = read_quota(&tx, caller)? {
            if now < quota.reset_at {
                tx.execute(
                    "UPDATE quotas SET remaining = MIN(remaining + 1, ?2) WHERE caller = ?1",
                    params![caller, limit as i64],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}
