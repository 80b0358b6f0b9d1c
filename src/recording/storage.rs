// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! SQLite-based interaction storage.

use std::path::{Path, PathBuf};
#[cfg(feature = "telemetry")]
use std::time::Instant;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::RecordingError;
use crate::telemetry::CorrelationId;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use super::{RecordedInteraction, RequestRecord, ResponseRecord};

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Interaction storage using SQLite.
pub struct RecordingStore {
    conn: Connection,
    path: PathBuf,
}

impl RecordingStore {
    /// Open or create a recordings database at `db_path`.
    pub fn open_at(db_path: &Path) -> Result<Self, RecordingError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RecordingError::OpenFailed(format!("Failed to create directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| {
            RecordingError::OpenFailed(format!("Failed to open recordings database: {}", e))
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| RecordingError::OpenFailed(format!("Failed to set pragmas: {}", e)))?;

        let mut store = Self {
            conn,
            path: db_path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&mut self) -> Result<(), RecordingError> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS request_records (
                correlation_id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                messages TEXT NOT NULL,
                system_prompt TEXT,
                timestamp INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS response_records (
                correlation_id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                response TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_requests_timestamp ON request_records(timestamp DESC);
            CREATE INDEX IF NOT EXISTS idx_requests_session ON request_records(session_id);
            "#,
            )
            .map_err(|e| RecordingError::OpenFailed(format!("Failed to create schema: {}", e)))?;

        let current_version: Option<u32> = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| RecordingError::OpenFailed(format!("Failed to get schema version: {}", e)))?;

        if current_version.is_none() {
            self.conn
                .execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    params![SCHEMA_VERSION],
                )
                .map_err(|e| {
                    RecordingError::OpenFailed(format!("Failed to set schema version: {}", e))
                })?;
        }

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store a request record.
    pub fn insert_request(&self, record: &RequestRecord) -> Result<(), RecordingError> {
        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        let messages = serde_json::to_string(&record.messages)
            .map_err(|e| RecordingError::WriteFailed(e.to_string()))?;

        self.conn.execute(
            r#"
            INSERT INTO request_records (
                correlation_id, agent_id, session_id, messages, system_prompt, timestamp
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.correlation_id.to_string(),
                record.agent_id,
                record.session_id,
                messages,
                record.system_prompt,
                record.timestamp,
            ],
        )?;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("recording.store.request", start.elapsed());

        Ok(())
    }

    /// Store a response record.
    pub fn insert_response(&self, record: &ResponseRecord) -> Result<(), RecordingError> {
        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        self.conn.execute(
            r#"
            INSERT INTO response_records (
                correlation_id, agent_id, session_id, response, timestamp
            ) VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                record.correlation_id.to_string(),
                record.agent_id,
                record.session_id,
                record.response,
                record.timestamp,
            ],
        )?;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("recording.store.response", start.elapsed());

        Ok(())
    }

    /// Most recent interactions first.
    pub fn list_interactions(&self, limit: usize) -> Result<Vec<RecordedInteraction>, RecordingError> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
            SELECT correlation_id, agent_id, session_id, messages, system_prompt, timestamp
            FROM request_records
            ORDER BY timestamp DESC
            LIMIT ?
            "#,
            )
            .map_err(|e| RecordingError::ReadFailed(e.to_string()))?;

        let requests = stmt
            .query_map(params![limit as i64], read_request_row)
            .map_err(|e| RecordingError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RecordingError::ReadFailed(e.to_string()))?;

        requests
            .into_iter()
            .map(|raw| {
                let request = raw.into_record()?;
                let response = self.find_response(&request.correlation_id)?;
                Ok(RecordedInteraction { request, response })
            })
            .collect()
    }

    /// Look up one interaction by correlation id.
    pub fn find_interaction(
        &self,
        correlation_id: &CorrelationId,
    ) -> Result<Option<RecordedInteraction>, RecordingError> {
        let raw = self
            .conn
            .query_row(
                r#"
            SELECT correlation_id, agent_id, session_id, messages, system_prompt, timestamp
            FROM request_records WHERE correlation_id = ?
            "#,
                params![correlation_id.to_string()],
                read_request_row,
            )
            .optional()
            .map_err(|e| RecordingError::ReadFailed(e.to_string()))?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let request = raw.into_record()?;
        let response = self.find_response(correlation_id)?;
        Ok(Some(RecordedInteraction { request, response }))
    }

    fn find_response(
        &self,
        correlation_id: &CorrelationId,
    ) -> Result<Option<ResponseRecord>, RecordingError> {
        self.conn
            .query_row(
                r#"
            SELECT agent_id, session_id, response, timestamp
            FROM response_records WHERE correlation_id = ?
            "#,
                params![correlation_id.to_string()],
                |row| {
                    Ok(ResponseRecord {
                        agent_id: row.get(0)?,
                        session_id: row.get(1)?,
                        correlation_id: *correlation_id,
                        response: row.get(2)?,
                        timestamp: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(|e| RecordingError::ReadFailed(e.to_string()))
    }

    /// Number of recorded requests.
    pub fn count(&self) -> Result<usize, RecordingError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM request_records", [], |row| row.get(0))
            .map_err(|e| RecordingError::ReadFailed(e.to_string()))?;
        Ok(count as usize)
    }
}

/// Request row before JSON and id decoding.
struct RawRequest {
    correlation_id: String,
    agent_id: String,
    session_id: String,
    messages: String,
    system_prompt: Option<String>,
    timestamp: i64,
}

fn read_request_row(row: &Row<'_>) -> rusqlite::Result<RawRequest> {
    Ok(RawRequest {
        correlation_id: row.get(0)?,
        agent_id: row.get(1)?,
        session_id: row.get(2)?,
        messages: row.get(3)?,
        system_prompt: row.get(4)?,
        timestamp: row.get(5)?,
    })
}

impl RawRequest {
    fn into_record(self) -> Result<RequestRecord, RecordingError> {
        let correlation_id = self
            .correlation_id
            .parse()
            .map_err(|e| RecordingError::ReadFailed(format!("Bad correlation id: {}", e)))?;
        let messages = serde_json::from_str(&self.messages)
            .map_err(|e| RecordingError::ReadFailed(format!("Bad messages: {}", e)))?;

        Ok(RequestRecord {
            agent_id: self.agent_id,
            session_id: self.session_id,
            correlation_id,
            messages,
            system_prompt: self.system_prompt,
            timestamp: self.timestamp,
        })
    }
}
