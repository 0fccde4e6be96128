//! Completed-session records and the backend they are written to

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tokio::{fs::OpenOptions, io::AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{error::SessionError, state::TimerMode};

/// One completed pomodoro session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: String,
    pub mode: TimerMode,
    pub duration_secs: u32,
    pub completed_at: DateTime<Utc>,
    pub task_id: Option<String>,
}

impl SessionRecord {
    pub fn new(user_id: &str, mode: TimerMode, duration_secs: u32, task_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            mode,
            duration_secs,
            completed_at: Utc::now(),
            task_id,
        }
    }
}

/// Backend that stores completed sessions
pub trait SessionRecorder: Send + Sync {
    fn save(&self, record: SessionRecord) -> BoxFuture<'static, Result<(), SessionError>>;

    fn list(&self) -> BoxFuture<'static, Result<Vec<SessionRecord>, SessionError>>;
}

/// Appends sessions as JSON lines to a file
#[derive(Debug, Clone)]
pub struct FileSessionRecorder {
    path: PathBuf,
}

impl FileSessionRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionRecorder for FileSessionRecorder {
    fn save(&self, record: SessionRecord) -> BoxFuture<'static, Result<(), SessionError>> {
        append_record(self.path.clone(), record).boxed()
    }

    fn list(&self) -> BoxFuture<'static, Result<Vec<SessionRecord>, SessionError>> {
        read_records(self.path.clone()).boxed()
    }
}

async fn append_record(path: PathBuf, record: SessionRecord) -> Result<(), SessionError> {
    let mut line = serde_json::to_string(&record)?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;

    debug!("Saved session {} to {}", record.id, path.display());
    Ok(())
}

async fn read_records(path: PathBuf) -> Result<Vec<SessionRecord>, SessionError> {
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let records = raw
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping unreadable session line: {}", e);
                None
            }
        })
        .collect();
    Ok(records)
}

/// Keeps sessions in memory; can be told to reject writes
#[derive(Debug, Clone, Default)]
pub struct MemorySessionRecorder {
    records: Arc<Mutex<Vec<SessionRecord>>>,
    reject: Arc<AtomicBool>,
    attempts: Arc<Mutex<u32>>,
}

impl MemorySessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder whose every save fails
    pub fn rejecting() -> Self {
        let recorder = Self::default();
        recorder.set_rejecting(true);
        recorder
    }

    pub fn set_rejecting(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Number of save calls, successful or not
    pub fn attempts(&self) -> u32 {
        self.attempts.lock().map(|n| *n).unwrap_or(0)
    }

    pub fn records(&self) -> Vec<SessionRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl SessionRecorder for MemorySessionRecorder {
    fn save(&self, record: SessionRecord) -> BoxFuture<'static, Result<(), SessionError>> {
        let recorder = self.clone();
        async move {
            if let Ok(mut attempts) = recorder.attempts.lock() {
                *attempts += 1;
            }
            if recorder.reject.load(Ordering::SeqCst) {
                return Err(SessionError::Rejected("backend unavailable".to_string()));
            }
            if let Ok(mut records) = recorder.records.lock() {
                records.push(record);
            }
            Ok(())
        }
        .boxed()
    }

    fn list(&self) -> BoxFuture<'static, Result<Vec<SessionRecord>, SessionError>> {
        let records = self.records();
        async move { Ok::<_, SessionError>(records) }.boxed()
    }
}
