use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Состояние цикла синхронизации одного кабинета
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    /// Еще не запускался (или пропущен после остановки прогона)
    Pending,
    Fetching,
    Reconciling,
    Uploading,
    Done,
    Failed,
}

impl CycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CycleState::Done | CycleState::Failed)
    }
}

/// Фаза, на которой цикл может упасть
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Fetching,
    Reconciling,
    Uploading,
}

impl From<CyclePhase> for CycleState {
    fn from(phase: CyclePhase) -> Self {
        match phase {
            CyclePhase::Fetching => CycleState::Fetching,
            CyclePhase::Reconciling => CycleState::Reconciling,
            CyclePhase::Uploading => CycleState::Uploading,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Running,
    Completed,
    CompletedWithErrors,
    Failed,
}

/// Текущий прогресс синхронизации (для мониторинга во время прогона)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncProgress {
    pub session_id: String,
    pub status: SyncStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub accounts: Vec<AccountProgress>,
    pub total_errors: i32,
    pub errors: Vec<SyncErrorEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountProgress {
    pub account_id: String,
    pub label: String,
    pub state: CycleState,
    pub uploaded_chunks: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncErrorEntry {
    pub account_id: Option<String>,
    pub kind: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl SyncProgress {
    pub fn new(session_id: String) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            status: SyncStatus::Running,
            started_at: now,
            completed_at: None,
            updated_at: now,
            accounts: Vec::new(),
            total_errors: 0,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, account_id: Option<String>, kind: String, message: String) {
        self.errors.push(SyncErrorEntry {
            account_id,
            kind,
            message,
            occurred_at: Utc::now(),
        });
        self.total_errors += 1;
        self.updated_at = Utc::now();
    }
}
