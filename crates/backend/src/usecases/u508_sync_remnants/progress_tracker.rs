use contracts::usecases::u508_sync_remnants::{
    AccountProgress, CycleState, SyncProgress, SyncStatus,
};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Сколько завершенных сессий хранить в памяти
const MAX_SESSIONS: usize = 20;

/// Трекер прогресса синхронизации (in-memory, для real-time мониторинга)
#[derive(Clone, Default)]
pub struct ProgressTracker {
    sessions: Arc<RwLock<HashMap<String, SyncProgress>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F: FnOnce(&mut SyncProgress)>(&self, session_id: &str, f: F) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(progress) = sessions.get_mut(session_id) {
            f(progress);
            progress.updated_at = chrono::Utc::now();
        }
    }

    fn update_account<F: FnOnce(&mut AccountProgress)>(
        &self,
        session_id: &str,
        account_id: &str,
        f: F,
    ) {
        self.update(session_id, |progress| {
            if let Some(account) = progress
                .accounts
                .iter_mut()
                .find(|a| a.account_id == account_id)
            {
                f(account);
            }
        });
    }

    /// Создать новую сессию синхронизации
    pub fn create_session(&self, session_id: String) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

        if sessions.len() >= MAX_SESSIONS {
            let mut finished: Vec<(String, chrono::DateTime<chrono::Utc>)> = sessions
                .values()
                .filter(|p| p.status != SyncStatus::Running)
                .map(|p| (p.session_id.clone(), p.started_at))
                .collect();
            finished.sort_by_key(|(_, started_at)| *started_at);
            let excess = sessions.len() + 1 - MAX_SESSIONS;
            for (id, _) in finished.into_iter().take(excess) {
                sessions.remove(&id);
            }
        }

        sessions.insert(session_id.clone(), SyncProgress::new(session_id));
    }

    /// Получить текущий прогресс сессии
    pub fn get_progress(&self, session_id: &str) -> Option<SyncProgress> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(session_id).cloned()
    }

    /// Сессии, которые еще идут (по времени старта)
    pub fn running_sessions(&self) -> Vec<SyncProgress> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let mut running: Vec<SyncProgress> = sessions
            .values()
            .filter(|p| p.status == SyncStatus::Running)
            .cloned()
            .collect();
        running.sort_by_key(|p| p.started_at);
        running
    }

    /// Добавить кабинет для отслеживания
    pub fn add_account(&self, session_id: &str, account_id: String, label: String) {
        self.update(session_id, |progress| {
            progress.accounts.push(AccountProgress {
                account_id,
                label,
                state: CycleState::Pending,
                uploaded_chunks: 0,
            });
        });
    }

    pub fn set_state(&self, session_id: &str, account_id: &str, state: CycleState) {
        self.update_account(session_id, account_id, |account| account.state = state);
    }

    pub fn add_uploaded_chunks(&self, session_id: &str, account_id: &str, chunks: usize) {
        self.update_account(session_id, account_id, |account| {
            account.uploaded_chunks += chunks as i32;
        });
    }

    /// Отметить кабинет как проваленный
    pub fn fail_account(&self, session_id: &str, account_id: &str, kind: &str, message: String) {
        self.update(session_id, |progress| {
            if let Some(account) = progress
                .accounts
                .iter_mut()
                .find(|a| a.account_id == account_id)
            {
                account.state = CycleState::Failed;
            }
            progress.add_error(Some(account_id.to_string()), kind.to_string(), message);
        });
    }

    /// Ошибка уровня прогона (не привязана к кабинету)
    pub fn add_error(&self, session_id: &str, kind: &str, message: String) {
        self.update(session_id, |progress| {
            progress.add_error(None, kind.to_string(), message);
        });
    }

    /// Завершить сессию
    pub fn complete_session(&self, session_id: &str, status: SyncStatus) {
        self.update(session_id, |progress| {
            progress.status = status;
            progress.completed_at = Some(chrono::Utc::now());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_lifecycle() {
        let tracker = ProgressTracker::new();
        tracker.create_session("s1".into());
        tracker.add_account("s1", "42".into(), "Ozon".into());

        tracker.set_state("s1", "42", CycleState::Uploading);
        tracker.add_uploaded_chunks("s1", "42", 3);
        tracker.fail_account("s1", "42", "AuthError", "invalid token".into());
        tracker.complete_session("s1", SyncStatus::CompletedWithErrors);

        let progress = tracker.get_progress("s1").unwrap();
        assert_eq!(progress.status, SyncStatus::CompletedWithErrors);
        assert!(progress.completed_at.is_some());
        assert_eq!(progress.accounts[0].state, CycleState::Failed);
        assert_eq!(progress.accounts[0].uploaded_chunks, 3);
        assert_eq!(progress.total_errors, 1);
        assert_eq!(progress.errors[0].kind, "AuthError");
    }

    #[test]
    fn test_running_sessions_skip_finished() {
        let tracker = ProgressTracker::new();
        tracker.create_session("done".into());
        tracker.complete_session("done", SyncStatus::Completed);
        tracker.create_session("live".into());

        let running = tracker.running_sessions();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].session_id, "live");
    }

    #[test]
    fn test_unknown_session_is_ignored() {
        let tracker = ProgressTracker::new();
        tracker.set_state("missing", "42", CycleState::Done);
        assert!(tracker.get_progress("missing").is_none());
    }

    #[test]
    fn test_finished_sessions_are_pruned() {
        let tracker = ProgressTracker::new();
        for i in 0..MAX_SESSIONS + 5 {
            let id = format!("s{}", i);
            tracker.create_session(id.clone());
            tracker.complete_session(&id, SyncStatus::Completed);
        }
        let count = tracker.sessions.read().unwrap().len();
        assert_eq!(count, MAX_SESSIONS);
        assert!(tracker.get_progress(&format!("s{}", MAX_SESSIONS + 4)).is_some());
    }
}
