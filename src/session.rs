//! Per-session research state. One turn holds the lock for its whole duration.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::context::Context;
use crate::goals::GoalQueue;
use crate::ingest::DataTable;
use crate::producers::GoalRun;

#[derive(Debug, Clone)]
pub struct SessionState {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub context: Context,
    pub queue: GoalQueue,
    pub dataset: Option<Arc<DataTable>>,
    /// Ids of user notes already stored as evidence
    pub note_ids: HashSet<String>,
    /// Findings of the most recent run for the active goal
    pub last_run: Option<GoalRun>,
    /// The last run was judged clear; the next plain turn completes the goal
    pub settled: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            context: Context::new(),
            queue: GoalQueue::new(),
            dataset: None,
            note_ids: HashSet::new(),
            last_run: None,
            settled: false,
        }
    }

    /// Drop run results tied to the previous goal or dataset
    pub fn invalidate_run(&mut self) {
        self.last_run = None;
        self.settled = false;
    }

    /// Replace all state wholesale under a fresh id
    pub fn reset(&mut self) {
        let old = self.id;
        *self = Self::new();
        tracing::info!(old = %old, new = %self.id, "session reset");
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct Session {
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goals::GoalId;

    #[tokio::test]
    async fn test_reset_replaces_everything() {
        let session = Session::new();
        let before = {
            let mut s = session.lock().await;
            s.context.set("product_concept", "meal kits");
            s.queue.enqueue([GoalId::new("GOAL_1_LAUNCH")]);
            s.note_ids.insert("n1".into());
            s.settled = true;
            s.id
        };
        session.lock().await.reset();
        let after = session.snapshot().await;
        assert_ne!(after.id, before);
        assert!(after.context.is_empty());
        assert!(after.queue.is_empty());
        assert!(after.note_ids.is_empty());
        assert!(!after.settled);
    }
}
