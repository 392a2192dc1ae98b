use serde::Serialize;
use std::collections::VecDeque;

use super::GoalId;

/// Ordered backlog of pending goals plus at most one active goal.
///
/// A goal id appears at most once across the active slot and the backlog.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GoalQueue {
    active: Option<GoalId>,
    backlog: VecDeque<GoalId>,
}

impl GoalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append goals not already present; promote the head when idle.
    /// Returns how many ids were added.
    pub fn enqueue<I>(&mut self, goals: I) -> usize
    where
        I: IntoIterator<Item = GoalId>,
    {
        let mut added = 0;
        for id in goals {
            if self.contains(&id) {
                continue;
            }
            self.backlog.push_back(id);
            added += 1;
        }
        if self.active.is_none() {
            self.active = self.backlog.pop_front();
        }
        added
    }

    /// Retire the active goal and promote the next one.
    /// Returns the completed id, if there was one.
    pub fn complete_active(&mut self) -> Option<GoalId> {
        let done = self.active.take();
        self.active = self.backlog.pop_front();
        if let Some(ref id) = done {
            tracing::info!(completed = %id, next = ?self.active, "goal completed");
        }
        done
    }

    pub fn active(&self) -> Option<&GoalId> {
        self.active.as_ref()
    }

    pub fn backlog(&self) -> impl Iterator<Item = &GoalId> {
        self.backlog.iter()
    }

    pub fn contains(&self, id: &GoalId) -> bool {
        self.active.as_ref() == Some(id) || self.backlog.contains(id)
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_none()
    }

    pub fn len(&self) -> usize {
        self.backlog.len() + usize::from(self.active.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<GoalId> {
        names.iter().map(|n| GoalId::from(*n)).collect()
    }

    #[test]
    fn test_first_enqueue_activates_head() {
        let mut q = GoalQueue::new();
        assert_eq!(q.enqueue(ids(&["A", "B"])), 2);
        assert_eq!(q.active(), Some(&GoalId::from("A")));
        assert_eq!(q.backlog().cloned().collect::<Vec<_>>(), ids(&["B"]));
    }

    #[test]
    fn test_complete_on_empty_queue_is_noop() {
        let mut q = GoalQueue::new();
        assert_eq!(q.complete_active(), None);
        assert!(q.is_idle());
        assert!(q.is_empty());
    }
}
