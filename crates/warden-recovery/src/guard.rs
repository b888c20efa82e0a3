//! Per-action in-flight tracking.
//!
//! Each workflow action may run at most once at a time. A second trigger while
//! the first is still running is rejected rather than queued.

use crate::types::WorkflowAction;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use warden_core::{WardenError, WardenResult};

/// Set of actions currently running.
#[derive(Debug, Clone, Default)]
pub struct InFlightActions {
    running: Arc<Mutex<HashSet<WorkflowAction>>>,
}

impl InFlightActions {
    /// Empty set, nothing running.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `action` as running. Fails with `ActionInProgress` if it already is.
    pub fn enter(&self, action: WorkflowAction) -> WardenResult<ActionGuard> {
        let mut running = self.running.lock();
        if !running.insert(action) {
            return Err(WardenError::action_in_progress(action.as_str()));
        }
        Ok(ActionGuard {
            action,
            running: Arc::clone(&self.running),
        })
    }

    /// Whether `action` is currently running.
    pub fn is_running(&self, action: WorkflowAction) -> bool {
        self.running.lock().contains(&action)
    }
}

/// Clears the action's in-flight mark when dropped.
#[derive(Debug)]
pub struct ActionGuard {
    action: WorkflowAction,
    running: Arc<Mutex<HashSet<WorkflowAction>>>,
}

impl ActionGuard {
    pub fn action(&self) -> WorkflowAction {
        self.action
    }
}

impl Drop for ActionGuard {
    fn drop(&mut self) {
        self.running.lock().remove(&self.action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn second_entry_is_rejected_until_guard_drops() {
        let actions = InFlightActions::new();
        let guard = actions.enter(WorkflowAction::BeginRecovery).unwrap();
        assert!(actions.is_running(WorkflowAction::BeginRecovery));

        assert_matches!(
            actions.enter(WorkflowAction::BeginRecovery),
            Err(WardenError::ActionInProgress { action }) if action == "begin_recovery"
        );

        drop(guard);
        assert!(!actions.is_running(WorkflowAction::BeginRecovery));
        assert!(actions.enter(WorkflowAction::BeginRecovery).is_ok());
    }

    #[test]
    fn distinct_actions_run_independently() {
        let actions = InFlightActions::new();
        let _add = actions.enter(WorkflowAction::AddGuardian).unwrap();
        let finalize = actions.enter(WorkflowAction::FinalizeRecovery).unwrap();
        assert_eq!(finalize.action(), WorkflowAction::FinalizeRecovery);
    }
}
