//! Navigation results
//!
//! The outcome of one navigation attempt: a `committed` promise, a
//! `finished` promise and an abort signal that fires when `finished` rejects.

use crate::abort::{AbortController, AbortSignal};
use crate::entry::HistoryEntry;
use crate::promise::NavigationPromise;
use crate::NavigationError;

/// Result of a navigation
///
/// Handles are cheap to clone; clones observe the same promises.
#[derive(Debug, Clone)]
pub struct NavigationResult {
    committed: NavigationPromise<HistoryEntry>,
    finished: NavigationPromise<HistoryEntry>,
    controller: AbortController,
}

impl NavigationResult {
    pub(crate) fn new() -> Self {
        Self {
            committed: NavigationPromise::pending(),
            finished: NavigationPromise::pending(),
            controller: AbortController::new(),
        }
    }

    /// A result for a navigation that had nothing to do
    pub(crate) fn resolved(entry: HistoryEntry) -> Self {
        Self {
            committed: NavigationPromise::resolved(entry.clone()),
            finished: NavigationPromise::resolved(entry),
            controller: AbortController::new(),
        }
    }

    /// A result for a navigation that failed before it started
    pub(crate) fn rejected(error: NavigationError) -> Self {
        let result = Self::new();
        result.committed_reject(error.clone());
        result.finished_reject(error);
        result
    }

    /// Resolves with the new current entry once the navigation commits
    pub fn committed(&self) -> NavigationPromise<HistoryEntry> {
        self.committed.clone()
    }

    /// Resolves once the navigation committed and every interception
    /// handler completed
    pub fn finished(&self) -> NavigationPromise<HistoryEntry> {
        self.finished.clone()
    }

    pub fn signal(&self) -> &AbortSignal {
        self.controller.signal()
    }

    /// Whether both results share the same pair of promises
    pub fn same_as(&self, other: &Self) -> bool {
        self.committed.same_as(&other.committed) && self.finished.same_as(&other.finished)
    }

    pub(crate) fn committed_resolve(&self, entry: HistoryEntry) {
        self.committed.resolve(entry);
    }

    pub(crate) fn committed_reject(&self, error: NavigationError) {
        self.committed.reject(error);
    }

    pub(crate) fn finished_resolve(&self, entry: HistoryEntry) {
        self.finished.resolve(entry);
    }

    pub(crate) fn finished_reject(&self, error: NavigationError) {
        if self.finished.reject(error.clone()) {
            self.controller.abort(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promise::PromiseState;

    #[test]
    fn test_finished_reject_aborts_signal() {
        let result = NavigationResult::new();
        assert!(!result.signal().is_aborted());

        result.committed_reject(NavigationError::Aborted("superseded".into()));
        assert!(!result.signal().is_aborted());

        result.finished_reject(NavigationError::Aborted("superseded".into()));
        assert!(result.signal().is_aborted());
        assert_eq!(result.finished().state(), PromiseState::Rejected);
    }

    #[test]
    fn test_rejected_settles_both() {
        let result = NavigationResult::rejected(NavigationError::CannotGoBack);
        assert_eq!(
            result.committed().try_get().map(|r| r.is_err()),
            Some(true)
        );
        assert_eq!(
            result.finished().try_get(),
            Some(Err(NavigationError::CannotGoBack))
        );
        assert_eq!(result.signal().reason(), Some(NavigationError::CannotGoBack));
    }

    #[test]
    fn test_same_as() {
        let result = NavigationResult::new();
        assert!(result.same_as(&result.clone()));
        assert!(!result.same_as(&NavigationResult::new()));
    }
}
