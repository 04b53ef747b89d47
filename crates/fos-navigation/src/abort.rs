//! AbortController and AbortSignal
//!
//! Cancellation mechanism for in-flight navigations.

use crate::{NavigationError, Result};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Abort listener handle
pub type AbortListenerId = u64;

type AbortCallback = Box<dyn FnOnce(&NavigationError)>;

/// AbortController - cancellation controller
#[derive(Debug, Clone)]
pub struct AbortController {
    signal: AbortSignal,
}

/// AbortSignal - cancellation state
#[derive(Clone)]
pub struct AbortSignal {
    inner: Rc<RefCell<AbortSignalInner>>,
}

struct AbortSignalInner {
    aborted: bool,
    reason: Option<NavigationError>,
    listeners: Vec<(AbortListenerId, AbortCallback)>,
    next_listener_id: AbortListenerId,
}

impl AbortController {
    /// Create a new abort controller
    pub fn new() -> Self {
        Self {
            signal: AbortSignal::new(),
        }
    }

    /// Get the associated signal
    pub fn signal(&self) -> &AbortSignal {
        &self.signal
    }

    /// Abort with a reason
    pub fn abort(&self, reason: NavigationError) {
        self.signal.abort(reason);
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortSignal {
    fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(AbortSignalInner {
                aborted: false,
                reason: None,
                listeners: Vec::new(),
                next_listener_id: 0,
            })),
        }
    }

    /// Create an already-aborted signal
    pub fn aborted(reason: NavigationError) -> Self {
        let signal = Self::new();
        signal.abort(reason);
        signal
    }

    /// Check if aborted
    pub fn is_aborted(&self) -> bool {
        self.inner.borrow().aborted
    }

    /// Get abort reason
    pub fn reason(&self) -> Option<NavigationError> {
        self.inner.borrow().reason.clone()
    }

    /// Add abort listener. Listeners added after abort never run.
    pub fn add_abort_listener(
        &self,
        callback: impl FnOnce(&NavigationError) + 'static,
    ) -> AbortListenerId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_listener_id;
        inner.next_listener_id += 1;
        if !inner.aborted {
            inner.listeners.push((id, Box::new(callback)));
        }
        id
    }

    /// Remove abort listener
    pub fn remove_abort_listener(&self, id: AbortListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.listeners.len();
        inner.listeners.retain(|(listener_id, _)| *listener_id != id);
        inner.listeners.len() != before
    }

    /// Throw if aborted
    pub fn throw_if_aborted(&self) -> Result<()> {
        match self.reason() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    fn abort(&self, reason: NavigationError) {
        let listeners = {
            let mut inner = self.inner.borrow_mut();
            if inner.aborted {
                return;
            }
            inner.aborted = true;
            inner.reason = Some(reason.clone());
            std::mem::take(&mut inner.listeners)
        };

        for (_, callback) in listeners {
            callback(&reason);
        }
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("AbortSignal")
            .field("aborted", &inner.aborted)
            .field("reason", &inner.reason)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_abort_controller() {
        let controller = AbortController::new();

        assert!(!controller.signal().is_aborted());

        controller.abort(NavigationError::Aborted("User cancelled".into()));

        assert!(controller.signal().is_aborted());
        assert_eq!(
            controller.signal().reason(),
            Some(NavigationError::Aborted("User cancelled".into()))
        );
    }

    #[test]
    fn test_throw_if_aborted() {
        let signal = AbortSignal::aborted(NavigationError::Aborted("test".into()));

        let result = signal.throw_if_aborted();
        assert!(result.is_err());
    }

    #[test]
    fn test_listeners_run_once() {
        let controller = AbortController::new();
        let count = Rc::new(Cell::new(0));

        let seen = Rc::clone(&count);
        controller.signal().add_abort_listener(move |reason| {
            assert!(reason.is_abort());
            seen.set(seen.get() + 1);
        });
        let removed = controller.signal().add_abort_listener(|_| panic!("removed listener ran"));
        assert!(controller.signal().remove_abort_listener(removed));

        controller.abort(NavigationError::Aborted("first".into()));
        controller.abort(NavigationError::Aborted("second".into()));

        assert_eq!(count.get(), 1);
        assert_eq!(
            controller.signal().reason(),
            Some(NavigationError::Aborted("first".into()))
        );
    }
}
