//! NavigateEvent
//!
//! The cancelable, interceptable event fired for every navigation attempt.
//!
//! Lifecycle:
//!
//! ```text
//! created -> dispatching -> dispatched -> committing -> committed -> finished
//!    \____________\______________\_____________\
//!                                               cancelled
//! ```
//!
//! Listeners may call [`NavigateEvent::intercept`] only while the event is
//! being dispatched. After dispatch the navigation commits immediately unless
//! an interceptor asked for [`CommitOption::AfterTransition`], in which case
//! commit waits for the handlers or an explicit [`NavigateEvent::commit`].
//! Interception handlers are called once dispatch is over, after the
//! commit when it is immediate.

use crate::abort::AbortSignal;
use crate::destination::Destination;
use crate::entry::{HistoryEntry, StateValue};
use crate::promise::{NavigationPromise, PromiseState};
use crate::result::NavigationResult;
use crate::{NavigationError, Result};
use serde::{Deserialize, Serialize};
use smol::LocalExecutor;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

/// Navigation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationType {
    Push,
    Replace,
    Traverse,
}

impl NavigationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationType::Push => "push",
            NavigationType::Replace => "replace",
            NavigationType::Traverse => "traverse",
        }
    }
}

impl fmt::Display for NavigationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When an intercepted navigation commits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitOption {
    /// Right after the navigate event finished dispatching
    #[default]
    Immediate,
    /// When the handlers complete, or on an explicit `commit()`
    AfterTransition,
}

/// `focusReset` intercept option. Not supported by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusReset {
    AfterTransition,
    Manual,
}

/// `scroll` intercept option. Not supported by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    AfterTransition,
    Manual,
}

/// Future returned by an interception handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<()>>>>;

/// Interception handler, called once when `intercept()` is called
pub type InterceptHandler = Box<dyn FnOnce() -> HandlerFuture>;

/// Options for [`NavigateEvent::intercept`]
#[derive(Default)]
pub struct InterceptOptions {
    pub handler: Option<InterceptHandler>,
    pub commit: Option<CommitOption>,
    pub focus_reset: Option<FocusReset>,
    pub scroll: Option<ScrollBehavior>,
}

impl InterceptOptions {
    /// Intercept with an async handler that gates `finished`
    pub fn with_handler<F, Fut>(handler: F) -> Self
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = Result<()>> + 'static,
    {
        Self {
            handler: Some(Box::new(move || Box::pin(handler()) as HandlerFuture)),
            ..Self::default()
        }
    }

    pub fn commit(mut self, commit: CommitOption) -> Self {
        self.commit = Some(commit);
        self
    }
}

impl fmt::Debug for InterceptOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptOptions")
            .field("handler", &self.handler.is_some())
            .field("commit", &self.commit)
            .field("focus_reset", &self.focus_reset)
            .field("scroll", &self.scroll)
            .finish()
    }
}

/// Lifecycle phase of a navigate event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigateEventPhase {
    Created,
    Dispatching,
    Dispatched,
    Committing,
    Committed,
    Finished,
    Cancelled,
}

/// Applies a committed navigation to the entry list
pub(crate) type CommitHook = Rc<dyn Fn(&NavigateEvent) -> Result<()>>;

pub(crate) struct NavigateEventInit {
    pub navigation_type: NavigationType,
    pub destination: Destination,
    pub cancelable: bool,
    pub can_intercept: bool,
    pub user_initiated: bool,
    pub hash_change: bool,
    pub info: StateValue,
    pub skip_pop_state: bool,
    pub result: NavigationResult,
    pub executor: Rc<LocalExecutor<'static>>,
    pub commit_hook: CommitHook,
}

/// Navigate event
///
/// A cheap handle; listeners receive a reference and may clone it to call
/// [`commit`](Self::commit) later from an interception handler.
#[derive(Clone)]
pub struct NavigateEvent {
    inner: Rc<NavigateEventInner>,
}

struct NavigateEventInner {
    navigation_type: NavigationType,
    destination: Destination,
    cancelable: bool,
    can_intercept: bool,
    user_initiated: bool,
    hash_change: bool,
    info: StateValue,
    skip_pop_state: bool,
    result: NavigationResult,
    executor: Rc<LocalExecutor<'static>>,
    commit_hook: CommitHook,
    state: RefCell<EventState>,
}

struct EventState {
    phase: NavigateEventPhase,
    same_document: bool,
    commit_option: CommitOption,
    intercept_called: bool,
    commit_called: bool,
    default_prevented: bool,
    /// Handlers registered by `intercept()`, not yet called
    pending_handlers: Vec<InterceptHandler>,
    handlers_started: bool,
    handlers: Vec<NavigationPromise<()>>,
}

impl NavigateEvent {
    pub(crate) fn new(init: NavigateEventInit) -> Self {
        let same_document = init.destination.same_document();
        Self {
            inner: Rc::new(NavigateEventInner {
                navigation_type: init.navigation_type,
                destination: init.destination,
                cancelable: init.cancelable,
                can_intercept: init.can_intercept,
                user_initiated: init.user_initiated,
                hash_change: init.hash_change,
                info: init.info,
                skip_pop_state: init.skip_pop_state,
                result: init.result,
                executor: init.executor,
                commit_hook: init.commit_hook,
                state: RefCell::new(EventState {
                    phase: NavigateEventPhase::Created,
                    same_document,
                    commit_option: CommitOption::Immediate,
                    intercept_called: false,
                    commit_called: false,
                    default_prevented: false,
                    pending_handlers: Vec::new(),
                    handlers_started: false,
                    handlers: Vec::new(),
                }),
            }),
        }
    }

    pub fn navigation_type(&self) -> NavigationType {
        self.inner.navigation_type
    }

    pub fn destination(&self) -> &Destination {
        &self.inner.destination
    }

    pub fn cancelable(&self) -> bool {
        self.inner.cancelable
    }

    pub fn can_intercept(&self) -> bool {
        self.inner.can_intercept
    }

    pub fn user_initiated(&self) -> bool {
        self.inner.user_initiated
    }

    pub fn hash_change(&self) -> bool {
        self.inner.hash_change
    }

    /// `info` passed to the navigation call
    pub fn info(&self) -> &StateValue {
        &self.inner.info
    }

    /// Fires when the navigation is aborted or its handlers fail
    pub fn signal(&self) -> &AbortSignal {
        self.inner.result.signal()
    }

    pub fn skip_pop_state(&self) -> bool {
        self.inner.skip_pop_state
    }

    /// Whether the navigation stays in the current document.
    /// Becomes true once the event is intercepted.
    pub fn same_document(&self) -> bool {
        self.inner.state.borrow().same_document
    }

    pub fn commit_option(&self) -> CommitOption {
        self.inner.state.borrow().commit_option
    }

    pub fn phase(&self) -> NavigateEventPhase {
        self.inner.state.borrow().phase
    }

    pub fn intercepted(&self) -> bool {
        self.inner.state.borrow().intercept_called
    }

    pub fn default_prevented(&self) -> bool {
        self.inner.state.borrow().default_prevented
    }

    pub fn is_cancelled(&self) -> bool {
        self.phase() == NavigateEventPhase::Cancelled
    }

    #[cfg(test)]
    pub(crate) fn result(&self) -> &NavigationResult {
        &self.inner.result
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Cancel the navigation. Only honoured for cancelable events during dispatch.
    pub fn prevent_default(&self) {
        let mut state = self.inner.state.borrow_mut();
        if self.inner.cancelable && state.phase == NavigateEventPhase::Dispatching {
            state.default_prevented = true;
        }
    }

    /// Claim the navigation as same-document and optionally defer it.
    ///
    /// The handler is not called here. It runs once dispatch is over and,
    /// for an immediate commit, after the navigation committed.
    pub fn intercept(&self, options: InterceptOptions) -> Result<()> {
        if options.focus_reset.is_some() || options.scroll.is_some() {
            return Err(NavigationError::Unsupported(
                "intercept() focusReset and scroll options",
            ));
        }

        {
            let mut state = self.inner.state.borrow_mut();
            if !self.inner.can_intercept {
                return Err(NavigationError::InvalidState(
                    "this navigation cannot be intercepted".into(),
                ));
            }
            if state.phase != NavigateEventPhase::Dispatching {
                return Err(NavigationError::InvalidState(
                    "intercept() may only be called while the navigate event is being dispatched"
                        .into(),
                ));
            }
            state.intercept_called = true;
            state.same_document = true;
            if let Some(commit) = options.commit {
                state.commit_option = commit;
            }
            if let Some(handler) = options.handler {
                state.pending_handlers.push(handler);
            }
        }
        Ok(())
    }

    /// Not supported by the simulator
    pub fn scroll(&self) -> Result<()> {
        Err(NavigationError::Unsupported("NavigateEvent.scroll()"))
    }

    /// Commit an intercepted navigation.
    ///
    /// Requires a prior `intercept()`, may not run during dispatch and may
    /// only run once.
    pub fn commit(&self) -> Result<()> {
        self.commit_with(false)
    }

    /// Commit on behalf of the navigation itself, without the intercept requirement
    pub(crate) fn commit_internal(&self) -> Result<()> {
        self.commit_with(true)
    }

    fn commit_with(&self, internal: bool) -> Result<()> {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.phase == NavigateEventPhase::Cancelled {
                return Err(NavigationError::InvalidState(
                    "commit() called on an aborted navigation".into(),
                ));
            }
            if !internal && !state.intercept_called {
                return Err(NavigationError::InvalidState(
                    "intercept() must be called before commit()".into(),
                ));
            }
            if matches!(
                state.phase,
                NavigateEventPhase::Created | NavigateEventPhase::Dispatching
            ) {
                return Err(NavigationError::InvalidState(
                    "commit() may not be called during event dispatch".into(),
                ));
            }
            if state.commit_called {
                return Err(NavigationError::InvalidState("commit() already called".into()));
            }
            state.commit_called = true;
            state.phase = NavigateEventPhase::Committing;
        }

        (self.inner.commit_hook)(self)
    }

    /// Reject both promises. No effect once the navigation committed.
    pub(crate) fn cancel(&self, error: NavigationError) {
        {
            let mut state = self.inner.state.borrow_mut();
            if matches!(
                state.phase,
                NavigateEventPhase::Committed
                    | NavigateEventPhase::Finished
                    | NavigateEventPhase::Cancelled
            ) {
                return;
            }
            state.phase = NavigateEventPhase::Cancelled;
        }
        self.inner.result.committed_reject(error.clone());
        self.inner.result.finished_reject(error);
    }

    pub(crate) fn begin_dispatch(&self) {
        self.inner.state.borrow_mut().phase = NavigateEventPhase::Dispatching;
    }

    pub(crate) fn dispatched_navigate_event(&self) {
        let mut state = self.inner.state.borrow_mut();
        if state.phase == NavigateEventPhase::Dispatching {
            state.phase = NavigateEventPhase::Dispatched;
        }
    }

    pub(crate) fn user_agent_navigated(&self, entry: HistoryEntry) {
        self.inner.state.borrow_mut().phase = NavigateEventPhase::Committed;
        self.inner.result.committed_resolve(entry);
    }

    /// Call the interception handlers and spawn their futures. Does nothing
    /// for a cancelled navigation.
    pub(crate) fn start_handlers(&self) {
        let pending = {
            let mut state = self.inner.state.borrow_mut();
            if state.handlers_started || state.phase == NavigateEventPhase::Cancelled {
                return;
            }
            state.handlers_started = true;
            std::mem::take(&mut state.pending_handlers)
        };
        for handler in pending {
            let finished = self.spawn_handler(handler);
            self.inner.state.borrow_mut().handlers.push(finished);
        }
        self.try_finish();
    }

    /// Resolve `finished` if the navigation committed and all handlers fulfilled
    pub(crate) fn try_finish(&self) {
        {
            let state = self.inner.state.borrow();
            if state.phase != NavigateEventPhase::Committed
                || !state.handlers_started
                || !state
                    .handlers
                    .iter()
                    .all(|handler| handler.state() == PromiseState::Fulfilled)
            {
                return;
            }
        }
        let Some(Ok(entry)) = self.inner.result.committed().try_get() else {
            return;
        };
        self.inner.state.borrow_mut().phase = NavigateEventPhase::Finished;
        self.inner.result.finished_resolve(entry);
    }

    fn spawn_handler(&self, handler: InterceptHandler) -> NavigationPromise<()> {
        let future = handler();
        let finished = NavigationPromise::pending();

        let settle = finished.clone();
        self.inner
            .executor
            .spawn(async move {
                match future.await {
                    Ok(()) => settle.resolve(()),
                    Err(error) => settle.reject(error),
                };
            })
            .detach();

        let event = self.clone();
        finished.on_settled(move |outcome| event.handler_settled(outcome));
        finished
    }

    fn handler_settled(&self, outcome: &Result<()>) {
        match outcome {
            Ok(()) => {
                let auto_commit = {
                    let state = self.inner.state.borrow();
                    state.commit_option == CommitOption::AfterTransition
                        && !state.commit_called
                        && state.phase == NavigateEventPhase::Dispatched
                        && state
                            .handlers
                            .iter()
                            .all(|handler| handler.state() == PromiseState::Fulfilled)
                };
                if auto_commit {
                    if let Err(error) = self.commit_internal() {
                        tracing::debug!(%error, "deferred commit failed");
                    }
                }
                self.try_finish();
            }
            Err(error) => {
                tracing::debug!(%error, url = self.destination().url(), "navigation handler failed");
                {
                    let mut state = self.inner.state.borrow_mut();
                    if !matches!(
                        state.phase,
                        NavigateEventPhase::Committed | NavigateEventPhase::Finished
                    ) {
                        state.phase = NavigateEventPhase::Cancelled;
                    }
                }
                self.inner.result.committed_reject(error.clone());
                self.inner.result.finished_reject(error.clone());
            }
        }
    }
}

impl fmt::Debug for NavigateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("NavigateEvent")
            .field("navigation_type", &self.inner.navigation_type)
            .field("destination", &self.inner.destination.url())
            .field("hash_change", &self.inner.hash_change)
            .field("phase", &state.phase)
            .field("same_document", &state.same_document)
            .field("commit_option", &state.commit_option)
            .finish()
    }
}
