//! Navigation API simulator
//!
//! [`FakeNavigation`] owns the session history entries and turns public
//! calls into navigate events, commits and the secondary events that
//! follow them. Traversals go through the [`TraversalScheduler`]; push,
//! replace and `navigate()` run their interception immediately and abort
//! any navigation that has not committed yet.

use crate::config::NavigationConfig;
use crate::destination::Destination;
use crate::entry::{serialize_state, EntryInit, HistoryEntry, StateValue};
use crate::events::{
    CurrentEntryChangeEvent, EventTarget, ListenerId, ListenerOptions, NavigateErrorEvent,
    NavigateSuccessEvent, NavigationEvent, NavigationEventType, PopStateEvent,
};
use crate::location::{is_hash_change, parse_url, resolve_url};
use crate::navigate_event::{
    CommitHook, CommitOption, NavigateEvent, NavigateEventInit, NavigationType,
};
use crate::result::NavigationResult;
use crate::scheduler::TraversalScheduler;
use crate::{NavigationError, Result};
use serde::Serialize;
use smol::LocalExecutor;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// `history` option of [`FakeNavigation::navigate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryBehavior {
    /// Replace when the URL is unchanged, push otherwise
    #[default]
    Auto,
    Push,
    Replace,
}

/// Options for [`FakeNavigation::navigate`]
#[derive(Debug, Clone, Default)]
pub struct NavigateOptions {
    pub history: HistoryBehavior,
    pub state: StateValue,
    pub info: StateValue,
}

impl NavigateOptions {
    pub fn push() -> Self {
        Self {
            history: HistoryBehavior::Push,
            ..Self::default()
        }
    }

    pub fn replace() -> Self {
        Self {
            history: HistoryBehavior::Replace,
            ..Self::default()
        }
    }

    pub fn with_state(mut self, state: StateValue) -> Self {
        self.state = state;
        self
    }

    pub fn with_info(mut self, info: StateValue) -> Self {
        self.info = info;
        self
    }
}

/// Options for traversals
#[derive(Debug, Clone, Default)]
pub struct NavigationOptions {
    pub info: StateValue,
}

/// Options for [`FakeNavigation::set_initial_entry_for_testing`]
#[derive(Debug, Clone, Default)]
pub struct InitialEntryOptions {
    pub history_state: StateValue,
    pub state: StateValue,
}

/// Per-attempt flags handed to the navigate event
struct NavigateInit {
    navigation_type: NavigationType,
    cancelable: bool,
    can_intercept: bool,
    user_initiated: bool,
    hash_change: bool,
    info: StateValue,
    skip_pop_state: bool,
}

impl NavigateInit {
    fn new(navigation_type: NavigationType, hash_change: bool, info: StateValue) -> Self {
        Self {
            navigation_type,
            cancelable: true,
            can_intercept: true,
            user_initiated: false,
            hash_change,
            info,
            skip_pop_state: false,
        }
    }
}

struct NavigationState {
    entries: Vec<HistoryEntry>,
    current_entry_index: usize,
    /// Where queued traversals will leave the index; lets `go()` calls compose
    prospective_entry_index: usize,
    /// The navigation that has been dispatched but not committed
    navigate_event: Option<NavigateEvent>,
    /// In-flight traversals by target key
    traversal_queue: HashMap<String, NavigationResult>,
    next_id: u64,
    next_key: u64,
    can_set_initial_entry: bool,
    disposed: bool,
}

impl NavigationState {
    fn current_entry(&self) -> &HistoryEntry {
        &self.entries[self.current_entry_index]
    }

    fn find_entry(&self, key: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.key() == key)
    }

    fn allocate_id(&mut self) -> String {
        let id = self.next_id;
        self.next_id += 1;
        id.to_string()
    }

    fn allocate_key(&mut self) -> String {
        let key = self.next_key;
        self.next_key += 1;
        key.to_string()
    }

    fn take_if_current(&mut self, event: &NavigateEvent) -> bool {
        if self.navigate_event.as_ref().is_some_and(|e| e.ptr_eq(event)) {
            self.navigate_event = None;
            true
        } else {
            false
        }
    }

    /// Apply a push or replace. Returns the entries that left the list.
    fn user_agent_push_or_replace(
        &mut self,
        destination: &Destination,
        navigation_type: NavigationType,
    ) -> Vec<HistoryEntry> {
        let push = navigation_type == NavigationType::Push;
        if push {
            self.current_entry_index += 1;
            self.prospective_entry_index = self.current_entry_index;
        }
        let index = self.current_entry_index;
        let key = if push {
            self.allocate_key()
        } else {
            self.entries[index].key().to_string()
        };
        let entry = HistoryEntry::new(
            destination.url().to_string(),
            EntryInit {
                key,
                id: self.allocate_id(),
                index,
                same_document: true,
                state: destination.state().clone(),
                history_state: destination.history_state().clone(),
            },
        );

        if push {
            // Pushing drops the forward branch
            let removed = self.entries.split_off(index);
            self.entries.push(entry);
            removed
        } else {
            vec![std::mem::replace(&mut self.entries[index], entry)]
        }
    }

    /// Apply a traversal. The entry list itself is untouched.
    fn user_agent_traverse(&mut self, destination: &Destination) -> Result<()> {
        let index = usize::try_from(destination.index())
            .ok()
            .filter(|index| *index < self.entries.len())
            .ok_or_else(|| {
                NavigationError::InvalidState(format!(
                    "traversal target index {} is out of range",
                    destination.index()
                ))
            })?;
        self.current_entry_index = index;
        Ok(())
    }
}

struct NavigationShared {
    executor: Rc<LocalExecutor<'static>>,
    scheduler: TraversalScheduler,
    state: RefCell<NavigationState>,
    event_target: RefCell<EventTarget>,
    window: RefCell<EventTarget>,
}

/// Fake implementation of the Navigation API.
///
/// Single-threaded: asynchronous work (interception handlers, queued
/// traversals) runs on the executor returned by [`executor`](Self::executor),
/// which the caller drives, typically with
/// `smol::block_on(nav.executor().run(..))`. Handles are cheap to clone and
/// share the same history.
#[derive(Clone)]
pub struct FakeNavigation {
    shared: Rc<NavigationShared>,
}

impl FakeNavigation {
    /// Create a navigation whose only entry is `start_url`
    pub fn new(start_url: &str) -> Result<Self> {
        Self::with_config(NavigationConfig {
            start_url: start_url.to_string(),
            ..NavigationConfig::default()
        })
    }

    pub fn with_config(config: NavigationConfig) -> Result<Self> {
        let executor = Rc::new(LocalExecutor::new());
        let scheduler = TraversalScheduler::new(
            Rc::clone(&executor),
            config.synchronous_traversals,
            config.traversal_delay,
        );
        let navigation = Self {
            shared: Rc::new(NavigationShared {
                executor,
                scheduler,
                state: RefCell::new(NavigationState {
                    entries: Vec::new(),
                    current_entry_index: 0,
                    prospective_entry_index: 0,
                    navigate_event: None,
                    traversal_queue: HashMap::new(),
                    next_id: 0,
                    next_key: 0,
                    can_set_initial_entry: true,
                    disposed: false,
                }),
                event_target: RefCell::new(EventTarget::new()),
                window: RefCell::new(EventTarget::new()),
            }),
        };
        navigation.set_initial_entry_for_testing(&config.start_url, InitialEntryOptions::default())?;
        tracing::debug!(url = %config.start_url, "navigation created");
        Ok(navigation)
    }

    /// Executor that runs interception handlers and queued traversals
    pub fn executor(&self) -> Rc<LocalExecutor<'static>> {
        Rc::clone(&self.shared.executor)
    }

    /// Replace the initial entry. Only allowed before the first navigation.
    pub fn set_initial_entry_for_testing(
        &self,
        url: &str,
        options: InitialEntryOptions,
    ) -> Result<()> {
        let url = parse_url(url)?;
        let mut state = self.shared.state.borrow_mut();
        if !state.can_set_initial_entry {
            return Err(NavigationError::SetupOrdering);
        }

        let (key, id) = match state.entries.first() {
            Some(entry) => (entry.key().to_string(), entry.id().to_string()),
            None => (state.allocate_key(), state.allocate_id()),
        };
        let entry = HistoryEntry::new(
            url.to_string(),
            EntryInit {
                key,
                id,
                index: 0,
                same_document: true,
                state: options.state,
                history_state: options.history_state,
            },
        );
        if state.entries.is_empty() {
            state.entries.push(entry);
        } else {
            state.entries[0] = entry;
        }
        Ok(())
    }

    pub fn can_set_initial_entry_for_testing(&self) -> bool {
        self.shared.state.borrow().can_set_initial_entry
    }

    pub fn set_synchronous_traversals_for_testing(&self, synchronous: bool) {
        self.shared.scheduler.set_synchronous(synchronous);
    }

    /// Wait until every queued traversal has run
    pub async fn traversals_settled(&self) {
        self.shared.scheduler.idle().await;
    }

    pub fn current_entry(&self) -> HistoryEntry {
        self.shared.state.borrow().current_entry().clone()
    }

    pub fn can_go_back(&self) -> bool {
        self.shared.state.borrow().current_entry_index > 0
    }

    pub fn can_go_forward(&self) -> bool {
        let state = self.shared.state.borrow();
        state.current_entry_index + 1 < state.entries.len()
    }

    /// Snapshot of the entry list
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.shared.state.borrow().entries.clone()
    }

    /// Navigate to `url`, resolved against the current entry
    pub fn navigate(&self, url: &str, options: NavigateOptions) -> NavigationResult {
        if let Err(error) = self.ensure_active() {
            return NavigationResult::rejected(error);
        }
        let from = self.current_entry();
        let urls = parse_url(from.url()).and_then(|from_url| {
            resolve_url(from.url(), url).map(|to_url| (from_url, to_url))
        });
        let (from_url, to_url) = match urls {
            Ok(urls) => urls,
            Err(error) => return NavigationResult::rejected(error),
        };

        let navigation_type = match options.history {
            HistoryBehavior::Auto if from_url.as_str() == to_url.as_str() => {
                NavigationType::Replace
            }
            HistoryBehavior::Auto | HistoryBehavior::Push => NavigationType::Push,
            HistoryBehavior::Replace => NavigationType::Replace,
        };
        let hash_change = is_hash_change(&from_url, &to_url);
        let destination =
            Destination::new_entry(to_url.into(), options.state, StateValue::Null, hash_change);

        let result = NavigationResult::new();
        self.user_agent_navigate(
            destination,
            result.clone(),
            NavigateInit::new(navigation_type, hash_change, options.info),
        );
        result
    }

    /// `history.pushState()`
    pub fn push_state<T: Serialize + ?Sized>(
        &self,
        data: &T,
        title: &str,
        url: Option<&str>,
    ) -> Result<()> {
        self.push_or_replace_state(NavigationType::Push, data, title, url)
    }

    /// `history.replaceState()`
    pub fn replace_state<T: Serialize + ?Sized>(
        &self,
        data: &T,
        title: &str,
        url: Option<&str>,
    ) -> Result<()> {
        self.push_or_replace_state(NavigationType::Replace, data, title, url)
    }

    fn push_or_replace_state<T: Serialize + ?Sized>(
        &self,
        navigation_type: NavigationType,
        data: &T,
        _title: &str,
        url: Option<&str>,
    ) -> Result<()> {
        self.ensure_active()?;
        let history_state = serialize_state(data)?;
        let from = self.current_entry();
        let from_url = parse_url(from.url())?;
        let to_url = match url {
            Some(url) => resolve_url(from.url(), url)?,
            None => from_url.clone(),
        };
        let hash_change = is_hash_change(&from_url, &to_url);
        let destination =
            Destination::new_entry(to_url.into(), StateValue::Null, history_state, true);

        let init = NavigateInit {
            // pushState and replaceState never fire popstate
            skip_pop_state: true,
            ..NavigateInit::new(navigation_type, hash_change, StateValue::Null)
        };
        self.user_agent_navigate(destination, NavigationResult::new(), init);
        Ok(())
    }

    /// Replace the current entry's navigation state without navigating
    pub fn update_current_entry<T: Serialize + ?Sized>(&self, state: &T) -> Result<()> {
        self.ensure_active()?;
        let value = serialize_state(state)?;
        let from = {
            let mut nav_state = self.shared.state.borrow_mut();
            let index = nav_state.current_entry_index;
            let updated = nav_state.entries[index].with_state(value);
            std::mem::replace(&mut nav_state.entries[index], updated)
        };
        self.dispatch_event(&NavigationEvent::CurrentEntryChange(
            CurrentEntryChangeEvent::new(from, None),
        ));
        Ok(())
    }

    /// Traverse to the entry with `key`
    pub fn traverse_to(&self, key: &str, options: NavigationOptions) -> NavigationResult {
        if let Err(error) = self.ensure_active() {
            return NavigationResult::rejected(error);
        }

        let (current, target, queued) = {
            let state = self.shared.state.borrow();
            (
                state.current_entry().clone(),
                state.find_entry(key).cloned(),
                state.traversal_queue.get(key).cloned(),
            )
        };
        let Some(target) = target else {
            return NavigationResult::rejected(NavigationError::InvalidKey(key.to_string()));
        };
        if target.key() == current.key() {
            return NavigationResult::resolved(current);
        }
        if let Some(existing) = queued {
            return existing;
        }

        let result = NavigationResult::new();
        {
            let mut state = self.shared.state.borrow_mut();
            state.prospective_entry_index = target.index();
            state
                .traversal_queue
                .insert(key.to_string(), result.clone());
        }
        tracing::debug!(key, url = target.url(), "traversal queued");

        let weak = Rc::downgrade(&self.shared);
        let key = key.to_string();
        let traversal_result = result.clone();
        self.shared.scheduler.run_traversal(Box::new(move || {
            let Some(navigation) = Self::upgrade(&weak) else {
                return Ok(());
            };
            navigation
                .shared
                .state
                .borrow_mut()
                .traversal_queue
                .remove(&key);
            navigation.run_traversal_to_key(&key, traversal_result, options.info)
        }));
        result
    }

    /// Traverse to the previous entry
    pub fn back(&self, options: NavigationOptions) -> NavigationResult {
        if let Err(error) = self.ensure_active() {
            return NavigationResult::rejected(error);
        }
        let key = {
            let state = self.shared.state.borrow();
            match state.current_entry_index.checked_sub(1) {
                Some(index) => state.entries[index].key().to_string(),
                None => return NavigationResult::rejected(NavigationError::CannotGoBack),
            }
        };
        self.traverse_to(&key, options)
    }

    /// Traverse to the next entry
    pub fn forward(&self, options: NavigationOptions) -> NavigationResult {
        if let Err(error) = self.ensure_active() {
            return NavigationResult::rejected(error);
        }
        let key = {
            let state = self.shared.state.borrow();
            match state.entries.get(state.current_entry_index + 1) {
                Some(entry) => entry.key().to_string(),
                None => return NavigationResult::rejected(NavigationError::CannotGoForward),
            }
        };
        self.traverse_to(&key, options)
    }

    /// `history.go()`.
    ///
    /// Out-of-range targets are silently ignored, unlike `back()`/`forward()`.
    /// Consecutive calls compose before their traversals run. `go(0)` would
    /// reload the document and is ignored.
    pub fn go(&self, direction: isize) {
        let target_index = {
            let mut state = self.shared.state.borrow_mut();
            if state.disposed || direction == 0 {
                return;
            }
            let Some(target) = (state.prospective_entry_index as isize)
                .checked_add(direction)
                .and_then(|target| usize::try_from(target).ok())
                .filter(|target| *target < state.entries.len())
            else {
                return;
            };
            state.prospective_entry_index = target;
            target
        };

        let weak = Rc::downgrade(&self.shared);
        self.shared.scheduler.run_traversal(Box::new(move || {
            let Some(navigation) = Self::upgrade(&weak) else {
                return Ok(());
            };
            navigation.run_traversal_to_index(target_index)
        }));
    }

    pub fn add_event_listener(
        &self,
        event_type: NavigationEventType,
        listener: impl Fn(&NavigationEvent) + 'static,
    ) -> ListenerId {
        self.event_target().add_event_listener(event_type, listener)
    }

    pub fn add_event_listener_with_options(
        &self,
        event_type: NavigationEventType,
        listener: impl Fn(&NavigationEvent) + 'static,
        options: ListenerOptions,
    ) -> ListenerId {
        self.event_target()
            .add_event_listener_with_options(event_type, listener, options)
    }

    pub fn remove_event_listener(&self, event_type: NavigationEventType, id: ListenerId) -> bool {
        self.event_target().remove_event_listener(event_type, id)
    }

    pub fn dispatch_event(&self, event: &NavigationEvent) -> bool {
        self.event_target().dispatch_event(event)
    }

    /// The window target that receives `popstate`
    pub fn window(&self) -> EventTarget {
        self.shared.window.borrow().clone()
    }

    /// `window.history` view of this navigation
    pub fn history(&self) -> NavigationHistory {
        NavigationHistory {
            navigation: self.clone(),
        }
    }

    /// Drop all listeners and refuse further navigations
    pub fn dispose(&self) {
        self.shared.event_target.borrow().clear();
        self.shared.window.borrow().clear();
        *self.shared.event_target.borrow_mut() = EventTarget::new();
        *self.shared.window.borrow_mut() = EventTarget::new();
        let pending = {
            let mut state = self.shared.state.borrow_mut();
            state.disposed = true;
            state.navigate_event.take()
        };
        if let Some(event) = pending {
            event.cancel(NavigationError::Disposed);
        }
        tracing::debug!("navigation disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.state.borrow().disposed
    }

    fn upgrade(weak: &Weak<NavigationShared>) -> Option<Self> {
        weak.upgrade().map(|shared| Self { shared })
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_disposed() {
            Err(NavigationError::Disposed)
        } else {
            Ok(())
        }
    }

    fn event_target(&self) -> EventTarget {
        self.shared.event_target.borrow().clone()
    }

    fn commit_hook(&self) -> CommitHook {
        let weak = Rc::downgrade(&self.shared);
        Rc::new(move |event: &NavigateEvent| match Self::upgrade(&weak) {
            Some(navigation) => navigation.user_agent_commit(event),
            None => Err(NavigationError::Disposed),
        })
    }

    /// Queued part of `traverse_to`. The target is looked up again because
    /// the entry list may have changed while the traversal waited.
    fn run_traversal_to_key(
        &self,
        key: &str,
        result: NavigationResult,
        info: StateValue,
    ) -> Result<()> {
        if let Err(error) = self.ensure_active() {
            result.committed_reject(error.clone());
            result.finished_reject(error.clone());
            return Err(error);
        }
        let (current, target) = {
            let state = self.shared.state.borrow();
            (state.current_entry().clone(), state.find_entry(key).cloned())
        };
        let Some(target) = target else {
            let error = NavigationError::InvalidKey(key.to_string());
            result.committed_reject(error.clone());
            result.finished_reject(error.clone());
            return Err(error);
        };
        if target.key() == current.key() {
            result.committed_resolve(current.clone());
            result.finished_resolve(current);
            return Ok(());
        }
        self.traverse_from(&current, &target, result, info)
    }

    /// Queued part of `go`
    fn run_traversal_to_index(&self, index: usize) -> Result<()> {
        self.ensure_active()?;
        let (current, target) = {
            let state = self.shared.state.borrow();
            (state.current_entry().clone(), state.entries.get(index).cloned())
        };
        // Bounds are checked again: the list may have shrunk since `go()`
        let Some(target) = target else {
            return Ok(());
        };
        if target.key() == current.key() {
            return Ok(());
        }
        self.traverse_from(&current, &target, NavigationResult::new(), StateValue::Null)
    }

    fn traverse_from(
        &self,
        current: &HistoryEntry,
        target: &HistoryEntry,
        result: NavigationResult,
        info: StateValue,
    ) -> Result<()> {
        let from_url = parse_url(current.url())?;
        let to_url = parse_url(target.url())?;
        let hash_change = is_hash_change(&from_url, &to_url);
        self.user_agent_navigate(
            Destination::for_entry(target),
            result,
            NavigateInit::new(NavigationType::Traverse, hash_change, info),
        );
        Ok(())
    }

    /// Fire the navigate event for one attempt and commit it unless it was
    /// intercepted with a deferred commit.
    fn user_agent_navigate(
        &self,
        destination: Destination,
        result: NavigationResult,
        init: NavigateInit,
    ) {
        let previous = {
            let mut state = self.shared.state.borrow_mut();
            state.can_set_initial_entry = false;
            state.navigate_event.take()
        };
        if let Some(previous) = previous.filter(|previous| !previous.is_cancelled()) {
            tracing::warn!(url = previous.destination().url(), "aborting uncommitted navigation");
            previous.cancel(NavigationError::Aborted("Navigation was aborted".into()));
        }

        let event = NavigateEvent::new(NavigateEventInit {
            navigation_type: init.navigation_type,
            destination,
            cancelable: init.cancelable,
            can_intercept: init.can_intercept,
            user_initiated: init.user_initiated,
            hash_change: init.hash_change,
            info: init.info,
            skip_pop_state: init.skip_pop_state,
            result: result.clone(),
            executor: Rc::clone(&self.shared.executor),
            commit_hook: self.commit_hook(),
        });
        self.watch_finished(&result);
        self.shared.state.borrow_mut().navigate_event = Some(event.clone());

        tracing::debug!(
            navigation_type = %event.navigation_type(),
            url = event.destination().url(),
            hash_change = event.hash_change(),
            "navigate"
        );

        event.begin_dispatch();
        let proceed = self
            .event_target()
            .dispatch_event(&NavigationEvent::Navigate(event.clone()));
        event.dispatched_navigate_event();

        // A listener started another navigation, which aborted this one
        if event.is_cancelled() {
            return;
        }

        if !proceed {
            self.shared.state.borrow_mut().take_if_current(&event);
            tracing::debug!(url = event.destination().url(), "navigation canceled by listener");
            event.cancel(NavigationError::Aborted("Navigation was canceled".into()));
            self.resync_prospective_index();
            return;
        }

        if event.commit_option() == CommitOption::Immediate {
            if let Err(error) = event.commit_internal() {
                tracing::debug!(%error, "commit failed");
            }
        }
        event.start_handlers();
    }

    /// Apply a navigation's effects and fire the secondary events
    fn user_agent_commit(&self, event: &NavigateEvent) -> Result<()> {
        if !self.shared.state.borrow_mut().take_if_current(event) {
            return Err(NavigationError::InvalidState(
                "navigation is no longer in flight".into(),
            ));
        }
        if let Err(error) = self.ensure_active() {
            event.cancel(error.clone());
            return Err(error);
        }

        if !event.same_document() {
            let error = NavigationError::CrossDocument(event.destination().url().to_string());
            tracing::error!(%error, "navigation was not intercepted");
            event.cancel(error.clone());
            self.resync_prospective_index();
            return Err(error);
        }

        let navigation_type = event.navigation_type();
        let (from, entry, removed) = {
            let mut state = self.shared.state.borrow_mut();
            let from = state.current_entry().clone();
            let removed = match navigation_type {
                NavigationType::Push | NavigationType::Replace => {
                    state.user_agent_push_or_replace(event.destination(), navigation_type)
                }
                NavigationType::Traverse => {
                    if let Err(error) = state.user_agent_traverse(event.destination()) {
                        drop(state);
                        event.cancel(error.clone());
                        return Err(error);
                    }
                    Vec::new()
                }
            };
            (from, state.current_entry().clone(), removed)
        };
        tracing::debug!(
            navigation_type = %navigation_type,
            url = entry.url(),
            index = entry.index(),
            "commit"
        );

        for removed in removed {
            removed.dispose();
        }
        event.user_agent_navigated(entry);

        self.event_target()
            .dispatch_event(&NavigationEvent::CurrentEntryChange(
                CurrentEntryChangeEvent::new(from, Some(navigation_type)),
            ));
        if !event.skip_pop_state() {
            self.window().dispatch_event(&NavigationEvent::PopState(PopStateEvent::new(
                event.destination().history_state().clone(),
            )));
        }

        event.try_finish();
        Ok(())
    }

    /// Dispatch `navigatesuccess` or `navigateerror` once `finished` settles
    fn watch_finished(&self, result: &NavigationResult) {
        let weak = Rc::downgrade(&self.shared);
        result.finished().on_settled(move |outcome| {
            let Some(navigation) = Self::upgrade(&weak) else {
                return;
            };
            if navigation.is_disposed() {
                return;
            }
            let event = match outcome {
                Ok(_) => NavigationEvent::NavigateSuccess(NavigateSuccessEvent::new()),
                Err(error) => NavigationEvent::NavigateError(NavigateErrorEvent::new(error.clone())),
            };
            navigation.dispatch_event(&event);
        });
    }

    /// After an aborted attempt with nothing queued, `go()` counts from the
    /// current entry again
    fn resync_prospective_index(&self) {
        let mut state = self.shared.state.borrow_mut();
        if state.traversal_queue.is_empty() && self.shared.scheduler.pending() == 0 {
            state.prospective_entry_index = state.current_entry_index;
        }
    }
}

impl std::fmt::Debug for FakeNavigation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("FakeNavigation")
            .field("entries", &state.entries.len())
            .field("current_entry_index", &state.current_entry_index)
            .field("prospective_entry_index", &state.prospective_entry_index)
            .field("disposed", &state.disposed)
            .finish()
    }
}

/// `window.history` surface over a [`FakeNavigation`]
#[derive(Debug, Clone)]
pub struct NavigationHistory {
    navigation: FakeNavigation,
}

impl NavigationHistory {
    pub fn length(&self) -> usize {
        self.navigation.entries().len()
    }

    /// `history.state`
    pub fn state(&self) -> StateValue {
        self.navigation.current_entry().history_state()
    }

    pub fn push_state<T: Serialize + ?Sized>(
        &self,
        data: &T,
        title: &str,
        url: Option<&str>,
    ) -> Result<()> {
        self.navigation.push_state(data, title, url)
    }

    pub fn replace_state<T: Serialize + ?Sized>(
        &self,
        data: &T,
        title: &str,
        url: Option<&str>,
    ) -> Result<()> {
        self.navigation.replace_state(data, title, url)
    }

    /// Same as `go(-1)`: a no-op on the first entry
    pub fn back(&self) {
        self.navigation.go(-1);
    }

    /// Same as `go(1)`: a no-op on the last entry
    pub fn forward(&self) {
        self.navigation.go(1);
    }

    pub fn go(&self, delta: isize) {
        self.navigation.go(delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigate_event::InterceptOptions;
    use crate::promise::PromiseState;
    use serde_json::json;

    fn navigation(url: &str) -> FakeNavigation {
        let navigation = FakeNavigation::new(url).unwrap();
        navigation.set_synchronous_traversals_for_testing(true);
        navigation
    }

    fn intercept_all(navigation: &FakeNavigation) {
        navigation.add_event_listener(NavigationEventType::Navigate, |event| {
            if let Some(navigate) = event.as_navigate() {
                navigate.intercept(InterceptOptions::default()).unwrap();
            }
        });
    }

    fn urls(navigation: &FakeNavigation) -> Vec<String> {
        navigation
            .entries()
            .iter()
            .map(|entry| entry.url().to_string())
            .collect()
    }

    #[test]
    fn test_initial_entry() {
        let nav = navigation("https://example.com/");
        assert_eq!(nav.entries().len(), 1);
        assert_eq!(nav.current_entry().url(), "https://example.com/");
        assert_eq!(nav.current_entry().index(), 0);
        assert!(!nav.can_go_back());
        assert!(!nav.can_go_forward());
        assert!(nav.can_set_initial_entry_for_testing());
    }

    #[test]
    fn test_invalid_start_url() {
        assert!(matches!(
            FakeNavigation::new("nowhere"),
            Err(NavigationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_set_initial_entry_keeps_identity() {
        let nav = navigation("https://example.com/");
        let before = nav.current_entry();

        nav.set_initial_entry_for_testing(
            "https://example.com/start",
            InitialEntryOptions {
                history_state: json!({ "restored": true }),
                state: json!("nav"),
            },
        )
        .unwrap();

        let after = nav.current_entry();
        assert_eq!(after.url(), "https://example.com/start");
        assert_eq!(after.key(), before.key());
        assert_eq!(after.id(), before.id());
        assert_eq!(after.history_state(), json!({ "restored": true }));
        assert_eq!(after.state(), json!("nav"));
    }

    #[test]
    fn test_set_initial_entry_after_navigation_fails() {
        let nav = navigation("https://example.com/");
        nav.push_state(&json!(null), "", Some("/a")).unwrap();

        assert!(!nav.can_set_initial_entry_for_testing());
        assert_eq!(
            nav.set_initial_entry_for_testing("https://example.com/", InitialEntryOptions::default()),
            Err(NavigationError::SetupOrdering)
        );
    }

    #[test]
    fn test_push_state_appends() {
        let nav = navigation("https://example.com/");
        nav.push_state(&json!({ "page": 1 }), "", Some("/page1")).unwrap();
        nav.push_state(&json!({ "page": 2 }), "", Some("page2")).unwrap();

        assert_eq!(
            urls(&nav),
            vec![
                "https://example.com/",
                "https://example.com/page1",
                "https://example.com/page2",
            ]
        );
        let current = nav.current_entry();
        assert_eq!(current.index(), 2);
        assert_eq!(current.history_state(), json!({ "page": 2 }));
        assert!(nav.can_go_back());
    }

    #[test]
    fn test_replace_state_keeps_key_and_length() {
        let nav = navigation("https://example.com/");
        nav.push_state(&json!(null), "", Some("/a")).unwrap();
        let before = nav.current_entry();

        nav.replace_state(&json!({ "replaced": true }), "", Some("/b")).unwrap();

        let after = nav.current_entry();
        assert_eq!(nav.entries().len(), 2);
        assert_eq!(after.key(), before.key());
        assert_ne!(after.id(), before.id());
        assert_eq!(after.url(), "https://example.com/b");
        assert_eq!(after.history_state(), json!({ "replaced": true }));
        assert!(before.is_disposed());
    }

    #[test]
    fn test_replace_state_without_url_keeps_url() {
        let nav = navigation("https://example.com/a?x=1#top");
        nav.replace_state(&json!(5), "", None).unwrap();
        assert_eq!(nav.current_entry().url(), "https://example.com/a?x=1#top");
        assert_eq!(nav.history().state(), json!(5));
    }

    #[test]
    fn test_push_state_does_not_fire_popstate() {
        let nav = navigation("https://example.com/");
        nav.window().add_event_listener(NavigationEventType::PopState, |_| {
            panic!("pushState fired popstate");
        });
        nav.push_state(&json!(1), "", Some("#a")).unwrap();
        nav.replace_state(&json!(2), "", Some("#b")).unwrap();
        assert_eq!(nav.entries().len(), 2);
    }

    #[test]
    fn test_push_state_rejects_bad_url() {
        let nav = navigation("https://example.com/");
        assert!(matches!(
            nav.push_state(&json!(null), "", Some("http://[::1")),
            Err(NavigationError::InvalidUrl(_))
        ));
        assert_eq!(nav.entries().len(), 1);
    }

    #[test]
    fn test_entries_snapshot() {
        let nav = navigation("https://example.com/");
        let snapshot = nav.entries();
        nav.push_state(&json!(null), "", Some("/a")).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(nav.entries().len(), 2);
    }

    #[test]
    fn test_push_truncates_forward_entries() {
        let nav = navigation("https://example.com/");
        nav.push_state(&json!(null), "", Some("/a")).unwrap();
        nav.push_state(&json!(null), "", Some("/b")).unwrap();
        let dropped = nav.current_entry();

        nav.back(NavigationOptions::default());
        assert_eq!(nav.current_entry().url(), "https://example.com/a");

        nav.push_state(&json!(null), "", Some("/c")).unwrap();
        assert_eq!(
            urls(&nav),
            vec![
                "https://example.com/",
                "https://example.com/a",
                "https://example.com/c",
            ]
        );
        assert!(dropped.is_disposed());
        assert!(!nav.can_go_forward());
    }

    #[test]
    fn test_navigate_without_intercept_is_cross_document() {
        let nav = navigation("https://example.com/");
        let result = nav.navigate("/other", NavigateOptions::default());

        assert!(matches!(
            result.committed().try_get(),
            Some(Err(NavigationError::CrossDocument(_)))
        ));
        assert!(result.signal().is_aborted());
        assert_eq!(nav.entries().len(), 1);
    }

    #[test]
    fn test_navigate_same_url_replaces() {
        let nav = navigation("https://example.com/a");
        intercept_all(&nav);
        let key = nav.current_entry().key().to_string();

        let result = nav.navigate("https://example.com/a", NavigateOptions::default());

        assert_eq!(result.committed().state(), PromiseState::Fulfilled);
        assert_eq!(nav.entries().len(), 1);
        assert_eq!(nav.current_entry().key(), key);
    }

    #[test]
    fn test_explicit_history_option_wins() {
        let nav = navigation("https://example.com/a");
        intercept_all(&nav);

        nav.navigate("https://example.com/a", NavigateOptions::push());
        assert_eq!(nav.entries().len(), 2);

        nav.navigate("/b", NavigateOptions::replace().with_state(json!("s")));
        assert_eq!(nav.entries().len(), 2);
        assert_eq!(nav.current_entry().url(), "https://example.com/b");
        assert_eq!(nav.current_entry().state(), json!("s"));
    }

    #[test]
    fn test_navigate_rejects_invalid_url() {
        let nav = navigation("https://example.com/");
        let result = nav.navigate("http://[::1", NavigateOptions::default());
        assert!(matches!(
            result.finished().try_get(),
            Some(Err(NavigationError::InvalidUrl(_)))
        ));
        assert!(nav.can_set_initial_entry_for_testing());
    }

    #[test]
    fn test_prevent_default_cancels() {
        let nav = navigation("https://example.com/");
        nav.add_event_listener(NavigationEventType::Navigate, |event| {
            if let Some(navigate) = event.as_navigate() {
                navigate.intercept(InterceptOptions::default()).unwrap();
                navigate.prevent_default();
            }
        });

        let result = nav.navigate("/blocked", NavigateOptions::default());
        assert!(matches!(
            result.finished().try_get(),
            Some(Err(NavigationError::Aborted(_)))
        ));
        assert_eq!(nav.entries().len(), 1);
    }

    #[test]
    fn test_update_current_entry() {
        let nav = navigation("https://example.com/");
        let key = nav.current_entry().key().to_string();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&changes);
        nav.add_event_listener(NavigationEventType::CurrentEntryChange, move |event| {
            if let Some(change) = event.as_current_entry_change() {
                sink.borrow_mut().push(change.navigation_type());
            }
        });

        nav.update_current_entry(&json!({ "count": 1 })).unwrap();

        assert_eq!(*changes.borrow(), vec![None]);
        assert_eq!(nav.current_entry().state(), json!({ "count": 1 }));
        assert_eq!(nav.current_entry().key(), key);
        assert_eq!(nav.entries().len(), 1);
    }

    #[test]
    fn test_traverse_to_unknown_key() {
        let nav = navigation("https://example.com/");
        let result = nav.traverse_to("missing", NavigationOptions::default());
        assert_eq!(
            result.committed().try_get().and_then(|r| r.err()),
            Some(NavigationError::InvalidKey("missing".into()))
        );
    }

    #[test]
    fn test_traverse_to_current_is_resolved() {
        let nav = navigation("https://example.com/");
        let current = nav.current_entry();
        let result = nav.traverse_to(current.key(), NavigationOptions::default());
        assert_eq!(result.finished().try_get(), Some(Ok(current)));
    }

    #[test]
    fn test_back_forward_boundaries() {
        let nav = navigation("https://example.com/");
        assert_eq!(
            nav.back(NavigationOptions::default()).committed().try_get(),
            Some(Err(NavigationError::CannotGoBack))
        );
        assert_eq!(
            nav.forward(NavigationOptions::default()).finished().try_get(),
            Some(Err(NavigationError::CannotGoForward))
        );
        assert_eq!(nav.entries().len(), 1);
    }

    #[test]
    fn test_synchronous_go() {
        let nav = navigation("https://example.com/");
        nav.push_state(&json!(null), "", Some("/a")).unwrap();
        nav.push_state(&json!(null), "", Some("/b")).unwrap();

        nav.go(-2);
        assert_eq!(nav.current_entry().url(), "https://example.com/");
        nav.go(5);
        assert_eq!(nav.current_entry().url(), "https://example.com/");
        nav.go(1);
        assert_eq!(nav.current_entry().url(), "https://example.com/a");
    }

    #[test]
    fn test_history_view() {
        let nav = navigation("https://example.com/");
        let history = nav.history();
        history.push_state(&json!({ "n": 1 }), "", Some("/one")).unwrap();
        assert_eq!(history.length(), 2);

        history.back();
        assert_eq!(nav.current_entry().url(), "https://example.com/");
        history.back();
        assert_eq!(nav.current_entry().url(), "https://example.com/");
        history.forward();
        assert_eq!(history.state(), json!({ "n": 1 }));
    }

    #[test]
    fn test_dispose() {
        let nav = navigation("https://example.com/");
        nav.add_event_listener(NavigationEventType::Navigate, |_| {
            panic!("listener survived dispose");
        });

        nav.dispose();

        assert!(nav.is_disposed());
        assert_eq!(
            nav.push_state(&json!(null), "", Some("/a")),
            Err(NavigationError::Disposed)
        );
        assert_eq!(
            nav.navigate("/a", NavigateOptions::default()).committed().try_get(),
            Some(Err(NavigationError::Disposed))
        );
        nav.go(1);
        assert_eq!(nav.entries().len(), 1);
    }
}
