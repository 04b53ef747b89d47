//! Navigation events
//!
//! Typed event kinds and the listener registry they are dispatched through.

use crate::entry::{HistoryEntry, StateValue};
use crate::navigate_event::{NavigateEvent, NavigationType};
use crate::NavigationError;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// Event type names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationEventType {
    Navigate,
    CurrentEntryChange,
    NavigateSuccess,
    NavigateError,
    PopState,
}

impl NavigationEventType {
    /// DOM event name
    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationEventType::Navigate => "navigate",
            NavigationEventType::CurrentEntryChange => "currententrychange",
            NavigationEventType::NavigateSuccess => "navigatesuccess",
            NavigationEventType::NavigateError => "navigateerror",
            NavigationEventType::PopState => "popstate",
        }
    }
}

impl fmt::Display for NavigationEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NavigationEventType {
    type Err = NavigationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "navigate" => Ok(NavigationEventType::Navigate),
            "currententrychange" => Ok(NavigationEventType::CurrentEntryChange),
            "navigatesuccess" => Ok(NavigationEventType::NavigateSuccess),
            "navigateerror" => Ok(NavigationEventType::NavigateError),
            "popstate" => Ok(NavigationEventType::PopState),
            other => Err(NavigationError::UnknownEvent(other.to_string())),
        }
    }
}

/// Fired after the current entry changed
#[derive(Debug, Clone)]
pub struct CurrentEntryChangeEvent {
    from: HistoryEntry,
    navigation_type: Option<NavigationType>,
}

impl CurrentEntryChangeEvent {
    pub fn new(from: HistoryEntry, navigation_type: Option<NavigationType>) -> Self {
        Self {
            from,
            navigation_type,
        }
    }

    /// The entry that was current before the change
    pub fn from(&self) -> &HistoryEntry {
        &self.from
    }

    pub fn navigation_type(&self) -> Option<NavigationType> {
        self.navigation_type
    }
}

/// Fired when a navigation's `finished` promise resolves
#[derive(Debug, Clone, Default)]
pub struct NavigateSuccessEvent;

impl NavigateSuccessEvent {
    pub fn new() -> Self {
        Self
    }
}

/// Fired when a navigation's `finished` promise rejects
#[derive(Debug, Clone)]
pub struct NavigateErrorEvent {
    error: NavigationError,
}

impl NavigateErrorEvent {
    pub fn new(error: NavigationError) -> Self {
        Self { error }
    }

    pub fn error(&self) -> &NavigationError {
        &self.error
    }
}

/// Window-level `popstate`
#[derive(Debug, Clone)]
pub struct PopStateEvent {
    state: StateValue,
}

impl PopStateEvent {
    pub fn new(state: StateValue) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &StateValue {
        &self.state
    }
}

/// Any event the simulator dispatches
#[derive(Debug, Clone)]
pub enum NavigationEvent {
    Navigate(NavigateEvent),
    CurrentEntryChange(CurrentEntryChangeEvent),
    NavigateSuccess(NavigateSuccessEvent),
    NavigateError(NavigateErrorEvent),
    PopState(PopStateEvent),
}

impl NavigationEvent {
    pub fn event_type(&self) -> NavigationEventType {
        match self {
            NavigationEvent::Navigate(_) => NavigationEventType::Navigate,
            NavigationEvent::CurrentEntryChange(_) => NavigationEventType::CurrentEntryChange,
            NavigationEvent::NavigateSuccess(_) => NavigationEventType::NavigateSuccess,
            NavigationEvent::NavigateError(_) => NavigationEventType::NavigateError,
            NavigationEvent::PopState(_) => NavigationEventType::PopState,
        }
    }

    /// Only `navigate` events can be cancelled
    pub fn cancelable(&self) -> bool {
        match self {
            NavigationEvent::Navigate(event) => event.cancelable(),
            _ => false,
        }
    }

    pub fn default_prevented(&self) -> bool {
        match self {
            NavigationEvent::Navigate(event) => event.default_prevented(),
            _ => false,
        }
    }

    pub fn as_navigate(&self) -> Option<&NavigateEvent> {
        match self {
            NavigationEvent::Navigate(event) => Some(event),
            _ => None,
        }
    }

    pub fn as_current_entry_change(&self) -> Option<&CurrentEntryChangeEvent> {
        match self {
            NavigationEvent::CurrentEntryChange(event) => Some(event),
            _ => None,
        }
    }

    pub fn as_navigate_error(&self) -> Option<&NavigateErrorEvent> {
        match self {
            NavigationEvent::NavigateError(event) => Some(event),
            _ => None,
        }
    }

    pub fn as_pop_state(&self) -> Option<&PopStateEvent> {
        match self {
            NavigationEvent::PopState(event) => Some(event),
            _ => None,
        }
    }
}

/// Listener handle
pub type ListenerId = u64;

type Listener = Rc<dyn Fn(&NavigationEvent)>;

/// Event listener options
#[derive(Debug, Clone, Copy, Default)]
pub struct ListenerOptions {
    /// Remove the listener after its first invocation
    pub once: bool,
}

struct RegisteredListener {
    id: ListenerId,
    callback: Listener,
    once: bool,
}

#[derive(Default)]
struct ListenerRegistry {
    listeners: HashMap<NavigationEventType, Vec<RegisteredListener>>,
    next_id: ListenerId,
}

/// Event target
///
/// A dispatch table from event type to listeners. Handles are cheap to
/// clone and share the same table.
#[derive(Clone, Default)]
pub struct EventTarget {
    registry: Rc<RefCell<ListenerRegistry>>,
}

impl EventTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event listener
    pub fn add_event_listener(
        &self,
        event_type: NavigationEventType,
        listener: impl Fn(&NavigationEvent) + 'static,
    ) -> ListenerId {
        self.add_event_listener_with_options(event_type, listener, ListenerOptions::default())
    }

    pub fn add_event_listener_with_options(
        &self,
        event_type: NavigationEventType,
        listener: impl Fn(&NavigationEvent) + 'static,
        options: ListenerOptions,
    ) -> ListenerId {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;

        registry
            .listeners
            .entry(event_type)
            .or_default()
            .push(RegisteredListener {
                id,
                callback: Rc::new(listener),
                once: options.once,
            });

        id
    }

    /// Remove an event listener
    pub fn remove_event_listener(&self, event_type: NavigationEventType, id: ListenerId) -> bool {
        let mut registry = self.registry.borrow_mut();
        if let Some(listeners) = registry.listeners.get_mut(&event_type) {
            if let Some(pos) = listeners.iter().position(|l| l.id == id) {
                listeners.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn has_listeners(&self, event_type: NavigationEventType) -> bool {
        self.registry
            .borrow()
            .listeners
            .get(&event_type)
            .is_some_and(|listeners| !listeners.is_empty())
    }

    /// Dispatch an event to the listeners registered for its type.
    ///
    /// Returns false if the event is cancelable and a listener prevented its
    /// default action. Listeners added during dispatch see the next event,
    /// listeners removed during dispatch are skipped.
    pub fn dispatch_event(&self, event: &NavigationEvent) -> bool {
        let event_type = event.event_type();
        let snapshot: Vec<(ListenerId, Listener, bool)> = self
            .registry
            .borrow()
            .listeners
            .get(&event_type)
            .map(|listeners| {
                listeners
                    .iter()
                    .map(|l| (l.id, Rc::clone(&l.callback), l.once))
                    .collect()
            })
            .unwrap_or_default();

        tracing::trace!(event = %event_type, listeners = snapshot.len(), "dispatching");

        for (id, callback, once) in snapshot {
            if !self.contains(event_type, id) {
                continue;
            }
            if once {
                self.remove_event_listener(event_type, id);
            }
            callback(event);
        }

        !event.default_prevented()
    }

    /// Drop every listener
    pub fn clear(&self) {
        self.registry.borrow_mut().listeners.clear();
    }

    fn contains(&self, event_type: NavigationEventType, id: ListenerId) -> bool {
        self.registry
            .borrow()
            .listeners
            .get(&event_type)
            .is_some_and(|listeners| listeners.iter().any(|l| l.id == id))
    }
}

impl fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.borrow();
        let counts: HashMap<&'static str, usize> = registry
            .listeners
            .iter()
            .map(|(event_type, listeners)| (event_type.as_str(), listeners.len()))
            .collect();
        f.debug_struct("EventTarget").field("listeners", &counts).finish()
    }
}
