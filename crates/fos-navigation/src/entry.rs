//! History entries
//!
//! One visited location in the session history.

use crate::{NavigationError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Opaque state attached to an entry. `Null` stands for "no state".
pub type StateValue = serde_json::Value;

/// Snapshot caller data into a stored state value.
///
/// Only serializable data can be stored, mirroring the structured-clone
/// limitation of the platform API.
pub fn serialize_state<T: Serialize + ?Sized>(value: &T) -> Result<StateValue> {
    serde_json::to_value(value).map_err(|e| NavigationError::DataClone(e.to_string()))
}

fn deserialize_state<T: DeserializeOwned>(value: &StateValue) -> Result<T> {
    T::deserialize(value).map_err(|e| NavigationError::DataClone(e.to_string()))
}

/// History entry
///
/// Entries are shared handles: clones refer to the same entry, and equality
/// is identity. Fields never change after construction; a replace swaps the
/// slot in the entry list instead.
#[derive(Clone)]
pub struct HistoryEntry {
    inner: Rc<EntryInner>,
}

struct EntryInner {
    url: String,
    key: String,
    id: String,
    index: usize,
    same_document: bool,
    state: StateValue,
    history_state: StateValue,
    disposed: Cell<bool>,
    dispose_listeners: RefCell<Vec<Box<dyn FnOnce()>>>,
}

/// Everything but the URL needed to build an entry
pub(crate) struct EntryInit {
    pub key: String,
    pub id: String,
    pub index: usize,
    pub same_document: bool,
    pub state: StateValue,
    pub history_state: StateValue,
}

impl HistoryEntry {
    pub(crate) fn new(url: String, init: EntryInit) -> Self {
        Self {
            inner: Rc::new(EntryInner {
                url,
                key: init.key,
                id: init.id,
                index: init.index,
                same_document: init.same_document,
                state: init.state,
                history_state: init.history_state,
                disposed: Cell::new(false),
                dispose_listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Copy of this entry with different navigation state, same key and id
    pub(crate) fn with_state(&self, state: StateValue) -> Self {
        Self::new(
            self.inner.url.clone(),
            EntryInit {
                key: self.inner.key.clone(),
                id: self.inner.id.clone(),
                index: self.inner.index,
                same_document: self.inner.same_document,
                state,
                history_state: self.inner.history_state.clone(),
            },
        )
    }

    /// Absolute URL
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Stable key, survives replace
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Unique id, changes on every push or replace
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Position in the entry list at the time the entry was committed
    pub fn index(&self) -> usize {
        self.inner.index
    }

    pub fn same_document(&self) -> bool {
        self.inner.same_document
    }

    /// Navigation API state (deep copy)
    pub fn state(&self) -> StateValue {
        self.inner.state.clone()
    }

    /// `history.state` value (deep copy)
    pub fn history_state(&self) -> StateValue {
        self.inner.history_state.clone()
    }

    /// Navigation API state decoded into a caller type
    pub fn state_as<T: DeserializeOwned>(&self) -> Result<T> {
        deserialize_state(&self.inner.state)
    }

    /// `history.state` decoded into a caller type
    pub fn history_state_as<T: DeserializeOwned>(&self) -> Result<T> {
        deserialize_state(&self.inner.history_state)
    }

    /// Register a callback for when the entry leaves the entry list
    pub fn on_dispose(&self, callback: impl FnOnce() + 'static) {
        if self.is_disposed() {
            return;
        }
        self.inner.dispose_listeners.borrow_mut().push(Box::new(callback));
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    pub(crate) fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        let listeners = std::mem::take(&mut *self.inner.dispose_listeners.borrow_mut());
        for listener in listeners {
            listener();
        }
    }

    /// Whether both handles refer to the same entry
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for HistoryEntry {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for HistoryEntry {}

impl fmt::Debug for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryEntry")
            .field("url", &self.inner.url)
            .field("key", &self.inner.key)
            .field("id", &self.inner.id)
            .field("index", &self.inner.index)
            .field("history_state", &self.inner.history_state)
            .finish()
    }
}
