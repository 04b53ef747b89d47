//! Navigation destination

use crate::entry::{HistoryEntry, StateValue};

/// Where a navigation is heading.
///
/// Built before anything is committed. For push and replace the key and id
/// are unknown and the index is -1; for traversals they describe the
/// existing target entry.
#[derive(Debug, Clone)]
pub struct Destination {
    url: String,
    key: Option<String>,
    id: Option<String>,
    index: isize,
    same_document: bool,
    state: StateValue,
    history_state: StateValue,
}

impl Destination {
    /// Destination for a push or replace
    pub(crate) fn new_entry(
        url: String,
        state: StateValue,
        history_state: StateValue,
        same_document: bool,
    ) -> Self {
        Self {
            url,
            key: None,
            id: None,
            index: -1,
            same_document,
            state,
            history_state,
        }
    }

    /// Destination for a traversal to an existing entry
    pub(crate) fn for_entry(entry: &HistoryEntry) -> Self {
        Self {
            url: entry.url().to_string(),
            key: Some(entry.key().to_string()),
            id: Some(entry.id().to_string()),
            index: entry.index() as isize,
            same_document: entry.same_document(),
            state: entry.state(),
            history_state: entry.history_state(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Target index, -1 when the destination is not an existing entry
    pub fn index(&self) -> isize {
        self.index
    }

    pub fn same_document(&self) -> bool {
        self.same_document
    }

    pub fn state(&self) -> &StateValue {
        &self.state
    }

    pub fn history_state(&self) -> &StateValue {
        &self.history_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryInit;
    use serde_json::json;

    #[test]
    fn test_new_entry_has_no_identity() {
        let destination = Destination::new_entry(
            "https://example.com/a".into(),
            json!("nav"),
            StateValue::Null,
            false,
        );
        assert_eq!(destination.index(), -1);
        assert_eq!(destination.key(), None);
        assert_eq!(destination.id(), None);
        assert_eq!(destination.state(), &json!("nav"));
    }

    #[test]
    fn test_for_entry_copies_identity() {
        let entry = HistoryEntry::new(
            "https://example.com/b".into(),
            EntryInit {
                key: "3".into(),
                id: "5".into(),
                index: 2,
                same_document: true,
                state: StateValue::Null,
                history_state: json!({ "page": 2 }),
            },
        );
        let destination = Destination::for_entry(&entry);
        assert_eq!(destination.url(), "https://example.com/b");
        assert_eq!(destination.key(), Some("3"));
        assert_eq!(destination.id(), Some("5"));
        assert_eq!(destination.index(), 2);
        assert!(destination.same_document());
        assert_eq!(destination.history_state(), &json!({ "page": 2 }));
    }
}
