//! fOS Navigation
//!
//! Session history and Navigation API simulator.
//!
//! Models the ordered list of same-document history entries and the
//! asynchronous, cancellable protocol by which navigations are requested,
//! intercepted and committed, without a real document behind it. Routers
//! and their tests drive it through [`FakeNavigation`].
//!
//! Features:
//! - `navigate`, `pushState`/`replaceState`, `traverseTo`, `back`, `forward`, `go`
//! - Interceptable `navigate` events with deferred commit
//! - `currententrychange`, `navigatesuccess`, `navigateerror` and window `popstate`
//! - Queued traversals paced one executor tick apart, or synchronous for tests
//!
//! # Example
//! ```rust,ignore
//! use fos_navigation::{FakeNavigation, InterceptOptions, NavigateOptions, NavigationEventType};
//!
//! let nav = FakeNavigation::new("https://example.com/")?;
//! nav.add_event_listener(NavigationEventType::Navigate, |event| {
//!     if let Some(navigate) = event.as_navigate() {
//!         let _ = navigate.intercept(InterceptOptions::default());
//!     }
//! });
//! let executor = nav.executor();
//! smol::block_on(executor.run(async {
//!     let entry = nav.navigate("/page", NavigateOptions::default()).finished().await?;
//!     assert_eq!(entry.url(), "https://example.com/page");
//!     Ok::<_, fos_navigation::NavigationError>(())
//! }))?;
//! ```

mod abort;
mod config;
mod destination;
mod entry;
mod events;
mod location;
mod navigate_event;
mod navigation;
mod promise;
mod result;
mod scheduler;

pub use abort::{AbortController, AbortListenerId, AbortSignal};
pub use config::NavigationConfig;
pub use destination::Destination;
pub use entry::{serialize_state, HistoryEntry, StateValue};
pub use events::{
    CurrentEntryChangeEvent, EventTarget, ListenerId, ListenerOptions, NavigateErrorEvent,
    NavigateSuccessEvent, NavigationEvent, NavigationEventType, PopStateEvent,
};
pub use location::{is_hash_change, parse_url, resolve_url};
pub use navigate_event::{
    CommitOption, FocusReset, HandlerFuture, InterceptHandler, InterceptOptions, NavigateEvent,
    NavigateEventPhase, NavigationType, ScrollBehavior,
};
pub use navigation::{
    FakeNavigation, HistoryBehavior, InitialEntryOptions, NavigateOptions, NavigationHistory,
    NavigationOptions,
};
pub use promise::{NavigationPromise, PromiseState};
pub use result::NavigationResult;
pub use scheduler::{Traversal, TraversalScheduler};

/// Navigation error
///
/// Every failure of the simulator surfaces as one of these, either returned
/// from the triggering call or delivered through a [`NavigationResult`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Cannot go back")]
    CannotGoBack,

    #[error("Cannot go forward")]
    CannotGoForward,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Unsupported: {0}")]
    Unsupported(&'static str),

    #[error("Navigation aborted: {0}")]
    Aborted(String),

    #[error("Cannot navigate to a non-same-document URL: {0}")]
    CrossDocument(String),

    #[error("Initial entry can only be set before any navigation has occurred")]
    SetupOrdering,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("State could not be cloned: {0}")]
    DataClone(String),

    #[error("Navigation handler failed: {0}")]
    Handler(String),

    #[error("Unknown event type: {0}")]
    UnknownEvent(String),

    #[error("Navigation has been disposed")]
    Disposed,
}

impl NavigationError {
    /// Whether this error is the result of a navigation being aborted
    pub fn is_abort(&self) -> bool {
        matches!(self, NavigationError::Aborted(_))
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, NavigationError>;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(NavigationError::CannotGoBack.to_string(), "Cannot go back");
        assert_eq!(
            NavigationError::InvalidKey("7".into()).to_string(),
            "Invalid key: 7"
        );
    }

    #[test]
    fn test_is_abort() {
        assert!(NavigationError::Aborted("superseded".into()).is_abort());
        assert!(!NavigationError::CannotGoForward.is_abort());
    }
}
