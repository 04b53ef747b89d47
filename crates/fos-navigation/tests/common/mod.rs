//! Shared helpers for fos-navigation integration tests

#![allow(dead_code)]

use fos_navigation::{
    FakeNavigation, InterceptOptions, NavigationEvent, NavigationEventType, NavigationType,
};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

/// Route simulator logs to the test writer; filter with `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Navigation with queued traversals
pub fn async_navigation(url: &str) -> FakeNavigation {
    init_tracing();
    FakeNavigation::new(url).expect("valid start url")
}

/// Navigation whose traversals run before the call returns
pub fn sync_navigation(url: &str) -> FakeNavigation {
    let nav = async_navigation(url);
    nav.set_synchronous_traversals_for_testing(true);
    nav
}

/// Drive the navigation's executor until `future` completes
pub fn run<T>(nav: &FakeNavigation, future: impl Future<Output = T>) -> T {
    let executor = nav.executor();
    smol::block_on(executor.run(future))
}

/// Intercept every navigation with default options
pub fn intercept_all(nav: &FakeNavigation) {
    nav.add_event_listener(NavigationEventType::Navigate, |event| {
        if let Some(navigate) = event.as_navigate() {
            navigate
                .intercept(InterceptOptions::default())
                .expect("intercept during dispatch");
        }
    });
}

pub fn urls(nav: &FakeNavigation) -> Vec<String> {
    nav.entries()
        .iter()
        .map(|entry| entry.url().to_string())
        .collect()
}

/// Record every event of `event_type` dispatched on the navigation
pub fn record(
    nav: &FakeNavigation,
    event_type: NavigationEventType,
) -> Rc<RefCell<Vec<NavigationEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    nav.add_event_listener(event_type, move |event| sink.borrow_mut().push(event.clone()));
    log
}

/// `(index, type)` of each `currententrychange`, read from the navigation at dispatch time
pub fn record_commits(nav: &FakeNavigation) -> Rc<RefCell<Vec<(usize, Option<NavigationType>)>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let observer = nav.clone();
    nav.add_event_listener(NavigationEventType::CurrentEntryChange, move |event| {
        if let Some(change) = event.as_current_entry_change() {
            sink.borrow_mut()
                .push((observer.current_entry().index(), change.navigation_type()));
        }
    });
    log
}
