//! Navigation Promise
//!
//! Settle-once value shared between the simulator and any number of awaiters.

use crate::{NavigationError, Result};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Promise state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Rejected,
}

type SettleCallback<T> = Box<dyn FnOnce(&Result<T>)>;

enum Slot<T> {
    Pending {
        wakers: Vec<Waker>,
        callbacks: Vec<SettleCallback<T>>,
    },
    Fulfilled(T),
    Rejected(NavigationError),
}

/// A single-threaded promise.
///
/// Cloning yields another handle to the same slot. Awaiting a handle
/// resolves to the settled outcome; every handle observes the same value.
/// A promise that is never awaited is simply dropped, rejections included.
pub struct NavigationPromise<T> {
    inner: Rc<RefCell<Slot<T>>>,
}

impl<T> Clone for NavigationPromise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> NavigationPromise<T> {
    /// Create a new pending promise
    pub fn pending() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Slot::Pending {
                wakers: Vec::new(),
                callbacks: Vec::new(),
            })),
        }
    }

    /// Create a fulfilled promise
    pub fn resolved(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Slot::Fulfilled(value))),
        }
    }

    /// Create a rejected promise
    pub fn rejected(error: NavigationError) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Slot::Rejected(error))),
        }
    }

    /// Get current state
    pub fn state(&self) -> PromiseState {
        match &*self.inner.borrow() {
            Slot::Pending { .. } => PromiseState::Pending,
            Slot::Fulfilled(_) => PromiseState::Fulfilled,
            Slot::Rejected(_) => PromiseState::Rejected,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.state() != PromiseState::Pending
    }

    /// Peek at the outcome without waiting
    pub fn try_get(&self) -> Option<Result<T>> {
        match &*self.inner.borrow() {
            Slot::Pending { .. } => None,
            Slot::Fulfilled(value) => Some(Ok(value.clone())),
            Slot::Rejected(error) => Some(Err(error.clone())),
        }
    }

    /// Whether both handles point at the same promise
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Fulfill the promise. Returns false if it was already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Slot::Fulfilled(value))
    }

    /// Reject the promise. Returns false if it was already settled.
    pub fn reject(&self, error: NavigationError) -> bool {
        self.settle(Slot::Rejected(error))
    }

    /// Run `callback` once the promise settles, or right away if it already has.
    pub fn on_settled(&self, callback: impl FnOnce(&Result<T>) + 'static) {
        {
            let mut inner = self.inner.borrow_mut();
            if let Slot::Pending { callbacks, .. } = &mut *inner {
                callbacks.push(Box::new(callback));
                return;
            }
        }
        if let Some(outcome) = self.try_get() {
            callback(&outcome);
        }
    }

    fn settle(&self, slot: Slot<T>) -> bool {
        let (wakers, callbacks) = {
            let mut inner = self.inner.borrow_mut();
            let Slot::Pending { wakers, callbacks } = &mut *inner else {
                return false;
            };
            let wakers = std::mem::take(wakers);
            let callbacks = std::mem::take(callbacks);
            *inner = slot;
            (wakers, callbacks)
        };

        // Callbacks may re-enter the promise, so the slot borrow is released first
        if !callbacks.is_empty() {
            if let Some(outcome) = self.try_get() {
                for callback in callbacks {
                    callback(&outcome);
                }
            }
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }
}

impl<T: Clone + 'static> Future for NavigationPromise<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.borrow_mut();
        match &mut *inner {
            Slot::Pending { wakers, .. } => {
                if !wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
            Slot::Fulfilled(value) => Poll::Ready(Ok(value.clone())),
            Slot::Rejected(error) => Poll::Ready(Err(error.clone())),
        }
    }
}

impl<T> fmt::Debug for NavigationPromise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.inner.borrow() {
            Slot::Pending { .. } => "pending",
            Slot::Fulfilled(_) => "fulfilled",
            Slot::Rejected(_) => "rejected",
        };
        f.debug_struct("NavigationPromise").field("state", &state).finish()
    }
}
