//! Traversal scheduling
//!
//! Traversals (back, forward, go, traverseTo) run one per executor tick in
//! FIFO order, approximating the cross-process round trip a real browser
//! makes before a traversal lands. Tests can switch to synchronous mode, in
//! which every traversal runs before the triggering call returns.

use crate::promise::NavigationPromise;
use crate::Result;
use smol::{LocalExecutor, Timer};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

/// A queued traversal
pub type Traversal = Box<dyn FnOnce() -> Result<()>>;

/// One simulated task boundary. A zero-length timer is ready on first poll,
/// so a zero delay yields to the executor instead.
async fn task_boundary(delay: Duration) {
    if delay.is_zero() {
        smol::future::yield_now().await;
    } else {
        Timer::after(delay).await;
    }
}

/// FIFO traversal queue drained by a single task
pub struct TraversalScheduler {
    executor: Rc<LocalExecutor<'static>>,
    tick: Duration,
    synchronous: Cell<bool>,
    queue: Rc<RefCell<VecDeque<Traversal>>>,
    draining: Rc<Cell<bool>>,
    /// Settled by the drain task when it stops
    drained: Rc<RefCell<Option<NavigationPromise<()>>>>,
}

impl TraversalScheduler {
    pub fn new(executor: Rc<LocalExecutor<'static>>, synchronous: bool, tick: Duration) -> Self {
        Self {
            executor,
            tick,
            synchronous: Cell::new(synchronous),
            queue: Rc::new(RefCell::new(VecDeque::new())),
            draining: Rc::new(Cell::new(false)),
            drained: Rc::new(RefCell::new(None)),
        }
    }

    pub fn set_synchronous(&self, synchronous: bool) {
        self.synchronous.set(synchronous);
    }

    pub fn is_synchronous(&self) -> bool {
        self.synchronous.get()
    }

    /// Number of traversals waiting for their tick
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// No traversal queued and the drain task has stopped
    pub fn is_idle(&self) -> bool {
        !self.draining.get() && self.queue.borrow().is_empty()
    }

    /// Wait until every queued traversal has run
    pub async fn idle(&self) {
        if self.is_idle() {
            return;
        }
        let drained = self
            .drained
            .borrow_mut()
            .get_or_insert_with(NavigationPromise::pending)
            .clone();
        // Only ever resolved
        let _ = drained.await;
    }

    /// Run a traversal now (synchronous mode) or after the ones already queued.
    ///
    /// A failing traversal is logged and does not hold up the rest of the queue.
    pub fn run_traversal(&self, traversal: Traversal) {
        if self.synchronous.get() {
            if let Err(error) = traversal() {
                tracing::warn!(%error, "traversal failed");
            }
            return;
        }

        self.queue.borrow_mut().push_back(traversal);
        if self.draining.replace(true) {
            return;
        }

        let queue = Rc::clone(&self.queue);
        let draining = Rc::clone(&self.draining);
        let drained = Rc::clone(&self.drained);
        let delay = self.tick;
        self.executor
            .spawn(async move {
                loop {
                    task_boundary(delay).await;
                    let next = queue.borrow_mut().pop_front();
                    let Some(traversal) = next else {
                        draining.set(false);
                        let waiters = drained.borrow_mut().take();
                        if let Some(waiters) = waiters {
                            waiters.resolve(());
                        }
                        break;
                    };
                    if let Err(error) = traversal() {
                        tracing::warn!(%error, "traversal failed");
                    }
                }
            })
            .detach();
    }
}
