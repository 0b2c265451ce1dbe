use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};
use std::{
    cell::RefCell,
    collections::HashMap,
    marker::PhantomData,
    sync::atomic::{AtomicUsize, Ordering},
    thread::{self, ThreadId},
};
use tracing::{debug, error};

use crate::errors::DependencyCycle;

thread_local! {
    static RESOLVING: RefCell<Vec<(usize, String)>> = const { RefCell::new(Vec::new()) };
}

/// Marks a service as being created on the current thread until dropped.
///
/// Entries are keyed by container, so two containers with the same service name
/// never see each other's resolutions.
pub(crate) struct ResolutionGuard {
    _not_send: PhantomData<*const ()>,
}

impl ResolutionGuard {
    pub(crate) fn enter(container: usize, name: &str) -> Result<Self, DependencyCycle> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(position) = stack.iter().position(|(id, entry)| *id == container && entry == name) {
                let mut cycle: Vec<String> = stack[position..]
                    .iter()
                    .filter(|(id, _)| *id == container)
                    .map(|(_, entry)| entry.clone())
                    .collect();
                cycle.push(name.to_owned());

                let err = DependencyCycle { cycle };
                error!("{}", err);
                return Err(err);
            }

            stack.push((container, name.to_owned()));
            Ok(Self { _not_send: PhantomData })
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Which thread builds which entry, and which entry each blocked thread waits for
#[derive(Default)]
struct WaitGraph {
    owners: HashMap<usize, ThreadId>,
    waiting: HashMap<ThreadId, usize>,
}

impl WaitGraph {
    /// Follows owner -> awaited entry -> owner from `thread` and reports whether it reaches `target`.
    /// Every wait edge is checked before it's added, so the chain has no loop of its own.
    fn leads_to(&self, mut thread: ThreadId, target: ThreadId) -> bool {
        loop {
            if thread == target {
                return true;
            }
            let Some(lock) = self.waiting.get(&thread) else {
                return false;
            };
            let Some(owner) = self.owners.get(lock) else {
                return false;
            };
            thread = *owner;
        }
    }
}

static WAIT_GRAPH: Lazy<Mutex<WaitGraph>> = Lazy::new(Mutex::default);
static RELEASED: Condvar = Condvar::new();
static NEXT_LOCK_ID: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuildConflict {
    /// The current thread already builds the entry
    Reentered,
    /// The owner waits, directly or through other threads, for the current thread
    Deadlock,
}

/// Exclusive right to build one entry.
///
/// Other threads wait for the owner to finish, unless waiting would close a loop of threads
/// waiting for each other. That loop is a dependency cycle split across threads and is
/// reported instead of blocking.
pub(crate) struct BuildLock {
    id: usize,
}

impl Default for BuildLock {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildLock {
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub(crate) fn lock(&self) -> Result<BuildGuard<'_>, BuildConflict> {
        let current = thread::current().id();
        let mut graph = WAIT_GRAPH.lock();
        loop {
            match graph.owners.get(&self.id).copied() {
                None => {
                    graph.owners.insert(self.id, current);
                    return Ok(BuildGuard {
                        lock: self,
                        _not_send: PhantomData,
                    });
                }
                Some(owner) if owner == current => return Err(BuildConflict::Reentered),
                Some(owner) => {
                    if graph.leads_to(owner, current) {
                        return Err(BuildConflict::Deadlock);
                    }
                    debug!(?owner, "Waiting for another thread");
                    graph.waiting.insert(current, self.id);
                    RELEASED.wait(&mut graph);
                    graph.waiting.remove(&current);
                }
            }
        }
    }
}

pub(crate) struct BuildGuard<'a> {
    lock: &'a BuildLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        WAIT_GRAPH.lock().owners.remove(&self.lock.id);
        RELEASED.notify_all();
    }
}
