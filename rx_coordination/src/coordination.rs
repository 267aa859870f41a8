use std::sync::{Arc, Mutex};

use rx_observable::{BoxObserver, Observable, Observer};
use rx_common::RxError;
use rx_scheduler::{Scheduler, Worker};

/// The per-subscription half of a [`Coordination`]: wraps the source observable and the
/// downstream observer so their notifications cross threads (or serialize) the way the
/// coordination prescribes. A fresh coordinator is created for every subscription, so any
/// state it needs (a mutex, a worker handle) is scoped to that one subscription.
pub trait Coordinator<T>: Send + Sync {
    /// Wrap the incoming source. Most coordinations leave this as the identity; only ones
    /// that shift subscription-time work (none here yet) would override it meaningfully.
    fn wrap_source(&self, source: Observable<T>) -> Observable<T> {
        source
    }

    /// Wrap the downstream observer so its `on_next`/`on_error`/`on_completed` calls are
    /// delivered according to the coordination's policy.
    fn wrap_sink(&self, observer: BoxObserver<T>) -> BoxObserver<T> {
        observer
    }
}

/// A thread-crossing policy. Implementors are cheap to clone/share; [`coordinate`] asks for a
/// fresh [`Coordinator`] on every subscription.
pub trait Coordination<T>: Send + Sync {
    fn create_coordinator(&self) -> Box<dyn Coordinator<T>>;
}

/// Applies `coordination` to `source`: on each subscription, a fresh coordinator wraps both
/// the source and the downstream observer before the actual subscribe happens.
pub fn coordinate<T: Send + Sync + 'static>(
    source: &Observable<T>,
    coordination: Arc<dyn Coordination<T>>,
) -> Observable<T> {
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<T>| {
        let coordinator = coordination.create_coordinator();
        let wrapped_source = coordinator.wrap_source(source.clone());
        let wrapped_observer = coordinator.wrap_sink(observer);
        wrapped_source.subscribe_observer(wrapped_observer)
    })
}

/// Pass-through coordination: `in` and `out` are both identity. Exists so call sites that are
/// generic over `Coordination` can opt out of any thread shift without a special case.
pub struct IdentityOneWorker;

impl IdentityOneWorker {
    pub fn new() -> Self {
        IdentityOneWorker
    }
}

impl Default for IdentityOneWorker {
    fn default() -> Self {
        IdentityOneWorker::new()
    }
}

struct IdentityCoordinator;
impl<T> Coordinator<T> for IdentityCoordinator {}

impl<T: Send + Sync + 'static> Coordination<T> for IdentityOneWorker {
    fn create_coordinator(&self) -> Box<dyn Coordinator<T>> {
        Box::new(IdentityCoordinator)
    }
}

/// Enqueues every notification from `observer` onto a single worker drawn from `scheduler`,
/// serialized by a per-subscription mutex so concurrent producers still deliver in a total
/// order.
struct SynchronizingObserver<T> {
    worker: Arc<dyn Worker>,
    inner: Arc<BoxObserver<T>>,
    lock: Arc<Mutex<()>>,
}

impl<T: Send + Sync + 'static> Observer<T> for SynchronizingObserver<T> {
    fn on_next(&self, value: T) {
        let inner = self.inner.clone();
        let lock = self.lock.clone();
        self.worker.schedule(Box::new(move |_| {
            let _guard = lock.lock().unwrap();
            inner.on_next(value);
        }));
    }

    fn on_error(&self, error: RxError) {
        let inner = self.inner.clone();
        let lock = self.lock.clone();
        self.worker.schedule(Box::new(move |_| {
            let _guard = lock.lock().unwrap();
            inner.on_error(error);
        }));
    }

    fn on_completed(&self) {
        let inner = self.inner.clone();
        let lock = self.lock.clone();
        self.worker.schedule(Box::new(move |_| {
            let _guard = lock.lock().unwrap();
            inner.on_completed();
        }));
    }
}

/// Shifts every downstream notification onto one worker drawn from `scheduler`, serialized by
/// a per-subscription mutex. `in` is unchanged — only the delivery side moves.
pub struct SynchronizeOneWorker {
    scheduler: Arc<dyn Scheduler>,
}

impl SynchronizeOneWorker {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        SynchronizeOneWorker { scheduler }
    }
}

struct SynchronizeCoordinator {
    worker: Arc<dyn Worker>,
}

impl<T: Send + Sync + 'static> Coordinator<T> for SynchronizeCoordinator {
    fn wrap_sink(&self, observer: BoxObserver<T>) -> BoxObserver<T> {
        Box::new(SynchronizingObserver {
            worker: self.worker.clone(),
            inner: Arc::new(observer),
            lock: Arc::new(Mutex::new(())),
        })
    }
}

impl<T: Send + Sync + 'static> Coordination<T> for SynchronizeOneWorker {
    fn create_coordinator(&self) -> Box<dyn Coordinator<T>> {
        Box::new(SynchronizeCoordinator { worker: self.scheduler.create_worker() })
    }
}

/// Serializes delivery through a per-subscription mutex, without moving it to another thread
/// — notifications still run on whichever thread the source called from, one at a time.
struct SerializingObserver<T> {
    inner: Arc<BoxObserver<T>>,
    lock: Arc<Mutex<()>>,
}

impl<T> Observer<T> for SerializingObserver<T> {
    fn on_next(&self, value: T) {
        let _guard = self.lock.lock().unwrap();
        self.inner.on_next(value);
    }

    fn on_error(&self, error: RxError) {
        let _guard = self.lock.lock().unwrap();
        self.inner.on_error(error);
    }

    fn on_completed(&self) {
        let _guard = self.lock.lock().unwrap();
        self.inner.on_completed();
    }
}

/// Like [`SynchronizeOneWorker`], but without the thread shift — only the mutex is applied.
/// Takes a scheduler for API symmetry with `synchronize_one_worker`, though it is never asked
/// to run anything on it.
pub struct SerializeOneWorker {
    #[allow(dead_code)]
    scheduler: Arc<dyn Scheduler>,
}

impl SerializeOneWorker {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        SerializeOneWorker { scheduler }
    }
}

struct SerializeCoordinator;

impl<T: Send + Sync + 'static> Coordinator<T> for SerializeCoordinator {
    fn wrap_sink(&self, observer: BoxObserver<T>) -> BoxObserver<T> {
        Box::new(SerializingObserver { inner: Arc::new(observer), lock: Arc::new(Mutex::new(())) })
    }
}

impl<T: Send + Sync + 'static> Coordination<T> for SerializeOneWorker {
    fn create_coordinator(&self) -> Box<dyn Coordinator<T>> {
        Box::new(SerializeCoordinator)
    }
}

/// `identity_one_worker(scheduler)` ignores `scheduler` entirely — it exists so identity slots
/// into call sites that pick a coordination based on a scheduler argument.
pub fn identity_one_worker(_scheduler: Arc<dyn Scheduler>) -> IdentityOneWorker {
    IdentityOneWorker::new()
}

pub fn synchronize_one_worker(scheduler: Arc<dyn Scheduler>) -> SynchronizeOneWorker {
    SynchronizeOneWorker::new(scheduler)
}

pub fn serialize_one_worker(scheduler: Arc<dyn Scheduler>) -> SerializeOneWorker {
    SerializeOneWorker::new(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx_observable::from_iterable;
    use rx_scheduler::ImmediateScheduler;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn identity_coordination_passes_values_through_unchanged() {
        let scheduler: Arc<dyn Scheduler> = Arc::new(ImmediateScheduler::new());
        let out = Arc::new(StdMutex::new(Vec::new()));
        let o = out.clone();
        let coordination: Arc<dyn Coordination<i32>> = Arc::new(identity_one_worker(scheduler));
        coordinate(&from_iterable(vec![1, 2, 3], None), coordination)
            .subscribe(move |v| o.lock().unwrap().push(v));
        assert_eq!(*out.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn synchronize_delivers_every_value_through_the_shared_worker() {
        let scheduler: Arc<dyn Scheduler> = Arc::new(ImmediateScheduler::new());
        let out = Arc::new(StdMutex::new(Vec::new()));
        let o = out.clone();
        let coordination: Arc<dyn Coordination<i32>> = Arc::new(synchronize_one_worker(scheduler));
        coordinate(&from_iterable(vec![1, 2, 3], None), coordination)
            .subscribe(move |v| o.lock().unwrap().push(v));
        assert_eq!(*out.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn serialize_delivers_values_in_order_without_switching_threads() {
        let scheduler: Arc<dyn Scheduler> = Arc::new(ImmediateScheduler::new());
        let out = Arc::new(StdMutex::new(Vec::new()));
        let o = out.clone();
        let coordination: Arc<dyn Coordination<i32>> = Arc::new(serialize_one_worker(scheduler));
        coordinate(&from_iterable(vec![1, 2, 3], None), coordination)
            .subscribe(move |v| o.lock().unwrap().push(v));
        assert_eq!(*out.lock().unwrap(), vec![1, 2, 3]);
    }
}
