use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use rx_observable::{BoxObserver, Observable};
use rx_scheduler::{Action, Scheduler, Worker};
use rx_subscription::{SerialSubscription, Subscription, SubscriptionLike};

use crate::test_observer::TestObserver;

/// The virtual instant at which `start`'s observable factory runs, matching the
/// `created_time` used throughout the original RxCpp/Rx.NET marble tests.
pub const CREATED_TIME: i64 = 100;
/// The default virtual instant at which `start` subscribes to the observable it built.
pub const SUBSCRIBED_TIME: i64 = 200;
/// The default virtual instant at which `start` disposes of its subscription.
pub const UNSUBSCRIBED_TIME: i64 = 1000;

struct Item {
    due_time: i64,
    seq: u64,
    action: Action,
    subscription: Subscription,
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.due_time == other.due_time && self.seq == other.seq
    }
}
impl Eq for Item {}

impl PartialOrd for Item {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Item {
    fn cmp(&self, other: &Self) -> Ordering {
        other.due_time.cmp(&self.due_time).then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Queue {
    heap: BinaryHeap<Item>,
    next_seq: u64,
}

struct Inner {
    clock: AtomicI64,
    queue: Mutex<Queue>,
}

/// A scheduler whose clock is advanced explicitly by the harness rather than by wall time.
///
/// Every `Scheduler`/`Worker` call behaves exactly as the wall-clock schedulers in
/// `rx_scheduler` do — `schedule_after`/`schedule_at` enqueue relative to the current virtual
/// `now()` — so any operator written against those traits runs unmodified here. What differs
/// is *when* enqueued actions actually execute: only [`VirtualTimeScheduler::advance_to`] (and
/// the `run`/`start` helpers built on it) drains the queue; nothing runs on a timer or a
/// background thread.
#[derive(Clone)]
pub struct VirtualTimeScheduler {
    inner: Arc<Inner>,
}

impl VirtualTimeScheduler {
    pub fn new() -> Self {
        VirtualTimeScheduler {
            inner: Arc::new(Inner {
                clock: AtomicI64::new(0),
                queue: Mutex::new(Queue { heap: BinaryHeap::new(), next_seq: 0 }),
            }),
        }
    }

    pub(crate) fn enqueue(&self, due_time: i64, action: Action) -> Subscription {
        let sub = Subscription::new(|| {});
        let mut queue = self.inner.queue.lock().unwrap();
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.heap.push(Item { due_time, seq, action, subscription: sub.clone() });
        sub
    }

    /// Run every currently-queued action due at or before `t`, advancing the virtual clock to
    /// each action's own due time as it runs (rather than jumping straight to `t`), so actions
    /// observe the exact instant they were scheduled for. If no action is due before `t`, the
    /// clock still advances to `t`.
    pub fn advance_to(&self, t: i64) {
        loop {
            let due = { self.inner.queue.lock().unwrap().heap.peek().map(|item| item.due_time) };
            match due {
                Some(due) if due <= t => {
                    let item = self.inner.queue.lock().unwrap().heap.pop();
                    let Some(item) = item else { continue };
                    if item.subscription.is_subscribed() {
                        self.inner.clock.store(item.due_time, AtomicOrdering::SeqCst);
                        let worker = self.create_worker();
                        (item.action)(worker.as_ref());
                    }
                }
                _ => break,
            }
        }
        let current = self.inner.clock.load(AtomicOrdering::SeqCst);
        if t > current {
            self.inner.clock.store(t, AtomicOrdering::SeqCst);
        }
    }

    /// Drain every action currently enqueued, regardless of how far in the (virtual) future
    /// it is due. Used by `start`/`start_at` once the subscribe/unsubscribe actions have been
    /// scheduled, so the whole scripted timeline plays out in one call.
    pub fn run(&self) {
        loop {
            let due = { self.inner.queue.lock().unwrap().heap.peek().map(|item| item.due_time) };
            match due {
                Some(due) => self.advance_to(due),
                None => break,
            }
        }
    }

    /// Build an observable at [`CREATED_TIME`], subscribe to it at [`SUBSCRIBED_TIME`], and
    /// unsubscribe at [`UNSUBSCRIBED_TIME`], returning a [`TestObserver`] with the recorded
    /// trace. Equivalent to `sc->start<T>(factory)` in the original marble-test harness.
    pub fn start<T, F>(&self, factory: F) -> TestObserver<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Observable<T> + Send + 'static,
    {
        self.start_at(factory, None, None)
    }

    /// As [`VirtualTimeScheduler::start`], but with explicit subscribe/unsubscribe times in
    /// place of the defaults.
    pub fn start_at<T, F>(
        &self,
        factory: F,
        subscribed_at: Option<i64>,
        unsubscribed_at: Option<i64>,
    ) -> TestObserver<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Observable<T> + Send + 'static,
    {
        let subscribed_at = subscribed_at.unwrap_or(SUBSCRIBED_TIME);
        let unsubscribed_at = unsubscribed_at.unwrap_or(UNSUBSCRIBED_TIME);

        let observer = TestObserver::new(self.clone());
        let observable_cell: Arc<Mutex<Option<Observable<T>>>> = Arc::new(Mutex::new(None));
        let subscription_cell = SerialSubscription::new();

        let cell = observable_cell.clone();
        self.enqueue(
            CREATED_TIME,
            Box::new(move |_| {
                *cell.lock().unwrap() = Some(factory());
            }),
        );

        let cell = observable_cell.clone();
        let obs_for_subscribe = observer.clone();
        let sub_cell = subscription_cell.clone();
        self.enqueue(
            subscribed_at,
            Box::new(move |_| {
                let observable = cell.lock().unwrap().clone();
                if let Some(observable) = observable {
                    let sink: BoxObserver<T> = Box::new(obs_for_subscribe);
                    let sub = observable.subscribe_observer(sink);
                    sub_cell.set(sub);
                }
            }),
        );

        let sub_cell = subscription_cell.clone();
        self.enqueue(
            unsubscribed_at,
            Box::new(move |_| {
                sub_cell.unsubscribe();
            }),
        );

        self.run();
        observer
    }
}

impl Default for VirtualTimeScheduler {
    fn default() -> Self {
        VirtualTimeScheduler::new()
    }
}

impl Scheduler for VirtualTimeScheduler {
    fn now(&self) -> i64 {
        self.inner.clock.load(AtomicOrdering::SeqCst)
    }

    fn create_worker(&self) -> Arc<dyn Worker> {
        Arc::new(VirtualTimeWorker { scheduler: self.clone() })
    }
}

struct VirtualTimeWorker {
    scheduler: VirtualTimeScheduler,
}

impl Worker for VirtualTimeWorker {
    fn now(&self) -> i64 {
        self.scheduler.now()
    }

    fn schedule_after(&self, dt: i64, action: Action) -> Subscription {
        let due = self.scheduler.now() + dt.max(0);
        self.scheduler.enqueue(due, action)
    }
}
