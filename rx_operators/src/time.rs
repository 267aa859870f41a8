use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use rx_observable::{BoxObserver, Observable};
use rx_scheduler::{Scheduler, Worker};
use rx_subscription::{CompositeSubscription, SerialSubscription, Subscription, SubscriptionLike};

use crate::support::Sink;

/// Re-emits each notification, including completion, after `dt` milliseconds on `scheduler`.
/// `on_error` is delivered immediately, without delay — a failing source should not be held
/// up behind its own backlog of pending deliveries.
pub fn delay<T: Send + Sync + 'static>(
    source: &Observable<T>,
    dt: i64,
    scheduler: Arc<dyn Scheduler>,
) -> Observable<T> {
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<T>| {
        let (sink, handle) = Sink::new(observer);
        let worker = scheduler.create_worker();
        let pending = CompositeSubscription::new();

        let s_next = sink.clone();
        let w_next = worker.clone();
        let pending_next = pending.clone();

        let s_completed = sink.clone();
        let w_completed = worker.clone();
        let pending_completed = pending.clone();

        let upstream = source.subscribe_all(
            move |value| {
                let s = s_next.clone();
                let sub = w_next.schedule_after(dt, Box::new(move |_| s.observer().on_next(value)));
                pending_next.add(sub);
            },
            {
                let s = sink.clone();
                move |error| s.observer().on_error(error)
            },
            move || {
                let s = s_completed.clone();
                let sub =
                    w_completed.schedule_after(dt, Box::new(move |_| s.observer().on_completed()));
                pending_completed.add(sub);
            },
        );

        let composite = CompositeSubscription::new();
        composite.add(upstream);
        composite.add(Subscription::from_like(pending));
        sink.bind_upstream(Subscription::from_like(composite));
        handle
    })
}

/// A "last value wins" debounce: on each input, cancels any pending emission and schedules a
/// new one `dt` later. Completion flushes the pending value first, synchronously, then
/// completes — it does not wait out the remainder of the window.
///
/// Cancelling the previous timer's `SerialSubscription` entry races against that timer's
/// closure already having been popped off the scheduler's queue, so cancellation alone
/// cannot stop a stale closure from firing. Each pending emission is tagged with a
/// monotonically increasing id, bumped under the same lock that stores the value it guards;
/// a fired timer only delivers if `current_id` still matches the id it captured, exactly the
/// `state->id` discipline the original throttle implementation uses.
pub fn throttle<T: Clone + Send + Sync + 'static>(
    source: &Observable<T>,
    dt: i64,
    scheduler: Arc<dyn Scheduler>,
) -> Observable<T> {
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<T>| {
        let (sink, handle) = Sink::new(observer);
        let worker = scheduler.create_worker();
        let timer = SerialSubscription::new();
        let pending: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
        let current_id = Arc::new(AtomicU64::new(0));

        let s_next = sink.clone();
        let timer_next = timer.clone();
        let pending_next = pending.clone();
        let id_next = current_id.clone();
        let w_next = worker.clone();

        let s_completed = sink.clone();
        let pending_completed = pending.clone();

        let upstream = source.subscribe_all(
            move |value| {
                let my_id = {
                    let mut slot = pending_next.lock();
                    *slot = Some(value);
                    id_next.fetch_add(1, Ordering::SeqCst) + 1
                };
                let s = s_next.clone();
                let slot = pending_next.clone();
                let id_for_check = id_next.clone();
                let sub = w_next.schedule_after(
                    dt,
                    Box::new(move |_| {
                        let mut guard = slot.lock();
                        if id_for_check.load(Ordering::SeqCst) == my_id {
                            if let Some(value) = guard.take() {
                                drop(guard);
                                s.observer().on_next(value);
                            }
                        }
                    }),
                );
                timer_next.set(sub);
            },
            {
                let s = sink.clone();
                move |error| s.observer().on_error(error)
            },
            move || {
                if let Some(value) = pending_completed.lock().take() {
                    s_completed.observer().on_next(value);
                }
                s_completed.observer().on_completed();
            },
        );

        let composite = CompositeSubscription::new();
        composite.add(upstream);
        composite.add(Subscription::from_like(timer));
        sink.bind_upstream(Subscription::from_like(composite));
        handle
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx_observable::from_iterable;
    use rx_scheduler::ImmediateScheduler;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn delay_preserves_order_and_delivers_after_the_source_completes() {
        let scheduler: Arc<dyn Scheduler> = Arc::new(ImmediateScheduler::new());
        let out = Arc::new(StdMutex::new(Vec::new()));
        let o = out.clone();
        delay(&from_iterable(vec![1, 2, 3], None), 1, scheduler)
            .subscribe(move |v| o.lock().unwrap().push(v));
        assert_eq!(*out.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn throttle_with_immediate_scheduler_flushes_every_value_once_its_window_elapses() {
        let scheduler: Arc<dyn Scheduler> = Arc::new(ImmediateScheduler::new());
        let out = Arc::new(StdMutex::new(Vec::new()));
        let o = out.clone();
        throttle(&from_iterable(vec![1, 2, 3], None), 0, scheduler)
            .subscribe(move |v| o.lock().unwrap().push(v));
        assert_eq!(*out.lock().unwrap(), vec![1, 2, 3]);
    }

    /// A worker that only queues scheduled actions, so a test can fire them in whatever
    /// order it chooses instead of the scheduler's own (here: synchronous) order.
    #[derive(Default)]
    struct ManualWorker {
        actions: StdMutex<Vec<rx_scheduler::Action>>,
    }

    impl Worker for ManualWorker {
        fn now(&self) -> i64 {
            0
        }

        fn schedule_after(&self, _dt: i64, action: rx_scheduler::Action) -> Subscription {
            self.actions.lock().unwrap().push(action);
            Subscription::empty()
        }
    }

    struct ManualScheduler(Arc<ManualWorker>);

    impl Scheduler for ManualScheduler {
        fn now(&self) -> i64 {
            0
        }

        fn create_worker(&self) -> Arc<dyn Worker> {
            self.0.clone()
        }
    }

    #[test]
    fn throttle_drops_a_stale_timer_superseded_by_a_later_value() {
        let worker = Arc::new(ManualWorker::default());
        let scheduler: Arc<dyn Scheduler> = Arc::new(ManualScheduler(worker.clone()));

        let source = rx_subject::Subject::new();
        let out = Arc::new(StdMutex::new(Vec::new()));
        let o = out.clone();
        let _sub = throttle(&source.as_observable(), 10, scheduler).subscribe(move |v| o.lock().unwrap().push(v));

        source.on_next(1);
        source.on_next(2);

        // Both timers are still pending; firing the stale (value-1) one first must be a
        // no-op, and the current (value-2) one must be the only delivery.
        let pending: Vec<_> = std::mem::take(&mut *worker.actions.lock().unwrap());
        assert_eq!(pending.len(), 2);
        for action in pending {
            action(&*worker.clone());
        }

        assert_eq!(*out.lock().unwrap(), vec![2]);
    }
}
