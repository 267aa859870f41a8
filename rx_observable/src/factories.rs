use std::sync::Arc;

use rx_common::{guarded, RxError};
use rx_scheduler::{CurrentThreadScheduler, EventLoopScheduler, Scheduler, Worker};
use rx_subscription::{SerialSubscription, Subscription, SubscriptionLike};

use crate::observable::Observable;
use crate::observer::BoxObserver;
use crate::producer::run_on_current_thread;

fn scheduler_or_current_thread(scheduler: Option<Arc<dyn Scheduler>>) -> Arc<dyn Scheduler> {
    scheduler.unwrap_or_else(|| Arc::new(CurrentThreadScheduler::new()))
}

/// Emits `start, start+step, ..` for `count` items, then completes, with each item
/// individually scheduled onto `scheduler` so virtual-time tests observe them one tick apart.
/// With no `scheduler`, a fresh [`CurrentThreadScheduler`] is used.
pub fn range(start: i64, count: i64, step: i64, scheduler: Option<Arc<dyn Scheduler>>) -> Observable<i64> {
    let scheduler = scheduler_or_current_thread(scheduler);
    Observable::create(move |observer: BoxObserver<i64>| {
        let worker = scheduler.create_worker();
        let serial = SerialSubscription::new();
        let first = schedule_range_item(worker, serial.clone(), observer, start, count, step);
        serial.set(first);
        Subscription::from_like(serial)
    })
}

fn schedule_range_item(
    worker: Arc<dyn Worker>,
    serial: SerialSubscription,
    observer: BoxObserver<i64>,
    current: i64,
    remaining: i64,
    step: i64,
) -> Subscription {
    worker.schedule(Box::new(move |_| {
        if remaining == 0 {
            observer.on_completed();
            return;
        }
        observer.on_next(current);
        let next = schedule_range_item(
            worker.clone(),
            serial.clone(),
            observer,
            current + step,
            remaining - 1,
            step,
        );
        serial.set(next);
    }))
}

/// Emits a single value, then completes. With no `scheduler`, the subscribe work is merely
/// deferred onto a current-thread trampoline (see [`run_on_current_thread`]); with one, the
/// value is delivered from that scheduler's worker instead.
pub fn just<T: Clone + Send + Sync + 'static>(value: T, scheduler: Option<Arc<dyn Scheduler>>) -> Observable<T> {
    match scheduler {
        None => Observable::create(move |observer: BoxObserver<T>| {
            let value = value.clone();
            run_on_current_thread(move || {
                observer.on_next(value);
                observer.on_completed();
                Subscription::empty()
            })
        }),
        Some(scheduler) => Observable::create(move |observer: BoxObserver<T>| {
            let worker = scheduler.create_worker();
            let value = value.clone();
            Subscription::from_like(scheduled_run(&worker, move || {
                observer.on_next(value);
                observer.on_completed();
            }))
        }),
    }
}

/// Completes immediately, without emitting any value.
pub fn empty<T: Send + Sync + 'static>(scheduler: Option<Arc<dyn Scheduler>>) -> Observable<T> {
    match scheduler {
        None => Observable::create(move |observer: BoxObserver<T>| {
            run_on_current_thread(move || {
                observer.on_completed();
                Subscription::empty()
            })
        }),
        Some(scheduler) => Observable::create(move |observer: BoxObserver<T>| {
            let worker = scheduler.create_worker();
            Subscription::from_like(scheduled_run(&worker, move || observer.on_completed()))
        }),
    }
}

/// Never emits and never terminates; the returned subscription is the only way to detach.
pub fn never<T: Send + Sync + 'static>() -> Observable<T> {
    Observable::create(|_observer: BoxObserver<T>| Subscription::empty())
}

/// Immediately errors with `error`, without emitting any value.
pub fn throw<T: Send + Sync + 'static>(error: RxError, scheduler: Option<Arc<dyn Scheduler>>) -> Observable<T> {
    match scheduler {
        None => Observable::create(move |observer: BoxObserver<T>| {
            let error = error.clone();
            run_on_current_thread(move || {
                observer.on_error(error);
                Subscription::empty()
            })
        }),
        Some(scheduler) => Observable::create(move |observer: BoxObserver<T>| {
            let worker = scheduler.create_worker();
            let error = error.clone();
            Subscription::from_like(scheduled_run(&worker, move || observer.on_error(error)))
        }),
    }
}

/// Emits every item of `items`, in order, then completes.
pub fn from_iterable<T, I>(items: I, scheduler: Option<Arc<dyn Scheduler>>) -> Observable<T>
where
    T: Send + Sync + 'static,
    I: IntoIterator<Item = T> + Clone + Send + 'static,
    I::IntoIter: Send,
{
    match scheduler {
        None => Observable::create(move |observer: BoxObserver<T>| {
            let items = items.clone();
            run_on_current_thread(move || {
                for item in items {
                    observer.on_next(item);
                }
                observer.on_completed();
                Subscription::empty()
            })
        }),
        Some(scheduler) => Observable::create(move |observer: BoxObserver<T>| {
            let worker = scheduler.create_worker();
            let items = items.clone();
            Subscription::from_like(scheduled_run(&worker, move || {
                for item in items {
                    observer.on_next(item);
                }
                observer.on_completed();
            }))
        }),
    }
}

/// Runs `body` on `worker` and wraps the scheduled handle in a [`SerialSubscription`] so the
/// caller gets back a cancellable subscription even though nothing more is ever scheduled.
fn scheduled_run(worker: &Arc<dyn Worker>, body: impl FnOnce() + Send + 'static) -> SerialSubscription {
    let serial = SerialSubscription::new();
    let sub = worker.schedule(Box::new(move |_| body()));
    serial.set(sub);
    serial
}

/// Emits `0, 1, 2, ..` spaced `dt` milliseconds apart, forever. With no `scheduler`, a fresh
/// [`EventLoopScheduler`] is used, since an infinite source cannot run to completion on a
/// current-thread trampoline without blocking the subscribing thread forever.
pub fn interval(dt: i64, scheduler: Option<Arc<dyn Scheduler>>) -> Observable<i64> {
    let scheduler: Arc<dyn Scheduler> =
        scheduler.unwrap_or_else(|| Arc::new(EventLoopScheduler::new()));
    Observable::create(move |observer: BoxObserver<i64>| {
        let worker = scheduler.create_worker();
        let serial = SerialSubscription::new();
        let first = schedule_tick(worker, serial.clone(), dt, 0, observer);
        serial.set(first);
        Subscription::from_like(serial)
    })
}

fn schedule_tick(
    worker: Arc<dyn Worker>,
    serial: SerialSubscription,
    dt: i64,
    next_value: i64,
    observer: BoxObserver<i64>,
) -> Subscription {
    let worker_for_tick = worker.clone();
    worker.schedule_after(
        dt,
        Box::new(move |_| {
            observer.on_next(next_value);
            let next = schedule_tick(worker_for_tick, serial.clone(), dt, next_value + 1, observer);
            serial.set(next);
        }),
    )
}

/// Acquires a scoped resource before subscribing to the observable `observable_factory`
/// derives from it, and releases the resource when that inner subscription ends — normally,
/// by error, or by cancellation.
///
/// If `resource_factory` panics, the error surfaces as `on_error` with no resource release.
/// If `observable_factory` panics once the resource exists, the error surfaces and the
/// resource is released.
pub fn using<T, R, RF, OF>(resource_factory: RF, observable_factory: OF) -> Observable<T>
where
    T: Send + Sync + 'static,
    R: Send + Sync + 'static,
    RF: Fn() -> R + Send + Sync + 'static,
    OF: Fn(&R) -> Observable<T> + Send + Sync + 'static,
{
    Observable::create(move |observer: BoxObserver<T>| {
        let resource = match guarded(|| resource_factory()) {
            Ok(resource) => resource,
            Err(error) => {
                observer.on_error(error);
                return Subscription::empty();
            }
        };
        let inner = match guarded(|| observable_factory(&resource)) {
            Ok(inner) => inner,
            Err(error) => {
                // The resource was acquired, so it is released even though subscribing to
                // the inner observable never happened.
                drop(resource);
                observer.on_error(error);
                return Subscription::empty();
            }
        };
        let resource = Arc::new(resource);
        let release = resource.clone();
        let inner_sub = inner.subscribe_observer(observer);
        Subscription::new(move || {
            inner_sub.unsubscribe();
            drop(release);
        })
    })
}
