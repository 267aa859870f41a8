use std::sync::{Arc, Condvar, Mutex};

use rx_common::RxError;
use rx_subscription::{SerialSubscription, Subscription, SubscriptionLike};

use crate::auto_detach::AutoDetachObserver;
use crate::observer::{AnonymousObserver, BoxObserver, Observer};

type SubscribeFn<T> = dyn Fn(BoxObserver<T>) -> Subscription + Send + Sync;

/// A value describing *how to subscribe*. Observables are cold by default: each call to
/// [`subscribe_observer`](Observable::subscribe_observer) reruns the subscribe function from
/// scratch, with its own independent state.
pub struct Observable<T> {
    subscribe_fn: Arc<SubscribeFn<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Observable { subscribe_fn: self.subscribe_fn.clone() }
    }
}

impl<T: 'static> Observable<T> {
    /// Build an observable from its subscribe function directly. Most callers want one of
    /// the named factories (`range`, `just`, `from_iterable`, ...) or an operator instead.
    pub fn create(
        subscribe_fn: impl Fn(BoxObserver<T>) -> Subscription + Send + Sync + 'static,
    ) -> Self {
        Observable { subscribe_fn: Arc::new(subscribe_fn) }
    }

    /// Subscribe a fully-formed observer, wrapping it in the auto-detach sink that enforces
    /// the termination invariant regardless of what the producer does.
    pub fn subscribe_observer(&self, observer: BoxObserver<T>) -> Subscription
    where
        T: Send + Sync,
    {
        let serial = SerialSubscription::new();
        let sink = Box::new(AutoDetachObserver::new(observer, serial.clone()));
        let upstream = (self.subscribe_fn)(sink);
        serial.set(upstream);
        Subscription::from_like(serial)
    }

    /// Subscribe with only an `on_next` callback. Unhandled errors abort the process, per
    /// the "never silently drop" rule — use [`subscribe_all`](Observable::subscribe_all) to
    /// install an error handler.
    pub fn subscribe(&self, on_next: impl FnMut(T) + Send + 'static) -> Subscription
    where
        T: Send + Sync,
    {
        self.subscribe_observer(crate::observer::unhandled_error_observer(on_next))
    }

    /// Subscribe with all three callbacks.
    pub fn subscribe_all(
        &self,
        on_next: impl FnMut(T) + Send + 'static,
        on_error: impl FnMut(RxError) + Send + 'static,
        on_completed: impl FnMut() + Send + 'static,
    ) -> Subscription
    where
        T: Send + Sync,
    {
        self.subscribe_observer(Box::new(AnonymousObserver::new(on_next, on_error, on_completed)))
    }

    /// Subscribe and block the calling thread until the source terminates, returning the
    /// error if it terminated with one. This is the one synchronous drain the spec allows to
    /// block the caller.
    pub fn for_each(&self, mut on_next: impl FnMut(T) + Send + 'static) -> Result<(), RxError>
    where
        T: Send + Sync,
    {
        struct Done {
            mutex: Mutex<Option<Result<(), RxError>>>,
            condvar: Condvar,
        }
        let done = Arc::new(Done { mutex: Mutex::new(None), condvar: Condvar::new() });

        let done_ok = done.clone();
        let done_err = done.clone();
        let _sub = self.subscribe_all(
            move |value| on_next(value),
            move |error| {
                *done_err.mutex.lock().unwrap() = Some(Err(error));
                done_err.condvar.notify_all();
            },
            move || {
                *done_ok.mutex.lock().unwrap() = Some(Ok(()));
                done_ok.condvar.notify_all();
            },
        );

        let mut guard = done.mutex.lock().unwrap();
        while guard.is_none() {
            guard = done.condvar.wait(guard).unwrap();
        }
        guard.take().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn emit_and_complete(values: Vec<i32>) -> Observable<i32> {
        Observable::create(move |observer: BoxObserver<i32>| {
            for v in &values {
                observer.on_next(*v);
            }
            observer.on_completed();
            Subscription::empty()
        })
    }

    #[test]
    fn subscribe_delivers_values_in_order() {
        let sum = Arc::new(AtomicI32::new(0));
        let s = sum.clone();
        emit_and_complete(vec![1, 2, 3]).subscribe(move |v| {
            s.fetch_add(v, Ordering::SeqCst);
        });
        assert_eq!(sum.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn for_each_blocks_until_completion_and_surfaces_errors() {
        let observable = Observable::<i32>::create(|observer: BoxObserver<i32>| {
            observer.on_next(1);
            observer.on_error(RxError::callback("boom"));
            Subscription::empty()
        });
        let result = observable.for_each(|_| {});
        assert!(result.is_err());
    }

    #[test]
    fn completion_unsubscribes_before_returning() {
        let observable = emit_and_complete(vec![1]);
        let sub = observable.subscribe(|_| {});
        assert!(!sub.is_subscribed());
    }
}
