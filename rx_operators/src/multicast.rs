use std::sync::Arc;

use parking_lot::Mutex;

use rx_observable::{BoxObserver, Observable};
use rx_subject::{AsyncSubject, BehaviorSubject, Subject};
use rx_subscription::{Subscription, SubscriptionLike};

/// A subject-shaped bridge usable as the backing multicast sink for [`multicast`]. Implemented
/// for every member of the subject family; lets `publish`/`publish_initial`/`publish_last`
/// share one code path instead of duplicating the connectable wiring per variant.
pub trait Multicastable<T>: Clone + Send + Sync + 'static {
    fn as_observer(&self) -> BoxObserver<T>;
    fn as_observable(&self) -> Observable<T>;
}

impl<T: Clone + Send + Sync + 'static> Multicastable<T> for Subject<T> {
    fn as_observer(&self) -> BoxObserver<T> {
        Subject::as_observer(self)
    }
    fn as_observable(&self) -> Observable<T> {
        Subject::as_observable(self)
    }
}

impl<T: Clone + Send + Sync + 'static> Multicastable<T> for BehaviorSubject<T> {
    fn as_observer(&self) -> BoxObserver<T> {
        BehaviorSubject::as_observer(self)
    }
    fn as_observable(&self) -> Observable<T> {
        BehaviorSubject::as_observable(self)
    }
}

impl<T: Clone + Send + Sync + 'static> Multicastable<T> for AsyncSubject<T> {
    fn as_observer(&self) -> BoxObserver<T> {
        AsyncSubject::as_observer(self)
    }
    fn as_observable(&self) -> Observable<T> {
        AsyncSubject::as_observable(self)
    }
}

/// An observable plus a `connect()` operation that starts a single shared upstream
/// subscription feeding an internal subject. Each call to `connect()` starts a fresh upstream
/// subscription; callers that want exactly one live connection shared across subscribers want
/// [`ref_count`] or [`connect_forever`] layered on top, not repeated manual `connect()` calls.
pub struct ConnectableObservable<T> {
    source: Observable<T>,
    to_observer: Arc<dyn Fn() -> BoxObserver<T> + Send + Sync>,
    observable: Observable<T>,
}

impl<T> Clone for ConnectableObservable<T> {
    fn clone(&self) -> Self {
        ConnectableObservable {
            source: self.source.clone(),
            to_observer: self.to_observer.clone(),
            observable: self.observable.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> ConnectableObservable<T> {
    /// Subscribe the backing subject to the source, starting the single shared upstream. The
    /// returned subscription controls that upstream; downstream subscribers go through
    /// [`as_observable`](Self::as_observable) and are unaffected by it directly.
    pub fn connect(&self) -> Subscription {
        self.source.subscribe_observer((self.to_observer)())
    }

    /// The observable downstream subscribers see — backed by the subject, not the raw source.
    pub fn as_observable(&self) -> Observable<T> {
        self.observable.clone()
    }
}

/// Returns a connectable that, on `connect`, subscribes `subject` to `source`; downstream
/// subscribers subscribe to `subject` itself, so they all observe the same shared upstream.
pub fn multicast<T, S>(source: &Observable<T>, subject: S) -> ConnectableObservable<T>
where
    T: Send + Sync + 'static,
    S: Multicastable<T>,
{
    let observable = subject.as_observable();
    let subject_for_connect = subject.clone();
    ConnectableObservable {
        source: source.clone(),
        to_observer: Arc::new(move || subject_for_connect.as_observer()),
        observable,
    }
}

/// `multicast` with a plain [`Subject`]: downstream subscribers see only values emitted after
/// they subscribe.
pub fn publish<T: Clone + Send + Sync + 'static>(source: &Observable<T>) -> ConnectableObservable<T> {
    multicast(source, Subject::new())
}

/// `multicast` with a [`BehaviorSubject`]: downstream subscribers immediately see the most
/// recent value (or `initial`, if the source has not emitted yet).
pub fn publish_initial<T: Clone + Send + Sync + 'static>(
    source: &Observable<T>,
    initial: T,
) -> ConnectableObservable<T> {
    multicast(source, BehaviorSubject::new(initial))
}

/// `multicast` with an [`AsyncSubject`]: downstream subscribers see only the final value, and
/// only once the source completes.
pub fn publish_last<T: Clone + Send + Sync + 'static>(source: &Observable<T>) -> ConnectableObservable<T> {
    multicast(source, AsyncSubject::new())
}

struct RefCountState {
    count: usize,
    connection: Option<Subscription>,
}

/// On the first downstream subscription, calls `connect()`; on the last downstream
/// unsubscription, disposes of that connection. Subsequent subscribe/unsubscribe cycles
/// reconnect from scratch.
pub fn ref_count<T: Send + Sync + 'static>(connectable: &ConnectableObservable<T>) -> Observable<T> {
    let connectable = connectable.clone();
    let state = Arc::new(Mutex::new(RefCountState { count: 0, connection: None }));
    Observable::create(move |observer: BoxObserver<T>| {
        let downstream_sub = connectable.as_observable().subscribe_observer(observer);

        {
            let mut st = state.lock();
            st.count += 1;
            if st.count == 1 {
                st.connection = Some(connectable.connect());
            }
        }

        let state_for_unsub = state.clone();
        Subscription::new(move || {
            downstream_sub.unsubscribe();
            let mut st = state_for_unsub.lock();
            st.count -= 1;
            if st.count == 0 {
                if let Some(connection) = st.connection.take() {
                    connection.unsubscribe();
                }
            }
        })
    })
}

/// Calls `connect()` once, immediately, and discards the resulting subscription — the shared
/// upstream runs for as long as the process does, independent of downstream subscriber count.
pub fn connect_forever<T: Send + Sync + 'static>(connectable: &ConnectableObservable<T>) -> Observable<T> {
    let _ = connectable.connect();
    connectable.as_observable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx_observable::from_iterable;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[test]
    fn publish_shares_one_upstream_subscription_across_subscribers() {
        let subscriptions = Arc::new(AtomicUsize::new(0));
        let s = subscriptions.clone();
        let source = Observable::<i32>::create(move |observer| {
            s.fetch_add(1, Ordering::SeqCst);
            observer.on_next(1);
            observer.on_next(2);
            observer.on_completed();
            Subscription::empty()
        });

        let connectable = publish(&source);
        let a = Arc::new(StdMutex::new(Vec::new()));
        let b = Arc::new(StdMutex::new(Vec::new()));
        let a1 = a.clone();
        let b1 = b.clone();
        connectable.as_observable().subscribe(move |v| a1.lock().unwrap().push(v));
        connectable.as_observable().subscribe(move |v| b1.lock().unwrap().push(v));

        connectable.connect();

        assert_eq!(subscriptions.load(Ordering::SeqCst), 1);
        assert_eq!(*a.lock().unwrap(), vec![1, 2]);
        assert_eq!(*b.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn ref_count_connects_on_first_subscriber_and_disconnects_on_last_unsubscribe() {
        let connect_count = Arc::new(AtomicUsize::new(0));
        let c = connect_count.clone();
        let source = Observable::<i32>::create(move |_observer| {
            c.fetch_add(1, Ordering::SeqCst);
            Subscription::new(|| {})
        });

        let connectable = publish(&source);
        let shared = ref_count(&connectable);

        let sub1 = shared.subscribe(|_| {});
        let sub2 = shared.subscribe(|_| {});
        assert_eq!(connect_count.load(Ordering::SeqCst), 1);

        sub1.unsubscribe();
        assert_eq!(connect_count.load(Ordering::SeqCst), 1);
        sub2.unsubscribe();

        let _sub3 = shared.subscribe(|_| {});
        assert_eq!(connect_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn publish_last_replays_the_final_value_to_late_subscribers() {
        let connectable = publish_last(&from_iterable(vec![1, 2, 3], None));
        connectable.connect();

        let received = Arc::new(StdMutex::new(Vec::new()));
        let r = received.clone();
        connectable.as_observable().subscribe(move |v| r.lock().unwrap().push(v));
        assert_eq!(*received.lock().unwrap(), vec![3]);
    }
}
