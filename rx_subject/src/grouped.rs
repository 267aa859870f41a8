use rx_common::RxError;
use rx_observable::{BoxObserver, Observable, Observer};
use rx_subscription::Subscription;

use crate::subject::Subject;

/// A [`Subject`] augmented with an immutable key, backing `group_by`'s per-key streams.
pub struct GroupedSubject<K, T> {
    key: K,
    inner: Subject<T>,
}

impl<K: Clone, T> Clone for GroupedSubject<K, T> {
    fn clone(&self) -> Self {
        GroupedSubject { key: self.key.clone(), inner: self.inner.clone() }
    }
}

impl<K, T> GroupedSubject<K, T> {
    pub fn new(key: K) -> Self {
        GroupedSubject { key, inner: Subject::new() }
    }

    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Clone + Send + Sync + 'static, T: Clone + Send + Sync + 'static> GroupedSubject<K, T> {
    pub fn as_observer(&self) -> BoxObserver<T> {
        self.inner.as_observer()
    }

    /// The grouped observable exposed to `group_by`'s downstream — carries `key()` alongside
    /// the plain subject's observable behavior.
    pub fn as_observable(&self) -> GroupedObservable<K, T> {
        GroupedObservable { key: self.key.clone(), source: self.inner.as_observable() }
    }
}

/// An observable of `T` carrying an immutable `key` of type `K`, produced by `group_by`.
pub struct GroupedObservable<K, T> {
    key: K,
    source: Observable<T>,
}

impl<K: Clone, T> Clone for GroupedObservable<K, T> {
    fn clone(&self) -> Self {
        GroupedObservable { key: self.key.clone(), source: self.source.clone() }
    }
}

impl<K, T: 'static> GroupedObservable<K, T> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn subscribe(&self, on_next: impl FnMut(T) + Send + 'static) -> Subscription
    where
        T: Send + Sync,
    {
        self.source.subscribe(on_next)
    }

    pub fn subscribe_all(
        &self,
        on_next: impl FnMut(T) + Send + 'static,
        on_error: impl FnMut(RxError) + Send + 'static,
        on_completed: impl FnMut() + Send + 'static,
    ) -> Subscription
    where
        T: Send + Sync,
    {
        self.source.subscribe_all(on_next, on_error, on_completed)
    }

    pub fn subscribe_observer(&self, observer: BoxObserver<T>) -> Subscription
    where
        T: Send + Sync,
    {
        self.source.subscribe_observer(observer)
    }

    /// The underlying per-key observable, for operators that just want to chain further
    /// without caring about the key.
    pub fn into_observable(self) -> Observable<T> {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn grouped_observable_carries_its_key() {
        let grouped = GroupedSubject::<&str, i32>::new("even");
        grouped.inner.on_next(2);
        let observable = grouped.as_observable();
        assert_eq!(*observable.key(), "even");

        let received = Arc::new(Mutex::new(Vec::new()));
        let r = received.clone();
        observable.subscribe(move |v| r.lock().unwrap().push(v));
        grouped.inner.on_next(4);
        assert_eq!(*received.lock().unwrap(), vec![4]);
    }
}
