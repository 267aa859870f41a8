use rx_observable::{BoxObserver, Observable};

use crate::support::{guarded, Sink};

/// Emits `f(x)` per input `x`. A panic inside `f` surfaces as `on_error` and unsubscribes.
pub fn map<T, U, F>(source: &Observable<T>, f: F) -> Observable<U>
where
    T: Send + Sync + 'static,
    U: Send + Sync + 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
{
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<U>| {
        let (sink, handle) = Sink::new(observer);
        let s = sink.clone();
        let upstream = source.subscribe_all(
            move |value| match guarded(|| f(value)) {
                Ok(mapped) => s.observer().on_next(mapped),
                Err(error) => {
                    s.observer().on_error(error);
                    s.cancel_upstream();
                }
            },
            {
                let s = sink.clone();
                move |error| s.observer().on_error(error)
            },
            {
                let s = sink.clone();
                move || s.observer().on_completed()
            },
        );
        sink.bind_upstream(upstream);
        handle
    })
}

/// Emits `x` only where `pred(x)` holds. A panic inside `pred` surfaces as `on_error` and
/// unsubscribes.
pub fn filter<T, P>(source: &Observable<T>, pred: P) -> Observable<T>
where
    T: Send + Sync + 'static,
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<T>| {
        let (sink, handle) = Sink::new(observer);
        let s = sink.clone();
        let upstream = source.subscribe_all(
            move |value| match guarded(|| pred(&value)) {
                Ok(true) => s.observer().on_next(value),
                Ok(false) => {}
                Err(error) => {
                    s.observer().on_error(error);
                    s.cancel_upstream();
                }
            },
            {
                let s = sink.clone();
                move |error| s.observer().on_error(error)
            },
            {
                let s = sink.clone();
                move || s.observer().on_completed()
            },
        );
        sink.bind_upstream(upstream);
        handle
    })
}

/// Equivalent to `map(x => x.into())`.
pub fn cast<T, U>(source: &Observable<T>) -> Observable<U>
where
    T: Into<U> + Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    map(source, Into::into)
}
