use rx_observable::{BoxObserver, Notification, Observable};

use crate::support::Sink;

/// Turns every signal — including termination — into a value, so downstream code can treat
/// errors and completion as ordinary data. The resulting observable never errors; it completes
/// right after emitting the `Completed`/`Error` notification for the source's own termination.
pub fn materialize<T: Send + Sync + 'static>(source: &Observable<T>) -> Observable<Notification<T>> {
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<Notification<T>>| {
        let (sink, handle) = Sink::new(observer);
        let s_next = sink.clone();
        let s_err = sink.clone();
        let s_completed = sink.clone();
        let upstream = source.subscribe_all(
            move |value| s_next.observer().on_next(Notification::Next(value)),
            move |error| {
                s_err.observer().on_next(Notification::Error(error));
                s_err.observer().on_completed();
            },
            move || {
                s_completed.observer().on_next(Notification::Completed);
                s_completed.observer().on_completed();
            },
        );
        sink.bind_upstream(upstream);
        handle
    })
}

/// The inverse of [`materialize`]: replays each recorded notification as the signal it
/// represents. A recorded `Error`/`Completed` terminates the resulting observable immediately,
/// independent of the source's own (separate) completion.
pub fn dematerialize<T: Send + Sync + 'static>(source: &Observable<Notification<T>>) -> Observable<T> {
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<T>| {
        let (sink, handle) = Sink::new(observer);
        let s_next = sink.clone();
        let s_completed = sink.clone();
        let upstream = source.subscribe_all(
            move |notification| match notification {
                Notification::Next(value) => s_next.observer().on_next(value),
                Notification::Error(error) => {
                    s_next.observer().on_error(error);
                    s_next.cancel_upstream();
                }
                Notification::Completed => {
                    s_next.observer().on_completed();
                    s_next.cancel_upstream();
                }
            },
            {
                let s = sink.clone();
                move |error| s.observer().on_error(error)
            },
            move || s_completed.observer().on_completed(),
        );
        sink.bind_upstream(upstream);
        handle
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx_common::RxError;
    use rx_observable::from_iterable;
    use std::sync::{Arc, Mutex};

    #[test]
    fn materialize_wraps_values_and_completion_and_never_errors() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let o = out.clone();
        materialize(&from_iterable(vec![1, 2], None))
            .subscribe(move |n| o.lock().unwrap().push(format!("{n:?}")));
        assert_eq!(
            *out.lock().unwrap(),
            vec!["Next(1)".to_string(), "Next(2)".to_string(), "Completed".to_string()]
        );
    }

    #[test]
    fn materialize_wraps_an_error_then_completes() {
        let source = Observable::<i32>::create(|observer| {
            observer.on_error(RxError::callback("boom"));
            rx_subscription::Subscription::empty()
        });
        let result = materialize(&source).for_each(|_| {});
        assert!(result.is_ok());
    }

    #[test]
    fn dematerialize_replays_the_recorded_signals() {
        let recorded = from_iterable(vec![
            Notification::Next(1),
            Notification::Next(2),
            Notification::Completed,
        ], None);
        let out = Arc::new(Mutex::new(Vec::new()));
        let o = out.clone();
        dematerialize(&recorded).subscribe(move |v| o.lock().unwrap().push(v));
        assert_eq!(*out.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn materialize_then_dematerialize_round_trips_an_error() {
        let source = Observable::<i32>::create(|observer| {
            observer.on_next(1);
            observer.on_error(RxError::callback("boom"));
            rx_subscription::Subscription::empty()
        });
        let result = dematerialize(&materialize(&source)).for_each(|_| {});
        assert!(result.is_err());
    }
}
