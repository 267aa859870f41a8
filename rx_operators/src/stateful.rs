use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use rx_common::RxError;
use rx_observable::{empty, BoxObserver, Observable};

use crate::support::{guarded, Sink};

/// Maintains an accumulator seeded with `seed`; each input emits the new accumulator. A panic
/// inside `acc` surfaces as `on_error` and unsubscribes.
pub fn scan_seeded<T, ACC, F>(source: &Observable<T>, seed: ACC, acc: F) -> Observable<ACC>
where
    T: Send + Sync + 'static,
    ACC: Clone + Send + Sync + 'static,
    F: Fn(ACC, T) -> ACC + Send + Sync + 'static,
{
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<ACC>| {
        let (sink, handle) = Sink::new(observer);
        let state = Mutex::new(seed.clone());
        let s = sink.clone();
        let upstream = source.subscribe_all(
            move |value| {
                let mut state = state.lock();
                match guarded(|| acc(state.clone(), value)) {
                    Ok(next) => {
                        *state = next.clone();
                        drop(state);
                        s.observer().on_next(next);
                    }
                    Err(error) => {
                        drop(state);
                        s.observer().on_error(error);
                        s.cancel_upstream();
                    }
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

/// Like [`scan_seeded`], but the first input seeds the accumulator and is emitted unchanged. A
/// panic inside `acc` surfaces as `on_error` and unsubscribes.
pub fn scan<T, F>(source: &Observable<T>, acc: F) -> Observable<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T, T) -> T + Send + Sync + 'static,
{
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<T>| {
        let (sink, handle) = Sink::new(observer);
        let state: Mutex<Option<T>> = Mutex::new(None);
        let s = sink.clone();
        let upstream = source.subscribe_all(
            move |value| {
                let mut state = state.lock();
                let prev = state.clone();
                let result = match prev {
                    None => Ok(value),
                    Some(prev) => guarded(|| acc(prev, value)),
                };
                match result {
                    Ok(next) => {
                        *state = Some(next.clone());
                        drop(state);
                        s.observer().on_next(next);
                    }
                    Err(error) => {
                        drop(state);
                        s.observer().on_error(error);
                        s.cancel_upstream();
                    }
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

/// Drops inputs equal to the most recently emitted one.
pub fn distinct_until_changed<T>(source: &Observable<T>) -> Observable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<T>| {
        let (sink, handle) = Sink::new(observer);
        let last: Mutex<Option<T>> = Mutex::new(None);
        let s = sink.clone();
        let upstream = source.subscribe_all(
            move |value| {
                let mut last = last.lock();
                let changed = last.as_ref() != Some(&value);
                if changed {
                    *last = Some(value.clone());
                    s.observer().on_next(value);
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

/// Emits at most the first `n` values, then completes and unsubscribes from the source.
pub fn take<T: Send + Sync + 'static>(source: &Observable<T>, n: usize) -> Observable<T> {
    if n == 0 {
        return empty(None);
    }
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<T>| {
        let (sink, handle) = Sink::new(observer);
        let remaining = AtomicUsize::new(n);
        let s = sink.clone();
        let upstream = source.subscribe_all(
            move |value| {
                let before = remaining.fetch_sub(1, Ordering::SeqCst);
                if before > 0 {
                    s.observer().on_next(value);
                }
                if before == 1 {
                    s.observer().on_completed();
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

/// Drops the first `n` values from the source, then emits the rest unchanged.
pub fn skip<T: Send + Sync + 'static>(source: &Observable<T>, n: usize) -> Observable<T> {
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<T>| {
        let (sink, handle) = Sink::new(observer);
        let remaining = AtomicUsize::new(n);
        let s = sink.clone();
        let upstream = source.subscribe_all(
            move |value| {
                let was = remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| {
                    Some(r.saturating_sub(1))
                });
                let skipped = matches!(was, Ok(r) if r > 0);
                if !skipped {
                    s.observer().on_next(value);
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

/// Emits values from `source` until `other` produces its first notification (of any kind),
/// at which point this observable completes and unsubscribes from both sources.
pub fn take_until<T, O>(source: &Observable<T>, other: &Observable<O>) -> Observable<T>
where
    T: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    let source = source.clone();
    let other = other.clone();
    Observable::create(move |observer: BoxObserver<T>| {
        let (sink, handle) = Sink::new(observer);
        let gate_open = std::sync::Arc::new(AtomicBool::new(true));

        let s = sink.clone();
        let g = gate_open.clone();
        let main_sub = source.subscribe_all(
            move |value| {
                if g.load(Ordering::Acquire) {
                    s.observer().on_next(value);
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

        let g = gate_open.clone();
        let s = sink.clone();
        let _other_sub = other.subscribe_all(
            move |_| {
                if g.swap(false, Ordering::AcqRel) {
                    s.observer().on_completed();
                    s.cancel_upstream();
                }
            },
            {
                let g = gate_open.clone();
                let s = sink.clone();
                move |error| {
                    if g.swap(false, Ordering::AcqRel) {
                        s.observer().on_error(error);
                        s.cancel_upstream();
                    }
                }
            },
            || {},
        );

        sink.bind_upstream(main_sub);
        handle
    })
}

/// Drops values from `source` until `other` produces its first notification, then emits the
/// rest unchanged.
pub fn skip_until<T, O>(source: &Observable<T>, other: &Observable<O>) -> Observable<T>
where
    T: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    let source = source.clone();
    let other = other.clone();
    Observable::create(move |observer: BoxObserver<T>| {
        let (sink, handle) = Sink::new(observer);
        let gate_open = std::sync::Arc::new(AtomicBool::new(false));

        let s = sink.clone();
        let g = gate_open.clone();
        let main_sub = source.subscribe_all(
            move |value| {
                if g.load(Ordering::Acquire) {
                    s.observer().on_next(value);
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

        let g = gate_open.clone();
        let _other_sub = other.subscribe_all(
            move |_| {
                g.store(true, Ordering::Release);
            },
            |_| {},
            || {},
        );

        sink.bind_upstream(main_sub);
        handle
    })
}

/// Subscribes to `source` at most `max_retries` times in total after an `on_error` (or
/// indefinitely if `None`), emitting the final error only once the limit is reached.
/// `max_retries` counts total subscription attempts, not retries in addition to the first —
/// `retry(Some(2))` means two attempts, the second of which forwards its error if it also
/// fails. `retry(Some(0))` completes immediately without ever subscribing to the source —
/// the spec preserves this tested-but-unusual source behavior rather than the more natural
/// "no retries means one attempt" reading.
pub fn retry<T: Send + Sync + 'static>(source: &Observable<T>, max_retries: Option<usize>) -> Observable<T> {
    if max_retries == Some(0) {
        return empty(None);
    }
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<T>| {
        let (sink, handle) = Sink::new(observer);
        attempt(source.clone(), sink, 0, max_retries);
        handle
    })
}

fn attempt<T: Send + Sync + 'static>(
    source: Observable<T>,
    sink: Sink<T>,
    tried: usize,
    max: Option<usize>,
) {
    let source_for_retry = source.clone();
    let s_next = sink.clone();
    let s_err = sink.clone();
    let s_completed = sink.clone();
    let upstream = source.subscribe_all(
        move |value| s_next.observer().on_next(value),
        move |error: RxError| {
            let exhausted = matches!(max, Some(n) if tried + 1 >= n);
            if exhausted {
                log::debug!("retry: giving up after {} attempt(s): {}", tried + 1, error);
                s_err.observer().on_error(error);
            } else {
                log::trace!("retry: attempt {} failed ({}), resubscribing", tried + 1, error);
                attempt(source_for_retry.clone(), s_err.clone(), tried + 1, max);
            }
        },
        move || s_completed.observer().on_completed(),
    );
    sink.bind_upstream(upstream);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx_observable::from_iterable;
    use std::sync::{Arc, Mutex as StdMutex};

    #[test]
    fn scan_no_seed_emits_running_total_seeded_by_first_value() {
        let out = Arc::new(StdMutex::new(Vec::new()));
        let o = out.clone();
        scan(&from_iterable(vec![1, 2, 3], None), |a, b| a + b)
            .subscribe(move |v| o.lock().unwrap().push(v));
        assert_eq!(*out.lock().unwrap(), vec![1, 3, 6]);
    }

    #[test]
    fn scan_accumulator_panic_surfaces_as_error() {
        let result = scan(&from_iterable(vec![1, 2], None), |_a: i32, _b: i32| panic!("boom"))
            .for_each(|_| {});
        assert!(result.is_err());
    }

    #[test]
    fn distinct_until_changed_collapses_runs() {
        let out = Arc::new(StdMutex::new(Vec::new()));
        let o = out.clone();
        distinct_until_changed(&from_iterable(vec![1, 1, 2, 2, 3], None))
            .subscribe(move |v| o.lock().unwrap().push(v));
        assert_eq!(*out.lock().unwrap(), vec![1, 2, 3]);
    }

    proptest::proptest! {
        /// For any input sequence, distinct_until_changed never emits the same value twice
        /// in a row, and every emitted value did occur somewhere in the source.
        #[test]
        fn distinct_until_changed_never_repeats_and_never_invents_a_value(values in proptest::collection::vec(0i32..5, 0..64)) {
            let out = Arc::new(StdMutex::new(Vec::new()));
            let o = out.clone();
            distinct_until_changed(&from_iterable(values.clone(), None))
                .subscribe(move |v| o.lock().unwrap().push(v));
            let collapsed = out.lock().unwrap();
            for window in collapsed.windows(2) {
                proptest::prop_assert_ne!(window[0], window[1]);
            }
            for v in collapsed.iter() {
                proptest::prop_assert!(values.contains(v));
            }
        }
    }

    #[test]
    fn take_stops_after_n_values() {
        let out = Arc::new(StdMutex::new(Vec::new()));
        let o = out.clone();
        take(&from_iterable(1..=10, None), 3).subscribe(move |v| o.lock().unwrap().push(v));
        assert_eq!(*out.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn skip_drops_the_first_n_values() {
        let out = Arc::new(StdMutex::new(Vec::new()));
        let o = out.clone();
        skip(&from_iterable(1..=5, None), 3).subscribe(move |v| o.lock().unwrap().push(v));
        assert_eq!(*out.lock().unwrap(), vec![4, 5]);
    }

    #[test]
    fn retry_zero_completes_without_subscribing() {
        let subscribed = Arc::new(AtomicBool::new(false));
        let flag = subscribed.clone();
        let source = Observable::<i32>::create(move |observer| {
            flag.store(true, Ordering::SeqCst);
            observer.on_completed();
            rx_subscription::Subscription::empty()
        });
        let result = retry(&source, Some(0)).for_each(|_| {});
        assert!(result.is_ok());
        assert!(!subscribed.load(Ordering::SeqCst));
    }

    #[test]
    fn retry_resubscribes_up_to_the_limit() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let a = attempts.clone();
        let source = Observable::<i32>::create(move |observer| {
            a.fetch_add(1, Ordering::SeqCst);
            observer.on_error(RxError::callback("always fails"));
            rx_subscription::Subscription::empty()
        });
        let result = retry(&source, Some(2)).for_each(|_| {});
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test_case::test_case(None, 3; "unbounded retries against a source that succeeds on the third attempt")]
    #[test_case::test_case(Some(1), 1; "a single permitted attempt never gets to retry")]
    #[test_case::test_case(Some(5), 3; "a generous budget still stops once the source succeeds")]
    fn retry_stops_resubscribing_once_the_source_succeeds(max_retries: Option<usize>, succeeds_on_attempt: usize) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let a = attempts.clone();
        let source = Observable::<i32>::create(move |observer| {
            let attempt = a.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt >= succeeds_on_attempt {
                observer.on_next(attempt as i32);
                observer.on_completed();
            } else {
                observer.on_error(RxError::callback("not yet"));
            }
            rx_subscription::Subscription::empty()
        });

        let result = retry(&source, max_retries).for_each(|_| {});
        let expected_attempts = succeeds_on_attempt.min(max_retries.unwrap_or(succeeds_on_attempt));
        if expected_attempts >= succeeds_on_attempt {
            assert!(result.is_ok());
        } else {
            assert!(result.is_err());
        }
        assert_eq!(attempts.load(Ordering::SeqCst), expected_attempts);
    }
}
