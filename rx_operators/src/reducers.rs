use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use rx_common::RxError;
use rx_observable::{BoxObserver, Observable};

use crate::support::{guarded, Sink};

/// Folds the source into a single `acc(seed, ...)` value, emitted only once the source
/// completes. A panic inside `acc` surfaces as `on_error` and unsubscribes.
pub fn aggregate<T, ACC, F>(source: &Observable<T>, seed: ACC, acc: F) -> Observable<ACC>
where
    T: Send + Sync + 'static,
    ACC: Clone + Send + Sync + 'static,
    F: Fn(ACC, T) -> ACC + Send + Sync + 'static,
{
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<ACC>| {
        let (sink, handle) = Sink::new(observer);
        let state = std::sync::Arc::new(Mutex::new(seed.clone()));
        let state_for_completed = state.clone();
        let s = sink.clone();
        let upstream = source.subscribe_all(
            move |value| {
                let mut state = state.lock();
                match guarded(|| acc(state.clone(), value)) {
                    Ok(next) => *state = next,
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
                move || {
                    s.observer().on_next(state_for_completed.lock().clone());
                    s.observer().on_completed();
                }
            },
        );
        sink.bind_upstream(upstream);
        handle
    })
}

/// The number of values the source emitted before completing.
pub fn count<T: Send + Sync + 'static>(source: &Observable<T>) -> Observable<usize> {
    aggregate(source, 0usize, |n, _| n + 1)
}

/// The sum of every value the source emits.
pub fn sum<T>(source: &Observable<T>) -> Observable<T>
where
    T: Copy + Default + std::ops::Add<Output = T> + Send + Sync + 'static,
{
    aggregate(source, T::default(), |a, b| a + b)
}

fn extremum<T, F>(source: &Observable<T>, better: F) -> Observable<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<T>| {
        let (sink, handle) = Sink::new(observer);
        let state: std::sync::Arc<Mutex<Option<T>>> = std::sync::Arc::new(Mutex::new(None));
        let state_for_completed = state.clone();
        let better = better;
        let s = sink.clone();
        let upstream = source.subscribe_all(
            move |value| {
                let mut state = state.lock();
                let replace = match state.as_ref() {
                    None => Ok(true),
                    Some(current) => guarded(|| better(&value, current)),
                };
                match replace {
                    Ok(true) => *state = Some(value),
                    Ok(false) => {}
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
                move || match state_for_completed.lock().take() {
                    Some(value) => {
                        s.observer().on_next(value);
                        s.observer().on_completed();
                    }
                    None => s.observer().on_error(RxError::EmptySequence),
                }
            },
        );
        sink.bind_upstream(upstream);
        handle
    })
}

/// The smallest value the source emits, or `EmptySequence` if it emits none.
pub fn min<T: Clone + PartialOrd + Send + Sync + 'static>(source: &Observable<T>) -> Observable<T> {
    extremum(source, |candidate, current| candidate < current)
}

/// The largest value the source emits, or `EmptySequence` if it emits none.
pub fn max<T: Clone + PartialOrd + Send + Sync + 'static>(source: &Observable<T>) -> Observable<T> {
    extremum(source, |candidate, current| candidate > current)
}

/// The value at `index` (0-based), or `IndexOutOfRange` if the source completes first.
pub fn element_at<T: Send + Sync + 'static>(source: &Observable<T>, index: usize) -> Observable<T> {
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<T>| {
        let (sink, handle) = Sink::new(observer);
        let remaining = AtomicUsize::new(index);
        let s = sink.clone();
        let upstream = source.subscribe_all(
            move |value| {
                if remaining.load(Ordering::SeqCst) == 0 {
                    s.observer().on_next(value);
                    s.observer().on_completed();
                    s.cancel_upstream();
                } else {
                    remaining.fetch_sub(1, Ordering::SeqCst);
                }
            },
            {
                let s = sink.clone();
                move |error| s.observer().on_error(error)
            },
            {
                let s = sink.clone();
                move || s.observer().on_error(RxError::IndexOutOfRange(index))
            },
        );
        sink.bind_upstream(upstream);
        handle
    })
}

/// The first value the source emits, or `EmptySequence` if it completes without emitting.
pub fn first<T: Send + Sync + 'static>(source: &Observable<T>) -> Observable<T> {
    element_at(source, 0)
}

/// The last value the source emits, or `EmptySequence` if it completes without emitting.
pub fn last<T: Send + Sync + 'static>(source: &Observable<T>) -> Observable<T> {
    extremum(source, |_, _| true)
}

/// `true` as soon as any value satisfies `pred` (short-circuiting); `false` on completion
/// without a match.
pub fn any<T, P>(source: &Observable<T>, pred: P) -> Observable<bool>
where
    T: Send + Sync + 'static,
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<bool>| {
        let (sink, handle) = Sink::new(observer);
        let s = sink.clone();
        let upstream = source.subscribe_all(
            move |value| match guarded(|| pred(&value)) {
                Ok(true) => {
                    s.observer().on_next(true);
                    s.observer().on_completed();
                    s.cancel_upstream();
                }
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
                move || {
                    s.observer().on_next(false);
                    s.observer().on_completed();
                }
            },
        );
        sink.bind_upstream(upstream);
        handle
    })
}

/// `false` as soon as any value fails `pred` (short-circuiting); `true` on completion with no
/// failures.
pub fn all<T, P>(source: &Observable<T>, pred: P) -> Observable<bool>
where
    T: Send + Sync + 'static,
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<bool>| {
        let (sink, handle) = Sink::new(observer);
        let s = sink.clone();
        let upstream = source.subscribe_all(
            move |value| match guarded(|| pred(&value)) {
                Ok(false) => {
                    s.observer().on_next(false);
                    s.observer().on_completed();
                    s.cancel_upstream();
                }
                Ok(true) => {}
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
                move || {
                    s.observer().on_next(true);
                    s.observer().on_completed();
                }
            },
        );
        sink.bind_upstream(upstream);
        handle
    })
}

/// `true` if the source ever emits `target`.
pub fn contains<T>(source: &Observable<T>, target: T) -> Observable<bool>
where
    T: PartialEq + Send + Sync + 'static,
{
    any(source, move |value| value == &target)
}

/// Buffers every value into a `Vec<T>`, emitted once on completion.
pub fn to_vector<T>(source: &Observable<T>) -> Observable<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    aggregate(source, Vec::new(), |mut acc, value| {
        acc.push(value);
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx_observable::from_iterable;

    #[test]
    fn count_counts_every_value() {
        let result = {
            let mut total = None;
            count(&from_iterable(vec![1, 2, 3], None)).subscribe(move |n| total = Some(n));
            total
        };
        assert_eq!(result, Some(3));
    }

    #[test]
    fn sum_adds_every_value() {
        let mut total = None;
        sum(&from_iterable(vec![1, 2, 3, 4], None)).subscribe(move |n| total = Some(n));
        assert_eq!(total, Some(10));
    }

    #[test]
    fn min_and_max_of_a_sequence() {
        let mut lo = None;
        let mut hi = None;
        min(&from_iterable(vec![5, 1, 3], None)).subscribe(move |n| lo = Some(n));
        max(&from_iterable(vec![5, 1, 3], None)).subscribe(move |n| hi = Some(n));
        assert_eq!(lo, Some(1));
        assert_eq!(hi, Some(5));
    }

    #[test]
    fn first_on_empty_source_errors() {
        let result = first(&rx_observable::empty::<i32>(None)).for_each(|_| {});
        assert!(matches!(result, Err(RxError::EmptySequence)));
    }

    #[test]
    fn element_at_out_of_range_errors() {
        let result = element_at(&from_iterable(vec![1, 2], None), 5).for_each(|_| {});
        assert!(matches!(result, Err(RxError::IndexOutOfRange(5))));
    }

    #[test]
    fn any_short_circuits_on_first_match() {
        let mut result = None;
        any(&from_iterable(1..=10, None), |x| *x == 3).subscribe(move |b| result = Some(b));
        assert_eq!(result, Some(true));
    }

    #[test]
    fn contains_checks_equality() {
        let mut result = None;
        contains(&from_iterable(vec!["a", "b", "c"], None), "b").subscribe(move |b| result = Some(b));
        assert_eq!(result, Some(true));
    }

    #[test]
    fn to_vector_buffers_every_value_until_completion() {
        let mut result = None;
        to_vector(&from_iterable(vec![1, 2, 3], None)).subscribe(move |v| result = Some(v));
        assert_eq!(result, Some(vec![1, 2, 3]));
    }

    #[test]
    fn aggregate_accumulator_panic_surfaces_as_error() {
        let result = aggregate(&from_iterable(vec![1, 2, 3], None), 0, |_, x| {
            if x == 2 {
                panic!("acc boom");
            }
            x
        })
        .for_each(|_| {});
        assert!(matches!(result, Err(RxError::Callback(_))));
    }

    #[test]
    fn extremum_comparator_panic_surfaces_as_error() {
        let result = extremum(&from_iterable(vec![1, 2, 3], None), |_candidate, _current| panic!("cmp boom"))
            .for_each(|_| {});
        assert!(matches!(result, Err(RxError::Callback(_))));
    }

    #[test]
    fn any_predicate_panic_surfaces_as_error() {
        let result = any(&from_iterable(vec![1, 2, 3], None), |x| {
            if *x == 2 {
                panic!("pred boom");
            }
            false
        })
        .for_each(|_| {});
        assert!(matches!(result, Err(RxError::Callback(_))));
    }

    #[test]
    fn all_predicate_panic_surfaces_as_error() {
        let result = all(&from_iterable(vec![1, 2, 3], None), |x| {
            if *x == 2 {
                panic!("pred boom");
            }
            true
        })
        .for_each(|_| {});
        assert!(matches!(result, Err(RxError::Callback(_))));
    }
}
