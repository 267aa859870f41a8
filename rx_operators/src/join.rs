use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use rx_common::RxError;
use rx_observable::{BoxObserver, Observable};
use rx_subject::{GroupedObservable, GroupedSubject};
use rx_subscription::{CompositeSubscription, SerialSubscription, Subscription, SubscriptionLike};

use crate::support::{guarded, Sink};

/// Subscribes to every source eagerly and interleaves their notifications in arrival order.
/// Completion requires every source to complete; any source error terminates immediately and
/// unsubscribes the rest.
pub fn merge<T: Send + Sync + 'static>(sources: Vec<Observable<T>>) -> Observable<T> {
    Observable::create(move |observer: BoxObserver<T>| {
        let (sink, handle) = Sink::new(observer);
        if sources.is_empty() {
            sink.observer().on_completed();
            return handle;
        }
        let composite = CompositeSubscription::new();
        let remaining = Arc::new(AtomicUsize::new(sources.len()));
        for source in sources {
            let remaining = remaining.clone();
            let s_completed = sink.clone();
            let sub = source.subscribe_all(
                {
                    let s = sink.clone();
                    move |value| s.observer().on_next(value)
                },
                {
                    let s = sink.clone();
                    move |error| {
                        s.observer().on_error(error);
                        s.cancel_upstream();
                    }
                },
                move || {
                    if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                        s_completed.observer().on_completed();
                    }
                },
            );
            composite.add(sub);
        }
        sink.bind_upstream(Subscription::from_like(composite));
        handle
    })
}

fn try_finish_delay_error<T: Send + Sync + 'static>(
    sink: &Sink<T>,
    remaining: &AtomicUsize,
    errors: &Mutex<Vec<RxError>>,
) {
    if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
        let errs = std::mem::take(&mut *errors.lock());
        if errs.is_empty() {
            sink.observer().on_completed();
        } else {
            sink.observer().on_error(RxError::composite(errs));
        }
    }
}

/// Like [`merge`], but defers every source error until all sources have terminated, then
/// emits a single [`RxError::Composite`] carrying every collected error in arrival order.
pub fn merge_delay_error<T: Send + Sync + 'static>(sources: Vec<Observable<T>>) -> Observable<T> {
    Observable::create(move |observer: BoxObserver<T>| {
        let (sink, handle) = Sink::new(observer);
        if sources.is_empty() {
            sink.observer().on_completed();
            return handle;
        }
        let composite = CompositeSubscription::new();
        let remaining = Arc::new(AtomicUsize::new(sources.len()));
        let errors: Arc<Mutex<Vec<RxError>>> = Arc::new(Mutex::new(Vec::new()));
        for source in sources {
            let remaining = remaining.clone();
            let errors = errors.clone();
            let s_err = sink.clone();
            let s_completed = sink.clone();
            let remaining_err = remaining.clone();
            let errors_err = errors.clone();
            let sub = source.subscribe_all(
                {
                    let s = sink.clone();
                    move |value| s.observer().on_next(value)
                },
                move |error| {
                    errors_err.lock().push(error);
                    try_finish_delay_error(&s_err, &remaining_err, &errors_err);
                },
                move || try_finish_delay_error(&s_completed, &remaining, &errors),
            );
            composite.add(sub);
        }
        sink.bind_upstream(Subscription::from_like(composite));
        handle
    })
}

/// Subscribes to `sources` strictly sequentially: only once one source completes does the
/// next begin.
pub fn concat<T: Send + Sync + 'static>(sources: Vec<Observable<T>>) -> Observable<T> {
    Observable::create(move |observer: BoxObserver<T>| {
        let (sink, handle) = Sink::new(observer);
        let queue = Arc::new(Mutex::new(VecDeque::from(sources)));
        let serial = SerialSubscription::new();
        subscribe_next_concat(queue, sink.clone(), serial.clone());
        sink.bind_upstream(Subscription::from_like(serial));
        handle
    })
}

fn subscribe_next_concat<T: Send + Sync + 'static>(
    queue: Arc<Mutex<VecDeque<Observable<T>>>>,
    sink: Sink<T>,
    serial: SerialSubscription,
) {
    let next = queue.lock().pop_front();
    match next {
        None => sink.observer().on_completed(),
        Some(source) => {
            let q = queue.clone();
            let s_completed = sink.clone();
            let ser = serial.clone();
            let sub = source.subscribe_all(
                {
                    let s = sink.clone();
                    move |value| s.observer().on_next(value)
                },
                {
                    let s = sink.clone();
                    move |error| s.observer().on_error(error)
                },
                move || subscribe_next_concat(q, s_completed, ser),
            );
            serial.set(sub);
        }
    }
}

/// Prepends `prefix` ahead of `source`'s own notifications: equivalent to
/// `concat([from_iterable(prefix), source])`.
pub fn start_with<T: Send + Sync + 'static>(source: &Observable<T>, prefix: Vec<T>) -> Observable<T> {
    concat(vec![rx_observable::from_iterable(prefix, None), source.clone()])
}

struct ZipState<T> {
    queues: Vec<VecDeque<T>>,
    done: Vec<bool>,
}

impl<T> ZipState<T> {
    /// Whichever source is both done and drained makes the whole zip exhausted; its
    /// still-pending back-buffers (on other sources) are simply discarded.
    fn exhausted(&self) -> bool {
        self.queues.iter().zip(&self.done).any(|(q, done)| *done && q.is_empty())
    }

    fn pop_ready_tuple(&mut self) -> Option<Vec<T>> {
        if self.queues.iter().any(VecDeque::is_empty) {
            return None;
        }
        Some(self.queues.iter_mut().map(|q| q.pop_front().unwrap()).collect())
    }
}

/// Maintains one FIFO queue per source; whenever every queue holds at least one item, pops
/// one from each, applies `sel` to the full slice of values (in source order), and emits.
/// Completes as soon as any source completes and its own queue is empty.
pub fn zip<T, R, F>(sources: Vec<Observable<T>>, sel: F) -> Observable<R>
where
    T: Send + Sync + 'static,
    R: Send + Sync + 'static,
    F: Fn(Vec<T>) -> R + Send + Sync + 'static,
{
    let sel = Arc::new(sel);
    Observable::create(move |observer: BoxObserver<R>| {
        let (sink, handle) = Sink::new(observer);
        let count = sources.len();
        if count == 0 {
            sink.observer().on_completed();
            return handle;
        }
        let state = Arc::new(Mutex::new(ZipState {
            queues: (0..count).map(|_| VecDeque::new()).collect::<Vec<_>>(),
            done: vec![false; count],
        }));
        let finished = Arc::new(AtomicBool::new(false));

        fn drain<T, R, F>(state: &Mutex<ZipState<T>>, sink: &Sink<R>, sel: &F, finished: &AtomicBool)
        where
            R: Send + Sync + 'static,
            F: Fn(Vec<T>) -> R,
        {
            loop {
                let tuple = {
                    let mut st = state.lock();
                    st.pop_ready_tuple()
                };
                let Some(tuple) = tuple else { break };
                match guarded(|| sel(tuple)) {
                    Ok(value) => sink.observer().on_next(value),
                    Err(error) => {
                        if !finished.swap(true, Ordering::SeqCst) {
                            sink.observer().on_error(error);
                            sink.cancel_upstream();
                        }
                        return;
                    }
                }
            }
            let exhausted = state.lock().exhausted();
            if exhausted && !finished.swap(true, Ordering::SeqCst) {
                sink.observer().on_completed();
            }
        }

        let composite = CompositeSubscription::new();
        for (index, source) in sources.into_iter().enumerate() {
            let state_next = state.clone();
            let sink_next = sink.clone();
            let sel_next = sel.clone();
            let finished_next = finished.clone();
            let state_completed = state.clone();
            let sink_completed = sink.clone();
            let sel_completed = sel.clone();
            let finished_completed = finished.clone();
            let sink_err = sink.clone();
            let finished_err = finished.clone();
            let sub = source.subscribe_all(
                move |value| {
                    state_next.lock().queues[index].push_back(value);
                    drain(&state_next, &sink_next, sel_next.as_ref(), &finished_next);
                },
                move |error| {
                    if !finished_err.swap(true, Ordering::SeqCst) {
                        sink_err.observer().on_error(error);
                        sink_err.cancel_upstream();
                    }
                },
                move || {
                    state_completed.lock().done[index] = true;
                    drain(&state_completed, &sink_completed, sel_completed.as_ref(), &finished_completed);
                },
            );
            composite.add(sub);
        }

        sink.bind_upstream(Subscription::from_like(composite));
        handle
    })
}

struct CombineLatestState<T> {
    latest: Vec<Option<T>>,
    done: Vec<bool>,
}

impl<T: Clone> CombineLatestState<T> {
    fn snapshot_if_ready(&self) -> Option<Vec<T>> {
        self.latest.iter().cloned().collect()
    }
}

/// Stores the latest value from each source and emits `sel(latest...)` whenever any source
/// emits, once every source has produced at least one value. Completes only once all sources
/// have completed.
pub fn combine_latest<T, R, F>(sources: Vec<Observable<T>>, sel: F) -> Observable<R>
where
    T: Clone + Send + Sync + 'static,
    R: Send + Sync + 'static,
    F: Fn(Vec<T>) -> R + Send + Sync + 'static,
{
    let sel = Arc::new(sel);
    Observable::create(move |observer: BoxObserver<R>| {
        let (sink, handle) = Sink::new(observer);
        let count = sources.len();
        if count == 0 {
            sink.observer().on_completed();
            return handle;
        }
        let state = Arc::new(Mutex::new(CombineLatestState {
            latest: vec![None; count],
            done: vec![false; count],
        }));
        let finished = Arc::new(AtomicBool::new(false));
        let composite = CompositeSubscription::new();

        for (index, source) in sources.into_iter().enumerate() {
            let state_next = state.clone();
            let sink_next = sink.clone();
            let sel_next = sel.clone();
            let finished_next = finished.clone();
            let state_completed = state.clone();
            let sink_completed = sink.clone();
            let finished_completed = finished.clone();
            let sink_err = sink.clone();
            let finished_err = finished.clone();
            let sub = source.subscribe_all(
                move |value| {
                    let snapshot = {
                        let mut st = state_next.lock();
                        st.latest[index] = Some(value);
                        st.snapshot_if_ready()
                    };
                    if let Some(values) = snapshot {
                        match guarded(|| sel_next(values)) {
                            Ok(value) => sink_next.observer().on_next(value),
                            Err(error) => {
                                if !finished_next.swap(true, Ordering::SeqCst) {
                                    sink_next.observer().on_error(error);
                                    sink_next.cancel_upstream();
                                }
                            }
                        }
                    }
                },
                move |error| {
                    if !finished_err.swap(true, Ordering::SeqCst) {
                        sink_err.observer().on_error(error);
                        sink_err.cancel_upstream();
                    }
                },
                move || {
                    let all_done = {
                        let mut st = state_completed.lock();
                        st.done[index] = true;
                        st.done.iter().all(|d| *d)
                    };
                    if all_done && !finished_completed.swap(true, Ordering::SeqCst) {
                        sink_completed.observer().on_completed();
                    }
                },
            );
            composite.add(sub);
        }

        sink.bind_upstream(Subscription::from_like(composite));
        handle
    })
}

/// For each outer `x`, subscribes to `coll_sel(x)` and emits `res_sel(x, y)` for every inner
/// `y`; inner subscriptions are merged (run concurrently). Completes once the outer source
/// has completed and every inner subscription it spawned has completed.
pub fn select_many<T, U, R, CF, RF>(source: &Observable<T>, coll_sel: CF, res_sel: RF) -> Observable<R>
where
    T: Clone + Send + Sync + 'static,
    U: Send + Sync + 'static,
    R: Send + Sync + 'static,
    CF: Fn(T) -> Observable<U> + Send + Sync + 'static,
    RF: Fn(T, U) -> R + Send + Sync + 'static,
{
    let source = source.clone();
    let coll_sel = Arc::new(coll_sel);
    let res_sel = Arc::new(res_sel);
    Observable::create(move |observer: BoxObserver<R>| {
        let (sink, handle) = Sink::new(observer);
        let composite = CompositeSubscription::new();
        let outstanding = Arc::new(AtomicUsize::new(1)); // the outer subscription counts as one
        let outer_done = Arc::new(AtomicBool::new(false));

        let check_done = {
            let sink = sink.clone();
            let outstanding = outstanding.clone();
            move || {
                if outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
                    sink.observer().on_completed();
                }
            }
        };

        let coll_sel_outer = coll_sel.clone();
        let res_sel_outer = res_sel.clone();
        let composite_outer = composite.clone();
        let outstanding_outer = outstanding.clone();
        let sink_outer = sink.clone();
        let check_done_outer = check_done.clone();
        let outer_sub = source.subscribe_all(
            move |x: T| {
                let inner = match guarded(|| coll_sel_outer(x.clone())) {
                    Ok(inner) => inner,
                    Err(error) => {
                        sink_outer.observer().on_error(error);
                        sink_outer.cancel_upstream();
                        return;
                    }
                };
                outstanding_outer.fetch_add(1, Ordering::SeqCst);
                let res_sel = res_sel_outer.clone();
                let sink_inner = sink_outer.clone();
                let check_done_inner = check_done_outer.clone();
                let x_for_error = x.clone();
                let inner_sub = inner.subscribe_all(
                    move |y| match guarded(|| res_sel(x.clone(), y)) {
                        Ok(value) => sink_inner.observer().on_next(value),
                        Err(error) => {
                            sink_inner.observer().on_error(error);
                            sink_inner.cancel_upstream();
                        }
                    },
                    {
                        let sink = sink_outer.clone();
                        move |error| {
                            let _ = &x_for_error;
                            sink.observer().on_error(error);
                            sink.cancel_upstream();
                        }
                    },
                    check_done_inner,
                );
                composite_outer.add(inner_sub);
            },
            {
                let sink = sink.clone();
                move |error| {
                    sink.observer().on_error(error);
                    sink.cancel_upstream();
                }
            },
            {
                let outer_done = outer_done.clone();
                move || {
                    outer_done.store(true, Ordering::SeqCst);
                    check_done();
                }
            },
        );
        composite.add(outer_sub);

        sink.bind_upstream(Subscription::from_like(composite));
        handle
    })
}

struct ConcatMapState<T> {
    queue: VecDeque<T>,
    active: bool,
    outer_done: bool,
}

/// Like [`select_many`], but inner subscriptions are serialized: only one inner observable is
/// active at a time, in outer-arrival order.
pub fn concat_map<T, U, R, CF, RF>(source: &Observable<T>, coll_sel: CF, res_sel: RF) -> Observable<R>
where
    T: Clone + Send + Sync + 'static,
    U: Send + Sync + 'static,
    R: Send + Sync + 'static,
    CF: Fn(T) -> Observable<U> + Send + Sync + 'static,
    RF: Fn(T, U) -> R + Send + Sync + 'static,
{
    let source = source.clone();
    let coll_sel = Arc::new(coll_sel);
    let res_sel = Arc::new(res_sel);
    Observable::create(move |observer: BoxObserver<R>| {
        let (sink, handle) = Sink::new(observer);
        let state: Arc<Mutex<ConcatMapState<T>>> =
            Arc::new(Mutex::new(ConcatMapState { queue: VecDeque::new(), active: false, outer_done: false }));
        let serial = SerialSubscription::new();

        let coll_sel_for_outer = coll_sel.clone();
        let res_sel_for_outer = res_sel.clone();
        let sink_for_outer = sink.clone();
        let state_for_outer = state.clone();
        let serial_for_outer = serial.clone();
        let outer_sub = source.subscribe_all(
            move |x: T| {
                let start = {
                    let mut st = state_for_outer.lock();
                    if st.active {
                        st.queue.push_back(x);
                        None
                    } else {
                        st.active = true;
                        Some(x)
                    }
                };
                if let Some(x) = start {
                    start_concat_map_item(
                        x,
                        state_for_outer.clone(),
                        sink_for_outer.clone(),
                        coll_sel_for_outer.clone(),
                        res_sel_for_outer.clone(),
                        serial_for_outer.clone(),
                    );
                }
            },
            {
                let sink = sink.clone();
                move |error| {
                    sink.observer().on_error(error);
                    sink.cancel_upstream();
                }
            },
            {
                let state = state.clone();
                let sink = sink.clone();
                move || {
                    let fire = {
                        let mut st = state.lock();
                        st.outer_done = true;
                        !st.active && st.queue.is_empty()
                    };
                    if fire {
                        sink.observer().on_completed();
                    }
                }
            },
        );

        let composite = CompositeSubscription::new();
        composite.add(outer_sub);
        composite.add(Subscription::from_like(serial));
        sink.bind_upstream(Subscription::from_like(composite));
        handle
    })
}

/// Subscribes to `coll_sel(x)` and, once it completes, either starts the next queued item or
/// marks the pipeline idle (completing the whole chain if the outer source already finished).
fn start_concat_map_item<T, U, R, CF, RF>(
    x: T,
    state: Arc<Mutex<ConcatMapState<T>>>,
    sink: Sink<R>,
    coll_sel: Arc<CF>,
    res_sel: Arc<RF>,
    serial: SerialSubscription,
) where
    T: Clone + Send + Sync + 'static,
    U: Send + Sync + 'static,
    R: Send + Sync + 'static,
    CF: Fn(T) -> Observable<U> + Send + Sync + 'static,
    RF: Fn(T, U) -> R + Send + Sync + 'static,
{
    let inner = match guarded(|| coll_sel(x.clone())) {
        Ok(inner) => inner,
        Err(error) => {
            sink.observer().on_error(error);
            sink.cancel_upstream();
            return;
        }
    };

    let sink_for_next = sink.clone();
    let res_sel_for_next = res_sel.clone();
    let x_for_next = x.clone();

    let sink_for_completed = sink.clone();
    let state_for_completed = state.clone();
    let coll_sel_for_completed = coll_sel.clone();
    let res_sel_for_completed = res_sel.clone();
    let serial_for_completed = serial.clone();

    let inner_sub = inner.subscribe_all(
        move |y| match guarded(|| res_sel_for_next(x_for_next.clone(), y)) {
            Ok(value) => sink_for_next.observer().on_next(value),
            Err(error) => {
                sink_for_next.observer().on_error(error);
                sink_for_next.cancel_upstream();
            }
        },
        {
            let sink = sink.clone();
            move |error| {
                sink.observer().on_error(error);
                sink.cancel_upstream();
            }
        },
        move || {
            let next_item = {
                let mut st = state_for_completed.lock();
                match st.queue.pop_front() {
                    some @ Some(_) => some,
                    None => {
                        st.active = false;
                        None
                    }
                }
            };
            match next_item {
                Some(next_x) => start_concat_map_item(
                    next_x,
                    state_for_completed.clone(),
                    sink_for_completed.clone(),
                    coll_sel_for_completed.clone(),
                    res_sel_for_completed.clone(),
                    serial_for_completed.clone(),
                ),
                None => {
                    let done = state_for_completed.lock().outer_done;
                    if done {
                        sink_for_completed.observer().on_completed();
                    }
                }
            }
        },
    );
    serial.set(inner_sub);
}

/// Takes an observable-of-observables; on each outer value, unsubscribes any previous inner
/// observable and subscribes to the new one, emitting only from the current inner.
pub fn switch_on_next<T: Send + Sync + 'static>(source: &Observable<Observable<T>>) -> Observable<T> {
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<T>| {
        let (sink, handle) = Sink::new(observer);
        let inner_serial = SerialSubscription::new();
        let outer_done = Arc::new(AtomicBool::new(false));
        let inner_active = Arc::new(AtomicBool::new(false));

        let sink_for_outer = sink.clone();
        let inner_serial_for_outer = inner_serial.clone();
        let outer_done_for_outer = outer_done.clone();
        let inner_active_for_outer = inner_active.clone();
        let outer_sub = source.subscribe_all(
            move |inner: Observable<T>| {
                inner_active_for_outer.store(true, Ordering::SeqCst);
                let sink_inner = sink_for_outer.clone();
                let outer_done_inner = outer_done_for_outer.clone();
                let inner_active_inner = inner_active_for_outer.clone();
                let inner_sub = inner.subscribe_all(
                    {
                        let sink = sink_inner.clone();
                        move |value| sink.observer().on_next(value)
                    },
                    {
                        let sink = sink_inner.clone();
                        move |error| {
                            sink.observer().on_error(error);
                            sink.cancel_upstream();
                        }
                    },
                    move || {
                        inner_active_inner.store(false, Ordering::SeqCst);
                        if outer_done_inner.load(Ordering::SeqCst) {
                            sink_inner.observer().on_completed();
                        }
                    },
                );
                inner_serial_for_outer.set(inner_sub);
            },
            {
                let sink = sink.clone();
                move |error| {
                    sink.observer().on_error(error);
                    sink.cancel_upstream();
                }
            },
            {
                let sink = sink.clone();
                let inner_active = inner_active.clone();
                move || {
                    outer_done.store(true, Ordering::SeqCst);
                    if !inner_active.load(Ordering::SeqCst) {
                        sink.observer().on_completed();
                    }
                }
            },
        );

        let composite = CompositeSubscription::new();
        composite.add(outer_sub);
        composite.add(Subscription::from_like(inner_serial));
        sink.bind_upstream(Subscription::from_like(composite));
        handle
    })
}

/// Routes each input into a grouped subject keyed by `key_fn`; the outer observable emits a
/// new [`GroupedObservable`] the first time each distinct key is seen, in first-seen order;
/// within a group, items arrive in their original order.
pub fn group_by<T, K, F>(source: &Observable<T>, key_fn: F) -> Observable<GroupedObservable<K, T>>
where
    T: Clone + Send + Sync + 'static,
    K: Clone + Eq + Hash + Send + Sync + 'static,
    F: Fn(&T) -> K + Send + Sync + 'static,
{
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<GroupedObservable<K, T>>| {
        let (sink, handle) = Sink::new(observer);
        let groups: Arc<Mutex<HashMap<K, GroupedSubject<K, T>>>> = Arc::new(Mutex::new(HashMap::new()));

        let groups_next = groups.clone();
        let sink_next = sink.clone();
        let groups_completed = groups.clone();
        let sink_completed = sink.clone();
        let groups_err = groups.clone();
        let sink_err = sink.clone();

        let upstream = source.subscribe_all(
            move |value: T| {
                let key = match guarded(|| key_fn(&value)) {
                    Ok(key) => key,
                    Err(error) => {
                        let map = std::mem::take(&mut *groups_next.lock());
                        for (_, group) in map {
                            group.as_observer().on_error(error.clone());
                        }
                        sink_next.observer().on_error(error);
                        sink_next.cancel_upstream();
                        return;
                    }
                };
                let (group, is_new) = {
                    let mut map = groups_next.lock();
                    if let Some(existing) = map.get(&key) {
                        (existing.clone(), false)
                    } else {
                        let created = GroupedSubject::new(key.clone());
                        map.insert(key.clone(), created.clone());
                        (created, true)
                    }
                };
                if is_new {
                    sink_next.observer().on_next(group.as_observable());
                }
                group.as_observer().on_next(value);
            },
            move |error: RxError| {
                let map = std::mem::take(&mut *groups_err.lock());
                for (_, group) in map {
                    group.as_observer().on_error(error.clone());
                }
                sink_err.observer().on_error(error);
            },
            move || {
                let map = std::mem::take(&mut *groups_completed.lock());
                for (_, group) in map {
                    group.as_observer().on_completed();
                }
                sink_completed.observer().on_completed();
            },
        );
        sink.bind_upstream(upstream);
        handle
    })
}
