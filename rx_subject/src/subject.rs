use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use rx_common::{panic_message, RxError};
use rx_observable::{BoxObserver, Observable, Observer};
use rx_subscription::{Subscription, SubscriptionLike};

type ArcObserver<T> = Arc<dyn Observer<T> + Send + Sync>;

enum Terminal {
    Completed,
    Error(RxError),
}

struct State<T> {
    terminal: Option<Terminal>,
    observers: Vec<(u64, ArcObserver<T>)>,
    next_id: u64,
}

impl<T> State<T> {
    fn new() -> Self {
        State { terminal: None, observers: Vec::new(), next_id: 0 }
    }
}

/// An entity that is both an observer and an observable. Values received after a downstream
/// observer subscribes are multicast to it; values received before are lost to it, as with
/// any hot source. `subscribe` after the subject has terminated immediately delivers the
/// terminal notification instead of enrolling the observer.
///
/// If a single observer panics while being delivered a value, only that observer receives
/// `on_error` and is dropped from the subject's list — delivery continues to every other
/// observer undisturbed, per the spec's chosen resolution of the ambiguous source behavior.
pub struct Subject<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Subject { state: self.state.clone() }
    }
}

impl<T> Subject<T> {
    pub fn new() -> Self {
        Subject { state: Arc::new(Mutex::new(State::new())) }
    }
}

impl<T> Default for Subject<T> {
    fn default() -> Self {
        Subject::new()
    }
}

impl<T: Clone + Send + Sync + 'static> Subject<T> {
    /// This subject as an observer, for feeding it from a source via `subscribe_observer`.
    pub fn as_observer(&self) -> BoxObserver<T> {
        Box::new(self.clone())
    }

    /// This subject as an observable, for downstream subscribers.
    pub fn as_observable(&self) -> Observable<T> {
        let subject = self.clone();
        Observable::create(move |observer: BoxObserver<T>| subject.subscribe_internal(observer))
    }

    fn subscribe_internal(&self, observer: BoxObserver<T>) -> Subscription {
        let observer: ArcObserver<T> = Arc::from(observer);
        let mut state = self.state.lock();
        match &state.terminal {
            Some(Terminal::Completed) => {
                drop(state);
                observer.on_completed();
                Subscription::empty()
            }
            Some(Terminal::Error(error)) => {
                let error = error.clone();
                drop(state);
                observer.on_error(error);
                Subscription::empty()
            }
            None => {
                let id = state.next_id;
                state.next_id += 1;
                state.observers.push((id, observer));
                drop(state);
                let weak_state = Arc::downgrade(&self.state);
                Subscription::new(move || {
                    if let Some(state) = weak_state.upgrade() {
                        state.lock().observers.retain(|(o, _)| *o != id);
                    }
                })
            }
        }
    }

    fn remove(&self, id: u64) {
        self.state.lock().observers.retain(|(o, _)| *o != id);
    }
}

impl<T: Clone + Send + Sync + 'static> Observer<T> for Subject<T> {
    fn on_next(&self, value: T) {
        let snapshot: Vec<(u64, ArcObserver<T>)> = {
            let state = self.state.lock();
            if state.terminal.is_some() {
                return;
            }
            state.observers.clone()
        };
        for (id, observer) in snapshot {
            let value = value.clone();
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| observer.on_next(value))) {
                let message = panic_message(payload);
                log::warn!("subject observer {} panicked on_next, removing it: {}", id, message);
                let _ = panic::catch_unwind(AssertUnwindSafe(|| {
                    observer.on_error(RxError::callback(message))
                }));
                self.remove(id);
            }
        }
    }

    fn on_error(&self, error: RxError) {
        let observers = {
            let mut state = self.state.lock();
            if state.terminal.is_some() {
                return;
            }
            state.terminal = Some(Terminal::Error(error.clone()));
            std::mem::take(&mut state.observers)
        };
        for (_, observer) in observers {
            observer.on_error(error.clone());
        }
    }

    fn on_completed(&self) {
        let observers = {
            let mut state = self.state.lock();
            if state.terminal.is_some() {
                return;
            }
            state.terminal = Some(Terminal::Completed);
            std::mem::take(&mut state.observers)
        };
        for (_, observer) in observers {
            observer.on_completed();
        }
    }
}
