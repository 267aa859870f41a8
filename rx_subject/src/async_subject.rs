use std::sync::Arc;

use parking_lot::Mutex;

use rx_common::RxError;
use rx_observable::{BoxObserver, Observable, Observer};
use rx_subscription::{Subscription, SubscriptionLike};

type ArcObserver<T> = Arc<dyn Observer<T> + Send + Sync>;

enum Terminal {
    Completed,
    Error(RxError),
}

struct State<T> {
    last_value: Option<T>,
    terminal: Option<Terminal>,
    observers: Vec<(u64, ArcObserver<T>)>,
    next_id: u64,
}

/// A subject that retains only the final value and emits it, on completion, to every
/// observer subscribed at that moment and to every observer that subscribes afterward — the
/// terminal state is never cleared. An error discards the retained value.
pub struct AsyncSubject<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T> Clone for AsyncSubject<T> {
    fn clone(&self) -> Self {
        AsyncSubject { state: self.state.clone() }
    }
}

impl<T> AsyncSubject<T> {
    pub fn new() -> Self {
        AsyncSubject {
            state: Arc::new(Mutex::new(State {
                last_value: None,
                terminal: None,
                observers: Vec::new(),
                next_id: 0,
            })),
        }
    }
}

impl<T> Default for AsyncSubject<T> {
    fn default() -> Self {
        AsyncSubject::new()
    }
}

impl<T: Clone + Send + Sync + 'static> AsyncSubject<T> {
    pub fn as_observer(&self) -> BoxObserver<T> {
        Box::new(self.clone())
    }

    pub fn as_observable(&self) -> Observable<T> {
        let subject = self.clone();
        Observable::create(move |observer: BoxObserver<T>| subject.subscribe_internal(observer))
    }

    fn subscribe_internal(&self, observer: BoxObserver<T>) -> Subscription {
        let observer: ArcObserver<T> = Arc::from(observer);
        let mut state = self.state.lock();
        match &state.terminal {
            Some(Terminal::Completed) => {
                let value = state.last_value.clone();
                drop(state);
                if let Some(value) = value {
                    observer.on_next(value);
                }
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
}

impl<T: Clone + Send + Sync + 'static> Observer<T> for AsyncSubject<T> {
    fn on_next(&self, value: T) {
        let mut state = self.state.lock();
        if state.terminal.is_some() {
            return;
        }
        state.last_value = Some(value);
    }

    fn on_error(&self, error: RxError) {
        let observers = {
            let mut state = self.state.lock();
            if state.terminal.is_some() {
                return;
            }
            state.last_value = None;
            state.terminal = Some(Terminal::Error(error.clone()));
            std::mem::take(&mut state.observers)
        };
        for (_, observer) in observers {
            observer.on_error(error.clone());
        }
    }

    fn on_completed(&self) {
        let (value, observers) = {
            let mut state = self.state.lock();
            if state.terminal.is_some() {
                return (None, Vec::new());
            }
            state.terminal = Some(Terminal::Completed);
            (state.last_value.clone(), std::mem::take(&mut state.observers))
        };
        for (_, observer) in observers {
            if let Some(value) = value.clone() {
                observer.on_next(value);
            }
            observer.on_completed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn emits_only_the_final_value_on_completion() {
        let subject = AsyncSubject::new();
        let received = Arc::new(StdMutex::new(Vec::new()));
        let r = received.clone();
        subject.as_observable().subscribe(move |v| r.lock().unwrap().push(v));

        subject.on_next(1);
        subject.on_next(2);
        subject.on_next(3);
        subject.on_completed();

        assert_eq!(*received.lock().unwrap(), vec![3]);
    }

    #[test]
    fn future_subscribers_after_completion_still_see_the_final_value() {
        let subject = AsyncSubject::new();
        subject.on_next(10);
        subject.on_completed();

        let received = Arc::new(StdMutex::new(Vec::new()));
        let r = received.clone();
        subject.as_observable().subscribe(move |v| r.lock().unwrap().push(v));
        assert_eq!(*received.lock().unwrap(), vec![10]);
    }

    #[test]
    fn error_discards_the_retained_value() {
        let subject = AsyncSubject::<i32>::new();
        subject.on_next(10);
        subject.on_error(RxError::callback("boom"));

        let result = subject.as_observable().for_each(|_| {});
        assert!(result.is_err());
    }
}
