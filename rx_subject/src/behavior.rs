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
    latest: T,
    terminal: Option<Terminal>,
    observers: Vec<(u64, ArcObserver<T>)>,
    next_id: u64,
}

/// A subject that retains the most recent value and replays it to every new subscriber
/// before continuing with live values.
pub struct BehaviorSubject<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T> Clone for BehaviorSubject<T> {
    fn clone(&self) -> Self {
        BehaviorSubject { state: self.state.clone() }
    }
}

impl<T: Clone + Send + Sync + 'static> BehaviorSubject<T> {
    pub fn new(initial: T) -> Self {
        BehaviorSubject {
            state: Arc::new(Mutex::new(State {
                latest: initial,
                terminal: None,
                observers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// The most recently observed value (or the initial one, if none has arrived yet).
    pub fn value(&self) -> T {
        self.state.lock().latest.clone()
    }

    pub fn as_observer(&self) -> BoxObserver<T> {
        Box::new(self.clone())
    }

    pub fn as_observable(&self) -> Observable<T> {
        let subject = self.clone();
        Observable::create(move |observer: BoxObserver<T>| subject.subscribe_internal(observer))
    }

    fn subscribe_internal(&self, observer: BoxObserver<T>) -> Subscription {
        let observer: ArcObserver<T> = Arc::from(observer);

        // Snapshot state and latest value atomically, then deliver outside the lock.
        let (latest, terminal, id) = {
            let mut state = self.state.lock();
            let latest = state.latest.clone();
            match &state.terminal {
                Some(Terminal::Completed) => (latest, Some(Terminal::Completed), None),
                Some(Terminal::Error(e)) => (latest, Some(Terminal::Error(e.clone())), None),
                None => {
                    let id = state.next_id;
                    state.next_id += 1;
                    state.observers.push((id, observer.clone()));
                    (latest, None, Some(id))
                }
            }
        };

        observer.on_next(latest);
        match terminal {
            Some(Terminal::Completed) => {
                observer.on_completed();
                return Subscription::empty();
            }
            Some(Terminal::Error(e)) => {
                observer.on_error(e);
                return Subscription::empty();
            }
            None => {}
        }

        let id = id.expect("forwarding state always assigns an id");
        let weak_state = Arc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = weak_state.upgrade() {
                state.lock().observers.retain(|(o, _)| *o != id);
            }
        })
    }
}

impl<T: Clone + Send + Sync + 'static> Observer<T> for BehaviorSubject<T> {
    fn on_next(&self, value: T) {
        let snapshot = {
            let mut state = self.state.lock();
            if state.terminal.is_some() {
                return;
            }
            state.latest = value.clone();
            state.observers.clone()
        };
        for (_, observer) in snapshot {
            observer.on_next(value.clone());
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
