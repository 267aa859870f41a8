//! The observer contract and the observable/producer skeleton: the subscription-time factory
//! that wires an observer to a source and returns a subscription handle, plus the handful of
//! source factories (`range`, `just`, `from_iterable`, ...) that every operator chain starts
//! from.

mod auto_detach;
mod factories;
mod notification;
mod observable;
mod observer;
mod producer;

pub use factories::{empty, from_iterable, interval, just, never, range, throw, using};
pub use notification::Notification;
pub use observable::Observable;
pub use observer::{unhandled_error_observer, AnonymousObserver, BoxObserver, Observer};
pub use producer::run_on_current_thread;
