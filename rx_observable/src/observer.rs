use std::sync::Mutex;

use rx_common::RxError;

/// A sink over value type `T`. **Termination invariant**: after the first `on_error` or
/// `on_completed`, no further signals may be delivered through this observer.
///
/// Implementations take `&self` rather than `&mut self` because observers are shared (via
/// `Arc`/`Box`) across subscription boundaries and, for subjects, across threads; any
/// per-call mutable state lives behind interior mutability.
pub trait Observer<T>: Send + Sync {
    fn on_next(&self, value: T);
    fn on_error(&self, error: RxError);
    fn on_completed(&self);
}

/// A type-erased observer, boxed at subscription and subject boundaries as the design notes
/// prescribe ("a forget-type operation materializes a boxed observable/observer at
/// subscription edges").
pub type BoxObserver<T> = Box<dyn Observer<T> + Send + Sync>;

/// An observer built from three closures, for the common case of `subscribe(on_next, ...)`
/// calls that never name a concrete observer type.
pub struct AnonymousObserver<T> {
    on_next: Mutex<Box<dyn FnMut(T) + Send>>,
    on_error: Mutex<Box<dyn FnMut(RxError) + Send>>,
    on_completed: Mutex<Box<dyn FnMut() + Send>>,
}

impl<T> AnonymousObserver<T> {
    pub fn new(
        on_next: impl FnMut(T) + Send + 'static,
        on_error: impl FnMut(RxError) + Send + 'static,
        on_completed: impl FnMut() + Send + 'static,
    ) -> Self {
        AnonymousObserver {
            on_next: Mutex::new(Box::new(on_next)),
            on_error: Mutex::new(Box::new(on_error)),
            on_completed: Mutex::new(Box::new(on_completed)),
        }
    }
}

impl<T: Send> Observer<T> for AnonymousObserver<T> {
    fn on_next(&self, value: T) {
        (self.on_next.lock().unwrap())(value);
    }

    fn on_error(&self, error: RxError) {
        (self.on_error.lock().unwrap())(error);
    }

    fn on_completed(&self) {
        (self.on_completed.lock().unwrap())();
    }
}

/// The observer used when the caller only cares about values and wants unhandled errors to
/// become an unhandled-error abort, per the spec's "never silently drop" rule.
pub fn unhandled_error_observer<T: Send + 'static>(
    on_next: impl FnMut(T) + Send + 'static,
) -> BoxObserver<T> {
    Box::new(AnonymousObserver::new(on_next, |error| {
        panic!("unhandled error reached the root observer: {error}");
    }, || {}))
}
