use std::sync::atomic::{AtomicBool, Ordering};

use rx_common::RxError;
use rx_subscription::{SerialSubscription, SubscriptionLike};

use crate::observer::{BoxObserver, Observer};

/// Wraps a downstream observer and the (not yet known, hence serial) subscription that
/// guards it. The first terminal call flips `terminated`, forwards to the downstream
/// observer, then unsubscribes; every call after that — terminal or not — is a no-op.
/// Re-entrant terminal calls made from within `on_next` are safe for the same reason.
pub struct AutoDetachObserver<T> {
    downstream: BoxObserver<T>,
    subscription: SerialSubscription,
    terminated: AtomicBool,
}

impl<T> AutoDetachObserver<T> {
    pub fn new(downstream: BoxObserver<T>, subscription: SerialSubscription) -> Self {
        AutoDetachObserver { downstream, subscription, terminated: AtomicBool::new(false) }
    }
}

impl<T: Send + Sync> Observer<T> for AutoDetachObserver<T> {
    fn on_next(&self, value: T) {
        if self.terminated.load(Ordering::Acquire) {
            return;
        }
        self.downstream.on_next(value);
    }

    fn on_error(&self, error: RxError) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        self.downstream.on_error(error);
        self.subscription.unsubscribe();
    }

    fn on_completed(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        self.downstream.on_completed();
        self.subscription.unsubscribe();
    }
}
