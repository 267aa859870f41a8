use std::sync::Arc;

use rx_observable::BoxObserver;
use rx_subscription::{SerialSubscription, Subscription, SubscriptionLike};

/// Common shape behind almost every operator in this crate: a shared handle to the
/// downstream observer, and a serial cell holding the upstream subscription so the
/// operator's own callbacks can cancel it (e.g. when a user callback panics).
pub(crate) struct Sink<U> {
    observer: Arc<BoxObserver<U>>,
    upstream: SerialSubscription,
}

impl<U> Sink<U> {
    /// Build a sink around `observer`, returning it alongside the subscription that the
    /// enclosing `Observable::create` closure should hand back to its caller.
    pub fn new(observer: BoxObserver<U>) -> (Self, Subscription) {
        let upstream = SerialSubscription::new();
        let handle = Subscription::from_like(upstream.clone());
        (Sink { observer: Arc::new(observer), upstream }, handle)
    }

    /// Install the subscription returned by subscribing to the upstream source.
    pub fn bind_upstream(&self, upstream_sub: Subscription) {
        self.upstream.set(upstream_sub);
    }

    pub fn cancel_upstream(&self) {
        self.upstream.unsubscribe();
    }

    pub fn observer(&self) -> Arc<BoxObserver<U>> {
        self.observer.clone()
    }
}

impl<U> Clone for Sink<U> {
    fn clone(&self) -> Self {
        Sink { observer: self.observer.clone(), upstream: self.upstream.clone() }
    }
}

/// Re-exported so the rest of this crate can keep calling `guarded(..)` unqualified; the
/// real implementation is shared with every other crate in the workspace via `rx_common`.
pub(crate) use rx_common::guarded;
