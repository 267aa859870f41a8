use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use rx_common::panic_message;

/// Common surface shared by every flavor of subscription in this crate.
///
/// `unsubscribe` is idempotent: calling it more than once has no effect beyond the first
/// call, and the disposer it guards is invoked at most once.
pub trait SubscriptionLike: Send + Sync {
    fn is_subscribed(&self) -> bool;
    fn unsubscribe(&self);
}

type Disposer = Box<dyn FnOnce() + Send>;

struct Inner {
    subscribed: AtomicBool,
    disposer: Mutex<Option<Disposer>>,
}

enum Repr {
    Owned(Arc<Inner>),
    Delegate(Arc<dyn SubscriptionLike>),
}

/// A cancellation handle with exactly two observable states: subscribed and unsubscribed.
///
/// A `Subscription` built with [`Subscription::empty`] starts out already unsubscribed — it
/// has no disposer and nothing to cancel. One built with [`Subscription::new`] starts
/// subscribed and runs its disposer exactly once, the first time `unsubscribe` is called.
/// One built with [`Subscription::from_like`] simply forwards both operations to another
/// `SubscriptionLike`, so its own state never drifts from the thing it wraps.
#[derive(Clone)]
pub struct Subscription(Repr);

impl Clone for Repr {
    fn clone(&self) -> Self {
        match self {
            Repr::Owned(inner) => Repr::Owned(inner.clone()),
            Repr::Delegate(inner) => Repr::Delegate(inner.clone()),
        }
    }
}

impl Subscription {
    /// The subscription that was never subscribed in the first place.
    pub fn empty() -> Self {
        Subscription(Repr::Owned(Arc::new(Inner {
            subscribed: AtomicBool::new(false),
            disposer: Mutex::new(None),
        })))
    }

    /// A subscription guarding `disposer`, which runs at most once, on first `unsubscribe`.
    pub fn new(disposer: impl FnOnce() + Send + 'static) -> Self {
        Subscription(Repr::Owned(Arc::new(Inner {
            subscribed: AtomicBool::new(true),
            disposer: Mutex::new(Some(Box::new(disposer))),
        })))
    }

    /// Wrap another `SubscriptionLike` so that this handle's `is_subscribed`/`unsubscribe`
    /// always reflect its live state, instead of tracking a separate flag of its own. Used
    /// where the producer skeleton hands back a serial or composite cell directly as the
    /// caller-visible subscription.
    pub fn from_like(inner: impl SubscriptionLike + 'static) -> Self {
        Subscription(Repr::Delegate(Arc::new(inner)))
    }
}

impl SubscriptionLike for Subscription {
    fn is_subscribed(&self) -> bool {
        match &self.0 {
            Repr::Owned(inner) => inner.subscribed.load(Ordering::Acquire),
            Repr::Delegate(inner) => inner.is_subscribed(),
        }
    }

    fn unsubscribe(&self) {
        match &self.0 {
            Repr::Owned(inner) => {
                // The flag flips before the disposer runs, so a notification racing this
                // call on another thread observes `is_subscribed() == false` even while the
                // disposer is still executing.
                if inner.subscribed.swap(false, Ordering::AcqRel) {
                    let disposer = inner.disposer.lock().take();
                    if let Some(disposer) = disposer {
                        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(disposer)) {
                            log::warn!(
                                "subscription disposer panicked: {}",
                                panic_message(payload)
                            );
                        }
                    }
                }
            }
            Repr::Delegate(inner) => inner.unsubscribe(),
        }
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Subscription::empty()
    }
}
