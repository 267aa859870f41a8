use std::sync::Arc;

use parking_lot::Mutex;

use crate::subscription::{Subscription, SubscriptionLike};

/// Handle returned by [`CompositeSubscription::add`], usable with
/// [`CompositeSubscription::remove`] to detach a child before the composite itself is
/// unsubscribed. A token returned while the composite was already unsubscribed is a
/// sentinel — `remove` is a no-op for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeToken(Option<usize>);

enum State {
    Active { next_token: usize, children: Vec<(usize, Subscription)> },
    Disposed,
}

struct Inner {
    state: Mutex<State>,
}

/// A set of child subscriptions. Unsubscribing the composite unsubscribes every current
/// child, in insertion order, and any child added afterward is disposed immediately.
///
/// Locking discipline: the composite's mutex protects only the child list. It is released
/// before any child disposer runs, so a child that tries to remove itself from the same
/// composite during its own disposal never deadlocks.
#[derive(Clone)]
pub struct CompositeSubscription(Arc<Inner>);

impl CompositeSubscription {
    pub fn new() -> Self {
        CompositeSubscription(Arc::new(Inner {
            state: Mutex::new(State::Active {
                next_token: 0,
                children: Vec::new(),
            }),
        }))
    }

    /// Add a child. If the composite is already unsubscribed, `sub` is unsubscribed
    /// immediately and the returned token is a sentinel.
    pub fn add(&self, sub: Subscription) -> CompositeToken {
        let mut state = self.0.state.lock();
        match &mut *state {
            State::Active { next_token, children } => {
                let token = *next_token;
                *next_token += 1;
                children.push((token, sub));
                CompositeToken(Some(token))
            }
            State::Disposed => {
                drop(state);
                sub.unsubscribe();
                CompositeToken(None)
            }
        }
    }

    /// Detach a child by token without unsubscribing it. A sentinel token is a no-op.
    pub fn remove(&self, token: CompositeToken) {
        let Some(token) = token.0 else { return };
        let mut state = self.0.state.lock();
        if let State::Active { children, .. } = &mut *state {
            children.retain(|(t, _)| *t != token);
        }
    }

    /// The number of children currently held, for diagnostics and tests.
    pub fn len(&self) -> usize {
        match &*self.0.state.lock() {
            State::Active { children, .. } => children.len(),
            State::Disposed => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SubscriptionLike for CompositeSubscription {
    fn is_subscribed(&self) -> bool {
        matches!(&*self.0.state.lock(), State::Active { .. })
    }

    fn unsubscribe(&self) {
        let children = {
            let mut state = self.0.state.lock();
            match std::mem::replace(&mut *state, State::Disposed) {
                State::Active { children, .. } => children,
                State::Disposed => Vec::new(),
            }
        };
        for (_, child) in children {
            child.unsubscribe();
        }
    }
}

impl Default for CompositeSubscription {
    fn default() -> Self {
        CompositeSubscription::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn unsubscribe_disposes_children_in_order() {
        let composite = CompositeSubscription::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            composite.add(Subscription::new(move || order.lock().push(i)));
        }

        composite.unsubscribe();
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn add_after_disposal_disposes_immediately() {
        let composite = CompositeSubscription::new();
        composite.unsubscribe();

        let disposed = Arc::new(AtomicUsize::new(0));
        let d = disposed.clone();
        let token = composite.add(Subscription::new(move || {
            d.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        assert_eq!(token, CompositeToken(None));
        composite.remove(token); // no-op, must not panic
    }

    #[test]
    fn remove_detaches_without_disposing() {
        let composite = CompositeSubscription::new();
        let disposed = Arc::new(AtomicUsize::new(0));
        let d = disposed.clone();
        let token = composite.add(Subscription::new(move || {
            d.fetch_add(1, Ordering::SeqCst);
        }));

        composite.remove(token);
        assert!(composite.is_empty());
        composite.unsubscribe();
        assert_eq!(disposed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let composite = CompositeSubscription::new();
        composite.unsubscribe();
        composite.unsubscribe();
        assert!(!composite.is_subscribed());
    }

    proptest::proptest! {
        /// However many children are added, and however many times the composite itself is
        /// unsubscribed, every child's disposer runs exactly once.
        #[test]
        fn every_child_disposer_runs_exactly_once(child_count in 0usize..64, extra_unsubscribes in 0usize..4) {
            let composite = CompositeSubscription::new();
            let counts: Vec<Arc<AtomicUsize>> =
                (0..child_count).map(|_| Arc::new(AtomicUsize::new(0))).collect();

            for count in &counts {
                let count = count.clone();
                composite.add(Subscription::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }));
            }

            for _ in 0..=extra_unsubscribes {
                composite.unsubscribe();
            }

            for count in &counts {
                proptest::prop_assert_eq!(count.load(Ordering::SeqCst), 1);
            }
        }
    }
}
