use std::sync::Arc;

use parking_lot::Mutex;

use crate::subscription::{Subscription, SubscriptionLike};

enum State {
    Active(Option<Subscription>),
    Disposed,
}

struct Inner {
    state: Mutex<State>,
}

/// Holds at most one "current" child subscription at a time. Setting a new child
/// unsubscribes whichever child was previously held; unsubscribing the serial subscription
/// unsubscribes the current child and disposes of any future child immediately.
///
/// Used by operators like `switch_on_next` and `switch_map`, where each new inner observable
/// replaces — and cancels — the one before it.
#[derive(Clone)]
pub struct SerialSubscription(Arc<Inner>);

impl SerialSubscription {
    pub fn new() -> Self {
        SerialSubscription(Arc::new(Inner {
            state: Mutex::new(State::Active(None)),
        }))
    }

    /// Replace the current child with `sub`, unsubscribing the previous one. If the serial
    /// subscription is already unsubscribed, `sub` is unsubscribed immediately instead.
    pub fn set(&self, sub: Subscription) {
        let previous = {
            let mut state = self.0.state.lock();
            match &mut *state {
                State::Active(slot) => std::mem::replace(slot, Some(sub.clone())),
                State::Disposed => {
                    drop(state);
                    sub.unsubscribe();
                    return;
                }
            }
        };
        if let Some(previous) = previous {
            previous.unsubscribe();
        }
    }

    /// Remove the current child without unsubscribing it.
    pub fn clear(&self) {
        let mut state = self.0.state.lock();
        if let State::Active(slot) = &mut *state {
            *slot = None;
        }
    }
}

impl SubscriptionLike for SerialSubscription {
    fn is_subscribed(&self) -> bool {
        matches!(&*self.0.state.lock(), State::Active(_))
    }

    fn unsubscribe(&self) {
        let previous = {
            let mut state = self.0.state.lock();
            match std::mem::replace(&mut *state, State::Disposed) {
                State::Active(slot) => slot,
                State::Disposed => None,
            }
        };
        if let Some(previous) = previous {
            previous.unsubscribe();
        }
    }
}

impl Default for SerialSubscription {
    fn default() -> Self {
        SerialSubscription::new()
    }
}
