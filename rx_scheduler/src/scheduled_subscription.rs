use std::sync::Arc;

use rx_subscription::{Subscription, SubscriptionLike};

use crate::traits::Worker;

/// Wraps a child subscription so that disposing it schedules the child's `unsubscribe` onto
/// a worker instead of running it on the calling thread. Used by `subscribe_on`, where the
/// act of subscribing — and therefore of tearing the subscription back down — is itself
/// shifted onto a scheduler.
pub fn scheduled_subscription(worker: Arc<dyn Worker>, child: Subscription) -> Subscription {
    Subscription::new(move || {
        let child = child.clone();
        worker.schedule(Box::new(move |_| child.unsubscribe()));
    })
}
