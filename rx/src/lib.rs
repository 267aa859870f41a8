//! The public facade over the rx workspace: subscriptions, schedulers, the observer contract,
//! source factories, the operator library, subjects, and coordination policies, all
//! re-exported from one place so application code depends on a single crate.
//!
//! Every operator is a free function over `&Observable<T>` (see [`rx_operators`]'s own
//! module docs for why), so a typical chain reads as nested calls rather than a fluent
//! method chain: `rx::map(&rx::range(0, 5, 1, Some(scheduler.clone())), |v| v * 2)`.
//! `rx_testing`'s virtual-time harness is a separate, dev-dependency-only crate; pull it in
//! directly where you write deterministic tests against this surface.

pub use rx_common::{panic_message, ErrorKindTag, RxError};
pub use rx_subscription::{CompositeSubscription, CompositeToken, SerialSubscription, Subscription, SubscriptionLike};
pub use rx_scheduler::{
    scheduled_subscription, Action, CurrentThreadScheduler, EventLoopScheduler, ImmediateScheduler,
    NewThreadScheduler, Scheduler, Worker,
};
pub use rx_observable::{
    empty, from_iterable, interval, just, never, range, run_on_current_thread, throw,
    unhandled_error_observer, using, AnonymousObserver, BoxObserver, Notification, Observable,
    Observer,
};
pub use rx_subject::{AsyncSubject, BehaviorSubject, GroupedObservable, GroupedSubject, Subject};
pub use rx_operators::{
    aggregate, all, any, cast, combine_latest, concat, concat_map, connect_forever, contains,
    count, delay, dematerialize, distinct_until_changed, element_at, filter, first, group_by,
    last, map, materialize, max, merge, merge_delay_error, min, multicast, publish,
    publish_initial, publish_last, ref_count, retry, scan, scan_seeded, select_many, skip,
    skip_until, start_with, sum, switch_on_next, take, take_until, throttle, to_vector, zip,
    ConnectableObservable, Multicastable,
};
pub use rx_coordination::{
    coordinate, identity_one_worker, observe_on, serialize_one_worker, subscribe_on,
    synchronize_one_worker, Coordination, Coordinator, IdentityOneWorker, SerializeOneWorker,
    SynchronizeOneWorker,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn facade_chains_factories_and_operators() {
        let scheduler: Arc<dyn Scheduler> = Arc::new(ImmediateScheduler::new());
        let source = range(0, 5, 1, Some(scheduler));
        let doubled = map(&source, |v: i64| v * 2);
        let evens_only = filter(&doubled, |v: &i64| v % 4 == 0);

        let sum = Arc::new(AtomicI32::new(0));
        let s = sum.clone();
        evens_only.subscribe(move |v| {
            s.fetch_add(v as i32, Ordering::SeqCst);
        });

        assert_eq!(sum.load(Ordering::SeqCst), 0 + 4 + 8);
    }

    #[test]
    fn facade_exposes_subjects_and_subscriptions() {
        let subject = BehaviorSubject::new(0);
        let received = Arc::new(AtomicI32::new(-1));
        let r = received.clone();
        let sub = subject.as_observable().subscribe(move |v: i32| r.store(v, Ordering::SeqCst));
        subject.on_next(7);
        assert_eq!(received.load(Ordering::SeqCst), 7);
        sub.unsubscribe();
        assert!(!sub.is_subscribed());
    }
}
