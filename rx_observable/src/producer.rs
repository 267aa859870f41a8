use rx_scheduler::{CurrentThreadScheduler, Scheduler, Worker};
use rx_subscription::{SerialSubscription, Subscription, SubscriptionLike};

/// Runs `run` as the body of the producer skeleton described for synchronous sources (§4.4):
/// the actual subscribe work always happens on a current-thread worker. If no trampoline is
/// already draining on this thread, scheduling here starts one and the work runs before this
/// call returns; if one is already draining (this call was made re-entrantly from inside a
/// notification), the work is queued and runs only after the in-flight notification returns.
/// Either way, subscription side effects can never recurse past a notification in progress.
pub fn run_on_current_thread(run: impl FnOnce() -> Subscription + Send + 'static) -> Subscription {
    let scheduler = CurrentThreadScheduler::new();
    let worker = scheduler.create_worker();
    let serial = SerialSubscription::new();
    let serial_for_action = serial.clone();
    worker.schedule(Box::new(move |_| {
        let sub = run();
        serial_for_action.set(sub);
    }));
    Subscription::from_like(serial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn runs_before_returning_when_no_trampoline_is_active() {
        let ran = Arc::new(AtomicBool::new(false));
        let r = ran.clone();
        run_on_current_thread(move || {
            r.store(true, Ordering::SeqCst);
            Subscription::empty()
        });
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn cancelling_before_the_deferred_run_prevents_its_subscription_from_surviving() {
        let disposed = Arc::new(AtomicBool::new(false));
        let d = disposed.clone();

        let scheduler = CurrentThreadScheduler::new();
        let worker = scheduler.create_worker();
        // Re-entrantly schedule run_on_current_thread from inside an already-draining
        // trampoline, so its inner work is merely queued, not run yet.
        let outer_sub = worker.schedule(Box::new(move |_| {
            let sub = run_on_current_thread(move || {
                Subscription::new(move || d.store(true, Ordering::SeqCst))
            });
            sub.unsubscribe();
        }));
        let _ = outer_sub;
        assert!(disposed.load(Ordering::SeqCst));
    }
}
