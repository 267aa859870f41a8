use rx_subscription::Subscription;

/// A unit of scheduled work. Receives the worker it was dispatched onto, so it can
/// recursively reschedule itself (the common pattern behind `interval`, `throttle`, and the
/// event-loop's own drain loop).
pub type Action = Box<dyn FnOnce(&dyn Worker) + Send>;

/// A factory for [`Worker`]s, and the source of truth for "now" on a given timeline.
///
/// `now()` is monotonic for every wall-clock scheduler in this crate, and virtual (driven
/// entirely by `advance_to`) for the test scheduler in `rx_testing`.
pub trait Scheduler: Send + Sync {
    fn now(&self) -> i64;

    /// Create a worker bound to this scheduler. Schedulers that run work on a single
    /// dedicated thread (event-loop, new-thread) return the same worker from every call;
    /// `new_thread` returns a fresh worker — and a fresh thread — each time.
    fn create_worker(&self) -> std::sync::Arc<dyn Worker>;
}

/// Owns a queue of time-tagged actions and the logical clock they are measured against.
pub trait Worker: Send + Sync {
    fn now(&self) -> i64;

    /// Schedule `action` to run as soon as the worker is free.
    fn schedule(&self, action: Action) -> Subscription {
        self.schedule_after(0, action)
    }

    /// Schedule `action` to run `dt` milliseconds from now.
    fn schedule_after(&self, dt: i64, action: Action) -> Subscription;

    /// Schedule `action` to run at the absolute time `t`.
    fn schedule_at(&self, t: i64, action: Action) -> Subscription {
        self.schedule_after(t - self.now(), action)
    }
}
