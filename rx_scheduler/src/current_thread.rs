use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;

use rx_subscription::Subscription;

use crate::queue::ActionQueue;
use crate::traits::{Action, Scheduler, Worker};

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

thread_local! {
    static QUEUE: RefCell<ActionQueue> = RefCell::new(ActionQueue::new());
    static DRAINING: Cell<bool> = Cell::new(false);
}

fn now_ms() -> i64 {
    EPOCH.elapsed().as_millis() as i64
}

/// A scheduler that enqueues to a thread-local queue and drains it on return.
///
/// If `schedule` is called while a drain is already in progress on this thread (i.e. from
/// inside an action that is itself running on this worker), the new action is only
/// enqueued — the outer call is the one that drains. This is what lets operators recurse
/// (schedule from within a scheduled action) without growing the call stack.
pub struct CurrentThreadScheduler;

impl CurrentThreadScheduler {
    pub fn new() -> Self {
        CurrentThreadScheduler
    }

    /// Whether the calling thread is currently inside a trampoline drain.
    pub fn is_scheduled_required(&self) -> bool {
        !DRAINING.with(|d| d.get())
    }
}

impl Default for CurrentThreadScheduler {
    fn default() -> Self {
        CurrentThreadScheduler::new()
    }
}

impl Scheduler for CurrentThreadScheduler {
    fn now(&self) -> i64 {
        now_ms()
    }

    fn create_worker(&self) -> Arc<dyn Worker> {
        Arc::new(CurrentThreadWorker)
    }
}

struct CurrentThreadWorker;

impl Worker for CurrentThreadWorker {
    fn now(&self) -> i64 {
        now_ms()
    }

    fn schedule_after(&self, dt: i64, action: Action) -> Subscription {
        let sub = Subscription::new(|| {});
        let due = now_ms() + dt.max(0);
        QUEUE.with(|q| q.borrow_mut().push(due, action, sub.clone()));

        let already_draining = DRAINING.with(|d| d.get());
        if already_draining {
            return sub;
        }

        DRAINING.with(|d| d.set(true));
        loop {
            let due_time = QUEUE.with(|q| q.borrow().peek_due_time());
            let Some(due_time) = due_time else { break };
            if due_time > now_ms() {
                std::thread::sleep(std::time::Duration::from_millis((due_time - now_ms()) as u64));
            }
            let item = QUEUE.with(|q| q.borrow_mut().pop_ready());
            if let Some(item) = item {
                (item.action)(self);
            }
        }
        DRAINING.with(|d| d.set(false));
        sub
    }
}
