use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rx_subscription::Subscription;

use crate::traits::{Action, Scheduler, Worker};

/// Runs every action synchronously, on the calling thread, at the point of scheduling.
/// `schedule_after` with a positive delay blocks the caller for that long before running.
pub struct ImmediateScheduler {
    epoch: Instant,
}

impl ImmediateScheduler {
    pub fn new() -> Self {
        ImmediateScheduler { epoch: Instant::now() }
    }
}

impl Default for ImmediateScheduler {
    fn default() -> Self {
        ImmediateScheduler::new()
    }
}

impl Scheduler for ImmediateScheduler {
    fn now(&self) -> i64 {
        self.epoch.elapsed().as_millis() as i64
    }

    fn create_worker(&self) -> Arc<dyn Worker> {
        Arc::new(ImmediateWorker { epoch: self.epoch })
    }
}

struct ImmediateWorker {
    epoch: Instant,
}

impl Worker for ImmediateWorker {
    fn now(&self) -> i64 {
        self.epoch.elapsed().as_millis() as i64
    }

    fn schedule_after(&self, dt: i64, action: Action) -> Subscription {
        if dt > 0 {
            thread::sleep(Duration::from_millis(dt as u64));
        }
        // The action has already run by the time this call returns, so there is nothing
        // left to cancel.
        action(self);
        Subscription::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn schedule_runs_synchronously() {
        let scheduler = ImmediateScheduler::new();
        let worker = scheduler.create_worker();
        let ran = Arc::new(AtomicBool::new(false));
        let r = ran.clone();
        worker.schedule(Box::new(move |_| r.store(true, Ordering::SeqCst)));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn schedule_after_blocks_for_the_delay() {
        let scheduler = ImmediateScheduler::new();
        let worker = scheduler.create_worker();
        let before = Instant::now();
        worker.schedule_after(5, Box::new(|_| {}));
        assert!(before.elapsed() >= Duration::from_millis(5));
    }
}
