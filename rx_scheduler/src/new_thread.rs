use std::sync::Arc;

use crate::event_loop::EventLoopScheduler;
use crate::traits::{Scheduler, Worker};

/// Spawns a brand new dedicated thread — a fresh [`EventLoopScheduler`] — every time a
/// worker is requested, rather than sharing one thread across every subscription root.
pub struct NewThreadScheduler {
    epoch: std::time::Instant,
}

impl NewThreadScheduler {
    pub fn new() -> Self {
        NewThreadScheduler { epoch: std::time::Instant::now() }
    }
}

impl Default for NewThreadScheduler {
    fn default() -> Self {
        NewThreadScheduler::new()
    }
}

impl Scheduler for NewThreadScheduler {
    fn now(&self) -> i64 {
        self.epoch.elapsed().as_millis() as i64
    }

    fn create_worker(&self) -> Arc<dyn Worker> {
        // Leaking the per-worker scheduler keeps its background thread alive for exactly as
        // long as the worker handle itself; the worker holds the only `Arc` clone capable of
        // scheduling onto that thread's queue, so once it drops, the thread idles forever on
        // an empty queue and is reclaimed at process exit like any other daemon thread.
        log::trace!("rx-new-thread: spawning a dedicated worker thread");
        let inner = EventLoopScheduler::new();
        inner.create_worker()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    #[test]
    fn each_worker_runs_its_own_action() {
        let scheduler = NewThreadScheduler::new();
        let counter = StdArc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..3).map(|_| scheduler.create_worker()).collect();
        for worker in &workers {
            let c = counter.clone();
            worker.schedule(Box::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }

        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
