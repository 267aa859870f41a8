use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use rx_subscription::Subscription;

use crate::queue::ActionQueue;
use crate::traits::{Action, Scheduler, Worker};

struct Shared {
    queue: Mutex<ActionQueue>,
    wake: Sender<()>,
    shutdown: AtomicBool,
}

/// A scheduler backed by one dedicated worker thread that drains a due-time-ordered queue.
///
/// The worker thread sleeps on a wake channel until the queue's head is due; inserting
/// an action with an earlier due-time than whatever the thread is currently waiting on wakes
/// it immediately so it can re-examine the queue.
pub struct EventLoopScheduler {
    epoch: Instant,
    shared: Arc<Shared>,
    _thread: Arc<JoinHandle<()>>,
}

impl EventLoopScheduler {
    pub fn new() -> Self {
        let (wake, wake_rx) = channel::unbounded();
        let shared = Arc::new(Shared {
            queue: Mutex::new(ActionQueue::new()),
            wake,
            shutdown: AtomicBool::new(false),
        });
        let epoch = Instant::now();
        let worker_shared = shared.clone();
        let thread = thread::Builder::new()
            .name("rx-event-loop".into())
            .spawn(move || run_loop(worker_shared, wake_rx, epoch))
            .expect("failed to spawn event-loop thread");

        EventLoopScheduler { epoch, shared, _thread: Arc::new(thread) }
    }

    /// Signal the worker thread to stop once its queue drains, without waiting for it.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        let _ = self.shared.wake.send(());
    }
}

impl Default for EventLoopScheduler {
    fn default() -> Self {
        EventLoopScheduler::new()
    }
}

fn run_loop(shared: Arc<Shared>, wake_rx: Receiver<()>, epoch: Instant) {
    loop {
        let item = loop {
            let mut queue = shared.queue.lock();
            if let Some(due_time) = queue.peek_due_time() {
                let now = epoch.elapsed().as_millis() as i64;
                if due_time <= now {
                    break queue.pop_ready();
                }
                let wait_for = Duration::from_millis((due_time - now) as u64);
                drop(queue);
                let _ = wake_rx.recv_timeout(wait_for);
            } else if shared.shutdown.load(Ordering::SeqCst) {
                return;
            } else {
                drop(queue);
                match wake_rx.recv() {
                    Ok(()) => {}
                    Err(_) => return,
                }
            }
        };
        if let Some(item) = item {
            log::trace!("rx-event-loop: running action due at {}", item.due_time);
            let worker = EventLoopWorker { epoch, shared: shared.clone() };
            (item.action)(&worker);
        }
    }
}

/// A handle to an [`EventLoopScheduler`]'s single worker. Cloning this struct does not
/// create a new thread — every clone schedules onto the same queue.
struct EventLoopWorker {
    epoch: Instant,
    shared: Arc<Shared>,
}

impl Worker for EventLoopWorker {
    fn now(&self) -> i64 {
        self.epoch.elapsed().as_millis() as i64
    }

    fn schedule_after(&self, dt: i64, action: Action) -> Subscription {
        let sub = Subscription::new(|| {});
        let due = self.now() + dt.max(0);
        {
            let mut queue = self.shared.queue.lock();
            queue.push(due, action, sub.clone());
        }
        let _ = self.shared.wake.send(());
        sub
    }
}

impl Scheduler for EventLoopScheduler {
    fn now(&self) -> i64 {
        self.epoch.elapsed().as_millis() as i64
    }

    fn create_worker(&self) -> Arc<dyn Worker> {
        Arc::new(EventLoopWorker { epoch: self.epoch, shared: self.shared.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_actions_in_due_time_order() {
        let _ = env_logger::builder().is_test(true).try_init();
        let scheduler = EventLoopScheduler::new();
        let worker = scheduler.create_worker();
        let (tx, rx) = channel::unbounded();

        let tx2 = tx.clone();
        worker.schedule_after(20, Box::new(move |_| tx2.send("late").unwrap()));
        let tx1 = tx.clone();
        worker.schedule_after(0, Box::new(move |_| tx1.send("early").unwrap()));

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "early");
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "late");
    }

    #[test]
    fn cancelled_action_never_runs() {
        let scheduler = EventLoopScheduler::new();
        let worker = scheduler.create_worker();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        let sub = worker.schedule_after(20, Box::new(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        }));
        sub.unsubscribe();
        thread::sleep(Duration::from_millis(60));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
