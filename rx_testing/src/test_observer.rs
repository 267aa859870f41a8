use std::sync::{Arc, Mutex};

use rx_common::RxError;
use rx_observable::Observer;
use rx_scheduler::Scheduler;

use crate::record::Record;
use crate::scheduler::VirtualTimeScheduler;

/// An observer that timestamps every notification it receives against a
/// [`VirtualTimeScheduler`]'s clock and records it, for assertion once the scheduler has
/// finished running. The counterpart of `rxsc::test::messages<T>` / `res.messages()` in the
/// original marble-test harness.
pub struct TestObserver<T> {
    scheduler: VirtualTimeScheduler,
    records: Arc<Mutex<Vec<Record<T>>>>,
}

impl<T> Clone for TestObserver<T> {
    fn clone(&self) -> Self {
        TestObserver { scheduler: self.scheduler.clone(), records: self.records.clone() }
    }
}

impl<T> TestObserver<T> {
    pub fn new(scheduler: VirtualTimeScheduler) -> Self {
        TestObserver { scheduler, records: Arc::new(Mutex::new(Vec::new())) }
    }

    /// The recorded trace, in arrival order.
    pub fn messages(&self) -> Vec<Record<T>>
    where
        T: Clone,
    {
        self.records.lock().unwrap().clone()
    }

    /// How many `on_next` notifications were recorded.
    pub fn next_count(&self) -> usize {
        self.records.lock().unwrap().iter().filter(|r| !r.is_terminal()).count()
    }
}

impl<T: Send + Sync + 'static> Observer<T> for TestObserver<T> {
    fn on_next(&self, value: T) {
        let now = self.scheduler.now();
        self.records.lock().unwrap().push(Record::on_next(now, value));
    }

    fn on_error(&self, error: RxError) {
        let now = self.scheduler.now();
        self.records.lock().unwrap().push(Record::on_error(now, error));
    }

    fn on_completed(&self) {
        let now = self.scheduler.now();
        self.records.lock().unwrap().push(Record::on_completed(now));
    }
}
