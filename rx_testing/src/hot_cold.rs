use std::sync::{Arc, Mutex};

use rx_observable::{BoxObserver, Observable, Observer};
use rx_scheduler::{Scheduler, Worker};
use rx_subject::Subject;
use rx_subscription::{CompositeSubscription, Subscription, SubscriptionLike};

use crate::record::{Record, SubscriptionRecord};
use crate::scheduler::VirtualTimeScheduler;

fn deliver<T>(record: &Record<T>, observer: &dyn Observer<T>)
where
    T: Clone,
{
    match record {
        Record::Next(_, value) => observer.on_next(value.clone()),
        Record::Error(_, error) => observer.on_error(error.clone()),
        Record::Completed(_) => observer.on_completed(),
    }
}

/// A scripted source whose records fire at absolute virtual times, independent of when (or
/// whether) anything is subscribed — the virtual-time counterpart of a `Subject` fed by a
/// fixture. Every subscriber sees only the records that fire while it is subscribed, exactly
/// as a live broadcast would.
pub struct HotObservable<T> {
    subject: Subject<T>,
    subscriptions: Arc<Mutex<Vec<SubscriptionRecord>>>,
}

impl<T: Clone + Send + Sync + 'static> HotObservable<T> {
    /// This source as a cold-subscribe `Observable`. Each call records its own subscribe
    /// window in [`HotObservable::subscriptions`].
    pub fn as_observable(&self, scheduler: &VirtualTimeScheduler) -> Observable<T> {
        let subject = self.subject.clone();
        let scheduler = scheduler.clone();
        let subscriptions = self.subscriptions.clone();
        Observable::create(move |observer: BoxObserver<T>| {
            let subscribe_time = scheduler.now();
            let index = {
                let mut log = subscriptions.lock().unwrap();
                log.push(SubscriptionRecord::subscribed_forever(subscribe_time));
                log.len() - 1
            };
            let inner = subject.as_observable().subscribe_observer(observer);
            let scheduler = scheduler.clone();
            let subscriptions = subscriptions.clone();
            Subscription::new(move || {
                inner.unsubscribe();
                subscriptions.lock().unwrap()[index].unsubscribe_time = Some(scheduler.now());
            })
        })
    }

    /// The recorded `(subscribe_time, unsubscribe_time)` window of every subscription made
    /// to this source so far.
    pub fn subscriptions(&self) -> Vec<SubscriptionRecord> {
        self.subscriptions.lock().unwrap().clone()
    }
}

/// Build a hot source: `records` are scheduled to fire at their own absolute virtual times,
/// regardless of whether anything has subscribed yet. A record that fires before any
/// subscription exists is lost to every later subscriber, just as with a live `Subject`.
pub fn make_hot_observable<T>(
    scheduler: &VirtualTimeScheduler,
    records: Vec<Record<T>>,
) -> HotObservable<T>
where
    T: Clone + Send + Sync + 'static,
{
    let subject = Subject::new();
    let hot = HotObservable { subject: subject.clone(), subscriptions: Arc::new(Mutex::new(Vec::new())) };

    let worker = scheduler.create_worker();
    for record in records {
        let subject = subject.clone();
        worker.schedule_at(
            record.time(),
            Box::new(move |_| deliver(&record, &subject)),
        );
    }

    hot
}

/// A scripted source whose records fire at times relative to each subscription: subscribing
/// a second time replays the whole script again from the new subscribe time, the way a cold
/// `Observable` (`range`, `from_iterable`, ...) always does.
pub struct ColdObservable<T> {
    records: Vec<Record<T>>,
    subscriptions: Arc<Mutex<Vec<SubscriptionRecord>>>,
}

impl<T: Clone + Send + Sync + 'static> ColdObservable<T> {
    pub fn as_observable(&self, scheduler: &VirtualTimeScheduler) -> Observable<T> {
        let records = self.records.clone();
        let scheduler = scheduler.clone();
        let subscriptions = self.subscriptions.clone();
        Observable::create(move |observer: BoxObserver<T>| {
            let subscribe_time = scheduler.now();
            let index = {
                let mut log = subscriptions.lock().unwrap();
                log.push(SubscriptionRecord::subscribed_forever(subscribe_time));
                log.len() - 1
            };

            let observer: Arc<BoxObserver<T>> = Arc::new(observer);
            let worker = scheduler.create_worker();
            let pending = CompositeSubscription::new();
            for record in &records {
                let observer = observer.clone();
                let record = record.clone();
                let timer = worker.schedule_after(
                    record.time(),
                    Box::new(move |_| deliver(&record, observer.as_ref().as_ref())),
                );
                pending.add(timer);
            }

            let scheduler = scheduler.clone();
            let subscriptions = subscriptions.clone();
            Subscription::new(move || {
                pending.unsubscribe();
                subscriptions.lock().unwrap()[index].unsubscribe_time = Some(scheduler.now());
            })
        })
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionRecord> {
        self.subscriptions.lock().unwrap().clone()
    }
}

/// Build a cold source: every subscription replays `records` from its own subscribe time,
/// with each record's time treated as an offset from that subscription rather than an
/// absolute instant.
pub fn make_cold_observable<T>(records: Vec<Record<T>>) -> ColdObservable<T>
where
    T: Clone + Send + Sync + 'static,
{
    ColdObservable { records, subscriptions: Arc::new(Mutex::new(Vec::new())) }
}
