use std::sync::{Arc, Mutex};

use rx_observable::{BoxObserver, Observable};
use rx_scheduler::{scheduled_subscription, Scheduler};
use rx_subscription::{SerialSubscription, Subscription};

/// Schedules the act of subscribing onto `scheduler` rather than running it on the calling
/// thread; the subscription returned to the caller is available immediately, but its
/// `unsubscribe` (like the subscribe call itself) is carried out on the scheduler's worker.
pub fn subscribe_on<T: Send + Sync + 'static>(
    source: &Observable<T>,
    scheduler: Arc<dyn Scheduler>,
) -> Observable<T> {
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<T>| {
        let worker = scheduler.create_worker();
        let serial = SerialSubscription::new();
        let observer = Arc::new(Mutex::new(Some(observer)));
        let source = source.clone();
        let serial_for_task = serial.clone();
        let worker_for_teardown = worker.clone();
        worker.schedule(Box::new(move |_| {
            if let Some(observer) = observer.lock().unwrap().take() {
                log::trace!("subscribe_on: subscribing to source on the target scheduler");
                let child = source.subscribe_observer(observer);
                serial_for_task.set(scheduled_subscription(worker_for_teardown, child));
            }
        }));
        Subscription::from_like(serial)
    })
}
