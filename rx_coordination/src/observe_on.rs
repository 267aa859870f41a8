use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use rx_common::RxError;
use rx_observable::{BoxObserver, Notification, Observable};
use rx_scheduler::{Scheduler, Worker};
use rx_subscription::{Subscription, SubscriptionLike};

struct ObserveOnState<T> {
    queue: VecDeque<Notification<T>>,
    draining: bool,
    cancelled: bool,
}

/// Schedules each downstream notification onto `scheduler`, one at a time, in the FIFO order
/// the source produced them. Unlike [`synchronize_one_worker`](crate::synchronize_one_worker),
/// this only shifts the downstream side — it is an ordinary operator, not a whole-pipeline
/// coordination. Unsubscribing drains any notifications still queued without delivering them.
pub fn observe_on<T: Send + Sync + 'static>(
    source: &Observable<T>,
    scheduler: Arc<dyn Scheduler>,
) -> Observable<T> {
    let source = source.clone();
    Observable::create(move |observer: BoxObserver<T>| {
        let observer: Arc<BoxObserver<T>> = Arc::new(observer);
        let worker = scheduler.create_worker();
        let state = Arc::new(Mutex::new(ObserveOnState {
            queue: VecDeque::new(),
            draining: false,
            cancelled: false,
        }));

        fn drain<T: Send + Sync + 'static>(
            worker: Arc<dyn Worker>,
            observer: Arc<BoxObserver<T>>,
            state: Arc<Mutex<ObserveOnState<T>>>,
        ) {
            {
                let mut st = state.lock().unwrap();
                if st.draining || st.cancelled {
                    return;
                }
                st.draining = true;
            }
            worker.schedule(Box::new(move |_| loop {
                let next = {
                    let mut st = state.lock().unwrap();
                    if st.cancelled {
                        st.queue.clear();
                        st.draining = false;
                        return;
                    }
                    match st.queue.pop_front() {
                        Some(notification) => notification,
                        None => {
                            st.draining = false;
                            return;
                        }
                    }
                };
                next.deliver(observer.as_ref().as_ref());
            }));
        }

        let push = {
            let state = state.clone();
            let worker = worker.clone();
            let observer = observer.clone();
            move |notification: Notification<T>| {
                state.lock().unwrap().queue.push_back(notification);
                drain(worker.clone(), observer.clone(), state.clone());
            }
        };

        let push_next = push.clone();
        let push_err = push.clone();
        let push_completed = push;
        let upstream = source.subscribe_all(
            move |value| push_next(Notification::Next(value)),
            move |error: RxError| push_err(Notification::Error(error)),
            move || push_completed(Notification::Completed),
        );

        let state_for_unsub = state;
        Subscription::new(move || {
            state_for_unsub.lock().unwrap().cancelled = true;
            upstream.unsubscribe();
        })
    })
}
