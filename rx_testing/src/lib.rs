//! A virtual-time scheduler and a recorded-trace harness for testing observable pipelines
//! deterministically, without sleeping a real clock. This is the rx workspace's counterpart
//! to RxCpp's `rxsc::test` scheduler and Rx.NET's `TestScheduler`: a pipeline built against
//! [`VirtualTimeScheduler`] runs through years of scheduled time in microseconds of wall time,
//! and every notification comes back timestamped for exact assertion.
//!
//! The usual shape of a test:
//!
//! ```ignore
//! let scheduler = VirtualTimeScheduler::new();
//! let xs = make_hot_observable(&scheduler, vec![
//!     Record::on_next(210, 1),
//!     Record::on_next(340, 2),
//!     Record::on_completed(600),
//! ]);
//! let observer = scheduler.start(move || filter(&xs.as_observable(&scheduler), |v| *v > 1));
//! assert_eq!(observer.messages(), vec![Record::on_next(340, 2), Record::on_completed(600)]);
//! assert_eq!(xs.subscriptions(), vec![SubscriptionRecord::new(200, 600)]);
//! ```

mod hot_cold;
mod record;
mod scheduler;
mod test_observer;

pub use hot_cold::{make_cold_observable, make_hot_observable, ColdObservable, HotObservable};
pub use record::{Record, SubscriptionRecord};
pub use scheduler::{VirtualTimeScheduler, CREATED_TIME, SUBSCRIBED_TIME, UNSUBSCRIBED_TIME};
pub use test_observer::TestObserver;
