//! The subject family: the bridge type that is simultaneously an observer and an observable,
//! plus its `behavior`, `async`, and `grouped` specializations.

mod async_subject;
mod behavior;
mod grouped;
mod subject;

pub use async_subject::AsyncSubject;
pub use behavior::BehaviorSubject;
pub use grouped::{GroupedObservable, GroupedSubject};
pub use subject::Subject;
