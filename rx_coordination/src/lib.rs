//! Coordination policies: ways an observable chain can cross thread boundaries while keeping
//! its notifications ordered. `identity_one_worker`/`synchronize_one_worker`/
//! `serialize_one_worker` wrap a whole subscription's source and sink together via the
//! [`Coordination`]/[`Coordinator`] pair; `observe_on`/`subscribe_on` are narrower operators
//! that shift only the downstream delivery side or only the subscribe-time work.

mod coordination;
mod observe_on;
mod subscribe_on;

pub use coordination::{
    coordinate, identity_one_worker, serialize_one_worker, synchronize_one_worker, Coordination,
    Coordinator, IdentityOneWorker, SerializeOneWorker, SynchronizeOneWorker,
};
pub use observe_on::observe_on;
pub use subscribe_on::subscribe_on;
