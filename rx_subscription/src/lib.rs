//! Cancellation primitives shared by every observable, subject, and operator in the
//! workspace: a single-disposer [`Subscription`], a many-children [`CompositeSubscription`],
//! and a one-at-a-time [`SerialSubscription`] for operators that replace their active child.

mod composite;
mod serial;
mod subscription;

pub use composite::{CompositeSubscription, CompositeToken};
pub use serial::SerialSubscription;
pub use subscription::{Subscription, SubscriptionLike};
