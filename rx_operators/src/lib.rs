//! The operator library: stateless transforms, stateful accumulators, reducers, time-based
//! operators, multi-source joins, the multicast/connectable layer, and materialize/dematerialize.
//! Every operator here is a free function over `&Observable<T>` rather than a method, so the
//! crate composes by ordinary function calls instead of an extension-trait chain.

mod join;
mod materialize;
mod multicast;
mod reducers;
mod stateful;
mod stateless;
mod support;
mod time;

pub use join::{
    combine_latest, concat, concat_map, group_by, merge, merge_delay_error, select_many,
    start_with, switch_on_next, zip,
};
pub use materialize::{dematerialize, materialize};
pub use multicast::{connect_forever, multicast, publish, publish_initial, publish_last, ref_count, ConnectableObservable, Multicastable};
pub use reducers::{aggregate, all, any, contains, count, element_at, first, last, max, min, sum, to_vector};
pub use stateful::{distinct_until_changed, retry, scan, scan_seeded, skip, skip_until, take, take_until};
pub use stateless::{cast, filter, map};
pub use time::{delay, throttle};
