use rx_common::RxError;

/// One entry in a virtual-time trace: a notification paired with the virtual time it
/// occurred at (when recorded from a [`crate::TestObserver`]) or the virtual time it should
/// fire at (when scripting a [`crate::make_hot_observable`]/[`crate::make_cold_observable`]
/// source).
///
/// For cold sources the time is relative to the subscription; for hot sources and for
/// recorded output it is absolute, measured against the owning [`crate::VirtualTimeScheduler`].
#[derive(Debug, Clone)]
pub enum Record<T> {
    Next(i64, T),
    Error(i64, RxError),
    Completed(i64),
}

impl<T> Record<T> {
    pub fn on_next(time: i64, value: T) -> Self {
        Record::Next(time, value)
    }

    pub fn on_error(time: i64, error: RxError) -> Self {
        Record::Error(time, error)
    }

    pub fn on_completed(time: i64) -> Self {
        Record::Completed(time)
    }

    pub fn time(&self) -> i64 {
        match self {
            Record::Next(t, _) | Record::Error(t, _) | Record::Completed(t) => *t,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Record::Next(_, _))
    }

    /// Compare two records by error *kind* (see `RxError::kind`) rather than exact message.
    /// Falls back to ordinary equality for non-error records. Use this when asserting
    /// against a trace whose error payload isn't constructed identically to the one the
    /// pipeline actually raises.
    pub fn matches_kind(&self, other: &Self) -> bool
    where
        T: PartialEq,
    {
        match (self, other) {
            (Record::Error(t1, e1), Record::Error(t2, e2)) => t1 == t2 && e1.kind() == e2.kind(),
            _ => self == other,
        }
    }
}

impl<T: PartialEq> PartialEq for Record<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Record::Next(t1, v1), Record::Next(t2, v2)) => t1 == t2 && v1 == v2,
            (Record::Error(t1, e1), Record::Error(t2, e2)) => t1 == t2 && e1 == e2,
            (Record::Completed(t1), Record::Completed(t2)) => t1 == t2,
            _ => false,
        }
    }
}

/// The window during which a subscription to a hot/cold observable was live, as recorded by
/// [`crate::HotObservable`]/[`crate::ColdObservable`]. `unsubscribe_time` is `None` when the
/// subscription was still active by the time the scheduler ran out of scheduled work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionRecord {
    pub subscribe_time: i64,
    pub unsubscribe_time: Option<i64>,
}

impl SubscriptionRecord {
    pub fn new(subscribe_time: i64, unsubscribe_time: i64) -> Self {
        SubscriptionRecord { subscribe_time, unsubscribe_time: Some(unsubscribe_time) }
    }

    pub fn subscribed_forever(subscribe_time: i64) -> Self {
        SubscriptionRecord { subscribe_time, unsubscribe_time: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_compare_by_time_and_payload() {
        assert_eq!(Record::on_next(210, 1), Record::on_next(210, 1));
        assert_ne!(Record::on_next(210, 1), Record::on_next(220, 1));
        assert_eq!(Record::<i32>::on_completed(600), Record::on_completed(600));
    }

    #[test]
    fn matches_kind_ignores_error_message() {
        let a = Record::<i32>::on_error(620, RxError::callback("boom"));
        let b = Record::<i32>::on_error(620, RxError::callback("kaboom"));
        assert!(a.matches_kind(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn subscription_record_defaults_to_open_ended() {
        let rec = SubscriptionRecord::subscribed_forever(200);
        assert_eq!(rec.unsubscribe_time, None);
    }
}
