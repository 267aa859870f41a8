use serde::{Deserialize, Serialize};

use rx_common::RxError;

use crate::observer::Observer;

/// A tagged value standing in for one of the three observer signals, for `materialize`/
/// `dematerialize` round-trips. Serializable whenever `T` is, so a recorded notification
/// trace can be persisted or shipped across a wire rather than only replayed in-process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Notification<T> {
    Next(T),
    Error(RxError),
    Completed,
}

impl<T> Notification<T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Next(_))
    }

    /// Replay this notification onto `observer`, as `dematerialize` does for each recorded
    /// value.
    pub fn deliver(self, observer: &dyn Observer<T>) {
        match self {
            Notification::Next(value) => observer.on_next(value),
            Notification::Error(error) => observer.on_error(error),
            Notification::Completed => observer.on_completed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_next_is_non_terminal() {
        assert!(!Notification::<i32>::Next(1).is_terminal());
        assert!(Notification::<i32>::Completed.is_terminal());
        assert!(Notification::<i32>::Error(RxError::EmptySequence).is_terminal());
    }

    #[test]
    fn serde_round_trip_preserves_every_variant() {
        for notification in [
            Notification::Next(7),
            Notification::Completed,
            Notification::Error(RxError::callback("boom")),
        ] {
            let wire = serde_json::to_string(&notification).expect("Notification serializes");
            let back: Notification<i32> = serde_json::from_str(&wire).expect("Notification deserializes");
            assert_eq!(back.is_terminal(), notification.is_terminal());
        }
    }
}
