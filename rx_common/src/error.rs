use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The error type carried on the `on_error` channel of every observable in this workspace.
///
/// `RxError` is cheaply cloneable (`Clone` via `Arc`) because a single error may need to be
/// delivered to more than one downstream observer — a subject fanning out to several
/// subscribers, or `merge_delay_error` folding several source errors into one `Composite`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RxError {
    /// A user-supplied callback (selector, predicate, accumulator, ...) panicked or
    /// returned an error while processing a notification.
    #[error("{0}")]
    Callback(Arc<str>),

    /// An arbitrary external error, preserved via type erasure.
    #[error(transparent)]
    External(Arc<dyn std::error::Error + Send + Sync>),

    /// `merge_delay_error` collected one or more upstream errors and is now delivering all
    /// of them together, in arrival order.
    #[error("{} source error(s): {}", .0.len(), join_display(.0))]
    Composite(Arc<[RxError]>),

    /// A terminal reducer (`first`, `last`, `element_at`, `aggregate` without a seed, ...)
    /// was asked for a value that does not exist.
    #[error("sequence contains no elements")]
    EmptySequence,

    /// `element_at` was called with an index the source never reached.
    #[error("index {0} out of range")]
    IndexOutOfRange(usize),

    /// An operator reached a terminal state that the caller is not allowed to retry
    /// (e.g. `retry` exhausted its budget, or a subject already completed/erred).
    #[error("{0}")]
    Terminal(Arc<str>),
}

fn join_display(errors: &[RxError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl RxError {
    /// Build a [`RxError::Callback`] from any displayable payload.
    pub fn callback(message: impl Into<String>) -> Self {
        RxError::Callback(Arc::from(message.into()))
    }

    /// Wrap an arbitrary error, preserving it behind a trait object.
    pub fn external(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        RxError::External(Arc::new(error))
    }

    /// Build a [`RxError::Terminal`] from any displayable payload.
    pub fn terminal(message: impl Into<String>) -> Self {
        RxError::Terminal(Arc::from(message.into()))
    }

    /// Fold a non-empty list of errors into a single [`RxError::Composite`], preserving
    /// arrival order. Panics if `errors` is empty — callers (`merge_delay_error`) only
    /// invoke this once they know at least one source failed.
    pub fn composite(errors: Vec<RxError>) -> Self {
        assert!(!errors.is_empty(), "composite error requires at least one source error");
        RxError::Composite(Arc::from(errors))
    }

    /// The individual errors folded into a [`RxError::Composite`], if this is one.
    pub fn sources(&self) -> &[RxError] {
        match self {
            RxError::Composite(errors) => errors,
            other => std::slice::from_ref(other),
        }
    }
}

/// The over-the-wire shape of an [`RxError`]. `External`'s trait object has no generic
/// serialization, so it is rendered down to its display string — deserializing one back
/// produces a `Callback` carrying that string rather than the original error type.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum WireError {
    Callback(String),
    External(String),
    Composite(Vec<WireError>),
    EmptySequence,
    IndexOutOfRange(usize),
    Terminal(String),
}

impl From<&RxError> for WireError {
    fn from(error: &RxError) -> Self {
        match error {
            RxError::Callback(msg) => WireError::Callback(msg.to_string()),
            RxError::External(err) => WireError::External(err.to_string()),
            RxError::Composite(errors) => {
                WireError::Composite(errors.iter().map(WireError::from).collect())
            }
            RxError::EmptySequence => WireError::EmptySequence,
            RxError::IndexOutOfRange(i) => WireError::IndexOutOfRange(*i),
            RxError::Terminal(msg) => WireError::Terminal(msg.to_string()),
        }
    }
}

impl From<WireError> for RxError {
    fn from(wire: WireError) -> Self {
        match wire {
            WireError::Callback(msg) => RxError::callback(msg),
            WireError::External(msg) => RxError::callback(msg),
            WireError::Composite(errors) => {
                RxError::Composite(Arc::from(errors.into_iter().map(RxError::from).collect::<Vec<_>>()))
            }
            WireError::EmptySequence => RxError::EmptySequence,
            WireError::IndexOutOfRange(i) => RxError::IndexOutOfRange(i),
            WireError::Terminal(msg) => RxError::terminal(msg),
        }
    }
}

impl Serialize for RxError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireError::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RxError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        WireError::deserialize(deserializer).map(RxError::from)
    }
}

impl PartialEq for RxError {
    fn eq(&self, other: &Self) -> bool {
        // Structural comparisons here only ever serve test assertions against recorded
        // virtual-time traces, so we compare by rendered message rather than chasing
        // trait-object identity.
        self.to_string() == other.to_string()
    }
}

/// Run a user-supplied callback, turning a panic into a [`RxError::Callback`] instead of
/// unwinding through the observer chain. Shared by every crate that invokes caller-supplied
/// predicates/selectors/factories at a subscription boundary (§7 kind 1 and kind 3).
pub fn guarded<R>(f: impl FnOnce() -> R) -> Result<R, RxError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| RxError::callback(panic_message(payload)))
}

/// Convenience marker used by operators that need to format a callback panic payload.
pub fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked with a non-string payload".to_string()
    }
}

impl fmt::Display for ErrorKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKindTag::Callback => "callback",
            ErrorKindTag::External => "external",
            ErrorKindTag::Composite => "composite",
            ErrorKindTag::EmptySequence => "empty_sequence",
            ErrorKindTag::IndexOutOfRange => "index_out_of_range",
            ErrorKindTag::Terminal => "terminal",
        };
        f.write_str(s)
    }
}

/// A stable, serializable tag for an [`RxError`]'s kind, independent of its payload.
/// Used by the virtual-time test harness to assert on error *kind* without requiring
/// exact message equality (see `record_format` in the top-level crate docs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKindTag {
    Callback,
    External,
    Composite,
    EmptySequence,
    IndexOutOfRange,
    Terminal,
}

impl RxError {
    /// The stable kind tag for this error, for use in wire/test record formats.
    pub fn kind(&self) -> ErrorKindTag {
        match self {
            RxError::Callback(_) => ErrorKindTag::Callback,
            RxError::External(_) => ErrorKindTag::External,
            RxError::Composite(_) => ErrorKindTag::Composite,
            RxError::EmptySequence => ErrorKindTag::EmptySequence,
            RxError::IndexOutOfRange(_) => ErrorKindTag::IndexOutOfRange,
            RxError::Terminal(_) => ErrorKindTag::Terminal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_error_displays_message() {
        let err = RxError::callback("predicate threw");
        assert_eq!(err.to_string(), "predicate threw");
        assert_eq!(err.kind(), ErrorKindTag::Callback);
    }

    #[test]
    fn composite_joins_sources_in_order() {
        let err = RxError::composite(vec![
            RxError::callback("first"),
            RxError::callback("second"),
        ]);
        assert_eq!(err.sources().len(), 2);
        assert!(err.to_string().contains("first"));
        assert!(err.to_string().contains("second"));
        assert_eq!(err.kind(), ErrorKindTag::Composite);
    }

    #[test]
    #[should_panic(expected = "at least one source error")]
    fn composite_requires_non_empty() {
        RxError::composite(vec![]);
    }

    #[test]
    fn non_composite_sources_is_itself() {
        let err = RxError::EmptySequence;
        assert_eq!(err.sources().len(), 1);
    }

    #[test]
    fn serde_round_trip_preserves_kind_and_message() {
        let err = RxError::composite(vec![RxError::callback("first"), RxError::terminal("second")]);
        let wire = serde_json::to_string(&err).expect("RxError serializes");
        let back: RxError = serde_json::from_str(&wire).expect("RxError deserializes");
        assert_eq!(back.to_string(), err.to_string());
        assert_eq!(back.kind(), err.kind());
    }

    #[test]
    fn serde_round_trip_of_external_falls_back_to_its_display_string() {
        let err = RxError::external(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        let wire = serde_json::to_string(&err).unwrap();
        let back: RxError = serde_json::from_str(&wire).unwrap();
        assert_eq!(back.to_string(), err.to_string());
        assert_eq!(back.kind(), ErrorKindTag::Callback);
    }

    proptest::proptest! {
        #[test]
        fn serde_round_trip_preserves_display_for_any_callback_message(message in ".*") {
            let err = RxError::callback(message);
            let wire = serde_json::to_string(&err).unwrap();
            let back: RxError = serde_json::from_str(&wire).unwrap();
            proptest::prop_assert_eq!(back.to_string(), err.to_string());
        }
    }

    /// `guarded` returns a plain `Result<_, RxError>`, which is exactly what `anyhow::Context`
    /// is built to annotate — this is the bridge a binary wiring this crate into a CLI would use.
    #[test]
    fn guarded_errors_compose_with_anyhow_context() -> anyhow::Result<()> {
        use anyhow::Context;

        let result: Result<(), RxError> = guarded(|| panic!("boom"));
        let err = result.context("while running the scheduled callback").unwrap_err();
        assert!(err.to_string().contains("while running the scheduled callback"));
        Ok(())
    }
}
