//! Shared error vocabulary for the rx workspace.
//!
//! Every crate in the workspace (subscription graph, scheduler family, observable core,
//! operators, subjects, coordination) speaks the same error type so that an error raised
//! deep inside an operator chain can cross crate boundaries without translation.

mod error;

pub use error::{guarded, panic_message, ErrorKindTag, RxError};
