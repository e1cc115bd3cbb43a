//! Client-side error notifier.
//!
//! `notify` turns an error into a [`Notice`], runs it through the consumer's
//! filters and hands it to the transport reporter plus any auxiliary reporters.
//! Notices submitted while offline are held and replayed in order once the
//! connectivity signal comes back online. `wrap` and `call` capture errors and
//! panics raised inside callables and feed them into the same pipeline.

pub mod config;
pub mod logging;
pub mod notifier;

pub use config::{LoggingConfig, NotifierConfig, ProbeConfig};
pub use notifier::{
    client::{Client, ClientBuilder},
    connectivity::{ConnectivitySignal, ConnectivityState},
    deferred::{Deferred, Receipt, Settlement},
    error::{NotifierError, NotifierErrorKind},
    filters::NoticeFilter,
    panic_hook::install_panic_hook,
    reporters::Reporter,
    types::{ErrorLike, ErrorRecord, Notice, NotifyInput, ReporterOptions, StackFrame, WrappedError},
    wrap::{Arg, Args, CallResult, Callable},
};
