pub mod backtrace;
pub mod client;
pub mod connectivity;
pub mod deferred;
pub mod dispatcher;
pub mod error;
pub mod filters;
pub mod monitor;
pub mod normalizer;
pub mod panic_hook;
pub mod reporters;
pub mod scope;
pub mod telemetry;
pub mod types;
pub mod wrap;
