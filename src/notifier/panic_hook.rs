use std::{backtrace::Backtrace, panic, sync::Arc, thread};

use serde_json::json;

use crate::notifier::{
    client::{Client, ClientInner},
    scope,
    types::{ErrorLike, NotifyInput, WrappedError},
};

const REPORT_THREAD_NAME: &str = "faultline-panic-report";

/// Reports every panic through `client`, then runs the previously installed hook.
///
/// Panics inside a wrapped callable are skipped here; the wrapper reports them.
/// Panics raised by filters, reporters or sinks are skipped too, since the
/// pipeline contains them. The client is held weakly, so dropping every
/// `Client` handle turns the hook into a pass-through.
pub fn install_panic_hook(client: &Client) {
    let weak = client.downgrade();
    let previous = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        if !scope::inside_wrapper()
            && !scope::inside_pipeline()
            && let Some(inner) = weak.upgrade()
        {
            let mut error = ErrorLike::from_panic(info.payload())
                .with_stack(Backtrace::force_capture().to_string());
            if error.message.is_empty() {
                error.message = "panic".to_string();
            }

            let mut wrapped = WrappedError::new(error);
            if let Some(location) = info.location() {
                wrapped = wrapped.with_context(
                    "panic_location",
                    json!(format!(
                        "{}:{}:{}",
                        location.file(),
                        location.line(),
                        location.column()
                    )),
                );
            }
            if let Some(name) = thread::current().name() {
                wrapped = wrapped.with_context("thread", name);
            }

            report_detached(inner, wrapped.into());
        }
        previous(info);
    }));

    tracing::debug!(target: "faultline", "panic_hook_installed");
}

/// A second panic on a thread that is already running its panic hook aborts
/// the process, so the report runs on a helper thread and is joined.
fn report_detached(inner: Arc<ClientInner>, input: NotifyInput) {
    let spawned = thread::Builder::new()
        .name(REPORT_THREAD_NAME.to_string())
        .spawn(move || {
            let _receipt = inner.notify(input);
        });

    match spawned {
        Ok(handle) => {
            if handle.join().is_err() {
                tracing::warn!(target: "faultline", "panic_report_failed");
            }
        }
        Err(err) => {
            tracing::warn!(target: "faultline", error = %err, "panic_report_thread_spawn_failed");
        }
    }
}
