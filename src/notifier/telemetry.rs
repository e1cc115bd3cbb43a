use std::panic::{self, AssertUnwindSafe};

use crate::notifier::{
    connectivity::ConnectivityState,
    error::{NotifierError, NotifierErrorKind},
    scope,
};

#[derive(Debug, Clone)]
pub enum NotifierEvent {
    NoticeRejected {
        kind: NotifierErrorKind,
        message: String,
    },
    NoticeVetoed,
    NoticeQueued {
        pending: usize,
    },
    QueueDrained {
        count: usize,
    },
    ConnectivityChanged {
        state: ConnectivityState,
    },
    ReporterFailed {
        reporter: String,
        auxiliary: bool,
        error: NotifierError,
    },
    ReporterPanicked {
        reporter: String,
        auxiliary: bool,
        message: String,
    },
}

/// Optional observer of pipeline events. Nothing in the pipeline depends on it.
pub trait DiagnosticSink: Send + Sync {
    fn on_event(&self, event: &NotifierEvent);
}

#[derive(Default)]
pub struct NoopDiagnosticSink;

impl DiagnosticSink for NoopDiagnosticSink {
    fn on_event(&self, _event: &NotifierEvent) {}
}

#[derive(Default)]
pub struct TracingDiagnosticSink;

impl DiagnosticSink for TracingDiagnosticSink {
    fn on_event(&self, event: &NotifierEvent) {
        match event {
            NotifierEvent::NoticeRejected { kind, message } => {
                tracing::debug!(target: "faultline", kind = ?kind, error = %message, "notice_rejected");
            }
            NotifierEvent::NoticeVetoed => {
                tracing::debug!(target: "faultline", "notice_vetoed");
            }
            NotifierEvent::NoticeQueued { pending } => {
                tracing::debug!(target: "faultline", pending = pending, "notice_queued");
            }
            NotifierEvent::QueueDrained { count } => {
                tracing::info!(target: "faultline", count = count, "queue_drained");
            }
            NotifierEvent::ConnectivityChanged { state } => {
                tracing::info!(target: "faultline", state = ?state, "connectivity_changed");
            }
            NotifierEvent::ReporterFailed {
                reporter,
                auxiliary,
                error,
            } => {
                tracing::warn!(
                    target: "faultline",
                    reporter = %reporter,
                    auxiliary = auxiliary,
                    kind = ?error.kind,
                    http_status = ?error.http_status,
                    error = %error.message,
                    "reporter_failed"
                );
            }
            NotifierEvent::ReporterPanicked {
                reporter,
                auxiliary,
                message,
            } => {
                tracing::error!(
                    target: "faultline",
                    reporter = %reporter,
                    auxiliary = auxiliary,
                    panic = %message,
                    "reporter_panicked"
                );
            }
        }
    }
}

/// Delivers an event, containing any panic raised by the sink.
pub(crate) fn emit(sink: &dyn DiagnosticSink, event: NotifierEvent) {
    let delivered = scope::with_pipeline_depth(|| {
        panic::catch_unwind(AssertUnwindSafe(|| sink.on_event(&event)))
    });
    if delivered.is_err() {
        tracing::warn!(target: "faultline", "diagnostic_sink_panicked");
    }
}
