use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use uuid::Uuid;

use crate::notifier::{
    deferred::{Deferred, Receipt, Settlement, deferred},
    error::{NotifierError, NotifierErrorKind},
    reporters::Reporter,
    scope,
    telemetry::{DiagnosticSink, NotifierEvent, emit},
    types::{Notice, ReporterOptions, panic_message},
};

/// Transport reporter plus auxiliary observers, invoked in that order.
#[derive(Clone)]
pub struct ReporterRegistry {
    transport: Arc<dyn Reporter>,
    auxiliaries: Vec<Arc<dyn Reporter>>,
}

impl ReporterRegistry {
    pub fn new(transport: Arc<dyn Reporter>) -> Self {
        Self {
            transport,
            auxiliaries: Vec::new(),
        }
    }

    pub fn add(&mut self, reporter: Arc<dyn Reporter>) {
        self.auxiliaries.push(reporter);
    }

    pub(crate) fn len(&self) -> usize {
        1 + self.auxiliaries.len()
    }

    /// Hands the notice to every reporter. Only the transport settles `outcome`;
    /// auxiliaries get their own deferred and their results go to `diagnostics`.
    pub fn dispatch(
        &self,
        notice: Notice,
        options: &ReporterOptions,
        outcome: Deferred,
        diagnostics: &Arc<dyn DiagnosticSink>,
    ) {
        let dispatch_id = Uuid::now_v7();
        let span = tracing::debug_span!(
            target: "faultline",
            "notice_dispatch",
            dispatch_id = %dispatch_id,
            reporters = self.len(),
        );
        let _entered = span.enter();

        let transport_guard = outcome.share();
        if let Err(message) = invoke_isolated(self.transport.as_ref(), notice.clone(), options, outcome) {
            let reporter = self.transport.name().to_string();
            transport_guard.settle_with(Err(NotifierError::new(
                NotifierErrorKind::ReporterPanicked,
                format!("reporter '{reporter}' panicked: {message}"),
            )
            .with_reporter(reporter.clone())));
            emit(
                diagnostics.as_ref(),
                NotifierEvent::ReporterPanicked {
                    reporter,
                    auxiliary: false,
                    message,
                },
            );
        }
        drop(transport_guard);

        for reporter in &self.auxiliaries {
            let (aux_outcome, receipt) = deferred();
            match invoke_isolated(reporter.as_ref(), notice.clone(), options, aux_outcome) {
                Ok(()) => watch_auxiliary(reporter.name().to_string(), receipt, diagnostics),
                Err(message) => emit(
                    diagnostics.as_ref(),
                    NotifierEvent::ReporterPanicked {
                        reporter: reporter.name().to_string(),
                        auxiliary: true,
                        message,
                    },
                ),
            }
        }
    }
}

fn invoke_isolated(
    reporter: &dyn Reporter,
    notice: Notice,
    options: &ReporterOptions,
    outcome: Deferred,
) -> Result<(), String> {
    scope::with_pipeline_depth(|| {
        panic::catch_unwind(AssertUnwindSafe(|| reporter.report(notice, options, outcome)))
    })
    .map_err(|payload| panic_message(&*payload))
}

/// Auxiliary outcomes never reach the caller; failures are only observable
/// through the diagnostic sink.
fn watch_auxiliary(reporter: String, mut receipt: Receipt, diagnostics: &Arc<dyn DiagnosticSink>) {
    if let Some(settlement) = receipt.try_outcome() {
        observe_auxiliary(&reporter, settlement, diagnostics.as_ref());
        return;
    }

    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            let diagnostics = Arc::clone(diagnostics);
            runtime.spawn(async move {
                let settlement = receipt.await;
                observe_auxiliary(&reporter, &settlement, diagnostics.as_ref());
            });
        }
        Err(_) => {
            tracing::trace!(target: "faultline", reporter = %reporter, "auxiliary_outcome_unobserved");
        }
    }
}

fn observe_auxiliary(reporter: &str, settlement: &Settlement, diagnostics: &dyn DiagnosticSink) {
    match settlement {
        Ok(_) => {}
        // Fire-and-forget reporters commonly drop their deferred.
        Err(err) if err.kind == NotifierErrorKind::Abandoned => {}
        Err(err) => emit(
            diagnostics,
            NotifierEvent::ReporterFailed {
                reporter: reporter.to_string(),
                auxiliary: true,
                error: err.clone(),
            },
        ),
    }
}
