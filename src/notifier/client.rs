use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, PoisonError, RwLock, Weak},
    time::Duration,
};

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    config::NotifierConfig,
    notifier::{
        connectivity::{ConnectivityListener, ConnectivitySignal, ConnectivityState, PendingQueue},
        deferred::{Deferred, Receipt, deferred},
        dispatcher::ReporterRegistry,
        error::NotifierError,
        filters::{FilterChain, NoticeFilter},
        monitor::{ConnectivityMonitor, ConnectivityProbe},
        normalizer::{NoticeDefaults, NoticeNormalizer},
        reporters::{Reporter, transport::TransportReporter},
        scope,
        telemetry::{DiagnosticSink, NotifierEvent, TracingDiagnosticSink, emit},
        types::{ErrorLike, Notice, NotifyInput, ReporterOptions},
        wrap::{self, Args, CallResult, Callable},
    },
};

/// Entry point of the notification pipeline.
///
/// Cloning is cheap; clones share filters, reporters, options and the pending queue.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    normalizer: NoticeNormalizer,
    filters: RwLock<FilterChain>,
    reporters: RwLock<ReporterRegistry>,
    options: RwLock<ReporterOptions>,
    connectivity: ConnectivitySignal,
    pending: Mutex<PendingQueue>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

pub struct ClientBuilder {
    options: ReporterOptions,
    defaults: NoticeDefaults,
    start_offline: bool,
    transport: Option<Arc<dyn Reporter>>,
    connectivity: Option<ConnectivitySignal>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            options: ReporterOptions::default(),
            defaults: NoticeDefaults::default(),
            start_offline: false,
            transport: None,
            connectivity: None,
            diagnostics: Arc::new(TracingDiagnosticSink),
        }
    }
}

impl ClientBuilder {
    pub fn config(mut self, config: &NotifierConfig) -> Self {
        self.options = config.reporter_options();
        self.defaults = config.notice_defaults();
        self.start_offline = config.start_offline;
        self
    }

    pub fn options(mut self, options: ReporterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn defaults(mut self, defaults: NoticeDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Replaces the HTTP transport as the primary reporter.
    pub fn reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.transport = Some(Arc::new(reporter));
        self
    }

    pub fn shared_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.transport = Some(reporter);
        self
    }

    /// Shares a host-owned signal. Without one the client starts from
    /// `start_offline` in its config.
    pub fn connectivity(mut self, signal: ConnectivitySignal) -> Self {
        self.connectivity = Some(signal);
        self
    }

    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    pub fn build(self) -> Result<Client, NotifierError> {
        let transport = match self.transport {
            Some(reporter) => reporter,
            None => Arc::new(TransportReporter::new()?),
        };
        let connectivity = self.connectivity.unwrap_or_else(|| {
            if self.start_offline {
                ConnectivitySignal::offline()
            } else {
                ConnectivitySignal::online()
            }
        });

        let inner = Arc::new(ClientInner {
            normalizer: NoticeNormalizer::new(self.defaults),
            filters: RwLock::new(FilterChain::new()),
            reporters: RwLock::new(ReporterRegistry::new(transport)),
            options: RwLock::new(self.options),
            connectivity: connectivity.clone(),
            pending: Mutex::new(PendingQueue::default()),
            diagnostics: self.diagnostics,
        });
        let listener: Weak<dyn ConnectivityListener> = Arc::downgrade(&inner) as Weak<ClientInner>;
        connectivity.subscribe(listener);

        tracing::debug!(
            target: "faultline",
            state = ?connectivity.state(),
            project = ?inner.options_snapshot().project,
            "client_built"
        );
        Ok(Client { inner })
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Client with the HTTP transport reporter, configured from `config`.
    pub fn new(config: &NotifierConfig) -> Result<Self, NotifierError> {
        Self::builder().config(config).build()
    }

    /// Normalizes, filters and dispatches (or queues) one error.
    ///
    /// Runs synchronously up to the point a reporter takes over; the receipt
    /// settles with the transport reporter's outcome, `Ok(None)` on a filter
    /// veto, or the normalization error.
    pub fn notify(&self, input: impl Into<NotifyInput>) -> Receipt {
        self.inner.notify(input.into())
    }

    pub fn add_filter(&self, filter: impl NoticeFilter + 'static) {
        self.write_filters().add(Arc::new(filter));
    }

    /// Adds an auxiliary reporter; it runs after the transport and never
    /// affects the receipt returned by `notify`.
    pub fn add_reporter(&self, reporter: impl Reporter + 'static) {
        self.inner
            .reporters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(Arc::new(reporter));
    }

    /// Replaces project, API key and endpoint for every later dispatch.
    pub fn set_project(
        &self,
        project: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) {
        let mut options = self
            .inner
            .options
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        options.project = Some(project.into());
        options.api_key = Some(api_key.into());
        options.endpoint = Some(endpoint.into());
        tracing::debug!(target: "faultline", project = ?options.project, "project_configured");
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.inner
            .options
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .timeout = timeout;
    }

    /// Snapshot of the options the next dispatch would use.
    pub fn options(&self) -> ReporterOptions {
        self.inner.options_snapshot()
    }

    /// Returns a wrapper around `target`. `target` is not invoked here.
    /// Wrapping an already wrapped callable returns it unchanged.
    pub fn wrap(&self, target: Callable) -> Callable {
        wrap::wrap_callable(self.downgrade(), target)
    }

    /// Invokes `target` once with the capture-then-rethrow behavior of `wrap`.
    pub fn call(&self, target: &Callable, args: Args) -> CallResult {
        wrap::invoke_captured(&self.downgrade(), target, args)
    }

    /// Typed form of `call` for plain Rust closures. `args` is recorded in
    /// `params.arguments` if `f` fails, then passed to `f`.
    pub fn call_result<F, A, T, E>(&self, f: F, args: A) -> Result<T, E>
    where
        F: FnOnce(A) -> Result<T, E>,
        A: Serialize,
        E: std::error::Error,
    {
        let arguments = match serde_json::to_value(&args) {
            Ok(Value::Array(items)) => Value::Array(items),
            Ok(Value::Null) => Value::Array(Vec::new()),
            Ok(other) => Value::Array(vec![other]),
            Err(err) => Value::String(format!("[unserializable arguments: {err}]")),
        };

        let result = scope::with_wrap_depth(|| panic::catch_unwind(AssertUnwindSafe(|| f(args))));
        match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                wrap::report_captured(&self.downgrade(), ErrorLike::from_error(&err), arguments);
                Err(err)
            }
            Err(payload) => {
                wrap::report_captured(
                    &self.downgrade(),
                    ErrorLike::from_panic(&*payload),
                    arguments,
                );
                panic::resume_unwind(payload)
            }
        }
    }

    pub fn is_online(&self) -> bool {
        self.inner.connectivity.is_online()
    }

    pub fn connectivity(&self) -> &ConnectivitySignal {
        &self.inner.connectivity
    }

    /// Number of notices waiting for connectivity.
    pub fn pending_len(&self) -> usize {
        self.inner.lock_pending().len()
    }

    pub fn filter_count(&self) -> usize {
        self.inner
            .filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drives this client's connectivity signal from `probe` until `cancel` fires.
    pub fn spawn_connectivity_monitor(
        &self,
        probe: Arc<dyn ConnectivityProbe>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        ConnectivityMonitor::spawn(self.inner.connectivity.clone(), probe, interval, cancel)
    }

    pub(crate) fn downgrade(&self) -> Weak<ClientInner> {
        Arc::downgrade(&self.inner)
    }

    fn write_filters(&self) -> std::sync::RwLockWriteGuard<'_, FilterChain> {
        self.inner
            .filters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl ClientInner {
    pub(crate) fn notify(&self, input: NotifyInput) -> Receipt {
        scope::with_pipeline_depth(|| self.run_pipeline(input))
    }

    fn run_pipeline(&self, input: NotifyInput) -> Receipt {
        let (outcome, receipt) = deferred();

        let notice = match self.normalizer.normalize(input) {
            Ok(notice) => notice,
            Err(err) => {
                emit(
                    self.diagnostics.as_ref(),
                    NotifierEvent::NoticeRejected {
                        kind: err.kind,
                        message: err.message.clone(),
                    },
                );
                outcome.reject(err);
                return receipt;
            }
        };

        // Filters and reporters run on snapshots so they may call back into the client.
        let filters = self
            .filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(notice) = filters.run(notice) else {
            emit(self.diagnostics.as_ref(), NotifierEvent::NoticeVetoed);
            outcome.resolve_vetoed();
            return receipt;
        };

        self.submit(notice, outcome);
        receipt
    }

    fn submit(&self, notice: Notice, outcome: Deferred) {
        {
            let mut pending = self.lock_pending();
            // A non-empty queue means a drain is due; joining it keeps FIFO order.
            if !self.connectivity.is_online() || !pending.is_empty() {
                let queued = pending.push(notice, outcome);
                drop(pending);
                emit(
                    self.diagnostics.as_ref(),
                    NotifierEvent::NoticeQueued { pending: queued },
                );
                return;
            }
        }
        self.dispatch(notice, outcome);
    }

    fn dispatch(&self, notice: Notice, outcome: Deferred) {
        let options = self.options_snapshot();
        let reporters = self
            .reporters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        reporters.dispatch(notice, &options, outcome, &self.diagnostics);
    }

    fn drain(&self) {
        let entries = self.lock_pending().take_all();
        let count = entries.len();
        if count == 0 {
            return;
        }

        tracing::info!(target: "faultline", count = count, "pending_queue_drain_start");
        for entry in entries {
            self.dispatch(entry.notice, entry.outcome);
        }
        emit(self.diagnostics.as_ref(), NotifierEvent::QueueDrained { count });
    }

    fn options_snapshot(&self) -> ReporterOptions {
        self.options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, PendingQueue> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConnectivityListener for ClientInner {
    fn on_transition(&self, state: ConnectivityState) {
        emit(
            self.diagnostics.as_ref(),
            NotifierEvent::ConnectivityChanged { state },
        );
        if state.is_online() {
            scope::with_pipeline_depth(|| self.drain());
        }
    }
}
