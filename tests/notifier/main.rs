mod client;
mod normalize;
mod offline;

use std::sync::{Arc, Mutex};

use faultline::{
    Client, ConnectivitySignal, Deferred, Notice, Reporter, ReporterOptions,
    notifier::telemetry::{DiagnosticSink, NotifierEvent},
};

/// Primary reporter that records every notice and accepts it with a sequential id.
#[derive(Default)]
pub struct CapturingReporter {
    notices: Mutex<Vec<Notice>>,
    options: Mutex<Vec<ReporterOptions>>,
}

impl CapturingReporter {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("lock").clone()
    }

    pub fn options(&self) -> Vec<ReporterOptions> {
        self.options.lock().expect("lock").clone()
    }

    pub fn count(&self) -> usize {
        self.notices.lock().expect("lock").len()
    }
}

impl Reporter for CapturingReporter {
    fn name(&self) -> &str {
        "capturing"
    }

    fn report(&self, mut notice: Notice, options: &ReporterOptions, outcome: Deferred) {
        let mut notices = self.notices.lock().expect("lock");
        notices.push(notice.clone());
        notice.id = Some(format!("notice-{}", notices.len()));
        drop(notices);
        self.options.lock().expect("lock").push(options.clone());
        outcome.resolve(notice);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<NotifierEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<NotifierEvent> {
        self.events.lock().expect("lock").clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn on_event(&self, event: &NotifierEvent) {
        self.events.lock().expect("lock").push(event.clone());
    }
}

pub fn capturing_client() -> (Client, Arc<CapturingReporter>) {
    capturing_client_with(ConnectivitySignal::online())
}

pub fn capturing_client_with(signal: ConnectivitySignal) -> (Client, Arc<CapturingReporter>) {
    let reporter = Arc::new(CapturingReporter::default());
    let client = Client::builder()
        .shared_reporter(reporter.clone())
        .connectivity(signal)
        .build()
        .expect("client should build");
    (client, reporter)
}
