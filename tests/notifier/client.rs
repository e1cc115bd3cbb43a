use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use faultline::{
    Client, ConnectivitySignal, Deferred, Notice, NotifierConfig, NotifierErrorKind,
    ReporterOptions,
    notifier::{error::internal_error, reporters::console::ConsoleReporter, telemetry::NotifierEvent},
};

use crate::{CapturingReporter, RecordingSink, capturing_client};

#[test]
fn given_no_configuration_when_client_built_then_timeout_defaults_to_ten_seconds() {
    let (client, reporter) = capturing_client();
    assert_eq!(client.options().timeout, Duration::from_millis(10_000));
    assert!(client.options().project.is_none());

    let _ = client.notify("boom");
    let options = reporter.options();
    assert_eq!(options[0].timeout, Duration::from_millis(10_000));
}

#[test]
fn given_set_project_when_notify_then_reporters_receive_the_new_options() {
    let (client, reporter) = capturing_client();
    client.set_project("storefront", "secret", "https://faultline.example.com/v0");

    let _ = client.notify("boom");

    let options = &reporter.options()[0];
    assert_eq!(options.project.as_deref(), Some("storefront"));
    assert_eq!(options.api_key.as_deref(), Some("secret"));
    assert_eq!(options.endpoint.as_deref(), Some("https://faultline.example.com/v0"));
}

#[test]
fn given_config_when_client_built_then_defaults_flow_into_options_and_notices() {
    let config = NotifierConfig::parse(
        r#"{
  project: "storefront",
  timeout_ms: 2500,
  context: { rootDirectory: "/srv/app" },
  environment: { release: "1.2.3" },
}"#,
    )
    .expect("config should parse");
    let reporter = Arc::new(CapturingReporter::default());
    let client = Client::builder()
        .config(&config)
        .shared_reporter(reporter.clone())
        .build()
        .expect("client should build");

    let _ = client.notify("boom");

    let notice = &reporter.notices()[0];
    assert_eq!(notice.context["rootDirectory"], "/srv/app");
    assert_eq!(notice.environment["release"], "1.2.3");
    assert_eq!(reporter.options()[0].timeout, Duration::from_millis(2500));
    assert_eq!(reporter.options()[0].project.as_deref(), Some("storefront"));
}

#[tokio::test]
async fn given_transport_accepts_when_notify_then_receipt_resolves_with_assigned_id() {
    let (client, _reporter) = capturing_client();

    let notice = client
        .notify("boom")
        .await
        .expect("notify should succeed")
        .expect("notice should not be vetoed");
    assert_eq!(notice.id.as_deref(), Some("notice-1"));
}

#[test]
fn given_custom_reporter_when_notify_then_it_runs_after_the_transport() {
    let (client, reporter) = capturing_client();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let custom_seen = Arc::clone(&seen);
    let transport = Arc::clone(&reporter);
    client.add_reporter(move |notice: Notice, _: &ReporterOptions, outcome: Deferred| {
        custom_seen
            .lock()
            .expect("lock")
            .push((notice.errors[0].message.clone(), transport.count()));
        outcome.resolve(notice);
    });

    let _ = client.notify("boom");

    assert_eq!(*seen.lock().expect("lock"), vec![("boom".to_string(), 1)]);
}

#[tokio::test]
async fn given_auxiliary_reporter_fails_when_notify_then_caller_sees_transport_outcome() {
    let sink = Arc::new(RecordingSink::default());
    let reporter = Arc::new(CapturingReporter::default());
    let client = Client::builder()
        .shared_reporter(reporter.clone())
        .connectivity(ConnectivitySignal::online())
        .diagnostics(sink.clone())
        .build()
        .expect("client should build");
    client.add_reporter(|_: Notice, _: &ReporterOptions, outcome: Deferred| {
        outcome.reject(internal_error("dashboard unavailable"));
    });

    let settlement = client.notify("boom").await;
    assert!(matches!(settlement, Ok(Some(_))));

    let failures: Vec<_> = sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            NotifierEvent::ReporterFailed {
                auxiliary: true,
                error,
                ..
            } => Some(error.message),
            _ => None,
        })
        .collect();
    assert_eq!(failures, vec!["dashboard unavailable".to_string()]);
}

#[test]
fn given_transport_rejects_when_notify_then_receipt_rejects_with_that_error() {
    let client = Client::builder()
        .reporter(|_: Notice, _: &ReporterOptions, outcome: Deferred| {
            outcome.reject(internal_error("server said no"));
        })
        .build()
        .expect("client should build");

    let mut receipt = client.notify("boom");
    let Some(Err(err)) = receipt.try_outcome() else {
        panic!("receipt should reject");
    };
    assert_eq!(err.message, "server said no");
}

#[tokio::test]
async fn given_transport_drops_outcome_when_notify_then_receipt_is_abandoned() {
    let client = Client::builder()
        .reporter(|_: Notice, _: &ReporterOptions, _: Deferred| {})
        .build()
        .expect("client should build");

    let err = client.notify("boom").await.expect_err("receipt should fail");
    assert_eq!(err.kind, NotifierErrorKind::Abandoned);
}

#[test]
fn given_console_reporter_when_notify_then_errors_are_rendered() {
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let (client, _reporter) = capturing_client();
    let buffer = SharedBuffer::default();
    client.add_reporter(ConsoleReporter::with_writer(buffer.clone()));

    let _ = client.notify(
        faultline::ErrorLike::new("TypeError", "x is undefined")
            .with_stack("    at render (app.js:10:4)"),
    );

    let output = String::from_utf8(buffer.0.lock().expect("lock").clone()).expect("utf8");
    assert_eq!(output, "x is undefined\n at render in app.js:10:4\n\n");
}
