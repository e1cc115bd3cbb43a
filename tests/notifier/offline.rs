use std::sync::Arc;

use faultline::{Client, ConnectivitySignal, NotifierConfig, notifier::telemetry::NotifierEvent};

use crate::{CapturingReporter, RecordingSink, capturing_client_with, transport::serve_once};

#[tokio::test]
async fn given_offline_when_notify_then_reporters_wait_until_online_and_replay_in_order() {
    let signal = ConnectivitySignal::offline();
    let (client, reporter) = capturing_client_with(signal.clone());

    let mut receipts: Vec<_> = ["first", "second", "third"]
        .into_iter()
        .map(|message| client.notify(message))
        .collect();

    assert_eq!(reporter.count(), 0);
    assert_eq!(client.pending_len(), 3);
    assert!(receipts.iter_mut().all(|receipt| !receipt.is_settled()));

    assert!(signal.set_online());

    let messages: Vec<_> = reporter
        .notices()
        .into_iter()
        .map(|notice| notice.errors[0].message.clone())
        .collect();
    assert_eq!(messages, vec!["first", "second", "third"]);
    assert_eq!(client.pending_len(), 0);

    for receipt in receipts {
        let notice = receipt
            .await
            .expect("queued notice should be delivered")
            .expect("queued notice should not be vetoed");
        assert!(notice.id.is_some());
    }
}

#[test]
fn given_online_to_offline_when_transition_then_nothing_is_dispatched() {
    let signal = ConnectivitySignal::online();
    let (client, reporter) = capturing_client_with(signal.clone());

    assert!(signal.set_offline());
    assert!(!client.is_online());
    assert_eq!(reporter.count(), 0);

    let _ = client.notify("while offline");
    assert_eq!(reporter.count(), 0);
    assert_eq!(client.pending_len(), 1);
}

#[test]
fn given_repeated_online_signal_when_already_online_then_no_second_drain_happens() {
    let signal = ConnectivitySignal::offline();
    let (client, reporter) = capturing_client_with(signal.clone());

    let _ = client.notify("queued");
    assert!(signal.set_online());
    assert!(!signal.set_online());

    assert_eq!(reporter.count(), 1);
    assert_eq!(client.pending_len(), 0);
}

#[test]
fn given_vetoed_or_invalid_notice_when_offline_then_nothing_is_queued() {
    let (client, _reporter) = capturing_client_with(ConnectivitySignal::offline());
    client.add_filter(|notice: faultline::Notice| {
        (notice.errors[0].message != "vetoed").then_some(notice)
    });

    let _ = client.notify("vetoed");
    let _ = client.notify("");
    assert_eq!(client.pending_len(), 0);
}

#[test]
fn given_options_changed_while_offline_when_drained_then_current_options_are_used() {
    let signal = ConnectivitySignal::offline();
    let (client, reporter) = capturing_client_with(signal.clone());

    let _ = client.notify("queued");
    client.set_project("storefront", "secret", "https://faultline.example.com");
    signal.set_online();

    assert_eq!(reporter.options()[0].project.as_deref(), Some("storefront"));
}

#[test]
fn given_shared_signal_when_two_clients_queue_then_both_drain_on_reconnect() {
    let signal = ConnectivitySignal::offline();
    let (first, first_reporter) = capturing_client_with(signal.clone());
    let (second, second_reporter) = capturing_client_with(signal.clone());

    let _ = first.notify("from first");
    let _ = second.notify("from second");
    signal.set_online();

    assert_eq!(first_reporter.count(), 1);
    assert_eq!(second_reporter.count(), 1);
}

#[test]
fn given_start_offline_config_when_built_without_signal_then_client_queues() {
    let config = NotifierConfig::parse("{ start_offline: true }").expect("config should parse");
    let sink = Arc::new(RecordingSink::default());
    let reporter = Arc::new(CapturingReporter::default());
    let client = Client::builder()
        .config(&config)
        .shared_reporter(reporter.clone())
        .diagnostics(sink.clone())
        .build()
        .expect("client should build");

    let _ = client.notify("queued");
    assert!(!client.is_online());
    assert_eq!(reporter.count(), 0);

    client.connectivity().set_online();
    assert_eq!(reporter.count(), 1);

    let events = sink.events();
    assert!(events
        .iter()
        .any(|event| matches!(event, NotifierEvent::NoticeQueued { pending: 1 })));
    assert!(events
        .iter()
        .any(|event| matches!(event, NotifierEvent::QueueDrained { count: 1 })));
}

#[tokio::test]
async fn given_transport_client_when_drained_from_plain_thread_then_queued_notice_is_delivered() {
    let (endpoint, server) = serve_once(201, r#"{"id": "n-7"}"#).await;
    let signal = ConnectivitySignal::offline();
    let client = Client::builder()
        .connectivity(signal.clone())
        .build()
        .expect("client should build");
    client.set_project("storefront", "secret-key", endpoint);

    let receipt = client.notify("queued while offline");
    let drained = std::thread::spawn(move || signal.set_online())
        .join()
        .expect("drain thread should finish");
    assert!(drained);

    let notice = receipt
        .await
        .expect("queued notice should be delivered")
        .expect("queued notice should not be vetoed");
    assert_eq!(notice.id.as_deref(), Some("n-7"));

    let request = server.await.expect("server task");
    assert_eq!(request.body["errors"][0]["message"], "queued while offline");
}
