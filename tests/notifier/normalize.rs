use faultline::{ErrorLike, NotifierErrorKind, WrappedError};
use serde_json::json;

use crate::capturing_client;

#[test]
fn given_string_input_when_notify_then_message_is_kept_and_stack_is_captured_at_call_site() {
    let (client, reporter) = capturing_client();

    fn notify_from_fixed_depth(client: &faultline::Client) {
        let _ = client.notify("boom");
    }
    notify_from_fixed_depth(&client);
    notify_from_fixed_depth(&client);

    let notices = reporter.notices();
    assert_eq!(notices.len(), 2);
    let first = &notices[0].errors[0];
    assert_eq!(first.message, "boom");
    assert_eq!(first.type_name, "");
    assert!(!first.backtrace.is_empty(), "string input should capture a stack");
    assert_eq!(first.backtrace.len(), notices[1].errors[0].backtrace.len());
    assert!(
        first
            .backtrace
            .iter()
            .all(|frame| !frame.function.starts_with("faultline::notifier::normalizer::")),
        "pipeline frames must be skipped"
    );
}

#[test]
fn given_unreportable_browser_message_when_notify_then_reporter_is_not_called() {
    let (client, reporter) = capturing_client();

    for message in ["Script error", "InvalidAccessError"] {
        let mut receipt = client.notify(ErrorLike::new("Error", message));
        let Some(Err(err)) = receipt.try_outcome() else {
            panic!("'{message}' should reject");
        };
        assert_eq!(err.kind, NotifierErrorKind::Unreportable);
    }
    assert_eq!(reporter.count(), 0);
}

#[test]
fn given_unreportable_plain_string_when_notify_then_it_is_rejected_before_dispatch() {
    let (client, reporter) = capturing_client();

    for message in ["Script error", "InvalidAccessError"] {
        let mut receipt = client.notify(message);
        let Some(Err(err)) = receipt.try_outcome() else {
            panic!("'{message}' should reject");
        };
        assert_eq!(err.kind, NotifierErrorKind::Unreportable);
    }
    assert_eq!(reporter.count(), 0);
    assert_eq!(client.pending_len(), 0);
}

#[test]
fn given_uncaught_prefix_when_notify_then_type_and_message_are_split() {
    let (client, reporter) = capturing_client();
    let _ = client.notify(ErrorLike::new("Error", "Uncaught SyntaxError: Unexpected token"));

    let error = &reporter.notices()[0].errors[0];
    assert_eq!(error.type_name, "SyntaxError");
    assert_eq!(error.message, "Unexpected token");
}

#[test]
fn given_injector_message_when_notify_then_code_becomes_type_and_detail_keeps_newlines() {
    let (client, reporter) = capturing_client();
    let _ = client.notify(ErrorLike::new(
        "Error",
        "[$injector:undef] Provider '$exceptionHandler' must return a value\nhttp://errors.angularjs.org/1.4.3/$injector/undef",
    ));

    let error = &reporter.notices()[0].errors[0];
    assert_eq!(error.type_name, "$injector:undef");
    assert_eq!(
        error.message,
        "Provider '$exceptionHandler' must return a value\nhttp://errors.angularjs.org/1.4.3/$injector/undef"
    );
}

#[test]
fn given_empty_or_missing_error_when_notify_then_receipt_names_offending_value() {
    let (client, reporter) = capturing_client();

    let mut empty = client.notify("");
    let Some(Err(err)) = empty.try_outcome() else {
        panic!("empty string should reject");
    };
    assert_eq!(err.to_string(), r#"notify: got err="", wanted an Error"#);
    assert_eq!(err.kind, NotifierErrorKind::InvalidInput);

    let mut missing = client.notify(WrappedError::missing().with_param("page", 1));
    let Some(Err(err)) = missing.try_outcome() else {
        panic!("missing wrapped error should reject");
    };
    assert_eq!(err.to_string(), "notify: got err=null, wanted an Error");

    assert_eq!(reporter.count(), 0);
}

#[test]
fn given_error_with_stack_when_notify_then_frames_are_parsed() {
    let (client, reporter) = capturing_client();
    let error = ErrorLike::new("TypeError", "x is undefined").with_stack(
        "TypeError: x is undefined\n    at render (https://example.com/app.js:10:4)\n    at https://example.com/vendor.js:3:1",
    );
    let _ = client.notify(error);

    let record = &reporter.notices()[0].errors[0];
    assert_eq!(record.type_name, "TypeError");
    assert_eq!(record.backtrace.len(), 2);
    assert_eq!(record.backtrace[0].function, "render");
    assert_eq!(record.backtrace[0].file, "https://example.com/app.js");
    assert_eq!(record.backtrace[0].line, 10);
    assert_eq!(record.backtrace[0].column, 4);
    assert_eq!(record.backtrace[1].function, "");
}

#[test]
fn given_rust_error_with_source_when_notify_then_causes_follow_primary_error() {
    let (client, reporter) = capturing_client();
    let source = "80x".parse::<u16>().expect_err("must fail");
    let _ = client.notify(ErrorLike::new("ConfigError", "invalid port").with_cause(ErrorLike::from_error(&source)));

    let errors = &reporter.notices()[0].errors;
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].message, "invalid port");
    assert!(!errors[0].backtrace.is_empty());
    assert_eq!(errors[1].type_name, "ParseIntError");
    assert!(errors[1].backtrace.is_empty());
}

#[test]
fn given_wrapped_error_when_notify_then_sibling_maps_are_merged_and_builtin_context_is_kept() {
    let (client, reporter) = capturing_client();
    let _ = client.notify(
        WrappedError::new("boom")
            .with_context("url", "https://example.com/cart")
            .with_environment("release", "1.2.3")
            .with_param("cart_id", 42)
            .with_session("user", json!({"id": 7})),
    );

    let notice = &reporter.notices()[0];
    assert_eq!(notice.context["url"], json!("https://example.com/cart"));
    assert_eq!(notice.context["language"], json!("Rust"));
    assert_eq!(notice.context["notifier"]["name"], json!("faultline"));
    assert_eq!(notice.environment["release"], json!("1.2.3"));
    assert_eq!(notice.params["cart_id"], json!(42));
    assert_eq!(notice.session["user"]["id"], json!(7));
}
