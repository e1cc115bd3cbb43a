use serde_json::{Value, json};

use crate::notifier::types::{NOTIFIER_NAME, NOTIFIER_URL, Notice};

/// Canonical JSON body for a notice. Filters may have replaced the notice with
/// one lacking notifier identity, so it is restored here when absent.
pub fn notice_payload(notice: &Notice) -> Value {
    let mut context = notice.context.clone();
    context.entry("notifier".to_string()).or_insert_with(|| {
        json!({
            "name": NOTIFIER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "url": NOTIFIER_URL,
        })
    });

    json!({
        "errors": notice.errors,
        "context": context,
        "environment": notice.environment,
        "params": notice.params,
        "session": notice.session,
    })
}
