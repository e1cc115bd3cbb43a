use std::time::Duration;

use reqwest::{Client, header};
use serde_json::Value;
use tokio::runtime::Handle;
use uuid::Uuid;

use crate::notifier::{
    deferred::Deferred,
    error::{
        NotifierError, NotifierErrorKind, internal_error, missing_configuration, transport_failure,
    },
    reporters::{Reporter, payload::notice_payload},
    types::{Notice, ReporterOptions},
};

pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Primary reporter: one HTTP POST per notice to `<endpoint>/projects/<project>/errors`.
///
/// Requests run on the tokio runtime that was current when the reporter was
/// built, so reports from host threads without a runtime still go out.
#[derive(Clone)]
pub struct TransportReporter {
    client: Client,
    runtime: Option<Handle>,
}

impl TransportReporter {
    pub fn new() -> Result<Self, NotifierError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| internal_error(format!("failed to build http client: {err}")))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            runtime: Handle::try_current().ok(),
        }
    }

    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    fn runtime(&self) -> Option<Handle> {
        self.runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
    }
}

impl Reporter for TransportReporter {
    fn name(&self) -> &str {
        "transport"
    }

    fn report(&self, notice: Notice, options: &ReporterOptions, outcome: Deferred) {
        let request = match PreparedRequest::from_options(options) {
            Ok(request) => request,
            Err(err) => {
                outcome.reject(err.with_reporter("transport"));
                return;
            }
        };
        let Some(runtime) = self.runtime() else {
            outcome.reject(
                internal_error("transport reporter has no tokio runtime to send on")
                    .with_reporter("transport"),
            );
            return;
        };

        let client = self.client.clone();
        runtime.spawn(async move {
            let result = send_notice(&client, request, notice).await;
            outcome.settle(result.map_err(|err| err.with_reporter("transport")));
        });
    }
}

#[derive(Debug, Clone)]
struct PreparedRequest {
    url: String,
    api_key: String,
    timeout: Duration,
    request_id: String,
}

impl PreparedRequest {
    fn from_options(options: &ReporterOptions) -> Result<Self, NotifierError> {
        let project = non_empty(options.project.as_deref())
            .ok_or_else(|| missing_configuration("faultline: project is not configured"))?;
        let api_key = non_empty(options.api_key.as_deref())
            .ok_or_else(|| missing_configuration("faultline: api key is not configured"))?;
        let endpoint = non_empty(options.endpoint.as_deref())
            .ok_or_else(|| missing_configuration("faultline: endpoint is not configured"))?;

        Ok(Self {
            url: notice_url(endpoint, project),
            api_key: api_key.to_string(),
            timeout: options.timeout,
            request_id: Uuid::now_v7().to_string(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}

pub fn notice_url(endpoint: &str, project: &str) -> String {
    format!("{}/projects/{}/errors", endpoint.trim_end_matches('/'), project)
}

async fn send_notice(
    client: &Client,
    request: PreparedRequest,
    notice: Notice,
) -> Result<Notice, NotifierError> {
    tracing::debug!(
        target: "faultline",
        request_id = %request.request_id,
        url = %request.url,
        timeout_ms = request.timeout.as_millis() as u64,
        errors = notice.errors.len(),
        "transport_send_start"
    );

    let response = client
        .post(&request.url)
        .timeout(request.timeout)
        .header(header::CONTENT_TYPE, "application/json")
        .header(API_KEY_HEADER, &request.api_key)
        .header("x-request-id", &request.request_id)
        .json(&notice_payload(&notice))
        .send()
        .await
        .map_err(|err| {
            let reason = if err.is_timeout() { "timed out" } else { "failed" };
            transport_failure(format!("faultline: request {reason}: {err}"))
        })?;

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(
        target: "faultline",
        request_id = %request.request_id,
        status = status,
        "transport_send_result"
    );

    interpret_response(status, &body, notice)
}

/// Maps a response to the reporter outcome. A JSON body with `id` accepts the
/// notice, one with `error` is a named rejection, anything else is unexpected.
pub fn interpret_response(status: u16, body: &str, mut notice: Notice) -> Result<Notice, NotifierError> {
    if (200..500).contains(&status)
        && let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body)
    {
        if let Some(id) = fields.get("id").and_then(id_text) {
            notice.id = Some(id);
            return Ok(notice);
        }
        if let Some(message) = fields.get("error").and_then(error_text) {
            return Err(NotifierError::new(NotifierErrorKind::Rejected, message)
                .with_http_status(status));
        }
    }

    Err(NotifierError::new(
        NotifierErrorKind::UnexpectedResponse,
        format!(
            "faultline: unexpected response: code={status} body='{}'",
            body.trim()
        ),
    )
    .with_http_status(status))
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) if number.as_f64() != Some(0.0) => Some(number.to_string()),
        _ => None,
    }
}

fn error_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Null | Value::Bool(false) | Value::String(_) => None,
        other => Some(other.to_string()),
    }
}
