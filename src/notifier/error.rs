use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifierErrorKind {
    InvalidInput,
    Unreportable,
    MissingConfiguration,
    Rejected,
    UnexpectedResponse,
    Transport,
    ReporterPanicked,
    Abandoned,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct NotifierError {
    pub kind: NotifierErrorKind,
    pub message: String,
    pub reporter: Option<String>,
    pub http_status: Option<u16>,
}

impl NotifierError {
    pub fn new(kind: NotifierErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            reporter: None,
            http_status: None,
        }
    }

    pub fn with_reporter(mut self, reporter: impl Into<String>) -> Self {
        self.reporter = Some(reporter.into());
        self
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// Failures that happened before any reporter saw the notice.
    pub fn is_pre_dispatch(&self) -> bool {
        matches!(
            self.kind,
            NotifierErrorKind::InvalidInput | NotifierErrorKind::Unreportable
        )
    }
}

/// `literal` is the offending value as it would be written in source, e.g. `""` or `null`.
pub fn invalid_input(literal: &str) -> NotifierError {
    NotifierError::new(
        NotifierErrorKind::InvalidInput,
        format!("notify: got err={literal}, wanted an Error"),
    )
}

pub fn unreportable(message: &str) -> NotifierError {
    NotifierError::new(
        NotifierErrorKind::Unreportable,
        format!("notify: ignoring unreportable error message '{message}'"),
    )
}

pub fn missing_configuration(message: impl Into<String>) -> NotifierError {
    NotifierError::new(NotifierErrorKind::MissingConfiguration, message)
}

pub fn transport_failure(message: impl Into<String>) -> NotifierError {
    NotifierError::new(NotifierErrorKind::Transport, message)
}

pub fn abandoned() -> NotifierError {
    NotifierError::new(
        NotifierErrorKind::Abandoned,
        "reporter dropped the outcome without settling it",
    )
}

pub fn internal_error(message: impl Into<String>) -> NotifierError {
    NotifierError::new(NotifierErrorKind::Internal, message)
}
