use std::{collections::BTreeMap, fmt, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type NoticeMap = BTreeMap<String, Value>;
pub type NoticeId = String;

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const NOTIFIER_NAME: &str = "faultline";
pub const NOTIFIER_URL: &str = "https://github.com/faultline/faultline-rs";

/// One frame of a backtrace. Absent fields hold empty sentinels (`""` / `0`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    #[serde(default)]
    pub function: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub backtrace: Vec<StackFrame>,
}

/// Canonical report handed to filters and reporters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub errors: Vec<ErrorRecord>,
    #[serde(default)]
    pub context: NoticeMap,
    #[serde(default)]
    pub environment: NoticeMap,
    #[serde(default)]
    pub params: NoticeMap,
    #[serde(default)]
    pub session: NoticeMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NoticeId>,
}

impl Notice {
    pub fn new(errors: Vec<ErrorRecord>) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }

    pub fn primary_error(&self) -> Option<&ErrorRecord> {
        self.errors.first()
    }
}

/// Effective configuration passed to every reporter for one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReporterOptions {
    pub project: Option<String>,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub timeout: Duration,
}

impl Default for ReporterOptions {
    fn default() -> Self {
        Self {
            project: None,
            api_key: None,
            endpoint: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

/// Error-shaped value: a type name, a message, an optional textual stack
/// description and an optional cause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLike {
    pub type_name: String,
    pub message: String,
    pub stack: Option<String>,
    pub cause: Option<Box<ErrorLike>>,
}

impl ErrorLike {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack: None,
            cause: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_cause(mut self, cause: ErrorLike) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Builds an error-like value from a Rust error, following its `source()` chain.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let mut head = Self::new(short_type_name::<E>(), err.to_string());
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(current) = source {
            causes.push(Self::new(
                parse_type_from_debug(&format!("{current:?}")),
                current.to_string(),
            ));
            source = current.source();
        }

        let chain = causes.into_iter().rev().fold(None, |next, mut cause: Self| {
            cause.cause = next.map(Box::new);
            Some(cause)
        });
        head.cause = chain.map(Box::new);
        head
    }

    /// Builds an error-like value from a panic payload.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        Self::new("panic", panic_message(payload))
    }

    pub fn causes(&self) -> impl Iterator<Item = &ErrorLike> {
        std::iter::successors(self.cause.as_deref(), |current| current.cause.as_deref())
    }
}

impl fmt::Display for ErrorLike {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.type_name.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.type_name, self.message)
        }
    }
}

impl std::error::Error for ErrorLike {}

/// Wrapped-error input: an error plus auxiliary data merged into the notice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WrappedError {
    pub error: Option<Box<NotifyInput>>,
    pub context: NoticeMap,
    pub environment: NoticeMap,
    pub params: NoticeMap,
    pub session: NoticeMap,
}

impl WrappedError {
    pub fn new(error: impl Into<NotifyInput>) -> Self {
        Self {
            error: Some(Box::new(error.into())),
            ..Self::default()
        }
    }

    /// A wrapper whose error is absent; normalizing it always fails.
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_environment(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_session(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.session.insert(key.into(), value.into());
        self
    }
}

/// Every shape `notify` accepts, resolved once by the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyInput {
    Message(String),
    Error(ErrorLike),
    Wrapped(WrappedError),
}

impl From<&str> for NotifyInput {
    fn from(value: &str) -> Self {
        Self::Message(value.to_string())
    }
}

impl From<String> for NotifyInput {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<ErrorLike> for NotifyInput {
    fn from(value: ErrorLike) -> Self {
        Self::Error(value)
    }
}

impl From<WrappedError> for NotifyInput {
    fn from(value: WrappedError) -> Self {
        Self::Wrapped(value)
    }
}

pub fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Extracts a type name from `Debug` output such as `ParseIntError { kind: .. }`.
pub fn parse_type_from_debug(debug: &str) -> String {
    let head: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    head.rsplit("::").next().unwrap_or_default().to_string()
}

pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}
