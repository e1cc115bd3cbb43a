use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Weak},
};

use serde_json::Value;

use crate::notifier::{
    client::ClientInner,
    scope::with_wrap_depth,
    types::{ErrorLike, NoticeMap, WrappedError},
};

pub type Args = Vec<Arg>;

/// What a callable returns. `Err` is the callable's thrown error.
pub type CallResult = Result<Value, ErrorLike>;

type Body = dyn Fn(Args) -> CallResult + Send + Sync;

/// A single argument: plain data or another callable.
#[derive(Clone, Debug)]
pub enum Arg {
    Value(Value),
    Func(Callable),
}

impl Arg {
    /// Rendering recorded in `params.arguments` when a call fails.
    pub fn describe(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Func(callable) => Value::String(format!("[function {}]", callable.name())),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Func(_) => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Self::Func(callable) => Some(callable),
            Self::Value(_) => None,
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Callable> for Arg {
    fn from(value: Callable) -> Self {
        Self::Func(value)
    }
}

/// Dynamically-typed function value with a name and a metadata map.
///
/// A wrapped callable keeps a reference to the original in `inner()` and a
/// copy of its properties, so it can stand in for the original anywhere.
#[derive(Clone)]
pub struct Callable {
    name: Arc<str>,
    body: Arc<Body>,
    properties: NoticeMap,
    inner: Option<Arc<Callable>>,
}

impl Callable {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(Args) -> CallResult + Send + Sync + 'static,
    {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            body: Arc::new(body),
            properties: NoticeMap::new(),
            inner: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &NoticeMap {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn is_wrapped(&self) -> bool {
        self.inner.is_some()
    }

    /// The original callable behind a wrapper.
    pub fn inner(&self) -> Option<&Callable> {
        self.inner.as_deref()
    }

    pub fn invoke(&self, args: Args) -> CallResult {
        (self.body)(args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("properties", &self.properties)
            .field("wrapped", &self.is_wrapped())
            .finish()
    }
}

pub(crate) fn wrap_callable(client: Weak<ClientInner>, target: Callable) -> Callable {
    if target.is_wrapped() {
        return target;
    }

    let original = Arc::new(target);
    let captured = Arc::clone(&original);
    let body = move |args: Args| invoke_captured(&client, &captured, args);
    Callable {
        name: Arc::clone(&original.name),
        body: Arc::new(body),
        properties: original.properties.clone(),
        inner: Some(original),
    }
}

/// Invokes `target` with callable arguments wrapped. A returned error is
/// reported and handed back; a panic is reported and resumed.
pub(crate) fn invoke_captured(client: &Weak<ClientInner>, target: &Callable, args: Args) -> CallResult {
    let arguments = Value::Array(args.iter().map(Arg::describe).collect());
    let forwarded: Args = args
        .into_iter()
        .map(|arg| match arg {
            Arg::Func(callable) => Arg::Func(wrap_callable(client.clone(), callable)),
            value => value,
        })
        .collect();

    let result = with_wrap_depth(|| panic::catch_unwind(AssertUnwindSafe(|| target.invoke(forwarded))));

    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            report_captured(client, err.clone(), arguments);
            Err(err)
        }
        Err(payload) => {
            report_captured(client, ErrorLike::from_panic(&*payload), arguments);
            panic::resume_unwind(payload)
        }
    }
}

pub(crate) fn report_captured(client: &Weak<ClientInner>, error: ErrorLike, arguments: Value) {
    let Some(client) = client.upgrade() else {
        tracing::debug!(target: "faultline", error = %error, "captured_error_without_client");
        return;
    };
    tracing::debug!(target: "faultline", error = %error, "wrapped_call_failed");
    // Outcome is observable through reporters and diagnostics only.
    let _receipt = client.notify(WrappedError::new(error).with_param("arguments", arguments).into());
}
