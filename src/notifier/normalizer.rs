use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};

use crate::notifier::{
    backtrace,
    error::{NotifierError, invalid_input, unreportable},
    types::{
        ErrorLike, ErrorRecord, NOTIFIER_NAME, NOTIFIER_URL, Notice, NoticeMap, NotifyInput,
        WrappedError,
    },
};

/// Browser artifacts that carry no actionable information.
const UNREPORTABLE_MESSAGES: &[&str] = &["Script error", "InvalidAccessError"];
const UNCAUGHT_PREFIX: &str = "Uncaught ";

static FRAMEWORK_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\[(?P<code>\$[^\]]+)\]\s(?P<detail>.*)$")
        .expect("framework message pattern is valid")
});

/// Values every notice starts from before caller input is merged in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoticeDefaults {
    pub context: NoticeMap,
    pub environment: NoticeMap,
    pub params: NoticeMap,
    pub session: NoticeMap,
}

#[derive(Debug, Clone, Default)]
pub struct NoticeNormalizer {
    defaults: NoticeDefaults,
}

impl NoticeNormalizer {
    pub fn new(defaults: NoticeDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &NoticeDefaults {
        &self.defaults
    }

    /// Turns any accepted input shape into a notice.
    ///
    /// Fails with `InvalidInput` for empty or missing errors and with
    /// `Unreportable` for known browser artifacts; neither must be dispatched.
    pub fn normalize(&self, input: NotifyInput) -> Result<Notice, NotifierError> {
        let mut notice = Notice {
            context: builtin_context(),
            environment: self.defaults.environment.clone(),
            params: self.defaults.params.clone(),
            session: self.defaults.session.clone(),
            ..Notice::default()
        };
        notice.context.extend(self.defaults.context.clone());

        let mut errors = Self::resolve(input, &mut notice)?;
        if let Some(primary) = errors.first()
            && UNREPORTABLE_MESSAGES.contains(&primary.message.as_str())
        {
            return Err(unreportable(&primary.message));
        }

        for record in &mut errors {
            split_message(record);
        }
        notice.errors = errors;
        Ok(notice)
    }

    fn resolve(input: NotifyInput, notice: &mut Notice) -> Result<Vec<ErrorRecord>, NotifierError> {
        match input {
            NotifyInput::Message(message) => {
                if message.is_empty() {
                    return Err(invalid_input(&json!(message).to_string()));
                }
                Ok(vec![ErrorRecord {
                    type_name: String::new(),
                    message,
                    backtrace: backtrace::capture(),
                }])
            }
            NotifyInput::Error(error) => Ok(Self::records_from_error(error)),
            NotifyInput::Wrapped(wrapped) => {
                let WrappedError {
                    error,
                    context,
                    environment,
                    params,
                    session,
                } = wrapped;
                let Some(inner) = error else {
                    return Err(invalid_input(&Value::Null.to_string()));
                };

                let records = Self::resolve(*inner, notice)?;
                notice.context.extend(context);
                notice.environment.extend(environment);
                notice.params.extend(params);
                notice.session.extend(session);
                Ok(records)
            }
        }
    }

    fn records_from_error(error: ErrorLike) -> Vec<ErrorRecord> {
        let mut records = Vec::new();
        let mut current = Some(error);
        while let Some(ErrorLike {
            type_name,
            message,
            stack,
            cause,
        }) = current
        {
            let backtrace = match stack {
                Some(description) => backtrace::parse_stack(&description),
                None if records.is_empty() => backtrace::capture(),
                None => Vec::new(),
            };
            records.push(ErrorRecord {
                type_name,
                message,
                backtrace,
            });
            current = cause.map(|boxed| *boxed);
        }
        records
    }
}

fn builtin_context() -> NoticeMap {
    let mut context = NoticeMap::new();
    context.insert("language".to_string(), json!("Rust"));
    context.insert(
        "notifier".to_string(),
        json!({
            "name": NOTIFIER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "url": NOTIFIER_URL,
        }),
    );
    context
}

/// Rewrites `Uncaught <Type>: <message>` and `[$code] <detail>` messages into
/// separate type and message fields.
pub fn split_message(record: &mut ErrorRecord) {
    if let Some(rest) = record.message.strip_prefix(UNCAUGHT_PREFIX) {
        let (type_name, message) = match rest.split_once(": ") {
            Some((type_name, message)) => (type_name.to_string(), message.to_string()),
            None => (String::new(), rest.to_string()),
        };
        record.type_name = type_name;
        record.message = message;
        return;
    }

    if let Some(caps) = FRAMEWORK_MESSAGE.captures(&record.message) {
        let type_name = caps["code"].to_string();
        let message = caps["detail"].to_string();
        record.type_name = type_name;
        record.message = message;
    }
}
