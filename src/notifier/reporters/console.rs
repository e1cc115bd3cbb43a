use std::{
    fmt::Write as _,
    io::{self, Write},
    sync::{Mutex, PoisonError},
};

use crate::notifier::{
    deferred::Deferred,
    reporters::Reporter,
    types::{ErrorRecord, Notice, ReporterOptions},
};

/// Writes a human-readable rendering of every error in the notice.
pub struct ConsoleReporter {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::with_writer(io::stderr())
    }
}

impl ConsoleReporter {
    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn name(&self) -> &str {
        "console"
    }

    fn report(&self, notice: Notice, _options: &ReporterOptions, outcome: Deferred) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        for err in &notice.errors {
            if let Err(io_err) = writeln!(writer, "{}", format_error(err)) {
                tracing::warn!(target: "faultline", error = %io_err, "console_reporter_write_failed");
                break;
            }
        }
        let _ = writer.flush();
        drop(writer);
        outcome.resolve(notice);
    }
}

/// `<message>` on the first line, then one line per frame:
/// ` at <function> in <file>:<line>:<column>`, omitting empty parts.
pub fn format_error(err: &ErrorRecord) -> String {
    let mut out = String::new();
    out.push_str(&err.message);
    out.push('\n');

    for frame in &err.backtrace {
        if !frame.function.is_empty() {
            let _ = write!(out, " at {}", frame.function);
        }
        if !frame.file.is_empty() {
            let _ = write!(out, " in {}:{}", frame.file, frame.line);
            if frame.column != 0 {
                let _ = write!(out, ":{}", frame.column);
            }
        }
        out.push('\n');
    }

    out
}
