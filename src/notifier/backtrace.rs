use std::sync::LazyLock;

use regex::Regex;

use crate::notifier::types::StackFrame;

/// Leading frames that belong to stack capture or the notify pipeline itself.
const INTERNAL_FRAME_PREFIXES: &[&str] = &[
    "backtrace::",
    "faultline::notifier::backtrace::",
    "faultline::notifier::normalizer::",
    "faultline::notifier::client::Client::",
    "faultline::notifier::client::ClientInner::",
    "faultline::notifier::wrap::",
];

static V8_FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*at (?:(?P<function>.+?) \((?P<location>.+)\)|(?P<bare>.+))$")
        .expect("v8 frame pattern is valid")
});
static GECKO_FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<function>[^@\s]*)@(?P<location>.+)$").expect("gecko frame pattern is valid")
});
static RUST_FRAME_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d+:\s+(?P<function>.+?)\s*$").expect("rust frame pattern is valid")
});
static RUST_FRAME_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+at\s+(?P<location>.+?)\s*$").expect("rust location pattern is valid")
});
static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<file>.*?)(?::(?P<line>\d+))?(?::(?P<column>\d+))?$")
        .expect("location pattern is valid")
});

/// Captures the caller's stack, skipping leading pipeline frames.
#[inline(never)]
pub fn capture() -> Vec<StackFrame> {
    let mut frames = Vec::new();
    let mut skipping = true;

    backtrace::trace(|frame| {
        backtrace::resolve_frame(frame, |symbol| {
            let function = symbol
                .name()
                .map(|name| format!("{name:#}"))
                .unwrap_or_default();
            if skipping && is_internal_frame(&function) {
                return;
            }
            skipping = false;

            frames.push(StackFrame {
                function,
                file: symbol
                    .filename()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default(),
                line: symbol.lineno().unwrap_or(0),
                column: symbol.colno().unwrap_or(0),
            });
        });
        true
    });

    frames
}

fn is_internal_frame(function: &str) -> bool {
    INTERNAL_FRAME_PREFIXES
        .iter()
        .any(|prefix| function.starts_with(prefix))
}

/// Parses a textual stack description. Understands V8 (`at fn (file:1:2)`),
/// Gecko/Safari (`fn@file:1:2`) and Rust `std::backtrace` output; lines in
/// none of those shapes are skipped.
pub fn parse_stack(description: &str) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = Vec::new();
    let mut awaiting_rust_location = false;

    for line in description.lines() {
        if awaiting_rust_location && let Some(caps) = RUST_FRAME_LOCATION.captures(line) {
            if let Some(frame) = frames.last_mut() {
                apply_location(frame, &caps["location"]);
            }
            awaiting_rust_location = false;
            continue;
        }
        awaiting_rust_location = false;

        if let Some(caps) = V8_FRAME.captures(line) {
            let mut frame = StackFrame::default();
            match (caps.name("function"), caps.name("location"), caps.name("bare")) {
                (Some(function), Some(location), _) => {
                    frame.function = function.as_str().to_string();
                    apply_location(&mut frame, location.as_str());
                }
                (_, _, Some(bare)) => apply_location(&mut frame, bare.as_str()),
                _ => continue,
            }
            frames.push(frame);
        } else if let Some(caps) = RUST_FRAME_HEAD.captures(line) {
            frames.push(StackFrame {
                function: caps["function"].to_string(),
                ..StackFrame::default()
            });
            awaiting_rust_location = true;
        } else if let Some(caps) = GECKO_FRAME.captures(line.trim()) {
            let mut frame = StackFrame {
                function: caps["function"].to_string(),
                ..StackFrame::default()
            };
            apply_location(&mut frame, &caps["location"]);
            frames.push(frame);
        }
    }

    frames
}

fn apply_location(frame: &mut StackFrame, location: &str) {
    let Some(caps) = LOCATION.captures(location.trim()) else {
        frame.file = location.trim().to_string();
        return;
    };
    frame.file = caps["file"].to_string();
    frame.line = caps
        .name("line")
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    frame.column = caps
        .name("column")
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
}
