//! Thread-local markers for code running under the notifier's own control.
//!
//! The panic hook consults both: panics inside a wrapped callable are reported
//! by the wrapper, and panics inside the pipeline are contained by it.

use std::{cell::Cell, thread::LocalKey};

thread_local! {
    static WRAP_DEPTH: Cell<usize> = const { Cell::new(0) };
    static PIPELINE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// True while the current thread is executing inside a wrapped callable.
pub fn inside_wrapper() -> bool {
    WRAP_DEPTH.with(|depth| depth.get() > 0)
}

/// True while the current thread runs normalization, filters, reporters or sinks.
pub fn inside_pipeline() -> bool {
    PIPELINE_DEPTH.with(|depth| depth.get() > 0)
}

pub(crate) fn with_wrap_depth<R>(f: impl FnOnce() -> R) -> R {
    let _guard = DepthGuard::enter(&WRAP_DEPTH);
    f()
}

pub(crate) fn with_pipeline_depth<R>(f: impl FnOnce() -> R) -> R {
    let _guard = DepthGuard::enter(&PIPELINE_DEPTH);
    f()
}

/// Decrements on drop, so unwinding out of `f` restores the depth.
struct DepthGuard(&'static LocalKey<Cell<usize>>);

impl DepthGuard {
    fn enter(key: &'static LocalKey<Cell<usize>>) -> Self {
        key.with(|depth| depth.set(depth.get() + 1));
        Self(key)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.0.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}
