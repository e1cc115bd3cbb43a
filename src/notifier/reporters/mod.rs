use crate::notifier::{
    deferred::Deferred,
    types::{Notice, ReporterOptions},
};

pub mod console;
pub mod payload;
pub mod transport;

/// Delivery sink for accepted notices.
///
/// `report` is called synchronously, in registration order, once per notice.
/// Implementations must eventually settle `outcome`: resolve it with the
/// delivered notice (setting `notice.id` when the remote side assigns one) or
/// reject it with a descriptive error. Reporters doing I/O spawn the work onto
/// the ambient tokio runtime and settle from there.
pub trait Reporter: Send + Sync {
    fn report(&self, notice: Notice, options: &ReporterOptions, outcome: Deferred);

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> Reporter for F
where
    F: Fn(Notice, &ReporterOptions, Deferred) + Send + Sync,
{
    fn report(&self, notice: Notice, options: &ReporterOptions, outcome: Deferred) {
        self(notice, options, outcome)
    }
}
