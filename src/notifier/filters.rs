use std::sync::Arc;

use crate::notifier::types::Notice;

/// Consumer hook run before dispatch.
///
/// Return `Some(notice)` to keep the (possibly mutated) notice, `Some(other)`
/// to replace it for every later filter and reporter, or `None` to veto it.
pub trait NoticeFilter: Send + Sync {
    fn filter(&self, notice: Notice) -> Option<Notice>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> NoticeFilter for F
where
    F: Fn(Notice) -> Option<Notice> + Send + Sync,
{
    fn filter(&self, notice: Notice) -> Option<Notice> {
        self(notice)
    }
}

/// Ordered, short-circuiting list of filters.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn NoticeFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, filter: Arc<dyn NoticeFilter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Threads the notice through every filter in registration order and stops
    /// at the first veto.
    pub fn run(&self, mut notice: Notice) -> Option<Notice> {
        for (index, filter) in self.filters.iter().enumerate() {
            match filter.filter(notice) {
                Some(next) => notice = next,
                None => {
                    tracing::debug!(
                        target: "faultline",
                        filter = filter.name(),
                        index = index,
                        "notice_vetoed_by_filter"
                    );
                    return None;
                }
            }
        }
        Some(notice)
    }
}
