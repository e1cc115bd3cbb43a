use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, PoisonError, Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use serde::{Deserialize, Serialize};

use crate::notifier::{deferred::Deferred, types::Notice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    Online,
    Offline,
}

impl ConnectivityState {
    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }

    pub fn from_online(online: bool) -> Self {
        if online { Self::Online } else { Self::Offline }
    }
}

pub trait ConnectivityListener: Send + Sync {
    fn on_transition(&self, state: ConnectivityState);
}

/// Host-owned connectivity flag shared with every client built from it.
///
/// Only transitions reach listeners; setting the current state again is a no-op.
/// Listeners are held weakly and invoked on the calling thread with no lock held.
#[derive(Clone)]
pub struct ConnectivitySignal {
    inner: Arc<SignalInner>,
}

struct SignalInner {
    online: AtomicBool,
    listeners: Mutex<Vec<Weak<dyn ConnectivityListener>>>,
}

impl Default for ConnectivitySignal {
    fn default() -> Self {
        Self::online()
    }
}

impl ConnectivitySignal {
    pub fn new(state: ConnectivityState) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                online: AtomicBool::new(state.is_online()),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn online() -> Self {
        Self::new(ConnectivityState::Online)
    }

    pub fn offline() -> Self {
        Self::new(ConnectivityState::Offline)
    }

    pub fn state(&self) -> ConnectivityState {
        ConnectivityState::from_online(self.is_online())
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    pub fn set_online(&self) -> bool {
        self.transition(ConnectivityState::Online)
    }

    pub fn set_offline(&self) -> bool {
        self.transition(ConnectivityState::Offline)
    }

    /// Moves to `state`. Returns whether this call changed it.
    pub fn transition(&self, state: ConnectivityState) -> bool {
        let previous = self.inner.online.swap(state.is_online(), Ordering::SeqCst);
        if previous == state.is_online() {
            return false;
        }

        tracing::debug!(target: "faultline", state = ?state, "connectivity_transition");
        for listener in self.live_listeners() {
            listener.on_transition(state);
        }
        true
    }

    pub(crate) fn subscribe(&self, listener: Weak<dyn ConnectivityListener>) {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn live_listeners(&self) -> Vec<Arc<dyn ConnectivityListener>> {
        let mut listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|listener| listener.strong_count() > 0);
        listeners.iter().filter_map(Weak::upgrade).collect()
    }
}

pub(crate) struct PendingNotice {
    pub notice: Notice,
    pub outcome: Deferred,
}

/// Notices accepted while offline, in submission order.
#[derive(Default)]
pub(crate) struct PendingQueue {
    entries: VecDeque<PendingNotice>,
}

impl PendingQueue {
    pub fn push(&mut self, notice: Notice, outcome: Deferred) -> usize {
        self.entries.push_back(PendingNotice { notice, outcome });
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn take_all(&mut self) -> VecDeque<PendingNotice> {
        std::mem::take(&mut self.entries)
    }
}
