use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, PoisonError},
    task::{Context, Poll},
};

use futures_util::FutureExt;
use tokio::sync::oneshot;

use crate::notifier::{
    error::{NotifierError, abandoned},
    types::Notice,
};

/// Final result of one `notify` call. `Ok(None)` means a filter vetoed the notice.
pub type Settlement = Result<Option<Notice>, NotifierError>;

/// Creates a connected settle/await pair.
pub fn deferred() -> (Deferred, Receipt) {
    let (tx, rx) = oneshot::channel();
    (
        Deferred {
            slot: Arc::new(Mutex::new(Some(tx))),
        },
        Receipt { rx, settled: None },
    )
}

/// Settling half handed to reporters. The first settlement wins; dropping every
/// handle without settling makes the receipt fail with `Abandoned`.
#[derive(Debug)]
pub struct Deferred {
    slot: Arc<Mutex<Option<oneshot::Sender<Settlement>>>>,
}

impl Deferred {
    pub fn resolve(self, notice: Notice) {
        self.settle_with(Ok(Some(notice)));
    }

    pub fn reject(self, err: NotifierError) {
        self.settle_with(Err(err));
    }

    pub fn settle(self, result: Result<Notice, NotifierError>) {
        self.settle_with(result.map(Some));
    }

    /// True once settled or once nobody is waiting on the receipt.
    pub fn is_closed(&self) -> bool {
        let guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().is_none_or(|tx| tx.is_closed())
    }

    pub(crate) fn resolve_vetoed(self) {
        self.settle_with(Ok(None));
    }

    /// Second handle onto the same slot, used to settle on behalf of a reporter that panicked.
    pub(crate) fn share(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Returns false when the slot was already settled.
    pub(crate) fn settle_with(&self, settlement: Settlement) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => {
                let _ = tx.send(settlement);
                true
            }
            None => false,
        }
    }
}

/// Awaiting half returned by `notify`.
#[derive(Debug)]
pub struct Receipt {
    rx: oneshot::Receiver<Settlement>,
    settled: Option<Settlement>,
}

impl Receipt {
    /// Observes the outcome if it is already available, without awaiting.
    pub fn try_outcome(&mut self) -> Option<&Settlement> {
        if self.settled.is_none() {
            match self.rx.try_recv() {
                Ok(settlement) => self.settled = Some(settlement),
                Err(oneshot::error::TryRecvError::Empty) => return None,
                Err(oneshot::error::TryRecvError::Closed) => self.settled = Some(Err(abandoned())),
            }
        }
        self.settled.as_ref()
    }

    pub fn is_settled(&mut self) -> bool {
        self.try_outcome().is_some()
    }
}

impl Future for Receipt {
    type Output = Settlement;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(settlement) = self.settled.take() {
            return Poll::Ready(settlement);
        }
        match self.rx.poll_unpin(cx) {
            Poll::Ready(Ok(settlement)) => Poll::Ready(settlement),
            Poll::Ready(Err(_)) => Poll::Ready(Err(abandoned())),
            Poll::Pending => Poll::Pending,
        }
    }
}
