use crate::error::{IsCancellation, RequestError};
use log::debug;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct LifecycleConfig {
    /// Quiet period before the last scheduled request actually runs.
    pub debounce: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
        }
    }
}

/// Phase of the single request slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Debouncing,
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSnapshot {
    pub state: RequestState,
    pub dedup_key: Option<String>,
}

/// Debounced, cancelable scheduler with exactly one slot.
///
/// Every [`schedule_request`](Self::schedule_request) call supersedes
/// whatever occupies the slot, whatever its key: the pending debounce is
/// abandoned and in-flight work is cancelled through its token. Only the most
/// recently scheduled request can resolve with a value.
#[derive(Clone)]
pub struct RequestLifecycleManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: LifecycleConfig,
    slot: Mutex<Option<RequestSlot>>,
    next_id: AtomicU64,
    disposed: AtomicBool,
}

struct RequestSlot {
    id: u64,
    dedup_key: String,
    token: CancellationToken,
    state: RequestState,
}

impl Default for RequestLifecycleManager {
    fn default() -> Self {
        Self::new(LifecycleConfig::default())
    }
}

impl RequestLifecycleManager {
    #[must_use]
    pub fn new(config: LifecycleConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                config,
                slot: Mutex::new(None),
                next_id: AtomicU64::new(1),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> LifecycleConfig {
        self.inner.config
    }

    /// Run `work` after the debounce period unless a newer call or an
    /// explicit cancel gets there first.
    ///
    /// `work` receives the slot's cancellation token and should hand it to
    /// the network layer so retries and backoff sleeps stop early too.
    pub async fn schedule_request<T, E, F, Fut>(
        &self,
        dedup_key: impl Into<String>,
        work: F,
    ) -> Result<T, RequestError<E>>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: IsCancellation,
    {
        let dedup_key = dedup_key.into();
        if self.inner.disposed.load(Ordering::Acquire) {
            debug!("schedule_request({dedup_key}) after dispose; rejecting");
            return Err(RequestError::Cancelled);
        }

        let guard = self.install(dedup_key);
        let token = guard.token.clone();

        tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!("request {} superseded while debouncing", guard.id);
                return Err(RequestError::Cancelled);
            }
            () = time::sleep(self.inner.config.debounce) => {}
        }

        if token.is_cancelled() || !self.mark_in_flight(guard.id) {
            return Err(RequestError::Cancelled);
        }

        let result = tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!("request {} cancelled in flight", guard.id);
                return Err(RequestError::Cancelled);
            }
            result = work(token.clone()) => result,
        };

        match result {
            // The slot may have been taken over between completion and here.
            Ok(_) if token.is_cancelled() => Err(RequestError::Cancelled),
            Ok(value) => {
                debug!("request {} resolved", guard.id);
                Ok(value)
            }
            Err(err) if err.is_cancellation() => Err(RequestError::Cancelled),
            Err(err) => {
                debug!("request {} failed", guard.id);
                Err(RequestError::Failed(err))
            }
        }
    }

    /// Cancel whatever is debouncing or in flight. Safe to call at any time.
    pub fn cancel_current_request(&self) {
        if let Some(slot) = self.lock_slot().take() {
            debug!(
                "cancelling request {} ({}) in state {:?}",
                slot.id, slot.dedup_key, slot.state
            );
            slot.token.cancel();
        }
    }

    /// True only while `dedup_key` owns the slot and its work is executing.
    #[must_use]
    pub fn is_request_in_flight(&self, dedup_key: &str) -> bool {
        self.lock_slot().as_ref().is_some_and(|slot| {
            slot.state == RequestState::InFlight && slot.dedup_key == dedup_key
        })
    }

    #[must_use]
    pub fn snapshot(&self) -> RequestSnapshot {
        match self.lock_slot().as_ref() {
            Some(slot) => RequestSnapshot {
                state: slot.state,
                dedup_key: Some(slot.dedup_key.clone()),
            },
            None => RequestSnapshot {
                state: RequestState::Idle,
                dedup_key: None,
            },
        }
    }

    #[must_use]
    pub fn state(&self) -> RequestState {
        self.snapshot().state
    }

    /// Cancel the current request and reject every later one.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::Release);
        self.cancel_current_request();
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<RequestSlot>> {
        self.inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn install(&self, dedup_key: String) -> SlotGuard {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let previous = self.lock_slot().replace(RequestSlot {
            id,
            dedup_key,
            token: token.clone(),
            state: RequestState::Debouncing,
        });
        if let Some(previous) = previous {
            debug!(
                "request {} ({}) superseded by {id}",
                previous.id, previous.dedup_key
            );
            previous.token.cancel();
        }
        SlotGuard {
            manager: self.clone(),
            id,
            token,
        }
    }

    fn mark_in_flight(&self, id: u64) -> bool {
        match self.lock_slot().as_mut() {
            Some(slot) if slot.id == id => {
                slot.state = RequestState::InFlight;
                true
            }
            _ => false,
        }
    }

    fn release(&self, id: u64) {
        let mut slot = self.lock_slot();
        if slot.as_ref().is_some_and(|current| current.id == id) {
            *slot = None;
        }
    }
}

/// Clears the slot when a request settles or its future is dropped.
struct SlotGuard {
    manager: RequestLifecycleManager,
    id: u64,
    token: CancellationToken,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.manager.release(self.id);
        // A dropped caller must not leave work running against a dead slot.
        self.token.cancel();
    }
}
