//! Single-threaded runtime helpers
//!
//! The session manager runs on one cooperative event loop per tab. In the
//! browser that loop is the JS microtask queue (`wasm-bindgen-futures`,
//! `gloo-timers`); natively it is a tokio current-thread runtime, and every
//! caller must be inside a `tokio::task::LocalSet`.

use futures::future::{AbortHandle, Abortable, Either};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::time::Duration;
use tracing::trace;

/// Longest delay a browser timer can represent (`i32::MAX` ms).
pub const MAX_TIMER_DELAY: Duration = Duration::from_millis(i32::MAX as u64);

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    #[cfg(target_arch = "wasm32")]
    {
        #[allow(clippy::cast_possible_truncation)]
        let now = js_sys::Date::now() as i64;
        now
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Spawn a `!Send` future onto the current event loop.
pub fn spawn_local<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    #[cfg(target_arch = "wasm32")]
    wasm_bindgen_futures::spawn_local(future);

    #[cfg(not(target_arch = "wasm32"))]
    {
        tokio::task::spawn_local(future);
    }
}

/// Suspend the current task for `duration`.
pub async fn sleep(duration: Duration) {
    let duration = duration.min(MAX_TIMER_DELAY);

    #[cfg(target_arch = "wasm32")]
    gloo_timers::future::sleep(duration).await;

    #[cfg(not(target_arch = "wasm32"))]
    tokio::time::sleep(duration).await;
}

/// Marker error for [`timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline elapsed")]
pub struct Elapsed;

/// Race `future` against a timer; the future is dropped (cancelled) when the
/// timer wins.
///
/// # Errors
///
/// Returns [`Elapsed`] if `duration` passes before `future` completes.
pub async fn timeout<F>(duration: Duration, future: F) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    let future = std::pin::pin!(future);
    let timer = std::pin::pin!(sleep(duration));

    match futures::future::select(future, timer).await {
        Either::Left((output, _)) => Ok(output),
        Either::Right(((), _)) => Err(Elapsed),
    }
}

/// A spawned task that runs after a delay and is aborted when dropped.
#[derive(Debug)]
pub struct DelayedTask {
    handle: Option<AbortHandle>,
}

impl DelayedTask {
    /// Run `task` once `delay` has elapsed.
    pub fn spawn<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + 'static,
    {
        let (handle, registration) = AbortHandle::new_pair();
        let delayed = Abortable::new(
            async move {
                sleep(delay).await;
                task.await;
            },
            registration,
        );

        spawn_local(async move {
            if delayed.await.is_err() {
                trace!("delayed task aborted");
            }
        });

        Self {
            handle: Some(handle),
        }
    }

    /// Abort the task if it has not run yet.
    pub fn cancel(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Let the task run to completion regardless of this handle.
    pub fn detach(mut self) {
        self.handle.take();
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Identifies one arming of a [`TimerSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// Holds at most one pending [`DelayedTask`].
///
/// Arming always aborts whatever was pending before. A task that fires calls
/// [`TimerSlot::release`] with its own token first, so re-arming from inside
/// the callback never aborts the callback itself.
#[derive(Debug, Default)]
pub struct TimerSlot {
    current: RefCell<Option<(TimerToken, DelayedTask)>>,
    next: Cell<u64>,
}

impl TimerSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any pending task and schedule a new one.
    ///
    /// `make` receives the token the task should pass to [`release`](Self::release).
    pub fn arm<F, Fut>(&self, delay: Duration, make: F) -> TimerToken
    where
        F: FnOnce(TimerToken) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        let id = self.next.get().wrapping_add(1);
        self.next.set(id);
        let token = TimerToken(id);

        let task = DelayedTask::spawn(delay, make(token));
        let previous = self.current.borrow_mut().replace((token, task));
        if let Some((_, previous)) = previous {
            previous.cancel();
        }
        token
    }

    /// Abort the pending task, if any.
    pub fn cancel(&self) {
        let previous = self.current.borrow_mut().take();
        if let Some((_, task)) = previous {
            task.cancel();
        }
    }

    /// Detach the pending task if it is the one identified by `token`.
    ///
    /// Returns `false` when the slot has since been re-armed or cancelled.
    pub fn release(&self, token: TimerToken) -> bool {
        let mut current = self.current.borrow_mut();
        if current.as_ref().is_some_and(|(armed, _)| *armed == token) {
            if let Some((_, task)) = current.take() {
                task.detach();
            }
            true
        } else {
            false
        }
    }

    /// Whether a task is pending.
    pub fn is_armed(&self) -> bool {
        self.current.borrow().is_some()
    }
}
