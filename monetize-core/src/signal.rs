//! A promise-like notification that can settle more than once.
//!
//! Host lifecycle events keep recurring for the whole lifetime of a stream,
//! so a subscriber registers one callback and has it invoked every time the
//! signal succeeds. A signal built as one-shot freezes after delivering its
//! first success. A failure is terminal and replays to every failure callback
//! registered afterwards.
//!
//! At most one success and one failure callback are held at a time; a new
//! registration replaces the previous one and, if the signal has already
//! settled the matching way, is invoked immediately with the last result.

use parking_lot::Mutex;
use std::sync::Arc;

/// Callback invoked with each success value.
pub type SuccessCallback<T> = Arc<dyn Fn(T) + Send + Sync>;
/// Callback invoked with the failure reason.
pub type FailureCallback<E> = Arc<dyn Fn(E) + Send + Sync>;

/// Settlement state of a [`RepeatableSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    Pending,
    Succeeded,
    Failed,
}

struct SignalInner<T, E> {
    state: SignalState,
    last_value: Option<T>,
    last_reason: Option<E>,
    on_success: Option<SuccessCallback<T>>,
    on_failure: Option<FailureCallback<E>>,
    one_shot: bool,
    /// Set once a one-shot signal has delivered a result.
    frozen: bool,
}

/// Multi-fire notification primitive.
///
/// Cloning yields another handle to the same signal.
pub struct RepeatableSignal<T, E> {
    inner: Arc<Mutex<SignalInner<T, E>>>,
}

/// Handle given to the setup function to settle the signal.
///
/// Settling runs the registered callback synchronously on the caller's stack.
pub struct Settler<T, E> {
    inner: Arc<Mutex<SignalInner<T, E>>>,
}

impl<T, E> Clone for RepeatableSignal<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> Clone for Settler<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> RepeatableSignal<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Create a signal and hand its settler to `setup`.
    ///
    /// `setup` returns `true` to make the signal one-shot.
    pub fn new<F>(setup: F) -> Self
    where
        F: FnOnce(Settler<T, E>) -> bool,
    {
        let inner = Arc::new(Mutex::new(SignalInner {
            state: SignalState::Pending,
            last_value: None,
            last_reason: None,
            on_success: None,
            on_failure: None,
            one_shot: false,
            frozen: false,
        }));
        let one_shot = setup(Settler {
            inner: Arc::clone(&inner),
        });
        inner.lock().one_shot = one_shot;
        Self { inner }
    }

    /// A one-shot signal that has already failed with `reason`.
    pub fn failed(reason: E) -> Self {
        Self::new(|settler| {
            settler.fail(reason);
            true
        })
    }

    /// Run `callback` every time the signal succeeds from now on.
    ///
    /// Replays the last value right away if the signal has already succeeded
    /// and is not frozen.
    pub fn on_success<F>(&self, callback: F) -> &Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let callback: SuccessCallback<T> = Arc::new(callback);
        let replay = {
            let mut inner = self.inner.lock();
            inner.on_success = Some(Arc::clone(&callback));
            if inner.state == SignalState::Succeeded && !inner.frozen {
                if inner.one_shot {
                    inner.frozen = true;
                }
                inner.last_value.clone()
            } else {
                None
            }
        };
        if let Some(value) = replay {
            callback(value);
        }
        self
    }

    /// Run `callback` when the signal fails, replaying a failure that already happened.
    pub fn on_failure<F>(&self, callback: F) -> &Self
    where
        F: Fn(E) + Send + Sync + 'static,
    {
        let callback: FailureCallback<E> = Arc::new(callback);
        let replay = {
            let mut inner = self.inner.lock();
            inner.on_failure = Some(Arc::clone(&callback));
            if inner.state == SignalState::Failed {
                inner.last_reason.clone()
            } else {
                None
            }
        };
        if let Some(reason) = replay {
            callback(reason);
        }
        self
    }

    pub fn state(&self) -> SignalState {
        self.inner.lock().state
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.lock().frozen
    }
}

impl<T, E> Settler<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Settle successfully. No-op once frozen or failed.
    pub fn succeed(&self, value: T) {
        let callback = {
            let mut inner = self.inner.lock();
            if inner.frozen || inner.state == SignalState::Failed {
                return;
            }
            inner.state = SignalState::Succeeded;
            inner.last_value = Some(value.clone());
            let callback = inner.on_success.clone();
            if callback.is_some() && inner.one_shot {
                inner.frozen = true;
            }
            callback
        };
        if let Some(callback) = callback {
            callback(value);
        }
    }

    /// Settle with a failure. The first failure is final.
    pub fn fail(&self, reason: E) {
        let callback = {
            let mut inner = self.inner.lock();
            if inner.frozen || inner.state == SignalState::Failed {
                return;
            }
            inner.state = SignalState::Failed;
            inner.last_reason = Some(reason.clone());
            inner.on_failure.clone()
        };
        if let Some(callback) = callback {
            callback(reason);
        }
    }
}
