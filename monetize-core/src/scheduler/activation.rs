//! The future returned by activation calls.

use crate::error::MonetizeError;
use crate::router::ChannelRouter;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Resolves with the bound router once the host reports that the stream started.
///
/// Failures detected while activating are available immediately through
/// [`immediate_error`](Activation::immediate_error), without polling.
#[must_use = "an activation does nothing unless awaited or inspected"]
pub struct Activation {
    state: ActivationState,
}

enum ActivationState {
    Failed(Option<MonetizeError>),
    Waiting(oneshot::Receiver<Arc<ChannelRouter>>),
}

impl Activation {
    pub(crate) fn failed(error: MonetizeError) -> Self {
        Self {
            state: ActivationState::Failed(Some(error)),
        }
    }

    pub(crate) fn waiting(started_rx: oneshot::Receiver<Arc<ChannelRouter>>) -> Self {
        Self {
            state: ActivationState::Waiting(started_rx),
        }
    }

    /// The error raised while activating, if any.
    pub fn immediate_error(&self) -> Option<&MonetizeError> {
        match &self.state {
            ActivationState::Failed(error) => error.as_ref(),
            ActivationState::Waiting(_) => None,
        }
    }
}

impl Future for Activation {
    type Output = Result<Arc<ChannelRouter>, MonetizeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            ActivationState::Failed(error) => match error.take() {
                Some(error) => Poll::Ready(Err(error)),
                // Already completed.
                None => Poll::Pending,
            },
            ActivationState::Waiting(started_rx) => match Pin::new(started_rx).poll(cx) {
                Poll::Ready(Ok(router)) => Poll::Ready(Ok(router)),
                // The start subscription went away with the host boundary.
                Poll::Ready(Err(_)) => Poll::Ready(Err(MonetizeError::NotSupported)),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
