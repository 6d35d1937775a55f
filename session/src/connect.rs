use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::sync::oneshot::{self, error::TryRecvError};

use peerhost_shared::ConnectionId;

use crate::error::ConnectError;

pub type ConnectResult = Result<ConnectionId, ConnectError>;

/// Resolving half of a pending connect. Only the first resolution counts;
/// later ones are ignored, since a connected and a disconnected event may
/// race during teardown.
pub struct ConnectCompletion {
    sender: Option<oneshot::Sender<ConnectResult>>,
}

impl ConnectCompletion {
    pub fn new() -> (Self, ConnectFuture) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                sender: Some(sender),
            },
            ConnectFuture {
                receiver,
                result: None,
            },
        )
    }

    /// Returns whether this call resolved the completion
    pub fn resolve(&mut self, result: ConnectResult) -> bool {
        match self.sender.take() {
            Some(sender) => {
                // the future may already be gone, which is fine
                let _ = sender.send(result);
                true
            }
            None => false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.sender.is_none()
    }
}

/// Awaitable outcome of starting a session: the local client's connection id,
/// or why connecting failed
pub struct ConnectFuture {
    receiver: oneshot::Receiver<ConnectResult>,
    result: Option<ConnectResult>,
}

impl ConnectFuture {
    /// Polls without blocking, for callers driven by a fixed tick
    pub fn try_result(&mut self) -> Option<ConnectResult> {
        if self.result.is_none() {
            self.result = match self.receiver.try_recv() {
                Ok(result) => Some(result),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Closed) => Some(Err(ConnectError::Abandoned)),
            };
        }
        self.result
    }
}

impl Future for ConnectFuture {
    type Output = ConnectResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(result) = self.result {
            return Poll::Ready(result);
        }
        let result = match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => result,
            Poll::Ready(Err(_)) => Err(ConnectError::Abandoned),
            Poll::Pending => return Poll::Pending,
        };
        self.result = Some(result);
        Poll::Ready(result)
    }
}
