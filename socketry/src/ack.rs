//! The future side of acknowledgement correlation: an
//! [`emit_with_ack`](crate::socket::Socket::emit_with_ack) stores a oneshot
//! sender under the allocated ack id and hands back an [`AckResponse`]
//! wrapping the receiver behind a timeout.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use serde_json::Value;
use tokio::{sync::oneshot::Receiver, time::Timeout};

use crate::errors::AckError;

pin_project_lite::pin_project! {
    /// Resolves to the client's acknowledgement payload (always a JSON
    /// array of the arguments the client passed).
    ///
    /// Yields [`AckError::Timeout`] when no ACK arrives within the
    /// configured ack timeout and [`AckError::Closed`] when the socket goes
    /// away first.
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct AckResponse {
        #[pin]
        rx: Timeout<Receiver<Value>>,
    }
}

impl AckResponse {
    pub(crate) fn new(rx: Receiver<Value>, timeout: Duration) -> Self {
        Self {
            rx: tokio::time::timeout(timeout, rx),
        }
    }
}

impl Future for AckResponse {
    type Output = Result<Value, AckError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().rx.poll(cx) {
            Poll::Ready(Ok(Ok(value))) => Poll::Ready(Ok(value)),
            Poll::Ready(Ok(Err(_))) => Poll::Ready(Err(AckError::Closed)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(AckError::Timeout)),
            Poll::Pending => Poll::Pending,
        }
    }
}
