use std::sync::Arc;

use crate::session::{CloseReason, Session};

/// Receives lifecycle events and inbound messages for every session owned by
/// an [`Engine`](crate::Engine).
pub trait SessionHandler: Send + Sync + 'static {
    /// Called once the session is open, after the handshake went out.
    fn on_connect(&self, session: Arc<Session>);

    /// Called exactly once when the session reaches its terminal state.
    fn on_disconnect(&self, session: Arc<Session>, reason: CloseReason);

    /// Called for every inbound message payload.
    fn on_message(&self, msg: String, session: Arc<Session>);
}

impl<T: SessionHandler> SessionHandler for Arc<T> {
    fn on_connect(&self, session: Arc<Session>) {
        (**self).on_connect(session)
    }

    fn on_disconnect(&self, session: Arc<Session>, reason: CloseReason) {
        (**self).on_disconnect(session, reason)
    }

    fn on_message(&self, msg: String, session: Arc<Session>) {
        (**self).on_message(msg, session)
    }
}
