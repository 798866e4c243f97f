use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use http::{header, HeaderValue, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::upgrade::Upgraded;
use hyper_util::rt::TokioIo;
use tokio_tungstenite::{
    tungstenite::{handshake::derive_accept_key, protocol::Role, Message},
    WebSocketStream,
};
use tracing::debug;

use crate::{
    config::EngineConfig,
    errors::Error,
    handler::SessionHandler,
    packet::{OpenPacket, Packet},
    session::{CloseReason, Session},
    sid::Sid,
    ws,
};

/// The engine owns the session registry and the connection lifecycle: it
/// upgrades requests into WebSocket sessions, sends the handshake, runs the
/// read loop and deregisters sessions on close.
pub struct Engine<H: SessionHandler> {
    sessions: RwLock<HashMap<Sid, Arc<Session>>>,
    pub(crate) handler: Arc<H>,
    pub config: EngineConfig,
}

impl<H: SessionHandler> Engine<H> {
    pub fn new(handler: Arc<H>, config: EngineConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            handler,
            config,
        }
    }

    /// Accepts a WebSocket upgrade: spawns the connection driver and returns
    /// the 101 response.
    pub(crate) fn on_ws_req<B>(self: Arc<Self>, req: Request<B>) -> Result<Response<Full<Bytes>>, Error>
    where
        B: Send + 'static,
    {
        let (parts, _) = req.into_parts();
        let ws_key = parts
            .headers
            .get(header::SEC_WEBSOCKET_KEY)
            .cloned()
            .ok_or(Error::Upgrade)?;

        let req = Request::from_parts(parts, ());
        tokio::spawn(async move {
            match hyper::upgrade::on(req).await {
                Ok(conn) => {
                    if let Err(e) = self.on_ws_init(conn).await {
                        debug!("ws connection closed with error: {:?}", e);
                    }
                }
                Err(e) => debug!("ws upgrade error: {}", e),
            }
        });

        ws_response(&ws_key)
    }

    /// Drives one connection: handshake, writer task, heartbeat, then the
    /// read loop until the session ends.
    async fn on_ws_init(self: Arc<Self>, conn: Upgraded) -> Result<(), Error> {
        let ws = WebSocketStream::from_raw_socket(TokioIo::new(conn), Role::Server, None).await;

        let sid = Sid::new();
        debug!("[sid={sid}] new websocket connection");

        let engine = self.clone();
        let close_fn =
            Box::new(move |sid: Sid, reason: CloseReason| engine.close_session(sid, reason));
        let session = Arc::new(Session::new(sid, &self.config, close_fn));
        self.sessions.write().unwrap().insert(sid, session.clone());

        let (mut tx, rx) = ws.split();

        // the open packet goes out before the writer takes over the sink
        let open = Packet::Open(OpenPacket::new(sid, &self.config));
        if let Err(e) = tx.send(Message::Text(open.try_into()?)).await {
            self.sessions.write().unwrap().remove(&sid);
            return Err(e.into());
        }

        let write_handle = ws::forward_to_ws(session.clone(), tx);
        session
            .clone()
            .spawn_heartbeat(self.config.ping_interval, self.config.ping_timeout);
        self.handler.on_connect(session.clone());

        ws::forward_to_handler(rx, &session, self.handler.as_ref()).await;

        // the read loop closed the session; let the writer flush its close
        // frame before returning
        write_handle.await.ok();
        debug!("[sid={sid}] connection terminated");
        Ok(())
    }

    /// Deregisters a session and notifies the handler. Reached exactly once
    /// per session, through [`Session::close`].
    fn close_session(&self, sid: Sid, reason: CloseReason) {
        let session = self.sessions.write().unwrap().remove(&sid);
        if let Some(session) = session {
            debug!("[sid={sid}] session closed: {reason}");
            self.handler.on_disconnect(session, reason);
        }
    }

    /// Returns a session by its id.
    pub fn get_session(&self, sid: Sid) -> Option<Arc<Session>> {
        self.sessions.read().unwrap().get(&sid).cloned()
    }

    /// Closes every session.
    pub fn close(&self) {
        debug!("closing engine, {} sessions", self.sessions.read().unwrap().len());
        let sessions: Vec<_> = self.sessions.read().unwrap().values().cloned().collect();
        for session in sessions {
            session.close(CloseReason::ServerShutdown);
        }
    }
}

/// The 101 response for an accepted WebSocket upgrade.
fn ws_response(ws_key: &HeaderValue) -> Result<Response<Full<Bytes>>, Error> {
    let derived = derive_accept_key(ws_key.as_bytes());
    let sec = derived.parse::<HeaderValue>().unwrap();
    Ok(Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(header::UPGRADE, HeaderValue::from_static("websocket"))
        .header(header::CONNECTION, HeaderValue::from_static("Upgrade"))
        .header(header::SEC_WEBSOCKET_ACCEPT, sec)
        .body(Full::new(Bytes::new()))?)
}
