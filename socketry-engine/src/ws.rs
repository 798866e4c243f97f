//! Pump tasks between a WebSocket connection and a [`Session`]: the read side
//! feeds decoded packets into the handler, the write side drains the session
//! queue into the sink, flushing between bursts.

use std::ops::ControlFlow;
use std::sync::Arc;

use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use hyper::upgrade::Upgraded;
use hyper_util::rt::TokioIo;
use tokio::task::JoinHandle;
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use tracing::debug;

use crate::{
    handler::SessionHandler,
    packet::Packet,
    session::{CloseReason, Session},
};

pub(crate) type WsStream = WebSocketStream<TokioIo<Upgraded>>;

/// Forwards inbound frames to the handler until the connection ends.
/// Every exit path closes the session, which in turn terminates the writer.
pub(crate) async fn forward_to_handler<H: SessionHandler>(
    mut rx: SplitStream<WsStream>,
    session: &Arc<Session>,
    handler: &H,
) {
    while let Some(msg) = rx.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                debug!("[sid={}] ws read error: {}", session.id, e);
                session.close(CloseReason::ReadError);
                return;
            }
        };
        session.mark_activity();
        match msg {
            Message::Text(data) => match Packet::try_from(data.as_str()) {
                Ok(Packet::Close) => {
                    session.close(CloseReason::ClientClose);
                    return;
                }
                // clients may probe as well; answer without touching the
                // server's own ping schedule
                Ok(Packet::Ping) => {
                    session.send(Packet::Pong).ok();
                }
                Ok(Packet::Pong) => {
                    session.pong_tx.try_send(()).ok();
                }
                Ok(Packet::Message(msg)) => handler.on_message(msg, session.clone()),
                Ok(p) => debug!("[sid={}] unexpected packet: {:?}", session.id, p),
                // protocol noise is dropped, it must not kill the session
                Err(e) => debug!("[sid={}] dropping malformed frame: {:?}", session.id, e),
            },
            Message::Close(_) => {
                session.close(CloseReason::ClientClose);
                return;
            }
            Message::Binary(_) => {
                debug!("[sid={}] dropping unexpected binary frame", session.id);
            }
            _ => (),
        }
    }
    session.close(CloseReason::ClientClose);
}

/// Spawns the writer task draining the session queue into the sink.
pub(crate) fn forward_to_ws(
    session: Arc<Session>,
    mut tx: SplitSink<WsStream, Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rx = session
            .internal_rx
            .try_lock()
            .expect("writer started once per session");
        'conn: while let Some(packet) = rx.recv().await {
            if write_packet(&session, &mut tx, packet).await.is_break() {
                break 'conn;
            }
            // drain whatever else is queued before paying for a flush
            while let Ok(packet) = rx.try_recv() {
                if write_packet(&session, &mut tx, packet).await.is_break() {
                    break 'conn;
                }
            }
            tx.flush().await.ok();
        }
        rx.close();
    })
}

async fn write_packet(
    session: &Session,
    tx: &mut SplitSink<WsStream, Message>,
    packet: Packet,
) -> ControlFlow<()> {
    match packet {
        Packet::Close => {
            tx.send(Message::Close(None)).await.ok();
            ControlFlow::Break(())
        }
        packet => {
            let data: String = packet.try_into().unwrap();
            if let Err(e) = tx.feed(Message::Text(data)).await {
                debug!("[sid={}] ws write error: {}", session.id, e);
                session.close(CloseReason::WriteError);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }
    }
}
