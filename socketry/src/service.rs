use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use hyper::service::Service;

use crate::{
    adapter::{Adapter, MemoryAdapter},
    server::Server,
};
use socketry_engine::{config::EngineConfig, service::EngineService, Engine};

/// A hyper [`Service`] for the socket.io endpoint, delegating HTTP handling
/// to the engine service. Mount it on a connection builder with upgrades
/// enabled:
///
/// ```no_run
/// # async fn serve(io: hyper_util::rt::TokioIo<tokio::net::TcpStream>) {
/// # let (svc, _server): (_, std::sync::Arc<socketry::Server>) = socketry::Server::new();
/// hyper::server::conn::http1::Builder::new()
///     .serve_connection(io, svc)
///     .with_upgrades()
///     .await
///     .ok();
/// # }
/// ```
pub struct SocketryService<A: Adapter = MemoryAdapter> {
    inner: EngineService<Server<A>>,
}

impl<A: Adapter> SocketryService<A> {
    pub(crate) fn with_config(server: Arc<Server<A>>, config: EngineConfig) -> Self {
        Self {
            inner: EngineService::with_config(server, config),
        }
    }

    /// The engine behind this service.
    pub fn engine(&self) -> &Arc<Engine<Server<A>>> {
        self.inner.engine()
    }
}

impl<A: Adapter> Clone for SocketryService<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: Adapter, B: Send + 'static> Service<Request<B>> for SocketryService<A> {
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = <EngineService<Server<A>> as Service<Request<B>>>::Future;

    fn call(&self, req: Request<B>) -> Self::Future {
        self.inner.call(req)
    }
}
