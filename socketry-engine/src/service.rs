use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::{ready, Ready};
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::service::Service;
use tracing::debug;

use crate::{config::EngineConfig, engine::Engine, handler::SessionHandler};

/// A hyper [`Service`] exposing the WebSocket endpoint.
///
/// Requests outside the configured mount path get a 404, requests for any
/// other transport get a 400. The `Origin` header is not checked: all origins
/// are accepted.
pub struct EngineService<H: SessionHandler> {
    engine: Arc<Engine<H>>,
}

impl<H: SessionHandler> EngineService<H> {
    /// Creates a service with the default [`EngineConfig`].
    pub fn new(handler: Arc<H>) -> Self {
        Self::with_config(handler, EngineConfig::default())
    }

    pub fn with_config(handler: Arc<H>, config: EngineConfig) -> Self {
        Self {
            engine: Arc::new(Engine::new(handler, config)),
        }
    }

    /// The engine behind this service.
    pub fn engine(&self) -> &Arc<Engine<H>> {
        &self.engine
    }

    fn handle<B: Send + 'static>(&self, req: Request<B>) -> Response<Full<Bytes>> {
        if !req.uri().path().starts_with(&self.engine.config.req_path) {
            return status_response(StatusCode::NOT_FOUND, "");
        }
        if !has_websocket_transport(req.uri().query()) {
            return status_response(
                StatusCode::BAD_REQUEST,
                "Only WebSocket transport is supported",
            );
        }
        if req.method() != Method::GET {
            return status_response(StatusCode::BAD_REQUEST, "");
        }
        match self.engine.clone().on_ws_req(req) {
            Ok(res) => res,
            Err(e) => {
                debug!("ws upgrade refused: {:?}", e);
                status_response(StatusCode::BAD_REQUEST, "")
            }
        }
    }
}

impl<H: SessionHandler> Clone for EngineService<H> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<H: SessionHandler, B: Send + 'static> Service<Request<B>> for EngineService<H> {
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        ready(Ok(self.handle(req)))
    }
}

fn has_websocket_transport(query: Option<&str>) -> bool {
    query
        .unwrap_or_default()
        .split('&')
        .any(|pair| pair == "transport=websocket")
}

fn status_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap()
}
