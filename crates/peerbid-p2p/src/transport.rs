//! Outbound RPC transports.
//!
//! [`WsTransport`] opens one WebSocket connection per call and closes it when
//! the reply arrives. [`MemoryTransport`] routes calls to in-process handlers
//! and is used to wire several nodes together inside one test.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, trace};

use crate::error::{P2pError, P2pResult};
use crate::protocol::{RpcRequest, RpcResponse};
use crate::server::RequestHandler;
use crate::BoxFuture;

/// Issues one typed call against a peer address.
///
/// Deadlines are the caller's concern; implementations may wait forever.
pub trait RpcTransport: Send + Sync {
    /// Sends `request` to the node at `address` and returns its reply.
    fn call<'a>(&'a self, address: &'a str, request: RpcRequest)
        -> BoxFuture<'a, P2pResult<RpcResponse>>;
}

/// JSON-over-WebSocket transport, one connection per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl WsTransport {
    /// Creates the transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    async fn exchange(address: &str, request: RpcRequest) -> P2pResult<RpcResponse> {
        let url = format!("ws://{address}");
        let request_type = request.request_type();
        let json = request.to_json()?;

        trace!(peer = %address, request_type, "connecting");
        let (mut ws, _response) = connect_async(url.as_str()).await?;

        ws.send(Message::Text(json)).await?;

        let response = loop {
            let frame = ws
                .next()
                .await
                .ok_or_else(|| P2pError::Connection("connection closed".into()))??;
            match frame {
                Message::Text(text) => break RpcResponse::from_json(&text)?,
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Close(_) => {
                    return Err(P2pError::Connection("connection closed by peer".into()));
                }
                Message::Binary(_) | Message::Frame(_) => {
                    return Err(P2pError::Protocol("unexpected non-text frame".into()));
                }
            }
        };

        if let Err(e) = ws.close(None).await {
            debug!(peer = %address, error = %e, "close after reply failed");
        }
        trace!(peer = %address, request_type, "reply received");
        Ok(response)
    }
}

impl RpcTransport for WsTransport {
    fn call<'a>(
        &'a self,
        address: &'a str,
        request: RpcRequest,
    ) -> BoxFuture<'a, P2pResult<RpcResponse>> {
        Box::pin(Self::exchange(address, request))
    }
}

#[derive(Default)]
struct Routes {
    handlers: HashMap<String, Arc<dyn RequestHandler>>,
    unreachable: HashSet<String>,
    delays: HashMap<String, Duration>,
}

/// In-process transport that dispatches straight to registered handlers.
///
/// Requests and replies still pass through their JSON encoding.
#[derive(Default)]
pub struct MemoryTransport {
    routes: RwLock<Routes>,
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes = self.routes.read();
        f.debug_struct("MemoryTransport")
            .field("addresses", &routes.handlers.keys().collect::<Vec<_>>())
            .field("unreachable", &routes.unreachable)
            .finish_non_exhaustive()
    }
}

impl MemoryTransport {
    /// Creates a transport with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes calls for `address` to `handler`.
    pub fn register(&self, address: impl Into<String>, handler: Arc<dyn RequestHandler>) {
        self.routes.write().handlers.insert(address.into(), handler);
    }

    /// Makes calls to `address` fail with a connection error.
    pub fn set_unreachable(&self, address: impl Into<String>, unreachable: bool) {
        let address = address.into();
        let mut routes = self.routes.write();
        if unreachable {
            routes.unreachable.insert(address);
        } else {
            routes.unreachable.remove(&address);
        }
    }

    /// Delays every call to `address` before it reaches the handler.
    pub fn set_delay(&self, address: impl Into<String>, delay: Duration) {
        self.routes.write().delays.insert(address.into(), delay);
    }

    fn route(&self, address: &str) -> P2pResult<(Arc<dyn RequestHandler>, Option<Duration>)> {
        let routes = self.routes.read();
        if routes.unreachable.contains(address) {
            return Err(P2pError::Connection(format!("{address} is unreachable")));
        }
        let handler = routes
            .handlers
            .get(address)
            .cloned()
            .ok_or_else(|| P2pError::Connection(format!("no node listening on {address}")))?;
        Ok((handler, routes.delays.get(address).copied()))
    }
}

impl RpcTransport for MemoryTransport {
    fn call<'a>(
        &'a self,
        address: &'a str,
        request: RpcRequest,
    ) -> BoxFuture<'a, P2pResult<RpcResponse>> {
        Box::pin(async move {
            let (handler, delay) = self.route(address)?;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let request = RpcRequest::from_json(&request.to_json()?)?;
            let response = handler.handle(request).await;
            RpcResponse::from_json(&response.to_json()?)
        })
    }
}
