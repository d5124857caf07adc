//! Routes inbound RPCs to the node's services.

use std::sync::Arc;

use peerbid_p2p::{BoxFuture, RequestHandler, RpcRequest, RpcResponse};
use tracing::warn;

use crate::context::NodeContext;

/// Server-side entry point for every peer request.
#[derive(Debug, Clone)]
pub struct NodeRouter {
    ctx: Arc<NodeContext>,
}

impl NodeRouter {
    /// Creates a router over a node's services.
    #[must_use]
    pub const fn new(ctx: Arc<NodeContext>) -> Self {
        Self { ctx }
    }

    async fn route(&self, request: RpcRequest) -> RpcResponse {
        let request_type = request.request_type();
        let applied = match request {
            RpcRequest::Ping { requesting_peer } => {
                return RpcResponse::Pong {
                    known_peers: self.ctx.gossip.handle_ping(requesting_peer),
                };
            }
            RpcRequest::Initialize(data) => {
                self.ctx.inbound.apply_initialize(data);
                Ok(true)
            }
            RpcRequest::PlaceBid(data) => self.ctx.inbound.apply_bid(data).await,
            RpcRequest::Complete(data) => self.ctx.inbound.apply_complete(data).await,
        };

        match applied {
            Ok(_) => RpcResponse::Ack,
            Err(e) => {
                warn!(request_type, error = %e, "failed to apply inbound request");
                RpcResponse::error(e.to_string())
            }
        }
    }
}

impl RequestHandler for NodeRouter {
    fn handle(&self, request: RpcRequest) -> BoxFuture<'_, RpcResponse> {
        Box::pin(self.route(request))
    }
}
