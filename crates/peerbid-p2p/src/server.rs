//! Inbound RPC listener.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{P2pError, P2pResult};
use crate::protocol::{RpcRequest, RpcResponse};
use crate::BoxFuture;

/// Answers requests that arrive from peers.
pub trait RequestHandler: Send + Sync {
    /// Handles one request and produces its reply.
    fn handle(&self, request: RpcRequest) -> BoxFuture<'_, RpcResponse>;
}

/// WebSocket listener that feeds every request to a [`RequestHandler`].
///
/// Binding and serving are separate steps so the caller can learn the bound
/// address (for port `0`) before building the handler.
#[derive(Debug)]
pub struct RpcServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
}

impl RpcServer {
    /// Binds the listener.
    ///
    /// # Errors
    ///
    /// Returns [`P2pError::BindFailed`] if the address cannot be bound.
    pub async fn bind(addr: SocketAddr, config: ServerConfig) -> P2pResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| P2pError::BindFailed(addr, e))?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "RPC server listening");
        Ok(Self {
            listener,
            local_addr,
            config,
        })
    }

    /// Address the listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections until `shutdown` resolves.
    pub async fn run_until<F>(self, handler: Arc<dyn RequestHandler>, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            self.spawn_connection(stream, peer_addr, Arc::clone(&handler));
                        }
                        Err(e) => warn!(error = %e, "Failed to accept connection"),
                    }
                }
                () = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }
        info!(addr = %self.local_addr, "RPC server stopped");
    }

    /// Runs the server on a background task.
    #[must_use]
    pub fn spawn(self, handler: Arc<dyn RequestHandler>) -> ServerHandle {
        let local_addr = self.local_addr;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(self.run_until(handler, async move {
            let _ = shutdown_rx.await;
        }));
        ServerHandle {
            local_addr,
            shutdown_tx,
            task,
        }
    }

    fn spawn_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        handler: Arc<dyn RequestHandler>,
    ) {
        let config = self.config;
        tokio::spawn(async move {
            match serve_connection(stream, handler, config).await {
                Ok(()) => debug!(peer = %peer_addr, "Connection closed normally"),
                Err(e) => debug!(peer = %peer_addr, error = %e, "Connection ended with error"),
            }
        });
    }
}

/// Handle to a server started with [`RpcServer::spawn`].
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits for the accept loop to exit.
    ///
    /// Connections already being served finish on their own.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "RPC server task failed");
        }
    }
}

/// Serves every request on one connection until the peer closes it.
async fn serve_connection(
    stream: TcpStream,
    handler: Arc<dyn RequestHandler>,
    config: ServerConfig,
) -> P2pResult<()> {
    let mut ws = timeout(config.handshake_timeout, accept_async(stream))
        .await
        .map_err(|_| P2pError::Timeout(config.handshake_timeout))??;

    while let Some(frame) = ws.next().await {
        let text = match frame? {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
            WsMessage::Binary(_) => {
                send_reply(&mut ws, &RpcResponse::error("binary frames are not supported")).await?;
                continue;
            }
        };

        if !config.is_message_size_valid(text.len()) {
            warn!(size = text.len(), max = config.max_message_size, "Message too large");
            send_reply(&mut ws, &RpcResponse::error("message too large")).await?;
            continue;
        }

        let response = match RpcRequest::from_json(&text) {
            Ok(request) => {
                debug!(request_type = request.request_type(), "Handling request");
                handler.handle(request).await
            }
            Err(e) => {
                debug!(error = %e, "Malformed request");
                RpcResponse::error(format!("malformed request: {e}"))
            }
        };
        send_reply(&mut ws, &response).await?;
    }
    Ok(())
}

async fn send_reply<S>(ws: &mut S, response: &RpcResponse) -> P2pResult<()>
where
    S: futures::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    ws.send(WsMessage::Text(response.to_json()?)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{RpcTransport, WsTransport};
    use peerbid_core::Peer;

    struct Greeter;

    impl RequestHandler for Greeter {
        fn handle(&self, request: RpcRequest) -> BoxFuture<'_, RpcResponse> {
            Box::pin(async move {
                match request {
                    RpcRequest::Ping { requesting_peer } => RpcResponse::Pong {
                        known_peers: vec![requesting_peer],
                    },
                    RpcRequest::Complete(_) => RpcResponse::error("refused"),
                    _ => RpcResponse::Ack,
                }
            })
        }
    }

    async fn start() -> ServerHandle {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        RpcServer::bind(addr, ServerConfig::default())
            .await
            .unwrap()
            .spawn(Arc::new(Greeter))
    }

    #[tokio::test]
    async fn ping_over_websocket() {
        let server = start().await;
        let address = server.local_addr().to_string();
        let me = Peer::new("127.0.0.1:6001", "bob").unwrap();

        let reply = WsTransport::new()
            .call(&address, RpcRequest::Ping { requesting_peer: me.clone() })
            .await
            .unwrap();
        assert_eq!(reply, RpcResponse::Pong { known_peers: vec![me] });

        server.shutdown().await;
    }

    #[tokio::test]
    async fn error_replies_are_delivered() {
        let server = start().await;
        let address = server.local_addr().to_string();
        let request = RpcRequest::Complete(crate::protocol::CompletionData {
            auction_id: peerbid_core::AuctionId::parse("X").unwrap(),
            highest_bidder: "bob".into(),
            price: peerbid_core::Price::from_units(15),
        });

        let reply = WsTransport::new().call(&address, request).await.unwrap();
        assert_eq!(reply, RpcResponse::error("refused"));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let server = start().await;
        let err = RpcServer::bind(server.local_addr(), ServerConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, P2pError::BindFailed(addr, _) if addr == server.local_addr()));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_accepting() {
        let server = start().await;
        let address = server.local_addr().to_string();
        server.shutdown().await;

        let me = Peer::new("127.0.0.1:6001", "bob").unwrap();
        let result = WsTransport::new()
            .call(&address, RpcRequest::Ping { requesting_peer: me })
            .await;
        assert!(result.is_err());
    }
}
