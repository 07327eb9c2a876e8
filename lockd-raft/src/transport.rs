//! Peer-to-peer transport for Raft messages, over gRPC.
//!
//! Every raft-rs message type (votes, heartbeats, appends, snapshots) is
//! multiplexed through one `StepMessage` RPC as opaque protobuf-v2 bytes,
//! the same approach etcd and tikv use for peer transport. There is no
//! mTLS or join handshake: membership is fixed at startup, so there is no
//! bootstrap dance to secure.

use std::collections::HashMap;
use std::sync::Arc;

use protobuf::Message as ProtobufMessage;
use raft::eraftpb::Message as RaftMessage;
use tokio::sync::Mutex;
use tonic::transport::Channel;
use tonic::{Request, Response, Status};

use crate::node::RaftReplicator;
use crate::proto::raft_transport_client::RaftTransportClient;
use crate::proto::raft_transport_server::{RaftTransport, RaftTransportServer};
use crate::proto::{StepMessageRequest, StepMessageResponse};

/// gRPC service implementation: decode the inbound protobuf-v2 bytes and
/// hand them to the local replicator's driver via its channel.
pub struct RaftTransportService {
    replicator: RaftReplicator,
}

impl RaftTransportService {
    pub fn new(replicator: RaftReplicator) -> Self {
        Self { replicator }
    }

    pub fn into_server(self) -> RaftTransportServer<Self> {
        RaftTransportServer::new(self)
    }
}

#[tonic::async_trait]
impl RaftTransport for RaftTransportService {
    async fn step_message(
        &self,
        request: Request<StepMessageRequest>,
    ) -> std::result::Result<Response<StepMessageResponse>, Status> {
        let bytes = request.into_inner().message;
        let msg: RaftMessage = match ProtobufMessage::parse_from_bytes(&bytes) {
            Ok(m) => m,
            Err(e) => {
                return Ok(Response::new(StepMessageResponse {
                    ok: false,
                    error: format!("failed to decode raft message: {e}"),
                }))
            }
        };

        match self.replicator.step(msg) {
            Ok(()) => Ok(Response::new(StepMessageResponse {
                ok: true,
                error: String::new(),
            })),
            Err(e) => Ok(Response::new(StepMessageResponse {
                ok: false,
                error: e.to_string(),
            })),
        }
    }
}

/// A lazily-connected pool of gRPC clients, one per peer address.
///
/// Connections are established on first use and kept for the lifetime of
/// the process; a peer that drops a connection is reconnected on the
/// next message.
pub struct PeerClients {
    clients: Mutex<HashMap<String, RaftTransportClient<Channel>>>,
}

impl Default for PeerClients {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerClients {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Serialize and send one outgoing Raft message to `address`,
    /// logging (not panicking) on any failure — a dropped peer message is
    /// recoverable; raft-rs will retry on the next tick.
    pub async fn send(&self, address: &str, msg: RaftMessage) {
        let bytes = match ProtobufMessage::write_to_bytes(&msg) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(%address, error = %e, "failed to encode outgoing raft message");
                return;
            }
        };

        let mut client = match self.connect(address).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(%address, error = %e, "failed to connect to raft peer");
                return;
            }
        };

        if let Err(e) = client
            .step_message(StepMessageRequest { message: bytes })
            .await
        {
            tracing::warn!(%address, error = %e, "step_message rpc failed");
            self.clients.lock().await.remove(address);
        }
    }

    async fn connect(
        &self,
        address: &str,
    ) -> std::result::Result<RaftTransportClient<Channel>, tonic::transport::Error> {
        {
            let clients = self.clients.lock().await;
            if let Some(client) = clients.get(address) {
                return Ok(client.clone());
            }
        }

        let endpoint = if address.starts_with("http") {
            address.to_string()
        } else {
            format!("http://{address}")
        };
        let channel = Channel::from_shared(endpoint)
            .expect("address was validated at config-load time")
            .connect()
            .await?;
        let client = RaftTransportClient::new(channel);
        self.clients
            .lock()
            .await
            .insert(address.to_string(), client.clone());
        Ok(client)
    }
}

/// Bind `address` and serve the `RaftTransport` service until `shutdown`
/// fires.
pub async fn serve(
    address: std::net::SocketAddr,
    replicator: RaftReplicator,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> std::result::Result<(), tonic::transport::Error> {
    let service = RaftTransportService::new(replicator).into_server();
    tonic::transport::Server::builder()
        .add_service(service)
        .serve_with_shutdown(address, async move {
            let _ = shutdown.changed().await;
        })
        .await
}

/// Returns an `Arc<PeerClients>` ready for [`crate::node::ReplicatorDriver::run`].
pub fn peer_clients() -> Arc<PeerClients> {
    Arc::new(PeerClients::new())
}
