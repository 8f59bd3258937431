//! Relay server.
//!
//! Each accepted connection runs in its own tokio task: a read loop feeding
//! the [`EventRouter`], plus a writer task draining that connection's outbound
//! queue. Delivery is fire-and-forget; a full or closed queue just drops the
//! event.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::config::RelayConfig;
use super::error::RelayResult;
use super::registry::RoomRegistry;
use super::router::{Delivery, EventRouter, Inbound};
use crate::protocol::{ClientEvent, ConnectedEvent, ConnectionId, ServerEvent};
use crate::transport::{framed, FrameSink, FrameSource, TcpListener, TransportError};

/// Events buffered per connection before further deliveries are dropped.
pub const OUTBOUND_QUEUE_LEN: usize = 256;

/// Outbound queues of live connections.
#[derive(Default)]
pub struct ConnectionHub {
    senders: Mutex<HashMap<ConnectionId, mpsc::Sender<ServerEvent>>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, id: ConnectionId, sender: mpsc::Sender<ServerEvent>) {
        self.senders.lock().await.insert(id, sender);
    }

    pub async fn unregister(&self, id: &ConnectionId) {
        self.senders.lock().await.remove(id);
    }

    /// Queues each delivery on its target connection, in order.
    pub async fn deliver(&self, deliveries: Vec<Delivery>) {
        if deliveries.is_empty() {
            return;
        }
        let senders = self.senders.lock().await;
        for delivery in deliveries {
            let Some(sender) = senders.get(&delivery.to) else {
                debug!(conn = %delivery.to, "no such connection, dropping event");
                continue;
            };
            match sender.try_send(delivery.event) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(event)) => {
                    debug!(conn = %delivery.to, event = event.name(), "outbound queue full, dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(conn = %delivery.to, "outbound queue closed, dropping event");
                }
            }
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.senders.lock().await.len()
    }
}

/// The relay: registry, router and live connections.
pub struct RelayServer {
    config: RelayConfig,
    router: EventRouter,
    hub: ConnectionHub,
}

impl RelayServer {
    /// Creates a server with a fresh registry.
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(RoomRegistry::new(config.room_id_len));
        Self::with_registry(config, registry)
    }

    /// Creates a server around an existing registry.
    pub fn with_registry(config: RelayConfig, registry: Arc<RoomRegistry>) -> Self {
        Self {
            config,
            router: EventRouter::new(registry),
            hub: ConnectionHub::new(),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        self.router.registry()
    }

    pub fn hub(&self) -> &ConnectionHub {
        &self.hub
    }

    /// Binds the configured listen address.
    pub async fn bind(&self) -> RelayResult<TcpListener> {
        let listener = TcpListener::bind(self.config.bind_addr.as_str()).await?;
        info!(addr = %listener.local_addr()?, "relay listening");
        Ok(listener)
    }

    /// Accepts connections forever, one task per connection.
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> RelayResult<()> {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };
            debug!(peer = %peer, "accepted connection");

            let server = Arc::clone(&self);
            tokio::spawn(async move {
                server.serve_connection(stream).await;
            });
        }
    }

    /// Runs one connection until its transport closes.
    pub async fn serve_connection<S>(self: Arc<Self>, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let connection_id = ConnectionId::random();
        let (mut reader, mut writer) = framed(stream, self.config.max_frame_bytes);
        let (tx, mut rx) = mpsc::channel::<ServerEvent>(OUTBOUND_QUEUE_LEN);

        self.hub.register(connection_id.clone(), tx).await;
        info!(conn = %connection_id, "connection opened");

        let writer_conn = connection_id.clone();
        let writer_task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = writer.send(&event).await {
                    debug!(conn = %writer_conn, error = %e, "write failed");
                    break;
                }
            }
            // Best effort; the peer may already be gone.
            let _ = FrameSink::<ServerEvent>::close(&mut writer).await;
        });

        self.hub
            .deliver(vec![Delivery::new(
                connection_id.clone(),
                ServerEvent::Connected(ConnectedEvent {
                    connection_id: connection_id.clone(),
                }),
            )])
            .await;

        loop {
            let next: Result<Option<ClientEvent>, _> = reader.receive().await;
            match next {
                Ok(Some(event)) => {
                    let deliveries = self.router.route(&connection_id, Inbound::Event(event)).await;
                    self.hub.deliver(deliveries).await;
                }
                Ok(None) => break,
                // The whole frame was consumed, so the stream is still in sync.
                Err(TransportError::Malformed(e)) => {
                    warn!(conn = %connection_id, error = %e, "ignoring malformed event");
                    self.hub
                        .deliver(vec![Delivery::new(
                            connection_id.clone(),
                            ServerEvent::error("Malformed event"),
                        )])
                        .await;
                }
                Err(e) => {
                    warn!(conn = %connection_id, error = %e, "closing connection");
                    break;
                }
            }
        }

        let deliveries = self.router.route(&connection_id, Inbound::Disconnect).await;
        self.hub.unregister(&connection_id).await;
        self.hub.deliver(deliveries).await;

        if writer_task.await.is_err() {
            debug!(conn = %connection_id, "writer task panicked");
        }
        info!(conn = %connection_id, "connection closed");
    }
}
