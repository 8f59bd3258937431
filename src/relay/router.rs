//! Relay event dispatch.
//!
//! The router turns one inbound event from one connection into an ordered
//! list of deliveries. It reads only routing metadata (room id, sender);
//! chat payloads pass through untouched.

use std::sync::Arc;

use tracing::{debug, warn};

use super::error::RelayError;
use super::registry::RoomRegistry;
use crate::protocol::{
    relay_timestamp, ClientEvent, ConnectionId, CreateRoomRequest, JoinRoomRequest,
    ReceiveMessageEvent, Role, RoomCreatedEvent, RoomJoinedEvent, SendMessageRequest, ServerEvent,
    TypingRequest, UserJoinedEvent, UserLeftEvent, UserTypingEvent,
};

/// Something that happened on a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A decoded client event.
    Event(ClientEvent),
    /// The transport closed.
    Disconnect,
}

/// An event addressed to one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: ConnectionId,
    pub event: ServerEvent,
}

impl Delivery {
    pub fn new(to: ConnectionId, event: ServerEvent) -> Self {
        Self { to, event }
    }
}

/// Dispatches inbound events to the registry and computes fan-out.
pub struct EventRouter {
    registry: Arc<RoomRegistry>,
}

impl EventRouter {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Handles one inbound event from `from`.
    pub async fn route(&self, from: &ConnectionId, inbound: Inbound) -> Vec<Delivery> {
        match inbound {
            Inbound::Event(event) => {
                debug!(conn = %from, event = event.name(), "inbound event");
                let result = match event {
                    ClientEvent::CreateRoom(req) => self.create_room(from, req).await,
                    ClientEvent::JoinRoom(req) => self.join_room(from, req).await,
                    ClientEvent::SendMessage(req) => self.forward_message(from, req).await,
                    ClientEvent::TypingStart(req) => self.typing(from, req, true).await,
                    ClientEvent::TypingEnd(req) => self.typing(from, req, false).await,
                    ClientEvent::LeaveRoom => Ok(self.leave(from).await),
                };
                result.unwrap_or_else(|err| self.reject(from, err))
            }
            Inbound::Disconnect => {
                debug!(conn = %from, "disconnect");
                self.leave(from).await
            }
        }
    }

    fn reject(&self, from: &ConnectionId, err: RelayError) -> Vec<Delivery> {
        warn!(conn = %from, error = %err, "request rejected");
        if err.is_client_visible() {
            vec![Delivery::new(from.clone(), ServerEvent::error(err.to_string()))]
        } else {
            Vec::new()
        }
    }

    async fn create_room(
        &self,
        from: &ConnectionId,
        req: CreateRoomRequest,
    ) -> Result<Vec<Delivery>, RelayError> {
        let profile = req.into_profile();
        let room_id = self.registry.create_room(from, profile.clone()).await?;

        Ok(vec![
            Delivery::new(
                from.clone(),
                ServerEvent::RoomCreated(RoomCreatedEvent {
                    room_id: room_id.clone(),
                }),
            ),
            Delivery::new(
                from.clone(),
                ServerEvent::RoomJoined(RoomJoinedEvent {
                    room_id,
                    profile,
                    role: Role::Creator,
                }),
            ),
        ])
    }

    async fn join_room(
        &self,
        from: &ConnectionId,
        req: JoinRoomRequest,
    ) -> Result<Vec<Delivery>, RelayError> {
        let joined = self
            .registry
            .join_room(from, &req.room_id, req.profile)
            .await?;

        let timestamp = relay_timestamp();
        let mut deliveries: Vec<Delivery> = joined
            .existing
            .iter()
            .map(|occupant| {
                Delivery::new(
                    occupant.connection_id.clone(),
                    ServerEvent::UserJoined(UserJoinedEvent {
                        user_id: from.clone(),
                        profile: joined.joiner.profile.clone(),
                        timestamp: timestamp.clone(),
                    }),
                )
            })
            .collect();

        deliveries.push(Delivery::new(
            from.clone(),
            ServerEvent::RoomJoined(RoomJoinedEvent {
                room_id: joined.room_id.clone(),
                profile: joined.creator_profile(),
                role: Role::Joiner,
            }),
        ));
        Ok(deliveries)
    }

    async fn forward_message(
        &self,
        from: &ConnectionId,
        req: SendMessageRequest,
    ) -> Result<Vec<Delivery>, RelayError> {
        let membership = self
            .registry
            .membership(from)
            .await
            .filter(|m| m.room_id == req.room_id)
            .ok_or(RelayError::NotInRoom)?;

        let profile = req.profile.unwrap_or(membership.me.profile);
        let timestamp = relay_timestamp();

        Ok(membership
            .others
            .into_iter()
            .map(|peer| {
                Delivery::new(
                    peer.connection_id,
                    ServerEvent::ReceiveMessage(ReceiveMessageEvent {
                        room_id: membership.room_id.clone(),
                        message: req.message.clone(),
                        sender_id: from.clone(),
                        profile: profile.clone(),
                        timestamp: timestamp.clone(),
                    }),
                )
            })
            .collect())
    }

    async fn typing(
        &self,
        from: &ConnectionId,
        req: TypingRequest,
        is_typing: bool,
    ) -> Result<Vec<Delivery>, RelayError> {
        let membership = self
            .registry
            .membership(from)
            .await
            .filter(|m| m.room_id == req.room_id)
            .ok_or(RelayError::NotInRoom)?;

        let username = req
            .username
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| membership.me.profile.display_name().to_string());

        Ok(membership
            .others
            .into_iter()
            .map(|peer| {
                Delivery::new(
                    peer.connection_id,
                    ServerEvent::UserTyping(UserTypingEvent {
                        username: username.clone(),
                        is_typing,
                    }),
                )
            })
            .collect())
    }

    async fn leave(&self, from: &ConnectionId) -> Vec<Delivery> {
        let Some(outcome) = self.registry.leave(from).await else {
            return Vec::new();
        };

        match outcome.remaining {
            Some(survivor) => vec![Delivery::new(
                survivor.connection_id,
                ServerEvent::UserLeft(UserLeftEvent {
                    username: outcome.departed.profile.display_name().to_string(),
                    timestamp: relay_timestamp(),
                }),
            )],
            None => Vec::new(),
        }
    }
}
