//! In-memory room registry.
//!
//! All rooms and memberships live behind one mutex, so each create, join
//! and leave observes and mutates the registry atomically. In particular the
//! capacity check and the append of a joiner happen under the same lock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::error::{RelayError, RelayResult};
use crate::protocol::{ConnectionId, Profile, Role, RoomId};

/// Maximum number of participants in a room.
pub const ROOM_CAPACITY: usize = 2;

/// Number of ids tried before room creation gives up.
pub const MAX_ID_ATTEMPTS: usize = 64;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Source of candidate room ids.
pub trait RoomIdSource: Send {
    /// Produces the next candidate id. Uniqueness is checked by the registry.
    fn next_id(&mut self) -> RoomId;
}

/// Random lowercase base-36 ids of a fixed length.
#[derive(Debug, Clone)]
pub struct RandomRoomIds {
    len: usize,
}

impl RandomRoomIds {
    pub fn new(len: usize) -> Self {
        Self { len }
    }
}

impl RoomIdSource for RandomRoomIds {
    fn next_id(&mut self) -> RoomId {
        let mut rng = rand::thread_rng();
        let id: String = (0..self.len)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect();
        RoomId::new(id)
    }
}

/// A room member.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub profile: Profile,
    pub role: Role,
}

/// A pairing context with at most [`ROOM_CAPACITY`] participants.
///
/// The first participant is always the creator.
#[derive(Debug, Clone)]
pub struct Room {
    pub room_id: RoomId,
    pub participants: Vec<Participant>,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn is_full(&self) -> bool {
        self.participants.len() >= ROOM_CAPACITY
    }

    pub fn creator(&self) -> Option<&Participant> {
        self.participants.first()
    }
}

/// Outcome of a successful join.
#[derive(Debug, Clone)]
pub struct JoinResult {
    pub room_id: RoomId,
    /// The admitted participant.
    pub joiner: Participant,
    /// Participants that were already in the room, creator first.
    pub existing: Vec<Participant>,
}

impl JoinResult {
    /// The creator's profile, shown to the joiner.
    pub fn creator_profile(&self) -> Profile {
        self.existing
            .first()
            .map(|p| p.profile.clone())
            .unwrap_or_default()
    }
}

/// Outcome of a departure.
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    pub room_id: RoomId,
    pub departed: Participant,
    /// Participant still in the room, if any.
    pub remaining: Option<Participant>,
}

impl LeaveOutcome {
    /// Whether the departure deleted the room.
    pub fn room_deleted(&self) -> bool {
        self.remaining.is_none()
    }
}

/// A connection's view of its room.
#[derive(Debug, Clone)]
pub struct Membership {
    pub room_id: RoomId,
    pub me: Participant,
    pub others: Vec<Participant>,
}

struct RegistryState {
    rooms: HashMap<RoomId, Room>,
    memberships: HashMap<ConnectionId, RoomId>,
    ids: Box<dyn RoomIdSource>,
}

/// Mapping from room id to its participants.
pub struct RoomRegistry {
    state: Mutex<RegistryState>,
}

impl RoomRegistry {
    /// Creates a registry generating random base-36 ids of `room_id_len`.
    pub fn new(room_id_len: usize) -> Self {
        Self::with_id_source(Box::new(RandomRoomIds::new(room_id_len)))
    }

    /// Creates a registry drawing candidate ids from `ids`.
    pub fn with_id_source(ids: Box<dyn RoomIdSource>) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                rooms: HashMap::new(),
                memberships: HashMap::new(),
                ids,
            }),
        }
    }

    /// Creates a room with the caller as its creator.
    ///
    /// Candidate ids already in use are skipped, so an existing room is
    /// never overwritten.
    pub async fn create_room(
        &self,
        connection_id: &ConnectionId,
        profile: Profile,
    ) -> RelayResult<RoomId> {
        let mut state = self.state.lock().await;

        if let Some(room_id) = state.memberships.get(connection_id) {
            return Err(RelayError::AlreadyInRoom {
                room_id: room_id.clone(),
            });
        }

        let mut room_id = None;
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = state.ids.next_id();
            if !state.rooms.contains_key(&candidate) {
                room_id = Some(candidate);
                break;
            }
            debug!(room = %candidate, "room id collision, retrying");
        }
        let room_id = room_id.ok_or(RelayError::RoomIdsExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })?;

        let room = Room {
            room_id: room_id.clone(),
            participants: vec![Participant {
                connection_id: connection_id.clone(),
                profile,
                role: Role::Creator,
            }],
            created_at: Utc::now(),
        };
        state.rooms.insert(room_id.clone(), room);
        state
            .memberships
            .insert(connection_id.clone(), room_id.clone());

        info!(room = %room_id, conn = %connection_id, "room created");
        Ok(room_id)
    }

    /// Admits the caller into an existing room.
    ///
    /// Fails without touching any state when the room is missing or full.
    pub async fn join_room(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
        profile: Profile,
    ) -> RelayResult<JoinResult> {
        let mut state = self.state.lock().await;

        if let Some(current) = state.memberships.get(connection_id) {
            return Err(RelayError::AlreadyInRoom {
                room_id: current.clone(),
            });
        }

        let room = state
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RelayError::RoomNotFound {
                room_id: room_id.clone(),
            })?;

        if room.is_full() {
            return Err(RelayError::RoomFull {
                room_id: room_id.clone(),
            });
        }

        let existing = room.participants.clone();
        let joiner = Participant {
            connection_id: connection_id.clone(),
            profile,
            role: Role::Joiner,
        };
        room.participants.push(joiner.clone());
        state
            .memberships
            .insert(connection_id.clone(), room_id.clone());

        info!(room = %room_id, conn = %connection_id, "participant joined");
        Ok(JoinResult {
            room_id: room_id.clone(),
            joiner,
            existing,
        })
    }

    /// Removes the connection from its room, deleting the room if it empties.
    ///
    /// Returns `None` when the connection was not in a room.
    pub async fn leave(&self, connection_id: &ConnectionId) -> Option<LeaveOutcome> {
        let mut state = self.state.lock().await;

        let room_id = state.memberships.remove(connection_id)?;
        let room = state.rooms.get_mut(&room_id)?;

        let index = room
            .participants
            .iter()
            .position(|p| &p.connection_id == connection_id)?;
        let departed = room.participants.remove(index);

        let remaining = match room.participants.first_mut() {
            Some(survivor) => {
                // The survivor now heads the room and waits for a new joiner.
                survivor.role = Role::Creator;
                Some(survivor.clone())
            }
            None => None,
        };

        if remaining.is_none() {
            state.rooms.remove(&room_id);
            info!(room = %room_id, "room deleted");
        }
        debug!(room = %room_id, conn = %connection_id, "participant left");

        Some(LeaveOutcome {
            room_id,
            departed,
            remaining,
        })
    }

    /// The connection's room and the other participants in it.
    pub async fn membership(&self, connection_id: &ConnectionId) -> Option<Membership> {
        let state = self.state.lock().await;

        let room_id = state.memberships.get(connection_id)?;
        let room = state.rooms.get(room_id)?;

        let mut me = None;
        let mut others = Vec::new();
        for participant in &room.participants {
            if &participant.connection_id == connection_id {
                me = Some(participant.clone());
            } else {
                others.push(participant.clone());
            }
        }

        Some(Membership {
            room_id: room_id.clone(),
            me: me?,
            others,
        })
    }

    /// Snapshot of a room.
    pub async fn room(&self, room_id: &RoomId) -> Option<Room> {
        self.state.lock().await.rooms.get(room_id).cloned()
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.state.lock().await.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;

    struct FixedIds(VecDeque<&'static str>);

    impl RoomIdSource for FixedIds {
        fn next_id(&mut self) -> RoomId {
            RoomId::new(self.0.pop_front().unwrap_or("zzzzzz"))
        }
    }

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::new(id)
    }

    #[test]
    fn test_random_ids_are_base36() {
        let mut ids = RandomRoomIds::new(6);
        for _ in 0..100 {
            let id = ids.next_id();
            assert_eq!(id.as_str().len(), 6);
            assert!(id
                .as_str()
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        }
    }

    #[tokio::test]
    async fn test_create_room_has_one_participant() {
        let registry = RoomRegistry::new(6);
        let room_id = registry
            .create_room(&conn("a"), Profile::named("Alice"))
            .await
            .unwrap();

        let room = registry.room(&room_id).await.unwrap();
        assert_eq!(room.participants.len(), 1);
        assert_eq!(room.participants[0].role, Role::Creator);
        assert_eq!(room.creator().unwrap().connection_id, conn("a"));
    }

    #[tokio::test]
    async fn test_create_skips_ids_in_use() {
        let registry = RoomRegistry::with_id_source(Box::new(FixedIds(VecDeque::from([
            "aaaaaa", "aaaaaa", "aaaaaa", "bbbbbb",
        ]))));

        let first = registry.create_room(&conn("a"), Profile::default()).await.unwrap();
        let second = registry.create_room(&conn("b"), Profile::default()).await.unwrap();

        assert_eq!(first, RoomId::new("aaaaaa"));
        assert_eq!(second, RoomId::new("bbbbbb"));
        let original = registry.room(&first).await.unwrap();
        assert_eq!(original.participants[0].connection_id, conn("a"));
    }

    #[tokio::test]
    async fn test_create_gives_up_when_ids_exhausted() {
        struct Always;
        impl RoomIdSource for Always {
            fn next_id(&mut self) -> RoomId {
                RoomId::new("same")
            }
        }

        let registry = RoomRegistry::with_id_source(Box::new(Always));
        registry.create_room(&conn("a"), Profile::default()).await.unwrap();

        let result = registry.create_room(&conn("b"), Profile::default()).await;
        assert!(matches!(
            result,
            Err(RelayError::RoomIdsExhausted { attempts: MAX_ID_ATTEMPTS })
        ));
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_join_missing_room() {
        let registry = RoomRegistry::new(6);
        let result = registry
            .join_room(&conn("b"), &RoomId::new("nope00"), Profile::default())
            .await;

        assert!(matches!(result, Err(RelayError::RoomNotFound { .. })));
        assert!(registry.membership(&conn("b")).await.is_none());
    }

    #[tokio::test]
    async fn test_join_returns_creator_profile() {
        let registry = RoomRegistry::new(6);
        let room_id = registry
            .create_room(&conn("a"), Profile::named("Alice"))
            .await
            .unwrap();

        let joined = registry
            .join_room(&conn("b"), &room_id, Profile::named("Bob"))
            .await
            .unwrap();

        assert_eq!(joined.creator_profile(), Profile::named("Alice"));
        assert_eq!(joined.joiner.role, Role::Joiner);
        assert_eq!(registry.room(&room_id).await.unwrap().participants.len(), 2);
    }

    #[tokio::test]
    async fn test_join_full_room() {
        let registry = RoomRegistry::new(6);
        let room_id = registry.create_room(&conn("a"), Profile::default()).await.unwrap();
        registry
            .join_room(&conn("b"), &room_id, Profile::default())
            .await
            .unwrap();

        let result = registry
            .join_room(&conn("c"), &room_id, Profile::default())
            .await;

        assert!(matches!(result, Err(RelayError::RoomFull { .. })));
        assert_eq!(registry.room(&room_id).await.unwrap().participants.len(), 2);
        assert!(registry.membership(&conn("c")).await.is_none());
    }

    #[tokio::test]
    async fn test_one_room_per_connection() {
        let registry = RoomRegistry::new(6);
        let room_id = registry.create_room(&conn("a"), Profile::default()).await.unwrap();

        assert!(matches!(
            registry.create_room(&conn("a"), Profile::default()).await,
            Err(RelayError::AlreadyInRoom { .. })
        ));
        assert!(matches!(
            registry.join_room(&conn("a"), &room_id, Profile::default()).await,
            Err(RelayError::AlreadyInRoom { .. })
        ));
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_respect_capacity() {
        for _ in 0..20 {
            let registry = Arc::new(RoomRegistry::new(6));
            let room_id = registry.create_room(&conn("a"), Profile::default()).await.unwrap();

            let mut handles = Vec::new();
            for name in ["b", "c"] {
                let registry = Arc::clone(&registry);
                let room_id = room_id.clone();
                handles.push(tokio::spawn(async move {
                    registry
                        .join_room(&conn(name), &room_id, Profile::default())
                        .await
                }));
            }

            let mut admitted = 0;
            let mut rejected = 0;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(_) => admitted += 1,
                    Err(RelayError::RoomFull { .. }) => rejected += 1,
                    Err(e) => panic!("unexpected error {}", e),
                }
            }

            assert_eq!(admitted, 1);
            assert_eq!(rejected, 1);
            assert_eq!(registry.room(&room_id).await.unwrap().participants.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_last_leave_deletes_room() {
        let registry = RoomRegistry::new(6);
        let room_id = registry.create_room(&conn("a"), Profile::default()).await.unwrap();

        let outcome = registry.leave(&conn("a")).await.unwrap();

        assert!(outcome.room_deleted());
        assert_eq!(outcome.room_id, room_id);
        assert!(registry.room(&room_id).await.is_none());
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_leave_keeps_survivor_as_creator() {
        let registry = RoomRegistry::new(6);
        let room_id = registry
            .create_room(&conn("a"), Profile::named("Alice"))
            .await
            .unwrap();
        registry
            .join_room(&conn("b"), &room_id, Profile::named("Bob"))
            .await
            .unwrap();

        let outcome = registry.leave(&conn("a")).await.unwrap();

        assert_eq!(outcome.departed.profile.display_name(), "Alice");
        let survivor = outcome.remaining.unwrap();
        assert_eq!(survivor.connection_id, conn("b"));
        assert_eq!(survivor.role, Role::Creator);

        let room = registry.room(&room_id).await.unwrap();
        assert_eq!(room.participants.len(), 1);
        assert_eq!(room.creator().unwrap().connection_id, conn("b"));
    }

    #[tokio::test]
    async fn test_leave_unknown_connection() {
        let registry = RoomRegistry::new(6);
        assert!(registry.leave(&conn("ghost")).await.is_none());
    }

    #[tokio::test]
    async fn test_room_reopens_after_leave() {
        let registry = RoomRegistry::new(6);
        let room_id = registry.create_room(&conn("a"), Profile::default()).await.unwrap();
        registry
            .join_room(&conn("b"), &room_id, Profile::default())
            .await
            .unwrap();
        registry.leave(&conn("b")).await.unwrap();

        let joined = registry
            .join_room(&conn("c"), &room_id, Profile::default())
            .await
            .unwrap();
        assert_eq!(joined.existing.len(), 1);
        assert_eq!(joined.existing[0].connection_id, conn("a"));
    }

    #[tokio::test]
    async fn test_membership_view() {
        let registry = RoomRegistry::new(6);
        let room_id = registry.create_room(&conn("a"), Profile::default()).await.unwrap();
        registry
            .join_room(&conn("b"), &room_id, Profile::default())
            .await
            .unwrap();

        let view = registry.membership(&conn("b")).await.unwrap();
        assert_eq!(view.room_id, room_id);
        assert_eq!(view.me.connection_id, conn("b"));
        assert_eq!(view.others.len(), 1);
        assert_eq!(view.others[0].connection_id, conn("a"));
    }
}
