//! Integration tests for CipherRoom
//!
//! Every test runs a real relay on a loopback port and drives clients over
//! TCP. The relay only ever forwards what the clients hand it; all decryption
//! happens in the receiving `ChatClient`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use cipherroom::chat::{ChatClient, ChatError, HandshakeState, Notice};
use cipherroom::protocol::{ClientEvent, ConnectionId, Profile, RoomId, ServerEvent};
use cipherroom::relay::{RelayConfig, RelayServer};
use cipherroom::transport::{self, FrameSink, FrameSource, TcpFrameReader, TcpFrameWriter, DEFAULT_MAX_FRAME_BYTES};

/// One connected participant.
struct Peer {
    client: ChatClient,
    reader: TcpFrameReader,
    writer: TcpFrameWriter,
}

impl Peer {
    async fn connect(addr: SocketAddr, name: &str) -> Self {
        let (reader, writer) = transport::connect(addr, DEFAULT_MAX_FRAME_BYTES).await.unwrap();
        let mut peer = Self {
            client: ChatClient::new(Profile::named(name)).unwrap(),
            reader,
            writer,
        };
        let notices = peer.pump().await;
        assert!(matches!(notices.as_slice(), [Notice::Connected(_)]));
        peer
    }

    fn id(&self) -> ConnectionId {
        self.client.connection_id().cloned().unwrap()
    }

    async fn send(&mut self, event: ClientEvent) {
        self.writer.send(&event).await.unwrap();
    }

    async fn next_event(&mut self) -> ServerEvent {
        let next: Option<ServerEvent> = tokio::time::timeout(Duration::from_secs(5), self.reader.receive())
            .await
            .expect("timed out waiting for relay")
            .unwrap();
        next.expect("relay closed the connection")
    }

    /// Reads one event, lets the client react, sends its replies.
    async fn pump(&mut self) -> Vec<Notice> {
        let event = self.next_event().await;
        let reaction = self.client.handle(event).unwrap();
        for outgoing in &reaction.outgoing {
            self.writer.send(outgoing).await.unwrap();
        }
        reaction.notices
    }

    async fn close(mut self) {
        FrameSink::<ClientEvent>::close(&mut self.writer).await.unwrap();
    }
}

async fn start_relay() -> (Arc<RelayServer>, SocketAddr) {
    let config = RelayConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        ..Default::default()
    };
    let server = Arc::new(RelayServer::new(config));
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(Arc::clone(&server).run(listener));
    (server, addr)
}

/// Alice creates a room, Bob joins, both finish the key exchange.
async fn secure_pair(addr: SocketAddr) -> (Peer, Peer, RoomId) {
    let mut alice = Peer::connect(addr, "Alice").await;
    let create = alice.client.create_room().unwrap();
    alice.send(create).await;

    let room_id = match alice.pump().await.as_slice() {
        [Notice::RoomCreated(room_id)] => room_id.clone(),
        other => panic!("unexpected {:?}", other),
    };
    assert!(matches!(alice.pump().await.as_slice(), [Notice::RoomJoined { .. }]));
    assert_eq!(alice.client.session().state(), HandshakeState::RoomEstablished);

    let mut bob = Peer::connect(addr, "Bob").await;
    let join = bob.client.join_room(room_id.clone()).unwrap();
    bob.send(join).await;

    match bob.pump().await.as_slice() {
        [Notice::RoomJoined { room_id: joined, host, .. }] => {
            assert_eq!(joined, &room_id);
            assert_eq!(host, "Alice");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        alice.pump().await,
        vec![Notice::PeerJoined {
            name: "Bob".to_string()
        }]
    );

    assert_eq!(alice.pump().await, vec![Notice::SecureChannelReady]);
    assert_eq!(bob.pump().await, vec![Notice::SecureChannelReady]);

    (alice, bob, room_id)
}

async fn wait_for_rooms(server: &RelayServer, expected: usize) {
    for _ in 0..100 {
        if server.registry().room_count().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("room count never reached {}", expected);
}

#[tokio::test]
async fn test_full_session_over_tcp() {
    let (server, addr) = start_relay().await;
    let (mut alice, mut bob, room_id) = secure_pair(addr).await;

    // Encrypted message, attributed to Alice's relay-assigned id.
    let hello = alice.client.compose("hello").unwrap();
    alice.send(hello).await;
    match bob.pump().await.as_slice() {
        [Notice::Message {
            text,
            sender_id,
            sender,
            timestamp,
        }] => {
            assert_eq!(text, "hello");
            assert_eq!(sender_id, &alice.id());
            assert_eq!(sender, "Alice");
            assert!(!timestamp.is_empty());
        }
        other => panic!("unexpected {:?}", other),
    }

    // Typing indicators reach the other side only.
    let typing = bob.client.typing(true).unwrap();
    bob.send(typing).await;
    assert_eq!(
        alice.pump().await,
        vec![Notice::PeerTyping {
            name: "Bob".to_string(),
            is_typing: true
        }]
    );

    let typing = bob.client.typing(false).unwrap();
    bob.send(typing).await;
    assert_eq!(
        alice.pump().await,
        vec![Notice::PeerTyping {
            name: "Bob".to_string(),
            is_typing: false
        }]
    );

    // Alice disconnects; Bob's next event is her departure, not a typing echo.
    alice.close().await;
    match bob.pump().await.as_slice() {
        [Notice::PeerLeft { name, timestamp }] => {
            assert_eq!(name, "Alice");
            assert!(!timestamp.is_empty());
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(bob.client.session().state(), HandshakeState::RoomEstablished);
    assert!(matches!(bob.client.compose("anyone?"), Err(ChatError::ChannelNotReady)));

    let room = server.registry().room(&room_id).await.unwrap();
    assert_eq!(room.participants.len(), 1);

    bob.close().await;
    wait_for_rooms(&server, 0).await;
}

#[tokio::test]
async fn test_third_participant_rejected() {
    let (_server, addr) = start_relay().await;
    let (_alice, _bob, room_id) = secure_pair(addr).await;

    let mut carol = Peer::connect(addr, "Carol").await;
    let join = carol.client.join_room(room_id).unwrap();
    carol.send(join).await;

    assert_eq!(
        carol.pump().await,
        vec![Notice::Rejected("Room is full".to_string())]
    );
    assert_eq!(carol.client.session().state(), HandshakeState::Idle);
}

#[tokio::test]
async fn test_join_unknown_room() {
    let (server, addr) = start_relay().await;

    let mut bob = Peer::connect(addr, "Bob").await;
    let join = bob.client.join_room(RoomId::from("nosuch")).unwrap();
    bob.send(join).await;

    assert_eq!(
        bob.pump().await,
        vec![Notice::Rejected("Room doesn't exist".to_string())]
    );
    assert_eq!(server.registry().room_count().await, 0);
}

#[tokio::test]
async fn test_rejoin_after_counterpart_left() {
    let (_server, addr) = start_relay().await;
    let (alice, mut bob, room_id) = secure_pair(addr).await;

    alice.close().await;
    assert!(matches!(bob.pump().await.as_slice(), [Notice::PeerLeft { .. }]));

    // Bob now holds the room as its creator; a newcomer completes a fresh exchange.
    let mut carol = Peer::connect(addr, "Carol").await;
    let join = carol.client.join_room(room_id).unwrap();
    carol.send(join).await;

    match carol.pump().await.as_slice() {
        [Notice::RoomJoined { host, .. }] => assert_eq!(host, "Bob"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(bob.pump().await.as_slice(), [Notice::PeerJoined { .. }]));
    assert_eq!(bob.pump().await, vec![Notice::SecureChannelReady]);
    assert_eq!(carol.pump().await, vec![Notice::SecureChannelReady]);

    let hi = carol.client.compose("hi bob").unwrap();
    carol.send(hi).await;
    assert!(matches!(
        bob.pump().await.as_slice(),
        [Notice::Message { text, .. }] if text == "hi bob"
    ));
}

#[tokio::test]
async fn test_explicit_leave_frees_room() {
    let (server, addr) = start_relay().await;
    let (mut alice, mut bob, _room_id) = secure_pair(addr).await;

    let leave = alice.client.leave().unwrap();
    alice.send(leave).await;
    assert!(matches!(bob.pump().await.as_slice(), [Notice::PeerLeft { .. }]));
    assert_eq!(alice.client.session().state(), HandshakeState::Idle);

    // Alice can start over on the same connection.
    let create = alice.client.create_room().unwrap();
    alice.send(create).await;
    assert!(matches!(alice.pump().await.as_slice(), [Notice::RoomCreated(_)]));
    wait_for_rooms(&server, 2).await;
}
