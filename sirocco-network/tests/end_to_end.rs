//! Protocol scenarios over the in-process transport.

mod common;

use common::{ClientCodec, codecs, memory_config};
use sirocco_core::codec::CompressionCodec;
use sirocco_core::identifiers::{Address, ClientId, MessageId, SessionId};
use sirocco_core::mailbox::Inbox;
use sirocco_core::messages::{HEADER_TYPE, Request, Response};
use sirocco_network::transport::{MemoryDealer, MemoryRouter, Multipart};
use sirocco_network::{InboundMessage, MessageServer, MessageServerError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

struct Node {
    server: MessageServer,
    inbox: Inbox<InboundMessage>,
    requests: Arc<MemoryRouter>,
    responses: Arc<MemoryRouter>,
}

async fn start(server_id: &str) -> Node {
    let config = memory_config(server_id);
    let requests = Arc::new(MemoryRouter::new(config.recv_endpoint.clone()));
    let responses = Arc::new(MemoryRouter::new(config.send_endpoint.clone()));
    let (server, inbox) =
        MessageServer::with_transport(config, codecs(), requests.clone(), responses.clone())
            .unwrap();
    server.start().await.unwrap();
    Node {
        server,
        inbox,
        requests,
        responses,
    }
}

struct Client {
    outbound: MemoryDealer,
    inbound: MemoryDealer,
    codec: ClientCodec,
}

impl Client {
    fn connect(node: &Node, identity: &str) -> Self {
        Self {
            outbound: node.requests.connect(identity),
            inbound: node.responses.connect(identity),
            codec: ClientCodec::new(CompressionCodec::Gzip),
        }
    }

    fn send(&self, request: &Request) {
        self.outbound.send(self.codec.request(request)).unwrap();
    }

    async fn recv_frames(&mut self) -> Multipart {
        tokio::time::timeout(Duration::from_secs(1), self.inbound.recv())
            .await
            .expect("timed out waiting for the server")
            .expect("route closed")
    }

    async fn recv(&mut self) -> Response {
        let frames = self.recv_frames().await;
        self.codec.response(&frames).1
    }

    async fn assert_silent(&mut self) {
        let waited = tokio::time::timeout(Duration::from_millis(100), self.inbound.recv()).await;
        assert!(waited.is_err(), "unexpected frame from the server");
    }
}

#[tokio::test]
async fn test_connect_then_request_round_trip() {
    let mut node = start("S").await;
    let mut client = Client::connect(&node, "client-addr-1");
    let client_id = ClientId::new_unchecked("C1");

    client.send(&Request::connect(client_id.clone(), "tok"));
    let Response::Connected {
        server_id,
        session_id,
        message,
        ..
    } = client.recv().await
    else {
        panic!("expected Connected");
    };
    assert_eq!(server_id.as_str(), "S");
    assert_eq!(session_id, SessionId::derive(&client_id, "tok"));
    assert!(message.contains("C1"));

    let query = BTreeMap::from([("symbol".to_string(), "AUDUSD".to_string())]);
    let request = Request::data("Bars", query);
    client.send(&request);
    let envelope = tokio::time::timeout(Duration::from_secs(1), node.inbox.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(envelope.message, InboundMessage::Request(request.clone()));
    assert_eq!(envelope.sender, Some(Address::from("client-addr-1")));
    assert_eq!(node.server.pending_correlations(), 1);

    let reply = Response::data(request.id(), "Bars", b"payload".to_vec());
    node.server.send_message(&reply).await.unwrap();

    let frames = client.recv_frames().await;
    let (header, response) = client.codec.response(&frames);
    assert_eq!(header.get(HEADER_TYPE).map(String::as_str), Some("DataResponse"));
    assert_eq!(response, reply);
    assert_eq!(node.server.pending_correlations(), 0);
    assert_eq!(node.server.received_count(), 2);
    assert_eq!(node.server.sent_count(), 2);
}

#[tokio::test]
async fn test_connect_twice_keeps_one_session() {
    let node = start("S").await;
    let mut client = Client::connect(&node, "C1");
    let client_id = ClientId::new_unchecked("C1");

    client.send(&Request::connect(client_id.clone(), "tok"));
    client.send(&Request::connect(client_id.clone(), "other-token"));

    let Response::Connected { session_id: first, .. } = client.recv().await else {
        panic!("expected Connected");
    };
    let Response::Connected {
        session_id: second,
        message,
        ..
    } = client.recv().await
    else {
        panic!("expected Connected");
    };
    assert_eq!(first, second);
    assert!(message.contains("already connected"));
    assert_eq!(node.server.peer_count(), 1);
}

#[tokio::test]
async fn test_disconnect_unknown_peer_returns_none_session() {
    let node = start("S").await;
    let mut client = Client::connect(&node, "C9");

    client.send(&Request::disconnect(
        ClientId::new_unchecked("C9"),
        SessionId::new("C9-whatever").unwrap(),
    ));
    let Response::Disconnected { session_id, message, .. } = client.recv().await else {
        panic!("expected Disconnected");
    };
    assert!(session_id.is_none());
    assert!(message.contains("No session"));
    assert_eq!(node.server.peer_count(), 0);
}

#[tokio::test]
async fn test_disconnect_returns_session() {
    let node = start("S").await;
    let mut client = Client::connect(&node, "C1");
    let client_id = ClientId::new_unchecked("C1");

    client.send(&Request::connect(client_id.clone(), "tok"));
    let Response::Connected { session_id, .. } = client.recv().await else {
        panic!("expected Connected");
    };
    client.send(&Request::disconnect(client_id, session_id.clone()));
    let Response::Disconnected {
        session_id: closed, ..
    } = client.recv().await
    else {
        panic!("expected Disconnected");
    };
    assert_eq!(closed, session_id);
    assert_eq!(node.server.peer_count(), 0);
}

#[tokio::test]
async fn test_two_frames_are_rejected() {
    let node = start("S").await;
    let mut client = Client::connect(&node, "C1");

    client.outbound.send(vec![b"header-only".to_vec()]).unwrap();
    let Response::MessageRejected { message, .. } = client.recv().await else {
        panic!("expected MessageRejected");
    };
    assert!(message.contains("expected 3 frames"));
    assert!(message.contains("received 2"));
    assert_eq!(node.server.received_count(), 0);
}

#[tokio::test]
async fn test_unregistered_correlation_is_dropped() {
    let node = start("S").await;
    let mut client = Client::connect(&node, "C1");

    let stray = Response::data(MessageId::generate(), "Bars", Vec::new());
    let result = node.server.send_message(&stray).await;
    assert!(matches!(
        result,
        Err(MessageServerError::UndeliverableResponse { correlation_id })
            if correlation_id == stray.correlation_id()
    ));
    assert_eq!(node.server.sent_count(), 0);
    client.assert_silent().await;
}

#[tokio::test]
async fn test_responses_route_to_their_own_sender() {
    let mut node = start("S").await;
    let mut alice = Client::connect(&node, "alice");
    let mut bob = Client::connect(&node, "bob");

    let from_alice = Request::data("Bars", BTreeMap::new());
    let from_bob = Request::data("Ticks", BTreeMap::new());
    alice.send(&from_alice);
    bob.send(&from_bob);
    node.inbox.recv().await.unwrap();
    node.inbox.recv().await.unwrap();

    node.server
        .send_query_failure("no ticks", from_bob.id())
        .await
        .unwrap();
    node.server
        .send_rejected("bars unavailable", from_alice.id())
        .await
        .unwrap();

    assert!(matches!(bob.recv().await, Response::QueryFailure { .. }));
    assert!(matches!(alice.recv().await, Response::MessageRejected { .. }));
}

#[tokio::test]
async fn test_stop_with_connected_peer() {
    let node = start("S").await;
    let mut client = Client::connect(&node, "C1");
    client.send(&Request::connect(ClientId::new_unchecked("C1"), "tok"));
    client.recv().await;

    node.server.stop().await.unwrap();
    assert_eq!(node.server.peer_count(), 1);
    assert!(node.server.send_string("bye", &Address::from("C1")).await.is_err());
}
