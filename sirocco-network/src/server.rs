//! The message server protocol handler.
//!
//! Every inbound payload is `[sender identity, header, body]`, with header
//! and body compressed independently. The header names the envelope kind
//! under `MessageType`:
//!
//! - `String` bodies are forwarded to the server inbox as text.
//! - `Request` bodies are decoded; `Connect` and `Disconnect` are answered
//!   here, anything else is recorded for correlation and forwarded.
//! - `Command` bodies need a registered command serializer; they are
//!   recorded for correlation and forwarded.
//!
//! Anything else is answered with a `MessageRejected` response.

use async_trait::async_trait;
use parking_lot::RwLock;
use sirocco_core::codec::{
    CompressionCodec, Compressor, HeaderSerializer, JsonSerializer, MessageSerializer,
};
use sirocco_core::config::Validatable;
use sirocco_core::error::CodecError;
use sirocco_core::identifiers::{Address, ClientId, MessageId, ServerId, SessionId};
use sirocco_core::mailbox::{Endpoint, Inbox, Mailbox};
use sirocco_core::messages::{
    Command, HEADER_MESSAGE_TYPE, HEADER_TYPE, Header, MessageType, Request, Response,
    response_header,
};
use sirocco_scheduler::{Cancelable, HashedWheelScheduler, SchedulerError};
use sirocco_telemetry::masking::SensitiveDataMasker;
use sirocco_telemetry::{payload_span, session_span};
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{Instrument, Span, debug, error, info, warn};

use crate::config::ServerConfig;
use crate::correlation::CorrelationIndex;
use crate::error::MessageServerError;
use crate::peers::{Connection, PeerTable};
use crate::queue::{MessageQueue, PayloadHandler, QueueSender};
use crate::transport::{Multipart, RouterSocket, router_for};

/// Frames in every inbound payload: sender identity, header, body.
pub const EXPECTED_FRAMES: usize = 3;

/// Lifecycle of a [`MessageServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerState {
    /// Created, sockets not bound.
    Init = 0,
    /// Sockets bound, receive loop not yet running.
    Bound = 1,
    /// Handling payloads.
    Running = 2,
    /// Draining and unbinding.
    Stopping = 3,
    /// Stopped; a server cannot be restarted.
    Stopped = 4,
}

impl ServerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Init,
            1 => Self::Bound,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Serializers and compressor used on the wire.
#[derive(Clone)]
pub struct Codecs {
    /// Decodes request bodies.
    pub requests: Arc<dyn MessageSerializer<Request>>,
    /// Encodes response bodies.
    pub responses: Arc<dyn MessageSerializer<Response>>,
    /// Encodes and decodes headers.
    pub headers: Arc<dyn HeaderSerializer>,
    /// Applied to header and body frames independently.
    pub compressor: Arc<dyn Compressor>,
}

impl Codecs {
    /// JSON bodies and headers with the given compression.
    #[must_use]
    pub fn json(compression: CompressionCodec) -> Self {
        let json = Arc::new(JsonSerializer);
        Self {
            requests: json.clone(),
            responses: json.clone(),
            headers: json,
            compressor: compression.compressor(),
        }
    }
}

impl fmt::Debug for Codecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codecs")
            .field("compressor", &self.compressor.name())
            .finish_non_exhaustive()
    }
}

/// Message forwarded to the application through the server inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Text received with `MessageType: String`.
    Text(String),
    /// Any request other than `Connect`/`Disconnect`.
    Request(Request),
    /// A command decoded by the registered command serializer.
    Command(Command),
}

impl InboundMessage {
    /// Id a response should correlate to; text has none.
    #[must_use]
    pub fn id(&self) -> Option<MessageId> {
        match self {
            Self::Text(_) => None,
            Self::Request(request) => Some(request.id()),
            Self::Command(command) => Some(command.id()),
        }
    }

    /// Type name used in acknowledgements and logs.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Text(_) => MessageType::String.as_str(),
            Self::Request(request) => request.type_name(),
            Self::Command(command) => command.type_name(),
        }
    }
}

/// Network node terminating the request/response protocol.
///
/// Cloning yields another handle to the same server.
#[derive(Clone)]
pub struct MessageServer {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    config: ServerConfig,
    server_id: ServerId,
    codecs: Codecs,
    commands: RwLock<Option<Arc<dyn MessageSerializer<Command>>>>,
    queue: MessageQueue,
    sender: QueueSender,
    mailbox: Mailbox<InboundMessage>,
    correlation: CorrelationIndex,
    peers: PeerTable,
    masker: SensitiveDataMasker,
    state: AtomicU8,
    lifecycle: AsyncMutex<()>,
    received: AtomicU64,
    sent: AtomicU64,
}

impl MessageServer {
    /// Creates a server with sockets built from the configured endpoints.
    ///
    /// Returns the inbox through which decoded messages reach the application.
    pub fn new(
        config: ServerConfig,
        codecs: Codecs,
    ) -> Result<(Self, Inbox<InboundMessage>), MessageServerError> {
        config.validate()?;
        let inbound = router_for(&config.recv_endpoint, config.max_frame_bytes)?;
        let outbound = router_for(&config.send_endpoint, config.max_frame_bytes)?;
        Self::with_transport(config, codecs, inbound, outbound)
    }

    /// Creates a server over caller-provided sockets.
    pub fn with_transport(
        config: ServerConfig,
        codecs: Codecs,
        inbound: Arc<dyn RouterSocket>,
        outbound: Arc<dyn RouterSocket>,
    ) -> Result<(Self, Inbox<InboundMessage>), MessageServerError> {
        config.validate()?;
        let server_id = ServerId::new_unchecked(config.server_id.clone());
        let (mailbox, inbox) = Mailbox::channel(format!("{server_id}/inbox"));
        let queue = MessageQueue::new(inbound, outbound);
        let sender = queue.sender();

        let inner = ServerInner {
            config,
            server_id,
            codecs,
            commands: RwLock::new(None),
            queue,
            sender,
            mailbox,
            correlation: CorrelationIndex::new(),
            peers: PeerTable::new(),
            masker: SensitiveDataMasker::new(),
            state: AtomicU8::new(ServerState::Init as u8),
            lifecycle: AsyncMutex::new(()),
            received: AtomicU64::new(0),
            sent: AtomicU64::new(0),
        };
        Ok((
            Self {
                inner: Arc::new(inner),
            },
            inbox,
        ))
    }

    /// Binds both sockets and starts handling payloads.
    ///
    /// On a bind failure the server stays in `Init` and the error is returned.
    pub async fn start(&self) -> Result<(), MessageServerError> {
        let inner = &self.inner;
        let _lifecycle = inner.lifecycle.lock().await;
        let state = inner.state();
        if state != ServerState::Init {
            return Err(MessageServerError::InvalidState {
                operation: "start",
                state,
            });
        }

        if let Err(e) = inner.queue.bind().await {
            error!(server_id = %inner.server_id, error = %e, "Failed to bind sockets");
            return Err(e.into());
        }
        inner.set_state(ServerState::Bound);
        info!(
            server_id = %inner.server_id,
            recv = %inner.queue.inbound_endpoint(),
            send = %inner.queue.outbound_endpoint(),
            compression = inner.codecs.compressor.name(),
            "Sockets bound"
        );

        inner.queue.start(Arc::new(Dispatcher(Arc::downgrade(inner))));
        inner.set_state(ServerState::Running);
        Ok(())
    }

    /// Drains the receive loop (bounded by `drain_timeout`) and unbinds both sockets.
    ///
    /// Peers still connected and unbind failures are logged, not returned.
    pub async fn stop(&self) -> Result<(), MessageServerError> {
        let inner = &self.inner;
        let _lifecycle = inner.lifecycle.lock().await;
        let state = inner.state();
        if !matches!(state, ServerState::Bound | ServerState::Running) {
            return Err(MessageServerError::InvalidState {
                operation: "stop",
                state,
            });
        }
        inner.set_state(ServerState::Stopping);

        let drained = inner.queue.stop(inner.config.drain_timeout).await;
        if !inner.peers.is_empty() {
            warn!(
                server_id = %inner.server_id,
                peers = inner.peers.len(),
                clients = ?inner.peers.client_ids(),
                "Stopping with peers still connected"
            );
        }
        if let Err(e) = inner.queue.unbind().await {
            error!(server_id = %inner.server_id, error = %e, "Failed to unbind sockets");
        }

        inner.set_state(ServerState::Stopped);
        info!(
            server_id = %inner.server_id,
            received = inner.received_count(),
            sent = inner.sent_count(),
            drained,
            "Stopped"
        );
        Ok(())
    }

    /// Enables `MessageType: Command` payloads.
    pub fn register_command_serializer(&self, serializer: Arc<dyn MessageSerializer<Command>>) {
        *self.inner.commands.write() = Some(serializer);
        debug!(server_id = %self.inner.server_id, "Command serializer registered");
    }

    /// Sends a response to whoever sent the message it correlates to.
    ///
    /// The correlation entry is consumed; a second response for the same
    /// request fails with [`MessageServerError::UndeliverableResponse`].
    pub async fn send_message(&self, response: &Response) -> Result<(), MessageServerError> {
        self.inner.send_correlated(response).await
    }

    /// Sends a response to an explicit receiver.
    pub async fn send_message_to(
        &self,
        response: &Response,
        receiver: &Address,
    ) -> Result<(), MessageServerError> {
        self.inner.send_to(response, receiver).await
    }

    /// Rejects the message identified by `correlation_id`.
    pub async fn send_rejected(
        &self,
        message: impl Into<String>,
        correlation_id: MessageId,
    ) -> Result<(), MessageServerError> {
        self.inner
            .send_correlated(&Response::rejected(correlation_id, message))
            .await
    }

    /// Acknowledges receipt of a forwarded message.
    pub async fn send_received(&self, message: &InboundMessage) -> Result<(), MessageServerError> {
        let Some(id) = message.id() else {
            warn!("Cannot acknowledge text message, it has no id");
            return Err(MessageServerError::UndeliverableResponse {
                correlation_id: MessageId::nil(),
            });
        };
        self.inner
            .send_correlated(&Response::received(id, message.type_name()))
            .await
    }

    /// Reports that the query identified by `correlation_id` failed.
    pub async fn send_query_failure(
        &self,
        message: impl Into<String>,
        correlation_id: MessageId,
    ) -> Result<(), MessageServerError> {
        self.inner
            .send_correlated(&Response::query_failure(correlation_id, message))
            .await
    }

    /// Sends UTF-8 text with `MessageType: String`.
    pub async fn send_string(
        &self,
        message: &str,
        receiver: &Address,
    ) -> Result<(), MessageServerError> {
        let mut header = Header::new();
        header.insert(
            HEADER_MESSAGE_TYPE.to_string(),
            MessageType::String.as_str().to_string(),
        );
        header.insert(HEADER_TYPE.to_string(), MessageType::String.as_str().to_string());
        self.inner
            .send_frames(&header, message.as_bytes(), receiver)
            .await
    }

    /// Removes correlation entries older than the configured TTL.
    ///
    /// Returns the number removed; always 0 when no TTL is configured.
    pub fn purge_stale_correlations(&self) -> usize {
        self.inner.purge_stale_correlations()
    }

    /// Purges stale correlation entries every `correlation_ttl` on the given
    /// scheduler. Returns `None` when no TTL is configured.
    pub fn schedule_correlation_sweep(
        &self,
        scheduler: &HashedWheelScheduler,
    ) -> Result<Option<Cancelable>, SchedulerError> {
        let Some(ttl) = self.inner.config.correlation_ttl else {
            return Ok(None);
        };
        let weak: Weak<ServerInner> = Arc::downgrade(&self.inner);
        let handle = scheduler.schedule_repeatedly_cancelable(ttl, ttl, move || {
            if let Some(inner) = weak.upgrade() {
                inner.purge_stale_correlations();
            }
        })?;
        Ok(Some(handle))
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServerState {
        self.inner.state()
    }

    /// Server identity.
    #[must_use]
    pub fn server_id(&self) -> &ServerId {
        &self.inner.server_id
    }

    /// Endpoint of the inbound socket, with the bound port once bound.
    #[must_use]
    pub fn recv_endpoint(&self) -> String {
        self.inner.queue.inbound_endpoint()
    }

    /// Endpoint of the outbound socket, with the bound port once bound.
    #[must_use]
    pub fn send_endpoint(&self) -> String {
        self.inner.queue.outbound_endpoint()
    }

    /// Payloads received with a valid frame layout.
    #[must_use]
    pub fn received_count(&self) -> u64 {
        self.inner.received_count()
    }

    /// Messages handed to the outbound socket.
    #[must_use]
    pub fn sent_count(&self) -> u64 {
        self.inner.sent_count()
    }

    /// Connected peers.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.inner.peers.len()
    }

    /// Session of a connected client.
    #[must_use]
    pub fn session_of(&self, client_id: &ClientId) -> Option<SessionId> {
        self.inner.peers.session(client_id).map(|s| s.session_id)
    }

    /// Requests and commands still awaiting a response.
    #[must_use]
    pub fn pending_correlations(&self) -> usize {
        self.inner.correlation.len()
    }
}

impl fmt::Debug for MessageServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageServer")
            .field("server_id", &self.inner.server_id)
            .field("state", &self.inner.state())
            .field("queue", &self.inner.queue)
            .finish_non_exhaustive()
    }
}

/// Feeds payloads to the server for as long as a handle to it exists.
struct Dispatcher(Weak<ServerInner>);

#[async_trait]
impl PayloadHandler for Dispatcher {
    async fn handle_payload(&self, frames: Multipart) {
        if let Some(inner) = self.0.upgrade() {
            let span = payload_span(inner.server_id.as_str(), frames.len());
            inner.dispatch(frames).instrument(span).await;
        }
    }
}

impl ServerInner {
    fn state(&self) -> ServerState {
        ServerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ServerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn received_count(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    fn recv_endpoint(&self) -> String {
        self.queue.inbound_endpoint()
    }

    fn command_serializer(&self) -> Option<Arc<dyn MessageSerializer<Command>>> {
        self.commands.read().clone()
    }

    async fn dispatch(&self, frames: Multipart) {
        let [sender, header, body]: [Vec<u8>; EXPECTED_FRAMES] = match frames.try_into() {
            Ok(frames) => frames,
            Err(frames) => {
                self.reject_malformed(&frames).await;
                return;
            }
        };

        let sender = Address::from_frame(&sender);
        if sender.is_none() {
            error!("Message was malformed (empty sender identity), no reply target");
            return;
        }
        Span::current().record("sender", tracing::field::display(&sender));
        self.received.fetch_add(1, Ordering::Relaxed);

        if let Some(frame) = [("header", &header), ("body", &body)]
            .into_iter()
            .find_map(|(name, frame)| frame.is_empty().then_some(name))
        {
            self.reject_empty(frame, &sender).await;
            return;
        }

        let header = match self.decode_header(&header) {
            Ok(header) => header,
            Err(e) => {
                self.reject_codec(&e, &sender).await;
                return;
            }
        };
        let Some(message_type) = header.get(HEADER_MESSAGE_TYPE) else {
            let e = CodecError::MissingHeader {
                key: HEADER_MESSAGE_TYPE.to_string(),
            };
            self.reject_codec(&e, &sender).await;
            return;
        };
        Span::current().record("message_type", message_type.as_str());

        let decoded = match message_type.parse::<MessageType>() {
            Ok(MessageType::String) => self.decode_text(&body).map(InboundMessage::Text),
            Ok(MessageType::Request) => self
                .decode_body(&*self.codecs.requests, &body)
                .map(InboundMessage::Request),
            Ok(MessageType::Command) => match self.command_serializer() {
                Some(serializer) => self
                    .decode_body(&*serializer, &body)
                    .map(InboundMessage::Command),
                None => {
                    self.reject_type(message_type, &sender).await;
                    return;
                }
            },
            Ok(MessageType::Response) | Err(_) => {
                self.reject_type(message_type, &sender).await;
                return;
            }
        };

        match decoded {
            Ok(InboundMessage::Request(Request::Connect {
                id,
                client_id,
                authentication,
                ..
            })) => self.handle_connect(id, client_id, &authentication, sender).await,
            Ok(InboundMessage::Request(Request::Disconnect { id, client_id, .. })) => {
                self.handle_disconnect(id, client_id, sender).await;
            }
            Ok(message) => self.forward(message, sender),
            Err(e) => self.reject_codec(&e, &sender).await,
        }
    }

    fn decode_header(&self, bytes: &[u8]) -> Result<Header, CodecError> {
        let bytes = self.codecs.compressor.decompress(bytes, self.config.max_frame_bytes)?;
        self.codecs.headers.deserialize(&bytes)
    }

    fn decode_body<T>(
        &self,
        serializer: &dyn MessageSerializer<T>,
        bytes: &[u8],
    ) -> Result<T, CodecError> {
        let bytes = self.codecs.compressor.decompress(bytes, self.config.max_frame_bytes)?;
        serializer.deserialize(&bytes)
    }

    fn decode_text(&self, bytes: &[u8]) -> Result<String, CodecError> {
        let bytes = self.codecs.compressor.decompress(bytes, self.config.max_frame_bytes)?;
        String::from_utf8(bytes).map_err(CodecError::deserialization)
    }

    fn forward(&self, message: InboundMessage, sender: Address) {
        let id = message.id();
        if let Some(id) = id
            && let Some(previous) = self.correlation.insert(id, sender.clone())
        {
            warn!(%id, %previous, "Duplicate message id, replacing reply address");
        }
        debug!(message_type = message.type_name(), "Forwarding to inbox");

        if let Err(e) = self.mailbox.tell(message, Some(sender)) {
            error!(error = %e, "Dropping inbound message");
            if let Some(id) = id {
                self.correlation.pop(&id);
            }
        }
    }

    async fn handle_connect(
        &self,
        correlation_id: MessageId,
        client_id: ClientId,
        authentication: &str,
        sender: Address,
    ) {
        let span = session_span(client_id.as_str(), "connect");
        let response = span.in_scope(|| {
            let connection = self.peers.connect(client_id.clone(), sender.clone(), || {
                SessionId::derive(&client_id, authentication)
            });
            let session_id = connection.session_id().clone();
            Span::current().record("session_id", session_id.as_str());

            let message = match connection {
                Connection::New(_) => {
                    info!(
                        authentication = %self.masker.mask_value(authentication),
                        "Client connected"
                    );
                    format!(
                        "{client_id} connected to session {session_id} at {}",
                        self.recv_endpoint()
                    )
                }
                Connection::Existing(_) => {
                    warn!("Client already connected, keeping its session");
                    format!(
                        "{client_id} already connected to session {session_id} at {}",
                        self.recv_endpoint()
                    )
                }
            };
            Response::connected(correlation_id, message, self.server_id.clone(), session_id)
        });
        self.reply(&response, &sender).instrument(span).await;
    }

    async fn handle_disconnect(
        &self,
        correlation_id: MessageId,
        client_id: ClientId,
        sender: Address,
    ) {
        let span = session_span(client_id.as_str(), "disconnect");
        let response = span.in_scope(|| match self.peers.disconnect(&client_id) {
            Some(session) => {
                Span::current().record("session_id", session.session_id.as_str());
                info!("Client disconnected");
                let message = format!(
                    "{client_id} disconnected from session {} at {}",
                    session.session_id,
                    self.recv_endpoint()
                );
                Response::disconnected(
                    correlation_id,
                    message,
                    self.server_id.clone(),
                    session.session_id,
                )
            }
            None => {
                warn!("Disconnect from a client with no session");
                let message = format!(
                    "No session to disconnect for {client_id} at {}",
                    self.recv_endpoint()
                );
                Response::disconnected(
                    correlation_id,
                    message,
                    self.server_id.clone(),
                    SessionId::none(),
                )
            }
        });
        self.reply(&response, &sender).instrument(span).await;
    }

    async fn reject_malformed(&self, frames: &[Vec<u8>]) {
        let message = format!(
            "Message was malformed (expected {EXPECTED_FRAMES} frames, received {}) at {}",
            frames.len(),
            self.recv_endpoint()
        );
        match frames.first().map(|frame| Address::from_frame(frame)) {
            Some(sender) if !sender.is_none() => {
                warn!(%sender, "{message}");
                self.reply(&Response::rejected(MessageId::nil(), message), &sender)
                    .await;
            }
            _ => error!("{message}, no reply target"),
        }
    }

    async fn reject_empty(&self, frame: &str, sender: &Address) {
        let message = format!(
            "Message was malformed (empty {frame} frame) at {}",
            self.recv_endpoint()
        );
        warn!("{message}");
        self.reply(&Response::rejected(MessageId::nil(), message), sender)
            .await;
    }

    async fn reject_type(&self, message_type: &str, sender: &Address) {
        let message = format!("Message type {message_type} not valid at {}", self.recv_endpoint());
        warn!("{message}");
        self.reply(&Response::rejected(MessageId::nil(), message), sender)
            .await;
    }

    async fn reject_codec(&self, e: &CodecError, sender: &Address) {
        warn!(error = %e, "Could not decode payload");
        let message = format!("{}: {}", e.kind(), e.reason());
        self.reply(&Response::rejected(MessageId::nil(), message), sender)
            .await;
    }

    async fn reply(&self, response: &Response, receiver: &Address) {
        if let Err(e) = self.send_to(response, receiver).await {
            error!(
                error = %e,
                %receiver,
                response = response.type_name(),
                "Failed to send response"
            );
        }
    }

    async fn send_correlated(&self, response: &Response) -> Result<(), MessageServerError> {
        let correlation_id = response.correlation_id();
        let Some(receiver) = self.correlation.pop(&correlation_id) else {
            error!(
                %correlation_id,
                response = response.type_name(),
                "Cannot send response, no pending request with this correlation id"
            );
            return Err(MessageServerError::UndeliverableResponse { correlation_id });
        };
        self.send_to(response, &receiver).await
    }

    async fn send_to(
        &self,
        response: &Response,
        receiver: &Address,
    ) -> Result<(), MessageServerError> {
        let body = self.codecs.responses.serialize(response)?;
        self.send_frames(&response_header(response.type_name()), &body, receiver)
            .await
    }

    async fn send_frames(
        &self,
        header: &Header,
        body: &[u8],
        receiver: &Address,
    ) -> Result<(), MessageServerError> {
        let compressor = &self.codecs.compressor;
        let header = compressor.compress(&self.codecs.headers.serialize(header)?)?;
        let body = compressor.compress(body)?;
        self.sender.send(receiver, vec![header, body]).await?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        debug!(%receiver, "Sent message");
        Ok(())
    }

    fn purge_stale_correlations(&self) -> usize {
        let Some(ttl) = self.config.correlation_ttl else {
            return 0;
        };
        let purged = self.correlation.purge_older_than(ttl);
        for id in &purged {
            warn!(correlation_id = %id, ?ttl, "Purged unanswered correlation entry");
        }
        purged.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryDealer, MemoryRouter};
    use std::time::Duration;

    struct Harness {
        server: MessageServer,
        inbox: Inbox<InboundMessage>,
        inbound: Arc<MemoryRouter>,
        outbound: Arc<MemoryRouter>,
        codecs: Codecs,
    }

    fn config() -> ServerConfig {
        ServerConfig {
            server_id: "S".to_string(),
            recv_endpoint: "mem://requests".to_string(),
            send_endpoint: "mem://responses".to_string(),
            drain_timeout: Duration::from_millis(200),
            ..ServerConfig::default()
        }
    }

    async fn harness(config: ServerConfig) -> Harness {
        let codecs = Codecs::json(config.compression);
        let inbound = Arc::new(MemoryRouter::new(config.recv_endpoint.clone()));
        let outbound = Arc::new(MemoryRouter::new(config.send_endpoint.clone()));
        let (server, inbox) =
            MessageServer::with_transport(config, codecs.clone(), inbound.clone(), outbound.clone())
                .unwrap();
        server.start().await.unwrap();
        Harness {
            server,
            inbox,
            inbound,
            outbound,
            codecs,
        }
    }

    impl Harness {
        fn client(&self, identity: &str) -> (MemoryDealer, MemoryDealer) {
            (self.inbound.connect(identity), self.outbound.connect(identity))
        }

        fn encode(&self, message_type: &str, body: &[u8]) -> Multipart {
            let mut header = Header::new();
            header.insert(HEADER_MESSAGE_TYPE.to_string(), message_type.to_string());
            let header = self.codecs.headers.serialize(&header).unwrap();
            vec![
                self.codecs.compressor.compress(&header).unwrap(),
                self.codecs.compressor.compress(body).unwrap(),
            ]
        }

        fn encode_request(&self, request: &Request) -> Multipart {
            self.encode("Request", &self.codecs.requests.serialize(request).unwrap())
        }

        fn decode(&self, frames: &Multipart) -> (Header, Response) {
            let header = self
                .codecs
                .headers
                .deserialize(&self.codecs.compressor.decompress(&frames[0], usize::MAX).unwrap())
                .unwrap();
            let body = self.codecs.compressor.decompress(&frames[1], usize::MAX).unwrap();
            let response: Response = serde_json::from_slice(&body).unwrap();
            (header, response)
        }
    }

    async fn next(dealer: &mut MemoryDealer) -> Multipart {
        tokio::time::timeout(Duration::from_secs(1), dealer.recv())
            .await
            .expect("timed out waiting for a reply")
            .expect("route closed")
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let h = harness(config()).await;
        assert_eq!(h.server.state(), ServerState::Running);
        assert!(matches!(
            h.server.start().await,
            Err(MessageServerError::InvalidState { operation: "start", .. })
        ));

        h.server.stop().await.unwrap();
        assert_eq!(h.server.state(), ServerState::Stopped);
        assert!(h.server.stop().await.is_err());
    }

    #[tokio::test]
    async fn test_connect_replies_with_derived_session() {
        let h = harness(config()).await;
        let (requests, mut responses) = h.client("C1-addr");
        let client = ClientId::new_unchecked("C1");
        let connect = Request::connect(client.clone(), "tok");

        requests.send(h.encode_request(&connect)).unwrap();
        let (header, response) = h.decode(&next(&mut responses).await);

        assert_eq!(header.get(HEADER_MESSAGE_TYPE).map(String::as_str), Some("Response"));
        assert_eq!(header.get(HEADER_TYPE).map(String::as_str), Some("Connected"));
        let Response::Connected {
            correlation_id,
            server_id,
            session_id,
            ..
        } = response
        else {
            panic!("expected Connected");
        };
        assert_eq!(correlation_id, connect.id());
        assert_eq!(server_id.as_str(), "S");
        assert_eq!(session_id, SessionId::derive(&client, "tok"));
        assert_eq!(h.server.session_of(&client), Some(session_id));
        assert_eq!(h.server.received_count(), 1);
        assert_eq!(h.server.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_text_is_forwarded() {
        let mut h = harness(config()).await;
        let (requests, _responses) = h.client("C1");
        requests.send(h.encode("String", b"hello")).unwrap();

        let envelope = tokio::time::timeout(Duration::from_secs(1), h.inbox.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(envelope.message, InboundMessage::Text("hello".to_string()));
        assert_eq!(envelope.sender, Some(Address::from("C1")));
        assert_eq!(h.server.pending_correlations(), 0);
    }

    #[tokio::test]
    async fn test_unknown_type_is_rejected() {
        let h = harness(config()).await;
        let (requests, mut responses) = h.client("C1");
        requests.send(h.encode("Bogus", b"{}")).unwrap();

        let (_, response) = h.decode(&next(&mut responses).await);
        let Response::MessageRejected { message, .. } = response else {
            panic!("expected MessageRejected");
        };
        assert!(message.contains("Bogus"));
        assert!(message.contains("mem://requests"));
    }

    #[tokio::test]
    async fn test_command_requires_registered_serializer() {
        let mut h = harness(config()).await;
        let (requests, mut responses) = h.client("C1");
        let command = Command::new("Flatten").with_argument("symbol", "AUDUSD");
        let body = serde_json::to_vec(&command).unwrap();

        requests.send(h.encode("Command", &body)).unwrap();
        let (_, response) = h.decode(&next(&mut responses).await);
        assert!(matches!(response, Response::MessageRejected { .. }));

        h.server.register_command_serializer(Arc::new(JsonSerializer));
        requests.send(h.encode("Command", &body)).unwrap();
        let envelope = tokio::time::timeout(Duration::from_secs(1), h.inbox.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(envelope.message, InboundMessage::Command(command.clone()));
        assert_eq!(h.server.pending_correlations(), 1);

        h.server.send_received(&envelope.message).await.unwrap();
        let (_, response) = h.decode(&next(&mut responses).await);
        let Response::MessageReceived {
            correlation_id,
            received_type,
            ..
        } = response
        else {
            panic!("expected MessageReceived");
        };
        assert_eq!(correlation_id, command.id());
        assert_eq!(received_type, "Flatten");
    }

    #[tokio::test]
    async fn test_bad_body_is_rejected_and_counted() {
        let h = harness(config()).await;
        let (requests, mut responses) = h.client("C1");
        requests.send(h.encode("Request", b"not json")).unwrap();

        let (_, response) = h.decode(&next(&mut responses).await);
        let Response::MessageRejected { message, .. } = response else {
            panic!("expected MessageRejected");
        };
        assert!(message.starts_with("DeserializationError"));
        assert_eq!(h.server.received_count(), 1);
    }

    #[tokio::test]
    async fn test_inflated_body_over_limit_is_rejected() {
        let mut h = harness(ServerConfig {
            max_frame_bytes: 64 * 1024,
            ..config()
        })
        .await;
        let (requests, mut responses) = h.client("C1");
        let body = vec![b'a'; 1 << 20];
        let frames = h.encode("String", &body);
        assert!(frames[1].len() < 64 * 1024);

        requests.send(frames).unwrap();
        let (_, response) = h.decode(&next(&mut responses).await);
        let Response::MessageRejected { message, .. } = response else {
            panic!("expected MessageRejected");
        };
        assert!(message.starts_with("DecompressionError"));
        assert!(h.inbox.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_empty_body_is_rejected_for_every_codec() {
        for compression in [CompressionCodec::None, CompressionCodec::Gzip] {
            let mut h = harness(ServerConfig {
                compression,
                ..config()
            })
            .await;
            let (requests, mut responses) = h.client("C1");
            let mut frames = h.encode("String", b"");
            frames[1].clear();

            requests.send(frames).unwrap();
            let (_, response) = h.decode(&next(&mut responses).await);
            let Response::MessageRejected { message, .. } = response else {
                panic!("expected MessageRejected with {compression:?}");
            };
            assert!(message.contains("empty body frame"), "{message}");
            assert!(h.inbox.try_recv().is_none());
            h.server.stop().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_missing_message_type_is_rejected() {
        let h = harness(config()).await;
        let (requests, mut responses) = h.client("C1");
        let header = h.codecs.headers.serialize(&Header::new()).unwrap();
        requests
            .send(vec![
                h.codecs.compressor.compress(&header).unwrap(),
                h.codecs.compressor.compress(b"{}").unwrap(),
            ])
            .unwrap();

        let (_, response) = h.decode(&next(&mut responses).await);
        let Response::MessageRejected { message, .. } = response else {
            panic!("expected MessageRejected");
        };
        assert!(message.starts_with("MissingHeaderError"));
    }

    #[tokio::test]
    async fn test_query_failure_and_rejection_use_correlation() {
        let mut h = harness(config()).await;
        let (requests, mut responses) = h.client("C1");
        let first = Request::data("Bars", Default::default());
        let second = Request::data("Ticks", Default::default());
        requests.send(h.encode_request(&first)).unwrap();
        requests.send(h.encode_request(&second)).unwrap();
        h.inbox.recv().await.unwrap();
        h.inbox.recv().await.unwrap();
        assert_eq!(h.server.pending_correlations(), 2);

        h.server.send_query_failure("no data", first.id()).await.unwrap();
        h.server.send_rejected("not permitted", second.id()).await.unwrap();

        let (_, response) = h.decode(&next(&mut responses).await);
        assert!(matches!(
            response,
            Response::QueryFailure { ref message, .. } if message == "no data"
        ));
        let (_, response) = h.decode(&next(&mut responses).await);
        assert!(matches!(
            response,
            Response::MessageRejected { ref message, .. } if message == "not permitted"
        ));
        assert_eq!(h.server.pending_correlations(), 0);
    }

    #[tokio::test]
    async fn test_send_string() {
        let h = harness(config()).await;
        let (_requests, mut responses) = h.client("C1");
        h.server.send_string("ping", &Address::from("C1")).await.unwrap();

        let frames = next(&mut responses).await;
        let header = h
            .codecs
            .headers
            .deserialize(&h.codecs.compressor.decompress(&frames[0], usize::MAX).unwrap())
            .unwrap();
        assert_eq!(header.get(HEADER_MESSAGE_TYPE).map(String::as_str), Some("String"));
        assert_eq!(h.codecs.compressor.decompress(&frames[1], usize::MAX).unwrap(), b"ping");
    }

    #[tokio::test]
    async fn test_purge_stale_correlations() {
        let mut h = harness(ServerConfig {
            correlation_ttl: Some(Duration::from_millis(20)),
            ..config()
        })
        .await;
        let (requests, _responses) = h.client("C1");
        let request = Request::data("Bars", Default::default());
        requests.send(h.encode_request(&request)).unwrap();
        h.inbox.recv().await.unwrap();

        assert_eq!(h.server.purge_stale_correlations(), 0);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(h.server.purge_stale_correlations(), 1);
        assert!(matches!(
            h.server.send_rejected("late", request.id()).await,
            Err(MessageServerError::UndeliverableResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_purge_disabled_without_ttl() {
        let mut h = harness(config()).await;
        let (requests, _responses) = h.client("C1");
        requests
            .send(h.encode_request(&Request::data("Bars", Default::default())))
            .unwrap();
        h.inbox.recv().await.unwrap();
        assert_eq!(h.server.purge_stale_correlations(), 0);
        assert_eq!(h.server.pending_correlations(), 1);

        let scheduler = HashedWheelScheduler::new();
        assert!(h.server.schedule_correlation_sweep(&scheduler).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_on_scheduler() {
        let mut h = harness(ServerConfig {
            correlation_ttl: Some(Duration::from_millis(30)),
            ..config()
        })
        .await;
        let (requests, _responses) = h.client("C1");
        requests
            .send(h.encode_request(&Request::data("Bars", Default::default())))
            .unwrap();
        h.inbox.recv().await.unwrap();

        let scheduler = HashedWheelScheduler::new();
        let sweep = h.server.schedule_correlation_sweep(&scheduler).unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(h.server.pending_correlations(), 0);
        sweep.cancel();
        scheduler.shutdown().unwrap();
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let result = MessageServer::new(
            ServerConfig {
                server_id: String::new(),
                ..config()
            },
            Codecs::json(CompressionCodec::None),
        );
        assert!(matches!(result, Err(MessageServerError::Config(_))));
    }
}
