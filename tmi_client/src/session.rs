use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc::unbounded_channel;
use tokio::task::JoinHandle;

use tmi_proto::{wire, MessageEvent, Ping, RawMessage, ServerMessage};

use crate::{
    ClientError, DispatchQueue, Options, Router, Sink, Transport, TransportError,
};

/// An outbound action pending in one of the session's dispatch queues.
/// Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAction {
    /// Send a chat message to a channel
    Chat { channel: String, text: String },
    /// Join a channel
    Join { channel: String },
}

impl OutboundAction {
    fn into_line(self) -> String {
        match self {
            Self::Chat { channel, text } => wire::privmsg(&channel, &text),
            Self::Join { channel } => wire::join(&channel),
        }
    }
}

/// Formats released actions into wire lines and writes them to the
/// transport.
struct TransportSink {
    transport: Arc<dyn Transport>,
}

#[async_trait]
impl Sink for TransportSink {
    type Item = OutboundAction;

    async fn deliver(&self, action: OutboundAction) -> Result<(), TransportError> {
        self.transport.send_text(&action.into_line()).await
    }

    fn on_error(&self, err: TransportError) {
        tracing::warn!("outbound delivery failed: {}", err);
    }

    async fn close(&self) -> Result<(), TransportError> {
        // The transport is shared between both queues and the session; it
        // is closed once, by `ChatSession::disconnect`.
        Ok(())
    }
}

struct Running {
    chat_queue: DispatchQueue<OutboundAction>,
    join_queue: DispatchQueue<OutboundAction>,
    reader: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
    keepalive: JoinHandle<()>,
}

enum SessionState {
    Disconnected,
    Connecting,
    Connected(Running),
}

/// A single chat session: one inbound pipeline (tokenise, classify, route)
/// and two independent outbound dispatch queues, one for chat messages and
/// one for channel joins, so the two kinds of traffic never block each
/// other.
pub struct ChatSession {
    options: Options,
    transport: Arc<dyn Transport>,
    router: Arc<RwLock<Router>>,
    joined: RwLock<HashSet<String>>,
    state: tokio::sync::Mutex<SessionState>,
}

impl ChatSession {
    /// Create a session over an already-connected transport. Fails fast with
    /// [`ClientError::MissingCredential`] when `nick` or `token` is empty.
    pub fn new(options: Options, transport: Arc<dyn Transport>) -> Result<Self, ClientError> {
        options.validate()?;
        Ok(Self {
            options,
            transport,
            router: Arc::new(RwLock::new(Router::new())),
            joined: RwLock::new(HashSet::new()),
            state: tokio::sync::Mutex::new(SessionState::Disconnected),
        })
    }

    /// Register a handler for one event kind. May be called at any time; a
    /// later registration for the same kind replaces the earlier one.
    pub fn register<E, F>(&self, handler: F)
    where
        E: MessageEvent + 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.router.write().register(handler);
    }

    /// Authenticate and start the inbound pipeline and both dispatch
    /// queues.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        if !matches!(*state, SessionState::Disconnected) {
            return Err(ClientError::AlreadyConnected);
        }
        *state = SessionState::Connecting;

        match self.start().await {
            Ok(running) => {
                *state = SessionState::Connected(running);
                tracing::info!("session connected as {}", self.options.nick);
                Ok(())
            }
            Err(e) => {
                *state = SessionState::Disconnected;
                Err(e)
            }
        }
    }

    async fn start(&self) -> Result<Running, ClientError> {
        // Registration goes out directly; throttling applies only to
        // user-generated traffic.
        self.transport.send_text(wire::CAP_REQ).await?;
        self.transport.send_text(&wire::pass(&self.options.token)).await?;
        self.transport.send_text(&wire::nick(&self.options.nick)).await?;

        // Keepalive replies are protocol-mandatory and time-sensitive: the
        // built-in PING handler pushes them onto a dedicated channel drained
        // straight to the transport, bypassing both rate-limited queues.
        let (pong_tx, mut pong_rx) = unbounded_channel::<String>();
        self.router.write().register(move |ping: &Ping| {
            for server in &ping.servers {
                if pong_tx.send(wire::pong(server)).is_err() {
                    tracing::warn!("keepalive writer gone; dropping PONG");
                }
            }
        });

        let transport = Arc::clone(&self.transport);
        let keepalive = tokio::spawn(async move {
            while let Some(line) = pong_rx.recv().await {
                if let Err(e) = transport.send_text(&line).await {
                    tracing::warn!("keepalive write failed: {}", e);
                }
            }
        });

        let (line_tx, mut line_rx) = unbounded_channel::<String>();
        let transport = Arc::clone(&self.transport);
        let reader = tokio::spawn(async move {
            loop {
                match transport.receive_text().await {
                    Ok(payload) => {
                        if line_tx.send(payload).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        // A dropped connection ends inbound processing
                        // without crashing anything.
                        tracing::debug!("inbound read ended: {}", e);
                        break;
                    }
                }
            }
        });

        let router = Arc::clone(&self.router);
        let dispatcher = tokio::spawn(async move {
            while let Some(payload) = line_rx.recv().await {
                for frame in payload.split("\r\n") {
                    if frame.is_empty() {
                        continue;
                    }
                    let msg = ServerMessage::from_raw(RawMessage::parse(frame));
                    router.read().dispatch(&msg);
                }
            }
        });

        let chat_queue = DispatchQueue::new(
            TransportSink {
                transport: Arc::clone(&self.transport),
            },
            self.options.chat_throttle(),
        );
        let join_queue = DispatchQueue::new(
            TransportSink {
                transport: Arc::clone(&self.transport),
            },
            self.options.join_throttle(),
        );

        Ok(Running {
            chat_queue,
            join_queue,
            reader,
            dispatcher,
            keepalive,
        })
    }

    /// Queue a chat message for `channel`, normal priority.
    pub async fn chat(&self, channel: &str, text: &str) -> Result<(), ClientError> {
        let state = self.state.lock().await;
        match &*state {
            SessionState::Connected(running) => running.chat_queue.enqueue(
                OutboundAction::Chat {
                    channel: channel.to_string(),
                    text: text.to_string(),
                },
                false,
            ),
            _ => Err(ClientError::NotConnected),
        }
    }

    /// Queue a join for `channel` and optimistically record it as joined.
    /// The remote ack, if any, arrives later as an inbound event.
    pub async fn join(&self, channel: &str) -> Result<(), ClientError> {
        let state = self.state.lock().await;
        match &*state {
            SessionState::Connected(running) => {
                running.join_queue.enqueue(
                    OutboundAction::Join {
                        channel: channel.to_string(),
                    },
                    false,
                )?;
                self.joined.write().insert(channel.to_string());
                Ok(())
            }
            _ => Err(ClientError::NotConnected),
        }
    }

    /// Leave `channel`. Leaving is not a flood risk by policy, so the PART
    /// line bypasses the rate limiter and goes straight to the transport.
    pub async fn part(&self, channel: &str) -> Result<(), ClientError> {
        let state = self.state.lock().await;
        if !matches!(&*state, SessionState::Connected(_)) {
            return Err(ClientError::NotConnected);
        }
        self.joined.write().remove(channel);
        self.transport.send_text(&wire::part(channel)).await?;
        Ok(())
    }

    /// The channels this session believes it has joined. A local cache for
    /// diagnostics; the remote service is the source of truth.
    pub fn joined_channels(&self) -> HashSet<String> {
        self.joined.read().clone()
    }

    pub async fn is_connected(&self) -> bool {
        matches!(&*self.state.lock().await, SessionState::Connected(_))
    }

    /// Stop accepting outbound traffic, drain both queue backlogs, then
    /// close the transport. Idempotent.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        let running = match std::mem::replace(&mut *state, SessionState::Disconnected) {
            SessionState::Connected(running) => running,
            _ => return Ok(()),
        };

        if let Err(e) = running.chat_queue.close().await {
            tracing::warn!("chat queue close failed: {}", e);
        }
        if let Err(e) = running.join_queue.close().await {
            tracing::warn!("join queue close failed: {}", e);
        }

        let result = self.transport.close().await;

        running.reader.abort();
        running.dispatcher.abort();
        running.keepalive.abort();

        self.joined.write().clear();
        tracing::info!("session disconnected");

        result.map_err(ClientError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

    struct MockTransport {
        sent: Mutex<Vec<String>>,
        inbound: tokio::sync::Mutex<UnboundedReceiver<String>>,
        closed: AtomicBool,
    }

    impl MockTransport {
        fn pair() -> (Arc<Self>, UnboundedSender<String>) {
            let (tx, rx) = unbounded_channel();
            let transport = Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                inbound: tokio::sync::Mutex::new(rx),
                closed: AtomicBool::new(false),
            });
            (transport, tx)
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send_text(&self, line: &str) -> Result<(), TransportError> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            self.sent.lock().push(line.to_string());
            Ok(())
        }

        async fn receive_text(&self) -> Result<String, TransportError> {
            self.inbound
                .lock()
                .await
                .recv()
                .await
                .ok_or(TransportError::Closed)
        }

        async fn close(&self) -> Result<(), TransportError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    #[test]
    fn construction_requires_credentials() {
        let (transport, _tx) = MockTransport::pair();
        let result = ChatSession::new(Options::new("", "token"), transport);
        assert!(matches!(result, Err(ClientError::MissingCredential("nick"))));
    }

    #[tokio::test(start_paused = true)]
    async fn connect_sends_registration_lines() {
        let (transport, _tx) = MockTransport::pair();
        let session =
            ChatSession::new(Options::new("ronni", "secret"), Arc::clone(&transport) as _)
                .unwrap();

        session.connect().await.unwrap();
        assert!(session.is_connected().await);

        let sent = transport.sent();
        assert_eq!(sent[0], wire::CAP_REQ);
        assert_eq!(sent[1], "PASS oauth:secret\r\n");
        assert_eq!(sent[2], "NICK ronni\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn connect_twice_rejected() {
        let (transport, _tx) = MockTransport::pair();
        let session =
            ChatSession::new(Options::new("ronni", "secret"), Arc::clone(&transport) as _)
                .unwrap();

        session.connect().await.unwrap();
        assert!(matches!(
            session.connect().await,
            Err(ClientError::AlreadyConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn operations_require_connection() {
        let (transport, _tx) = MockTransport::pair();
        let session =
            ChatSession::new(Options::new("ronni", "secret"), Arc::clone(&transport) as _)
                .unwrap();

        assert!(matches!(
            session.chat("dallas", "hi").await,
            Err(ClientError::NotConnected)
        ));
        assert!(matches!(
            session.join("dallas").await,
            Err(ClientError::NotConnected)
        ));
        assert!(matches!(
            session.part("dallas").await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn ping_is_answered_directly() {
        let (transport, tx) = MockTransport::pair();
        let session =
            ChatSession::new(Options::new("ronni", "secret"), Arc::clone(&transport) as _)
                .unwrap();
        session.connect().await.unwrap();

        tx.send("PING :tmi.twitch.tv\r\n".to_string()).unwrap();
        settle().await;

        assert!(transport.sent().contains(&"PONG :tmi.twitch.tv\r\n".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_frames_reach_registered_handlers() {
        let (transport, tx) = MockTransport::pair();
        let session =
            ChatSession::new(Options::new("ronni", "secret"), Arc::clone(&transport) as _)
                .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        session.register(move |msg: &tmi_proto::Privmsg| {
            sink.lock().push(msg.message.clone());
        });

        session.connect().await.unwrap();

        // Two frames in one payload, plus a blank line to discard
        tx.send(
            ":ronni!ronni@ronni.tmi.twitch.tv PRIVMSG #dallas :Kappa\r\n\r\n:ronni!ronni@ronni.tmi.twitch.tv PRIVMSG #dallas :Keepo\r\n"
                .to_string(),
        )
        .unwrap();
        settle().await;

        assert_eq!(seen.lock().as_slice(), ["Kappa", "Keepo"]);
    }

    #[tokio::test(start_paused = true)]
    async fn join_is_queued_and_optimistically_recorded() {
        let (transport, _tx) = MockTransport::pair();
        let session =
            ChatSession::new(Options::new("ronni", "secret"), Arc::clone(&transport) as _)
                .unwrap();
        session.connect().await.unwrap();

        session.join("dallas").await.unwrap();
        assert!(session.joined_channels().contains("dallas"));

        settle().await;
        assert!(transport.sent().contains(&"JOIN #dallas\r\n".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn part_bypasses_the_rate_limiter() {
        let (transport, _tx) = MockTransport::pair();
        let session =
            ChatSession::new(Options::new("ronni", "secret"), Arc::clone(&transport) as _)
                .unwrap();
        session.connect().await.unwrap();

        session.join("dallas").await.unwrap();
        session.part("dallas").await.unwrap();

        // PART is written synchronously, before the queued JOIN has dripped
        assert!(transport.sent().contains(&"PART #dallas\r\n".to_string()));
        assert!(!session.joined_channels().contains("dallas"));
    }

    #[tokio::test(start_paused = true)]
    async fn chat_is_throttled_by_the_bucket() {
        let (transport, _tx) = MockTransport::pair();
        let session =
            ChatSession::new(Options::new("ronni", "secret"), Arc::clone(&transport) as _)
                .unwrap();
        session.connect().await.unwrap();

        // Default limit: 20 per 30s, burst 1 => one token every 1.5s
        session.chat("dallas", "one").await.unwrap();
        session.chat("dallas", "two").await.unwrap();
        settle().await;

        let privmsgs = |sent: Vec<String>| {
            sent.into_iter()
                .filter(|l| l.starts_with("PRIVMSG"))
                .collect::<Vec<_>>()
        };
        assert_eq!(privmsgs(transport.sent()), ["PRIVMSG #dallas :one\r\n"]);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            privmsgs(transport.sent()),
            ["PRIVMSG #dallas :one\r\n", "PRIVMSG #dallas :two\r\n"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_drains_clears_and_closes() {
        let (transport, _tx) = MockTransport::pair();
        let session =
            ChatSession::new(Options::new("ronni", "secret"), Arc::clone(&transport) as _)
                .unwrap();
        session.connect().await.unwrap();

        session.join("dallas").await.unwrap();
        session.chat("dallas", "one").await.unwrap();
        session.chat("dallas", "two").await.unwrap();

        session.disconnect().await.unwrap();

        // Backlog was drained before the transport closed
        let sent = transport.sent();
        assert!(sent.contains(&"PRIVMSG #dallas :two\r\n".to_string()));
        assert!(sent.contains(&"JOIN #dallas\r\n".to_string()));
        assert!(transport.closed.load(Ordering::SeqCst));
        assert!(session.joined_channels().is_empty());
        assert!(!session.is_connected().await);

        // Idempotent
        session.disconnect().await.unwrap();
    }
}
