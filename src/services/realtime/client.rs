use crate::config::RealtimeConfig;
use crate::domain::session::TokenPair;
use crate::error::{ClientError, Result};
use crate::services::realtime::RealtimeAuth;
use crate::services::realtime::frame::{Frame, HEARTBEAT_TOPIC, topic_name};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tracing::Instrument;

const OUTBOUND_BUFFER: usize = 64;

/// A live update delivered on a joined topic.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeEvent {
    pub topic: String,
    pub event: String,
    pub payload: serde_json::Value,
}

type Topics = Arc<DashMap<String, broadcast::Sender<RealtimeEvent>>>;

/// Client for the backend-as-a-service realtime socket.
///
/// A background task owns the WebSocket; this handle only queues frames for it.
/// The socket closes once every clone of the handle is dropped.
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    outbound: mpsc::Sender<Frame>,
    topics: Topics,
    access_token: Arc<RwLock<Option<String>>>,
    next_ref: Arc<AtomicU64>,
    channel_capacity: usize,
}

impl RealtimeClient {
    /// Opens the socket and starts the connection task.
    ///
    /// # Errors
    /// Returns `ClientError::Realtime` if no URL is configured or the handshake fails.
    #[tracing::instrument(skip(config, access_token), err(level = "warn"))]
    pub async fn connect(config: &RealtimeConfig, access_token: Option<String>) -> Result<Self> {
        let url = config.url.as_deref().ok_or_else(|| ClientError::Realtime("realtime URL not configured".into()))?;
        let url = match &config.api_key {
            Some(key) => {
                let separator = if url.contains('?') { '&' } else { '?' };
                format!("{url}{separator}apikey={key}&vsn=1.0.0")
            }
            None => url.to_string(),
        };

        let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ClientError::Realtime(e.to_string()))?;
        tracing::info!("Realtime socket connected");

        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let topics: Topics = Arc::new(DashMap::new());
        let next_ref = Arc::new(AtomicU64::new(1));

        let task_topics = Arc::clone(&topics);
        let task_refs = Arc::clone(&next_ref);
        let heartbeat = Duration::from_secs(config.heartbeat_interval_secs.max(1));
        tokio::spawn(
            async move {
                Self::run(socket, outbound_rx, task_topics, task_refs, heartbeat).await;
            }
            .instrument(tracing::info_span!("realtime_connection")),
        );

        Ok(Self {
            outbound,
            topics,
            access_token: Arc::new(RwLock::new(access_token)),
            next_ref,
            channel_capacity: config.channel_capacity.max(1),
        })
    }

    /// Joins `channel` (idempotent) and returns a receiver for its events.
    ///
    /// # Errors
    /// Returns `ClientError::Realtime` if the connection task has stopped.
    pub async fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<RealtimeEvent>> {
        let topic = topic_name(channel);
        let rx = match self.topics.entry(topic.clone()) {
            Entry::Occupied(entry) => return Ok(entry.get().subscribe()),
            Entry::Vacant(entry) => {
                let (tx, rx) = broadcast::channel(self.channel_capacity);
                entry.insert(tx);
                rx
            }
        };

        let token = self.current_token();
        self.enqueue(Frame::join(&topic, token.as_deref(), self.reference())).await?;
        tracing::debug!(topic = %topic, "Joined realtime topic");
        Ok(rx)
    }

    /// Leaves `channel`; existing receivers observe the channel closing.
    ///
    /// # Errors
    /// Returns `ClientError::Realtime` if the connection task has stopped.
    pub async fn unsubscribe(&self, channel: &str) -> Result<()> {
        let topic = topic_name(channel);
        if self.topics.remove(&topic).is_some() {
            self.enqueue(Frame::leave(&topic, self.reference())).await?;
        }
        Ok(())
    }

    #[must_use]
    pub fn joined_topics(&self) -> Vec<String> {
        self.topics.iter().map(|entry| entry.key().clone()).collect()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.outbound.is_closed()
    }

    fn current_token(&self) -> Option<String> {
        self.access_token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn reference(&self) -> String {
        self.next_ref.fetch_add(1, Ordering::Relaxed).to_string()
    }

    async fn enqueue(&self, frame: Frame) -> Result<()> {
        self.outbound.send(frame).await.map_err(|_| ClientError::Realtime("realtime connection closed".into()))
    }

    async fn run(
        socket: tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
        mut outbound_rx: mpsc::Receiver<Frame>,
        topics: Topics,
        next_ref: Arc<AtomicU64>,
        heartbeat: Duration,
    ) {
        let (mut ws_sink, mut ws_stream) = socket.split();
        let mut heartbeat_timer = tokio::time::interval_at(tokio::time::Instant::now() + heartbeat, heartbeat);

        loop {
            tokio::select! {
                frame = outbound_rx.recv() => {
                    let Some(frame) = frame else { break };
                    match serde_json::to_string(&frame) {
                        Ok(text) => {
                            if ws_sink.send(Message::text(text)).await.is_err() { break; }
                        }
                        Err(e) => tracing::warn!(error = %e, "Failed to encode realtime frame"),
                    }
                }

                msg = ws_stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => Self::dispatch(&topics, text.as_str()),
                        Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }

                _ = heartbeat_timer.tick() => {
                    let reference = next_ref.fetch_add(1, Ordering::Relaxed).to_string();
                    let Ok(text) = serde_json::to_string(&Frame::heartbeat(reference)) else { continue };
                    if ws_sink.send(Message::text(text)).await.is_err() { break; }
                }
            }
        }

        let _ = ws_sink.close().await;
        // Dropping the senders closes every subscriber's receiver.
        topics.clear();
        tracing::info!("Realtime socket disconnected");
    }

    fn dispatch(topics: &Topics, text: &str) {
        let frame = match serde_json::from_str::<Frame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to decode realtime frame");
                return;
            }
        };

        if frame.topic == HEARTBEAT_TOPIC {
            return;
        }

        match topics.get(&frame.topic) {
            Some(tx) => {
                let _ = tx.send(RealtimeEvent { topic: frame.topic.clone(), event: frame.event, payload: frame.payload });
            }
            None => tracing::debug!(topic = %frame.topic, "Realtime frame for unknown topic"),
        }
    }
}

#[async_trait]
impl RealtimeAuth for RealtimeClient {
    async fn set_session(&self, tokens: &TokenPair) -> Result<()> {
        *self.access_token.write().unwrap_or_else(PoisonError::into_inner) = Some(tokens.access_token.clone());

        for topic in self.joined_topics() {
            self.enqueue(Frame::access_token(&topic, &tokens.access_token, self.reference())).await?;
        }
        tracing::debug!("Realtime channels re-authenticated");
        Ok(())
    }

    async fn clear_session(&self) -> Result<()> {
        *self.access_token.write().unwrap_or_else(PoisonError::into_inner) = None;

        let topics = self.joined_topics();
        self.topics.clear();
        for topic in topics {
            self.enqueue(Frame::leave(&topic, self.reference())).await?;
        }
        Ok(())
    }
}
