use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use parlor_db::MessageStore;
use parlor_types::events::{ClientCommand, FrameRejection, MessageCreateData, ServerEvent};
use parlor_types::limits::ContentLimits;
use parlor_types::models::{MessageContent, RoomId, UserId};

use crate::hub::{BroadcastHub, EventSender, SessionId};

/// Default heartbeat interval: the server sends a Ping this often.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Consecutive heartbeats without a Pong before the connection is dropped.
const MISSED_PONG_LIMIT: u8 = 2;

/// Everything a session needs besides its transport.
#[derive(Clone)]
pub struct GatewayContext {
    pub hub: BroadcastHub,
    pub store: Arc<dyn MessageStore>,
    pub content_limits: ContentLimits,
    pub heartbeat_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Registered,
    Closing,
    Closed,
}

struct Session {
    id: SessionId,
    user_id: UserId,
    room_id: RoomId,
    state: SessionState,
}

impl Session {
    fn transition(&mut self, next: SessionState) {
        debug!(
            "session {} (user {}, room {}): {:?} -> {:?}",
            self.id, self.user_id, self.room_id, self.state, next
        );
        self.state = next;
    }
}

/// Handle an upgraded, already-authenticated WebSocket bound to one room.
pub async fn handle_connection(
    socket: WebSocket,
    ctx: GatewayContext,
    user_id: UserId,
    room_id: RoomId,
) {
    let (sender, receiver) = socket.split();
    run_session(sender, receiver, ctx, user_id, room_id).await;
}

/// Drive one session over any frame sink/stream pair until the connection
/// closes, fails, or misses its heartbeats.
///
/// The hub registration is a drop guard and both loops live in a `JoinSet`,
/// so deregistration also happens when a loop panics or this future is
/// dropped.
pub async fn run_session<Tx, Rx, E>(
    sink: Tx,
    stream: Rx,
    ctx: GatewayContext,
    user_id: UserId,
    room_id: RoomId,
) where
    Tx: Sink<Message> + Unpin + Send + 'static,
    Rx: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    let mut session = Session {
        id: Uuid::new_v4(),
        user_id,
        room_id,
        state: SessionState::Connecting,
    };

    let (tx, rx) = mpsc::unbounded_channel();

    // Queued before joining so it precedes anything the hub delivers.
    let _ = tx.send(Arc::new(ServerEvent::ready()));
    let subscription = ctx.hub.subscribe(room_id, session.id, tx.clone());
    session.transition(SessionState::Registered);
    info!(
        "user {} connected to room {} (session {})",
        user_id, room_id, session.id
    );

    let pong_received = Arc::new(AtomicBool::new(true));
    let commands = CommandHandler {
        session_id: session.id,
        user_id,
        room_id,
        reply: tx,
        hub: ctx.hub.clone(),
        store: ctx.store.clone(),
        limits: ctx.content_limits,
    };

    let mut tasks = JoinSet::new();
    tasks.spawn(write_loop(sink, rx, pong_received.clone(), ctx.heartbeat_interval));
    tasks.spawn(read_loop(stream, commands, pong_received));

    // Whichever loop finishes first ends the session.
    if let Some(Err(e)) = tasks.join_next().await {
        if e.is_panic() {
            warn!("session {} task panicked: {}", session.id, e);
        }
    }
    session.transition(SessionState::Closing);

    drop(subscription);
    tasks.shutdown().await;
    session.transition(SessionState::Closed);
    info!(
        "user {} disconnected from room {} (session {})",
        user_id, room_id, session.id
    );
}

/// Forward queued events to the client and keep the heartbeat.
///
/// Each write is bounded by the same window as the pong check, so a peer that
/// stops reading is dropped like one that stops answering pings.
async fn write_loop<Tx>(
    mut sink: Tx,
    mut events: mpsc::UnboundedReceiver<Arc<ServerEvent>>,
    pong_received: Arc<AtomicBool>,
    heartbeat_interval: Duration,
) where
    Tx: Sink<Message> + Unpin,
{
    let mut heartbeat = tokio::time::interval(heartbeat_interval);
    heartbeat.tick().await;
    let mut missed_heartbeats: u8 = 0;
    let write_deadline = heartbeat_interval * u32::from(MISSED_PONG_LIMIT);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(event.as_ref()) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to encode {:?} event: {}", event.kind, e);
                        continue;
                    }
                };
                if !send_frame(&mut sink, Message::Text(text.into()), write_deadline).await {
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if pong_received.swap(false, Ordering::Acquire) {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= MISSED_PONG_LIMIT {
                        warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                        break;
                    }
                }
                if !send_frame(&mut sink, Message::Ping(vec![].into()), write_deadline).await {
                    break;
                }
            }
        }
    }
}

/// False when the transport failed or did not take the frame within `deadline`.
async fn send_frame<Tx>(sink: &mut Tx, frame: Message, deadline: Duration) -> bool
where
    Tx: Sink<Message> + Unpin,
{
    match tokio::time::timeout(deadline, sink.send(frame)).await {
        Ok(Ok(())) => true,
        Ok(Err(_)) => false,
        Err(_) => {
            warn!("Write stalled for {:?}, dropping connection", deadline);
            false
        }
    }
}

/// Read client frames until the transport closes or errors.
async fn read_loop<Rx, E>(mut stream: Rx, commands: CommandHandler, pong_received: Arc<AtomicBool>)
where
    Rx: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                debug!("session {} read error: {}", commands.session_id, e);
                break;
            }
        };

        match frame {
            Message::Text(text) => commands.handle_frame(text.as_str().as_bytes()).await,
            Message::Binary(data) => commands.handle_frame(&data).await,
            Message::Pong(_) => pong_received.store(true, Ordering::Release),
            Message::Close(_) => break,
            Message::Ping(_) => {}
        }
    }
}

struct CommandHandler {
    session_id: SessionId,
    user_id: UserId,
    room_id: RoomId,
    reply: EventSender,
    hub: BroadcastHub,
    store: Arc<dyn MessageStore>,
    limits: ContentLimits,
}

impl CommandHandler {
    /// A bad frame is dropped on its own; it never ends the session.
    async fn handle_frame(&self, frame: &[u8]) {
        match ClientCommand::decode(frame) {
            Ok(ClientCommand::MessageCreate(data)) => self.create_message(data).await,
            Err(FrameRejection::UnknownType(kind)) => {
                debug!("session {} ignoring command type '{}'", self.session_id, kind);
            }
            Err(rejection) => {
                debug!(
                    "session {} dropping frame ({:?}): {}",
                    self.session_id,
                    rejection,
                    String::from_utf8_lossy(&frame[..frame.len().min(200)])
                );
            }
        }
    }

    async fn create_message(&self, data: MessageCreateData) {
        let content = match MessageContent::parse(&data.content, &self.limits) {
            Ok(content) => content,
            Err(_) => {
                self.send(ServerEvent::ack_error(self.limits.bounds_message()));
                return;
            }
        };

        match self.store.create(self.room_id, self.user_id, &content).await {
            Ok(message) => {
                let delivered = self.hub.broadcast(&message);
                debug!(
                    "message {} in room {} delivered to {} sessions",
                    message.id, self.room_id, delivered
                );
            }
            Err(e) => {
                error!(
                    "insert failed room_id={} user_id={}: {}",
                    self.room_id, self.user_id, e
                );
                self.send(ServerEvent::ack_error("insert error"));
            }
        }
    }

    fn send(&self, event: ServerEvent) {
        let _ = self.reply.send(Arc::new(event));
    }
}
