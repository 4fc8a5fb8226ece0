//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{spawn_session, SessionHandle, SessionInput, SessionOutput};
use crate::netcode::codec::{self, Frame};
use crate::netcode::{InputCommand, NetRole};
use crate::util::rate_limit::InputRateLimiter;
use crate::util::time::unix_millis;
use crate::vehicle::VehicleArchetype;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Outgoing frames queued for the socket writer
const OUTBOX_CAPACITY: usize = 256;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let connection_id = Uuid::new_v4();
    info!(connection_id = %connection_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, connection_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, connection_id: Uuid, state: AppState) {
    info!(connection_id = %connection_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();
    let (outbox, mut outbox_rx) = mpsc::channel::<Message>(OUTBOX_CAPACITY);

    // Spawn writer task: outbox -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbox_rx.recv().await {
            if let Err(e) = ws_sink.send(msg).await {
                debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let welcome = ServerMsg::Welcome {
        connection_id,
        server_time: unix_millis(),
        tick_rate: state.config.tick_rate,
    };
    if let Err(e) = send_msg(&outbox, &welcome).await {
        error!(connection_id = %connection_id, error = %e, "Failed to send welcome");
        writer_handle.abort();
        return;
    }

    let mut connection = Connection {
        id: connection_id,
        state,
        outbox,
        joined: None,
    };
    connection.run(ws_stream).await;
    connection.leave("disconnected").await;

    writer_handle.abort();
    info!(connection_id = %connection_id, "WebSocket connection closed");
}

/// The session a connection is attached to
struct Joined {
    handle: SessionHandle,
    role: NetRole,
    forwarder: JoinHandle<()>,
}

/// Per-connection state for the reader loop
struct Connection {
    id: Uuid,
    state: AppState,
    outbox: mpsc::Sender<Message>,
    joined: Option<Joined>,
}

impl Connection {
    /// Reader loop: WebSocket -> session
    async fn run(&mut self, mut ws_stream: futures::stream::SplitStream<WebSocket>) {
        let rate_limiter = InputRateLimiter::new(self.state.config.input_rate_limit);

        while let Some(result) = ws_stream.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    if !rate_limiter.check() {
                        warn!(connection_id = %self.id, "Rate limited text message");
                        continue;
                    }

                    match serde_json::from_str::<ClientMsg>(&text) {
                        Ok(client_msg) => {
                            if !self.handle_msg(client_msg).await {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(connection_id = %self.id, error = %e, "Failed to parse client message");
                            self.reply(&ServerMsg::error("bad_message", e.to_string())).await;
                        }
                    }
                }
                Ok(Message::Binary(data)) => {
                    if !rate_limiter.check() {
                        warn!(connection_id = %self.id, "Rate limited binary message");
                        continue;
                    }

                    match codec::decode(&data) {
                        Ok(Frame::Command(command)) => {
                            if !self.forward_command(command).await {
                                break;
                            }
                        }
                        Ok(Frame::Snapshot(_)) => {
                            warn!(connection_id = %self.id, "Client sent a snapshot, ignoring");
                        }
                        Err(e) => {
                            warn!(connection_id = %self.id, error = %e, "Failed to decode binary frame");
                        }
                    }
                }
                Ok(Message::Ping(_)) => {
                    debug!(connection_id = %self.id, "Received ping");
                }
                Ok(Message::Pong(_)) => {
                    debug!(connection_id = %self.id, "Received pong");
                }
                Ok(Message::Close(_)) => {
                    info!(connection_id = %self.id, "Client initiated close");
                    break;
                }
                Err(e) => {
                    error!(connection_id = %self.id, error = %e, "WebSocket error");
                    break;
                }
            }
        }
    }

    /// Returns false when the connection should close
    async fn handle_msg(&mut self, msg: ClientMsg) -> bool {
        if let Some(command) = msg.command() {
            return self.forward_command(command).await;
        }

        match msg {
            ClientMsg::Join { archetype, session_id } => {
                self.join(archetype, session_id).await;
                true
            }
            ClientMsg::Input { .. } => true,
            ClientMsg::Ping { t } => {
                self.reply(&ServerMsg::Pong {
                    t,
                    server_time: unix_millis(),
                })
                .await;
                true
            }
            ClientMsg::Leave => {
                self.leave("left").await;
                true
            }
        }
    }

    async fn join(&mut self, archetype: Option<VehicleArchetype>, session_id: Option<Uuid>) {
        if self.joined.is_some() {
            self.reply(&ServerMsg::error("already_joined", "Leave the current session first"))
                .await;
            return;
        }

        let (handle, role) = match session_id {
            Some(session_id) => {
                let Some(handle) = self.state.sessions.get(&session_id) else {
                    self.reply(&ServerMsg::error("unknown_session", format!("No session {session_id}")))
                        .await;
                    return;
                };
                if handle
                    .input_tx
                    .send(SessionInput::Observe { connection_id: self.id })
                    .await
                    .is_err()
                {
                    self.reply(&ServerMsg::error("unknown_session", "Session has ended")).await;
                    return;
                }
                (handle, NetRole::Observing)
            }
            None => {
                let archetype = archetype.unwrap_or(self.state.config.default_archetype);
                match spawn_session(self.state.sessions.clone(), &self.state.config, self.id, archetype) {
                    Ok(handle) => (handle, NetRole::Predicting),
                    Err(e) => {
                        error!(connection_id = %self.id, error = %e, "Vehicle preset failed validation");
                        self.reply(&ServerMsg::error("bad_vehicle", e.to_string())).await;
                        return;
                    }
                }
            }
        };

        // Subscribe before reading the latest state so no snapshot falls in between
        let forwarder = forward_session(&handle, self.id, self.outbox.clone());
        let latest = handle.latest();

        info!(
            connection_id = %self.id,
            session_id = %handle.id,
            role = %role,
            "Joined session"
        );
        self.reply(&ServerMsg::Joined {
            session_id: handle.id,
            role,
            archetype: handle.archetype,
            config: handle.config,
            tick: latest.tick,
            state: latest.state,
        })
        .await;

        self.joined = Some(Joined {
            handle,
            role,
            forwarder,
        });
    }

    /// Returns false when the session is gone and the connection should close
    async fn forward_command(&mut self, command: InputCommand) -> bool {
        let Some(joined) = &self.joined else {
            self.reply(&ServerMsg::error("not_joined", "Join a session before sending input"))
                .await;
            return true;
        };
        if joined.role != NetRole::Predicting {
            debug!(connection_id = %self.id, "Observer sent input, ignoring");
            return true;
        }

        let input = SessionInput::Command {
            connection_id: self.id,
            command,
        };
        if joined.handle.input_tx.send(input).await.is_err() {
            debug!(connection_id = %self.id, "Session input channel closed");
            return false;
        }
        true
    }

    async fn leave(&mut self, reason: &str) {
        let Some(joined) = self.joined.take() else {
            return;
        };
        joined.forwarder.abort();

        // Signal departure to the session loop
        let _ = joined
            .handle
            .input_tx
            .send(SessionInput::Leave { connection_id: self.id })
            .await;

        self.reply(&ServerMsg::Left {
            session_id: joined.handle.id,
            reason: reason.to_string(),
        })
        .await;
    }

    async fn reply(&self, msg: &ServerMsg) {
        if let Err(e) = send_msg(&self.outbox, msg).await {
            debug!(connection_id = %self.id, error = %e, "Failed to queue reply");
        }
    }
}

/// Spawn a task relaying session broadcasts to one connection
fn forward_session(handle: &SessionHandle, connection_id: Uuid, outbox: mpsc::Sender<Message>) -> JoinHandle<()> {
    let mut output_rx = handle.subscribe();
    let session_id = handle.id;

    tokio::spawn(async move {
        loop {
            match output_rx.recv().await {
                Ok(SessionOutput::Snapshot(snapshot)) => {
                    let frame = Message::Binary(codec::encode_snapshot(&snapshot).to_vec());
                    if outbox.send(frame).await.is_err() {
                        break;
                    }
                }
                Ok(SessionOutput::Closed { reason }) => {
                    let _ = send_msg(&outbox, &ServerMsg::Left { session_id, reason }).await;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        connection_id = %connection_id,
                        lagged_count = n,
                        "Client lagged, skipping {} snapshots", n
                    );
                    // Continue - the next snapshot supersedes the skipped ones
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(connection_id = %connection_id, "Session channel closed");
                    break;
                }
            }
        }
    })
}

/// Queue a JSON message for the socket writer
async fn send_msg(outbox: &mpsc::Sender<Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    outbox
        .send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
