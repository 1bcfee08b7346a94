use std::collections::HashSet;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::extractor::authenticate;
use crate::collab::events::{ActiveUser, ClientEvent, ServerEvent};
use crate::collab::hub::{ConnId, Member};
use crate::errors::AppError;
use crate::models::resume;
use crate::models::user::User;
use crate::resumes::access::can_view;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// GET /api/collab/ws?token=<jwt>
/// Authenticates before upgrading; a bad token never gets a socket.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let token = query
        .token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Unauthorized("No token, authorization denied".into()))?;
    let user = authenticate(&state, token).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

/// Per-connection bookkeeping for the read loop.
struct Connection {
    id: ConnId,
    user: ActiveUser,
    tx: mpsc::UnboundedSender<ServerEvent>,
    joined: HashSet<Uuid>,
}

impl Connection {
    fn send(&self, event: ServerEvent) {
        // A closed channel means the writer task is gone; the read loop ends next.
        let _ = self.tx.send(event);
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, user: User) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode collaboration event: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut conn = Connection {
        id: Uuid::new_v4(),
        user: ActiveUser {
            user_id: user.id,
            username: user.display_name(),
        },
        tx,
        joined: HashSet::new(),
    };
    info!(user_id = %user.id, conn_id = %conn.id, "Collaboration socket connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => handle_frame(&state, &mut conn, &text).await,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    state.hub.leave_all(conn.id, &conn.joined).await;
    send_task.abort();
    info!(user_id = %user.id, conn_id = %conn.id, "Collaboration socket closed");
}

async fn handle_frame(state: &AppState, conn: &mut Connection, text: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            debug!("Malformed collaboration frame: {e}");
            conn.send(ServerEvent::error("Malformed event"));
            return;
        }
    };

    match event {
        ClientEvent::JoinResume { resume_id } => join(state, conn, resume_id).await,
        ClientEvent::LeaveResume { resume_id } => {
            if conn.joined.remove(&resume_id) {
                state.hub.leave(resume_id, conn.id).await;
            }
        }
        relayable => {
            let Some((resume_id, out)) = relayable.into_relay(&conn.user, Utc::now()) else {
                return;
            };
            if let Err(e) = state.hub.relay(resume_id, conn.id, out).await {
                conn.send(ServerEvent::error(e.to_string()));
            }
        }
    }
}

async fn join(state: &AppState, conn: &mut Connection, resume_id: Uuid) {
    let resume = match resume::find_by_id(&state.db, resume_id).await {
        Ok(Some(resume)) => resume,
        Ok(None) => {
            conn.send(ServerEvent::error("Resume not found"));
            return;
        }
        Err(e) => {
            warn!(%resume_id, "Failed to load resume for join: {e}");
            conn.send(ServerEvent::error("Could not join resume"));
            return;
        }
    };
    if !can_view(&resume, conn.user.user_id) {
        conn.send(ServerEvent::error("Not authorized to access this resume"));
        return;
    }

    let member = Member {
        user: conn.user.clone(),
        tx: conn.tx.clone(),
    };
    let active_users = state.hub.join(resume_id, conn.id, member).await;
    conn.joined.insert(resume_id);
    conn.send(ServerEvent::Joined {
        resume_id,
        active_users,
    });
}
