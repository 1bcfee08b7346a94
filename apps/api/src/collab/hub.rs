use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::collab::events::{ActiveUser, PresenceFrame, ServerEvent};

/// One socket connection. A user with two tabs open has two.
pub type ConnId = Uuid;

#[derive(Debug, Error, PartialEq)]
pub enum HubError {
    #[error("Join the resume before sending events to it")]
    NotJoined,
}

#[derive(Clone)]
pub struct Member {
    pub user: ActiveUser,
    pub tx: mpsc::UnboundedSender<ServerEvent>,
}

#[derive(Default)]
struct Room {
    members: HashMap<ConnId, Member>,
}

impl Room {
    /// Distinct users in the room, sorted by name.
    fn active_users(&self) -> Vec<ActiveUser> {
        let mut seen = HashSet::new();
        let mut users: Vec<ActiveUser> = self
            .members
            .values()
            .filter(|m| seen.insert(m.user.user_id))
            .map(|m| m.user.clone())
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username).then(a.user_id.cmp(&b.user_id)));
        users
    }

    fn send_except(&self, except: Option<ConnId>, event: &ServerEvent) -> usize {
        self.members
            .iter()
            .filter(|(conn, _)| Some(**conn) != except)
            .filter(|(_, m)| m.tx.send(event.clone()).is_ok())
            .count()
    }
}

/// Rooms keyed by resume id. Cloning shares the same rooms.
#[derive(Clone, Default)]
pub struct CollabHub {
    rooms: Arc<RwLock<HashMap<Uuid, Room>>>,
}

impl CollabHub {
    /// Adds the connection to the room and announces it to the other members.
    /// Returns the room's active users including the newcomer.
    pub async fn join(&self, resume_id: Uuid, conn: ConnId, member: Member) -> Vec<ActiveUser> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(resume_id).or_default();
        let user = member.user.clone();
        room.members.insert(conn, member);

        let active_users = room.active_users();
        room.send_except(
            Some(conn),
            &ServerEvent::UserJoined(PresenceFrame {
                user_id: user.user_id,
                username: user.username,
                active_users: active_users.clone(),
            }),
        );
        debug!(%resume_id, members = room.members.len(), "Connection joined room");
        active_users
    }

    /// Removes the connection, tells the remaining members and drops an empty room.
    pub async fn leave(&self, resume_id: Uuid, conn: ConnId) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(&resume_id) else {
            return;
        };
        let Some(member) = room.members.remove(&conn) else {
            return;
        };

        if room.members.is_empty() {
            rooms.remove(&resume_id);
            debug!(%resume_id, "Room closed");
            return;
        }

        room.send_except(
            None,
            &ServerEvent::UserLeft(PresenceFrame {
                user_id: member.user.user_id,
                username: member.user.username,
                active_users: room.active_users(),
            }),
        );
    }

    pub async fn leave_all(&self, conn: ConnId, resume_ids: &HashSet<Uuid>) {
        for resume_id in resume_ids {
            self.leave(*resume_id, conn).await;
        }
    }

    /// Forwards an event from `conn` to every other member of the room.
    /// Returns how many members it was delivered to.
    pub async fn relay(
        &self,
        resume_id: Uuid,
        conn: ConnId,
        event: ServerEvent,
    ) -> Result<usize, HubError> {
        let rooms = self.rooms.read().await;
        let room = rooms
            .get(&resume_id)
            .filter(|room| room.members.contains_key(&conn))
            .ok_or(HubError::NotJoined)?;
        Ok(room.send_except(Some(conn), &event))
    }

    /// Pushes `resume-updated` to every member of the room, if anyone is in it.
    pub async fn notify(&self, resume_id: Uuid, payload: Value) -> usize {
        let rooms = self.rooms.read().await;
        match rooms.get(&resume_id) {
            Some(room) => room.send_except(None, &ServerEvent::ResumeUpdated { resume_id, payload }),
            None => 0,
        }
    }

    /// Drops every connection `user_id` holds in the room, sending each an
    /// `error` frame, and announces the departure to whoever remains.
    /// Returns how many connections were removed.
    pub async fn evict_user(&self, resume_id: Uuid, user_id: Uuid, reason: &str) -> usize {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(&resume_id) else {
            return 0;
        };
        let conns: Vec<ConnId> = room
            .members
            .iter()
            .filter(|(_, m)| m.user.user_id == user_id)
            .map(|(conn, _)| *conn)
            .collect();
        let mut evicted = None;
        for conn in &conns {
            if let Some(member) = room.members.remove(conn) {
                let _ = member.tx.send(ServerEvent::error(reason));
                evicted = Some(member.user);
            }
        }
        let Some(user) = evicted else {
            return 0;
        };

        if room.members.is_empty() {
            rooms.remove(&resume_id);
        } else {
            room.send_except(
                None,
                &ServerEvent::UserLeft(PresenceFrame {
                    user_id: user.user_id,
                    username: user.username,
                    active_users: room.active_users(),
                }),
            );
        }
        debug!(%resume_id, %user_id, connections = conns.len(), "User evicted from room");
        conns.len()
    }

    /// Closes the room, sending every member an `error` frame.
    pub async fn close_room(&self, resume_id: Uuid, reason: &str) {
        if let Some(room) = self.rooms.write().await.remove(&resume_id) {
            room.send_except(None, &ServerEvent::error(reason));
            debug!(%resume_id, "Room closed");
        }
    }

    #[cfg(test)]
    pub async fn active_users(&self, resume_id: Uuid) -> Vec<ActiveUser> {
        let rooms = self.rooms.read().await;
        rooms
            .get(&resume_id)
            .map(Room::active_users)
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn member(name: &str) -> (Member, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Member {
                user: ActiveUser {
                    user_id: Uuid::new_v4(),
                    username: name.to_string(),
                },
                tx,
            },
            rx,
        )
    }

    fn relayed(text: &str) -> ServerEvent {
        ServerEvent::ContentUpdated(crate::collab::events::RelayedFrame {
            user_id: Uuid::nil(),
            username: "x".into(),
            payload: json!(text),
            timestamp: chrono::Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_join_announces_to_others_only() {
        let hub = CollabHub::default();
        let resume = Uuid::new_v4();
        let (ada, mut ada_rx) = member("ada");
        let (bob, mut bob_rx) = member("bob");
        let (ada_conn, bob_conn) = (Uuid::new_v4(), Uuid::new_v4());

        let users = hub.join(resume, ada_conn, ada).await;
        assert_eq!(users.len(), 1);
        assert!(ada_rx.try_recv().is_err());

        let users = hub.join(resume, bob_conn, bob).await;
        assert_eq!(users.len(), 2);
        assert!(bob_rx.try_recv().is_err());
        match ada_rx.try_recv().unwrap() {
            ServerEvent::UserJoined(frame) => {
                assert_eq!(frame.username, "bob");
                assert_eq!(frame.active_users.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_relay_skips_sender() {
        let hub = CollabHub::default();
        let resume = Uuid::new_v4();
        let (ada, mut ada_rx) = member("ada");
        let (bob, mut bob_rx) = member("bob");
        let (cy, mut cy_rx) = member("cy");
        let (ada_conn, bob_conn, cy_conn) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        hub.join(resume, ada_conn, ada).await;
        hub.join(resume, bob_conn, bob).await;
        hub.join(resume, cy_conn, cy).await;
        while ada_rx.try_recv().is_ok() {}
        while bob_rx.try_recv().is_ok() {}

        let delivered = hub.relay(resume, ada_conn, relayed("hi")).await.unwrap();
        assert_eq!(delivered, 2);
        assert!(ada_rx.try_recv().is_err());
        match bob_rx.try_recv().unwrap() {
            ServerEvent::ContentUpdated(frame) => assert_eq!(frame.payload, json!("hi")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(cy_rx.try_recv().unwrap(), ServerEvent::ContentUpdated(_)));
    }

    #[tokio::test]
    async fn test_relay_requires_membership() {
        let hub = CollabHub::default();
        let resume = Uuid::new_v4();
        let (ada, _ada_rx) = member("ada");
        hub.join(resume, Uuid::new_v4(), ada).await;

        let outsider = Uuid::new_v4();
        assert_eq!(
            hub.relay(resume, outsider, relayed("hi")).await,
            Err(HubError::NotJoined)
        );
        assert_eq!(
            hub.relay(Uuid::new_v4(), outsider, relayed("hi")).await,
            Err(HubError::NotJoined)
        );
    }

    #[tokio::test]
    async fn test_leave_notifies_and_drops_empty_rooms() {
        let hub = CollabHub::default();
        let resume = Uuid::new_v4();
        let (ada, mut ada_rx) = member("ada");
        let (bob, _bob_rx) = member("bob");
        let (ada_conn, bob_conn) = (Uuid::new_v4(), Uuid::new_v4());
        hub.join(resume, ada_conn, ada).await;
        hub.join(resume, bob_conn, bob).await;
        while ada_rx.try_recv().is_ok() {}

        hub.leave_all(bob_conn, &HashSet::from([resume])).await;
        match ada_rx.try_recv().unwrap() {
            ServerEvent::UserLeft(frame) => {
                assert_eq!(frame.username, "bob");
                assert_eq!(frame.active_users.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }

        hub.leave(resume, ada_conn).await;
        assert_eq!(hub.room_count().await, 0);
        assert!(hub.active_users(resume).await.is_empty());
    }

    #[tokio::test]
    async fn test_notify_reaches_every_member() {
        let hub = CollabHub::default();
        let resume = Uuid::new_v4();
        let (ada, mut ada_rx) = member("ada");
        hub.join(resume, Uuid::new_v4(), ada).await;

        let delivered = hub.notify(resume, json!({"type": "resume_saved"})).await;
        assert_eq!(delivered, 1);
        assert_eq!(
            ada_rx.try_recv().unwrap(),
            ServerEvent::ResumeUpdated {
                resume_id: resume,
                payload: json!({"type": "resume_saved"})
            }
        );
        assert_eq!(hub.notify(Uuid::new_v4(), json!({})).await, 0);
    }

    #[tokio::test]
    async fn test_evicted_user_stops_receiving_and_relaying() {
        let hub = CollabHub::default();
        let resume = Uuid::new_v4();
        let (ada, mut ada_rx) = member("ada");
        let (bob, mut bob_rx) = member("bob");
        let bob_id = bob.user.user_id;
        let (ada_conn, bob_conn) = (Uuid::new_v4(), Uuid::new_v4());
        hub.join(resume, ada_conn, ada).await;
        hub.join(resume, bob_conn, bob).await;
        while ada_rx.try_recv().is_ok() {}

        let evicted = hub.evict_user(resume, bob_id, "Access revoked").await;
        assert_eq!(evicted, 1);
        assert_eq!(bob_rx.try_recv().unwrap(), ServerEvent::error("Access revoked"));
        match ada_rx.try_recv().unwrap() {
            ServerEvent::UserLeft(frame) => assert_eq!(frame.user_id, bob_id),
            other => panic!("unexpected {other:?}"),
        }

        hub.relay(resume, ada_conn, relayed("edit")).await.unwrap();
        assert!(bob_rx.try_recv().is_err());
        assert_eq!(
            hub.relay(resume, bob_conn, relayed("edit")).await,
            Err(HubError::NotJoined)
        );
        assert_eq!(hub.evict_user(resume, bob_id, "again").await, 0);
    }

    #[tokio::test]
    async fn test_close_room_tells_everyone() {
        let hub = CollabHub::default();
        let resume = Uuid::new_v4();
        let (ada, mut ada_rx) = member("ada");
        hub.join(resume, Uuid::new_v4(), ada).await;

        hub.close_room(resume, "Resume deleted").await;
        assert_eq!(ada_rx.try_recv().unwrap(), ServerEvent::error("Resume deleted"));
        assert_eq!(hub.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_same_user_in_two_tabs_counts_once() {
        let hub = CollabHub::default();
        let resume = Uuid::new_v4();
        let (ada, _rx1) = member("ada");
        let second_tab = Member {
            user: ada.user.clone(),
            tx: mpsc::unbounded_channel().0,
        };
        hub.join(resume, Uuid::new_v4(), ada).await;
        let users = hub.join(resume, Uuid::new_v4(), second_tab).await;
        assert_eq!(users.len(), 1);
    }
}
