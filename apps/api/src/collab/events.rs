use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Frames sent by clients. The `event` field selects the variant.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinResume {
        #[serde(rename = "resumeId")]
        resume_id: Uuid,
    },
    LeaveResume {
        #[serde(rename = "resumeId")]
        resume_id: Uuid,
    },
    ContentUpdate(RelayFrame),
    CursorMove(RelayFrame),
    SectionReorder(RelayFrame),
    TemplateChange(RelayFrame),
    Typing(RelayFrame),
    AddComment(RelayFrame),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelayFrame {
    pub resume_id: Uuid,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveUser {
    pub user_id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceFrame {
    pub user_id: Uuid,
    pub username: String,
    pub active_users: Vec<ActiveUser>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelayedFrame {
    pub user_id: Uuid,
    pub username: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

/// Frames sent by the server.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerEvent {
    Joined {
        #[serde(rename = "resumeId")]
        resume_id: Uuid,
        #[serde(rename = "activeUsers")]
        active_users: Vec<ActiveUser>,
    },
    UserJoined(PresenceFrame),
    UserLeft(PresenceFrame),
    ContentUpdated(RelayedFrame),
    CursorMoved(RelayedFrame),
    SectionsReordered(RelayedFrame),
    TemplateChanged(RelayedFrame),
    UserTyping(RelayedFrame),
    CommentAdded(RelayedFrame),
    ResumeUpdated {
        #[serde(rename = "resumeId")]
        resume_id: Uuid,
        payload: Value,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}

impl ClientEvent {
    /// For relayable events: the target room and the frame other members receive.
    pub fn into_relay(self, from: &ActiveUser, now: DateTime<Utc>) -> Option<(Uuid, ServerEvent)> {
        let (frame, wrap): (RelayFrame, fn(RelayedFrame) -> ServerEvent) = match self {
            ClientEvent::JoinResume { .. } | ClientEvent::LeaveResume { .. } => return None,
            ClientEvent::ContentUpdate(f) => (f, ServerEvent::ContentUpdated),
            ClientEvent::CursorMove(f) => (f, ServerEvent::CursorMoved),
            ClientEvent::SectionReorder(f) => (f, ServerEvent::SectionsReordered),
            ClientEvent::TemplateChange(f) => (f, ServerEvent::TemplateChanged),
            ClientEvent::Typing(f) => (f, ServerEvent::UserTyping),
            ClientEvent::AddComment(f) => (f, ServerEvent::CommentAdded),
        };
        let relayed = RelayedFrame {
            user_id: from.user_id,
            username: from.username.clone(),
            payload: frame.payload,
            timestamp: now,
        };
        Some((frame.resume_id, wrap(relayed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_join_and_relay_frames() {
        let id = Uuid::new_v4();
        let join: ClientEvent =
            serde_json::from_value(json!({"event": "join-resume", "resumeId": id})).unwrap();
        assert_eq!(join, ClientEvent::JoinResume { resume_id: id });

        let update: ClientEvent = serde_json::from_value(json!({
            "event": "content-update",
            "resumeId": id,
            "payload": {"sectionId": "s1", "content": "Hello"}
        }))
        .unwrap();
        match update {
            ClientEvent::ContentUpdate(frame) => {
                assert_eq!(frame.resume_id, id);
                assert_eq!(frame.payload["sectionId"], "s1");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let parsed = serde_json::from_value::<ClientEvent>(json!({"event": "delete-everything"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_relayed_frame_wire_shape() {
        let id = Uuid::new_v4();
        let user = ActiveUser {
            user_id: Uuid::new_v4(),
            username: "ada".into(),
        };
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "cursor-move",
            "resumeId": id,
            "payload": {"x": 4, "y": 2}
        }))
        .unwrap();
        let (room, out) = event.into_relay(&user, Utc::now()).unwrap();
        assert_eq!(room, id);

        let wire = serde_json::to_value(&out).unwrap();
        assert_eq!(wire["event"], "cursor-moved");
        assert_eq!(wire["userId"], user.user_id.to_string());
        assert_eq!(wire["username"], "ada");
        assert_eq!(wire["payload"]["x"], 4);
        assert!(wire.get("timestamp").is_some());
    }

    #[test]
    fn test_join_is_not_relayable() {
        let user = ActiveUser {
            user_id: Uuid::new_v4(),
            username: "ada".into(),
        };
        let join = ClientEvent::JoinResume {
            resume_id: Uuid::new_v4(),
        };
        assert!(join.into_relay(&user, Utc::now()).is_none());
    }

    #[test]
    fn test_server_frames_use_camel_case() {
        let id = Uuid::new_v4();
        let wire = serde_json::to_value(ServerEvent::ResumeUpdated {
            resume_id: id,
            payload: json!({"type": "resume_saved"}),
        })
        .unwrap();
        assert_eq!(wire["event"], "resume-updated");
        assert_eq!(wire["resumeId"], id.to_string());

        let wire = serde_json::to_value(ServerEvent::UserLeft(PresenceFrame {
            user_id: id,
            username: "ada".into(),
            active_users: vec![],
        }))
        .unwrap();
        assert_eq!(wire["event"], "user-left");
        assert!(wire["activeUsers"].as_array().unwrap().is_empty());

        let wire = serde_json::to_value(ServerEvent::error("nope")).unwrap();
        assert_eq!(wire, json!({"event": "error", "message": "nope"}));
    }
}
