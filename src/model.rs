//! Wire-level data model shared with the poll service.
//!
//! Every type here mirrors the JSON the service emits, camelCase field
//! names included. The service owns the ground truth for all of it; the
//! client only ever holds cached copies that are replaced wholesale when
//! an authoritative event arrives.

use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Poll
// ---------------------------------------------------------------------------

/// A poll as pushed by the service.
///
/// Replaced, never merged: a `new-poll` or `poll-updated` event swaps the
/// whole cached value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    #[serde(rename = "_id")]
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub votes: Vec<Vote>,
    /// Unix epoch milliseconds, stamped by the service clock.
    pub start_time: u64,
    /// Seconds the poll stays open after `start_time`.
    pub time_limit: u64,
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Vote
// ---------------------------------------------------------------------------

/// One participant's vote. The vote list is a set keyed by `user_id`;
/// a resubmission with the same id replaces the earlier entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub user_id: String,
    pub user_name: String,
    /// Canonical option text. Coerced from whatever JSON value the service
    /// sent, exactly once, at deserialization.
    #[serde(deserialize_with = "coerce_option")]
    pub option: String,
}

/// Accept a vote option of any JSON type and canonicalize it to a trimmed
/// string. The reference service has been observed to emit non-string
/// option values; coercion happens here so comparisons elsewhere stay
/// plain string equality.
fn coerce_option<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s.trim().to_string()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(D::Error::custom(format!(
            "vote option must be a scalar, got {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// A roster entry for the poll-scoped presence room.
///
/// `socket_id` is transport-session-scoped and changes across reconnects;
/// `user_name` may carry a per-tab session suffix that the UI strips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub socket_id: String,
    pub user_name: String,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// A chat message. Messages carry no assigned id; the identity used for
/// deduplication is the full `(user_name, message, timestamp)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub user_name: String,
    pub message: String,
    /// Unix epoch milliseconds, stamped by the service.
    pub timestamp: u64,
}

impl ChatMessage {
    /// True when `other` is the same message under the dedup identity.
    pub fn same_identity(&self, other: &ChatMessage) -> bool {
        self.user_name == other.user_name
            && self.message == other.message
            && self.timestamp == other.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll_json() -> &'static str {
        r#"{
            "_id": "poll-1",
            "question": "Capital of France?",
            "options": ["Paris", "London"],
            "votes": [{"userId": "u1", "userName": "Ana", "option": "Paris"}],
            "startTime": 1700000000000,
            "timeLimit": 30,
            "isActive": true
        }"#
    }

    #[test]
    fn test_poll_deserializes_wire_fields() {
        let poll: Poll = serde_json::from_str(poll_json()).expect("parse");
        assert_eq!(poll.id, "poll-1");
        assert_eq!(poll.options, vec!["Paris", "London"]);
        assert_eq!(poll.time_limit, 30);
        assert!(poll.is_active);
        assert_eq!(poll.votes.len(), 1);
        assert_eq!(poll.votes[0].option, "Paris");
    }

    #[test]
    fn test_poll_missing_votes_defaults_empty() {
        let json = r#"{
            "_id": "p", "question": "q", "options": [],
            "startTime": 0, "timeLimit": 60, "isActive": false
        }"#;
        let poll: Poll = serde_json::from_str(json).expect("parse");
        assert!(poll.votes.is_empty());
    }

    #[test]
    fn test_poll_serializes_back_to_camel_case() {
        let poll: Poll = serde_json::from_str(poll_json()).expect("parse");
        let out = serde_json::to_value(&poll).expect("serialize");
        assert!(out.get("_id").is_some());
        assert!(out.get("startTime").is_some());
        assert!(out.get("isActive").is_some());
    }

    #[test]
    fn test_vote_option_string_is_trimmed() {
        let vote: Vote =
            serde_json::from_str(r#"{"userId":"u","userName":"n","option":"  Paris  "}"#)
                .expect("parse");
        assert_eq!(vote.option, "Paris");
    }

    #[test]
    fn test_vote_option_number_coerced_to_string() {
        let vote: Vote = serde_json::from_str(r#"{"userId":"u","userName":"n","option":42}"#)
            .expect("parse");
        assert_eq!(vote.option, "42");
    }

    #[test]
    fn test_vote_option_bool_coerced_to_string() {
        let vote: Vote = serde_json::from_str(r#"{"userId":"u","userName":"n","option":true}"#)
            .expect("parse");
        assert_eq!(vote.option, "true");
    }

    #[test]
    fn test_vote_option_null_coerced_to_empty() {
        let vote: Vote = serde_json::from_str(r#"{"userId":"u","userName":"n","option":null}"#)
            .expect("parse");
        assert_eq!(vote.option, "");
    }

    #[test]
    fn test_vote_option_array_rejected() {
        let result = serde_json::from_str::<Vote>(
            r#"{"userId":"u","userName":"n","option":["Paris"]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_chat_message_identity_triple() {
        let a = ChatMessage {
            user_name: "Ana".into(),
            message: "hi".into(),
            timestamp: 5,
        };
        let b = a.clone();
        assert!(a.same_identity(&b));

        let later = ChatMessage { timestamp: 6, ..a.clone() };
        assert!(!a.same_identity(&later));
    }

    #[test]
    fn test_participant_wire_names() {
        let p: Participant =
            serde_json::from_str(r#"{"socketId":"s1","userName":"Ana-x1y2z3"}"#).expect("parse");
        assert_eq!(p.socket_id, "s1");
        assert_eq!(p.user_name, "Ana-x1y2z3");
    }
}
