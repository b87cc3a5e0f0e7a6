//! Typed wire protocol: inbound service events and outbound requests.
//!
//! Every frame is a JSON object `{"type": "<kebab-case name>", "data": …}`.
//! Modeling both directions as tagged enums keeps dispatch exhaustive
//! (adding an event forces every consumer to decide what to do with it)
//! and lets the engine be driven in tests by constructing events directly,
//! with no transport in the loop.

use serde::{Deserialize, Serialize};

use crate::model::{ChatMessage, Participant, Poll};

/// Room marker for the session-wide chat transcript.
pub const GLOBAL_CHAT_ROOM: &str = "global";

// ---------------------------------------------------------------------------
// Inbound: service → client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Transport handshake: the socket id the service assigned us. Needed
    /// to recognize a `user-kicked` aimed at this session.
    #[serde(rename_all = "camelCase")]
    Connected { socket_id: String },

    /// Acknowledgment of `select-roles`.
    RolesSelected {
        success: bool,
        error: Option<String>,
    },

    /// A fresh poll pushed to everyone.
    NewPoll(Poll),

    /// Acknowledgment of `create-poll`.
    PollCreated {
        success: bool,
        poll: Option<Poll>,
        error: Option<String>,
    },

    /// Response to `get-active-poll` (state recovery).
    #[serde(rename_all = "camelCase")]
    ActivePollResponse {
        success: bool,
        poll: Option<Poll>,
        has_voted: Option<bool>,
        remaining_time: Option<i64>,
    },

    /// Authoritative replacement for the tracked poll (new votes arrived,
    /// the poll closed, …).
    PollUpdated(Poll),

    /// Acknowledgment of `submit-vote`, carrying the authoritative poll on
    /// success.
    VoteSubmitted {
        success: bool,
        poll: Option<Poll>,
        error: Option<String>,
    },

    /// Roster snapshot for the poll-scoped presence room.
    ParticipantsUpdated(Vec<Participant>),

    /// One chat message delivered to the global room.
    ChatMessage(ChatMessage),

    /// Bulk transcript response to `get-chat-messages`.
    ChatMessagesResponse {
        success: bool,
        messages: Option<Vec<ChatMessage>>,
        error: Option<String>,
    },

    /// Moderation: the named socket has been removed by the presenter.
    #[serde(rename_all = "camelCase")]
    UserKicked { socket_id: String },

    /// Generic service-reported error.
    Error { message: String },

    /// Past polls with their final tallies, newest last.
    PollHistory(Vec<Poll>),
}

// ---------------------------------------------------------------------------
// Outbound: client → service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientRequest {
    #[serde(rename_all = "camelCase")]
    SelectRoles {
        roles: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        user_name: Option<String>,
    },

    GetActivePoll,

    #[serde(rename_all = "camelCase")]
    CreatePoll {
        question: String,
        options: Vec<String>,
        time_limit: u64,
    },

    #[serde(rename_all = "camelCase")]
    SubmitVote {
        poll_id: String,
        option: String,
        user_name: String,
        user_id: String,
    },

    #[serde(rename_all = "camelCase")]
    JoinPollRoom { poll_id: String, user_name: String },

    #[serde(rename_all = "camelCase")]
    LeavePollRoom { poll_id: String },

    /// `poll_id` is a poll id or [`GLOBAL_CHAT_ROOM`].
    #[serde(rename_all = "camelCase")]
    GetChatMessages { poll_id: String },

    #[serde(rename_all = "camelCase")]
    SendChatMessage {
        poll_id: String,
        message: String,
        user_name: String,
    },

    GetPollHistory,

    #[serde(rename_all = "camelCase")]
    KickUser { poll_id: String, socket_id: String },
}
