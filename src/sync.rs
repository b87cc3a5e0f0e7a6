//! Presence roster and chat transcript reconciliation.
//!
//! Two independent logical rooms: the poll-scoped presence room, rejoined
//! on every poll change and left on teardown, and the global chat room,
//! joined once per session and never left so the transcript survives poll
//! transitions.
//!
//! Both caches reconcile by diffing: an inbound snapshot that equals the
//! cached state is a no-op, so the view layer never refreshes for nothing.
//! Chat messages deduplicate on the `(user_name, message, timestamp)`
//! triple; the service assigns no message ids.

use tracing::{debug, warn};

use crate::events::{ClientRequest, GLOBAL_CHAT_ROOM};
use crate::identity::{strip_session_suffix, Role, SessionIdentity};
use crate::model::{ChatMessage, Participant};

/// Minimum delay between two outgoing chat messages. Blunts accidental
/// double-submission from a re-entrant input widget.
pub const SEND_REARM_MS: u64 = 500;

/// Why an outgoing message was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejection {
    /// Empty or whitespace-only after trimming.
    Empty,
    /// Inside the re-arm window after the previous send.
    TooSoon,
}

/// A roster entry with its UI-facing label precomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub socket_id: String,
    pub user_name: String,
    /// `user_name` with any session suffix stripped; this is what gets rendered.
    pub display_name: String,
}

pub struct PresenceChatSync {
    roster: Vec<RosterEntry>,
    transcript: Vec<ChatMessage>,
    transcript_requested: bool,
    current_room: Option<String>,
    last_send_ms: Option<u64>,
}

impl PresenceChatSync {
    pub fn new() -> Self {
        Self {
            roster: Vec::new(),
            transcript: Vec::new(),
            transcript_requested: false,
            current_room: None,
            last_send_ms: None,
        }
    }

    // -----------------------------------------------------------------------
    // Room lifecycle
    // -----------------------------------------------------------------------

    /// The tracked poll changed. Returns the requests to dispatch: leaving
    /// the previous presence room, plus the one-time global transcript
    /// fetch. Joining the new room is part of the poll adoption itself.
    ///
    /// The transcript fetch happens at most once per session: a poll
    /// switch neither re-fetches nor clears history.
    pub fn on_poll_changed(&mut self, poll_id: &str) -> Vec<ClientRequest> {
        let mut requests = Vec::new();
        if let Some(previous) = self.current_room.take() {
            if previous != poll_id {
                requests.push(ClientRequest::LeavePollRoom { poll_id: previous });
            }
        }
        self.current_room = Some(poll_id.to_string());

        if !self.transcript_requested {
            self.transcript_requested = true;
            requests.push(ClientRequest::GetChatMessages {
                poll_id: GLOBAL_CHAT_ROOM.to_string(),
            });
        }
        requests
    }

    /// View teardown: leave the poll-scoped room. The global chat room is
    /// deliberately not left.
    pub fn teardown(&mut self) -> Vec<ClientRequest> {
        self.roster.clear();
        match self.current_room.take() {
            Some(poll_id) => vec![ClientRequest::LeavePollRoom { poll_id }],
            None => Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Roster reconciliation
    // -----------------------------------------------------------------------

    /// Reconcile an inbound roster snapshot. Returns true when the cached
    /// roster actually changed; an equal snapshot (under order-insensitive
    /// `(socket_id, user_name)` equality) leaves the cache untouched so
    /// no redundant refresh happens. Display names are recomputed only on
    /// a real change.
    pub fn apply_roster(&mut self, snapshot: Vec<Participant>) -> bool {
        if !self.roster_differs(&snapshot) {
            return false;
        }
        debug!(size = snapshot.len(), "roster changed");
        self.roster = snapshot
            .into_iter()
            .map(|p| {
                let display_name = strip_session_suffix(&p.user_name);
                RosterEntry { socket_id: p.socket_id, user_name: p.user_name, display_name }
            })
            .collect();
        true
    }

    fn roster_differs(&self, snapshot: &[Participant]) -> bool {
        if self.roster.len() != snapshot.len() {
            return true;
        }
        let mut cached: Vec<(&str, &str)> = self
            .roster
            .iter()
            .map(|e| (e.socket_id.as_str(), e.user_name.as_str()))
            .collect();
        let mut incoming: Vec<(&str, &str)> = snapshot
            .iter()
            .map(|p| (p.socket_id.as_str(), p.user_name.as_str()))
            .collect();
        cached.sort_unstable();
        incoming.sort_unstable();
        cached != incoming
    }

    // -----------------------------------------------------------------------
    // Chat reconciliation
    // -----------------------------------------------------------------------

    /// Append one delivered message unless its identity triple is already
    /// present. Returns true when the transcript grew.
    pub fn apply_chat_message(&mut self, message: ChatMessage) -> bool {
        if self.transcript.iter().any(|m| m.same_identity(&message)) {
            debug!(author = %message.user_name, "dropping duplicate chat message");
            return false;
        }
        self.transcript.push(message);
        true
    }

    /// Reconcile a bulk transcript response. Replaces the cache only when
    /// the incoming transcript differs structurally. Returns true on
    /// replacement.
    pub fn apply_transcript(&mut self, messages: Vec<ChatMessage>) -> bool {
        if messages == self.transcript {
            return false;
        }
        self.transcript = messages;
        true
    }

    /// A transcript fetch failed; the cached transcript stays as-is.
    pub fn transcript_failed(&self, error: &str) {
        warn!(error, "chat transcript fetch failed");
    }

    // -----------------------------------------------------------------------
    // Outgoing
    // -----------------------------------------------------------------------

    /// Prepare an outgoing chat message.
    ///
    /// Trims the text, rejects empty input, and enforces the re-arm delay;
    /// the caller clears its input widget as soon as this returns `Ok`,
    /// before any network round trip. Messages carry the stripped display
    /// name so authorship matches the roster label.
    pub fn send_message(
        &mut self,
        text: &str,
        identity: &SessionIdentity,
        now_ms: u64,
    ) -> Result<ClientRequest, SendRejection> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SendRejection::Empty);
        }
        if let Some(last) = self.last_send_ms {
            if now_ms.saturating_sub(last) < SEND_REARM_MS {
                return Err(SendRejection::TooSoon);
            }
        }
        self.last_send_ms = Some(now_ms);
        Ok(ClientRequest::SendChatMessage {
            poll_id: GLOBAL_CHAT_ROOM.to_string(),
            message: text.to_string(),
            user_name: identity.display_name().to_string(),
        })
    }

    /// Moderation: request removal of a roster entry. Presenter only;
    /// any other role gets nothing.
    pub fn kick_request(
        &self,
        identity: &SessionIdentity,
        socket_id: &str,
    ) -> Option<ClientRequest> {
        if identity.role() != Role::Presenter {
            return None;
        }
        let poll_id = self.current_room.clone()?;
        Some(ClientRequest::KickUser { poll_id, socket_id: socket_id.to_string() })
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }
}

impl Default for PresenceChatSync {
    fn default() -> Self {
        Self::new()
    }
}
