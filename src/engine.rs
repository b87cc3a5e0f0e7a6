//! Poll state machine.
//!
//! ## Design
//! - One `apply(event)` entry point: a typed dispatch over [`ServerEvent`],
//!   each arm a deterministic state update. Handlers return any follow-up
//!   outbound requests instead of performing I/O, so the whole machine
//!   runs in unit tests without a transport.
//! - Authoritative data is replaced wholesale, never merged. The only
//!   speculative state is the single-vote [`VoteOverlay`], reconciled by
//!   replace-by-`user_id`.
//! - Service errors never propagate out of `apply`; they land in a
//!   dismissible `error` slot and leave poll state untouched.
//!
//! ## Phases
//! `Idle` → `Active` → `Locked` (expired, not voted) / `Resulted` (voted,
//! or the service closed the poll). `Kicked` supersedes everything and is
//! terminal: after it, every event is ignored.

use tracing::{debug, warn};

use crate::events::{ClientRequest, ServerEvent};
use crate::identity::{Role, SessionIdentity};
use crate::model::{Poll, Vote};
use crate::overlay::VoteOverlay;
use crate::results::percentages_for;
use crate::timer::{remaining_secs, TimerReading, TimerReconciler};

const QUESTION_MAX_CHARS: usize = 100;
const MIN_OPTIONS: usize = 2;

/// What the view should show right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// No poll known.
    Idle,
    /// Poll open, caller has not voted.
    Active,
    /// Time ran out before the caller voted; results render read-only.
    Locked,
    /// Caller voted, or the service closed the poll.
    Resulted,
    /// Removed by the presenter. Terminal.
    Kicked,
}

pub struct PollEngine {
    identity: SessionIdentity,
    server_poll: Option<Poll>,
    overlay: VoteOverlay,
    timer: TimerReconciler,
    has_voted: bool,
    show_results: bool,
    kicked: bool,
    registered: bool,
    creating_poll: bool,
    error: Option<String>,
    socket_id: Option<String>,
    history: Vec<Poll>,
}

impl PollEngine {
    pub fn new(identity: SessionIdentity) -> Self {
        Self {
            identity,
            server_poll: None,
            overlay: VoteOverlay::new(),
            timer: TimerReconciler::new(),
            has_voted: false,
            show_results: false,
            kicked: false,
            registered: false,
            creating_poll: false,
            error: None,
            socket_id: None,
            history: Vec::new(),
        }
    }

    /// Requests to send right after the transport connects: role
    /// registration and the state-recovery poll query.
    pub fn startup_requests(&self) -> Vec<ClientRequest> {
        let user_name = match self.identity.role() {
            Role::Student => Some(self.identity.transport_name()),
            Role::Presenter => None,
        };
        vec![
            ClientRequest::SelectRoles {
                roles: vec![self.identity.role().wire_name().to_string()],
                user_name,
            },
            ClientRequest::GetActivePoll,
        ]
    }

    // -----------------------------------------------------------------------
    // Inbound event dispatch
    // -----------------------------------------------------------------------

    /// Feed one inbound event through the machine. Returns follow-up
    /// outbound requests (e.g. re-joining the presence room after adopting
    /// a poll).
    pub fn apply(&mut self, event: ServerEvent, now_ms: u64) -> Vec<ClientRequest> {
        if self.kicked {
            debug!(?event, "ignoring event after kick");
            return Vec::new();
        }

        match event {
            ServerEvent::Connected { socket_id } => {
                self.socket_id = Some(socket_id);
                Vec::new()
            }

            ServerEvent::RolesSelected { success, error } => {
                self.registered = success;
                if !success {
                    self.error = Some(error.unwrap_or_else(|| {
                        "Failed to register with the poll service.".to_string()
                    }));
                }
                Vec::new()
            }

            ServerEvent::NewPoll(poll) => self.adopt(poll, now_ms),

            ServerEvent::PollCreated { success, poll, error } => {
                self.creating_poll = false;
                match (success, poll) {
                    (true, Some(poll)) => self.adopt(poll, now_ms),
                    _ => {
                        self.error =
                            Some(error.unwrap_or_else(|| "Failed to create poll".to_string()));
                        Vec::new()
                    }
                }
            }

            ServerEvent::ActivePollResponse { success, poll, has_voted, .. } => {
                match (success, poll) {
                    (true, Some(poll)) => {
                        let requests = self.adopt(poll, now_ms);
                        if has_voted == Some(true) {
                            self.has_voted = true;
                            self.show_results = true;
                        }
                        requests
                    }
                    // No active poll on the service: stay Idle.
                    _ => Vec::new(),
                }
            }

            ServerEvent::PollUpdated(poll) => {
                match &self.server_poll {
                    Some(current) if current.id == poll.id => {
                        self.server_poll = Some(poll);
                        // A voted participant never falls back to the
                        // voting view, whatever the pushed isActive says.
                        if self.has_voted {
                            self.show_results = true;
                        }
                    }
                    Some(current) => {
                        warn!(stale = %poll.id, tracked = %current.id, "ignoring stale poll update");
                    }
                    None => {
                        debug!(poll = %poll.id, "ignoring update with no tracked poll");
                    }
                }
                Vec::new()
            }

            ServerEvent::VoteSubmitted { success, poll, error } => {
                if success {
                    if let Some(poll) = poll {
                        match &self.server_poll {
                            Some(current) if current.id == poll.id => {
                                self.server_poll = Some(poll)
                            }
                            Some(current) => {
                                warn!(stale = %poll.id, tracked = %current.id,
                                    "ignoring vote ack for a replaced poll");
                                return Vec::new();
                            }
                            None => self.server_poll = Some(poll),
                        }
                    }
                    // Authoritative list has landed; the overlay's job is
                    // done.
                    self.overlay.clear();
                    self.has_voted = true;
                    self.show_results = true;
                    self.error = None;
                } else {
                    // The optimistic "has voted" is deliberately not
                    // rolled back; re-voting is not offered.
                    self.error =
                        Some(error.unwrap_or_else(|| "Failed to submit vote".to_string()));
                }
                Vec::new()
            }

            ServerEvent::UserKicked { socket_id } => {
                if self.socket_id.as_deref() == Some(socket_id.as_str()) {
                    self.kicked = true;
                }
                Vec::new()
            }

            ServerEvent::Error { message } => {
                self.error = Some(message);
                Vec::new()
            }

            ServerEvent::PollHistory(polls) => {
                self.history = polls;
                Vec::new()
            }

            // Roster and chat traffic belongs to PresenceChatSync; the
            // poll machine has nothing to update.
            ServerEvent::ParticipantsUpdated(_)
            | ServerEvent::ChatMessage(_)
            | ServerEvent::ChatMessagesResponse { .. } => Vec::new(),
        }
    }

    /// Replace the tracked poll and reset every per-poll flag. No stale
    /// overlay, vote, or error may leak from one poll into the next.
    fn adopt(&mut self, poll: Poll, now_ms: u64) -> Vec<ClientRequest> {
        debug!(poll = %poll.id, "adopting poll");
        self.overlay.clear();
        self.has_voted = false;
        self.show_results = false;
        self.error = None;

        // Evaluate immediately rather than waiting for the next tick; an
        // adopted poll that is already closed or expired renders results
        // at once.
        let reading = self.timer.evaluate(&poll, now_ms);
        if reading.remaining == 0 {
            self.show_results = true;
        }

        let join = ClientRequest::JoinPollRoom {
            poll_id: poll.id.clone(),
            user_name: self.identity.display_name().to_string(),
        };
        self.server_poll = Some(poll);
        vec![join]
    }

    // -----------------------------------------------------------------------
    // Timer cadence
    // -----------------------------------------------------------------------

    /// Periodic (1 s) evaluation. Returns `None` when there is nothing to
    /// time. When the reading reports `expired_now`, the caller should
    /// stop the periodic schedule.
    pub fn on_tick(&mut self, now_ms: u64) -> Option<TimerReading> {
        if self.kicked {
            return None;
        }
        let poll = self.server_poll.as_ref()?;
        let reading = self.timer.evaluate(poll, now_ms);
        if reading.expired_now {
            self.show_results = true;
        }
        Some(reading)
    }

    /// Whether the periodic timer task should currently be scheduled.
    pub fn timer_running(&self) -> bool {
        !self.kicked && self.server_poll.is_some() && !self.timer.expired()
    }

    // -----------------------------------------------------------------------
    // Local actions
    // -----------------------------------------------------------------------

    /// Cast a vote for the option at `option_index`.
    ///
    /// Applies the optimistic overlay and marks the session as having
    /// voted before any acknowledgment, irreversible from the view's
    /// side. Returns the request to dispatch, or `None` when voting is
    /// not possible (no poll, already voted, expired, not registered).
    pub fn submit_vote(&mut self, option_index: usize, now_ms: u64) -> Option<ClientRequest> {
        if self.kicked || self.has_voted || self.show_results {
            return None;
        }
        if !self.registered {
            self.error =
                Some("Registration has not completed yet; voting is disabled.".to_string());
            return None;
        }
        let poll = self.server_poll.as_ref()?;
        if !poll.is_active || remaining_secs(poll, now_ms) == 0 {
            return None;
        }
        let option = poll.options.get(option_index)?.clone();
        let poll_id = poll.id.clone();

        let user_id = self.identity.user_id().to_string();
        let user_name = self.identity.transport_name();
        self.overlay.stage(Vote {
            user_id: user_id.clone(),
            user_name: user_name.clone(),
            option: option.clone(),
        });
        self.has_voted = true;
        self.show_results = true;

        Some(ClientRequest::SubmitVote { poll_id, option, user_name, user_id })
    }

    /// Ask the service to open a new poll (presenter only).
    ///
    /// Validates the form inputs; failures surface through the error slot
    /// and nothing is sent. While an acknowledgment is outstanding the
    /// machine refuses a second submission; a failed acknowledgment clears
    /// that flag so the form is retryable.
    pub fn create_poll(
        &mut self,
        question: &str,
        options: &[String],
        time_limit: u64,
    ) -> Option<ClientRequest> {
        if self.identity.role() != Role::Presenter {
            self.error = Some("Only the presenter can create polls.".to_string());
            return None;
        }
        if self.creating_poll {
            return None;
        }
        let question = question.trim();
        if question.is_empty() {
            self.error = Some("Question must not be empty.".to_string());
            return None;
        }
        if question.chars().count() > QUESTION_MAX_CHARS {
            self.error = Some(format!("Question must be at most {QUESTION_MAX_CHARS} characters."));
            return None;
        }
        let options: Vec<String> = options
            .iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if options.len() < MIN_OPTIONS {
            self.error = Some(format!("At least {MIN_OPTIONS} options are required."));
            return None;
        }

        self.creating_poll = true;
        Some(ClientRequest::CreatePoll { question: question.to_string(), options, time_limit })
    }

    // -----------------------------------------------------------------------
    // View snapshots
    // -----------------------------------------------------------------------

    pub fn phase(&self) -> PollPhase {
        if self.kicked {
            return PollPhase::Kicked;
        }
        let Some(poll) = &self.server_poll else {
            return PollPhase::Idle;
        };
        if self.has_voted || !poll.is_active {
            return PollPhase::Resulted;
        }
        if self.show_results {
            return PollPhase::Locked;
        }
        PollPhase::Active
    }

    pub fn poll(&self) -> Option<&Poll> {
        self.server_poll.as_ref()
    }

    /// The vote list as the view should see it: authoritative votes with
    /// the pending overlay reconciled in.
    pub fn votes(&self) -> Vec<Vote> {
        match &self.server_poll {
            Some(poll) => self.overlay.merged(&poll.votes),
            None => Vec::new(),
        }
    }

    /// Per-option percentages for the tracked poll, overlay included.
    pub fn percentages(&self) -> Vec<u8> {
        match &self.server_poll {
            Some(poll) => percentages_for(&self.votes(), &poll.options),
            None => Vec::new(),
        }
    }

    pub fn remaining(&self, now_ms: u64) -> u64 {
        self.server_poll.as_ref().map_or(0, |poll| remaining_secs(poll, now_ms))
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn socket_id(&self) -> Option<&str> {
        self.socket_id.as_deref()
    }

    pub fn has_voted(&self) -> bool {
        self.has_voted
    }

    pub fn registered(&self) -> bool {
        self.registered
    }

    pub fn is_kicked(&self) -> bool {
        self.kicked
    }

    pub fn history(&self) -> &[Poll] {
        &self.history
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }
}
