//! Terminal client runtime.
//!
//! One task owns all mutable state. Inbound transport events, stdin
//! commands, and the 1 s timer cadence are multiplexed with
//! `tokio::select!`; every handler is short and non-blocking, and
//! submissions return as soon as the request is on the outbound channel;
//! the authoritative effect arrives later as its own event.
//!
//! [`PollClient`] is the transport-free half: it routes events between
//! the poll state machine and the presence/chat reconciler and reports
//! which views actually changed, so redundant redraws (and tests) have
//! something precise to check.

use std::time::Duration;

use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::config::ClientConfig;
use crate::engine::{PollEngine, PollPhase};
use crate::error::PollError;
use crate::events::{ClientRequest, ServerEvent};
use crate::identity::{FileStore, MemoryStore, SessionIdentity};
use crate::model::Poll;
use crate::now_ms;
use crate::sync::{PresenceChatSync, SendRejection};
use crate::timer::format_clock;
use crate::transport::Transport;

// ---------------------------------------------------------------------------
// Event routing
// ---------------------------------------------------------------------------

/// Which views changed as a result of one inbound event.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Refresh {
    pub poll: bool,
    pub roster: bool,
    pub chat: bool,
    pub history: bool,
}

/// Outcome of routing one inbound event.
#[derive(Debug, Default)]
pub struct EventOutcome {
    pub requests: Vec<ClientRequest>,
    pub refresh: Refresh,
    /// A different poll id is now tracked (timer cadence restarts).
    pub poll_changed: bool,
}

/// Engine + presence/chat reconciler, wired together.
pub struct PollClient {
    pub engine: PollEngine,
    pub sync: PresenceChatSync,
}

impl PollClient {
    pub fn new(identity: SessionIdentity) -> Self {
        Self { engine: PollEngine::new(identity), sync: PresenceChatSync::new() }
    }

    /// Route one inbound event. Roster and chat traffic goes to the
    /// reconciler; everything else drives the poll state machine. The
    /// reconciler's no-ops (unchanged roster snapshot, duplicate chat
    /// message, identical transcript) report no refresh at all.
    pub fn handle_event(&mut self, event: ServerEvent, now_ms: u64) -> EventOutcome {
        match event {
            ServerEvent::ParticipantsUpdated(snapshot) => EventOutcome {
                refresh: Refresh { roster: self.sync.apply_roster(snapshot), ..Refresh::default() },
                ..EventOutcome::default()
            },

            ServerEvent::ChatMessage(message) => EventOutcome {
                refresh: Refresh {
                    chat: self.sync.apply_chat_message(message),
                    ..Refresh::default()
                },
                ..EventOutcome::default()
            },

            ServerEvent::ChatMessagesResponse { success, messages, error } => {
                let chat = match (success, messages) {
                    (true, Some(messages)) => self.sync.apply_transcript(messages),
                    _ => {
                        if let Some(error) = error {
                            self.sync.transcript_failed(&error);
                        }
                        false
                    }
                };
                EventOutcome {
                    refresh: Refresh { chat, ..Refresh::default() },
                    ..EventOutcome::default()
                }
            }

            event => self.handle_engine_event(event, now_ms),
        }
    }

    fn handle_engine_event(&mut self, event: ServerEvent, now_ms: u64) -> EventOutcome {
        let before_phase = self.engine.phase();
        let before_poll = self.engine.poll().cloned();
        let before_error = self.engine.error().map(str::to_string);
        let before_history = self.engine.history().len();
        let was_kicked = self.engine.is_kicked();

        let mut requests = self.engine.apply(event, now_ms);

        let after_id = self.engine.poll().map(|p| p.id.clone());
        let poll_changed = match (&before_poll, &after_id) {
            (Some(before), Some(after)) => &before.id != after,
            (None, Some(_)) => true,
            _ => false,
        };
        if poll_changed {
            let id = after_id.expect("poll id present when changed");
            requests.extend(self.sync.on_poll_changed(&id));
        }
        if self.engine.is_kicked() && !was_kicked {
            // Kicked: leave the poll room; the view is a dead-end notice.
            requests.extend(self.sync.teardown());
        }

        let refresh = Refresh {
            poll: before_phase != self.engine.phase()
                || before_poll.as_ref() != self.engine.poll()
                || before_error.as_deref() != self.engine.error(),
            history: before_history != self.engine.history().len(),
            ..Refresh::default()
        };
        EventOutcome { requests, refresh, poll_changed }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// A parsed stdin command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `vote <n>`: cast a vote for option n (1-based).
    Vote(usize),
    /// `say <text>`: send a chat message.
    Say(String),
    /// `ask <secs> <question> | <option> | <option> ...`: create a poll.
    Ask { time_limit: u64, question: String, options: Vec<String> },
    /// `kick <socket-id>`: remove a participant (presenter).
    Kick(String),
    History,
    Who,
    Chat,
    Dismiss,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

/// Parse one stdin line.
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    match word {
        "vote" => match rest.parse::<usize>() {
            Ok(n) if n >= 1 => Command::Vote(n - 1),
            _ => Command::Unknown(line.to_string()),
        },
        "say" if !rest.is_empty() => Command::Say(rest.to_string()),
        "ask" => {
            let (secs, body) = match rest.split_once(char::is_whitespace) {
                Some((secs, body)) => (secs, body),
                None => return Command::Unknown(line.to_string()),
            };
            let Ok(time_limit) = secs.parse::<u64>() else {
                return Command::Unknown(line.to_string());
            };
            let mut parts = body.split('|').map(str::trim);
            let question = parts.next().unwrap_or("").to_string();
            let options: Vec<String> =
                parts.filter(|p| !p.is_empty()).map(str::to_string).collect();
            Command::Ask { time_limit, question, options }
        }
        "kick" if !rest.is_empty() => Command::Kick(rest.to_string()),
        "history" => Command::History,
        "who" => Command::Who,
        "chat" => Command::Chat,
        "dismiss" => Command::Dismiss,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

/// Connect and run until the connection drops or the user quits.
pub async fn run(config: ClientConfig) -> Result<(), PollError> {
    let mut durable = FileStore::open(&config.profile_path)?;
    let mut tab = MemoryStore::new();
    let identity = SessionIdentity::load_or_create(
        config.role,
        &mut durable,
        &mut tab,
        config.name.as_deref(),
    )?;

    print_banner(&config, &identity);

    let mut transport = Transport::connect(&config.backend_url).await?;
    let mut client = PollClient::new(identity);
    transport.send_all(client.engine.startup_requests())?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut tick = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            maybe_event = transport.events.recv() => {
                let Some(event) = maybe_event else {
                    println!("{}", "Connection to the poll service closed.".bright_red());
                    break;
                };
                debug!(?event, "inbound event");
                let outcome = client.handle_event(event, now_ms());
                transport.send_all(outcome.requests)?;
                if outcome.poll_changed {
                    tick.reset();
                }
                render_outcome(&client, outcome.refresh);
                if client.engine.is_kicked() {
                    break;
                }
            }

            // The guard stops the cadence once expiry has fired; adopting
            // a poll re-arms it.
            _ = tick.tick(), if client.engine.timer_running() => {
                let now = now_ms();
                if let Some(reading) = client.engine.on_tick(now) {
                    if reading.expired_now {
                        println!("{}", "Time is up.".bright_yellow());
                        render_poll(&client.engine, now);
                    } else {
                        print_timer_line(reading.remaining);
                    }
                }
            }

            maybe_line = lines.next_line() => {
                let Ok(Some(line)) = maybe_line else { break };
                if !handle_command(&mut client, &transport, &line)? {
                    break;
                }
            }
        }
    }

    // Best-effort: the socket may already be gone.
    let _ = transport.send_all(client.sync.teardown());
    Ok(())
}

/// Returns false when the user asked to quit.
fn handle_command(
    client: &mut PollClient,
    transport: &Transport,
    line: &str,
) -> Result<bool, PollError> {
    let now = now_ms();
    match parse_command(line) {
        Command::Vote(index) => match client.engine.submit_vote(index, now) {
            Some(request) => {
                transport.send(request)?;
                // Optimistic: the local bar moves before any ack.
                render_poll(&client.engine, now);
            }
            None => match client.engine.error() {
                Some(error) => println!("{}", error.bright_red()),
                None => println!("{}", "Voting is not open.".bright_yellow()),
            },
        },

        Command::Say(text) => {
            match client.sync.send_message(&text, client.engine.identity(), now) {
                Ok(request) => transport.send(request)?,
                Err(SendRejection::Empty) => {}
                Err(SendRejection::TooSoon) => {
                    println!("{}", "Hold on, a message just went out.".bright_yellow());
                }
            }
        }

        Command::Ask { time_limit, question, options } => {
            match client.engine.create_poll(&question, &options, time_limit) {
                Some(request) => {
                    transport.send(request)?;
                    println!("{}", "Poll submitted…".bright_green());
                }
                None => {
                    if let Some(error) = client.engine.error() {
                        println!("{}", error.bright_red());
                    }
                }
            }
        }

        Command::Kick(socket_id) => {
            match client.sync.kick_request(client.engine.identity(), &socket_id) {
                Some(request) => transport.send(request)?,
                None => println!("{}", "Kicking is a presenter action.".bright_yellow()),
            }
        }

        Command::History => transport.send(ClientRequest::GetPollHistory)?,
        Command::Who => render_roster(&client.sync),
        Command::Chat => render_chat(&client.sync),
        Command::Dismiss => client.engine.dismiss_error(),
        Command::Help => print_help(),
        Command::Quit => return Ok(false),
        Command::Empty => {}
        Command::Unknown(line) => {
            println!("{} {line}", "Unrecognized command:".bright_red());
            print_help();
        }
    }
    Ok(true)
}

// ---------------------------------------------------------------------------
// Rendering (reads snapshots only)
// ---------------------------------------------------------------------------

fn render_outcome(client: &PollClient, refresh: Refresh) {
    if refresh.poll {
        render_poll(&client.engine, now_ms());
    }
    if refresh.roster {
        render_roster(&client.sync);
    }
    if refresh.chat {
        render_chat(&client.sync);
    }
    if refresh.history {
        render_history(client.engine.history());
    }
}

fn print_banner(config: &ClientConfig, identity: &SessionIdentity) {
    println!("{}", "POLLPULSE".bright_cyan().bold());
    println!(
        "{}: {:?}   {}: {}   {}: {}",
        "Role".bright_yellow(),
        identity.role(),
        "Name".bright_yellow(),
        identity.display_name(),
        "Service".bright_yellow(),
        config.backend_url,
    );
    println!("{}", "=".repeat(50).bright_blue());
    print_help();
}

fn print_help() {
    println!("{}", "Commands:".bright_white());
    println!("  vote <n>                         cast a vote for option n");
    println!("  say <text>                       send a chat message");
    println!("  ask <secs> <question> | <a> | <b>   create a poll (presenter)");
    println!("  kick <socket-id>                 remove a participant (presenter)");
    println!("  who | chat | history | dismiss | quit");
}

fn print_timer_line(remaining: u64) {
    println!("{} {}", "⏱".bright_white(), format_clock(remaining).bright_white().bold());
}

fn render_poll(engine: &PollEngine, now_ms: u64) {
    match engine.phase() {
        PollPhase::Idle => {
            println!("{}", "Waiting for a question…".bright_white());
            return;
        }
        PollPhase::Kicked => {
            println!("{}", "You've been kicked out!".bright_red().bold());
            println!("The presenter removed you from the poll. Try again some other time.");
            return;
        }
        PollPhase::Active | PollPhase::Locked | PollPhase::Resulted => {}
    }

    let Some(poll) = engine.poll() else { return };
    println!();
    println!("{}", poll.question.bright_white().bold());

    let show_results = engine.phase() != PollPhase::Active;
    let percentages = engine.percentages();
    for (index, option) in poll.options.iter().enumerate() {
        if show_results {
            let pct = percentages.get(index).copied().unwrap_or(0);
            let filled = usize::from(pct) / 5;
            println!(
                "  {} {:<24} {}{} {:>3}%",
                format!("{}.", index + 1).bright_yellow(),
                option,
                "█".repeat(filled).bright_cyan(),
                "░".repeat(20 - filled).bright_black(),
                pct,
            );
        } else {
            println!("  {} {}", format!("{}.", index + 1).bright_yellow(), option);
        }
    }

    match engine.phase() {
        PollPhase::Active => print_timer_line(engine.remaining(now_ms)),
        PollPhase::Locked => println!("{}", "Time is up. Results shown.".bright_yellow()),
        PollPhase::Resulted => {
            println!("{}", "Waiting for the next question…".bright_white())
        }
        _ => {}
    }
    if let Some(error) = engine.error() {
        println!("{} {}", "!".bright_red().bold(), error.bright_red());
    }
}

fn render_roster(sync: &PresenceChatSync) {
    println!("{}", "Participants:".bright_white().bold());
    if sync.roster().is_empty() {
        println!("  (nobody here yet)");
        return;
    }
    for entry in sync.roster() {
        println!("  {}  {}", entry.display_name.bright_cyan(), entry.socket_id.bright_black());
    }
}

fn render_chat(sync: &PresenceChatSync) {
    println!("{}", "Chat:".bright_white().bold());
    for message in sync.transcript() {
        println!("  {}: {}", message.user_name.bright_cyan(), message.message);
    }
}

fn render_history(history: &[Poll]) {
    println!("{}", "Poll history:".bright_white().bold());
    for (index, poll) in history.iter().enumerate() {
        println!("{} {}", format!("Question {}", index + 1).bright_yellow(), poll.question);
        let percentages = crate::results::percentages_for(&poll.votes, &poll.options);
        for (option, pct) in poll.options.iter().zip(&percentages) {
            println!("  {:<24} {:>3}%", option, pct);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{MemoryStore, Role};
    use crate::model::{ChatMessage, Participant};

    const T: u64 = 1_700_000_000_000;

    fn make_client(role: Role) -> PollClient {
        let mut durable = MemoryStore::new();
        let mut tab = MemoryStore::new();
        let identity =
            SessionIdentity::load_or_create(role, &mut durable, &mut tab, Some("Ana"))
                .expect("identity");
        PollClient::new(identity)
    }

    fn make_poll(id: &str) -> Poll {
        Poll {
            id: id.to_string(),
            question: "q".to_string(),
            options: vec!["A".to_string(), "B".to_string()],
            votes: Vec::new(),
            start_time: T,
            time_limit: 30,
            is_active: true,
        }
    }

    // -- command parsing --

    #[test]
    fn test_parse_vote() {
        assert_eq!(parse_command("vote 1"), Command::Vote(0));
        assert_eq!(parse_command("  vote 3  "), Command::Vote(2));
    }

    #[test]
    fn test_parse_vote_rejects_zero_and_garbage() {
        assert!(matches!(parse_command("vote 0"), Command::Unknown(_)));
        assert!(matches!(parse_command("vote x"), Command::Unknown(_)));
        assert!(matches!(parse_command("vote"), Command::Unknown(_)));
    }

    #[test]
    fn test_parse_say() {
        assert_eq!(parse_command("say hello there"), Command::Say("hello there".into()));
    }

    #[test]
    fn test_parse_ask() {
        let command = parse_command("ask 30 Capital of France? | Paris | London");
        assert_eq!(
            command,
            Command::Ask {
                time_limit: 30,
                question: "Capital of France?".into(),
                options: vec!["Paris".into(), "London".into()],
            }
        );
    }

    #[test]
    fn test_parse_ask_requires_limit() {
        assert!(matches!(parse_command("ask question | a | b"), Command::Unknown(_)));
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_command("who"), Command::Who);
        assert_eq!(parse_command("chat"), Command::Chat);
        assert_eq!(parse_command("history"), Command::History);
        assert_eq!(parse_command("dismiss"), Command::Dismiss);
        assert_eq!(parse_command("quit"), Command::Quit);
        assert_eq!(parse_command("exit"), Command::Quit);
        assert_eq!(parse_command(""), Command::Empty);
        assert_eq!(parse_command("kick s1"), Command::Kick("s1".into()));
    }

    // -- event routing --

    #[test]
    fn test_roster_noop_reports_no_refresh() {
        let mut client = make_client(Role::Student);
        let snapshot = vec![Participant { socket_id: "s1".into(), user_name: "Ana".into() }];

        let first =
            client.handle_event(ServerEvent::ParticipantsUpdated(snapshot.clone()), T);
        assert!(first.refresh.roster);

        let second = client.handle_event(ServerEvent::ParticipantsUpdated(snapshot), T);
        assert_eq!(second.refresh, Refresh::default());
    }

    #[test]
    fn test_duplicate_chat_reports_no_refresh() {
        let mut client = make_client(Role::Student);
        let message = ChatMessage { user_name: "Ana".into(), message: "hi".into(), timestamp: T };

        assert!(client.handle_event(ServerEvent::ChatMessage(message.clone()), T).refresh.chat);
        assert!(!client.handle_event(ServerEvent::ChatMessage(message), T).refresh.chat);
    }

    #[test]
    fn test_poll_adoption_joins_room_and_flags_change() {
        let mut client = make_client(Role::Student);
        let outcome = client.handle_event(ServerEvent::NewPoll(make_poll("p1")), T);

        assert!(outcome.poll_changed);
        assert!(outcome.refresh.poll);
        assert!(outcome
            .requests
            .iter()
            .any(|r| matches!(r, ClientRequest::JoinPollRoom { poll_id, .. } if poll_id == "p1")));
        // First poll also triggers the one-time transcript fetch.
        assert!(outcome
            .requests
            .iter()
            .any(|r| matches!(r, ClientRequest::GetChatMessages { poll_id } if poll_id == "global")));
    }

    #[test]
    fn test_poll_switch_leaves_previous_room() {
        let mut client = make_client(Role::Student);
        let _ = client.handle_event(ServerEvent::NewPoll(make_poll("p1")), T);
        let outcome = client.handle_event(ServerEvent::NewPoll(make_poll("p2")), T);

        assert!(outcome
            .requests
            .iter()
            .any(|r| matches!(r, ClientRequest::LeavePollRoom { poll_id } if poll_id == "p1")));
        // Transcript fetch must not repeat.
        assert!(!outcome
            .requests
            .iter()
            .any(|r| matches!(r, ClientRequest::GetChatMessages { .. })));
    }

    #[test]
    fn test_stale_poll_update_reports_no_refresh() {
        let mut client = make_client(Role::Student);
        let _ = client.handle_event(ServerEvent::NewPoll(make_poll("p2")), T);
        let outcome = client.handle_event(ServerEvent::PollUpdated(make_poll("p1")), T);

        assert!(!outcome.refresh.poll);
        assert!(!outcome.poll_changed);
        assert!(outcome.requests.is_empty());
    }

    #[test]
    fn test_kick_tears_down_presence_room() {
        let mut client = make_client(Role::Student);
        let _ = client.handle_event(ServerEvent::Connected { socket_id: "me".into() }, T);
        let _ = client.handle_event(ServerEvent::NewPoll(make_poll("p1")), T);

        let outcome = client.handle_event(ServerEvent::UserKicked { socket_id: "me".into() }, T);
        assert!(client.engine.is_kicked());
        assert!(outcome
            .requests
            .iter()
            .any(|r| matches!(r, ClientRequest::LeavePollRoom { poll_id } if poll_id == "p1")));
    }

    #[test]
    fn test_history_refresh_flag() {
        let mut client = make_client(Role::Presenter);
        let outcome =
            client.handle_event(ServerEvent::PollHistory(vec![make_poll("old")]), T);
        assert!(outcome.refresh.history);
        assert!(!outcome.refresh.poll);
    }
}
