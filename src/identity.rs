//! Session identity: who this tab is.
//!
//! ## Design
//! - The base display name is user-chosen and lives in a durable store
//!   shared by every tab (the browser-profile analogue).
//! - The session token is generated once per tab and lives only in a
//!   tab-scoped store, so two tabs sharing a base name never collide.
//! - Students message the service as `base-suffix`; the presenter as the
//!   plain base name. Everything rendered to a human uses the stripped
//!   base name, and the same stripping rule runs wherever a name appears
//!   (roster, chat authorship) so every viewer sees the same label.
//!
//! Storage is an injected capability, not ambient global access: callers
//! hand in two [`KeyValueStore`] implementations.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::PollError;
use crate::now_ms;

/// Durable-store key for the student's chosen base name.
pub const STUDENT_NAME_KEY: &str = "student_name";
/// Durable-store key for the presenter's chosen base name.
pub const PRESENTER_NAME_KEY: &str = "presenter_name";
/// Tab-store key for the per-tab session token.
pub const SESSION_TOKEN_KEY: &str = "session_token";

const SUFFIX_LEN: usize = 6;
const TOKEN_RAND_LEN: usize = 9;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Which side of the classroom this session is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Presenter,
    Student,
}

impl Role {
    /// Role name as the service expects it in `select-roles`.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Role::Presenter => "teacher",
            Role::Student => "student",
        }
    }

    fn name_key(&self) -> &'static str {
        match self {
            Role::Presenter => PRESENTER_NAME_KEY,
            Role::Student => STUDENT_NAME_KEY,
        }
    }

    fn default_base_name(&self) -> &'static str {
        match self {
            Role::Presenter => "Presenter",
            Role::Student => "Student",
        }
    }
}

// ---------------------------------------------------------------------------
// Storage capability
// ---------------------------------------------------------------------------

/// Narrow read/write capability over a string key-value store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), PollError>;
}

/// In-memory store with process lifetime (the per-tab analogue).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PollError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// TOML-file-backed store (the durable browser-profile analogue).
///
/// The whole file is rewritten on every `set`; entries are a flat string
/// map, so the format stays hand-editable.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`, loading existing entries if the file is
    /// present. A missing file is an empty store, not an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PollError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(body) => toml::from_str(&body)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path, entries })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PollError> {
        self.entries.insert(key.to_string(), value.to_string());
        let body = toml::to_string(&self.entries)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, body)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session token
// ---------------------------------------------------------------------------

/// Generate a fresh per-tab session token: `session-<millis>-<random>`.
fn generate_session_token() -> String {
    use rand::Rng;
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let tail: String = (0..TOKEN_RAND_LEN)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect();
    format!("session-{}-{}", now_ms(), tail)
}

// ---------------------------------------------------------------------------
// Name stripping
// ---------------------------------------------------------------------------

/// Strip a trailing session suffix from a display name, if one is present.
///
/// A name carries a suffix iff it contains `-` and the final
/// hyphen-delimited segment is 1–6 alphanumeric characters. Exactly that
/// trailing segment is removed; anything else is returned unchanged. The
/// same rule runs for roster entries and chat authors so the presenter and
/// students see identical labels.
pub fn strip_session_suffix(name: &str) -> String {
    if let Some(idx) = name.rfind('-') {
        let tail = &name[idx + 1..];
        if !tail.is_empty()
            && tail.len() <= SUFFIX_LEN
            && tail.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return name[..idx].to_string();
        }
    }
    name.to_string()
}

// ---------------------------------------------------------------------------
// SessionIdentity
// ---------------------------------------------------------------------------

/// The resolved identity for this tab.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    base_name: String,
    session_token: String,
    session_suffix: String,
    role: Role,
}

impl SessionIdentity {
    /// Resolve the identity for `role`, creating and persisting whatever is
    /// missing.
    ///
    /// The session token is reused from the tab store when present and
    /// generated (and stored) otherwise. The base name comes from
    /// `preferred_name` when given (and is written back to the durable
    /// store), else from the durable store, else from a role default.
    pub fn load_or_create(
        role: Role,
        durable: &mut dyn KeyValueStore,
        tab: &mut dyn KeyValueStore,
        preferred_name: Option<&str>,
    ) -> Result<Self, PollError> {
        let session_token = match tab.get(SESSION_TOKEN_KEY) {
            Some(token) => token,
            None => {
                let token = generate_session_token();
                tab.set(SESSION_TOKEN_KEY, &token)?;
                token
            }
        };
        let session_suffix = session_token
            .chars()
            .rev()
            .take(SUFFIX_LEN)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<String>();

        let base_name = match preferred_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => {
                let name = strip_session_suffix(name);
                durable.set(role.name_key(), &name)?;
                name
            }
            None => match durable.get(role.name_key()) {
                Some(stored) => stored,
                None => {
                    let name = role.default_base_name().to_string();
                    durable.set(role.name_key(), &name)?;
                    name
                }
            },
        };

        Ok(Self { base_name, session_token, session_suffix, role })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The stable per-tab participant id used to key votes.
    pub fn user_id(&self) -> &str {
        &self.session_token
    }

    /// Name used when messaging the service. Students carry the session
    /// suffix so concurrent tabs with the same base name stay distinct;
    /// the presenter does not.
    pub fn transport_name(&self) -> String {
        match self.role {
            Role::Student => format!("{}-{}", self.base_name, self.session_suffix),
            Role::Presenter => self.base_name.clone(),
        }
    }

    /// Name rendered to humans: always the suffix-free base name.
    pub fn display_name(&self) -> &str {
        &self.base_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_identity(role: Role, preferred: Option<&str>) -> SessionIdentity {
        let mut durable = MemoryStore::new();
        let mut tab = MemoryStore::new();
        SessionIdentity::load_or_create(role, &mut durable, &mut tab, preferred).expect("identity")
    }

    // -- token generation --

    #[test]
    fn test_session_token_shape() {
        let token = generate_session_token();
        assert!(token.starts_with("session-"));
        let tail = token.rsplit('-').next().expect("tail");
        assert_eq!(tail.len(), TOKEN_RAND_LEN);
        assert!(tail.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_session_token_reused_within_tab() {
        let mut durable = MemoryStore::new();
        let mut tab = MemoryStore::new();
        let a = SessionIdentity::load_or_create(Role::Student, &mut durable, &mut tab, None)
            .expect("identity");
        let b = SessionIdentity::load_or_create(Role::Student, &mut durable, &mut tab, None)
            .expect("identity");
        assert_eq!(a.user_id(), b.user_id());
    }

    #[test]
    fn test_session_tokens_differ_across_tabs() {
        let mut durable = MemoryStore::new();
        let mut tab_a = MemoryStore::new();
        let mut tab_b = MemoryStore::new();
        let a = SessionIdentity::load_or_create(Role::Student, &mut durable, &mut tab_a, None)
            .expect("identity");
        let b = SessionIdentity::load_or_create(Role::Student, &mut durable, &mut tab_b, None)
            .expect("identity");
        assert_ne!(a.user_id(), b.user_id());
    }

    // -- name resolution --

    #[test]
    fn test_preferred_name_wins_and_persists() {
        let mut durable = MemoryStore::new();
        let mut tab = MemoryStore::new();
        let id = SessionIdentity::load_or_create(
            Role::Student,
            &mut durable,
            &mut tab,
            Some("Ana"),
        )
        .expect("identity");
        assert_eq!(id.display_name(), "Ana");
        assert_eq!(durable.get(STUDENT_NAME_KEY).as_deref(), Some("Ana"));
    }

    #[test]
    fn test_stored_name_reused_across_tabs() {
        let mut durable = MemoryStore::new();
        let mut tab_a = MemoryStore::new();
        let _ = SessionIdentity::load_or_create(
            Role::Student,
            &mut durable,
            &mut tab_a,
            Some("Ana"),
        )
        .expect("identity");

        let mut tab_b = MemoryStore::new();
        let second =
            SessionIdentity::load_or_create(Role::Student, &mut durable, &mut tab_b, None)
                .expect("identity");
        assert_eq!(second.display_name(), "Ana");
    }

    #[test]
    fn test_default_names_per_role() {
        assert_eq!(make_identity(Role::Student, None).display_name(), "Student");
        assert_eq!(make_identity(Role::Presenter, None).display_name(), "Presenter");
    }

    #[test]
    fn test_preferred_name_with_suffix_is_stored_stripped() {
        let id = make_identity(Role::Student, Some("Ana-x1y2z3"));
        assert_eq!(id.display_name(), "Ana");
    }

    // -- projections --

    #[test]
    fn test_student_transport_name_carries_suffix() {
        let id = make_identity(Role::Student, Some("Ana"));
        let transport = id.transport_name();
        assert!(transport.starts_with("Ana-"));
        assert_eq!(strip_session_suffix(&transport), "Ana");
    }

    #[test]
    fn test_presenter_transport_name_is_plain() {
        let id = make_identity(Role::Presenter, Some("Prof"));
        assert_eq!(id.transport_name(), "Prof");
    }

    #[test]
    fn test_suffix_is_token_tail() {
        let id = make_identity(Role::Student, None);
        let suffix = id.transport_name();
        let suffix = suffix.rsplit('-').next().expect("suffix");
        assert!(id.user_id().ends_with(suffix));
        assert_eq!(suffix.len(), SUFFIX_LEN);
    }

    // -- stripping --

    #[test]
    fn test_strip_removes_short_alphanumeric_tail() {
        assert_eq!(strip_session_suffix("Ana-x1y2z3"), "Ana");
        assert_eq!(strip_session_suffix("Student-9ab"), "Student");
    }

    #[test]
    fn test_strip_no_dash_is_noop() {
        assert_eq!(strip_session_suffix("Ana"), "Ana");
    }

    #[test]
    fn test_strip_long_tail_is_noop() {
        assert_eq!(strip_session_suffix("Ana-Charlotte"), "Ana-Charlotte");
    }

    #[test]
    fn test_strip_non_alphanumeric_tail_is_noop() {
        assert_eq!(strip_session_suffix("Ana-x_1"), "Ana-x_1");
        assert_eq!(strip_session_suffix("Ana-"), "Ana-");
    }

    #[test]
    fn test_strip_is_idempotent() {
        let once = strip_session_suffix("Ana-x1y2z3");
        assert_eq!(strip_session_suffix(&once), once);
    }

    #[test]
    fn test_strip_only_removes_final_segment() {
        assert_eq!(strip_session_suffix("Ana-Maria-x1y2z3"), "Ana-Maria");
    }

    // -- role wire names --

    #[test]
    fn test_role_wire_names() {
        assert_eq!(Role::Presenter.wire_name(), "teacher");
        assert_eq!(Role::Student.wire_name(), "student");
    }

    // -- file store --

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("profile.toml");

        let mut store = FileStore::open(&path).expect("open");
        store.set(STUDENT_NAME_KEY, "Ana").expect("set");

        let reopened = FileStore::open(&path).expect("reopen");
        assert_eq!(reopened.get(STUDENT_NAME_KEY).as_deref(), Some("Ana"));
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path().join("absent.toml")).expect("open");
        assert!(store.get(STUDENT_NAME_KEY).is_none());
    }

    #[test]
    fn test_file_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/dir/profile.toml");
        let mut store = FileStore::open(&path).expect("open");
        store.set(PRESENTER_NAME_KEY, "Prof").expect("set");
        assert!(path.exists());
    }
}
