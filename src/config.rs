//! Client configuration.
//!
//! Settings resolve with the usual precedence: CLI flag, then environment
//! variable, then TOML config file, then built-in default. The profile
//! path is where the durable name store lives (`identity::FileStore`).

use std::env;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::cli::Args;
use crate::error::PollError;
use crate::identity::Role;

pub const DEFAULT_BACKEND_URL: &str = "ws://localhost:5000/ws";

pub const BACKEND_URL_ENV: &str = "POLLPULSE_URL";
pub const NAME_ENV: &str = "POLLPULSE_NAME";
pub const PROFILE_ENV: &str = "POLLPULSE_PROFILE";

/// Optional settings read from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub url: Option<String>,
    pub role: Option<Role>,
    pub name: Option<String>,
    pub profile: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &std::path::Path) -> Result<Self, PollError> {
        let body = fs::read_to_string(path)?;
        Ok(toml::from_str(&body)?)
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub backend_url: String,
    pub role: Role,
    pub name: Option<String>,
    pub profile_path: PathBuf,
}

impl ClientConfig {
    /// Resolve configuration from CLI args, environment, and (when given)
    /// a config file.
    pub fn resolve(args: &Args) -> Result<Self, PollError> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Ok(Self::merge(args, file, |key| env::var(key).ok()))
    }

    /// Pure merge step, with the environment injected for testability.
    fn merge(args: &Args, file: FileConfig, env_var: impl Fn(&str) -> Option<String>) -> Self {
        let backend_url = args
            .url
            .clone()
            .or_else(|| env_var(BACKEND_URL_ENV))
            .or(file.url)
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let role = args.role.or(file.role).unwrap_or(Role::Student);

        let name = args
            .name
            .clone()
            .or_else(|| env_var(NAME_ENV))
            .or(file.name)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let profile_path = args
            .profile
            .clone()
            .or_else(|| env_var(PROFILE_ENV).map(PathBuf::from))
            .or(file.profile)
            .unwrap_or_else(default_profile_path);

        Self { backend_url, role, name, profile_path }
    }
}

fn default_profile_path() -> PathBuf {
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".config/pollpulse/profile.toml"),
        None => PathBuf::from("pollpulse-profile.toml"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn bare_args() -> Args {
        Args::parse_from(["pollpulse"])
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::merge(&bare_args(), FileConfig::default(), no_env);
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
        assert_eq!(config.role, Role::Student);
        assert!(config.name.is_none());
    }

    #[test]
    fn test_file_values_apply() {
        let file = FileConfig {
            url: Some("ws://file.test/ws".into()),
            role: Some(Role::Presenter),
            name: Some("Prof".into()),
            profile: Some(PathBuf::from("/tmp/p.toml")),
        };
        let config = ClientConfig::merge(&bare_args(), file, no_env);
        assert_eq!(config.backend_url, "ws://file.test/ws");
        assert_eq!(config.role, Role::Presenter);
        assert_eq!(config.name.as_deref(), Some("Prof"));
        assert_eq!(config.profile_path, PathBuf::from("/tmp/p.toml"));
    }

    #[test]
    fn test_env_beats_file() {
        let file = FileConfig { url: Some("ws://file.test/ws".into()), ..Default::default() };
        let config = ClientConfig::merge(&bare_args(), file, |key| {
            (key == BACKEND_URL_ENV).then(|| "ws://env.test/ws".to_string())
        });
        assert_eq!(config.backend_url, "ws://env.test/ws");
    }

    #[test]
    fn test_cli_beats_env_and_file() {
        let args = Args::parse_from(["pollpulse", "--url", "ws://cli.test/ws"]);
        let file = FileConfig { url: Some("ws://file.test/ws".into()), ..Default::default() };
        let config = ClientConfig::merge(&args, file, |key| {
            (key == BACKEND_URL_ENV).then(|| "ws://env.test/ws".to_string())
        });
        assert_eq!(config.backend_url, "ws://cli.test/ws");
    }

    #[test]
    fn test_blank_name_treated_as_absent() {
        let args = Args::parse_from(["pollpulse", "--name", "   "]);
        let config = ClientConfig::merge(&args, FileConfig::default(), no_env);
        assert!(config.name.is_none());
    }

    #[test]
    fn test_file_config_parses() {
        let file: FileConfig = toml::from_str(
            r#"
            url = "ws://host:5000/ws"
            role = "presenter"
            name = "Prof"
            "#,
        )
        .expect("parse");
        assert_eq!(file.role, Some(Role::Presenter));
        assert_eq!(file.url.as_deref(), Some("ws://host:5000/ws"));
    }

    #[test]
    fn test_file_config_load_missing_file_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = FileConfig::load(&dir.path().join("absent.toml"));
        assert!(result.is_err());
    }
}
