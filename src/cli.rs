use std::path::PathBuf;

use clap::Parser;

use crate::identity::Role;

#[derive(Parser)]
#[command(name = "pollpulse")]
#[command(version = "1.3.0")]
#[command(about = "Real-time classroom polling client with live results, presence, and chat")]
pub struct Args {
    /// Role to register as: presenter or student
    #[arg(long, value_enum)]
    pub role: Option<Role>,

    /// Display name (persisted for later sessions)
    #[arg(long)]
    pub name: Option<String>,

    /// Poll service WebSocket URL
    #[arg(long)]
    pub url: Option<String>,

    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the durable profile store (display names)
    #[arg(long)]
    pub profile: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_minimal() {
        let args = Args::parse_from(["pollpulse"]);
        assert!(args.role.is_none());
        assert!(args.name.is_none());
        assert!(args.url.is_none());
        assert!(args.config.is_none());
        assert!(args.profile.is_none());
    }

    #[test]
    fn test_args_parse_full() {
        let args = Args::parse_from([
            "pollpulse",
            "--role",
            "presenter",
            "--name",
            "Prof",
            "--url",
            "ws://example.test:5000/ws",
            "--config",
            "conf.toml",
            "--profile",
            "profile.toml",
        ]);
        assert_eq!(args.role, Some(Role::Presenter));
        assert_eq!(args.name.as_deref(), Some("Prof"));
        assert_eq!(args.url.as_deref(), Some("ws://example.test:5000/ws"));
        assert_eq!(args.config, Some(PathBuf::from("conf.toml")));
        assert_eq!(args.profile, Some(PathBuf::from("profile.toml")));
    }

    #[test]
    fn test_args_parse_role_student() {
        let args = Args::parse_from(["pollpulse", "--role", "student"]);
        assert_eq!(args.role, Some(Role::Student));
    }

    #[test]
    fn test_args_parse_bad_role_rejected() {
        assert!(Args::try_parse_from(["pollpulse", "--role", "janitor"]).is_err());
    }
}
