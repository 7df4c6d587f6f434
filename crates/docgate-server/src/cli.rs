use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docgate_core::Grant;
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(name = "docgate-server", version)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Serve,
    Migrate,
    CreateUser {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        policy: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        department: String,
        /// `all`, `none`, or a JSON object such as `{"db":["coll"]}`.
        #[arg(long, value_parser = parse_grant)]
        read: Option<Grant>,
        #[arg(long, value_parser = parse_grant)]
        write: Option<Grant>,
    },
}

fn parse_grant(raw: &str) -> Result<Grant, String> {
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    serde_json::from_value(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn cli_parses_serve_subcommand() {
        let cli = Cli::parse_from(["docgate-server", "serve"]);
        assert!(matches!(cli.command, Some(Command::Serve)));
    }

    #[test]
    fn cli_defaults_to_no_subcommand() {
        let cli = Cli::parse_from(["docgate-server"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn cli_config_flag_works_after_subcommand() {
        let cli = Cli::parse_from(["docgate-server", "migrate", "--config", "/etc/docgate.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/docgate.toml")));
        assert!(matches!(cli.command, Some(Command::Migrate)));
    }

    #[test]
    fn cli_parses_create_user_with_grants() {
        let cli = Cli::parse_from([
            "docgate-server",
            "create-user",
            "--user-id",
            "sir",
            "--policy",
            "analyst",
            "--read",
            r#"{"NSE_DATA":["options"]}"#,
            "--write",
            "none",
        ]);
        let Some(Command::CreateUser {
            user_id,
            policy,
            name,
            read,
            write,
            ..
        }) = cli.command
        else {
            panic!("expected create-user");
        };
        assert_eq!(user_id, "sir");
        assert_eq!(policy, "analyst");
        assert_eq!(name, "");
        assert_eq!(read, Some(Grant::scoped([("NSE_DATA", ["options"])])));
        assert_eq!(write, Some(Grant::None));
    }

    #[test]
    fn cli_rejects_unparseable_grant() {
        let result = Cli::try_parse_from([
            "docgate-server",
            "create-user",
            "--user-id",
            "sir",
            "--policy",
            "analyst",
            "--read",
            "everything",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_version_flag() {
        let err = Cli::try_parse_from(["docgate-server", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
