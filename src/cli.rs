//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Token validation and authorization gate for cluster management
#[derive(Parser, Debug)]
#[command(name = "clustergate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "CLUSTERGATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "CLUSTERGATE_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "CLUSTERGATE_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "CLUSTERGATE_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "CLUSTERGATE_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the gate server (default)
    Serve,

    /// Validate a token once against the configured cluster
    Check {
        /// Bearer token to validate
        #[arg(long, env = "CLUSTERGATE_CHECK_TOKEN")]
        token: String,

        /// Also ask whether the token may perform this verb
        #[arg(long, requires = "resource")]
        verb: Option<String>,

        /// Resource type for the authorization check
        #[arg(long, requires = "verb")]
        resource: Option<String>,

        /// Namespace for the authorization check (empty = cluster scope)
        #[arg(short, long, default_value = "")]
        namespace: String,

        /// API group for the authorization check
        #[arg(long, default_value = "")]
        group: String,

        /// Resource name for the authorization check (empty = any)
        #[arg(long, default_value = "")]
        name: String,
    },

    /// Print the effective configuration as YAML
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_server_mode() {
        let cli = Cli::try_parse_from(["clustergate"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn parses_check_with_action() {
        let cli = Cli::try_parse_from([
            "clustergate",
            "check",
            "--token",
            "tok",
            "--verb",
            "get",
            "--resource",
            "pods",
            "-n",
            "team-a",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Check {
                token,
                verb,
                resource,
                namespace,
                group,
                name,
            }) => {
                assert_eq!(token, "tok");
                assert_eq!(verb.as_deref(), Some("get"));
                assert_eq!(resource.as_deref(), Some("pods"));
                assert_eq!(namespace, "team-a");
                assert!(group.is_empty());
                assert!(name.is_empty());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn verb_requires_resource() {
        let result = Cli::try_parse_from(["clustergate", "check", "--token", "tok", "--verb", "get"]);
        assert!(result.is_err());
    }
}
