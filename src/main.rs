//! Cluster Gate - token validation and authorization for cluster management

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing::{error, info};

use clustergate::{
    cli::{Cli, Command},
    cluster::KubeCluster,
    config::Config,
    gate::{ActionDescriptor, AuthGate, RequestContext},
    server::Server,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(ref host) = cli.host {
                config.server.host = host.clone();
            }
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Some(Command::Check {
            token,
            verb,
            resource,
            namespace,
            group,
            name,
        }) => {
            let action = verb
                .zip(resource)
                .map(|(verb, resource)| ActionDescriptor::new(namespace, verb, group, resource, name));
            match run_check(&config, &token, action.as_ref()).await {
                Ok(report) => {
                    println!("{report}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Check failed: {e:#}");
                    ExitCode::FAILURE
                }
            }
        }
        Some(Command::Config) => match serde_yaml::to_string(&config) {
            Ok(yaml) => {
                print!("{yaml}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to render configuration: {e}");
                ExitCode::FAILURE
            }
        },
        Some(Command::Serve) | None => run_server(config).await,
    }
}

/// Validate `token` once, and optionally authorize `action`, printing JSON
async fn run_check(
    config: &Config,
    token: &str,
    action: Option<&ActionDescriptor>,
) -> anyhow::Result<String> {
    let cluster = KubeCluster::from_config(&config.cluster).context("building cluster client")?;
    let gate = AuthGate::with_config(Arc::new(cluster.clone()), Arc::new(cluster), config);
    let ctx = RequestContext::new().with_token(token);

    let info = gate
        .validate_token(Some(&ctx))
        .await
        .context("validating token")?;
    let mut report = json!({ "valid": true, "domain": info.domain });

    if let Some(action) = action {
        match gate.authorize_action(Some(&ctx), action).await {
            Ok(verdict) => report["authorized"] = json!(verdict.allowed),
            Err(e) => {
                report["authorized"] = json!(false);
                report["error"] = json!({ "code": e.code().as_str(), "message": e.to_string() });
            }
        }
    }

    Ok(serde_json::to_string_pretty(&report)?)
}

/// Run the gate server
async fn run_server(config: Config) -> ExitCode {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        "Starting cluster gate"
    );

    let server = match Server::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create server: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Gate shutdown complete");
    ExitCode::SUCCESS
}
