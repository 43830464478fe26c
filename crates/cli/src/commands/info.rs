//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use contracts::BridgeBlueprint;
use dispatcher::api::CommandClient;
use dispatcher::{resolve_mission, SessionManager};

use crate::cli::InfoArgs;

/// Result of querying the command service
#[derive(Serialize)]
struct ProbeInfo {
    healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    health_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mission_id: Option<String>,
}

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    config: BridgeBlueprint,
    #[serde(skip_serializing_if = "Option::is_none")]
    probe: Option<ProbeInfo>,
}

/// Execute the `info` command
pub async fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let probe = if args.probe {
        Some(probe_command_service(&blueprint).await?)
    } else {
        None
    };

    let info = ConfigInfo {
        config: blueprint.redacted(),
        probe,
    };

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

async fn probe_command_service(blueprint: &BridgeBlueprint) -> Result<ProbeInfo> {
    let client = CommandClient::new(&blueprint.command).context("Failed to create command client")?;
    let session = SessionManager::new(client, &blueprint.command);

    let (healthy, health_error) = match session.health().await {
        Ok(status) => (status.is_healthy(), None),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (false, Some(e.to_string()))
        }
    };

    let mission = resolve_mission(&session, blueprint.command.mission_id).await;

    Ok(ProbeInfo {
        healthy,
        health_error,
        mission_id: mission.map(|m| m.to_string()),
    })
}

fn print_config_info(info: &ConfigInfo) {
    let config = &info.config;

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                Fusion Bridge Configuration                   ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Broker");
    println!("   ├─ Version: {:?}", config.version);
    println!("   ├─ Address: {}:{}", config.broker.host, config.broker.port);
    println!("   ├─ Client id: {}", config.broker.client_id);
    match &config.broker.username {
        Some(user) => println!("   ├─ User: {}", user),
        None => println!("   ├─ User: (anonymous)"),
    }
    println!("   └─ Keep-alive: {}s", config.broker.keep_alive_secs);

    println!("\nTopics");
    println!("   ├─ Data: {}", config.topics.data);
    println!("   └─ Control: {}", config.topics.control);

    println!("\nTranscription service");
    println!("   ├─ URL: {}", config.transcription.base_url);
    println!("   ├─ User: {}", config.transcription.username);
    println!("   └─ Password: {}", config.transcription.password);

    println!("\nCommand service");
    println!("   ├─ URL: {}", config.command.base_url);
    println!("   ├─ User: {}", config.command.username);
    println!(
        "   ├─ API key: {} = {}",
        config.command.api_key_header, config.command.api_key
    );
    println!(
        "   ├─ Token: {}s lifetime, renewed {}s early",
        config.command.token_ttl_secs, config.command.token_margin_secs
    );
    match config.command.mission_id {
        Some(mission) => println!("   └─ Mission: {}", mission),
        None => println!("   └─ Mission: (first listed)"),
    }

    println!("\nDispatch");
    println!(
        "   ├─ Shutdown timeout: {}s",
        config.dispatch.shutdown_timeout_secs
    );
    match &config.dispatch.evaluation_log {
        Some(path) => println!("   └─ Evaluation log: {}", path.display()),
        None => println!("   └─ Evaluation log: (disabled)"),
    }

    if let Some(probe) = &info.probe {
        println!("\nProbe");
        let health = if probe.healthy { "healthy" } else { "unhealthy" };
        match &probe.health_error {
            Some(error) => println!("   ├─ Health: {} ({})", health, error),
            None => println!("   ├─ Health: {}", health),
        }
        match &probe.mission_id {
            Some(mission) => println!("   └─ Resolved mission: {}", mission),
            None => println!("   └─ Resolved mission: (unresolved)"),
        }
    }

    println!();
}
