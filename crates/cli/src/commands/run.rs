//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use contracts::BridgeBlueprint;
use dispatcher::create_clients;
use ingestion::MqttTransport;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::Bridge;

/// Execute the `run` command
pub async fn run_bridge(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding broker host from CLI");
        blueprint.broker.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port = %port, "Overriding broker port from CLI");
        blueprint.broker.port = port;
    }
    config_loader::ConfigLoader::validate(&blueprint).context("Invalid configuration")?;

    info!(
        broker = %format!("{}:{}", blueprint.broker.host, blueprint.broker.port),
        data_topic = %blueprint.topics.data,
        control_topic = %blueprint.topics.control,
        mission = ?blueprint.command.mission_id,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if args.metrics_port != 0 {
        if let Err(e) = observability::init_metrics_only(args.metrics_port) {
            warn!(error = %e, "Metrics endpoint unavailable, continuing without it");
        }
    }

    let (transcription_api, command_api) =
        create_clients(&blueprint).context("Failed to create service clients")?;

    let (transport, inbound) = MqttTransport::connect(&blueprint.broker);
    let mut bridge = Bridge::start(
        &blueprint,
        transport,
        inbound,
        transcription_api,
        command_api,
    )
    .await
    .context("Failed to start bridge")?;

    let timeout = (args.timeout != 0).then(|| Duration::from_secs(args.timeout));
    let stats = bridge.run_until_shutdown(timeout).await;

    info!(
        events = stats.events_dispatched(),
        duration_secs = stats.duration.as_secs_f64(),
        reason = %stats.shutdown_reason,
        "Bridge finished"
    );
    stats.print_summary();

    Ok(())
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &BridgeBlueprint) {
    let blueprint = blueprint.redacted();

    println!("\n=== Configuration Summary ===\n");
    println!("Broker:");
    println!("  Address: {}:{}", blueprint.broker.host, blueprint.broker.port);
    println!("  Client id: {}", blueprint.broker.client_id);
    println!("\nTopics:");
    println!("  Data: {}", blueprint.topics.data);
    println!("  Control: {}", blueprint.topics.control);
    println!("\nTranscription service:");
    println!("  URL: {}", blueprint.transcription.base_url);
    println!("  User: {}", blueprint.transcription.username);
    println!("\nCommand service:");
    println!("  URL: {}", blueprint.command.base_url);
    println!("  User: {}", blueprint.command.username);
    match blueprint.command.mission_id {
        Some(mission) => println!("  Mission: {mission}"),
        None => println!("  Mission: first listed"),
    }
    println!(
        "  Token lifetime: {}s (renewed {}s early)",
        blueprint.command.token_ttl_secs, blueprint.command.token_margin_secs
    );

    if let Some(ref path) = blueprint.dispatch.evaluation_log {
        println!("\nEvaluation log: {}", path.display());
    }

    println!();
}
