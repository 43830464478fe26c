//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::BridgeBlueprint;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    broker: String,
    data_topic: String,
    control_topic: String,
    transcription_url: String,
    command_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mission_id: Option<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    broker: format!("{}:{}", blueprint.broker.host, blueprint.broker.port),
                    data_topic: blueprint.topics.data.clone(),
                    control_topic: blueprint.topics.control.clone(),
                    transcription_url: blueprint.transcription.base_url.clone(),
                    command_url: blueprint.command.base_url.clone(),
                    mission_id: blueprint.command.mission_id.map(|m| m.to_string()),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &BridgeBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.command.mission_id.is_none() {
        warnings.push(
            "command.mission_id not set - the first mission listed by the service will be used"
                .to_string(),
        );
    }

    if blueprint.broker.username.is_none() {
        warnings.push("broker.username not set - connecting anonymously".to_string());
    }

    if blueprint.command.base_url.starts_with("http://") {
        warnings.push(
            "command.base_url uses plain http - credentials and tokens travel unencrypted"
                .to_string(),
        );
    }

    if blueprint.dispatch.evaluation_log.is_none() {
        warnings.push("dispatch.evaluation_log not set - no evaluation records".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Broker: {}", summary.broker);
            println!("  Topics: {} / {}", summary.data_topic, summary.control_topic);
            println!("  Transcription: {}", summary.transcription_url);
            println!("  Command: {}", summary.command_url);
            if let Some(ref mission) = summary.mission_id {
                println!("  Mission: {}", mission);
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{CommandConfig, MissionId, TranscriptionConfig};
    use std::io::Write;

    const MINIMAL: &str = r#"
[transcription]
base_url = "http://localhost:8080/radio-transcription"
username = "dev"
password = "changeme"

[command]
base_url = "https://command.example.org"
username = "bridge"
password = "changeme"
api_key = "placeholder-key"
"#;

    #[test]
    fn test_warnings_for_minimal_config() {
        let blueprint = BridgeBlueprint::new(
            TranscriptionConfig::new("http://localhost:8080", "dev", "pw"),
            CommandConfig::new("http://localhost:8081", "bridge", "pw", "key"),
        );
        let warnings = collect_warnings(&blueprint);
        assert_eq!(warnings.len(), 4);
        assert!(warnings.iter().any(|w| w.contains("mission_id")));
        assert!(warnings.iter().any(|w| w.contains("plain http")));
    }

    #[test]
    fn test_no_mission_warning_when_configured() {
        let mut command = CommandConfig::new("https://command", "bridge", "pw", "key");
        command.mission_id = Some(MissionId::random());
        let blueprint = BridgeBlueprint::new(
            TranscriptionConfig::new("http://localhost:8080", "dev", "pw"),
            command,
        );
        let warnings = collect_warnings(&blueprint);
        assert!(!warnings.iter().any(|w| w.contains("mission_id")));
        assert!(!warnings.iter().any(|w| w.contains("plain http")));
    }

    #[test]
    fn test_validate_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        let result = validate_config(&args);
        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.data_topic, "mkm/result");
        assert!(summary.mission_id.is_none());
    }

    #[test]
    fn test_validate_missing_file() {
        let args = ValidateArgs {
            config: "/nonexistent/bridge.toml".into(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }
}
