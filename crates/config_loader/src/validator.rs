//! Configuration validation
//!
//! Rules:
//! - broker host / client_id non-empty, port > 0
//! - data and control topics non-empty and distinct
//! - service base URLs parse as http(s) URLs
//! - token margin < token TTL
//! - all timeouts > 0

use contracts::{BridgeBlueprint, ContractError};
use url::Url;

/// Validate a BridgeBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    validate_broker(blueprint)?;
    validate_topics(blueprint)?;
    validate_services(blueprint)?;
    validate_session(blueprint)?;
    validate_timeouts(blueprint)?;
    Ok(())
}

fn validate_broker(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    let broker = &blueprint.broker;
    if broker.host.trim().is_empty() {
        return Err(ContractError::config_validation(
            "broker.host",
            "host cannot be empty",
        ));
    }
    if broker.port == 0 {
        return Err(ContractError::config_validation(
            "broker.port",
            "port must be > 0",
        ));
    }
    if broker.client_id.trim().is_empty() {
        return Err(ContractError::config_validation(
            "broker.client_id",
            "client_id cannot be empty",
        ));
    }
    if broker.channel_capacity == 0 {
        return Err(ContractError::config_validation(
            "broker.channel_capacity",
            "channel_capacity must be > 0",
        ));
    }
    Ok(())
}

fn validate_topics(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    let topics = &blueprint.topics;
    if topics.data.is_empty() {
        return Err(ContractError::config_validation(
            "topics.data",
            "topic cannot be empty",
        ));
    }
    if topics.control.is_empty() {
        return Err(ContractError::config_validation(
            "topics.control",
            "topic cannot be empty",
        ));
    }
    if topics.data == topics.control {
        return Err(ContractError::config_validation(
            "topics",
            format!("data and control topics must differ, both are '{}'", topics.data),
        ));
    }
    Ok(())
}

fn validate_services(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    validate_base_url("transcription.base_url", &blueprint.transcription.base_url)?;
    validate_base_url("command.base_url", &blueprint.command.base_url)?;

    if blueprint.command.api_key_header.trim().is_empty() {
        return Err(ContractError::config_validation(
            "command.api_key_header",
            "header name cannot be empty",
        ));
    }
    Ok(())
}

fn validate_base_url(field: &str, value: &str) -> Result<(), ContractError> {
    let url = Url::parse(value).map_err(|e| {
        ContractError::config_validation(field, format!("invalid URL '{value}': {e}"))
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ContractError::config_validation(
            field,
            format!("unsupported scheme '{other}'"),
        )),
    }
}

fn validate_session(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    let command = &blueprint.command;
    if command.token_margin_secs >= command.token_ttl_secs {
        return Err(ContractError::config_validation(
            "command.token_margin_secs / command.token_ttl_secs",
            format!(
                "token_margin_secs ({}) must be < token_ttl_secs ({})",
                command.token_margin_secs, command.token_ttl_secs
            ),
        ));
    }
    Ok(())
}

fn validate_timeouts(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    let timeouts = [
        ("transcription.timeout_secs", blueprint.transcription.timeout_secs),
        ("command.timeout_secs", blueprint.command.timeout_secs),
        (
            "dispatch.shutdown_timeout_secs",
            blueprint.dispatch.shutdown_timeout_secs,
        ),
        ("broker.keep_alive_secs", blueprint.broker.keep_alive_secs),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            return Err(ContractError::config_validation(field, "must be > 0"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_toml;

    fn minimal_blueprint() -> BridgeBlueprint {
        parse_toml(
            r#"
[transcription]
base_url = "http://localhost:8080/radio-transcription"
username = "dev"
password = "pw"

[command]
base_url = "https://command.example:444"
username = "bridge"
password = "pw"
api_key = "key"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_minimal() {
        assert!(validate(&minimal_blueprint()).is_ok());
    }

    #[test]
    fn test_same_topics() {
        let mut bp = minimal_blueprint();
        bp.topics.control = bp.topics.data.clone();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("must differ"), "got: {err}");
    }

    #[test]
    fn test_invalid_base_url() {
        let mut bp = minimal_blueprint();
        bp.transcription.base_url = "not a url".into();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("transcription.base_url"), "got: {err}");
    }

    #[test]
    fn test_unsupported_scheme() {
        let mut bp = minimal_blueprint();
        bp.command.base_url = "ftp://command.example".into();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("unsupported scheme"), "got: {err}");
    }

    #[test]
    fn test_margin_not_below_ttl() {
        let mut bp = minimal_blueprint();
        bp.command.token_ttl_secs = 60;
        bp.command.token_margin_secs = 60;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("token_margin_secs"), "got: {err}");
    }

    #[test]
    fn test_zero_timeout() {
        let mut bp = minimal_blueprint();
        bp.dispatch.shutdown_timeout_secs = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("dispatch.shutdown_timeout_secs"), "got: {err}");
    }

    #[test]
    fn test_empty_host() {
        let mut bp = minimal_blueprint();
        bp.broker.host = " ".into();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("cannot be empty"), "got: {err}");
    }
}
