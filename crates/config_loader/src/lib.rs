//! # Config Loader
//!
//! Loads a `BridgeBlueprint` from a TOML, JSON or YAML file and validates it.
//!
//! Secrets can be kept out of the file: after parsing, the variables listed in
//! [`SECRET_ENV_VARS`] replace the matching fields (see
//! [`ConfigLoader::apply_env_secrets`]). Validation always runs last.
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("bridge.toml")).unwrap();
//! println!("Broker: {}:{}", blueprint.broker.host, blueprint.broker.port);
//! ```

mod parser;
mod validator;

pub use contracts::BridgeBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Environment variables that override secrets from the file
pub const SECRET_ENV_VARS: [&str; 4] = [
    "FUSION_BRIDGE_BROKER_PASSWORD",
    "FUSION_BRIDGE_TRANSCRIPTION_PASSWORD",
    "FUSION_BRIDGE_COMMAND_PASSWORD",
    "FUSION_BRIDGE_COMMAND_API_KEY",
];

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load, apply environment secrets and validate
    ///
    /// The format follows the extension: `.toml`, `.json`, `.yaml` / `.yml`.
    ///
    /// # Errors
    /// `Io` when the file cannot be read, `ConfigParse` for an unknown
    /// extension or malformed content, `ConfigValidation` for rule violations.
    pub fn load_from_path(path: &Path) -> Result<BridgeBlueprint, ContractError> {
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        let mut blueprint = parser::parse(&content, format)?;
        Self::apply_env_secrets(&mut blueprint, |key| std::env::var(key).ok());
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Parse and validate, without environment overrides
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<BridgeBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Validate an already constructed blueprint (e.g. after CLI overrides)
    pub fn validate(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// Replace secrets with values returned by `lookup`
    ///
    /// Empty values are ignored. Returns the number of fields replaced.
    pub fn apply_env_secrets<F>(blueprint: &mut BridgeBlueprint, lookup: F) -> usize
    where
        F: Fn(&str) -> Option<String>,
    {
        let [broker, transcription, command, api_key] = SECRET_ENV_VARS;
        let value = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let mut replaced = 0;

        if let Some(v) = value(broker) {
            blueprint.broker.password = Some(v);
            replaced += 1;
        }
        if let Some(v) = value(transcription) {
            blueprint.transcription.password = v;
            replaced += 1;
        }
        if let Some(v) = value(command) {
            blueprint.command.password = v;
            replaced += 1;
        }
        if let Some(v) = value(api_key) {
            blueprint.command.api_key = v;
            replaced += 1;
        }
        replaced
    }

    pub fn to_toml(blueprint: &BridgeBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(blueprint: &BridgeBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ContractError::config_parse("cannot determine file format from extension"))?;

    ConfigFormat::from_extension(ext)
        .ok_or_else(|| ContractError::config_parse(format!("unsupported config format: .{ext}")))
}
