//! Configuration loading and parsing

use anyhow::{Context, Result};
use gamekit_interop::BridgeConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main application configuration (loaded from a TOML file)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub matchmaker: MatchmakerConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Properties applied to the request and view controller before the session
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MatchmakerConfig {
    pub show_existing_matches: Option<bool>,
    pub min_players: Option<usize>,
    pub max_players: Option<usize>,
    pub invite_message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Events fired at the controller (simulated backend only)
    #[serde(default)]
    pub events: Vec<ScriptedEvent>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScriptedEvent {
    /// The player cancels matchmaking
    Cancel,
    /// Matchmaking fails with an error
    Fail {
        domain: String,
        code: i64,
        description: Option<String>,
    },
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .bridge
        .validate()
        .with_context(|| format!("Invalid [bridge] section in {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamekit_interop::BackendKind;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [bridge]
            backend = "simulated"

            [matchmaker]
            show_existing_matches = false
            min_players = 2
            max_players = 4
            invite_message = "Your turn"

            [[session.events]]
            kind = "cancel"

            [[session.events]]
            kind = "fail"
            domain = "GKErrorDomain"
            code = 3
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.bridge.backend, BackendKind::Simulated);
        assert_eq!(config.matchmaker.max_players, Some(4));
        assert_eq!(config.session.events.len(), 2);
        assert_eq!(
            config.session.events[1],
            ScriptedEvent::Fail {
                domain: "GKErrorDomain".to_string(),
                code: 3,
                description: None,
            }
        );
    }

    #[test]
    fn test_empty_config() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.session.events.is_empty());
        assert!(config.matchmaker.show_existing_matches.is_none());
    }

    #[test]
    fn test_load_config_rejects_dynamic_without_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        fs::write(&path, "[bridge]\nbackend = \"dynamic\"\n").unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("session.example.toml");
        let config = load_config(&path).unwrap();

        assert_eq!(config.matchmaker.invite_message.as_deref(), Some("Your turn!"));
        assert_eq!(config.session.events.last(), Some(&ScriptedEvent::Cancel));
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config(Path::new("does/not/exist.toml")).is_err());
    }
}
