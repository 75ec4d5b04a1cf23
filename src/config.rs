use std::collections::HashMap;
use std::str::FromStr;

// ============================================================================
// Application Configuration
// ============================================================================
//
// Read once from the environment at startup. Every setting has a default so
// a bare `cargo run` works against the in-memory backend.
//
//   EVENT_STORE_BACKEND   memory | scylla        (memory)
//   SCYLLA_NODES          host:port,host:port    (127.0.0.1:9042)
//   SCYLLA_KEYSPACE       keyspace name          (accounts_ks)
//   METRICS_PORT          u16                    (9090)
//   COMMAND_MAX_ATTEMPTS  u32 >= 1               (3)
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Scylla,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "scylla" => Ok(Backend::Scylla),
            other => Err(ConfigError::Invalid {
                key: "EVENT_STORE_BACKEND",
                value: other.to_string(),
                reason: "expected memory or scylla".to_string(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid {key}={value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub backend: Backend,
    pub scylla_nodes: Vec<String>,
    pub scylla_keyspace: String,
    pub metrics_port: u16,
    pub command_max_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            scylla_nodes: vec!["127.0.0.1:9042".to_string()],
            scylla_keyspace: "accounts_ks".to_string(),
            metrics_port: 9090,
            command_max_attempts: 3,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Build from an explicit variable map
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(value) = vars.get("EVENT_STORE_BACKEND") {
            config.backend = value.parse()?;
        }

        if let Some(value) = vars.get("SCYLLA_NODES") {
            let nodes: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|node| !node.is_empty())
                .map(str::to_string)
                .collect();
            if nodes.is_empty() {
                return Err(ConfigError::Invalid {
                    key: "SCYLLA_NODES",
                    value: value.clone(),
                    reason: "at least one node is required".to_string(),
                });
            }
            config.scylla_nodes = nodes;
        }

        if let Some(value) = vars.get("SCYLLA_KEYSPACE") {
            let valid = !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(ConfigError::Invalid {
                    key: "SCYLLA_KEYSPACE",
                    value: value.clone(),
                    reason: "letters, digits and underscores only".to_string(),
                });
            }
            config.scylla_keyspace = value.clone();
        }

        if let Some(value) = vars.get("METRICS_PORT") {
            config.metrics_port = parse_number("METRICS_PORT", value)?;
        }

        if let Some(value) = vars.get("COMMAND_MAX_ATTEMPTS") {
            let attempts: u32 = parse_number("COMMAND_MAX_ATTEMPTS", value)?;
            if attempts == 0 {
                return Err(ConfigError::Invalid {
                    key: "COMMAND_MAX_ATTEMPTS",
                    value: value.clone(),
                    reason: "must be at least 1".to_string(),
                });
            }
            config.command_max_attempts = attempts;
        }

        Ok(config)
    }
}

fn parse_number<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_vars(HashMap::new()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.backend, Backend::Memory);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_vars(vars(&[
            ("EVENT_STORE_BACKEND", "Scylla"),
            ("SCYLLA_NODES", "10.0.0.1:9042, 10.0.0.2:9042"),
            ("SCYLLA_KEYSPACE", "bank"),
            ("METRICS_PORT", "9100"),
            ("COMMAND_MAX_ATTEMPTS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.backend, Backend::Scylla);
        assert_eq!(config.scylla_nodes, vec!["10.0.0.1:9042", "10.0.0.2:9042"]);
        assert_eq!(config.scylla_keyspace, "bank");
        assert_eq!(config.metrics_port, 9100);
        assert_eq!(config.command_max_attempts, 5);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for (key, value) in [
            ("EVENT_STORE_BACKEND", "dynamo"),
            ("SCYLLA_NODES", " , "),
            ("SCYLLA_KEYSPACE", "drop table;"),
            ("METRICS_PORT", "70000"),
            ("COMMAND_MAX_ATTEMPTS", "0"),
        ] {
            let result = AppConfig::from_vars(vars(&[(key, value)]));
            assert!(
                matches!(result, Err(ConfigError::Invalid { key: k, .. }) if k == key),
                "{key}={value} should be rejected"
            );
        }
    }
}
