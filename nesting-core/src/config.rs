//! Configuration for a ledger instance

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger instance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Human-readable instance name (logs and snapshot metadata)
    pub instance_name: String,

    /// Structural limits
    pub limits: LimitsConfig,

    /// Snapshot configuration
    pub snapshot: SnapshotConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instance_name: "nesting-ledger".to_string(),
            limits: LimitsConfig::default(),
            snapshot: SnapshotConfig::default(),
        }
    }
}

/// Structural limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum pending children per parent token
    pub max_pending_children: usize,

    /// Maximum hops for ancestry walks (cycle check, root resolution)
    pub max_ancestry_hops: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_pending_children: 128, // keeps full-collection scans cheap
            max_ancestry_hops: 100,    // deeper chains treated as cycles
        }
    }
}

/// Snapshot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Directory snapshot files are written to
    pub dir: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data/snapshots"),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(name) = std::env::var("NESTING_INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Ok(cap) = std::env::var("NESTING_MAX_PENDING_CHILDREN") {
            config.limits.max_pending_children = cap
                .parse()
                .map_err(|e| crate::Error::Config(format!("Bad pending-children cap: {}", e)))?;
        }

        if let Ok(hops) = std::env::var("NESTING_MAX_ANCESTRY_HOPS") {
            config.limits.max_ancestry_hops = hops
                .parse()
                .map_err(|e| crate::Error::Config(format!("Bad ancestry hop bound: {}", e)))?;
        }

        if let Ok(dir) = std::env::var("NESTING_SNAPSHOT_DIR") {
            config.snapshot.dir = PathBuf::from(dir);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.instance_name, "nesting-ledger");
        assert_eq!(config.limits.max_pending_children, 128);
        assert_eq!(config.limits.max_ancestry_hops, 100);
    }

    #[test]
    fn test_parse_toml() {
        let doc = r#"
            instance_name = "relics"

            [limits]
            max_pending_children = 16
            max_ancestry_hops = 10

            [snapshot]
            dir = "/tmp/relics-snapshots"
        "#;

        let config: Config = toml::from_str(doc).unwrap();
        assert_eq!(config.instance_name, "relics");
        assert_eq!(config.limits.max_pending_children, 16);
        assert_eq!(config.snapshot.dir, PathBuf::from("/tmp/relics-snapshots"));
    }
}
