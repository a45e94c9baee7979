use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use skein_store::StoreConfig;

/// CLI configuration file.
///
/// ```toml
/// snapshot = "skein-remote.bin"
///
/// [store]
/// root_id = "root"
/// op_timeout_ms = 30000
/// ```
///
/// The CLI talks to a local remote kept in the bincode `snapshot` file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    pub store: StoreConfig,
    #[serde(default = "default_snapshot")]
    pub snapshot: PathBuf,
}

fn default_snapshot() -> PathBuf {
    PathBuf::from("skein-remote.bin")
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::new("root"),
            snapshot: default_snapshot(),
        }
    }
}

impl CliConfig {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s).context("parsing configuration")?;
        config.store.validate()?;
        Ok(config)
    }

    /// Read `path`, or use the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                Self::from_toml_str(&text).with_context(|| format!("loading {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = CliConfig::default();
        assert_eq!(c.store.root_id, "root");
        assert_eq!(c.snapshot, PathBuf::from("skein-remote.bin"));
    }

    #[test]
    fn parses_store_table() {
        let c = CliConfig::from_toml_str(
            r#"
            snapshot = "/tmp/remote.bin"

            [store]
            root_id = "0B1a"
            op_timeout_ms = 500

            [store.shard]
            depth = 1
            width = 3
            "#,
        )
        .unwrap();
        assert_eq!(c.snapshot, PathBuf::from("/tmp/remote.bin"));
        assert_eq!(c.store.root_id, "0B1a");
        assert_eq!(c.store.shard.depth, 1);
        assert_eq!(c.store.shard.width, 3);
        assert_eq!(c.store.op_timeout_ms, Some(500));
    }

    #[test]
    fn rejects_empty_root() {
        assert!(CliConfig::from_toml_str("[store]\nroot_id = \"\"\n").is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skein.toml");
        std::fs::write(&path, "[store]\nroot_id = \"r\"\n").unwrap();
        let c = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(c.store.root_id, "r");
        assert!(CliConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
        assert_eq!(CliConfig::load(None).unwrap(), CliConfig::default());
    }
}
