use std::time::Duration;

use serde::{Deserialize, Serialize};
use skein_types::ShardScheme;

use crate::error::{StoreError, StoreResult};
use crate::enumerate::MAX_ENUMERATE;

/// Configuration of a blob store over a remote folder tree.
///
/// ```toml
/// root_id = "0B1a2b3c"
/// op_timeout_ms = 30000
///
/// [shard]
/// depth = 2
/// width = 2
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// ID of the remote folder acting as the store root.
    pub root_id: String,
    #[serde(default)]
    pub shard: ShardScheme,
    /// Deadline for each individual remote call. Unbounded when unset.
    #[serde(default)]
    pub op_timeout_ms: Option<u64>,
    /// Items requested per listing call during enumeration.
    #[serde(default = "default_page_size")]
    pub enumerate_page_size: usize,
}

fn default_page_size() -> usize {
    MAX_ENUMERATE
}

impl StoreConfig {
    pub fn new(root_id: impl Into<String>) -> Self {
        Self {
            root_id: root_id.into(),
            shard: ShardScheme::default(),
            op_timeout_ms: None,
            enumerate_page_size: default_page_size(),
        }
    }

    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_shard_scheme(mut self, shard: ShardScheme) -> Self {
        self.shard = shard;
        self
    }

    pub fn with_enumerate_page_size(mut self, page_size: usize) -> Self {
        self.enumerate_page_size = page_size;
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.root_id.trim().is_empty() {
            return Err(StoreError::Config("root_id must not be empty".into()));
        }
        self.shard
            .validate()
            .map_err(|e| StoreError::Config(e.to_string()))?;
        if self.enumerate_page_size == 0 || self.enumerate_page_size > MAX_ENUMERATE {
            return Err(StoreError::Config(format!(
                "enumerate_page_size must be between 1 and {MAX_ENUMERATE}"
            )));
        }
        Ok(())
    }

    pub fn op_timeout(&self) -> Option<Duration> {
        self.op_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = StoreConfig::from_toml_str(r#"root_id = "root""#).unwrap();
        assert_eq!(config, StoreConfig::new("root"));
        assert_eq!(config.shard, ShardScheme { depth: 2, width: 2 });
        assert!(config.op_timeout().is_none());
        assert_eq!(config.enumerate_page_size, 1000);
    }

    #[test]
    fn full_toml() {
        let config = StoreConfig::from_toml_str(
            r#"
            root_id = "folder-1"
            op_timeout_ms = 1500
            enumerate_page_size = 50

            [shard]
            depth = 1
            width = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.root_id, "folder-1");
        assert_eq!(config.op_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.enumerate_page_size, 50);
        assert_eq!(config.shard, ShardScheme { depth: 1, width: 3 });
    }

    #[test]
    fn rejects_empty_root() {
        let err = StoreConfig::from_toml_str(r#"root_id = "  ""#).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)), "got {err}");
    }

    #[test]
    fn rejects_missing_root() {
        assert!(StoreConfig::from_toml_str("op_timeout_ms = 5").is_err());
    }

    #[test]
    fn rejects_oversize_page() {
        let config = StoreConfig::new("root").with_enumerate_page_size(1001);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_shard_scheme() {
        let config = StoreConfig::new("root").with_shard_scheme(ShardScheme { depth: 2, width: 0 });
        assert!(config.validate().is_err());
    }
}
