use std::path::PathBuf;

use serde::Deserialize;

/// Engine settings, loadable from a TOML file by the host.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Worker poll cadence in milliseconds.
    pub poll_interval_ms: u64,
    /// Directory for per-block scratch files; the system temp dir when
    /// unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            poll_interval_ms: 250,
            scratch_dir: None,
        }
    }
}
