//! Static configuration for one modem's cell-info pipeline.

use serde::{Deserialize, Serialize};

/// Pipeline configuration, usually loaded from a TOML file by whoever
/// wires the pipeline up. Every field has a default, so a partial (or
/// absent) file is fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellInfoConfig {
    /// Object path of the modem owning this pipeline.
    pub modem_path: String,
    /// Update interval requested while any consumer wants cell info, ms.
    pub default_interval_ms: i32,
    /// Whether the driver enables polling at startup.
    pub enabled: bool,
}

impl Default for CellInfoConfig {
    fn default() -> Self {
        CellInfoConfig {
            modem_path: "/ril_0".to_string(),
            default_interval_ms: 5000,
            enabled: true,
        }
    }
}
