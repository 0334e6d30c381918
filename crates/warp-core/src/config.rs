//! Configuration types for the warp engine

use serde::{Deserialize, Serialize};

use crate::errors::ZapError;
use crate::types::{Address, Amount, SlippageTolerance};

/// Engine configuration
///
/// Collaborators are injected separately; this only carries tunables and the
/// engine's own custody account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Account that holds tokens while a call is in flight
    pub engine_account: Address,

    /// Per-hop minimum output handed to the router. The binding floor is
    /// checked once at the end of the call.
    #[serde(default = "default_per_hop_min_out")]
    pub per_hop_min_out: Amount,

    /// When set, zap-in recomputes the floor from live reserves with this
    /// tolerance and enforces whichever floor is higher
    #[serde(default)]
    pub max_slippage_percent: Option<SlippageTolerance>,

    /// Tolerance used by quotes when the caller does not pass one
    #[serde(default = "default_slippage")]
    pub default_slippage_percent: SlippageTolerance,
}

fn default_per_hop_min_out() -> Amount {
    1
}

fn default_slippage() -> SlippageTolerance {
    SlippageTolerance::new(1).unwrap_or_default()
}

impl EngineConfig {
    pub fn new(engine_account: Address) -> Self {
        Self {
            engine_account,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self, ZapError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ZapError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ZapError> {
        if self.engine_account.is_zero() {
            return Err(ZapError::Config(
                "engine_account must not be the native sentinel".to_string(),
            ));
        }
        if self.per_hop_min_out == 0 {
            return Err(ZapError::Config(
                "per_hop_min_out must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_account: Address::from_low_u64(0x7a70),
            per_hop_min_out: default_per_hop_min_out(),
            max_slippage_percent: None,
            default_slippage_percent: default_slippage(),
        }
    }
}
