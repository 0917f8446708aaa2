use serde::{Deserialize, Serialize};

use crate::error::{FreshLedgerError, Result};

/// Immutable engine configuration, handed to component constructors at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// chrono layout every business date must match exactly.
    #[serde(default = "default_date_layout")]
    pub date_layout: String,

    /// Quality indices at or below this value feed the corrective coefficient;
    /// stores strictly below it are penalised.
    #[serde(default = "default_corrective_threshold")]
    pub corrective_threshold: f64,

    /// Quality indices at or above this value feed the reward coefficient and earn a reward.
    #[serde(default = "default_reward_threshold")]
    pub reward_threshold: f64,

    /// Pivot the reward and penalty magnitudes are measured from.
    #[serde(default = "default_neutral_pivot")]
    pub neutral_pivot: f64,

    #[serde(default = "default_index_floor")]
    pub index_floor: f64,

    #[serde(default = "default_index_ceiling")]
    pub index_ceiling: f64,
}

fn default_date_layout() -> String {
    "%Y-%m-%d".to_string()
}

fn default_corrective_threshold() -> f64 {
    50.0
}

fn default_reward_threshold() -> f64 {
    80.0
}

fn default_neutral_pivot() -> f64 {
    50.0
}

fn default_index_floor() -> f64 {
    0.0
}

fn default_index_ceiling() -> f64 {
    100.0
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            date_layout: default_date_layout(),
            corrective_threshold: default_corrective_threshold(),
            reward_threshold: default_reward_threshold(),
            neutral_pivot: default_neutral_pivot(),
            index_floor: default_index_floor(),
            index_ceiling: default_index_ceiling(),
        }
    }
}

impl LedgerConfig {
    /// Clamp an index value into `[index_floor, index_ceiling]`.
    ///
    /// NaN is mapped to the floor so a published index is always in range.
    pub fn bound_index(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.index_floor;
        }
        value.max(self.index_floor).min(self.index_ceiling)
    }

    /// Reject bounds and thresholds that are inverted or not comparable.
    pub fn validate(&self) -> Result<()> {
        if !(self.index_floor <= self.index_ceiling) {
            return Err(FreshLedgerError::InvalidConfig(format!(
                "index_floor {} is above index_ceiling {}",
                self.index_floor, self.index_ceiling
            )));
        }
        if !(self.corrective_threshold <= self.reward_threshold) {
            return Err(FreshLedgerError::InvalidConfig(format!(
                "corrective_threshold {} is above reward_threshold {}",
                self.corrective_threshold, self.reward_threshold
            )));
        }
        Ok(())
    }
}
