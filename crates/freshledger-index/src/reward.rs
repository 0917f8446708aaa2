use std::sync::Arc;

use freshledger_ledger::{LedgerStore, LedgerStoreExt, Selector, queries};
use freshledger_types::{FreshLedgerError, LedgerConfig, QualityIndex, Result};

/// Reward or penalty magnitude derived from the spread of published
/// quality indices.
pub struct RewardCalculator {
    store: Arc<dyn LedgerStore>,
    config: LedgerConfig,
}

impl RewardCalculator {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    async fn quality_values(&self, selector: &Selector) -> Result<Vec<f64>> {
        let records: Vec<(String, QualityIndex)> = self.store.query_json(selector).await?;
        Ok(records.into_iter().map(|(_, q)| q.quality_index).collect())
    }

    /// `max / min` over quality indices at or below the corrective threshold.
    ///
    /// When the minimum is exactly zero the unscaled maximum is returned.
    pub async fn calculate_corrective_coefficient(&self) -> Result<f64> {
        let values = self
            .quality_values(&queries::quality_at_most(self.config.corrective_threshold))
            .await?;
        let Some((min, max)) = min_max(&values) else {
            return Err(FreshLedgerError::NoQualityData(format!(
                "quality_index <= {}",
                self.config.corrective_threshold
            )));
        };
        if min == 0.0 {
            return Ok(max);
        }
        Ok(max / min)
    }

    /// `max / min` over quality indices at or above the reward threshold, or 0
    /// when there are none.
    pub async fn calculate_reward_coefficient(&self) -> Result<f64> {
        let values = self
            .quality_values(&queries::quality_at_least(self.config.reward_threshold))
            .await?;
        match min_max(&values) {
            None => Ok(0.0),
            Some((min, max)) if min == 0.0 => Ok(max),
            Some((min, max)) => Ok(max / min),
        }
    }

    /// Signed amount for a store: negative below the corrective threshold,
    /// positive from the reward threshold up, zero in between.
    ///
    /// Only the coefficient for the store's band is queried.
    pub async fn reward_and_corrective_system(
        &self,
        store_id: &str,
        quality_index: f64,
    ) -> Result<f64> {
        let pivot = self.config.neutral_pivot;
        let amount = if quality_index < self.config.corrective_threshold {
            let cs = self.calculate_corrective_coefficient().await?;
            -cs * (pivot - quality_index)
        } else if quality_index >= self.config.reward_threshold {
            let rs = self.calculate_reward_coefficient().await?;
            rs * (quality_index - pivot)
        } else {
            0.0
        };
        tracing::info!(store_id, quality_index, amount, "reward computed");
        Ok(amount)
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), v| (lo.min(*v), hi.max(*v))),
    )
}
