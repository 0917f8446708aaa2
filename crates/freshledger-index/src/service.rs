use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use freshledger_invoice::InvoiceRepository;
use freshledger_ledger::{LedgerStore, LedgerStoreExt};
use freshledger_types::{
    FreshLedgerError, InvalidationReason, Invoice, InvoiceSubmission, ItemKey, KeyIndices,
    LedgerConfig, QualityIndex, Result, StoreQuality, keys,
};

use crate::engine::IndexEngine;
use crate::reward::RewardCalculator;
use crate::validator::TransactionValidator;

/// The persisted invoice and the indices recomputed for its item keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceReceipt {
    pub invoice: Invoice,
    pub indices: Vec<KeyIndices>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreReward {
    pub store_id: String,
    pub quality_index: f64,
    pub amount: f64,
}

/// Wires the repository, engine, validator and reward calculator over one
/// ledger store.
///
/// Writes and index recomputation are separate steps: if recomputation fails
/// after an invoice is written, the invoice stays and the error is returned.
pub struct SupplyChainService {
    store: Arc<dyn LedgerStore>,
    config: LedgerConfig,
    repository: InvoiceRepository,
    engine: IndexEngine,
    validator: TransactionValidator,
    rewards: RewardCalculator,
}

impl SupplyChainService {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        let engine = IndexEngine::new(store.clone(), config.clone());
        Self {
            repository: InvoiceRepository::new(store.clone(), config.clone()),
            validator: TransactionValidator::new(store.clone(), engine.clone()),
            rewards: RewardCalculator::new(store.clone(), config.clone()),
            engine,
            store,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn repository(&self) -> &InvoiceRepository {
        &self.repository
    }

    pub fn engine(&self) -> &IndexEngine {
        &self.engine
    }

    pub fn validator(&self) -> &TransactionValidator {
        &self.validator
    }

    pub fn rewards(&self) -> &RewardCalculator {
        &self.rewards
    }

    /// Validate and persist an invoice, replacing a live record of the same id,
    /// then count it as valid for each of its item keys and refresh their
    /// indices.
    pub async fn create_or_update_invoice(
        &self,
        submission: InvoiceSubmission,
    ) -> Result<InvoiceReceipt> {
        let invoice = self.repository.upsert_invoice(submission).await?;

        let item_keys: BTreeSet<ItemKey> = invoice.items.iter().map(|item| item.key()).collect();
        for key in &item_keys {
            self.validator
                .update_transaction_validity(&invoice.store_id, key, true)
                .await?;
        }

        let mut indices = Vec::with_capacity(item_keys.len());
        for key in &item_keys {
            if let Some(key_indices) = self.refresh_key(&invoice.store_id, key).await? {
                indices.push(key_indices);
            }
        }
        Ok(InvoiceReceipt { invoice, indices })
    }

    /// Enforce the rolling window for `key` and return its wastage.
    ///
    /// Expired transactions are invalidated along the way. If sales exceed
    /// purchases every transaction of the key is invalidated and the call
    /// fails.
    pub async fn calculate_wastage_in_rolling_window(
        &self,
        store_id: &str,
        key: &ItemKey,
    ) -> Result<f64> {
        let scan = match self.validator.enforce_rolling_window(store_id, key).await {
            Ok(scan) => scan,
            Err(e) => {
                if matches!(e, FreshLedgerError::SalesExceedPurchases { .. }) {
                    self.clear_index_records(store_id, key).await?;
                }
                return Err(e);
            }
        };
        if scan.total_purchases <= 0.0 {
            return Err(FreshLedgerError::NoPurchaseData {
                item_id: key.item_id.clone(),
                expiry_date: key.expiry_date.clone(),
            });
        }
        Ok(scan.wastage())
    }

    /// Operator-requested invalidation of every live transaction of `key`.
    pub async fn invalidate_transactions(&self, store_id: &str, key: &ItemKey) -> Result<usize> {
        let removed = self
            .validator
            .invalidate_transactions(store_id, key, InvalidationReason::Manual)
            .await?;
        self.clear_index_records(store_id, key).await?;
        Ok(removed)
    }

    /// Enforce every item key of the store, then compute and publish the
    /// wastage and quality records behind the store average.
    pub async fn recompute_store_indices(&self, store_id: &str) -> Result<StoreQuality> {
        let item_keys: BTreeSet<ItemKey> = self
            .engine
            .item_key_occurrences(store_id)
            .await?
            .into_iter()
            .collect();

        for key in &item_keys {
            match self.validator.enforce_rolling_window(store_id, key).await {
                Ok(_) => {}
                Err(FreshLedgerError::SalesExceedPurchases { .. }) => {
                    self.clear_index_records(store_id, key).await?;
                }
                Err(e) => return Err(e),
            }
        }

        let quality = self.engine.calculate_quality_index(store_id).await?;
        let published: BTreeSet<&ItemKey> = quality.per_key.iter().map(|k| &k.item_key).collect();
        for key in &item_keys {
            if !published.contains(key) {
                self.clear_index_records(store_id, key).await?;
            }
        }
        for key_indices in &quality.per_key {
            self.publish(store_id, key_indices).await?;
        }

        tracing::info!(
            store_id,
            quality = quality.total_quality_index,
            item_keys = quality.num_item_keys,
            "store indices recomputed"
        );
        Ok(quality)
    }

    /// Recompute the store's indices and turn its average quality into a
    /// signed reward.
    pub async fn reward_for_store(&self, store_id: &str) -> Result<StoreReward> {
        let quality = self.recompute_store_indices(store_id).await?;
        let amount = self
            .rewards
            .reward_and_corrective_system(store_id, quality.total_quality_index)
            .await?;
        Ok(StoreReward {
            store_id: store_id.to_string(),
            quality_index: quality.total_quality_index,
            amount,
        })
    }

    pub async fn get_total_purchases(&self, store_id: &str, key: &ItemKey) -> Result<f64> {
        self.engine.get_total_purchases(store_id, key).await
    }

    pub async fn get_total_sales(&self, store_id: &str, key: &ItemKey) -> Result<f64> {
        self.engine.get_total_sales(store_id, key).await
    }

    async fn refresh_key(&self, store_id: &str, key: &ItemKey) -> Result<Option<KeyIndices>> {
        if let Err(e) = self.validator.enforce_rolling_window(store_id, key).await {
            if matches!(e, FreshLedgerError::SalesExceedPurchases { .. }) {
                self.clear_index_records(store_id, key).await?;
            }
            return Err(e);
        }
        match self.engine.calculate_key_indices(store_id, key).await {
            Ok(key_indices) => {
                self.publish(store_id, &key_indices).await?;
                Ok(Some(key_indices))
            }
            Err(FreshLedgerError::NoPurchaseData { .. }) => {
                self.clear_index_records(store_id, key).await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn publish(&self, store_id: &str, key_indices: &KeyIndices) -> Result<()> {
        let key = &key_indices.item_key;
        self.store
            .put_json(&keys::wastage_index_key(store_id, key), &key_indices.wastage)
            .await?;
        let quality = QualityIndex {
            store_id: store_id.to_string(),
            item_key: key.clone(),
            quality_index: key_indices.quality_index,
        };
        self.store
            .put_json(&keys::quality_index_key(store_id, key), &quality)
            .await?;
        tracing::debug!(store_id, item_key = %key, quality = quality.quality_index, "indices published");
        Ok(())
    }

    /// Remove published index records for a key whose transactions are gone,
    /// so coefficient queries never read them.
    async fn clear_index_records(&self, store_id: &str, key: &ItemKey) -> Result<()> {
        self.store
            .delete(&keys::wastage_index_key(store_id, key))
            .await?;
        self.store
            .delete(&keys::quality_index_key(store_id, key))
            .await
    }
}
