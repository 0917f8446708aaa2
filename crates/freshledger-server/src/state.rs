use std::sync::Arc;

use freshledger_index::SupplyChainService;
use freshledger_ledger::{InMemoryLedgerStore, LedgerStore};
use freshledger_types::LedgerConfig;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SupplyChainService>,
}

impl AppState {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self {
            service: Arc::new(SupplyChainService::new(store, config)),
        }
    }

    /// State over a fresh in-process store.
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::new(Arc::new(InMemoryLedgerStore::new()), config)
    }
}
