use crate::data_sync::{
    balance_watcher::BalanceWatcher,
    config::SyncConfig,
    duel_set::{HistoryWatcher, OpenDuelsWatcher},
    duel_watcher::DuelWatcher,
    ledger::{LedgerClient, SolanaLedger},
};
use eyre::Result;
use solana_program::pubkey::Pubkey;
use std::sync::Arc;
use tracing::info;

/// Entry point of the synchronization layer.
///
/// Holds the shared ledger connection and hands out independent watchers. Every watcher owns its
/// own push registration and poll timer; nothing is shared between them except the ledger.
pub struct DuelSyncService {
    config: SyncConfig,
    program_id: Pubkey,
    ledger: Arc<dyn LedgerClient>,
}

impl DuelSyncService {
    /// Connects to the Solana RPC endpoints in `config`. Must run inside a tokio runtime.
    pub fn new(config: SyncConfig) -> Result<Self> {
        let ledger = SolanaLedger::new(&config)?;
        Self::with_ledger(config, Arc::new(ledger))
    }

    /// Uses an existing ledger client, e.g. a mock.
    pub fn with_ledger(config: SyncConfig, ledger: Arc<dyn LedgerClient>) -> Result<Self> {
        config.validate()?;
        let program_id = config.program_id()?;
        info!("Initializing DuelSyncService for program {} ({} commitment)", program_id, config.commitment);

        Ok(Self { config, program_id, ledger })
    }

    /// Tracks one duel at a time.
    pub fn duel_watcher(&self) -> DuelWatcher {
        DuelWatcher::new(Arc::clone(&self.ledger), &self.config)
    }

    /// Lobby of duels waiting for a challenger. Call `start` to begin syncing.
    pub fn open_duels(&self) -> OpenDuelsWatcher {
        OpenDuelsWatcher::new(Arc::clone(&self.ledger), self.program_id, &self.config)
    }

    /// Finished duels of a participant. Call `track` to begin syncing.
    pub fn history(&self) -> HistoryWatcher {
        HistoryWatcher::new(Arc::clone(&self.ledger), self.program_id, &self.config)
    }

    /// Native balance of a wallet. Call `watch` to begin syncing.
    pub fn balance_watcher(&self) -> BalanceWatcher {
        BalanceWatcher::new(Arc::clone(&self.ledger), &self.config)
    }

    pub fn ledger(&self) -> Arc<dyn LedgerClient> {
        Arc::clone(&self.ledger)
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}

/// Builder for DuelSyncService
pub struct DuelSyncServiceBuilder {
    config: Option<SyncConfig>,
    ledger: Option<Arc<dyn LedgerClient>>,
}

impl DuelSyncServiceBuilder {
    pub fn new() -> Self {
        Self { config: None, ledger: None }
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn LedgerClient>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Without an explicit config, reads the environment and falls back to defaults.
    pub fn build(self) -> Result<DuelSyncService> {
        let config = match self.config {
            Some(config) => config,
            None => SyncConfig::from_env()?,
        };

        match self.ledger {
            Some(ledger) => DuelSyncService::with_ledger(config, ledger),
            None => DuelSyncService::new(config),
        }
    }
}

impl Default for DuelSyncServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
