use crate::data_sync::config::SyncConfig;
use crate::data_sync::ledger::{LedgerClient, PushSubscription};
use crate::data_sync::reconcile::{PushAction, SyncSlot, SyncSnapshot, SyncSource};
use crate::error::LedgerError;
use crate::utils::constants::LAMPORTS_PER_SOL;
use async_trait::async_trait;
use solana_program::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// Lamports of the tracked wallet, `None` until the first read lands or while no wallet is set.
pub type BalanceSnapshot = SyncSnapshot<Option<u64>>;

struct BalanceSource {
    ledger: Arc<dyn LedgerClient>,
    wallet: Pubkey,
}

#[async_trait]
impl SyncSource for BalanceSource {
    type Value = Option<u64>;
    type Push = u64;

    fn describe(&self) -> String {
        format!("balance of {}", self.wallet)
    }

    async fn fetch(&self) -> Result<Option<u64>, LedgerError> {
        self.ledger.fetch_balance(&self.wallet).await.map(Some)
    }

    async fn register_push(&self) -> Result<PushSubscription<u64>, LedgerError> {
        self.ledger.subscribe_balance(&self.wallet).await
    }

    fn on_push(&self, lamports: u64) -> PushAction<Option<u64>> {
        PushAction::Publish(Some(lamports))
    }
}

/// Keeps a wallet's native balance in sync with the ledger.
pub struct BalanceWatcher {
    ledger: Arc<dyn LedgerClient>,
    poll_interval: Duration,
    wallet: Option<Pubkey>,
    slot: SyncSlot<Option<u64>>,
}

impl BalanceWatcher {
    pub fn new(ledger: Arc<dyn LedgerClient>, config: &SyncConfig) -> Self {
        Self {
            ledger,
            poll_interval: config.balance_poll_interval(),
            wallet: None,
            slot: SyncSlot::new(SyncSnapshot::ready(None)),
        }
    }

    /// Switches to `wallet`. `None` stops tracking and publishes no balance.
    pub async fn watch(&mut self, wallet: Option<Pubkey>) {
        if wallet == self.wallet && (wallet.is_none() || self.slot.is_active()) {
            return;
        }
        self.wallet = wallet;

        match wallet {
            Some(wallet) => {
                info!("Watching balance of {}", wallet);
                let source = BalanceSource { ledger: Arc::clone(&self.ledger), wallet };
                self.slot.start(source, self.poll_interval, SyncSnapshot::loading(None)).await;
            }
            None => self.slot.stop(SyncSnapshot::ready(None)).await,
        }
    }

    pub fn wallet(&self) -> Option<Pubkey> {
        self.wallet
    }

    pub fn subscribe(&self) -> watch::Receiver<BalanceSnapshot> {
        self.slot.subscribe()
    }

    pub fn snapshot(&self) -> BalanceSnapshot {
        self.slot.snapshot()
    }

    pub fn lamports(&self) -> Option<u64> {
        self.slot.snapshot().value
    }

    /// Balance in whole SOL for display.
    pub fn sol(&self) -> Option<f64> {
        self.lamports().map(|lamports| lamports as f64 / LAMPORTS_PER_SOL as f64)
    }

    pub fn refresh(&self) {
        self.slot.refresh();
    }

    pub async fn stop(&mut self) {
        self.watch(None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_sync::mock_ledger::MockLedger;
    use tokio::time::{Instant, timeout, timeout_at};

    fn key(byte: u8) -> Pubkey {
        Pubkey::new_from_array([byte; 32])
    }

    fn watcher(ledger: &MockLedger) -> BalanceWatcher {
        BalanceWatcher::new(Arc::new(ledger.clone()), &SyncConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_then_push() {
        let ledger = MockLedger::new();
        ledger.set_balance(key(1), 2_500_000_000);

        let mut balance = watcher(&ledger);
        assert_eq!(balance.snapshot(), SyncSnapshot::ready(None));
        balance.watch(Some(key(1))).await;

        let mut rx = balance.subscribe();
        rx.wait_for(|snapshot| snapshot.value.is_some()).await.unwrap();
        assert_eq!(balance.lamports(), Some(2_500_000_000));
        assert_eq!(balance.sol(), Some(2.5));

        let fetches = ledger.fetch_count();
        ledger.set_balance(key(1), 1_000);
        timeout(Duration::from_millis(50), rx.wait_for(|snapshot| snapshot.value == Some(1_000)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ledger.fetch_count(), fetches);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_catches_silent_change() {
        let ledger = MockLedger::new();
        ledger.set_balance(key(2), 10);
        let mut balance = watcher(&ledger);
        balance.watch(Some(key(2))).await;
        let mut rx = balance.subscribe();
        rx.wait_for(|snapshot| snapshot.value == Some(10)).await.unwrap();

        ledger.set_push_enabled(false);
        ledger.set_balance(key(2), 20);
        timeout(SyncConfig::default().balance_poll_interval(), rx.wait_for(|snapshot| snapshot.value == Some(20)))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_wallet_discards_late_read() {
        let ledger = MockLedger::new();
        ledger.set_balance(key(3), 333);
        ledger.set_balance(key(4), 444);
        ledger.set_fetch_delay(key(3), Duration::from_secs(2));

        let mut balance = watcher(&ledger);
        let mut rx = balance.subscribe();
        balance.watch(Some(key(3))).await;
        balance.watch(Some(key(4))).await;

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        while let Ok(Ok(())) = timeout_at(deadline, rx.changed()).await {
            seen.extend(rx.borrow_and_update().value);
        }

        assert!(!seen.is_empty());
        assert!(seen.iter().all(|lamports| *lamports == 444));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_clears_balance() {
        let ledger = MockLedger::new();
        ledger.set_balance(key(5), 5);
        let mut balance = watcher(&ledger);
        balance.watch(Some(key(5))).await;
        let mut rx = balance.subscribe();
        rx.wait_for(|snapshot| snapshot.value.is_some()).await.unwrap();
        assert_eq!(ledger.active_subscriptions(), 1);

        balance.stop().await;
        assert_eq!(balance.wallet(), None);
        assert_eq!(balance.snapshot(), SyncSnapshot::ready(None));
        assert_eq!(ledger.active_subscriptions(), 0);
    }
}
