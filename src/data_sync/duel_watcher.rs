use crate::data_sync::config::SyncConfig;
use crate::data_sync::ledger::{LedgerClient, PushSubscription};
use crate::data_sync::reconcile::{PushAction, SyncSlot, SyncSnapshot, SyncSource};
use crate::data_sync::resolution::{ResolutionOutcome, wait_for_resolution};
use crate::error::LedgerError;
use crate::logic::{DuelRecord, decode_duel};
use async_trait::async_trait;
use solana_program::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// What is currently known about the tracked duel.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DuelState {
    /// No identifier yet, or the first read has not come back.
    #[default]
    NotYetLoaded,
    /// The account does not exist (never created or already closed) or could not be decoded.
    Absent,
    Present(Arc<DuelRecord>),
}

impl DuelState {
    pub fn record(&self) -> Option<&DuelRecord> {
        match self {
            Self::Present(record) => Some(record),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Decodes raw account bytes. A malformed record is reported as absent.
    pub fn from_account(pubkey: &Pubkey, data: Option<&[u8]>) -> Self {
        let Some(data) = data else {
            return Self::Absent;
        };

        match decode_duel(data) {
            Ok(record) => {
                if record.status.is_unknown() {
                    warn!("Duel {} has unknown status {:?}, treating it as waiting", pubkey, record.status);
                }
                Self::Present(Arc::new(record))
            }
            Err(e) => {
                warn!("Failed to decode duel {}: {}", pubkey, e);
                Self::Absent
            }
        }
    }
}

pub type DuelSnapshot = SyncSnapshot<DuelState>;

struct DuelSource {
    ledger: Arc<dyn LedgerClient>,
    pubkey: Pubkey,
}

#[async_trait]
impl SyncSource for DuelSource {
    type Value = DuelState;
    type Push = Vec<u8>;

    fn describe(&self) -> String {
        format!("duel {}", self.pubkey)
    }

    async fn fetch(&self) -> Result<DuelState, LedgerError> {
        let data = self.ledger.fetch_account(&self.pubkey).await?;
        Ok(DuelState::from_account(&self.pubkey, data.as_deref()))
    }

    async fn register_push(&self) -> Result<PushSubscription<Vec<u8>>, LedgerError> {
        self.ledger.subscribe_account(&self.pubkey).await
    }

    fn on_push(&self, data: Vec<u8>) -> PushAction<DuelState> {
        PushAction::Publish(DuelState::from_account(&self.pubkey, Some(&data)))
    }
}

/// Keeps one duel record in sync with the ledger.
///
/// Each call to [`DuelWatcher::watch`] with a new identifier fully tears down the previous
/// subscription before starting the next one.
pub struct DuelWatcher {
    ledger: Arc<dyn LedgerClient>,
    poll_interval: Duration,
    vrf_timeout: Duration,
    target: Option<Pubkey>,
    slot: SyncSlot<DuelState>,
}

impl DuelWatcher {
    pub fn new(ledger: Arc<dyn LedgerClient>, config: &SyncConfig) -> Self {
        Self {
            ledger,
            poll_interval: config.duel_poll_interval(),
            vrf_timeout: config.vrf_timeout(),
            target: None,
            slot: SyncSlot::new(SyncSnapshot::ready(DuelState::NotYetLoaded)),
        }
    }

    /// Switches to `target`. `None` stops tracking and publishes "not yet loaded".
    pub async fn watch(&mut self, target: Option<Pubkey>) {
        if target == self.target && (target.is_none() || self.slot.is_active()) {
            return;
        }
        self.target = target;

        match target {
            Some(pubkey) => {
                info!("Watching duel {}", pubkey);
                let source = DuelSource { ledger: Arc::clone(&self.ledger), pubkey };
                self.slot.start(source, self.poll_interval, SyncSnapshot::loading(DuelState::NotYetLoaded)).await;
            }
            None => {
                self.slot.stop(SyncSnapshot::ready(DuelState::NotYetLoaded)).await;
            }
        }
    }

    pub fn target(&self) -> Option<Pubkey> {
        self.target
    }

    pub fn subscribe(&self) -> watch::Receiver<DuelSnapshot> {
        self.slot.subscribe()
    }

    pub fn snapshot(&self) -> DuelSnapshot {
        self.slot.snapshot()
    }

    pub fn refresh(&self) {
        self.slot.refresh();
    }

    pub async fn stop(&mut self) {
        self.watch(None).await;
    }

    /// Waits until the tracked duel is resolved or claimed, up to the configured VRF timeout.
    /// Timing out leaves the subscription running.
    pub async fn wait_for_resolution(&self) -> ResolutionOutcome {
        let mut rx = self.subscribe();
        wait_for_resolution(&mut rx, self.vrf_timeout).await
    }
}
