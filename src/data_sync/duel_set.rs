use crate::data_sync::config::SyncConfig;
use crate::data_sync::ledger::{AccountFilter, KeyedAccount, LedgerClient, PushSubscription};
use crate::data_sync::reconcile::{PushAction, SyncSlot, SyncSnapshot, SyncSource};
use crate::error::LedgerError;
use crate::logic::{
    DUEL_ACCOUNT_SIZE, HistoryStats, KeyedDuel, compute_history_stats, decode_duel, duel_account_discriminator,
    is_history_of, sort_newest_first,
};
use async_trait::async_trait;
use solana_program::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Client-side view over the decoded set of all duel accounts.
pub trait SetProjection: Clone + PartialEq + Send + Sync + 'static {
    type Output: Clone + Default + Send + Sync + 'static;

    fn describe(&self) -> String;

    fn project(&self, duels: Vec<KeyedDuel>) -> Self::Output;
}

/// Duels still waiting for a challenger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenDuels;

impl SetProjection for OpenDuels {
    type Output = Vec<KeyedDuel>;

    fn describe(&self) -> String {
        "open duels".to_string()
    }

    fn project(&self, duels: Vec<KeyedDuel>) -> Vec<KeyedDuel> {
        duels.into_iter().filter(|duel| duel.record.status.is_waiting()).collect()
    }
}

/// Finished duels of one participant, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipantHistory {
    pub participant: Pubkey,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HistoryView {
    pub duels: Vec<KeyedDuel>,
    pub stats: HistoryStats,
}

impl SetProjection for ParticipantHistory {
    type Output = HistoryView;

    fn describe(&self) -> String {
        format!("history of {}", self.participant)
    }

    fn project(&self, duels: Vec<KeyedDuel>) -> HistoryView {
        let mut duels: Vec<KeyedDuel> =
            duels.into_iter().filter(|duel| is_history_of(&duel.record, &self.participant)).collect();
        sort_newest_first(&mut duels);
        let stats = compute_history_stats(duels.iter().map(|duel| &duel.record), &self.participant);
        HistoryView { duels, stats }
    }
}

/// Decodes every account independently; malformed ones are skipped.
pub fn decode_batch(accounts: Vec<KeyedAccount>) -> Vec<KeyedDuel> {
    let total = accounts.len();
    let duels: Vec<KeyedDuel> = accounts
        .into_iter()
        .filter_map(|account| match decode_duel(&account.data) {
            Ok(record) => {
                if record.status.is_unknown() {
                    debug!("Duel {} has unknown status {:?}", account.pubkey, record.status);
                }
                Some(KeyedDuel { pubkey: account.pubkey, record })
            }
            Err(e) => {
                warn!("Skipping duel {}: {}", account.pubkey, e);
                None
            }
        })
        .collect();

    if duels.len() < total {
        warn!("Decoded {} of {} duel accounts", duels.len(), total);
    }
    duels
}

/// Server-side filters selecting duel accounts.
pub fn duel_account_filters(filter_by_discriminator: bool) -> Vec<AccountFilter> {
    let mut filters = vec![AccountFilter::DataSize(DUEL_ACCOUNT_SIZE as u64)];
    if filter_by_discriminator {
        filters.push(AccountFilter::Memcmp { offset: 0, bytes: duel_account_discriminator().to_vec() });
    }
    filters
}

struct SetSource<P> {
    ledger: Arc<dyn LedgerClient>,
    program_id: Pubkey,
    filters: Vec<AccountFilter>,
    projection: P,
}

#[async_trait]
impl<P: SetProjection> SyncSource for SetSource<P> {
    type Value = P::Output;
    type Push = ();

    fn describe(&self) -> String {
        self.projection.describe()
    }

    async fn fetch(&self) -> Result<P::Output, LedgerError> {
        let accounts = self.ledger.fetch_program_accounts(&self.program_id, &self.filters).await?;
        Ok(self.projection.project(decode_batch(accounts)))
    }

    async fn register_push(&self) -> Result<PushSubscription<()>, LedgerError> {
        self.ledger.subscribe_program_accounts(&self.program_id, &self.filters).await
    }

    fn on_push(&self, _event: ()) -> PushAction<P::Output> {
        PushAction::Refetch
    }
}

/// Keeps a projection of all duel accounts in sync with the ledger.
pub struct DuelSetWatcher<P: SetProjection> {
    ledger: Arc<dyn LedgerClient>,
    program_id: Pubkey,
    filters: Vec<AccountFilter>,
    poll_interval: Duration,
    current: Option<P>,
    slot: SyncSlot<P::Output>,
}

pub type OpenDuelsWatcher = DuelSetWatcher<OpenDuels>;
pub type HistoryWatcher = DuelSetWatcher<ParticipantHistory>;

impl<P: SetProjection> DuelSetWatcher<P> {
    fn with_interval(ledger: Arc<dyn LedgerClient>, program_id: Pubkey, config: &SyncConfig, poll_interval: Duration) -> Self {
        Self {
            ledger,
            program_id,
            filters: duel_account_filters(config.filter_by_discriminator),
            poll_interval,
            current: None,
            slot: SyncSlot::new(SyncSnapshot::ready(P::Output::default())),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot<P::Output>> {
        self.slot.subscribe()
    }

    pub fn snapshot(&self) -> SyncSnapshot<P::Output> {
        self.slot.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.slot.is_active()
    }

    pub fn refresh(&self) {
        self.slot.refresh();
    }

    /// Restarts with `projection` unless it is already the one running.
    async fn start_with(&mut self, projection: P) {
        if self.current.as_ref() == Some(&projection) && self.slot.is_active() {
            return;
        }
        self.current = Some(projection.clone());

        info!("Starting sync of {}", projection.describe());
        let source = SetSource {
            ledger: Arc::clone(&self.ledger),
            program_id: self.program_id,
            filters: self.filters.clone(),
            projection,
        };
        self.slot.start(source, self.poll_interval, SyncSnapshot::loading(P::Output::default())).await;
    }

    /// Stops syncing and publishes an empty, settled view.
    pub async fn stop(&mut self) {
        self.current = None;
        self.slot.stop(SyncSnapshot::ready(P::Output::default())).await;
    }
}

impl DuelSetWatcher<OpenDuels> {
    pub fn new(ledger: Arc<dyn LedgerClient>, program_id: Pubkey, config: &SyncConfig) -> Self {
        Self::with_interval(ledger, program_id, config, config.lobby_poll_interval())
    }

    /// Starts syncing. Calling it while running is a no-op.
    pub async fn start(&mut self) {
        self.start_with(OpenDuels).await;
    }
}

impl DuelSetWatcher<ParticipantHistory> {
    pub fn new(ledger: Arc<dyn LedgerClient>, program_id: Pubkey, config: &SyncConfig) -> Self {
        Self::with_interval(ledger, program_id, config, config.history_poll_interval())
    }

    pub fn participant(&self) -> Option<Pubkey> {
        self.current.map(|history| history.participant)
    }

    /// Switches to `participant`. `None` publishes an empty view that is not loading.
    pub async fn track(&mut self, participant: Option<Pubkey>) {
        match participant {
            Some(participant) => self.start_with(ParticipantHistory { participant }).await,
            None => self.stop().await,
        }
    }
}
