use crate::data_sync::ledger::{AccountFilter, KeyedAccount, LedgerClient, PushSubscription};
use crate::error::LedgerError;
use crate::logic::{DuelRecord, encode_duel};
use async_trait::async_trait;
use dashmap::DashMap;
use solana_program::pubkey::Pubkey;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

enum MockSink {
    Account { pubkey: Pubkey, tx: mpsc::Sender<Vec<u8>> },
    Program { program_id: Pubkey, filters: Vec<AccountFilter>, tx: mpsc::Sender<()> },
    Balance { pubkey: Pubkey, tx: mpsc::Sender<u64> },
}

#[derive(Default)]
struct MockState {
    accounts: DashMap<Pubkey, (Pubkey, Vec<u8>)>,
    balances: DashMap<Pubkey, u64>,
    sinks: DashMap<u64, MockSink>,
    fetch_delays: DashMap<Pubkey, Duration>,
    program_fetch_delays: DashMap<usize, Duration>,
    program_fetch_count: AtomicUsize,
    next_sink_id: AtomicU64,
    push_enabled: AtomicBool,
    failing: AtomicBool,
    fetch_count: AtomicUsize,
}

/// In-memory ledger for tests, demos and benchmarks.
///
/// Accounts are owned by a program id. Push delivery can be switched off to simulate a silent
/// pubsub channel, individual reads can be delayed, and all calls can be made to fail.
#[derive(Clone)]
pub struct MockLedger {
    state: Arc<MockState>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        let state = MockState { push_enabled: AtomicBool::new(true), ..MockState::default() };
        Self { state: Arc::new(state) }
    }

    pub fn set_account(&self, owner: Pubkey, pubkey: Pubkey, data: Vec<u8>) {
        self.state.accounts.insert(pubkey, (owner, data.clone()));
        self.notify(&owner, &pubkey, &data);
    }

    pub fn set_duel(&self, owner: Pubkey, pubkey: Pubkey, record: &DuelRecord) {
        self.set_account(owner, pubkey, encode_duel(record).to_vec());
    }

    /// Removes the account. Program listeners are told; account listeners hear nothing, like a
    /// closed account on chain until the next read.
    pub fn remove_account(&self, pubkey: &Pubkey) {
        if let Some((_, (owner, data))) = self.state.accounts.remove(pubkey) {
            if self.push_enabled() {
                for sink in self.state.sinks.iter() {
                    if let MockSink::Program { program_id, filters, tx } = sink.value() {
                        if *program_id == owner && filters.iter().all(|filter| filter.matches(&data)) {
                            let _ = tx.try_send(());
                        }
                    }
                }
            }
        }
    }

    /// Sets the lamports of `pubkey` and tells balance listeners.
    pub fn set_balance(&self, pubkey: Pubkey, lamports: u64) {
        self.state.balances.insert(pubkey, lamports);
        if !self.push_enabled() {
            return;
        }
        for sink in self.state.sinks.iter() {
            if let MockSink::Balance { pubkey: watched, tx } = sink.value() {
                if *watched == pubkey {
                    let _ = tx.try_send(lamports);
                }
            }
        }
    }

    pub fn set_push_enabled(&self, enabled: bool) {
        self.state.push_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn push_enabled(&self) -> bool {
        self.state.push_enabled.load(Ordering::SeqCst)
    }

    /// Every call fails with a transport error while set.
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// Reads of `pubkey` take `delay` before returning what the account holds at that point.
    pub fn set_fetch_delay(&self, pubkey: Pubkey, delay: Duration) {
        self.state.fetch_delays.insert(pubkey, delay);
    }

    /// The `nth` bulk read (counting from 0) takes `delay` before it looks at the accounts.
    pub fn set_program_fetch_delay(&self, nth: usize, delay: Duration) {
        self.state.program_fetch_delays.insert(nth, delay);
    }

    pub fn fetch_count(&self) -> usize {
        self.state.fetch_count.load(Ordering::SeqCst)
    }

    pub fn active_subscriptions(&self) -> usize {
        self.state.sinks.len()
    }

    fn notify(&self, owner: &Pubkey, pubkey: &Pubkey, data: &[u8]) {
        if !self.push_enabled() {
            return;
        }

        for sink in self.state.sinks.iter() {
            match sink.value() {
                MockSink::Account { pubkey: watched, tx } if watched == pubkey => {
                    let _ = tx.try_send(data.to_vec());
                }
                MockSink::Program { program_id, filters, tx }
                    if program_id == owner && filters.iter().all(|filter| filter.matches(data)) =>
                {
                    let _ = tx.try_send(());
                }
                _ => {}
            }
        }
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.state.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::Rpc { code: -32_005, message: "Node is unhealthy".to_string() });
        }
        Ok(())
    }

    fn add_sink<T>(&self, sink: MockSink, rx: mpsc::Receiver<T>) -> PushSubscription<T> {
        let id = self.state.next_sink_id.fetch_add(1, Ordering::SeqCst);
        self.state.sinks.insert(id, sink);

        let state = Arc::clone(&self.state);
        PushSubscription::new(rx, move || {
            state.sinks.remove(&id);
        })
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn fetch_account(&self, pubkey: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        self.state.fetch_count.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.fetch_delays.get(pubkey).map(|delay| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_available()?;

        Ok(self.state.accounts.get(pubkey).map(|account| account.value().1.clone()))
    }

    async fn fetch_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
    ) -> Result<Vec<KeyedAccount>, LedgerError> {
        self.state.fetch_count.fetch_add(1, Ordering::SeqCst);
        let nth = self.state.program_fetch_count.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.program_fetch_delays.remove(&nth).map(|(_, delay)| delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_available()?;

        // Stable order, like a real node returning accounts sorted by key.
        let matching: BTreeMap<Pubkey, Vec<u8>> = self
            .state
            .accounts
            .iter()
            .filter(|entry| entry.value().0 == *program_id)
            .filter(|entry| filters.iter().all(|filter| filter.matches(&entry.value().1)))
            .map(|entry| (*entry.key(), entry.value().1.clone()))
            .collect();

        Ok(matching.into_iter().map(|(pubkey, data)| KeyedAccount { pubkey, data }).collect())
    }

    async fn subscribe_account(&self, pubkey: &Pubkey) -> Result<PushSubscription<Vec<u8>>, LedgerError> {
        self.check_available()?;
        let (tx, rx) = mpsc::channel(16);
        Ok(self.add_sink(MockSink::Account { pubkey: *pubkey, tx }, rx))
    }

    async fn subscribe_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
    ) -> Result<PushSubscription<()>, LedgerError> {
        self.check_available()?;
        let (tx, rx) = mpsc::channel(16);
        Ok(self.add_sink(MockSink::Program { program_id: *program_id, filters: filters.to_vec(), tx }, rx))
    }

    async fn fetch_balance(&self, pubkey: &Pubkey) -> Result<u64, LedgerError> {
        self.state.fetch_count.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.fetch_delays.get(pubkey).map(|delay| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_available()?;

        Ok(self.state.balances.get(pubkey).map(|lamports| *lamports).unwrap_or_default())
    }

    async fn subscribe_balance(&self, pubkey: &Pubkey) -> Result<PushSubscription<u64>, LedgerError> {
        self.check_available()?;
        let (tx, rx) = mpsc::channel(16);
        Ok(self.add_sink(MockSink::Balance { pubkey: *pubkey, tx }, rx))
    }
}
