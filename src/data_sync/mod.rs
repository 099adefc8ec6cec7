/// Data Synchronization Layer
///
/// Keeps local views of on-chain duel accounts current. Every view is fed by two channels:
///
/// - Push notifications over the WebSocket pubsub connection (best-effort, may go silent)
/// - A fixed-interval poll over HTTP JSON-RPC (the staleness backstop)
///
/// Results are published as whole snapshots through `tokio::sync::watch`, last completion wins.
/// Switching or stopping a view tears the old subscription down before a new one starts.

// Ledger access
pub mod ledger;
pub mod mock_ledger;
pub mod rpc;
pub mod websocket;

// Reconciliation
pub mod balance_watcher;
pub mod config;
pub mod duel_set;
pub mod duel_watcher;
pub mod reconcile;
pub mod resolution;
pub mod service;


// Re-export main components for easy usage
pub use balance_watcher::{BalanceSnapshot, BalanceWatcher};
pub use config::SyncConfig;
pub use duel_set::{
    DuelSetWatcher, HistoryView, HistoryWatcher, OpenDuels, OpenDuelsWatcher, ParticipantHistory, SetProjection,
    decode_batch, duel_account_filters,
};
pub use duel_watcher::{DuelSnapshot, DuelState, DuelWatcher};
pub use ledger::{AccountFilter, Commitment, KeyedAccount, LedgerClient, PushSubscription, SolanaLedger};
pub use mock_ledger::MockLedger;
pub use reconcile::SyncSnapshot;
pub use resolution::{ResolutionOutcome, wait_for_resolution};
pub use service::{DuelSyncService, DuelSyncServiceBuilder};
pub use websocket::PubsubManager;
