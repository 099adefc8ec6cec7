// Two-Layer Architecture
pub mod data_sync; // Data Layer: ledger access, push + poll reconciliation
pub mod logic; // Logic Layer: record decoding, payouts, history stats

// Common utilities and types
pub mod error;
pub mod utils;

// Re-export key components from each layer
pub use data_sync::{
    BalanceWatcher, DuelState, DuelSyncService, DuelSyncServiceBuilder, DuelWatcher, HistoryView, HistoryWatcher, LedgerClient,
    MockLedger, OpenDuelsWatcher, ResolutionOutcome, SyncConfig, SyncSnapshot,
};
pub use error::{DecodeError, LedgerError};
pub use logic::{
    AssetKind, DuelOutcome, DuelRecord, DuelStatus, HistoryStats, KeyedDuel, Payout, Side, compute_history_stats,
    decode_duel, encode_duel,
};
