/// Logic Layer
///
/// Pure functions over duel accounts, no I/O:
/// - Fixed-layout decoding of raw account bytes
/// - Fee and payout arithmetic matching the program's integer truncation
/// - Win/loss and net-profit aggregation over a participant's history

pub mod decoder;
pub mod history;
pub mod payout;
pub mod types;

pub use decoder::{DUEL_ACCOUNT_SIZE, decode_duel, duel_account_discriminator, encode_duel};
pub use history::{DuelOutcome, HistoryStats, compute_history_stats, is_history_of, outcome_for, sort_newest_first};
pub use payout::{Payout, fee_percent};
pub use types::{AssetKind, DuelRecord, DuelStatus, KeyedDuel, Side};
