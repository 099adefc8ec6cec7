use super::types::{AssetKind, DuelRecord, DuelStatus, KeyedDuel};
use solana_program::pubkey::Pubkey;
use std::collections::BTreeMap;

/// How one finished duel ended for a given participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelOutcome {
    Won { profit: i128 },
    Lost { stake: u64 },
    /// Stake returned, no profit or loss.
    Cancelled { refund: u64 },
}

impl DuelOutcome {
    /// Signed effect on the participant's balance in the duel's asset.
    pub fn net(&self) -> i128 {
        match self {
            Self::Won { profit } => *profit,
            Self::Lost { stake } => -i128::from(*stake),
            Self::Cancelled { .. } => 0,
        }
    }
}

/// Outcome of a terminal duel for `participant`.
///
/// Anything that is not cancelled and not won by `participant` counts as a loss, as the record
/// set fed here is already restricted to finished duels the participant took part in.
pub fn outcome_for(record: &DuelRecord, participant: &Pubkey) -> DuelOutcome {
    if record.status == DuelStatus::Cancelled {
        return DuelOutcome::Cancelled { refund: record.bet_amount };
    }
    if record.winner == *participant {
        DuelOutcome::Won { profit: record.payout().winner_profit() }
    } else {
        DuelOutcome::Lost { stake: record.bet_amount }
    }
}

/// Win/loss summary over a participant's finished duels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStats {
    /// Every record considered, cancelled ones included.
    pub total_duels: usize,
    pub wins: usize,
    pub losses: usize,
    pub cancelled: usize,
    /// Percentage with one decimal, "0.0" when nothing was decided.
    pub win_rate: String,
    /// Net result per asset in that asset's smallest unit.
    pub net_profit: BTreeMap<AssetKind, i128>,
}

impl Default for HistoryStats {
    fn default() -> Self {
        Self {
            total_duels: 0,
            wins: 0,
            losses: 0,
            cancelled: 0,
            win_rate: "0.0".to_string(),
            net_profit: BTreeMap::new(),
        }
    }
}

impl HistoryStats {
    pub fn net_for(&self, asset: &AssetKind) -> i128 {
        self.net_profit.get(asset).copied().unwrap_or_default()
    }

    pub fn net_native(&self) -> i128 {
        self.net_for(&AssetKind::Native)
    }

    /// True when no asset has a non-zero net result.
    pub fn is_even(&self) -> bool {
        self.net_profit.values().all(|net| *net == 0)
    }
}

pub fn compute_history_stats<'a, I>(records: I, participant: &Pubkey) -> HistoryStats
where
    I: IntoIterator<Item = &'a DuelRecord>,
{
    let mut stats = HistoryStats::default();

    for record in records {
        stats.total_duels += 1;
        let outcome = outcome_for(record, participant);
        match outcome {
            DuelOutcome::Cancelled { .. } => {
                stats.cancelled += 1;
                continue;
            }
            DuelOutcome::Won { .. } => stats.wins += 1,
            DuelOutcome::Lost { .. } => stats.losses += 1,
        }
        *stats.net_profit.entry(record.asset_kind()).or_default() += outcome.net();
    }

    let decided = stats.wins + stats.losses;
    if decided > 0 {
        stats.win_rate = format_win_rate(stats.wins, decided);
    }

    stats
}

/// `wins / decided` as a percentage with one decimal, halves rounded up.
fn format_win_rate(wins: usize, decided: usize) -> String {
    let (wins, decided) = (wins as u128, decided as u128);
    let tenths = (wins * 2_000 + decided) / (decided * 2);
    format!("{}.{}", tenths / 10, tenths % 10)
}

/// Finished duels `participant` created or joined.
pub fn is_history_of(record: &DuelRecord, participant: &Pubkey) -> bool {
    record.status.is_terminal() && record.is_participant(participant)
}

/// Newest first by `created_at`. Ties keep their incoming order.
pub fn sort_newest_first(duels: &mut [KeyedDuel]) {
    duels.sort_by(|a, b| b.record.created_at.cmp(&a.record.created_at));
}
