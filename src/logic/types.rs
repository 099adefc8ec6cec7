use super::payout::Payout;
use crate::utils::constants::ZERO_PUBKEY;
use solana_program::pubkey::Pubkey;
use strum_macros::Display;

/// Lifecycle of a duel as stored by the program.
///
/// The first five variants follow the program's ordinal order. `Unknown` keeps the raw byte of
/// any state this client predates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DuelStatus {
    WaitingForOpponent,
    /// Challenger joined, VRF requested.
    Active,
    Resolved,
    Claimed,
    Cancelled,
    Unknown(u8),
}

impl DuelStatus {
    pub fn from_ordinal(ordinal: u8) -> Self {
        match ordinal {
            0 => Self::WaitingForOpponent,
            1 => Self::Active,
            2 => Self::Resolved,
            3 => Self::Claimed,
            4 => Self::Cancelled,
            other => Self::Unknown(other),
        }
    }

    pub fn ordinal(&self) -> u8 {
        match self {
            Self::WaitingForOpponent => 0,
            Self::Active => 1,
            Self::Resolved => 2,
            Self::Claimed => 3,
            Self::Cancelled => 4,
            Self::Unknown(raw) => *raw,
        }
    }

    /// Status used for every filtering decision.
    ///
    /// Unknown ordinals fall back to `WaitingForOpponent`. A resolved duel from a newer program
    /// version can therefore show up as open.
    pub fn effective(&self) -> Self {
        match self {
            Self::Unknown(_) => Self::WaitingForOpponent,
            known => *known,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }

    pub fn is_waiting(&self) -> bool {
        self.effective() == Self::WaitingForOpponent
    }

    /// Resolved or claimed: the winner field is meaningful.
    pub fn has_winner(&self) -> bool {
        matches!(self, Self::Resolved | Self::Claimed)
    }

    /// No further transitions expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Claimed | Self::Cancelled)
    }
}

/// Denomination of a duel's stake. Net profit is never summed across kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    Native,
    Token(Pubkey),
}

impl AssetKind {
    pub fn from_asset_id(asset_id: Pubkey) -> Self {
        if asset_id == ZERO_PUBKEY { Self::Native } else { Self::Token(asset_id) }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native)
    }
}

/// Which seat of the duel a key occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Side {
    Creator,
    Challenger,
}

/// Decoded duel account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuelRecord {
    pub creator: Pubkey,
    /// `ZERO_PUBKEY` until someone joins.
    pub challenger: Pubkey,
    /// Smallest unit of the wagered asset (lamports or token base units).
    pub bet_amount: u64,
    /// `ZERO_PUBKEY` for native SOL, otherwise the token mint.
    pub asset_id: Pubkey,
    pub fee_basis_points: u16,
    pub status: DuelStatus,
    /// Only meaningful when the status is resolved or claimed.
    pub winner: Pubkey,
    pub escrow_bump: u8,
    pub custody_bump: u8,
    pub created_at: i64,
    pub randomness_result: Option<[u8; 32]>,
}

impl DuelRecord {
    pub fn asset_kind(&self) -> AssetKind {
        AssetKind::from_asset_id(self.asset_id)
    }

    pub fn is_token_duel(&self) -> bool {
        !self.asset_kind().is_native()
    }

    pub fn has_challenger(&self) -> bool {
        self.challenger != ZERO_PUBKEY
    }

    pub fn is_creator(&self, key: &Pubkey) -> bool {
        self.creator == *key
    }

    /// Creator, or a non-sentinel challenger.
    pub fn is_participant(&self, key: &Pubkey) -> bool {
        self.creator == *key || (self.has_challenger() && self.challenger == *key)
    }

    /// The other seat from `key`'s point of view.
    pub fn opponent_of(&self, key: &Pubkey) -> Pubkey {
        if self.is_creator(key) { self.challenger } else { self.creator }
    }

    /// Seat of the winner once the duel has one.
    pub fn winner_side(&self) -> Option<Side> {
        if !self.status.has_winner() {
            return None;
        }
        if self.winner == self.creator { Some(Side::Creator) } else { Some(Side::Challenger) }
    }

    pub fn payout(&self) -> Payout {
        Payout::compute(self.bet_amount, self.fee_basis_points)
    }
}

/// A duel record together with the account it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedDuel {
    pub pubkey: Pubkey,
    pub record: DuelRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: DuelStatus) -> DuelRecord {
        DuelRecord {
            creator: Pubkey::new_from_array([1u8; 32]),
            challenger: ZERO_PUBKEY,
            bet_amount: 100_000_000,
            asset_id: ZERO_PUBKEY,
            fee_basis_points: 300,
            status,
            winner: ZERO_PUBKEY,
            escrow_bump: 255,
            custody_bump: 254,
            created_at: 1_700_000_000,
            randomness_result: None,
        }
    }

    #[test]
    fn test_status_ordinals() {
        for ordinal in 0..=4u8 {
            let status = DuelStatus::from_ordinal(ordinal);
            assert!(!status.is_unknown());
            assert_eq!(status.ordinal(), ordinal);
        }
        assert_eq!(DuelStatus::from_ordinal(7), DuelStatus::Unknown(7));
        assert_eq!(DuelStatus::Unknown(7).ordinal(), 7);
    }

    #[test]
    fn test_unknown_status_treated_as_waiting() {
        let status = DuelStatus::Unknown(200);
        assert_eq!(status.effective(), DuelStatus::WaitingForOpponent);
        assert!(status.is_waiting());
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(DuelStatus::WaitingForOpponent.to_string(), "waiting_for_opponent");
        assert_eq!(DuelStatus::Claimed.to_string(), "claimed");
    }

    #[test]
    fn test_asset_kind() {
        let mut duel = record(DuelStatus::WaitingForOpponent);
        assert_eq!(duel.asset_kind(), AssetKind::Native);
        assert!(!duel.is_token_duel());

        let mint = Pubkey::new_from_array([9u8; 32]);
        duel.asset_id = mint;
        assert_eq!(duel.asset_kind(), AssetKind::Token(mint));
        assert!(duel.is_token_duel());
    }

    #[test]
    fn test_participant_ignores_sentinel_challenger() {
        let duel = record(DuelStatus::Cancelled);
        assert!(duel.is_participant(&duel.creator));
        assert!(!duel.is_participant(&ZERO_PUBKEY));
    }

    #[test]
    fn test_winner_side() {
        let mut duel = record(DuelStatus::Active);
        let challenger = Pubkey::new_from_array([2u8; 32]);
        duel.challenger = challenger;
        duel.winner = challenger;
        assert_eq!(duel.winner_side(), None);

        duel.status = DuelStatus::Resolved;
        assert_eq!(duel.winner_side(), Some(Side::Challenger));

        duel.winner = duel.creator;
        duel.status = DuelStatus::Claimed;
        assert_eq!(duel.winner_side(), Some(Side::Creator));
        assert_eq!(duel.opponent_of(&duel.creator), challenger);
        assert_eq!(duel.opponent_of(&challenger), duel.creator);
    }
}
