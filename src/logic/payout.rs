/// Fee rates are expressed in hundredths of a percent.
pub const BASIS_POINTS_DENOMINATOR: u128 = 10_000;

/// Settlement amounts of a two-player duel.
///
/// The fee is floored with integer division, the same truncation the program applies when it
/// transfers the pot, and never exceeds the pot. Amounts are `u128` so doubling a `u64` stake
/// cannot overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payout {
    pub total_pot: u128,
    pub fee: u128,
    pub winner_payout: u128,
}

impl Payout {
    pub fn compute(bet_amount: u64, fee_basis_points: u16) -> Self {
        let total_pot = u128::from(bet_amount) * 2;
        // rates above 10_000 bps are representable on chain
        let fee = (total_pot * u128::from(fee_basis_points) / BASIS_POINTS_DENOMINATOR).min(total_pot);
        Self { total_pot, fee, winner_payout: total_pot - fee }
    }

    /// Winner's gain over their own stake.
    pub fn winner_profit(&self) -> i128 {
        let stake = self.total_pot / 2;
        // winner_payout and stake are both bounded by 2 * u64::MAX
        self.winner_payout as i128 - stake as i128
    }
}

/// Fee rate as a percentage for display, e.g. 300 bps -> 3.0.
pub fn fee_percent(fee_basis_points: u16) -> f64 {
    f64::from(fee_basis_points) / 100.0
}
