use solana_program::pubkey::Pubkey;

pub const DUEL_SEED: &[u8] = b"duel";
pub const ESCROW_SEED: &[u8] = b"escrow";
pub const TOKEN_ESCROW_SEED: &[u8] = b"token_escrow";

/// Duel account address: `["duel", creator, created_at (i64 LE)]`.
pub fn derive_duel_pda(program_id: &Pubkey, creator: &Pubkey, created_at: i64) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[DUEL_SEED, creator.as_ref(), &created_at.to_le_bytes()], program_id)
}

/// Native SOL escrow of a duel: `["escrow", duel]`.
pub fn derive_escrow_pda(program_id: &Pubkey, duel: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[ESCROW_SEED, duel.as_ref()], program_id)
}

/// Token escrow of a duel: `["token_escrow", duel]`.
pub fn derive_token_escrow_pda(program_id: &Pubkey, duel: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[TOKEN_ESCROW_SEED, duel.as_ref()], program_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::PROGRAM_ID;

    #[test]
    fn test_duel_pda_matches_seeds() {
        let creator = Pubkey::new_from_array([4u8; 32]);
        let created_at = 1_735_689_600i64;
        let (duel, bump) = derive_duel_pda(&PROGRAM_ID, &creator, created_at);

        let recreated = Pubkey::create_program_address(
            &[DUEL_SEED, creator.as_ref(), &created_at.to_le_bytes(), &[bump]],
            &PROGRAM_ID,
        )
        .unwrap();
        assert_eq!(duel, recreated);
    }

    #[test]
    fn test_escrows_differ_per_asset() {
        let duel = Pubkey::new_from_array([5u8; 32]);
        let (escrow, _) = derive_escrow_pda(&PROGRAM_ID, &duel);
        let (token_escrow, _) = derive_token_escrow_pda(&PROGRAM_ID, &duel);
        assert_ne!(escrow, token_escrow);
        assert_eq!(derive_escrow_pda(&PROGRAM_ID, &duel).0, escrow);
    }

    #[test]
    fn test_created_at_changes_address() {
        let creator = Pubkey::new_from_array([6u8; 32]);
        let (first, _) = derive_duel_pda(&PROGRAM_ID, &creator, 1);
        let (second, _) = derive_duel_pda(&PROGRAM_ID, &creator, 2);
        assert_ne!(first, second);
    }
}
