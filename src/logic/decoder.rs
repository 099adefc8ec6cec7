//! Fixed-layout decoding of duel accounts.
//!
//! Accounts are read straight from their bytes without the program's IDL, so the layout lives
//! here as offsets:
//!
//! ```text
//!   0..8    discriminator (ignored, used only for filtering)
//!   8..40   creator
//!  40..72   challenger
//!  72..80   bet_amount (u64 LE)
//!  80..112  asset id / token mint
//! 112..114  fee_bps (u16 LE)
//! 114..115  status ordinal
//! 115..147  winner
//! 147..148  escrow bump
//! 148..149  custody bump
//! 149..157  created_at (i64 LE)
//! 157..158  randomness tag (1 = present)
//! 158..190  randomness bytes
//! ```

use super::types::{DuelRecord, DuelStatus};
use crate::error::DecodeError;
use sha2::{Digest, Sha256};
use solana_program::pubkey::Pubkey;

pub const DISCRIMINATOR_LEN: usize = 8;
pub const PUBKEY_LEN: usize = 32;
pub const RANDOMNESS_LEN: usize = 32;
/// Accounts are always allocated at full size, randomness slot included.
pub const DUEL_ACCOUNT_SIZE: usize = 190;

const CREATOR_OFFSET: usize = 8;
const CHALLENGER_OFFSET: usize = 40;
const BET_AMOUNT_OFFSET: usize = 72;
const ASSET_ID_OFFSET: usize = 80;
const FEE_BPS_OFFSET: usize = 112;
const STATUS_OFFSET: usize = 114;
const WINNER_OFFSET: usize = 115;
const ESCROW_BUMP_OFFSET: usize = 147;
const CUSTODY_BUMP_OFFSET: usize = 148;
const CREATED_AT_OFFSET: usize = 149;
const RANDOMNESS_TAG_OFFSET: usize = 157;
const RANDOMNESS_OFFSET: usize = 158;

/// First eight bytes of `sha256("account:Duel")`, the tag the program writes at offset 0.
pub fn duel_account_discriminator() -> [u8; DISCRIMINATOR_LEN] {
    let hash = Sha256::digest(b"account:Duel");
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&hash[..DISCRIMINATOR_LEN]);
    out
}

/// Decodes a duel account.
///
/// Only the length is validated. Identifiers and integers are taken verbatim and an unknown
/// status ordinal becomes `DuelStatus::Unknown`; judging whether the record makes sense is the
/// caller's business.
pub fn decode_duel(data: &[u8]) -> Result<DuelRecord, DecodeError> {
    if data.len() < DUEL_ACCOUNT_SIZE {
        return Err(DecodeError::MalformedRecord { expected: DUEL_ACCOUNT_SIZE, actual: data.len() });
    }

    let randomness_result = if data[RANDOMNESS_TAG_OFFSET] == 1 {
        let mut out = [0u8; RANDOMNESS_LEN];
        out.copy_from_slice(&data[RANDOMNESS_OFFSET..RANDOMNESS_OFFSET + RANDOMNESS_LEN]);
        Some(out)
    } else {
        None
    };

    Ok(DuelRecord {
        creator: read_pubkey_at(data, CREATOR_OFFSET),
        challenger: read_pubkey_at(data, CHALLENGER_OFFSET),
        bet_amount: read_u64_at(data, BET_AMOUNT_OFFSET),
        asset_id: read_pubkey_at(data, ASSET_ID_OFFSET),
        fee_basis_points: read_u16_at(data, FEE_BPS_OFFSET),
        status: DuelStatus::from_ordinal(data[STATUS_OFFSET]),
        winner: read_pubkey_at(data, WINNER_OFFSET),
        escrow_bump: data[ESCROW_BUMP_OFFSET],
        custody_bump: data[CUSTODY_BUMP_OFFSET],
        created_at: read_i64_at(data, CREATED_AT_OFFSET),
        randomness_result,
    })
}

/// Writes `record` in the program's layout. Used for fixtures and for checking the decoder.
pub fn encode_duel(record: &DuelRecord) -> [u8; DUEL_ACCOUNT_SIZE] {
    let mut data = [0u8; DUEL_ACCOUNT_SIZE];
    data[..DISCRIMINATOR_LEN].copy_from_slice(&duel_account_discriminator());
    data[CREATOR_OFFSET..CREATOR_OFFSET + PUBKEY_LEN].copy_from_slice(record.creator.as_ref());
    data[CHALLENGER_OFFSET..CHALLENGER_OFFSET + PUBKEY_LEN].copy_from_slice(record.challenger.as_ref());
    data[BET_AMOUNT_OFFSET..BET_AMOUNT_OFFSET + 8].copy_from_slice(&record.bet_amount.to_le_bytes());
    data[ASSET_ID_OFFSET..ASSET_ID_OFFSET + PUBKEY_LEN].copy_from_slice(record.asset_id.as_ref());
    data[FEE_BPS_OFFSET..FEE_BPS_OFFSET + 2].copy_from_slice(&record.fee_basis_points.to_le_bytes());
    data[STATUS_OFFSET] = record.status.ordinal();
    data[WINNER_OFFSET..WINNER_OFFSET + PUBKEY_LEN].copy_from_slice(record.winner.as_ref());
    data[ESCROW_BUMP_OFFSET] = record.escrow_bump;
    data[CUSTODY_BUMP_OFFSET] = record.custody_bump;
    data[CREATED_AT_OFFSET..CREATED_AT_OFFSET + 8].copy_from_slice(&record.created_at.to_le_bytes());
    if let Some(randomness) = record.randomness_result {
        data[RANDOMNESS_TAG_OFFSET] = 1;
        data[RANDOMNESS_OFFSET..RANDOMNESS_OFFSET + RANDOMNESS_LEN].copy_from_slice(&randomness);
    }
    data
}

// Offsets below are only called after the full-length check in `decode_duel`.

fn read_pubkey_at(data: &[u8], offset: usize) -> Pubkey {
    let mut out = [0u8; PUBKEY_LEN];
    out.copy_from_slice(&data[offset..offset + PUBKEY_LEN]);
    Pubkey::new_from_array(out)
}

fn read_u16_at(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32_at(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

/// Little-endian u64 assembled from two u32 words, low word first: `high * 2^32 + low`.
///
/// Kept word-wise on purpose. Clients on runtimes without a native 64-bit read decode the same
/// accounts this way, and sharing the composition keeps every client on identical integer
/// semantics. The result equals `u64::from_le_bytes` over the same eight bytes.
fn read_u64_at(data: &[u8], offset: usize) -> u64 {
    let low = u64::from(read_u32_at(data, offset));
    let high = u64::from(read_u32_at(data, offset + 4));
    (high << 32) | low
}

/// Two's-complement view of the word-wise u64.
fn read_i64_at(data: &[u8], offset: usize) -> i64 {
    read_u64_at(data, offset) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::ZERO_PUBKEY;

    fn sample_record() -> DuelRecord {
        DuelRecord {
            creator: Pubkey::new_from_array([1u8; 32]),
            challenger: Pubkey::new_from_array([2u8; 32]),
            bet_amount: 250_000_000,
            asset_id: Pubkey::new_from_array([3u8; 32]),
            fee_basis_points: 100,
            status: DuelStatus::Resolved,
            winner: Pubkey::new_from_array([2u8; 32]),
            escrow_bump: 251,
            custody_bump: 252,
            created_at: 1_735_689_600,
            randomness_result: Some([7u8; 32]),
        }
    }

    #[test]
    fn test_round_trip_preserves_every_field() {
        let record = sample_record();
        let data = encode_duel(&record);
        assert_eq!(decode_duel(&data).unwrap(), record);
    }

    #[test]
    fn test_round_trip_without_randomness() {
        let record = DuelRecord {
            challenger: ZERO_PUBKEY,
            winner: ZERO_PUBKEY,
            status: DuelStatus::WaitingForOpponent,
            randomness_result: None,
            ..sample_record()
        };
        let decoded = decode_duel(&encode_duel(&record)).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.randomness_result, None);
    }

    #[test]
    fn test_randomness_tag_governs_tail() {
        let record = DuelRecord { randomness_result: None, ..sample_record() };
        let mut data = encode_duel(&record);
        // Garbage in the tail is ignored while the tag says absent.
        data[RANDOMNESS_OFFSET..].fill(0xAB);
        assert_eq!(decode_duel(&data).unwrap().randomness_result, None);

        data[RANDOMNESS_TAG_OFFSET] = 1;
        assert_eq!(decode_duel(&data).unwrap().randomness_result, Some([0xAB; 32]));
    }

    #[test]
    fn test_short_buffer_rejected() {
        let data = encode_duel(&sample_record());
        for len in [0, 8, 157, DUEL_ACCOUNT_SIZE - 1] {
            assert_eq!(
                decode_duel(&data[..len]),
                Err(DecodeError::MalformedRecord { expected: DUEL_ACCOUNT_SIZE, actual: len })
            );
        }
    }

    #[test]
    fn test_longer_buffer_accepted() {
        let record = sample_record();
        let mut data = encode_duel(&record).to_vec();
        data.extend_from_slice(&[0xFF; 16]);
        assert_eq!(decode_duel(&data).unwrap(), record);
    }

    #[test]
    fn test_bet_amount_word_boundaries() {
        let values = [0u64, 1, (1 << 32) - 1, 1 << 32, (1 << 53) - 1, u64::MAX];
        for bet_amount in values {
            let record = DuelRecord { bet_amount, ..sample_record() };
            let data = encode_duel(&record);
            let decoded = decode_duel(&data).unwrap();
            assert_eq!(decoded.bet_amount, bet_amount);
            assert_eq!(read_u64_at(&data, BET_AMOUNT_OFFSET), u64::from_le_bytes(data[72..80].try_into().unwrap()));
        }
    }

    #[test]
    fn test_negative_created_at() {
        let record = DuelRecord { created_at: -42, ..sample_record() };
        assert_eq!(decode_duel(&encode_duel(&record)).unwrap().created_at, -42);
    }

    #[test]
    fn test_unknown_status_falls_back() {
        let mut data = encode_duel(&sample_record());
        data[STATUS_OFFSET] = 200;
        let decoded = decode_duel(&data).unwrap();
        assert_eq!(decoded.status, DuelStatus::Unknown(200));
        assert_eq!(decoded.status.effective(), DuelStatus::WaitingForOpponent);
    }

    #[test]
    fn test_discriminator_is_ignored() {
        let record = sample_record();
        let mut data = encode_duel(&record);
        data[..DISCRIMINATOR_LEN].copy_from_slice(&[0xEE; DISCRIMINATOR_LEN]);
        assert_eq!(decode_duel(&data).unwrap(), record);
    }

    #[test]
    fn test_encoder_writes_discriminator() {
        let data = encode_duel(&sample_record());
        assert_eq!(&data[..DISCRIMINATOR_LEN], &duel_account_discriminator());
    }
}
