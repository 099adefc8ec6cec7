use solana_program::pubkey;
use solana_program::pubkey::Pubkey;

/// Duel program on devnet.
pub const PROGRAM_ID: Pubkey = pubkey!("3gE3AwSm9yVYCTSXHFiqWShzoU5vGjwTXJRL7WLz6vNv");
pub const TREASURY: Pubkey = pubkey!("6uT7LVyYWZS37pC2cv4FtMeMT9ScnivjukxfxFgbgEPY");

// MagicBlock VRF oracle queue and program (devnet)
pub const VRF_ORACLE_QUEUE: Pubkey = pubkey!("Cuj97ggrhhidhbu39TijNVqE74xvKJ69gDervRUXAxGh");
pub const VRF_PROGRAM_ID: Pubkey = pubkey!("Vrf1RNUjXmQGjmQrQLvJHs9SNkvDJEsRVFPkfSQUwGz");

pub const TOKEN_PROGRAM_ID: Pubkey = pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

/// All-zero key. Marks an unset challenger/winner and the native asset.
pub const ZERO_PUBKEY: Pubkey = Pubkey::new_from_array([0u8; 32]);

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// 3% on native SOL duels.
pub const FEE_BASIS_POINTS: u16 = 300;

pub const SKR_MINT: Pubkey = pubkey!("9DdqwXM6BRWLdMesSf2fBWp9ZgeoJ2Qbr8rVKnyGAW2T");
pub const SKR_DECIMALS: u8 = 6;
/// 1% on SKR duels.
pub const SKR_FEE_BASIS_POINTS: u16 = 100;

/// Bet presets in whole SOL.
pub const SOL_BET_PRESETS: [f64; 5] = [0.05, 0.1, 0.25, 0.5, 1.0];
/// Bet presets in whole SKR.
pub const SKR_BET_PRESETS: [u64; 5] = [100, 250, 500, 750, 1000];
