use criterion::{Criterion, criterion_group, criterion_main};
use duel_sync::data_sync::{KeyedAccount, OpenDuels, ParticipantHistory, SetProjection, decode_batch};
use duel_sync::logic::{DuelRecord, DuelStatus, compute_history_stats, decode_duel, encode_duel};
use solana_program::pubkey::Pubkey;
use std::hint::black_box;

const RECORDS: usize = 10_000;

fn key(index: usize) -> Pubkey {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&(index as u64).to_le_bytes());
    bytes[31] = 1;
    Pubkey::new_from_array(bytes)
}

fn synthetic_record(index: usize, participant: Pubkey) -> DuelRecord {
    let status = DuelStatus::from_ordinal((index % 5) as u8);
    let creator = if index % 3 == 0 { participant } else { key(index) };
    DuelRecord {
        creator,
        challenger: key(index + RECORDS),
        bet_amount: 1_000_000 + index as u64,
        asset_id: Pubkey::default(),
        fee_basis_points: 300,
        status,
        winner: if index % 2 == 0 { creator } else { key(index + RECORDS) },
        escrow_bump: 255,
        custody_bump: 0,
        created_at: 1_700_000_000 + index as i64,
        randomness_result: status.has_winner().then_some([index as u8; 32]),
    }
}

fn synthetic_accounts(participant: Pubkey) -> Vec<KeyedAccount> {
    (0..RECORDS)
        .map(|index| KeyedAccount { pubkey: key(index), data: encode_duel(&synthetic_record(index, participant)).to_vec() })
        .collect()
}

fn bench_decode(c: &mut Criterion) {
    let participant = key(usize::MAX >> 8);
    let accounts = synthetic_accounts(participant);

    c.bench_function("decode_single", |b| b.iter(|| decode_duel(black_box(&accounts[42].data))));

    c.bench_function("decode_batch_10k", |b| b.iter(|| decode_batch(black_box(accounts.clone()))));

    c.bench_function("open_duels_10k", |b| b.iter(|| OpenDuels.project(decode_batch(black_box(accounts.clone())))));

    let history = ParticipantHistory { participant };
    c.bench_function("history_10k", |b| b.iter(|| history.project(decode_batch(black_box(accounts.clone())))));

    let records: Vec<DuelRecord> = (0..RECORDS).map(|index| synthetic_record(index, participant)).collect();
    c.bench_function("history_stats_10k", |b| b.iter(|| compute_history_stats(black_box(&records), &participant)));
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
