use crate::data_sync::duel_watcher::{DuelSnapshot, DuelState};
use crate::logic::DuelRecord;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    Resolved(Arc<DuelRecord>),
    /// Gave up waiting. The subscription keeps running; the caller may check again.
    TimedOut,
}

fn resolved_record(snapshot: &DuelSnapshot) -> Option<Arc<DuelRecord>> {
    match &snapshot.value {
        DuelState::Present(record) if record.status.has_winner() => Some(Arc::clone(record)),
        _ => None,
    }
}

/// Waits for the published duel to reach resolved or claimed.
pub async fn wait_for_resolution(rx: &mut watch::Receiver<DuelSnapshot>, timeout: Duration) -> ResolutionOutcome {
    let wait = async {
        let snapshot = rx.wait_for(|snapshot| resolved_record(snapshot).is_some()).await.ok()?;
        resolved_record(&snapshot)
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(Some(record)) => {
            info!("Duel resolved, winner {}", record.winner);
            ResolutionOutcome::Resolved(record)
        }
        Ok(None) => {
            warn!("Duel channel closed while waiting for resolution");
            ResolutionOutcome::TimedOut
        }
        Err(_) => {
            warn!("Duel not resolved after {:?}", timeout);
            ResolutionOutcome::TimedOut
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_sync::reconcile::SyncSnapshot;
    use crate::logic::DuelStatus;
    use solana_program::pubkey::Pubkey;

    fn record(status: DuelStatus) -> Arc<DuelRecord> {
        Arc::new(DuelRecord {
            creator: Pubkey::new_from_array([1u8; 32]),
            challenger: Pubkey::new_from_array([2u8; 32]),
            bet_amount: 1_000_000,
            asset_id: Pubkey::default(),
            fee_basis_points: 300,
            status,
            winner: Pubkey::new_from_array([2u8; 32]),
            escrow_bump: 255,
            custody_bump: 0,
            created_at: 1_700_000_000,
            randomness_result: Some([7u8; 32]),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_when_status_changes() {
        let (tx, mut rx) = watch::channel(SyncSnapshot::ready(DuelState::Present(record(DuelStatus::Active))));

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            tx.send_replace(SyncSnapshot::ready(DuelState::Present(record(DuelStatus::Resolved))));
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        match wait_for_resolution(&mut rx, Duration::from_secs(45)).await {
            ResolutionOutcome::Resolved(record) => assert_eq!(record.status, DuelStatus::Resolved),
            ResolutionOutcome::TimedOut => panic!("expected resolution"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_claimed_returns_immediately() {
        let (_tx, mut rx) = watch::channel(SyncSnapshot::ready(DuelState::Present(record(DuelStatus::Claimed))));
        let outcome = wait_for_resolution(&mut rx, Duration::from_secs(45)).await;
        assert!(matches!(outcome, ResolutionOutcome::Resolved(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let (tx, mut rx) = watch::channel(SyncSnapshot::ready(DuelState::Present(record(DuelStatus::Active))));
        let started = tokio::time::Instant::now();

        assert_eq!(wait_for_resolution(&mut rx, Duration::from_secs(45)).await, ResolutionOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_secs(45));

        // The channel itself is untouched.
        tx.send_replace(SyncSnapshot::ready(DuelState::Present(record(DuelStatus::Resolved))));
        assert!(matches!(wait_for_resolution(&mut rx, Duration::from_secs(1)).await, ResolutionOutcome::Resolved(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_does_not_count_as_resolved() {
        let (_tx, mut rx) = watch::channel(SyncSnapshot::ready(DuelState::Present(record(DuelStatus::Cancelled))));
        assert_eq!(wait_for_resolution(&mut rx, Duration::from_secs(5)).await, ResolutionOutcome::TimedOut);
    }
}
