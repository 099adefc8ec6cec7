/// Lobby Monitor Example
///
/// Connects to the configured cluster, prints the open-duel lobby as it changes and, when
/// `PARTICIPANT` is set, that wallet's duel history. `DUEL` additionally tracks one duel until it
/// resolves.
use duel_sync::data_sync::{DuelState, DuelSyncServiceBuilder, ResolutionOutcome, SyncConfig};
use duel_sync::utils::{format_signed_amount, format_sol, truncate_address};
use eyre::Result;
use solana_program::pubkey::Pubkey;
use std::str::FromStr;
use tokio::time::{Duration, timeout};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn pubkey_from_env(name: &str) -> Result<Option<Pubkey>> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(Pubkey::from_str(&value).map_err(|e| eyre::eyre!("Invalid {}: {}", name, e))?)),
        Err(_) => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = SyncConfig::from_env().unwrap_or_else(|e| {
        warn!("Failed to load config from environment ({}), using defaults", e);
        SyncConfig::default()
    });
    info!("Configuration loaded: HTTP={}, WebSocket={}", config.rpc_http_url, config.rpc_wss_url);

    let service = DuelSyncServiceBuilder::new().with_config(config).build()?;

    let mut lobby = service.open_duels();
    lobby.start().await;
    let mut lobby_rx = lobby.subscribe();

    let mut history = service.history();
    history.track(pubkey_from_env("PARTICIPANT")?).await;
    let mut history_rx = history.subscribe();

    let mut duel = service.duel_watcher();
    duel.watch(pubkey_from_env("DUEL")?).await;

    {
        let resolution = duel.wait_for_resolution();
        tokio::pin!(resolution);
        let mut awaiting_resolution = duel.target().is_some();

        let run = async {
            loop {
                tokio::select! {
                    Ok(()) = lobby_rx.changed() => {
                        let snapshot = lobby_rx.borrow_and_update().clone();
                        if snapshot.loading {
                            continue;
                        }
                        info!("{} open duels", snapshot.value.len());
                        for entry in &snapshot.value {
                            info!(
                                "  {} by {} for {} SOL",
                                truncate_address(&entry.pubkey.to_string(), 4),
                                truncate_address(&entry.record.creator.to_string(), 4),
                                format_sol(u128::from(entry.record.bet_amount)),
                            );
                        }
                    }

                    Ok(()) = history_rx.changed() => {
                        let snapshot = history_rx.borrow_and_update().clone();
                        if snapshot.loading || history.participant().is_none() {
                            continue;
                        }
                        let stats = &snapshot.value.stats;
                        info!(
                            "History: {} duels, {}W/{}L/{}C, win rate {}%, net {} SOL",
                            stats.total_duels,
                            stats.wins,
                            stats.losses,
                            stats.cancelled,
                            stats.win_rate,
                            format_signed_amount(stats.net_native(), None),
                        );
                    }

                    outcome = &mut resolution, if awaiting_resolution => {
                        awaiting_resolution = false;
                        match outcome {
                            ResolutionOutcome::Resolved(record) => {
                                info!("Duel resolved, winner {}", record.winner);
                            }
                            ResolutionOutcome::TimedOut => match duel.snapshot().value {
                                DuelState::Absent => warn!("Duel account no longer exists"),
                                _ => warn!("Duel still unresolved after the VRF timeout, still watching"),
                            },
                        }
                    }

                    else => break,
                }
            }
        };

        if timeout(Duration::from_secs(300), run).await.is_err() {
            info!("Monitoring finished");
        }
    }

    lobby.stop().await;
    history.track(None).await;
    duel.stop().await;
    Ok(())
}
