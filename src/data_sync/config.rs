use crate::data_sync::ledger::Commitment;
use crate::utils::config_loader::{LoadConfigError, load_from_file_sync};
use serde::{Deserialize, Serialize};
use solana_program::pubkey::Pubkey;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_RPC_HTTP_URL: &str = "https://api.devnet.solana.com";
pub const DEFAULT_RPC_WSS_URL: &str = "wss://api.devnet.solana.com";
pub const DEFAULT_PROGRAM_ID: &str = "3gE3AwSm9yVYCTSXHFiqWShzoU5vGjwTXJRL7WLz6vNv";

/// Configuration for the duel synchronization layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// HTTP RPC URL for account reads
    pub rpc_http_url: String,
    /// WebSocket RPC URL for push subscriptions
    pub rpc_wss_url: String,
    /// Base58 address of the duel program
    pub program_id: String,
    pub commitment: Commitment,
    /// Poll period of a single-duel synchronizer
    pub duel_poll_interval_ms: u64,
    /// Poll period of the open-duels lobby
    pub lobby_poll_interval_ms: u64,
    /// Poll period of the participant history
    pub history_poll_interval_ms: u64,
    /// Poll period of a wallet balance
    pub balance_poll_interval_ms: u64,
    /// How long to wait for a duel to leave the active state
    pub vrf_timeout_secs: u64,
    /// WebSocket connection timeout in seconds
    pub ws_connection_timeout_secs: u64,
    /// Delay between reconnection attempts in seconds
    pub reconnect_delay_secs: u64,
    /// Timeout for HTTP requests in seconds
    pub http_timeout_secs: u64,
    /// Buffer size of each push subscription channel
    pub channel_buffer_size: usize,
    /// Also narrow bulk reads by the account discriminator
    pub filter_by_discriminator: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rpc_http_url: DEFAULT_RPC_HTTP_URL.to_string(),
            rpc_wss_url: DEFAULT_RPC_WSS_URL.to_string(),
            program_id: DEFAULT_PROGRAM_ID.to_string(),
            commitment: Commitment::Confirmed,
            duel_poll_interval_ms: 4_000,
            lobby_poll_interval_ms: 5_000,
            history_poll_interval_ms: 5_000,
            balance_poll_interval_ms: 10_000,
            vrf_timeout_secs: 45,
            ws_connection_timeout_secs: 30,
            reconnect_delay_secs: 2,
            http_timeout_secs: 10,
            channel_buffer_size: 100,
            filter_by_discriminator: false,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> eyre::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from a TOML file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadConfigError> {
        let config: Self = load_from_file_sync(path)?;
        config.validate().map_err(|e| LoadConfigError::ConfigError(e.to_string()))?;
        Ok(config)
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        let mut config = Self::default();

        if let Some(api_key) = lookup("HELIUS_API_KEY") {
            config.rpc_http_url = format!("https://devnet.helius-rpc.com/?api-key={api_key}");
            config.rpc_wss_url = format!("wss://devnet.helius-rpc.com/?api-key={api_key}");
        }

        if let Some(rpc_http_url) = lookup("RPC_HTTP_URL") {
            config.rpc_http_url = rpc_http_url;
        }

        if let Some(rpc_wss_url) = lookup("RPC_WSS_URL") {
            config.rpc_wss_url = rpc_wss_url;
        }

        if let Some(program_id) = lookup("DUEL_PROGRAM_ID") {
            config.program_id = program_id;
        }

        if let Some(commitment) = lookup("COMMITMENT") {
            config.commitment =
                Commitment::from_str(&commitment).map_err(|e| eyre::eyre!("Invalid COMMITMENT: {}", e))?;
        }

        parse_var(&lookup, "DUEL_POLL_INTERVAL_MS", &mut config.duel_poll_interval_ms)?;
        parse_var(&lookup, "LOBBY_POLL_INTERVAL_MS", &mut config.lobby_poll_interval_ms)?;
        parse_var(&lookup, "HISTORY_POLL_INTERVAL_MS", &mut config.history_poll_interval_ms)?;
        parse_var(&lookup, "BALANCE_POLL_INTERVAL_MS", &mut config.balance_poll_interval_ms)?;
        parse_var(&lookup, "VRF_TIMEOUT_SECS", &mut config.vrf_timeout_secs)?;
        parse_var(&lookup, "WS_CONNECTION_TIMEOUT_SECS", &mut config.ws_connection_timeout_secs)?;
        parse_var(&lookup, "RECONNECT_DELAY_SECS", &mut config.reconnect_delay_secs)?;
        parse_var(&lookup, "HTTP_TIMEOUT_SECS", &mut config.http_timeout_secs)?;
        parse_var(&lookup, "CHANNEL_BUFFER_SIZE", &mut config.channel_buffer_size)?;
        parse_var(&lookup, "FILTER_BY_DISCRIMINATOR", &mut config.filter_by_discriminator)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        Url::parse(&self.rpc_http_url).map_err(|e| eyre::eyre!("Invalid RPC_HTTP_URL: {}", e))?;
        Url::parse(&self.rpc_wss_url).map_err(|e| eyre::eyre!("Invalid RPC_WSS_URL: {}", e))?;
        self.program_id()?;

        let intervals = [
            self.duel_poll_interval_ms,
            self.lobby_poll_interval_ms,
            self.history_poll_interval_ms,
            self.balance_poll_interval_ms,
        ];
        if intervals.contains(&0) {
            return Err(eyre::eyre!("Poll intervals must be greater than zero"));
        }
        if self.reconnect_delay_secs == 0 {
            return Err(eyre::eyre!("Reconnect delay must be greater than zero"));
        }

        Ok(())
    }

    pub fn program_id(&self) -> eyre::Result<Pubkey> {
        Pubkey::from_str(&self.program_id).map_err(|e| eyre::eyre!("Invalid DUEL_PROGRAM_ID: {}", e))
    }

    pub fn duel_poll_interval(&self) -> Duration {
        Duration::from_millis(self.duel_poll_interval_ms)
    }

    pub fn lobby_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lobby_poll_interval_ms)
    }

    pub fn history_poll_interval(&self) -> Duration {
        Duration::from_millis(self.history_poll_interval_ms)
    }

    pub fn balance_poll_interval(&self) -> Duration {
        Duration::from_millis(self.balance_poll_interval_ms)
    }

    pub fn vrf_timeout(&self) -> Duration {
        Duration::from_secs(self.vrf_timeout_secs)
    }

    pub fn ws_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.ws_connection_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, target: &mut T) -> eyre::Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(name) {
        *target = raw.trim().parse().map_err(|e| eyre::eyre!("Invalid {}: {}", name, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config_loader::parse_config;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.rpc_http_url, "https://api.devnet.solana.com");
        assert_eq!(config.rpc_wss_url, "wss://api.devnet.solana.com");
        assert_eq!(config.commitment, Commitment::Confirmed);
        assert!(!config.filter_by_discriminator);
        assert_eq!(config.program_id().unwrap(), crate::utils::constants::PROGRAM_ID);
    }

    #[test]
    fn test_durations() {
        let config = SyncConfig::default();
        assert_eq!(config.duel_poll_interval(), Duration::from_secs(4));
        assert_eq!(config.lobby_poll_interval(), Duration::from_secs(5));
        assert_eq!(config.history_poll_interval(), Duration::from_secs(5));
        assert_eq!(config.balance_poll_interval(), Duration::from_secs(10));
        assert_eq!(config.vrf_timeout(), Duration::from_secs(45));
        assert_eq!(config.ws_connection_timeout(), Duration::from_secs(30));
        assert_eq!(config.reconnect_delay(), Duration::from_secs(2));
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = SyncConfig::from_lookup(lookup_from(&[
            ("RPC_HTTP_URL", "http://127.0.0.1:8899"),
            ("RPC_WSS_URL", "ws://127.0.0.1:8900"),
            ("COMMITMENT", "finalized"),
            ("DUEL_POLL_INTERVAL_MS", "1500"),
            ("FILTER_BY_DISCRIMINATOR", "true"),
        ]))
        .unwrap();

        assert_eq!(config.rpc_http_url, "http://127.0.0.1:8899");
        assert_eq!(config.rpc_wss_url, "ws://127.0.0.1:8900");
        assert_eq!(config.commitment, Commitment::Finalized);
        assert_eq!(config.duel_poll_interval(), Duration::from_millis(1500));
        assert!(config.filter_by_discriminator);
    }

    #[test]
    fn test_helius_key_yields_to_explicit_urls() {
        let config = SyncConfig::from_lookup(lookup_from(&[("HELIUS_API_KEY", "abc")])).unwrap();
        assert_eq!(config.rpc_http_url, "https://devnet.helius-rpc.com/?api-key=abc");
        assert_eq!(config.rpc_wss_url, "wss://devnet.helius-rpc.com/?api-key=abc");

        let config = SyncConfig::from_lookup(lookup_from(&[
            ("HELIUS_API_KEY", "abc"),
            ("RPC_HTTP_URL", "http://127.0.0.1:8899"),
        ]))
        .unwrap();
        assert_eq!(config.rpc_http_url, "http://127.0.0.1:8899");
        assert_eq!(config.rpc_wss_url, "wss://devnet.helius-rpc.com/?api-key=abc");
    }

    #[test]
    fn test_invalid_values() {
        assert!(SyncConfig::from_lookup(lookup_from(&[("RPC_WSS_URL", "not a url")])).is_err());
        assert!(SyncConfig::from_lookup(lookup_from(&[("DUEL_PROGRAM_ID", "xyz")])).is_err());
        assert!(SyncConfig::from_lookup(lookup_from(&[("RECONNECT_DELAY_SECS", "-1")])).is_err());
        assert!(SyncConfig::from_lookup(lookup_from(&[("RECONNECT_DELAY_SECS", "0")])).is_err());
        assert!(SyncConfig::from_lookup(lookup_from(&[("LOBBY_POLL_INTERVAL_MS", "0")])).is_err());
        assert!(SyncConfig::from_lookup(lookup_from(&[("BALANCE_POLL_INTERVAL_MS", "0")])).is_err());
    }

    #[test]
    fn test_commitment_names() {
        assert_eq!(Commitment::from_str("processed"), Ok(Commitment::Processed));
        assert_eq!(Commitment::Finalized.to_string(), "finalized");
        assert_eq!(Commitment::from_str("max"), Err(strum::ParseError::VariantNotFound));
    }

    #[test]
    fn test_partial_toml() {
        let config: SyncConfig = parse_config("commitment = \"processed\"\nvrf_timeout_secs = 60\n").unwrap();
        assert_eq!(config.commitment, Commitment::Processed);
        assert_eq!(config.vrf_timeout(), Duration::from_secs(60));
        assert_eq!(config.rpc_http_url, DEFAULT_RPC_HTTP_URL);
    }
}
