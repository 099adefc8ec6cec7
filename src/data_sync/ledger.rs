use crate::data_sync::config::SyncConfig;
use crate::data_sync::rpc::RpcClient;
use crate::data_sync::websocket::PubsubManager;
use crate::error::LedgerError;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use solana_program::pubkey::Pubkey;
use strum_macros::{Display, EnumString};
use tokio::sync::mpsc;

/// Consistency level requested from the ledger for reads and subscriptions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

/// Server-side account filter. The ledger can only match on length and raw bytes, never on
/// decoded fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFilter {
    DataSize(u64),
    Memcmp { offset: usize, bytes: Vec<u8> },
}

impl AccountFilter {
    pub fn to_json(&self) -> Value {
        match self {
            Self::DataSize(size) => json!({ "dataSize": size }),
            Self::Memcmp { offset, bytes } => json!({
                "memcmp": {
                    "offset": offset,
                    "bytes": BASE64.encode(bytes),
                    "encoding": "base64",
                }
            }),
        }
    }

    /// Client-side evaluation, equivalent to what the ledger does server-side.
    pub fn matches(&self, data: &[u8]) -> bool {
        match self {
            Self::DataSize(size) => data.len() as u64 == *size,
            Self::Memcmp { offset, bytes } => data.get(*offset..*offset + bytes.len()) == Some(bytes.as_slice()),
        }
    }
}

/// Raw account returned by a bulk read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedAccount {
    pub pubkey: Pubkey,
    pub data: Vec<u8>,
}

/// A live push registration.
///
/// Events arrive on an internal channel. Dropping the handle (or calling `unsubscribe`)
/// deregisters the listener before returning; no event is delivered afterwards.
pub struct PushSubscription<T> {
    updates: mpsc::Receiver<T>,
    on_unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl<T> PushSubscription<T> {
    pub fn new(updates: mpsc::Receiver<T>, on_unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self { updates, on_unsubscribe: Some(Box::new(on_unsubscribe)) }
    }

    /// Next event, or `None` once the ledger side has gone away.
    pub async fn recv(&mut self) -> Option<T> {
        self.updates.recv().await
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<T> Drop for PushSubscription<T> {
    fn drop(&mut self) {
        if let Some(on_unsubscribe) = self.on_unsubscribe.take() {
            on_unsubscribe();
        }
        self.updates.close();
    }
}

/// Byte-oriented view of the ledger consumed by the synchronizers.
///
/// Every call may fail with a transport error. Callers treat that as "this attempt produced
/// nothing" and rely on the next poll or push to retry.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// `Ok(None)` when the account does not exist (never created or already reclaimed).
    async fn fetch_account(&self, pubkey: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError>;

    async fn fetch_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
    ) -> Result<Vec<KeyedAccount>, LedgerError>;

    /// Each event carries the account's fresh bytes.
    async fn subscribe_account(&self, pubkey: &Pubkey) -> Result<PushSubscription<Vec<u8>>, LedgerError>;

    /// Each event only signals that some matching account changed.
    async fn subscribe_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
    ) -> Result<PushSubscription<()>, LedgerError>;
    /// Lamports held by `pubkey`; zero for an account that does not exist.
    async fn fetch_balance(&self, pubkey: &Pubkey) -> Result<u64, LedgerError>;

    /// Each event carries the account's fresh lamport balance.
    async fn subscribe_balance(&self, pubkey: &Pubkey) -> Result<PushSubscription<u64>, LedgerError>;
}

/// Solana JSON-RPC ledger: HTTP for reads, WebSocket pubsub for push.
pub struct SolanaLedger {
    rpc: RpcClient,
    pubsub: PubsubManager,
}

impl SolanaLedger {
    /// Must be called inside a tokio runtime; the pubsub connection task is spawned here.
    pub fn new(config: &SyncConfig) -> Result<Self, LedgerError> {
        let rpc = RpcClient::new(config.rpc_http_url.clone(), config.http_timeout(), config.commitment)?;
        let pubsub = PubsubManager::spawn(
            config.rpc_wss_url.clone(),
            config.commitment,
            config.ws_connection_timeout(),
            config.reconnect_delay(),
            config.channel_buffer_size,
        );
        Ok(Self { rpc, pubsub })
    }
}

#[async_trait]
impl LedgerClient for SolanaLedger {
    async fn fetch_account(&self, pubkey: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        self.rpc.get_account_data(pubkey).await
    }

    async fn fetch_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
    ) -> Result<Vec<KeyedAccount>, LedgerError> {
        self.rpc.get_program_accounts(program_id, filters).await
    }

    async fn subscribe_account(&self, pubkey: &Pubkey) -> Result<PushSubscription<Vec<u8>>, LedgerError> {
        self.pubsub.subscribe_account(*pubkey)
    }

    async fn subscribe_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
    ) -> Result<PushSubscription<()>, LedgerError> {
        self.pubsub.subscribe_program(*program_id, filters.to_vec())
    }
    async fn fetch_balance(&self, pubkey: &Pubkey) -> Result<u64, LedgerError> {
        self.rpc.get_balance(pubkey).await
    }

    async fn subscribe_balance(&self, pubkey: &Pubkey) -> Result<PushSubscription<u64>, LedgerError> {
        self.pubsub.subscribe_balance(*pubkey)
    }
}
