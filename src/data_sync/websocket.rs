use crate::data_sync::ledger::{AccountFilter, Commitment, PushSubscription};
use crate::data_sync::rpc::decode_account_data;
use crate::error::LedgerError;
use dashmap::DashMap;
use eyre::eyre;
use futures::{Sink, SinkExt, StreamExt};
use serde_json::{Value, json};
use solana_program::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

/// What a local subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SubscriptionRequest {
    Account { pubkey: Pubkey },
    Program { program_id: Pubkey, filters: Vec<AccountFilter> },
}

impl SubscriptionRequest {
    fn subscribe_payload(&self, request_id: u64, commitment: Commitment) -> Value {
        let (method, target, filters) = match self {
            Self::Account { pubkey } => ("accountSubscribe", pubkey, None),
            Self::Program { program_id, filters } => ("programSubscribe", program_id, Some(filters)),
        };
        let mut options = json!({ "encoding": "base64", "commitment": commitment.to_string() });
        if let Some(filters) = filters {
            options["filters"] = Value::Array(filters.iter().map(AccountFilter::to_json).collect());
        }
        json!({ "jsonrpc": "2.0", "id": request_id, "method": method, "params": [target.to_string(), options] })
    }

    fn unsubscribe_payload(&self, request_id: u64, server_id: u64) -> Value {
        let method = match self {
            Self::Account { .. } => "accountUnsubscribe",
            Self::Program { .. } => "programUnsubscribe",
        };
        json!({ "jsonrpc": "2.0", "id": request_id, "method": method, "params": [server_id] })
    }
}

/// Where notifications for one local subscription go.
#[derive(Debug, Clone)]
pub(crate) enum NotificationSink {
    Account(mpsc::Sender<Vec<u8>>),
    /// Same `accountSubscribe` request, but only the lamport balance is forwarded.
    Balance(mpsc::Sender<u64>),
    Program(mpsc::Sender<()>),
}

enum PubsubCommand {
    Subscribe { local_id: u64, request: SubscriptionRequest },
    Unsubscribe { local_id: u64 },
}

/// Parsed server frame.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PubsubMessage {
    /// Reply to a request; `result` is a subscription id for subscribe requests.
    Response { request_id: u64, subscription: Option<u64> },
    RequestFailed { request_id: u64, message: String },
    AccountNotification { subscription: u64, lamports: u64, data: Vec<u8> },
    ProgramNotification { subscription: u64 },
    Other,
}

pub(crate) fn parse_message(text: &str) -> Result<PubsubMessage, LedgerError> {
    let message: Value = serde_json::from_str(text)?;

    if let Some(method) = message.get("method").and_then(Value::as_str) {
        let params = message
            .get("params")
            .ok_or_else(|| LedgerError::UnexpectedResponse(format!("notification without params: {text}")))?;
        let subscription = params
            .get("subscription")
            .and_then(Value::as_u64)
            .ok_or_else(|| LedgerError::UnexpectedResponse(format!("notification without subscription: {text}")))?;

        return match method {
            "accountNotification" => {
                let account = params
                    .pointer("/result/value")
                    .ok_or_else(|| LedgerError::UnexpectedResponse(format!("account notification without value: {text}")))?;
                let lamports = account.get("lamports").and_then(Value::as_u64).unwrap_or_default();
                Ok(PubsubMessage::AccountNotification { subscription, lamports, data: decode_account_data(account)? })
            }
            "programNotification" => Ok(PubsubMessage::ProgramNotification { subscription }),
            _ => Ok(PubsubMessage::Other),
        };
    }

    let Some(request_id) = message.get("id").and_then(Value::as_u64) else {
        return Ok(PubsubMessage::Other);
    };

    if let Some(error) = message.get("error") {
        return Ok(PubsubMessage::RequestFailed { request_id, message: error.to_string() });
    }

    Ok(PubsubMessage::Response { request_id, subscription: message.get("result").and_then(Value::as_u64) })
}

/// Per-connection bookkeeping. Server subscription ids die with the socket.
#[derive(Default)]
struct Session {
    next_request_id: u64,
    pending: HashMap<u64, (u64, SubscriptionRequest)>,
    server_to_local: HashMap<u64, u64>,
    local_to_server: HashMap<u64, u64>,
}

impl Session {
    fn next_request_id(&mut self) -> u64 {
        self.next_request_id += 1;
        self.next_request_id
    }
}

/// WebSocket pubsub connection shared by all push subscriptions of a ledger.
///
/// A background task owns the socket, reconnects on failure and re-issues live subscriptions
/// on each new connection. Reconnects never give up; while the socket is down the push channel
/// is silent and consumers rely on polling.
pub struct PubsubManager {
    commands: mpsc::UnboundedSender<PubsubCommand>,
    sinks: Arc<DashMap<u64, NotificationSink>>,
    next_local_id: AtomicU64,
    channel_buffer_size: usize,
    task: JoinHandle<()>,
}

impl PubsubManager {
    pub fn spawn(
        rpc_wss_url: String,
        commitment: Commitment,
        connection_timeout: Duration,
        reconnect_delay: Duration,
        channel_buffer_size: usize,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let sinks = Arc::new(DashMap::new());

        let task = tokio::spawn(Self::run(
            rpc_wss_url,
            commitment,
            connection_timeout,
            reconnect_delay,
            commands_rx,
            Arc::clone(&sinks),
        ));

        Self {
            commands: commands_tx,
            sinks,
            next_local_id: AtomicU64::new(1),
            channel_buffer_size: channel_buffer_size.max(1),
            task,
        }
    }

    pub fn subscribe_account(&self, pubkey: Pubkey) -> Result<PushSubscription<Vec<u8>>, LedgerError> {
        let (tx, rx) = mpsc::channel(self.channel_buffer_size);
        self.register(SubscriptionRequest::Account { pubkey }, NotificationSink::Account(tx), rx)
    }

    pub fn subscribe_balance(&self, pubkey: Pubkey) -> Result<PushSubscription<u64>, LedgerError> {
        let (tx, rx) = mpsc::channel(self.channel_buffer_size);
        self.register(SubscriptionRequest::Account { pubkey }, NotificationSink::Balance(tx), rx)
    }

    pub fn subscribe_program(
        &self,
        program_id: Pubkey,
        filters: Vec<AccountFilter>,
    ) -> Result<PushSubscription<()>, LedgerError> {
        let (tx, rx) = mpsc::channel(self.channel_buffer_size);
        self.register(SubscriptionRequest::Program { program_id, filters }, NotificationSink::Program(tx), rx)
    }

    /// Number of live local subscriptions.
    pub fn active_subscriptions(&self) -> usize {
        self.sinks.len()
    }

    fn register<T: Send + 'static>(
        &self,
        request: SubscriptionRequest,
        sink: NotificationSink,
        updates: mpsc::Receiver<T>,
    ) -> Result<PushSubscription<T>, LedgerError> {
        let local_id = self.next_local_id.fetch_add(1, Ordering::Relaxed);
        self.sinks.insert(local_id, sink);

        if self.commands.send(PubsubCommand::Subscribe { local_id, request }).is_err() {
            self.sinks.remove(&local_id);
            return Err(LedgerError::SubscriptionClosed);
        }

        let sinks = Arc::clone(&self.sinks);
        let commands = self.commands.clone();
        Ok(PushSubscription::new(updates, move || {
            sinks.remove(&local_id);
            let _ = commands.send(PubsubCommand::Unsubscribe { local_id });
        }))
    }

    async fn run(
        rpc_wss_url: String,
        commitment: Commitment,
        connection_timeout: Duration,
        reconnect_delay: Duration,
        mut commands: mpsc::UnboundedReceiver<PubsubCommand>,
        sinks: Arc<DashMap<u64, NotificationSink>>,
    ) {
        let mut active: HashMap<u64, SubscriptionRequest> = HashMap::new();
        let mut reconnect_count = 0;

        loop {
            match Self::connect_and_serve(
                &rpc_wss_url,
                commitment,
                connection_timeout,
                &mut commands,
                &mut active,
                &sinks,
                &mut reconnect_count,
            )
            .await
            {
                Ok(()) => {
                    info!("Pubsub connection closed, no subscribers left");
                    break;
                }
                Err(e) => {
                    error!("Pubsub connection error: {}", e);
                    reconnect_count += 1;
                    warn!("Attempting pubsub reconnection #{} in {:?}", reconnect_count, reconnect_delay);
                    sleep(reconnect_delay).await;
                }
            }
        }
    }

    /// Serves one connection. `Ok` only when the manager itself is gone.
    async fn connect_and_serve(
        rpc_wss_url: &str,
        commitment: Commitment,
        connection_timeout: Duration,
        commands: &mut mpsc::UnboundedReceiver<PubsubCommand>,
        active: &mut HashMap<u64, SubscriptionRequest>,
        sinks: &DashMap<u64, NotificationSink>,
        reconnect_count: &mut u32,
    ) -> eyre::Result<()> {
        let url = Url::parse(rpc_wss_url)?;
        info!("Connecting to pubsub: {}", url);

        let (ws_stream, _) = timeout(connection_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| eyre!("Pubsub connection timeout"))?
            .map_err(|e| eyre!("Pubsub connection failed: {}", e))?;
        *reconnect_count = 0;

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let mut session = Session::default();

        for (local_id, request) in active.iter() {
            Self::send_subscribe(&mut ws_sender, &mut session, *local_id, request, commitment).await?;
        }
        if !active.is_empty() {
            info!("Re-issued {} pubsub subscriptions", active.len());
        }

        loop {
            tokio::select! {
                ws_msg = ws_receiver.next() => {
                    match ws_msg {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_text(text.as_str(), &mut ws_sender, &mut session, active, sinks).await?;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            ws_sender.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) => return Err(eyre!("Pubsub closed by server")),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(eyre!("Pubsub stream error: {}", e)),
                        None => return Err(eyre!("Pubsub stream ended")),
                    }
                }

                command = commands.recv() => {
                    match command {
                        None => return Ok(()),
                        Some(PubsubCommand::Subscribe { local_id, request }) => {
                            // Recorded first so a failed send is re-issued after reconnecting.
                            active.insert(local_id, request.clone());
                            Self::send_subscribe(&mut ws_sender, &mut session, local_id, &request, commitment).await?;
                        }
                        Some(PubsubCommand::Unsubscribe { local_id }) => {
                            if let Some(request) = active.remove(&local_id) {
                                if let Some(server_id) = session.local_to_server.remove(&local_id) {
                                    session.server_to_local.remove(&server_id);
                                    let request_id = session.next_request_id();
                                    ws_sender.send(Message::Text(request.unsubscribe_payload(request_id, server_id).to_string().into())).await?;
                                    debug!("Unsubscribed local {} (server {})", local_id, server_id);
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    async fn send_subscribe<S>(
        ws_sender: &mut S,
        session: &mut Session,
        local_id: u64,
        request: &SubscriptionRequest,
        commitment: Commitment,
    ) -> eyre::Result<()>
    where
        S: Sink<Message> + Unpin,
        S::Error: std::error::Error + Send + Sync + 'static,
    {
        let request_id = session.next_request_id();
        session.pending.insert(request_id, (local_id, request.clone()));
        ws_sender
            .send(Message::Text(request.subscribe_payload(request_id, commitment).to_string().into()))
            .await?;
        debug!("Sent subscribe request {} for local {}", request_id, local_id);
        Ok(())
    }

    async fn handle_text<S>(
        text: &str,
        ws_sender: &mut S,
        session: &mut Session,
        active: &HashMap<u64, SubscriptionRequest>,
        sinks: &DashMap<u64, NotificationSink>,
    ) -> eyre::Result<()>
    where
        S: Sink<Message> + Unpin,
        S::Error: std::error::Error + Send + Sync + 'static,
    {
        let message = match parse_message(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to handle pubsub message: {}", e);
                return Ok(());
            }
        };

        match message {
            PubsubMessage::Response { request_id, subscription: Some(server_id) } => {
                let Some((local_id, request)) = session.pending.remove(&request_id) else {
                    return Ok(());
                };
                if active.contains_key(&local_id) {
                    session.server_to_local.insert(server_id, local_id);
                    session.local_to_server.insert(local_id, server_id);
                    info!("Pubsub subscription confirmed: local {} -> server {}", local_id, server_id);
                } else {
                    // Dropped while the subscribe request was in flight.
                    let unsubscribe_id = session.next_request_id();
                    ws_sender
                        .send(Message::Text(request.unsubscribe_payload(unsubscribe_id, server_id).to_string().into()))
                        .await?;
                    debug!("Released orphaned server subscription {}", server_id);
                }
            }
            PubsubMessage::Response { .. } | PubsubMessage::Other => {}
            PubsubMessage::RequestFailed { request_id, message } => {
                if let Some((local_id, _)) = session.pending.remove(&request_id) {
                    warn!("Pubsub subscribe for local {} rejected: {}", local_id, message);
                }
            }
            PubsubMessage::AccountNotification { subscription, lamports, data } => {
                match Self::sink_for(session, sinks, subscription) {
                    Some(NotificationSink::Account(tx)) => Self::deliver(&tx, data, subscription),
                    Some(NotificationSink::Balance(tx)) => Self::deliver(&tx, lamports, subscription),
                    _ => {}
                }
            }
            PubsubMessage::ProgramNotification { subscription } => {
                if let Some(NotificationSink::Program(tx)) = Self::sink_for(session, sinks, subscription) {
                    Self::deliver(&tx, (), subscription);
                }
            }
        }

        Ok(())
    }

    fn sink_for(session: &Session, sinks: &DashMap<u64, NotificationSink>, server_id: u64) -> Option<NotificationSink> {
        let local_id = session.server_to_local.get(&server_id)?;
        sinks.get(local_id).map(|sink| sink.value().clone())
    }

    /// Never blocks the socket; a full channel drops the event and the next poll catches up.
    fn deliver<T>(tx: &mpsc::Sender<T>, event: T, server_id: u64) {
        match tx.try_send(event) {
            Ok(()) => debug!("Delivered push event for server subscription {}", server_id),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Push channel full for server subscription {}, dropping event", server_id);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

impl PubsubManager {
    /// False once the connection task has ended.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PubsubManager {
    fn drop(&mut self) {
        self.task.abort();
    }
}
