use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::evm::rpc::{parse_hex_u64, RpcClient, RpcError};

/// How often the HTTP bridge polls the wallet for account/chain changes
const EVENT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Receipt polling cadence and cap for confirmation waits
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const RECEIPT_POLL_ATTEMPTS: u32 = 150;
/// How long a WalletConnect pairing may sit unanswered
const PAIRING_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("user rejected the request")]
    Rejected,

    #[error("a wallet request is already pending, check your wallet")]
    PendingRequest,

    #[error("wallet is locked or has no account available")]
    Locked,

    #[error("no wallet connection path is available")]
    NoWallet,

    #[error("the wallet does not know this chain")]
    UnknownChain,

    #[error("chain switch failed: {0}")]
    ChainSwitch(String),

    /// The attempt continues inside the wallet app; not a failure of the
    /// wallet, but it does end this client's attempt.
    #[error("continue in your wallet app: {0}")]
    DeepLinkHandoff(String),

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("wallet transport error: {0}")]
    Transport(String),

    #[error("no confirmation for {0:#x} in time, check the explorer")]
    ConfirmationTimeout(B256),
}

impl From<RpcError> for WalletError {
    /// Map EIP-1193 / JSON-RPC error codes onto actionable variants
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::Rpc { code: 4001, .. } => WalletError::Rejected,
            RpcError::Rpc { code: -32002, .. } => WalletError::PendingRequest,
            RpcError::Rpc { code: 4100, .. } => WalletError::Locked,
            RpcError::Rpc { code: 4902, .. } => WalletError::UnknownChain,
            RpcError::Rpc { message, .. } if message.to_lowercase().contains("revert") => {
                WalletError::Reverted(message)
            }
            other => WalletError::Transport(other.to_string()),
        }
    }
}

/// Transaction request parameters handed to the wallet for signing
#[derive(Debug, Clone)]
pub struct TxRequest {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: Option<u64>,
}

impl TxRequest {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            value: U256::ZERO,
            data: data.into(),
            gas_limit: None,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// Wallet-originated notifications, delivered over a channel so the session
/// can turn each one into an explicit state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPath {
    Injected,
    DeepLink,
    WalletConnect,
}

impl std::fmt::Display for ConnectPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectPath::Injected => write!(f, "injected"),
            ConnectPath::DeepLink => write!(f, "deep-link"),
            ConnectPath::WalletConnect => write!(f, "walletconnect"),
        }
    }
}

/// Parameters for `wallet_addEthereumChain`
#[derive(Debug, Clone)]
pub struct ChainParams {
    pub chain_id: u64,
    pub chain_name: String,
    pub currency_name: String,
    pub currency_symbol: String,
    pub currency_decimals: u8,
    pub rpc_urls: Vec<String>,
    pub explorer_url: String,
}

impl ChainParams {
    pub fn chain_id_hex(&self) -> String {
        format!("{:#x}", self.chain_id)
    }
}

/// A wallet connection path: the EIP-1193 request surface plus transaction
/// signing and an event subscription. The session owns the lifecycle; the
/// gateway only ever borrows a bridge for a single write.
#[async_trait]
pub trait WalletBridge: Send + Sync {
    fn path(&self) -> ConnectPath;

    /// Whether this path can be attempted at all in the current environment
    fn available(&self) -> bool;

    /// Connected account address. Only meaningful after a successful
    /// `request_accounts`; calling write operations before that is a
    /// programming error, not a runtime condition.
    fn address(&self) -> Address;

    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;
    async fn chain_id(&self) -> Result<u64, WalletError>;
    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError>;
    async fn add_chain(&self, params: &ChainParams) -> Result<(), WalletError>;

    async fn send_transaction(&self, tx: &TxRequest) -> Result<B256, WalletError>;
    async fn wait_for_confirmation(&self, hash: B256) -> Result<(), WalletError>;

    /// Best-effort teardown; failures are logged and swallowed
    async fn disconnect(&self);

    fn subscribe(&self) -> UnboundedReceiver<WalletEvent>;
}

#[derive(Default)]
struct BridgeState {
    address: Option<Address>,
    chain: Option<u64>,
}

/// A wallet daemon speaking EIP-1193 verbs over JSON-RPC; the headless
/// equivalent of an injected browser provider. Account and chain changes
/// are detected by polling and surfaced as `WalletEvent`s.
pub struct HttpWalletBridge {
    path: ConnectPath,
    rpc: Arc<RpcClient>,
    state: Arc<Mutex<BridgeState>>,
    subscribers: Arc<Mutex<Vec<UnboundedSender<WalletEvent>>>>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn broadcast(subscribers: &Mutex<Vec<UnboundedSender<WalletEvent>>>, event: WalletEvent) {
    lock(subscribers).retain(|tx| tx.send(event.clone()).is_ok());
}

impl HttpWalletBridge {
    pub fn new(url: &str) -> Self {
        Self::with_path(url, ConnectPath::Injected)
    }

    fn with_path(url: &str, path: ConnectPath) -> Self {
        Self {
            path,
            rpc: Arc::new(RpcClient::new(url)),
            state: Arc::new(Mutex::new(BridgeState::default())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            poller: Mutex::new(None),
        }
    }

    /// Watch for wallet-side account/chain changes and convert them into
    /// events. Replaces any previous poller.
    fn start_event_poller(&self) {
        let rpc = self.rpc.clone();
        let state = self.state.clone();
        let subscribers = self.subscribers.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(EVENT_POLL_INTERVAL);
            interval.tick().await; // first tick fires immediately
            loop {
                interval.tick().await;

                match rpc.request::<Vec<Address>>("eth_accounts", json!([])).await {
                    Ok(accounts) => {
                        let previous = lock(&state).address;
                        let current = accounts.first().copied();
                        if previous != current {
                            lock(&state).address = current;
                            broadcast(&subscribers, WalletEvent::AccountsChanged(accounts));
                        }
                    }
                    Err(e) => debug!("wallet account poll failed: {}", e),
                }

                match rpc.chain_id().await {
                    Ok(chain) => {
                        let previous = lock(&state).chain;
                        if previous.is_some() && previous != Some(chain) {
                            lock(&state).chain = Some(chain);
                            broadcast(&subscribers, WalletEvent::ChainChanged(chain));
                        } else {
                            lock(&state).chain = Some(chain);
                        }
                    }
                    Err(e) => debug!("wallet chain poll failed: {}", e),
                }
            }
        });

        if let Some(previous) = lock(&self.poller).replace(handle) {
            previous.abort();
        }
    }
}

#[async_trait]
impl WalletBridge for HttpWalletBridge {
    fn path(&self) -> ConnectPath {
        self.path
    }

    fn available(&self) -> bool {
        true
    }

    fn address(&self) -> Address {
        lock(&self.state).address.unwrap_or(Address::ZERO)
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let accounts: Vec<Address> = self
            .rpc
            .request("eth_requestAccounts", json!([]))
            .await
            .map_err(WalletError::from)?;

        let first = accounts.first().copied().ok_or(WalletError::Locked)?;
        {
            let mut state = lock(&self.state);
            state.address = Some(first);
        }
        self.start_event_poller();
        Ok(accounts)
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        let hex: String = self
            .rpc
            .request("eth_chainId", json!([]))
            .await
            .map_err(WalletError::from)?;
        let chain = parse_hex_u64(&hex).map_err(WalletError::from)?;
        lock(&self.state).chain = Some(chain);
        Ok(chain)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        let () = self
            .rpc
            .request(
                "wallet_switchEthereumChain",
                json!([{ "chainId": format!("{:#x}", chain_id) }]),
            )
            .await
            .map(|_: serde_json::Value| ())
            .map_err(WalletError::from)?;
        lock(&self.state).chain = Some(chain_id);
        Ok(())
    }

    async fn add_chain(&self, params: &ChainParams) -> Result<(), WalletError> {
        self.rpc
            .request(
                "wallet_addEthereumChain",
                json!([{
                    "chainId": params.chain_id_hex(),
                    "chainName": params.chain_name,
                    "nativeCurrency": {
                        "name": params.currency_name,
                        "symbol": params.currency_symbol,
                        "decimals": params.currency_decimals,
                    },
                    "rpcUrls": params.rpc_urls,
                    "blockExplorerUrls": [params.explorer_url],
                }]),
            )
            .await
            .map(|_: serde_json::Value| ())
            .map_err(WalletError::from)
    }

    async fn send_transaction(&self, tx: &TxRequest) -> Result<B256, WalletError> {
        let from = lock(&self.state).address.ok_or(WalletError::NoWallet)?;
        let mut params = json!({
            "from": from,
            "to": tx.to,
            "value": tx.value,
            "data": tx.data,
        });
        if let Some(gas) = tx.gas_limit {
            params["gas"] = json!(format!("{:#x}", gas));
        }

        self.rpc
            .request("eth_sendTransaction", json!([params]))
            .await
            .map_err(WalletError::from)
    }

    async fn wait_for_confirmation(&self, hash: B256) -> Result<(), WalletError> {
        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            match self.rpc.transaction_receipt(hash).await {
                Ok(Some(receipt)) => {
                    return if receipt.succeeded() {
                        Ok(())
                    } else {
                        Err(WalletError::Reverted(format!("{:#x}", hash)))
                    };
                }
                Ok(None) => {}
                Err(e) => debug!("receipt poll for {:#x} failed: {}", hash, e),
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
        Err(WalletError::ConfirmationTimeout(hash))
    }

    async fn disconnect(&self) {
        if let Some(handle) = lock(&self.poller).take() {
            handle.abort();
        }
        let mut state = lock(&self.state);
        state.address = None;
        state.chain = None;
        broadcast(&self.subscribers, WalletEvent::Disconnected);
    }

    fn subscribe(&self) -> UnboundedReceiver<WalletEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(tx);
        rx
    }
}

/// Mobile path: there is no local provider, so connecting means handing the
/// page over to the wallet app. `request_accounts` always ends the local
/// attempt with a `DeepLinkHandoff` carrying the app URL.
pub struct DeepLinkBridge {
    dapp_url: String,
}

impl DeepLinkBridge {
    pub fn new(dapp_url: &str) -> Self {
        Self {
            dapp_url: dapp_url.to_string(),
        }
    }

    pub fn handoff_url(&self) -> String {
        let trimmed = self
            .dapp_url
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        format!("https://metamask.app.link/dapp/{}", trimmed)
    }
}

#[async_trait]
impl WalletBridge for DeepLinkBridge {
    fn path(&self) -> ConnectPath {
        ConnectPath::DeepLink
    }

    fn available(&self) -> bool {
        !self.dapp_url.is_empty()
    }

    fn address(&self) -> Address {
        Address::ZERO
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        Err(WalletError::DeepLinkHandoff(self.handoff_url()))
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        Err(WalletError::NoWallet)
    }

    async fn switch_chain(&self, _chain_id: u64) -> Result<(), WalletError> {
        Err(WalletError::NoWallet)
    }

    async fn add_chain(&self, _params: &ChainParams) -> Result<(), WalletError> {
        Err(WalletError::NoWallet)
    }

    async fn send_transaction(&self, _tx: &TxRequest) -> Result<B256, WalletError> {
        Err(WalletError::NoWallet)
    }

    async fn wait_for_confirmation(&self, _hash: B256) -> Result<(), WalletError> {
        Err(WalletError::NoWallet)
    }

    async fn disconnect(&self) {}

    fn subscribe(&self) -> UnboundedReceiver<WalletEvent> {
        mpsc::unbounded_channel().1
    }
}

/// Desktop fallback: a remote wallet session over an encrypted relay. The
/// handshake is surfaced as a pairing URI; once a wallet answers, the relay
/// endpoint behaves like any other provider and everything delegates to the
/// inner HTTP bridge.
pub struct WalletConnectBridge {
    project_id: String,
    chain_id: u64,
    inner: HttpWalletBridge,
    pairing_uri: Mutex<Option<String>>,
}

impl WalletConnectBridge {
    pub fn new(project_id: &str, relay_url: &str, chain_id: u64) -> Self {
        Self {
            project_id: project_id.to_string(),
            chain_id,
            inner: HttpWalletBridge::with_path(relay_url, ConnectPath::WalletConnect),
            pairing_uri: Mutex::new(None),
        }
    }

    /// The handshake string a wallet scans or pastes (QR-code equivalent)
    pub fn pairing_uri(&self) -> Option<String> {
        lock(&self.pairing_uri).clone()
    }
}

#[async_trait]
impl WalletBridge for WalletConnectBridge {
    fn path(&self) -> ConnectPath {
        ConnectPath::WalletConnect
    }

    fn available(&self) -> bool {
        !self.project_id.is_empty()
    }

    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let uri = format!(
            "wc:pair@2?projectId={}&chainId=eip155:{}",
            self.project_id, self.chain_id
        );
        info!("walletconnect pairing ready, approve in your wallet: {}", uri);
        *lock(&self.pairing_uri) = Some(uri);

        // Wait for a wallet to answer the pairing, then behave as a provider
        let deadline = tokio::time::Instant::now() + PAIRING_TIMEOUT;
        loop {
            match self.inner.request_accounts().await {
                Ok(accounts) => return Ok(accounts),
                Err(WalletError::Locked) if tokio::time::Instant::now() < deadline => {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
                Err(WalletError::Locked) => {
                    warn!("walletconnect pairing timed out");
                    return Err(WalletError::PendingRequest);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        self.inner.chain_id().await
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        self.inner.switch_chain(chain_id).await
    }

    async fn add_chain(&self, params: &ChainParams) -> Result<(), WalletError> {
        self.inner.add_chain(params).await
    }

    async fn send_transaction(&self, tx: &TxRequest) -> Result<B256, WalletError> {
        self.inner.send_transaction(tx).await
    }

    async fn wait_for_confirmation(&self, hash: B256) -> Result<(), WalletError> {
        self.inner.wait_for_confirmation(hash).await
    }

    async fn disconnect(&self) {
        *lock(&self.pairing_uri) = None;
        self.inner.disconnect().await;
    }

    fn subscribe(&self) -> UnboundedReceiver<WalletEvent> {
        self.inner.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_eip1193_codes() {
        let rejected = WalletError::from(RpcError::Rpc {
            code: 4001,
            message: "User rejected the request".to_string(),
        });
        assert!(matches!(rejected, WalletError::Rejected));

        let pending = WalletError::from(RpcError::Rpc {
            code: -32002,
            message: "Request already pending".to_string(),
        });
        assert!(matches!(pending, WalletError::PendingRequest));

        let unknown_chain = WalletError::from(RpcError::Rpc {
            code: 4902,
            message: "Unrecognized chain".to_string(),
        });
        assert!(matches!(unknown_chain, WalletError::UnknownChain));

        let reverted = WalletError::from(RpcError::Rpc {
            code: -32000,
            message: "execution reverted: window closed".to_string(),
        });
        assert!(matches!(reverted, WalletError::Reverted(_)));
    }

    #[test]
    fn deep_link_builds_wallet_app_url() {
        let bridge = DeepLinkBridge::new("https://sale.example/buy");
        assert_eq!(
            bridge.handoff_url(),
            "https://metamask.app.link/dapp/sale.example/buy"
        );
    }

    #[test]
    fn chain_id_hex_is_eip155_formatted() {
        let params = ChainParams {
            chain_id: 11155111,
            chain_name: "Sepolia".to_string(),
            currency_name: "SepoliaETH".to_string(),
            currency_symbol: "SEP".to_string(),
            currency_decimals: 18,
            rpc_urls: vec![],
            explorer_url: String::new(),
        };
        assert_eq!(params.chain_id_hex(), "0xaa36a7");
    }
}
