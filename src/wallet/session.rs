use alloy_primitives::Address;
use log::{info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::wallet::bridge::{ChainParams, WalletBridge, WalletError, WalletEvent};

/// Connection lifecycle. Owned exclusively by the session; transitions
/// happen only on user action or wallet-originated events, never from a
/// background refresh.
#[derive(Clone, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected {
        address: Address,
        signer: Arc<dyn WalletBridge>,
    },
    Error {
        reason: String,
    },
}

impl std::fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected { address, .. } => {
                write!(f, "Connected({:#x})", address)
            }
            ConnectionState::Error { reason } => write!(f, "Error({})", reason),
        }
    }
}

/// What a successful `connect` call produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected(Address),
    /// The attempt continues in the wallet app at this URL; locally the
    /// session is back to Disconnected.
    HandedOff(String),
}

/// What the caller must do after an event was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEffect {
    None,
    /// Re-read balances/quotes for the (possibly new) account
    Refresh,
    /// The chain changed: all cached contract state is invalid, rebuild
    /// everything from scratch
    Reload,
}

/// Wallet connection state machine. Tries the configured paths in order
/// (injected provider, then mobile deep link, then WalletConnect) and owns
/// the active signer once connected.
pub struct WalletSession {
    bridges: Vec<Arc<dyn WalletBridge>>,
    required_chain: ChainParams,
    state: Mutex<ConnectionState>,
    events: Mutex<Option<UnboundedReceiver<WalletEvent>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl WalletSession {
    pub fn new(bridges: Vec<Arc<dyn WalletBridge>>, required_chain: ChainParams) -> Self {
        Self {
            bridges,
            required_chain,
            state: Mutex::new(ConnectionState::Disconnected),
            events: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.state).clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(*lock(&self.state), ConnectionState::Connected { .. })
    }

    pub fn address(&self) -> Option<Address> {
        match &*lock(&self.state) {
            ConnectionState::Connected { address, .. } => Some(*address),
            _ => None,
        }
    }

    /// The active signer, present only while connected
    pub fn signer(&self) -> Option<Arc<dyn WalletBridge>> {
        match &*lock(&self.state) {
            ConnectionState::Connected { signer, .. } => Some(signer.clone()),
            _ => None,
        }
    }

    /// Take the wallet event stream for the current connection. The caller
    /// feeds received events back through `handle_event`.
    pub fn take_events(&self) -> Option<UnboundedReceiver<WalletEvent>> {
        lock(&self.events).take()
    }

    /// User-initiated connect. Only one attempt may be in flight: a second
    /// call while Connecting is rejected without starting another path.
    pub async fn connect(&self) -> Result<ConnectOutcome, WalletError> {
        {
            let mut state = lock(&self.state);
            if matches!(*state, ConnectionState::Connecting) {
                return Err(WalletError::PendingRequest);
            }
            *state = ConnectionState::Connecting;
        }

        let bridge = match self.bridges.iter().find(|b| b.available()) {
            Some(bridge) => bridge.clone(),
            None => {
                let reason = WalletError::NoWallet.to_string();
                *lock(&self.state) = ConnectionState::Error { reason };
                return Err(WalletError::NoWallet);
            }
        };
        info!("connecting via {} path", bridge.path());

        let accounts = match bridge.request_accounts().await {
            Ok(accounts) => accounts,
            Err(WalletError::DeepLinkHandoff(url)) => {
                // The wallet app's browser re-runs the connection; this
                // client's attempt is over.
                *lock(&self.state) = ConnectionState::Disconnected;
                return Ok(ConnectOutcome::HandedOff(url));
            }
            Err(e) => {
                *lock(&self.state) = ConnectionState::Error {
                    reason: e.to_string(),
                };
                return Err(e);
            }
        };

        let address = match accounts.first() {
            Some(address) => *address,
            None => {
                let e = WalletError::Locked;
                *lock(&self.state) = ConnectionState::Error {
                    reason: e.to_string(),
                };
                return Err(e);
            }
        };

        if let Err(e) = self.ensure_chain(bridge.as_ref()).await {
            *lock(&self.state) = ConnectionState::Error {
                reason: e.to_string(),
            };
            return Err(e);
        }

        *lock(&self.events) = Some(bridge.subscribe());
        *lock(&self.state) = ConnectionState::Connected {
            address,
            signer: bridge,
        };
        info!("connected as {:#x}", address);
        Ok(ConnectOutcome::Connected(address))
    }

    /// Verify the wallet sits on the required chain, switching and, for a
    /// chain the wallet has never seen, adding it first.
    async fn ensure_chain(&self, bridge: &dyn WalletBridge) -> Result<(), WalletError> {
        let current = bridge.chain_id().await?;
        if current == self.required_chain.chain_id {
            return Ok(());
        }

        info!(
            "wallet is on chain {}, switching to {}",
            current, self.required_chain.chain_id
        );
        match bridge.switch_chain(self.required_chain.chain_id).await {
            Ok(()) => Ok(()),
            Err(WalletError::UnknownChain) => {
                bridge.add_chain(&self.required_chain).await?;
                bridge.switch_chain(self.required_chain.chain_id).await
            }
            Err(e) => Err(WalletError::ChainSwitch(e.to_string())),
        }
    }

    /// User-initiated disconnect; bridge teardown is best effort
    pub async fn disconnect(&self) {
        let previous = std::mem::take(&mut *lock(&self.state));
        lock(&self.events).take();
        if let ConnectionState::Connected { signer, .. } = previous {
            signer.disconnect().await;
        }
        info!("wallet disconnected");
    }

    /// Apply a wallet-originated event as a state transition and report
    /// what the caller should do next
    pub fn handle_event(&self, event: WalletEvent) -> SessionEffect {
        match event {
            WalletEvent::AccountsChanged(accounts) => match accounts.first() {
                None => {
                    // wallet revoked access or locked
                    *lock(&self.state) = ConnectionState::Disconnected;
                    SessionEffect::Refresh
                }
                Some(new_address) => {
                    let mut state = lock(&self.state);
                    if let ConnectionState::Connected { address, .. } = &mut *state {
                        if address != new_address {
                            info!("account changed to {:#x}", new_address);
                            *address = *new_address;
                        }
                        SessionEffect::Refresh
                    } else {
                        SessionEffect::None
                    }
                }
            },
            WalletEvent::ChainChanged(chain) => {
                // every cached contract/amount value is chain-specific
                warn!("wallet switched to chain {}, reloading state", chain);
                SessionEffect::Reload
            }
            WalletEvent::Disconnected => {
                *lock(&self.state) = ConnectionState::Disconnected;
                SessionEffect::Refresh
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::bridge::{ConnectPath, TxRequest};
    use alloy_primitives::{address, B256};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    const CHAIN_ID: u64 = 11155111;
    const ACCOUNT: Address = address!("d27131870F189249F9C7F57E985486a0568F64EF");

    fn chain_params() -> ChainParams {
        ChainParams {
            chain_id: CHAIN_ID,
            chain_name: "Sepolia".to_string(),
            currency_name: "SepoliaETH".to_string(),
            currency_symbol: "SEP".to_string(),
            currency_decimals: 18,
            rpc_urls: vec![],
            explorer_url: String::new(),
        }
    }

    /// Bridge stub: optionally blocks in request_accounts until released,
    /// counting how many attempts were started
    struct StubBridge {
        gate: Option<Arc<Notify>>,
        attempts: AtomicUsize,
        wrong_chain: bool,
        switches: AtomicUsize,
    }

    impl StubBridge {
        fn instant() -> Self {
            Self {
                gate: None,
                attempts: AtomicUsize::new(0),
                wrong_chain: false,
                switches: AtomicUsize::new(0),
            }
        }

        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                attempts: AtomicUsize::new(0),
                wrong_chain: false,
                switches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl WalletBridge for StubBridge {
        fn path(&self) -> ConnectPath {
            ConnectPath::Injected
        }

        fn available(&self) -> bool {
            true
        }

        fn address(&self) -> Address {
            ACCOUNT
        }

        async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(vec![ACCOUNT])
        }

        async fn chain_id(&self) -> Result<u64, WalletError> {
            if self.wrong_chain && self.switches.load(Ordering::SeqCst) == 0 {
                Ok(1)
            } else {
                Ok(CHAIN_ID)
            }
        }

        async fn switch_chain(&self, _chain_id: u64) -> Result<(), WalletError> {
            self.switches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn add_chain(&self, _params: &ChainParams) -> Result<(), WalletError> {
            Ok(())
        }

        async fn send_transaction(&self, _tx: &TxRequest) -> Result<B256, WalletError> {
            Ok(B256::ZERO)
        }

        async fn wait_for_confirmation(&self, _hash: B256) -> Result<(), WalletError> {
            Ok(())
        }

        async fn disconnect(&self) {}

        fn subscribe(&self) -> UnboundedReceiver<WalletEvent> {
            tokio::sync::mpsc::unbounded_channel().1
        }
    }

    #[tokio::test]
    async fn connects_through_first_available_path() {
        let session = WalletSession::new(vec![Arc::new(StubBridge::instant())], chain_params());
        let outcome = session.connect().await.unwrap();
        assert_eq!(outcome, ConnectOutcome::Connected(ACCOUNT));
        assert!(session.is_connected());
        assert_eq!(session.address(), Some(ACCOUNT));
        assert!(session.signer().is_some());
    }

    #[tokio::test]
    async fn second_connect_while_connecting_is_rejected() {
        let gate = Arc::new(Notify::new());
        let bridge = Arc::new(StubBridge::gated(gate.clone()));
        let session = Arc::new(WalletSession::new(vec![bridge.clone()], chain_params()));

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.connect().await })
        };
        // let the first attempt reach the wallet prompt
        tokio::task::yield_now().await;

        let second = session.connect().await;
        assert!(matches!(second, Err(WalletError::PendingRequest)));
        assert_eq!(bridge.attempts.load(Ordering::SeqCst), 1);

        gate.notify_one();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first, ConnectOutcome::Connected(ACCOUNT));
    }

    #[tokio::test]
    async fn switches_chain_when_wallet_is_elsewhere() {
        let bridge = Arc::new(StubBridge {
            gate: None,
            attempts: AtomicUsize::new(0),
            wrong_chain: true,
            switches: AtomicUsize::new(0),
        });
        let session = WalletSession::new(vec![bridge.clone()], chain_params());
        session.connect().await.unwrap();
        assert_eq!(bridge.switches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_available_path_errors_out() {
        let session = WalletSession::new(vec![], chain_params());
        let result = session.connect().await;
        assert!(matches!(result, Err(WalletError::NoWallet)));
        assert!(matches!(session.state(), ConnectionState::Error { .. }));
    }

    #[tokio::test]
    async fn empty_accounts_event_disconnects() {
        let session = WalletSession::new(vec![Arc::new(StubBridge::instant())], chain_params());
        session.connect().await.unwrap();

        let effect = session.handle_event(WalletEvent::AccountsChanged(vec![]));
        assert_eq!(effect, SessionEffect::Refresh);
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn account_change_keeps_session_with_new_address() {
        let session = WalletSession::new(vec![Arc::new(StubBridge::instant())], chain_params());
        session.connect().await.unwrap();

        let other = address!("75DbbF6459Acf142f6b89f5456aB5f41dCeddBa8");
        let effect = session.handle_event(WalletEvent::AccountsChanged(vec![other]));
        assert_eq!(effect, SessionEffect::Refresh);
        assert_eq!(session.address(), Some(other));
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn chain_change_requests_full_reload() {
        let session = WalletSession::new(vec![Arc::new(StubBridge::instant())], chain_params());
        session.connect().await.unwrap();
        assert_eq!(
            session.handle_event(WalletEvent::ChainChanged(1)),
            SessionEffect::Reload
        );
    }
}
