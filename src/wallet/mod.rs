// Re-export everything from submodules
pub mod bridge;
pub mod session;

// Re-export commonly used items
pub use bridge::{
    ChainParams, ConnectPath, DeepLinkBridge, HttpWalletBridge, TxRequest, WalletBridge,
    WalletConnectBridge, WalletError, WalletEvent,
};
pub use session::{ConnectOutcome, ConnectionState, SessionEffect, WalletSession};
