use crate::entity::SalePhase;
use crate::evm::RpcError;
use crate::wallet::WalletError;

#[derive(Debug, thiserror::Error)]
pub enum SaleError {
    #[error("Network error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// No candidate contract method produced a usable value. Never
    /// substituted with a zero.
    #[error("{0} is unavailable")]
    Unavailable(&'static str),

    #[error("Could not decode contract response: {0}")]
    AbiDecode(String),

    #[error("Wallet is not connected")]
    NotConnected,

    #[error("Sale is not live (current phase: {0})")]
    SaleNotLive(SalePhase),

    #[error("Amount is below the minimum purchase of {minimum}")]
    BelowMinimum { minimum: String },

    #[error("Insufficient balance: have {balance}, need {amount}")]
    InsufficientBalance { balance: String, amount: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}
