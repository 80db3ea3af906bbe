// Re-export everything from submodules
pub mod abi;
pub mod gateway;
pub mod provider_pool;
pub mod rpc;

// Re-export commonly used items
pub use gateway::{ContractGateway, SaleGateway, TokenKind, TokenMeta};
pub use provider_pool::ReadProviderPool;
pub use rpc::{RpcClient, RpcError, TxReceipt};
