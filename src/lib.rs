pub mod config;
pub mod entity;
pub mod evm;
pub mod sale;
pub mod utils;
pub mod wallet;

// Re-export commonly used items
pub use config::Config;
pub use entity::*;
pub use evm::*;
pub use sale::*;
pub use utils::*;
pub use wallet::*;

/// Crate version, used in startup logging
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
