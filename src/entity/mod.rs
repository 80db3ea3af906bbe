pub mod amount;
mod error;
mod phase;
mod quote;
mod transaction;

pub use amount::{Amount, PAYMENT_DECIMALS, SALE_TOKEN_DECIMALS};
pub use error::SaleError;
pub use phase::{Countdown, SalePhase, SaleWindow};
pub use quote::QuoteResult;
pub use transaction::{TransactionRecord, TxKind};
