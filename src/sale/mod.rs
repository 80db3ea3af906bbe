// Re-export everything from submodules
pub mod clock;
pub mod purchase;
pub mod status;

// Re-export commonly used items
pub use clock::{countdown_at, phase_at, unix_now, SaleClock};
pub use purchase::{PurchaseEvent, PurchaseFlow, PurchaseReceipt};
pub use status::{SaleSnapshot, StatusService};
