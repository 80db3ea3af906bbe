use serde::{Deserialize, Serialize};

/// Where the sale stands relative to its time window. Always derived from
/// `(now, window)`, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalePhase {
    Pre,
    Live,
    Ended,
    /// The window could not be read; indeterminate rather than defaulted.
    #[default]
    Unknown,
}

impl std::fmt::Display for SalePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SalePhase::Pre => write!(f, "PRE"),
            SalePhase::Live => write!(f, "LIVE"),
            SalePhase::Ended => write!(f, "ENDED"),
            SalePhase::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Sale start/end as Unix seconds, as reported by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleWindow {
    pub start: u64,
    pub end: u64,
}

impl SaleWindow {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// A usable window has a nonzero start that does not come after the end.
    pub fn is_valid(&self) -> bool {
        self.start > 0 && self.start <= self.end
    }

    pub fn total_seconds(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

/// One derived countdown sample: phase, target timestamp and the remaining
/// time decomposed for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub phase: SalePhase,
    /// Start while PRE, end while LIVE or ENDED
    pub target: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    /// Elapsed share of the sale window, 0..=100
    pub progress_pct: u8,
}
