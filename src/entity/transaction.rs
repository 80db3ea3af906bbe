use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    Approve,
    Buy,
}

impl std::fmt::Display for TxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxKind::Approve => write!(f, "APPROVE"),
            TxKind::Buy => write!(f, "BUY"),
        }
    }
}

/// A submitted transaction. Created as soon as a hash exists so the user
/// has an audit trail before confirmation; discarded on failure, never
/// retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub kind: TxKind,
    pub hash: B256,
    pub confirmed: bool,
}

impl TransactionRecord {
    pub fn submitted(kind: TxKind, hash: B256) -> Self {
        Self {
            kind,
            hash,
            confirmed: false,
        }
    }

    pub fn confirm(&mut self) {
        self.confirmed = true;
    }

    pub fn explorer_link(&self, explorer_url: &str) -> String {
        format!("{}/tx/{:#x}", explorer_url.trim_end_matches('/'), self.hash)
    }
}
