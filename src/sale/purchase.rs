use alloy_primitives::U256;
use log::info;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use crate::entity::{Amount, SaleError, SalePhase, TransactionRecord, TxKind};
use crate::evm::gateway::SaleGateway;
use crate::sale::status::SaleSnapshot;
use crate::utils::{format_payment, format_price};
use crate::wallet::WalletBridge;

/// Progress notifications. Hashes are surfaced as soon as a transaction is
/// submitted, before confirmation, so the user keeps an audit trail even
/// if the client goes away mid-wait.
#[derive(Debug, Clone)]
pub enum PurchaseEvent {
    ApprovalSubmitted(TransactionRecord),
    ApprovalConfirmed(TransactionRecord),
    PurchaseSubmitted(TransactionRecord),
    PurchaseConfirmed(TransactionRecord),
}

#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    /// Absent when the standing allowance already covered the amount
    pub approval: Option<TransactionRecord>,
    pub purchase: TransactionRecord,
}

/// Sequences the two-step approve + buy purchase. Every precondition is
/// checked before the first chain interaction; a failed transaction is
/// discarded and the user must re-initiate.
pub struct PurchaseFlow {
    gateway: Arc<dyn SaleGateway>,
    /// Minimum purchase in payment-token smallest units
    min_amount: U256,
}

impl PurchaseFlow {
    pub fn new(gateway: Arc<dyn SaleGateway>, min_amount: U256) -> Self {
        Self { gateway, min_amount }
    }

    /// Execute a purchase of `amount` payment tokens. The approval, when
    /// needed, is for exactly `amount` (no unlimited pre-approvals) and
    /// must confirm on chain before the buy is submitted. The caller
    /// refreshes balances and the quote after a successful return.
    pub async fn purchase(
        &self,
        signer: Option<Arc<dyn WalletBridge>>,
        snapshot: &SaleSnapshot,
        amount: Amount,
        progress: &UnboundedSender<PurchaseEvent>,
    ) -> Result<PurchaseReceipt, SaleError> {
        let signer = signer.ok_or(SaleError::NotConnected)?;

        if snapshot.phase != SalePhase::Live {
            return Err(SaleError::SaleNotLive(snapshot.phase));
        }

        match snapshot.price {
            Some(price) if !price.is_zero() => {}
            _ => return Err(SaleError::Unavailable("price")),
        }

        if amount.is_zero() {
            return Err(SaleError::InvalidAmount("amount must be positive".to_string()));
        }
        if amount.raw() < self.min_amount {
            // full payment-token precision: a sub-cent minimum must not
            // render as "0"
            return Err(SaleError::BelowMinimum {
                minimum: format_price(self.min_amount),
            });
        }

        if let Some(balance) = snapshot.my_payment_balance {
            if amount.raw() > balance {
                return Err(SaleError::InsufficientBalance {
                    balance: format_payment(balance),
                    amount: format_payment(amount.raw()),
                });
            }
        }

        let owner = signer.address();
        let allowance = self.gateway.allowance(owner).await?;

        let approval = if allowance < amount.raw() {
            let hash = self.gateway.approve(signer.as_ref(), amount.raw()).await?;
            let mut record = TransactionRecord::submitted(TxKind::Approve, hash);
            let _ = progress.send(PurchaseEvent::ApprovalSubmitted(record.clone()));
            info!("approval submitted: {:#x}", hash);

            // the buy must observe the new allowance on chain
            signer.wait_for_confirmation(hash).await?;
            record.confirm();
            let _ = progress.send(PurchaseEvent::ApprovalConfirmed(record.clone()));
            Some(record)
        } else {
            None
        };

        let hash = self.gateway.buy(signer.as_ref(), amount.raw()).await?;
        let mut record = TransactionRecord::submitted(TxKind::Buy, hash);
        let _ = progress.send(PurchaseEvent::PurchaseSubmitted(record.clone()));
        info!("purchase submitted: {:#x}", hash);

        signer.wait_for_confirmation(hash).await?;
        record.confirm();
        let _ = progress.send(PurchaseEvent::PurchaseConfirmed(record.clone()));

        Ok(PurchaseReceipt {
            approval,
            purchase: record,
        })
    }
}
