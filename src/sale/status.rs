use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use log::debug;
use std::sync::Arc;

use crate::entity::{Amount, QuoteResult, SalePhase, SaleWindow, PAYMENT_DECIMALS};
use crate::evm::gateway::{SaleGateway, TokenKind, TokenMeta};
use crate::sale::clock::{phase_at, unix_now};

/// Everything the client displays, in smallest units. `None` means "never
/// read successfully"; a refresh that fails partway leaves the previous
/// values in place rather than blanking them.
#[derive(Debug, Clone, Default)]
pub struct SaleSnapshot {
    pub price: Option<U256>,
    pub window: Option<SaleWindow>,
    pub phase: SalePhase,
    pub sale_token: Option<Address>,
    pub funds_wallet: Option<Address>,
    pub payment_meta: Option<TokenMeta>,
    pub sale_meta: Option<TokenMeta>,
    /// Payment-token balance held by the sale contract
    pub sale_payment_balance: Option<U256>,
    /// Remaining sale-token inventory of the contract
    pub sale_token_balance: Option<U256>,
    pub my_payment_balance: Option<U256>,
    pub my_token_balance: Option<U256>,
    pub my_allowance: Option<U256>,
    pub quote: QuoteResult,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Periodic and on-demand display refresh. Each refresh is an idempotent
/// snapshot read; overlapping refreshes are harmless and the newest write
/// wins.
pub struct StatusService {
    gateway: Arc<dyn SaleGateway>,
}

impl StatusService {
    pub fn new(gateway: Arc<dyn SaleGateway>) -> Self {
        Self { gateway }
    }

    /// Read a fresh snapshot, carrying forward any field that fails to
    /// read. `input` is the user's current payment-amount entry; the quote
    /// is recomputed against the freshly read price, never a cached one.
    pub async fn refresh(
        &self,
        previous: &SaleSnapshot,
        me: Option<Address>,
        input: &str,
    ) -> SaleSnapshot {
        let mut next = previous.clone();

        match self.gateway.price().await {
            Ok(price) => next.price = Some(price),
            Err(e) => debug!("price read failed, keeping previous: {}", e),
        }

        match self.gateway.sale_window().await {
            Ok(window) => next.window = Some(window),
            Err(e) => debug!("sale window read failed, keeping previous: {}", e),
        }
        next.phase = match &next.window {
            Some(window) => phase_at(unix_now(), window),
            None => SalePhase::Unknown,
        };

        match self.gateway.token_address().await {
            Ok(address) => next.sale_token = Some(address),
            Err(e) => debug!("sale token read failed: {}", e),
        }

        match self.gateway.funds_wallet().await {
            Ok(address) => next.funds_wallet = Some(address),
            Err(e) => debug!("funds wallet read failed: {}", e),
        }

        // token metadata never changes, read it once
        if next.payment_meta.is_none() {
            match self.gateway.token_meta(TokenKind::Payment).await {
                Ok(meta) => next.payment_meta = Some(meta),
                Err(e) => debug!("payment token metadata read failed: {}", e),
            }
        }
        if next.sale_meta.is_none() {
            match self.gateway.token_meta(TokenKind::Sale).await {
                Ok(meta) => next.sale_meta = Some(meta),
                Err(e) => debug!("sale token metadata read failed: {}", e),
            }
        }

        if let Some(me) = me {
            match self.gateway.balance_of(TokenKind::Payment, me).await {
                Ok(balance) => next.my_payment_balance = Some(balance),
                Err(e) => debug!("payment balance read failed: {}", e),
            }
            match self.gateway.balance_of(TokenKind::Sale, me).await {
                Ok(balance) => next.my_token_balance = Some(balance),
                Err(e) => debug!("token balance read failed: {}", e),
            }
            match self.gateway.allowance(me).await {
                Ok(allowance) => next.my_allowance = Some(allowance),
                Err(e) => debug!("allowance read failed: {}", e),
            }
        }

        next.quote = QuoteResult::compute(
            next.price,
            Amount::parse(input, PAYMENT_DECIMALS).ok(),
        );
        next.last_updated = Some(Utc::now());
        next
    }

    /// Contract-side balances, read separately since they need the sale
    /// contract address
    pub async fn refresh_contract_balances(
        &self,
        previous: &SaleSnapshot,
        sale_address: Address,
    ) -> SaleSnapshot {
        let mut next = previous.clone();

        match self
            .gateway
            .balance_of(TokenKind::Payment, sale_address)
            .await
        {
            Ok(balance) => next.sale_payment_balance = Some(balance),
            Err(e) => debug!("contract payment balance read failed: {}", e),
        }
        match self.gateway.balance_of(TokenKind::Sale, sale_address).await {
            Ok(balance) => next.sale_token_balance = Some(balance),
            Err(e) => debug!("contract token balance read failed: {}", e),
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{SaleError, SaleWindow};
    use crate::wallet::WalletBridge;
    use alloy_primitives::B256;
    use async_trait::async_trait;

    /// Gateway stub whose reads can be switched off to simulate a
    /// mid-flight failure
    struct FlakyGateway {
        healthy: bool,
    }

    #[async_trait]
    impl SaleGateway for FlakyGateway {
        async fn price(&self) -> Result<U256, SaleError> {
            if self.healthy {
                Ok(U256::from(350_000u64))
            } else {
                Err(SaleError::Unavailable("price"))
            }
        }

        async fn sale_window(&self) -> Result<SaleWindow, SaleError> {
            if self.healthy {
                Ok(SaleWindow::new(1, u64::MAX))
            } else {
                Err(SaleError::Unavailable("sale window"))
            }
        }

        async fn token_address(&self) -> Result<Address, SaleError> {
            Err(SaleError::Unavailable("sale token address"))
        }

        async fn funds_wallet(&self) -> Result<Address, SaleError> {
            Err(SaleError::Unavailable("funds wallet"))
        }

        async fn balance_of(&self, _kind: TokenKind, _owner: Address) -> Result<U256, SaleError> {
            Err(SaleError::Unavailable("balance"))
        }

        async fn allowance(&self, _owner: Address) -> Result<U256, SaleError> {
            Err(SaleError::Unavailable("allowance"))
        }

        async fn token_meta(&self, _kind: TokenKind) -> Result<TokenMeta, SaleError> {
            Err(SaleError::Unavailable("token metadata"))
        }

        async fn approve(
            &self,
            _signer: &dyn WalletBridge,
            _amount: U256,
        ) -> Result<B256, SaleError> {
            unimplemented!("read-only stub")
        }

        async fn buy(&self, _signer: &dyn WalletBridge, _amount: U256) -> Result<B256, SaleError> {
            unimplemented!("read-only stub")
        }
    }

    #[tokio::test]
    async fn failed_refresh_keeps_stale_but_valid_values() {
        let healthy = StatusService::new(Arc::new(FlakyGateway { healthy: true }));
        let first = healthy
            .refresh(&SaleSnapshot::default(), None, "50")
            .await;
        assert_eq!(first.price, Some(U256::from(350_000u64)));
        assert_eq!(first.phase, SalePhase::Live);
        assert!(matches!(first.quote, QuoteResult::Quote { .. }));
        assert!(first.last_updated.is_some());

        let broken = StatusService::new(Arc::new(FlakyGateway { healthy: false }));
        let second = broken.refresh(&first, None, "50").await;
        // previously displayed values survive the outage
        assert_eq!(second.price, first.price);
        assert_eq!(second.window, first.window);
    }

    #[tokio::test]
    async fn quote_is_recomputed_per_refresh() {
        let service = StatusService::new(Arc::new(FlakyGateway { healthy: true }));
        let snap = service
            .refresh(&SaleSnapshot::default(), None, "50")
            .await;
        let output = snap.quote.output().unwrap();
        assert_eq!(crate::utils::format_quote(output.raw()), "142.8571");

        let cleared = service.refresh(&snap, None, "").await;
        assert_eq!(cleared.quote, QuoteResult::Unavailable);
    }
}
