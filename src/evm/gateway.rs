use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::entity::{SaleError, SaleWindow};
use crate::evm::abi::{IERC20, ILaunchpad, ILaunchpadLegacy};
use crate::evm::provider_pool::ReadProviderPool;
use crate::wallet::{TxRequest, WalletBridge, WalletError};

/// Which token a balance query refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Payment,
    Sale,
}

/// Display metadata of an ERC-20 token; immutable, read once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMeta {
    pub symbol: String,
    pub decimals: u8,
}

/// Typed read/write surface over the sale contract and the payment token.
/// Seam trait so flows can be exercised against a stub.
#[async_trait]
pub trait SaleGateway: Send + Sync {
    async fn price(&self) -> Result<U256, SaleError>;
    async fn sale_window(&self) -> Result<SaleWindow, SaleError>;
    async fn token_address(&self) -> Result<Address, SaleError>;
    async fn funds_wallet(&self) -> Result<Address, SaleError>;
    async fn balance_of(&self, kind: TokenKind, owner: Address) -> Result<U256, SaleError>;
    async fn allowance(&self, owner: Address) -> Result<U256, SaleError>;
    async fn token_meta(&self, kind: TokenKind) -> Result<TokenMeta, SaleError>;

    /// Approve the sale contract to spend exactly `amount` of the payment
    /// token. Requires a connected signer; returns the submitted hash.
    async fn approve(&self, signer: &dyn WalletBridge, amount: U256) -> Result<B256, SaleError>;

    /// Submit the purchase. Requires a connected signer; returns the
    /// submitted hash.
    async fn buy(&self, signer: &dyn WalletBridge, amount: U256) -> Result<B256, SaleError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PriceMethod {
    PriceUsdc,
    Price,
    TokenPrice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowMethod {
    StartEndTime,
    SaleStartEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuyMethod {
    BuyWithUsdc,
    Buy,
    Purchase,
}

/// Candidate resolution, probed once per accessor and cached for the
/// lifetime of the gateway
#[derive(Default)]
struct ResolvedMethods {
    price: Option<PriceMethod>,
    window: Option<WindowMethod>,
    buy: Option<BuyMethod>,
    sale_token: Option<Address>,
}

pub struct ContractGateway {
    pool: Arc<ReadProviderPool>,
    sale_address: Address,
    payment_token: Address,
    resolved: Mutex<ResolvedMethods>,
}

impl ContractGateway {
    pub fn new(pool: Arc<ReadProviderPool>, sale_address: Address, payment_token: Address) -> Self {
        Self {
            pool,
            sale_address,
            payment_token,
            resolved: Mutex::new(ResolvedMethods::default()),
        }
    }

    pub fn sale_address(&self) -> Address {
        self.sale_address
    }

    pub fn payment_token(&self) -> Address {
        self.payment_token
    }

    fn resolved(&self) -> MutexGuard<'_, ResolvedMethods> {
        match self.resolved.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Encode a call, read it through the provider pool, decode the returns
    async fn read<C: SolCall>(&self, to: Address, call: C) -> Result<C::Return, SaleError> {
        let data = Bytes::from(call.abi_encode());
        let raw = self.pool.eth_call(to, data).await?;
        C::abi_decode_returns(&raw, true).map_err(|e| SaleError::AbiDecode(e.to_string()))
    }

    async fn price_via(&self, method: PriceMethod) -> Result<U256, SaleError> {
        match method {
            PriceMethod::PriceUsdc => self
                .read(self.sale_address, ILaunchpad::priceUSDCCall {})
                .await
                .map(|r| r._0),
            PriceMethod::Price => self
                .read(self.sale_address, ILaunchpadLegacy::priceCall {})
                .await
                .map(|r| r._0),
            PriceMethod::TokenPrice => self
                .read(self.sale_address, ILaunchpadLegacy::tokenPriceCall {})
                .await
                .map(|r| r._0),
        }
    }

    async fn window_via(&self, method: WindowMethod) -> Result<SaleWindow, SaleError> {
        let (start, end) = match method {
            WindowMethod::StartEndTime => {
                let start = self
                    .read(self.sale_address, ILaunchpad::startTimeCall {})
                    .await?
                    ._0;
                let end = self
                    .read(self.sale_address, ILaunchpad::endTimeCall {})
                    .await?
                    ._0;
                (start, end)
            }
            WindowMethod::SaleStartEnd => {
                let start = self
                    .read(self.sale_address, ILaunchpadLegacy::saleStartCall {})
                    .await?
                    ._0;
                let end = self
                    .read(self.sale_address, ILaunchpadLegacy::saleEndCall {})
                    .await?
                    ._0;
                (start, end)
            }
        };

        Ok(SaleWindow::new(start.saturating_to(), end.saturating_to()))
    }

    fn buy_calldata(&self, method: BuyMethod, amount: U256) -> Bytes {
        match method {
            BuyMethod::BuyWithUsdc => Bytes::from(
                ILaunchpad::buyWithUSDCCall {
                    usdcAmount: amount,
                }
                .abi_encode(),
            ),
            BuyMethod::Buy => Bytes::from(ILaunchpadLegacy::buyCall { amount }.abi_encode()),
            BuyMethod::Purchase => {
                Bytes::from(ILaunchpadLegacy::purchaseCall { amount }.abi_encode())
            }
        }
    }
}

#[async_trait]
impl SaleGateway for ContractGateway {
    async fn price(&self) -> Result<U256, SaleError> {
        // copy the cached method out so the guard never lives across an await
        let cached = self.resolved().price;
        if let Some(method) = cached {
            let value = self.price_via(method).await?;
            if value.is_zero() {
                return Err(SaleError::Unavailable("price"));
            }
            return Ok(value);
        }

        for method in [
            PriceMethod::PriceUsdc,
            PriceMethod::Price,
            PriceMethod::TokenPrice,
        ] {
            match self.price_via(method).await {
                Ok(value) if !value.is_zero() => {
                    debug!("resolved price accessor: {:?}", method);
                    self.resolved().price = Some(method);
                    return Ok(value);
                }
                Ok(_) => continue,
                Err(e) => {
                    debug!("price candidate {:?} failed: {}", method, e);
                    continue;
                }
            }
        }

        Err(SaleError::Unavailable("price"))
    }

    async fn sale_window(&self) -> Result<SaleWindow, SaleError> {
        let cached = self.resolved().window;
        if let Some(method) = cached {
            let window = self.window_via(method).await?;
            if !window.is_valid() {
                return Err(SaleError::Unavailable("sale window"));
            }
            return Ok(window);
        }

        for method in [WindowMethod::StartEndTime, WindowMethod::SaleStartEnd] {
            match self.window_via(method).await {
                Ok(window) if window.is_valid() => {
                    debug!("resolved sale-window accessor: {:?}", method);
                    self.resolved().window = Some(method);
                    return Ok(window);
                }
                Ok(_) => continue,
                Err(e) => {
                    debug!("sale-window candidate {:?} failed: {}", method, e);
                    continue;
                }
            }
        }

        Err(SaleError::Unavailable("sale window"))
    }

    async fn token_address(&self) -> Result<Address, SaleError> {
        let cached = self.resolved().sale_token;
        if let Some(address) = cached {
            return Ok(address);
        }

        let probed = match self.read(self.sale_address, ILaunchpad::tokenCall {}).await {
            Ok(r) => Some(r._0),
            Err(_) => self
                .read(self.sale_address, ILaunchpadLegacy::saleTokenCall {})
                .await
                .ok()
                .map(|r| r._0),
        };

        match probed {
            Some(address) if address != Address::ZERO => {
                self.resolved().sale_token = Some(address);
                Ok(address)
            }
            _ => Err(SaleError::Unavailable("sale token address")),
        }
    }

    async fn funds_wallet(&self) -> Result<Address, SaleError> {
        let address = self
            .read(self.sale_address, ILaunchpad::fundsWalletCall {})
            .await?
            ._0;
        if address == Address::ZERO {
            return Err(SaleError::Unavailable("funds wallet"));
        }
        Ok(address)
    }

    async fn balance_of(&self, kind: TokenKind, owner: Address) -> Result<U256, SaleError> {
        let token = match kind {
            TokenKind::Payment => self.payment_token,
            TokenKind::Sale => self.token_address().await?,
        };
        self.read(token, IERC20::balanceOfCall { owner })
            .await
            .map(|r| r._0)
    }

    async fn allowance(&self, owner: Address) -> Result<U256, SaleError> {
        self.read(
            self.payment_token,
            IERC20::allowanceCall {
                owner,
                spender: self.sale_address,
            },
        )
        .await
        .map(|r| r._0)
    }

    async fn token_meta(&self, kind: TokenKind) -> Result<TokenMeta, SaleError> {
        let token = match kind {
            TokenKind::Payment => self.payment_token,
            TokenKind::Sale => self.token_address().await?,
        };
        let symbol = self.read(token, IERC20::symbolCall {}).await?._0;
        let decimals = self.read(token, IERC20::decimalsCall {}).await?._0;
        Ok(TokenMeta { symbol, decimals })
    }

    async fn approve(&self, signer: &dyn WalletBridge, amount: U256) -> Result<B256, SaleError> {
        let data = Bytes::from(
            IERC20::approveCall {
                spender: self.sale_address,
                value: amount,
            }
            .abi_encode(),
        );
        let tx = TxRequest::new(self.payment_token, data);
        Ok(signer.send_transaction(&tx).await?)
    }

    async fn buy(&self, signer: &dyn WalletBridge, amount: U256) -> Result<B256, SaleError> {
        let cached = self.resolved().buy;
        if let Some(method) = cached {
            let tx = TxRequest::new(self.sale_address, self.buy_calldata(method, amount));
            return Ok(signer.send_transaction(&tx).await?);
        }

        let mut last: Option<WalletError> = None;
        for method in [BuyMethod::BuyWithUsdc, BuyMethod::Buy, BuyMethod::Purchase] {
            let tx = TxRequest::new(self.sale_address, self.buy_calldata(method, amount));
            match signer.send_transaction(&tx).await {
                Ok(hash) => {
                    info!("resolved purchase method: {:?}", method);
                    self.resolved().buy = Some(method);
                    return Ok(hash);
                }
                // An immediate revert means the contract has no such method;
                // try the next candidate. Anything else aborts: the
                // transaction may be in flight or the user declined.
                Err(WalletError::Reverted(message)) => {
                    debug!("purchase candidate {:?} rejected: {}", method, message);
                    last = Some(WalletError::Reverted(message));
                }
                Err(e) => return Err(e.into()),
            }
        }

        match last {
            Some(e) => Err(e.into()),
            None => Err(SaleError::Unavailable("purchase method")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // the accessor futures must be spawnable onto the multi-threaded
    // runtime, so no lock guard may live across an await inside them
    #[test]
    fn accessor_futures_are_send() {
        fn require_send<T: Send>(_: &T) {}

        let pool = Arc::new(ReadProviderPool::new(&["http://localhost:0".to_string()]).unwrap());
        let gateway = ContractGateway::new(pool, Address::ZERO, Address::ZERO);

        require_send(&gateway.price());
        require_send(&gateway.sale_window());
        require_send(&gateway.token_address());
    }
}
