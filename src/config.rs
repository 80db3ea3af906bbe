use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

use crate::entity::{Amount, PAYMENT_DECIMALS};
use crate::wallet::ChainParams;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Ordered read-only RPC endpoints
    pub read_rpc_urls: Vec<String>,

    /// Sale (launchpad) contract address
    pub sale_address: Address,

    /// Payment token (stablecoin) contract address
    pub payment_token_address: Address,

    /// Chain the sale lives on, with add-chain parameters
    pub chain: ChainParams,

    /// EIP-1193 wallet endpoint (the injected-provider equivalent)
    pub wallet_rpc_url: Option<String>,

    /// WalletConnect project id; empty disables the path
    pub walletconnect_project_id: Option<String>,

    /// WalletConnect relay provider endpoint
    pub walletconnect_relay_url: Option<String>,

    /// Public page URL used to build the mobile deep link
    pub dapp_url: Option<String>,

    /// Mobile environment hint: prefer the deep-link path when no wallet
    /// endpoint is configured
    pub mobile: bool,

    /// Minimum purchase in payment-token smallest units
    pub min_purchase: U256,

    /// Display refresh cadence in seconds
    pub refresh_interval_secs: u64,
}

const DEFAULT_READ_RPCS: [&str; 3] = [
    "https://rpc.sepolia.org",
    "https://1rpc.io/sepolia",
    "https://endpoints.omniatech.io/v1/eth/sepolia/public",
];
const DEFAULT_SALE: &str = "0xd27131870F189249F9C7F57E985486a0568F64EF";
const DEFAULT_USDC: &str = "0x75DbbF6459Acf142f6b89f5456aB5f41dCeddBa8";
const DEFAULT_EXPLORER: &str = "https://sepolia.etherscan.io";
const DEFAULT_CHAIN_ID: u64 = 11155111;

impl Config {
    /// Build configuration from environment variables, falling back to the
    /// Sepolia test deployment
    pub fn from_env() -> Result<Self> {
        let read_rpc_urls: Vec<String> = match env::var("READ_RPC_URLS") {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => DEFAULT_READ_RPCS.iter().map(|s| s.to_string()).collect(),
        };

        let sale_address = parse_address("SALE_ADDRESS", DEFAULT_SALE)?;
        let payment_token_address = parse_address("PAYMENT_TOKEN_ADDRESS", DEFAULT_USDC)?;

        let chain_id = match env::var("CHAIN_ID") {
            Ok(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("CHAIN_ID is not a number: {}", raw))?,
            Err(_) => DEFAULT_CHAIN_ID,
        };

        let chain = ChainParams {
            chain_id,
            chain_name: env::var("CHAIN_NAME").unwrap_or_else(|_| "Sepolia".to_string()),
            currency_name: env::var("CURRENCY_NAME").unwrap_or_else(|_| "SepoliaETH".to_string()),
            currency_symbol: env::var("CURRENCY_SYMBOL").unwrap_or_else(|_| "SEP".to_string()),
            currency_decimals: 18,
            rpc_urls: read_rpc_urls.clone(),
            explorer_url: env::var("EXPLORER_URL").unwrap_or_else(|_| DEFAULT_EXPLORER.to_string()),
        };

        let min_purchase = match env::var("MIN_PURCHASE") {
            Ok(raw) => Amount::parse(&raw, PAYMENT_DECIMALS)
                .map_err(|e| anyhow::anyhow!("MIN_PURCHASE: {}", e))?
                .raw(),
            Err(_) => U256::ZERO,
        };

        let refresh_interval_secs = match env::var("REFRESH_INTERVAL_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("REFRESH_INTERVAL_SECS is not a number: {}", raw))?,
            Err(_) => 25,
        };

        Ok(Self {
            read_rpc_urls,
            sale_address,
            payment_token_address,
            chain,
            wallet_rpc_url: env::var("WALLET_RPC_URL").ok().filter(|s| !s.is_empty()),
            walletconnect_project_id: env::var("WALLETCONNECT_PROJECT_ID")
                .ok()
                .filter(|s| !s.is_empty()),
            walletconnect_relay_url: env::var("WALLETCONNECT_RELAY_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            dapp_url: env::var("DAPP_URL").ok().filter(|s| !s.is_empty()),
            mobile: env::var("MOBILE").map(|v| v == "1" || v == "true").unwrap_or(false),
            min_purchase,
            refresh_interval_secs,
        })
    }
}

fn parse_address(var: &str, default: &str) -> Result<Address> {
    let raw = env::var(var).unwrap_or_else(|_| default.to_string());
    Address::from_str(raw.trim())
        .with_context(|| format!("{} is not a valid address: {}", var, raw))
}
