//! Launchpad sale client - Main executable
//!
//! Headless client for a timed token sale: connects a wallet through the
//! configured path, watches the sale's phase and price, quotes purchases,
//! and executes the two-step approve + buy flow.
use anyhow::Result;
use dotenv::dotenv;
use launchpad_client::{
    format_payment, format_price, format_quote, format_sale_token, shorten_address, Config,
    ConnectOutcome, ContractGateway, DeepLinkBridge, HttpWalletBridge, PurchaseEvent,
    PurchaseFlow, QuoteResult, ReadProviderPool, SaleClock, SaleGateway, SaleSnapshot,
    SessionEffect, StatusService, WalletBridge, WalletConnectBridge, WalletSession,
};
use log::{error, info, warn};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Application entry point
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logging with default level of "info"
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    info!("Starting launchpad sale client v{}", launchpad_client::VERSION);

    let config = Config::from_env()?;
    info!(
        "Sale contract {} on chain {} ({} read endpoints)",
        shorten_address(&config.sale_address.to_string()),
        config.chain.chain_id,
        config.read_rpc_urls.len()
    );

    let pool = Arc::new(ReadProviderPool::new(&config.read_rpc_urls)?);
    let gateway: Arc<dyn SaleGateway> = Arc::new(ContractGateway::new(
        pool,
        config.sale_address,
        config.payment_token_address,
    ));
    let status = StatusService::new(gateway.clone());
    let flow = PurchaseFlow::new(gateway.clone(), config.min_purchase);

    // Connection paths in preference order: injected-style wallet endpoint,
    // mobile deep link, WalletConnect
    let mut bridges: Vec<Arc<dyn WalletBridge>> = Vec::new();
    if let Some(url) = &config.wallet_rpc_url {
        bridges.push(Arc::new(HttpWalletBridge::new(url)));
    }
    if config.mobile {
        if let Some(dapp) = &config.dapp_url {
            bridges.push(Arc::new(DeepLinkBridge::new(dapp)));
        }
    }
    if let (Some(project_id), Some(relay)) = (
        &config.walletconnect_project_id,
        &config.walletconnect_relay_url,
    ) {
        bridges.push(Arc::new(WalletConnectBridge::new(
            project_id,
            relay,
            config.chain.chain_id,
        )));
    }
    let session = Arc::new(WalletSession::new(bridges, config.chain.clone()));

    if config.wallet_rpc_url.is_some()
        || config.walletconnect_project_id.is_some()
        || config.mobile
    {
        match session.connect().await {
            Ok(ConnectOutcome::Connected(address)) => {
                info!("Wallet connected: {}", shorten_address(&address.to_string()))
            }
            Ok(ConnectOutcome::HandedOff(url)) => {
                info!("Continue in your wallet app: {}", url)
            }
            Err(e) => warn!("Wallet connection failed: {}", e),
        }
    } else {
        info!("No wallet configured, running read-only");
    }

    // One-shot purchase amount, e.g. BUY_AMOUNT=50 buys once the sale is live
    let buy_input = env::var("BUY_AMOUNT").unwrap_or_default();
    let mut pending_buy = !buy_input.is_empty();

    let mut clock = SaleClock::new();
    let mut countdown = clock.subscribe();
    let mut wallet_events = session.take_events();

    let mut snapshot = SaleSnapshot::default();
    let mut refresh_timer = tokio::time::interval(Duration::from_secs(
        config.refresh_interval_secs.max(1),
    ));

    info!("Client is running! Press Ctrl+C to stop.");
    loop {
        tokio::select! {
            _ = refresh_timer.tick() => {
                snapshot = status.refresh(&snapshot, session.address(), &buy_input).await;
                snapshot = status
                    .refresh_contract_balances(&snapshot, config.sale_address)
                    .await;

                if let Some(window) = snapshot.window {
                    if clock.window() != Some(window) {
                        clock.arm(window);
                    }
                }
                print_status(&snapshot);

                if pending_buy && snapshot.phase == launchpad_client::SalePhase::Live {
                    if let Some(signer) = session.signer() {
                        pending_buy = false;
                        execute_buy(&flow, signer, &snapshot, &buy_input, &config).await;
                        snapshot = status
                            .refresh(&snapshot, session.address(), &buy_input)
                            .await;
                    }
                }
            }

            changed = countdown.changed() => {
                if changed.is_ok() {
                    if let Some(cd) = *countdown.borrow() {
                        log::debug!(
                            "{}: {}d {:02}:{:02}:{:02} ({}%)",
                            cd.phase, cd.days, cd.hours, cd.minutes, cd.seconds,
                            cd.progress_pct
                        );
                    }
                }
            }

            event = recv_wallet_event(&mut wallet_events) => {
                if let Some(event) = event {
                    match session.handle_event(event) {
                        SessionEffect::Reload => {
                            // chain changed: every cached value is suspect
                            warn!("Reloading all chain state");
                            snapshot = SaleSnapshot::default();
                            clock.stop();
                        }
                        SessionEffect::Refresh => {
                            snapshot = status
                                .refresh(&snapshot, session.address(), &buy_input)
                                .await;
                            print_status(&snapshot);
                        }
                        SessionEffect::None => {}
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                session.disconnect().await;
                break;
            }
        }
    }

    Ok(())
}

async fn recv_wallet_event(
    events: &mut Option<mpsc::UnboundedReceiver<launchpad_client::WalletEvent>>,
) -> Option<launchpad_client::WalletEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn print_status(snapshot: &SaleSnapshot) {
    let price = snapshot
        .price
        .map(format_price)
        .unwrap_or_else(|| "-".to_string());
    let quote = match snapshot.quote {
        QuoteResult::Quote { output, .. } => format!("≈ {}", format_quote(output.raw())),
        QuoteResult::Unavailable => "-".to_string(),
    };
    let pay_symbol = snapshot
        .payment_meta
        .as_ref()
        .map(|m| m.symbol.as_str())
        .unwrap_or("USDC");
    let sale_symbol = snapshot
        .sale_meta
        .as_ref()
        .map(|m| m.symbol.as_str())
        .unwrap_or("tokens");
    let updated = snapshot
        .last_updated
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    info!(
        "phase={} price={} quote={} raised={} {} inventory={} {} updated={}",
        snapshot.phase,
        price,
        quote,
        snapshot
            .sale_payment_balance
            .map(format_payment)
            .unwrap_or_else(|| "-".to_string()),
        pay_symbol,
        snapshot
            .sale_token_balance
            .map(format_sale_token)
            .unwrap_or_else(|| "-".to_string()),
        sale_symbol,
        updated,
    );
    if let (Some(usdc), Some(tokens), Some(allowance)) = (
        snapshot.my_payment_balance,
        snapshot.my_token_balance,
        snapshot.my_allowance,
    ) {
        info!(
            "my_usdc={} my_tokens={} allowance={}",
            format_payment(usdc),
            format_sale_token(tokens),
            format_payment(allowance),
        );
    }
}

async fn execute_buy(
    flow: &PurchaseFlow,
    signer: Arc<dyn WalletBridge>,
    snapshot: &SaleSnapshot,
    input: &str,
    config: &Config,
) {
    let amount = match launchpad_client::Amount::parse(
        input,
        launchpad_client::PAYMENT_DECIMALS,
    ) {
        Ok(amount) => amount,
        Err(e) => {
            error!("Invalid BUY_AMOUNT: {}", e);
            return;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let explorer = config.chain.explorer_url.clone();
    let progress = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                PurchaseEvent::ApprovalSubmitted(record)
                | PurchaseEvent::PurchaseSubmitted(record) => {
                    info!("{} tx: {}", record.kind, record.explorer_link(&explorer))
                }
                PurchaseEvent::ApprovalConfirmed(record)
                | PurchaseEvent::PurchaseConfirmed(record) => {
                    info!("{} confirmed: {:#x}", record.kind, record.hash)
                }
            }
        }
    });

    match flow.purchase(Some(signer), snapshot, amount, &tx).await {
        Ok(receipt) => info!(
            "Purchase complete: {}",
            receipt.purchase.explorer_link(&config.chain.explorer_url)
        ),
        Err(e) => error!("Purchase failed: {}", e),
    }

    drop(tx);
    let _ = progress.await;
}
