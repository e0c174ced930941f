use std::sync::Arc;

use dotenv::dotenv;

use paygate::account_ledger::MemoryAccountLedger;
use paygate::api::{create_app, AppState};
use paygate::configure::load_config;
use paygate::engine::OrderLifecycleEngine;
use paygate::gateway::HttpPaymentGateway;
use paygate::logger::setup_logger;
use paygate::order_store::MemoryOrderStore;
use paygate::signature::SignatureCodec;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = load_config()?;
    setup_logger(&config)?;

    let orders = Arc::new(MemoryOrderStore::new());
    let ledger = Arc::new(MemoryAccountLedger::new());
    let gateway = Arc::new(HttpPaymentGateway::new(&config)?);

    let engine = Arc::new(OrderLifecycleEngine::new(
        orders.clone(),
        ledger.clone(),
        gateway,
    ));

    let state = Arc::new(AppState {
        engine,
        orders,
        ledger,
        codec: SignatureCodec::new(config.merchant_secret.clone()),
        merchant_id: config.merchant_id.clone(),
    });

    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;

    println!("--------------------------------------------------");
    println!("Payment Gateway Server Started");
    println!("  Listening on:      {}", config.listen_addr);
    println!("  Gateway base URL:  {}", config.gateway_base_url);
    println!("  Merchant ID:       {}", config.merchant_id);
    println!("--------------------------------------------------");
    println!("Endpoints:");
    println!("  POST /gateway/callback");
    println!("  GET  /health");
    println!("  GET  /api/user/balance");
    println!("  GET  /api/user/transactions");
    println!("  GET  /api/orders/pending");
    println!("--------------------------------------------------");

    axum::serve(listener, app).await?;

    Ok(())
}
