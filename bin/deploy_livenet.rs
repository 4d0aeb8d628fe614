//! Deploy the CDP contracts to Casper livenet/testnet using Odra livenet environment.
//!
//! Usage:
//!   cargo run --bin deploy_livenet --release
//!
//! Requires .env file with:
//!   ODRA_CASPER_LIVENET_SECRET_KEY_PATH=/path/to/secret_key.pem
//!   ODRA_CASPER_LIVENET_NODE_ADDRESS=https://node.testnet.casper.network
//!   ODRA_CASPER_LIVENET_CHAIN_NAME=casper-test
//!   ODRA_CASPER_LIVENET_PAYMENT_AMOUNT=200000000000
//!
//! Optional protocol parameters:
//!   CDP_COLLATERAL_TOKEN=hash-...        (a test collateral token is deployed when unset)
//!   CDP_PRICE_FEED_ID=COLL/USD
//!   CDP_BACKUP_PRICE_FEED_ID=COLL/USD-B
//!   CDP_LIQUIDATION_THRESHOLD_BPS=8000
//!   CDP_LIQUIDATION_BONUS_BPS=1000
//!   CDP_MIN_HEALTH_FACTOR_BPS=15000
//!   CDP_MINT_FEE_BPS=10
//!   CDP_BURN_FEE_BPS=5
//!   CDP_LIQUIDATION_FEE_BPS=50
//!   CDP_MAX_MINT_AMOUNT=1000000000       (per-call mint cap, uncapped when unset)
//!   CDP_COLLATERAL_SEED=1000000000000    (test collateral minted to the deployer)

use odra::casper_types::U256;
use odra::host::Deployer;
use odra::prelude::*;

use cdp_stablecoin_contracts::cdp_vault::{CdpVault, CdpVaultInitArgs};
use cdp_stablecoin_contracts::debt_token::{DebtToken, DebtTokenInitArgs};
use cdp_stablecoin_contracts::price_feed::{PriceFeed, PriceFeedInitArgs};
use cdp_stablecoin_contracts::types::ConfigParams;

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u256(name: &str) -> Option<U256> {
    std::env::var(name)
        .ok()
        .and_then(|v| U256::from_dec_str(&v).ok())
}

fn main() {
    // Load environment from .env file
    dotenv::dotenv().ok();

    println!("=== CDP Stablecoin Livenet Deployment ===");
    println!();

    // Initialize Odra livenet environment
    let env = odra_casper_livenet_env::env();

    // Configure payment amount for deployments/calls (required for Casper 2.0 txs)
    let payment_amount: u64 = std::env::var("ODRA_CASPER_LIVENET_PAYMENT_AMOUNT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(200_000_000_000);
    env.set_gas(payment_amount);

    let deployer = env.caller();
    println!("Deployer: {:?}", deployer);
    println!();

    // Protocol parameters
    let params = ConfigParams {
        liquidation_threshold_bps: env_u32("CDP_LIQUIDATION_THRESHOLD_BPS", 8000),
        liquidation_bonus_bps: env_u32("CDP_LIQUIDATION_BONUS_BPS", 1000),
        min_health_factor_bps: env_u32("CDP_MIN_HEALTH_FACTOR_BPS", 15000),
        price_feed_id: env_string("CDP_PRICE_FEED_ID", "COLL/USD"),
        backup_price_feed_id: std::env::var("CDP_BACKUP_PRICE_FEED_ID").ok(),
        mint_fee_bps: env_u32("CDP_MINT_FEE_BPS", 10),
        burn_fee_bps: env_u32("CDP_BURN_FEE_BPS", 5),
        liquidation_fee_bps: env_u32("CDP_LIQUIDATION_FEE_BPS", 50),
        fee_recipient: None,
        max_mint_amount: env_u256("CDP_MAX_MINT_AMOUNT"),
    };
    println!("Price feed id: {}", params.price_feed_id);
    println!(
        "Thresholds: liquidation {} bps, bonus {} bps, min health {} bps",
        params.liquidation_threshold_bps, params.liquidation_bonus_bps, params.min_health_factor_bps
    );
    match params.max_mint_amount {
        Some(cap) => println!("Mint cap per call: {}", cap),
        None => println!("Mint cap per call: none"),
    }
    println!();

    // ==================== Phase 1: Tokens and Feed ====================
    println!("=== Phase 1: Deploying Tokens and Price Feed ===");
    println!();

    println!("Deploying DebtToken...");
    let mut debt_token = DebtToken::deploy(
        &env,
        DebtTokenInitArgs {
            name: env_string("CDP_DEBT_TOKEN_NAME", "CDP USD"),
            symbol: env_string("CDP_DEBT_TOKEN_SYMBOL", "cUSD"),
            decimals: None,
        },
    );
    let debt_token_addr = debt_token.address().clone();
    println!("DebtToken deployed at: {:?}", debt_token_addr);

    println!("Deploying PriceFeed...");
    let price_feed = PriceFeed::deploy(&env, PriceFeedInitArgs { feeder: None });
    let price_feed_addr = price_feed.address().clone();
    println!("PriceFeed deployed at: {:?}", price_feed_addr);

    let collateral_addr = match std::env::var("CDP_COLLATERAL_TOKEN") {
        Ok(value) => value
            .parse::<Address>()
            .unwrap_or_else(|_| panic!("CDP_COLLATERAL_TOKEN is not a valid address: {}", value)),
        Err(_) => {
            println!("Deploying test collateral token...");
            let mut collateral = DebtToken::deploy(
                &env,
                DebtTokenInitArgs {
                    name: String::from("Test Collateral"),
                    symbol: String::from("tCOLL"),
                    decimals: None,
                },
            );

            let seed = env_u256("CDP_COLLATERAL_SEED")
                .unwrap_or_else(|| U256::from(1_000_000_000_000u64));
            collateral.add_minter(deployer);
            collateral.mint(deployer, seed);
            println!("Minted {} test collateral to the deployer", seed);

            collateral.address().clone()
        }
    };
    println!("Collateral token: {:?}", collateral_addr);

    println!();

    // ==================== Phase 2: Vault ====================
    println!("=== Phase 2: Deploying CdpVault ===");
    println!();

    let vault = CdpVault::deploy(
        &env,
        CdpVaultInitArgs {
            price_feed: price_feed_addr,
            collateral_token: collateral_addr,
            debt_token: debt_token_addr,
            params,
        },
    );
    let vault_addr = vault.address().clone();
    println!("CdpVault deployed at: {:?}", vault_addr);

    println!();

    // ==================== Phase 3: Wiring ====================
    println!("=== Phase 3: Cross-contract Configuration ===");
    println!();

    println!("Authorizing CdpVault as DebtToken minter...");
    debt_token.add_minter(vault_addr);
    println!("Done.");

    println!();
    println!("=== Deployment Complete ===");
    println!();
    println!("Contract Addresses:");
    println!("  DebtToken:   {:?}", debt_token_addr);
    println!("  PriceFeed:   {:?}", price_feed_addr);
    println!("  Collateral:  {:?}", collateral_addr);
    println!("  CdpVault:    {:?}", vault_addr);
}
