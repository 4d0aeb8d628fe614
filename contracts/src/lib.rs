//! CDP Stablecoin Contracts
//!
//! Collateralized-debt stablecoin engine for Casper.
//!
//! ## Architecture
//!
//! - **OracleAdapter**: validates and normalizes raw oracle quotes
//! - **Health**: pure collateral valuation and liquidation math
//! - **Ledger**: position store, value ledger and the unit of work tying them
//! - **CollateralManager**: config, deposit/mint, burn/redeem and liquidation
//! - **CdpVault**: on-chain host for the collateral manager
//! - **PriceFeed**: on-chain quote store written by an authorized feeder
//! - **DebtToken**: CEP-18 stablecoin minted and burned by the vault
//!
//! ## Atomicity
//!
//! Every operation computes and validates the full post-update state before
//! any token moves. Ledger effects settle all-or-nothing, and storage is
//! written only after settlement succeeds.

#![cfg_attr(target_arch = "wasm32", no_std)]

extern crate alloc;

// Re-export odra for downstream usage
pub use odra;

// Core engine
pub mod types;
pub mod errors;
pub mod health;
pub mod oracle_adapter;
pub mod ledger;
pub mod collateral_manager;

// Contract modules
pub mod events;
pub mod price_feed;
pub mod debt_token;
pub mod cdp_vault;
