//! On-chain price feed.
//!
//! Stores the latest raw quote per feed id. Quotes are pushed by a single
//! authorized feeder (an off-chain relayer for the oracle network) and read
//! by the vault through `FeedClient`.

use odra::prelude::*;
use odra::casper_types::{RuntimeArgs, runtime_args};
use odra::{CallDef, ContractEnv};
use crate::errors::CdpError;
use crate::events::QuotePushed;
use crate::oracle_adapter::PriceSource;
use crate::types::PriceQuote;

/// Price feed contract
#[odra::module(events = [QuotePushed])]
pub struct PriceFeed {
    /// May replace the feeder
    admin: Var<Address>,
    /// Only account allowed to push quotes
    feeder: Var<Address>,
    /// Latest quote per feed id
    quotes: Mapping<String, PriceQuote>,
}

#[odra::module]
impl PriceFeed {
    /// Initialize with the deployer as admin. The feeder defaults to the deployer.
    pub fn init(&mut self, feeder: Option<Address>) {
        let caller = self.env().caller();
        self.admin.set(caller);
        self.feeder.set(feeder.unwrap_or(caller));
    }

    /// Publish a quote for `feed_id` (feeder only)
    pub fn push_quote(&mut self, feed_id: String, quote: PriceQuote) {
        self.require_feeder();

        if feed_id.is_empty() {
            self.env().revert(CdpError::InvalidParameters);
        }
        if !accepts_update(self.quotes.get(&feed_id).as_ref(), &quote) {
            self.env().revert(CdpError::StalePrice);
        }

        self.quotes.set(&feed_id, quote);
        self.env().emit_event(QuotePushed {
            feed_id,
            price: quote.price,
            confidence: quote.confidence,
            exponent: quote.exponent,
            publish_time: quote.publish_time,
        });
    }

    /// Latest quote for `feed_id`, if any was pushed
    pub fn get_quote(&self, feed_id: String) -> Option<PriceQuote> {
        self.quotes.get(&feed_id)
    }

    // ========== Admin Functions ==========

    pub fn set_feeder(&mut self, feeder: Address) {
        self.require_admin();
        self.feeder.set(feeder);
    }

    pub fn get_feeder(&self) -> Option<Address> {
        self.feeder.get()
    }

    pub fn get_admin(&self) -> Option<Address> {
        self.admin.get()
    }

    // ========== Internal Functions ==========

    fn require_feeder(&self) {
        let caller = self.env().caller();
        if self.feeder.get() != Some(caller) {
            self.env().revert(CdpError::Unauthorized);
        }
    }

    fn require_admin(&self) {
        let caller = self.env().caller();
        if self.admin.get() != Some(caller) {
            self.env().revert(CdpError::Unauthorized);
        }
    }
}

/// A pushed quote may not be older than the one it replaces
pub fn accepts_update(existing: Option<&PriceQuote>, incoming: &PriceQuote) -> bool {
    match existing {
        Some(current) => incoming.publish_time >= current.publish_time,
        None => true,
    }
}

/// Reads quotes from a deployed `PriceFeed` through cross-contract calls
pub struct FeedClient<'a> {
    env: &'a ContractEnv,
    address: Address,
}

impl<'a> FeedClient<'a> {
    pub fn new(env: &'a ContractEnv, address: Address) -> Self {
        Self { env, address }
    }
}

impl PriceSource for FeedClient<'_> {
    fn latest_quote(&self, feed_id: &str) -> Option<PriceQuote> {
        let args = runtime_args! {
            "feed_id" => String::from(feed_id)
        };
        let call_def = CallDef::new("get_quote", false, args);
        self.env.call_contract(self.address, call_def)
    }
}
