//! CDP Stablecoin Integration Tests
//!
//! End-to-end scenarios for the collateral manager running against the
//! in-memory store, price source and ledger, and for the deployed contracts
//! running in the Odra test VM.

#[cfg(test)]
mod fixtures {
    use cdp_stablecoin_contracts::collateral_manager::CollateralManager;
    use cdp_stablecoin_contracts::ledger::{MemoryLedger, MemoryStore};
    use cdp_stablecoin_contracts::oracle_adapter::MemoryPriceSource;
    use cdp_stablecoin_contracts::types::{ConfigParams, PriceQuote};
    use odra::casper_types::account::AccountHash;
    use odra::casper_types::U256;
    use odra::prelude::*;

    pub const FEED: &str = "COLL/USD";
    pub const NOW: u64 = 1_700_000_000;

    pub fn addr(byte: u8) -> Address {
        Address::Account(AccountHash::new([byte; 32]))
    }

    pub fn admin() -> Address {
        addr(1)
    }

    pub fn alice() -> Address {
        addr(2)
    }

    pub fn liquidator() -> Address {
        addr(3)
    }

    pub fn vault() -> Address {
        addr(100)
    }

    /// Quote in 8-decimal fixed point published at `NOW`
    pub fn quote(price: i64) -> PriceQuote {
        PriceQuote {
            price,
            confidence: 0,
            exponent: -8,
            publish_time: NOW,
        }
    }

    pub struct World {
        pub store: MemoryStore,
        pub prices: MemoryPriceSource,
        pub ledger: MemoryLedger,
    }

    impl World {
        /// Threshold 80%, bonus 10%, minimum health 150%, price 1.0
        pub fn new() -> Self {
            let mut prices = MemoryPriceSource::new();
            prices.set_quote(FEED, quote(100_000_000));

            let mut ledger = MemoryLedger::new(vault());
            ledger.fund_collateral(alice(), U256::from(1_000u64));
            ledger.fund_debt(liquidator(), U256::from(1_000u64));

            let mut world = Self {
                store: MemoryStore::new(),
                prices,
                ledger,
            };
            world
                .manager()
                .initialize_config(admin(), ConfigParams::new(8000, 1000, 15000, FEED))
                .unwrap();
            world
        }

        pub fn manager(
            &mut self,
        ) -> CollateralManager<'_, MemoryStore, MemoryPriceSource, MemoryLedger> {
            CollateralManager::new(&mut self.store, &self.prices, &mut self.ledger)
        }

        pub fn set_price(&mut self, price: i64) {
            self.prices.set_quote(FEED, quote(price));
        }
    }
}

#[cfg(test)]
mod scenario_tests {
    use super::fixtures::*;
    use cdp_stablecoin_contracts::errors::CdpError;
    use odra::casper_types::U256;
    use pretty_assertions::assert_eq;

    fn open_alice(world: &mut World) {
        world
            .manager()
            .deposit_collateral_and_mint_tokens(alice(), U256::from(100u64), U256::from(50u64), NOW)
            .unwrap();
    }

    #[test]
    fn scenario_a_mint_within_limits() {
        let mut world = World::new();
        let receipt = world
            .manager()
            .deposit_collateral_and_mint_tokens(alice(), U256::from(100u64), U256::from(50u64), NOW)
            .unwrap();

        assert_eq!(receipt.health_factor_bps, U256::from(20000u32));
        assert_eq!(world.ledger.debt_balance(&alice()), U256::from(50u64));
        assert_eq!(world.ledger.collateral_balance(&vault()), U256::from(100u64));
    }

    #[test]
    fn scenario_b_half_price_is_not_liquidatable() {
        let mut world = World::new();
        open_alice(&mut world);
        world.set_price(50_000_000);

        let m = world.manager();
        assert_eq!(m.health_factor(&alice(), NOW).unwrap(), U256::from(10000u32));
        assert!(!m.is_liquidatable(&alice(), NOW).unwrap());
    }

    #[test]
    fn scenario_c_liquidation_after_price_drop() {
        let mut world = World::new();
        open_alice(&mut world);
        world.set_price(30_000_000);

        assert_eq!(
            world.manager().health_factor(&alice(), NOW).unwrap(),
            U256::from(6000u32)
        );

        let receipt = world
            .manager()
            .liquidate(liquidator(), alice(), U256::from(10u64), NOW)
            .unwrap();

        // 10 / 0.3 * 1.1 = 36.67, rounded down
        assert_eq!(receipt.collateral_seized, U256::from(36u64));
        assert_eq!(receipt.position.collateral_amount, U256::from(64u64));
        assert_eq!(receipt.position.debt_amount, U256::from(40u64));
        assert_eq!(world.ledger.collateral_balance(&liquidator()), U256::from(36u64));
        assert_eq!(world.ledger.debt_balance(&liquidator()), U256::from(990u64));
        assert_eq!(world.ledger.collateral_balance(&vault()), U256::from(64u64));
    }

    #[test]
    fn scenario_d_over_withdrawal_leaves_state_unchanged() {
        let mut world = World::new();
        open_alice(&mut world);
        let store = world.store.clone();
        let ledger = world.ledger.clone();

        let result = world.manager().redeem_collateral_and_burn_tokens(
            alice(),
            U256::from(150u64),
            U256::from(10u64),
            NOW,
        );

        assert_eq!(result, Err(CdpError::InsufficientCollateral));
        assert_eq!(world.store, store);
        assert_eq!(world.ledger, ledger);
    }

    #[test]
    fn scenario_e_stale_price_blocks_every_operation() {
        let mut world = World::new();
        open_alice(&mut world);
        world.set_price(30_000_000);
        let store = world.store.clone();
        let ledger = world.ledger.clone();
        let later = NOW + 101;

        let mut m = world.manager();
        assert_eq!(
            m.deposit_collateral_and_mint_tokens(alice(), U256::from(10u64), U256::from(1u64), later),
            Err(CdpError::StalePrice)
        );
        assert_eq!(
            m.redeem_collateral_and_burn_tokens(alice(), U256::from(1u64), U256::from(1u64), later),
            Err(CdpError::StalePrice)
        );
        assert_eq!(
            m.liquidate(liquidator(), alice(), U256::from(10u64), later),
            Err(CdpError::StalePrice)
        );

        assert_eq!(world.store, store);
        assert_eq!(world.ledger, ledger);
    }
}

#[cfg(test)]
mod property_tests {
    use super::fixtures::*;
    use cdp_stablecoin_contracts::health;
    use cdp_stablecoin_contracts::oracle_adapter::validate_quote;
    use cdp_stablecoin_contracts::types::CollateralPosition;
    use odra::casper_types::U256;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deposit_then_redeem_restores_collateral() {
        let mut world = World::new();
        world
            .manager()
            .deposit_collateral_and_mint_tokens(alice(), U256::from(100u64), U256::from(50u64), NOW)
            .unwrap();

        world
            .manager()
            .deposit_collateral_and_mint_tokens(alice(), U256::from(10u64), U256::from(1u64), NOW)
            .unwrap();
        let receipt = world
            .manager()
            .redeem_collateral_and_burn_tokens(alice(), U256::from(10u64), U256::zero(), NOW)
            .unwrap();

        assert_eq!(receipt.position.collateral_amount, U256::from(100u64));
        assert_eq!(receipt.position.debt_amount, U256::from(51u64));
    }

    #[test]
    fn test_liquidation_never_increases_balances() {
        let mut world = World::new();
        world
            .manager()
            .deposit_collateral_and_mint_tokens(alice(), U256::from(100u64), U256::from(60u64), NOW)
            .unwrap();
        world.set_price(45_000_000);

        let mut before = world.manager().position(&alice()).unwrap();
        for burn in [5u64, 5, 10] {
            let receipt = world
                .manager()
                .liquidate(liquidator(), alice(), U256::from(burn), NOW)
                .unwrap();
            assert!(receipt.position.debt_amount < before.debt_amount);
            assert!(receipt.position.collateral_amount <= before.collateral_amount);
            before = receipt.position;
        }
    }

    #[test]
    fn test_debt_free_position_never_liquidatable() {
        let position = CollateralPosition {
            owner: alice(),
            collateral_amount: U256::from(100u64),
            debt_amount: U256::zero(),
        };
        let mut world = World::new();
        let config = world.manager().config().unwrap();

        for raw in [1i64, 1_000, 30_000_000, 100_000_000, i64::MAX / 1_000_000_000] {
            let price = validate_quote(&quote(raw), NOW).unwrap();
            assert!(!health::is_liquidatable(&position, &price, &config).unwrap());
        }
    }

    #[test]
    fn test_partial_liquidation_reports_remaining_health() {
        let mut world = World::new();
        world
            .manager()
            .deposit_collateral_and_mint_tokens(alice(), U256::from(100u64), U256::from(50u64), NOW)
            .unwrap();
        world.set_price(30_000_000);

        let receipt = world
            .manager()
            .liquidate(liquidator(), alice(), U256::from(20u64), NOW)
            .unwrap();

        // 27 collateral left is worth 8 against 30 debt
        assert_eq!(receipt.collateral_seized, U256::from(73u64));
        assert_eq!(receipt.health_factor_bps, U256::from(2666u32));
    }
}

#[cfg(test)]
mod mint_cap_tests {
    use super::fixtures::*;
    use cdp_stablecoin_contracts::errors::CdpError;
    use cdp_stablecoin_contracts::types::ConfigUpdate;
    use odra::casper_types::U256;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mint_above_cap_rejected_even_when_healthy() {
        let mut world = World::new();
        world.ledger.fund_collateral(alice(), U256::from(1_000_000u64));
        let update = ConfigUpdate {
            max_mint_amount: Some(Some(U256::from(1_000u64))),
            ..Default::default()
        };
        world.manager().update_config(admin(), update).unwrap();
        let store = world.store.clone();
        let ledger = world.ledger.clone();

        // health would be 1_000_000 / 1_001 = 99900 bps, far above the minimum
        assert_eq!(
            world.manager().deposit_collateral_and_mint_tokens(
                alice(),
                U256::from(1_000_000u64),
                U256::from(1_001u64),
                NOW
            ),
            Err(CdpError::ExcessiveMintAmount)
        );
        assert_eq!(world.store, store);
        assert_eq!(world.ledger, ledger);

        // the cap is per call, not per position
        for _ in 0..2 {
            world
                .manager()
                .deposit_collateral_and_mint_tokens(
                    alice(),
                    U256::from(10_000u64),
                    U256::from(1_000u64),
                    NOW,
                )
                .unwrap();
        }
        assert_eq!(
            world.manager().position(&alice()).unwrap().debt_amount,
            U256::from(2_000u64)
        );
        assert_eq!(world.store.positions().len(), 1);
    }
}

#[cfg(test)]
mod backup_feed_tests {
    use super::fixtures::*;
    use cdp_stablecoin_contracts::errors::CdpError;
    use cdp_stablecoin_contracts::types::ConfigUpdate;
    use odra::casper_types::U256;
    use pretty_assertions::assert_eq;

    const BACKUP: &str = "COLL/USD-B";

    fn with_backup(world: &mut World) {
        let update = ConfigUpdate {
            backup_price_feed_id: Some(Some(String::from(BACKUP))),
            ..Default::default()
        };
        world.manager().update_config(admin(), update).unwrap();
    }

    #[test]
    fn test_disagreeing_backup_blocks_minting() {
        let mut world = World::new();
        with_backup(&mut world);
        world.prices.set_quote(BACKUP, quote(110_000_000));

        assert_eq!(
            world.manager().deposit_collateral_and_mint_tokens(
                alice(),
                U256::from(100u64),
                U256::from(10u64),
                NOW
            ),
            Err(CdpError::OraclePriceDeviation)
        );
    }

    #[test]
    fn test_agreeing_backup_uses_average() {
        let mut world = World::new();
        with_backup(&mut world);
        world.prices.set_quote(BACKUP, quote(102_000_000));

        let receipt = world
            .manager()
            .deposit_collateral_and_mint_tokens(alice(), U256::from(100u64), U256::from(50u64), NOW)
            .unwrap();
        // value 101 for 50 debt
        assert_eq!(receipt.health_factor_bps, U256::from(20200u32));
        assert!(receipt.price.backup_confirmed);
    }

    #[test]
    fn test_missing_backup_quote_falls_back() {
        let mut world = World::new();
        with_backup(&mut world);

        let receipt = world
            .manager()
            .deposit_collateral_and_mint_tokens(alice(), U256::from(100u64), U256::from(50u64), NOW)
            .unwrap();
        assert!(!receipt.price.backup_confirmed);
    }

    #[test]
    fn test_removing_backup_feed() {
        let mut world = World::new();
        with_backup(&mut world);

        let update = ConfigUpdate {
            backup_price_feed_id: Some(None),
            ..Default::default()
        };
        let config = world.manager().update_config(admin(), update).unwrap();
        assert_eq!(config.backup_price_feed_id, None);
    }
}

#[cfg(test)]
mod call_def_tests {
    use odra::casper_types::{runtime_args, RuntimeArgs};
    use odra::CallDef;

    /// Verify the price feed lookup is a read-only call
    #[test]
    fn test_get_quote_call_args() {
        let args = runtime_args! {
            "feed_id" => String::from("COLL/USD")
        };
        let call_def = CallDef::new("get_quote", false, args);
        assert_eq!(call_def.entry_point(), "get_quote");
        assert!(!call_def.is_mut());
    }
}

#[cfg(test)]
mod contract_tests {
    use cdp_stablecoin_contracts::cdp_vault::{CdpVault, CdpVaultHostRef, CdpVaultInitArgs};
    use cdp_stablecoin_contracts::debt_token::{DebtToken, DebtTokenHostRef, DebtTokenInitArgs};
    use cdp_stablecoin_contracts::errors::CdpError;
    use cdp_stablecoin_contracts::price_feed::{PriceFeed, PriceFeedHostRef, PriceFeedInitArgs};
    use cdp_stablecoin_contracts::types::{ConfigParams, PriceQuote};
    use odra::casper_types::U256;
    use odra::host::{Deployer, HostEnv, HostRef, NoArgs};
    use odra::prelude::*;
    use pretty_assertions::assert_eq;

    const FEED: &str = "COLL/USD";

    /// CEP-18 stand-in whose transfers report failure instead of reverting
    #[odra::module]
    pub struct RejectingToken {
        requested: Var<U256>,
    }

    #[odra::module]
    impl RejectingToken {
        pub fn transfer(&mut self, recipient: Address, amount: U256) -> bool {
            let _ = recipient;
            self.record(amount);
            false
        }

        pub fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) -> bool {
            let _ = (owner, recipient);
            self.record(amount);
            false
        }

        pub fn balance_of(&self, account: Address) -> U256 {
            let _ = account;
            self.requested.get_or_default()
        }

        fn record(&mut self, amount: U256) {
            let requested = self.requested.get_or_default();
            self.requested.set(requested.saturating_add(amount));
        }
    }

    struct Deployment {
        env: HostEnv,
        admin: Address,
        alice: Address,
        liquidator: Address,
        collateral: DebtTokenHostRef,
        debt: DebtTokenHostRef,
        feed: PriceFeedHostRef,
        vault: CdpVaultHostRef,
    }

    fn token(env: &HostEnv, name: &str, symbol: &str) -> DebtTokenHostRef {
        DebtToken::deploy(
            env,
            DebtTokenInitArgs {
                name: String::from(name),
                symbol: String::from(symbol),
                decimals: None,
            },
        )
    }

    /// Quote in 8-decimal fixed point published at the current block time
    fn quote(env: &HostEnv, price: i64) -> PriceQuote {
        PriceQuote {
            price,
            confidence: 0,
            exponent: -8,
            publish_time: env.block_time() / 1_000,
        }
    }

    /// Tokens, feed and vault wired together. Alice holds 1000 collateral
    /// and has approved the vault for all of it; the price is 1.0.
    fn deploy() -> Deployment {
        let env = odra_test::env();
        let admin = env.get_account(0);
        let alice = env.get_account(1);
        let liquidator = env.get_account(2);
        env.set_caller(admin);

        let mut collateral = token(&env, "Test Collateral", "tCOLL");
        let mut debt = token(&env, "CDP USD", "cUSD");
        let mut feed = PriceFeed::deploy(&env, PriceFeedInitArgs { feeder: None });
        feed.push_quote(String::from(FEED), quote(&env, 100_000_000));

        let vault = CdpVault::deploy(
            &env,
            CdpVaultInitArgs {
                price_feed: feed.address(),
                collateral_token: collateral.address(),
                debt_token: debt.address(),
                params: ConfigParams::new(8000, 1000, 15000, FEED),
            },
        );
        debt.add_minter(vault.address());

        collateral.add_minter(admin);
        collateral.mint(alice, U256::from(1_000u64));
        env.set_caller(alice);
        collateral.approve(vault.address(), U256::from(1_000u64));
        env.set_caller(admin);

        Deployment {
            env,
            admin,
            alice,
            liquidator,
            collateral,
            debt,
            feed,
            vault,
        }
    }

    #[test]
    fn test_deposit_redeem_and_liquidate_through_vault() {
        let mut d = deploy();
        let vault_address = d.vault.address();

        d.env.set_caller(d.alice);
        let position = d
            .vault
            .deposit_collateral_and_mint_tokens(U256::from(100u64), U256::from(50u64));
        assert_eq!(position.debt_amount, U256::from(50u64));
        assert_eq!(d.debt.balance_of(d.alice), U256::from(50u64));
        assert_eq!(d.collateral.balance_of(vault_address), U256::from(100u64));
        assert_eq!(d.vault.health_factor(d.alice), U256::from(20000u32));

        d.env.set_caller(d.admin);
        d.feed.push_quote(String::from(FEED), quote(&d.env, 30_000_000));
        assert!(d.vault.is_liquidatable(d.alice));
        d.debt.add_minter(d.admin);
        d.debt.mint(d.liquidator, U256::from(10u64));

        d.env.set_caller(d.liquidator);
        let seized = d.vault.liquidate(d.alice, U256::from(10u64));
        assert_eq!(seized, U256::from(36u64));
        assert_eq!(d.collateral.balance_of(d.liquidator), U256::from(36u64));
        assert_eq!(d.debt.balance_of(d.liquidator), U256::zero());

        d.env.set_caller(d.alice);
        let position = d
            .vault
            .redeem_collateral_and_burn_tokens(U256::from(64u64), U256::from(40u64));
        assert!(position.is_empty());
        assert_eq!(d.collateral.balance_of(d.alice), U256::from(964u64));
        assert_eq!(d.collateral.balance_of(vault_address), U256::zero());
        assert_eq!(d.debt.balance_of(d.alice), U256::from(10u64));
    }

    #[test]
    fn test_quote_age_uses_block_time_in_seconds() {
        let mut d = deploy();
        d.env.set_caller(d.alice);

        // 100 s is still fresh
        d.env.advance_block_time(100_000);
        assert!(d
            .vault
            .try_deposit_collateral_and_mint_tokens(U256::from(100u64), U256::from(10u64))
            .is_ok());

        // 101 s is not
        d.env.advance_block_time(1_000);
        assert_eq!(
            d.vault
                .try_deposit_collateral_and_mint_tokens(U256::from(100u64), U256::from(10u64)),
            Err(CdpError::StalePrice.into())
        );
        assert_eq!(
            d.vault.get_position(d.alice).unwrap().collateral_amount,
            U256::from(100u64)
        );
    }

    #[test]
    fn test_failed_collateral_transfer_reverts_deposit() {
        let d = deploy();
        let rejecting = RejectingToken::deploy(&d.env, NoArgs);
        let mut vault = CdpVault::deploy(
            &d.env,
            CdpVaultInitArgs {
                price_feed: d.feed.address(),
                collateral_token: rejecting.address(),
                debt_token: d.debt.address(),
                params: ConfigParams::new(8000, 1000, 15000, FEED),
            },
        );

        d.env.set_caller(d.alice);
        assert_eq!(
            vault.try_deposit_collateral_and_mint_tokens(U256::from(100u64), U256::from(10u64)),
            Err(CdpError::TokenTransferFailed.into())
        );
        assert_eq!(vault.get_position(d.alice), None);
        assert_eq!(d.debt.balance_of(d.alice), U256::zero());
    }

    #[test]
    fn test_only_minters_mint_and_burn() {
        let mut d = deploy();
        d.env.set_caller(d.alice);
        assert_eq!(
            d.debt.try_mint(d.alice, U256::from(1u64)),
            Err(CdpError::Unauthorized.into())
        );
        assert_eq!(
            d.debt.try_burn_from(d.admin, U256::from(1u64)),
            Err(CdpError::Unauthorized.into())
        );
        assert_eq!(
            d.debt.try_add_minter(d.alice),
            Err(CdpError::Unauthorized.into())
        );
        assert!(d.debt.is_minter(d.vault.address()));
        assert!(!d.debt.is_minter(d.alice));
    }

    #[test]
    fn test_feeder_gate_and_quote_ordering() {
        let mut d = deploy();
        let current = quote(&d.env, 100_000_000);

        d.env.set_caller(d.alice);
        assert_eq!(
            d.feed.try_push_quote(String::from(FEED), current),
            Err(CdpError::Unauthorized.into())
        );

        d.env.set_caller(d.admin);
        d.env.advance_block_time(10_000);
        let newer = quote(&d.env, 101_000_000);
        d.feed.push_quote(String::from(FEED), newer);
        assert_eq!(
            d.feed.try_push_quote(String::from(FEED), current),
            Err(CdpError::StalePrice.into())
        );
        assert_eq!(d.feed.get_quote(String::from(FEED)), Some(newer));

        d.feed.set_feeder(d.alice);
        d.env.set_caller(d.alice);
        d.env.advance_block_time(1_000);
        assert!(d
            .feed
            .try_push_quote(String::from(FEED), quote(&d.env, 99_000_000))
            .is_ok());
    }
}
