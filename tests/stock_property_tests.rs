//! Property-based tests for stock arithmetic and the ledger that applies it
//!
//! The arithmetic on [`Stock`] decides every buy and sell, so its bounds are
//! checked over arbitrary operation sequences first. A smaller run then drives
//! the same kind of sequence through a real database and compares the stored
//! row and the appended entries with a model.

use std::sync::Arc;

use inventory_ledger::permission::RoleCatalog;
use inventory_ledger::stock::{ProductDraft, Stock};
use inventory_ledger::types::{ProductId, StockId};
use inventory_ledger::{Config, InventoryService, PasswordCost, SellPolicy, WorkflowError};
use proptest::prelude::*;
use tempfile::tempdir;

#[derive(Debug, Clone, Copy)]
enum Trade {
    Buy(u32),
    Sell(u32),
}

// PROPERTY TEST STRATEGIES

fn policy_strategy() -> impl Strategy<Value = SellPolicy> {
    prop::bool::ANY.prop_map(|b| {
        if b {
            SellPolicy::RetainLastUnit
        } else {
            SellPolicy::AllowDepletion
        }
    })
}

/// Quantities skew small so that sequences actually reach both limits.
fn trade_strategy() -> impl Strategy<Value = Trade> {
    prop_oneof![
        (0u32..=40).prop_map(Trade::Buy),
        (0u32..=40).prop_map(Trade::Sell),
    ]
}

/// A stock row with `quantity <= max_stock`.
fn stock_strategy() -> impl Strategy<Value = Stock> {
    (1u32..=200).prop_flat_map(|max_stock| {
        (0..=max_stock).prop_map(move |quantity| Stock {
            id: StockId::from("stock_1test"),
            product_id: ProductId::from("prod_1test"),
            quantity,
            min_stock: 0,
            max_stock,
            reorder_point: max_stock / 4,
        })
    })
}

fn apply(stock: &mut Stock, trade: Trade, policy: SellPolicy) -> Result<(), WorkflowError> {
    stock.quantity = match trade {
        Trade::Buy(q) => stock.restocked(q)?,
        Trade::Sell(q) => stock.depleted(q, policy)?,
    };
    Ok(())
}

// PROPERTY TESTS
proptest! {
    /// Property: no sequence of accepted trades moves a row outside `0..=max_stock`,
    /// and a rejected trade leaves the quantity as it was.
    #[test]
    fn prop_quantity_stays_within_limits(
        mut stock in stock_strategy(),
        trades in prop::collection::vec(trade_strategy(), 0..60),
        policy in policy_strategy(),
    ) {
        for trade in trades {
            let before = stock.quantity;
            if apply(&mut stock, trade, policy).is_err() {
                prop_assert_eq!(stock.quantity, before);
            }
            prop_assert!(stock.quantity <= stock.max_stock);
        }
    }

    /// Property: a buy is accepted exactly when it is positive and fits under max stock
    #[test]
    fn prop_restock_boundary(stock in stock_strategy(), requested in 0u32..=250) {
        let fits = requested > 0 && stock.quantity + requested <= stock.max_stock;
        match stock.restocked(requested) {
            Ok(next) => {
                prop_assert!(fits);
                prop_assert_eq!(next, stock.quantity + requested);
            }
            Err(WorkflowError::InvalidQuantity) => prop_assert_eq!(requested, 0),
            Err(WorkflowError::MaxStockExceeded { current, max_stock, .. }) => {
                prop_assert!(!fits);
                prop_assert_eq!(current, stock.quantity);
                prop_assert_eq!(max_stock, stock.max_stock);
            }
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }

    /// Property: the retain policy never empties a row; depletion allows exactly zero
    #[test]
    fn prop_sell_boundary(stock in stock_strategy(), requested in 1u32..=250) {
        let strict = stock.depleted(requested, SellPolicy::RetainLastUnit);
        prop_assert_eq!(strict.is_ok(), requested < stock.quantity);
        if let Ok(left) = strict {
            prop_assert!(left >= 1);
        }

        let loose = stock.depleted(requested, SellPolicy::AllowDepletion);
        prop_assert_eq!(loose.is_ok(), requested <= stock.quantity);
        if requested == stock.quantity {
            prop_assert_eq!(loose.ok(), Some(0));
        }
    }

    /// Property: amounts too large for u32 are refused rather than wrapped
    #[test]
    fn prop_restock_never_wraps(quantity in (u32::MAX - 100)..=u32::MAX, requested in 1u32..=200) {
        let stock = Stock {
            id: StockId::from("stock_1test"),
            product_id: ProductId::from("prod_1test"),
            quantity,
            min_stock: 0,
            max_stock: u32::MAX,
            reorder_point: 0,
        };
        match stock.restocked(requested) {
            Ok(next) => prop_assert!(next > quantity),
            Err(e) => prop_assert!(
                matches!(e, WorkflowError::MaxStockExceeded { .. }),
                "unexpected error {e}"
            ),
        }
    }
}

proptest! {
    // each case opens a database and hashes a password
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: the stored row tracks a model of accepted trades, and every
    /// accepted trade appends exactly one order or listing.
    #[test]
    fn prop_ledger_matches_model(
        initial in 0u32..=50,
        trades in prop::collection::vec(trade_strategy(), 1..20),
        policy in policy_strategy(),
    ) {
        let temp_dir = tempdir().unwrap();
        let db = Arc::new(sled::open(temp_dir.path().join("inventory.db")).unwrap());
        let config = Config::default()
            .with_sell_policy(policy)
            .with_password_cost(PasswordCost::new(8, 1, 1));
        let service = InventoryService::new(db, &config).unwrap();
        service.seed_reference_data(&RoleCatalog::default()).unwrap();
        service.bootstrap_administrator("admin", "pw").unwrap();
        let admin = service.login("admin", "pw").unwrap();

        let draft = ProductDraft::new()
            .set_name("Bolt")
            .set_category("Fasteners")
            .set_cost(3)
            .set_initial_quantity(initial)
            .set_stock_limits(0, 100, 10);
        let product_id = service.create_product(&admin, &draft).unwrap().product_id;

        let mut model = Stock {
            id: StockId::from("stock_1model"),
            product_id: product_id.clone(),
            quantity: initial,
            min_stock: 0,
            max_stock: 100,
            reorder_point: 10,
        };
        let (mut orders, mut listings) = (0, 0);

        for trade in trades {
            let expected = apply(&mut model, trade, policy);
            let actual = match trade {
                Trade::Buy(q) => service.buy_product(&admin, &product_id, q).map(|_| orders += 1),
                Trade::Sell(q) => service.sell_product(&admin, &product_id, q, 7).map(|_| listings += 1),
            };
            prop_assert_eq!(actual.is_ok(), expected.is_ok());
        }

        let stored = service.store().stock(&product_id).unwrap().unwrap();
        prop_assert_eq!(stored.quantity, model.quantity);
        prop_assert_eq!(service.store().orders_for(&product_id).unwrap().len(), orders);
        prop_assert_eq!(service.store().listings_for(&product_id).unwrap().len(), listings);
    }
}
