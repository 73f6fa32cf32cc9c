//! Buy and sell against a product's single stock row
use crate::config::SellPolicy;
use crate::error::WorkflowError;
use crate::stock::{ListingRecord, OrderRecord, Product, ProductDraft, Stock};
use crate::store::{OrAbort, Store, decode, encode, settle};
use crate::types::{ProductId, UserId};
use crate::utils;
use sled::Transactional;
use sled::transaction::{TransactionResult, TransactionalTree, abort};

#[derive(Clone)]
pub struct StockLedger {
    store: Store,
    sell_policy: SellPolicy,
}

impl StockLedger {
    pub fn new(store: Store, sell_policy: SellPolicy) -> Self {
        Self { store, sell_policy }
    }

    /// Add a product to the catalog together with its stock row.
    pub fn register_product(&self, draft: &ProductDraft) -> Result<(Product, Stock), WorkflowError> {
        let (product, stock) = draft.validate_and_finalise()?;
        let product_bytes = encode(&product)?;
        let stock_bytes = encode(&stock)?;

        let result: TransactionResult<(), WorkflowError> = (&self.store.products, &self.store.stocks)
            .transaction(|(products, stocks)| {
                products.insert(product.id.as_bytes(), product_bytes.clone())?;
                stocks.insert(product.id.as_bytes(), stock_bytes.clone())?;
                Ok(())
            });
        settle(result)?;

        tracing::info!(product_id = %product.id, quantity = stock.quantity, "registered product {}", product.name);
        Ok((product, stock))
    }

    /// Restock: raise the on-hand quantity and append an order priced at the current cost.
    pub fn buy(
        &self,
        product_id: &ProductId,
        by_user: &UserId,
        quantity: u32,
    ) -> Result<OrderRecord, WorkflowError> {
        if quantity == 0 {
            return Err(WorkflowError::InvalidQuantity);
        }

        let result: TransactionResult<(OrderRecord, Stock), WorkflowError> = (
            &self.store.users,
            &self.store.products,
            &self.store.stocks,
            &self.store.orders,
        )
            .transaction(|(users, products, stocks, orders)| {
                let (product, mut stock) = load_target(users, products, stocks, product_id, by_user)?;

                stock.quantity = stock.restocked(quantity).or_abort()?;
                let order = OrderRecord::new(product.id.clone(), by_user.clone(), quantity, product.cost)
                    .or_abort()?;
                let (hash, cbor) = order.build().or_abort()?;

                orders.insert(utils::entry_key(product.id.as_str(), &hash), cbor)?;
                stocks.insert(product.id.as_bytes(), encode(&stock).or_abort()?)?;
                Ok((order, stock))
            });

        let (order, stock) = settle(result)?;
        tracing::info!(
            product_id = %product_id,
            user_id = %by_user,
            quantity,
            on_hand = stock.quantity,
            "product purchased"
        );
        Ok(order)
    }

    /// Sale: lower the on-hand quantity and append an active listing.
    pub fn sell(
        &self,
        product_id: &ProductId,
        by_user: &UserId,
        quantity: u32,
        unit_price: u64,
    ) -> Result<ListingRecord, WorkflowError> {
        if quantity == 0 {
            return Err(WorkflowError::InvalidQuantity);
        }

        let result: TransactionResult<(ListingRecord, Stock), WorkflowError> = (
            &self.store.users,
            &self.store.products,
            &self.store.stocks,
            &self.store.listings,
        )
            .transaction(|(users, products, stocks, listings)| {
                let (product, mut stock) = load_target(users, products, stocks, product_id, by_user)?;

                stock.quantity = stock.depleted(quantity, self.sell_policy).or_abort()?;
                let listing = ListingRecord::new(product.id.clone(), by_user.clone(), quantity, unit_price)
                    .or_abort()?;
                let (hash, cbor) = listing.build().or_abort()?;

                listings.insert(utils::entry_key(product.id.as_str(), &hash), cbor)?;
                stocks.insert(product.id.as_bytes(), encode(&stock).or_abort()?)?;
                Ok((listing, stock))
            });

        let (listing, stock) = settle(result)?;
        tracing::info!(
            product_id = %product_id,
            user_id = %by_user,
            quantity,
            total_price = listing.total_price,
            on_hand = stock.quantity,
            "product sold"
        );
        if stock.below_minimum() {
            tracing::warn!(
                product_id = %product_id,
                on_hand = stock.quantity,
                min_stock = stock.min_stock,
                "stock below minimum"
            );
        } else if stock.at_reorder_point() {
            tracing::warn!(
                product_id = %product_id,
                on_hand = stock.quantity,
                reorder_point = stock.reorder_point,
                "stock at or below reorder point"
            );
        }
        Ok(listing)
    }
}

// the acting user, the product and its stock row must all exist
fn load_target(
    users: &TransactionalTree,
    products: &TransactionalTree,
    stocks: &TransactionalTree,
    product_id: &ProductId,
    by_user: &UserId,
) -> sled::transaction::ConflictableTransactionResult<(Product, Stock), WorkflowError> {
    if users.get(by_user.as_bytes())?.is_none() {
        return abort(WorkflowError::UserNotFound(by_user.clone()));
    }
    let Some(product) = products.get(product_id.as_bytes())? else {
        return abort(WorkflowError::ProductNotFound(product_id.clone()));
    };
    let Some(stock) = stocks.get(product_id.as_bytes())? else {
        return abort(WorkflowError::StockNotFound(product_id.clone()));
    };

    Ok((decode(&product).or_abort()?, decode(&stock).or_abort()?))
}
