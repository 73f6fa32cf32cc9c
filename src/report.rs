//! Read-only projections over the catalog. Nothing here writes to the store.
use crate::error::WorkflowError;
use crate::stock::{Attribute, Component, Product};
use crate::store::Store;
use crate::types::ProductId;

/// Row of the catalog browser.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProductEntry {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub listing_count: usize,
    pub in_stock: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StockSummaryLine {
    pub product_id: ProductId,
    pub name: String,
    pub total_quantity: u64,
    pub total_sale_value: u128, // sum of listing totals
    pub total_cost_value: u128, // on hand × current cost
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ProductDetailLine {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub colour: Option<String>,
    pub cost: u64,
    pub description: Option<String>,
    pub attributes: Vec<Attribute>,
    pub components: Vec<Component>,
    pub listing_count: usize,
    pub order_count: usize,
    pub in_stock: Option<u32>,
}

pub struct Reports<'a> {
    store: &'a Store,
}

impl<'a> Reports<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Every product with its listing count and on-hand quantity, ordered by name.
    pub fn catalog(&self) -> Result<Vec<ProductEntry>, WorkflowError> {
        let mut entries = Vec::new();
        for product in self.store.products()? {
            let listing_count = self.store.listings_for(&product.id)?.len();
            let in_stock = self.store.stock(&product.id)?.map(|s| s.quantity);
            entries.push(ProductEntry {
                product_id: product.id,
                name: product.name,
                category: product.category,
                listing_count,
                in_stock,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.product_id.cmp(&b.product_id)));
        Ok(entries)
    }

    /// Stock summary for the requested products, in request order. Unknown ids are skipped.
    pub fn stock_summary(&self, ids: &[ProductId]) -> Result<Vec<StockSummaryLine>, WorkflowError> {
        let mut lines = Vec::with_capacity(ids.len());
        for product in self.resolve(ids)? {
            let total_quantity = self
                .store
                .stock(&product.id)?
                .map_or(0, |s| u64::from(s.quantity));
            let total_sale_value: u128 = self
                .store
                .listings_for(&product.id)?
                .iter()
                .map(|l| u128::from(l.total_price))
                .sum();

            lines.push(StockSummaryLine {
                total_cost_value: u128::from(total_quantity) * u128::from(product.cost),
                product_id: product.id,
                name: product.name,
                total_quantity,
                total_sale_value,
            });
        }
        Ok(lines)
    }

    /// Full detail view. Fails with `NoProductsFound` if none of the ids exist.
    pub fn product_details(&self, ids: &[ProductId]) -> Result<Vec<ProductDetailLine>, WorkflowError> {
        let products = self.resolve(ids)?;
        if products.is_empty() {
            return Err(WorkflowError::NoProductsFound);
        }

        let mut lines = Vec::with_capacity(products.len());
        for product in products {
            let (attributes, components) = match product.attributes() {
                Ok(Some(parsed)) => (parsed.attributes, parsed.components),
                Ok(None) => (Vec::new(), Vec::new()),
                Err(e) => {
                    tracing::warn!(product_id = %product.id, "unreadable attribute document: {e}");
                    (Vec::new(), Vec::new())
                }
            };

            lines.push(ProductDetailLine {
                listing_count: self.store.listings_for(&product.id)?.len(),
                order_count: self.store.orders_for(&product.id)?.len(),
                in_stock: self.store.stock(&product.id)?.map(|s| s.quantity),
                product_id: product.id,
                name: product.name,
                category: product.category,
                colour: product.colour,
                cost: product.cost,
                description: product.description,
                attributes,
                components,
            });
        }
        Ok(lines)
    }

    fn resolve(&self, ids: &[ProductId]) -> Result<Vec<Product>, WorkflowError> {
        let mut seen = std::collections::HashSet::new();
        let mut products = Vec::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(id) {
                continue;
            }
            match self.store.product(id)? {
                Some(product) => products.push(product),
                None => tracing::debug!(product_id = %id, "skipping unknown product"),
            }
        }
        Ok(products)
    }
}
