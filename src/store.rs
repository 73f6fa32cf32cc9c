//! sled backed persistence. One tree per record kind, values encoded as CBOR.
//!
//! Mutations go through sled multi-tree transactions, which are serializable:
//! two writers racing on the same stock row conflict and one of them is rerun
//! against the committed value. An aborted transaction writes nothing.
use crate::account::User;
use crate::error::WorkflowError;
use crate::permission::{Role, RoleCatalog};
use crate::stock::{ListingRecord, OrderRecord, Product, Stock};
use crate::types::{ProductId, UserId};
use crate::utils;
use anyhow::Context;
use sled::Tree;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionResult,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Store {
    instance: Arc<sled::Db>,
    pub(crate) users: Tree,
    pub(crate) usernames: Tree, // username -> user id
    pub(crate) roles: Tree,     // role name -> role
    pub(crate) products: Tree,
    pub(crate) stocks: Tree, // product id -> its stock row
    pub(crate) orders: Tree,
    pub(crate) listings: Tree,
    pub(crate) meta: Tree, // installation markers
}

impl Store {
    pub fn new(instance: Arc<sled::Db>) -> anyhow::Result<Self> {
        let open = |name: &str| {
            instance
                .open_tree(name)
                .with_context(|| format!("failed to open tree '{name}'"))
        };

        Ok(Self {
            users: open("users")?,
            usernames: open("usernames")?,
            roles: open("roles")?,
            products: open("products")?,
            stocks: open("stocks")?,
            orders: open("orders")?,
            listings: open("listings")?,
            meta: open("meta")?,
            instance,
        })
    }

    /// Insert every catalog role that is not already present. Returns how many were added.
    pub fn seed_roles(&self, catalog: &RoleCatalog) -> anyhow::Result<usize> {
        let mut added = 0;
        for role in catalog.roles() {
            let swapped = self.roles.compare_and_swap(
                role.name.as_bytes(),
                None as Option<&[u8]>,
                Some(encode(role)?),
            )?;
            if swapped.is_ok() {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn role(&self, name: &str) -> anyhow::Result<Option<Role>> {
        self.roles.get(name)?.map(|b| decode(&b)).transpose()
    }

    pub fn user(&self, id: &UserId) -> anyhow::Result<Option<User>> {
        self.users.get(id.as_bytes())?.map(|b| decode(&b)).transpose()
    }

    pub fn user_by_name(&self, username: &str) -> anyhow::Result<Option<User>> {
        match self.usernames.get(username)? {
            Some(id) => self.users.get(id)?.map(|b| decode(&b)).transpose(),
            None => Ok(None),
        }
    }

    pub fn users(&self) -> anyhow::Result<Vec<User>> {
        scan_values(self.users.iter())
    }

    pub fn product(&self, id: &ProductId) -> anyhow::Result<Option<Product>> {
        self.products
            .get(id.as_bytes())?
            .map(|b| decode(&b))
            .transpose()
    }

    pub fn products(&self) -> anyhow::Result<Vec<Product>> {
        scan_values(self.products.iter())
    }

    pub fn stock(&self, product_id: &ProductId) -> anyhow::Result<Option<Stock>> {
        self.stocks
            .get(product_id.as_bytes())?
            .map(|b| decode(&b))
            .transpose()
    }

    /// Orders of one product, oldest first.
    pub fn orders_for(&self, product_id: &ProductId) -> anyhow::Result<Vec<OrderRecord>> {
        let mut orders: Vec<OrderRecord> = scan_values(
            self.orders
                .scan_prefix(utils::entry_prefix(product_id.as_str())),
        )?;
        orders.sort_by_key(|o| o.ordered_at);
        Ok(orders)
    }

    /// Listings of one product, oldest first.
    pub fn listings_for(&self, product_id: &ProductId) -> anyhow::Result<Vec<ListingRecord>> {
        let mut listings: Vec<ListingRecord> = scan_values(
            self.listings
                .scan_prefix(utils::entry_prefix(product_id.as_str())),
        )?;
        listings.sort_by_key(|l| l.listed_at);
        Ok(listings)
    }

    pub fn flush(&self) -> anyhow::Result<usize> {
        Ok(self.instance.flush()?)
    }
}

pub(crate) fn encode<T: minicbor::Encode<()>>(value: &T) -> anyhow::Result<Vec<u8>> {
    Ok(minicbor::to_vec(value)?)
}

pub(crate) fn decode<T>(bytes: &[u8]) -> anyhow::Result<T>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    minicbor::decode(bytes).context("failed to decode stored record")
}

fn scan_values<T>(iter: impl Iterator<Item = sled::Result<(sled::IVec, sled::IVec)>>) -> anyhow::Result<Vec<T>>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    iter.map(|entry| {
        let (_, value) = entry?;
        decode(&value)
    })
    .collect()
}

/// Lifts errors raised inside a transaction closure into an abort.
pub(crate) trait OrAbort<T> {
    fn or_abort(self) -> ConflictableTransactionResult<T, WorkflowError>;
}

impl<T> OrAbort<T> for anyhow::Result<T> {
    fn or_abort(self) -> ConflictableTransactionResult<T, WorkflowError> {
        self.map_err(|e| ConflictableTransactionError::Abort(WorkflowError::Infrastructure(e)))
    }
}

impl<T> OrAbort<T> for Result<T, WorkflowError> {
    fn or_abort(self) -> ConflictableTransactionResult<T, WorkflowError> {
        self.map_err(ConflictableTransactionError::Abort)
    }
}

/// Collapse a finished transaction back into the domain error space.
pub(crate) fn settle<T>(result: TransactionResult<T, WorkflowError>) -> Result<T, WorkflowError> {
    result.map_err(|e| match e {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => e.into(),
    })
}
