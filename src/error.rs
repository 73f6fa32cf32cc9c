use crate::account::AccountStatus;
use crate::types::{Operation, ProductId, Resource, UserId};

#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("Username already exists: {0}")]
    DuplicateUsername(String),
    #[error("Role does not exist: {0}")]
    UnknownRole(String),
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Your account is disabled or has not been activated yet")]
    AccountNotActive,
    #[error("Permission denied: {operation} on {resource}")]
    PermissionDenied {
        resource: Resource,
        operation: Operation,
    },
    #[error("No stock found for product id: {0}")]
    StockNotFound(ProductId),
    #[error(
        "Max stock has been reached for product id: {product_id}. Current quantity: {current}, Requested: {requested}, Max stock: {max_stock}"
    )]
    MaxStockExceeded {
        product_id: ProductId,
        current: u32,
        requested: u32,
        max_stock: u32,
    },
    #[error(
        "Insufficient stock quantity for product id: {product_id}. Available quantity: {available}, Requested: {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },
    #[error("Quantity must be greater than zero")]
    InvalidQuantity,
    #[error("Total price overflows for {quantity} units at {unit_price}")]
    AmountOverflow { quantity: u32, unit_price: u64 },
    #[error("User not found: {0}")]
    UserNotFound(UserId),
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),
    #[error("No products found for the given IDs")]
    NoProductsFound,
    #[error("Invalid product: {0}")]
    InvalidProduct(String),
    #[error("Account cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: AccountStatus,
        to: AccountStatus,
    },
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

impl WorkflowError {
    /// Everything but [`WorkflowError::Infrastructure`] is a business rule
    /// rejection whose message is safe to show to the caller.
    pub fn is_domain(&self) -> bool {
        !matches!(self, WorkflowError::Infrastructure(_))
    }
}

impl From<sled::Error> for WorkflowError {
    fn from(value: sled::Error) -> Self {
        WorkflowError::Infrastructure(value.into())
    }
}
