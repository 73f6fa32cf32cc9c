//! Permission checked stock and account workflows for an inventory system.
//!
//! [`service::InventoryService`] is the entry point: it authorizes a command
//! against the caller's [`permission::Session`], applies it through the
//! [`account`] lifecycle or the [`ledger`], and reports a
//! [`service::Response`]. State lives in a sled database ([`store`]).

pub mod account;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod ledger;
pub mod permission;
pub mod report;
pub mod service;
pub mod stock;
pub mod store;
pub mod types;
pub mod utils;

pub use config::{Config, PasswordCost, SellPolicy};
pub use error::WorkflowError;
pub use service::{Command, InventoryService, Payload, Response, Status};
