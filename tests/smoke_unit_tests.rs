//! Smoke screen unit tests for the inventory components
//!
//! These tests cut across the codebase and exercise each component on its
//! own, mostly along the happy path. Workflow level behaviour lives in
//! `scenarios.rs`.
//!
#![allow(unused_imports)]

use std::sync::Arc;

use inventory_ledger::{
    Command, Config, InventoryService, PasswordCost, Payload, Response, SellPolicy, Status,
    dispatch::BackgroundService,
    permission::{ADMINISTRATOR, EMPLOYEE, Role, RoleCatalog, Session},
    stock::{ProductAttributes, ProductDraft},
    types::{EntryId, Operation, ProductId, Resource, StockId, TimeStamp, UserId},
    utils::new_uuid_to_bech32,
};
use tempfile::{TempDir, tempdir};

fn cheap_config() -> Config {
    Config::default().with_password_cost(PasswordCost::new(8, 1, 1))
}

fn open_service() -> (TempDir, Arc<InventoryService>) {
    let temp_dir = tempdir().unwrap();
    let db = Arc::new(sled::open(temp_dir.path().join("inventory.db")).unwrap());
    let service = InventoryService::new(db, &cheap_config()).unwrap();
    service
        .seed_reference_data(&RoleCatalog::default())
        .unwrap();
    (temp_dir, Arc::new(service))
}

// UTILS MODULE TESTS
#[cfg(test)]
mod utils_tests {
    use super::*;

    /// new_uuid_to_bech32 produces bech32 strings under the given prefix
    #[test]
    fn generates_valid_bech32_with_hrp() {
        let encoded = new_uuid_to_bech32("prod_").unwrap();
        assert!(encoded.starts_with("prod_1"));
        assert!(encoded.len() > 10);
    }

    #[test]
    fn handles_empty_hrp() {
        assert!(new_uuid_to_bech32("").is_err());
    }

    #[test]
    fn generates_unique_ids() {
        let id1 = new_uuid_to_bech32("entry_").unwrap();
        let id2 = new_uuid_to_bech32("entry_").unwrap();
        assert_ne!(id1, id2);
    }
}

// TYPES MODULE TESTS
#[cfg(test)]
mod types_tests {
    use super::*;

    #[test]
    fn every_id_kind_has_its_own_prefix() {
        assert!(UserId::generate().unwrap().as_str().starts_with("user_1"));
        assert!(ProductId::generate().unwrap().as_str().starts_with("prod_1"));
        assert!(StockId::generate().unwrap().as_str().starts_with("stock_1"));
        assert!(EntryId::generate().unwrap().as_str().starts_with("entry_1"));
    }

    #[test]
    fn timestamps_order_chronologically() {
        let earlier = TimeStamp::new_with(2024, 1, 1, 0, 0, 0).unwrap();
        let later = TimeStamp::new_with(2024, 1, 2, 0, 0, 0).unwrap();
        assert!(earlier < later);
        assert!(TimeStamp::new_with(2024, 2, 30, 0, 0, 0).is_none());
    }

    #[test]
    fn permission_axes_print_uppercase() {
        assert_eq!(Resource::Product.to_string(), "PRODUCT");
        assert_eq!(Operation::Sell.to_string(), "SELL");
        assert_eq!("user".parse::<Resource>().unwrap(), Resource::User);
    }
}

// PERMISSION MODULE TESTS
#[cfg(test)]
mod permission_tests {
    use super::*;

    #[test]
    fn default_catalog_has_both_roles() {
        let catalog = RoleCatalog::default();
        assert!(catalog.get(ADMINISTRATOR).is_some());
        assert!(catalog.get(EMPLOYEE).is_some());
        assert!(catalog.get("Auditor").is_none());
    }

    #[test]
    fn employee_session_trades_but_does_not_administer() {
        let catalog = RoleCatalog::default();
        let session = Session::from_roles(
            UserId::from("user_1e"),
            "eve",
            catalog.get(EMPLOYEE),
        );

        assert!(session.has_permission(Resource::Product, Operation::Buy));
        assert!(session.has_permission(Resource::Product, Operation::Sell));
        assert!(!session.has_permission(Resource::Product, Operation::Delete));
        assert!(!session.has_permission(Resource::User, Operation::View));
    }

    #[test]
    fn session_without_roles_has_no_permissions() {
        let session = Session::from_roles(UserId::from("user_1n"), "nobody", Vec::<&Role>::new());
        for resource in Resource::ALL {
            for operation in Operation::ALL {
                assert!(!session.has_permission(resource, operation));
            }
        }
    }
}

// STOCK MODULE TESTS
#[cfg(test)]
mod stock_tests {
    use super::*;

    #[test]
    fn draft_finalises_into_product_and_stock() {
        let attributes = ProductAttributes::from_json(
            r#"{"attributes":[{"name":"weight","value":2.5,"unit":"kg","data_type":"number"}],"components":[]}"#,
        )
        .unwrap();
        let (product, stock) = ProductDraft::new()
            .set_name("Drill")
            .set_category("Tools")
            .set_cost(4_500)
            .set_attributes(attributes)
            .set_initial_quantity(3)
            .set_stock_limits(1, 20, 2)
            .validate_and_finalise()
            .unwrap();

        assert_eq!(stock.product_id, product.id);
        assert_eq!(stock.quantity, 3);
        let parsed = product.attributes().unwrap().unwrap();
        assert_eq!(parsed.attributes[0].name, "weight");
    }

    #[test]
    fn draft_without_name_is_rejected() {
        let result = ProductDraft::new()
            .set_category("Tools")
            .set_stock_limits(0, 10, 0)
            .validate_and_finalise();
        assert!(result.is_err());
    }
}

// CONFIG MODULE TESTS
#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn defaults_keep_the_last_unit() {
        let config = Config::default();
        assert_eq!(config.sell_policy, SellPolicy::RetainLastUnit);
        assert_eq!(
            "allow-depletion".parse::<SellPolicy>().unwrap(),
            SellPolicy::AllowDepletion
        );
    }
}

// SERVICE MODULE TESTS
#[cfg(test)]
mod service_tests {
    use super::*;

    #[test]
    fn bootstrap_only_works_once() {
        let (_dir, service) = open_service();

        let admin = service.bootstrap_administrator("root", "pw").unwrap();
        assert_eq!(admin.role.as_deref(), Some(ADMINISTRATOR));
        assert!(service.bootstrap_administrator("root2", "pw").is_err());
    }

    #[test]
    fn empty_store_lists_nothing() {
        let (_dir, service) = open_service();
        service.bootstrap_administrator("root", "pw").unwrap();
        let admin = service.login("root", "pw").unwrap();

        assert!(service.fetch_products(&admin).unwrap().is_empty());
        assert!(service.fetch_pending_users(&admin).unwrap().is_empty());
        assert_eq!(service.fetch_users(&admin).unwrap().len(), 1);
    }

    #[test]
    fn response_serialises_with_tagged_payload() {
        let (_dir, service) = open_service();
        service.bootstrap_administrator("root", "pw").unwrap();

        let response = service.execute(
            None,
            Command::Login {
                username: "root".into(),
                password: "pw".into(),
            },
        );
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "success");
        assert_eq!(json["payload"]["kind"], "session");
        assert_eq!(json["payload"]["data"]["username"], "root");
        assert_eq!(json["payload"]["data"]["permissions"]["PRODUCT"][0], "VIEW");
    }
}

// DISPATCH MODULE TESTS
#[cfg(test)]
mod dispatch_tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test(flavor = "multi_thread")]
    async fn executes_off_the_calling_task() {
        let (_dir, service) = open_service();
        service.bootstrap_administrator("root", "pw").unwrap();
        let background = BackgroundService::current(service).unwrap();

        let response = background
            .execute(
                None,
                Command::Login {
                    username: "root".into(),
                    password: "wrong".into(),
                },
            )
            .await;
        assert_eq!(response.status, Status::Failed);
        assert_eq!(response.message, "Invalid username or password");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn continuation_receives_the_response() {
        let (_dir, service) = open_service();
        service.bootstrap_administrator("root", "pw").unwrap();
        let background = BackgroundService::current(service).unwrap();
        let (tx, rx) = oneshot::channel();

        background.dispatch_with(
            None,
            Command::Login {
                username: "root".into(),
                password: "pw".into(),
            },
            move |response| {
                let _ = tx.send(response);
            },
        );

        let response = rx.await.unwrap();
        assert!(response.is_success());
        assert!(matches!(response.payload, Payload::Session(_)));
    }
}
