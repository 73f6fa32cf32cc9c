//! Service layer API for inventory workflows
//!
//! Each request runs `Received → Authorizing → Mutating → Committed | Failed`.
//! Authorization happens against the caller's session snapshot before any
//! storage access, and every error is turned into a [`Response`] exactly once,
//! in [`InventoryService::execute`].
use crate::account::{AccountLifecycle, Transition, UserEntry};
use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::WorkflowError;
use crate::ledger::StockLedger;
use crate::permission::{ADMINISTRATOR, RoleCatalog, Session};
use crate::report::{ProductDetailLine, ProductEntry, Reports, StockSummaryLine};
use crate::stock::{ListingRecord, OrderRecord, ProductDraft};
use crate::store::Store;
use crate::types::{Operation, ProductId, Resource, UserId};
use std::fmt;
use std::sync::Arc;

pub const UNEXPECTED_ERROR: &str = "Unexpected error has occurred";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Authorizing,
    Mutating,
    Committed,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Input of one workflow.
#[derive(Clone)]
pub enum Command {
    Login {
        username: String,
        password: String,
    },
    Register {
        username: String,
        password: String,
        role: String,
    },
    BuyProduct {
        product_id: ProductId,
        quantity: u32,
    },
    SellProduct {
        product_id: ProductId,
        quantity: u32,
        unit_price: u64,
    },
    ApproveUser {
        user_id: UserId,
    },
    DisableUser {
        user_id: UserId,
    },
    FetchUsers,
    FetchPendingUsers,
    FetchProducts,
    CreateProduct(ProductDraft),
    StockSummary {
        product_ids: Vec<ProductId>,
    },
    ProductDetails {
        product_ids: Vec<ProductId>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Login { .. } => "login",
            Command::Register { .. } => "register",
            Command::BuyProduct { .. } => "buy_product",
            Command::SellProduct { .. } => "sell_product",
            Command::ApproveUser { .. } => "approve_user",
            Command::DisableUser { .. } => "disable_user",
            Command::FetchUsers => "fetch_users",
            Command::FetchPendingUsers => "fetch_pending_users",
            Command::FetchProducts => "fetch_products",
            Command::CreateProduct(_) => "create_product",
            Command::StockSummary { .. } => "stock_summary",
            Command::ProductDetails { .. } => "product_details",
        }
    }

    /// The grant a session must hold to run this command. `None` for the
    /// unauthenticated entry points.
    pub fn required_permission(&self) -> Option<(Resource, Operation)> {
        match self {
            Command::Login { .. } | Command::Register { .. } => None,
            Command::BuyProduct { .. } => Some((Resource::Product, Operation::Buy)),
            Command::SellProduct { .. } => Some((Resource::Product, Operation::Sell)),
            Command::ApproveUser { .. } | Command::DisableUser { .. } => {
                Some((Resource::User, Operation::Update))
            }
            Command::FetchUsers | Command::FetchPendingUsers => {
                Some((Resource::User, Operation::View))
            }
            Command::FetchProducts
            | Command::StockSummary { .. }
            | Command::ProductDetails { .. } => Some((Resource::Product, Operation::View)),
            Command::CreateProduct(_) => Some((Resource::Product, Operation::Create)),
        }
    }
}

// passwords must never reach a log line
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command").field("name", &self.name()).finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    None,
    Session(Session),
    User(UserEntry),
    Users(Vec<UserEntry>),
    Products(Vec<ProductEntry>),
    Product(ProductEntry),
    Order(OrderRecord),
    Listing(ListingRecord),
    StockSummary(Vec<StockSummaryLine>),
    ProductDetails(Vec<ProductDetailLine>),
}

/// What the presentation layer gets back from every workflow.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Response {
    pub status: Status,
    pub message: String,
    pub payload: Payload,
}

impl Response {
    pub fn success(message: impl Into<String>, payload: Payload) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
            payload,
        }
    }
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            message: message.into(),
            payload: Payload::None,
        }
    }
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

pub struct InventoryService {
    store: Store,
    accounts: AccountLifecycle,
    ledger: StockLedger,
}

impl InventoryService {
    pub fn new(instance: Arc<sled::Db>, config: &Config) -> anyhow::Result<Self> {
        let store = Store::new(instance)?;
        let credentials = Credentials::new(config.password_cost)?;

        Ok(Self {
            accounts: AccountLifecycle::new(store.clone(), credentials),
            ledger: StockLedger::new(store.clone(), config.sell_policy),
            store,
        })
    }

    /// Open the configured database and make sure the default roles exist.
    pub fn open(config: &Config) -> anyhow::Result<Self> {
        let service = Self::new(Arc::new(config.open_db()?), config)?;
        let added = service.seed_reference_data(&RoleCatalog::default())?;
        if added > 0 {
            tracing::info!("seeded {added} default roles");
        }
        Ok(service)
    }

    pub fn seed_reference_data(&self, catalog: &RoleCatalog) -> anyhow::Result<usize> {
        self.store.seed_roles(catalog)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Create the first approved administrator of an empty installation.
    ///
    /// Refused once any approved administrator exists; from then on accounts
    /// go through `register` and an administrator's approval.
    pub fn bootstrap_administrator(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserEntry, WorkflowError> {
        // administrators approved through the queue; racing bootstraps are
        // settled inside the lifecycle transaction
        let has_admin = self.store.users()?.iter().any(|u| {
            u.status.is_active() && u.roles.iter().any(|role| role == ADMINISTRATOR)
        });
        if has_admin {
            return Err(WorkflowError::PermissionDenied {
                resource: Resource::User,
                operation: Operation::Create,
            });
        }

        let user = self.accounts.bootstrap_administrator(username, password)?;
        Ok(UserEntry::from(&user))
    }

    fn authorize(
        &self,
        session: &Session,
        resource: Resource,
        operation: Operation,
    ) -> Result<(), WorkflowError> {
        tracing::debug!(stage = %Stage::Authorizing, user = %session.username, %resource, %operation);
        if !session.has_permission(resource, operation) {
            return Err(WorkflowError::PermissionDenied {
                resource,
                operation,
            });
        }
        tracing::debug!(stage = %Stage::Mutating);
        Ok(())
    }

    pub fn login(&self, username: &str, password: &str) -> Result<Session, WorkflowError> {
        self.accounts.login(username, password)
    }

    pub fn register(
        &self,
        username: &str,
        password: &str,
        role: &str,
    ) -> Result<UserEntry, WorkflowError> {
        let user = self.accounts.register(username, password, role)?;
        Ok(UserEntry::from(&user))
    }

    pub fn buy_product(
        &self,
        session: &Session,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<OrderRecord, WorkflowError> {
        self.authorize(session, Resource::Product, Operation::Buy)?;
        self.ledger.buy(product_id, &session.user_id, quantity)
    }

    pub fn sell_product(
        &self,
        session: &Session,
        product_id: &ProductId,
        quantity: u32,
        unit_price: u64,
    ) -> Result<ListingRecord, WorkflowError> {
        self.authorize(session, Resource::Product, Operation::Sell)?;
        self.ledger
            .sell(product_id, &session.user_id, quantity, unit_price)
    }

    pub fn approve_user(
        &self,
        session: &Session,
        user_id: &UserId,
    ) -> Result<Transition, WorkflowError> {
        self.authorize(session, Resource::User, Operation::Update)?;
        self.accounts.approve(user_id)
    }

    pub fn disable_user(
        &self,
        session: &Session,
        user_id: &UserId,
    ) -> Result<Transition, WorkflowError> {
        self.authorize(session, Resource::User, Operation::Update)?;
        self.accounts.disable(user_id)
    }

    pub fn fetch_users(&self, session: &Session) -> Result<Vec<UserEntry>, WorkflowError> {
        self.authorize(session, Resource::User, Operation::View)?;
        self.accounts.all_users()
    }

    pub fn fetch_pending_users(&self, session: &Session) -> Result<Vec<UserEntry>, WorkflowError> {
        self.authorize(session, Resource::User, Operation::View)?;
        self.accounts.pending_users()
    }

    pub fn fetch_products(&self, session: &Session) -> Result<Vec<ProductEntry>, WorkflowError> {
        self.authorize(session, Resource::Product, Operation::View)?;
        Reports::new(&self.store).catalog()
    }

    pub fn create_product(
        &self,
        session: &Session,
        draft: &ProductDraft,
    ) -> Result<ProductEntry, WorkflowError> {
        self.authorize(session, Resource::Product, Operation::Create)?;
        let (product, stock) = self.ledger.register_product(draft)?;
        Ok(ProductEntry {
            product_id: product.id,
            name: product.name,
            category: product.category,
            listing_count: 0,
            in_stock: Some(stock.quantity),
        })
    }

    pub fn stock_summary(
        &self,
        session: &Session,
        product_ids: &[ProductId],
    ) -> Result<Vec<StockSummaryLine>, WorkflowError> {
        self.authorize(session, Resource::Product, Operation::View)?;
        Reports::new(&self.store).stock_summary(product_ids)
    }

    pub fn product_details(
        &self,
        session: &Session,
        product_ids: &[ProductId],
    ) -> Result<Vec<ProductDetailLine>, WorkflowError> {
        self.authorize(session, Resource::Product, Operation::View)?;
        Reports::new(&self.store).product_details(product_ids)
    }

    /// Run one workflow and translate its outcome for the presentation layer.
    pub fn execute(&self, session: Option<&Session>, command: Command) -> Response {
        let name = command.name();
        let span = tracing::info_span!("workflow", command = name);
        let _guard = span.enter();
        tracing::debug!(stage = %Stage::Received);

        let outcome = match (command.required_permission(), session) {
            (Some((resource, operation)), None) => Err(WorkflowError::PermissionDenied {
                resource,
                operation,
            }),
            (_, session) => self.run(session, command),
        };

        match outcome {
            Ok(response) => {
                tracing::debug!(stage = %Stage::Committed);
                response
            }
            Err(e) if e.is_domain() => {
                tracing::warn!(stage = %Stage::Failed, "{name} rejected: {e}");
                Response::failed(e.to_string())
            }
            Err(e) => {
                tracing::error!(stage = %Stage::Failed, "{name} failed: {e:#}");
                Response::failed(UNEXPECTED_ERROR)
            }
        }
    }

    fn run(&self, session: Option<&Session>, command: Command) -> Result<Response, WorkflowError> {
        // commands that require a session were turned away in `execute` already
        let actor = || {
            session.ok_or_else(|| {
                WorkflowError::Infrastructure(anyhow::anyhow!("session missing after admission"))
            })
        };

        let response = match command {
            Command::Login { username, password } => {
                let session = self.login(&username, &password)?;
                Response::success("Login successful", Payload::Session(session))
            }
            Command::Register {
                username,
                password,
                role,
            } => {
                let user = self.register(&username, &password, &role)?;
                Response::success("Registration successful, awaiting approval", Payload::User(user))
            }
            Command::BuyProduct {
                product_id,
                quantity,
            } => {
                let order = self.buy_product(actor()?, &product_id, quantity)?;
                Response::success(
                    "Product purchase completed successfully",
                    Payload::Order(order),
                )
            }
            Command::SellProduct {
                product_id,
                quantity,
                unit_price,
            } => {
                let listing = self.sell_product(actor()?, &product_id, quantity, unit_price)?;
                Response::success("Product sale completed", Payload::Listing(listing))
            }
            Command::ApproveUser { user_id } => {
                let message = match self.approve_user(actor()?, &user_id)? {
                    Transition::Moved { .. } => "User approved",
                    Transition::Unchanged(_) => "User already approved",
                };
                Response::success(message, Payload::None)
            }
            Command::DisableUser { user_id } => {
                let message = match self.disable_user(actor()?, &user_id)? {
                    Transition::Moved { .. } => "User disabled",
                    Transition::Unchanged(_) => "User already disabled",
                };
                Response::success(message, Payload::None)
            }
            Command::FetchUsers => {
                let users = self.fetch_users(actor()?)?;
                Response::success("User entries loaded successfully", Payload::Users(users))
            }
            Command::FetchPendingUsers => {
                let users = self.fetch_pending_users(actor()?)?;
                Response::success("Pending users loaded successfully", Payload::Users(users))
            }
            Command::FetchProducts => {
                let products = self.fetch_products(actor()?)?;
                Response::success(
                    "Product entries loaded successfully",
                    Payload::Products(products),
                )
            }
            Command::CreateProduct(draft) => {
                let product = self.create_product(actor()?, &draft)?;
                Response::success("Product created", Payload::Product(product))
            }
            Command::StockSummary { product_ids } => {
                let lines = self.stock_summary(actor()?, &product_ids)?;
                Response::success(
                    "Product stock details generated successfully",
                    Payload::StockSummary(lines),
                )
            }
            Command::ProductDetails { product_ids } => {
                let lines = self.product_details(actor()?, &product_ids)?;
                Response::success(
                    "Product details generated successfully",
                    Payload::ProductDetails(lines),
                )
            }
        };
        Ok(response)
    }
}
