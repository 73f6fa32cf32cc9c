//! Catalog products, their stock rows and the ledger entries that move them
use crate::config::SellPolicy;
use crate::error::WorkflowError;
use crate::types::{EntryId, ProductId, StockId, TimeStamp, UserId};

/// One named measurement of a product, e.g. `weight: 1.2 kg (decimal)`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub data_type: String,
}

/// Reference to another product this one is built from. The id is kept as
/// whatever the catalog document holds and is not checked against the store.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Component {
    pub product_id: serde_json::Value,
    pub display_name: String,
}

/// The free-form part of a product, stored as a JSON document.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct ProductAttributes {
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub components: Vec<Component>,
}

impl ProductAttributes {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Product {
    #[n(0)]
    pub id: ProductId,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub category: String,
    #[n(3)]
    pub cost: u64,
    #[n(4)]
    pub colour: Option<String>,
    #[n(5)]
    pub description: Option<String>,
    #[n(6)]
    pub attributes_json: Option<String>, // validated ProductAttributes document
}

impl Product {
    /// Parsed attributes. `None` when the product has no attribute document.
    pub fn attributes(&self) -> anyhow::Result<Option<ProductAttributes>> {
        self.attributes_json
            .as_deref()
            .map(ProductAttributes::from_json)
            .transpose()
    }
}

/// On-hand balance of a product, bounded by `max_stock`.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Stock {
    #[n(0)]
    pub id: StockId,
    #[n(1)]
    pub product_id: ProductId,
    #[n(2)]
    pub quantity: u32,
    #[n(3)]
    pub min_stock: u32,
    #[n(4)]
    pub max_stock: u32,
    #[n(5)]
    pub reorder_point: u32,
}

impl Stock {
    /// Quantity after receiving `requested` more units.
    pub fn restocked(&self, requested: u32) -> Result<u32, WorkflowError> {
        if requested == 0 {
            return Err(WorkflowError::InvalidQuantity);
        }
        match self.quantity.checked_add(requested) {
            Some(next) if next <= self.max_stock => Ok(next),
            _ => Err(WorkflowError::MaxStockExceeded {
                product_id: self.product_id.clone(),
                current: self.quantity,
                requested,
                max_stock: self.max_stock,
            }),
        }
    }

    /// Quantity after selling `requested` units under `policy`.
    pub fn depleted(&self, requested: u32, policy: SellPolicy) -> Result<u32, WorkflowError> {
        if requested == 0 {
            return Err(WorkflowError::InvalidQuantity);
        }
        let insufficient = match policy {
            SellPolicy::RetainLastUnit => self.quantity <= requested,
            SellPolicy::AllowDepletion => self.quantity < requested,
        };
        if insufficient {
            return Err(WorkflowError::InsufficientStock {
                product_id: self.product_id.clone(),
                available: self.quantity,
                requested,
            });
        }
        Ok(self.quantity - requested)
    }

    pub fn at_reorder_point(&self) -> bool {
        self.quantity <= self.reorder_point
    }
    pub fn below_minimum(&self) -> bool {
        self.quantity < self.min_stock
    }
}

/// Restock entry appended on every successful buy.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode, serde::Serialize)]
pub struct OrderRecord {
    #[n(0)]
    pub id: EntryId,
    #[n(1)]
    pub product_id: ProductId,
    #[n(2)]
    pub ordered_by: UserId,
    #[n(3)]
    pub quantity: u32,
    #[n(4)]
    pub cost: u64, // product cost at the time of the order
    #[n(5)]
    pub ordered_at: TimeStamp,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode, serde::Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[n(0)]
    Active,
}

/// Sale entry appended on every successful sell.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode, serde::Serialize)]
pub struct ListingRecord {
    #[n(0)]
    pub id: EntryId,
    #[n(1)]
    pub product_id: ProductId,
    #[n(2)]
    pub listed_by: UserId,
    #[n(3)]
    pub quantity: u32,
    #[n(4)]
    pub unit_price: u64,
    #[n(5)]
    pub total_price: u64,
    #[n(6)]
    pub status: ListingStatus,
    #[n(7)]
    pub listed_at: TimeStamp,
}

impl OrderRecord {
    pub fn new(
        product_id: ProductId,
        ordered_by: UserId,
        quantity: u32,
        cost: u64,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            id: EntryId::generate()?,
            product_id,
            ordered_by,
            quantity,
            cost,
            ordered_at: TimeStamp::new(),
        })
    }

    /// Returns the content hash and CBOR encoding of the entry.
    pub fn build(&self) -> anyhow::Result<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}

impl ListingRecord {
    pub fn new(
        product_id: ProductId,
        listed_by: UserId,
        quantity: u32,
        unit_price: u64,
    ) -> Result<Self, WorkflowError> {
        let total_price = unit_price
            .checked_mul(u64::from(quantity))
            .ok_or(WorkflowError::AmountOverflow {
                quantity,
                unit_price,
            })?;

        Ok(Self {
            id: EntryId::generate()?,
            product_id,
            listed_by,
            quantity,
            unit_price,
            total_price,
            status: ListingStatus::Active,
            listed_at: TimeStamp::new(),
        })
    }

    /// Returns the content hash and CBOR encoding of the entry.
    pub fn build(&self) -> anyhow::Result<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}

/// Draft of a new catalog product and its stock row.
#[derive(Debug, Default, Clone)]
pub struct ProductDraft {
    name: Option<String>,
    category: Option<String>,
    cost: u64,
    colour: Option<String>,
    description: Option<String>,
    attributes: Option<ProductAttributes>,
    quantity: u32,
    min_stock: u32,
    max_stock: u32,
    reorder_point: u32,
}

impl ProductDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
    pub fn set_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
    pub fn set_cost(mut self, cost: u64) -> Self {
        self.cost = cost;
        self
    }
    pub fn set_colour(mut self, colour: impl Into<String>) -> Self {
        self.colour = Some(colour.into());
        self
    }
    pub fn set_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
    pub fn set_attributes(mut self, attributes: ProductAttributes) -> Self {
        self.attributes = Some(attributes);
        self
    }
    pub fn set_initial_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }
    pub fn set_stock_limits(mut self, min_stock: u32, max_stock: u32, reorder_point: u32) -> Self {
        self.min_stock = min_stock;
        self.max_stock = max_stock;
        self.reorder_point = reorder_point;
        self
    }

    /// Checks fields and mints ids. Returns the product with its single stock row.
    pub fn validate_and_finalise(&self) -> Result<(Product, Stock), WorkflowError> {
        let name = match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => return Err(WorkflowError::InvalidProduct("name is not set".into())),
        };
        let category = match self.category.as_deref().map(str::trim) {
            Some(category) if !category.is_empty() => category.to_owned(),
            _ => return Err(WorkflowError::InvalidProduct("category is not set".into())),
        };
        if self.max_stock == 0 {
            return Err(WorkflowError::InvalidProduct(
                "max stock is set to zero".into(),
            ));
        }
        if self.min_stock > self.max_stock {
            return Err(WorkflowError::InvalidProduct(format!(
                "min stock {} exceeds max stock {}",
                self.min_stock, self.max_stock
            )));
        }
        if self.reorder_point > self.max_stock {
            return Err(WorkflowError::InvalidProduct(format!(
                "reorder point {} exceeds max stock {}",
                self.reorder_point, self.max_stock
            )));
        }
        if self.quantity > self.max_stock {
            return Err(WorkflowError::InvalidProduct(format!(
                "initial quantity {} exceeds max stock {}",
                self.quantity, self.max_stock
            )));
        }
        let attributes_json = self
            .attributes
            .as_ref()
            .map(ProductAttributes::to_json)
            .transpose()?;

        let product = Product {
            id: ProductId::generate()?,
            name,
            category,
            cost: self.cost,
            colour: self.colour.clone(),
            description: self.description.clone(),
            attributes_json,
        };
        let stock = Stock {
            id: StockId::generate()?,
            product_id: product.id.clone(),
            quantity: self.quantity,
            min_stock: self.min_stock,
            max_stock: self.max_stock,
            reorder_point: self.reorder_point,
        };

        Ok((product, stock))
    }
}
