use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{Aggregate, AggregateRoot, CategoryId, DomainError, ProductId, Quantity};
use stockroom_events::Event;

use crate::stock_level::deserialize_stock_total;

/// Unit a product is sold in.
///
/// Accepts the short codes used by older imports (`adet`, `kg`, `lt`, `mt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[serde(alias = "adet")]
    Piece,
    #[serde(alias = "kg")]
    Kilogram,
    #[serde(alias = "lt")]
    Liter,
    #[serde(alias = "mt")]
    Meter,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Piece => "piece",
            Unit::Kilogram => "kilogram",
            Unit::Liter => "liter",
            Unit::Meter => "meter",
        }
    }
}

impl core::str::FromStr for Unit {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "piece" | "adet" => Ok(Unit::Piece),
            "kilogram" | "kg" => Ok(Unit::Kilogram),
            "liter" | "lt" => Ok(Unit::Liter),
            "meter" | "mt" => Ok(Unit::Meter),
            other => Err(DomainError::validation(format!("unknown unit '{other}'"))),
        }
    }
}

/// Catalog-owned product attributes.
///
/// Everything about a product except its stock, which only the stock
/// commands below may change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub description: Option<String>,
    /// Price in smallest currency unit.
    pub price: u64,
    /// Purchase price in smallest currency unit.
    pub purchase_price: u64,
    pub unit: Unit,
    #[serde(default)]
    pub min_stock: i64,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Product id on the external e-commerce platform.
    #[serde(default)]
    pub external_id: Option<String>,
}

fn default_active() -> bool {
    true
}

/// Registration payload for a new product (catalog import / CRUD).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewProduct {
    #[serde(flatten)]
    pub details: ProductDetails,
    #[serde(default, deserialize_with = "deserialize_stock_total")]
    pub stock: i64,
}

/// Aggregate root: Product (one row of the product ledger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    id: ProductId,
    #[serde(flatten)]
    details: ProductDetails,
    stock: i64,
    #[serde(skip)]
    version: u64,
}

impl Product {
    /// Validate and build a freshly registered product.
    pub fn register(id: ProductId, new: NewProduct) -> Result<Self, DomainError> {
        let mut details = new.details;
        details.name = details.name.trim().to_string();
        details.barcode = normalize_optional(details.barcode);
        details.external_id = normalize_optional(details.external_id);
        details.description = normalize_optional(details.description);

        if details.name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if new.stock < 0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }
        if details.min_stock < 0 {
            return Err(DomainError::validation("min_stock cannot be negative"));
        }

        Ok(Self {
            id,
            details,
            stock: new.stock,
            version: 0,
        })
    }

    /// Rebuild a product from persisted state.
    pub fn restore(id: ProductId, details: ProductDetails, stock: i64, version: u64) -> Self {
        Self {
            id,
            details,
            stock,
            version,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn details(&self) -> &ProductDetails {
        &self.details
    }

    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn barcode(&self) -> Option<&str> {
        self.details.barcode.as_deref()
    }

    pub fn external_id(&self) -> Option<&str> {
        self.details.external_id.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.details.active
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    /// At or below the minimum-stock threshold.
    pub fn is_low_on_stock(&self) -> bool {
        self.stock <= self.details.min_stock
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: DecrementStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecrementStock {
    pub product_id: ProductId,
    pub amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: IncrementStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementStock {
    pub product_id: ProductId,
    pub amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetStock (overwrite with a counted value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStock {
    pub product_id: ProductId,
    pub value: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    Decrement(DecrementStock),
    Increment(IncrementStock),
    SetAbsolute(SetStock),
}

/// Payload shared by all stock events: the before/after values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChanged {
    pub product_id: ProductId,
    pub previous: i64,
    pub new: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    StockDecremented(StockChanged),
    StockIncremented(StockChanged),
    StockSet(StockChanged),
}

impl StockEvent {
    pub fn change(&self) -> &StockChanged {
        match self {
            StockEvent::StockDecremented(c)
            | StockEvent::StockIncremented(c)
            | StockEvent::StockSet(c) => c,
        }
    }
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::StockDecremented(_) => "products.stock.decremented",
            StockEvent::StockIncremented(_) => "products.stock.incremented",
            StockEvent::StockSet(_) => "products.stock.set",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.change().occurred_at
    }
}

impl Aggregate for Product {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        self.stock = event.change().new;

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::Decrement(cmd) => self.handle_decrement(cmd),
            StockCommand::Increment(cmd) => self.handle_increment(cmd),
            StockCommand::SetAbsolute(cmd) => self.handle_set(cmd),
        }
    }
}

impl Product {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::product_not_found(product_id));
        }
        Ok(())
    }

    fn handle_decrement(&self, cmd: &DecrementStock) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_product_id(cmd.product_id)?;
        let amount = Quantity::new(cmd.amount)?.get();

        if self.stock < amount {
            return Err(DomainError::InsufficientStock {
                product_id: self.id,
                product_name: self.details.name.clone(),
                available: self.stock,
                requested: amount,
            });
        }

        Ok(vec![StockEvent::StockDecremented(StockChanged {
            product_id: self.id,
            previous: self.stock,
            new: self.stock - amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_increment(&self, cmd: &IncrementStock) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_product_id(cmd.product_id)?;
        let amount = Quantity::new(cmd.amount)?.get();

        let new = self
            .stock
            .checked_add(amount)
            .ok_or_else(|| DomainError::validation("stock overflow"))?;

        Ok(vec![StockEvent::StockIncremented(StockChanged {
            product_id: self.id,
            previous: self.stock,
            new,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set(&self, cmd: &SetStock) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_product_id(cmd.product_id)?;
        if cmd.value < 0 {
            return Err(DomainError::InvalidQuantity(cmd.value));
        }

        Ok(vec![StockEvent::StockSet(StockChanged {
            product_id: self.id,
            previous: self.stock,
            new: cmd.value,
            occurred_at: cmd.occurred_at,
        })])
    }
}
