//! Product catalog: registration and read access.
//!
//! Stock is set once at registration; every later change goes through
//! [`StockMutator`](crate::stock_mutator::StockMutator).

use tracing::{info, instrument};

use stockroom_core::{DomainError, ProductId};
use stockroom_events::StockMovement;
use stockroom_products::{NewProduct, Product, ProductLookup};

use crate::error::ServiceError;
use crate::ledger::{LedgerStore, finish};

#[derive(Debug, Clone)]
pub struct ProductCatalog<S> {
    store: S,
}

impl<S> ProductCatalog<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validate and store a new product. A duplicate barcode is a `StoreError::Conflict`.
    #[instrument(skip(self, new), fields(name = %new.details.name), err)]
    pub async fn register(&self, new: NewProduct) -> Result<Product, ServiceError> {
        let product = Product::register(ProductId::new(), new)?;

        let mut unit = self.store.begin().await?;
        let result = unit.insert_product(&product).await.map_err(ServiceError::from);
        let product = finish(unit, result.map(|_| product)).await?;

        info!(product_id = %product.id_typed(), stock = product.stock(), "product registered");
        Ok(product)
    }

    pub async fn get(&self, id: ProductId) -> Result<Product, ServiceError> {
        self.store
            .find_product(id)
            .await?
            .ok_or_else(|| DomainError::product_not_found(id).into())
    }

    pub async fn by_barcode(&self, barcode: &str) -> Result<Product, ServiceError> {
        self.store
            .find_product_by_barcode(barcode)
            .await?
            .ok_or_else(|| DomainError::product_not_found(barcode).into())
    }

    /// Resolve an identifier as a product id if it parses as one, otherwise as a barcode.
    pub async fn lookup(&self, identifier: &str) -> Result<Product, ServiceError> {
        match ProductLookup::parse(identifier)? {
            ProductLookup::Id(id) => self.get(id).await,
            ProductLookup::Barcode(code) => self.by_barcode(&code).await,
        }
    }

    pub async fn list(&self) -> Result<Vec<Product>, ServiceError> {
        Ok(self.store.list_products().await?)
    }

    /// Active products at or below their minimum-stock threshold.
    pub async fn low_stock(&self) -> Result<Vec<Product>, ServiceError> {
        let products = self.store.list_products().await?;
        Ok(products
            .into_iter()
            .filter(|p| p.is_active() && p.is_low_on_stock())
            .collect())
    }

    /// Audit trail of a product's stock, oldest first.
    pub async fn movements(&self, id: ProductId) -> Result<Vec<StockMovement>, ServiceError> {
        self.get(id).await?;
        Ok(self.store.list_movements(id).await?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ledger::{InMemoryLedger, StoreError};
    use stockroom_products::{ProductDetails, Unit};

    pub(crate) fn new_product(name: &str, barcode: Option<&str>, stock: i64) -> NewProduct {
        NewProduct {
            details: ProductDetails {
                name: name.to_string(),
                barcode: barcode.map(str::to_string),
                category_id: None,
                description: None,
                price: 1_000,
                purchase_price: 600,
                unit: Unit::Piece,
                min_stock: 2,
                active: true,
                external_id: None,
            },
            stock,
        }
    }

    pub(crate) fn seeded() -> (Arc<InMemoryLedger>, ProductCatalog<Arc<InMemoryLedger>>) {
        let ledger = Arc::new(InMemoryLedger::new());
        (ledger.clone(), ProductCatalog::new(ledger))
    }

    #[tokio::test]
    async fn register_then_lookup_by_id_and_barcode() {
        let (_, catalog) = seeded();
        let product = catalog
            .register(new_product("Ibuprofen", Some("8690001"), 12))
            .await
            .unwrap();

        let by_id = catalog.lookup(&product.id_typed().to_string()).await.unwrap();
        assert_eq!(by_id, product);
        let by_code = catalog.lookup("8690001").await.unwrap();
        assert_eq!(by_code, product);

        let err = catalog.lookup("0000000").await.unwrap_err();
        assert_eq!(err.domain(), Some(&DomainError::ProductNotFound("0000000".to_string())));
    }

    #[tokio::test]
    async fn duplicate_barcode_is_a_conflict() {
        let (_, catalog) = seeded();
        catalog
            .register(new_product("A", Some("123"), 1))
            .await
            .unwrap();
        let err = catalog
            .register(new_product("B", Some("123"), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::Conflict(_))));
        assert_eq!(catalog.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_registration_is_rejected() {
        let (_, catalog) = seeded();
        let err = catalog.register(new_product("  ", None, 1)).await.unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn low_stock_lists_products_at_or_below_threshold() {
        let (_, catalog) = seeded();
        let low = catalog.register(new_product("Low", None, 2)).await.unwrap();
        catalog.register(new_product("Plenty", None, 50)).await.unwrap();
        let mut inactive = new_product("Retired", None, 0);
        inactive.details.active = false;
        catalog.register(inactive).await.unwrap();

        let report = catalog.low_stock().await.unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].id_typed(), low.id_typed());
    }
}
