//! Postgres-backed ledger.
//!
//! One `sqlx::Transaction` per unit of work. Product reads inside a unit take a
//! row lock (`SELECT … FOR UPDATE`), so two units mutating the same product are
//! serialized by the database; `CHECK (stock >= 0)` backs the invariant.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (check constraint violation) | `23514` | `Backend` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / other | N/A | `Backend` |
//! | Row decode failure | N/A | `Corrupt` |

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use stockroom_core::{AggregateRoot, CategoryId, CountSessionId, MovementId, ProductId, SaleId};
use stockroom_events::{MovementReason, StockMovement};
use stockroom_inventory::CountSession;
use stockroom_products::{Product, ProductDetails, Unit};
use stockroom_sales::{Sale, SaleRecord, SalesChannel};

use super::{LedgerStore, StoreError, UnitOfWork};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        barcode TEXT UNIQUE,
        category_id UUID,
        description TEXT,
        price BIGINT NOT NULL CHECK (price >= 0),
        purchase_price BIGINT NOT NULL CHECK (purchase_price >= 0),
        unit TEXT NOT NULL,
        min_stock BIGINT NOT NULL DEFAULT 0,
        active BOOLEAN NOT NULL DEFAULT TRUE,
        external_id TEXT,
        stock BIGINT NOT NULL CHECK (stock >= 0),
        version BIGINT NOT NULL DEFAULT 0,
        seq BIGSERIAL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS products_external_id_idx ON products (external_id)",
    r#"
    CREATE TABLE IF NOT EXISTS sales (
        id UUID PRIMARY KEY,
        product_id UUID NOT NULL REFERENCES products (id),
        channel TEXT NOT NULL,
        quantity BIGINT NOT NULL CHECK (quantity > 0),
        occurred_at TIMESTAMPTZ NOT NULL,
        is_cancelled BOOLEAN NOT NULL DEFAULT FALSE,
        cancelled_at TIMESTAMPTZ,
        cancel_reason TEXT,
        external_order_id TEXT,
        version BIGINT NOT NULL DEFAULT 0,
        CHECK (is_cancelled = (cancelled_at IS NOT NULL)),
        CHECK (is_cancelled = (cancel_reason IS NOT NULL))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS count_sessions (
        id UUID PRIMARY KEY,
        status TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        state JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stock_movements (
        id UUID PRIMARY KEY,
        product_id UUID NOT NULL REFERENCES products (id),
        reason JSONB NOT NULL,
        previous BIGINT NOT NULL,
        new BIGINT NOT NULL,
        occurred_at TIMESTAMPTZ NOT NULL,
        seq BIGSERIAL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS stock_movements_product_idx ON stock_movements (product_id, seq)",
];

const PRODUCT_COLUMNS: &str = "id, name, barcode, category_id, description, price, purchase_price, \
     unit, min_stock, active, external_id, stock, version";

const SALE_COLUMNS: &str = "id, product_id, channel, quantity, occurred_at, is_cancelled, \
     cancelled_at, cancel_reason, external_order_id, version";

/// Postgres-backed ledger.
#[derive(Debug, Clone)]
pub struct PostgresLedger {
    pool: Arc<PgPool>,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }
}

struct PostgresUnit {
    tx: Transaction<'static, Postgres>,
}

impl PostgresUnit {
    async fn product_where(
        &mut self,
        operation: &str,
        clause: &str,
        value: &str,
    ) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&first_product_where(clause))
            .bind(value)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        row.as_ref().map(product_from_row).transpose()
    }
}

/// Earliest-registered match, so duplicated lookup keys resolve deterministically.
fn first_product_where(clause: &str) -> String {
    format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE {clause} ORDER BY seq ASC LIMIT 1")
}

#[async_trait]
impl UnitOfWork for PostgresUnit {
    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("product_for_update", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn product_by_barcode(&mut self, barcode: &str) -> Result<Option<Product>, StoreError> {
        self.product_where("product_by_barcode", "barcode = $1", barcode)
            .await
    }

    async fn product_by_external_id(
        &mut self,
        external_id: &str,
    ) -> Result<Option<Product>, StoreError> {
        self.product_where("product_by_external_id", "external_id = $1", external_id)
            .await
    }

    async fn active_products(&mut self) -> Result<Vec<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE active ORDER BY seq ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("active_products", e))?;
        rows.iter().map(product_from_row).collect()
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        let details = product.details();
        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, barcode, category_id, description, price, purchase_price,
                unit, min_stock, active, external_id, stock, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(*product.id_typed().as_uuid())
        .bind(&details.name)
        .bind(&details.barcode)
        .bind(details.category_id.map(|c| *c.as_uuid()))
        .bind(&details.description)
        .bind(to_i64("price", details.price)?)
        .bind(to_i64("purchase_price", details.purchase_price)?)
        .bind(details.unit.as_str())
        .bind(details.min_stock)
        .bind(details.active)
        .bind(&details.external_id)
        .bind(product.stock())
        .bind(product.version() as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn update_stock(&mut self, product: &Product) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE products SET stock = $2, version = $3 WHERE id = $1")
            .bind(*product.id_typed().as_uuid())
            .bind(product.stock())
            .bind(product.version() as i64)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_stock", e))?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Corrupt(format!(
                "product {} vanished mid-unit",
                product.id_typed()
            )));
        }
        Ok(())
    }

    async fn append_movement(&mut self, movement: &StockMovement) -> Result<(), StoreError> {
        let reason = serde_json::to_value(&movement.reason)
            .map_err(|e| StoreError::Backend(format!("movement reason serialization failed: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO stock_movements (id, product_id, reason, previous, new, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(*movement.id.as_uuid())
        .bind(*movement.product_id.as_uuid())
        .bind(reason)
        .bind(movement.previous)
        .bind(movement.new)
        .bind(movement.occurred_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_movement", e))?;
        Ok(())
    }

    async fn sale(&mut self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("sale_for_update", e))?;
        row.as_ref().map(sale_from_row).transpose()
    }

    async fn save_sale(&mut self, sale: &Sale) -> Result<(), StoreError> {
        let record = SaleRecord::from(sale.clone());
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, product_id, channel, quantity, occurred_at, is_cancelled,
                cancelled_at, cancel_reason, external_order_id, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                is_cancelled = EXCLUDED.is_cancelled,
                cancelled_at = EXCLUDED.cancelled_at,
                cancel_reason = EXCLUDED.cancel_reason,
                version = EXCLUDED.version
            "#,
        )
        .bind(*record.id.as_uuid())
        .bind(*record.product_id.as_uuid())
        .bind(record.channel.as_str())
        .bind(record.quantity)
        .bind(record.occurred_at)
        .bind(record.is_cancelled)
        .bind(record.cancelled_at)
        .bind(&record.cancel_reason)
        .bind(&record.external_order_id)
        .bind(record.version as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_sale", e))?;
        Ok(())
    }

    async fn session(&mut self, id: CountSessionId) -> Result<Option<CountSession>, StoreError> {
        let row = sqlx::query("SELECT state FROM count_sessions WHERE id = $1 FOR UPDATE")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("session_for_update", e))?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn save_session(&mut self, session: &CountSession) -> Result<(), StoreError> {
        let state = serde_json::to_value(session)
            .map_err(|e| StoreError::Backend(format!("session serialization failed: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO count_sessions (id, status, created_at, state)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                state = EXCLUDED.state
            "#,
        )
        .bind(*session.id_typed().as_uuid())
        .bind(session.status().as_str())
        .bind(session.created_at())
        .bind(state)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_session", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

#[async_trait]
impl LedgerStore for PostgresLedger {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresUnit { tx }))
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = $1");
        let row = sqlx::query(&sql)
            .bind(barcode)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_product_by_barcode", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), fields(product_count = tracing::field::Empty), err)]
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY seq ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;

        Span::current().record("product_count", rows.len());
        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn list_movements(&self, product_id: ProductId) -> Result<Vec<StockMovement>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, reason, previous, new, occurred_at
            FROM stock_movements
            WHERE product_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(*product_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;
        rows.iter().map(movement_from_row).collect()
    }

    #[instrument(skip(self), fields(sale_id = %id), err)]
    async fn find_sale(&self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_sale", e))?;
        row.as_ref().map(sale_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_sales(&self) -> Result<Vec<Sale>, StoreError> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales ORDER BY occurred_at DESC, id DESC");
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_sales", e))?;
        rows.iter().map(sale_from_row).collect()
    }

    #[instrument(skip(self), fields(session_id = %id), err)]
    async fn find_session(&self, id: CountSessionId) -> Result<Option<CountSession>, StoreError> {
        let row = sqlx::query("SELECT state FROM count_sessions WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_session", e))?;
        row.as_ref().map(session_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_sessions(&self) -> Result<Vec<CountSession>, StoreError> {
        let rows = sqlx::query("SELECT state FROM count_sessions ORDER BY created_at DESC, id DESC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_sessions", e))?;
        rows.iter().map(session_from_row).collect()
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("failed to read column {name}: {e}")))
}

fn to_i64(field: &str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Backend(format!("{field} out of range: {value}")))
}

fn to_u64(field: &str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {field}: {value}")))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let unit: String = column(row, "unit")?;
    let unit = unit
        .parse::<Unit>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    let details = ProductDetails {
        name: column(row, "name")?,
        barcode: column(row, "barcode")?,
        category_id: column::<Option<Uuid>>(row, "category_id")?.map(CategoryId::from_uuid),
        description: column(row, "description")?,
        price: to_u64("price", column(row, "price")?)?,
        purchase_price: to_u64("purchase_price", column(row, "purchase_price")?)?,
        unit,
        min_stock: column(row, "min_stock")?,
        active: column(row, "active")?,
        external_id: column(row, "external_id")?,
    };

    Ok(Product::restore(
        ProductId::from_uuid(column(row, "id")?),
        details,
        column(row, "stock")?,
        to_u64("version", column(row, "version")?)?,
    ))
}

fn sale_from_row(row: &PgRow) -> Result<Sale, StoreError> {
    let channel: String = column(row, "channel")?;
    let channel = channel
        .parse::<SalesChannel>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    let record = SaleRecord {
        id: SaleId::from_uuid(column(row, "id")?),
        product_id: ProductId::from_uuid(column(row, "product_id")?),
        channel,
        quantity: column(row, "quantity")?,
        occurred_at: column(row, "occurred_at")?,
        is_cancelled: column(row, "is_cancelled")?,
        cancelled_at: column(row, "cancelled_at")?,
        cancel_reason: column(row, "cancel_reason")?,
        external_order_id: column(row, "external_order_id")?,
        version: to_u64("version", column(row, "version")?)?,
    };
    Sale::try_from(record).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn session_from_row(row: &PgRow) -> Result<CountSession, StoreError> {
    // The JSON state is authoritative; `status` is a denormalized column for querying.
    let state: serde_json::Value = column(row, "state")?;
    serde_json::from_value(state)
        .map_err(|e| StoreError::Corrupt(format!("failed to decode count session: {e}")))
}

fn movement_from_row(row: &PgRow) -> Result<StockMovement, StoreError> {
    let reason: serde_json::Value = column(row, "reason")?;
    let reason: MovementReason = serde_json::from_value(reason)
        .map_err(|e| StoreError::Corrupt(format!("failed to decode movement reason: {e}")))?;

    Ok(StockMovement {
        id: MovementId::from_uuid(column(row, "id")?),
        product_id: ProductId::from_uuid(column(row, "product_id")?),
        reason,
        previous: column(row, "previous")?,
        new: column(row, "new")?,
        occurred_at: column(row, "occurred_at")?,
    })
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation
                Some("23505") => StoreError::Conflict(msg),
                // Check constraint violation
                Some("23514") => StoreError::Backend(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_take_the_earliest_registered_product() {
        let sql = first_product_where("external_id = $1");
        assert!(sql.ends_with("WHERE external_id = $1 ORDER BY seq ASC LIMIT 1"), "{sql}");
    }
}
