//! Order repository.
//!
//! Orders are stored in `storesync.sales_order` (`order` is reserved in SQL).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use storesync_core::{
    Address, Cancellation, ExternalId, FulfillmentStatus, LineItem, Order, OrderStatus,
};

use super::{StoreError, UpsertOutcome, map_unique_violation};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    external_id: String,
    order_number: String,
    customer_external_id: Option<String>,
    line_items: Json<Vec<LineItem>>,
    subtotal: Decimal,
    tax: Decimal,
    shipping: Decimal,
    discount: Decimal,
    total: Decimal,
    currency: String,
    status: String,
    fulfillment_status: Option<String>,
    shipping_address: Option<Json<Address>>,
    billing_address: Option<Json<Address>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    placed_at: Option<DateTime<Utc>>,
    platform_updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = parse_status(&row.status)?;
        let fulfillment_status = row
            .fulfillment_status
            .as_deref()
            .map(|value| {
                FulfillmentStatus::from_platform(value).ok_or_else(|| {
                    StoreError::DataCorruption(format!("invalid fulfillment status: {value}"))
                })
            })
            .transpose()?;

        Ok(Self {
            external_id: ExternalId::new(row.external_id),
            order_number: row.order_number,
            customer_external_id: row.customer_external_id.map(ExternalId::new),
            line_items: row.line_items.0,
            subtotal: row.subtotal,
            tax: row.tax,
            shipping: row.shipping,
            discount: row.discount,
            total: row.total,
            currency: row.currency,
            status,
            fulfillment_status,
            shipping_address: row.shipping_address.map(|a| a.0),
            billing_address: row.billing_address.map(|a| a.0),
            cancellation: row.cancelled_at.map(|cancelled_at| Cancellation {
                cancelled_at,
                reason: row.cancel_reason,
            }),
            placed_at: row.placed_at,
            platform_updated_at: row.platform_updated_at,
        })
    }
}

/// Parse a stored status, rejecting anything outside the closed set.
fn parse_status(value: &str) -> Result<OrderStatus, StoreError> {
    let status = OrderStatus::from_platform(value);
    if status.as_str() == value {
        Ok(status)
    } else {
        Err(StoreError::DataCorruption(format!(
            "invalid order status: {value}"
        )))
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order or overwrite the one with the same external ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if another order already uses the order number.
    /// Returns `StoreError::Database` if the query fails.
    pub async fn upsert(&self, order: &Order) -> Result<UpsertOutcome, StoreError> {
        let inserted: bool = sqlx::query_scalar(
            r"
            INSERT INTO storesync.sales_order (
                external_id, order_number, customer_external_id, line_items,
                subtotal, tax, shipping, discount, total, currency, status,
                fulfillment_status, shipping_address, billing_address,
                cancelled_at, cancel_reason, placed_at, platform_updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (external_id) DO UPDATE SET
                order_number = EXCLUDED.order_number,
                customer_external_id = EXCLUDED.customer_external_id,
                line_items = EXCLUDED.line_items,
                subtotal = EXCLUDED.subtotal,
                tax = EXCLUDED.tax,
                shipping = EXCLUDED.shipping,
                discount = EXCLUDED.discount,
                total = EXCLUDED.total,
                currency = EXCLUDED.currency,
                status = EXCLUDED.status,
                fulfillment_status = EXCLUDED.fulfillment_status,
                shipping_address = EXCLUDED.shipping_address,
                billing_address = EXCLUDED.billing_address,
                cancelled_at = EXCLUDED.cancelled_at,
                cancel_reason = EXCLUDED.cancel_reason,
                placed_at = EXCLUDED.placed_at,
                platform_updated_at = EXCLUDED.platform_updated_at,
                updated_at = now()
            RETURNING (xmax = 0) AS inserted
            ",
        )
        .bind(order.external_id.as_str())
        .bind(&order.order_number)
        .bind(order.customer_external_id.as_ref().map(ExternalId::as_str))
        .bind(Json(&order.line_items))
        .bind(order.subtotal)
        .bind(order.tax)
        .bind(order.shipping)
        .bind(order.discount)
        .bind(order.total)
        .bind(&order.currency)
        .bind(order.status.as_str())
        .bind(order.fulfillment_status.map(FulfillmentStatus::as_str))
        .bind(order.shipping_address.as_ref().map(Json))
        .bind(order.billing_address.as_ref().map(Json))
        .bind(order.cancellation.as_ref().map(|c| c.cancelled_at))
        .bind(order.cancellation.as_ref().and_then(|c| c.reason.as_deref()))
        .bind(order.placed_at)
        .bind(order.platform_updated_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &format!("order {}", order.external_id)))?;

        Ok(if inserted {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        })
    }

    /// Mark an order cancelled, leaving the rest of the row untouched.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn cancel(
        &self,
        external_id: &ExternalId,
        cancellation: &Cancellation,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE storesync.sales_order
            SET status = 'cancelled',
                cancelled_at = $2,
                cancel_reason = $3,
                updated_at = now()
            WHERE external_id = $1
            ",
        )
        .bind(external_id.as_str())
        .bind(cancellation.cancelled_at)
        .bind(cancellation.reason.as_deref())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get an order by external ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    /// Returns `StoreError::DataCorruption` if a stored status is invalid.
    pub async fn get(&self, external_id: &ExternalId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT external_id, order_number, customer_external_id, line_items,
                   subtotal, tax, shipping, discount, total, currency, status,
                   fulfillment_status, shipping_address, billing_address,
                   cancelled_at, cancel_reason, placed_at, platform_updated_at
            FROM storesync.sales_order
            WHERE external_id = $1
            ",
        )
        .bind(external_id.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Delete an order by external ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn delete(&self, external_id: &ExternalId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM storesync.sales_order WHERE external_id = $1")
            .bind(external_id.as_str())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count mirrored orders.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM storesync.sales_order")
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}
