//! Postgres-backed store.
//!
//! Queries are built at runtime (no compile-time checking against a live
//! database). Each multi-step operation runs inside one transaction.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Domain(Conflict)` | Concurrent intake / edit collided on a unique index |
//! | Database (other) | Any other | `Persistence` | Check constraints, foreign keys, etc. |
//! | PoolClosed | N/A | `Persistence` | Connection pool was closed |
//! | Other | N/A | `Persistence` | Network errors, decode errors, etc. |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};

use stockflow_core::{InventoryItemId, LifecycleItemId, NotificationId, OrderId, ToolId};
use stockflow_inventory::{
    ActiveOrder, InventoryItem, InventoryListing, InventoryPatch, InventoryStats,
    NewInventoryItem, Order, OrderEffect, OrderUpsert, Tool, ToolInput, ToolWrite, UpsertAction,
    duplicate_tool,
};
use stockflow_lifecycle::{
    Installation, Intake, LifecycleDetails, LifecycleItem, LifecycleStatus, NewLifecycleItem,
    PhotoSet, Transition,
};
use stockflow_notifications::{
    ItemSnapshot, NewNotificationRecord, NotificationRecord, attention_order,
};

use super::{
    InventoryRepository, ItemWrite, LifecycleRepository, NotificationRepository,
    OrderRepository, StockHandlers, StoreError, StoreResult, ToolRepository, conflict,
    item_not_found, lifecycle_not_found, tool_not_found,
};

const ITEM_COLUMNS: &str = "id, material, supplier, category, stock, threshold, price";

const LIFECYCLE_COLUMNS: &str = "id, status, product, supplier, client, date, photo_path, \
     additional_photos, quantity, received_id, installed_date, defective_date, created_at";

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
    handlers: StockHandlers,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            handlers: StockHandlers::default(),
        }
    }

    pub fn with_handlers(pool: PgPool, handlers: StockHandlers) -> Self {
        Self {
            pool: Arc::new(pool),
            handlers,
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| StoreError::Persistence(format!("migration failed: {e}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

async fn commit(tx: Transaction<'_, Postgres>) -> StoreResult<()> {
    tx.commit()
        .await
        .map_err(|e| map_sqlx_error("commit_transaction", e))
}

async fn rollback(tx: Transaction<'_, Postgres>) -> StoreResult<()> {
    tx.rollback()
        .await
        .map_err(|e| map_sqlx_error("rollback", e))
}

async fn apply_effects(
    tx: &mut Transaction<'_, Postgres>,
    effects: &[OrderEffect],
) -> StoreResult<()> {
    for effect in effects {
        match effect {
            OrderEffect::CancelOrder(inventory_id) => {
                sqlx::query("DELETE FROM orders WHERE inventory_id = $1")
                    .bind(inventory_id.get())
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| map_sqlx_error("cancel_order", e))?;
            }
        }
    }
    Ok(())
}

#[async_trait]
impl InventoryRepository for PostgresStore {
    #[instrument(skip(self, new), fields(inventory_id = tracing::field::Empty), err)]
    async fn create_item(
        &self,
        new: NewInventoryItem,
        now: DateTime<Utc>,
    ) -> StoreResult<ItemWrite> {
        let new = new.validated()?;
        let mut tx = self.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO inventory_items (material, supplier, category, stock, threshold, price)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&new.material)
        .bind(&new.supplier)
        .bind(&new.category)
        .bind(new.stock)
        .bind(new.threshold)
        .bind(new.price)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;

        let id: i64 = row
            .try_get("id")
            .map_err(|e| map_sqlx_error("insert_item", e))?;
        let item = new.into_item(InventoryItemId::new(id));
        let event = item.stock_changed(now);
        let effects = self.handlers.effects(&event);
        apply_effects(&mut tx, &effects).await?;
        commit(tx).await?;

        Span::current().record("inventory_id", id);
        Ok(ItemWrite {
            item,
            event,
            effects,
        })
    }

    #[instrument(skip(self), fields(inventory_id = %id), err)]
    async fn get_item(&self, id: InventoryItemId) -> StoreResult<Option<InventoryItem>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_item", e))?;

        row.map(|r| decode::<ItemRow>("get_item", &r).map(Into::into))
            .transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_items(&self) -> StoreResult<Vec<InventoryListing>> {
        let rows = sqlx::query(
            r#"
            SELECT
                i.id, i.material, i.supplier, i.category, i.stock, i.threshold, i.price,
                o.id AS order_id, o.ordered_quantity, o.ordered_date, o.is_ordered
            FROM inventory_items i
            LEFT JOIN orders o ON o.inventory_id = i.id AND o.is_ordered
            ORDER BY i.material ASC, i.id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;

        let mut listings = Vec::with_capacity(rows.len());
        for row in rows {
            let item: InventoryItem = decode::<ItemRow>("list_items", &row)?.into();
            let order_id: Option<i64> = row
                .try_get("order_id")
                .map_err(|e| map_sqlx_error("list_items", e))?;
            let order = match order_id {
                Some(order_id) => Some(Order {
                    id: OrderId::new(order_id),
                    inventory_id: item.id,
                    ordered_quantity: row
                        .try_get("ordered_quantity")
                        .map_err(|e| map_sqlx_error("list_items", e))?,
                    ordered_date: row
                        .try_get("ordered_date")
                        .map_err(|e| map_sqlx_error("list_items", e))?,
                    is_ordered: row
                        .try_get("is_ordered")
                        .map_err(|e| map_sqlx_error("list_items", e))?,
                }),
                None => None,
            };
            listings.push(InventoryListing::new(item, order));
        }
        Ok(listings)
    }

    #[instrument(skip(self, patch), fields(inventory_id = %id), err)]
    async fn update_item(
        &self,
        id: InventoryItemId,
        patch: &InventoryPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<ItemWrite> {
        let mut tx = self.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_item", e))?;

        let Some(row) = row else {
            rollback(tx).await?;
            return Err(item_not_found(id));
        };
        let current: InventoryItem = decode::<ItemRow>("lock_item", &row)?.into();
        let item = match current.patched(patch) {
            Ok(item) => item,
            Err(e) => {
                rollback(tx).await?;
                return Err(e.into());
            }
        };

        sqlx::query(
            r#"
            UPDATE inventory_items
            SET material = $2, supplier = $3, category = $4, stock = $5, threshold = $6, price = $7
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .bind(&item.material)
        .bind(&item.supplier)
        .bind(&item.category)
        .bind(item.stock)
        .bind(item.threshold)
        .bind(item.price)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;

        let event = item.stock_changed(now);
        let effects = self.handlers.effects(&event);
        apply_effects(&mut tx, &effects).await?;
        commit(tx).await?;

        Ok(ItemWrite {
            item,
            event,
            effects,
        })
    }

    #[instrument(skip(self), fields(inventory_id = %id), err)]
    async fn delete_item(&self, id: InventoryItemId) -> StoreResult<()> {
        let mut tx = self.begin().await?;

        sqlx::query("DELETE FROM orders WHERE inventory_id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_item_orders", e))?;

        let deleted = sqlx::query("DELETE FROM inventory_items WHERE id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?
            .rows_affected();

        if deleted == 0 {
            rollback(tx).await?;
            return Err(item_not_found(id));
        }
        commit(tx).await
    }

    #[instrument(skip(self), err)]
    async fn items_needing_attention(&self) -> StoreResult<Vec<InventoryItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE stock <= 0 OR stock < threshold"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("items_needing_attention", e))?;

        let items = rows
            .iter()
            .map(|r| decode::<ItemRow>("items_needing_attention", r).map(InventoryItem::from))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(attention_order(items))
    }

    #[instrument(skip(self), err)]
    async fn inventory_stats(&self) -> StoreResult<InventoryStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_items,
                COUNT(*) FILTER (WHERE stock > 0 AND stock >= threshold) AS available_items,
                COUNT(*) FILTER (WHERE stock > 0 AND stock < threshold) AS low_stock_items,
                COUNT(*) FILTER (WHERE stock <= 0) AS out_of_stock_items
            FROM inventory_items
            "#,
        )
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("inventory_stats", e))?;

        let count = |column: &str| -> StoreResult<u64> {
            let value: i64 = row
                .try_get(column)
                .map_err(|e| map_sqlx_error("inventory_stats", e))?;
            Ok(value.max(0) as u64)
        };
        Ok(InventoryStats {
            total_items: count("total_items")?,
            available_items: count("available_items")?,
            low_stock_items: count("low_stock_items")?,
            out_of_stock_items: count("out_of_stock_items")?,
        })
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    /// Existence check and upsert share one transaction; the unique index on
    /// `inventory_id` makes concurrent upserts converge on one row.
    #[instrument(skip(self), fields(inventory_id = %upsert.inventory_id), err)]
    async fn upsert_order(
        &self,
        upsert: OrderUpsert,
        now: DateTime<Utc>,
    ) -> StoreResult<(Order, UpsertAction)> {
        let upsert = upsert.validated()?;
        let mut tx = self.begin().await?;

        let item = sqlx::query("SELECT stock, threshold FROM inventory_items WHERE id = $1 FOR SHARE")
            .bind(upsert.inventory_id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("check_item", e))?;

        let Some(item) = item else {
            rollback(tx).await?;
            return Err(item_not_found(upsert.inventory_id));
        };
        let stock: i64 = item
            .try_get("stock")
            .map_err(|e| map_sqlx_error("check_item", e))?;
        let threshold: i64 = item
            .try_get("threshold")
            .map_err(|e| map_sqlx_error("check_item", e))?;

        let existing = sqlx::query("SELECT id FROM orders WHERE inventory_id = $1 FOR UPDATE")
            .bind(upsert.inventory_id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_order", e))?;

        let row = if existing.is_some() {
            sqlx::query(
                r#"
                UPDATE orders SET
                    ordered_quantity = COALESCE($2, ordered_quantity),
                    ordered_date = $3,
                    is_ordered = TRUE
                WHERE inventory_id = $1
                RETURNING id, inventory_id, ordered_quantity, ordered_date, is_ordered,
                    FALSE AS inserted
                "#,
            )
            .bind(upsert.inventory_id.get())
            .bind(upsert.quantity)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_order", e))?
        } else {
            let initial = match upsert.initial_quantity(stock, threshold) {
                Ok(quantity) => quantity,
                Err(err) => {
                    rollback(tx).await?;
                    return Err(err.into());
                }
            };
            // A concurrent insert for the same item lands in the conflict arm.
            sqlx::query(
                r#"
                INSERT INTO orders (inventory_id, ordered_quantity, ordered_date, is_ordered)
                VALUES ($1, $3, $4, TRUE)
                ON CONFLICT (inventory_id) DO UPDATE SET
                    ordered_quantity = COALESCE($2, orders.ordered_quantity),
                    ordered_date = EXCLUDED.ordered_date,
                    is_ordered = TRUE
                RETURNING id, inventory_id, ordered_quantity, ordered_date, is_ordered,
                    (xmax = 0) AS inserted
                "#,
            )
            .bind(upsert.inventory_id.get())
            .bind(upsert.quantity)
            .bind(initial)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("upsert_order", e))?
        };

        let order: Order = decode::<OrderRow>("upsert_order", &row)?.into();
        let inserted: bool = row
            .try_get("inserted")
            .map_err(|e| map_sqlx_error("upsert_order", e))?;
        commit(tx).await?;

        let action = if inserted {
            UpsertAction::Created
        } else {
            UpsertAction::Updated
        };
        Ok((order, action))
    }

    #[instrument(skip(self), fields(inventory_id = %inventory_id), err)]
    async fn deactivate_order(&self, inventory_id: InventoryItemId) -> StoreResult<Option<Order>> {
        let row = sqlx::query(
            r#"
            UPDATE orders SET is_ordered = FALSE
            WHERE inventory_id = $1
            RETURNING id, inventory_id, ordered_quantity, ordered_date, is_ordered
            "#,
        )
        .bind(inventory_id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("deactivate_order", e))?;

        row.map(|r| decode::<OrderRow>("deactivate_order", &r).map(Into::into))
            .transpose()
    }

    #[instrument(skip(self), fields(inventory_id = %inventory_id), err)]
    async fn delete_order(&self, inventory_id: InventoryItemId) -> StoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM orders WHERE inventory_id = $1")
            .bind(inventory_id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_order", e))?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn get_order(&self, inventory_id: InventoryItemId) -> StoreResult<Option<Order>> {
        let row = sqlx::query(
            "SELECT id, inventory_id, ordered_quantity, ordered_date, is_ordered \
             FROM orders WHERE inventory_id = $1",
        )
        .bind(inventory_id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_order", e))?;

        row.map(|r| decode::<OrderRow>("get_order", &r).map(Into::into))
            .transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_active_orders(&self) -> StoreResult<Vec<ActiveOrder>> {
        let rows = sqlx::query(
            r#"
            SELECT
                o.id, o.inventory_id, o.ordered_quantity, o.ordered_date, o.is_ordered,
                i.material, i.supplier, i.category, i.stock, i.threshold, i.price
            FROM orders o
            JOIN inventory_items i ON i.id = o.inventory_id
            WHERE o.is_ordered
            ORDER BY o.ordered_date DESC, o.id DESC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_active_orders", e))?;

        let mut active = Vec::with_capacity(rows.len());
        for row in rows {
            let order: Order = decode::<OrderRow>("list_active_orders", &row)?.into();
            let item = InventoryItem {
                id: order.inventory_id,
                material: get(&row, "material", "list_active_orders")?,
                supplier: get(&row, "supplier", "list_active_orders")?,
                category: get(&row, "category", "list_active_orders")?,
                stock: get(&row, "stock", "list_active_orders")?,
                threshold: get(&row, "threshold", "list_active_orders")?,
                price: get(&row, "price", "list_active_orders")?,
            };
            active.push(ActiveOrder::new(order, &item));
        }
        Ok(active)
    }
}

/// Write every mutable column back, guarded on the status the caller read.
async fn write_lifecycle(
    tx: &mut Transaction<'_, Postgres>,
    item: &LifecycleItem,
    expected: LifecycleStatus,
) -> StoreResult<()> {
    let updated = sqlx::query(
        r#"
        UPDATE lifecycle_items SET
            status = $2, product = $3, supplier = $4, client = $5, date = $6,
            photo_path = $7, additional_photos = $8, quantity = $9, received_id = $10,
            installed_date = $11, defective_date = $12
        WHERE id = $1 AND status = $13
        "#,
    )
    .bind(item.id.get())
    .bind(item.status.as_str())
    .bind(&item.product)
    .bind(&item.supplier)
    .bind(&item.client)
    .bind(item.date)
    .bind(item.photos.primary.as_deref())
    .bind(item.photos.encode_additional())
    .bind(item.quantity)
    .bind(item.received_id.map(LifecycleItemId::get))
    .bind(item.installed_date)
    .bind(item.defective_date)
    .bind(expected.as_str())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("write_lifecycle", e))?
    .rows_affected();

    if updated != 1 {
        return Err(conflict(format!(
            "lifecycle item {} is no longer {}",
            item.id, expected
        )));
    }
    Ok(())
}

impl PostgresStore {
    /// Lock a received record, apply `change`, and write it back.
    async fn transition_received<F>(&self, id: LifecycleItemId, change: F) -> StoreResult<Transition>
    where
        F: FnOnce(&LifecycleItem) -> StoreResult<LifecycleItem> + Send,
    {
        let mut tx = self.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {LIFECYCLE_COLUMNS} FROM lifecycle_items \
             WHERE id = $1 AND status = 'received' FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_lifecycle", e))?;

        let Some(row) = row else {
            rollback(tx).await?;
            return Err(lifecycle_not_found(id));
        };
        let current = lifecycle_from_row("lock_lifecycle", &row)?;
        let next = match change(&current) {
            Ok(next) => next,
            Err(e) => {
                rollback(tx).await?;
                return Err(e);
            }
        };

        write_lifecycle(&mut tx, &next, LifecycleStatus::Received).await?;
        commit(tx).await?;
        Ok(Transition {
            before: current,
            after: next,
        })
    }
}

#[async_trait]
impl LifecycleRepository for PostgresStore {
    #[instrument(skip(self, new), err)]
    async fn intake(&self, new: NewLifecycleItem, now: DateTime<Utc>) -> StoreResult<Intake> {
        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO lifecycle_items
                (status, product, supplier, client, date, photo_path, additional_photos, quantity, created_at)
            VALUES ('received', $1, $2, $3, $4, $5, $6, 1, $7)
            ON CONFLICT (product, supplier, client, date) WHERE status = 'received' DO NOTHING
            RETURNING {LIFECYCLE_COLUMNS}
            "#
        ))
        .bind(&new.details.product)
        .bind(&new.details.supplier)
        .bind(&new.details.client)
        .bind(new.details.date)
        .bind(new.photos.primary.as_deref())
        .bind(new.photos.encode_additional())
        .bind(now)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("intake", e))?;

        if let Some(row) = inserted {
            return Ok(Intake::Created(lifecycle_from_row("intake", &row)?));
        }

        let existing = sqlx::query(&format!(
            "SELECT {LIFECYCLE_COLUMNS} FROM lifecycle_items \
             WHERE status = 'received' AND product = $1 AND supplier = $2 AND client = $3 AND date = $4"
        ))
        .bind(&new.details.product)
        .bind(&new.details.supplier)
        .bind(&new.details.client)
        .bind(new.details.date)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("intake_existing", e))?;

        match existing {
            Some(row) => Ok(Intake::Existing(lifecycle_from_row("intake_existing", &row)?)),
            None => Err(conflict("matching received item changed during intake")),
        }
    }

    #[instrument(skip(self, new), err)]
    async fn insert_defective(
        &self,
        new: NewLifecycleItem,
        now: DateTime<Utc>,
    ) -> StoreResult<LifecycleItem> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO lifecycle_items
                (status, product, supplier, client, date, photo_path, additional_photos,
                 quantity, defective_date, created_at)
            VALUES ('defective', $1, $2, $3, $4, $5, $6, 1, $7, $7)
            RETURNING {LIFECYCLE_COLUMNS}
            "#
        ))
        .bind(&new.details.product)
        .bind(&new.details.supplier)
        .bind(&new.details.client)
        .bind(new.details.date)
        .bind(new.photos.primary.as_deref())
        .bind(new.photos.encode_additional())
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_defective", e))?;

        lifecycle_from_row("insert_defective", &row)
    }

    async fn get_lifecycle_item(&self, id: LifecycleItemId) -> StoreResult<Option<LifecycleItem>> {
        let row = sqlx::query(&format!(
            "SELECT {LIFECYCLE_COLUMNS} FROM lifecycle_items WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_lifecycle_item", e))?;

        row.map(|r| lifecycle_from_row("get_lifecycle_item", &r))
            .transpose()
    }

    #[instrument(skip(self), fields(status = %status), err)]
    async fn list_lifecycle(&self, status: LifecycleStatus) -> StoreResult<Vec<LifecycleItem>> {
        let order_by = match status {
            LifecycleStatus::Received => "date DESC, id DESC",
            LifecycleStatus::Installed => "installed_date DESC, id DESC",
            LifecycleStatus::Defective => "defective_date DESC, id DESC",
        };
        let rows = sqlx::query(&format!(
            "SELECT {LIFECYCLE_COLUMNS} FROM lifecycle_items WHERE status = $1 ORDER BY {order_by}"
        ))
        .bind(status.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_lifecycle", e))?;

        rows.iter()
            .map(|r| lifecycle_from_row("list_lifecycle", r))
            .collect()
    }

    #[instrument(skip(self, installation), fields(item_id = %id), err)]
    async fn install(
        &self,
        id: LifecycleItemId,
        installation: &Installation,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition> {
        let installation = installation.clone();
        self.transition_received(id, move |current| {
            current.install(&installation, now).map_err(StoreError::from)
        })
        .await
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn mark_defective(
        &self,
        id: LifecycleItemId,
        now: DateTime<Utc>,
    ) -> StoreResult<LifecycleItem> {
        self.transition_received(id, move |current| {
            current.mark_defective(now).map_err(StoreError::from)
        })
        .await
        .map(|t| t.after)
    }

    #[instrument(skip(self, details), fields(item_id = %id), err)]
    async fn edit_details(
        &self,
        id: LifecycleItemId,
        details: LifecycleDetails,
    ) -> StoreResult<LifecycleItem> {
        self.transition_received(id, move |current| {
            current.edited(details).map_err(StoreError::from)
        })
        .await
        .map(|t| t.after)
    }

    #[instrument(skip(self, primary, additional), fields(item_id = %id), err)]
    async fn add_photos(
        &self,
        id: LifecycleItemId,
        primary: Option<String>,
        additional: Vec<String>,
    ) -> StoreResult<Transition> {
        self.transition_received(id, move |current| {
            let mut next = current.clone();
            next.photos = next
                .photos
                .replace_primary(primary)
                .merge_new_uploads(additional);
            Ok(next)
        })
        .await
    }

    #[instrument(skip(self), fields(item_id = %id, status = %status), err)]
    async fn delete_lifecycle_item(
        &self,
        status: LifecycleStatus,
        id: LifecycleItemId,
    ) -> StoreResult<Option<LifecycleItem>> {
        let row = sqlx::query(&format!(
            "DELETE FROM lifecycle_items WHERE id = $1 AND status = $2 RETURNING {LIFECYCLE_COLUMNS}"
        ))
        .bind(id.get())
        .bind(status.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_lifecycle_item", e))?;

        row.map(|r| lifecycle_from_row("delete_lifecycle_item", &r))
            .transpose()
    }
}

#[async_trait]
impl ToolRepository for PostgresStore {
    #[instrument(skip(self, input), err)]
    async fn create_tool(&self, input: ToolInput) -> StoreResult<ToolWrite> {
        let input = input.validated()?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO tools (name, supplier, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (name, supplier) DO NOTHING
            RETURNING id, name, supplier, quantity
            "#,
        )
        .bind(&input.name)
        .bind(&input.supplier)
        .bind(input.quantity)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_tool", e))?;

        if let Some(row) = inserted {
            return Ok(ToolWrite::Created(decode::<ToolRow>("insert_tool", &row)?.into()));
        }

        let existing = sqlx::query(
            "SELECT id, name, supplier, quantity FROM tools WHERE name = $1 AND supplier = $2",
        )
        .bind(&input.name)
        .bind(&input.supplier)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("existing_tool", e))?;

        match existing {
            Some(row) => Ok(ToolWrite::Existing(
                decode::<ToolRow>("existing_tool", &row)?.into(),
            )),
            None => Err(conflict("matching tool changed during insert")),
        }
    }

    #[instrument(skip(self), err)]
    async fn list_tools(&self) -> StoreResult<Vec<Tool>> {
        let rows =
            sqlx::query("SELECT id, name, supplier, quantity FROM tools ORDER BY name ASC, id ASC")
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("list_tools", e))?;

        rows.iter()
            .map(|r| decode::<ToolRow>("list_tools", r).map(Tool::from))
            .collect()
    }

    #[instrument(skip(self, input), fields(tool_id = %id), err)]
    async fn update_tool(&self, id: ToolId, input: ToolInput) -> StoreResult<Tool> {
        let input = input.validated()?;
        let row = sqlx::query(
            r#"
            UPDATE tools SET name = $2, supplier = $3, quantity = $4
            WHERE id = $1
            RETURNING id, name, supplier, quantity
            "#,
        )
        .bind(id.get())
        .bind(&input.name)
        .bind(&input.supplier)
        .bind(input.quantity)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                duplicate_tool().into()
            } else {
                map_sqlx_error("update_tool", e)
            }
        })?;

        match row {
            Some(row) => Ok(decode::<ToolRow>("update_tool", &row)?.into()),
            None => Err(tool_not_found(id)),
        }
    }

    #[instrument(skip(self), fields(tool_id = %id), err)]
    async fn delete_tool(&self, id: ToolId) -> StoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM tools WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_tool", e))?
            .rows_affected();
        Ok(deleted > 0)
    }
}

#[async_trait]
impl NotificationRepository for PostgresStore {
    async fn latest_notification_at(&self) -> StoreResult<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT MAX(notification_date) AS latest FROM stock_notifications")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("latest_notification_at", e))?;
        get(&row, "latest", "latest_notification_at")
    }

    #[instrument(skip(self, record), fields(items_count = record.items_count()), err)]
    async fn append_notification(
        &self,
        record: NewNotificationRecord,
    ) -> StoreResult<NotificationRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO stock_notifications (notification_date, items_count, items_data)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(record.notification_date)
        .bind(record.items_count())
        .bind(Json(&record.items))
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("append_notification", e))?;

        let id: i64 = get(&row, "id", "append_notification")?;
        Ok(record.into_record(NotificationId::new(id)))
    }

    async fn list_notifications(&self) -> StoreResult<Vec<NotificationRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, notification_date, items_count, items_data
            FROM stock_notifications
            ORDER BY notification_date DESC, id DESC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_notifications", e))?;

        rows.iter()
            .map(|row| -> StoreResult<NotificationRecord> {
                let Json(items): Json<Vec<ItemSnapshot>> = get(row, "items_data", "list_notifications")?;
                Ok(NotificationRecord {
                    id: NotificationId::new(get(row, "id", "list_notifications")?),
                    notification_date: get(row, "notification_date", "list_notifications")?,
                    items_count: get(row, "items_count", "list_notifications")?,
                    items,
                })
            })
            .collect()
    }
}

const UNIQUE_VIOLATION: &str = "23505";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
    )
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                conflict(format!("{operation}: a matching record already exists"))
            }
            _ => StoreError::Persistence(format!(
                "database error in {}: {}",
                operation,
                db_err.message()
            )),
        },
        sqlx::Error::PoolClosed => {
            StoreError::Persistence(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Persistence(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str, operation: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column).map_err(|e| map_sqlx_error(operation, e))
}

fn decode<'r, T>(operation: &str, row: &'r PgRow) -> StoreResult<T>
where
    T: FromRow<'r, PgRow>,
{
    T::from_row(row).map_err(|e| map_sqlx_error(operation, e))
}

fn lifecycle_from_row(operation: &str, row: &PgRow) -> StoreResult<LifecycleItem> {
    decode::<LifecycleRow>(operation, row)?.try_into()
}

// SQLx row types

#[derive(Debug)]
struct ItemRow {
    id: i64,
    material: String,
    supplier: String,
    category: String,
    stock: i64,
    threshold: i64,
    price: Option<Decimal>,
}

impl<'r> FromRow<'r, PgRow> for ItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            id: row.try_get("id")?,
            material: row.try_get("material")?,
            supplier: row.try_get("supplier")?,
            category: row.try_get("category")?,
            stock: row.try_get("stock")?,
            threshold: row.try_get("threshold")?,
            price: row.try_get("price")?,
        })
    }
}

impl From<ItemRow> for InventoryItem {
    fn from(row: ItemRow) -> Self {
        InventoryItem {
            id: InventoryItemId::new(row.id),
            material: row.material,
            supplier: row.supplier,
            category: row.category,
            stock: row.stock,
            threshold: row.threshold,
            price: row.price,
        }
    }
}

#[derive(Debug)]
struct OrderRow {
    id: i64,
    inventory_id: i64,
    ordered_quantity: i64,
    ordered_date: DateTime<Utc>,
    is_ordered: bool,
}

impl<'r> FromRow<'r, PgRow> for OrderRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderRow {
            id: row.try_get("id")?,
            inventory_id: row.try_get("inventory_id")?,
            ordered_quantity: row.try_get("ordered_quantity")?,
            ordered_date: row.try_get("ordered_date")?,
            is_ordered: row.try_get("is_ordered")?,
        })
    }
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: OrderId::new(row.id),
            inventory_id: InventoryItemId::new(row.inventory_id),
            ordered_quantity: row.ordered_quantity,
            ordered_date: row.ordered_date,
            is_ordered: row.is_ordered,
        }
    }
}

#[derive(Debug)]
struct ToolRow {
    id: i64,
    name: String,
    supplier: String,
    quantity: i64,
}

impl<'r> FromRow<'r, PgRow> for ToolRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ToolRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            supplier: row.try_get("supplier")?,
            quantity: row.try_get("quantity")?,
        })
    }
}

impl From<ToolRow> for Tool {
    fn from(row: ToolRow) -> Self {
        Tool {
            id: ToolId::new(row.id),
            name: row.name,
            supplier: row.supplier,
            quantity: row.quantity,
        }
    }
}

#[derive(Debug)]
struct LifecycleRow {
    id: i64,
    status: String,
    product: String,
    supplier: String,
    client: String,
    date: NaiveDate,
    photo_path: Option<String>,
    additional_photos: Option<String>,
    quantity: i64,
    received_id: Option<i64>,
    installed_date: Option<DateTime<Utc>>,
    defective_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for LifecycleRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(LifecycleRow {
            id: row.try_get("id")?,
            status: row.try_get("status")?,
            product: row.try_get("product")?,
            supplier: row.try_get("supplier")?,
            client: row.try_get("client")?,
            date: row.try_get("date")?,
            photo_path: row.try_get("photo_path")?,
            additional_photos: row.try_get("additional_photos")?,
            quantity: row.try_get("quantity")?,
            received_id: row.try_get("received_id")?,
            installed_date: row.try_get("installed_date")?,
            defective_date: row.try_get("defective_date")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<LifecycleRow> for LifecycleItem {
    type Error = StoreError;

    fn try_from(row: LifecycleRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<LifecycleStatus>().map_err(|e| {
            StoreError::Persistence(format!("invalid status on lifecycle item {}: {e}", row.id))
        })?;
        Ok(LifecycleItem {
            id: LifecycleItemId::new(row.id),
            status,
            product: row.product,
            supplier: row.supplier,
            client: row.client,
            date: row.date,
            photos: PhotoSet::new(
                row.photo_path,
                PhotoSet::decode_additional(row.additional_photos.as_deref()),
            ),
            quantity: row.quantity,
            received_id: row.received_id.map(LifecycleItemId::new),
            installed_date: row.installed_date,
            defective_date: row.defective_date,
            created_at: row.created_at,
        })
    }
}
