use async_trait::async_trait;
use common::{
    AddressId, BusinessId, CustomerId, NoteId, OrderId, OrderLineItemId, ProductId,
    ShippingZoneId, VariantId,
};
use domain::{
    DiscountMode, Money, Order, OrderLineItem, OrderNote, OrderStatus, PaymentMethod,
    PaymentStatus, StageTimestamps, Variant,
};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{OrderStore, StoreTransaction, TransactionOptions, is_valid_savepoint_name},
};

const ORDER_COLUMNS: &str = "id, business_id, order_number, customer_id, shipping_address_id, \
    shipping_zone_id, channel, currency, subtotal, vat, vat_rate, shipping_fee, discount, \
    discount_mode, discount_value, cogs, total, status, payment_status, payment_method, \
    payment_reference, placed_at, ready_for_shipment_at, shipped_at, fulfilled_at, \
    cancelled_at, returned_at, paid_at, failed_at, refunded_at, ordered_at, created_at, \
    updated_at";

const VARIANT_COLUMNS: &str =
    "id, product_id, business_id, currency, unit_price, unit_cost, stock_quantity";

/// PostgreSQL-backed order store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces a variant outside of any order transaction.
    pub async fn insert_variant(&self, variant: &Variant) -> Result<()> {
        sqlx::query(
            "INSERT INTO variants (id, product_id, business_id, currency, unit_price, unit_cost, stock_quantity) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET product_id = EXCLUDED.product_id, \
             business_id = EXCLUDED.business_id, currency = EXCLUDED.currency, \
             unit_price = EXCLUDED.unit_price, unit_cost = EXCLUDED.unit_cost, \
             stock_quantity = EXCLUDED.stock_quantity",
        )
        .bind(variant.id.as_uuid())
        .bind(variant.product_id.as_uuid())
        .bind(variant.business_id.as_uuid())
        .bind(&variant.currency)
        .bind(variant.unit_price.to_decimal())
        .bind(variant.unit_cost.to_decimal())
        .bind(variant.stock_quantity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn begin(&self, options: TransactionOptions) -> Result<Box<dyn StoreTransaction>> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "SET TRANSACTION ISOLATION LEVEL {}",
            options.isolation.as_sql()
        );
        sqlx::query(&sql).execute(&mut *tx).await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn get_variant(
        &self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Option<Variant>> {
        let mut conn = self.pool.acquire().await?;
        fetch_variant(&mut conn, business_id, variant_id, false).await
    }

    async fn find_order(
        &self,
        business_id: BusinessId,
        order_id: OrderId,
    ) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE id = $1 AND business_id = $2 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .bind(business_id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
        match row {
            Some(row) => Ok(Some(load_children(&mut conn, row_to_order(&row)?).await?)),
            None => Ok(None),
        }
    }

    async fn find_order_by_number(
        &self,
        business_id: BusinessId,
        order_number: &str,
    ) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE business_id = $1 AND order_number = $2 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(business_id.as_uuid())
            .bind(order_number)
            .fetch_optional(&mut *conn)
            .await?;
        match row {
            Some(row) => Ok(Some(load_children(&mut conn, row_to_order(&row)?).await?)),
            None => Ok(None),
        }
    }
}

/// Transaction over a [`PostgresStore`].
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    async fn execute_savepoint_command(&mut self, command: &str, name: &str) -> Result<()> {
        if !is_valid_savepoint_name(name) {
            return Err(StoreError::InvalidSavepoint(name.to_string()));
        }
        let sql = format!("{command} {name}");
        sqlx::query(&sql).execute(&mut *self.tx).await?;
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn savepoint(&mut self, name: &str) -> Result<()> {
        self.execute_savepoint_command("SAVEPOINT", name).await
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        self.execute_savepoint_command("ROLLBACK TO SAVEPOINT", name)
            .await
    }

    async fn release_savepoint(&mut self, name: &str) -> Result<()> {
        self.execute_savepoint_command("RELEASE SAVEPOINT", name)
            .await
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let sql = format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, \
             $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, \
             $26, $27, $28, $29, $30, $31, $32, $33)"
        );
        bind_order(sqlx::query(&sql), order)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        // Column 1 (id) is the key; the rest are rewritten in column order.
        let columns = ORDER_COLUMNS
            .split(',')
            .map(str::trim)
            .skip(1)
            .collect::<Vec<_>>()
            .join(", ");
        let values = (2..=33)
            .map(|n| format!("${n}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE orders SET ({columns}) = ({values}) WHERE id = $1 AND deleted_at IS NULL"
        );
        let result = bind_order(sqlx::query(&sql), order)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }
        Ok(())
    }

    async fn lock_order(
        &mut self,
        business_id: BusinessId,
        order_id: OrderId,
    ) -> Result<Option<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE id = $1 AND business_id = $2 AND deleted_at IS NULL FOR UPDATE"
        );
        let row = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .bind(business_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        match row {
            Some(row) => Ok(Some(load_children(&mut self.tx, row_to_order(&row)?).await?)),
            None => Ok(None),
        }
    }

    async fn delete_order(&mut self, business_id: BusinessId, order_id: OrderId) -> Result<()> {
        sqlx::query(
            "UPDATE orders SET deleted_at = NOW() \
             WHERE id = $1 AND business_id = $2 AND deleted_at IS NULL",
        )
        .bind(order_id.as_uuid())
        .bind(business_id.as_uuid())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_line_items(&mut self, items: &[OrderLineItem]) -> Result<()> {
        for (position, item) in items.iter().enumerate() {
            let quantity = i32::try_from(item.quantity)
                .map_err(|_| StoreError::InvalidData(format!("quantity {}", item.quantity)))?;
            let position = i32::try_from(position)
                .map_err(|_| StoreError::InvalidData(format!("position {position}")))?;
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, variant_id, position, quantity,
                                         currency, unit_price, unit_cost, total, total_cost)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.order_id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(item.variant_id.as_uuid())
            .bind(position)
            .bind(quantity)
            .bind(&item.currency)
            .bind(item.unit_price.to_decimal())
            .bind(item.unit_cost.to_decimal())
            .bind(item.total.to_decimal())
            .bind(item.total_cost.to_decimal())
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn delete_line_items(&mut self, order_id: OrderId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_note(&mut self, note: &OrderNote) -> Result<()> {
        sqlx::query(
            "INSERT INTO order_notes (id, order_id, content, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(note.id.as_uuid())
        .bind(note.order_id.as_uuid())
        .bind(&note.content)
        .bind(note.created_at)
        .bind(note.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_note(&mut self, note: &OrderNote) -> Result<()> {
        sqlx::query(
            "UPDATE order_notes SET content = $3, updated_at = $4 WHERE id = $1 AND order_id = $2",
        )
        .bind(note.id.as_uuid())
        .bind(note.order_id.as_uuid())
        .bind(&note.content)
        .bind(note.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_note(
        &mut self,
        order_id: OrderId,
        note_id: NoteId,
    ) -> Result<Option<OrderNote>> {
        let row = sqlx::query(
            "SELECT id, order_id, content, created_at, updated_at FROM order_notes \
             WHERE id = $1 AND order_id = $2",
        )
        .bind(note_id.as_uuid())
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(row_to_note).transpose()
    }

    async fn delete_note(&mut self, order_id: OrderId, note_id: NoteId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM order_notes WHERE id = $1 AND order_id = $2")
            .bind(note_id.as_uuid())
            .bind(order_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_variant(
        &mut self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Option<Variant>> {
        fetch_variant(&mut self.tx, business_id, variant_id, false).await
    }

    async fn lock_variant(
        &mut self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Option<Variant>> {
        fetch_variant(&mut self.tx, business_id, variant_id, true).await
    }

    async fn set_variant_stock(
        &mut self,
        variant_id: VariantId,
        stock_quantity: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE variants SET stock_quantity = $2 WHERE id = $1")
            .bind(variant_id.as_uuid())
            .bind(stock_quantity)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Binds every order column in `ORDER_COLUMNS` order.
fn bind_order<'q>(
    query: Query<'q, Postgres, PgArguments>,
    order: &'q Order,
) -> Query<'q, Postgres, PgArguments> {
    let ts = &order.timestamps;
    query
        .bind(order.id.as_uuid())
        .bind(order.business_id.as_uuid())
        .bind(&order.order_number)
        .bind(order.customer_id.as_uuid())
        .bind(order.shipping_address_id.as_uuid())
        .bind(order.shipping_zone_id.map(|id| id.as_uuid()))
        .bind(&order.channel)
        .bind(&order.currency)
        .bind(order.subtotal.to_decimal())
        .bind(order.vat.to_decimal())
        .bind(order.vat_rate)
        .bind(order.shipping_fee.to_decimal())
        .bind(order.discount.to_decimal())
        .bind(order.discount_mode.map(|m| m.as_str()))
        .bind(order.discount_value)
        .bind(order.cogs.to_decimal())
        .bind(order.total.to_decimal())
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.payment_method.as_str())
        .bind(&order.payment_reference)
        .bind(ts.placed_at)
        .bind(ts.ready_for_shipment_at)
        .bind(ts.shipped_at)
        .bind(ts.fulfilled_at)
        .bind(ts.cancelled_at)
        .bind(ts.returned_at)
        .bind(ts.paid_at)
        .bind(ts.failed_at)
        .bind(ts.refunded_at)
        .bind(order.ordered_at)
        .bind(order.created_at)
        .bind(order.updated_at)
}

async fn fetch_variant(
    conn: &mut PgConnection,
    business_id: BusinessId,
    variant_id: VariantId,
    for_update: bool,
) -> Result<Option<Variant>> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!(
        "SELECT {VARIANT_COLUMNS} FROM variants WHERE id = $1 AND business_id = $2{lock}"
    );
    let row = sqlx::query(&sql)
        .bind(variant_id.as_uuid())
        .bind(business_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_variant).transpose()
}

/// Attaches line items and notes to an order.
async fn load_children(conn: &mut PgConnection, mut order: Order) -> Result<Order> {
    let items = sqlx::query(
        r#"
        SELECT id, order_id, product_id, variant_id, quantity, currency,
               unit_price, unit_cost, total, total_cost
        FROM order_items
        WHERE order_id = $1
        ORDER BY position ASC
        "#,
    )
    .bind(order.id.as_uuid())
    .fetch_all(&mut *conn)
    .await?;
    order.items = items
        .iter()
        .map(row_to_line_item)
        .collect::<Result<Vec<_>>>()?;

    let notes = sqlx::query(
        "SELECT id, order_id, content, created_at, updated_at FROM order_notes \
         WHERE order_id = $1 ORDER BY created_at ASC",
    )
    .bind(order.id.as_uuid())
    .fetch_all(&mut *conn)
    .await?;
    order.notes = notes.iter().map(row_to_note).collect::<Result<Vec<_>>>()?;
    Ok(order)
}

fn money(row: &PgRow, column: &str) -> Result<Money> {
    let value: Decimal = row.try_get(column)?;
    Money::from_decimal(value).ok_or_else(|| StoreError::InvalidData(format!("{column} {value}")))
}

fn parsed<T>(row: &PgRow, column: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e: T::Err| StoreError::InvalidData(format!("{column}: {e}")))
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let discount_mode = row
        .try_get::<Option<String>, _>("discount_mode")?
        .map(|raw| {
            raw.parse::<DiscountMode>()
                .map_err(StoreError::InvalidData)
        })
        .transpose()?;

    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        business_id: BusinessId::from_uuid(row.try_get::<Uuid, _>("business_id")?),
        order_number: row.try_get("order_number")?,
        customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        shipping_address_id: AddressId::from_uuid(
            row.try_get::<Uuid, _>("shipping_address_id")?,
        ),
        shipping_zone_id: row
            .try_get::<Option<Uuid>, _>("shipping_zone_id")?
            .map(ShippingZoneId::from_uuid),
        channel: row.try_get("channel")?,
        currency: row.try_get("currency")?,
        subtotal: money(row, "subtotal")?,
        vat: money(row, "vat")?,
        vat_rate: row.try_get("vat_rate")?,
        shipping_fee: money(row, "shipping_fee")?,
        discount: money(row, "discount")?,
        discount_mode,
        discount_value: row.try_get("discount_value")?,
        cogs: money(row, "cogs")?,
        total: money(row, "total")?,
        status: parsed::<OrderStatus>(row, "status")?,
        payment_status: parsed::<PaymentStatus>(row, "payment_status")?,
        payment_method: parsed::<PaymentMethod>(row, "payment_method")?,
        payment_reference: row.try_get("payment_reference")?,
        timestamps: StageTimestamps {
            placed_at: row.try_get("placed_at")?,
            ready_for_shipment_at: row.try_get("ready_for_shipment_at")?,
            shipped_at: row.try_get("shipped_at")?,
            fulfilled_at: row.try_get("fulfilled_at")?,
            cancelled_at: row.try_get("cancelled_at")?,
            returned_at: row.try_get("returned_at")?,
            paid_at: row.try_get("paid_at")?,
            failed_at: row.try_get("failed_at")?,
            refunded_at: row.try_get("refunded_at")?,
        },
        ordered_at: row.try_get("ordered_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        items: Vec::new(),
        notes: Vec::new(),
    })
}

fn row_to_line_item(row: &PgRow) -> Result<OrderLineItem> {
    let quantity: i32 = row.try_get("quantity")?;
    Ok(OrderLineItem {
        id: OrderLineItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        variant_id: VariantId::from_uuid(row.try_get::<Uuid, _>("variant_id")?),
        quantity: u32::try_from(quantity)
            .map_err(|_| StoreError::InvalidData(format!("quantity {quantity}")))?,
        currency: row.try_get("currency")?,
        unit_price: money(row, "unit_price")?,
        unit_cost: money(row, "unit_cost")?,
        total: money(row, "total")?,
        total_cost: money(row, "total_cost")?,
    })
}

fn row_to_note(row: &PgRow) -> Result<OrderNote> {
    Ok(OrderNote {
        id: NoteId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_variant(row: &PgRow) -> Result<Variant> {
    Ok(Variant {
        id: VariantId::from_uuid(row.try_get::<Uuid, _>("id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        business_id: BusinessId::from_uuid(row.try_get::<Uuid, _>("business_id")?),
        currency: row.try_get("currency")?,
        unit_price: money(row, "unit_price")?,
        unit_cost: money(row, "unit_cost")?,
        stock_quantity: row.try_get("stock_quantity")?,
    })
}
