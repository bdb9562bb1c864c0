use chrono::{DateTime, Utc};
use log::{debug, trace};
use opg_common::Money;
use sqlx::{FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{
        CancellationRecord,
        NewOrder,
        Order,
        OrderId,
        OrderItem,
        OrderStatus,
        PaymentInfo,
        PaymentMethod,
        PaymentStatus,
        TrackingEvent,
        TrackingStatus,
    },
    traits::OrderStoreError,
};

#[derive(FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: String,
    payment_method: String,
    payment_status: String,
    status: String,
    shipping_address: String,
    items_price: Money,
    shipping_price: Money,
    tax_price: Money,
    total_price: Money,
    is_delivered: bool,
    delivered_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

#[derive(FromRow)]
struct ItemRow {
    product_id: String,
    name: String,
    price: Money,
    qty: i64,
    image: Option<String>,
    selected_size: Option<String>,
}

#[derive(FromRow)]
struct TrackingRow {
    status: String,
    message: String,
    location: String,
    metadata: String,
    timestamp: DateTime<Utc>,
}

#[derive(FromRow)]
struct CancellationRow {
    state: String,
    requested_at: DateTime<Utc>,
    reason: String,
    message: String,
    contact: String,
    previous_status: String,
    processed_at: Option<DateTime<Utc>>,
    processed_by: Option<String>,
    refund_amount: Money,
    refund_initiated: bool,
    refund_id: Option<String>,
    refund_attempts: i64,
    last_refund_error: Option<String>,
}

impl TryFrom<ItemRow> for OrderItem {
    type Error = OrderStoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let selected_size = row.selected_size.map(|s| serde_json::from_str(&s)).transpose()?;
        Ok(Self {
            product_id: row.product_id,
            name: row.name,
            price: row.price,
            qty: row.qty,
            image: row.image,
            selected_size,
        })
    }
}

impl TryFrom<TrackingRow> for TrackingEvent {
    type Error = OrderStoreError;

    fn try_from(row: TrackingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: row.status.parse::<TrackingStatus>()?,
            message: row.message,
            location: row.location,
            metadata: serde_json::from_str(&row.metadata)?,
            timestamp: row.timestamp,
        })
    }
}

impl TryFrom<CancellationRow> for CancellationRecord {
    type Error = OrderStoreError;

    fn try_from(row: CancellationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            state: row.state.parse()?,
            requested_at: row.requested_at,
            reason: row.reason,
            message: row.message,
            contact: row.contact,
            previous_status: row.previous_status.parse::<OrderStatus>()?,
            processed_at: row.processed_at,
            processed_by: row.processed_by,
            refund_amount: row.refund_amount,
            refund_initiated: row.refund_initiated,
            refund_id: row.refund_id,
            refund_attempts: row.refund_attempts,
            last_refund_error: row.last_refund_error,
        })
    }
}

/// Inserts a new order into the database using the given connection. This is not atomic. Embed this call inside a
/// transaction (and pass `&mut tx` as the connection argument) so that the items, payment references and the first
/// tracking event are written together with the order.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderStoreError> {
    let id = OrderId::random();
    let address = serde_json::to_string(&order.shipping_address)?;
    sqlx::query(
        r#"
            INSERT INTO orders (
                id,
                user_id,
                payment_method,
                payment_status,
                status,
                shipping_address,
                items_price,
                shipping_price,
                tax_price,
                total_price,
                paid_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12);
        "#,
    )
    .bind(id.as_str())
    .bind(&order.user_id)
    .bind(order.payment_method.as_str())
    .bind(order.payment_status.as_str())
    .bind(OrderStatus::Ordered.as_str())
    .bind(address)
    .bind(order.items_price)
    .bind(order.shipping_price)
    .bind(order.tax_price)
    .bind(order.total_price)
    .bind(order.paid_at)
    .bind(order.created_at)
    .execute(&mut *conn)
    .await?;
    insert_items(&id, &order.items, conn).await?;
    if let Some(info) = &order.payment_info {
        insert_payment_info(&id, info, conn).await?;
    }
    let first_event = TrackingEvent::new(TrackingStatus::Ordered, order.initial_message.as_str(), order.created_at);
    append_tracking_events(&id, 0, &[first_event], conn).await?;
    debug!("🗃️ Order {id} inserted for user {}", order.user_id);
    fetch_order_by_id(&id, conn).await?.ok_or(OrderStoreError::OrderNotFound(id))
}

async fn insert_items(id: &OrderId, items: &[OrderItem], conn: &mut SqliteConnection) -> Result<(), OrderStoreError> {
    for (position, item) in items.iter().enumerate() {
        let size = item.selected_size.as_ref().map(serde_json::to_string).transpose()?;
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, position, product_id, name, price, qty, image, selected_size)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id.as_str())
        .bind(position as i64)
        .bind(&item.product_id)
        .bind(&item.name)
        .bind(item.price)
        .bind(item.qty)
        .bind(&item.image)
        .bind(size)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn insert_payment_info(
    id: &OrderId,
    info: &PaymentInfo,
    conn: &mut SqliteConnection,
) -> Result<(), OrderStoreError> {
    let result =
        sqlx::query("INSERT INTO payment_info (order_id, intent_id, capture_id, signature) VALUES ($1, $2, $3, $4)")
            .bind(id.as_str())
            .bind(&info.intent_id)
            .bind(&info.capture_id)
            .bind(&info.signature)
            .execute(conn)
            .await;
    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(OrderStoreError::DuplicateCapture {
            intent_id: info.intent_id.clone(),
            capture_id: info.capture_id.clone(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Appends tracking events to the timeline of the given order. `first_seq` is the sequence number of the first event
/// in `events`, which must equal the number of events already stored for the order.
pub async fn append_tracking_events(
    id: &OrderId,
    first_seq: usize,
    events: &[TrackingEvent],
    conn: &mut SqliteConnection,
) -> Result<(), OrderStoreError> {
    for (i, event) in events.iter().enumerate() {
        let metadata = serde_json::to_string(&event.metadata)?;
        let seq = (first_seq + i) as i64;
        sqlx::query(
            r#"
            INSERT INTO tracking_events (order_id, seq, status, message, location, metadata, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id.as_str())
        .bind(seq)
        .bind(event.status.as_str())
        .bind(&event.message)
        .bind(&event.location)
        .bind(metadata)
        .bind(event.timestamp)
        .execute(&mut *conn)
        .await?;
        trace!("🗃️ Tracking event #{seq} ({}) appended to order {id}", event.status);
    }
    Ok(())
}

pub async fn count_tracking_events(id: &OrderId, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM tracking_events WHERE order_id = $1").bind(id.as_str()).fetch_one(conn).await
}

/// Writes the mutable order columns and bumps the version, but only if the stored version still matches
/// `order.version`. Returns `false` if no row was updated.
pub async fn update_order(
    order: &Order,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            payment_status = $1,
            status = $2,
            is_delivered = $3,
            delivered_at = $4,
            paid_at = $5,
            updated_at = $6,
            version = version + 1
        WHERE id = $7 AND version = $8
        "#,
    )
    .bind(order.payment_status.as_str())
    .bind(order.status.as_str())
    .bind(order.is_delivered)
    .bind(order.delivered_at)
    .bind(order.paid_at)
    .bind(now)
    .bind(order.id.as_str())
    .bind(order.version)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn upsert_cancellation(
    id: &OrderId,
    record: &CancellationRecord,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO cancellations (
            order_id,
            state,
            requested_at,
            reason,
            message,
            contact,
            previous_status,
            processed_at,
            processed_by,
            refund_amount,
            refund_initiated,
            refund_id,
            refund_attempts,
            last_refund_error
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (order_id) DO UPDATE SET
            state = excluded.state,
            processed_at = excluded.processed_at,
            processed_by = excluded.processed_by,
            refund_amount = excluded.refund_amount,
            refund_initiated = excluded.refund_initiated,
            refund_id = excluded.refund_id,
            refund_attempts = excluded.refund_attempts,
            last_refund_error = excluded.last_refund_error
        "#,
    )
    .bind(id.as_str())
    .bind(record.state.as_str())
    .bind(record.requested_at)
    .bind(&record.reason)
    .bind(&record.message)
    .bind(&record.contact)
    .bind(record.previous_status.as_str())
    .bind(record.processed_at)
    .bind(&record.processed_by)
    .bind(record.refund_amount)
    .bind(record.refund_initiated)
    .bind(&record.refund_id)
    .bind(record.refund_attempts)
    .bind(&record.last_refund_error)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn order_exists(id: &OrderId, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE id = $1").bind(id.as_str()).fetch_one(conn).await?;
    Ok(count > 0)
}

/// Loads the full order document: the order row plus items, payment references, tracking timeline and cancellation.
pub async fn fetch_order_by_id(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, OrderStoreError> {
    let row: Option<OrderRow> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id.as_str()).fetch_optional(&mut *conn).await?;
    match row {
        Some(row) => Ok(Some(hydrate(row, conn).await?)),
        None => Ok(None),
    }
}

pub async fn fetch_order_id_by_capture(
    intent_id: &str,
    capture_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderId>, sqlx::Error> {
    sqlx::query_scalar("SELECT order_id FROM payment_info WHERE intent_id = $1 AND capture_id = $2")
        .bind(intent_id)
        .bind(capture_id)
        .fetch_optional(conn)
        .await
}

async fn hydrate(row: OrderRow, conn: &mut SqliteConnection) -> Result<Order, OrderStoreError> {
    let id = row.id;
    let items: Vec<ItemRow> = sqlx::query_as(
        "SELECT product_id, name, price, qty, image, selected_size FROM order_items WHERE order_id = $1 ORDER BY \
         position ASC",
    )
    .bind(id.as_str())
    .fetch_all(&mut *conn)
    .await?;
    let items = items.into_iter().map(OrderItem::try_from).collect::<Result<Vec<_>, _>>()?;
    let tracking: Vec<TrackingRow> = sqlx::query_as(
        "SELECT status, message, location, metadata, timestamp FROM tracking_events WHERE order_id = $1 ORDER BY seq \
         ASC",
    )
    .bind(id.as_str())
    .fetch_all(&mut *conn)
    .await?;
    let tracking = tracking.into_iter().map(TrackingEvent::try_from).collect::<Result<Vec<_>, _>>()?;
    let payment_info: Option<PaymentInfo> =
        sqlx::query_as("SELECT intent_id, capture_id, signature FROM payment_info WHERE order_id = $1")
            .bind(id.as_str())
            .fetch_optional(&mut *conn)
            .await?;
    let cancellation: Option<CancellationRow> = sqlx::query_as("SELECT * FROM cancellations WHERE order_id = $1")
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    let cancellation = cancellation.map(CancellationRecord::try_from).transpose()?;
    Ok(Order {
        id,
        user_id: row.user_id,
        items,
        shipping_address: serde_json::from_str(&row.shipping_address)?,
        payment_method: row.payment_method.parse::<PaymentMethod>()?,
        payment_status: row.payment_status.parse::<PaymentStatus>()?,
        payment_info,
        status: row.status.parse::<OrderStatus>()?,
        tracking,
        cancellation,
        items_price: row.items_price,
        shipping_price: row.shipping_price,
        tax_price: row.tax_price,
        total_price: row.total_price,
        is_delivered: row.is_delivered,
        delivered_at: row.delivered_at,
        paid_at: row.paid_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
        version: row.version,
    })
}

#[derive(Debug, Clone, Default)]
pub struct OrderQueryFilter {
    user_id: Option<String>,
    statuses: Vec<OrderStatus>,
    pending_refund: bool,
}

impl OrderQueryFilter {
    pub fn with_user_id<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.statuses.push(status);
        self
    }

    /// Restricts the results to approved cancellations on paid online orders that still await a refund.
    pub fn with_pending_refund(mut self) -> Self {
        self.pending_refund = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.statuses.is_empty() && !self.pending_refund
    }
}

/// Fetches orders according to the criteria in the `OrderQueryFilter`.
///
/// Resulting orders are sorted most-recent first.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, OrderStoreError> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if !query.statuses.is_empty() {
        where_clause.push("status IN (");
        for (i, status) in query.statuses.iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status.as_str());
        }
        where_clause.push_unseparated(")");
    }
    if query.pending_refund {
        where_clause.push("payment_method = 'ONLINE' AND payment_status = 'Paid'");
        where_clause.push(
            "id IN (SELECT order_id FROM cancellations WHERE state = 'Approved' AND refund_initiated = FALSE)",
        );
    }
    builder.push(" ORDER BY created_at DESC, rowid DESC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let rows: Vec<OrderRow> = builder.build_query_as().fetch_all(&mut *conn).await?;
    trace!("🗃️ Result of search_orders: {}", rows.len());
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        orders.push(hydrate(row, conn).await?);
    }
    Ok(orders)
}
