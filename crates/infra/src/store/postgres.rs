//! Postgres-backed store.
//!
//! One table per collection. Order items and customers are kept as `JSONB`
//! snapshots on the order row, since they are never queried on their own.
//!
//! ## Error mapping
//!
//! | SQLx error | Code | StoreError |
//! |---|---|---|
//! | unique violation | `23505` | `Duplicate` |
//! | any other database error | | `Backend` |
//! | pool closed, IO, protocol | | `Backend` |
//! | undecodable column | | `Corrupt` |

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{info, instrument};

use flame_auth::{Role, User};
use flame_catalog::{Category, Product, Review};
use flame_core::{NotificationId, OrderId, PaymentId, ProductId, ReviewId, UserId};
use flame_notifications::{Notification, NotificationKind, Priority, RelatedRef};
use flame_sales::{
    BillNumber, Customer, Order, OrderItem, OrderStatus, Payment, PaymentCustomer, PaymentMethod,
    PaymentStatus,
};

use super::{
    NotificationRepo, OrderRepo, PaymentRepo, ProductRepo, Reservation, Restock, ReviewRepo, StoreError,
    StoreResult, UserRepo,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    brand TEXT,
    category TEXT NOT NULL,
    image_url TEXT,
    description TEXT,
    price DOUBLE PRECISION NOT NULL,
    discount_percent DOUBLE PRECISION NOT NULL,
    discount_amount DOUBLE PRECISION NOT NULL,
    final_price DOUBLE PRECISION NOT NULL,
    stock BIGINT NOT NULL,
    rating DOUBLE PRECISION NOT NULL,
    total_sold BIGINT NOT NULL,
    review_count BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE SEQUENCE IF NOT EXISTS bill_number_seq;

CREATE TABLE IF NOT EXISTS orders (
    id UUID PRIMARY KEY,
    bill_number TEXT NOT NULL UNIQUE,
    customer JSONB NOT NULL,
    items JSONB NOT NULL,
    total_amount DOUBLE PRECISION NOT NULL,
    status TEXT NOT NULL,
    payment_method TEXT NOT NULL,
    payment_status TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS payments (
    id UUID PRIMARY KEY,
    order_id UUID NOT NULL,
    bill_number TEXT NOT NULL,
    customer JSONB NOT NULL,
    amount DOUBLE PRECISION NOT NULL,
    method TEXT NOT NULL,
    status TEXT NOT NULL,
    transaction_id TEXT,
    notes TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS payments_order_id_idx ON payments (order_id);

CREATE TABLE IF NOT EXISTS reviews (
    id UUID PRIMARY KEY,
    product_id UUID NOT NULL,
    customer_name TEXT NOT NULL,
    rating SMALLINT NOT NULL,
    comment TEXT,
    is_verified BOOLEAN NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS reviews_product_id_idx ON reviews (product_id);

CREATE TABLE IF NOT EXISTS notifications (
    id UUID PRIMARY KEY,
    kind TEXT NOT NULL,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    related_kind TEXT,
    related_id UUID,
    is_read BOOLEAN NOT NULL,
    priority TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY,
    full_name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    mobile TEXT,
    is_active BOOLEAN NOT NULL,
    last_login TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
"#;

/// Postgres store implementing every repository trait.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect and create any missing tables.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        info!("database schema ready");
        Ok(())
    }
}

fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Duplicate(format!("duplicate value in {operation}: {message}")),
                _ => StoreError::Backend { operation, message },
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend {
            operation,
            message: "connection pool closed".into(),
        },
        sqlx::Error::ColumnDecode { index, source } => {
            StoreError::Corrupt(format!("column {index} in {operation}: {source}"))
        }
        other => StoreError::Backend {
            operation,
            message: other.to_string(),
        },
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}

fn col<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn parsed<T: FromStr>(row: &PgRow, name: &str) -> StoreResult<T>
where
    T::Err: std::fmt::Display,
{
    let raw: String = col(row, name)?;
    raw.parse()
        .map_err(|e: T::Err| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn json_col<T: serde::de::DeserializeOwned>(row: &PgRow, name: &str) -> StoreResult<T> {
    let raw: serde_json::Value = col(row, name)?;
    serde_json::from_value(raw).map_err(|e| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> StoreResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn product_from_row(row: &PgRow) -> StoreResult<Product> {
    Ok(Product {
        id: ProductId::from_uuid(col(row, "id")?),
        name: col(row, "name")?,
        brand: col(row, "brand")?,
        category: parsed::<Category>(row, "category")?,
        image_url: col(row, "image_url")?,
        description: col(row, "description")?,
        price: col(row, "price")?,
        discount_percent: col(row, "discount_percent")?,
        discount_amount: col(row, "discount_amount")?,
        final_price: col(row, "final_price")?,
        stock: col(row, "stock")?,
        rating: col(row, "rating")?,
        total_sold: col(row, "total_sold")?,
        review_count: col(row, "review_count")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn order_from_row(row: &PgRow) -> StoreResult<Order> {
    Ok(Order {
        id: OrderId::from_uuid(col(row, "id")?),
        bill_number: BillNumber::from_stored(col::<String>(row, "bill_number")?),
        customer: json_col::<Customer>(row, "customer")?,
        items: json_col::<Vec<OrderItem>>(row, "items")?,
        total_amount: col(row, "total_amount")?,
        status: parsed::<OrderStatus>(row, "status")?,
        payment_method: parsed::<PaymentMethod>(row, "payment_method")?,
        payment_status: parsed::<PaymentStatus>(row, "payment_status")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn payment_from_row(row: &PgRow) -> StoreResult<Payment> {
    Ok(Payment {
        id: PaymentId::from_uuid(col(row, "id")?),
        order_id: OrderId::from_uuid(col(row, "order_id")?),
        bill_number: BillNumber::from_stored(col::<String>(row, "bill_number")?),
        customer: json_col::<PaymentCustomer>(row, "customer")?,
        amount: col(row, "amount")?,
        method: parsed::<PaymentMethod>(row, "method")?,
        status: parsed::<PaymentStatus>(row, "status")?,
        transaction_id: col(row, "transaction_id")?,
        notes: col(row, "notes")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn review_from_row(row: &PgRow) -> StoreResult<Review> {
    let rating: i16 = col(row, "rating")?;
    Ok(Review {
        id: ReviewId::from_uuid(col(row, "id")?),
        product_id: ProductId::from_uuid(col(row, "product_id")?),
        customer_name: col(row, "customer_name")?,
        rating: u8::try_from(rating).map_err(|_| StoreError::Corrupt(format!("review rating {rating}")))?,
        comment: col(row, "comment")?,
        is_verified: col(row, "is_verified")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn notification_from_row(row: &PgRow) -> StoreResult<Notification> {
    let related_kind: Option<String> = col(row, "related_kind")?;
    let related_id: Option<uuid::Uuid> = col(row, "related_id")?;
    let related = match (related_kind, related_id) {
        (Some(kind), Some(id)) => Some(
            RelatedRef::parse(&kind, &id.to_string()).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        ),
        _ => None,
    };
    Ok(Notification {
        id: NotificationId::from_uuid(col(row, "id")?),
        kind: parsed::<NotificationKind>(row, "kind")?,
        title: col(row, "title")?,
        message: col(row, "message")?,
        related,
        is_read: col(row, "is_read")?,
        priority: parsed::<Priority>(row, "priority")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    Ok(User {
        id: UserId::from_uuid(col(row, "id")?),
        full_name: col(row, "full_name")?,
        email: col(row, "email")?,
        password_hash: col(row, "password_hash")?,
        role: parsed::<Role>(row, "role")?,
        mobile: col(row, "mobile")?,
        is_active: col(row, "is_active")?,
        last_login: col(row, "last_login")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn rows<T>(rows: Vec<PgRow>, f: fn(&PgRow) -> StoreResult<T>) -> StoreResult<Vec<T>> {
    rows.iter().map(f).collect()
}

#[async_trait]
impl ProductRepo for PgStore {
    async fn insert(&self, p: &Product) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, brand, category, image_url, description, price, discount_percent,
                discount_amount, final_price, stock, rating, total_sold, review_count,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(p.id.as_uuid())
        .bind(&p.name)
        .bind(&p.brand)
        .bind(p.category.as_str())
        .bind(&p.image_url)
        .bind(&p.description)
        .bind(p.price)
        .bind(p.discount_percent)
        .bind(p.discount_amount)
        .bind(p.final_price)
        .bind(p.stock)
        .bind(p.rating)
        .bind(p.total_sold)
        .bind(p.review_count)
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn get(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query("SELECT * FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn list(&self) -> StoreResult<Vec<Product>> {
        let all = sqlx::query("SELECT * FROM products ORDER BY created_at")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;
        rows(all, product_from_row)
    }

    async fn update(&self, p: &Product) -> StoreResult<bool> {
        let done = sqlx::query(
            r#"
            UPDATE products SET
                name = $2, brand = $3, category = $4, image_url = $5, description = $6,
                price = $7, discount_percent = $8, discount_amount = $9, final_price = $10,
                stock = $11, rating = $12, total_sold = $13, review_count = $14, updated_at = $15
            WHERE id = $1
            "#,
        )
        .bind(p.id.as_uuid())
        .bind(&p.name)
        .bind(&p.brand)
        .bind(p.category.as_str())
        .bind(&p.image_url)
        .bind(&p.description)
        .bind(p.price)
        .bind(p.discount_percent)
        .bind(p.discount_amount)
        .bind(p.final_price)
        .bind(p.stock)
        .bind(p.rating)
        .bind(p.total_sold)
        .bind(p.review_count)
        .bind(p.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query("DELETE FROM products WHERE id = $1 RETURNING *")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn reserve_stock(&self, id: ProductId, qty: i64, now: DateTime<Utc>) -> StoreResult<Reservation> {
        let updated = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - $2, total_sold = total_sold + $2, updated_at = $3
            WHERE id = $1 AND stock >= $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(qty)
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("reserve_stock", e))?;
        if updated.rows_affected() > 0 {
            return Ok(Reservation::Reserved);
        }

        let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("reserve_stock", e))?;
        Ok(match stock {
            Some(available) => Reservation::Insufficient { available },
            None => Reservation::Missing,
        })
    }

    async fn release_stock(&self, id: ProductId, qty: i64, now: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            "UPDATE products SET stock = stock + $2, total_sold = total_sold - $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(qty)
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("release_stock", e))?;
        Ok(())
    }

    async fn record_sale(&self, id: ProductId, qty: i64, now: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            "UPDATE products SET stock = stock - $2, total_sold = total_sold + $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(qty)
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("record_sale", e))?;
        Ok(())
    }

    async fn restock(&self, id: ProductId, qty: i64, now: DateTime<Utc>) -> StoreResult<Restock> {
        // The bound keeps `stock + qty` inside BIGINT.
        let row = sqlx::query(
            "UPDATE products SET stock = stock + $2, updated_at = $3 WHERE id = $1 AND stock <= $4 RETURNING *",
        )
        .bind(id.as_uuid())
        .bind(qty)
        .bind(now)
        .bind(i64::MAX.saturating_sub(qty))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("restock", e))?;
        if let Some(row) = row {
            return Ok(Restock::Restocked(product_from_row(&row)?));
        }

        let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("restock", e))?;
        Ok(match stock {
            Some(stock) => Restock::Overflow { stock },
            None => Restock::Missing,
        })
    }
}

#[async_trait]
impl OrderRepo for PgStore {
    #[instrument(skip(self), err)]
    async fn next_bill_seq(&self) -> StoreResult<u64> {
        let seq: i64 = sqlx::query_scalar("SELECT nextval('bill_number_seq')")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("next_bill_seq", e))?;
        u64::try_from(seq).map_err(|_| StoreError::Corrupt(format!("bill sequence value {seq}")))
    }

    async fn insert(&self, o: &Order) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, bill_number, customer, items, total_amount, status, payment_method,
                payment_status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(o.id.as_uuid())
        .bind(o.bill_number.as_str())
        .bind(to_json(&o.customer)?)
        .bind(to_json(&o.items)?)
        .bind(o.total_amount)
        .bind(o.status.as_str())
        .bind(o.payment_method.as_str())
        .bind(o.payment_status.as_str())
        .bind(o.created_at)
        .bind(o.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;
        Ok(())
    }

    async fn get(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn get_by_bill(&self, bill_number: &str) -> StoreResult<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE bill_number = $1")
            .bind(bill_number)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order_by_bill", e))?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn list(&self) -> StoreResult<Vec<Order>> {
        let all = sqlx::query("SELECT * FROM orders ORDER BY created_at")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_orders", e))?;
        rows(all, order_from_row)
    }

    async fn update(&self, o: &Order) -> StoreResult<bool> {
        let done = sqlx::query(
            r#"
            UPDATE orders SET
                customer = $2, items = $3, total_amount = $4, status = $5,
                payment_method = $6, payment_status = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(o.id.as_uuid())
        .bind(to_json(&o.customer)?)
        .bind(to_json(&o.items)?)
        .bind(o.total_amount)
        .bind(o.status.as_str())
        .bind(o.payment_method.as_str())
        .bind(o.payment_status.as_str())
        .bind(o.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_order", e))?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let row = sqlx::query("DELETE FROM orders WHERE id = $1 RETURNING *")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_order", e))?;
        row.as_ref().map(order_from_row).transpose()
    }
}

#[async_trait]
impl PaymentRepo for PgStore {
    async fn insert(&self, p: &Payment) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_id, bill_number, customer, amount, method, status,
                transaction_id, notes, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(p.id.as_uuid())
        .bind(p.order_id.as_uuid())
        .bind(p.bill_number.as_str())
        .bind(to_json(&p.customer)?)
        .bind(p.amount)
        .bind(p.method.as_str())
        .bind(p.status.as_str())
        .bind(&p.transaction_id)
        .bind(&p.notes)
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_payment", e))?;
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> StoreResult<Option<Payment>> {
        let row = sqlx::query("SELECT * FROM payments WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_payment", e))?;
        row.as_ref().map(payment_from_row).transpose()
    }

    async fn find_by_order(&self, order: OrderId) -> StoreResult<Option<Payment>> {
        let row = sqlx::query("SELECT * FROM payments WHERE order_id = $1 ORDER BY created_at, id LIMIT 1")
            .bind(order.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_payment_by_order", e))?;
        row.as_ref().map(payment_from_row).transpose()
    }

    async fn list(&self) -> StoreResult<Vec<Payment>> {
        let all = sqlx::query("SELECT * FROM payments ORDER BY created_at")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_payments", e))?;
        rows(all, payment_from_row)
    }

    async fn update(&self, p: &Payment) -> StoreResult<bool> {
        let done = sqlx::query(
            r#"
            UPDATE payments SET
                amount = $2, method = $3, status = $4, transaction_id = $5, notes = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(p.id.as_uuid())
        .bind(p.amount)
        .bind(p.method.as_str())
        .bind(p.status.as_str())
        .bind(&p.transaction_id)
        .bind(&p.notes)
        .bind(p.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_payment", e))?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete(&self, id: PaymentId) -> StoreResult<Option<Payment>> {
        let row = sqlx::query("DELETE FROM payments WHERE id = $1 RETURNING *")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_payment", e))?;
        row.as_ref().map(payment_from_row).transpose()
    }
}

#[async_trait]
impl ReviewRepo for PgStore {
    async fn insert(&self, r: &Review) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reviews (id, product_id, customer_name, rating, comment, is_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(r.id.as_uuid())
        .bind(r.product_id.as_uuid())
        .bind(&r.customer_name)
        .bind(i16::from(r.rating))
        .bind(&r.comment)
        .bind(r.is_verified)
        .bind(r.created_at)
        .bind(r.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_review", e))?;
        Ok(())
    }

    async fn get(&self, id: ReviewId) -> StoreResult<Option<Review>> {
        let row = sqlx::query("SELECT * FROM reviews WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_review", e))?;
        row.as_ref().map(review_from_row).transpose()
    }

    async fn list(&self) -> StoreResult<Vec<Review>> {
        let all = sqlx::query("SELECT * FROM reviews ORDER BY created_at")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_reviews", e))?;
        rows(all, review_from_row)
    }

    async fn list_for_product(&self, product: ProductId) -> StoreResult<Vec<Review>> {
        let all = sqlx::query("SELECT * FROM reviews WHERE product_id = $1 ORDER BY created_at")
            .bind(product.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_product_reviews", e))?;
        rows(all, review_from_row)
    }

    async fn update(&self, r: &Review) -> StoreResult<bool> {
        let done = sqlx::query(
            r#"
            UPDATE reviews SET customer_name = $2, rating = $3, comment = $4, is_verified = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(r.id.as_uuid())
        .bind(&r.customer_name)
        .bind(i16::from(r.rating))
        .bind(&r.comment)
        .bind(r.is_verified)
        .bind(r.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_review", e))?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete(&self, id: ReviewId) -> StoreResult<Option<Review>> {
        let row = sqlx::query("DELETE FROM reviews WHERE id = $1 RETURNING *")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_review", e))?;
        row.as_ref().map(review_from_row).transpose()
    }
}

#[async_trait]
impl NotificationRepo for PgStore {
    async fn insert(&self, n: &Notification) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, kind, title, message, related_kind, related_id, is_read, priority, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(n.id.as_uuid())
        .bind(n.kind.as_str())
        .bind(&n.title)
        .bind(&n.message)
        .bind(n.related.map(|r| r.kind().as_str()))
        .bind(n.related.map(|r| r.id()))
        .bind(n.is_read)
        .bind(n.priority.as_str())
        .bind(n.created_at)
        .bind(n.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_notification", e))?;
        Ok(())
    }

    async fn get(&self, id: NotificationId) -> StoreResult<Option<Notification>> {
        let row = sqlx::query("SELECT * FROM notifications WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_notification", e))?;
        row.as_ref().map(notification_from_row).transpose()
    }

    async fn list(&self) -> StoreResult<Vec<Notification>> {
        let all = sqlx::query("SELECT * FROM notifications ORDER BY created_at")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_notifications", e))?;
        rows(all, notification_from_row)
    }

    async fn update(&self, n: &Notification) -> StoreResult<bool> {
        let done = sqlx::query("UPDATE notifications SET is_read = $2, updated_at = $3 WHERE id = $1")
            .bind(n.id.as_uuid())
            .bind(n.is_read)
            .bind(n.updated_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_notification", e))?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete(&self, id: NotificationId) -> StoreResult<Option<Notification>> {
        let row = sqlx::query("DELETE FROM notifications WHERE id = $1 RETURNING *")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_notification", e))?;
        row.as_ref().map(notification_from_row).transpose()
    }

    async fn mark_all_read(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let done = sqlx::query("UPDATE notifications SET is_read = TRUE, updated_at = $1 WHERE NOT is_read")
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("mark_all_read", e))?;
        Ok(done.rows_affected())
    }

    async fn unread_count(&self) -> StoreResult<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE NOT is_read")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("unread_count", e))?;
        Ok(n.max(0) as u64)
    }

    async fn has_open_low_stock_alert(&self, product: ProductId) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM notifications
                WHERE kind = $1 AND related_kind = 'Product' AND related_id = $2 AND NOT is_read
            )
            "#,
        )
        .bind(NotificationKind::LowStockAlert.as_str())
        .bind(product.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("has_open_low_stock_alert", e))?;
        Ok(exists)
    }
}

#[async_trait]
impl UserRepo for PgStore {
    async fn insert(&self, u: &User) -> StoreResult<()> {
        let res = sqlx::query(
            r#"
            INSERT INTO users (
                id, full_name, email, password_hash, role, mobile, is_active, last_login, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(u.id.as_uuid())
        .bind(&u.full_name)
        .bind(&u.email)
        .bind(&u.password_hash)
        .bind(u.role.as_str())
        .bind(&u.mobile)
        .bind(u.is_active)
        .bind(u.last_login)
        .bind(u.created_at)
        .bind(u.updated_at)
        .execute(&*self.pool)
        .await;
        match res {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate("Email already registered".into())),
            Err(e) => Err(map_sqlx_error("insert_user", e)),
        }
    }

    async fn get(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        let all = sqlx::query("SELECT * FROM users ORDER BY created_at")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;
        rows(all, user_from_row)
    }

    async fn update(&self, u: &User) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users SET
                full_name = $2, email = $3, password_hash = $4, role = $5, mobile = $6,
                is_active = $7, last_login = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(u.id.as_uuid())
        .bind(&u.full_name)
        .bind(&u.email)
        .bind(&u.password_hash)
        .bind(u.role.as_str())
        .bind(&u.mobile)
        .bind(u.is_active)
        .bind(u.last_login)
        .bind(u.updated_at)
        .execute(&*self.pool)
        .await;
        match res {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate("Email already registered".into())),
            Err(e) => Err(map_sqlx_error("update_user", e)),
        }
    }

    async fn delete(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query("DELETE FROM users WHERE id = $1 RETURNING *")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        row.as_ref().map(user_from_row).transpose()
    }
}
