// SQLite persistence for coupon records. The unique constraint on `code` is
// the single concurrency-correctness mechanism: a scheduled tick and a manual
// run may race on the same code, and only one insert can win.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use couponwatch_common::{Coupon, CouponOrigin, NewCoupon};

use crate::error::Result;

#[derive(Clone)]
pub struct CouponStore {
    pool: SqlitePool,
}

/// A row from the coupons table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct CouponRow {
    id: i64,
    code: String,
    valid_time: Option<String>,
    source_image_url: Option<String>,
    processed_image_url: Option<String>,
    created_at: DateTime<Utc>,
    sent: bool,
    details: Option<String>,
    origin: String,
    description: Option<String>,
    discount_value: Option<String>,
    valid_until: Option<DateTime<Utc>>,
}

impl From<CouponRow> for Coupon {
    fn from(row: CouponRow) -> Self {
        Coupon {
            id: row.id,
            code: row.code,
            valid_time: row.valid_time,
            source_image_url: row.source_image_url,
            processed_image_url: row.processed_image_url,
            created_at: row.created_at,
            sent: row.sent,
            details: row.details.and_then(|d| serde_json::from_str(&d).ok()),
            origin: CouponOrigin::from_str_loose(&row.origin),
            description: row.description,
            discount_value: row.discount_value,
            valid_until: row.valid_until,
        }
    }
}

impl CouponStore {
    /// Open (creating if missing) the database at `database_url`.
    /// SQLite is single-writer, so the pool is capped at one connection.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn exists(&self, code: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM coupons WHERE code = ?1")
                .bind(code)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    /// The dedup gate. One atomic conditional insert: `None` means the code
    /// already exists (silent skip for callers), `Some` is the stored record.
    /// Callers must not rely on a prior `exists` check — the conflict clause
    /// is what makes concurrent check-then-insert safe.
    pub async fn save(&self, new: &NewCoupon) -> Result<Option<Coupon>> {
        let details = new
            .details
            .as_ref()
            .map(|d| serde_json::to_string(d).unwrap_or_default());

        let row = sqlx::query_as::<_, CouponRow>(
            r#"
            INSERT INTO coupons
                (code, valid_time, source_image_url, created_at, sent,
                 details, origin, description, discount_value, valid_until)
            VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(code) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&new.code)
        .bind(&new.valid_time)
        .bind(&new.source_image_url)
        .bind(Utc::now())
        .bind(&details)
        .bind(new.origin.as_str())
        .bind(&new.description)
        .bind(&new.discount_value)
        .bind(new.valid_until)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Coupon::from))
    }

    /// Flip the sent flag. Idempotent: returns false (mutating nothing) when
    /// the code is absent. `sent` only ever goes from false to true.
    pub async fn mark_sent(&self, code: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE coupons SET sent = 1 WHERE code = ?1")
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_processed_image(&self, code: &str, url: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE coupons SET processed_image_url = ?2 WHERE code = ?1")
                .bind(code)
                .bind(url)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get(&self, code: &str) -> Result<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE code = ?1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Coupon::from))
    }

    /// Newest-first listing, optionally filtered by acquisition origin.
    pub async fn latest(
        &self,
        limit: u32,
        origin: Option<CouponOrigin>,
    ) -> Result<Vec<Coupon>> {
        let rows = match origin {
            Some(origin) => {
                sqlx::query_as::<_, CouponRow>(
                    r#"
                    SELECT * FROM coupons
                    WHERE origin = ?1
                    ORDER BY created_at DESC, id DESC
                    LIMIT ?2
                    "#,
                )
                .bind(origin.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, CouponRow>(
                    r#"
                    SELECT * FROM coupons
                    ORDER BY created_at DESC, id DESC
                    LIMIT ?1
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(Coupon::from).collect())
    }

    /// Records still awaiting a confirmed delivery, oldest first.
    pub async fn unsent(&self) -> Result<Vec<Coupon>> {
        let rows = sqlx::query_as::<_, CouponRow>(
            "SELECT * FROM coupons WHERE sent = 0 ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Coupon::from).collect())
    }
}
