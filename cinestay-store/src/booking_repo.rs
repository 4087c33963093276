use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use cinestay_core::booking::{Booking, BookingItem, BookingState};
use cinestay_core::repository::{BookingFilter, BookingRepository, StoreResult};
use cinestay_shared::Masked;

pub struct StoreBookingRepository {
    pool: PgPool,
}

impl StoreBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    code: String,
    room_id: Uuid,
    branch_id: Uuid,
    combo_id: Option<Uuid>,
    customer_name: String,
    customer_phone: String,
    customer_email: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    items: Json<Vec<BookingItem>>,
    total_amount: i64,
    status: String,
    payment_status: String,
    payment_transaction_id: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    expires_at: DateTime<Utc>,
    cancel_reason: Option<String>,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = cinestay_core::CoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            code: row.code,
            room_id: row.room_id,
            branch_id: row.branch_id,
            combo_id: row.combo_id,
            customer_name: row.customer_name,
            customer_phone: Masked(row.customer_phone),
            customer_email: row.customer_email.map(Masked),
            start_time: row.start_time,
            end_time: row.end_time,
            items: row.items.0,
            total_amount: row.total_amount,
            status: row.status.parse()?,
            payment_status: row.payment_status.parse()?,
            payment_transaction_id: row.payment_transaction_id,
            paid_at: row.paid_at,
            expires_at: row.expires_at,
            cancel_reason: row.cancel_reason,
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const BOOKING_COLUMNS: &str = "id, code, room_id, branch_id, combo_id, customer_name, customer_phone, customer_email, \
     start_time, end_time, items, total_amount, status, payment_status, payment_transaction_id, paid_at, \
     expires_at, cancel_reason, note, created_at, updated_at";

/// Statuses that keep a room slot occupied.
const SLOT_HOLDING: &str = "('pending', 'confirmed')";

fn into_bookings(rows: Vec<BookingRow>) -> StoreResult<Vec<Booking>> {
    let mut bookings = Vec::with_capacity(rows.len());
    for row in rows {
        bookings.push(Booking::try_from(row)?);
    }
    Ok(bookings)
}

#[async_trait]
impl BookingRepository for StoreBookingRepository {
    async fn insert_if_slot_free(&self, booking: &Booking) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        // Serialize reservations per room
        sqlx::query("SELECT id FROM rooms WHERE id = $1 FOR UPDATE")
            .bind(booking.room_id)
            .fetch_optional(&mut *tx)
            .await?;

        let overlapping: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM bookings WHERE room_id = $1 AND status IN {} AND start_time < $3 AND $2 < end_time",
            SLOT_HOLDING
        ))
        .bind(booking.room_id)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .fetch_one(&mut *tx)
        .await?;

        if overlapping > 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(&format!(
            "INSERT INTO bookings ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)",
            BOOKING_COLUMNS
        ))
        .bind(booking.id)
        .bind(&booking.code)
        .bind(booking.room_id)
        .bind(booking.branch_id)
        .bind(booking.combo_id)
        .bind(&booking.customer_name)
        .bind(booking.customer_phone.expose())
        .bind(booking.customer_email.as_ref().map(|e| e.expose().clone()))
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(Json(&booking.items))
        .bind(booking.total_amount)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(&booking.payment_transaction_id)
        .bind(booking.paid_at)
        .bind(booking.expires_at)
        .bind(&booking.cancel_reason)
        .bind(&booking.note)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(Booking::try_from(row)?)),
            None => Ok(None),
        }
    }

    async fn find_booking_by_code(&self, code: &str) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("SELECT {} FROM bookings WHERE code = $1", BOOKING_COLUMNS))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(Booking::try_from(row)?)),
            None => Ok(None),
        }
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM bookings WHERE TRUE", BOOKING_COLUMNS));

        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(payment_status) = filter.payment_status {
            query.push(" AND payment_status = ").push_bind(payment_status.as_str());
        }
        if let Some(room_id) = filter.room_id {
            query.push(" AND room_id = ").push_bind(room_id);
        }
        if let Some((from, to)) = filter.starts_between {
            query
                .push(" AND start_time >= ")
                .push_bind(from)
                .push(" AND start_time < ")
                .push_bind(to);
        }
        query.push(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        let rows = query.build_query_as::<BookingRow>().fetch_all(&self.pool).await?;
        into_bookings(rows)
    }

    async fn list_room_bookings(
        &self,
        room_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE room_id = $1 AND status IN {} AND start_time < $3 AND $2 < end_time ORDER BY start_time",
            BOOKING_COLUMNS, SLOT_HOLDING
        ))
        .bind(room_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        into_bookings(rows)
    }

    async fn compare_and_set(&self, booking: &Booking, expected: BookingState) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2, payment_status = $3, payment_transaction_id = $4, paid_at = $5,
                cancel_reason = $6, updated_at = $7
            WHERE id = $1 AND status = $8 AND payment_status = $9
            "#,
        )
        .bind(booking.id)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(&booking.payment_transaction_id)
        .bind(booking.paid_at)
        .bind(&booking.cancel_reason)
        .bind(booking.updated_at)
        .bind(expected.status.as_str())
        .bind(expected.payment_status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_overdue_pending(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE status = 'pending' AND expires_at <= $1 ORDER BY expires_at",
            BOOKING_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        into_bookings(rows)
    }

    async fn list_finished_confirmed(&self, now: DateTime<Utc>) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE status = 'confirmed' AND end_time <= $1 ORDER BY end_time",
            BOOKING_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        into_bookings(rows)
    }
}
