use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;
use cinestay_core::payment::{PaymentTransaction, TransactionOutcome};
use cinestay_core::repository::{PaymentRepository, StoreResult};

pub struct StorePaymentRepository {
    pool: PgPool,
}

impl StorePaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    transaction_id: String,
    booking_id: Uuid,
    order_id: String,
    amount: i64,
    result_code: i32,
    result: String,
    pay_type: Option<String>,
    message: String,
    outcome: String,
    raw_payload: Value,
    received_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for PaymentTransaction {
    type Error = cinestay_core::CoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(PaymentTransaction {
            transaction_id: row.transaction_id,
            booking_id: row.booking_id,
            order_id: row.order_id,
            amount: row.amount,
            result_code: row.result_code,
            result: row.result.parse()?,
            pay_type: row.pay_type,
            message: row.message,
            outcome: row.outcome.parse()?,
            raw_payload: row.raw_payload,
            received_at: row.received_at,
            updated_at: row.updated_at,
        })
    }
}

const TRANSACTION_COLUMNS: &str = "transaction_id, booking_id, order_id, amount, result_code, result, pay_type, \
     message, outcome, raw_payload, received_at, updated_at";

#[async_trait]
impl PaymentRepository for StorePaymentRepository {
    async fn record_transaction(&self, transaction: &PaymentTransaction) -> StoreResult<bool> {
        let result = sqlx::query(&format!(
            "INSERT INTO payment_transactions ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (transaction_id) DO NOTHING",
            TRANSACTION_COLUMNS
        ))
        .bind(&transaction.transaction_id)
        .bind(transaction.booking_id)
        .bind(&transaction.order_id)
        .bind(transaction.amount)
        .bind(transaction.result_code)
        .bind(transaction.result.as_str())
        .bind(&transaction.pay_type)
        .bind(&transaction.message)
        .bind(transaction.outcome.as_str())
        .bind(&transaction.raw_payload)
        .bind(transaction.received_at)
        .bind(transaction.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_transaction(&self, transaction_id: &str) -> StoreResult<Option<PaymentTransaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM payment_transactions WHERE transaction_id = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(PaymentTransaction::try_from(row)?)),
            None => Ok(None),
        }
    }

    async fn set_transaction_outcome(&self, transaction_id: &str, outcome: TransactionOutcome) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE payment_transactions SET outcome = $2, updated_at = NOW() WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .bind(outcome.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(format!("transaction {} not found", transaction_id).into());
        }
        Ok(())
    }
}
