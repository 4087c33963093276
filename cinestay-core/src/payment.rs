use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::booking::Booking;
use crate::CoreError;

/// Gateway-agnostic classification of a transaction result code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayResult {
    Success,
    Pending,
    Failed,
}

impl GatewayResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayResult::Success => "success",
            GatewayResult::Pending => "pending",
            GatewayResult::Failed => "failed",
        }
    }
}

impl FromStr for GatewayResult {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(GatewayResult::Success),
            "pending" => Ok(GatewayResult::Pending),
            "failed" => Ok(GatewayResult::Failed),
            other => Err(CoreError::ValidationError(format!("Unknown gateway result '{}'", other))),
        }
    }
}

/// A verified payment notification, already decoupled from the gateway's wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub transaction_id: String,
    /// Our booking code, echoed back by the gateway.
    pub order_id: String,
    pub amount: i64,
    pub result: GatewayResult,
    pub result_code: i32,
    pub message: String,
    pub pay_type: Option<String>,
    pub raw: serde_json::Value,
}

/// What happened to a recorded transaction. `Received` is the only non-final value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionOutcome {
    Received,
    Applied,
    DuplicatePayment,
    AmountMismatch,
    RefundRequired,
    Ignored,
}

impl TransactionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionOutcome::Received => "received",
            TransactionOutcome::Applied => "applied",
            TransactionOutcome::DuplicatePayment => "duplicate_payment",
            TransactionOutcome::AmountMismatch => "amount_mismatch",
            TransactionOutcome::RefundRequired => "refund_required",
            TransactionOutcome::Ignored => "ignored",
        }
    }

    pub fn is_final(&self) -> bool {
        *self != TransactionOutcome::Received
    }
}

impl fmt::Display for TransactionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionOutcome {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(TransactionOutcome::Received),
            "applied" => Ok(TransactionOutcome::Applied),
            "duplicate_payment" => Ok(TransactionOutcome::DuplicatePayment),
            "amount_mismatch" => Ok(TransactionOutcome::AmountMismatch),
            "refund_required" => Ok(TransactionOutcome::RefundRequired),
            "ignored" => Ok(TransactionOutcome::Ignored),
            other => Err(CoreError::ValidationError(format!("Unknown transaction outcome '{}'", other))),
        }
    }
}

/// Persisted record of every gateway transaction we have been told about,
/// keyed by the gateway's transaction id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTransaction {
    pub transaction_id: String,
    pub booking_id: Uuid,
    pub order_id: String,
    pub amount: i64,
    pub result_code: i32,
    pub result: GatewayResult,
    pub pay_type: Option<String>,
    pub message: String,
    pub outcome: TransactionOutcome,
    pub raw_payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentTransaction {
    pub fn from_notification(booking_id: Uuid, notification: &PaymentNotification, now: DateTime<Utc>) -> Self {
        Self {
            transaction_id: notification.transaction_id.clone(),
            booking_id,
            order_id: notification.order_id.clone(),
            amount: notification.amount,
            result_code: notification.result_code,
            result: notification.result,
            pay_type: notification.pay_type.clone(),
            message: notification.message.clone(),
            outcome: TransactionOutcome::Received,
            raw_payload: notification.raw.clone(),
            received_at: now,
            updated_at: now,
        }
    }
}

/// A hosted payment page issued by the gateway for a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLink {
    pub booking_id: Uuid,
    pub order_id: String,
    pub request_id: String,
    pub amount: i64,
    pub pay_url: String,
    pub qr_code: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted payment link for the booking's outstanding amount
    async fn create_payment_link(
        &self,
        booking: &Booking,
    ) -> Result<PaymentLink, Box<dyn std::error::Error + Send + Sync>>;
}
