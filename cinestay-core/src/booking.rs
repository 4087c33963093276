use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;
use cinestay_shared::Masked;

use crate::payment::GatewayResult;
use crate::CoreError;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            other => Err(CoreError::ValidationError(format!("Unknown booking status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Paid,
    Failed,
    /// Money arrived for a booking that can no longer be honoured.
    RefundRequired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::RefundRequired => "refund_required",
        }
    }

    /// Money has been received for the booking.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::RefundRequired)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "refund_required" => Ok(PaymentStatus::RefundRequired),
            other => Err(CoreError::ValidationError(format!("Unknown payment status '{}'", other))),
        }
    }
}

/// The pair every conditional write is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingState {
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
}

/// What applying a gateway notification did to a booking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEffect {
    Confirmed,
    MarkedPending,
    MarkedFailed,
    RefundRequired,
    AlreadyPaid,
    DuplicatePayment,
    Ignored,
}

impl PaymentEffect {
    /// Whether the booking record was modified.
    pub fn changed(&self) -> bool {
        matches!(
            self,
            PaymentEffect::Confirmed
                | PaymentEffect::MarkedPending
                | PaymentEffect::MarkedFailed
                | PaymentEffect::RefundRequired
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingItem {
    pub menu_item_id: Uuid,
    pub name: String,
    pub unit_price: i64,
    pub quantity: i32,
}

impl BookingItem {
    /// `None` on overflow.
    pub fn line_total(&self) -> Option<i64> {
        self.unit_price.checked_mul(self.quantity as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub code: String,
    pub room_id: Uuid,
    pub branch_id: Uuid,
    pub combo_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_phone: Masked<String>,
    pub customer_email: Option<Masked<String>>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub items: Vec<BookingItem>,
    pub total_amount: i64,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub cancel_reason: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const CANCEL_REASON_PAYMENT_TIMEOUT: &str = "payment_timeout";

/// Human-readable booking code derived from the booking id, e.g. `CS1A2B3C4D`.
pub fn booking_code(id: Uuid) -> String {
    let hex = id.simple().to_string();
    format!("CS{}", hex[..8].to_ascii_uppercase())
}

impl Booking {
    pub fn state(&self) -> BookingState {
        BookingState {
            status: self.status,
            payment_status: self.payment_status,
        }
    }

    /// Whether this booking still holds its room slot.
    pub fn holds_slot(&self) -> bool {
        matches!(self.status, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    /// Half-open interval overlap: `[start, end)` against this booking.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && start < self.end_time
    }

    /// Whether a payment link may still be issued for this booking.
    pub fn is_payable(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Pending
            && matches!(self.payment_status, PaymentStatus::Unpaid | PaymentStatus::Failed)
            && self.expires_at > now
    }

    /// Apply a gateway notification outcome.
    pub fn apply_payment(&mut self, result: GatewayResult, transaction_id: &str, now: DateTime<Utc>) -> PaymentEffect {
        match result {
            GatewayResult::Success => self.apply_success(transaction_id, now),
            GatewayResult::Pending => {
                if self.status == BookingStatus::Pending
                    && matches!(self.payment_status, PaymentStatus::Unpaid | PaymentStatus::Failed)
                {
                    self.payment_status = PaymentStatus::Pending;
                    self.updated_at = now;
                    PaymentEffect::MarkedPending
                } else {
                    PaymentEffect::Ignored
                }
            }
            GatewayResult::Failed => {
                if self.status == BookingStatus::Pending
                    && matches!(self.payment_status, PaymentStatus::Unpaid | PaymentStatus::Pending)
                {
                    self.payment_status = PaymentStatus::Failed;
                    self.updated_at = now;
                    PaymentEffect::MarkedFailed
                } else {
                    PaymentEffect::Ignored
                }
            }
        }
    }

    fn apply_success(&mut self, transaction_id: &str, now: DateTime<Utc>) -> PaymentEffect {
        if self.payment_status.is_settled() {
            return if self.payment_transaction_id.as_deref() == Some(transaction_id) {
                PaymentEffect::AlreadyPaid
            } else {
                PaymentEffect::DuplicatePayment
            };
        }

        self.payment_transaction_id = Some(transaction_id.to_string());
        self.paid_at = Some(now);
        self.updated_at = now;

        if self.status == BookingStatus::Cancelled {
            self.payment_status = PaymentStatus::RefundRequired;
            return PaymentEffect::RefundRequired;
        }

        self.payment_status = PaymentStatus::Paid;
        if self.status == BookingStatus::Pending {
            self.status = BookingStatus::Confirmed;
        }
        PaymentEffect::Confirmed
    }

    /// Cancel an unpaid booking whose payment deadline has passed. Bookings whose
    /// transfer is already in flight get `pending_grace` extra time.
    pub fn expire(&mut self, now: DateTime<Utc>, pending_grace: Duration) -> bool {
        if self.status != BookingStatus::Pending || self.payment_status.is_settled() {
            return false;
        }

        let deadline = if self.payment_status == PaymentStatus::Pending {
            self.expires_at + pending_grace
        } else {
            self.expires_at
        };

        if deadline > now {
            return false;
        }

        self.status = BookingStatus::Cancelled;
        self.cancel_reason = Some(CANCEL_REASON_PAYMENT_TIMEOUT.to_string());
        self.updated_at = now;
        true
    }

    /// Transition: Confirmed → Completed once the session is over.
    pub fn complete(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != BookingStatus::Confirmed || self.end_time > now {
            return false;
        }
        self.status = BookingStatus::Completed;
        self.updated_at = now;
        true
    }

    /// Admin cancellation (any status except Cancelled/Completed).
    pub fn cancel(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<(), CoreError> {
        if !matches!(self.status, BookingStatus::Pending | BookingStatus::Confirmed) {
            return Err(CoreError::InvalidTransition {
                from: self.status.to_string(),
                to: BookingStatus::Cancelled.to_string(),
            });
        }

        if self.payment_status == PaymentStatus::Paid {
            self.payment_status = PaymentStatus::RefundRequired;
        }
        self.status = BookingStatus::Cancelled;
        self.cancel_reason = reason.or_else(|| Some("cancelled_by_admin".to_string()));
        self.updated_at = now;
        Ok(())
    }

    /// Admin confirmation without a gateway payment (e.g. paid at the counter).
    pub fn confirm_manually(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        if self.status != BookingStatus::Pending {
            return Err(CoreError::InvalidTransition {
                from: self.status.to_string(),
                to: BookingStatus::Confirmed.to_string(),
            });
        }
        self.status = BookingStatus::Confirmed;
        self.updated_at = now;
        Ok(())
    }
}
