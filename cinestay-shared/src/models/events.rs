use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventKind {
    Confirmed,
    Pending,
    Failed,
    RefundRequired,
    Expired,
}

/// Published whenever a booking's payment state changes, so checkout pages
/// waiting on the IPN can be notified without polling.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    pub booking_id: Uuid,
    pub booking_code: String,
    pub kind: PaymentEventKind,
    pub transaction_id: Option<String>,
    pub timestamp: i64,
}

impl PaymentEvent {
    pub fn new(booking_id: Uuid, booking_code: &str, kind: PaymentEventKind, transaction_id: Option<String>) -> Self {
        Self {
            booking_id,
            booking_code: booking_code.to_string(),
            kind,
            transaction_id,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}
