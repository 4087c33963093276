use std::sync::Arc;
use serde::Serialize;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{info, warn};
use cinestay_core::booking::PaymentEffect;
use cinestay_core::payment::{GatewayResult, PaymentNotification, PaymentTransaction, TransactionOutcome};
use cinestay_core::repository::{BookingRepository, PaymentRepository};
use cinestay_core::{CoreError, CoreResult};
use cinestay_shared::models::events::{PaymentEvent, PaymentEventKind};

use crate::cas;

/// Result of reconciling one verified notification.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case", rename_all_fields = "camelCase", tag = "result")]
pub enum ReconcileOutcome {
    /// The notification was processed (the booking may or may not have changed).
    Processed {
        booking_id: Uuid,
        effect: PaymentEffect,
        outcome: TransactionOutcome,
    },
    /// This transaction id was already fully processed earlier.
    Duplicate {
        booking_id: Uuid,
        outcome: TransactionOutcome,
    },
}

fn transaction_outcome(effect: PaymentEffect) -> TransactionOutcome {
    match effect {
        PaymentEffect::Confirmed
        | PaymentEffect::MarkedPending
        | PaymentEffect::MarkedFailed
        | PaymentEffect::AlreadyPaid => TransactionOutcome::Applied,
        PaymentEffect::RefundRequired => TransactionOutcome::RefundRequired,
        PaymentEffect::DuplicatePayment => TransactionOutcome::DuplicatePayment,
        PaymentEffect::Ignored => TransactionOutcome::Ignored,
    }
}

fn event_kind(effect: PaymentEffect) -> Option<PaymentEventKind> {
    match effect {
        PaymentEffect::Confirmed => Some(PaymentEventKind::Confirmed),
        PaymentEffect::MarkedPending => Some(PaymentEventKind::Pending),
        PaymentEffect::MarkedFailed => Some(PaymentEventKind::Failed),
        PaymentEffect::RefundRequired => Some(PaymentEventKind::RefundRequired),
        _ => None,
    }
}

/// Applies verified gateway notifications to bookings exactly once per
/// gateway transaction id.
pub struct IpnReconciler {
    bookings: Arc<dyn BookingRepository>,
    payments: Arc<dyn PaymentRepository>,
    events: broadcast::Sender<PaymentEvent>,
}

impl IpnReconciler {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        payments: Arc<dyn PaymentRepository>,
        events: broadcast::Sender<PaymentEvent>,
    ) -> Self {
        Self { bookings, payments, events }
    }

    pub async fn reconcile(
        &self,
        notification: &PaymentNotification,
        now: DateTime<Utc>,
    ) -> CoreResult<ReconcileOutcome> {
        let booking = self
            .bookings
            .find_booking_by_code(&notification.order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Booking {}", notification.order_id)))?;

        // 1. Claim the transaction id before touching the booking
        let transaction = PaymentTransaction::from_notification(booking.id, notification, now);
        if !self.payments.record_transaction(&transaction).await? {
            let existing = self.payments.get_transaction(&notification.transaction_id).await?;
            match existing {
                Some(existing) if existing.outcome.is_final() => {
                    info!(
                        transaction_id = %notification.transaction_id,
                        booking_code = %booking.code,
                        outcome = %existing.outcome,
                        "Duplicate IPN delivery"
                    );
                    return Ok(ReconcileOutcome::Duplicate {
                        booking_id: existing.booking_id,
                        outcome: existing.outcome,
                    });
                }
                _ => {
                    warn!(
                        transaction_id = %notification.transaction_id,
                        "Resuming transaction left unprocessed by an earlier delivery"
                    );
                }
            }
        }

        // 2. A success must pay exactly the booking total
        if notification.result == GatewayResult::Success && notification.amount != booking.total_amount {
            self.payments
                .set_transaction_outcome(&notification.transaction_id, TransactionOutcome::AmountMismatch)
                .await?;
            warn!(
                booking_code = %booking.code,
                expected = booking.total_amount,
                received = notification.amount,
                "IPN amount does not match booking total"
            );
            return Err(CoreError::ValidationError(format!(
                "Amount {} does not match booking total {}",
                notification.amount, booking.total_amount
            )));
        }

        // 3. Conditional state transition
        let (booking, effect) = cas::update_booking(self.bookings.as_ref(), booking.id, |b| {
            let effect = b.apply_payment(notification.result, &notification.transaction_id, now);
            Ok((effect, effect.changed()))
        })
        .await?;

        // 4. Settle the transaction record and tell listeners
        let outcome = transaction_outcome(effect);
        self.payments
            .set_transaction_outcome(&notification.transaction_id, outcome)
            .await?;

        if let Some(kind) = event_kind(effect) {
            let event = PaymentEvent::new(booking.id, &booking.code, kind, Some(notification.transaction_id.clone()));
            // No subscribers is not an error.
            let _ = self.events.send(event);
        }

        info!(
            booking_code = %booking.code,
            transaction_id = %notification.transaction_id,
            ?effect,
            %outcome,
            status = %booking.status,
            payment_status = %booking.payment_status,
            "IPN reconciled"
        );

        Ok(ReconcileOutcome::Processed {
            booking_id: booking.id,
            effect,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use cinestay_core::booking::{Booking, BookingStatus, PaymentStatus};
    use serde_json::json;

    use crate::testing::Fixture;

    fn notification(booking: &Booking, trans_id: &str, result: GatewayResult, amount: i64) -> PaymentNotification {
        let result_code = match result {
            GatewayResult::Success => 0,
            GatewayResult::Pending => 7000,
            GatewayResult::Failed => 1006,
        };
        PaymentNotification {
            transaction_id: trans_id.to_string(),
            order_id: booking.code.clone(),
            amount,
            result,
            result_code,
            message: String::new(),
            pay_type: Some("qr".to_string()),
            raw: json!({ "transId": trans_id }),
        }
    }

    async fn setup() -> (Fixture, IpnReconciler, Booking, broadcast::Receiver<PaymentEvent>) {
        let fx = Fixture::seeded().await;
        let now = Utc::now();
        let booking = fx.pending_booking(now).await;
        let (tx, rx) = broadcast::channel(16);
        let reconciler = IpnReconciler::new(fx.store.clone(), fx.store.clone(), tx);
        (fx, reconciler, booking, rx)
    }

    #[tokio::test]
    async fn test_success_confirms_and_broadcasts() {
        let (fx, reconciler, booking, mut rx) = setup().await;
        let n = notification(&booking, "T100", GatewayResult::Success, booking.total_amount);

        let outcome = reconciler.reconcile(&n, Utc::now()).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Processed {
                booking_id: booking.id,
                effect: PaymentEffect::Confirmed,
                outcome: TransactionOutcome::Applied,
            }
        );

        let stored = fx.booking(booking.id).await;
        assert_eq!(stored.status, BookingStatus::Confirmed);
        assert_eq!(stored.payment_status, PaymentStatus::Paid);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.booking_id, booking.id);
        assert_eq!(event.kind, PaymentEventKind::Confirmed);
    }

    #[tokio::test]
    async fn test_redelivery_is_duplicate() {
        let (_fx, reconciler, booking, _rx) = setup().await;
        let n = notification(&booking, "T100", GatewayResult::Success, booking.total_amount);

        reconciler.reconcile(&n, Utc::now()).await.unwrap();
        let again = reconciler.reconcile(&n, Utc::now()).await.unwrap();
        assert_eq!(
            again,
            ReconcileOutcome::Duplicate { booking_id: booking.id, outcome: TransactionOutcome::Applied }
        );
    }

    #[tokio::test]
    async fn test_failure_after_success_is_ignored() {
        let (fx, reconciler, booking, _rx) = setup().await;
        reconciler
            .reconcile(&notification(&booking, "T100", GatewayResult::Success, booking.total_amount), Utc::now())
            .await
            .unwrap();

        let outcome = reconciler
            .reconcile(&notification(&booking, "T101", GatewayResult::Failed, booking.total_amount), Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Processed { effect: PaymentEffect::Ignored, .. }));
        assert_eq!(fx.booking(booking.id).await.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_amount_mismatch_rejected_and_recorded() {
        let (fx, reconciler, booking, _rx) = setup().await;
        let n = notification(&booking, "T200", GatewayResult::Success, booking.total_amount - 1);

        let err = reconciler.reconcile(&n, Utc::now()).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));

        let stored = fx.booking(booking.id).await;
        assert_eq!(stored.payment_status, PaymentStatus::Unpaid);
        let tx = fx.transaction("T200").await;
        assert_eq!(tx.outcome, TransactionOutcome::AmountMismatch);
    }

    #[tokio::test]
    async fn test_late_success_on_cancelled_booking_requires_refund() {
        let (fx, reconciler, booking, _rx) = setup().await;
        let mut cancelled = booking.clone();
        let expected = cancelled.state();
        assert!(cancelled.expire(booking.expires_at + Duration::seconds(1), Duration::minutes(10)));
        fx.cas(&cancelled, expected).await;

        let n = notification(&booking, "T300", GatewayResult::Success, booking.total_amount);
        let outcome = reconciler.reconcile(&n, Utc::now()).await.unwrap();
        assert!(matches!(
            outcome,
            ReconcileOutcome::Processed { effect: PaymentEffect::RefundRequired, outcome: TransactionOutcome::RefundRequired, .. }
        ));

        let stored = fx.booking(booking.id).await;
        assert_eq!(stored.status, BookingStatus::Cancelled);
        assert_eq!(stored.payment_status, PaymentStatus::RefundRequired);
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let (_fx, reconciler, booking, _rx) = setup().await;
        let mut n = notification(&booking, "T400", GatewayResult::Success, booking.total_amount);
        n.order_id = "CS00000000".to_string();
        assert!(matches!(reconciler.reconcile(&n, Utc::now()).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_received_transaction_is_resumed() {
        let (fx, reconciler, booking, _rx) = setup().await;
        let n = notification(&booking, "T500", GatewayResult::Success, booking.total_amount);
        fx.record(&PaymentTransaction::from_notification(booking.id, &n, Utc::now())).await;

        let outcome = reconciler.reconcile(&n, Utc::now()).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Processed { effect: PaymentEffect::Confirmed, .. }));
    }
}
