use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast;
use tracing::{info, warn};
use cinestay_core::repository::BookingRepository;
use cinestay_core::CoreResult;
use cinestay_shared::models::events::{PaymentEvent, PaymentEventKind};

use crate::cas;

/// Background cleanup of bookings: releases slots of unpaid bookings and
/// closes sessions that are over.
pub struct ExpirySweeper {
    bookings: Arc<dyn BookingRepository>,
    events: broadcast::Sender<PaymentEvent>,
    pending_grace: Duration,
}

impl ExpirySweeper {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        events: broadcast::Sender<PaymentEvent>,
        pending_grace: Duration,
    ) -> Self {
        Self { bookings, events, pending_grace }
    }

    /// Cancel pending bookings whose payment deadline passed. Returns how many
    /// were cancelled. A booking paid concurrently is left alone by the CAS.
    pub async fn expire_unpaid(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let overdue = self.bookings.list_overdue_pending(now).await?;
        let mut expired = 0;

        for candidate in overdue {
            let result = cas::update_booking(self.bookings.as_ref(), candidate.id, |b| {
                let changed = b.expire(now, self.pending_grace);
                Ok((changed, changed))
            })
            .await;

            match result {
                Ok((booking, true)) => {
                    expired += 1;
                    info!(booking_code = %booking.code, "Booking expired unpaid");
                    let _ = self.events.send(PaymentEvent::new(
                        booking.id,
                        &booking.code,
                        PaymentEventKind::Expired,
                        None,
                    ));
                }
                Ok((_, false)) => {}
                Err(e) => warn!(booking_code = %candidate.code, error = %e, "Failed to expire booking"),
            }
        }

        Ok(expired)
    }

    /// Mark confirmed bookings whose session ended as completed.
    pub async fn complete_finished(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let finished = self.bookings.list_finished_confirmed(now).await?;
        let mut completed = 0;

        for candidate in finished {
            match cas::update_booking(self.bookings.as_ref(), candidate.id, |b| {
                let changed = b.complete(now);
                Ok((changed, changed))
            })
            .await
            {
                Ok((_, true)) => completed += 1,
                Ok((_, false)) => {}
                Err(e) => warn!(booking_code = %candidate.code, error = %e, "Failed to complete booking"),
            }
        }

        if completed > 0 {
            info!(completed, "Finished bookings completed");
        }
        Ok(completed)
    }
}
