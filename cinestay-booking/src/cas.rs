use uuid::Uuid;
use tracing::debug;
use cinestay_core::booking::Booking;
use cinestay_core::repository::BookingRepository;
use cinestay_core::{CoreError, CoreResult};

/// Attempts before a contended booking write gives up with `Conflict`.
pub const MAX_CAS_ATTEMPTS: u32 = 5;

/// Load the booking, let `apply` mutate it and persist the result with a
/// compare-and-set against the state it was loaded in. On contention the
/// booking is reloaded and `apply` runs again.
///
/// `apply` returns its result plus whether the booking needs to be written.
pub async fn update_booking<R, F>(
    repo: &dyn BookingRepository,
    booking_id: Uuid,
    mut apply: F,
) -> CoreResult<(Booking, R)>
where
    F: FnMut(&mut Booking) -> CoreResult<(R, bool)>,
{
    for attempt in 1..=MAX_CAS_ATTEMPTS {
        let mut booking = repo
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Booking {}", booking_id)))?;
        let expected = booking.state();

        let (result, changed) = apply(&mut booking)?;
        if !changed {
            return Ok((booking, result));
        }

        if repo.compare_and_set(&booking, expected).await? {
            return Ok((booking, result));
        }
        debug!(%booking_id, attempt, "Booking changed concurrently, retrying");
    }

    Err(CoreError::Conflict(format!(
        "Booking {} is being updated concurrently, try again",
        booking_id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use cinestay_core::booking::{BookingState, BookingStatus};
    use cinestay_core::repository::{BookingFilter, StoreResult};
    use cinestay_store::MemoryStore;

    use crate::testing::Fixture;

    /// Loses the first `losses` compare-and-set calls as if another writer won.
    struct RacingRepo {
        inner: Arc<MemoryStore>,
        losses: AtomicU32,
        attempts: AtomicU32,
    }

    impl RacingRepo {
        fn new(inner: Arc<MemoryStore>, losses: u32) -> Self {
            Self { inner, losses: AtomicU32::new(losses), attempts: AtomicU32::new(0) }
        }
    }

    #[async_trait]
    impl BookingRepository for RacingRepo {
        async fn insert_if_slot_free(&self, booking: &Booking) -> StoreResult<bool> {
            self.inner.insert_if_slot_free(booking).await
        }

        async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
            self.inner.get_booking(id).await
        }

        async fn find_booking_by_code(&self, code: &str) -> StoreResult<Option<Booking>> {
            self.inner.find_booking_by_code(code).await
        }

        async fn list_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
            self.inner.list_bookings(filter).await
        }

        async fn list_room_bookings(
            &self,
            room_id: Uuid,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> StoreResult<Vec<Booking>> {
            self.inner.list_room_bookings(room_id, from, to).await
        }

        async fn compare_and_set(&self, booking: &Booking, expected: BookingState) -> StoreResult<bool> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let lost = self
                .losses
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if lost {
                return Ok(false);
            }
            self.inner.compare_and_set(booking, expected).await
        }

        async fn list_overdue_pending(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Booking>> {
            self.inner.list_overdue_pending(cutoff).await
        }

        async fn list_finished_confirmed(&self, now: DateTime<Utc>) -> StoreResult<Vec<Booking>> {
            self.inner.list_finished_confirmed(now).await
        }
    }

    fn confirm(booking: &mut Booking) -> CoreResult<((), bool)> {
        booking.confirm_manually(Utc::now())?;
        Ok(((), true))
    }

    #[tokio::test]
    async fn test_gives_up_with_conflict_after_bounded_attempts() {
        let fx = Fixture::seeded().await;
        let booking = fx.pending_booking(Utc::now()).await;
        let repo = RacingRepo::new(fx.store.clone(), u32::MAX);

        let err = update_booking(&repo, booking.id, confirm).await.unwrap_err();

        assert!(matches!(err, CoreError::Conflict(_)));
        assert_eq!(repo.attempts.load(Ordering::SeqCst), MAX_CAS_ATTEMPTS);
        assert_eq!(fx.booking(booking.id).await.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_retries_after_one_lost_race() {
        let fx = Fixture::seeded().await;
        let booking = fx.pending_booking(Utc::now()).await;
        let repo = RacingRepo::new(fx.store.clone(), 1);
        let mut calls = 0;

        let (updated, ()) = update_booking(&repo, booking.id, |b| {
            calls += 1;
            confirm(b)
        })
        .await
        .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(repo.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(updated.status, BookingStatus::Confirmed);
        assert_eq!(fx.booking(booking.id).await.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_unchanged_booking_is_not_written() {
        let fx = Fixture::seeded().await;
        let booking = fx.pending_booking(Utc::now()).await;
        let repo = RacingRepo::new(fx.store.clone(), u32::MAX);

        let (_, result) = update_booking(&repo, booking.id, |_| Ok((7, false))).await.unwrap();

        assert_eq!(result, 7);
        assert_eq!(repo.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_booking_is_not_found() {
        let fx = Fixture::seeded().await;
        let err = update_booking(fx.store.as_ref(), Uuid::new_v4(), confirm).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
