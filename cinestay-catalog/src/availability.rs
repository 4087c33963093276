use serde::{Deserialize, Serialize};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use cinestay_core::booking::{Booking, BookingStatus};

use crate::product::CatalogError;

/// A booked interval of a room, as exposed on the public availability view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookedSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
}

/// UTC bounds `[start, end)` of a local calendar day at `offset`.
pub fn day_window(date: &str, offset: FixedOffset) -> Result<(DateTime<Utc>, DateTime<Utc>), CatalogError> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| CatalogError::InvalidField {
        field: "date",
        reason: "expected YYYY-MM-DD".to_string(),
    })?;

    let start_local = day.and_hms_opt(0, 0, 0).ok_or_else(|| CatalogError::InvalidField {
        field: "date",
        reason: "out of range".to_string(),
    })?;

    let start = offset
        .from_local_datetime(&start_local)
        .single()
        .ok_or_else(|| CatalogError::InvalidField { field: "date", reason: "ambiguous local time".to_string() })?
        .with_timezone(&Utc);

    Ok((start, start + chrono::Duration::days(1)))
}

/// Slot-holding bookings clipped to `[from, to)`, ordered by start.
pub fn booked_slots(bookings: &[Booking], from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<BookedSlot> {
    let mut slots: Vec<BookedSlot> = bookings
        .iter()
        .filter(|b| b.holds_slot() && b.overlaps(from, to))
        .map(|b| BookedSlot {
            start_time: b.start_time.max(from),
            end_time: b.end_time.min(to),
            status: b.status,
        })
        .collect();
    slots.sort_by_key(|s| s.start_time);
    slots
}
