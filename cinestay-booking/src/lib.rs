pub mod cas;
pub mod checkout;
pub mod reconcile;
pub mod expiry;
pub mod access;

#[cfg(test)]
pub(crate) mod testing;

pub use checkout::{BookingService, CheckoutItem, CheckoutRequest};
pub use reconcile::{IpnReconciler, ReconcileOutcome};
pub use expiry::ExpirySweeper;
pub use access::RoomAccess;
