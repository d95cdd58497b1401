//! Storage seam for the booking engine.
//!
//! The three record stores are expressed as traits over an open transaction:
//! [`SeatLedger`], [`FlightSeatIndex`] and [`ReservationJournal`]. Their write
//! operations are only reachable through a [`BookingTransaction`] handed out by
//! [`BookingStore::begin`], so every mutation happens inside one atomic unit.
//! Dropping a transaction without committing rolls it back.
//!
//! Write operations report whether they matched a record (`Ok(false)` means
//! the write touched zero rows); the engine decides which domain error that is.

pub mod memory;
pub mod mysql;

use crate::models::flight::Flight;
use crate::models::pagination::Page;
use crate::models::reservation::{Reservation, ReservationFilter};
use crate::models::seat::{Seat, SeatFilter};
use crate::utils::error::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

/// Per-seat availability and price.
#[async_trait]
pub trait SeatLedger: Send {
    async fn get_seat(&mut self, filter: &SeatFilter) -> AppResult<Option<Seat>>;

    /// Set availability and price. Only matches a seat currently in the
    /// opposite availability state, so a lost race reports `false`.
    async fn set_availability(
        &mut self,
        seat_id: Uuid,
        available: bool,
        price: Decimal,
    ) -> AppResult<bool>;
}

/// Per-flight set of bookable seat ids.
///
/// Both writes are set operations: removing an absent id or adding a present
/// one leaves the set unchanged. `false` means the flight does not exist.
#[async_trait]
pub trait FlightSeatIndex: Send {
    async fn remove_seat(&mut self, flight_id: Uuid, seat_id: Uuid) -> AppResult<bool>;

    async fn add_seat(&mut self, flight_id: Uuid, seat_id: Uuid) -> AppResult<bool>;
}

/// Booking and cancellation records.
#[async_trait]
pub trait ReservationJournal: Send {
    async fn create_reservation(
        &mut self,
        seat_id: Uuid,
        user_id: Uuid,
        reservation_date: DateTime<Utc>,
    ) -> AppResult<Reservation>;

    async fn get_reservation(&mut self, filter: &ReservationFilter)
        -> AppResult<Option<Reservation>>;

    /// Stamp the cancellation date; matches only a reservation that is not
    /// cancelled yet.
    async fn cancel_reservation(
        &mut self,
        reservation_id: Uuid,
        cancellation_date: DateTime<Utc>,
    ) -> AppResult<bool>;
}

#[async_trait]
pub trait BookingTransaction: SeatLedger + FlightSeatIndex + ReservationJournal {
    async fn commit(self: Box<Self>) -> AppResult<()>;

    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// A datastore that can open booking transactions and answer
/// non-transactional reads. Reads through this trait must never drive a
/// booking decision.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn BookingTransaction>>;

    async fn get_flight(&self, flight_id: Uuid) -> AppResult<Option<Flight>>;

    async fn get_seat(&self, filter: &SeatFilter) -> AppResult<Option<Seat>>;

    async fn list_seats(&self, flight_id: Uuid, available_only: bool) -> AppResult<Vec<Seat>>;

    async fn get_reservation(&self, filter: &ReservationFilter) -> AppResult<Option<Reservation>>;

    /// Reservations in insertion order.
    async fn list_reservations(
        &self,
        filter: &ReservationFilter,
        page: Page,
    ) -> AppResult<Vec<Reservation>>;
}
