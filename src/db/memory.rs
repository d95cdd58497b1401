//! In-memory [`BookingStore`] with snapshot isolation.
//!
//! Each transaction reads from the committed state as of `begin`, plus its own
//! writes. Commit validates first-committer-wins: if any record in the write
//! set was committed by someone else after the snapshot was taken, the commit
//! fails with [`AppError::WriteConflict`] and nothing is applied. Flight seat
//! index entries are versioned per `(flight, seat)` pair, so bookings of
//! different seats on one flight never conflict with each other.
//!
//! Used by the test suite and for local runs without MySQL. The seeding
//! helpers stand in for the flight CRUD layer that owns seat generation.

use crate::db::{BookingStore, BookingTransaction, FlightSeatIndex, ReservationJournal, SeatLedger};
use crate::models::flight::Flight;
use crate::models::pagination::Page;
use crate::models::reservation::{Reservation, ReservationFilter};
use crate::models::seat::{Seat, SeatFilter};
use crate::utils::error::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Versioned<T> {
    value: T,
    version: u64,
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    // sequence number of the last commit included in this state
    seq: u64,
    flights: HashMap<Uuid, Flight>,
    flight_seats: HashMap<Uuid, IndexSet<Uuid>>,
    flight_seat_versions: HashMap<(Uuid, Uuid), u64>,
    seats: HashMap<Uuid, Versioned<Seat>>,
    reservations: IndexMap<Uuid, Versioned<Reservation>>,
}

impl Snapshot {
    fn flight(&self, flight_id: Uuid) -> Option<Flight> {
        let mut flight = self.flights.get(&flight_id)?.clone();
        flight.seats = self
            .flight_seats
            .get(&flight_id)
            .map(|seats| seats.iter().copied().collect())
            .unwrap_or_default();
        Some(flight)
    }

    fn seat(&self, filter: &SeatFilter) -> Option<Seat> {
        self.seats
            .get(&filter.seat_id)
            .map(|record| &record.value)
            .filter(|seat| filter.matches(seat))
            .cloned()
    }

    fn reservations<'a>(
        &'a self,
        filter: &'a ReservationFilter,
    ) -> impl Iterator<Item = &'a Reservation> + 'a {
        self.reservations
            .values()
            .map(|record| &record.value)
            .filter(move |reservation| filter.matches(reservation))
    }

    fn last_written(&self, key: &WriteKey) -> u64 {
        match key {
            WriteKey::Seat(id) => self.seats.get(id).map_or(0, |r| r.version),
            WriteKey::Reservation(id) => self.reservations.get(id).map_or(0, |r| r.version),
            WriteKey::FlightSeat(flight_id, seat_id) => self
                .flight_seat_versions
                .get(&(*flight_id, *seat_id))
                .copied()
                .unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum WriteKey {
    Seat(Uuid),
    FlightSeat(Uuid, Uuid),
    Reservation(Uuid),
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    committed: Arc<RwLock<Arc<Snapshot>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flight. Its `seats` become the initial bookable index.
    pub async fn insert_flight(&self, flight: Flight) {
        let mut guard = self.committed.write().await;
        let state = Arc::make_mut(&mut *guard);
        state.seq += 1;
        state
            .flight_seats
            .insert(flight.id, flight.seats.iter().copied().collect());
        state.flights.insert(flight.id, Flight { seats: Vec::new(), ..flight });
    }

    /// Register a seat on an existing flight; available seats join the
    /// flight's bookable index.
    pub async fn insert_seat(&self, seat: Seat) -> AppResult<()> {
        let mut guard = self.committed.write().await;
        let state = Arc::make_mut(&mut *guard);
        if !state.flights.contains_key(&seat.flight_id) {
            return Err(AppError::FlightNotFound(seat.flight_id.to_string()));
        }

        state.seq += 1;
        let version = state.seq;
        if seat.available {
            state.flight_seats.entry(seat.flight_id).or_default().insert(seat.id);
            state.flight_seat_versions.insert((seat.flight_id, seat.id), version);
        }
        state.seats.insert(seat.id, Versioned { value: seat, version });
        Ok(())
    }

    /// Generate `count` available seats on an existing flight and register
    /// them all.
    pub async fn insert_generated_seats(
        &self,
        flight_id: Uuid,
        count: i32,
        price: Decimal,
    ) -> AppResult<Vec<Seat>> {
        let seats = Seat::generate(flight_id, count, price);
        for seat in &seats {
            self.insert_seat(seat.clone()).await?;
        }
        Ok(seats)
    }

    async fn snapshot(&self) -> Arc<Snapshot> {
        self.committed.read().await.clone()
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn BookingTransaction>> {
        Ok(Box::new(MemoryTransaction {
            committed: self.committed.clone(),
            base: self.snapshot().await,
            local: None,
            writes: IndexSet::new(),
        }))
    }

    async fn get_flight(&self, flight_id: Uuid) -> AppResult<Option<Flight>> {
        Ok(self.snapshot().await.flight(flight_id))
    }

    async fn get_seat(&self, filter: &SeatFilter) -> AppResult<Option<Seat>> {
        Ok(self.snapshot().await.seat(filter))
    }

    async fn list_seats(&self, flight_id: Uuid, available_only: bool) -> AppResult<Vec<Seat>> {
        let snapshot = self.snapshot().await;
        let mut seats: Vec<Seat> = snapshot
            .seats
            .values()
            .map(|record| &record.value)
            .filter(|seat| seat.flight_id == flight_id && (seat.available || !available_only))
            .cloned()
            .collect();
        seats.sort_by_key(|seat| seat.number);
        Ok(seats)
    }

    async fn get_reservation(&self, filter: &ReservationFilter) -> AppResult<Option<Reservation>> {
        Ok(self.snapshot().await.reservations(filter).next().cloned())
    }

    async fn list_reservations(
        &self,
        filter: &ReservationFilter,
        page: Page,
    ) -> AppResult<Vec<Reservation>> {
        let snapshot = self.snapshot().await;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        Ok(snapshot
            .reservations(filter)
            .skip(offset)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }
}

pub struct MemoryTransaction {
    committed: Arc<RwLock<Arc<Snapshot>>>,
    base: Arc<Snapshot>,
    // copy of `base` taken on first write
    local: Option<Snapshot>,
    writes: IndexSet<WriteKey>,
}

impl MemoryTransaction {
    fn view(&self) -> &Snapshot {
        self.local.as_ref().unwrap_or(self.base.as_ref())
    }

    fn view_mut(&mut self) -> &mut Snapshot {
        let base = &self.base;
        self.local.get_or_insert_with(|| Snapshot::clone(base))
    }

    fn set_membership(&mut self, flight_id: Uuid, seat_id: Uuid, member: bool) -> bool {
        let state = self.view_mut();
        if !state.flights.contains_key(&flight_id) {
            return false;
        }
        let seats = state.flight_seats.entry(flight_id).or_default();
        if member {
            seats.insert(seat_id);
        } else {
            seats.shift_remove(&seat_id);
        }
        self.writes.insert(WriteKey::FlightSeat(flight_id, seat_id));
        true
    }
}

#[async_trait]
impl SeatLedger for MemoryTransaction {
    async fn get_seat(&mut self, filter: &SeatFilter) -> AppResult<Option<Seat>> {
        Ok(self.view().seat(filter))
    }

    async fn set_availability(
        &mut self,
        seat_id: Uuid,
        available: bool,
        price: Decimal,
    ) -> AppResult<bool> {
        let state = self.view_mut();
        let record = match state.seats.get_mut(&seat_id) {
            Some(record) if record.value.available != available => record,
            _ => return Ok(false),
        };
        record.value.available = available;
        record.value.price = price;
        self.writes.insert(WriteKey::Seat(seat_id));
        Ok(true)
    }
}

#[async_trait]
impl FlightSeatIndex for MemoryTransaction {
    async fn remove_seat(&mut self, flight_id: Uuid, seat_id: Uuid) -> AppResult<bool> {
        Ok(self.set_membership(flight_id, seat_id, false))
    }

    async fn add_seat(&mut self, flight_id: Uuid, seat_id: Uuid) -> AppResult<bool> {
        Ok(self.set_membership(flight_id, seat_id, true))
    }
}

#[async_trait]
impl ReservationJournal for MemoryTransaction {
    async fn create_reservation(
        &mut self,
        seat_id: Uuid,
        user_id: Uuid,
        reservation_date: DateTime<Utc>,
    ) -> AppResult<Reservation> {
        let reservation = Reservation::new(seat_id, user_id, reservation_date);
        self.view_mut().reservations.insert(
            reservation.id,
            Versioned { value: reservation.clone(), version: 0 },
        );
        self.writes.insert(WriteKey::Reservation(reservation.id));
        Ok(reservation)
    }

    async fn get_reservation(
        &mut self,
        filter: &ReservationFilter,
    ) -> AppResult<Option<Reservation>> {
        Ok(self.view().reservations(filter).next().cloned())
    }

    async fn cancel_reservation(
        &mut self,
        reservation_id: Uuid,
        cancellation_date: DateTime<Utc>,
    ) -> AppResult<bool> {
        let state = self.view_mut();
        let record = match state.reservations.get_mut(&reservation_id) {
            Some(record) if !record.value.is_cancelled() => record,
            _ => return Ok(false),
        };
        record.value.cancellation_date = Some(cancellation_date);
        self.writes.insert(WriteKey::Reservation(reservation_id));
        Ok(true)
    }
}

#[async_trait]
impl BookingTransaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTransaction { committed, base, local, writes } = *self;
        let local = match local {
            Some(local) if !writes.is_empty() => local,
            _ => return Ok(()),
        };

        let mut guard = committed.write().await;
        if let Some(key) = writes.iter().find(|key| guard.last_written(key) > base.seq) {
            return Err(AppError::WriteConflict(format!(
                "{:?} was committed concurrently",
                key
            )));
        }

        let state = Arc::make_mut(&mut *guard);
        state.seq += 1;
        let version = state.seq;
        for key in &writes {
            match *key {
                WriteKey::Seat(id) => {
                    if let Some(record) = local.seats.get(&id) {
                        state.seats.insert(id, Versioned { value: record.value.clone(), version });
                    }
                }
                WriteKey::Reservation(id) => {
                    if let Some(record) = local.reservations.get(&id) {
                        state
                            .reservations
                            .insert(id, Versioned { value: record.value.clone(), version });
                    }
                }
                WriteKey::FlightSeat(flight_id, seat_id) => {
                    let member = local
                        .flight_seats
                        .get(&flight_id)
                        .map_or(false, |seats| seats.contains(&seat_id));
                    let seats = state.flight_seats.entry(flight_id).or_default();
                    if member {
                        seats.insert(seat_id);
                    } else {
                        seats.shift_remove(&seat_id);
                    }
                    state.flight_seat_versions.insert((flight_id, seat_id), version);
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn seeded_store() -> (MemoryStore, Flight, Vec<Seat>) {
        let store = MemoryStore::new();
        let flight = Flight {
            id: Uuid::new_v4(),
            airline: "Memory Air".into(),
            departure: "YYZ".into(),
            arrival: "YVR".into(),
            departure_time: Utc::now() + Duration::days(1),
            arrival_time: Utc::now() + Duration::days(1) + Duration::hours(5),
            seats: vec![],
        };
        store.insert_flight(flight.clone()).await;
        let seats = store
            .insert_generated_seats(flight.id, 3, Decimal::new(9900, 2))
            .await
            .unwrap();
        (store, flight, seats)
    }

    #[tokio::test]
    async fn generated_seats_join_the_index_of_a_known_flight_only() {
        let (store, flight, seats) = seeded_store().await;
        let indexed = store.get_flight(flight.id).await.unwrap().unwrap().seats;
        assert_eq!(indexed, seats.iter().map(|s| s.id).collect::<Vec<_>>());
        assert_eq!(store.list_seats(flight.id, true).await.unwrap(), seats);

        let missing = store
            .insert_generated_seats(Uuid::new_v4(), 2, Decimal::ONE)
            .await;
        assert!(matches!(missing, Err(AppError::FlightNotFound(_))));
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible_to_other_readers() {
        let (store, flight, seats) = seeded_store().await;
        let mut tx = store.begin().await.unwrap();

        assert!(tx.set_availability(seats[0].id, false, seats[0].price).await.unwrap());
        assert!(tx.remove_seat(flight.id, seats[0].id).await.unwrap());

        let seen = store.get_seat(&SeatFilter::by_id(seats[0].id)).await.unwrap().unwrap();
        assert!(seen.available);
        assert_eq!(store.get_flight(flight.id).await.unwrap().unwrap().seats.len(), 3);

        tx.commit().await.unwrap();
        let seen = store.get_seat(&SeatFilter::by_id(seats[0].id)).await.unwrap().unwrap();
        assert!(!seen.available);
        assert_eq!(store.get_flight(flight.id).await.unwrap().unwrap().seats.len(), 2);
    }

    #[tokio::test]
    async fn second_writer_of_the_same_seat_conflicts() {
        let (store, _, seats) = seeded_store().await;
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        assert!(first.set_availability(seats[0].id, false, seats[0].price).await.unwrap());
        assert!(second.set_availability(seats[0].id, false, seats[0].price).await.unwrap());

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn different_seats_on_one_flight_commit_independently() {
        let (store, flight, seats) = seeded_store().await;
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        first.remove_seat(flight.id, seats[0].id).await.unwrap();
        second.remove_seat(flight.id, seats[1].id).await.unwrap();
        first.commit().await.unwrap();
        second.commit().await.unwrap();

        let flight = store.get_flight(flight.id).await.unwrap().unwrap();
        assert_eq!(flight.seats, vec![seats[2].id]);
    }

    #[tokio::test]
    async fn index_writes_are_set_operations() {
        let (store, flight, seats) = seeded_store().await;
        let mut tx = store.begin().await.unwrap();

        assert!(tx.add_seat(flight.id, seats[0].id).await.unwrap());
        assert!(tx.remove_seat(flight.id, seats[1].id).await.unwrap());
        assert!(tx.remove_seat(flight.id, seats[1].id).await.unwrap());
        assert!(!tx.remove_seat(Uuid::new_v4(), seats[1].id).await.unwrap());
        tx.commit().await.unwrap();

        let flight = store.get_flight(flight.id).await.unwrap().unwrap();
        assert_eq!(flight.seats, vec![seats[0].id, seats[2].id]);
    }

    #[tokio::test]
    async fn rollback_discards_every_write() {
        let (store, _, seats) = seeded_store().await;
        let mut tx = store.begin().await.unwrap();
        tx.create_reservation(seats[0].id, Uuid::new_v4(), Utc::now()).await.unwrap();
        tx.rollback().await.unwrap();

        let all = store
            .list_reservations(&ReservationFilter::default(), Page::default())
            .await
            .unwrap();
        assert!(all.is_empty());
    }
}
