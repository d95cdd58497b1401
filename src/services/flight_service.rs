use crate::db::BookingStore;
use crate::models::flight::Flight;
use crate::models::seat::SeatListResponse;
use crate::utils::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

// Flight and seat reads for the HTTP layer. Nothing here is transactional and
// nothing here may be used to decide whether a booking goes through.
#[derive(Clone)]
pub struct FlightService {
    store: Arc<dyn BookingStore>,
}

impl FlightService {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        FlightService { store }
    }

    pub async fn get_flight(&self, flight_id: Uuid) -> AppResult<Flight> {
        self.store
            .get_flight(flight_id)
            .await?
            .ok_or_else(|| AppError::FlightNotFound(flight_id.to_string()))
    }

    // Get all seats of a flight, or only the bookable ones
    pub async fn get_seats(
        &self,
        flight_id: Uuid,
        available_only: bool,
    ) -> AppResult<SeatListResponse> {
        // 404 for unknown flights rather than an empty list
        self.get_flight(flight_id).await?;

        let seats = self.store.list_seats(flight_id, available_only).await?;
        Ok(SeatListResponse { flight_id, seats })
    }

    /// Business pre-checks run before asking the engine for a seat: the
    /// flight exists, still has open seats and has not departed.
    pub async fn ensure_bookable(&self, flight_id: Uuid, now: DateTime<Utc>) -> AppResult<Flight> {
        let flight = self.get_flight(flight_id).await?;

        if !flight.has_open_seats() {
            return Err(AppError::Conflict("No seats available".into()));
        }
        if flight.has_departed(now) {
            return Err(AppError::Unprocessable("Flight already departed".into()));
        }

        Ok(flight)
    }
}
