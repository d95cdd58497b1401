use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scheduled journey.
///
/// `seats` is the still-bookable subset of the flight's seats, not every seat
/// ever generated for it. It is maintained by the booking engine only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, sqlx::FromRow)]
pub struct Flight {
    pub id: Uuid,
    pub airline: String,
    pub departure: String,
    pub arrival: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    #[sqlx(skip)]
    pub seats: Vec<Uuid>,
}

impl Flight {
    pub fn has_departed(&self, now: DateTime<Utc>) -> bool {
        now >= self.departure_time || now >= self.arrival_time
    }

    pub fn has_open_seats(&self) -> bool {
        !self.seats.is_empty()
    }
}
