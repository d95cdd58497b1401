use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One booking event. Once `cancellation_date` is set the record is terminal;
/// booking the seat again produces a new reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, sqlx::FromRow)]
pub struct Reservation {
    pub id: Uuid,
    pub seat_id: Uuid,
    pub user_id: Uuid,
    pub reservation_date: DateTime<Utc>,
    pub cancellation_date: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn new(seat_id: Uuid, user_id: Uuid, reservation_date: DateTime<Utc>) -> Self {
        Reservation {
            id: Uuid::new_v4(),
            seat_id,
            user_id,
            reservation_date,
            cancellation_date: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_date.is_some()
    }
}

/// Conjunctive filter over reservations; unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReservationFilter {
    pub id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub seat_id: Option<Uuid>,
    pub active_only: bool,
}

impl ReservationFilter {
    pub fn by_id(id: Uuid) -> Self {
        ReservationFilter { id: Some(id), ..Default::default() }
    }

    pub fn by_user(user_id: Uuid) -> Self {
        ReservationFilter { user_id: Some(user_id), ..Default::default() }
    }

    pub fn by_seat(seat_id: Uuid) -> Self {
        ReservationFilter { seat_id: Some(seat_id), ..Default::default() }
    }

    pub fn active(mut self) -> Self {
        self.active_only = true;
        self
    }

    pub fn matches(&self, reservation: &Reservation) -> bool {
        self.id.map_or(true, |id| id == reservation.id)
            && self.user_id.map_or(true, |id| id == reservation.user_id)
            && self.seat_id.map_or(true, |id| id == reservation.seat_id)
            && !(self.active_only && reservation.is_cancelled())
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ReservationListResponse {
    pub page: u32,
    pub limit: u32,
    pub reservations: Vec<Reservation>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct CancellationResponse {
    pub reservation_id: Uuid,
    pub status: String,
}
