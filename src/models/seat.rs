use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlRow;
use sqlx::{FromRow, Row};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

// Seat Class Enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatClass {
    Economy,
    Business,
    First,
}

// Seat Location Enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatLocation {
    Aisle,
    Middle,
    Window,
}

/// One bookable unit on a flight.
///
/// `available` is false exactly when one non-cancelled reservation points at
/// this seat. Only the booking engine flips it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Seat {
    pub id: Uuid,
    pub flight_id: Uuid,
    pub number: i32,
    pub price: Decimal,
    pub class: SeatClass,
    pub location: SeatLocation,
    pub available: bool,
}

impl Seat {
    /// Seed helper: bulk-generate `count` available seats for a flight,
    /// cycling through classes and locations by seat number. Used by
    /// [`MemoryStore::insert_generated_seats`](crate::db::MemoryStore::insert_generated_seats)
    /// and test fixtures; seat creation proper belongs to the flight CRUD layer.
    pub fn generate(flight_id: Uuid, count: i32, price: Decimal) -> Vec<Seat> {
        const CLASSES: [SeatClass; 3] = [SeatClass::Economy, SeatClass::Business, SeatClass::First];
        const LOCATIONS: [SeatLocation; 3] =
            [SeatLocation::Aisle, SeatLocation::Middle, SeatLocation::Window];

        (0..count)
            .map(|number| Seat {
                id: Uuid::new_v4(),
                flight_id,
                number,
                price,
                class: CLASSES[(number % 3) as usize],
                location: LOCATIONS[(number % 3) as usize],
                available: true,
            })
            .collect()
    }
}

// class and location are stored as VARCHAR, so the row is mapped by hand
impl<'r> FromRow<'r, MySqlRow> for Seat {
    fn from_row(row: &'r MySqlRow) -> Result<Self, sqlx::Error> {
        let class: String = row.try_get("seat_class")?;
        let location: String = row.try_get("seat_location")?;

        Ok(Seat {
            id: row.try_get("id")?,
            flight_id: row.try_get("flight_id")?,
            number: row.try_get("number")?,
            price: row.try_get("price")?,
            class: class.parse().map_err(|e: strum::ParseError| sqlx::Error::ColumnDecode {
                index: "seat_class".into(),
                source: Box::new(e),
            })?,
            location: location.parse().map_err(|e: strum::ParseError| {
                sqlx::Error::ColumnDecode {
                    index: "seat_location".into(),
                    source: Box::new(e),
                }
            })?,
            available: row.try_get("available")?,
        })
    }
}

/// Identifies exactly one seat, optionally scoped to the flight it must belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatFilter {
    pub seat_id: Uuid,
    pub flight_id: Option<Uuid>,
}

impl SeatFilter {
    pub fn by_id(seat_id: Uuid) -> Self {
        SeatFilter { seat_id, flight_id: None }
    }

    pub fn on_flight(flight_id: Uuid, seat_id: Uuid) -> Self {
        SeatFilter { seat_id, flight_id: Some(flight_id) }
    }

    pub fn matches(&self, seat: &Seat) -> bool {
        seat.id == self.seat_id && self.flight_id.map_or(true, |id| id == seat.flight_id)
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SeatListResponse {
    pub flight_id: Uuid,
    pub seats: Vec<Seat>,
}
