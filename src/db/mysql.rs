use crate::config::DatabaseConfig;
use crate::db::{BookingStore, BookingTransaction, FlightSeatIndex, ReservationJournal, SeatLedger};
use crate::models::flight::Flight;
use crate::models::pagination::Page;
use crate::models::reservation::{Reservation, ReservationFilter};
use crate::models::seat::{Seat, SeatFilter};
use crate::utils::error::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::{MySql, MySqlPool, MySqlPoolOptions};
use sqlx::{Executor, QueryBuilder, Transaction};
use std::time::Duration;
use uuid::Uuid;

const SCHEMA: &str = include_str!("../../sql/schema.sql");

const SEAT_COLUMNS: &str =
    "SELECT id, flight_id, number, price, seat_class, seat_location, available FROM seat";

// MySQL-backed store. InnoDB gives every transaction a consistent snapshot at
// REPEATABLE READ; state transitions are guarded by conditional UPDATEs whose
// affected-row count is checked by the engine.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    // Create a new database connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET SESSION TRANSACTION ISOLATION LEVEL REPEATABLE READ")
                        .await?;
                    Ok(())
                })
            })
            .connect(&config.url)
            .await?;

        Ok(MySqlStore { pool })
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        MySqlStore { pool }
    }

    // Get a reference to the connection pool
    pub fn get_pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Create the tables if they do not exist yet.
    pub async fn create_schema(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn seat_query(filter: &SeatFilter) -> QueryBuilder<'static, MySql> {
    let mut builder = QueryBuilder::new(SEAT_COLUMNS);
    builder.push(" WHERE id = ").push_bind(filter.seat_id);
    if let Some(flight_id) = filter.flight_id {
        builder.push(" AND flight_id = ").push_bind(flight_id);
    }
    builder
}

fn reservation_query(
    filter: &ReservationFilter,
    page: Option<Page>,
    lock: bool,
) -> QueryBuilder<'static, MySql> {
    let mut builder = QueryBuilder::new(
        "SELECT id, seat_id, user_id, reservation_date, cancellation_date FROM reservation WHERE 1 = 1",
    );
    if let Some(id) = filter.id {
        builder.push(" AND id = ").push_bind(id);
    }
    if let Some(user_id) = filter.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(seat_id) = filter.seat_id {
        builder.push(" AND seat_id = ").push_bind(seat_id);
    }
    if filter.active_only {
        builder.push(" AND cancellation_date IS NULL");
    }
    builder.push(" ORDER BY seq");
    match page {
        Some(page) => {
            builder
                .push(" LIMIT ")
                .push_bind(u64::from(page.limit))
                .push(" OFFSET ")
                .push_bind(page.offset());
        }
        None => {
            builder.push(" LIMIT 1");
        }
    }
    if lock {
        builder.push(" FOR UPDATE");
    }
    builder
}

#[async_trait]
impl BookingStore for MySqlStore {
    async fn begin(&self) -> AppResult<Box<dyn BookingTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(MySqlBookingTransaction { tx }))
    }

    async fn get_flight(&self, flight_id: Uuid) -> AppResult<Option<Flight>> {
        let flight = sqlx::query_as::<_, Flight>(
            r#"
            SELECT id, airline, departure, arrival, departure_time, arrival_time
            FROM flight
            WHERE id = ?
            "#,
        )
        .bind(flight_id)
        .fetch_optional(&self.pool)
        .await?;

        let mut flight = match flight {
            Some(flight) => flight,
            None => return Ok(None),
        };

        flight.seats = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT fs.seat_id
            FROM flight_seat fs
            JOIN seat s ON s.id = fs.seat_id
            WHERE fs.flight_id = ?
            ORDER BY s.number
            "#,
        )
        .bind(flight_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(flight))
    }

    async fn get_seat(&self, filter: &SeatFilter) -> AppResult<Option<Seat>> {
        let seat = seat_query(filter)
            .build_query_as::<Seat>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(seat)
    }

    async fn list_seats(&self, flight_id: Uuid, available_only: bool) -> AppResult<Vec<Seat>> {
        let mut builder = QueryBuilder::<MySql>::new(SEAT_COLUMNS);
        builder.push(" WHERE flight_id = ").push_bind(flight_id);
        if available_only {
            builder.push(" AND available = TRUE");
        }
        builder.push(" ORDER BY number");

        let seats = builder.build_query_as::<Seat>().fetch_all(&self.pool).await?;
        Ok(seats)
    }

    async fn get_reservation(&self, filter: &ReservationFilter) -> AppResult<Option<Reservation>> {
        let reservation = reservation_query(filter, None, false)
            .build_query_as::<Reservation>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(reservation)
    }

    async fn list_reservations(
        &self,
        filter: &ReservationFilter,
        page: Page,
    ) -> AppResult<Vec<Reservation>> {
        let reservations = reservation_query(filter, Some(page), false)
            .build_query_as::<Reservation>()
            .fetch_all(&self.pool)
            .await?;
        Ok(reservations)
    }
}

// Dropping the inner sqlx transaction without commit issues a ROLLBACK
pub struct MySqlBookingTransaction {
    tx: Transaction<'static, MySql>,
}

#[async_trait]
impl SeatLedger for MySqlBookingTransaction {
    async fn get_seat(&mut self, filter: &SeatFilter) -> AppResult<Option<Seat>> {
        let mut builder = seat_query(filter);
        builder.push(" FOR UPDATE");
        let seat = builder
            .build_query_as::<Seat>()
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(seat)
    }

    async fn set_availability(
        &mut self,
        seat_id: Uuid,
        available: bool,
        price: Decimal,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE seat
            SET available = ?, price = ?
            WHERE id = ?
            AND available = ?
            "#,
        )
        .bind(available)
        .bind(price)
        .bind(seat_id)
        .bind(!available)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl MySqlBookingTransaction {
    async fn flight_exists(&mut self, flight_id: Uuid) -> AppResult<bool> {
        let flight = sqlx::query_scalar::<_, Uuid>("SELECT id FROM flight WHERE id = ?")
            .bind(flight_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(flight.is_some())
    }
}

#[async_trait]
impl FlightSeatIndex for MySqlBookingTransaction {
    async fn remove_seat(&mut self, flight_id: Uuid, seat_id: Uuid) -> AppResult<bool> {
        if !self.flight_exists(flight_id).await? {
            return Ok(false);
        }

        sqlx::query("DELETE FROM flight_seat WHERE flight_id = ? AND seat_id = ?")
            .bind(flight_id)
            .bind(seat_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(true)
    }

    async fn add_seat(&mut self, flight_id: Uuid, seat_id: Uuid) -> AppResult<bool> {
        if !self.flight_exists(flight_id).await? {
            return Ok(false);
        }

        // the primary key keeps this a set union
        sqlx::query("INSERT IGNORE INTO flight_seat (flight_id, seat_id) VALUES (?, ?)")
            .bind(flight_id)
            .bind(seat_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(true)
    }
}

#[async_trait]
impl ReservationJournal for MySqlBookingTransaction {
    async fn create_reservation(
        &mut self,
        seat_id: Uuid,
        user_id: Uuid,
        reservation_date: DateTime<Utc>,
    ) -> AppResult<Reservation> {
        let reservation = Reservation::new(seat_id, user_id, reservation_date);

        sqlx::query(
            r#"
            INSERT INTO reservation (id, seat_id, user_id, reservation_date)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(reservation.id)
        .bind(reservation.seat_id)
        .bind(reservation.user_id)
        .bind(reservation.reservation_date)
        .execute(&mut *self.tx)
        .await?;

        Ok(reservation)
    }

    async fn get_reservation(
        &mut self,
        filter: &ReservationFilter,
    ) -> AppResult<Option<Reservation>> {
        let reservation = reservation_query(filter, None, true)
            .build_query_as::<Reservation>()
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(reservation)
    }

    async fn cancel_reservation(
        &mut self,
        reservation_id: Uuid,
        cancellation_date: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reservation
            SET cancellation_date = ?
            WHERE id = ?
            AND cancellation_date IS NULL
            "#,
        )
        .bind(cancellation_date)
        .bind(reservation_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl BookingTransaction for MySqlBookingTransaction {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
