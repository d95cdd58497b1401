use crate::db::{BookingStore, BookingTransaction};
use crate::models::pagination::Page;
use crate::models::reservation::{Reservation, ReservationFilter};
use crate::models::seat::SeatFilter;
use crate::services::retry::RetryPolicy;
use crate::utils::error::{AppError, AppResult};
use chrono::Utc;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Who asked for a cancellation. Authorization has already happened by the
/// time the engine sees this; it is only recorded in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canceller {
    pub user_id: Uuid,
    pub is_admin: bool,
}

/// The booking transaction engine.
///
/// Creating and cancelling a reservation each run as one transaction across
/// the seat ledger, the flight seat index and the reservation journal. A
/// failure at any step rolls back all three, so a seat is never left
/// half-booked or half-freed.
#[derive(Clone)]
pub struct ReservationService {
    store: Arc<dyn BookingStore>,
    retry: RetryPolicy,
}

impl ReservationService {
    pub fn new(store: Arc<dyn BookingStore>, retry: RetryPolicy) -> Self {
        ReservationService { store, retry }
    }

    /// Reserve the seat identified by `seat` for `user_id`.
    ///
    /// Fails with `SeatUnavailable` if the seat is already taken, including
    /// when a concurrent booking for the same seat commits first.
    pub async fn create_reservation(
        &self,
        seat: SeatFilter,
        user_id: Uuid,
    ) -> AppResult<Reservation> {
        let span = tracing::info_span!("create_reservation", seat_id = %seat.seat_id, %user_id);

        async {
            let reservation_id = self
                .retry
                .run("create_reservation", |attempt| self.try_create(&seat, user_id, attempt))
                .await?;

            // read back what was committed
            let reservation = self
                .store
                .get_reservation(&ReservationFilter::by_id(reservation_id))
                .await?
                .ok_or_else(|| AppError::ReservationNotFound(reservation_id.to_string()))?;

            tracing::info!(reservation_id = %reservation.id, "reservation created");
            Ok::<_, AppError>(reservation)
        }
        .instrument(span)
        .await
    }

    /// Cancel the reservation matched by `filter` and put its seat back on sale.
    pub async fn cancel_reservation(
        &self,
        filter: ReservationFilter,
        cancelled_by: Canceller,
    ) -> AppResult<()> {
        let span = tracing::info_span!(
            "cancel_reservation",
            reservation_id = ?filter.id,
            user_id = %cancelled_by.user_id,
        );

        async {
            let reservation_id = self
                .retry
                .run("cancel_reservation", |attempt| self.try_cancel(&filter, attempt))
                .await?;

            if cancelled_by.is_admin {
                tracing::info!(%reservation_id, cancelled_by = "admin", "reservation cancelled");
            } else {
                tracing::info!(%reservation_id, cancelled_by = "owner", "reservation cancelled");
            }
            Ok::<_, AppError>(())
        }
        .instrument(span)
        .await
    }

    pub async fn get_reservation(&self, filter: ReservationFilter) -> AppResult<Reservation> {
        self.store
            .get_reservation(&filter)
            .await?
            .ok_or_else(|| AppError::ReservationNotFound(describe(&filter)))
    }

    // Read path; no transaction
    pub async fn list_reservations(
        &self,
        filter: ReservationFilter,
        page: Page,
    ) -> AppResult<Vec<Reservation>> {
        self.store.list_reservations(&filter, page).await
    }

    async fn try_create(&self, seat: &SeatFilter, user_id: Uuid, attempt: u32) -> AppResult<Uuid> {
        tracing::debug!(attempt, "starting booking transaction");
        let deadline = self.retry.deadline();
        let mut tx = self.retry.within(deadline, self.begin()).await?;

        match self.retry.within(deadline, create_in(tx.as_mut(), seat, user_id)).await {
            Ok(reservation_id) => {
                commit(tx).await?;
                Ok(reservation_id)
            }
            Err(err) => {
                abort(tx, &err).await;
                Err(err)
            }
        }
    }

    async fn try_cancel(&self, filter: &ReservationFilter, attempt: u32) -> AppResult<Uuid> {
        tracing::debug!(attempt, "starting cancellation transaction");
        let deadline = self.retry.deadline();
        let mut tx = self.retry.within(deadline, self.begin()).await?;

        match self.retry.within(deadline, cancel_in(tx.as_mut(), filter)).await {
            Ok(reservation_id) => {
                commit(tx).await?;
                Ok(reservation_id)
            }
            Err(err) => {
                abort(tx, &err).await;
                Err(err)
            }
        }
    }

    async fn begin(&self) -> AppResult<Box<dyn BookingTransaction>> {
        self.store.begin().await.map_err(|err| match err {
            AppError::WriteConflict(_) => err,
            other => AppError::TransactionAborted(format!("could not start transaction: {}", other)),
        })
    }
}

async fn create_in(
    tx: &mut dyn BookingTransaction,
    filter: &SeatFilter,
    user_id: Uuid,
) -> AppResult<Uuid> {
    let now = Utc::now();

    let seat = tx
        .get_seat(filter)
        .await?
        .ok_or_else(|| AppError::SeatNotFound(filter.seat_id.to_string()))?;

    if !seat.available {
        return Err(AppError::SeatUnavailable(seat.id.to_string()));
    }

    // matches zero rows if someone else flipped it after our read
    if !tx.set_availability(seat.id, false, seat.price).await? {
        return Err(AppError::SeatUnavailable(seat.id.to_string()));
    }

    if !tx.remove_seat(seat.flight_id, seat.id).await? {
        return Err(AppError::FlightNotFound(seat.flight_id.to_string()));
    }

    let reservation = tx.create_reservation(seat.id, user_id, now).await?;
    Ok(reservation.id)
}

async fn cancel_in(tx: &mut dyn BookingTransaction, filter: &ReservationFilter) -> AppResult<Uuid> {
    let now = Utc::now();

    let reservation = tx
        .get_reservation(filter)
        .await?
        .ok_or_else(|| AppError::ReservationNotFound(describe(filter)))?;

    if reservation.is_cancelled() {
        return Err(AppError::AlreadyCancelled(reservation.id.to_string()));
    }

    let seat = tx
        .get_seat(&SeatFilter::by_id(reservation.seat_id))
        .await?
        .ok_or_else(|| AppError::SeatNotFound(reservation.seat_id.to_string()))?;

    if !tx.set_availability(seat.id, true, seat.price).await? {
        return Err(AppError::Conflict(format!(
            "seat {} is not held by reservation {}",
            seat.id, reservation.id
        )));
    }

    if !tx.add_seat(seat.flight_id, seat.id).await? {
        return Err(AppError::FlightNotFound(seat.flight_id.to_string()));
    }

    if !tx.cancel_reservation(reservation.id, now).await? {
        return Err(AppError::AlreadyCancelled(reservation.id.to_string()));
    }

    Ok(reservation.id)
}

// Commit runs without a deadline. A rejected commit applied nothing and may be
// retried; any other failure leaves the outcome unknown, so the workflow must
// not run again.
async fn commit(tx: Box<dyn BookingTransaction>) -> AppResult<()> {
    tx.commit().await.map_err(|err| match err {
        AppError::WriteConflict(_) => err,
        other => {
            tracing::error!(error = %other, "commit outcome unknown");
            AppError::TransactionAborted(format!("commit outcome unknown: {}", other))
        }
    })
}

async fn abort(tx: Box<dyn BookingTransaction>, cause: &AppError) {
    if cause.is_retryable() || cause.status().code >= 500 {
        tracing::warn!(error = %cause, "rolling back booking transaction");
    } else {
        tracing::debug!(error = %cause, "rolling back booking transaction");
    }
    if let Err(err) = tx.rollback().await {
        tracing::error!(error = %err, "rollback failed");
    }
}

fn describe(filter: &ReservationFilter) -> String {
    match filter.id {
        Some(id) => id.to_string(),
        None => format!("{:?}", filter),
    }
}
