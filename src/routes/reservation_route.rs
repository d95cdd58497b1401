use crate::models::pagination::Page;
use crate::models::reservation::{
    CancellationResponse, Reservation, ReservationFilter, ReservationListResponse,
};
use crate::models::seat::SeatFilter;
use crate::routes::parse_id;
use crate::services::flight_service::FlightService;
use crate::services::reservation_service::{Canceller, ReservationService};
use crate::utils::error::AppError;
use crate::utils::jwt::AuthenticatedUser;
use chrono::Utc;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

/// Reserve a seat on a flight
#[openapi(tag = "Reservations")]
#[post("/flights/<flight_id>/seats/<seat_id>/reservations")]
pub async fn create_reservation(
    flight_id: String,
    seat_id: String,
    auth: AuthenticatedUser,
    flight_service: &State<FlightService>,
    reservation_service: &State<ReservationService>,
) -> Result<status::Created<Json<Reservation>>, AppError> {
    let flight_id = parse_id(&flight_id, "flight")?;
    let seat_id = parse_id(&seat_id, "seat")?;

    flight_service.ensure_bookable(flight_id, Utc::now()).await?;

    let reservation = reservation_service
        .create_reservation(SeatFilter::on_flight(flight_id, seat_id), auth.user_id)
        .await?;

    let location = format!("/api/reservations/{}", reservation.id);
    Ok(status::Created::new(location).body(Json(reservation)))
}

/// List the caller's reservations
#[openapi(tag = "Reservations")]
#[get("/reservations?<page>&<limit>")]
pub async fn list_my_reservations(
    page: Option<u32>,
    limit: Option<u32>,
    auth: AuthenticatedUser,
    reservation_service: &State<ReservationService>,
) -> Result<Json<ReservationListResponse>, AppError> {
    let page = Page::new(page, limit);
    let reservations = reservation_service
        .list_reservations(ReservationFilter::by_user(auth.user_id), page)
        .await?;

    Ok(Json(ReservationListResponse {
        page: page.page,
        limit: page.limit,
        reservations,
    }))
}

/// List every reservation (admin only)
#[openapi(tag = "Admin")]
#[get("/admin/reservations?<page>&<limit>")]
pub async fn list_all_reservations(
    page: Option<u32>,
    limit: Option<u32>,
    auth: AuthenticatedUser,
    reservation_service: &State<ReservationService>,
) -> Result<Json<ReservationListResponse>, AppError> {
    if !auth.is_admin {
        return Err(AppError::Forbidden("admin access required".into()));
    }

    let page = Page::new(page, limit);
    let reservations = reservation_service
        .list_reservations(ReservationFilter::default(), page)
        .await?;

    Ok(Json(ReservationListResponse {
        page: page.page,
        limit: page.limit,
        reservations,
    }))
}

/// Get one reservation (owner or admin)
#[openapi(tag = "Reservations")]
#[get("/reservations/<reservation_id>")]
pub async fn get_reservation(
    reservation_id: String,
    auth: AuthenticatedUser,
    reservation_service: &State<ReservationService>,
) -> Result<Json<Reservation>, AppError> {
    let reservation_id = parse_id(&reservation_id, "reservation")?;
    let reservation = reservation_service
        .get_reservation(ReservationFilter::by_id(reservation_id))
        .await?;

    if !auth.can_access(reservation.user_id) {
        return Err(AppError::Forbidden("not your reservation".into()));
    }
    Ok(Json(reservation))
}

/// Cancel a reservation (owner or admin)
#[openapi(tag = "Reservations")]
#[delete("/reservations/<reservation_id>")]
pub async fn cancel_reservation(
    reservation_id: String,
    auth: AuthenticatedUser,
    reservation_service: &State<ReservationService>,
) -> Result<Json<CancellationResponse>, AppError> {
    let reservation_id = parse_id(&reservation_id, "reservation")?;
    let filter = ReservationFilter::by_id(reservation_id);

    // ownership is checked here; the engine does not authorize
    let reservation = reservation_service.get_reservation(filter).await?;
    if !auth.can_access(reservation.user_id) {
        return Err(AppError::Forbidden("not your reservation".into()));
    }

    reservation_service
        .cancel_reservation(
            filter,
            Canceller {
                user_id: auth.user_id,
                is_admin: auth.is_admin,
            },
        )
        .await?;

    Ok(Json(CancellationResponse {
        reservation_id,
        status: "cancelled".to_string(),
    }))
}
