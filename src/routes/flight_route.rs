use crate::models::flight::Flight;
use crate::models::seat::SeatListResponse;
use crate::routes::parse_id;
use crate::services::flight_service::FlightService;
use crate::utils::error::AppError;
use crate::utils::jwt::AuthenticatedUser;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

/// Get a flight with its currently bookable seat ids
#[openapi(tag = "Flights")]
#[get("/flights/<flight_id>")]
pub async fn get_flight(
    flight_id: String,
    _auth: AuthenticatedUser,
    flight_service: &State<FlightService>,
) -> Result<Json<Flight>, AppError> {
    let flight_id = parse_id(&flight_id, "flight")?;
    let flight = flight_service.get_flight(flight_id).await?;
    Ok(Json(flight))
}

/// List a flight's seats; `available=true` keeps only bookable ones
#[openapi(tag = "Flights")]
#[get("/flights/<flight_id>/seats?<available>")]
pub async fn get_seats(
    flight_id: String,
    available: Option<bool>,
    _auth: AuthenticatedUser,
    flight_service: &State<FlightService>,
) -> Result<Json<SeatListResponse>, AppError> {
    let flight_id = parse_id(&flight_id, "flight")?;
    let seats = flight_service
        .get_seats(flight_id, available.unwrap_or(false))
        .await?;
    Ok(Json(seats))
}
