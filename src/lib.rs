#[macro_use]
extern crate rocket;
extern crate rocket_okapi;

pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
pub mod swagger;
pub mod utils;

use crate::config::JwtConfig;
use crate::db::BookingStore;
use crate::services::flight_service::FlightService;
use crate::services::reservation_service::ReservationService;
use crate::services::retry::RetryPolicy;
use crate::swagger::{rapidoc, swagger_ui};
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::rapidoc::make_rapidoc;
use rocket_okapi::swagger_ui::make_swagger_ui;
use std::sync::Arc;

/// Assemble the HTTP application over any booking store. The binary passes a
/// MySQL store; tests pass the in-memory one.
pub fn build_rocket(
    store: Arc<dyn BookingStore>,
    jwt: JwtConfig,
    retry: RetryPolicy,
) -> Rocket<Build> {
    let flight_service = FlightService::new(store.clone());
    let reservation_service = ReservationService::new(store, retry);

    rocket::build()
        .manage(jwt)
        .manage(flight_service)
        .manage(reservation_service)
        .mount(
            "/api",
            openapi_get_routes![
                routes::flight_route::get_flight,
                routes::flight_route::get_seats,
                routes::reservation_route::create_reservation,
                routes::reservation_route::list_my_reservations,
                routes::reservation_route::list_all_reservations,
                routes::reservation_route::get_reservation,
                routes::reservation_route::cancel_reservation,
            ],
        )
        .mount("/swagger", make_swagger_ui(&swagger_ui()))
        .mount("/rapidoc", make_rapidoc(&rapidoc()))
        .attach(AdHoc::on_response("CORS", |_, res| {
            Box::pin(async move {
                res.set_header(rocket::http::Header::new(
                    "Access-Control-Allow-Origin",
                    "*",
                ));
            })
        }))
}
