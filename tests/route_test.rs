use airline_reservation_system::{
    build_rocket,
    config::JwtConfig,
    db::{BookingStore, MemoryStore},
    models::{
        flight::Flight,
        reservation::{Reservation, ReservationFilter},
        seat::Seat,
    },
    services::retry::RetryPolicy,
    utils::jwt::generate_token,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rocket::http::{Header, Status};
use rocket::local::asynchronous::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use test_context::{test_context, AsyncTestContext};
use uuid::Uuid;

const SECRET: &str = "route-test-secret";

struct ApiContext {
    client: Client,
    store: Arc<MemoryStore>,
    flight: Flight,
    seats: Vec<Seat>,
}

async fn seed_flight(store: &MemoryStore, departure_in: Duration) -> (Flight, Vec<Seat>) {
    let departure_time = Utc::now() + departure_in;
    let flight = Flight {
        id: Uuid::new_v4(),
        airline: "Maple Air".to_string(),
        departure: "Montreal".to_string(),
        arrival: "Calgary".to_string(),
        departure_time,
        arrival_time: departure_time + Duration::hours(4),
        seats: Vec::new(),
    };
    store.insert_flight(flight.clone()).await;

    let seats = store
        .insert_generated_seats(flight.id, 3, Decimal::new(19900, 2))
        .await
        .expect("Failed to seed seats");
    (flight, seats)
}

#[async_trait]
impl AsyncTestContext for ApiContext {
    async fn setup() -> Self {
        let store = Arc::new(MemoryStore::new());
        let (flight, seats) = seed_flight(&store, Duration::days(3)).await;

        let rocket = build_rocket(
            store.clone(),
            JwtConfig { secret: SECRET.to_string() },
            RetryPolicy::default(),
        );
        let client = Client::tracked(rocket)
            .await
            .expect("valid rocket instance");

        ApiContext { client, store, flight, seats }
    }

    async fn teardown(self) {}
}

fn bearer(user_id: Uuid, is_admin: bool) -> Header<'static> {
    let token = generate_token(user_id, is_admin, SECRET).unwrap();
    Header::new("Authorization", format!("Bearer {}", token))
}

impl ApiContext {
    fn booking_uri(&self, seat: usize) -> String {
        format!(
            "/api/flights/{}/seats/{}/reservations",
            self.flight.id, self.seats[seat].id
        )
    }

    async fn book(&self, seat: usize, user_id: Uuid) -> Reservation {
        let response = self
            .client
            .post(self.booking_uri(seat))
            .header(bearer(user_id, false))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        response.into_json::<Reservation>().await.unwrap()
    }

    async fn stored(&self, reservation_id: Uuid) -> Reservation {
        self.store
            .get_reservation(&ReservationFilter::by_id(reservation_id))
            .await
            .unwrap()
            .unwrap()
    }
}

#[test_context(ApiContext)]
#[tokio::test]
async fn test_book_seat_returns_created(ctx: &ApiContext) {
    let user_id = Uuid::new_v4();
    let response = ctx
        .client
        .post(ctx.booking_uri(0))
        .header(bearer(user_id, false))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Created);
    let location = response.headers().get_one("Location").map(str::to_string);
    let reservation = response.into_json::<Reservation>().await.unwrap();
    assert_eq!(reservation.user_id, user_id);
    assert_eq!(reservation.seat_id, ctx.seats[0].id);
    assert_eq!(location, Some(format!("/api/reservations/{}", reservation.id)));
}

#[test_context(ApiContext)]
#[tokio::test]
async fn test_booking_taken_seat_is_conflict(ctx: &ApiContext) {
    ctx.book(1, Uuid::new_v4()).await;

    let response = ctx
        .client
        .post(ctx.booking_uri(1))
        .header(bearer(Uuid::new_v4(), false))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Conflict);

    let body = response.into_json::<Value>().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains(&ctx.seats[1].id.to_string()));
}

#[test_context(ApiContext)]
#[tokio::test]
async fn test_requests_without_token_are_unauthorized(ctx: &ApiContext) {
    let response = ctx.client.post(ctx.booking_uri(0)).dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);

    let response = ctx
        .client
        .get("/api/reservations")
        .header(Header::new("Authorization", "Bearer not-a-token"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test_context(ApiContext)]
#[tokio::test]
async fn test_malformed_ids_are_bad_requests(ctx: &ApiContext) {
    let response = ctx
        .client
        .post(format!("/api/flights/{}/seats/12/reservations", ctx.flight.id))
        .header(bearer(Uuid::new_v4(), false))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
}

#[test_context(ApiContext)]
#[tokio::test]
async fn test_departed_flight_cannot_be_booked(ctx: &ApiContext) {
    let (departed, seats) = seed_flight(&ctx.store, Duration::hours(-2)).await;

    let response = ctx
        .client
        .post(format!("/api/flights/{}/seats/{}/reservations", departed.id, seats[0].id))
        .header(bearer(Uuid::new_v4(), false))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::UnprocessableEntity);
}

#[test_context(ApiContext)]
#[tokio::test]
async fn test_only_owner_or_admin_can_read(ctx: &ApiContext) {
    let owner = Uuid::new_v4();
    let reservation = ctx.book(0, owner).await;
    let uri = format!("/api/reservations/{}", reservation.id);

    let response = ctx.client.get(uri.clone()).header(bearer(owner, false)).dispatch().await;
    assert_eq!(response.status(), Status::Ok);

    let response = ctx
        .client
        .get(uri.clone())
        .header(bearer(Uuid::new_v4(), false))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    let response = ctx
        .client
        .get(uri)
        .header(bearer(Uuid::new_v4(), true))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
}

#[test_context(ApiContext)]
#[tokio::test]
async fn test_stranger_cannot_cancel(ctx: &ApiContext) {
    let reservation = ctx.book(2, Uuid::new_v4()).await;

    let response = ctx
        .client
        .delete(format!("/api/reservations/{}", reservation.id))
        .header(bearer(Uuid::new_v4(), false))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    // the engine never ran
    assert!(!ctx.stored(reservation.id).await.is_cancelled());
}

#[test_context(ApiContext)]
#[tokio::test]
async fn test_owner_cancel_then_cancel_again(ctx: &ApiContext) {
    let owner = Uuid::new_v4();
    let reservation = ctx.book(0, owner).await;
    let uri = format!("/api/reservations/{}", reservation.id);

    let response = ctx.client.delete(uri.clone()).header(bearer(owner, false)).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let body = response.into_json::<Value>().await.unwrap();
    assert_eq!(body["status"], "cancelled");
    assert!(ctx.stored(reservation.id).await.is_cancelled());

    let response = ctx.client.delete(uri).header(bearer(owner, false)).dispatch().await;
    assert_eq!(response.status(), Status::Conflict);

    let response = ctx
        .client
        .delete(format!("/api/reservations/{}", Uuid::new_v4()))
        .header(bearer(owner, false))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);
}

#[test_context(ApiContext)]
#[tokio::test]
async fn test_admin_cancels_any_reservation(ctx: &ApiContext) {
    let reservation = ctx.book(1, Uuid::new_v4()).await;

    let response = ctx
        .client
        .delete(format!("/api/reservations/{}", reservation.id))
        .header(bearer(Uuid::new_v4(), true))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    assert!(ctx.stored(reservation.id).await.is_cancelled());
}

#[test_context(ApiContext)]
#[tokio::test]
async fn test_reservation_listings(ctx: &ApiContext) {
    let user_id = Uuid::new_v4();
    ctx.book(0, user_id).await;
    ctx.book(1, user_id).await;
    ctx.book(2, Uuid::new_v4()).await;

    let response = ctx
        .client
        .get("/api/reservations?page=1&limit=1")
        .header(bearer(user_id, false))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body = response.into_json::<Value>().await.unwrap();
    assert_eq!(body["limit"], 1);
    assert_eq!(body["reservations"].as_array().unwrap().len(), 1);

    let response = ctx
        .client
        .get("/api/reservations")
        .header(bearer(user_id, false))
        .dispatch()
        .await;
    let body = response.into_json::<Value>().await.unwrap();
    assert_eq!(body["reservations"].as_array().unwrap().len(), 2);

    let response = ctx
        .client
        .get("/api/admin/reservations")
        .header(bearer(user_id, false))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    let response = ctx
        .client
        .get("/api/admin/reservations")
        .header(bearer(Uuid::new_v4(), true))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body = response.into_json::<Value>().await.unwrap();
    assert_eq!(body["reservations"].as_array().unwrap().len(), 3);
}

#[test_context(ApiContext)]
#[tokio::test]
async fn test_seat_listing_and_flight_lookup(ctx: &ApiContext) {
    ctx.book(0, Uuid::new_v4()).await;
    let auth = bearer(Uuid::new_v4(), false);

    let response = ctx
        .client
        .get(format!("/api/flights/{}/seats?available=true", ctx.flight.id))
        .header(auth.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body = response.into_json::<Value>().await.unwrap();
    assert_eq!(body["seats"].as_array().unwrap().len(), 2);

    let response = ctx
        .client
        .get(format!("/api/flights/{}", ctx.flight.id))
        .header(auth.clone())
        .dispatch()
        .await;
    let flight = response.into_json::<Flight>().await.unwrap();
    assert_eq!(flight.seats.len(), 2);
    assert!(!flight.seats.contains(&ctx.seats[0].id));

    let response = ctx
        .client
        .get(format!("/api/flights/{}", Uuid::new_v4()))
        .header(auth)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);
}
