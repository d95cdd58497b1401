pub mod flight_service;
pub mod reservation_service;
pub mod retry;
