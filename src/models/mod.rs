pub mod flight;
pub mod pagination;
pub mod reservation;
pub mod seat;
