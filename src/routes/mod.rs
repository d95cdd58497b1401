pub mod flight_route;
pub mod reservation_route;

use crate::utils::error::AppError;
use uuid::Uuid;

// Path ids arrive as strings so a malformed one becomes a JSON 400
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid {} id: {}", what, raw)))
}
