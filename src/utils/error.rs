use rocket::http::ContentType;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::Request;
use rocket::Response;
use rocket_okapi::JsonSchema;
use serde::Serialize;
use serde_json::json;
use sqlx::mysql::MySqlDatabaseError;
use std::io::Cursor;
use thiserror::Error;

// MySQL server error numbers that mean "retry the whole transaction"
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
const ER_LOCK_DEADLOCK: u16 = 1213;

#[derive(Error, Debug, Serialize, JsonSchema)]
pub enum AppError {
    #[error("Seat not found: {0}")]
    SeatNotFound(String),

    #[error("Seat unavailable: {0}")]
    SeatUnavailable(String),

    #[error("Flight not found: {0}")]
    FlightNotFound(String),

    #[error("Reservation not found: {0}")]
    ReservationNotFound(String),

    #[error("Reservation already cancelled: {0}")]
    AlreadyCancelled(String),

    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    // Retryable; never leaves the booking engine
    #[error("Write conflict: {0}")]
    WriteConflict(String),

    #[error("Database error")]
    DatabaseError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    pub fn status(&self) -> Status {
        match self {
            AppError::SeatNotFound(_)
            | AppError::FlightNotFound(_)
            | AppError::ReservationNotFound(_) => Status::NotFound,
            AppError::SeatUnavailable(_)
            | AppError::AlreadyCancelled(_)
            | AppError::Conflict(_) => Status::Conflict,
            AppError::TransactionAborted(_)
            | AppError::WriteConflict(_)
            | AppError::DatabaseError(_) => Status::InternalServerError,
            AppError::AuthError(_) => Status::Unauthorized,
            AppError::Forbidden(_) => Status::Forbidden,
            AppError::ValidationError(_) | AppError::BadRequest(_) => Status::BadRequest,
            AppError::Unprocessable(_) => Status::UnprocessableEntity,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::WriteConflict(_))
    }
}

// Convert sqlx::Error (database error) to AppError, keeping lock conflicts retryable
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(mysql_err) = db_err.try_downcast_ref::<MySqlDatabaseError>() {
                if matches!(mysql_err.number(), ER_LOCK_DEADLOCK | ER_LOCK_WAIT_TIMEOUT) {
                    return AppError::WriteConflict(db_err.message().to_string());
                }
            }
        }
        AppError::DatabaseError(err.to_string())
    }
}

// Define a type alias for the result type
pub type AppResult<T> = Result<T, AppError>;

// Format all error from route level to a Http Response at route level
#[rocket::async_trait]
impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'static> {
        let status = self.status();
        if status == Status::InternalServerError {
            tracing::error!(error = ?self, "request failed");
        }

        let json = json!({
            "error": self.to_string()
        });

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(None, Cursor::new(json.to_string()))
            .ok()
    }
}
