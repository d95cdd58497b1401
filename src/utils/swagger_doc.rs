use crate::utils::error::AppError;
use okapi::openapi3::SchemaObject;
use rocket::http::Status;
use rocket_okapi::gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::RefOr;
use rocket_okapi::okapi::openapi3::{MediaType, Response, Responses};
use rocket_okapi::okapi::Map;
use rocket_okapi::response::OpenApiResponderInner;
use serde_json::json;

impl OpenApiResponderInner for AppError {
    fn responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        let mut responses = Responses::default();

        // One documented example per status the booking API can produce
        let error_responses = [
            (Status::BadRequest, "Bad Request", AppError::BadRequest("invalid id".to_string())),
            (Status::Unauthorized, "Unauthorized", AppError::AuthError("missing bearer token".to_string())),
            (Status::Forbidden, "Forbidden", AppError::Forbidden("not your reservation".to_string())),
            (Status::NotFound, "Not Found", AppError::SeatNotFound("<seat id>".to_string())),
            (Status::Conflict, "Conflict", AppError::SeatUnavailable("<seat id>".to_string())),
            (Status::UnprocessableEntity, "Unprocessable", AppError::Unprocessable("Flight already departed".to_string())),
            (Status::InternalServerError, "Internal Server Error", AppError::TransactionAborted("retries exhausted".to_string())),
        ];

        for (status, description, error) in error_responses {
            let mut content = Map::new();
            content.insert(
                "application/json".to_string(),
                MediaType {
                    schema: Some(SchemaObject::default()),
                    example: Some(json!({
                        "error": error.to_string()
                    })),
                    ..Default::default()
                },
            );

            responses.responses.insert(
                status.code.to_string(),
                RefOr::Object(Response {
                    description: description.to_string(),
                    content,
                    ..Default::default()
                }),
            );
        }

        Ok(responses)
    }
}
