pub mod error;
pub mod jwt;
pub mod swagger_doc;
