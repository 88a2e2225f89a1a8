pub mod error;
pub mod image_token;
pub mod query;
