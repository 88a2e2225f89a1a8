use domain::image_token::ImageTokenError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Image token error: {0}")]
    ImageTokenError(#[from] ImageTokenError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
