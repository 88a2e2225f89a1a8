pub mod image_token;
