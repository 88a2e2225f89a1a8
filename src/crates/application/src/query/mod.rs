pub mod proxy_image;
