use crate::consts;
use crate::AppState;
use actix_web::{
    http::{header, StatusCode},
    web, HttpRequest, HttpResponse,
};
use application::query::proxy_image::{ProxiedImage, ProxyError, ProxyImage};
use thiserror::Error;

/// 图片代理路由：`GET /img/{token}`，`/img` 与 `/img/` 视为空 token
pub fn configure_service(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope(consts::URL_PATH_IMAGE_PROXY)
            .route("/{token}", web::get().to(get_image))
            .route("/", web::get().to(get_image))
            .route("", web::get().to(get_image)),
    );
}

#[derive(Error, Debug)]
#[error(transparent)]
pub struct ImageProxyError(#[from] pub ProxyError);

impl actix_web::error::ResponseError for ImageProxyError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            ProxyError::BadRequest(_) | ProxyError::InvalidToken(_) => StatusCode::BAD_REQUEST,
            ProxyError::TokenExpired | ProxyError::UpstreamAuthLapsed(_) => StatusCode::GONE,
            ProxyError::UpstreamNotFound => StatusCode::NOT_FOUND,
            ProxyError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            ProxyError::ServerMisconfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // 响应体只包含状态描述，不暴露上游地址或鉴权细节
    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        let status = self.status_code();
        HttpResponse::build(status)
            .insert_header((header::CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8))
            .insert_header((header::CACHE_CONTROL, consts::ERROR_CACHE_CONTROL))
            .body(status.canonical_reason().unwrap_or("Error"))
    }
}

/// 与 token 剩余有效期一致的缓存头
pub fn cache_control(max_age: u64) -> String {
    format!(
        "public, max-age={}, s-maxage={}, immutable",
        max_age, max_age
    )
}

fn image_response(image: ProxiedImage) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, image.content_type))
        .insert_header((header::CACHE_CONTROL, cache_control(image.max_age)))
        .insert_header((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .body(image.data)
}

pub async fn get_image(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ImageProxyError> {
    let token = req.match_info().get("token").unwrap_or("");
    let usecase = ProxyImage::new(state.token_codec.clone(), state.fetcher.clone());

    match usecase.handle(token).await {
        Ok(image) => Ok(image_response(image)),
        Err(e) => {
            match &e {
                ProxyError::ServerMisconfigured(_) => log::error!("Image proxy: {}", e),
                ProxyError::UpstreamNotFound
                | ProxyError::UpstreamAuthLapsed(_)
                | ProxyError::UpstreamFailure(_) => log::warn!("Image proxy: {}", e),
                _ => log::debug!("Image proxy rejected token: {}", e),
            }
            Err(ImageProxyError(e))
        }
    }
}
