use crate::consts;
use crate::AppState;
use actix_web::{web, HttpResponse};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    image_proxy: &'static str,
}

pub fn configure_service(cfg: &mut web::ServiceConfig) {
    cfg.route(consts::URL_PATH_HEALTH, web::get().to(health_check));
}

/// 负载均衡探活，不做鉴权；图片代理未配置密钥时仍返回 200，但标记为 unconfigured
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let image_proxy = if state.token_codec.is_some() {
        "ready"
    } else {
        "unconfigured"
    };
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        image_proxy,
    })
}
