use actix_cors::Cors;

/// 图片是公开资源，允许任意来源跨域读取
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .send_wildcard()
        .allowed_methods(vec!["GET", "HEAD", "OPTIONS"])
        .allow_any_header()
        .max_age(3600)
}
