use actix_cors::Cors;

/// Config consumers are arbitrary client apps, so any origin is accepted
pub fn cors_middleware() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600)
}
