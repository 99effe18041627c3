use actix_web::{web, HttpResponse, Result};
use crate::api_error::ApiError;
use crate::service::RemoteConfigService;

pub async fn health_check(service: web::Data<RemoteConfigService>) -> Result<HttpResponse, ApiError> {
    // Check store
    service.store().ping().await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "store": "ok"
    })))
}
