use crate::api_error::ApiError;
use crate::models::{
    ConfigStatusResponse, CreateConfigDTO, RemoteConfig, ReplaceConfigsDTO, LATEST_VERSION,
};
use crate::service::RemoteConfigService;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

// =============================================================================
// CREATE CONFIG
// =============================================================================

/// POST /api/configs
/// Create a new configuration version
pub async fn create_config(
    service: web::Data<RemoteConfigService>,
    req: web::Json<CreateConfigDTO>,
) -> Result<impl Responder, ApiError> {
    info!(
        app_id = %req.app_id,
        env = %req.env,
        version = %req.version,
        "Received create config request"
    );

    let dto = req.into_inner();
    dto.validate()?;

    let created = service.create(RemoteConfig::from(dto)).await?;

    Ok(HttpResponse::Created().json(created))
}

// =============================================================================
// FETCH CONFIG
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct FetchConfigQuery {
    pub version: Option<String>,
}

/// GET /api/configs/:app_id/:env?version=
/// Fetch a config by exact version, or the latest one when no version is given
pub async fn fetch_config(
    service: web::Data<RemoteConfigService>,
    path: web::Path<(String, String)>,
    query: web::Query<FetchConfigQuery>,
) -> Result<impl Responder, ApiError> {
    let (app_id, env) = path.into_inner();
    let version = query
        .into_inner()
        .version
        .unwrap_or_else(|| LATEST_VERSION.to_string());

    let record = service
        .resolve_for_read(&app_id, &env, &version)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "No configuration found for appId={}, env={}, version={}",
                app_id, env, version
            ))
        })?;

    Ok(HttpResponse::Ok().json(record))
}

// =============================================================================
// STALENESS CHECK
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ConfigStatusQuery {
    #[serde(rename = "lastModDate")]
    pub last_mod_date: String,
}

/// GET /api/configs/:app_id/:env/:version/status?lastModDate=
/// Tell a client whether its cached copy is still current
pub async fn config_status(
    service: web::Data<RemoteConfigService>,
    path: web::Path<(String, String, String)>,
    query: web::Query<ConfigStatusQuery>,
) -> Result<impl Responder, ApiError> {
    let (app_id, env, version) = path.into_inner();

    let status = service
        .check_staleness(&app_id, &env, &version, &query.last_mod_date)
        .await?;

    Ok(HttpResponse::Ok().json(ConfigStatusResponse::from(status)))
}

// =============================================================================
// REPLACE CONFIGS
// =============================================================================

/// PUT /api/configs/:app_id/:env/:version
/// Replace the payload of an existing config
pub async fn replace_configs(
    service: web::Data<RemoteConfigService>,
    path: web::Path<(String, String, String)>,
    req: web::Json<ReplaceConfigsDTO>,
) -> Result<impl Responder, ApiError> {
    let (app_id, env, version) = path.into_inner();

    info!(
        app_id = %app_id,
        env = %env,
        version = %version,
        keys = req.configs.len(),
        "Received replace configs request"
    );

    let updated = service
        .replace_payload(&app_id, &env, &version, req.into_inner().configs)
        .await?;

    Ok(HttpResponse::Ok().json(updated))
}

// =============================================================================
// DELETE CONFIG
// =============================================================================

/// DELETE /api/configs/:app_id/:env/:version
/// Delete a config and return the deleted snapshot
pub async fn delete_config(
    service: web::Data<RemoteConfigService>,
    path: web::Path<(String, String, String)>,
) -> Result<impl Responder, ApiError> {
    let (app_id, env, version) = path.into_inner();

    info!(app_id = %app_id, env = %env, version = %version, "Received delete config request");

    let deleted = service.delete(&app_id, &env, &version).await?;

    Ok(HttpResponse::Ok().json(deleted))
}

/// Configure config routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/configs")
            .app_data(
                web::JsonConfig::default()
                    .error_handler(|err, _| ApiError::BadRequest(err.to_string()).into()),
            )
            .app_data(
                web::QueryConfig::default()
                    .error_handler(|err, _| ApiError::BadRequest(err.to_string()).into()),
            )
            .route("", web::post().to(create_config))
            .route("/{app_id}/{env}", web::get().to(fetch_config))
            .route("/{app_id}/{env}/{version}", web::put().to(replace_configs))
            .route("/{app_id}/{env}/{version}", web::delete().to(delete_config))
            .route("/{app_id}/{env}/{version}/status", web::get().to(config_status)),
    );
}
