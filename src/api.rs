use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder, ResponseError};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Settings;
use crate::diagnostics;
use crate::metrics;
use crate::transform::{self, TransformError};
use crate::upstream::client::TmsClient;
use crate::upstream::error::UpstreamError;
use crate::upstream::target::UpstreamTarget;

#[derive(Serialize)]
pub struct StatusResponse {
    status: String,
    message: String,
}

/// Everything an order handler can fail with, mapped onto the response
/// status and a machine-readable error body below.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Upstream(UpstreamError::MissingConfig { .. })
            | ApiError::Upstream(UpstreamError::InvalidConfig(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Upstream(UpstreamError::Http { status, .. }) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::Upstream(UpstreamError::Tls { .. })
            | ApiError::Upstream(UpstreamError::Network(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Transform(TransformError::MovementsNotFound { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::Upstream(UpstreamError::MissingConfig { missing }) => json!({
                "status": "error",
                "error": "missing_configuration",
                "missing": missing,
            }),
            ApiError::Upstream(UpstreamError::InvalidConfig(detail)) => json!({
                "status": "error",
                "error": "invalid_configuration",
                "detail": detail,
            }),
            ApiError::Upstream(UpstreamError::Http { status, body }) => json!({
                "status": "error",
                "error": "upstream_http_error",
                "upstream_status": status,
                "detail": body,
            }),
            ApiError::Upstream(UpstreamError::Tls { message, hint }) => json!({
                "status": "error",
                "error": "upstream_tls_error",
                "detail": message,
                "hint": hint,
            }),
            ApiError::Upstream(UpstreamError::Network(detail)) => json!({
                "status": "error",
                "error": "upstream_unreachable",
                "detail": detail,
            }),
            ApiError::Transform(TransformError::MovementsNotFound { keys }) => json!({
                "status": "error",
                "error": "invalid_payload",
                "detail": "movements not found in payload",
                "available_keys": keys,
            }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(StatusResponse {
        status: "ok".to_string(),
        message: "TMS Bridge".to_string(),
    })
}

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({"status": "healthy"}))
}

#[derive(Deserialize)]
pub struct LoadQuery {
    pub order_id: String,
}

pub async fn get_load_data(
    settings: web::Data<Settings>,
    query: web::Query<LoadQuery>,
) -> Result<HttpResponse, ApiError> {
    fetch_load(&settings, &query.order_id).await
}

pub async fn get_load_data_by_path(
    settings: web::Data<Settings>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    fetch_load(&settings, &path.into_inner()).await
}

async fn fetch_load(settings: &Settings, order_id: &str) -> Result<HttpResponse, ApiError> {
    let client = TmsClient::new(settings)?;
    let payload = client.fetch_order(order_id).await?;
    info!(order_id, "fetched order payload");
    Ok(HttpResponse::Ok().json(json!({"status": "ok", "message": payload})))
}

#[derive(Deserialize)]
pub struct UpdateLoadRequest {
    pub order_id: String,
    pub extracted_arrival: Option<String>,
    pub extracted_departure: Option<String>,
}

pub async fn update_load_data(
    settings: web::Data<Settings>,
    body: web::Json<UpdateLoadRequest>,
) -> Result<HttpResponse, ApiError> {
    let op_id = Uuid::new_v4();
    let client = TmsClient::new(&settings)?;

    let current = client.fetch_order(&body.order_id).await?;
    let code = transform::first_movement_code(&current);
    info!(%op_id, order_id = %body.order_id, code = ?code, "applying status mapping");

    let updated = transform::apply_status_mapping(
        &current,
        body.extracted_arrival.as_deref(),
        body.extracted_departure.as_deref(),
    );
    metrics::TRANSFORMS_TOTAL.inc();

    let response = client.push_order(&updated).await?;
    info!(%op_id, order_id = %body.order_id, "pushed transformed payload upstream");
    Ok(HttpResponse::Ok().json(json!({"status": "ok", "message": response})))
}

#[derive(Deserialize)]
pub struct UpdateBrokerageStatusRequest {
    pub order_id: String,
    pub brokerage_status: String,
}

pub async fn update_brokerage_status(
    settings: web::Data<Settings>,
    body: web::Json<UpdateBrokerageStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let op_id = Uuid::new_v4();
    let client = TmsClient::new(&settings)?;

    let current = client.fetch_order(&body.order_id).await?;
    let updated = transform::overwrite_brokerage_status(&current, &body.brokerage_status)?;
    metrics::TRANSFORMS_TOTAL.inc();

    info!(
        %op_id,
        order_id = %body.order_id,
        brokerage_status = %body.brokerage_status,
        "pushing brokerage status override upstream"
    );
    let response = client.push_order(&updated).await?;
    Ok(HttpResponse::Ok().json(json!({"status": "ok", "message": response})))
}

// --- Diagnostic endpoints ---

fn diagnostics_unavailable(err: UpstreamError) -> HttpResponse {
    HttpResponse::ServiceUnavailable().json(json!({
        "status": "error",
        "error": "diagnostics_unavailable",
        "detail": err.to_string(),
    }))
}

fn target_summary(target: &UpstreamTarget) -> serde_json::Value {
    json!({
        "scheme": target.scheme,
        "host": target.host,
        "port": target.port,
        "connect_ip": target.connect_ip.map(|ip| ip.to_string()),
    })
}

pub async fn health_upstream(settings: web::Data<Settings>) -> HttpResponse {
    let target = match UpstreamTarget::from_settings(&settings) {
        Ok(target) => target,
        Err(err) => return diagnostics_unavailable(err),
    };

    let http = diagnostics::http_probe(&target).await;
    let reachable = http.ok;
    let body = json!({
        "status": if reachable { "ok" } else { "error" },
        "upstream": target_summary(&target),
        "http": http,
        "checked_at": chrono::Utc::now().to_rfc3339(),
    });
    if reachable {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

pub async fn health_upstream_ip(settings: web::Data<Settings>) -> HttpResponse {
    let target = match UpstreamTarget::from_settings(&settings) {
        Ok(target) => target,
        Err(err) => return diagnostics_unavailable(err),
    };

    let dns = diagnostics::dns_probe(&target).await;
    let resolved = dns.ok;
    let body = json!({
        "status": if resolved { "ok" } else { "error" },
        "upstream": target_summary(&target),
        "dns": dns,
        "checked_at": chrono::Utc::now().to_rfc3339(),
    });
    if resolved {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

pub async fn health_egress_ip() -> HttpResponse {
    let egress = diagnostics::egress_ip_probe().await;
    let reachable = egress.ok;
    let body = json!({
        "status": if reachable { "ok" } else { "error" },
        "egress": egress,
        "checked_at": chrono::Utc::now().to_rfc3339(),
    });
    if reachable {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

/// Full probe suite. Overall 200 as long as ANY layer answered, so a
/// partially broken path (e.g. DNS ok, TLS failing) is distinguishable from
/// a dead one.
pub async fn health_upstream_debug(settings: web::Data<Settings>) -> HttpResponse {
    let target = match UpstreamTarget::from_settings(&settings) {
        Ok(target) => target,
        Err(err) => return diagnostics_unavailable(err),
    };

    let (dns, tcp, tls, http) = tokio::join!(
        diagnostics::dns_probe(&target),
        diagnostics::tcp_probe(&target),
        diagnostics::tls_probe(&target),
        diagnostics::http_probe(&target),
    );

    let any_ok = dns.ok || tcp.ok || tls.ok || http.ok;
    let body = json!({
        "status": if any_ok { "ok" } else { "error" },
        "upstream": target_summary(&target),
        "checks": {
            "dns": dns,
            "tcp": tcp,
            "tls": tls,
            "http": http,
        },
        "checked_at": chrono::Utc::now().to_rfc3339(),
    });
    if any_ok {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

pub async fn metrics_endpoint() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("failed to encode metrics: {e}");
        return HttpResponse::InternalServerError().finish();
    }
    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/health/upstream").route(web::get().to(health_upstream)))
        .service(web::resource("/health/upstream-ip").route(web::get().to(health_upstream_ip)))
        .service(web::resource("/health/egress-ip").route(web::get().to(health_egress_ip)))
        .service(
            web::resource("/health/upstream-debug").route(web::get().to(health_upstream_debug)),
        )
        .service(web::resource("/metrics").route(web::get().to(metrics_endpoint)))
        .service(web::resource("/get_load_data").route(web::get().to(get_load_data)))
        .service(
            web::resource("/get_load_data/{order_id}").route(web::get().to(get_load_data_by_path)),
        )
        .service(web::resource("/update_load_data").route(web::post().to(update_load_data)))
        .service(
            web::resource("/update_brokerage_status")
                .route(web::post().to(update_brokerage_status)),
        );
}
