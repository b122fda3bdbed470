//! HTTP surface: per-class sync triggers, read routes and the static
//! frontend.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use camino::Utf8Path;
use greenway_core::{FeatureClass, FeatureStore};
use greenway_data::{FeatureService, FeatureSource, SyncError, SyncSummary};
use serde::Serialize;
use tower_http::services::ServeDir;

use crate::error::describe_chain;

#[derive(Debug, Serialize)]
struct SyncAccepted {
    message: String,
    summary: SyncSummary,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Build the router for `service`.
///
/// Every class gets `GET /api/sync-<slug>` and `GET /api/<slug>`. Other
/// paths fall through to `static_dir` when one is given.
pub(crate) fn router<S, F>(service: FeatureService<S, F>, static_dir: Option<&Utf8Path>) -> Router
where
    S: FeatureStore + 'static,
    F: FeatureSource + 'static,
{
    let mut api: Router<FeatureService<S, F>> = Router::new();
    for class in FeatureClass::ALL {
        api = api
            .route(
                &format!("/api/sync-{}", class.slug()),
                get(move |State(service): State<FeatureService<S, F>>| async move {
                    trigger_sync(&service, class).await
                }),
            )
            .route(
                &format!("/api/{}", class.slug()),
                get(move |State(service): State<FeatureService<S, F>>| async move {
                    read_class(&service, class).await
                }),
            );
    }
    let api = api.with_state(service);
    match static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir.as_std_path())),
        None => api,
    }
}

async fn trigger_sync<S, F>(service: &FeatureService<S, F>, class: FeatureClass) -> Response
where
    S: FeatureStore + 'static,
    F: FeatureSource,
{
    match service.sync(class).await {
        Ok(summary) => {
            let body = SyncAccepted {
                message: format!("{} synced successfully!", class.title()),
                summary,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err @ SyncError::InProgress { .. }) => {
            log::warn!("rejected {} sync trigger: {err}", class.label());
            error_response(StatusCode::CONFLICT, err.to_string())
        }
        Err(err) => {
            log::error!("{} sync failed: {}", class.label(), describe_chain(&err));
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to sync {}", class.label()),
            )
        }
    }
}

async fn read_class<S, F>(service: &FeatureService<S, F>, class: FeatureClass) -> Response
where
    S: FeatureStore + 'static,
    F: FeatureSource,
{
    match service.read(class).await {
        Ok(collection) => Json(collection).into_response(),
        Err(err) => {
            log::error!("reading {} failed: {}", class.label(), describe_chain(&err));
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to fetch {}", class.label()),
            )
        }
    }
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorBody { error })).into_response()
}
