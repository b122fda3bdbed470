//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use greenway_core::{FeatureClass, test_support::MemoryFeatureStore};
use greenway_data::{
    FeatureService, FeatureSources, SourceError, source::test_support::StubFeatureSource,
};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tokio::sync::Notify;
use tower::ServiceExt;

use super::helpers::{Workspace, point_snapshot};
use crate::http::router;

type StubService = FeatureService<MemoryFeatureStore, StubFeatureSource>;

#[fixture]
fn store() -> Arc<MemoryFeatureStore> {
    Arc::new(MemoryFeatureStore::default())
}

fn service_with(store: &Arc<MemoryFeatureStore>, source: StubFeatureSource) -> StubService {
    FeatureService::new(Arc::clone(store), FeatureSources::from_fn(|_| source.clone()))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let body = to_bytes(response.into_body(), 1_000_000)
        .await
        .expect("read body");
    (status, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(app, uri).await;
    let json = serde_json::from_slice(&body).expect("JSON body");
    (status, json)
}

#[rstest]
#[tokio::test]
async fn sync_route_reports_message_and_summary(store: Arc<MemoryFeatureStore>) {
    let service = service_with(&store, StubFeatureSource::with_snapshot(point_snapshot(&["1", "2"])));
    let app = router(service, None);

    let (status, body) = get_json(app, "/api/sync-entrances").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Entrances synced successfully!");
    assert_eq!(body["summary"]["class"], "entrances");
    assert_eq!(body["summary"]["upserted"], 2);
    assert_eq!(store.records(FeatureClass::Entrances).len(), 2);
}

#[rstest]
#[tokio::test]
async fn read_route_returns_synced_features(store: Arc<MemoryFeatureStore>) {
    let service = service_with(&store, StubFeatureSource::with_snapshot(point_snapshot(&["42"])));
    let app = router(service, None);

    let (status, _) = get(app.clone(), "/api/sync-milemarkers").await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = get_json(app, "/api/milemarkers").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "FeatureCollection");
    assert_eq!(body["features"][0]["id"], "42");
    assert_eq!(body["features"][0]["geometry"]["type"], "Point");
    assert_eq!(body["features"][0]["properties"]["Name"], "Feature 42");
}

#[rstest]
#[case("/api/entrances")]
#[case("/api/milemarkers")]
#[case("/api/trails")]
#[tokio::test]
async fn empty_classes_read_as_empty_collections(
    store: Arc<MemoryFeatureStore>,
    #[case] uri: &str,
) {
    let app = router(service_with(&store, StubFeatureSource::default()), None);

    let (status, body) = get_json(app, uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"type": "FeatureCollection", "features": []}));
}

#[rstest]
#[tokio::test]
async fn upstream_failures_map_to_generic_500(store: Arc<MemoryFeatureStore>) {
    let source = StubFeatureSource::with_error(SourceError::Network {
        url: "http://gis.example/markers".to_owned(),
        message: "connection refused".to_owned(),
    });
    let app = router(service_with(&store, source), None);

    let (status, body) = get_json(app, "/api/sync-milemarkers").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Failed to sync mile markers"}));
}

#[rstest]
#[tokio::test]
async fn store_failures_on_read_map_to_generic_500(store: Arc<MemoryFeatureStore>) {
    store.set_unavailable(true);
    let app = router(service_with(&store, StubFeatureSource::default()), None);

    let (status, body) = get_json(app, "/api/trails").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Failed to fetch trails"}));
}

#[rstest]
#[tokio::test]
async fn overlapping_sync_is_rejected_with_409(store: Arc<MemoryFeatureStore>) {
    let gate = Arc::new(Notify::new());
    let source = StubFeatureSource::with_snapshot(point_snapshot(&["1"])).gated(Arc::clone(&gate));
    let service = service_with(&store, source);
    let app = router(service.clone(), None);

    let first = tokio::spawn(get_json(app.clone(), "/api/sync-entrances"));
    while !service.leases().is_held(FeatureClass::Entrances) {
        tokio::task::yield_now().await;
    }

    let (status, body) = get_json(app.clone(), "/api/sync-entrances").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({"error": "entrances sync already in progress"}));

    gate.notify_one();
    let (status, _) = first.await.expect("first request");
    assert_eq!(status, StatusCode::OK);
}

#[rstest]
#[tokio::test]
async fn unknown_api_paths_are_not_found(store: Arc<MemoryFeatureStore>) {
    let app = router(service_with(&store, StubFeatureSource::default()), None);

    let (status, _) = get(app, "/api/parks").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[rstest]
#[tokio::test]
async fn static_frontend_is_served_for_non_api_paths(store: Arc<MemoryFeatureStore>) {
    let workspace = Workspace::new();
    std::fs::write(
        workspace.root.join("index.html").as_std_path(),
        "<h1>Greenways</h1>",
    )
    .expect("write index");
    let app = router(
        service_with(&store, StubFeatureSource::default()),
        Some(workspace.root.as_path()),
    );

    let (status, body) = get(app.clone(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"<h1>Greenways</h1>");

    let (status, _) = get(app, "/missing.js").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
