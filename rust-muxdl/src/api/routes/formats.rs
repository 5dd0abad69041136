//! Format listing route.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use super::UrlQuery;
use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::domain::VariantCatalog;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_formats))
}

/// `GET /api/formats?url=` lists the source's variants partitioned into
/// audio-only, video-only and combined.
async fn get_formats(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Json<VariantCatalog>> {
    let url = query.url.unwrap_or_default();
    let catalog = state.download_service.get_formats(&url).await?;
    Ok(Json(catalog))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::test_support;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app(state: AppState) -> Router {
        Router::new().nest("/api/formats", router()).with_state(state)
    }

    #[tokio::test]
    async fn test_formats_partitioned_without_media_urls() {
        let dir = TempDir::new().unwrap();
        let (state, _) = test_support::state(dir.path());

        let request = Request::builder()
            .uri("/api/formats?url=https%3A%2F%2Fvideo.test%2Fwatch%3Fv%3D1")
            .body(Body::empty())
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["audioOnly"][0]["id"], "A1");
        assert_eq!(json["videoOnly"][0]["id"], "V1");
        assert_eq!(json["combined"][0]["id"], "C1");
        assert!(json["audioOnly"][0].get("url").is_none());
    }

    #[tokio::test]
    async fn test_missing_url_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let (state, provider) = test_support::state(dir.path());

        let request = Request::builder()
            .uri("/api/formats")
            .body(Body::empty())
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_is_bad_gateway() {
        let dir = TempDir::new().unwrap();
        let (state, _) = test_support::state(dir.path());

        let request = Request::builder()
            .uri("/api/formats?url=https%3A%2F%2Fbroken.test%2F")
            .body(Body::empty())
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "PROVIDER_ERROR");
    }
}
