//! Media info route.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use super::UrlQuery;
use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::pipeline::MediaSummary;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_info))
}

async fn get_info(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Json<MediaSummary>> {
    let url = query.url.unwrap_or_default();
    Ok(Json(state.download_service.get_info(&url).await?))
}
