//! Download route: streams either a relayed variant or a freshly muxed file.

use axum::{
    Router,
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::IntoResponse,
    routing::get,
};
use futures::TryStreamExt;
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::domain::DownloadRequest;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQuery {
    pub url: Option<String>,
    pub audio_itag: Option<String>,
    pub video_itag: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(download))
}

/// `GET /api/download?url=&audioItag=&videoItag=`
///
/// Headers go out before the body, so a failure mid-body cannot change the
/// status; the connection is cut instead and the client sees a truncated
/// transfer.
async fn download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<impl IntoResponse> {
    let request = DownloadRequest::from_parts(
        query.url.as_deref(),
        query.audio_itag.as_deref(),
        query.video_itag.as_deref(),
    )?;
    let output = state.download_service.download(request).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&output.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&content_disposition(&output.filename))
            .map_err(|e| ApiError::internal(format!("Invalid header value: {e}")))?,
    );
    if let Some(length) = output.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    let filename = output.filename.clone();
    let body = output.body.map_err(move |e| {
        tracing::error!(filename = %filename, error = %e, "Download body aborted");
        std::io::Error::other(e)
    });

    Ok((headers, Body::from_stream(body)))
}

/// `attachment` disposition with an ASCII fallback name plus the exact
/// UTF-8 name in RFC 5987 form.
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}
