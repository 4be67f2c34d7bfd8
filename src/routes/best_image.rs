use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{app::AppState, error::AppResult};

#[derive(Deserialize)]
pub struct BestImageQuery {
    pub url: Option<String>,
    pub query: Option<String>,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Serialize)]
pub struct BestImage {
    pub url: String,
    pub image_url: String,
}

/// GET /best-image?url=...&query=...&debug=true
/// Fetch the page and answer with its most representative image.
///
/// # Errors
/// - 400 when `url` is missing or not absolute http(s)
/// - 502 when the page can't be fetched
/// - 404 when the page has no (valid) image
pub async fn get(
    State(state): State<AppState>,
    Query(q): Query<BestImageQuery>,
) -> AppResult<Response> {
    let url = q
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or((StatusCode::BAD_REQUEST, "missing url parameter".to_string()))?;
    match url::Url::parse(url) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => {}
        _ => {
            return Err((StatusCode::BAD_REQUEST, format!("not an http(s) url: {url}")).into());
        }
    }
    let query = q.query.as_deref().filter(|s| !s.trim().is_empty());

    if q.debug {
        let report = state
            .picker
            .get_best_image_debug(url, query, None, None)
            .await?;
        return Ok(Json(report).into_response());
    }

    let image_url = state.picker.get_best_image(url, query).await?;
    Ok(Json(BestImage {
        url: url.to_string(),
        image_url,
    })
    .into_response())
}
