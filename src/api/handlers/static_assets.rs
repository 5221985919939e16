//! HTTP handler for the embedded upload page.

use axum::{
    body::Body,
    http::{Response, StatusCode},
    response::IntoResponse,
};

use crate::static_assets;

/// Serve the embedded upload page at `/`
pub async fn index() -> impl IntoResponse {
    if let Some(content) = static_assets::Assets::get("index.html") {
        let mime = mime_guess::from_path("index.html").first_or_octet_stream();

        return Response::builder()
            .header(axum::http::header::CONTENT_TYPE, mime.as_ref())
            .header(axum::http::header::CACHE_CONTROL, "no-cache")
            .body(Body::from(content.data.into_owned()))
            .unwrap();
    }

    Response::builder().status(StatusCode::NOT_FOUND).body(Body::empty()).unwrap()
}
