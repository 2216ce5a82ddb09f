//! Helper types and traits for cleaner route handlers.
//!
//! Provides extension traits for converting `Option` and `Result` types
//! into HTTP-appropriate error responses, plus the response builders shared
//! by the wizard and admin routes.

use axum::{
    body::Body,
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use proposal_builder_core::ImageFormat;

/// Standard result type for route handlers returning HTML.
pub type RouteResult<T> = Result<T, (StatusCode, String)>;

/// Extension trait for converting `Option<T>` to `RouteResult<T>`.
///
/// Provides convenient methods for returning 404 Not Found when
/// an expected resource (like a session) doesn't exist.
pub trait OptionExt<T> {
    /// Returns the contained value or a 404 Not Found error.
    fn or_not_found(self, msg: &str) -> RouteResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, msg: &str) -> RouteResult<T> {
        self.ok_or_else(|| (StatusCode::NOT_FOUND, msg.to_string()))
    }
}

/// Extension trait for converting `Result<T, E>` to `RouteResult<T>`.
pub trait ResultExt<T, E: std::fmt::Display> {
    /// Converts the error to 500 Internal Server Error.
    fn or_internal_error(self) -> RouteResult<T>;

    /// Converts the error to 400 Bad Request.
    fn or_bad_request(self) -> RouteResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T, E> for Result<T, E> {
    fn or_internal_error(self) -> RouteResult<T> {
        self.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    }

    fn or_bad_request(self) -> RouteResult<T> {
        self.map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
    }
}

/// Validate that a page number is within bounds.
///
/// Returns 400 Bad Request if page >= page_count.
pub fn validate_page(page: usize, page_count: usize) -> RouteResult<()> {
    if page >= page_count {
        Err((
            StatusCode::BAD_REQUEST,
            format!("Page {page} out of range (0..{page_count})"),
        ))
    } else {
        Ok(())
    }
}

/// POST-Redirect-GET.
///
/// HTMX requests get an `HX-Redirect` header (full page navigation), plain
/// form submissions a 303 See Other.
pub fn redirect(headers: &HeaderMap, url: &str) -> RouteResult<Response> {
    if headers.get("HX-Request").is_some() {
        Response::builder()
            .status(StatusCode::OK)
            .header("HX-Redirect", url)
            .body(Body::empty())
            .or_internal_error()
    } else {
        Response::builder()
            .status(StatusCode::SEE_OTHER)
            .header(header::LOCATION, url)
            .body(Body::empty())
            .or_internal_error()
    }
}

/// Image format the browser accepts (WebP when advertised).
pub fn image_format(headers: &HeaderMap) -> ImageFormat {
    headers
        .get(header::ACCEPT)
        .and_then(|h| h.to_str().ok())
        .map_or(ImageFormat::Png, ImageFormat::from_accept)
}

/// Whether `If-None-Match` already names `etag`.
pub fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|h| h.to_str().ok())
        == Some(etag)
}

pub fn not_modified() -> RouteResult<Response> {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .body(Body::empty())
        .or_internal_error()
}

/// Image response with an ETag and the given `Cache-Control`.
pub fn image_response(
    data: Vec<u8>,
    format: ImageFormat,
    etag: &str,
    cache_control: &'static str,
) -> RouteResult<Response> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, format.mime_type())
        .header(header::ETAG, etag)
        .header(header::CACHE_CONTROL, cache_control)
        .header(header::VARY, "Accept")
        .body(Body::from(data))
        .or_internal_error()
}

/// File download with `Content-Disposition: attachment`.
pub fn attachment(data: Vec<u8>, content_type: &str, filename: &str) -> RouteResult<Response> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from(data))
        .or_internal_error()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_redirect_htmx_and_plain() {
        let plain = redirect(&HeaderMap::new(), "/wizard/abc").unwrap();
        assert_eq!(plain.status(), StatusCode::SEE_OTHER);
        assert_eq!(plain.headers()[header::LOCATION], "/wizard/abc");

        let mut headers = HeaderMap::new();
        headers.insert("HX-Request", HeaderValue::from_static("true"));
        let htmx = redirect(&headers, "/wizard/abc").unwrap();
        assert_eq!(htmx.status(), StatusCode::OK);
        assert_eq!(htmx.headers()["HX-Redirect"], "/wizard/abc");
    }

    #[test]
    fn test_image_format_from_accept() {
        let mut headers = HeaderMap::new();
        assert_eq!(image_format(&headers), ImageFormat::Png);
        headers.insert(header::ACCEPT, HeaderValue::from_static("image/avif,image/webp,*/*"));
        assert_eq!(image_format(&headers), ImageFormat::Webp);
    }

    #[test]
    fn test_validate_page() {
        assert!(validate_page(0, 1).is_ok());
        assert_eq!(validate_page(1, 1).unwrap_err().0, StatusCode::BAD_REQUEST);
    }
}
