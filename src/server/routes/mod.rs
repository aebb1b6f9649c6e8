//! One module per area of the application, each exposing `router()`.

pub mod admin;
pub mod auth;
pub mod billing;
pub mod customers;
pub mod dashboard;
pub mod payments;
pub mod products;
pub mod reports;
pub mod users;

use axum::{
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;

pub(crate) const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
pub(crate) const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// `?q=` of the search endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// A downloadable body with `Content-Disposition: attachment`.
pub(crate) fn attachment(content_type: &'static str, file_name: &str, body: Vec<u8>) -> Response {
    let mut resp = (StatusCode::OK, body).into_response();
    let headers = resp.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    // Names are generated server-side from ASCII; anything else falls back to a plain attachment.
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    headers.insert(CONTENT_DISPOSITION, disposition);
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_headers() {
        let resp = attachment(CSV_CONTENT_TYPE, "report.csv", b"a,b\n".to_vec());
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], CSV_CONTENT_TYPE);
        assert_eq!(
            resp.headers()[CONTENT_DISPOSITION],
            "attachment; filename=\"report.csv\""
        );
    }
}
