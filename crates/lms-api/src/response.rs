use axum::{Json, http::StatusCode, http::Uri};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Default number of items per page
pub const DEFAULT_PAGE_SIZE: i64 = 16;
/// Upper bound for the `limit` query parameter
pub const MAX_PAGE_SIZE: i64 = 100;

/// Success body shared by every non-paginated endpoint
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub message: String,
    pub data: T,
}

pub fn success<T: Serialize>(message: impl Into<String>, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        status: "success",
        message: message.into(),
        data,
    })
}

pub fn created<T: Serialize>(
    message: impl Into<String>,
    data: T,
) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, success(message, data))
}

/// `?page=&limit=` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.page_size()
    }
}

/// One page of a listing with links to its neighbours
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
    pub total_pages: i64,
    pub current_page: i64,
}

impl<T> Page<T> {
    /// Build a page from a result slice and the total row count.
    ///
    /// Asking for a page past the last one is a `404`, except page 1 of an
    /// empty listing.
    pub fn new(results: Vec<T>, count: i64, params: &PageParams, uri: &Uri) -> Result<Self, ApiError> {
        let page_size = params.page_size();
        let current_page = params.page();
        let total_pages = ((count + page_size - 1) / page_size).max(1);

        if current_page > total_pages {
            return Err(ApiError::NotFound("Invalid page.".to_string()));
        }

        let next = (current_page < total_pages).then(|| page_link(uri, current_page + 1));
        let previous = (current_page > 1).then(|| page_link(uri, current_page - 1));

        Ok(Self {
            count,
            next,
            previous,
            results,
            total_pages,
            current_page,
        })
    }
}

/// The request path with its query string, `page` replaced by `page`.
fn page_link(uri: &Uri, page: i64) -> String {
    let mut pairs: Vec<&str> = uri
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty() && !pair.starts_with("page="))
        .collect();
    let page_pair = format!("page={page}");
    pairs.push(&page_pair);

    format!("{}?{}", uri.path(), pairs.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<i64>, limit: Option<i64>) -> PageParams {
        PageParams { page, limit }
    }

    #[test]
    fn test_page_params_defaults_and_bounds() {
        let default = params(None, None);
        assert_eq!(default.page(), 1);
        assert_eq!(default.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(default.offset(), 0);

        assert_eq!(params(Some(0), Some(0)).page(), 1);
        assert_eq!(params(None, Some(0)).page_size(), 1);
        assert_eq!(params(None, Some(1000)).page_size(), MAX_PAGE_SIZE);
        assert_eq!(params(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn test_page_links_keep_filters() {
        let uri: Uri = "/courses?level=Beginner&page=2&limit=5".parse().expect("valid uri");
        let page = Page::new(vec![1, 2, 3, 4, 5], 12, &params(Some(2), Some(5)), &uri)
            .expect("page 2 exists");

        assert_eq!(page.total_pages, 3);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.next.as_deref(), Some("/courses?level=Beginner&limit=5&page=3"));
        assert_eq!(
            page.previous.as_deref(),
            Some("/courses?level=Beginner&limit=5&page=1")
        );
    }

    #[test]
    fn test_empty_listing_is_single_page() {
        let uri: Uri = "/categories".parse().expect("valid uri");
        let page: Page<i32> = Page::new(vec![], 0, &PageParams::default(), &uri).expect("page 1");

        assert_eq!(page.count, 0);
        assert_eq!(page.total_pages, 1);
        assert!(page.next.is_none());
        assert!(page.previous.is_none());
    }

    #[test]
    fn test_page_past_the_end_is_not_found() {
        let uri: Uri = "/categories?page=4".parse().expect("valid uri");
        let result: Result<Page<i32>, _> = Page::new(vec![], 20, &params(Some(4), None), &uri);
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_envelope_shape() {
        let Json(body) = success("Login successful", serde_json::json!({ "id": 1 }));
        let value = serde_json::to_value(&body).expect("serializable");

        assert_eq!(value["status"], "success");
        assert_eq!(value["message"], "Login successful");
        assert_eq!(value["data"]["id"], 1);
    }
}
