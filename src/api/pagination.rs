use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{Uri, header, request::Parts},
};
use std::sync::Arc;

use super::{ApiError, AppState, types::Page};
use crate::config::PaginationConfig;
use crate::domain::{PageRequest, Paged};

const MAX_ROW_OFFSET: u64 = i64::MAX.unsigned_abs();

/// Page-number pagination read from `?page=` and `?limit=`.
///
/// A missing or malformed `limit` falls back to the configured default and
/// is capped at the configured maximum. A malformed `page` is a 404.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub request: PageRequest,
    base: String,
    query_pairs: Vec<(String, String)>,
}

impl Pagination {
    pub fn from_uri(
        uri: &Uri,
        host: Option<&str>,
        config: &PaginationConfig,
    ) -> Result<Self, ApiError> {
        let query_pairs: Vec<(String, String)> =
            url::form_urlencoded::parse(uri.query().unwrap_or("").as_bytes())
                .into_owned()
                .collect();

        let lookup = |key: &str| {
            query_pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        let size = lookup("limit")
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|size| *size >= 1)
            .map_or(config.default_page_size, |size| {
                size.min(config.max_page_size)
            });

        let page = match lookup("page") {
            None | Some("") => 1,
            Some(raw) => match raw.parse::<u64>() {
                Ok(page) if page >= 1 => page,
                _ => return Err(ApiError::invalid_page()),
            },
        };

        // The row offset must fit SQLite's signed 64-bit OFFSET.
        if page
            .checked_mul(size)
            .is_none_or(|end| end > MAX_ROW_OFFSET)
        {
            return Err(ApiError::invalid_page());
        }

        let base = match host {
            Some(host) => format!("http://{host}{}", uri.path()),
            None => uri.path().to_string(),
        };

        Ok(Self {
            request: PageRequest { page, size },
            base,
            query_pairs,
        })
    }

    /// Link to `page`, keeping every other query parameter. Page 1 drops
    /// the `page` parameter entirely.
    fn link(&self, page: u64) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.query_pairs.iter().filter(|(k, _)| k != "page") {
            serializer.append_pair(key, value);
        }
        if page > 1 {
            serializer.append_pair("page", &page.to_string());
        }

        let query = serializer.finish();
        if query.is_empty() {
            self.base.clone()
        } else {
            format!("{}?{query}", self.base)
        }
    }

    #[must_use]
    pub fn page<T>(&self, paged: Paged<T>) -> Page<T> {
        let PageRequest { page, size } = self.request;
        let has_next = page.saturating_mul(size) < paged.total;

        Page {
            count: paged.total,
            next: has_next.then(|| self.link(page + 1)),
            previous: (page > 1).then(|| self.link(page - 1)),
            results: paged.items,
        }
    }
}

impl FromRequestParts<Arc<AppState>> for Pagination {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok());

        // Links must carry the full path, not the one seen inside `/api`.
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map_or(&parts.uri, |original| &original.0);

        Self::from_uri(uri, host, &state.config().pagination)
    }
}
