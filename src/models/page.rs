//! Shared pagination envelope for list endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// Query parameters accepted by list endpoints.
///
/// `skip` wins over `page` when both are supplied.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    pub page: Option<i64>,
}

impl ListParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn skip(&self) -> i64 {
        match (self.skip, self.page) {
            (Some(skip), _) => skip.max(0),
            (None, Some(page)) => (page.max(1) - 1) * self.limit(),
            (None, None) => 0,
        }
    }

    pub fn page(&self) -> i64 {
        self.skip() / self.limit() + 1
    }
}

/// Page envelope returned by list endpoints.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub size: i64,
    pub limit: i64,
    pub skip: i64,
    pub page: i64,
    pub pages: i64,
    #[serde(rename = "lastModified")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(
        data: Vec<T>,
        total: i64,
        params: &ListParams,
        last_modified: Option<DateTime<Utc>>,
    ) -> Self {
        let limit = params.limit();
        let page = params.page();
        let pages = if total == 0 {
            1
        } else {
            (total + limit - 1) / limit
        };
        Self {
            size: data.len() as i64,
            data,
            total,
            limit,
            skip: params.skip(),
            page,
            pages,
            last_modified,
            has_more: page < pages,
        }
    }

    /// Map the page data while keeping the envelope intact.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            size: self.size,
            limit: self.limit,
            skip: self.skip,
            page: self.page,
            pages: self.pages,
            last_modified: self.last_modified,
            has_more: self.has_more,
        }
    }
}
