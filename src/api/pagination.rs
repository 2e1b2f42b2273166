use serde::Deserialize;

use super::error::ApiError;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// `?page_id=&page_size=` query parameters, 1-based.
#[derive(Debug, Deserialize)]
pub struct Pagination {
    page_id: Option<i64>,
    page_size: Option<i64>,
}

impl Pagination {
    /// Convert to SQL `LIMIT` and `OFFSET`.
    pub fn limit_offset(&self) -> Result<(i64, i64), ApiError> {
        let page_id = self.page_id.unwrap_or(1);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);

        if page_id < 1 {
            return Err(ApiError::bad_request("page_id must be at least 1"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ApiError::bad_request(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let offset = (page_id - 1)
            .checked_mul(page_size)
            .ok_or_else(|| ApiError::bad_request("page_id is too large"))?;

        Ok((page_size, offset))
    }
}
