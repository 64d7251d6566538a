//! Offset pagination bookkeeping.
//!
//! Pagination never fails. Out-of-range input is clamped into a valid [`PageRequest`]:
//! `page < 1` becomes 1 and `per_page` is clamped into `1..=max_per_page`. A page past
//! the end is kept as asked and simply yields no items.

use axum::http::{HeaderMap, HeaderValue, header::CONTENT_RANGE};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_PER_PAGE: u64 = 20;
pub const DEFAULT_MAX_PER_PAGE: u64 = 1000;

/// Largest row offset a request can produce. Drivers bind offsets as signed 64-bit.
pub const MAX_OFFSET: u64 = i64::MAX.unsigned_abs();

/// Per-resource page size settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_per_page: u64,
    pub max_per_page: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_per_page: DEFAULT_PER_PAGE,
            max_per_page: DEFAULT_MAX_PER_PAGE,
        }
    }
}

impl PaginationConfig {
    const fn max(&self) -> u64 {
        if self.max_per_page == 0 { 1 } else { self.max_per_page }
    }
}

/// A normalized page request: `page >= 1`, `1 <= per_page <= max_per_page` and
/// `offset() <= MAX_OFFSET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    per_page: u64,
}

impl PageRequest {
    /// Clamp raw values into a valid request.
    #[must_use]
    pub fn new(page: i64, per_page: i64, config: &PaginationConfig) -> Self {
        let page = u64::try_from(page).unwrap_or(0).max(1);
        let per_page = u64::try_from(per_page).unwrap_or(0).clamp(1, config.max());
        Self::bounded(page, per_page)
    }

    /// Pages whose offset would overflow [`MAX_OFFSET`] become the last representable page.
    const fn bounded(page: u64, per_page: u64) -> Self {
        let last_page = MAX_OFFSET / per_page + 1;
        let page = if page > last_page { last_page } else { page };
        Self { page, per_page }
    }

    /// Like [`PageRequest::new`], with absent values taken from `config`.
    #[must_use]
    pub fn from_options(page: Option<i64>, per_page: Option<i64>, config: &PaginationConfig) -> Self {
        let default_per_page = i64::try_from(config.default_per_page).unwrap_or(i64::MAX);
        Self::new(page.unwrap_or(1), per_page.unwrap_or(default_per_page), config)
    }

    /// Re-apply a (possibly stricter) `max_per_page`.
    #[must_use]
    pub fn clamp_to(self, config: &PaginationConfig) -> Self {
        Self::bounded(self.page, self.per_page.clamp(1, config.max()))
    }

    #[must_use]
    pub const fn page(&self) -> u64 {
        self.page
    }

    #[must_use]
    pub const fn per_page(&self) -> u64 {
        self.per_page
    }

    /// Rows to skip: `(page - 1) * per_page`.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.per_page
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::from_options(None, None, &PaginationConfig::default())
    }
}

/// Metadata for one page of a result set of `total` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PageInfo {
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
    pub offset: u64,
    pub has_next: bool,
    pub has_prev: bool,
    pub prev_page: Option<u64>,
    pub next_page: Option<u64>,
    /// 1-based index of the first item on this page, 0 when the page is empty
    pub start_item: u64,
    /// 1-based index of the last item on this page, 0 when the page is empty
    pub end_item: u64,
}

/// Derive page metadata. `total_pages` is at least 1, even for an empty result.
#[must_use]
pub fn calculate_pagination(request: PageRequest, total: u64) -> PageInfo {
    let page = request.page();
    let per_page = request.per_page();
    let offset = request.offset();
    let total_pages = total.div_ceil(per_page).max(1);
    let has_next = page < total_pages;
    let has_prev = page > 1;

    let (start_item, end_item) = if offset < total {
        (offset + 1, offset.saturating_add(per_page).min(total))
    } else {
        (0, 0)
    };

    PageInfo {
        page,
        per_page,
        total,
        total_pages,
        offset,
        has_next,
        has_prev,
        prev_page: has_prev.then(|| page - 1),
        next_page: has_next.then(|| page + 1),
        start_item,
        end_item,
    }
}

/// The page envelope returned by list operations.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> PageResult<T> {
    #[must_use]
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        let info = calculate_pagination(request, total);
        Self {
            items,
            total,
            page: info.page,
            per_page: info.per_page,
            total_pages: info.total_pages,
            has_next: info.has_next,
            has_prev: info.has_prev,
        }
    }

    /// Transform the items, keeping the metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }

    /// Like [`PageResult::map`] for fallible transforms. Stops at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<PageResult<U>, E> {
        Ok(PageResult {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
        })
    }
}

/// Page numbers for a pager of at most `max_links` entries, kept around `current`.
#[must_use]
pub fn page_range(current: u64, total_pages: u64, max_links: u64) -> Vec<u64> {
    if total_pages == 0 || max_links == 0 {
        return Vec::new();
    }
    if total_pages <= max_links {
        return (1..=total_pages).collect();
    }

    let current = current.clamp(1, total_pages);
    let mut start = current.saturating_sub(max_links / 2).max(1);
    let mut end = start + max_links - 1;
    if end > total_pages {
        end = total_pages;
        start = end - max_links + 1;
    }
    (start..=end).collect()
}

/// Human readable line such as "Showing 21-40 of 100 items".
#[must_use]
pub fn pagination_summary(info: &PageInfo) -> String {
    match (info.total, info.start_item, info.end_item) {
        (0, _, _) => "No items found".to_string(),
        (total, 0, _) => format!("No items on page {} ({total} items in total)", info.page),
        (total, start, end) if start == end => format!("Showing item {start} of {total}"),
        (total, start, end) => format!("Showing {start}-{end} of {total} items"),
    }
}

/// Whether `page` exists for `total` rows at `per_page` per page. Page 1 always exists.
#[must_use]
pub fn is_valid_page(page: i64, total: u64, per_page: i64) -> bool {
    let (Ok(page), Ok(per_page)) = (u64::try_from(page), u64::try_from(per_page)) else {
        return false;
    };
    page >= 1 && per_page >= 1 && page <= total.div_ceil(per_page).max(1)
}

/// Strip everything that cannot appear in a header value.
fn sanitize_resource_name(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii() && !c.is_ascii_control()).collect()
}

/// React-Admin style `Content-Range: <resource> <first>-<last>/<total>` header.
#[must_use]
pub fn calculate_content_range(offset: u64, limit: u64, total_count: u64, resource_name: &str) -> HeaderMap {
    let last = offset
        .saturating_add(limit)
        .saturating_sub(1)
        .min(total_count.saturating_sub(1))
        .max(offset);
    let safe_name = sanitize_resource_name(resource_name);

    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&format!("{safe_name} {offset}-{last}/{total_count}"))
        .unwrap_or_else(|_| HeaderValue::from_static("items */0"));
    headers.insert(CONTENT_RANGE, value);
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn request(page: i64, per_page: i64) -> PageRequest {
        PageRequest::new(page, per_page, &PaginationConfig::default())
    }

    #[test]
    fn test_single_page() {
        let info = calculate_pagination(request(1, 10), 0);
        assert_eq!(info.total_pages, 1);
        assert!(!info.has_next);
        assert!(!info.has_prev);
        assert_eq!(info.offset, 0);
    }

    #[test]
    fn test_middle_page() {
        let info = calculate_pagination(request(3, 20), 95);
        assert_eq!(info.total_pages, 5);
        assert!(info.has_next);
        assert!(info.has_prev);
        assert_eq!(info.offset, 40);
        assert_eq!((info.prev_page, info.next_page), (Some(2), Some(4)));
        assert_eq!((info.start_item, info.end_item), (41, 60));
    }

    #[test]
    fn test_negative_page_is_page_one() {
        assert_eq!(request(-5, 10), request(1, 10));
        assert_eq!(request(0, 10).page(), 1);
    }

    #[test]
    fn test_per_page_is_clamped() {
        assert_eq!(request(1, 5000).per_page(), 1000);
        assert_eq!(request(1, 0).per_page(), 1);
        assert_eq!(request(1, -3).per_page(), 1);
    }

    #[test]
    fn test_absent_values_use_config() {
        let config = PaginationConfig { default_per_page: 50, max_per_page: 30 };
        let req = PageRequest::from_options(None, None, &config);
        assert_eq!((req.page(), req.per_page()), (1, 30));

        assert_eq!(PageRequest::default().per_page(), DEFAULT_PER_PAGE);
    }

    #[test]
    fn test_clamp_to_stricter_config() {
        let strict = PaginationConfig { default_per_page: 10, max_per_page: 50 };
        let req = request(4, 200).clamp_to(&strict);
        assert_eq!((req.page(), req.per_page()), (4, 50));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: PaginationConfig = serde_json::from_str(r#"{"max_per_page": 100}"#).unwrap();
        assert_eq!(config, PaginationConfig { default_per_page: 20, max_per_page: 100 });
    }

    #[test]
    fn test_page_past_end_is_not_clamped() {
        let info = calculate_pagination(request(10, 20), 95);
        assert_eq!(info.page, 10);
        assert_eq!(info.offset, 180);
        assert!(!info.has_next);
        assert_eq!((info.start_item, info.end_item), (0, 0));
    }

    #[test]
    fn test_page_result_envelope() {
        let result = PageResult::new(vec![1, 2, 3], request(2, 3), 7).map(|n| n * 10);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({
                "items": [10, 20, 30],
                "total": 7,
                "page": 2,
                "per_page": 3,
                "total_pages": 3,
                "has_next": true,
                "has_prev": true
            })
        );
    }

    #[test]
    fn test_try_map_stops_on_error() {
        let result = PageResult::new(vec![1, 2, 3], request(1, 3), 3);
        let mapped: Result<PageResult<i32>, String> =
            result.try_map(|n| if n == 2 { Err("two".to_string()) } else { Ok(n) });
        assert_eq!(mapped.unwrap_err(), "two");
    }

    #[test]
    fn test_page_range_window() {
        assert_eq!(page_range(1, 3, 5), vec![1, 2, 3]);
        assert_eq!(page_range(5, 10, 5), vec![3, 4, 5, 6, 7]);
        assert_eq!(page_range(1, 10, 5), vec![1, 2, 3, 4, 5]);
        assert_eq!(page_range(10, 10, 5), vec![6, 7, 8, 9, 10]);
        assert_eq!(page_range(99, 10, 4), vec![7, 8, 9, 10]);
        assert!(page_range(1, 10, 0).is_empty());
    }

    #[test]
    fn test_pagination_summary() {
        assert_eq!(pagination_summary(&calculate_pagination(request(2, 20), 100)), "Showing 21-40 of 100 items");
        assert_eq!(pagination_summary(&calculate_pagination(request(5, 1), 5)), "Showing item 5 of 5");
        assert_eq!(pagination_summary(&calculate_pagination(request(1, 20), 0)), "No items found");
        assert_eq!(
            pagination_summary(&calculate_pagination(request(9, 20), 30)),
            "No items on page 9 (30 items in total)"
        );
    }

    #[test]
    fn test_is_valid_page() {
        assert!(is_valid_page(1, 0, 20));
        assert!(is_valid_page(5, 95, 20));
        assert!(!is_valid_page(6, 95, 20));
        assert!(!is_valid_page(0, 95, 20));
        assert!(!is_valid_page(1, 95, 0));
    }

    #[test]
    fn test_content_range_normal() {
        let headers = calculate_content_range(0, 10, 100, "users");
        assert_eq!(headers.get(CONTENT_RANGE).unwrap(), "users 0-9/100");

        let headers = calculate_content_range(90, 20, 95, "users");
        assert_eq!(headers.get(CONTENT_RANGE).unwrap(), "users 90-94/95");
    }

    #[test]
    fn test_content_range_strips_control_characters() {
        let headers = calculate_content_range(0, 10, 100, "users\r\nInjected: evil");
        let value = headers.get(CONTENT_RANGE).unwrap().to_str().unwrap();
        assert!(!value.contains('\r'));
        assert!(!value.contains('\n'));
    }

    #[test]
    fn test_content_range_large_numbers() {
        let headers = calculate_content_range(u64::MAX - 100, 1000, u64::MAX, "users");
        assert!(headers.get(CONTENT_RANGE).is_some());
    }

    #[test]
    fn test_huge_page_keeps_offset_bindable() {
        let req = request(i64::MAX, 1000);
        assert!(req.offset() <= MAX_OFFSET);
        assert_eq!(req.page(), MAX_OFFSET / 1000 + 1);

        let req = request(i64::MAX, 1);
        assert_eq!(req.offset(), MAX_OFFSET);

        let info = calculate_pagination(request(i64::MAX, 20), 95);
        assert!(!info.has_next);
        assert_eq!((info.start_item, info.end_item), (0, 0));
    }

    proptest! {
        #[test]
        fn prop_request_is_always_normalized(page in any::<i64>(), per_page in any::<i64>()) {
            let req = request(page, per_page);
            prop_assert!(req.page() >= 1);
            prop_assert!(req.offset() <= MAX_OFFSET);
            prop_assert!((1..=DEFAULT_MAX_PER_PAGE).contains(&req.per_page()));
            prop_assert_eq!(req.limit(), req.per_page());
        }

        #[test]
        fn prop_offset_matches_page(page in 1i64..100_000, per_page in 1i64..=1000) {
            let req = request(page, per_page);
            prop_assert_eq!(req.offset(), (req.page() - 1) * req.per_page());
        }

        #[test]
        fn prop_page_metadata_is_consistent(page in 1i64..500, per_page in 1i64..=1000, total in 0u64..1_000_000) {
            let info = calculate_pagination(request(page, per_page), total);
            prop_assert!(info.total_pages >= 1);
            prop_assert_eq!(info.has_next, info.page < info.total_pages);
            prop_assert_eq!(info.has_prev, info.page > 1);
            prop_assert!(info.end_item <= total);
            if info.page <= info.total_pages && total > 0 {
                prop_assert!(info.start_item >= 1);
            }
        }
    }
}
