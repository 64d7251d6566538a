use serde::Deserialize;
use serde_with::{DefaultOnError, DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

use crate::errors::ConfigurationError;
use crate::filtering::sort::{SortSpec, parse_sort};
use crate::filtering::spec::FilterSpec;
use crate::pagination::{PageRequest, PaginationConfig};

/// Query parameters for filtering, searching, pagination and sorting a list.
///
/// # Filtering
/// `filter` is a JSON-encoded filter dictionary, AND-ed field by field:
/// ```json
/// {"status": "published", "views": {">=": 100}, "deleted_at": null}
/// ```
/// Unknown fields and unknown operators are rejected with `400 Bad Request`.
///
/// # Pagination
/// `page` (1-based) and `per_page`. Values that are missing or not integers fall back
/// to the defaults; out-of-range values are clamped.
///
/// # Sorting
/// Either `sort_by=title&order=DESC`, `sort=title&order=DESC`, or the React-Admin
/// form `sort=["title","DESC"]`.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// JSON-encoded filter dictionary.
    #[param(example = json!({"status": "published", "views": {">=": 100}}))]
    pub filter: Option<String>,
    /// Free text search across the searchable columns.
    #[param(example = "rust")]
    pub q: Option<String>,
    /// Page number (1-based).
    #[serde(default)]
    #[serde_as(as = "DefaultOnError<Option<DisplayFromStr>>")]
    #[param(example = 1)]
    pub page: Option<i64>,
    /// Items per page.
    #[serde(default)]
    #[serde_as(as = "DefaultOnError<Option<DisplayFromStr>>")]
    #[param(example = 20)]
    pub per_page: Option<i64>,
    /// Sort column, or `["column", "ASC|DESC"]`.
    #[param(example = r#"["id", "ASC"]"#)]
    pub sort: Option<String>,
    /// Sort column for the REST form.
    #[param(example = "title")]
    pub sort_by: Option<String>,
    /// `ASC` or `DESC`.
    #[param(example = "ASC")]
    pub order: Option<String>,
    /// Include soft-deleted rows.
    #[serde(default)]
    #[serde_as(as = "DefaultOnError<Option<DisplayFromStr>>")]
    pub include_deleted: Option<bool>,
}

impl ListQuery {
    /// Parse into typed list parameters. The filter JSON is parsed strictly.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if `filter` is not a valid filter dictionary.
    pub fn into_list_params(self, config: &PaginationConfig) -> Result<ListParams, ConfigurationError> {
        let filters = match self.filter.as_deref().map(str::trim) {
            None | Some("") => FilterSpec::new(),
            Some(json) => FilterSpec::parse(json)?,
        };

        Ok(ListParams {
            filters,
            search: self.q.clone().filter(|q| !q.trim().is_empty()),
            sort: parse_sort(&self),
            page: PageRequest::from_options(self.page, self.per_page, config),
            include_deleted: self.include_deleted.unwrap_or(false),
        })
    }
}

/// Typed input of a list call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListParams {
    pub filters: FilterSpec,
    pub search: Option<String>,
    pub sort: Option<SortSpec>,
    pub page: PageRequest,
    pub include_deleted: bool,
}

impl ListParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filters(mut self, filters: FilterSpec) -> Self {
        self.filters = filters;
        self
    }

    #[must_use]
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    #[must_use]
    pub fn sort(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.sort = Some(SortSpec {
            field: field.into(),
            descending,
        });
        self
    }

    #[must_use]
    pub fn page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }

    #[must_use]
    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filtering::spec::{FilterValue, Scalar};

    fn query(qs: &str) -> ListQuery {
        serde_json::from_value(query_string_object(qs)).unwrap()
    }

    /// Minimal `a=b&c=d` → JSON object of strings, the shape axum's `Query` hands serde.
    fn query_string_object(qs: &str) -> serde_json::Value {
        let map = qs
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        serde_json::Value::Object(map)
    }

    #[test]
    fn test_defaults() {
        let params = query("").into_list_params(&PaginationConfig::default()).unwrap();
        assert!(params.filters.is_empty());
        assert_eq!(params.page.page(), 1);
        assert_eq!(params.page.per_page(), 20);
        assert!(params.sort.is_none());
        assert!(!params.include_deleted);
    }

    #[test]
    fn test_non_integer_page_falls_back() {
        let params = query("page=abc&per_page=x")
            .into_list_params(&PaginationConfig::default())
            .unwrap();
        assert_eq!(params.page.page(), 1);
        assert_eq!(params.page.per_page(), 20);
    }

    #[test]
    fn test_page_values_are_clamped() {
        let params = query("page=-3&per_page=5000")
            .into_list_params(&PaginationConfig::default())
            .unwrap();
        assert_eq!(params.page.page(), 1);
        assert_eq!(params.page.per_page(), 1000);
    }

    #[test]
    fn test_filter_is_parsed_strictly() {
        let params = query(r#"filter={"status":"draft"}&q=rust&include_deleted=true"#)
            .into_list_params(&PaginationConfig::default())
            .unwrap();
        assert_eq!(params.filters.get("status"), Some(&FilterValue::Equals(Scalar::Text("draft".into()))));
        assert_eq!(params.search.as_deref(), Some("rust"));
        assert!(params.include_deleted);

        let err = query(r#"filter={"views":{"~":1}}"#).into_list_params(&PaginationConfig::default());
        assert!(matches!(err, Err(ConfigurationError::UnknownOperator { .. })));

        let err = query("filter=not-json").into_list_params(&PaginationConfig::default());
        assert!(matches!(err, Err(ConfigurationError::InvalidFilter(_))));
    }

    #[test]
    fn test_blank_search_is_dropped() {
        let params = query("q=").into_list_params(&PaginationConfig::default()).unwrap();
        assert!(params.search.is_none());
    }

    #[test]
    fn test_builder() {
        let params = ListParams::new()
            .filters(FilterSpec::new().eq("status", "draft"))
            .search("rust")
            .sort("views", true)
            .include_deleted(true);
        assert_eq!(params.sort, Some(SortSpec { field: "views".into(), descending: true }));
        assert_eq!(params.search.as_deref(), Some("rust"));
        assert!(params.include_deleted);
    }
}
