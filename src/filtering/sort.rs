use sea_orm::{ColumnTrait, sea_query::Order};

use crate::models::ListQuery;

/// Requested ordering, before it is resolved against a resource's sortable columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub descending: bool,
}

impl SortSpec {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    #[must_use]
    pub const fn order(&self) -> Order {
        if self.descending { Order::Desc } else { Order::Asc }
    }
}

fn is_descending(order: Option<&str>) -> bool {
    order.is_some_and(|o| o.trim().eq_ignore_ascii_case("desc"))
}

/// React-Admin form: `["column", "ASC|DESC"]`.
fn parse_json_sort(json: &str) -> Option<SortSpec> {
    let parts: Vec<String> = serde_json::from_str(json).ok()?;
    let field = parts.first()?.trim();
    if field.is_empty() {
        return None;
    }
    Some(SortSpec {
        field: field.to_string(),
        descending: is_descending(parts.get(1).map(String::as_str)),
    })
}

/// Read the requested ordering from list query parameters.
///
/// Accepts `sort_by=col&order=desc`, `sort=col&order=desc` and `sort=["col","DESC"]`.
/// `sort_by` wins when both are given.
#[must_use]
pub fn parse_sort(params: &ListQuery) -> Option<SortSpec> {
    let descending = is_descending(params.order.as_deref());

    if let Some(sort_by) = params.sort_by.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        return Some(SortSpec {
            field: sort_by.to_string(),
            descending,
        });
    }

    let sort = params.sort.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    if sort.starts_with('[') {
        parse_json_sort(sort)
    } else {
        Some(SortSpec {
            field: sort.to_string(),
            descending,
        })
    }
}

/// Resolve a sort request against `columns`.
///
/// Sorting is lenient: no request, or a field that is not sortable, orders by
/// `default` ascending.
pub fn resolve_sort<C>(sort: Option<&SortSpec>, columns: &[(&str, C)], default: C) -> (C, Order)
where
    C: ColumnTrait + Copy,
{
    let Some(sort) = sort else {
        return (default, Order::Asc);
    };

    columns
        .iter()
        .find(|(name, _)| *name == sort.field)
        .map_or_else(
            || {
                tracing::debug!(field = %sort.field, "Unknown sort column, using default");
                (default, Order::Asc)
            },
            |&(_, column)| (column, sort.order()),
        )
}
