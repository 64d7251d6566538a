//! # Filtering, Search & Sorting
//!
//! Turns caller input into Sea-ORM query parts:
//!
//! - [`spec`]: the [`FilterSpec`] dictionary and its strict parser
//! - [`conditions`]: the filter compiler, [`FilterSpec`] → [`sea_orm::Condition`]
//! - [`search`]: free-text search across a resource's searchable columns
//! - [`sort`]: sort parameters, resolved leniently against sortable columns
//!
//! ## Filter dictionary
//!
//! ```rust,ignore
//! // WHERE status = 'published' AND views >= 100 AND deleted_at IS NULL
//! let spec = FilterSpec::parse(r#"{
//!     "status": "published",
//!     "views": {">=": 100},
//!     "deleted_at": null
//! }"#)?;
//! let condition = compile_filters::<article::Entity>(&spec, db.get_database_backend())?;
//! ```
//!
//! | JSON value                       | SQL                                   |
//! |----------------------------------|---------------------------------------|
//! | `"x"`, `3`, `2.5`                | `col = value`                         |
//! | `true` / `false`                 | `col IS TRUE` / `col IS FALSE`        |
//! | `null`                           | `col IS NULL`                         |
//! | `[a, b]`                         | `col IN (a, b)`, `[]` matches nothing |
//! | `{"not": v}` / `{"not": null}`   | `col <> v` / `col IS NOT NULL`        |
//! | `{">=": v}` `{"<=": v}` `{">": v}` `{"<": v}` | comparisons              |
//! | `{"between": [lo, hi]}`          | `col BETWEEN lo AND hi`               |
//! | `{"not_in": [a, b]}`             | `col NOT IN (a, b)`, `[]` matches all |
//! | `{"like": "A%"}`                 | case-sensitive `col LIKE 'A%'`, `col GLOB 'A*'` on SQLite |
//! | `{"ilike": "%a%"}`               | `LOWER(col) LIKE '%a%'`, ASCII folding |

pub mod conditions;
pub mod search;
pub mod sort;
pub mod spec;

pub use conditions::{ColumnKind, compile_filters, compile_filters_with};
pub use search::build_search_condition;
pub use sort::{SortSpec, parse_sort, resolve_sort};
pub use spec::{FilterSpec, FilterValue, Operator, OperatorKind, Scalar};
