//! # crudlite
//!
//! Query building blocks for Sea-ORM backed REST APIs:
//!
//! - a filter compiler turning a JSON filter dictionary into a Sea-ORM [`Condition`](sea_orm::Condition)
//! - an offset pagination calculator and a uniform page envelope
//! - the [`CRUDResource`] trait tying both to an entity
//! - schema-string projection of rows into plain JSON maps
//! - axum handlers generated by [`crud_handlers!`]
//!
//! ```rust,ignore
//! use crudlite::{CRUDResource, FilterSpec, ListParams, PageRequest, PaginationConfig};
//!
//! let params = ListParams::new()
//!     .filters(FilterSpec::parse(r#"{"status": "published", "views": {">=": 100}}"#)?)
//!     .sort("created_at", true)
//!     .page(PageRequest::new(2, 25, &PaginationConfig::default()));
//!
//! let page = Article::list(&db, &params).await?;
//! ```

pub mod core;
pub mod errors;
pub mod filtering;
pub mod models;
pub mod pagination;
pub mod projection;
pub mod routes;
pub mod validation;

pub use self::core::{CRUDResource, FieldStatistics, MergeIntoActiveModel, PrimaryKeyOf};
pub use errors::{ApiError, ConfigurationError, CrudError};
pub use filtering::{FilterSpec, FilterValue, Operator, Scalar, SortSpec, compile_filters, compile_filters_with};
pub use models::{ListParams, ListQuery};
pub use pagination::{PageInfo, PageRequest, PageResult, PaginationConfig, calculate_pagination};
pub use projection::{BuiltinCoercer, Coercer, Schema, SchemaRegistry, TypeToken};
pub use validation::{Validatable, ValidationError, ValidationErrors};

// Used by `crud_handlers!` expansions.
#[doc(hidden)]
pub mod __private {
    pub use axum;
    pub use sea_orm;
}
