use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DbBackend, DbErr, EntityTrait, IntoActiveModel, Order, PaginatorTrait, PrimaryKeyTrait, QueryFilter,
    QueryOrder, QuerySelect, TryGetableMany, Value,
    sea_query::{Alias, Expr, Func, SimpleExpr},
};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::errors::{ConfigurationError, CrudError};
use crate::filtering::conditions::{ColumnKind, compile_filters_with};
use crate::filtering::search::build_search_condition;
use crate::filtering::sort::resolve_sort;
use crate::filtering::spec::FilterSpec;
use crate::models::ListParams;
use crate::pagination::{PageResult, PaginationConfig};
use crate::projection::{Coercer, Schema, project_value};
use crate::validation::ValidationErrors;

/// Primary key value type of a resource's entity.
pub type PrimaryKeyOf<T> =
    <<<T as CRUDResource>::EntityType as EntityTrait>::PrimaryKey as PrimaryKeyTrait>::ValueType;

pub trait MergeIntoActiveModel<ActiveModelType> {
    /// Merge this update model into an existing active model
    ///
    /// # Errors
    ///
    /// Returns a `DbErr` if the merge operation fails due to data conversion issues.
    fn merge_into_activemodel(self, existing: ActiveModelType) -> Result<ActiveModelType, DbErr>;
}

/// Value written to a soft-delete column when a row is deleted.
fn soft_delete_stamp<C: ColumnTrait>(column: &C) -> Result<Value, DbErr> {
    match ColumnKind::of_column(column) {
        ColumnKind::DateTimeUtc => Ok(Value::from(Utc::now())),
        ColumnKind::DateTime => Ok(Value::from(Utc::now().naive_utc())),
        kind => Err(DbErr::Custom(format!(
            "soft-delete column `{}` must be a datetime, found {kind:?}",
            column.as_str()
        ))),
    }
}

fn soft_delete_clear<C: ColumnTrait>(column: &C) -> Value {
    match ColumnKind::of_column(column) {
        ColumnKind::DateTime => Value::from(Option::<chrono::NaiveDateTime>::None),
        _ => Value::from(Option::<DateTime<Utc>>::None),
    }
}

fn refuse_empty(filters: &FilterSpec, action: &str) -> Result<(), ConfigurationError> {
    if filters.is_empty() {
        return Err(ConfigurationError::InvalidFilter(format!("refusing to {action} with an empty filter")));
    }
    Ok(())
}

/// `expr` cast to the backend's double precision type.
fn as_double(expr: SimpleExpr, backend: DbBackend) -> SimpleExpr {
    let double = match backend {
        DbBackend::Sqlite => "REAL",
        DbBackend::MySql => "DOUBLE",
        _ => "DOUBLE PRECISION",
    };
    Func::cast_as(expr, Alias::new(double)).into()
}

/// Aggregates of one numeric column over the matching rows. NULLs are ignored;
/// `min`, `max` and `avg` are `None` when no non-NULL value matched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldStatistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub count: u64,
}

/// A resource exposed through the CRUD layer.
///
/// Every operation is a default method; implementors provide the associated types, the
/// resource names and whichever configuration hooks differ from the defaults.
#[async_trait]
pub trait CRUDResource: Sized + Send + Sync
where
    Self::EntityType: EntityTrait + Sync,
    Self::ActiveModelType: ActiveModelTrait + ActiveModelBehavior + Send + Sync,
    <Self::EntityType as EntityTrait>::Model: Sync + IntoActiveModel<Self::ActiveModelType>,
    Self: From<<Self::EntityType as EntityTrait>::Model>,
{
    type EntityType: EntityTrait + Sync;
    type ColumnType: ColumnTrait + std::fmt::Debug;
    type ActiveModelType: ActiveModelTrait<Entity = Self::EntityType>;
    type CreateModel: Into<Self::ActiveModelType> + Send + Sync;
    type UpdateModel: Send + Sync + MergeIntoActiveModel<Self::ActiveModelType>;
    type ListModel: From<Self> + Serialize + Send + Sync;

    const ID_COLUMN: Self::ColumnType;
    const RESOURCE_NAME_SINGULAR: &'static str;
    const RESOURCE_NAME_PLURAL: &'static str;
    const RESOURCE_DESCRIPTION: &'static str = "";

    // ============================================================================
    // Configuration hooks
    // ============================================================================

    #[must_use]
    fn default_index_column() -> Self::ColumnType {
        Self::ID_COLUMN
    }

    #[must_use]
    fn sortable_columns() -> Vec<(&'static str, Self::ColumnType)> {
        vec![("id", Self::ID_COLUMN)]
    }

    #[must_use]
    fn filterable_columns() -> Vec<(&'static str, Self::ColumnType)> {
        vec![("id", Self::ID_COLUMN)]
    }

    /// Columns matched by the free-text `q` search. Empty disables search.
    #[must_use]
    fn searchable_columns() -> Vec<(&'static str, Self::ColumnType)> {
        vec![]
    }

    /// Nullable datetime column marking soft-deleted rows. `None` means rows are only
    /// ever hard deleted.
    #[must_use]
    fn soft_delete_column() -> Option<<Self::EntityType as EntityTrait>::Column> {
        None
    }

    #[must_use]
    fn pagination_config() -> PaginationConfig {
        PaginationConfig::default()
    }

    /// # Errors
    ///
    /// Returns the failing fields; nothing is written.
    fn validate_create(_create_model: &Self::CreateModel) -> Result<(), ValidationErrors> {
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the failing fields; nothing is written.
    fn validate_update(_update_model: &Self::UpdateModel) -> Result<(), ValidationErrors> {
        Ok(())
    }

    // ============================================================================
    // Conditions
    // ============================================================================

    /// `deleted_at IS NULL` for resources with soft delete.
    #[must_use]
    fn not_deleted_condition() -> Condition {
        Self::soft_delete_column()
            .map_or_else(Condition::all, |column| Condition::all().add(column.is_null()))
    }

    /// Compile a filter against [`CRUDResource::filterable_columns`], hiding soft-deleted
    /// rows unless `include_deleted`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] for fields that are not filterable or operands that
    /// do not fit their column.
    fn filter_condition(
        spec: &FilterSpec,
        include_deleted: bool,
        backend: DbBackend,
    ) -> Result<Condition, ConfigurationError> {
        let condition = compile_filters_with(spec, &Self::filterable_columns(), Self::RESOURCE_NAME_PLURAL, backend)?;
        Ok(if include_deleted {
            condition
        } else {
            condition.add(Self::not_deleted_condition())
        })
    }

    /// Filters, search and soft delete of a list call, AND-ed.
    ///
    /// # Errors
    ///
    /// See [`CRUDResource::filter_condition`].
    fn list_condition(params: &ListParams, backend: DbBackend) -> Result<Condition, ConfigurationError> {
        let mut condition = Self::filter_condition(&params.filters, params.include_deleted, backend)?;
        if let Some(search) = params
            .search
            .as_deref()
            .and_then(|term| build_search_condition(term, &Self::searchable_columns()))
        {
            condition = condition.add(search);
        }
        Ok(condition)
    }

    // ============================================================================
    // Reads
    // ============================================================================

    async fn get_one(db: &DatabaseConnection, id: PrimaryKeyOf<Self>) -> Result<Self, DbErr> {
        let model = Self::EntityType::find_by_id(id)
            .filter(Self::not_deleted_condition())
            .one(db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("{} not found", Self::RESOURCE_NAME_SINGULAR)))?;
        Ok(Self::from(model))
    }

    async fn get_all(
        db: &DatabaseConnection,
        condition: &Condition,
        order_column: Self::ColumnType,
        order_direction: Order,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Self::ListModel>, DbErr> {
        let models = Self::EntityType::find()
            .filter(condition.clone())
            .order_by(order_column, order_direction)
            .offset(offset)
            .limit(limit)
            .all(db)
            .await?;
        Ok(models
            .into_iter()
            .map(|model| Self::ListModel::from(Self::from(model)))
            .collect())
    }

    async fn total_count(db: &DatabaseConnection, condition: &Condition) -> Result<u64, DbErr> {
        let query = Self::EntityType::find().filter(condition.clone());
        PaginatorTrait::count(query, db).await
    }

    /// Filter, search, count, sort and fetch one page.
    ///
    /// # Errors
    ///
    /// [`CrudError::Configuration`] before any query runs if the filter is invalid,
    /// [`CrudError::Database`] if a query fails.
    async fn list(db: &DatabaseConnection, params: &ListParams) -> Result<PageResult<Self::ListModel>, CrudError> {
        let condition = Self::list_condition(params, db.get_database_backend())?;
        let (order_column, order_direction) = resolve_sort(
            params.sort.as_ref(),
            &Self::sortable_columns(),
            Self::default_index_column(),
        );
        let page = params.page.clamp_to(&Self::pagination_config());

        let total = Self::total_count(db, &condition).await?;
        let items = Self::get_all(db, &condition, order_column, order_direction, page.offset(), page.limit()).await?;

        tracing::debug!(
            resource = Self::RESOURCE_NAME_PLURAL,
            total,
            page = page.page(),
            returned = items.len(),
            "Listed resources"
        );
        Ok(PageResult::new(items, page, total))
    }

    /// [`CRUDResource::list`] with every item projected through `schema`.
    ///
    /// # Errors
    ///
    /// As [`CRUDResource::list`], plus [`CrudError::Validation`] for the first item that
    /// does not fit `schema`.
    async fn list_projected(
        db: &DatabaseConnection,
        params: &ListParams,
        schema: &Schema,
        coercer: &dyn Coercer,
    ) -> Result<PageResult<Map<String, JsonValue>>, CrudError> {
        let page = Self::list(db, params).await?;
        Ok(page.try_map(|item| project_value(&item, schema, coercer))?)
    }

    /// Filterable column named `field`.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::UnknownField`] if `field` is not filterable.
    fn filterable_column(field: &str) -> Result<Self::ColumnType, ConfigurationError> {
        Self::filterable_columns()
            .into_iter()
            .find_map(|(name, column)| (name == field).then_some(column))
            .ok_or_else(|| ConfigurationError::UnknownField {
                resource: Self::RESOURCE_NAME_PLURAL.to_string(),
                field: field.to_string(),
            })
    }

    /// First matching row in default index order.
    async fn find_first(
        db: &DatabaseConnection,
        filters: &FilterSpec,
        include_deleted: bool,
    ) -> Result<Option<Self>, CrudError> {
        let condition = Self::filter_condition(filters, include_deleted, db.get_database_backend())?;
        let model = Self::EntityType::find()
            .filter(condition)
            .order_by(Self::default_index_column(), Order::Asc)
            .one(db)
            .await?;
        Ok(model.map(Self::from))
    }

    async fn count(db: &DatabaseConnection, filters: &FilterSpec, include_deleted: bool) -> Result<u64, CrudError> {
        let condition = Self::filter_condition(filters, include_deleted, db.get_database_backend())?;
        Ok(Self::total_count(db, &condition).await?)
    }

    async fn exists(db: &DatabaseConnection, filters: &FilterSpec, include_deleted: bool) -> Result<bool, CrudError> {
        Ok(Self::count(db, filters, include_deleted).await? > 0)
    }

    /// Distinct non-NULL values of a filterable column, ascending.
    ///
    /// ```rust,ignore
    /// let statuses: Vec<String> = Article::distinct_values(&db, "status", false).await?;
    /// ```
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::UnknownField`] if `field` is not filterable, or
    /// [`CrudError::Database`] if the values do not decode as `T`.
    async fn distinct_values<T>(
        db: &DatabaseConnection,
        field: &str,
        include_deleted: bool,
    ) -> Result<Vec<T>, CrudError>
    where
        T: TryGetableMany + Send + Sync + 'static,
    {
        let column = Self::filterable_column(field)?;
        let mut query = Self::EntityType::find()
            .select_only()
            .column(column)
            .distinct()
            .filter(column.is_not_null())
            .order_by(column, Order::Asc);
        if !include_deleted {
            query = query.filter(Self::not_deleted_condition());
        }
        Ok(query.into_tuple::<T>().all(db).await?)
    }

    /// `MIN`, `MAX`, `AVG` and `COUNT` of a numeric filterable column over the rows
    /// matching `filters`.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::UnknownField`] if `field` is not filterable,
    /// [`ConfigurationError::TypeMismatch`] if it is not numeric.
    async fn field_statistics(
        db: &DatabaseConnection,
        field: &str,
        filters: &FilterSpec,
        include_deleted: bool,
    ) -> Result<FieldStatistics, CrudError> {
        let column = Self::filterable_column(field)?;
        let kind = ColumnKind::of_column(&column);
        if !matches!(kind, ColumnKind::Integer | ColumnKind::Float) {
            return Err(ConfigurationError::TypeMismatch {
                field: field.to_string(),
                expected: "a numeric column",
                got: format!("a {kind:?} column").to_lowercase(),
            }
            .into());
        }

        let backend = db.get_database_backend();
        let condition = Self::filter_condition(filters, include_deleted, backend)?;
        let col = || Expr::col((column.entity_name(), column));
        let row = Self::EntityType::find()
            .select_only()
            .expr_as(as_double(col().min(), backend), "min")
            .expr_as(as_double(col().max(), backend), "max")
            .expr_as(as_double(Func::avg(col()).into(), backend), "avg")
            .expr_as(col().count(), "count")
            .filter(condition)
            .into_tuple::<(Option<f64>, Option<f64>, Option<f64>, i64)>()
            .one(db)
            .await?;

        let (min, max, avg, count) = row.unwrap_or((None, None, None, 0));
        Ok(FieldStatistics {
            min,
            max,
            avg,
            count: u64::try_from(count).unwrap_or(0),
        })
    }

    // ============================================================================
    // Writes
    // ============================================================================

    async fn create(db: &DatabaseConnection, create_model: Self::CreateModel) -> Result<Self, CrudError> {
        Self::validate_create(&create_model)?;
        let active_model: Self::ActiveModelType = create_model.into();
        let model = active_model.insert(db).await?;
        Ok(Self::from(model))
    }

    async fn update(
        db: &DatabaseConnection,
        id: PrimaryKeyOf<Self>,
        update_model: Self::UpdateModel,
    ) -> Result<Self, CrudError> {
        Self::validate_update(&update_model)?;
        let model = Self::EntityType::find_by_id(id)
            .filter(Self::not_deleted_condition())
            .one(db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("{} not found", Self::RESOURCE_NAME_SINGULAR)))?;
        let existing: Self::ActiveModelType = model.into_active_model();
        let updated = update_model.merge_into_activemodel(existing)?.update(db).await?;
        Ok(Self::from(updated))
    }

    /// Hard delete, whether or not the row is soft-deleted.
    async fn delete(db: &DatabaseConnection, id: PrimaryKeyOf<Self>) -> Result<(), DbErr> {
        let res = Self::EntityType::delete_by_id(id).exec(db).await?;
        match res.rows_affected {
            0 => Err(DbErr::RecordNotFound(format!("{} not found", Self::RESOURCE_NAME_SINGULAR))),
            _ => Ok(()),
        }
    }

    /// Hard delete every row matching `filters`. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// An empty filter is rejected with [`ConfigurationError::InvalidFilter`].
    async fn delete_where(db: &DatabaseConnection, filters: &FilterSpec) -> Result<u64, CrudError> {
        refuse_empty(filters, "delete")?;
        let condition = Self::filter_condition(filters, true, db.get_database_backend())?;
        let res = Self::EntityType::delete_many().filter(condition).exec(db).await?;
        tracing::debug!(resource = Self::RESOURCE_NAME_PLURAL, deleted = res.rows_affected, "Deleted by filter");
        Ok(res.rows_affected)
    }

    /// Set `changes` on every row matching `filters`. Returns the number of rows updated.
    /// Validation hooks do not run.
    ///
    /// ```rust,ignore
    /// let archived = Article::update_where(
    ///     &db,
    ///     &FilterSpec::new().eq("status", "draft"),
    ///     vec![(article::Column::Status, "archived".into())],
    ///     false,
    /// )
    /// .await?;
    /// ```
    ///
    /// # Errors
    ///
    /// An empty filter or an empty `changes` is rejected with
    /// [`ConfigurationError::InvalidFilter`].
    async fn update_where(
        db: &DatabaseConnection,
        filters: &FilterSpec,
        changes: Vec<(<Self::EntityType as EntityTrait>::Column, Value)>,
        include_deleted: bool,
    ) -> Result<u64, CrudError> {
        refuse_empty(filters, "update")?;
        if changes.is_empty() {
            return Err(ConfigurationError::InvalidFilter("no columns to update".to_string()).into());
        }
        let condition = Self::filter_condition(filters, include_deleted, db.get_database_backend())?;
        let update = changes
            .into_iter()
            .fold(Self::EntityType::update_many(), |update, (column, value)| {
                update.col_expr(column, Expr::value(value))
            });
        let res = update.filter(condition).exec(db).await?;
        tracing::debug!(resource = Self::RESOURCE_NAME_PLURAL, updated = res.rows_affected, "Updated by filter");
        Ok(res.rows_affected)
    }

    /// Stamp the soft-delete column with the current time.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::SoftDeleteUnsupported`] without a soft-delete column;
    /// `RecordNotFound` if the row does not exist or is already deleted.
    async fn soft_delete(db: &DatabaseConnection, id: PrimaryKeyOf<Self>) -> Result<Self, CrudError> {
        let column = Self::soft_delete_column()
            .ok_or(ConfigurationError::SoftDeleteUnsupported(Self::RESOURCE_NAME_SINGULAR))?;
        let model = Self::EntityType::find_by_id(id)
            .filter(column.is_null())
            .one(db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("{} not found", Self::RESOURCE_NAME_SINGULAR)))?;

        let mut active: Self::ActiveModelType = model.into_active_model();
        active.set(column, soft_delete_stamp(&column)?);
        Ok(Self::from(active.update(db).await?))
    }

    /// Clear the soft-delete column of a deleted row.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::SoftDeleteUnsupported`] without a soft-delete column;
    /// `RecordNotFound` if the row does not exist or is not deleted.
    async fn restore(db: &DatabaseConnection, id: PrimaryKeyOf<Self>) -> Result<Self, CrudError> {
        let column = Self::soft_delete_column()
            .ok_or(ConfigurationError::SoftDeleteUnsupported(Self::RESOURCE_NAME_SINGULAR))?;
        let model = Self::EntityType::find_by_id(id)
            .filter(column.is_not_null())
            .one(db)
            .await?
            .ok_or_else(|| {
                DbErr::RecordNotFound(format!("{} not found among deleted rows", Self::RESOURCE_NAME_SINGULAR))
            })?;

        let mut active: Self::ActiveModelType = model.into_active_model();
        active.set(column, soft_delete_clear(&column));
        Ok(Self::from(active.update(db).await?))
    }

    /// Soft delete every live row matching `filters`. Returns the number of rows stamped.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::SoftDeleteUnsupported`] without a soft-delete column; an
    /// empty filter is rejected with [`ConfigurationError::InvalidFilter`].
    async fn soft_delete_where(db: &DatabaseConnection, filters: &FilterSpec) -> Result<u64, CrudError> {
        let column = Self::soft_delete_column()
            .ok_or(ConfigurationError::SoftDeleteUnsupported(Self::RESOURCE_NAME_SINGULAR))?;
        refuse_empty(filters, "soft delete")?;
        let condition = Self::filter_condition(filters, false, db.get_database_backend())?;
        let res = Self::EntityType::update_many()
            .col_expr(column, Expr::value(soft_delete_stamp(&column)?))
            .filter(condition)
            .exec(db)
            .await?;
        tracing::debug!(resource = Self::RESOURCE_NAME_PLURAL, deleted = res.rows_affected, "Soft deleted by filter");
        Ok(res.rows_affected)
    }

    /// Restore every soft-deleted row matching `filters`. Returns the number of rows
    /// restored.
    ///
    /// # Errors
    ///
    /// As [`CRUDResource::soft_delete_where`].
    async fn restore_where(db: &DatabaseConnection, filters: &FilterSpec) -> Result<u64, CrudError> {
        let column = Self::soft_delete_column()
            .ok_or(ConfigurationError::SoftDeleteUnsupported(Self::RESOURCE_NAME_SINGULAR))?;
        refuse_empty(filters, "restore")?;
        let condition = Self::filter_condition(filters, true, db.get_database_backend())?;
        let res = Self::EntityType::update_many()
            .col_expr(column, Expr::value(soft_delete_clear(&column)))
            .filter(condition)
            .filter(column.is_not_null())
            .exec(db)
            .await?;
        tracing::debug!(resource = Self::RESOURCE_NAME_PLURAL, restored = res.rows_affected, "Restored by filter");
        Ok(res.rows_affected)
    }
}
