use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sea_orm::{
    ColumnTrait, ColumnType, Condition, DbBackend, EntityTrait, IdenStatic, Iterable, Value,
    sea_query::{Expr, Func, SimpleExpr},
};
use uuid::Uuid;

use super::spec::{FilterSpec, FilterValue, Operator, OperatorKind, Scalar};
use crate::errors::ConfigurationError;

/// Coarse column type used to coerce filter operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Text,
    Uuid,
    DateTimeUtc,
    DateTime,
    Date,
    Time,
    Other,
}

impl ColumnKind {
    #[must_use]
    pub fn of(column_type: &ColumnType) -> Self {
        match column_type {
            ColumnType::TinyInteger
            | ColumnType::SmallInteger
            | ColumnType::Integer
            | ColumnType::BigInteger
            | ColumnType::TinyUnsigned
            | ColumnType::SmallUnsigned
            | ColumnType::Unsigned
            | ColumnType::BigUnsigned => Self::Integer,
            ColumnType::Float | ColumnType::Double | ColumnType::Decimal(_) | ColumnType::Money(_) => {
                Self::Float
            }
            ColumnType::Boolean => Self::Boolean,
            ColumnType::Char(_) | ColumnType::String(_) | ColumnType::Text | ColumnType::Enum { .. } => {
                Self::Text
            }
            ColumnType::Uuid => Self::Uuid,
            ColumnType::TimestampWithTimeZone => Self::DateTimeUtc,
            ColumnType::DateTime | ColumnType::Timestamp => Self::DateTime,
            ColumnType::Date => Self::Date,
            ColumnType::Time => Self::Time,
            _ => Self::Other,
        }
    }

    /// Kind of a Sea-ORM column
    #[must_use]
    pub fn of_column<C: ColumnTrait>(column: &C) -> Self {
        Self::of(column.def().get_column_type())
    }

    const fn expected(self) -> &'static str {
        match self {
            Self::Integer => "an integer",
            Self::Float => "a number",
            Self::Boolean => "a bool",
            Self::Text => "a string",
            Self::Uuid => "a UUID string",
            Self::DateTimeUtc | Self::DateTime => "a datetime string",
            Self::Date => "a date string (YYYY-MM-DD)",
            Self::Time => "a time string (HH:MM[:SS])",
            Self::Other => "a scalar",
        }
    }
}

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Coerce one operand to the value type of a column.
///
/// Booleans only match boolean columns and boolean columns only accept booleans.
///
/// # Errors
///
/// Returns [`ConfigurationError::TypeMismatch`] when the operand cannot represent a value
/// of `kind`.
pub fn coerce(kind: ColumnKind, field: &str, scalar: &Scalar) -> Result<Value, ConfigurationError> {
    let mismatch = || ConfigurationError::TypeMismatch {
        field: field.to_string(),
        expected: kind.expected(),
        got: format!("{} {scalar}", scalar.type_name()),
    };

    #[allow(clippy::cast_precision_loss)]
    let value = match (kind, scalar) {
        (ColumnKind::Integer, Scalar::Int(i)) => Value::from(*i),
        (ColumnKind::Integer, Scalar::Float(f)) => Value::from(whole_i64(*f).ok_or_else(mismatch)?),
        (ColumnKind::Integer, Scalar::Text(s)) => Value::from(s.trim().parse::<i64>().map_err(|_| mismatch())?),

        (ColumnKind::Float, Scalar::Int(i)) => Value::from(*i as f64),
        (ColumnKind::Float, Scalar::Float(f)) => Value::from(*f),
        (ColumnKind::Float, Scalar::Text(s)) => Value::from(s.trim().parse::<f64>().map_err(|_| mismatch())?),

        (ColumnKind::Boolean, Scalar::Bool(b)) => Value::from(*b),

        (ColumnKind::Text, Scalar::Text(s)) => Value::from(s.clone()),

        (ColumnKind::Uuid, Scalar::Text(s)) => Value::from(Uuid::parse_str(s.trim()).map_err(|_| mismatch())?),

        (ColumnKind::DateTimeUtc, Scalar::Text(s)) => {
            let naive = parse_naive_datetime(s.trim()).ok_or_else(mismatch)?;
            Value::from(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        }
        (ColumnKind::DateTime, Scalar::Text(s)) => Value::from(parse_naive_datetime(s.trim()).ok_or_else(mismatch)?),
        (ColumnKind::Date, Scalar::Text(s)) => {
            Value::from(NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| mismatch())?)
        }
        (ColumnKind::Time, Scalar::Text(s)) => {
            let s = s.trim();
            let time = NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .map_err(|_| mismatch())?;
            Value::from(time)
        }

        (ColumnKind::Other, Scalar::Bool(b)) => Value::from(*b),
        (ColumnKind::Other, Scalar::Int(i)) => Value::from(*i),
        (ColumnKind::Other, Scalar::Float(f)) => Value::from(*f),
        (ColumnKind::Other, Scalar::Text(s)) => Value::from(s.clone()),

        _ => return Err(mismatch()),
    };
    Ok(value)
}

/// `f` as an `i64` when it is a whole number inside the `i64` range.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub(crate) fn whole_i64(f: f64) -> Option<i64> {
    // 2^63 is exact as an f64; i64::MAX rounds up to it.
    const UPPER: f64 = i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < UPPER).then_some(f as i64)
}

/// Rewrite a `LIKE` pattern as a `GLOB` pattern. `GLOB` metacharacters in the input are
/// bracketed so they match literally.
fn like_to_glob(pattern: &str) -> String {
    let mut glob = String::with_capacity(pattern.len());
    for ch in pattern.chars() {
        match ch {
            '%' => glob.push('*'),
            '_' => glob.push('?'),
            '*' => glob.push_str("[*]"),
            '?' => glob.push_str("[?]"),
            '[' => glob.push_str("[[]"),
            other => glob.push(other),
        }
    }
    glob
}

/// Case-sensitive `LIKE`. SQLite's `LIKE` folds ASCII case, so it gets `GLOB`; MySQL
/// compares against a binary pattern.
fn like_case_sensitive<C: ColumnTrait>(column: C, pattern: &str, backend: DbBackend) -> SimpleExpr {
    match backend {
        DbBackend::Sqlite => Expr::cust_with_exprs(
            "$1 GLOB $2",
            [SimpleExpr::from(column_expr(column)), SimpleExpr::from(Expr::val(like_to_glob(pattern)))],
        ),
        DbBackend::MySql => Expr::cust_with_exprs(
            "$1 LIKE CAST($2 AS BINARY)",
            [SimpleExpr::from(column_expr(column)), SimpleExpr::from(Expr::val(pattern))],
        ),
        _ => column.like(pattern),
    }
}

fn coerce_all(kind: ColumnKind, field: &str, scalars: &[Scalar]) -> Result<Vec<Value>, ConfigurationError> {
    scalars.iter().map(|s| coerce(kind, field, s)).collect()
}

fn expect_bool(field: &str, scalar: &Scalar) -> Result<bool, ConfigurationError> {
    match scalar {
        Scalar::Bool(b) => Ok(*b),
        other => Err(ConfigurationError::TypeMismatch {
            field: field.to_string(),
            expected: ColumnKind::Boolean.expected(),
            got: format!("{} {other}", other.type_name()),
        }),
    }
}

fn bool_keyword(value: bool) -> SimpleExpr {
    Expr::cust(if value { "TRUE" } else { "FALSE" })
}

fn column_expr<C: ColumnTrait>(column: C) -> Expr {
    Expr::col((column.entity_name(), column))
}

/// `column IS TRUE` / `column IS FALSE`, never a bound `=`.
fn is_bool<C: ColumnTrait>(column: C, value: bool) -> SimpleExpr {
    column_expr(column).is(bool_keyword(value))
}

fn is_not_bool<C: ColumnTrait>(column: C, value: bool) -> SimpleExpr {
    column_expr(column).is_not(bool_keyword(value))
}

fn single(expr: SimpleExpr) -> Condition {
    Condition::all().add(expr)
}

fn compile_field<C: ColumnTrait>(
    field: &str,
    column: C,
    value: &FilterValue,
    backend: DbBackend,
) -> Result<Condition, ConfigurationError> {
    let kind = ColumnKind::of_column(&column);
    let is_boolean = kind == ColumnKind::Boolean;

    let condition = match value {
        FilterValue::IsNull => single(column.is_null()),
        FilterValue::Equals(scalar) if is_boolean => single(is_bool(column, expect_bool(field, scalar)?)),
        FilterValue::Equals(scalar) => single(column.eq(coerce(kind, field, scalar)?)),
        FilterValue::OneOf(items) if items.is_empty() => single(Expr::cust("1 = 0")),
        FilterValue::OneOf(items) if is_boolean => items.iter().try_fold(Condition::any(), |cond, item| {
            Ok::<_, ConfigurationError>(cond.add(is_bool(column, expect_bool(field, item)?)))
        })?,
        FilterValue::OneOf(items) => single(column.is_in(coerce_all(kind, field, items)?)),
        FilterValue::Operator(op) => compile_operator(field, column, kind, op, backend)?,
    };
    Ok(condition)
}

fn compile_operator<C: ColumnTrait>(
    field: &str,
    column: C,
    kind: ColumnKind,
    op: &Operator,
    backend: DbBackend,
) -> Result<Condition, ConfigurationError> {
    let is_boolean = kind == ColumnKind::Boolean;
    let unsupported = |operator: OperatorKind| ConfigurationError::TypeMismatch {
        field: field.to_string(),
        expected: if matches!(operator, OperatorKind::Like | OperatorKind::ILike) {
            "a text column"
        } else {
            "an ordered column"
        },
        got: format!("`{operator}` on a {kind:?} column").to_lowercase(),
    };

    let condition = match op {
        Operator::Not(None) => single(column.is_not_null()),
        Operator::Not(Some(scalar)) if is_boolean => single(is_not_bool(column, expect_bool(field, scalar)?)),
        Operator::Not(Some(scalar)) => single(column.ne(coerce(kind, field, scalar)?)),

        Operator::Gte(_) | Operator::Lte(_) | Operator::Gt(_) | Operator::Lt(_) | Operator::Between(..)
            if is_boolean =>
        {
            return Err(unsupported(op.kind()));
        }
        Operator::Gte(scalar) => single(column.gte(coerce(kind, field, scalar)?)),
        Operator::Lte(scalar) => single(column.lte(coerce(kind, field, scalar)?)),
        Operator::Gt(scalar) => single(column.gt(coerce(kind, field, scalar)?)),
        Operator::Lt(scalar) => single(column.lt(coerce(kind, field, scalar)?)),
        Operator::Between(low, high) => single(column.between(coerce(kind, field, low)?, coerce(kind, field, high)?)),

        Operator::NotIn(items) if items.is_empty() => single(Expr::cust("1 = 1")),
        Operator::NotIn(items) if is_boolean => items.iter().try_fold(Condition::all(), |cond, item| {
            Ok::<_, ConfigurationError>(cond.add(is_not_bool(column, expect_bool(field, item)?)))
        })?,
        Operator::NotIn(items) => single(column.is_not_in(coerce_all(kind, field, items)?)),

        Operator::Like(_) | Operator::ILike(_) if !matches!(kind, ColumnKind::Text | ColumnKind::Other) => {
            return Err(unsupported(op.kind()));
        }
        Operator::Like(pattern) => single(like_case_sensitive(column, pattern, backend)),
        // SQL LOWER() only folds ASCII on SQLite, so the pattern is folded the same way.
        Operator::ILike(pattern) => {
            single(Expr::expr(Func::lower(column_expr(column))).like(pattern.to_ascii_lowercase()))
        }
    };
    Ok(condition)
}

/// Compile a filter dictionary against an explicit `(name, column)` whitelist.
///
/// Every field must appear in `columns`; the per-field predicates are AND-ed. `backend`
/// selects the case-sensitive `like` form.
///
/// # Errors
///
/// Returns [`ConfigurationError::UnknownField`] for a field missing from `columns`, or the
/// coercion error of the first operand that does not fit its column.
pub fn compile_filters_with<C: ColumnTrait>(
    spec: &FilterSpec,
    columns: &[(&str, C)],
    resource: &str,
    backend: DbBackend,
) -> Result<Condition, ConfigurationError> {
    let mut condition = Condition::all();

    for (field, value) in spec.iter() {
        let column = columns
            .iter()
            .find_map(|(name, column)| (*name == field).then_some(*column))
            .ok_or_else(|| ConfigurationError::UnknownField {
                resource: resource.to_string(),
                field: field.to_string(),
            })?;
        condition = condition.add(compile_field(field, column, value, backend)?);
    }

    tracing::debug!(resource, fields = spec.len(), "Compiled filter");
    Ok(condition)
}

/// Compile a filter dictionary against every column of entity `E`.
///
/// # Errors
///
/// See [`compile_filters_with`].
pub fn compile_filters<E: EntityTrait>(spec: &FilterSpec, backend: DbBackend) -> Result<Condition, ConfigurationError> {
    let names: Vec<(String, E::Column)> = E::Column::iter().map(|c| (c.as_str().to_string(), c)).collect();
    let columns: Vec<(&str, E::Column)> = names.iter().map(|(name, c)| (name.as_str(), *c)).collect();
    compile_filters_with(spec, &columns, E::default().table_name(), backend)
}
