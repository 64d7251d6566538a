//! Typed filter dictionaries.
//!
//! A [`FilterSpec`] maps field names to a [`FilterValue`]. It is usually parsed from
//! JSON such as:
//!
//! ```json
//! {
//!     "status": "published",
//!     "deleted_at": null,
//!     "category": ["news", "tech"],
//!     "views": {">=": 100},
//!     "rating": {"between": [3.5, 5]},
//!     "title": {"ilike": "%rust%"}
//! }
//! ```
//!
//! Parsing is strict: an unknown operator token or a malformed operand is a
//! [`ConfigurationError`], never a silently dropped filter.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::ConfigurationError;

/// A single filter operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Name of the operand type, used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "string",
        }
    }

    fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Bool(b) => Some(Self::Bool(*b)),
            JsonValue::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            JsonValue::String(s) => Some(Self::Text(s.clone())),
            JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Closed set of operator tokens accepted inside an operator object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Not,
    Gte,
    Lte,
    Gt,
    Lt,
    Between,
    NotIn,
    Like,
    ILike,
}

impl OperatorKind {
    pub const ALL: [Self; 9] = [
        Self::Not,
        Self::Gte,
        Self::Lte,
        Self::Gt,
        Self::Lt,
        Self::Between,
        Self::NotIn,
        Self::Like,
        Self::ILike,
    ];

    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "not" => Some(Self::Not),
            ">=" => Some(Self::Gte),
            "<=" => Some(Self::Lte),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            "between" => Some(Self::Between),
            "not_in" => Some(Self::NotIn),
            "like" => Some(Self::Like),
            "ilike" => Some(Self::ILike),
            _ => None,
        }
    }

    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Not => "not",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Between => "between",
            Self::NotIn => "not_in",
            Self::Like => "like",
            Self::ILike => "ilike",
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// An operator together with its already shape-checked operand(s).
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// `None` means "is not null".
    Not(Option<Scalar>),
    Gte(Scalar),
    Lte(Scalar),
    Gt(Scalar),
    Lt(Scalar),
    /// Inclusive `(low, high)`.
    Between(Scalar, Scalar),
    NotIn(Vec<Scalar>),
    Like(String),
    ILike(String),
}

impl Operator {
    #[must_use]
    pub const fn kind(&self) -> OperatorKind {
        match self {
            Self::Not(_) => OperatorKind::Not,
            Self::Gte(_) => OperatorKind::Gte,
            Self::Lte(_) => OperatorKind::Lte,
            Self::Gt(_) => OperatorKind::Gt,
            Self::Lt(_) => OperatorKind::Lt,
            Self::Between(..) => OperatorKind::Between,
            Self::NotIn(_) => OperatorKind::NotIn,
            Self::Like(_) => OperatorKind::Like,
            Self::ILike(_) => OperatorKind::ILike,
        }
    }

    fn from_json(field: &str, kind: OperatorKind, operand: &JsonValue) -> Result<Self, ConfigurationError> {
        let malformed = |reason: &str| ConfigurationError::MalformedOperand {
            field: field.to_string(),
            operator: kind.token(),
            reason: reason.to_string(),
        };

        match kind {
            OperatorKind::Not => match operand {
                JsonValue::Null => Ok(Self::Not(None)),
                other => Scalar::from_json(other)
                    .map(|s| Self::Not(Some(s)))
                    .ok_or_else(|| malformed("expected a scalar or null, use `not_in` for collections")),
            },
            OperatorKind::Gte | OperatorKind::Lte | OperatorKind::Gt | OperatorKind::Lt => {
                let scalar = Scalar::from_json(operand).ok_or_else(|| malformed("expected a scalar"))?;
                Ok(match kind {
                    OperatorKind::Gte => Self::Gte(scalar),
                    OperatorKind::Lte => Self::Lte(scalar),
                    OperatorKind::Gt => Self::Gt(scalar),
                    _ => Self::Lt(scalar),
                })
            }
            OperatorKind::Between => {
                let JsonValue::Array(bounds) = operand else {
                    return Err(malformed("expected a [low, high] pair"));
                };
                let [low, high] = bounds.as_slice() else {
                    return Err(malformed(&format!("expected exactly 2 operands, got {}", bounds.len())));
                };
                match (Scalar::from_json(low), Scalar::from_json(high)) {
                    (Some(low), Some(high)) => Ok(Self::Between(low, high)),
                    _ => Err(malformed("bounds must be non-null scalars")),
                }
            }
            OperatorKind::NotIn => {
                let JsonValue::Array(items) = operand else {
                    return Err(malformed("expected a collection"));
                };
                scalars_from_json(items)
                    .map(Self::NotIn)
                    .ok_or_else(|| malformed("collection items must be non-null scalars"))
            }
            OperatorKind::Like | OperatorKind::ILike => {
                let JsonValue::String(pattern) = operand else {
                    return Err(malformed("expected a pattern string"));
                };
                Ok(if kind == OperatorKind::Like {
                    Self::Like(pattern.clone())
                } else {
                    Self::ILike(pattern.clone())
                })
            }
        }
    }
}

/// What a single field is filtered by.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Equals(Scalar),
    IsNull,
    OneOf(Vec<Scalar>),
    Operator(Operator),
}

impl FilterValue {
    fn from_json(field: &str, value: &JsonValue) -> Result<Self, ConfigurationError> {
        match value {
            JsonValue::Null => Ok(Self::IsNull),
            JsonValue::Array(items) => scalars_from_json(items).map(Self::OneOf).ok_or_else(|| {
                ConfigurationError::MalformedOperand {
                    field: field.to_string(),
                    operator: "in",
                    reason: "collection items must be non-null scalars".to_string(),
                }
            }),
            JsonValue::Object(object) => {
                if object.len() != 1 {
                    return Err(ConfigurationError::OperatorCount {
                        field: field.to_string(),
                        found: object.len(),
                    });
                }
                let (token, operand) = object.iter().next().ok_or(ConfigurationError::OperatorCount {
                    field: field.to_string(),
                    found: 0,
                })?;
                let kind = OperatorKind::from_token(token).ok_or_else(|| ConfigurationError::UnknownOperator {
                    field: field.to_string(),
                    operator: token.clone(),
                })?;
                Operator::from_json(field, kind, operand).map(Self::Operator)
            }
            scalar => Scalar::from_json(scalar)
                .map(Self::Equals)
                .ok_or_else(|| ConfigurationError::InvalidFilter(format!("unsupported value for `{field}`"))),
        }
    }
}

fn scalars_from_json(items: &[JsonValue]) -> Option<Vec<Scalar>> {
    items.iter().map(Scalar::from_json).collect()
}

/// Field name → filter mapping. Fields are kept sorted so compilation is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "JsonValue")]
pub struct FilterSpec {
    fields: BTreeMap<String, FilterValue>,
}

impl FilterSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a filter dictionary from a JSON value. The root must be an object.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] for a non-object root, an unknown operator token,
    /// an operator object without exactly one key, or a malformed operand.
    pub fn from_json(value: &JsonValue) -> Result<Self, ConfigurationError> {
        let JsonValue::Object(object) = value else {
            return Err(ConfigurationError::InvalidFilter(
                "filter must be a JSON object".to_string(),
            ));
        };

        let mut fields = BTreeMap::new();
        for (field, value) in object {
            fields.insert(field.clone(), FilterValue::from_json(field, value)?);
        }
        Ok(Self { fields })
    }

    /// Parse a filter dictionary from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidFilter`] if the string is not valid JSON, plus
    /// every error [`FilterSpec::from_json`] can return.
    pub fn parse(json: &str) -> Result<Self, ConfigurationError> {
        let value: JsonValue = serde_json::from_str(json)
            .map_err(|e| ConfigurationError::InvalidFilter(format!("invalid JSON: {e}")))?;
        Self::from_json(&value)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.fields.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Set (or replace) the filter for one field.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: FilterValue) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    #[must_use]
    pub fn eq(self, field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.with(field, FilterValue::Equals(value.into()))
    }

    #[must_use]
    pub fn is_null(self, field: impl Into<String>) -> Self {
        self.with(field, FilterValue::IsNull)
    }

    #[must_use]
    pub fn one_of<V: Into<Scalar>>(self, field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        self.with(field, FilterValue::OneOf(values.into_iter().map(Into::into).collect()))
    }

    #[must_use]
    pub fn not(self, field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.with(field, FilterValue::Operator(Operator::Not(Some(value.into()))))
    }

    #[must_use]
    pub fn not_null(self, field: impl Into<String>) -> Self {
        self.with(field, FilterValue::Operator(Operator::Not(None)))
    }

    #[must_use]
    pub fn gt(self, field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.with(field, FilterValue::Operator(Operator::Gt(value.into())))
    }

    #[must_use]
    pub fn gte(self, field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.with(field, FilterValue::Operator(Operator::Gte(value.into())))
    }

    #[must_use]
    pub fn lt(self, field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.with(field, FilterValue::Operator(Operator::Lt(value.into())))
    }

    #[must_use]
    pub fn lte(self, field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.with(field, FilterValue::Operator(Operator::Lte(value.into())))
    }

    #[must_use]
    pub fn between(self, field: impl Into<String>, low: impl Into<Scalar>, high: impl Into<Scalar>) -> Self {
        self.with(field, FilterValue::Operator(Operator::Between(low.into(), high.into())))
    }

    #[must_use]
    pub fn not_in<V: Into<Scalar>>(self, field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        self.with(
            field,
            FilterValue::Operator(Operator::NotIn(values.into_iter().map(Into::into).collect())),
        )
    }

    #[must_use]
    pub fn like(self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.with(field, FilterValue::Operator(Operator::Like(pattern.into())))
    }

    #[must_use]
    pub fn ilike(self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.with(field, FilterValue::Operator(Operator::ILike(pattern.into())))
    }
}

impl TryFrom<JsonValue> for FilterSpec {
    type Error = ConfigurationError;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        Self::from_json(&value)
    }
}
