//! # Schema-string projection
//!
//! A schema string lists the fields of an API response and their types:
//!
//! ```text
//! id:int, title:string, author_email:email, rating:number?, tags:[string]
//! ```
//!
//! [`project`] keeps only the listed fields of a row, coerces each value through a
//! [`Coercer`] and reports every failing field at once. A trailing `?` makes a field
//! optional: missing or `null` values become `null` instead of an error.
//!
//! [`SchemaRegistry`] holds named schemas. [`SchemaRegistry::for_entity`] derives the
//! `basic` and `full` schemas from a Sea-ORM entity.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use sea_orm::{ColumnTrait, ColumnType, EntityTrait, IdenStatic, Iterable, PrimaryKeyToColumn};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::filtering::conditions::{ColumnKind, whole_i64};
use crate::validation::{ValidationError, ValidationErrors, validators};

/// Field types understood by schema strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeToken {
    Int,
    Number,
    Bool,
    String,
    Text,
    Email,
    Url,
    DateTime,
    Date,
    Uuid,
    Dict,
    Any,
    Array(Box<TypeToken>),
}

impl FromStr for TypeToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(inner) = s.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            return inner.parse().map(|t| Self::Array(Box::new(t)));
        }
        match s {
            "int" | "integer" => Ok(Self::Int),
            "number" | "float" => Ok(Self::Number),
            "bool" | "boolean" => Ok(Self::Bool),
            "string" | "str" => Ok(Self::String),
            "text" => Ok(Self::Text),
            "email" => Ok(Self::Email),
            "url" => Ok(Self::Url),
            "datetime" => Ok(Self::DateTime),
            "date" => Ok(Self::Date),
            "uuid" => Ok(Self::Uuid),
            "dict" | "object" => Ok(Self::Dict),
            "any" => Ok(Self::Any),
            other => Err(format!("unknown type `{other}`")),
        }
    }
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Array(inner) => return write!(f, "[{inner}]"),
            Self::Int => "int",
            Self::Number => "number",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Text => "text",
            Self::Email => "email",
            Self::Url => "url",
            Self::DateTime => "datetime",
            Self::Date => "date",
            Self::Uuid => "uuid",
            Self::Dict => "dict",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub token: TypeToken,
    pub optional: bool,
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.name, self.token, if self.optional { "?" } else { "" })
    }
}

/// A parsed schema string. Field order is kept.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

/// Split on commas that are not inside `[...]`.
fn split_entries(input: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                entries.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    entries.push(&input[start..]);
    entries
}

impl Schema {
    /// Parse `name:type[?]` entries separated by commas.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the offending entry for an empty name, a
    /// missing `:`, a duplicate field or an unknown type token.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let mut fields: Vec<FieldSpec> = Vec::new();

        for entry in split_entries(input).into_iter().map(str::trim).filter(|e| !e.is_empty()) {
            let (name, ty) = entry
                .split_once(':')
                .ok_or_else(|| ValidationError::new(entry, "Expected `name:type`"))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ValidationError::new(entry, "Field name is empty"));
            }
            if fields.iter().any(|f| f.name == name) {
                return Err(ValidationError::new(name, "Field is listed twice"));
            }

            let ty = ty.trim();
            let (ty, optional) = ty.strip_suffix('?').map_or((ty, false), |t| (t, true));
            let token = ty.parse().map_err(|reason: String| ValidationError::new(name, reason))?;

            fields.push(FieldSpec {
                name: name.to_string(),
                token,
                optional,
            });
        }

        Ok(Self { fields })
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromStr for Schema {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}

impl FromIterator<FieldSpec> for Schema {
    fn from_iter<I: IntoIterator<Item = FieldSpec>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Turns a raw value into the value a type token describes.
pub trait Coercer: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming `field` when `value` cannot be coerced.
    fn coerce(&self, token: &TypeToken, field: &str, value: &JsonValue) -> Result<JsonValue, ValidationError>;
}

/// Coercion rules for every [`TypeToken`].
///
/// Numbers and booleans given as strings are parsed. Datetimes are normalized to
/// RFC 3339 in UTC; naive datetimes are taken to be UTC already.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCoercer;

impl BuiltinCoercer {
    fn datetime(field: &str, s: &str) -> Result<JsonValue, ValidationError> {
        let utc = DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                    .map(|naive| naive.and_utc())
                    .ok_or(())
            })
            .map_err(|()| ValidationError::new(field, "Invalid datetime"))?;
        Ok(JsonValue::String(utc.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
    }

    fn date(field: &str, s: &str) -> Result<JsonValue, ValidationError> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc).date_naive()))
            .map(|d| JsonValue::String(d.format("%Y-%m-%d").to_string()))
            .map_err(|_| ValidationError::new(field, "Invalid date"))
    }
}

fn type_error(field: &str, token: &TypeToken) -> ValidationError {
    ValidationError::new(field, format!("Expected {token}"))
}

impl Coercer for BuiltinCoercer {
    fn coerce(&self, token: &TypeToken, field: &str, value: &JsonValue) -> Result<JsonValue, ValidationError> {
        let invalid = || type_error(field, token);

        match (token, value) {
            (TypeToken::Any, v) => Ok(v.clone()),

            (TypeToken::Int, JsonValue::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(whole_i64))
                .map(JsonValue::from)
                .ok_or_else(invalid),
            (TypeToken::Int, JsonValue::String(s)) => s.trim().parse::<i64>().map(JsonValue::from).map_err(|_| invalid()),

            (TypeToken::Number, JsonValue::Number(n)) => Ok(JsonValue::Number(n.clone())),
            (TypeToken::Number, JsonValue::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(JsonValue::Number)
                .ok_or_else(invalid),

            (TypeToken::Bool, JsonValue::Bool(b)) => Ok(JsonValue::Bool(*b)),
            (TypeToken::Bool, JsonValue::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(JsonValue::Bool(true)),
                "false" => Ok(JsonValue::Bool(false)),
                _ => Err(invalid()),
            },

            (TypeToken::String | TypeToken::Text, JsonValue::String(s)) => Ok(JsonValue::String(s.clone())),
            (TypeToken::String | TypeToken::Text, JsonValue::Number(n)) => Ok(JsonValue::String(n.to_string())),
            (TypeToken::String | TypeToken::Text, JsonValue::Bool(b)) => Ok(JsonValue::String(b.to_string())),

            (TypeToken::Email, JsonValue::String(s)) => {
                validators::validate_email(field, s)?;
                Ok(JsonValue::String(s.clone()))
            }
            (TypeToken::Url, JsonValue::String(s)) => {
                validators::validate_url(field, s)?;
                Ok(JsonValue::String(s.clone()))
            }

            (TypeToken::DateTime, JsonValue::String(s)) => Self::datetime(field, s.trim()),
            (TypeToken::Date, JsonValue::String(s)) => Self::date(field, s.trim()),

            (TypeToken::Uuid, JsonValue::String(s)) => Uuid::parse_str(s.trim())
                .map(|u| JsonValue::String(u.hyphenated().to_string()))
                .map_err(|_| ValidationError::new(field, "Invalid UUID")),

            (TypeToken::Dict, JsonValue::Object(map)) => Ok(JsonValue::Object(map.clone())),

            (TypeToken::Array(inner), JsonValue::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.coerce(inner, &format!("{field}[{i}]"), item))
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),

            _ => Err(invalid()),
        }
    }
}

/// Keep the schema's fields of `row`, coerced. Fields not in the schema are dropped.
///
/// # Errors
///
/// Returns every missing required field and every value the coercer rejects.
pub fn project(
    row: &Map<String, JsonValue>,
    schema: &Schema,
    coercer: &dyn Coercer,
) -> Result<Map<String, JsonValue>, ValidationErrors> {
    let mut out = Map::new();
    let mut errors = ValidationErrors::new();

    for field in schema.fields() {
        match row.get(&field.name) {
            None | Some(JsonValue::Null) if field.optional => {
                out.insert(field.name.clone(), JsonValue::Null);
            }
            None | Some(JsonValue::Null) => {
                errors.add(ValidationError::new(&field.name, "This field is required"));
            }
            Some(value) => match coercer.coerce(&field.token, &field.name, value) {
                Ok(coerced) => {
                    out.insert(field.name.clone(), coerced);
                }
                Err(e) => errors.add(e),
            },
        }
    }

    errors.result().map(|()| out)
}

/// Serialize `value` and [`project`] it.
///
/// # Errors
///
/// As [`project`], plus a single error when `value` does not serialize to a JSON object.
pub fn project_value<T: Serialize>(
    value: &T,
    schema: &Schema,
    coercer: &dyn Coercer,
) -> Result<Map<String, JsonValue>, ValidationErrors> {
    match serde_json::to_value(value) {
        Ok(JsonValue::Object(row)) => project(&row, schema, coercer),
        Ok(_) => Err(ValidationError::new("$", "Expected an object").into()),
        Err(e) => Err(ValidationError::new("$", e.to_string()).into()),
    }
}

fn token_for_column<C: ColumnTrait>(column: &C) -> TypeToken {
    let name = column.as_str().to_ascii_lowercase();
    let column_type = column.def().get_column_type().clone();

    match (ColumnKind::of(&column_type), column_type) {
        (_, ColumnType::Json | ColumnType::JsonBinary) => TypeToken::Dict,
        (ColumnKind::Integer, _) => TypeToken::Int,
        (ColumnKind::Float, _) => TypeToken::Number,
        (ColumnKind::Boolean, _) => TypeToken::Bool,
        (ColumnKind::Uuid, _) => TypeToken::Uuid,
        (ColumnKind::DateTimeUtc | ColumnKind::DateTime, _) => TypeToken::DateTime,
        (ColumnKind::Date, _) => TypeToken::Date,
        (ColumnKind::Text, _) if name.contains("email") => TypeToken::Email,
        (ColumnKind::Text, _) if name.contains("url") => TypeToken::Url,
        (ColumnKind::Text, ColumnType::Text) => TypeToken::Text,
        (ColumnKind::Text, _) => TypeToken::String,
        (ColumnKind::Time | ColumnKind::Other, _) => TypeToken::Any,
    }
}

fn primary_key_names<E: EntityTrait>() -> Vec<String> {
    E::PrimaryKey::iter().map(|pk| pk.into_column().as_str().to_string()).collect()
}

/// Every column of `E`. Nullable non-key columns are optional.
#[must_use]
pub fn full_schema_for<E: EntityTrait>() -> Schema {
    let primary_keys = primary_key_names::<E>();

    E::Column::iter()
        .map(|column| {
            let name = column.as_str().to_string();
            let optional = column.def().is_null() && !primary_keys.contains(&name);
            FieldSpec {
                name,
                token: token_for_column(&column),
                optional,
            }
        })
        .collect()
}

const BASIC_FIELDS: [&str; 5] = ["name", "title", "email", "created_at", "updated_at"];

/// Primary key plus whichever of the common display fields `E` has.
#[must_use]
pub fn basic_schema_for<E: EntityTrait>() -> Schema {
    let full = full_schema_for::<E>();
    let primary_keys = primary_key_names::<E>();

    full.fields()
        .iter()
        .filter(|f| primary_keys.contains(&f.name) || BASIC_FIELDS.contains(&f.name.as_str()))
        .cloned()
        .collect()
}

/// Shape of the page envelope.
pub const LIST_RESPONSE_SCHEMA: &str =
    "items:[dict], total:int, page:int, per_page:int, total_pages:int, has_next:bool, has_prev:bool";

/// Named schemas. A name that is not registered is parsed as a schema string.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Schema>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    /// A registry holding only `list_response`.
    #[must_use]
    pub fn new() -> Self {
        let mut schemas = HashMap::new();
        if let Ok(list) = Schema::parse(LIST_RESPONSE_SCHEMA) {
            schemas.insert("list_response".to_string(), list);
        }
        Self { schemas }
    }

    /// `basic`, `full` and `list_response` for entity `E`.
    #[must_use]
    pub fn for_entity<E: EntityTrait>() -> Self {
        let mut registry = Self::new();
        registry.insert("basic", basic_schema_for::<E>());
        registry.insert("full", full_schema_for::<E>());
        registry
    }

    pub fn insert(&mut self, name: impl Into<String>, schema: Schema) {
        self.schemas.insert(name.into(), schema);
    }

    /// Register a schema string under `name`.
    ///
    /// # Errors
    ///
    /// Returns the parse error of `schema`.
    pub fn add_custom_schema(&mut self, name: impl Into<String>, schema: &str) -> Result<(), ValidationError> {
        self.insert(name, Schema::parse(schema)?);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    /// Look `name_or_schema` up by name, otherwise parse it as a schema string.
    ///
    /// # Errors
    ///
    /// Returns the parse error when it is neither a registered name nor a valid schema.
    pub fn resolve(&self, name_or_schema: &str) -> Result<Schema, ValidationError> {
        self.get(name_or_schema)
            .cloned()
            .map_or_else(|| Schema::parse(name_or_schema), Ok)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }
}
