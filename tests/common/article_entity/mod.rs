use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crudlite::validation::validators;
use crudlite::{CRUDResource, MergeIntoActiveModel, Validatable, ValidationErrors, crud_handlers};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "articles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub body: Option<String>,
    pub status: String,
    pub views: i32,
    pub rating: f64,
    pub published: bool,
    pub author_email: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i32,
    pub title: String,
    pub body: Option<String>,
    pub status: String,
    pub views: i32,
    pub rating: f64,
    pub published: bool,
    pub author_email: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<Model> for Article {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            body: model.body,
            status: model.status,
            views: model.views,
            rating: model.rating,
            published: model.published,
            author_email: model.author_email,
            created_at: model.created_at,
            deleted_at: model.deleted_at,
        }
    }
}

fn default_status() -> String {
    "draft".to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct ArticleCreate {
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub views: i32,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub published: bool,
    pub author_email: String,
}

impl ArticleCreate {
    pub fn new(title: &str, author_email: &str) -> Self {
        Self {
            title: title.to_string(),
            body: None,
            status: default_status(),
            views: 0,
            rating: 0.0,
            published: false,
            author_email: author_email.to_string(),
        }
    }
}

impl Validatable for ArticleCreate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(validators::validate_length("title", &self.title, Some(1), Some(200)));
        errors.check(validators::validate_email("author_email", &self.author_email));
        errors.check(validators::validate_range("views", self.views, Some(0), None));
        errors.result()
    }
}

impl From<ArticleCreate> for ActiveModel {
    fn from(create: ArticleCreate) -> Self {
        Self {
            id: ActiveValue::NotSet,
            title: ActiveValue::Set(create.title),
            body: ActiveValue::Set(create.body),
            status: ActiveValue::Set(create.status),
            views: ActiveValue::Set(create.views),
            rating: ActiveValue::Set(create.rating),
            published: ActiveValue::Set(create.published),
            author_email: ActiveValue::Set(create.author_email),
            created_at: ActiveValue::Set(Utc::now()),
            deleted_at: ActiveValue::Set(None),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ArticleUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub status: Option<String>,
    pub views: Option<i32>,
    pub rating: Option<f64>,
    pub published: Option<bool>,
}

impl Validatable for ArticleUpdate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(title) = &self.title {
            errors.check(validators::validate_length("title", title, Some(1), Some(200)));
        }
        errors.result()
    }
}

impl MergeIntoActiveModel<ActiveModel> for ArticleUpdate {
    fn merge_into_activemodel(self, mut existing: ActiveModel) -> Result<ActiveModel, DbErr> {
        if let Some(title) = self.title {
            existing.title = ActiveValue::Set(title);
        }
        if let Some(body) = self.body {
            existing.body = ActiveValue::Set(Some(body));
        }
        if let Some(status) = self.status {
            existing.status = ActiveValue::Set(status);
        }
        if let Some(views) = self.views {
            existing.views = ActiveValue::Set(views);
        }
        if let Some(rating) = self.rating {
            existing.rating = ActiveValue::Set(rating);
        }
        if let Some(published) = self.published {
            existing.published = ActiveValue::Set(published);
        }
        Ok(existing)
    }
}

#[async_trait]
impl CRUDResource for Article {
    type EntityType = Entity;
    type ColumnType = Column;
    type ActiveModelType = ActiveModel;
    type CreateModel = ArticleCreate;
    type UpdateModel = ArticleUpdate;
    type ListModel = Article;

    const ID_COLUMN: Self::ColumnType = Column::Id;
    const RESOURCE_NAME_SINGULAR: &'static str = "article";
    const RESOURCE_NAME_PLURAL: &'static str = "articles";
    const RESOURCE_DESCRIPTION: &'static str = "Blog articles for testing";

    fn sortable_columns() -> Vec<(&'static str, Self::ColumnType)> {
        vec![
            ("id", Column::Id),
            ("title", Column::Title),
            ("views", Column::Views),
            ("rating", Column::Rating),
            ("created_at", Column::CreatedAt),
        ]
    }

    fn filterable_columns() -> Vec<(&'static str, Self::ColumnType)> {
        vec![
            ("id", Column::Id),
            ("title", Column::Title),
            ("body", Column::Body),
            ("status", Column::Status),
            ("views", Column::Views),
            ("rating", Column::Rating),
            ("published", Column::Published),
            ("author_email", Column::AuthorEmail),
            ("created_at", Column::CreatedAt),
        ]
    }

    fn searchable_columns() -> Vec<(&'static str, Self::ColumnType)> {
        vec![("title", Column::Title), ("body", Column::Body)]
    }

    fn soft_delete_column() -> Option<Column> {
        Some(Column::DeletedAt)
    }

    fn validate_create(create_model: &ArticleCreate) -> Result<(), ValidationErrors> {
        create_model.validate()
    }

    fn validate_update(update_model: &ArticleUpdate) -> Result<(), ValidationErrors> {
        update_model.validate()
    }
}

crud_handlers!(Article, i32);
