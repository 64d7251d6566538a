#![allow(dead_code)]

use axum::Router;
use crudlite::CRUDResource;
use sea_orm::{Database, DatabaseConnection, DbErr, Schema};
use sea_orm_migration::prelude::*;

pub mod article_entity;

use article_entity::{Article, ArticleCreate};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    init_tracing();
    let db = Database::connect("sqlite::memory:").await?;

    // Run migrations
    Migrator::up(&db, None).await?;

    Ok(db)
}

pub fn setup_test_app(db: &DatabaseConnection) -> Router {
    Router::new().nest("/api/v1/articles", article_entity::router(db))
}

/// Ten articles: five published, views `0, 10, .., 90`, ratings `0.5, 1.0, .., 5.0`.
pub async fn seed_articles(db: &DatabaseConnection) -> Result<Vec<Article>, crudlite::CrudError> {
    let mut articles = Vec::new();
    for i in 0..10 {
        let mut create = ArticleCreate::new(&format!("Article {i:02}"), &format!("author{}@example.com", i % 3));
        create.body = (i % 2 == 0).then(|| format!("Body of article {i} about Rust"));
        create.status = if i % 2 == 0 { "published" } else { "draft" }.to_string();
        create.views = i * 10;
        create.rating = f64::from(i + 1) * 0.5;
        create.published = i % 2 == 0;
        articles.push(Article::create(db, create).await?);
    }
    Ok(articles)
}

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateArticleTable)]
    }
}

pub struct CreateArticleTable;

impl MigrationName for CreateArticleTable {
    fn name(&self) -> &'static str {
        "m20250101_000001_create_article_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateArticleTable {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(manager.get_database_backend());
        manager
            .create_table(schema.create_table_from_entity(article_entity::Entity))
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(article_entity::Entity).to_owned())
            .await
    }
}
