//! # HTTP handlers
//!
//! [`crud_handlers!`](crate::crud_handlers) generates axum handlers and a `router` for one
//! [`CRUDResource`](crate::CRUDResource):
//!
//! | Route           | Handler              | Success            |
//! |-----------------|----------------------|--------------------|
//! | `GET /`         | `get_all_handler`    | 200, page envelope |
//! | `GET /{id}`     | `get_one_handler`    | 200                |
//! | `POST /`        | `create_one_handler` | 201                |
//! | `PUT /{id}`     | `update_one_handler` | 200                |
//! | `DELETE /{id}`  | `delete_one_handler` | 204                |
//!
//! Every failure is an [`ApiError`](crate::ApiError).
//!
//! ```rust,ignore
//! crud_handlers!(Article, i32);
//!
//! let app = axum::Router::new().nest("/articles", router(&db));
//! ```

use axum::http::HeaderMap;

use crate::pagination::{PageResult, calculate_content_range};

/// `Content-Range` headers describing a page of `resource_name`.
#[must_use]
pub fn content_range_headers<T>(page: &PageResult<T>, resource_name: &str) -> HeaderMap {
    let offset = page.page.saturating_sub(1).saturating_mul(page.per_page);
    calculate_content_range(offset, page.per_page, page.total, resource_name)
}

#[macro_export]
macro_rules! crud_handlers {
    ($resource:ty, $id:ty) => {
        pub async fn get_all_handler(
            $crate::__private::axum::extract::Query(query): $crate::__private::axum::extract::Query<$crate::models::ListQuery>,
            $crate::__private::axum::extract::State(db): $crate::__private::axum::extract::State<$crate::__private::sea_orm::DatabaseConnection>,
        ) -> Result<
            (
                $crate::__private::axum::http::HeaderMap,
                $crate::__private::axum::Json<$crate::pagination::PageResult<<$resource as $crate::CRUDResource>::ListModel>>,
            ),
            $crate::ApiError,
        > {
            let config = <$resource as $crate::CRUDResource>::pagination_config();
            let params = query.into_list_params(&config)?;
            let page = <$resource as $crate::CRUDResource>::list(&db, &params).await?;
            let headers = $crate::routes::content_range_headers(
                &page,
                <$resource as $crate::CRUDResource>::RESOURCE_NAME_PLURAL,
            );
            Ok((headers, $crate::__private::axum::Json(page)))
        }

        pub async fn get_one_handler(
            $crate::__private::axum::extract::State(db): $crate::__private::axum::extract::State<$crate::__private::sea_orm::DatabaseConnection>,
            $crate::__private::axum::extract::Path(id): $crate::__private::axum::extract::Path<$id>,
        ) -> Result<$crate::__private::axum::Json<$resource>, $crate::ApiError> {
            let item = <$resource as $crate::CRUDResource>::get_one(&db, id).await?;
            Ok($crate::__private::axum::Json(item))
        }

        pub async fn create_one_handler(
            $crate::__private::axum::extract::State(db): $crate::__private::axum::extract::State<$crate::__private::sea_orm::DatabaseConnection>,
            $crate::__private::axum::Json(payload): $crate::__private::axum::Json<<$resource as $crate::CRUDResource>::CreateModel>,
        ) -> Result<($crate::__private::axum::http::StatusCode, $crate::__private::axum::Json<$resource>), $crate::ApiError> {
            let item = <$resource as $crate::CRUDResource>::create(&db, payload).await?;
            Ok(($crate::__private::axum::http::StatusCode::CREATED, $crate::__private::axum::Json(item)))
        }

        pub async fn update_one_handler(
            $crate::__private::axum::extract::State(db): $crate::__private::axum::extract::State<$crate::__private::sea_orm::DatabaseConnection>,
            $crate::__private::axum::extract::Path(id): $crate::__private::axum::extract::Path<$id>,
            $crate::__private::axum::Json(payload): $crate::__private::axum::Json<<$resource as $crate::CRUDResource>::UpdateModel>,
        ) -> Result<$crate::__private::axum::Json<$resource>, $crate::ApiError> {
            let item = <$resource as $crate::CRUDResource>::update(&db, id, payload).await?;
            Ok($crate::__private::axum::Json(item))
        }

        pub async fn delete_one_handler(
            $crate::__private::axum::extract::State(db): $crate::__private::axum::extract::State<$crate::__private::sea_orm::DatabaseConnection>,
            $crate::__private::axum::extract::Path(id): $crate::__private::axum::extract::Path<$id>,
        ) -> Result<$crate::__private::axum::http::StatusCode, $crate::ApiError> {
            <$resource as $crate::CRUDResource>::delete(&db, id).await?;
            Ok($crate::__private::axum::http::StatusCode::NO_CONTENT)
        }

        pub fn router(db: &$crate::__private::sea_orm::DatabaseConnection) -> $crate::__private::axum::Router {
            use $crate::__private::axum::routing::get;

            $crate::__private::axum::Router::new()
                .route("/", get(get_all_handler).post(create_one_handler))
                .route(
                    "/{id}",
                    get(get_one_handler).put(update_one_handler).delete(delete_one_handler),
                )
                .with_state(db.clone())
        }
    };
}
