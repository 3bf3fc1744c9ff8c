//! Back-office routes, mounted under `/api/admin` behind the admin token.

use super::{AppState, storefront::ProductQuery};
use crate::{
    core::{
        category::{self, CategoryChanges, CategoryInput},
        csv_io::{self, ImportSummary},
        customer::{self, CustomerSummary},
        homepage::{self, SectionInput},
        order::{self, OrderDetail, OrderFilter, OrderStatus, TrackingUpdate},
        pagination::{Page, Pagination},
        product::{self, ProductChanges, ProductInput, ProductRemoval},
        product_image::{self, MAX_UPLOAD_BYTES},
        report::{self, DailySales, SalesSummary, StatusCount, TopProduct},
        review, setting,
        user::{self, UserInput},
    },
    entities::{
        category as category_entity, homepage_section, order as order_entity,
        order_tracking, product as product_entity, product_image as image_entity,
        review as review_entity, setting as setting_entity, user as user_entity,
    },
    errors::{Error, Result},
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use chrono::{NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Room for multipart boundaries and part headers around an image.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Days covered by a report when the client gives no range.
const DEFAULT_REPORT_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
struct OrderQuery {
    status: Option<String>,
    search: Option<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    page: Option<u64>,
    per_page: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ReportQuery {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    limit: Option<usize>,
}

impl ReportQuery {
    fn range(&self) -> (NaiveDate, NaiveDate) {
        let to = self.to.unwrap_or_else(|| Utc::now().date_naive());
        let from = self
            .from
            .unwrap_or(to - TimeDelta::days(DEFAULT_REPORT_DAYS - 1));
        (from, to)
    }
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
}

#[derive(Debug, Deserialize)]
struct FlagBody {
    value: bool,
}

#[derive(Debug, Deserialize)]
struct ImageOrder {
    ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct SectionOrder {
    keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SettingBody {
    value: String,
}

#[derive(Debug, Serialize)]
struct RemovalResponse {
    result: ProductRemoval,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/low-stock", get(low_stock))
        .route("/products/export", get(export_products))
        .route("/products/import", post(import_products))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route(
            "/products/{id}/images",
            get(list_images)
                .post(upload_image)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD)),
        )
        .route("/products/{id}/images/order", put(reorder_images))
        .route("/products/{id}/images/{image_id}/main", put(set_main_image))
        .route("/images/{id}", delete(delete_image))
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            put(update_category).delete(delete_category),
        )
        .route("/orders", get(list_orders))
        .route("/orders/{id}", get(order_detail))
        .route("/orders/{id}/status", put(update_status))
        .route("/orders/{id}/tracking", put(update_tracking))
        .route("/customers", get(list_customers))
        .route("/customers/{key}/orders", get(customer_orders))
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", put(update_user).delete(delete_user))
        .route("/users/{id}/admin", put(set_admin))
        .route("/users/{id}/active", put(set_active))
        .route("/homepage", get(list_sections))
        .route("/homepage/order", put(reorder_sections))
        .route(
            "/homepage/{key}",
            get(get_section).put(upsert_section).delete(delete_section),
        )
        .route("/homepage/{key}/active", put(set_section_active))
        .route("/settings", get(list_settings))
        .route("/settings/{key}", put(set_setting))
        .route("/reviews/pending", get(pending_reviews))
        .route("/reviews/{id}", delete(delete_review))
        .route("/reviews/{id}/approve", put(approve_review))
        .route("/reports/summary", get(sales_summary))
        .route("/reports/daily", get(daily_sales))
        .route("/reports/top-products", get(top_products))
        .route("/reports/status", get(status_breakdown))
}

// Products

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Page<product_entity::Model>>> {
    let (filter, page) = query.into_parts(true);
    let (page, per_page) = state.page(page);
    Ok(Json(
        product::list_products(state.db(), &filter, page, per_page).await?,
    ))
}

async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<product_entity::Model>)> {
    let created = product::create_product(state.db(), input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<product_entity::Model>> {
    product::get_product_by_id(state.db(), id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found("product", id))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(changes): Json<ProductChanges>,
) -> Result<Json<product_entity::Model>> {
    Ok(Json(product::update_product(state.db(), id, changes).await?))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RemovalResponse>> {
    let images = product_image::images_for_product(state.db(), id).await?;
    let result = product::delete_product(state.db(), id).await?;
    if result == ProductRemoval::Deleted {
        for image in &images {
            product_image::discard_stored_file(&state.config.uploads.dir, &image.path).await;
        }
    }
    Ok(Json(RemovalResponse { result }))
}

async fn low_stock(State(state): State<AppState>) -> Result<Json<Vec<product_entity::Model>>> {
    let threshold = state.config.store.low_stock_threshold;
    Ok(Json(product::low_stock_products(state.db(), threshold).await?))
}

async fn export_products(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let mut buffer = Vec::new();
    csv_io::export_products(state.db(), &mut buffer).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"products.csv\"",
            ),
        ],
        buffer,
    ))
}

async fn import_products(State(state): State<AppState>, body: Bytes) -> Result<Json<ImportSummary>> {
    Ok(Json(csv_io::import_products(state.db(), body.as_ref()).await?))
}

// Images

async fn list_images(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<image_entity::Model>>> {
    Ok(Json(product_image::images_for_product(state.db(), id).await?))
}

fn upload_error(e: &MultipartError) -> Error {
    Error::validation("file", e.body_text())
}

/// Accepts a `multipart/form-data` body whose `file` part is the image.
async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<image_entity::Model>)> {
    while let Some(field) = multipart.next_field().await.map_err(|e| upload_error(&e))? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| Error::validation("file", "The file part has no file name"))?;
        let bytes = field.bytes().await.map_err(|e| upload_error(&e))?;
        let image = product_image::upload_image(
            state.db(),
            &state.config.uploads.dir,
            id,
            &file_name,
            &bytes,
        )
        .await?;
        return Ok((StatusCode::CREATED, Json(image)));
    }
    Err(Error::validation("file", "An image file is required"))
}

async fn reorder_images(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(order): Json<ImageOrder>,
) -> Result<Json<Vec<image_entity::Model>>> {
    Ok(Json(
        product_image::reorder_images(state.db(), id, &order.ids).await?,
    ))
}

async fn set_main_image(
    State(state): State<AppState>,
    Path((id, image_id)): Path<(i64, i64)>,
) -> Result<Json<product_entity::Model>> {
    Ok(Json(
        product_image::set_main_image(state.db(), id, image_id).await?,
    ))
}

async fn delete_image(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    product_image::delete_image(state.db(), &state.config.uploads.dir, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Categories

async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<category_entity::Model>>> {
    Ok(Json(category::list_categories(state.db()).await?))
}

async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<category_entity::Model>)> {
    let created = category::create_category(state.db(), input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(changes): Json<CategoryChanges>,
) -> Result<Json<category_entity::Model>> {
    Ok(Json(category::update_category(state.db(), id, changes).await?))
}

async fn delete_category(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    category::delete_category(state.db(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Orders

async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Page<order_entity::Model>>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<OrderStatus>)
        .transpose()?;
    let filter = OrderFilter {
        status,
        search: query.search,
        from: query.from,
        to: query.to,
    };
    let (page, per_page) = state.page(Pagination {
        page: query.page,
        per_page: query.per_page,
    });
    Ok(Json(
        order::list_orders(state.db(), &filter, page, per_page).await?,
    ))
}

async fn order_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OrderDetail>> {
    Ok(Json(order::get_order_detail(state.db(), id).await?))
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<StatusBody>,
) -> Result<Json<order_entity::Model>> {
    let next: OrderStatus = body.status.parse()?;
    Ok(Json(order::update_order_status(state.db(), id, next).await?))
}

async fn update_tracking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<TrackingUpdate>,
) -> Result<Json<order_tracking::Model>> {
    Ok(Json(order::update_tracking(state.db(), id, update).await?))
}

// Customers and users

async fn list_customers(State(state): State<AppState>) -> Result<Json<Vec<CustomerSummary>>> {
    Ok(Json(customer::list_customers(state.db()).await?))
}

async fn customer_orders(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Vec<order_entity::Model>>> {
    Ok(Json(customer::customer_orders(state.db(), &key).await?))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<user_entity::Model>>> {
    Ok(Json(user::list_users(state.db()).await?))
}

async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<UserInput>,
) -> Result<(StatusCode, Json<user_entity::Model>)> {
    let created = user::create_user(state.db(), input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UserInput>,
) -> Result<Json<user_entity::Model>> {
    Ok(Json(user::update_user(state.db(), id, input).await?))
}

async fn delete_user(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    user::delete_user(state.db(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_admin(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(flag): Json<FlagBody>,
) -> Result<Json<user_entity::Model>> {
    Ok(Json(user::set_admin(state.db(), id, flag.value).await?))
}

async fn set_active(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(flag): Json<FlagBody>,
) -> Result<Json<user_entity::Model>> {
    Ok(Json(user::set_active(state.db(), id, flag.value).await?))
}

// Homepage and settings

async fn list_sections(
    State(state): State<AppState>,
) -> Result<Json<Vec<homepage_section::Model>>> {
    Ok(Json(homepage::list_sections(state.db(), false).await?))
}

async fn get_section(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<homepage_section::Model>> {
    homepage::get_section(state.db(), &key)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found("homepage section", &key))
}

async fn upsert_section(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(input): Json<SectionInput>,
) -> Result<Json<homepage_section::Model>> {
    Ok(Json(homepage::upsert_section(state.db(), &key, input).await?))
}

async fn delete_section(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode> {
    homepage::delete_section(state.db(), &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_section_active(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(flag): Json<FlagBody>,
) -> Result<Json<homepage_section::Model>> {
    Ok(Json(
        homepage::set_section_active(state.db(), &key, flag.value).await?,
    ))
}

async fn reorder_sections(
    State(state): State<AppState>,
    Json(order): Json<SectionOrder>,
) -> Result<StatusCode> {
    homepage::reorder_sections(state.db(), &order.keys).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_settings(State(state): State<AppState>) -> Result<Json<Vec<setting_entity::Model>>> {
    Ok(Json(setting::all_settings(state.db()).await?))
}

async fn set_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<SettingBody>,
) -> Result<Json<setting_entity::Model>> {
    let saved = setting::set_setting(state.db(), &key, &body.value).await?;
    info!("Setting '{}' updated", saved.key);
    Ok(Json(saved))
}

// Reviews

async fn pending_reviews(State(state): State<AppState>) -> Result<Json<Vec<review_entity::Model>>> {
    Ok(Json(review::pending_reviews(state.db()).await?))
}

async fn approve_review(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<review_entity::Model>> {
    Ok(Json(review::approve_review(state.db(), id).await?))
}

async fn delete_review(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    review::delete_review(state.db(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Reports

async fn sales_summary(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<SalesSummary>> {
    let (from, to) = query.range();
    Ok(Json(report::sales_summary(state.db(), from, to).await?))
}

async fn daily_sales(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<DailySales>>> {
    let (from, to) = query.range();
    Ok(Json(report::daily_sales(state.db(), from, to).await?))
}

async fn top_products(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<TopProduct>>> {
    let (from, to) = query.range();
    let limit = query.limit.unwrap_or(10);
    Ok(Json(report::top_products(state.db(), from, to, limit).await?))
}

async fn status_breakdown(State(state): State<AppState>) -> Result<Json<Vec<StatusCount>>> {
    Ok(Json(report::status_breakdown(state.db()).await?))
}
