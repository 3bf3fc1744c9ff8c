//! Public shop routes: catalog, homepage, cart, checkout, wishlist, reviews.

use super::{AppState, cart_key_from_headers, user_id_from_headers};
use crate::{
    core::{
        cart::{self, CartSummary},
        category::{self, CategoryNode},
        homepage::{self, SectionView},
        order::{self, CustomerInfo, LineRequest, OrderDetail},
        pagination::{Page, Pagination},
        product::{self, ProductDetail, ProductFilter, ProductSort},
        review, setting,
        wishlist::{self, WishlistToggle},
    },
    entities::{
        category as category_entity, order as order_entity, product as product_entity,
        review as review_entity,
    },
    errors::{Error, Result},
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

/// Query string accepted by product listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    /// Restrict to this category and its descendants
    pub category_id: Option<i64>,
    /// Free-text search
    pub search: Option<String>,
    /// Lowest price
    pub min_price: Option<f64>,
    /// Highest price
    pub max_price: Option<f64>,
    /// Only products in stock
    #[serde(default)]
    pub in_stock: bool,
    /// Sort order
    #[serde(default)]
    pub sort: ProductSort,
    /// 1-based page
    pub page: Option<u64>,
    /// Page size
    pub per_page: Option<u64>,
}

impl ProductQuery {
    /// Splits the query into a filter and a page request.
    #[must_use]
    pub fn into_parts(self, include_inactive: bool) -> (ProductFilter, Pagination) {
        let filter = ProductFilter {
            category_id: self.category_id,
            search: self.search,
            min_price: self.min_price,
            max_price: self.max_price,
            in_stock: self.in_stock,
            include_inactive,
            sort: self.sort,
        };
        let page = Pagination {
            page: self.page,
            per_page: self.per_page,
        };
        (filter, page)
    }
}

/// A cart line change.
#[derive(Debug, Deserialize)]
struct CartLineBody {
    product_id: i64,
    quantity: i64,
}

/// Checkout body: customer details plus either explicit items or the cart.
#[derive(Debug, Deserialize)]
struct CheckoutBody {
    #[serde(flatten)]
    customer: CustomerInfo,
    #[serde(default)]
    user_id: Option<i64>,
    #[serde(default)]
    items: Option<Vec<LineRequest>>,
}

#[derive(Debug, Deserialize)]
struct WishlistBody {
    user_id: i64,
    product_id: i64,
}

#[derive(Debug, Deserialize)]
struct ReviewBody {
    user_id: i64,
    rating: i32,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Serialize)]
struct StoreInfo {
    name: String,
    currency: String,
}

#[derive(Debug, Serialize)]
struct HomepageResponse {
    store: StoreInfo,
    sections: Vec<SectionView>,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/tree", get(category_tree))
        .route("/categories/{slug}/products", get(category_products))
        .route("/products", get(list_products))
        .route("/products/{slug}", get(product_detail))
        .route("/products/{slug}/reviews", post(create_review))
        .route("/homepage", get(homepage))
        .route(
            "/cart",
            get(show_cart)
                .post(add_to_cart)
                .patch(update_cart)
                .delete(clear_cart),
        )
        .route("/cart/{product_id}", axum::routing::delete(remove_from_cart))
        .route("/checkout", post(checkout))
        .route("/wishlist/toggle", post(toggle_wishlist))
        .route("/users/{id}/wishlist", get(user_wishlist))
        .route("/users/{id}/orders", get(user_orders))
}

async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<category_entity::Model>>> {
    let categories = category::list_categories(state.db())
        .await?
        .into_iter()
        .filter(|c| c.is_active)
        .collect();
    Ok(Json(categories))
}

async fn category_tree(State(state): State<AppState>) -> Result<Json<Vec<CategoryNode>>> {
    Ok(Json(category::category_tree(state.db()).await?))
}

async fn category_products(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Page<product_entity::Model>>> {
    let found = category::get_category_by_slug(state.db(), &slug)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| Error::not_found("category", &slug))?;

    let (mut filter, page) = query.into_parts(false);
    filter.category_id = Some(found.id);
    let (page, per_page) = state.page(page);
    Ok(Json(
        product::list_products(state.db(), &filter, page, per_page).await?,
    ))
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Page<product_entity::Model>>> {
    let (filter, page) = query.into_parts(false);
    let (page, per_page) = state.page(page);
    Ok(Json(
        product::list_products(state.db(), &filter, page, per_page).await?,
    ))
}

async fn product_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductDetail>> {
    Ok(Json(product::product_detail(state.db(), &slug).await?))
}

async fn homepage(State(state): State<AppState>) -> Result<Json<HomepageResponse>> {
    let sections = homepage::list_sections(state.db(), true)
        .await?
        .into_iter()
        .map(SectionView::try_from)
        .collect::<Result<Vec<_>>>()?;
    Ok(Json(HomepageResponse {
        store: StoreInfo {
            name: state.config.store.name.clone(),
            currency: state.config.store.currency.clone(),
        },
        sections,
    }))
}

async fn show_cart(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<CartSummary>> {
    let key = cart_key_from_headers(&headers)?;
    Ok(Json(cart::cart_summary(state.db(), &key).await?))
}

async fn add_to_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CartLineBody>,
) -> Result<Json<CartSummary>> {
    let key = cart_key_from_headers(&headers)?;
    cart::add_to_cart(state.db(), &key, body.product_id, body.quantity).await?;
    Ok(Json(cart::cart_summary(state.db(), &key).await?))
}

async fn update_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CartLineBody>,
) -> Result<Json<CartSummary>> {
    let key = cart_key_from_headers(&headers)?;
    cart::update_cart_item(state.db(), &key, body.product_id, body.quantity).await?;
    Ok(Json(cart::cart_summary(state.db(), &key).await?))
}

async fn remove_from_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(product_id): Path<i64>,
) -> Result<Json<CartSummary>> {
    let key = cart_key_from_headers(&headers)?;
    cart::remove_from_cart(state.db(), &key, product_id).await?;
    Ok(Json(cart::cart_summary(state.db(), &key).await?))
}

async fn clear_cart(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode> {
    let key = cart_key_from_headers(&headers)?;
    cart::clear_cart(state.db(), &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<OrderDetail>)> {
    let shipping_fee = setting::shipping_fee(state.db(), state.config.store.shipping_fee).await?;
    let user_id = match body.user_id {
        Some(id) => Some(id),
        None => user_id_from_headers(&headers)?,
    };

    let detail = match body.items {
        Some(items) => {
            let request = order::CheckoutRequest {
                customer: body.customer,
                user_id,
                items,
            };
            order::place_order(state.db(), request, shipping_fee).await?
        }
        None => {
            let key = cart_key_from_headers(&headers)?;
            order::checkout_cart(state.db(), &key, body.customer, user_id, shipping_fee).await?
        }
    };
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn toggle_wishlist(
    State(state): State<AppState>,
    Json(body): Json<WishlistBody>,
) -> Result<Json<WishlistToggle>> {
    Ok(Json(
        wishlist::toggle_wishlist(state.db(), body.user_id, body.product_id).await?,
    ))
}

async fn user_wishlist(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<product_entity::Model>>> {
    Ok(Json(wishlist::wishlist_for_user(state.db(), user_id).await?))
}

async fn create_review(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<ReviewBody>,
) -> Result<(StatusCode, Json<review_entity::Model>)> {
    let reviewed = product::get_product_by_slug(state.db(), &slug)
        .await?
        .ok_or_else(|| Error::not_found("product", &slug))?;
    let created =
        review::create_review(state.db(), reviewed.id, body.user_id, body.rating, body.comment)
            .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn user_orders(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<order_entity::Model>>> {
    Ok(Json(order::orders_for_user(state.db(), user_id).await?))
}
