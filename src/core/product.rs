//! Product business logic - Handles all product-related operations.
//!
//! This module provides functions for creating, retrieving, updating, listing and
//! removing catalog products, plus the guarded stock adjustment used by checkout
//! and cancellations. All functions are async and return Result types.

use crate::{
    core::{
        category,
        pagination::Page,
        review::{self, RatingSummary},
        slug::{slugify, with_suffix},
    },
    entities::{
        CartItem, OrderItem, Product, ProductImage, Review, Wishlist, cart_item,
        category as category_entity, order_item, product, product_image,
        review as review_entity, wishlist,
    },
    errors::{Error, Result},
};
use sea_orm::{Condition, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Fields accepted when creating or editing a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    /// Product name, slug is derived from it
    pub name: String,
    /// Long description
    #[serde(default)]
    pub description: String,
    /// Unit price
    pub price: f64,
    /// Units in stock
    #[serde(default)]
    pub stock: i64,
    /// Category to list the product under
    #[serde(default)]
    pub category_id: Option<i64>,
    /// SEO title
    #[serde(default)]
    pub meta_title: Option<String>,
    /// SEO description
    #[serde(default)]
    pub meta_description: Option<String>,
    /// Main image path
    #[serde(default)]
    pub main_image: Option<String>,
    /// Whether the product is visible in the storefront
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

impl ProductInput {
    /// Minimal active input with the given name, price and stock.
    #[must_use]
    pub fn new(name: &str, price: f64, stock: i64) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            price,
            stock,
            category_id: None,
            meta_title: None,
            meta_description: None,
            main_image: None,
            is_active: true,
        }
    }

    /// Same input listed under `category_id`.
    #[must_use]
    pub const fn in_category(mut self, category_id: Option<i64>) -> Self {
        self.category_id = category_id;
        self
    }
}

/// A partial product edit. Absent fields are left as they are; nullable
/// fields distinguish "absent" from an explicit `null`, which clears them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductChanges {
    /// New name, the slug follows it
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New unit price
    pub price: Option<f64>,
    /// New stock level
    pub stock: Option<i64>,
    /// New category, `null` to uncategorize
    #[serde(default, deserialize_with = "crate::core::nullable")]
    pub category_id: Option<Option<i64>>,
    /// New SEO title
    #[serde(default, deserialize_with = "crate::core::nullable")]
    pub meta_title: Option<Option<String>>,
    /// New SEO description
    #[serde(default, deserialize_with = "crate::core::nullable")]
    pub meta_description: Option<Option<String>>,
    /// New main image path
    #[serde(default, deserialize_with = "crate::core::nullable")]
    pub main_image: Option<Option<String>>,
    /// New visibility
    pub is_active: Option<bool>,
}

impl From<ProductInput> for ProductChanges {
    fn from(input: ProductInput) -> Self {
        Self {
            name: Some(input.name),
            description: Some(input.description),
            price: Some(input.price),
            stock: Some(input.stock),
            category_id: Some(input.category_id),
            meta_title: Some(input.meta_title),
            meta_description: Some(input.meta_description),
            main_image: Some(input.main_image),
            is_active: Some(input.is_active),
        }
    }
}

/// Sort orders offered by the product listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    /// Most recently created first
    #[default]
    Newest,
    /// Cheapest first
    PriceAsc,
    /// Most expensive first
    PriceDesc,
    /// Alphabetical
    Name,
}

/// Listing filters; every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Restrict to this category and its descendants
    pub category_id: Option<i64>,
    /// Case-insensitive match against name or description
    pub search: Option<String>,
    /// Lowest price, inclusive
    pub min_price: Option<f64>,
    /// Highest price, inclusive
    pub max_price: Option<f64>,
    /// Only products with stock > 0
    #[serde(default)]
    pub in_stock: bool,
    /// Include deactivated products (admin listings)
    #[serde(default)]
    pub include_inactive: bool,
    /// Sort order
    #[serde(default)]
    pub sort: ProductSort,
}

/// Everything the product page shows.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    /// The product
    pub product: product::Model,
    /// Gallery images in display order
    pub images: Vec<product_image::Model>,
    /// Category chain from root to the product's category
    pub breadcrumbs: Vec<category_entity::Model>,
    /// Approved reviews, newest first
    pub reviews: Vec<review_entity::Model>,
    /// Average rating and count over approved reviews
    pub rating: RatingSummary,
}

/// What `delete_product` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductRemoval {
    /// The product and its dependent rows were removed
    Deleted,
    /// The product appears in orders and was only deactivated
    Deactivated,
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("name", "Product name cannot be empty"));
    }
    if slugify(name).is_empty() {
        return Err(Error::validation(
            "name",
            "Product name must contain letters or digits",
        ));
    }
    Ok(name.to_string())
}

fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(Error::InvalidAmount { amount: price });
    }
    Ok(())
}

fn validate_stock(stock: i64) -> Result<()> {
    if stock < 0 {
        return Err(Error::validation("stock", "Stock cannot be negative"));
    }
    Ok(())
}

fn validate_input(input: &ProductInput) -> Result<String> {
    let name = validate_name(&input.name)?;
    validate_price(input.price)?;
    validate_stock(input.stock)?;
    Ok(name)
}

async fn ensure_category_exists<C: ConnectionTrait>(db: &C, category_id: Option<i64>) -> Result<()> {
    if let Some(id) = category_id {
        if category::get_category_by_id(db, id).await?.is_none() {
            return Err(Error::validation(
                "category_id",
                format!("Category {id} does not exist"),
            ));
        }
    }
    Ok(())
}

/// Picks the first free slug among `base`, `base-2`, `base-3`, ...
async fn unique_slug<C: ConnectionTrait>(db: &C, name: &str, except_id: Option<i64>) -> Result<String> {
    let base = slugify(name);
    let mut attempt = 1;
    loop {
        let candidate = with_suffix(&base, attempt);
        let mut query = Product::find().filter(product::Column::Slug.eq(candidate.as_str()));
        if let Some(id) = except_id {
            query = query.filter(product::Column::Id.ne(id));
        }
        if query.one(db).await?.is_none() {
            return Ok(candidate);
        }
        attempt += 1;
    }
}

/// Retrieves a specific product by its unique ID.
pub async fn get_product_by_id<C: ConnectionTrait>(
    db: &C,
    product_id: i64,
) -> Result<Option<product::Model>> {
    Product::find_by_id(product_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a product by its slug.
pub async fn get_product_by_slug(
    db: &DatabaseConnection,
    slug: &str,
) -> Result<Option<product::Model>> {
    Product::find()
        .filter(product::Column::Slug.eq(slug))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a new product, performing input validation.
///
/// # Errors
/// Returns an error if:
/// - The product name is empty (`Validation`)
/// - The price is negative or not finite (`InvalidAmount`)
/// - The stock is negative or the category does not exist (`Validation`)
/// - The database insert operation fails
pub async fn create_product<C: ConnectionTrait>(
    db: &C,
    input: ProductInput,
) -> Result<product::Model> {
    let name = validate_input(&input)?;
    ensure_category_exists(db, input.category_id).await?;
    let slug = unique_slug(db, &name, None).await?;

    let now = chrono::Utc::now();
    let product = product::ActiveModel {
        name: Set(name),
        slug: Set(slug),
        description: Set(input.description),
        price: Set(input.price),
        stock: Set(input.stock),
        category_id: Set(input.category_id),
        meta_title: Set(input.meta_title),
        meta_description: Set(input.meta_description),
        main_image: Set(input.main_image),
        is_active: Set(input.is_active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let created = product.insert(db).await?;
    info!("Created product '{}' ({})", created.name, created.slug);
    Ok(created)
}

/// Applies a partial edit. Only the fields present in `changes` are
/// touched; the slug changes only when the name does.
///
/// # Errors
/// Same validation as [`create_product`] for the fields present, plus
/// `NotFound` for an unknown id.
pub async fn update_product<C: ConnectionTrait>(
    db: &C,
    product_id: i64,
    changes: ProductChanges,
) -> Result<product::Model> {
    let existing = get_product_by_id(db, product_id)
        .await?
        .ok_or_else(|| Error::not_found("product", product_id))?;
    let current_name = existing.name.clone();
    let mut product: product::ActiveModel = existing.into();

    if let Some(name) = changes.name {
        let name = validate_name(&name)?;
        if name != current_name {
            product.slug = Set(unique_slug(db, &name, Some(product_id)).await?);
        }
        product.name = Set(name);
    }
    if let Some(description) = changes.description {
        product.description = Set(description);
    }
    if let Some(price) = changes.price {
        validate_price(price)?;
        product.price = Set(price);
    }
    if let Some(stock) = changes.stock {
        validate_stock(stock)?;
        product.stock = Set(stock);
    }
    if let Some(category_id) = changes.category_id {
        ensure_category_exists(db, category_id).await?;
        product.category_id = Set(category_id);
    }
    if let Some(meta_title) = changes.meta_title {
        product.meta_title = Set(meta_title);
    }
    if let Some(meta_description) = changes.meta_description {
        product.meta_description = Set(meta_description);
    }
    if let Some(main_image) = changes.main_image {
        product.main_image = Set(main_image);
    }
    if let Some(is_active) = changes.is_active {
        product.is_active = Set(is_active);
    }
    product.updated_at = Set(chrono::Utc::now());

    product.update(db).await.map_err(Into::into)
}

/// Removes a product and its images, cart lines, wishlist entries and reviews.
///
/// Products referenced by order items are deactivated instead, so order
/// history keeps pointing at a real row.
pub async fn delete_product(db: &DatabaseConnection, product_id: i64) -> Result<ProductRemoval> {
    let txn = db.begin().await?;

    let existing = get_product_by_id(&txn, product_id)
        .await?
        .ok_or_else(|| Error::not_found("product", product_id))?;

    let ordered = OrderItem::find()
        .filter(order_item::Column::ProductId.eq(product_id))
        .count(&txn)
        .await?;

    let removal = if ordered > 0 {
        let mut product: product::ActiveModel = existing.into();
        product.is_active = Set(false);
        product.updated_at = Set(chrono::Utc::now());
        product.update(&txn).await?;
        CartItem::delete_many()
            .filter(cart_item::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        warn!("Product {product_id} has {ordered} order line(s); deactivated instead of deleted");
        ProductRemoval::Deactivated
    } else {
        ProductImage::delete_many()
            .filter(product_image::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        CartItem::delete_many()
            .filter(cart_item::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        Wishlist::delete_many()
            .filter(wishlist::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        Review::delete_many()
            .filter(review_entity::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        existing.delete(&txn).await?;
        info!("Deleted product {product_id}");
        ProductRemoval::Deleted
    };

    txn.commit().await?;
    Ok(removal)
}

/// Lists products matching `filter`, one page at a time.
pub async fn list_products(
    db: &DatabaseConnection,
    filter: &ProductFilter,
    page: u64,
    per_page: u64,
) -> Result<Page<product::Model>> {
    let mut query = Product::find();

    if !filter.include_inactive {
        query = query.filter(product::Column::IsActive.eq(true));
    }
    if let Some(category_id) = filter.category_id {
        let ids = category::descendant_ids(db, category_id).await?;
        query = query.filter(product::Column::CategoryId.is_in(ids));
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        query = query.filter(
            Condition::any()
                .add(product::Column::Name.contains(term))
                .add(product::Column::Description.contains(term)),
        );
    }
    if let Some(min) = filter.min_price {
        query = query.filter(product::Column::Price.gte(min));
    }
    if let Some(max) = filter.max_price {
        query = query.filter(product::Column::Price.lte(max));
    }
    if filter.in_stock {
        query = query.filter(product::Column::Stock.gt(0));
    }

    query = match filter.sort {
        ProductSort::Newest => query
            .order_by_desc(product::Column::CreatedAt)
            .order_by_desc(product::Column::Id),
        ProductSort::PriceAsc => query
            .order_by_asc(product::Column::Price)
            .order_by_asc(product::Column::Id),
        ProductSort::PriceDesc => query
            .order_by_desc(product::Column::Price)
            .order_by_asc(product::Column::Id),
        ProductSort::Name => query
            .order_by_asc(product::Column::Name)
            .order_by_asc(product::Column::Id),
    };

    let paginator = query.paginate(db, per_page);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page.saturating_sub(1)).await?;

    Ok(Page::new(items, total, page, per_page))
}

/// Loads the product page for an active product.
///
/// # Errors
/// Returns `NotFound` when the slug is unknown or the product is inactive.
pub async fn product_detail(db: &DatabaseConnection, slug: &str) -> Result<ProductDetail> {
    let product = get_product_by_slug(db, slug)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| Error::not_found("product", slug))?;

    let images = product
        .find_related(ProductImage)
        .order_by_asc(product_image::Column::SortOrder)
        .order_by_asc(product_image::Column::Id)
        .all(db)
        .await?;

    let breadcrumbs = match product.category_id {
        Some(category_id) => category::ancestors(db, category_id).await?,
        None => Vec::new(),
    };

    let reviews = review::reviews_for_product(db, product.id, true).await?;
    let rating = review::rating_summary(db, product.id).await?;

    Ok(ProductDetail {
        product,
        images,
        breadcrumbs,
        reviews,
        rating,
    })
}

/// Adds `delta` to a product's stock in a single guarded UPDATE.
///
/// The `WHERE stock >= -delta` guard makes the check and the write one
/// statement, so concurrent checkouts cannot drive stock below zero.
///
/// # Errors
/// Returns `NotFound` for an unknown product and `InsufficientStock` when the
/// guard rejects the update.
pub async fn adjust_stock<C>(db: &C, product_id: i64, delta: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let product = get_product_by_id(db, product_id)
        .await?
        .ok_or_else(|| Error::not_found("product", product_id))?;

    let result = Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).add(delta),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::Stock.gte(-delta))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::InsufficientStock {
            product: product.name,
            available: product.stock,
            requested: -delta,
        });
    }
    Ok(())
}

/// Active products whose stock is at or below `threshold`, lowest stock first.
pub async fn low_stock_products(
    db: &DatabaseConnection,
    threshold: i64,
) -> Result<Vec<product::Model>> {
    Product::find()
        .filter(product::Column::IsActive.eq(true))
        .filter(product::Column::Stock.lte(threshold))
        .order_by_asc(product::Column::Stock)
        .order_by_asc(product::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::category::CategoryInput;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_product_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_product(&db, ProductInput::new("", 10.0, 1)).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { field, .. } if field == "name"));

        let result = create_product(&db, ProductInput::new("Mug", -10.0, 1)).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidAmount { amount } if amount == -10.0));

        let result = create_product(&db, ProductInput::new("Mug", f64::NAN, 1)).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidAmount { .. }));

        let result = create_product(&db, ProductInput::new("Mug", 3.0, -1)).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { field, .. } if field == "stock"));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_product_generates_unique_slugs() -> Result<()> {
        let db = setup_test_db().await?;
        let first = create_product(&db, ProductInput::new("Blue Mug", 8.0, 3)).await?;
        let second = create_product(&db, ProductInput::new("Blue  Mug!", 9.0, 3)).await?;

        assert_eq!(first.slug, "blue-mug");
        assert_eq!(second.slug, "blue-mug-2");
        assert!(first.is_active);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_product_unknown_category() -> Result<()> {
        let db = setup_test_db().await?;
        let result =
            create_product(&db, ProductInput::new("Mug", 8.0, 3).in_category(Some(77))).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { field, .. } if field == "category_id"));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_product_keeps_slug_when_name_unchanged() -> Result<()> {
        let db = setup_test_db().await?;
        let product = create_test_product(&db, "Teapot", None).await?;

        let mut input = ProductInput::new("Teapot", 25.0, 4);
        input.description = "Cast iron".to_string();
        let updated = update_product(&db, product.id, input.into()).await?;
        assert_eq!(updated.slug, "teapot");
        assert_eq!(updated.price, 25.0);
        assert_eq!(updated.description, "Cast iron");

        let rename = ProductChanges {
            name: Some("Iron Teapot".to_string()),
            ..Default::default()
        };
        let renamed = update_product(&db, product.id, rename).await?;
        assert_eq!(renamed.slug, "iron-teapot");
        Ok(())
    }

    #[tokio::test]
    async fn test_price_only_edit_keeps_other_fields() -> Result<()> {
        let db = setup_test_db().await?;
        let shelf = create_test_category(&db, "Kitchen").await?;
        let mut input = ProductInput::new("Mug", 4.0, 40).in_category(Some(shelf.id));
        input.meta_title = Some("Stoneware mug".to_string());
        input.is_active = false;
        let product = create_product(&db, input).await?;

        let changes: ProductChanges = serde_json::from_str(r#"{"name":"Mug","price":2.5}"#).unwrap();
        let updated = update_product(&db, product.id, changes).await?;
        assert_eq!(updated.price, 2.5);
        assert_eq!(updated.stock, 40);
        assert!(!updated.is_active);
        assert_eq!(updated.category_id, Some(shelf.id));
        assert_eq!(updated.meta_title.as_deref(), Some("Stoneware mug"));
        assert_eq!(updated.slug, "mug");

        let changes: ProductChanges = serde_json::from_str(r#"{"category_id":null}"#).unwrap();
        let cleared = update_product(&db, product.id, changes).await?;
        assert_eq!(cleared.category_id, None);
        assert_eq!(cleared.price, 2.5);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_validates_present_fields() -> Result<()> {
        let db = setup_test_db().await?;
        let product = create_test_product(&db, "Mug", None).await?;

        let negative = ProductChanges {
            stock: Some(-1),
            ..Default::default()
        };
        let result = update_product(&db, product.id, negative).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        let free = ProductChanges {
            price: Some(f64::INFINITY),
            ..Default::default()
        };
        let result = update_product(&db, product.id, free).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidAmount { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_missing_product() -> Result<()> {
        let db = setup_test_db().await?;
        let result = update_product(&db, 999, ProductChanges::default()).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_products_filters_and_sorts() -> Result<()> {
        let db = setup_test_db().await?;
        let drinks = create_test_category(&db, "Drinks").await?;
        let juice = category::create_category(&db, CategoryInput::named("Juice").under(drinks.id)).await?;
        let snacks = create_test_category(&db, "Snacks").await?;

        create_custom_product(&db, "Orange Juice", 4.0, 10, Some(juice.id)).await?;
        create_custom_product(&db, "Sparkling Water", 2.0, 0, Some(drinks.id)).await?;
        create_custom_product(&db, "Crisps", 1.5, 5, Some(snacks.id)).await?;

        let filter = ProductFilter {
            category_id: Some(drinks.id),
            sort: ProductSort::PriceAsc,
            ..Default::default()
        };
        let page = list_products(&db, &filter, 1, 20).await?;
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].name, "Sparkling Water");
        assert_eq!(page.items[1].name, "Orange Juice");

        let filter = ProductFilter {
            category_id: Some(drinks.id),
            in_stock: true,
            ..Default::default()
        };
        let page = list_products(&db, &filter, 1, 20).await?;
        assert_eq!(page.total, 1);

        let filter = ProductFilter {
            search: Some("juice".to_string()),
            ..Default::default()
        };
        assert_eq!(list_products(&db, &filter, 1, 20).await?.total, 1);

        let filter = ProductFilter {
            min_price: Some(1.6),
            max_price: Some(4.0),
            sort: ProductSort::Name,
            ..Default::default()
        };
        let page = list_products(&db, &filter, 1, 20).await?;
        let names: Vec<&str> = page.items.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Orange Juice", "Sparkling Water"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_products_paginates_and_hides_inactive() -> Result<()> {
        let db = setup_test_db().await?;
        for i in 0..5 {
            create_test_product(&db, &format!("Item {i}"), None).await?;
        }
        let mut hidden = ProductInput::new("Hidden", 1.0, 1);
        hidden.is_active = false;
        create_product(&db, hidden).await?;

        let filter = ProductFilter {
            sort: ProductSort::Name,
            ..Default::default()
        };
        let page = list_products(&db, &filter, 2, 2).await?;
        assert_eq!(page.total, 5);
        assert_eq!(page.last_page, 3);
        assert_eq!(page.items[0].name, "Item 2");

        let admin = ProductFilter {
            include_inactive: true,
            ..Default::default()
        };
        assert_eq!(list_products(&db, &admin, 1, 20).await?.total, 6);
        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_stock_guard() -> Result<()> {
        let db = setup_test_db().await?;
        let product = create_custom_product(&db, "Lamp", 30.0, 2, None).await?;

        adjust_stock(&db, product.id, -2).await?;
        let result = adjust_stock(&db, product.id, -1).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InsufficientStock { available: 0, requested: 1, .. }
        ));

        adjust_stock(&db, product.id, 3).await?;
        assert_eq!(get_product_by_id(&db, product.id).await?.unwrap().stock, 3);

        let result = adjust_stock(&db, 404, 1).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_product_without_orders() -> Result<()> {
        let db = setup_test_db().await?;
        let product = create_test_product(&db, "Vase", None).await?;
        crate::core::product_image::add_image(&db, product.id, "uploads/vase.jpg".to_string()).await?;

        assert_eq!(delete_product(&db, product.id).await?, ProductRemoval::Deleted);
        assert!(get_product_by_id(&db, product.id).await?.is_none());
        assert_eq!(ProductImage::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_ordered_product_deactivates() -> Result<()> {
        let db = setup_test_db().await?;
        let product = create_test_product(&db, "Candle", None).await?;
        place_test_order(&db, &[(product.id, 1)]).await?;

        assert_eq!(delete_product(&db, product.id).await?, ProductRemoval::Deactivated);
        let kept = get_product_by_id(&db, product.id).await?.unwrap();
        assert!(!kept.is_active);
        Ok(())
    }

    #[tokio::test]
    async fn test_product_detail() -> Result<()> {
        let db = setup_test_db().await?;
        let home = create_test_category(&db, "Home").await?;
        let decor = category::create_category(&db, CategoryInput::named("Decor").under(home.id)).await?;
        let product = create_test_product(&db, "Wall Clock", Some(decor.id)).await?;
        crate::core::product_image::add_image(&db, product.id, "a.jpg".to_string()).await?;
        crate::core::product_image::add_image(&db, product.id, "b.jpg".to_string()).await?;

        let detail = product_detail(&db, "wall-clock").await?;
        assert_eq!(detail.images.len(), 2);
        assert_eq!(detail.images[0].path, "a.jpg");
        assert_eq!(detail.breadcrumbs.len(), 2);
        assert_eq!(detail.rating.count, 0);

        let result = product_detail(&db, "missing").await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_low_stock_products() -> Result<()> {
        let db = setup_test_db().await?;
        create_custom_product(&db, "Plenty", 1.0, 50, None).await?;
        create_custom_product(&db, "Few", 1.0, 3, None).await?;
        create_custom_product(&db, "None", 1.0, 0, None).await?;

        let low = low_stock_products(&db, 5).await?;
        let names: Vec<&str> = low.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["None", "Few"]);
        Ok(())
    }
}
