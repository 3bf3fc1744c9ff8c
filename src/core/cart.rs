//! Cart business logic.
//!
//! A cart is the set of `cart_items` rows sharing a cart key: `user:<id>` for
//! signed-in shoppers and `session:<token>` for everyone else. Quantities are
//! checked against stock when lines change; checkout checks again atomically.

use crate::{
    core::{order::round_money, product},
    entities::{CartItem, Product, cart_item, product as product_entity},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

const MAX_TOKEN_LEN: usize = 128;

/// Largest quantity a single cart or order line may hold.
pub const MAX_LINE_QUANTITY: i64 = 10_000;

/// Cart key for a signed-in user.
#[must_use]
pub fn user_cart_key(user_id: i64) -> String {
    format!("user:{user_id}")
}

/// Cart key for an anonymous session token.
///
/// # Errors
/// Returns `Validation` if the token is empty, too long, or contains
/// characters other than ASCII letters, digits, `-` and `_`.
pub fn session_cart_key(token: &str) -> Result<String> {
    let token = token.trim();
    let valid = !token.is_empty()
        && token.len() <= MAX_TOKEN_LEN
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(Error::validation("cart_token", "Cart token is invalid"));
    }
    Ok(format!("session:{token}"))
}

/// One priced cart line.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    /// Product in the line
    pub product_id: i64,
    /// Current product name
    pub name: String,
    /// Product slug for links
    pub slug: String,
    /// Main image path
    pub image: Option<String>,
    /// Current unit price
    pub unit_price: f64,
    /// Units in the cart
    pub quantity: i64,
    /// `unit_price * quantity`
    pub line_total: f64,
    /// Units currently in stock
    pub available: i64,
}

/// A priced cart.
#[derive(Debug, Clone, Serialize)]
pub struct CartSummary {
    /// Cart key the summary was built for
    pub key: String,
    /// Lines, oldest first
    pub lines: Vec<CartLine>,
    /// Sum of quantities
    pub item_count: i64,
    /// Sum of line totals
    pub subtotal: f64,
}

/// Raw cart rows, oldest first.
pub async fn cart_items<C: ConnectionTrait>(db: &C, key: &str) -> Result<Vec<cart_item::Model>> {
    CartItem::find()
        .filter(cart_item::Column::CartKey.eq(key))
        .order_by_asc(cart_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn find_line<C: ConnectionTrait>(
    db: &C,
    key: &str,
    product_id: i64,
) -> Result<Option<cart_item::Model>> {
    CartItem::find()
        .filter(cart_item::Column::CartKey.eq(key))
        .filter(cart_item::Column::ProductId.eq(product_id))
        .one(db)
        .await
        .map_err(Into::into)
}

async fn purchasable_product(
    db: &DatabaseConnection,
    product_id: i64,
    quantity: i64,
) -> Result<product_entity::Model> {
    let product = product::get_product_by_id(db, product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| Error::not_found("product", product_id))?;
    if quantity > product.stock {
        return Err(Error::InsufficientStock {
            product: product.name,
            available: product.stock,
            requested: quantity,
        });
    }
    Ok(product)
}

/// Adds `quantity` units of a product, merging with an existing line.
///
/// # Errors
/// Returns `Validation` for a quantity below 1, `NotFound` for a missing or
/// inactive product and `InsufficientStock` when the merged quantity exceeds
/// the stock.
pub async fn add_to_cart(
    db: &DatabaseConnection,
    key: &str,
    product_id: i64,
    quantity: i64,
) -> Result<cart_item::Model> {
    if quantity < 1 {
        return Err(Error::validation("quantity", "Quantity must be at least 1"));
    }

    let existing = find_line(db, key, product_id).await?;
    let merged = existing
        .as_ref()
        .map_or(0, |line| line.quantity)
        .checked_add(quantity)
        .filter(|&q| q <= MAX_LINE_QUANTITY)
        .ok_or_else(|| {
            Error::validation(
                "quantity",
                format!("Quantity may not exceed {MAX_LINE_QUANTITY}"),
            )
        })?;
    purchasable_product(db, product_id, merged).await?;

    let now = Utc::now();
    let line = match existing {
        Some(line) => {
            let mut model: cart_item::ActiveModel = line.into();
            model.quantity = Set(merged);
            model.updated_at = Set(now);
            model.update(db).await?
        }
        None => {
            cart_item::ActiveModel {
                cart_key: Set(key.to_string()),
                product_id: Set(product_id),
                quantity: Set(merged),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };

    debug!("Cart {key}: product {product_id} now x{merged}");
    Ok(line)
}

/// Sets the quantity of a line. A quantity of 0 removes the line.
pub async fn update_cart_item(
    db: &DatabaseConnection,
    key: &str,
    product_id: i64,
    quantity: i64,
) -> Result<Option<cart_item::Model>> {
    if quantity < 0 {
        return Err(Error::validation("quantity", "Quantity cannot be negative"));
    }
    if quantity == 0 {
        remove_from_cart(db, key, product_id).await?;
        return Ok(None);
    }

    let line = find_line(db, key, product_id)
        .await?
        .ok_or_else(|| Error::not_found("cart item", product_id))?;
    purchasable_product(db, product_id, quantity).await?;

    let mut model: cart_item::ActiveModel = line.into();
    model.quantity = Set(quantity);
    model.updated_at = Set(Utc::now());
    Ok(Some(model.update(db).await?))
}

/// Removes a product from the cart. Removing an absent line is not an error.
pub async fn remove_from_cart(db: &DatabaseConnection, key: &str, product_id: i64) -> Result<()> {
    CartItem::delete_many()
        .filter(cart_item::Column::CartKey.eq(key))
        .filter(cart_item::Column::ProductId.eq(product_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Empties the cart.
pub async fn clear_cart<C: ConnectionTrait>(db: &C, key: &str) -> Result<u64> {
    let result = CartItem::delete_many()
        .filter(cart_item::Column::CartKey.eq(key))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Prices the cart with current product data.
///
/// Lines whose product has been deleted are skipped.
pub async fn cart_summary(db: &DatabaseConnection, key: &str) -> Result<CartSummary> {
    let rows = cart_items(db, key).await?;
    let ids: Vec<i64> = rows.iter().map(|r| r.product_id).collect();
    let products: HashMap<i64, product_entity::Model> = Product::find()
        .filter(product_entity::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let lines: Vec<CartLine> = rows
        .into_iter()
        .filter_map(|row| {
            let product = products.get(&row.product_id)?;
            #[allow(clippy::cast_precision_loss)]
            let line_total = round_money(product.price * row.quantity as f64);
            Some(CartLine {
                product_id: product.id,
                name: product.name.clone(),
                slug: product.slug.clone(),
                image: product.main_image.clone(),
                unit_price: product.price,
                quantity: row.quantity,
                line_total,
                available: product.stock,
            })
        })
        .collect();

    let item_count = lines.iter().map(|l| l.quantity).sum();
    let subtotal = round_money(lines.iter().map(|l| l.line_total).sum());
    Ok(CartSummary {
        key: key.to_string(),
        lines,
        item_count,
        subtotal,
    })
}
