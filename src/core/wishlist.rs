//! Wishlist business logic.

use crate::{
    entities::{Product, User, Wishlist, product, wishlist},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Serialize;

/// Outcome of a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WishlistToggle {
    /// True if the product was added, false if it was removed
    pub added: bool,
    /// Size of the user's wishlist afterwards
    pub count: u64,
}

/// Adds the product to the user's wishlist, or removes it if already there.
///
/// # Errors
/// Returns `NotFound` if the user or product does not exist.
pub async fn toggle_wishlist(
    db: &DatabaseConnection,
    user_id: i64,
    product_id: i64,
) -> Result<WishlistToggle> {
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;
    Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("product", product_id))?;

    let existing = Wishlist::find()
        .filter(wishlist::Column::UserId.eq(user_id))
        .filter(wishlist::Column::ProductId.eq(product_id))
        .one(db)
        .await?;

    let added = match existing {
        Some(entry) => {
            entry.delete(db).await?;
            false
        }
        None => {
            wishlist::ActiveModel {
                user_id: Set(user_id),
                product_id: Set(product_id),
                created_at: Set(chrono::Utc::now()),
                ..Default::default()
            }
            .insert(db)
            .await?;
            true
        }
    };

    let count = Wishlist::find()
        .filter(wishlist::Column::UserId.eq(user_id))
        .count(db)
        .await?;
    Ok(WishlistToggle { added, count })
}

/// Products on the user's wishlist, most recently saved first.
pub async fn wishlist_for_user(db: &DatabaseConnection, user_id: i64) -> Result<Vec<product::Model>> {
    let entries = Wishlist::find()
        .filter(wishlist::Column::UserId.eq(user_id))
        .order_by_desc(wishlist::Column::CreatedAt)
        .order_by_desc(wishlist::Column::Id)
        .find_also_related(Product)
        .all(db)
        .await?;

    Ok(entries.into_iter().filter_map(|(_, product)| product).collect())
}
