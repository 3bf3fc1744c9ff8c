//! Review business logic - customer ratings and the moderation queue.

use crate::{
    entities::{Product, Review, User, review},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use serde::Serialize;

/// Average rating over approved reviews.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    /// Mean star rating, 0 when there are no reviews
    pub average: f64,
    /// Number of approved reviews
    pub count: u64,
}

/// Creates an unapproved review.
///
/// # Errors
/// Returns an error if:
/// - The rating is outside 1..=5 (`Validation`)
/// - The product or user does not exist (`NotFound`)
/// - The user already reviewed this product (`Conflict`)
pub async fn create_review(
    db: &DatabaseConnection,
    product_id: i64,
    user_id: i64,
    rating: i32,
    comment: Option<String>,
) -> Result<review::Model> {
    if !(1..=5).contains(&rating) {
        return Err(Error::validation("rating", "Rating must be between 1 and 5"));
    }

    Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("product", product_id))?;
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    let existing = Review::find()
        .filter(review::Column::ProductId.eq(product_id))
        .filter(review::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::conflict("You have already reviewed this product"));
    }

    let comment = comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    review::ActiveModel {
        product_id: Set(product_id),
        user_id: Set(user_id),
        rating: Set(rating),
        comment: Set(comment),
        is_approved: Set(false),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Marks a review as approved so it shows on the product page.
pub async fn approve_review(db: &DatabaseConnection, review_id: i64) -> Result<review::Model> {
    let review = Review::find_by_id(review_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("review", review_id))?;

    let mut review: review::ActiveModel = review.into();
    review.is_approved = Set(true);
    review.update(db).await.map_err(Into::into)
}

/// Deletes a review.
pub async fn delete_review(db: &DatabaseConnection, review_id: i64) -> Result<()> {
    let result = Review::delete_by_id(review_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("review", review_id));
    }
    Ok(())
}

/// Reviews of a product, newest first.
pub async fn reviews_for_product(
    db: &DatabaseConnection,
    product_id: i64,
    approved_only: bool,
) -> Result<Vec<review::Model>> {
    let mut query = Review::find().filter(review::Column::ProductId.eq(product_id));
    if approved_only {
        query = query.filter(review::Column::IsApproved.eq(true));
    }
    query
        .order_by_desc(review::Column::CreatedAt)
        .order_by_desc(review::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Reviews awaiting approval, oldest first.
pub async fn pending_reviews(db: &DatabaseConnection) -> Result<Vec<review::Model>> {
    Review::find()
        .filter(review::Column::IsApproved.eq(false))
        .order_by_asc(review::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Average and count of approved ratings for a product.
pub async fn rating_summary(db: &DatabaseConnection, product_id: i64) -> Result<RatingSummary> {
    let ratings: Vec<i32> = Review::find()
        .select_only()
        .column(review::Column::Rating)
        .filter(review::Column::ProductId.eq(product_id))
        .filter(review::Column::IsApproved.eq(true))
        .into_tuple()
        .all(db)
        .await?;

    if ratings.is_empty() {
        return Ok(RatingSummary {
            average: 0.0,
            count: 0,
        });
    }

    let count = ratings.len() as u64;
    let sum: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
    #[allow(clippy::cast_precision_loss)]
    let average = sum as f64 / count as f64;
    Ok(RatingSummary { average, count })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_rating_bounds() -> Result<()> {
        let db = setup_test_db().await?;
        let product = create_test_product(&db, "Kettle", None).await?;
        let user = create_test_user(&db, "ann@example.com").await?;

        for rating in [0, 6] {
            let result = create_review(&db, product.id, user.id, rating, None).await;
            assert!(matches!(result.unwrap_err(), Error::Validation { .. }));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_one_review_per_user_and_product() -> Result<()> {
        let db = setup_test_db().await?;
        let product = create_test_product(&db, "Kettle", None).await?;
        let user = create_test_user(&db, "ann@example.com").await?;

        let review = create_review(&db, product.id, user.id, 4, Some("  Good  ".to_string())).await?;
        assert!(!review.is_approved);
        assert_eq!(review.comment.as_deref(), Some("Good"));

        let result = create_review(&db, product.id, user.id, 5, None).await;
        assert!(matches!(result.unwrap_err(), Error::Conflict { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_summary_counts_only_approved() -> Result<()> {
        let db = setup_test_db().await?;
        let product = create_test_product(&db, "Kettle", None).await?;
        let ann = create_test_user(&db, "ann@example.com").await?;
        let bob = create_test_user(&db, "bob@example.com").await?;
        let cy = create_test_user(&db, "cy@example.com").await?;

        let r1 = create_review(&db, product.id, ann.id, 5, None).await?;
        let r2 = create_review(&db, product.id, bob.id, 2, None).await?;
        create_review(&db, product.id, cy.id, 1, None).await?;

        assert_eq!(rating_summary(&db, product.id).await?.count, 0);
        assert_eq!(pending_reviews(&db).await?.len(), 3);

        approve_review(&db, r1.id).await?;
        approve_review(&db, r2.id).await?;

        let summary = rating_summary(&db, product.id).await?;
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average, 3.5);
        assert_eq!(reviews_for_product(&db, product.id, true).await?.len(), 2);
        assert_eq!(reviews_for_product(&db, product.id, false).await?.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_review() -> Result<()> {
        let db = setup_test_db().await?;
        let product = create_test_product(&db, "Kettle", None).await?;
        let user = create_test_user(&db, "ann@example.com").await?;
        let review = create_review(&db, product.id, user.id, 3, None).await?;

        delete_review(&db, review.id).await?;
        let result = delete_review(&db, review.id).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));
        Ok(())
    }
}
