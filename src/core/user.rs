//! User administration - registered customers and admin accounts.

use crate::{
    core::{cart, customer::normalize_mobile},
    entities::{Order, Review, User, Wishlist, order, review, user, wishlist},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Deserialize;
use tracing::info;

/// Fields accepted when creating or editing a user.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInput {
    /// Display name
    pub name: String,
    /// E-mail address
    pub email: String,
    /// Optional mobile number
    #[serde(default)]
    pub mobile: Option<String>,
    /// Admin panel access
    #[serde(default)]
    pub is_admin: bool,
}

fn validated_fields(input: &UserInput) -> Result<(String, String, Option<String>)> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(Error::validation("name", "Name cannot be empty"));
    }

    let email = input.email.trim().to_lowercase();
    let valid_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_email {
        return Err(Error::validation("email", "A valid e-mail address is required"));
    }

    let mobile = match input.mobile.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(normalize_mobile(raw)?),
    };

    Ok((name.to_string(), email, mobile))
}

async fn ensure_email_free(
    db: &DatabaseConnection,
    email: &str,
    except_id: Option<i64>,
) -> Result<()> {
    let mut query = User::find().filter(user::Column::Email.eq(email));
    if let Some(id) = except_id {
        query = query.filter(user::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(Error::conflict(format!(
            "A user with e-mail '{email}' already exists"
        )));
    }
    Ok(())
}

/// All users, newest first.
pub async fn list_users(db: &DatabaseConnection) -> Result<Vec<user::Model>> {
    User::find()
        .order_by_desc(user::Column::CreatedAt)
        .order_by_desc(user::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a user by id.
pub async fn get_user_by_id(db: &DatabaseConnection, user_id: i64) -> Result<Option<user::Model>> {
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

/// Creates an active user.
///
/// # Errors
/// Returns `Validation` for a missing name, malformed e-mail or mobile, and
/// `Conflict` when the e-mail is already registered.
pub async fn create_user(db: &DatabaseConnection, input: UserInput) -> Result<user::Model> {
    let (name, email, mobile) = validated_fields(&input)?;
    ensure_email_free(db, &email, None).await?;

    let now = chrono::Utc::now();
    let created = user::ActiveModel {
        name: Set(name),
        email: Set(email),
        mobile: Set(mobile),
        is_admin: Set(input.is_admin),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    info!("Created user {} ({})", created.id, created.email);
    Ok(created)
}

/// Replaces a user's profile fields and admin flag.
pub async fn update_user(
    db: &DatabaseConnection,
    user_id: i64,
    input: UserInput,
) -> Result<user::Model> {
    let (name, email, mobile) = validated_fields(&input)?;
    let existing = get_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;
    ensure_email_free(db, &email, Some(user_id)).await?;

    if existing.is_admin && !input.is_admin {
        ensure_not_last_admin(db, &existing).await?;
    }

    let mut model: user::ActiveModel = existing.into();
    model.name = Set(name);
    model.email = Set(email);
    model.mobile = Set(mobile);
    model.is_admin = Set(input.is_admin);
    model.updated_at = Set(chrono::Utc::now());
    model.update(db).await.map_err(Into::into)
}

async fn ensure_not_last_admin<C: ConnectionTrait>(db: &C, user: &user::Model) -> Result<()> {
    if !(user.is_admin && user.is_active) {
        return Ok(());
    }
    let other_admins = User::find()
        .filter(user::Column::IsAdmin.eq(true))
        .filter(user::Column::IsActive.eq(true))
        .filter(user::Column::Id.ne(user.id))
        .count(db)
        .await?;
    if other_admins == 0 {
        return Err(Error::conflict("The last active administrator cannot be removed"));
    }
    Ok(())
}

/// Grants or revokes admin access.
pub async fn set_admin(db: &DatabaseConnection, user_id: i64, is_admin: bool) -> Result<user::Model> {
    let existing = get_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;
    if !is_admin {
        ensure_not_last_admin(db, &existing).await?;
    }

    let mut model: user::ActiveModel = existing.into();
    model.is_admin = Set(is_admin);
    model.updated_at = Set(chrono::Utc::now());
    model.update(db).await.map_err(Into::into)
}

/// Activates or deactivates a user.
pub async fn set_active(db: &DatabaseConnection, user_id: i64, is_active: bool) -> Result<user::Model> {
    let existing = get_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;
    if !is_active {
        ensure_not_last_admin(db, &existing).await?;
    }

    let mut model: user::ActiveModel = existing.into();
    model.is_active = Set(is_active);
    model.updated_at = Set(chrono::Utc::now());
    model.update(db).await.map_err(Into::into)
}

/// Deletes a user with their wishlist, reviews and cart. Their orders stay,
/// detached from the account. Everything happens in one transaction.
pub async fn delete_user(db: &DatabaseConnection, user_id: i64) -> Result<()> {
    let txn = db.begin().await?;
    let existing = User::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;
    ensure_not_last_admin(&txn, &existing).await?;

    Order::update_many()
        .col_expr(order::Column::UserId, Expr::value(Option::<i64>::None))
        .filter(order::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    Wishlist::delete_many()
        .filter(wishlist::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    Review::delete_many()
        .filter(review::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    cart::clear_cart(&txn, &cart::user_cart_key(user_id)).await?;

    existing.delete(&txn).await?;
    txn.commit().await?;
    info!("Deleted user {user_id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn input(name: &str, email: &str) -> UserInput {
        UserInput {
            name: name.to_string(),
            email: email.to_string(),
            mobile: None,
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn test_create_user_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_user(&db, input("", "a@b.co")).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { field, .. } if field == "name"));

        for email in ["", "no-at-sign", "@example.com", "user@localhost"] {
            let result = create_user(&db, input("Ann", email)).await;
            assert!(matches!(result.unwrap_err(), Error::Validation { field, .. } if field == "email"));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_email_is_normalized_and_unique() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_user(&db, input("Ann", "  Ann@Example.COM ")).await?;
        assert_eq!(user.email, "ann@example.com");

        let result = create_user(&db, input("Other Ann", "ann@example.com")).await;
        assert!(matches!(result.unwrap_err(), Error::Conflict { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_last_admin_is_protected() -> Result<()> {
        let db = setup_test_db().await?;
        let mut admin_input = input("Root", "root@example.com");
        admin_input.is_admin = true;
        let admin = create_user(&db, admin_input).await?;

        assert!(matches!(set_admin(&db, admin.id, false).await.unwrap_err(), Error::Conflict { .. }));
        assert!(matches!(set_active(&db, admin.id, false).await.unwrap_err(), Error::Conflict { .. }));
        assert!(matches!(delete_user(&db, admin.id).await.unwrap_err(), Error::Conflict { .. }));

        let second = create_test_user(&db, "ops@example.com").await?;
        set_admin(&db, second.id, true).await?;
        set_admin(&db, admin.id, false).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_user_detaches_orders() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "buyer@example.com").await?;
        let product = create_test_product(&db, "Pen", None).await?;
        let order = place_test_order_for_user(&db, user.id, &[(product.id, 1)]).await?;

        delete_user(&db, user.id).await?;
        assert!(get_user_by_id(&db, user.id).await?.is_none());

        let detail = crate::core::order::get_order_detail(&db, order.id).await?;
        assert!(detail.order.user_id.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_delete_leaves_user_and_orders_intact() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "buyer@example.com").await?;
        let product = create_test_product(&db, "Pen", None).await?;
        let order = place_test_order_for_user(&db, user.id, &[(product.id, 1)]).await?;

        // Orders are detached before reviews are removed, so this fails midway.
        db.execute_unprepared("DROP TABLE reviews").await?;
        assert!(matches!(delete_user(&db, user.id).await.unwrap_err(), Error::Database(_)));

        assert!(get_user_by_id(&db, user.id).await?.is_some());
        let detail = crate::core::order::get_order_detail(&db, order.id).await?;
        assert_eq!(detail.order.user_id, Some(user.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_user() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "old@example.com").await?;
        let mut changes = input("New Name", "new@example.com");
        changes.mobile = Some("+1 (555) 010-2000".to_string());

        let updated = update_user(&db, user.id, changes).await?;
        assert_eq!(updated.name, "New Name");
        assert_eq!(updated.mobile.as_deref(), Some("+15550102000"));
        assert_eq!(list_users(&db).await?.len(), 1);
        Ok(())
    }
}
