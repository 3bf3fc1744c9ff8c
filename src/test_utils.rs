//! Shared test utilities for the storefront.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        category::{self, CategoryInput},
        order::{self, CheckoutRequest, CustomerInfo, LineRequest},
        product::{self, ProductInput},
        user::{self, UserInput},
    },
    entities,
    errors::Result,
};
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates an active root category.
pub async fn create_test_category(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::category::Model> {
    category::create_category(db, CategoryInput::named(name)).await
}

/// Creates a test product with sensible defaults.
///
/// # Defaults
/// * `price`: 10.0
/// * `stock`: 10
pub async fn create_test_product(
    db: &DatabaseConnection,
    name: &str,
    category_id: Option<i64>,
) -> Result<entities::product::Model> {
    create_custom_product(db, name, 10.0, 10, category_id).await
}

/// Creates a test product with custom price and stock.
pub async fn create_custom_product(
    db: &DatabaseConnection,
    name: &str,
    price: f64,
    stock: i64,
    category_id: Option<i64>,
) -> Result<entities::product::Model> {
    product::create_product(db, ProductInput::new(name, price, stock).in_category(category_id)).await
}

/// Creates a non-admin user named after the local part of `email`.
pub async fn create_test_user(
    db: &DatabaseConnection,
    email: &str,
) -> Result<entities::user::Model> {
    let name = email.split('@').next().unwrap_or(email).to_string();
    user::create_user(
        db,
        UserInput {
            name,
            email: email.to_string(),
            mobile: None,
            is_admin: false,
        },
    )
    .await
}

/// Checkout details used by test orders.
#[must_use]
pub fn test_customer() -> CustomerInfo {
    CustomerInfo {
        name: "Test Customer".to_string(),
        mobile: "0123 456 789".to_string(),
        email: Some("customer@example.com".to_string()),
        shipping_address: "1 Test Street".to_string(),
        notes: None,
    }
}

fn lines(items: &[(i64, i64)]) -> Vec<LineRequest> {
    items
        .iter()
        .map(|&(product_id, quantity)| LineRequest {
            product_id,
            quantity,
        })
        .collect()
}

/// Places a guest order for `(product_id, quantity)` pairs with no shipping fee.
pub async fn place_test_order(
    db: &DatabaseConnection,
    items: &[(i64, i64)],
) -> Result<entities::order::Model> {
    let request = CheckoutRequest {
        customer: test_customer(),
        user_id: None,
        items: lines(items),
    };
    Ok(order::place_order(db, request, 0.0).await?.order)
}

/// Places an order on behalf of a registered user with no shipping fee.
pub async fn place_test_order_for_user(
    db: &DatabaseConnection,
    user_id: i64,
    items: &[(i64, i64)],
) -> Result<entities::order::Model> {
    let request = CheckoutRequest {
        customer: test_customer(),
        user_id: Some(user_id),
        items: lines(items),
    };
    Ok(order::place_order(db, request, 0.0).await?.order)
}
