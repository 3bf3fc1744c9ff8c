//! Customer identity - registered users and guests grouped by mobile number.
//!
//! Guest checkouts have no account, so a guest is identified by the
//! synthetic key `guest_<mobile>`. Two guests sharing a number are therefore
//! the same customer; mobiles are normalized first so formatting differences
//! do not split one guest into several.

use crate::{
    core::order::{OrderStatus, round_money},
    entities::{Order, User, order},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, prelude::*};
use serde::Serialize;
use std::collections::HashMap;

/// Prefix of guest customer keys.
pub const GUEST_PREFIX: &str = "guest_";

/// A resolved customer key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerKey {
    /// Registered user id
    Registered(i64),
    /// Guest identified by normalized mobile
    Guest(String),
}

/// One row of the customer list.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerSummary {
    /// `"<user id>"` or `"guest_<mobile>"`
    pub key: String,
    /// Registered user id, `None` for guests
    pub user_id: Option<i64>,
    /// Display name (latest order name for guests)
    pub name: String,
    /// E-mail if known
    pub email: Option<String>,
    /// Mobile if known
    pub mobile: Option<String>,
    /// Whether this is a guest customer
    pub is_guest: bool,
    /// Number of orders placed
    pub order_count: u64,
    /// Sum of order totals, excluding cancelled orders
    pub total_spent: f64,
    /// When the latest order was placed
    pub last_order_at: Option<DateTimeUtc>,
}

/// Normalizes a phone number: digits only, with a leading `+` preserved.
///
/// # Errors
/// Returns `Validation` unless the result has 6 to 15 digits.
pub fn normalize_mobile(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if !(6..=15).contains(&digits.len()) {
        return Err(Error::validation(
            "mobile",
            "Mobile number must contain 6 to 15 digits",
        ));
    }
    if trimmed.starts_with('+') {
        Ok(format!("+{digits}"))
    } else {
        Ok(digits)
    }
}

/// Builds the guest key for a mobile number.
pub fn guest_key(mobile: &str) -> Result<String> {
    Ok(format!("{GUEST_PREFIX}{}", normalize_mobile(mobile)?))
}

/// Parses a customer key as produced by [`list_customers`].
///
/// # Errors
/// Returns `Validation` for keys that are neither numeric nor guest keys.
pub fn parse_customer_key(key: &str) -> Result<CustomerKey> {
    if let Some(mobile) = key.strip_prefix(GUEST_PREFIX) {
        return Ok(CustomerKey::Guest(normalize_mobile(mobile)?));
    }
    key.parse::<i64>()
        .map(CustomerKey::Registered)
        .map_err(|_| Error::validation("customer", format!("Unknown customer key '{key}'")))
}

/// The key under which an order is grouped.
pub fn customer_key_for_order(order: &order::Model) -> String {
    order.user_id.map_or_else(
        || {
            let mobile = normalize_mobile(&order.customer_mobile)
                .unwrap_or_else(|_| order.customer_mobile.clone());
            format!("{GUEST_PREFIX}{mobile}")
        },
        |id| id.to_string(),
    )
}

fn accumulate(summary: &mut CustomerSummary, order: &order::Model) {
    summary.order_count += 1;
    if order.status != OrderStatus::Cancelled.as_str() {
        summary.total_spent = round_money(summary.total_spent + order.total);
    }
    if summary.last_order_at.is_none_or(|last| order.created_at >= last) {
        summary.last_order_at = Some(order.created_at);
        if summary.is_guest {
            summary.name.clone_from(&order.customer_name);
            if order.customer_email.is_some() {
                summary.email.clone_from(&order.customer_email);
            }
        }
    }
}

/// Lists registered users and guest customers with their order totals,
/// biggest spenders first.
pub async fn list_customers(db: &DatabaseConnection) -> Result<Vec<CustomerSummary>> {
    let users = User::find().all(db).await?;
    let orders = Order::find().order_by_asc(order::Column::Id).all(db).await?;

    let mut by_key: HashMap<String, CustomerSummary> = users
        .into_iter()
        .map(|user| {
            let key = user.id.to_string();
            let summary = CustomerSummary {
                key: key.clone(),
                user_id: Some(user.id),
                name: user.name,
                email: Some(user.email),
                mobile: user.mobile,
                is_guest: false,
                order_count: 0,
                total_spent: 0.0,
                last_order_at: None,
            };
            (key, summary)
        })
        .collect();

    for order in &orders {
        let key = customer_key_for_order(order);
        let summary = by_key.entry(key.clone()).or_insert_with(|| CustomerSummary {
            mobile: key.strip_prefix(GUEST_PREFIX).map(str::to_string),
            key,
            user_id: order.user_id,
            name: order.customer_name.clone(),
            email: order.customer_email.clone(),
            is_guest: order.user_id.is_none(),
            order_count: 0,
            total_spent: 0.0,
            last_order_at: None,
        });
        accumulate(summary, order);
    }

    let mut customers: Vec<CustomerSummary> = by_key.into_values().collect();
    customers.sort_by(|a, b| {
        b.total_spent
            .total_cmp(&a.total_spent)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.key.cmp(&b.key))
    });
    Ok(customers)
}

/// Orders of one customer, newest first.
pub async fn customer_orders(db: &DatabaseConnection, key: &str) -> Result<Vec<order::Model>> {
    let query = match parse_customer_key(key)? {
        CustomerKey::Registered(user_id) => {
            User::find_by_id(user_id)
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found("customer", key))?;
            Order::find().filter(order::Column::UserId.eq(user_id))
        }
        CustomerKey::Guest(mobile) => Order::find()
            .filter(order::Column::UserId.is_null())
            .filter(order::Column::CustomerMobile.eq(mobile)),
    };

    query
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::order::{self, CheckoutRequest, CustomerInfo, LineRequest};
    use crate::test_utils::*;

    #[test]
    fn test_normalize_mobile() {
        assert_eq!(normalize_mobile(" 0171-234 5678 ").unwrap(), "01712345678");
        assert_eq!(normalize_mobile("+880 1712 345678").unwrap(), "+8801712345678");
        assert!(normalize_mobile("12345").is_err());
        assert!(normalize_mobile("1234567890123456").is_err());
    }

    #[test]
    fn test_customer_keys() {
        assert_eq!(guest_key("017-1234-5678").unwrap(), "guest_01712345678");
        assert_eq!(parse_customer_key("42").unwrap(), CustomerKey::Registered(42));
        assert_eq!(
            parse_customer_key("guest_01712345678").unwrap(),
            CustomerKey::Guest("01712345678".to_string())
        );
        assert!(parse_customer_key("alice").is_err());
    }

    async fn guest_order(
        db: &DatabaseConnection,
        name: &str,
        mobile: &str,
        product_id: i64,
        qty: i64,
    ) -> Result<crate::entities::order::Model> {
        let request = CheckoutRequest {
            customer: CustomerInfo {
                name: name.to_string(),
                mobile: mobile.to_string(),
                email: None,
                shipping_address: "1 Main St".to_string(),
                notes: None,
            },
            user_id: None,
            items: vec![LineRequest {
                product_id,
                quantity: qty,
            }],
        };
        Ok(order::place_order(db, request, 0.0).await?.order)
    }

    #[tokio::test]
    async fn test_guest_orders_group_by_normalized_mobile() -> Result<()> {
        let db = setup_test_db().await?;
        let product = create_custom_product(&db, "Soap", 5.0, 100, None).await?;

        guest_order(&db, "Rina", "0171 234 5678", product.id, 1).await?;
        guest_order(&db, "Rina K", "0171-234-5678", product.id, 2).await?;
        guest_order(&db, "Tom", "0199 000 1111", product.id, 1).await?;

        let customers = list_customers(&db).await?;
        assert_eq!(customers.len(), 2);
        let rina = &customers[0];
        assert_eq!(rina.key, "guest_01712345678");
        assert!(rina.is_guest);
        assert_eq!(rina.order_count, 2);
        assert_eq!(rina.total_spent, 15.0);
        assert_eq!(rina.name, "Rina K");

        let orders = customer_orders(&db, "guest_0171 234 5678").await?;
        assert_eq!(orders.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_total_spent_is_rounded_to_cents() -> Result<()> {
        let db = setup_test_db().await?;
        let sticker = create_custom_product(&db, "Sticker", 0.1, 100, None).await?;
        for _ in 0..3 {
            guest_order(&db, "Mia", "0155 000 2222", sticker.id, 1).await?;
        }

        let customers = list_customers(&db).await?;
        assert_eq!(customers[0].total_spent, 0.3);
        Ok(())
    }

    #[tokio::test]
    async fn test_registered_customers_include_users_without_orders() -> Result<()> {
        let db = setup_test_db().await?;
        let buyer = create_test_user(&db, "buyer@example.com").await?;
        let idle = create_test_user(&db, "idle@example.com").await?;
        let product = create_custom_product(&db, "Towel", 12.0, 10, None).await?;
        let placed = place_test_order_for_user(&db, buyer.id, &[(product.id, 2)]).await?;
        let cancelled = place_test_order_for_user(&db, buyer.id, &[(product.id, 1)]).await?;
        order::update_order_status(&db, cancelled.id, OrderStatus::Cancelled).await?;

        let customers = list_customers(&db).await?;
        assert_eq!(customers.len(), 2);
        assert_eq!(customers[0].user_id, Some(buyer.id));
        assert_eq!(customers[0].order_count, 2);
        assert_eq!(customers[0].total_spent, placed.total);
        assert_eq!(customers[1].user_id, Some(idle.id));
        assert_eq!(customers[1].order_count, 0);

        let orders = customer_orders(&db, &buyer.id.to_string()).await?;
        assert_eq!(orders.len(), 2);
        assert!(matches!(
            customer_orders(&db, "999").await.unwrap_err(),
            Error::NotFound { .. }
        ));
        Ok(())
    }
}
