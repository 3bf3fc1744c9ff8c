//! Order business logic - checkout, status changes and shipment tracking.
//!
//! Checkout runs in one database transaction: every line's stock is taken with
//! a guarded UPDATE, the order, its items and an empty tracking record are
//! inserted, and any failure rolls the whole thing back.

use crate::{
    core::{cart, customer::normalize_mobile, pagination::Page, product},
    entities::{Order, OrderItem, OrderTracking, User, order, order_item, order_tracking},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use sea_orm::{Condition, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::{info, warn};

/// Lifecycle of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed, not yet handled
    Pending,
    /// Being prepared
    Processing,
    /// Handed to the courier
    Shipped,
    /// Received by the customer
    Delivered,
    /// Cancelled; stock was returned
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Value stored in the `status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether an order in this status may move to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }

    /// Delivered and cancelled orders never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let wanted = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| Error::validation("status", format!("Unknown order status '{value}'")))
    }
}

/// Contact and delivery details entered at checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerInfo {
    /// Customer name
    pub name: String,
    /// Mobile number, normalized before storing
    pub mobile: String,
    /// Optional e-mail
    #[serde(default)]
    pub email: Option<String>,
    /// Delivery address
    pub shipping_address: String,
    /// Optional notes for the store
    #[serde(default)]
    pub notes: Option<String>,
}

/// One requested product line.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LineRequest {
    /// Product to order
    pub product_id: i64,
    /// Units, at least 1
    pub quantity: i64,
}

/// A checkout with explicit lines.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    /// Contact and delivery details
    #[serde(flatten)]
    pub customer: CustomerInfo,
    /// Registered user placing the order, `None` for guests
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Requested lines
    pub items: Vec<LineRequest>,
}

/// An order with its items and tracking record.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    /// The order row
    pub order: order::Model,
    /// Lines in insertion order
    pub items: Vec<order_item::Model>,
    /// Shipment tracking, created empty at checkout
    pub tracking: Option<order_tracking::Model>,
}

/// Tracking fields an admin can set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackingUpdate {
    /// Courier name
    pub courier: Option<String>,
    /// Courier tracking number
    pub tracking_number: Option<String>,
    /// Note shown to the customer
    pub note: Option<String>,
}

/// Admin order listing filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    /// Only orders in this status
    pub status: Option<OrderStatus>,
    /// Matches order number, customer name or mobile
    pub search: Option<String>,
    /// Placed on or after this day (UTC)
    pub from: Option<NaiveDate>,
    /// Placed on or before this day (UTC)
    pub to: Option<NaiveDate>,
}

/// Rounds a money amount to cents.
#[must_use]
pub fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Converts inclusive calendar days into a half-open UTC instant range.
#[must_use]
pub fn day_range(from: NaiveDate, to: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = from.and_time(NaiveTime::MIN).and_utc();
    let end = to.and_time(NaiveTime::MIN).and_utc() + TimeDelta::days(1);
    (start, end)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_customer(customer: CustomerInfo) -> Result<CustomerInfo> {
    let name = customer.name.trim().to_string();
    if name.is_empty() {
        return Err(Error::validation("name", "Name is required"));
    }
    let shipping_address = customer.shipping_address.trim().to_string();
    if shipping_address.is_empty() {
        return Err(Error::validation(
            "shipping_address",
            "Shipping address is required",
        ));
    }
    let mobile = normalize_mobile(&customer.mobile)?;
    let email = non_empty(customer.email).map(|e| e.to_lowercase());
    if email.as_deref().is_some_and(|e| !e.contains('@')) {
        return Err(Error::validation("email", "E-mail address is invalid"));
    }

    Ok(CustomerInfo {
        name,
        mobile,
        email,
        shipping_address,
        notes: non_empty(customer.notes),
    })
}

/// Validates quantities and merges repeated products into one line.
fn merge_lines(items: &[LineRequest]) -> Result<Vec<LineRequest>> {
    if items.is_empty() {
        return Err(Error::validation("items", "At least one item is required"));
    }
    let mut merged: Vec<LineRequest> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity < 1 {
            return Err(Error::validation("items", "Quantity must be at least 1"));
        }
        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(item.quantity)
                    .ok_or_else(|| Error::validation("items", "Quantity is too large"))?;
            }
            None => merged.push(*item),
        }
    }
    if merged.iter().any(|line| line.quantity > cart::MAX_LINE_QUANTITY) {
        return Err(Error::validation(
            "items",
            format!("Quantity may not exceed {}", cart::MAX_LINE_QUANTITY),
        ));
    }
    Ok(merged)
}

async fn ensure_active_user<C: ConnectionTrait>(db: &C, user_id: Option<i64>) -> Result<()> {
    if let Some(id) = user_id {
        let user = User::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| Error::not_found("user", id))?;
        if !user.is_active {
            return Err(Error::validation("user_id", "This account is deactivated"));
        }
    }
    Ok(())
}

/// Inserts an order inside an open transaction. The caller commits.
async fn insert_order<C: ConnectionTrait>(
    txn: &C,
    customer: CustomerInfo,
    user_id: Option<i64>,
    lines: &[LineRequest],
    shipping_fee: f64,
) -> Result<OrderDetail> {
    let now = Utc::now();
    let mut snapshots = Vec::with_capacity(lines.len());
    let mut subtotal = 0.0;

    for line in lines {
        let product = product::get_product_by_id(txn, line.product_id)
            .await?
            .ok_or_else(|| Error::not_found("product", line.product_id))?;
        if !product.is_active {
            return Err(Error::validation(
                "items",
                format!("'{}' is no longer available", product.name),
            ));
        }

        product::adjust_stock(txn, product.id, -line.quantity).await?;

        #[allow(clippy::cast_precision_loss)]
        let line_total = round_money(product.price * line.quantity as f64);
        subtotal += line_total;
        snapshots.push((product, line.quantity, line_total));
    }

    let subtotal = round_money(subtotal);
    let total = round_money(subtotal + shipping_fee);

    let inserted = order::ActiveModel {
        order_number: Set(format!(
            "PENDING-{}",
            now.timestamp_nanos_opt().unwrap_or_default()
        )),
        user_id: Set(user_id),
        customer_name: Set(customer.name),
        customer_mobile: Set(customer.mobile),
        customer_email: Set(customer.email),
        shipping_address: Set(customer.shipping_address),
        notes: Set(customer.notes),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        subtotal: Set(subtotal),
        shipping_fee: Set(shipping_fee),
        total: Set(total),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    let order_number = format!("ORD-{}-{:06}", now.format("%Y%m%d"), inserted.id);
    let mut numbered: order::ActiveModel = inserted.into();
    numbered.order_number = Set(order_number);
    let order = numbered.update(txn).await?;

    let mut items = Vec::with_capacity(snapshots.len());
    for (product, quantity, line_total) in snapshots {
        let item = order_item::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(product.id),
            product_name: Set(product.name),
            unit_price: Set(product.price),
            quantity: Set(quantity),
            line_total: Set(line_total),
            ..Default::default()
        }
        .insert(txn)
        .await?;
        items.push(item);
    }

    let tracking = order_tracking::ActiveModel {
        order_id: Set(order.id),
        courier: Set(None),
        tracking_number: Set(None),
        note: Set(None),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    Ok(OrderDetail {
        order,
        items,
        tracking: Some(tracking),
    })
}

fn validate_shipping_fee(shipping_fee: f64) -> Result<()> {
    if !shipping_fee.is_finite() || shipping_fee < 0.0 {
        return Err(Error::InvalidAmount {
            amount: shipping_fee,
        });
    }
    Ok(())
}

/// Places an order for explicit lines.
///
/// # Errors
/// Returns an error if:
/// - Customer details or quantities are invalid (`Validation`)
/// - A product or the user does not exist (`NotFound`)
/// - A line exceeds the available stock (`InsufficientStock`)
///
/// On error nothing is written and no stock changes.
pub async fn place_order(
    db: &DatabaseConnection,
    request: CheckoutRequest,
    shipping_fee: f64,
) -> Result<OrderDetail> {
    validate_shipping_fee(shipping_fee)?;
    let customer = validate_customer(request.customer)?;
    let lines = merge_lines(&request.items)?;

    let txn = db.begin().await?;
    ensure_active_user(&txn, request.user_id).await?;
    let detail = insert_order(&txn, customer, request.user_id, &lines, shipping_fee).await?;
    txn.commit().await?;

    info!(
        "Placed order {} ({} line(s), total {:.2})",
        detail.order.order_number,
        detail.items.len(),
        detail.order.total
    );
    Ok(detail)
}

/// Places an order from the contents of a cart and empties the cart.
pub async fn checkout_cart(
    db: &DatabaseConnection,
    cart_key: &str,
    customer: CustomerInfo,
    user_id: Option<i64>,
    shipping_fee: f64,
) -> Result<OrderDetail> {
    validate_shipping_fee(shipping_fee)?;
    let customer = validate_customer(customer)?;

    let txn = db.begin().await?;
    ensure_active_user(&txn, user_id).await?;

    let cart_lines = cart::cart_items(&txn, cart_key).await?;
    if cart_lines.is_empty() {
        return Err(Error::validation("cart", "Your cart is empty"));
    }
    let requested: Vec<LineRequest> = cart_lines
        .iter()
        .map(|line| LineRequest {
            product_id: line.product_id,
            quantity: line.quantity,
        })
        .collect();
    let lines = merge_lines(&requested)?;

    let detail = insert_order(&txn, customer, user_id, &lines, shipping_fee).await?;
    cart::clear_cart(&txn, cart_key).await?;
    txn.commit().await?;

    info!(
        "Checked out cart {cart_key} as order {}",
        detail.order.order_number
    );
    Ok(detail)
}

/// Loads an order with its items and tracking record.
pub async fn get_order_detail<C: ConnectionTrait>(db: &C, order_id: i64) -> Result<OrderDetail> {
    let order = Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("order", order_id))?;
    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Id)
        .all(db)
        .await?;
    let tracking = OrderTracking::find()
        .filter(order_tracking::Column::OrderId.eq(order_id))
        .one(db)
        .await?;
    Ok(OrderDetail {
        order,
        items,
        tracking,
    })
}

/// Moves an order to `next`. Cancelling returns every item's quantity to stock.
///
/// # Errors
/// Returns `NotFound` for an unknown order and `InvalidStatusTransition` when
/// the lifecycle does not allow the change.
pub async fn update_order_status(
    db: &DatabaseConnection,
    order_id: i64,
    next: OrderStatus,
) -> Result<order::Model> {
    let txn = db.begin().await?;
    let detail = get_order_detail(&txn, order_id).await?;
    let current: OrderStatus = detail.order.status.parse()?;

    if current == next {
        return Ok(detail.order);
    }
    if !current.can_transition_to(next) {
        return Err(Error::InvalidStatusTransition {
            from: current.to_string(),
            to: next.to_string(),
        });
    }

    if next == OrderStatus::Cancelled {
        for item in &detail.items {
            match product::adjust_stock(&txn, item.product_id, item.quantity).await {
                Ok(()) => {}
                Err(Error::NotFound { .. }) => warn!(
                    "Product {} of order {} no longer exists; stock not restored",
                    item.product_id, detail.order.order_number
                ),
                Err(e) => return Err(e),
            }
        }
    }

    let order_number = detail.order.order_number.clone();
    let mut model: order::ActiveModel = detail.order.into();
    model.status = Set(next.as_str().to_string());
    model.updated_at = Set(Utc::now());
    let updated = model.update(&txn).await?;
    txn.commit().await?;

    info!("Order {order_number}: {current} -> {next}");
    Ok(updated)
}

/// Updates the shipment tracking record, creating it if missing.
pub async fn update_tracking(
    db: &DatabaseConnection,
    order_id: i64,
    update: TrackingUpdate,
) -> Result<order_tracking::Model> {
    Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("order", order_id))?;

    let existing = OrderTracking::find()
        .filter(order_tracking::Column::OrderId.eq(order_id))
        .one(db)
        .await?;

    let now = Utc::now();
    match existing {
        Some(tracking) => {
            let mut model: order_tracking::ActiveModel = tracking.into();
            model.courier = Set(non_empty(update.courier));
            model.tracking_number = Set(non_empty(update.tracking_number));
            model.note = Set(non_empty(update.note));
            model.updated_at = Set(now);
            model.update(db).await.map_err(Into::into)
        }
        None => order_tracking::ActiveModel {
            order_id: Set(order_id),
            courier: Set(non_empty(update.courier)),
            tracking_number: Set(non_empty(update.tracking_number)),
            note: Set(non_empty(update.note)),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(Into::into),
    }
}

/// Lists orders matching `filter`, newest first.
pub async fn list_orders(
    db: &DatabaseConnection,
    filter: &OrderFilter,
    page: u64,
    per_page: u64,
) -> Result<Page<order::Model>> {
    let mut query = Order::find();

    if let Some(status) = filter.status {
        query = query.filter(order::Column::Status.eq(status.as_str()));
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        query = query.filter(
            Condition::any()
                .add(order::Column::OrderNumber.contains(term))
                .add(order::Column::CustomerName.contains(term))
                .add(order::Column::CustomerMobile.contains(term)),
        );
    }
    if let Some(from) = filter.from {
        let (start, _) = day_range(from, from);
        query = query.filter(order::Column::CreatedAt.gte(start));
    }
    if let Some(to) = filter.to {
        let (_, end) = day_range(to, to);
        query = query.filter(order::Column::CreatedAt.lt(end));
    }

    let paginator = query
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .paginate(db, per_page);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page.saturating_sub(1)).await?;
    Ok(Page::new(items, total, page, per_page))
}

/// Orders placed by a registered user, newest first.
pub async fn orders_for_user(db: &DatabaseConnection, user_id: i64) -> Result<Vec<order::Model>> {
    Order::find()
        .filter(order::Column::UserId.eq(user_id))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
