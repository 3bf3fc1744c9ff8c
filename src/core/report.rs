//! Sales report generation.
//!
//! Reports cover inclusive calendar-day ranges in UTC and exclude cancelled
//! orders. Aggregation happens in memory over the orders in range, which keeps
//! the queries portable across database backends.

use crate::{
    core::order::{OrderStatus, day_range, round_money},
    entities::{Order, OrderItem, order, order_item},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{DatabaseConnection, prelude::*};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Longest range a report may cover, in days.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Headline numbers for a range.
#[derive(Debug, Clone, Serialize)]
pub struct SalesSummary {
    /// First day in range
    pub from: NaiveDate,
    /// Last day in range
    pub to: NaiveDate,
    /// Sum of order totals
    pub revenue: f64,
    /// Number of orders
    pub order_count: u64,
    /// Sum of item quantities
    pub items_sold: i64,
    /// `revenue / order_count`, 0 without orders
    pub average_order_value: f64,
}

/// One day of sales.
#[derive(Debug, Clone, Serialize)]
pub struct DailySales {
    /// Calendar day (UTC)
    pub date: NaiveDate,
    /// Sum of order totals that day
    pub revenue: f64,
    /// Orders placed that day
    pub order_count: u64,
}

/// A best-selling product.
#[derive(Debug, Clone, Serialize)]
pub struct TopProduct {
    /// Product id
    pub product_id: i64,
    /// Name as snapshotted on the most recent order
    pub name: String,
    /// Units sold
    pub quantity: i64,
    /// Sum of line totals
    pub revenue: f64,
}

/// Number of orders in one status.
#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    /// Order status
    pub status: OrderStatus,
    /// Orders currently in it
    pub count: u64,
}

/// Checks that `from <= to` and the range spans at most [`MAX_RANGE_DAYS`].
///
/// # Errors
/// Returns `Validation` on the `from` field for a reversed range and on `to`
/// for a range that is too long.
pub fn validate_range(from: NaiveDate, to: NaiveDate) -> Result<()> {
    if from > to {
        return Err(Error::validation("from", "Start date must not be after end date"));
    }
    if (to - from).num_days() + 1 > MAX_RANGE_DAYS {
        return Err(Error::validation(
            "to",
            format!("Reports cover at most {MAX_RANGE_DAYS} days"),
        ));
    }
    Ok(())
}

/// Average order value, 0 when there are no orders.
#[must_use]
pub fn average_order_value(revenue: f64, order_count: u64) -> f64 {
    if order_count == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    round_money(revenue / order_count as f64)
}

async fn orders_in_range(
    db: &DatabaseConnection,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<order::Model>> {
    validate_range(from, to)?;
    let (start, end) = day_range(from, to);
    Order::find()
        .filter(order::Column::Status.ne(OrderStatus::Cancelled.as_str()))
        .filter(order::Column::CreatedAt.gte(start))
        .filter(order::Column::CreatedAt.lt(end))
        .all(db)
        .await
        .map_err(Into::into)
}

async fn items_of(db: &DatabaseConnection, orders: &[order::Model]) -> Result<Vec<order_item::Model>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
    OrderItem::find()
        .filter(order_item::Column::OrderId.is_in(ids))
        .all(db)
        .await
        .map_err(Into::into)
}

/// Revenue, order count, items sold and average order value over a range.
pub async fn sales_summary(
    db: &DatabaseConnection,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<SalesSummary> {
    let orders = orders_in_range(db, from, to).await?;
    let items = items_of(db, &orders).await?;

    let revenue = round_money(orders.iter().map(|o| o.total).sum());
    let order_count = orders.len() as u64;
    Ok(SalesSummary {
        from,
        to,
        revenue,
        order_count,
        items_sold: items.iter().map(|i| i.quantity).sum(),
        average_order_value: average_order_value(revenue, order_count),
    })
}

/// One bucket per day in range, including days without orders.
pub async fn daily_sales(
    db: &DatabaseConnection,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<DailySales>> {
    let orders = orders_in_range(db, from, to).await?;

    let mut buckets: BTreeMap<NaiveDate, DailySales> = from
        .iter_days()
        .take_while(|day| *day <= to)
        .map(|date| {
            (
                date,
                DailySales {
                    date,
                    revenue: 0.0,
                    order_count: 0,
                },
            )
        })
        .collect();

    for order in &orders {
        if let Some(bucket) = buckets.get_mut(&order.created_at.date_naive()) {
            bucket.revenue = round_money(bucket.revenue + order.total);
            bucket.order_count += 1;
        }
    }

    Ok(buckets.into_values().collect())
}

/// Best sellers by units sold, ties broken by revenue.
///
/// # Errors
/// Returns `Validation` if `limit` is outside 1..=100.
pub async fn top_products(
    db: &DatabaseConnection,
    from: NaiveDate,
    to: NaiveDate,
    limit: usize,
) -> Result<Vec<TopProduct>> {
    if !(1..=100).contains(&limit) {
        return Err(Error::validation("limit", "Limit must be between 1 and 100"));
    }
    let orders = orders_in_range(db, from, to).await?;
    let mut items = items_of(db, &orders).await?;
    items.sort_by_key(|i| i.id);

    let mut totals: HashMap<i64, TopProduct> = HashMap::new();
    for item in items {
        let entry = totals.entry(item.product_id).or_insert_with(|| TopProduct {
            product_id: item.product_id,
            name: String::new(),
            quantity: 0,
            revenue: 0.0,
        });
        entry.name = item.product_name;
        entry.quantity += item.quantity;
        entry.revenue = round_money(entry.revenue + item.line_total);
    }

    let mut ranked: Vec<TopProduct> = totals.into_values().collect();
    ranked.sort_by(|a, b| {
        b.quantity
            .cmp(&a.quantity)
            .then(b.revenue.total_cmp(&a.revenue))
            .then(a.product_id.cmp(&b.product_id))
    });
    ranked.truncate(limit);
    Ok(ranked)
}

/// Order count per status over all time; every status is present.
pub async fn status_breakdown(db: &DatabaseConnection) -> Result<Vec<StatusCount>> {
    let mut counts = Vec::with_capacity(OrderStatus::ALL.len());
    for status in OrderStatus::ALL {
        let count = Order::find()
            .filter(order::Column::Status.eq(status.as_str()))
            .count(db)
            .await?;
        counts.push(StatusCount { status, count });
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{core::order::update_order_status, test_utils::*};
    use chrono::{TimeDelta, Utc};
    use sea_orm::Set;

    async fn backdate(db: &DatabaseConnection, order_id: i64, days: i64) -> Result<()> {
        let row = Order::find_by_id(order_id).one(db).await?.unwrap();
        let mut model: order::ActiveModel = row.into();
        model.created_at = Set(Utc::now() - TimeDelta::days(days));
        model.update(db).await?;
        Ok(())
    }

    #[test]
    fn test_validate_range() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(validate_range(day, day).is_ok());
        assert!(validate_range(day, day + TimeDelta::days(365)).is_ok());
        assert!(validate_range(day, day + TimeDelta::days(366)).is_err());
        assert!(validate_range(day + TimeDelta::days(1), day).is_err());
    }

    #[test]
    fn test_average_order_value() {
        assert_eq!(average_order_value(0.0, 0), 0.0);
        assert_eq!(average_order_value(10.0, 3), 3.33);
    }

    #[tokio::test]
    async fn test_summary_excludes_cancelled() -> Result<()> {
        let db = setup_test_db().await?;
        let mug = create_custom_product(&db, "Mug", 5.0, 50, None).await?;
        place_test_order(&db, &[(mug.id, 2)]).await?;
        place_test_order(&db, &[(mug.id, 4)]).await?;
        let cancelled = place_test_order(&db, &[(mug.id, 1)]).await?;
        update_order_status(&db, cancelled.id, OrderStatus::Cancelled).await?;

        let today = Utc::now().date_naive();
        let summary = sales_summary(&db, today, today).await?;
        assert_eq!(summary.order_count, 2);
        assert_eq!(summary.items_sold, 6);
        assert_eq!(summary.revenue, 30.0);
        assert_eq!(summary.average_order_value, 15.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_daily_sales_fills_every_day() -> Result<()> {
        let db = setup_test_db().await?;
        let mug = create_custom_product(&db, "Mug", 5.0, 50, None).await?;
        let old = place_test_order(&db, &[(mug.id, 1)]).await?;
        backdate(&db, old.id, 2).await?;
        place_test_order(&db, &[(mug.id, 2)]).await?;

        let today = Utc::now().date_naive();
        let from = today - TimeDelta::days(4);
        let days = daily_sales(&db, from, today).await?;

        assert_eq!(days.len(), 5);
        assert_eq!(days[0].date, from);
        assert_eq!(days[4].date, today);
        assert_eq!(days[4].revenue, 10.0);
        assert_eq!(days[2].order_count, 1);
        assert_eq!(days.iter().filter(|d| d.order_count == 0).count(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_top_products_ranking() -> Result<()> {
        let db = setup_test_db().await?;
        let mug = create_custom_product(&db, "Mug", 5.0, 50, None).await?;
        let pen = create_custom_product(&db, "Pen", 1.0, 50, None).await?;
        let lamp = create_custom_product(&db, "Lamp", 20.0, 50, None).await?;
        place_test_order(&db, &[(mug.id, 3), (pen.id, 3)]).await?;
        place_test_order(&db, &[(lamp.id, 1)]).await?;

        let today = Utc::now().date_naive();
        let top = top_products(&db, today, today, 2).await?;
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "Mug");
        assert_eq!(top[1].name, "Pen");

        assert!(top_products(&db, today, today, 0).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_status_breakdown_lists_every_status() -> Result<()> {
        let db = setup_test_db().await?;
        let mug = create_test_product(&db, "Mug", None).await?;
        let placed = place_test_order(&db, &[(mug.id, 1)]).await?;
        update_order_status(&db, placed.id, OrderStatus::Processing).await?;

        let breakdown = status_breakdown(&db).await?;
        assert_eq!(breakdown.len(), 5);
        let processing = breakdown
            .iter()
            .find(|s| s.status == OrderStatus::Processing)
            .unwrap();
        assert_eq!(processing.count, 1);
        assert_eq!(breakdown.iter().map(|s| s.count).sum::<u64>(), 1);
        Ok(())
    }
}
