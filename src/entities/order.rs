//! Order entity - A placed order with customer contact and money totals.
//!
//! `user_id` is `None` for guest checkouts; guests are later grouped by
//! `customer_mobile`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-facing order number (`ORD-YYYYMMDD-000042`)
    #[sea_orm(unique)]
    pub order_number: String,
    /// Registered customer, `None` for guests
    pub user_id: Option<i64>,
    /// Name given at checkout
    pub customer_name: String,
    /// Normalized mobile number given at checkout
    pub customer_mobile: String,
    /// Optional e-mail given at checkout
    pub customer_email: Option<String>,
    /// Delivery address
    #[sea_orm(column_type = "Text")]
    pub shipping_address: String,
    /// Free-form customer notes
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    /// Lowercase `OrderStatus` value
    pub status: String,
    /// Sum of line totals
    pub subtotal: f64,
    /// Flat shipping fee charged
    pub shipping_fee: f64,
    /// `subtotal + shipping_fee`
    pub total: f64,
    /// When the order was placed
    pub created_at: DateTimeUtc,
    /// When the order was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Orders optionally belong to a registered user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// One order has many items
    #[sea_orm(has_many = "super::order_item::Entity")]
    Items,
    /// One order has one tracking record
    #[sea_orm(has_one = "super::order_tracking::Entity")]
    Tracking,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::order_tracking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tracking.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
